use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::taxonomy::Taxonomy;

/// Who produced a transcript turn. `Internal` notes are audit-only and never shown to the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Internal,
    Interviewer,
    Candidate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn internal(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Internal,
            content: content.into(),
        }
    }

    pub fn interviewer(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Interviewer,
            content: content.into(),
        }
    }

    pub fn candidate(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Candidate,
            content: content.into(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.role != TurnRole::Internal
    }
}

/// A topic that has been archived by the topic advancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub domain: String,
    pub subdomain: String,
    pub skill: String,
    pub questions_asked: u32,
}

/// The evaluator's verdict on one candidate answer. Immutable once recorded.
///
/// `quality_score` is nominally 0.0 – 1.0 but is stored exactly as the model returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    pub response: String,
    pub quality_score: f64,
    pub demonstrates_knowledge: bool,
    pub areas_of_strength: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub should_continue_topic: bool,
    pub reasoning: String,
    /// "<domain> - <subdomain> - <skill>"
    pub topic: String,
}

/// The full progress record of one interview thread.
///
/// Workflow nodes take this by value and hand back the successor value; nothing
/// mutates a state that another owner can observe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub taxonomy: Arc<Taxonomy>,
    pub transcript: Vec<Turn>,

    pub current_domain: String,
    pub current_subdomain: String,
    pub current_skill: String,
    pub topics_covered: Vec<TopicRecord>,

    pub questions_asked_current_topic: u32,
    pub total_questions_asked: u32,
    pub topics_completed: u32,

    pub current_evaluation: Option<EvaluationRecord>,
    pub overall_performance: Vec<EvaluationRecord>,

    pub should_continue_interview: bool,
    pub interview_complete: bool,
}

impl SessionState {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            taxonomy,
            transcript: Vec::new(),
            current_domain: String::new(),
            current_subdomain: String::new(),
            current_skill: String::new(),
            topics_covered: Vec::new(),
            questions_asked_current_topic: 0,
            total_questions_asked: 0,
            topics_completed: 0,
            current_evaluation: None,
            overall_performance: Vec::new(),
            should_continue_interview: true,
            interview_complete: false,
        }
    }

    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.transcript.push(turn);
        self
    }

    pub fn topic_label(&self) -> String {
        format!(
            "{} - {} - {}",
            self.current_domain, self.current_subdomain, self.current_skill
        )
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.transcript.last()
    }

    /// The most recent candidate-visible interviewer turn: the open question while the
    /// interview runs, the summary once it is complete.
    pub fn last_interviewer_turn(&self) -> Option<&Turn> {
        self.transcript
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::Interviewer)
    }

    /// Visible turns among the last `window` transcript entries, oldest first.
    pub fn recent_visible_turns(&self, window: usize) -> Vec<&Turn> {
        let start = self.transcript.len().saturating_sub(window);
        self.transcript[start..]
            .iter()
            .filter(|t| t.is_visible())
            .collect()
    }

    pub fn visible_transcript(&self) -> Vec<&Turn> {
        self.transcript.iter().filter(|t| t.is_visible()).collect()
    }

    /// total == archived per-topic counts + the open topic's count, and one record per completed topic.
    pub fn counters_consistent(&self) -> bool {
        let archived: u32 = self.topics_covered.iter().map(|t| t.questions_asked).sum();
        self.total_questions_asked == archived + self.questions_asked_current_topic
            && self.topics_completed as usize == self.topics_covered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(Arc::new(Taxonomy::default()))
    }

    #[test]
    fn test_new_state_is_empty_and_consistent() {
        let s = state();
        assert!(s.transcript.is_empty());
        assert!(s.current_evaluation.is_none());
        assert!(s.should_continue_interview);
        assert!(!s.interview_complete);
        assert!(s.counters_consistent());
    }

    #[test]
    fn test_recent_visible_turns_windows_before_filtering() {
        let s = state()
            .with_turn(Turn::interviewer("q1"))
            .with_turn(Turn::candidate("a1"))
            .with_turn(Turn::internal("note"))
            .with_turn(Turn::internal("note"))
            .with_turn(Turn::interviewer("q2"))
            .with_turn(Turn::candidate("a2"))
            .with_turn(Turn::internal("note"));

        let recent: Vec<&str> = s
            .recent_visible_turns(6)
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        // q1 falls outside the six-turn window; internal notes are dropped afterwards
        assert_eq!(recent, vec!["a1", "q2", "a2"]);
    }

    #[test]
    fn test_last_interviewer_turn_skips_internal_and_candidate() {
        let s = state()
            .with_turn(Turn::interviewer("What is a B-tree?"))
            .with_turn(Turn::internal("Selected topic"))
            .with_turn(Turn::candidate("A balanced tree"));
        assert_eq!(
            s.last_interviewer_turn().map(|t| t.content.as_str()),
            Some("What is a B-tree?")
        );
    }

    #[test]
    fn test_counters_consistent_detects_drift() {
        let mut s = state();
        s.topics_covered.push(TopicRecord {
            domain: "d".into(),
            subdomain: "s".into(),
            skill: "k".into(),
            questions_asked: 2,
        });
        s.topics_completed = 1;
        s.questions_asked_current_topic = 1;
        s.total_questions_asked = 3;
        assert!(s.counters_consistent());

        s.total_questions_asked = 4;
        assert!(!s.counters_consistent());
    }

    #[test]
    fn test_turn_role_serializes_snake_case() {
        let json = serde_json::to_string(&Turn::internal("x")).unwrap();
        assert_eq!(json, r#"{"role":"internal","content":"x"}"#);
    }
}
