//! Transition Policy: decides, after each evaluated answer, whether to keep probing the
//! current topic, move to a new one, or wrap the interview up.
//!
//! Pure and deterministic. Rules are checked in order; the first match wins:
//!
//! 1. topics_completed ≥ max_topics                          → EndInterview
//! 2. questions on topic ≥ max_questions_per_topic           → AdvanceTopic
//! 3. with an evaluation present:
//!    a. score < 0.3 and questions on topic ≥ 2              → AdvanceTopic
//!    b. demonstrates knowledge and score > 0.7              → AdvanceTopic
//!    c. evaluator recommends continuing                     → ContinueTopic
//! 4. questions on topic ≥ 2                                 → AdvanceTopic
//! 5. otherwise                                              → ContinueTopic

use serde::{Deserialize, Serialize};

use crate::models::session::SessionState;

/// Below this score a candidate is considered to be struggling on the topic.
pub const STRUGGLING_SCORE: f64 = 0.3;
/// Above this score (with demonstrated knowledge) the topic counts as assessed.
pub const STRONG_SCORE: f64 = 0.7;
/// Per-topic question count at which the struggling and no-signal ceilings kick in.
pub const MIN_QUESTIONS_BEFORE_ADVANCE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    ContinueTopic,
    AdvanceTopic,
    EndInterview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterviewLimits {
    pub max_topics: u32,
    pub max_questions_per_topic: u32,
}

impl Default for InterviewLimits {
    fn default() -> Self {
        Self {
            max_topics: 2,
            max_questions_per_topic: 3,
        }
    }
}

pub fn topic_budget_exhausted(state: &SessionState, limits: &InterviewLimits) -> bool {
    state.topics_completed >= limits.max_topics
}

pub fn decide(state: &SessionState, limits: &InterviewLimits) -> Transition {
    if topic_budget_exhausted(state, limits) {
        return Transition::EndInterview;
    }

    let asked = state.questions_asked_current_topic;
    if asked >= limits.max_questions_per_topic {
        return Transition::AdvanceTopic;
    }

    if let Some(evaluation) = &state.current_evaluation {
        if evaluation.quality_score < STRUGGLING_SCORE && asked >= MIN_QUESTIONS_BEFORE_ADVANCE {
            return Transition::AdvanceTopic;
        }
        if evaluation.demonstrates_knowledge && evaluation.quality_score > STRONG_SCORE {
            return Transition::AdvanceTopic;
        }
        if evaluation.should_continue_topic {
            return Transition::ContinueTopic;
        }
    }

    if asked >= MIN_QUESTIONS_BEFORE_ADVANCE {
        return Transition::AdvanceTopic;
    }

    Transition::ContinueTopic
}
