//! Topic Advancer and Interview Finalizer: the two bookkeeping nodes. Neither calls
//! the gateway.

use std::fmt::Write;

use tracing::info;

use crate::models::session::{EvaluationRecord, SessionState, TopicRecord, Turn};

/// Archives the current topic into `topics_covered` and clears the per-topic state.
pub fn advance_topic(state: SessionState) -> SessionState {
    if state.interview_complete {
        return state;
    }

    let completed = TopicRecord {
        domain: state.current_domain.clone(),
        subdomain: state.current_subdomain.clone(),
        skill: state.current_skill.clone(),
        questions_asked: state.questions_asked_current_topic,
    };
    let topics_completed = state.topics_completed + 1;
    info!(
        "Completed topic '{}' after {} question(s) ({} topic(s) done)",
        state.topic_label(),
        completed.questions_asked,
        topics_completed
    );

    let mut topics_covered = state.topics_covered.clone();
    topics_covered.push(completed);

    SessionState {
        topics_covered,
        topics_completed,
        questions_asked_current_topic: 0,
        current_domain: String::new(),
        current_subdomain: String::new(),
        current_skill: String::new(),
        ..state
    }
    .with_turn(Turn::internal(format!(
        "Moving to next topic. Topics completed: {topics_completed}"
    )))
}

/// Mean quality score over all evaluations; 0.0 when there are none.
pub fn average_score(performance: &[EvaluationRecord]) -> f64 {
    if performance.is_empty() {
        return 0.0;
    }
    performance.iter().map(|e| e.quality_score).sum::<f64>() / performance.len() as f64
}

pub fn build_summary(state: &SessionState) -> String {
    let mut summary = format!(
        "Interview Complete!\n\n\
        Summary:\n\
        - Topics Covered: {}\n\
        - Total Questions Asked: {}\n\
        - Average Performance Score: {:.2}/1.0\n\n\
        Performance by Topic:",
        state.topics_covered.len(),
        state.total_questions_asked,
        average_score(&state.overall_performance)
    );
    for evaluation in &state.overall_performance {
        // writing into a String cannot fail
        let _ = write!(
            summary,
            "\n- {}: {:.2}/1.0",
            evaluation.topic, evaluation.quality_score
        );
    }
    summary
}

/// Appends the candidate-visible summary and marks the interview complete. Terminal.
pub fn finalize_interview(state: SessionState) -> SessionState {
    if state.interview_complete {
        return state;
    }

    let summary = build_summary(&state);
    info!(
        "Interview complete: {} question(s), average score {:.2}",
        state.total_questions_asked,
        average_score(&state.overall_performance)
    );

    SessionState {
        interview_complete: true,
        should_continue_interview: false,
        ..state
    }
    .with_turn(Turn::interviewer(summary))
}
