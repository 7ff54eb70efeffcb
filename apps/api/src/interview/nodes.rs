//! The gateway-backed workflow nodes: topic selection, question generation, and
//! response evaluation.
//!
//! Each node consumes the current `SessionState` and returns its successor. A gateway
//! failure aborts the node with `EngineError::Gateway`; no partial state escapes.

use tracing::{debug, info};

use crate::interview::engine::{EngineError, Node};
use crate::interview::prompts::{
    render, EVALUATION_PROMPT_TEMPLATE, EVALUATION_SYSTEM_TEMPLATE, QUESTION_PROMPT_TEMPLATE,
    QUESTION_SYSTEM, TOPIC_SELECTION_PROMPT_TEMPLATE, TOPIC_SELECTION_SYSTEM,
};
use crate::llm_client::shapes::{OutputShape, ShapeMismatch, StructuredOutput};
use crate::llm_client::{LanguageModelGateway, LlmError, PromptMessage};
use crate::models::session::{EvaluationRecord, SessionState, Turn, TurnRole};

/// Number of trailing transcript turns offered to the question generator (before
/// internal notes are filtered out).
pub const QUESTION_CONTEXT_WINDOW: usize = 6;

const NO_PREVIOUS_QUESTION: &str = "No previous question found";

/// Invokes the gateway and converts the result into the node's expected shape.
async fn request<T>(
    gateway: &dyn LanguageModelGateway,
    node: Node,
    messages: &[PromptMessage],
    shape: OutputShape,
    convert: fn(StructuredOutput) -> Result<T, ShapeMismatch>,
) -> Result<T, EngineError> {
    gateway
        .invoke(messages, shape)
        .await
        .and_then(|output| convert(output).map_err(LlmError::from))
        .map_err(|source| EngineError::Gateway { node, source })
}

// ────────────────────────────────────────────────────────────────────────────
// Topic Selector
// ────────────────────────────────────────────────────────────────────────────

/// Asks the model for the next (domain, subdomain, skill) to assess.
///
/// The returned strings are not checked against the taxonomy; empty fields are
/// accepted as a degenerate selection.
pub async fn select_topic(
    state: SessionState,
    gateway: &dyn LanguageModelGateway,
) -> Result<SessionState, EngineError> {
    if state.interview_complete {
        return Ok(state);
    }

    let taxonomy_json = serde_json::to_string_pretty(state.taxonomy.as_ref())?;
    let topics_covered_json = serde_json::to_string_pretty(&state.topics_covered)?;
    let prompt = render(
        TOPIC_SELECTION_PROMPT_TEMPLATE,
        &[
            ("taxonomy_json", taxonomy_json.as_str()),
            ("topics_covered_json", topics_covered_json.as_str()),
            ("total_questions", state.total_questions_asked.to_string().as_str()),
            ("topics_completed", state.topics_completed.to_string().as_str()),
        ],
    );
    let messages = [
        PromptMessage::system(TOPIC_SELECTION_SYSTEM),
        PromptMessage::user(prompt),
    ];

    let selection = request(
        gateway,
        Node::SelectTopic,
        &messages,
        OutputShape::TopicSelection,
        StructuredOutput::into_topic_selection,
    )
    .await?;

    info!(
        "Selected topic: {} / {} / {}",
        selection.selected_topic, selection.selected_subdomain, selection.selected_skill
    );

    let note = format!(
        "Selected topic: {} - {} - {}. Reasoning: {}",
        selection.selected_topic,
        selection.selected_subdomain,
        selection.selected_skill,
        selection.reasoning
    );

    Ok(SessionState {
        current_domain: selection.selected_topic,
        current_subdomain: selection.selected_subdomain,
        current_skill: selection.selected_skill,
        ..state
    }
    .with_turn(Turn::internal(note)))
}

// ────────────────────────────────────────────────────────────────────────────
// Question Generator
// ────────────────────────────────────────────────────────────────────────────

/// Generates the next question for the current topic and records it as an
/// interviewer turn. Bumps both the per-topic and total question counters.
pub async fn generate_question(
    state: SessionState,
    gateway: &dyn LanguageModelGateway,
) -> Result<SessionState, EngineError> {
    if state.interview_complete {
        return Ok(state);
    }

    let conversation_context = conversation_context(&state);
    let prompt = render(
        QUESTION_PROMPT_TEMPLATE,
        &[
            ("domain", state.current_domain.as_str()),
            ("subdomain", state.current_subdomain.as_str()),
            ("skill", state.current_skill.as_str()),
            (
                "questions_on_topic",
                state.questions_asked_current_topic.to_string().as_str(),
            ),
            ("conversation_context", conversation_context.as_str()),
        ],
    );
    let messages = [
        PromptMessage::system(QUESTION_SYSTEM),
        PromptMessage::user(prompt),
    ];

    let question = request(
        gateway,
        Node::GenerateQuestion,
        &messages,
        OutputShape::Question,
        StructuredOutput::into_question,
    )
    .await?;

    debug!(
        "Generated {} question on '{}'",
        question.difficulty_level, question.topic_focus
    );

    let mut next = state.with_turn(Turn::interviewer(question.question));
    next.questions_asked_current_topic += 1;
    next.total_questions_asked += 1;
    Ok(next)
}

fn conversation_context(state: &SessionState) -> String {
    let lines: Vec<String> = state
        .recent_visible_turns(QUESTION_CONTEXT_WINDOW)
        .into_iter()
        .map(|turn| {
            let speaker = match turn.role {
                TurnRole::Candidate => "Candidate",
                _ => "Interviewer",
            };
            format!("{speaker}: {}", turn.content)
        })
        .collect();

    if lines.is_empty() {
        "(no prior conversation)".to_string()
    } else {
        lines.join("\n")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response Evaluator
// ────────────────────────────────────────────────────────────────────────────

/// Scores the candidate's latest answer against the question it responds to.
///
/// A no-op unless the final transcript turn is a candidate turn; an out-of-order
/// call (e.g. a double resume) returns the state untouched.
pub async fn evaluate_response(
    state: SessionState,
    gateway: &dyn LanguageModelGateway,
) -> Result<SessionState, EngineError> {
    if state.interview_complete {
        return Ok(state);
    }

    let Some(response) = state
        .last_turn()
        .filter(|t| t.role == TurnRole::Candidate)
        .map(|t| t.content.clone())
    else {
        debug!("Latest turn is not a candidate response; skipping evaluation");
        return Ok(state);
    };
    let question = state
        .last_interviewer_turn()
        .map(|t| t.content.clone())
        .unwrap_or_else(|| NO_PREVIOUS_QUESTION.to_string());

    let system = render(
        EVALUATION_SYSTEM_TEMPLATE,
        &[
            ("domain", state.current_domain.as_str()),
            ("subdomain", state.current_subdomain.as_str()),
            ("skill", state.current_skill.as_str()),
            (
                "question_number",
                state.questions_asked_current_topic.to_string().as_str(),
            ),
        ],
    );
    let prompt = render(
        EVALUATION_PROMPT_TEMPLATE,
        &[("question", question.as_str()), ("response", response.as_str())],
    );
    let messages = [PromptMessage::system(system), PromptMessage::user(prompt)];

    let evaluation = request(
        gateway,
        Node::EvaluateResponse,
        &messages,
        OutputShape::Evaluation,
        StructuredOutput::into_evaluation,
    )
    .await?;

    info!(
        "Evaluated response on '{}': score={:.2}, continue_topic={}",
        state.topic_label(),
        evaluation.quality_score,
        evaluation.should_continue_topic
    );

    let note = format!(
        "Evaluation complete. Quality score: {:.2}. Should continue topic: {}",
        evaluation.quality_score, evaluation.should_continue_topic
    );
    let record = EvaluationRecord {
        topic: state.topic_label(),
        question,
        response,
        quality_score: evaluation.quality_score,
        demonstrates_knowledge: evaluation.demonstrates_knowledge,
        areas_of_strength: evaluation.areas_of_strength,
        areas_for_improvement: evaluation.areas_for_improvement,
        should_continue_topic: evaluation.should_continue_topic,
        reasoning: evaluation.reasoning,
    };

    let mut next = state.with_turn(Turn::internal(note));
    next.overall_performance.push(record.clone());
    next.current_evaluation = Some(record);
    Ok(next)
}
