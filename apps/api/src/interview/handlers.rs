//! Axum route handlers for the Interview API.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::checkpoint::Checkpoint;
use crate::interview::engine::{latest_question, summary};
use crate::interview::progress::average_score;
use crate::models::session::{EvaluationRecord, SessionState, TopicRecord, Turn};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct StartInterviewRequest {
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    /// Suspended on a question; POST a response to continue.
    AwaitingResponse,
    /// A step failed after the last answer was accepted; POST to /retry.
    Interrupted,
    Complete,
}

impl InterviewStatus {
    fn of_state(state: &SessionState) -> Self {
        if state.interview_complete {
            InterviewStatus::Complete
        } else {
            InterviewStatus::AwaitingResponse
        }
    }

    fn of_checkpoint(checkpoint: &Checkpoint) -> Self {
        match checkpoint.next {
            None => InterviewStatus::Complete,
            Some(_) if checkpoint.awaiting_response() => InterviewStatus::AwaitingResponse,
            Some(_) => InterviewStatus::Interrupted,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InterviewTurnResponse {
    pub thread_id: String,
    pub status: InterviewStatus,
    pub question: Option<String>,
    pub summary: Option<String>,
    pub last_evaluation: Option<EvaluationRecord>,
}

impl InterviewTurnResponse {
    fn from_state(thread_id: String, state: &SessionState) -> Self {
        Self {
            thread_id,
            status: InterviewStatus::of_state(state),
            question: latest_question(state).map(str::to_string),
            summary: summary(state).map(str::to_string),
            last_evaluation: state.current_evaluation.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InterviewProgressResponse {
    pub thread_id: String,
    pub status: InterviewStatus,
    pub step: u64,
    pub updated_at: DateTime<Utc>,
    pub current_domain: String,
    pub current_subdomain: String,
    pub current_skill: String,
    pub questions_asked_current_topic: u32,
    pub total_questions_asked: u32,
    pub topics_completed: u32,
    pub topics_covered: Vec<TopicRecord>,
    pub max_topics: u32,
    pub max_questions_per_topic: u32,
    pub average_score: f64,
    /// Candidate-visible turns only.
    pub transcript: Vec<Turn>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/interviews
///
/// Starts a new interview and returns its first question. A thread id is generated
/// when the body omits one; a 502 carries it in `error.thread_id` so the client can
/// call `/retry`.
pub async fn handle_start_interview(
    State(state): State<AppState>,
    body: Option<Json<StartInterviewRequest>>,
) -> Result<Json<InterviewTurnResponse>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let thread_id = match request.thread_id.map(|t| t.trim().to_string()) {
        Some(id) if !id.is_empty() => id,
        _ => format!("interview_{}", Uuid::new_v4()),
    };

    let _guard = state.session_locks.lock(&thread_id).await;

    if state.engine.snapshot(&thread_id).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Interview '{thread_id}' already exists"
        )));
    }

    let (session, handle) = state
        .engine
        .start(&thread_id)
        .await
        .map_err(|e| AppError::from(e).for_thread(&thread_id))?;
    info!(
        "Interview {} started, waiting on {}",
        handle.thread_id, handle.pending
    );

    Ok(Json(InterviewTurnResponse::from_state(thread_id, &session)))
}

/// POST /api/v1/interviews/:thread_id/responses
///
/// Submits the candidate's answer to the open question and returns the next
/// question, or the summary if the interview has ended.
pub async fn handle_respond(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(request): Json<RespondRequest>,
) -> Result<Json<InterviewTurnResponse>, AppError> {
    if request.response.trim().is_empty() {
        return Err(AppError::Validation("response cannot be empty".to_string()));
    }

    let _guard = state.session_locks.lock(&thread_id).await;

    let session = state
        .engine
        .resume(&thread_id, &request.response)
        .await
        .map_err(|e| AppError::from(e).for_thread(&thread_id))?;
    Ok(Json(InterviewTurnResponse::from_state(thread_id, &session)))
}

/// POST /api/v1/interviews/:thread_id/retry
///
/// Re-runs an interview whose last step failed after the answer was accepted.
pub async fn handle_retry(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<InterviewTurnResponse>, AppError> {
    let _guard = state.session_locks.lock(&thread_id).await;

    let session = state
        .engine
        .retry(&thread_id)
        .await
        .map_err(|e| AppError::from(e).for_thread(&thread_id))?;
    Ok(Json(InterviewTurnResponse::from_state(thread_id, &session)))
}

/// GET /api/v1/interviews/:thread_id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<InterviewProgressResponse>, AppError> {
    let checkpoint = state
        .engine
        .snapshot(&thread_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview {thread_id} not found")))?;

    let status = InterviewStatus::of_checkpoint(&checkpoint);
    let limits = state.engine.limits();
    let session = checkpoint.state;
    Ok(Json(InterviewProgressResponse {
        thread_id,
        status,
        step: checkpoint.step,
        updated_at: checkpoint.saved_at,
        average_score: average_score(&session.overall_performance),
        transcript: session.visible_transcript().into_iter().cloned().collect(),
        current_domain: session.current_domain,
        current_subdomain: session.current_subdomain,
        current_skill: session.current_skill,
        questions_asked_current_topic: session.questions_asked_current_topic,
        total_questions_asked: session.total_questions_asked,
        topics_completed: session.topics_completed,
        topics_covered: session.topics_covered,
        max_topics: limits.max_topics,
        max_questions_per_topic: limits.max_questions_per_topic,
    }))
}
