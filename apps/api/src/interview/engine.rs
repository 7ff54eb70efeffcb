//! Workflow Engine: runs the interview graph for one thread at a time.
//!
//! ```text
//! SelectTopic → GenerateQuestion → ⏸ → EvaluateResponse ─┬─ continue ──→ SelectTopic
//!      ↑                                                  ├─ advance ───→ AdvanceTopic ─┬→ SelectTopic
//!      └──────────────────────────────────────────────────┘               budget spent └→ FinalizeInterview
//!                                                         └─ end ───────→ FinalizeInterview → done
//! ```
//!
//! Execution suspends (⏸) before `EvaluateResponse` and hands control back to the
//! caller, who resumes with the candidate's answer. A checkpoint is written after every
//! node, so a failed node leaves the last good snapshot in place.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::interview::checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
use crate::interview::nodes::{evaluate_response, generate_question, select_topic};
use crate::interview::policy::{decide, topic_budget_exhausted, InterviewLimits, Transition};
use crate::interview::progress::{advance_topic, finalize_interview};
use crate::llm_client::{LanguageModelGateway, LlmError};
use crate::models::session::{SessionState, Turn};
use crate::taxonomy::Taxonomy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    SelectTopic,
    GenerateQuestion,
    EvaluateResponse,
    AdvanceTopic,
    FinalizeInterview,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::SelectTopic => "select_topic",
            Node::GenerateQuestion => "generate_question",
            Node::EvaluateResponse => "evaluate_response",
            Node::AdvanceTopic => "advance_topic",
            Node::FinalizeInterview => "finalize_interview",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Node '{node}' failed: {source}")]
    Gateway { node: Node, source: LlmError },

    #[error("Failed to build prompt: {0}")]
    Prompt(#[from] serde_json::Error),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("No interview found for thread '{0}'")]
    UnknownThread(String),

    #[error("Interview '{0}' is already complete")]
    InterviewComplete(String),

    #[error("Interview '{thread_id}' is not awaiting a response (next step: {pending})")]
    NotAwaitingResponse { thread_id: String, pending: Node },
}

/// What a caller needs to re-enter a suspended thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeHandle {
    pub thread_id: String,
    pub pending: Node,
}

pub struct InterviewEngine {
    gateway: Arc<dyn LanguageModelGateway>,
    store: Arc<dyn CheckpointStore>,
    taxonomy: Arc<Taxonomy>,
    limits: InterviewLimits,
}

impl InterviewEngine {
    pub fn new(
        gateway: Arc<dyn LanguageModelGateway>,
        store: Arc<dyn CheckpointStore>,
        taxonomy: Arc<Taxonomy>,
        limits: InterviewLimits,
    ) -> Self {
        Self {
            gateway,
            store,
            taxonomy,
            limits,
        }
    }

    pub fn limits(&self) -> InterviewLimits {
        self.limits
    }

    /// Begins a fresh interview on `thread_id` and runs it up to the first question.
    /// Any earlier checkpoint on the same thread is replaced.
    pub async fn start(&self, thread_id: &str) -> Result<(SessionState, ResumeHandle), EngineError> {
        info!("Starting interview on thread {thread_id}");
        let state = SessionState::new(self.taxonomy.clone());
        let (state, next) = self.run(thread_id, state, Node::SelectTopic, 0, false).await?;
        let pending = next.ok_or_else(|| EngineError::InterviewComplete(thread_id.to_string()))?;
        Ok((
            state,
            ResumeHandle {
                thread_id: thread_id.to_string(),
                pending,
            },
        ))
    }

    /// Appends the candidate's answer to a suspended thread and runs until the next
    /// question is asked or the interview ends.
    ///
    /// The answer is only persisted together with the successful evaluation, so a
    /// failed call can be retried with the same answer.
    pub async fn resume(
        &self,
        thread_id: &str,
        candidate_response: &str,
    ) -> Result<SessionState, EngineError> {
        let checkpoint = self.checkpoint(thread_id).await?;
        match checkpoint.next {
            None => return Err(EngineError::InterviewComplete(thread_id.to_string())),
            Some(Node::EvaluateResponse) => {}
            Some(pending) => {
                return Err(EngineError::NotAwaitingResponse {
                    thread_id: thread_id.to_string(),
                    pending,
                })
            }
        }

        let state = checkpoint.state.with_turn(Turn::candidate(candidate_response));
        let (state, _) = self
            .run(thread_id, state, Node::EvaluateResponse, checkpoint.step, true)
            .await?;
        Ok(state)
    }

    /// Re-runs a thread whose last attempt failed part-way (e.g. question generation
    /// after a successful evaluation). A thread already waiting for an answer is
    /// returned unchanged.
    pub async fn retry(&self, thread_id: &str) -> Result<SessionState, EngineError> {
        let checkpoint = self.checkpoint(thread_id).await?;
        match checkpoint.next {
            None => Err(EngineError::InterviewComplete(thread_id.to_string())),
            Some(Node::EvaluateResponse) => Ok(checkpoint.state),
            Some(node) => {
                info!("Retrying thread {thread_id} from {node}");
                let (state, _) = self
                    .run(thread_id, checkpoint.state, node, checkpoint.step, false)
                    .await?;
                Ok(state)
            }
        }
    }

    /// Latest snapshot for a thread, if one exists.
    pub async fn snapshot(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        Ok(self.store.load(thread_id).await?)
    }

    async fn checkpoint(&self, thread_id: &str) -> Result<Checkpoint, EngineError> {
        self.store
            .load(thread_id)
            .await?
            .ok_or_else(|| EngineError::UnknownThread(thread_id.to_string()))
    }

    /// Drives the graph from `node` until it suspends (returns `Some(EvaluateResponse)`)
    /// or terminates (returns `None`). `entering_evaluation` lets a resume pass the
    /// interrupt boundary exactly once.
    async fn run(
        &self,
        thread_id: &str,
        mut state: SessionState,
        mut node: Node,
        mut step: u64,
        mut entering_evaluation: bool,
    ) -> Result<(SessionState, Option<Node>), EngineError> {
        loop {
            if node == Node::EvaluateResponse && !entering_evaluation {
                info!("Thread {thread_id} awaiting candidate response (step {step})");
                return Ok((state, Some(node)));
            }
            entering_evaluation = false;

            let started = Instant::now();
            state = match self.execute(node, state).await {
                Ok(next) => next,
                Err(e) => {
                    warn!("Thread {thread_id}: {e}. Last checkpoint kept at step {step}");
                    return Err(e);
                }
            };
            step += 1;
            if !state.counters_consistent() {
                warn!("Thread {thread_id}: question counters drifted after {node} (step {step})");
            }

            let next = self.successor(node, &state);
            debug!(
                "Thread {thread_id} step {step}: {node} done in {}ms, next={:?}",
                started.elapsed().as_millis(),
                next
            );
            self.store
                .save(Checkpoint::new(thread_id, state.clone(), next, step))
                .await?;

            match next {
                Some(n) => node = n,
                None => return Ok((state, None)),
            }
        }
    }

    async fn execute(&self, node: Node, state: SessionState) -> Result<SessionState, EngineError> {
        let gateway = self.gateway.as_ref();
        match node {
            Node::SelectTopic => select_topic(state, gateway).await,
            Node::GenerateQuestion => generate_question(state, gateway).await,
            Node::EvaluateResponse => evaluate_response(state, gateway).await,
            Node::AdvanceTopic => Ok(advance_topic(state)),
            Node::FinalizeInterview => Ok(finalize_interview(state)),
        }
    }

    fn successor(&self, node: Node, state: &SessionState) -> Option<Node> {
        match node {
            Node::SelectTopic => Some(Node::GenerateQuestion),
            Node::GenerateQuestion => Some(Node::EvaluateResponse),
            Node::EvaluateResponse => {
                let transition = decide(state, &self.limits);
                debug!("Transition policy chose {transition:?}");
                Some(match transition {
                    Transition::ContinueTopic => Node::SelectTopic,
                    Transition::AdvanceTopic => Node::AdvanceTopic,
                    Transition::EndInterview => Node::FinalizeInterview,
                })
            }
            Node::AdvanceTopic if topic_budget_exhausted(state, &self.limits) => {
                Some(Node::FinalizeInterview)
            }
            Node::AdvanceTopic => Some(Node::SelectTopic),
            Node::FinalizeInterview => None,
        }
    }
}

/// The question currently put to the candidate; `None` before the first question
/// and after the interview has ended.
pub fn latest_question(state: &SessionState) -> Option<&str> {
    if state.interview_complete {
        return None;
    }
    state.last_interviewer_turn().map(|t| t.content.as_str())
}

/// The closing summary; only available once the interview is complete.
pub fn summary(state: &SessionState) -> Option<&str> {
    if !state.interview_complete {
        return None;
    }
    state.last_interviewer_turn().map(|t| t.content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::checkpoint::InMemoryCheckpointStore;
    use crate::interview::testing::{evaluation, provider_down, question, topic, ScriptedGateway};
    use crate::llm_client::shapes::StructuredOutput;

    fn engine_with(
        script: Vec<Result<StructuredOutput, LlmError>>,
        limits: InterviewLimits,
    ) -> (InterviewEngine, Arc<ScriptedGateway>, Arc<InMemoryCheckpointStore>) {
        let gateway = Arc::new(ScriptedGateway::new(script));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let engine = InterviewEngine::new(
            gateway.clone(),
            store.clone(),
            Arc::new(Taxonomy::default()),
            limits,
        );
        (engine, gateway, store)
    }

    #[tokio::test]
    async fn test_start_suspends_after_first_question() {
        let (engine, _, store) = engine_with(
            vec![topic("Backend", "Databases", "Indexing"), question("What is a B-tree?")],
            InterviewLimits::default(),
        );

        let (state, handle) = engine.start("t1").await.unwrap();

        assert_eq!(handle.pending, Node::EvaluateResponse);
        assert_eq!(handle.thread_id, "t1");
        assert_eq!(latest_question(&state), Some("What is a B-tree?"));
        assert_eq!(state.total_questions_asked, 1);
        assert!(summary(&state).is_none());

        let checkpoint = store.load("t1").await.unwrap().unwrap();
        assert_eq!(checkpoint.step, 2);
        assert!(checkpoint.awaiting_response());
        assert_eq!(checkpoint.state, state);
    }

    #[tokio::test]
    async fn test_scenario_a_single_cycle_completes_interview() {
        let (engine, gateway, _) = engine_with(
            vec![
                topic("Backend", "Databases", "Indexing"),
                question("What is a B-tree?"),
                evaluation(0.6, true, true),
            ],
            InterviewLimits {
                max_topics: 1,
                max_questions_per_topic: 1,
            },
        );

        let (_, handle) = engine.start("a").await.unwrap();
        let state = engine.resume(&handle.thread_id, "A balanced search tree.").await.unwrap();

        assert!(state.interview_complete);
        assert!(!state.should_continue_interview);
        assert_eq!(state.overall_performance.len(), 1);
        assert_eq!(state.topics_completed, 1);
        assert!(state.counters_consistent());
        assert!(summary(&state).unwrap().contains("Average Performance Score: 0.60/1.0"));
        assert!(latest_question(&state).is_none());
        assert_eq!(gateway.remaining(), 0);
    }

    #[tokio::test]
    async fn test_continue_topic_reselects_and_asks_again() {
        let (engine, _, _) = engine_with(
            vec![
                topic("Backend", "Databases", "Indexing"),
                question("Q1"),
                evaluation(0.5, false, true),
                topic("Backend", "Databases", "Indexing"),
                question("Q2"),
            ],
            InterviewLimits::default(),
        );

        engine.start("t").await.unwrap();
        let state = engine.resume("t", "answer one").await.unwrap();

        assert_eq!(latest_question(&state), Some("Q2"));
        assert_eq!(state.questions_asked_current_topic, 2);
        assert_eq!(state.topics_completed, 0);
        assert!(state.counters_consistent());
    }

    #[tokio::test]
    async fn test_full_interview_keeps_counters_consistent() {
        let (engine, _, store) = engine_with(
            vec![
                topic("Backend", "Databases", "Indexing"),
                question("Q1"),
                evaluation(0.9, true, false), // strong → advance
                topic("Systems", "Concurrency", "Atomics"),
                question("Q2"),
                evaluation(0.5, false, true), // continue
                topic("Systems", "Concurrency", "Atomics"),
                question("Q3"),
                evaluation(0.2, false, true), // struggling at 2 → advance, budget spent
            ],
            InterviewLimits::default(),
        );

        let (mut state, _) = engine.start("full").await.unwrap();
        assert!(state.counters_consistent());
        for answer in ["a1", "a2", "a3"] {
            state = engine.resume("full", answer).await.unwrap();
            assert!(state.counters_consistent());
        }

        assert!(state.interview_complete);
        assert_eq!(state.topics_covered.len(), 2);
        assert_eq!(state.topics_covered[0].questions_asked, 1);
        assert_eq!(state.topics_covered[1].questions_asked, 2);
        assert_eq!(state.total_questions_asked, 3);
        assert_eq!(state.overall_performance.len(), 3);

        let checkpoint = store.load("full").await.unwrap().unwrap();
        assert!(checkpoint.next.is_none());
    }

    #[tokio::test]
    async fn test_resume_after_completion_is_rejected_and_state_frozen() {
        let (engine, _, store) = engine_with(
            vec![topic("a", "b", "c"), question("q"), evaluation(0.5, false, false)],
            InterviewLimits {
                max_topics: 1,
                max_questions_per_topic: 1,
            },
        );
        engine.start("done").await.unwrap();
        let finished = engine.resume("done", "answer").await.unwrap();

        let err = engine.resume("done", "another").await.unwrap_err();
        assert!(matches!(err, EngineError::InterviewComplete(_)));
        assert!(matches!(
            engine.retry("done").await.unwrap_err(),
            EngineError::InterviewComplete(_)
        ));
        assert_eq!(store.load("done").await.unwrap().unwrap().state, finished);
    }

    #[tokio::test]
    async fn test_unknown_thread() {
        let (engine, _, _) = engine_with(vec![], InterviewLimits::default());
        assert!(matches!(
            engine.resume("nope", "hi").await.unwrap_err(),
            EngineError::UnknownThread(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_evaluation_keeps_checkpoint_and_allows_retry() {
        let (engine, _, store) = engine_with(
            vec![
                topic("a", "b", "c"),
                question("Q1"),
                provider_down(),
                evaluation(0.5, false, true),
                topic("a", "b", "c"),
                question("Q2"),
            ],
            InterviewLimits::default(),
        );
        engine.start("t").await.unwrap();
        let before = store.load("t").await.unwrap().unwrap();

        let err = engine.resume("t", "my answer").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Gateway {
                node: Node::EvaluateResponse,
                ..
            }
        ));
        assert_eq!(store.load("t").await.unwrap().unwrap(), before);

        let state = engine.resume("t", "my answer").await.unwrap();
        let answers = state
            .transcript
            .iter()
            .filter(|t| t.content == "my answer")
            .count();
        assert_eq!(answers, 1);
        assert_eq!(latest_question(&state), Some("Q2"));
    }

    #[tokio::test]
    async fn test_failure_after_evaluation_needs_retry_not_resume() {
        let (engine, _, _) = engine_with(
            vec![
                topic("a", "b", "c"),
                question("Q1"),
                evaluation(0.5, false, true),
                provider_down(),
                topic("a", "b", "c"),
                question("Q2"),
            ],
            InterviewLimits::default(),
        );
        engine.start("t").await.unwrap();
        assert!(engine.resume("t", "answer").await.is_err());

        assert!(matches!(
            engine.resume("t", "answer again").await.unwrap_err(),
            EngineError::NotAwaitingResponse {
                pending: Node::SelectTopic,
                ..
            }
        ));

        let state = engine.retry("t").await.unwrap();
        assert_eq!(latest_question(&state), Some("Q2"));
        assert_eq!(state.overall_performance.len(), 1);

        // already suspended: retry is a no-op
        assert_eq!(engine.retry("t").await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip_matches_uninterrupted_run() {
        let script = || {
            vec![
                topic("Backend", "Databases", "Indexing"),
                question("Q1"),
                evaluation(0.4, false, true),
                topic("Backend", "Databases", "Indexing"),
                question("Q2"),
            ]
        };

        // uninterrupted
        let (engine, _, _) = engine_with(script(), InterviewLimits::default());
        engine.start("t").await.unwrap();
        let direct = engine.resume("t", "same answer").await.unwrap();

        // serialize mid-interview, reload into a new store and engine
        let (first, first_gateway, first_store) = engine_with(script(), InterviewLimits::default());
        first.start("t").await.unwrap();
        let raw = first_store.load("t").await.unwrap().unwrap().to_json().unwrap();

        let remaining: Vec<_> = script().into_iter().skip(2).collect();
        assert_eq!(first_gateway.remaining(), remaining.len());
        let (second, _, second_store) = engine_with(remaining, InterviewLimits::default());
        second_store
            .save(Checkpoint::from_json(&raw).unwrap())
            .await
            .unwrap();
        let restored = second.resume("t", "same answer").await.unwrap();

        assert_eq!(latest_question(&restored), latest_question(&direct));
        assert_eq!(latest_question(&restored), Some("Q2"));
        assert_eq!(restored.transcript, direct.transcript);
    }

    #[tokio::test]
    async fn test_concurrent_threads_do_not_interfere() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            topic("a", "b", "c"),
            question("Q-A"),
            topic("x", "y", "z"),
            question("Q-B"),
        ]));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let engine = InterviewEngine::new(
            gateway,
            store.clone(),
            Arc::new(Taxonomy::default()),
            InterviewLimits::default(),
        );

        engine.start("one").await.unwrap();
        engine.start("two").await.unwrap();

        let one = store.load("one").await.unwrap().unwrap();
        let two = store.load("two").await.unwrap().unwrap();
        assert_eq!(latest_question(&one.state), Some("Q-A"));
        assert_eq!(latest_question(&two.state), Some("Q-B"));
        assert_eq!(one.state.total_questions_asked, 1);
        assert_eq!(two.state.total_questions_asked, 1);
    }
}
