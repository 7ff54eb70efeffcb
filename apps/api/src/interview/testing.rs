//! Deterministic gateway fake for workflow tests. Replays a fixed script of results
//! and records every request it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm_client::shapes::{
    OutputShape, Question, ResponseEvaluation, StructuredOutput, TopicSelection,
};
use crate::llm_client::{LanguageModelGateway, LlmError, PromptMessage};

#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<StructuredOutput, LlmError>>>,
    requests: Mutex<Vec<(OutputShape, Vec<PromptMessage>)>>,
}

impl ScriptedGateway {
    pub fn new(script: Vec<Result<StructuredOutput, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(OutputShape, Vec<PromptMessage>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModelGateway for ScriptedGateway {
    async fn invoke(
        &self,
        messages: &[PromptMessage],
        shape: OutputShape,
    ) -> Result<StructuredOutput, LlmError> {
        self.requests
            .lock()
            .unwrap()
            .push((shape, messages.to_vec()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}

pub fn topic(domain: &str, subdomain: &str, skill: &str) -> Result<StructuredOutput, LlmError> {
    Ok(StructuredOutput::TopicSelection(TopicSelection {
        selected_topic: domain.to_string(),
        selected_subdomain: subdomain.to_string(),
        selected_skill: skill.to_string(),
        reasoning: format!("{skill} has not been assessed yet"),
    }))
}

pub fn question(text: &str) -> Result<StructuredOutput, LlmError> {
    Ok(StructuredOutput::Question(Question {
        question: text.to_string(),
        topic_focus: "fundamentals".to_string(),
        difficulty_level: "Intermediate".to_string(),
    }))
}

pub fn evaluation(score: f64, knows: bool, cont: bool) -> Result<StructuredOutput, LlmError> {
    Ok(StructuredOutput::Evaluation(ResponseEvaluation {
        quality_score: score,
        demonstrates_knowledge: knows,
        areas_of_strength: vec!["clear explanation".to_string()],
        areas_for_improvement: vec!["edge cases".to_string()],
        should_continue_topic: cont,
        reasoning: "scripted".to_string(),
    }))
}

pub fn provider_down() -> Result<StructuredOutput, LlmError> {
    Err(LlmError::Api {
        status: 503,
        message: "overloaded".to_string(),
    })
}
