// Adaptive interview workflow: topic selection → question → (await candidate) →
// evaluation → transition policy, with a checkpoint after every step.
// All LLM calls go through llm_client::LanguageModelGateway.

pub mod checkpoint;
pub mod engine;
pub mod handlers;
pub mod nodes;
pub mod policy;
pub mod progress;
pub mod prompts;

#[cfg(test)]
pub(crate) mod testing;
