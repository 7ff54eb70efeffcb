//! Structured output shapes the gateway can be asked for, and the decode step that
//! turns raw model text into one of them.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// The three request shapes used by the interview workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    TopicSelection,
    Question,
    Evaluation,
}

impl OutputShape {
    pub fn name(&self) -> &'static str {
        match self {
            OutputShape::TopicSelection => "topic_selection",
            OutputShape::Question => "question",
            OutputShape::Evaluation => "evaluation",
        }
    }

    /// JSON schema instruction appended to the system prompt for this shape.
    pub fn schema_hint(&self) -> &'static str {
        match self {
            OutputShape::TopicSelection => TOPIC_SELECTION_SCHEMA,
            OutputShape::Question => QUESTION_SCHEMA,
            OutputShape::Evaluation => EVALUATION_SCHEMA,
        }
    }
}

const TOPIC_SELECTION_SCHEMA: &str = r#"Return a JSON object with this EXACT schema (no extra fields):
{
  "selected_topic": "the domain selected for questioning",
  "selected_subdomain": "the specific subdomain to focus on",
  "selected_skill": "the specific skill to assess",
  "reasoning": "why this topic was selected for the current context"
}"#;

const QUESTION_SCHEMA: &str = r#"Return a JSON object with this EXACT schema (no extra fields):
{
  "question": "the interview question to ask",
  "topic_focus": "what specific aspect this question is testing",
  "difficulty_level": "Beginner | Intermediate | Advanced"
}"#;

const EVALUATION_SCHEMA: &str = r#"Return a JSON object with this EXACT schema (no extra fields):
{
  "quality_score": 0.0,
  "demonstrates_knowledge": false,
  "areas_of_strength": ["what the candidate did well"],
  "areas_for_improvement": ["areas that could be better"],
  "should_continue_topic": false,
  "reasoning": "detailed reasoning for the evaluation"
}
quality_score is a number between 0 and 1."#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSelection {
    pub selected_topic: String,
    pub selected_subdomain: String,
    pub selected_skill: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub topic_focus: String,
    pub difficulty_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvaluation {
    pub quality_score: f64,
    pub demonstrates_knowledge: bool,
    pub areas_of_strength: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub should_continue_topic: bool,
    pub reasoning: String,
}

/// A fully decoded gateway result. Never partially filled.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredOutput {
    TopicSelection(TopicSelection),
    Question(Question),
    Evaluation(ResponseEvaluation),
}

impl StructuredOutput {
    pub fn shape(&self) -> OutputShape {
        match self {
            StructuredOutput::TopicSelection(_) => OutputShape::TopicSelection,
            StructuredOutput::Question(_) => OutputShape::Question,
            StructuredOutput::Evaluation(_) => OutputShape::Evaluation,
        }
    }

    pub fn into_topic_selection(self) -> Result<TopicSelection, ShapeMismatch> {
        match self {
            StructuredOutput::TopicSelection(v) => Ok(v),
            other => Err(ShapeMismatch::wrong_variant(OutputShape::TopicSelection, &other)),
        }
    }

    pub fn into_question(self) -> Result<Question, ShapeMismatch> {
        match self {
            StructuredOutput::Question(v) => Ok(v),
            other => Err(ShapeMismatch::wrong_variant(OutputShape::Question, &other)),
        }
    }

    pub fn into_evaluation(self) -> Result<ResponseEvaluation, ShapeMismatch> {
        match self {
            StructuredOutput::Evaluation(v) => Ok(v),
            other => Err(ShapeMismatch::wrong_variant(OutputShape::Evaluation, &other)),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("model output did not match the '{}' shape: {detail}", .expected.name())]
pub struct ShapeMismatch {
    pub expected: OutputShape,
    pub detail: String,
}

impl ShapeMismatch {
    fn wrong_variant(expected: OutputShape, got: &StructuredOutput) -> Self {
        Self {
            expected,
            detail: format!("gateway returned '{}'", got.shape().name()),
        }
    }
}

/// Decodes raw model text into the requested shape.
///
/// Markdown code fences around the JSON are tolerated. Missing fields or wrong
/// types yield `ShapeMismatch` rather than a partially filled value.
pub fn decode(shape: OutputShape, text: &str) -> Result<StructuredOutput, ShapeMismatch> {
    let text = strip_json_fences(text);
    match shape {
        OutputShape::TopicSelection => parse(shape, text).map(StructuredOutput::TopicSelection),
        OutputShape::Question => parse(shape, text).map(StructuredOutput::Question),
        OutputShape::Evaluation => parse(shape, text).map(StructuredOutput::Evaluation),
    }
}

fn parse<T: DeserializeOwned>(shape: OutputShape, text: &str) -> Result<T, ShapeMismatch> {
    serde_json::from_str(text).map_err(|e| ShapeMismatch {
        expected: shape,
        detail: e.to_string(),
    })
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_decode_topic_selection_inside_fences() {
        let text = r#"```json
        {
            "selected_topic": "Backend Engineering",
            "selected_subdomain": "Databases",
            "selected_skill": "Indexing",
            "reasoning": "Not covered yet"
        }
        ```"#;
        let selection = decode(OutputShape::TopicSelection, text)
            .unwrap()
            .into_topic_selection()
            .unwrap();
        assert_eq!(selection.selected_skill, "Indexing");
    }

    #[test]
    fn test_decode_evaluation_keeps_out_of_range_score() {
        let text = r#"{
            "quality_score": 1.4,
            "demonstrates_knowledge": true,
            "areas_of_strength": [],
            "areas_for_improvement": ["brevity"],
            "should_continue_topic": false,
            "reasoning": "over-delivered"
        }"#;
        let evaluation = decode(OutputShape::Evaluation, text)
            .unwrap()
            .into_evaluation()
            .unwrap();
        assert!((evaluation.quality_score - 1.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_partial_question_is_a_mismatch() {
        let err = decode(OutputShape::Question, r#"{"question": "What is Raft?"}"#).unwrap_err();
        assert_eq!(err.expected, OutputShape::Question);
        assert!(err.detail.contains("topic_focus"));
    }

    #[test]
    fn test_decode_prose_is_a_mismatch() {
        assert!(decode(OutputShape::Evaluation, "The answer was great!").is_err());
    }

    #[test]
    fn test_wrong_variant_conversion_reports_both_shapes() {
        let output = StructuredOutput::Question(Question {
            question: "q".into(),
            topic_focus: "f".into(),
            difficulty_level: "Beginner".into(),
        });
        let err = output.into_evaluation().unwrap_err();
        assert_eq!(err.expected, OutputShape::Evaluation);
        assert!(err.to_string().contains("question"));
    }
}
