// All LLM prompt constants for the interview workflow nodes.
// Output-shape schemas are appended by the gateway (llm_client::shapes).

/// System prompt for topic selection.
pub const TOPIC_SELECTION_SYSTEM: &str = "You are an expert technical interviewer. \
    Analyze the provided skills taxonomy and conversation history to select the most \
    appropriate topic for the next question.

Consider:
1. What topics have already been covered
2. The candidate's demonstrated skill level so far
3. Logical progression of topics
4. Areas that need deeper exploration

Select a domain, subdomain, and specific skill that would provide the most valuable assessment data.";

/// Replace `{taxonomy_json}`, `{topics_covered_json}`, `{total_questions}`, `{topics_completed}`.
pub const TOPIC_SELECTION_PROMPT_TEMPLATE: &str = r#"Skills Taxonomy:
{taxonomy_json}

Topics Already Covered:
{topics_covered_json}

Total Questions Asked: {total_questions}
Topics Completed: {topics_completed}

Select the next topic to explore."#;

/// System prompt for question generation.
pub const QUESTION_SYSTEM: &str = "You are an expert technical interviewer. \
    Generate a thoughtful, targeted question based on the selected topic and the \
    candidate's conversation history.

The question should:
1. Test both theoretical knowledge and practical application
2. Be appropriate for the candidate's demonstrated skill level
3. Allow for meaningful follow-up
4. Be clear and unambiguous
5. Encourage detailed responses";

/// Replace `{domain}`, `{subdomain}`, `{skill}`, `{questions_on_topic}`, `{conversation_context}`.
pub const QUESTION_PROMPT_TEMPLATE: &str = r#"Current Topic Focus:
- Domain: {domain}
- Subdomain: {subdomain}
- Skill: {skill}

Questions asked on this topic: {questions_on_topic}

Recent conversation context:
{conversation_context}

Generate an appropriate interview question."#;

/// Replace `{domain}`, `{subdomain}`, `{skill}`, `{question_number}`.
pub const EVALUATION_SYSTEM_TEMPLATE: &str = r#"You are an expert technical interviewer evaluating a candidate's response. Analyze the response thoroughly and provide detailed feedback.

Current Assessment Context:
- Domain: {domain}
- Subdomain: {subdomain}
- Skill: {skill}
- Question Number on this topic: {question_number}

Evaluate the response for:
1. Technical accuracy and depth
2. Practical understanding
3. Communication clarity
4. Areas of strength and improvement
5. Whether additional questions on this topic would be valuable

Provide a quality score between 0-1 and determine if we should continue with this topic or move on."#;

/// Replace `{question}`, `{response}`.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"Question Asked: {question}

Candidate's Response: {response}

Please evaluate this response."#;

/// Fills `{name}` placeholders in one left-to-right pass. Substituted values are never
/// rescanned, and `{...}` sequences without a matching key are kept as written.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (close, *value))
        });
        match hit {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_does_not_rescan_substituted_text() {
        let prompt = render(
            EVALUATION_PROMPT_TEMPLATE,
            &[
                ("question", "What does a literal {response} token do?"),
                ("response", "It is just text."),
            ],
        );
        assert!(prompt.starts_with("Question Asked: What does a literal {response} token do?"));
        assert!(prompt.contains("Candidate's Response: It is just text."));
        assert_eq!(prompt.matches("It is just text.").count(), 1);
    }

    #[test]
    fn test_render_keeps_unknown_and_unbalanced_braces() {
        assert_eq!(
            render("{a} {unknown} {a", &[("a", "x")]),
            "x {unknown} {a"
        );
        assert_eq!(render("no placeholders", &[]), "no placeholders");
    }
}
