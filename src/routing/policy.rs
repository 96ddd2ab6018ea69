//! Department routing decisions built from untrusted advisor output.
//!
//! The advisor may time out, answer with prose around the JSON, or return a
//! shape that fails validation. Every one of those paths lands on the same
//! deterministic fallback: the first candidate in the caller-supplied list,
//! confidence 0.5, normal priority, no tags. A routing failure never fails
//! the enclosing ticket-creation flow.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RoutingAdvisor;
use crate::shared::enums::TicketPriority;
use crate::shared::error::ApiError;
use crate::shared::models::Department;

const FALLBACK_CONFIDENCE: f64 = 0.5;
const FALLBACK_REASONING: &str =
    "AI analysis failed; the ticket was routed to the default department.";

/// Candidate department as supplied by the caller. Only the fields the
/// prompt and the name match need.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingCandidate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<&Department> for RoutingCandidate {
    fn from(department: &Department) -> Self {
        Self {
            id: department.id,
            name: department.name.clone(),
            description: department.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingSuggestion {
    pub department_id: Uuid,
    pub department_name: String,
    pub confidence_score: f64,
    pub reasoning: String,
    pub suggested_priority: TicketPriority,
    pub suggested_tags: Vec<String>,
}

/// Advisor reply after JSON extraction, before validation. Unknown keys are
/// tolerated; missing required keys or wrong types reject the whole reply.
#[derive(Debug, Deserialize)]
struct RawSuggestion {
    department_name: String,
    confidence_score: f64,
    reasoning: Option<String>,
    suggested_priority: String,
    suggested_tags: Option<Vec<String>>,
}

fn build_prompt(title: &str, description: &str, candidates: &[RoutingCandidate]) -> String {
    let mut department_lines = String::new();
    for candidate in candidates {
        department_lines.push_str(&format!(
            "- {}: {}\n",
            candidate.name,
            candidate.description.as_deref().unwrap_or("No description")
        ));
    }

    format!(
        "You are a support desk routing assistant. Pick the department best \
         suited to handle the ticket below.\n\n\
         Departments:\n{department_lines}\n\
         Ticket title: {title}\n\
         Ticket description: {description}\n\n\
         Reply with a single JSON object and nothing else, in exactly this shape:\n\
         {{\"department_name\": \"...\", \"confidence_score\": 0.0, \
         \"reasoning\": \"...\", \"suggested_priority\": \
         \"low|normal|high|urgent\", \"suggested_tags\": [\"...\"]}}"
    )
}

/// First balanced `{...}` region of the text, honoring string literals and
/// escapes so braces inside JSON strings do not end the scan early.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strict parse of the advisor reply. Returns None for anything that is not
/// exactly the expected shape: missing keys, a confidence outside [0, 1], an
/// unknown priority token, or non-string tags.
fn parse_suggestion(reply: &str) -> Option<(RawSuggestion, TicketPriority)> {
    let json = extract_json_object(reply)?;
    let raw: RawSuggestion = serde_json::from_str(json).ok()?;

    if raw.department_name.trim().is_empty() {
        return None;
    }
    if !raw.confidence_score.is_finite() || !(0.0..=1.0).contains(&raw.confidence_score) {
        return None;
    }
    let priority = raw.suggested_priority.parse::<TicketPriority>().ok()?;

    Some((raw, priority))
}

fn fallback(first: &RoutingCandidate) -> RoutingSuggestion {
    RoutingSuggestion {
        department_id: first.id,
        department_name: first.name.clone(),
        confidence_score: FALLBACK_CONFIDENCE,
        reasoning: FALLBACK_REASONING.to_string(),
        suggested_priority: TicketPriority::Normal,
        suggested_tags: Vec::new(),
    }
}

/// Ask the advisor for a routing suggestion. The result always names a
/// member of `candidates`; the only error is an empty candidate list. The
/// suggestion is advisory: callers decide whether to apply it.
pub async fn suggest_routing(
    advisor: &dyn RoutingAdvisor,
    title: &str,
    description: &str,
    candidates: &[RoutingCandidate],
) -> Result<RoutingSuggestion, ApiError> {
    let first = candidates
        .first()
        .ok_or_else(|| ApiError::InvalidInput("at least one department is required".to_string()))?;

    let prompt = build_prompt(title, description, candidates);

    let reply = match advisor.generate(&prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("routing advisor call failed: {e}");
            return Ok(fallback(first));
        }
    };

    let Some((raw, priority)) = parse_suggestion(&reply) else {
        tracing::warn!("routing advisor reply failed validation");
        return Ok(fallback(first));
    };

    let Some(matched) = candidates
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(raw.department_name.trim()))
    else {
        tracing::warn!(
            "routing advisor suggested unknown department: {}",
            raw.department_name
        );
        return Ok(fallback(first));
    };

    Ok(RoutingSuggestion {
        department_id: matched.id,
        department_name: matched.name.clone(),
        confidence_score: raw.confidence_score,
        reasoning: raw.reasoning.unwrap_or_default(),
        suggested_priority: priority,
        suggested_tags: raw.suggested_tags.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let text = "Sure! Here is my answer:\n```json\n{\"a\": 1}\n```\nHope that helps.";
        assert_eq!(extract_json_object(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn extracts_nested_objects_whole() {
        let text = "x {\"a\": {\"b\": 2}} y {\"c\": 3}";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn braces_inside_strings_do_not_close_the_region() {
        let text = "{\"a\": \"curly } brace\", \"b\": \"esc\\\"{\"}";
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn unbalanced_or_missing_object_yields_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{\"a\": 1"), None);
    }

    #[test]
    fn valid_reply_parses() {
        let reply = r#"{"department_name": "IT", "confidence_score": 0.92,
            "reasoning": "hardware issue", "suggested_priority": "high",
            "suggested_tags": ["hardware"]}"#;
        let (raw, priority) = parse_suggestion(reply).unwrap();
        assert_eq!(raw.department_name, "IT");
        assert_eq!(priority, TicketPriority::High);
        assert_eq!(raw.suggested_tags.unwrap(), vec!["hardware"]);
    }

    #[test]
    fn reasoning_and_tags_are_optional() {
        let reply =
            r#"{"department_name": "IT", "confidence_score": 1.0, "suggested_priority": "low"}"#;
        let (raw, _) = parse_suggestion(reply).unwrap();
        assert!(raw.reasoning.is_none());
        assert!(raw.suggested_tags.is_none());
    }

    #[test]
    fn rejects_missing_keys_and_bad_values() {
        // missing department_name
        assert!(parse_suggestion(r#"{"confidence_score": 0.5, "suggested_priority": "low"}"#)
            .is_none());
        // confidence out of range
        assert!(parse_suggestion(
            r#"{"department_name": "IT", "confidence_score": 1.5, "suggested_priority": "low"}"#
        )
        .is_none());
        // unknown priority token
        assert!(parse_suggestion(
            r#"{"department_name": "IT", "confidence_score": 0.5, "suggested_priority": "critical"}"#
        )
        .is_none());
        // tags must be strings
        assert!(parse_suggestion(
            r#"{"department_name": "IT", "confidence_score": 0.5,
                "suggested_priority": "low", "suggested_tags": [1, 2]}"#
        )
        .is_none());
        // blank name
        assert!(parse_suggestion(
            r#"{"department_name": "  ", "confidence_score": 0.5, "suggested_priority": "low"}"#
        )
        .is_none());
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let reply = r#"{"department_name": "IT", "confidence_score": 0.5,
            "suggested_priority": "normal", "model_version": "v2"}"#;
        assert!(parse_suggestion(reply).is_some());
    }

    #[test]
    fn prompt_lists_every_candidate() {
        let candidates = vec![
            RoutingCandidate {
                id: Uuid::new_v4(),
                name: "IT".to_string(),
                description: Some("Hardware and software".to_string()),
            },
            RoutingCandidate {
                id: Uuid::new_v4(),
                name: "HR".to_string(),
                description: None,
            },
        ];
        let prompt = build_prompt("Printer broken", "It makes noises", &candidates);
        assert!(prompt.contains("- IT: Hardware and software"));
        assert!(prompt.contains("- HR: No description"));
        assert!(prompt.contains("Printer broken"));
    }
}
