//! Prompt text and response parsing for the two classification calls.

use anyhow::Result;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::LensError;

pub const PROPOSE_SYSTEM: &str = "You classify time-tracking entries. \
You receive the labels a user attached to their tracked work and a target number of classes. \
Produce exactly that many short class names that together describe what the user worked on. \
Output class names only, without explanations or parenthesized details. \
Respond with a JSON object of the form {\"classes\": [\"Class A\", \"Class B\"]}.";

pub const MAPPING_SYSTEM: &str = "You classify time-tracking entries. \
You receive a list of classes and a list of labels. \
Assign every label to the single class that best matches its topic, using only the given classes; \
when nothing fits well, pick the closest class. \
Respond with a JSON object mapping each label verbatim to its class, \
for example {\"label one\": \"Class B\", \"label two\": \"Class A\"}.";

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn propose_user_prompt(labels: &[String], count: usize) -> String {
    format!(
        "Generate {count} classes for these labels:\n{}",
        bullet_list(labels)
    )
}

pub fn mapping_user_prompt(categories: &[String], labels: &[String]) -> String {
    format!(
        "Classes:\n{}\n\nLabels to classify:\n{}",
        bullet_list(categories),
        bullet_list(labels)
    )
}

/// Cut the outermost JSON object or array out of `text`, tolerating code fences
/// and chatter around it.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let open = text[start..].chars().next()?;
    let close = if open == '{' { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json(raw: &str, what: &str) -> Result<Value, LensError> {
    let body = extract_json(raw)
        .ok_or_else(|| LensError::oracle(format!("{what} response contains no JSON")))?;
    serde_json::from_str::<Value>(body)
        .map_err(|err| LensError::oracle(format!("{what} response is not valid JSON: {err}")))
}

/// Parse a category proposal: `{"classes": [...]}`, `{"categories": [...]}` or a bare
/// array. Names are trimmed, blanks and repeats dropped, and the list cut to `count`.
pub fn parse_categories(raw: &str, count: usize) -> Result<Vec<String>> {
    let json = parse_json(raw, "category proposal")?;
    let items = json
        .as_array()
        .or_else(|| json.get("classes").and_then(Value::as_array))
        .or_else(|| json.get("categories").and_then(Value::as_array))
        .ok_or_else(|| LensError::oracle("category proposal has no `classes` array"))?;

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for item in items {
        let Some(name) = item.as_str().map(str::trim) else {
            continue;
        };
        if name.is_empty() || !seen.insert(name.to_lowercase()) {
            continue;
        }
        out.push(name.to_string());
        if out.len() >= count {
            break;
        }
    }

    if out.is_empty() {
        return Err(LensError::oracle("category proposal is empty").into());
    }
    Ok(out)
}

/// Parse a label→category object. Non-string values are skipped; totality is
/// enforced by the caller.
pub fn parse_mapping(raw: &str) -> Result<BTreeMap<String, String>> {
    let json = parse_json(raw, "label mapping")?;
    let object = json
        .as_object()
        .ok_or_else(|| LensError::oracle("label mapping is not a JSON object"))?;
    let mapping = object
        .iter()
        .filter_map(|(label, category)| {
            category
                .as_str()
                .map(|c| (label.trim().to_string(), c.trim().to_string()))
        })
        .collect();
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::{extract_json, mapping_user_prompt, parse_categories, parse_mapping};
    use crate::error::LensError;

    #[test]
    fn categories_accept_classes_object_and_trim() {
        let got = parse_categories(r#"{"classes": [" Dev ", "Meetings", "dev", ""]}"#, 3)
            .expect("parse");
        assert_eq!(got, vec!["Dev".to_string(), "Meetings".to_string()]);
    }

    #[test]
    fn categories_are_truncated_to_requested_count() {
        let got = parse_categories(r#"["A", "B", "C", "D"]"#, 2).expect("parse");
        assert_eq!(got, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn fenced_json_is_extracted() {
        let raw = "Here you go:\n```json\n{\"classes\": [\"Ops\"]}\n```";
        assert_eq!(extract_json(raw), Some("{\"classes\": [\"Ops\"]}"));
        assert_eq!(parse_categories(raw, 3).expect("parse"), vec!["Ops".to_string()]);
    }

    #[test]
    fn malformed_proposal_is_oracle_error() {
        for raw in ["no json at all", "{\"topics\": 3}", "{\"classes\": []}", "{broken"] {
            let err = parse_categories(raw, 3).expect_err("should fail");
            assert!(
                matches!(err.downcast_ref::<LensError>(), Some(LensError::Oracle(_))),
                "{raw}: {err:#}"
            );
        }
    }

    #[test]
    fn mapping_skips_non_string_values() {
        let got = parse_mapping(r#"{"write docs": "Docs", "standup": 3}"#).expect("parse");
        assert_eq!(got.len(), 1);
        assert_eq!(got.get("write docs").map(String::as_str), Some("Docs"));
    }

    #[test]
    fn mapping_prompt_lists_both_sides() {
        let prompt = mapping_user_prompt(&["Dev".to_string()], &["fix bug".to_string()]);
        assert!(prompt.contains("Classes:\n- Dev"));
        assert!(prompt.contains("Labels to classify:\n- fix bug"));
    }
}
