//! Parsing of model output into test cases
//!
//! Models rarely follow a JSON contract perfectly: output may be wrapped in
//! Markdown fences, use snake_case keys, or return steps as one numbered
//! string. Everything is normalized here so the UI always receives the same
//! shape with unique ids.

use super::{GenerationError, TestCase};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Parse raw model output into normalized test cases
pub fn parse_cases(content: &str) -> Result<Vec<TestCase>, GenerationError> {
    let json = extract_json(content);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| GenerationError::InvalidOutput(format!("not valid JSON: {}", e)))?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("cases")
            .or_else(|| obj.get("testCases"))
            .or_else(|| obj.get("test_cases"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                GenerationError::InvalidOutput("missing \"cases\" array".to_string())
            })?,
        _ => {
            return Err(GenerationError::InvalidOutput(
                "expected a JSON object or array".to_string(),
            ))
        }
    };

    let mut cases: Vec<TestCase> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| case_from_value(item, index))
        .collect();

    if cases.is_empty() {
        return Err(GenerationError::InvalidOutput(
            "no test cases in model output".to_string(),
        ));
    }

    dedupe_ids(&mut cases);
    Ok(cases)
}

/// Strip Markdown code fences and surrounding prose
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();

    // First fenced block anywhere, ignoring text after the closing fence
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // Drop the info string ("json") on the opening fence
        if let Some((_, body)) = after_fence.split_once('\n') {
            let body = match body.find("```") {
                Some(end) => &body[..end],
                None => body,
            };
            return body.trim();
        }
    }

    // Outermost array or object, whichever opens first
    let open = trimmed.find(|c: char| c == '[' || c == '{');
    let Some(start) = open else {
        return trimmed;
    };
    let close = if trimmed[start..].starts_with('[') { ']' } else { '}' };
    match trimmed.rfind(close) {
        Some(end) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn case_from_value(item: &Value, index: usize) -> Option<TestCase> {
    let obj = item.as_object()?;

    let title = string_field(obj, &["title", "name", "summary"])?;

    let id = string_field(obj, &["id", "testCaseId", "test_case_id"])
        .unwrap_or_else(|| format!("TC-{:03}", index + 1));

    let category = canonical_category(
        &string_field(obj, &["category", "type"]).unwrap_or_default(),
    );

    let expected_result =
        string_field(obj, &["expectedResult", "expected_result", "expected"]).unwrap_or_default();

    let steps = obj
        .get("steps")
        .map(steps_from_value)
        .unwrap_or_default();

    let test_data = ["testData", "test_data", "data"]
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(test_data_from_value);

    Some(TestCase {
        id,
        title,
        category,
        expected_result,
        steps,
        test_data,
    })
}

/// First non-blank string (or number) among the given keys
fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn steps_from_value(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|step| match step {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => string_field(obj, &["description", "step", "action"]),
                _ => None,
            })
            .collect(),
        Value::String(s) => s.lines().map(|l| l.to_string()).collect(),
        _ => Vec::new(),
    };

    let numbering = Regex::new(r"(?i)^\s*(?:(?:step\s*)?\d+[.):]|[-*•])\s+").ok();

    raw.into_iter()
        .map(|step| match &numbering {
            Some(re) => re.replace(&step, "").trim().to_string(),
            None => step.trim().to_string(),
        })
        .filter(|step| !step.is_empty())
        .collect()
}

fn test_data_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(obj) if !obj.is_empty() => Some(value.to_string()),
        Value::Array(items) if !items.is_empty() => Some(value.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map free-form category labels onto the table's categories
pub fn canonical_category(raw: &str) -> String {
    let key: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();

    let canonical = match key.as_str() {
        "" => "General",
        "positive" | "happypath" | "functional" => "Positive",
        "negative" | "error" | "errorhandling" => "Negative",
        "edge" | "edgecase" | "boundary" | "boundaryvalue" => "Edge",
        "authorization" | "auth" | "security" | "permission" | "permissions" => "Authorization",
        "nonfunctional" | "performance" | "nfr" | "usability" | "accessibility" => {
            "Non-Functional"
        }
        _ => return raw.trim().to_string(),
    };
    canonical.to_string()
}

/// Give repeated ids a numeric suffix so every id is unique
fn dedupe_ids(cases: &mut [TestCase]) {
    let mut seen: HashSet<String> = HashSet::new();
    for case in cases.iter_mut() {
        if seen.insert(case.id.clone()) {
            continue;
        }
        let mut n = 2;
        let mut candidate = format!("{}-{}", case.id, n);
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{}", case.id, n);
        }
        seen.insert(candidate.clone());
        case.id = candidate;
    }
}
