//! Jira issue to story converter
//!
//! Reshapes raw Jira issue JSON into the flat story objects the UI consumes.

use super::adf;
use super::{StoryDetail, StorySummary};
use regex::Regex;
use serde_json::Value;

/// Convert a search hit into a dropdown row. Returns `None` when the issue has no key.
pub fn issue_to_summary(issue: &Value) -> Option<StorySummary> {
    let key = non_empty(issue["key"].as_str())?;
    let fields = &issue["fields"];

    Some(StorySummary {
        key,
        title: fields["summary"].as_str().unwrap_or("").to_string(),
        status: non_empty(fields["status"]["name"].as_str()),
        issue_type: non_empty(fields["issuetype"]["name"].as_str()),
        priority: non_empty(fields["priority"]["name"].as_str()),
        assignee: non_empty(fields["assignee"]["displayName"].as_str()),
        updated: non_empty(fields["updated"].as_str()),
    })
}

/// Convert a full issue (fetched with `expand=renderedFields,names`) into a story
pub fn issue_to_detail(issue: &Value, base_url: &str) -> Option<StoryDetail> {
    let key = non_empty(issue["key"].as_str())?;
    let fields = &issue["fields"];

    let description = field_text(&fields["description"]);
    let description_html = non_empty(issue["renderedFields"]["description"].as_str());

    let acceptance_criteria = acceptance_criteria_from_fields(issue).or_else(|| {
        description
            .as_deref()
            .and_then(extract_acceptance_criteria)
    });

    Some(StoryDetail {
        url: format!("{}/browse/{}", base_url, key),
        key,
        title: fields["summary"].as_str().unwrap_or("").to_string(),
        status: non_empty(fields["status"]["name"].as_str()),
        issue_type: non_empty(fields["issuetype"]["name"].as_str()),
        description,
        description_html,
        acceptance_criteria,
    })
}

/// Text content of a rich-text or plain field
///
/// Handles plain strings (Jira Server / API v2), ADF documents (Jira Cloud)
/// and lists of strings (multi-value text fields).
pub fn field_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(_) if adf::is_adf_document(value) => adf::to_plain_text(value),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    non_empty(Some(text.trim()))
}

/// Look for a custom field whose display name mentions acceptance criteria
///
/// Field ids differ per site (`customfield_10034`, ...), so the `names`
/// expansion is used to map display names back to ids.
fn acceptance_criteria_from_fields(issue: &Value) -> Option<String> {
    let names = issue["names"].as_object()?;

    let mut candidates: Vec<&String> = names
        .iter()
        .filter(|(_, name)| {
            name.as_str()
                .map_or(false, |n| n.to_lowercase().contains("acceptance criteria"))
        })
        .map(|(id, _)| id)
        .collect();
    // Stable choice when a site has several matching fields
    candidates.sort();

    candidates
        .into_iter()
        .find_map(|id| field_text(&issue["fields"][id.as_str()]))
}

/// Extract acceptance criteria from a description
///
/// Looks for a section header in any of the common spellings:
/// - ## Acceptance Criteria
/// - h3. Acceptance Criteria (wiki markup)
/// - **Acceptance Criteria:**
/// - Acceptance Criteria: inline text
///
/// The section runs until the next heading or the end of the text.
pub fn extract_acceptance_criteria(text: &str) -> Option<String> {
    let header = Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]*|h[1-6]\.[ \t]*)?(?:\*\*|\*|__)?acceptance[ \t]+criteria[ \t]*:?[ \t]*(?:\*\*|\*|__)?[ \t]*:?[ \t]*(.*)$",
    )
    .ok()?;
    let captures = header.captures(text)?;
    let header_match = captures.get(0)?;

    let mut section: Vec<&str> = Vec::new();
    if let Some(inline) = captures.get(1) {
        let inline = inline.as_str().trim();
        if !inline.is_empty() {
            section.push(inline);
        }
    }

    for line in text[header_match.end()..].lines().skip(1) {
        if is_heading(line) {
            break;
        }
        section.push(line);
    }

    let criteria = section.join("\n");
    non_empty(Some(criteria.trim()))
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        return true;
    }
    if let Ok(wiki) = Regex::new(r"^h[1-6]\.\s") {
        if wiki.is_match(trimmed) {
            return true;
        }
    }
    // A line that is only bold text acts as a heading in many templates
    trimmed.len() > 4
        && trimmed.starts_with("**")
        && (trimmed.ends_with("**") || trimmed.ends_with("**:"))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
