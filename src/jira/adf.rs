//! Atlassian Document Format (ADF) to text conversion
//!
//! Jira Cloud returns rich-text fields (description, text custom fields) as
//! ADF JSON trees. The form fields only take plain text, so the tree is
//! flattened into Markdown-flavoured text: headings keep their `#` markers
//! and lists keep their bullets, which also lets the acceptance-criteria
//! extraction find section boundaries.

use chrono::{TimeZone, Utc};
use serde_json::Value;

/// True when the value looks like an ADF document root
pub fn is_adf_document(value: &Value) -> bool {
    value["type"].as_str() == Some("doc") && value["content"].is_array()
}

/// Flatten an ADF document into text
pub fn to_plain_text(doc: &Value) -> String {
    let lines = render_blocks(children(doc), true);

    // Collapse runs of blank lines left by empty paragraphs
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let line = line.trim_end().to_string();
        if line.is_empty() && out.last().map_or(true, |l: &String| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().map_or(false, |l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

fn children(node: &Value) -> &[Value] {
    node["content"].as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Render a sequence of block nodes, optionally separated by blank lines
fn render_blocks(nodes: &[Value], separate: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if separate && i > 0 {
            lines.push(String::new());
        }
        lines.extend(render_block(node));
    }
    lines
}

fn render_block(node: &Value) -> Vec<String> {
    match node["type"].as_str().unwrap_or("") {
        "paragraph" => split_lines(&render_inline(children(node))),

        "heading" => {
            let level = node["attrs"]["level"].as_u64().unwrap_or(1).clamp(1, 6) as usize;
            vec![format!(
                "{} {}",
                "#".repeat(level),
                render_inline(children(node)).trim()
            )]
        }

        "bulletList" => children(node)
            .iter()
            .flat_map(|item| prefix_item(render_list_item(item), "- "))
            .collect(),

        "orderedList" => {
            let start = node["attrs"]["order"].as_u64().unwrap_or(1);
            children(node)
                .iter()
                .enumerate()
                .flat_map(|(i, item)| {
                    prefix_item(render_list_item(item), &format!("{}. ", start + i as u64))
                })
                .collect()
        }

        "taskList" => children(node)
            .iter()
            .flat_map(|item| {
                let marker = if item["attrs"]["state"].as_str() == Some("DONE") {
                    "- [x] "
                } else {
                    "- [ ] "
                };
                prefix_item(render_list_item(item), marker)
            })
            .collect(),

        "codeBlock" => {
            let mut lines = vec!["```".to_string()];
            lines.extend(split_lines(&render_inline(children(node))));
            lines.push("```".to_string());
            lines
        }

        "blockquote" => render_blocks(children(node), false)
            .into_iter()
            .map(|l| format!("> {}", l))
            .collect(),

        "rule" => vec!["---".to_string()],

        "table" => children(node)
            .iter()
            .map(|row| {
                children(row)
                    .iter()
                    .map(|cell| render_blocks(children(cell), false).join(" "))
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect(),

        "mediaSingle" | "mediaGroup" | "media" => Vec::new(),

        // Inline node at block level (seen in some custom fields)
        "text" | "hardBreak" | "mention" | "emoji" | "inlineCard" | "date" | "status" => {
            split_lines(&render_inline(std::slice::from_ref(node)))
        }

        // panel, expand, layoutSection, doc, ... are plain containers
        _ => render_blocks(children(node), false),
    }
}

/// List items hold blocks; task items hold inline content directly
fn render_list_item(item: &Value) -> Vec<String> {
    let content = children(item);
    let is_inline = content
        .first()
        .and_then(|n| n["type"].as_str())
        .map_or(false, |t| matches!(t, "text" | "hardBreak" | "mention" | "emoji"));

    if is_inline {
        split_lines(&render_inline(content))
    } else {
        render_blocks(content, false)
    }
}

/// Prefix the first line with the marker and indent continuation lines
fn prefix_item(lines: Vec<String>, marker: &str) -> Vec<String> {
    let indent = " ".repeat(marker.len());
    if lines.is_empty() {
        return vec![marker.trim_end().to_string()];
    }
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                format!("{}{}", marker, line)
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect()
}

fn render_inline(nodes: &[Value]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node["type"].as_str().unwrap_or("") {
            "text" => out.push_str(node["text"].as_str().unwrap_or("")),
            "hardBreak" => out.push('\n'),
            "mention" | "status" => out.push_str(node["attrs"]["text"].as_str().unwrap_or("")),
            "emoji" => {
                let attrs = &node["attrs"];
                out.push_str(
                    attrs["text"]
                        .as_str()
                        .or_else(|| attrs["shortName"].as_str())
                        .unwrap_or(""),
                );
            }
            "inlineCard" => out.push_str(node["attrs"]["url"].as_str().unwrap_or("")),
            "date" => out.push_str(&render_date(&node["attrs"]["timestamp"])),
            _ => out.push_str(&render_inline(children(node))),
        }
    }
    out
}

/// ADF dates are epoch milliseconds, as a string or a number
fn render_date(timestamp: &Value) -> String {
    let millis = timestamp
        .as_i64()
        .or_else(|| timestamp.as_str().and_then(|s| s.parse().ok()));

    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(|s| s.to_string()).collect()
}
