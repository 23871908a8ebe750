//! Deterministic template rendering.
//!
//! Templates are plain text with `{{dotted.path}}` placeholders. Rendering
//! resolves each placeholder into a JSON data object and formats arrays by
//! field-name convention:
//!
//! - `tags_yaml` → YAML list block
//! - `source` / `related` → YAML list of quoted wikilinks (omitted when empty)
//! - any path containing `_bullets` → recursive nested-bullet markdown
//! - everything else → flat `- item` list
//!
//! Rendering is side-effect-free and total: missing paths become empty
//! strings, malformed bullet nodes are skipped, and any placeholder left
//! unresolved is deleted from the output.

use crate::schema::BulletNode;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Indent width per nesting level in rendered bullet lists.
const BULLET_INDENT: usize = 4;

/// Placeholder pattern: `{{ dotted.path }}` with optional inner whitespace.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.]*)\s*\}\}").unwrap_or_else(|_| unreachable!())
});

/// Numbered-item pattern: content that already carries its own list marker.
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s").unwrap_or_else(|_| unreachable!()));

/// Extracts the unique placeholder paths of a template, in order of first
/// appearance.
///
/// The placeholder set determines exactly which fields the dynamic per-note
/// prompt requests from the LLM.
#[must_use]
pub fn extract_placeholders(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let path = caps.get(1).map_or("", |m| m.as_str()).to_string();
        if !seen.iter().any(|s: &String| s.eq_ignore_ascii_case(&path)) {
            seen.push(path);
        }
    }
    seen
}

/// Renders a template against a data object.
///
/// Pure function of its inputs. Placeholders whose path has no
/// corresponding data are removed from the output.
#[must_use]
pub fn render(template: &str, data: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let path = caps.get(1).map_or("", |m| m.as_str());
            resolve(data, path).map_or_else(String::new, |value| format_value(path, value))
        })
        .to_string()
}

/// Resolves a dotted path case-insensitively.
fn resolve<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        let obj = current.as_object()?;
        current = obj
            .get(segment)
            .or_else(|| obj.iter().find(|(k, _)| k.eq_ignore_ascii_case(segment)).map(|(_, v)| v))?;
    }
    Some(current)
}

/// Formats a resolved value according to the field-name conventions.
fn format_value(path: &str, value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => format_array(path, items),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn format_array(path: &str, items: &[Value]) -> String {
    let leaf = path.rsplit('.').next().unwrap_or(path);

    if leaf.eq_ignore_ascii_case("tags_yaml") {
        return yaml_list(items, |s| s.to_string());
    }
    if leaf.eq_ignore_ascii_case("source") || leaf.eq_ignore_ascii_case("related") {
        if items.is_empty() {
            return String::new();
        }
        return yaml_list(items, |s| format!("\"[[{}]]\"", clean_link_text(s)));
    }
    if leaf.to_ascii_lowercase().contains("_bullets") {
        return render_bullets(items);
    }

    items
        .iter()
        .map(|item| format!("- {}", scalar_text(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// YAML list block with a leading newline so it sits under a `key:` line.
fn yaml_list(items: &[Value], format_item: impl Fn(&str) -> String) -> String {
    let mut out = String::new();
    for item in items {
        let text = scalar_text(item);
        out.push_str("\n  - ");
        out.push_str(&format_item(&text));
    }
    out
}

/// Strips literal brackets and quotes so a value embeds cleanly in a
/// quoted wikilink.
fn clean_link_text(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, '[' | ']' | '"')).collect()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders an array of bullet nodes as nested markdown.
///
/// Depth-first with 4-space indent per level. A node whose content is a
/// standalone `$$formula$$` is merged onto the previous sibling's line; a
/// node whose content starts with `<number>. ` keeps its own marker.
/// Malformed nodes (no content) are skipped.
#[must_use]
pub fn render_bullets(items: &[Value]) -> String {
    let nodes: Vec<BulletNode> = items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect();
    let mut lines = Vec::new();
    render_bullet_level(&nodes, 0, &mut lines);
    lines.join("\n")
}

fn render_bullet_level(nodes: &[BulletNode], depth: usize, lines: &mut Vec<String>) {
    // Line index of the previous sibling at this depth. A standalone
    // formula merges onto that line, never onto whatever line (a deeper
    // descendant, or the parent) happened to be emitted last.
    let mut prev_sibling: Option<usize> = None;
    for node in nodes {
        let content = node.content.trim();
        if content.is_empty() {
            // Invalid node: skip it but keep its children at this level.
            render_bullet_level(&node.children, depth, lines);
            continue;
        }

        if is_standalone_formula(content) {
            if let Some(line) = prev_sibling.and_then(|i| lines.get_mut(i)) {
                line.push(' ');
                line.push_str(content);
                render_bullet_level(&node.children, depth + 1, lines);
                continue;
            }
            // No previous sibling: the formula is its own bullet.
        }

        let indent = " ".repeat(depth * BULLET_INDENT);
        if NUMBERED.is_match(content) {
            lines.push(format!("{indent}{content}"));
        } else {
            lines.push(format!("{indent}- {content}"));
        }
        prev_sibling = Some(lines.len() - 1);

        render_bullet_level(&node.children, depth + 1, lines);
    }
}

fn is_standalone_formula(content: &str) -> bool {
    content.len() > 4 && content.starts_with("$$") && content.ends_with("$$")
}
