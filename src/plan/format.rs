//! Plan document wire format.
//!
//! The markdown checklist IS the serialization format: the exact bullet
//! pattern written here is the pattern [`parse_proposals`] reads back at
//! generation time. Treat it as a versioned wire format; changing either
//! side alone breaks every existing plan in the vault.
//!
//! ```text
//! - **<title>** `(<kind>)`
//! \t- *<description>*
//! \t- parent: [[<title>]]          (optional)
//! \t- children: [[<a>]], [[<b>]]   (optional)
//! ```

use crate::{Error, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

/// Heading of the proposal checklist section.
pub const NOTES_PLAN_HEADING: &str = "### Notes Plan";

/// Heading of the free-text analysis section.
pub const ANALYSIS_HEADING: &str = "### Analysis";

/// Heading of the provocative-questions section.
pub const QUESTIONS_HEADING: &str = "### Open Questions";

static PROPOSAL_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- \*\*(.+?)\*\* `\((.+?)\)`\s*$").unwrap_or_else(|_| unreachable!())
});

static PROPOSAL_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+- \*(.+?)\*\s*$").unwrap_or_else(|_| unreachable!()));

static PROPOSAL_PARENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+- parent:\s*\[\[(.+?)\]\]\s*$").unwrap_or_else(|_| unreachable!())
});

static PROPOSAL_CHILDREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+- children:\s*(.+)$").unwrap_or_else(|_| unreachable!()));

static WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]+)?\]\]").unwrap_or_else(|_| unreachable!()));

/// One planned atomic note awaiting generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanProposal {
    /// Unique (within the plan) note title; its sanitized form becomes the
    /// generated file's basename.
    pub title: String,
    /// Note kind, e.g. "Core", "Fundamental", "Comparison".
    pub kind: String,
    /// Free-text context passed to generation.
    pub description: String,
    /// Title of the hierarchical parent, if any.
    pub parent: Option<String>,
    /// Titles of hierarchical children.
    pub children: Vec<String>,
}

/// A category grouping of proposal titles inside the plan document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Category name.
    pub name: String,
    /// Titles of the notes in this category.
    pub notes: Vec<String>,
}

/// A parsed (or assembled) plan document.
#[derive(Debug, Clone, Default)]
pub struct PlanDocument {
    /// The plan's main topic (frontmatter).
    pub main_topic: String,
    /// Source citation, usually a wikilink to the originating note.
    pub source: String,
    /// Free-text analysis section.
    pub analysis: String,
    /// Notice about a freshly drafted template, if any.
    pub draft_notice: Option<String>,
    /// Category → note-title groupings.
    pub categories: Vec<Category>,
    /// The flat proposal checklist.
    pub proposals: Vec<PlanProposal>,
    /// Provocative open questions.
    pub questions: Vec<String>,
}

/// Encodes one proposal as its checklist lines.
#[must_use]
pub fn format_proposal(proposal: &PlanProposal) -> String {
    let mut out = format!(
        "- **{}** `({})`\n\t- *{}*",
        proposal.title, proposal.kind, proposal.description
    );
    if let Some(parent) = &proposal.parent {
        let _ = write!(out, "\n\t- parent: [[{parent}]]");
    }
    if !proposal.children.is_empty() {
        let links: Vec<String> = proposal.children.iter().map(|c| format!("[[{c}]]")).collect();
        let _ = write!(out, "\n\t- children: {}", links.join(", "));
    }
    out
}

/// Decodes every proposal found in a block of checklist markdown.
///
/// Lines that do not match the pattern are skipped; hierarchy-hint lines
/// are optional.
#[must_use]
pub fn parse_proposals(markdown: &str) -> Vec<PlanProposal> {
    let mut proposals: Vec<PlanProposal> = Vec::new();

    for line in markdown.lines() {
        if let Some(caps) = PROPOSAL_HEADER.captures(line) {
            let title = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            let kind = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
            if title.is_empty() {
                continue;
            }
            proposals.push(PlanProposal {
                title,
                kind,
                description: String::new(),
                parent: None,
                children: Vec::new(),
            });
            continue;
        }

        let Some(current) = proposals.last_mut() else {
            continue;
        };
        if let Some(caps) = PROPOSAL_PARENT.captures(line) {
            current.parent = caps.get(1).map(|m| m.as_str().trim().to_string());
        } else if let Some(caps) = PROPOSAL_CHILDREN.captures(line) {
            let rest = caps.get(1).map_or("", |m| m.as_str());
            current.children = WIKILINK
                .captures_iter(rest)
                .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
                .collect();
        } else if let Some(caps) = PROPOSAL_DESCRIPTION.captures(line) {
            if current.description.is_empty() {
                current.description = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            }
        }
    }

    proposals
}

impl PlanDocument {
    /// Renders the full plan document markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("---\n");
        let _ = writeln!(out, "main_topic: {}", yaml_scalar(&self.main_topic));
        let _ = writeln!(out, "source: {}", yaml_scalar(&self.source));
        out.push_str("---\n");

        if !self.analysis.trim().is_empty() {
            let _ = write!(out, "\n{ANALYSIS_HEADING}\n\n{}\n", self.analysis.trim());
        }

        if let Some(notice) = &self.draft_notice {
            let _ = write!(out, "\n### Template Draft\n\n> {}\n", notice.trim());
        }

        if !self.categories.is_empty() {
            out.push_str("\n### Categories\n");
            for category in &self.categories {
                let _ = write!(out, "\n**{}**\n", category.name);
                for note in &category.notes {
                    let _ = writeln!(out, "- [[{note}]]");
                }
            }
        }

        let _ = write!(out, "\n{NOTES_PLAN_HEADING}\n\n");
        for proposal in &self.proposals {
            let _ = writeln!(out, "{}", format_proposal(proposal));
        }

        if !self.questions.is_empty() {
            let _ = write!(out, "\n{QUESTIONS_HEADING}\n\n");
            for question in &self.questions {
                let _ = writeln!(out, "- {question}");
            }
        }

        out
    }

    /// Parses a plan document read back from the vault.
    ///
    /// # Errors
    ///
    /// Fails when the frontmatter is missing/unreadable or no proposal
    /// checklist is present.
    pub fn parse(text: &str) -> Result<Self> {
        let frontmatter = crate::vault::parse_frontmatter(text).ok_or_else(|| {
            Error::InvalidInput("plan document has no YAML frontmatter".to_string())
        })?;

        let main_topic = frontmatter
            .get("main_topic")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let source = frontmatter
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let plan_section = section_body(text, NOTES_PLAN_HEADING).ok_or_else(|| {
            Error::InvalidInput(format!("plan document has no '{NOTES_PLAN_HEADING}' section"))
        })?;
        let proposals = parse_proposals(&plan_section);
        if proposals.is_empty() {
            return Err(Error::InvalidInput(
                "plan document contains no proposals".to_string(),
            ));
        }

        let analysis = section_body(text, ANALYSIS_HEADING).unwrap_or_default();
        let questions = section_body(text, QUESTIONS_HEADING)
            .unwrap_or_default()
            .lines()
            .filter_map(|line| line.strip_prefix("- ").map(str::to_string))
            .collect();

        Ok(Self {
            main_topic,
            source,
            analysis: analysis.trim().to_string(),
            draft_notice: None,
            categories: Vec::new(),
            proposals,
            questions,
        })
    }
}

/// Quotes a YAML scalar when it contains characters that would otherwise
/// change its meaning (wikilink brackets in particular).
fn yaml_scalar(value: &str) -> String {
    if value.contains('[') || value.contains(':') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Extracts the body of a `###`-headed section, up to the next heading.
#[must_use]
pub fn section_body(text: &str, heading: &str) -> Option<String> {
    let mut lines = text.lines();
    lines.by_ref().find(|line| line.trim() == heading)?;
    let body: Vec<&str> = lines.take_while(|line| !line.starts_with('#')).collect();
    Some(body.join("\n"))
}
