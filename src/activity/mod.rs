//! Durable activity log.
//!
//! A markdown document with a fixed header; the newest entry is inserted
//! directly after the header, so the log reads newest-first. Besides audit,
//! the log is the durable record that resume parses to recover the set of
//! proposals that failed in the most recent generation batch.

use crate::vault::FileStore;
use crate::Result;
use regex::Regex;
use std::sync::Arc;
use std::sync::LazyLock;

/// Fixed header line of the log document.
pub const LOG_HEADER: &str = "# Activity Log";

static GENERATION_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Generation from \[\[([^\]|]+)(?:\|[^\]]+)?\]\]").unwrap_or_else(|_| unreachable!())
});

static FAILED_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Failed: (.+)$").unwrap_or_else(|_| unreachable!()));

static WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]+)?\]\]").unwrap_or_else(|_| unreachable!()));

/// The failures recorded by the most recent generation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedGeneration {
    /// Vault-relative path of the originating plan.
    pub plan_path: String,
    /// Exact titles that failed.
    pub titles: Vec<String>,
}

/// Append-style (newest-first) activity log over a [`FileStore`].
pub struct ActivityLog {
    store: Arc<dyn FileStore>,
    path: String,
}

impl ActivityLog {
    /// Creates a log bound to a vault-relative document path.
    #[must_use]
    pub fn new(store: Arc<dyn FileStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Prepends a one-bullet entry, creating the document if needed.
    pub fn record(&self, message: &str) -> Result<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M");
        let entry = format!("- {timestamp} {message}");

        let existing = if self.store.exists(&self.path)? {
            self.store.read(&self.path)?
        } else {
            format!("{LOG_HEADER}\n")
        };

        self.store
            .write(&self.path, &insert_after_header(&existing, &entry))
    }

    /// Records a plan-creation entry.
    pub fn record_plan_created(&self, plan_path: &str, proposal_count: usize) -> Result<()> {
        self.record(&format!(
            "Created plan [[{}]] with {proposal_count} proposals",
            strip_md(plan_path)
        ))
    }

    /// Records a generation-batch entry enumerating every success and
    /// failure by title.
    pub fn record_generation(
        &self,
        plan_path: &str,
        succeeded: &[String],
        failed: &[(String, String)],
    ) -> Result<()> {
        let mut message = format!(
            "Generation from [[{}]]: generated {}/{}.",
            strip_md(plan_path),
            succeeded.len(),
            succeeded.len() + failed.len()
        );
        if !succeeded.is_empty() {
            let links: Vec<String> = succeeded.iter().map(|t| format!("[[{t}]]")).collect();
            message.push_str(&format!(" Succeeded: {}.", links.join(", ")));
        }
        if !failed.is_empty() {
            let links: Vec<String> = failed
                .iter()
                .map(|(title, reason)| format!("[[{title}]] ({reason})"))
                .collect();
            message.push_str(&format!(" Failed: {}", links.join(", ")));
        }
        self.record(&message)
    }

    /// Records an answer-review entry.
    pub fn record_review(&self, plan_path: &str) -> Result<()> {
        self.record(&format!("Reviewed answers in [[{}]]", strip_md(plan_path)))
    }

    /// Finds the most recent generation entry with a non-empty failed
    /// section.
    ///
    /// Entries are scanned top-down (newest-first by construction). An
    /// absent log, or a log with no such entry, yields `None` rather than
    /// an error; resume treats that as "nothing to do".
    pub fn last_failed_generation(&self) -> Result<Option<FailedGeneration>> {
        if !self.store.exists(&self.path)? {
            return Ok(None);
        }
        let text = self.store.read(&self.path)?;

        for line in text.lines() {
            if !line.starts_with("- ") {
                continue;
            }
            let Some(plan) = GENERATION_ENTRY
                .captures(line)
                .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
            else {
                continue;
            };
            // Newest-first: the first generation entry decides. If it has
            // no failures, there is nothing to resume.
            let titles = FAILED_SECTION
                .captures(line)
                .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
                .map(|failed| {
                    WIKILINK
                        .captures_iter(&failed)
                        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            if titles.is_empty() {
                return Ok(None);
            }
            return Ok(Some(FailedGeneration {
                plan_path: format!("{plan}.md"),
                titles,
            }));
        }

        Ok(None)
    }
}

/// Inserts an entry directly after the fixed header line.
fn insert_after_header(document: &str, entry: &str) -> String {
    let Some(header_pos) = document.find(LOG_HEADER) else {
        // Header was edited away; rebuild the document around the entry.
        return format!("{LOG_HEADER}\n{entry}\n\n{document}");
    };
    let rest = &document[header_pos + LOG_HEADER.len()..];
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    format!("{LOG_HEADER}\n{entry}\n{rest}")
}

fn strip_md(path: &str) -> &str {
    path.strip_suffix(".md").unwrap_or(path)
}
