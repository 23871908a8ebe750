//! Generation pipeline: from a plan document to rendered note files.
//!
//! Each proposal is processed independently; one bad completion never
//! aborts the batch. Failures are recorded in the activity log, which is
//! what [`GenerationPipeline::resume`] reads back to retry exactly the
//! notes that failed last time.

use crate::activity::ActivityLog;
use crate::config::AtomnoteConfig;
use crate::hierarchy::{HierarchyIndex, structural_tag_for_kind};
use crate::llm::CompletionService;
use crate::plan::{PlanDocument, PlanProposal, Progress};
use crate::plan::images;
use crate::vault::{FileStore, sanitize_file_name};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of one generation batch.
#[derive(Debug, Default)]
pub struct GenerationSummary {
    /// Number of notes that succeeded (including already existing ones).
    pub generated: usize,
    /// Number of proposals in the batch.
    pub total: usize,
    /// Titles that succeeded.
    pub succeeded: Vec<String>,
    /// Title and failure reason for each proposal that failed.
    pub failed: Vec<(String, String)>,
}

impl GenerationSummary {
    /// One-line human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        if self.total == 0 {
            return "nothing to generate".to_string();
        }
        format!("generated {}/{} notes", self.generated, self.total)
    }
}

/// Orchestrates note generation over a vault and a completion backend.
pub struct GenerationPipeline {
    store: Arc<dyn FileStore>,
    llm: Arc<dyn CompletionService>,
    config: AtomnoteConfig,
    activity: ActivityLog,
    hierarchy: HierarchyIndex,
}

impl GenerationPipeline {
    /// Wires a pipeline from a store, a completion backend, and config.
    #[must_use]
    pub fn new(
        store: Arc<dyn FileStore>,
        llm: Arc<dyn CompletionService>,
        config: AtomnoteConfig,
    ) -> Self {
        let activity = ActivityLog::new(Arc::clone(&store), config.activity_log_path.clone());
        let hierarchy = HierarchyIndex::new(Arc::clone(&store), config.hierarchy_index_path.clone());
        Self {
            store,
            llm,
            config,
            activity,
            hierarchy,
        }
    }

    /// Generates every note planned in `plan_path`.
    ///
    /// # Errors
    ///
    /// Fails when the plan document is missing or unparsable, or when the
    /// batch record cannot be written. Per-note failures do not error; they
    /// are reported in the summary.
    pub fn generate_from_plan(
        &self,
        plan_path: &str,
        progress: Progress<'_>,
    ) -> Result<GenerationSummary> {
        let document = self.load_plan(plan_path)?;
        self.run_batch(plan_path, &document, None, progress)
    }

    /// Retries exactly the proposals that failed in the most recent
    /// generation batch.
    ///
    /// A log with no failed batch on top is a soft no-op: the returned
    /// summary has `total == 0`.
    pub fn resume(&self, progress: Progress<'_>) -> Result<GenerationSummary> {
        let Some(failed) = self.activity.last_failed_generation()? else {
            tracing::info!("No failed generation batch to resume");
            return Ok(GenerationSummary::default());
        };
        let document = self.load_plan(&failed.plan_path)?;
        let scope: HashSet<String> = failed.titles.into_iter().collect();
        self.run_batch(&failed.plan_path, &document, Some(&scope), progress)
    }

    fn load_plan(&self, plan_path: &str) -> Result<PlanDocument> {
        if !self.store.exists(plan_path)? {
            return Err(Error::NotFound {
                resource: format!("plan document '{plan_path}'"),
            });
        }
        PlanDocument::parse(&self.store.read(plan_path)?)
    }

    /// Runs one batch over the plan's proposals, optionally scoped to a
    /// title set, with per-proposal failure isolation.
    fn run_batch(
        &self,
        plan_path: &str,
        document: &PlanDocument,
        scope: Option<&HashSet<String>>,
        progress: Progress<'_>,
    ) -> Result<GenerationSummary> {
        let proposals: Vec<&PlanProposal> = document
            .proposals
            .iter()
            .filter(|p| scope.is_none_or(|titles| titles.contains(&p.title)))
            .collect();

        let hierarchy_context = self.hierarchy.context()?;
        let all_titles: Vec<&str> = proposals.iter().map(|p| p.title.as_str()).collect();

        let mut summary = GenerationSummary {
            total: proposals.len(),
            ..GenerationSummary::default()
        };
        let mut structural: Vec<String> = Vec::new();

        for (i, proposal) in proposals.iter().enumerate() {
            progress(&format!(
                "Generating {}/{}: {}",
                i + 1,
                proposals.len(),
                proposal.title
            ));
            let siblings: Vec<String> = all_titles
                .iter()
                .filter(|t| **t != proposal.title)
                .map(|t| (*t).to_string())
                .collect();

            match self.generate_note(proposal, &siblings, hierarchy_context.as_deref(), document) {
                Ok(Some(draft_path)) => {
                    summary.succeeded.push(proposal.title.clone());
                    if structural_tag_for_kind(&proposal.kind).is_some() {
                        structural.push(draft_path);
                    }
                },
                Ok(None) => {
                    // Already on disk from an earlier run.
                    tracing::debug!(title = proposal.title, "Note already exists, skipping");
                    summary.succeeded.push(proposal.title.clone());
                },
                Err(err) => {
                    tracing::warn!(title = proposal.title, error = %err, "Note generation failed");
                    summary.failed.push((proposal.title.clone(), short_reason(&err)));
                },
            }
        }
        summary.generated = summary.succeeded.len();

        self.hierarchy.append(&structural)?;
        self.activity
            .record_generation(plan_path, &summary.succeeded, &summary.failed)?;
        tracing::info!(
            plan = plan_path,
            generated = summary.generated,
            total = summary.total,
            "Generation batch finished"
        );
        Ok(summary)
    }

    /// Generates a single note. `Ok(Some(path))` on write, `Ok(None)` when
    /// the draft already exists.
    fn generate_note(
        &self,
        proposal: &PlanProposal,
        siblings: &[String],
        hierarchy_context: Option<&str>,
        document: &PlanDocument,
    ) -> Result<Option<String>> {
        let draft_path = format!(
            "{}/{}.md",
            self.config.drafts_folder,
            sanitize_file_name(&proposal.title)
        );
        if self.store.exists(&draft_path)? {
            return Ok(None);
        }

        let template = self.read_template(&proposal.kind)?;
        let placeholders = crate::template::extract_placeholders(&template);

        let prompt = crate::plan::prompts::note_prompt(
            proposal,
            &placeholders,
            siblings,
            hierarchy_context,
            &document.main_topic,
        );
        let attached = images::load_images(
            self.store.as_ref(),
            &images::extract_image_refs(&proposal.description),
        );

        let raw = self.llm.generate(&prompt, &attached)?;
        if raw.trim().is_empty() {
            return Err(Error::UnparsableResponse {
                operation: "generate_note".to_string(),
                raw,
            });
        }

        let mut value = crate::repair::parse("generate_note", &raw)?;
        let schema = crate::schema::schema_for_kind(&proposal.kind);
        crate::schema::validate(&value, &schema)?;

        self.inject_fields(&mut value, proposal, document);
        let rendered = crate::template::render(&template, &value);
        self.store.write(&draft_path, &rendered)?;
        Ok(Some(draft_path))
    }

    /// Reads the template for a kind, preferring the curated template over
    /// a plan-time draft.
    fn read_template(&self, kind: &str) -> Result<String> {
        let curated = self.config.template_path(kind);
        if self.store.exists(&curated)? {
            return self.store.read(&curated);
        }
        let draft = format!("{}/{kind} Template.md", self.config.template_drafts_folder());
        if self.store.exists(&draft)? {
            return self.store.read(&draft);
        }
        Err(Error::NotFound {
            resource: format!("template for kind '{kind}' ({curated})"),
        })
    }

    /// Injects the pipeline-owned fields the model never produces: title,
    /// source citation, frontmatter tags, and a fenced code block.
    fn inject_fields(&self, value: &mut Value, proposal: &PlanProposal, document: &PlanDocument) {
        let Some(map) = value.as_object_mut() else {
            return;
        };
        map.insert("title".to_string(), Value::String(proposal.title.clone()));
        map.insert("source".to_string(), Value::String(document.source.clone()));

        let mut tags: Vec<String> = Vec::new();
        if let Some(tag) = structural_tag_for_kind(&proposal.kind) {
            tags.push(tag.to_string());
        }
        let topic_slug = slug(&document.main_topic);
        if !topic_slug.is_empty() {
            tags.push(topic_slug);
        }
        if let Some(keywords) = map.get("keywords").and_then(Value::as_array) {
            for keyword in keywords {
                if let Some(k) = keyword.as_str() {
                    tags.push(slug(k));
                }
            }
        }
        let mut seen = HashSet::new();
        tags.retain(|t| !t.is_empty() && seen.insert(t.clone()));
        map.insert(
            "tags_yaml".to_string(),
            Value::Array(tags.into_iter().map(Value::String).collect()),
        );

        if let Some(code) = map.get("code").and_then(Value::as_str) {
            let code = code.trim();
            if !code.is_empty() && !code.starts_with("```") {
                map.insert(
                    "code".to_string(),
                    Value::String(format!("```\n{code}\n```")),
                );
            }
        }
    }
}

/// Lowercase tag slug: word characters survive, runs of anything else
/// collapse to a single underscore.
fn slug(text: &str) -> String {
    let mut out = String::new();
    let mut gap = false;
    for c in text.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            if gap && !out.is_empty() {
                out.push('_');
            }
            gap = false;
            out.push(c);
        } else {
            gap = true;
        }
    }
    out
}

/// Compact failure reason for the activity log entry.
fn short_reason(err: &Error) -> String {
    match err {
        Error::NotFound { .. } => "template not found".to_string(),
        Error::UnparsableResponse { .. } => "unparsable response".to_string(),
        Error::Validation(e) => format!("schema validation: {} failure(s)", e.failures.len()),
        other => other.to_string(),
    }
}
