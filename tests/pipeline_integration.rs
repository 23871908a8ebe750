//! End-to-end pipeline tests over an in-memory vault and a scripted
//! completion backend: plan, generate, idempotent rerun, and resume.

// Integration tests use unwrap/panic for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use atomnote::config::AtomnoteConfig;
use atomnote::generate::GenerationPipeline;
use atomnote::llm::{CompletionService, ImageData};
use atomnote::plan::PlanPipeline;
use atomnote::vault::MemoryStore;
use atomnote::{Error, FileStore, Result};
use std::sync::{Arc, Mutex};

/// Completion fake that pops scripted responses in call order.
struct ScriptedLlm {
    responses: Mutex<Vec<Result<String>>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<Result<String>>) -> Arc<Self> {
        let mut responses = responses;
        responses.reverse();
        Arc::new(Self {
            responses: Mutex::new(responses),
        })
    }

    fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl CompletionService for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn generate(&self, _prompt: &str, _images: &[ImageData]) -> Result<String> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| panic!("no scripted response left"))
    }
}

const TEMPLATE: &str = "\
---
tags: {{tags_yaml}}
---
# {{title}}

{{summary.overview}}

{{details.explanation_bullets}}

Source: {{source}}
";

fn plan_json() -> String {
    let proposals: Vec<String> = ["A", "B", "C", "D"]
        .iter()
        .map(|t| {
            format!(
                r#"{{"title": "{t}", "kind": "Standard", "description": "About {t}.",
                     "parent": null, "children": []}}"#
            )
        })
        .collect();
    format!(
        r#"{{
            "note_identity": {{"suggested_kind": "Standard", "justification": "plain notes"}},
            "naming": {{"main_topic": "Graph Theory", "short_phrase": "Basics"}},
            "analysis": "Four foundational concepts.",
            "categories": [{{"name": "Foundations", "notes": ["A", "B", "C", "D"]}}],
            "proposals": [{}],
            "questions": ["What breaks without connectivity?"]
        }}"#,
        proposals.join(",")
    )
}

fn note_json(name: &str) -> String {
    format!(
        r#"{{"concept_name": "{name}",
             "summary": {{"overview": "Overview of {name}."}},
             "details": {{"explanation_bullets": [{{"content": "key point about {name}"}}]}},
             "keywords": ["graph theory"]}}"#
    )
}

fn seeded_vault() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_file(
                "Inbox/graphs.md",
                "# Graphs\n\n## Raw Notes\n\nVertices, edges, paths, cycles.\n",
            )
            .with_file("Templates/Standard Template.md", TEMPLATE),
    )
}

#[test]
fn plan_then_generate_full_run() {
    let store = seeded_vault();
    let llm = ScriptedLlm::new(vec![
        Ok(plan_json()),
        Ok(note_json("A")),
        Ok(note_json("B")),
        Ok(note_json("C")),
        Ok(note_json("D")),
    ]);
    let config = AtomnoteConfig::default();

    let planner = PlanPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        Arc::clone(&llm) as Arc<dyn CompletionService>,
        config.clone(),
    );
    let plan_path = planner.create_plan("Inbox/graphs.md", &|_| {}).unwrap();
    assert_eq!(plan_path, "Plans/Graph Theory - Basics.md");

    let generator = GenerationPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        Arc::clone(&llm) as Arc<dyn CompletionService>,
        config,
    );
    let summary = generator.generate_from_plan(&plan_path, &|_| {}).unwrap();
    assert_eq!(summary.generated, 4);
    assert_eq!(summary.total, 4);
    assert_eq!(llm.remaining(), 0);

    for title in ["A", "B", "C", "D"] {
        let note = store.read(&format!("Drafts/{title}.md")).unwrap();
        assert!(note.contains(&format!("# {title}")));
        assert!(note.contains("Source: [[Inbox/graphs]]"));
        assert!(note.contains("graph_theory"));
    }

    let log = store.read("Activity Log.md").unwrap();
    assert!(log.contains("Created plan"));
    assert!(log.contains("generated 4/4"));
}

#[test]
fn rerun_is_idempotent() {
    let store = seeded_vault();
    let llm = ScriptedLlm::new(vec![
        Ok(plan_json()),
        Ok(note_json("A")),
        Ok(note_json("B")),
        Ok(note_json("C")),
        Ok(note_json("D")),
    ]);
    let config = AtomnoteConfig::default();

    let planner = PlanPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        Arc::clone(&llm) as Arc<dyn CompletionService>,
        config.clone(),
    );
    let plan_path = planner.create_plan("Inbox/graphs.md", &|_| {}).unwrap();

    let generator = GenerationPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        Arc::clone(&llm) as Arc<dyn CompletionService>,
        config,
    );
    generator.generate_from_plan(&plan_path, &|_| {}).unwrap();
    let before = store.read("Drafts/A.md").unwrap();

    // Every draft exists, so the rerun makes zero completion calls and
    // rewrites nothing.
    let summary = generator.generate_from_plan(&plan_path, &|_| {}).unwrap();
    assert_eq!(summary.generated, 4);
    assert!(summary.failed.is_empty());
    assert_eq!(llm.remaining(), 0);
    assert_eq!(store.read("Drafts/A.md").unwrap(), before);
}

#[test]
fn resume_retries_exactly_the_failed_notes() {
    let store = seeded_vault();
    // A and C fail (unparsable), B and D succeed.
    let llm = ScriptedLlm::new(vec![
        Ok(plan_json()),
        Ok("definitely not json".to_string()),
        Ok(note_json("B")),
        Ok("{ also broken".to_string()),
        Ok(note_json("D")),
    ]);
    let config = AtomnoteConfig::default();

    let planner = PlanPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        Arc::clone(&llm) as Arc<dyn CompletionService>,
        config.clone(),
    );
    let plan_path = planner.create_plan("Inbox/graphs.md", &|_| {}).unwrap();

    let generator = GenerationPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        Arc::clone(&llm) as Arc<dyn CompletionService>,
        config.clone(),
    );
    let summary = generator.generate_from_plan(&plan_path, &|_| {}).unwrap();
    assert_eq!(summary.generated, 2);
    let failed_titles: Vec<&str> = summary.failed.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(failed_titles, vec!["A", "C"]);

    // Resume makes exactly two calls, for A and C only.
    let resume_llm = ScriptedLlm::new(vec![Ok(note_json("A")), Ok(note_json("C"))]);
    let generator = GenerationPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        Arc::clone(&resume_llm) as Arc<dyn CompletionService>,
        config.clone(),
    );
    let summary = generator.resume(&|_| {}).unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.generated, 2);
    assert_eq!(resume_llm.remaining(), 0);
    assert!(store.exists("Drafts/A.md").unwrap());
    assert!(store.exists("Drafts/C.md").unwrap());

    // A clean batch is now on top of the log; a second resume is a no-op.
    let noop_llm = ScriptedLlm::new(vec![]);
    let generator = GenerationPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        noop_llm as Arc<dyn CompletionService>,
        config,
    );
    let summary = generator.resume(&|_| {}).unwrap();
    assert_eq!(summary.total, 0);
}

#[test]
fn transient_backend_error_surfaces_as_per_note_failure() {
    let store = seeded_vault();
    let llm = ScriptedLlm::new(vec![
        Ok(plan_json()),
        Err(Error::Overloaded {
            operation: "generate".to_string(),
            cause: "status 529".to_string(),
        }),
        Ok(note_json("B")),
        Ok(note_json("C")),
        Ok(note_json("D")),
    ]);
    let config = AtomnoteConfig::default();

    let planner = PlanPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        Arc::clone(&llm) as Arc<dyn CompletionService>,
        config.clone(),
    );
    let plan_path = planner.create_plan("Inbox/graphs.md", &|_| {}).unwrap();

    // No retry wrapper in this test, so the overload lands on note A as an
    // isolated failure while the rest of the batch continues.
    let generator = GenerationPipeline::new(
        Arc::clone(&store) as Arc<dyn FileStore>,
        Arc::clone(&llm) as Arc<dyn CompletionService>,
        config,
    );
    let summary = generator.generate_from_plan(&plan_path, &|_| {}).unwrap();
    assert_eq!(summary.generated, 3);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "A");
}
