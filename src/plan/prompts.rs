//! Prompt construction for the plan pipeline.
//!
//! The exact instruction wording is configuration data, not algorithmic
//! design; what matters here is which context each prompt carries and the
//! response shape it requests.

use super::format::PlanProposal;

/// Sentinel the template-match prompt asks the model to return when no
/// existing template fits.
pub const NO_MATCH_SENTINEL: &str = "NO_MATCH";

/// Builds the single plan-generation prompt from the source text and
/// optional hierarchy context.
#[must_use]
pub fn plan_prompt(source_text: &str, hierarchy_context: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are a personal-knowledge-management assistant. Break the source \
         material below into a plan of atomic notes.\n\n\
         Respond with ONLY a JSON object of this shape:\n\
         {\n\
         \x20 \"note_identity\": {\"suggested_kind\": \"...\", \"justification\": \"...\"},\n\
         \x20 \"naming\": {\"main_topic\": \"...\", \"short_phrase\": \"...\"},\n\
         \x20 \"analysis\": \"...\",\n\
         \x20 \"categories\": [{\"name\": \"...\", \"notes\": [\"...\"]}],\n\
         \x20 \"proposals\": [{\"title\": \"...\", \"kind\": \"Core|Fundamental|Comparison|Cheatsheet\", \
         \"description\": \"...\", \"parent\": null, \"children\": []}],\n\
         \x20 \"questions\": [\"...\"]\n\
         }\n\n\
         Titles must be unique and usable as file names. Prefer existing \
         hierarchy names when a concept already appears there.\n",
    );

    if let Some(context) = hierarchy_context {
        prompt.push_str("\nExisting hierarchy:\n");
        prompt.push_str(context);
        prompt.push('\n');
    }

    prompt.push_str("\nSource material:\n");
    prompt.push_str(source_text);
    prompt
}

/// Builds the template-match prompt over the available template file names.
#[must_use]
pub fn template_match_prompt(kind: &str, template_files: &[String]) -> String {
    format!(
        "A note of kind `{kind}` needs a template. Pick the best-matching \
         file name from this list and respond with ONLY that file name, or \
         with `{NO_MATCH_SENTINEL}` if none fits:\n{}",
        template_files.join("\n")
    )
}

/// Builds the template-draft prompt, seeded with a few example templates.
#[must_use]
pub fn template_draft_prompt(kind: &str, examples: &[(String, String)]) -> String {
    let mut prompt = format!(
        "Draft a markdown note template for a new note kind `{kind}`. Use \
         `{{{{dotted.path}}}}` placeholders for generated fields, matching the \
         conventions of the examples below. Respond with ONLY the template \
         text.\n"
    );
    for (name, body) in examples {
        prompt.push_str(&format!("\nExample `{name}`:\n```\n{body}\n```\n"));
    }
    prompt
}

/// Builds the per-note generation prompt from the template's placeholder
/// set and the batch context.
#[must_use]
pub fn note_prompt(
    proposal: &PlanProposal,
    placeholders: &[String],
    siblings: &[String],
    hierarchy_context: Option<&str>,
    main_topic: &str,
) -> String {
    let mut prompt = format!(
        "Write the content for one atomic note.\n\n\
         Title: {}\nKind: {}\nMain topic: {main_topic}\nContext: {}\n",
        proposal.title, proposal.kind, proposal.description
    );

    if let Some(parent) = &proposal.parent {
        prompt.push_str(&format!("Parent note: {parent}\n"));
    }
    if !proposal.children.is_empty() {
        prompt.push_str(&format!("Child notes: {}\n", proposal.children.join(", ")));
    }
    if !siblings.is_empty() {
        prompt.push_str(&format!(
            "\nNotes being generated in the same batch (link to them with \
             [[wikilinks]] where relevant):\n{}\n",
            siblings.join("\n")
        ));
    }
    if let Some(context) = hierarchy_context {
        prompt.push_str("\nExisting hierarchy:\n");
        prompt.push_str(context);
        prompt.push('\n');
    }

    prompt.push_str(
        "\nRespond with ONLY a JSON object containing exactly these fields \
         (nested per dotted path; fields named `*_bullets` are arrays of \
         {\"content\": \"...\", \"children\": [...]} nodes; `keywords` and \
         `related` are string arrays):\n",
    );
    for placeholder in placeholders {
        prompt.push_str("- ");
        prompt.push_str(placeholder);
        prompt.push('\n');
    }
    prompt
}

/// Builds the answer-review prompt over the plan's open questions and the
/// user's written answers.
#[must_use]
pub fn review_prompt(main_topic: &str, questions_section: &str) -> String {
    format!(
        "You are reviewing a learner's answers to open questions about \
         `{main_topic}`. For each question, assess the answer written below \
         it: confirm what is correct, correct what is wrong, and fill gaps. \
         Respond in concise markdown.\n\n{questions_section}"
    )
}
