//! Plan pipeline: from raw source text to a persisted plan document.

mod format;
pub(crate) mod images;
mod pipeline;
pub mod prompts;

pub use format::{
    ANALYSIS_HEADING, Category, NOTES_PLAN_HEADING, PlanDocument, PlanProposal,
    QUESTIONS_HEADING, format_proposal, parse_proposals, section_body,
};
pub use pipeline::{PlanPipeline, Progress};
