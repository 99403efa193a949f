//! Consistency engine for recorded agent trajectory documents.
//!
//! A trajectory document stores the same assistant reasoning in several
//! places: the canonical per-step record, the global `history`, and the
//! prompt snapshot (`query`) captured for every later step. Edits made
//! through this crate update every copy together, so the document stays
//! self-consistent after a thought is rewritten or a step is dropped.
//!
//! All operations are pure: they take a parsed document and return a new
//! one, leaving the input untouched when they fail.

pub mod cascade;
pub mod convert;
pub mod counters;
pub mod document;
pub mod error;
pub mod index;
pub mod projection;
pub mod rewrite;
pub mod steps;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cascade::{remove_step, replace_thought};
pub use convert::{Entry, convert_document, convert_steps, parse_action};
pub use document::{Dialect, classify, extract_text, step_count};
pub use error::{EngineError, Result};
pub use index::{StepNumber, step_array_index, step_message_indices};
pub use rewrite::{Rewrite, bulk_replace};
pub use steps::{PromptStep, StepView, project_steps, prompt_steps};
