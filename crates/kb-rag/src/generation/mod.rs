//! Prompt construction for generator calls

pub mod prompt;

pub use prompt::{PromptBuilder, ANSWER_CONTEXT_LIMIT};
