//! Components that assemble prompts

pub mod prompt_builder;

pub use prompt_builder::{BuilderOutput, InputType, PromptBuilder};
