//! Components that send prompts to remote models

pub mod helpers;
pub mod gpt;
pub mod hugging_face;

pub use gpt::GptGenerator;
pub use helpers::enforce_token_limit;
pub use hugging_face::{
  ChatHuggingFaceGenerator, GenerationOverrides, HuggingFaceGenerator,
};
