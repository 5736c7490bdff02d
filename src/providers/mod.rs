//! Remote completion API clients

pub mod sse;
pub mod openai;
pub mod hugging_face;

use async_trait::async_trait;
use log::{error, trace};

use crate::error::Error;
use crate::request::{
  ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse,
  TextGenerationRequest, TextGenerationResponse, TextGenerationStreamEvent,
};

// Re-export for convenience
pub use hugging_face::HuggingFaceClient;
pub use openai::OpenAiClient;

/// Chat completion endpoint (OpenAI shaped)
#[async_trait]
pub trait ChatCompletionApi: Send + Sync
{   async fn create_completion(
      &self
    , request: &ChatCompletionRequest
    ) -> Result<ChatCompletionResponse, Error>;

    /// Calls `on_chunk` once per received chunk, in order
    async fn create_completion_stream(
      &self
    , request: &ChatCompletionRequest
    , on_chunk: &mut (dyn FnMut(ChatCompletionChunk) + Send)
    ) -> Result<(), Error>;
}

/// Text generation endpoint (HuggingFace Inference shaped)
#[async_trait]
pub trait TextGenerationApi: Send + Sync
{   async fn text_generation(
      &self
    , model: &str
    , request: &TextGenerationRequest
    ) -> Result<TextGenerationResponse, Error>;

    /// Calls `on_event` once per received token, in order
    async fn text_generation_stream(
      &self
    , model: &str
    , request: &TextGenerationRequest
    , on_event: &mut (dyn FnMut(TextGenerationStreamEvent) + Send)
    ) -> Result<(), Error>;
}

/// Turn a non-2xx response into `Error::ApiError` carrying the body
pub(crate) async fn check_status(
  response: reqwest::Response
, provider: &str
) -> Result<reqwest::Response, Error>
{   let status = response.status();
    trace!("{} response status: {}", provider, status);

    if status.is_success()
    {   return Ok(response);
    }
    let error_text = response.text().await
      .unwrap_or_else(|_| 
        "Unknown error".to_string()
      );
    error!("{} API error ({}): {}", provider, status, error_text);
    Err(Error::ApiError(
      format!("{} error ({}): {}", provider, status, error_text)
    ))
}
