//! OpenAI chat completions over HTTP

use async_trait::async_trait;
use log::{debug, error, trace};

use super::sse::{for_each_data, DONE};
use super::{check_status, ChatCompletionApi};
use crate::error::Error;
use crate::request::{
  ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse,
};

const PROVIDER: &str = "OpenAI";

/// Client for `{api_base}/chat/completions`
#[derive(Debug, Clone)]
pub struct OpenAiClient
{   api_key: String
  , api_base: String
  , http_client: reqwest::Client
}

impl OpenAiClient
{   pub fn new(
      api_key: impl Into<String>
    , api_base: impl Into<String>
    ) -> Self
    {   debug!("Creating OpenAiClient");
        OpenAiClient
        {   api_key: api_key.into()
          , api_base: api_base.into()
          , http_client: reqwest::Client::new()
        }
    }

    fn completions_url(&self) -> String
    {   format!(
          "{}/chat/completions",
          self.api_base.trim_end_matches('/')
        )
    }

    async fn post(
      &self
    , request: &ChatCompletionRequest
    ) -> Result<reqwest::Response, Error>
    {   if self.api_key.is_empty()
        {   error!("No API key for model: {}", request.model);
            return Err(Error::MissingApiKey(
              format!("{}:{}", PROVIDER, request.model)
            ));
        }
        trace!("OpenAI request: {:?}", request);

        let response = self.http_client
          .post(self.completions_url())
          .bearer_auth(&self.api_key)
          .header("Content-Type", "application/json")
          .json(request)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            Error::HttpError(e.to_string())
          })?;

        check_status(response, PROVIDER).await
    }
}

#[async_trait]
impl ChatCompletionApi for OpenAiClient
{   async fn create_completion(
      &self
    , request: &ChatCompletionRequest
    ) -> Result<ChatCompletionResponse, Error>
    {   debug!("Creating completion with: {}", request.model);
        let response = self.post(request).await?;

        response.json().await.map_err(|e| {
          error!("Parse error: {}", e);
          Error::ParseError(e.to_string())
        })
    }

    async fn create_completion_stream(
      &self
    , request: &ChatCompletionRequest
    , on_chunk: &mut (dyn FnMut(ChatCompletionChunk) + Send)
    ) -> Result<(), Error>
    {   debug!("Streaming completion with: {}", request.model);
        let response = self.post(request).await?;

        for_each_data(response, |payload| {
          if payload == DONE
          {   return Ok(false);
          }
          let chunk: ChatCompletionChunk
            = serde_json::from_str(payload).map_err(|e| {
              error!("Chunk parse error: {}", e);
              Error::ParseError(e.to_string())
            })?;
          on_chunk(chunk);
          Ok(true)
        }).await
    }
}
