//! HuggingFace Inference text generation over HTTP

use async_trait::async_trait;
use log::{debug, error, trace};

use super::sse::for_each_data;
use super::{check_status, TextGenerationApi};
use crate::error::Error;
use crate::request::{
  TextGenerationBody, TextGenerationRequest, TextGenerationResponse,
  TextGenerationStreamEvent,
};

const PROVIDER: &str = "HuggingFace";

/// Client for `{api_base}/models/{model}`
#[derive(Debug, Clone)]
pub struct HuggingFaceClient
{   token: Option<String>
  , api_base: String
  , http_client: reqwest::Client
}

impl HuggingFaceClient
{   pub fn new(
      token: Option<String>
    , api_base: impl Into<String>
    ) -> Self
    {   debug!("Creating HuggingFaceClient");
        HuggingFaceClient
        {   token
          , api_base: api_base.into()
          , http_client: reqwest::Client::new()
        }
    }

    fn model_url(&self, model: &str) -> String
    {   format!(
          "{}/models/{}",
          self.api_base.trim_end_matches('/'),
          model
        )
    }

    async fn post(
      &self
    , model: &str
    , request: &TextGenerationRequest
    ) -> Result<reqwest::Response, Error>
    {   trace!("HuggingFace request: {:?}", request);

        let mut builder = self.http_client
          .post(self.model_url(model))
          .header("Content-Type", "application/json")
          .json(request);
        if let Some(token) = &self.token
        {   builder = builder.bearer_auth(token);
        }

        let response = builder
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
impl TextGenerationApi for HuggingFaceClient
{   async fn text_generation(
      &self
    , model: &str
    , request: &TextGenerationRequest
    ) -> Result<TextGenerationResponse, Error>
    {   debug!("Text generation with: {}", model);
        let response = self.post(model, request).await?;

        let body: TextGenerationBody
          = response.json().await.map_err(|e| {
            error!("Parse error: {}", e);
            Error::ParseError(e.to_string())
          })?;

        match body
        {   TextGenerationBody::One(generation) => Ok(generation)
          , TextGenerationBody::Many(generations) => {
              generations.into_iter().next().ok_or_else(|| {
                error!("No generations in response");
                Error::NoChoicesInResponse
              })
            }
        }
    }

    async fn text_generation_stream(
      &self
    , model: &str
    , request: &TextGenerationRequest
    , on_event: &mut (dyn FnMut(TextGenerationStreamEvent) + Send)
    ) -> Result<(), Error>
    {   debug!("Streaming text generation with: {}", model);
        let response = self.post(model, request).await?;

        for_each_data(response, |payload| {
          let event: TextGenerationStreamEvent
            = serde_json::from_str(payload).map_err(|e| {
              error!("Event parse error: {}", e);
              Error::ParseError(e.to_string())
            })?;
          on_event(event);
          Ok(true)
        }).await
    }
}
