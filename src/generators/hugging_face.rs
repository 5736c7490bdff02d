//! Generators backed by the HuggingFace Inference text generation API.
//!
//! The chat variant renders the conversation with a jinja chat template
//! into one prompt; the plain variant sends the string prompt as is.

use log::{debug, error, trace};
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::helpers::{enforce_token_limit, normalize_prompt};
use crate::callbacks::{resolve_optional, StreamingCallback};
use crate::chat_message::{ChatMessage, StreamingChunk};
use crate::config::{
  HuggingFaceConfig, DEFAULT_HUGGING_FACE_MODEL, HUGGING_FACE_API_BASE,
};
use crate::error::Error;
use crate::providers::{HuggingFaceClient, TextGenerationApi};
use crate::request::{
  GenerationDetails, TextGenerationRequest, TextGenerationStreamEvent,
};
use crate::serialization::{
  default_from_dict, default_to_dict, Component, ComponentDict,
};
use crate::tokenizer::{Tokenizer, WhitespaceTokenizer};
use crate::{GeneratorOutput, Prompt, TextGeneratorOutput};

/// Zephyr style turns followed by the assistant generation prompt
pub const DEFAULT_CHAT_TEMPLATE: &str = "\
{% for message in messages %}<|{{ message.role }}|>\n\
{{ message.content }}</s>\n\
{% endfor %}{% if add_generation_prompt %}<|assistant|>\n{% endif %}";

/// Per-call changes on top of the configured generation parameters
#[derive(Debug, Clone, Default)]
pub struct GenerationOverrides
{   /// Replaces the configured stop words
    pub stop_words: Option<Vec<String>>
  , /// Merged over the configured generation kwargs
    pub generation_kwargs: Map<String, Value>
}

/// One generated text with its reply metadata
#[derive(Debug, Clone)]
struct Generation
{   text: String
  , metadata: Map<String, Value>
}

/// Chat generator on top of HuggingFace text generation
pub struct ChatHuggingFaceGenerator<A = HuggingFaceClient, T = WhitespaceTokenizer>
{   config: HuggingFaceConfig
  , api: A
  , tokenizer: T
}

/// Plain text generator on top of HuggingFace text generation
pub struct HuggingFaceGenerator<A = HuggingFaceClient, T = WhitespaceTokenizer>
{   config: HuggingFaceConfig
  , api: A
  , tokenizer: T
}

fn validate(config: &HuggingFaceConfig) -> Result<(), Error>
{   if config.model.trim().is_empty()
    {   error!("HuggingFace generator without model");
        return Err(Error::Configuration(
          "a model id is required".to_string()
        ));
    }
    Ok(())
}

fn client_for(config: &HuggingFaceConfig) -> HuggingFaceClient
{   HuggingFaceClient::new(
      config.token.clone(),
      config.api_base_url.clone()
    )
}

impl ChatHuggingFaceGenerator<HuggingFaceClient, WhitespaceTokenizer>
{   pub fn new(config: HuggingFaceConfig) -> Result<Self, Error>
    {   debug!("Creating ChatHuggingFaceGenerator for: {}", config.model);
        let api = client_for(&config);
        Self::with_parts(config, api, WhitespaceTokenizer)
    }
}

impl<A, T> ChatHuggingFaceGenerator<A, T>
where A: TextGenerationApi
    , T: Tokenizer
{   /// Generator with a custom endpoint and tokenizer
    pub fn with_parts(
      config: HuggingFaceConfig
    , api: A
    , tokenizer: T
    ) -> Result<Self, Error>
    {   validate(&config)?;
        if let Some(template) = &config.chat_template
        {   Environment::new().template_from_str(template)?;
        }
        Ok(ChatHuggingFaceGenerator { config, api, tokenizer })
    }

    pub fn config(&self) -> &HuggingFaceConfig
    {   &self.config
    }

    /// Prompt text the model receives for `messages`
    pub fn render_chat(
      &self
    , messages: &[ChatMessage]
    ) -> Result<String, Error>
    {   let template = self.config.chat_template
          .as_deref()
          .unwrap_or(DEFAULT_CHAT_TEMPLATE);
        let rendered = Environment::new().render_str(template, context! {
          messages => messages,
          add_generation_prompt => true,
        })?;
        trace!("Rendered chat prompt: {}", rendered);
        Ok(rendered)
    }

    pub async fn run(
      &self
    , prompt: impl Into<Prompt>
    ) -> Result<GeneratorOutput, Error>
    {   self.run_with(prompt, GenerationOverrides::default()).await
    }

    pub async fn run_with(
      &self
    , prompt: impl Into<Prompt>
    , overrides: GenerationOverrides
    ) -> Result<GeneratorOutput, Error>
    {   let messages = normalize_prompt(
          prompt.into(),
          self.config.system_prompt.as_deref()
        );
        let rendered = self.render_chat(&messages)?;
        let generations = generate(
          &self.api, &self.tokenizer, &self.config, rendered, overrides
        ).await?;

        let replies = generations.into_iter().map(|generation| {
          let mut message = ChatMessage::from_assistant(generation.text);
          message.metadata = generation.metadata;
          message
        }).collect();
        Ok(GeneratorOutput { replies })
    }
}

impl HuggingFaceGenerator<HuggingFaceClient, WhitespaceTokenizer>
{   pub fn new(config: HuggingFaceConfig) -> Result<Self, Error>
    {   debug!("Creating HuggingFaceGenerator for: {}", config.model);
        let api = client_for(&config);
        Self::with_parts(config, api, WhitespaceTokenizer)
    }
}

impl<A, T> HuggingFaceGenerator<A, T>
where A: TextGenerationApi
    , T: Tokenizer
{   pub fn with_parts(
      config: HuggingFaceConfig
    , api: A
    , tokenizer: T
    ) -> Result<Self, Error>
    {   validate(&config)?;
        Ok(HuggingFaceGenerator { config, api, tokenizer })
    }

    pub fn config(&self) -> &HuggingFaceConfig
    {   &self.config
    }

    pub async fn run(
      &self
    , prompt: &str
    ) -> Result<TextGeneratorOutput, Error>
    {   self.run_with(prompt, GenerationOverrides::default()).await
    }

    pub async fn run_with(
      &self
    , prompt: &str
    , overrides: GenerationOverrides
    ) -> Result<TextGeneratorOutput, Error>
    {   let generations = generate(
          &self.api, &self.tokenizer, &self.config,
          prompt.to_string(), overrides
        ).await?;

        let (replies, metadata) = generations
          .into_iter()
          .map(|generation| (generation.text, generation.metadata))
          .unzip();
        Ok(TextGeneratorOutput { replies, metadata })
    }
}

/// Request parameters: `details`, `stop_sequences` and every kwarg but
/// `n`, which is returned as the number of requests to make.
pub(crate) fn request_parameters(
  config: &HuggingFaceConfig
, overrides: GenerationOverrides
) -> (Map<String, Value>, usize)
{   let mut parameters = config.generation_kwargs.clone();
    parameters.extend(overrides.generation_kwargs);
    let n = parameters
      .remove("n")
      .and_then(|n| n.as_u64())
      .map_or(1, |n| n.max(1) as usize);

    let stop_words = overrides.stop_words
      .unwrap_or_else(|| config.stop_words.clone());
    parameters.insert("details".to_string(), json!(true));
    parameters.insert("stop_sequences".to_string(), json!(stop_words));
    parameters
      .entry("return_full_text".to_string())
      .or_insert(json!(false));
    (parameters, n)
}

fn reply_metadata(
  model: &str
, index: usize
, details: Option<&GenerationDetails>
, prompt_tokens: usize
, fallback_completion_tokens: usize
) -> Map<String, Value>
{   let completion_tokens = details
      .and_then(|d| d.generated_tokens)
      .unwrap_or(fallback_completion_tokens);
    let mut metadata = Map::new();
    metadata.insert("model".to_string(), json!(model));
    metadata.insert("index".to_string(), json!(index));
    metadata.insert(
      "finish_reason".to_string(),
      json!(details.and_then(|d| d.finish_reason.clone()))
    );
    metadata.insert("usage".to_string(), json!({
      "completion_tokens": completion_tokens,
      "prompt_tokens": prompt_tokens,
      "total_tokens": prompt_tokens + completion_tokens,
    }));
    metadata
}

async fn generate<A, T>(
  api: &A
, tokenizer: &T
, config: &HuggingFaceConfig
, prompt: String
, overrides: GenerationOverrides
) -> Result<Vec<Generation>, Error>
where A: TextGenerationApi
    , T: Tokenizer
{   let prompt = match config.max_prompt_tokens
    {   Some(max) => enforce_token_limit(&prompt, tokenizer, max)
      , None => prompt
    };
    let prompt_tokens = tokenizer.encode(&prompt).len();
    let (parameters, n) = request_parameters(config, overrides);

    if let Some(callback) = &config.streaming_callback
    {   let request = TextGenerationRequest
        {   inputs: prompt
          , parameters
          , stream: true
        };
        let generation = generate_streaming(
          api, tokenizer, config, &request, callback, prompt_tokens
        ).await?;
        return Ok(vec![generation]);
    }

    let request = TextGenerationRequest
    {   inputs: prompt
      , parameters
      , stream: false
    };
    debug!("Requesting {} generations from {}", n, config.model);
    let mut generations = Vec::with_capacity(n);
    for index in 0..n
    {   let response = api.text_generation(&config.model, &request).await?;
        let metadata = reply_metadata(
          &config.model,
          index,
          response.details.as_ref(),
          prompt_tokens,
          tokenizer.encode(&response.generated_text).len()
        );
        generations.push(Generation
        {   text: response.generated_text
          , metadata
        });
    }
    Ok(generations)
}

async fn generate_streaming<A, T>(
  api: &A
, tokenizer: &T
, config: &HuggingFaceConfig
, request: &TextGenerationRequest
, callback: &StreamingCallback
, prompt_tokens: usize
) -> Result<Generation, Error>
where A: TextGenerationApi
    , T: Tokenizer
{   let mut text = String::new();
    let mut details: Option<GenerationDetails> = None;

    api.text_generation_stream(&config.model, request, &mut |event: TextGenerationStreamEvent| {
      let mut chunk = StreamingChunk::new(event.token.text.clone());
      chunk.metadata.insert("token_id".to_string(), json!(event.token.id));
      chunk.metadata.insert("special".to_string(), json!(event.token.special));
      if let Some(finished) = &event.details
      {   chunk.metadata.insert(
            "finish_reason".to_string(),
            json!(finished.finish_reason)
          );
      }
      callback.call(&chunk);

      if !event.token.special
      {   text.push_str(&event.token.text);
      }
      if event.details.is_some()
      {   details = event.details;
      }
    }).await?;

    let completion_tokens = tokenizer.encode(&text).len();
    let metadata = reply_metadata(
      &config.model, 0, details.as_ref(), prompt_tokens, completion_tokens
    );
    Ok(Generation { text, metadata })
}

fn default_model() -> String
{   DEFAULT_HUGGING_FACE_MODEL.to_string()
}

fn default_api_base_url() -> String
{   HUGGING_FACE_API_BASE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HuggingFaceInitParameters
{   #[serde(default = "default_model")]
    model: String
  , #[serde(default)]
    token: Option<String>
  , #[serde(default = "default_api_base_url")]
    api_base_url: String
  , #[serde(default)]
    system_prompt: Option<String>
  , #[serde(default)]
    chat_template: Option<String>
  , #[serde(default)]
    generation_kwargs: Map<String, Value>
  , #[serde(default)]
    stop_words: Vec<String>
  , #[serde(default)]
    max_prompt_tokens: Option<usize>
  , #[serde(default)]
    streaming_callback: Option<String>
}

impl HuggingFaceInitParameters
{   fn from_config(config: &HuggingFaceConfig) -> Self
    {   HuggingFaceInitParameters
        {   model: config.model.clone()
          , token: config.token.clone()
          , api_base_url: config.api_base_url.clone()
          , system_prompt: config.system_prompt.clone()
          , chat_template: config.chat_template.clone()
          , generation_kwargs: config.generation_kwargs.clone()
          , stop_words: config.stop_words.clone()
          , max_prompt_tokens: config.max_prompt_tokens
          , streaming_callback: config.streaming_callback
              .as_ref()
              .and_then(|callback| callback.key().map(str::to_string))
        }
    }

    fn into_config(self) -> Result<HuggingFaceConfig, Error>
    {   let streaming_callback: Option<StreamingCallback>
          = resolve_optional(self.streaming_callback.as_deref())?;
        Ok(HuggingFaceConfig
        {   model: self.model
          , token: self.token
          , api_base_url: self.api_base_url
          , system_prompt: self.system_prompt
          , chat_template: self.chat_template
          , generation_kwargs: self.generation_kwargs
          , stop_words: self.stop_words
          , max_prompt_tokens: self.max_prompt_tokens
          , streaming_callback
        })
    }
}

impl Component for ChatHuggingFaceGenerator
{   const TYPE_NAME: &'static str
      = "chatforge::generators::ChatHuggingFaceGenerator";

    fn to_dict(&self) -> Result<ComponentDict, Error>
    {   default_to_dict(
          Self::TYPE_NAME,
          &HuggingFaceInitParameters::from_config(&self.config)
        )
    }

    fn from_dict(data: ComponentDict) -> Result<Self, Error>
    {   let params: HuggingFaceInitParameters
          = default_from_dict(Self::TYPE_NAME, data)?;
        ChatHuggingFaceGenerator::new(params.into_config()?)
    }
}

impl Component for HuggingFaceGenerator
{   const TYPE_NAME: &'static str
      = "chatforge::generators::HuggingFaceGenerator";

    fn to_dict(&self) -> Result<ComponentDict, Error>
    {   default_to_dict(
          Self::TYPE_NAME,
          &HuggingFaceInitParameters::from_config(&self.config)
        )
    }

    fn from_dict(data: ComponentDict) -> Result<Self, Error>
    {   let params: HuggingFaceInitParameters
          = default_from_dict(Self::TYPE_NAME, data)?;
        HuggingFaceGenerator::new(params.into_config()?)
    }
}
