//! Configuration for generators and logging

use log::{debug, error};
use serde_json::{Map, Value};

use crate::callbacks::StreamingCallback;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_GPT_MODEL: &str = "gpt-3.5-turbo";
pub const HUGGING_FACE_API_BASE: &str
  = "https://api-inference.huggingface.co";
pub const DEFAULT_HUGGING_FACE_MODEL: &str
  = "HuggingFaceH4/zephyr-7b-beta";

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "CHATFORGE_LOG";

/// Install env_logger reading `CHATFORGE_LOG` (default `info`).
/// Calling it more than once is harmless.
pub fn init_logging()
{   let env = env_logger::Env::new().filter_or(LOG_ENV, "info");
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn env_key(var: &str) -> Option<String>
{   std::env::var(var).ok().filter(|key| !key.is_empty())
}

/// GPT (OpenAI chat completions) generator configuration
#[derive(Debug, Clone)]
pub struct GptConfig
{   /// API key, sent as bearer token
    pub api_key: String
  , /// Model identifier
    pub model_name: String
  , /// Prepended as a system message to string prompts
    pub system_prompt: Option<String>
  , /// API base URL
    pub api_base_url: String
  , /// Sent verbatim with every request (max_tokens, temperature, n...)
    pub model_parameters: Map<String, Value>
  , /// Enables streaming when set
    pub streaming_callback: Option<StreamingCallback>
}

impl GptConfig
{   pub fn new(api_key: impl Into<String>) -> Self
    {   GptConfig
        {   api_key: api_key.into()
          , model_name: DEFAULT_GPT_MODEL.to_string()
          , system_prompt: None
          , api_base_url: OPENAI_API_BASE.to_string()
          , model_parameters: Map::new()
          , streaming_callback: None
        }
    }

    /// Read the key from `OPENAI_API_KEY`
    pub fn from_env() -> Result<Self, crate::error::Error>
    {   match env_key("OPENAI_API_KEY")
        {   Some(key) => {
              debug!("Using OPENAI_API_KEY from environment");
              Ok(Self::new(key))
            }
          , None => {
              error!("OPENAI_API_KEY not set");
              Err(crate::error::Error::MissingApiKey(
                "OpenAI".to_string()
              ))
            }
        }
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self
    {   self.model_name = model_name.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self
    {   self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self
    {   self.api_base_url = url.into();
        self
    }

    pub fn with_parameter(mut self, key: &str, value: Value) -> Self
    {   self.model_parameters.insert(key.to_string(), value);
        self
    }

    pub fn with_streaming_callback(
      mut self
    , callback: StreamingCallback
    ) -> Self
    {   self.streaming_callback = Some(callback);
        self
    }
}

/// HuggingFace Inference (text generation) configuration
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig
{   /// Model id on the hub, e.g. "HuggingFaceH4/zephyr-7b-beta"
    pub model: String
  , /// Access token, optional for public models
    pub token: Option<String>
  , /// API base URL
    pub api_base_url: String
  , /// Prepended as a system message to string prompts
    pub system_prompt: Option<String>
  , /// Jinja chat template; `None` uses the zephyr-style default
    pub chat_template: Option<String>
  , /// Generation parameters; `n` is the number of requests made
    pub generation_kwargs: Map<String, Value>
  , /// Sent as `stop_sequences`
    pub stop_words: Vec<String>
  , /// Rendered prompts longer than this are truncated
    pub max_prompt_tokens: Option<usize>
  , /// Enables streaming when set
    pub streaming_callback: Option<StreamingCallback>
}

impl Default for HuggingFaceConfig
{   fn default() -> Self
    {   HuggingFaceConfig
        {   model: DEFAULT_HUGGING_FACE_MODEL.to_string()
          , token: None
          , api_base_url: HUGGING_FACE_API_BASE.to_string()
          , system_prompt: None
          , chat_template: None
          , generation_kwargs: Map::new()
          , stop_words: vec![]
          , max_prompt_tokens: None
          , streaming_callback: None
        }
    }
}

impl HuggingFaceConfig
{   pub fn new(model: impl Into<String>) -> Self
    {   HuggingFaceConfig
        {   model: model.into()
          , ..Default::default()
        }
    }

    /// Default config with the token read from `HF_API_TOKEN`, if set
    pub fn from_env() -> Self
    {   let token = env_key("HF_API_TOKEN");
        debug!("HF_API_TOKEN present: {}", token.is_some());
        HuggingFaceConfig
        {   token
          , ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self
    {   self.token = Some(token.into());
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self
    {   self.api_base_url = url.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self
    {   self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_chat_template(mut self, template: impl Into<String>) -> Self
    {   self.chat_template = Some(template.into());
        self
    }

    pub fn with_generation_kwarg(mut self, key: &str, value: Value) -> Self
    {   self.generation_kwargs.insert(key.to_string(), value);
        self
    }

    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where I: IntoIterator<Item = S>
        , S: Into<String>
    {   self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_prompt_tokens(mut self, max: usize) -> Self
    {   self.max_prompt_tokens = Some(max);
        self
    }

    pub fn with_streaming_callback(
      mut self
    , callback: StreamingCallback
    ) -> Self
    {   self.streaming_callback = Some(callback);
        self
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn test_gpt_defaults()
    {   let config = GptConfig::new("sk-test")
          .with_system_prompt("Be concise")
          .with_parameter("temperature", serde_json::json!(0.2));
        assert_eq!(config.model_name, DEFAULT_GPT_MODEL);
        assert_eq!(config.api_base_url, OPENAI_API_BASE);
        assert_eq!(config.system_prompt.as_deref(), Some("Be concise"));
        assert_eq!(
          config.model_parameters.get("temperature"),
          Some(&serde_json::json!(0.2))
        );
        assert!(config.streaming_callback.is_none());
    }

    #[test]
    fn test_hugging_face_defaults()
    {   let config = HuggingFaceConfig::default();
        assert_eq!(config.model, DEFAULT_HUGGING_FACE_MODEL);
        assert_eq!(config.api_base_url, HUGGING_FACE_API_BASE);
        assert!(config.stop_words.is_empty());

        let config = HuggingFaceConfig::new("org/model")
          .with_stop_words(["stop"]);
        assert_eq!(config.model, "org/model");
        assert_eq!(config.stop_words, vec!["stop".to_string()]);
    }

    #[test]
    fn test_init_logging_twice()
    {   init_logging();
        init_logging();
    }
}
