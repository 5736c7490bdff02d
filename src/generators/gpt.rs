//! Chat generator for GPT models served by the OpenAI chat API

use std::collections::BTreeMap;

use log::{debug, error, trace};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::helpers::normalize_prompt;
use crate::callbacks::{resolve_optional, StreamingCallback};
use crate::chat_message::{ChatMessage, Content, StreamingChunk};
use crate::config::{GptConfig, DEFAULT_GPT_MODEL, OPENAI_API_BASE};
use crate::error::Error;
use crate::providers::{ChatCompletionApi, OpenAiClient};
use crate::request::{
  ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse,
  Choice, WireMessage,
};
use crate::serialization::{
  default_from_dict, default_to_dict, Component, ComponentDict,
};
use crate::{GeneratorOutput, Prompt};

const FUNCTION_CALL: &str = "function_call";

/// Queries GPT models with a string prompt or a chat history and maps
/// every returned choice to an assistant `ChatMessage`.
pub struct GptGenerator<A = OpenAiClient>
{   config: GptConfig
  , api: A
}

impl GptGenerator<OpenAiClient>
{   pub fn new(config: GptConfig) -> Self
    {   debug!("Creating GptGenerator for: {}", config.model_name);
        let api = OpenAiClient::new(
          config.api_key.clone(),
          config.api_base_url.clone()
        );
        GptGenerator { config, api }
    }
}

impl<A: ChatCompletionApi> GptGenerator<A>
{   /// Generator talking to a custom completion endpoint
    pub fn with_api(config: GptConfig, api: A) -> Self
    {   GptGenerator { config, api }
    }

    pub fn config(&self) -> &GptConfig
    {   &self.config
    }

    /// Request body for `messages`
    pub fn build_request(
      &self
    , messages: &[ChatMessage]
    ) -> ChatCompletionRequest
    {   ChatCompletionRequest
        {   model: self.config.model_name.clone()
          , messages: messages.iter().map(WireMessage::from).collect()
          , stream: self.config.streaming_callback.is_some()
          , parameters: self.config.model_parameters.clone()
        }
    }

    pub async fn run(
      &self
    , prompt: impl Into<Prompt>
    ) -> Result<GeneratorOutput, Error>
    {   let messages = normalize_prompt(
          prompt.into(),
          self.config.system_prompt.as_deref()
        );
        let request = self.build_request(&messages);
        debug!(
          "Sending {} messages to {}",
          request.messages.len(), request.model
        );

        let replies = match &self.config.streaming_callback
        {   Some(callback) => self.run_streaming(&request, callback).await?
          , None => {
              let completion
                = self.api.create_completion(&request).await?;
              build_replies(&completion)?
            }
        };
        debug!("Received {} replies", replies.len());
        Ok(GeneratorOutput { replies })
    }

    async fn run_streaming(
      &self
    , request: &ChatCompletionRequest
    , callback: &StreamingCallback
    ) -> Result<Vec<ChatMessage>, Error>
    {   let mut choices: BTreeMap<u32, StreamedChoice> = BTreeMap::new();
        let mut model = self.config.model_name.clone();

        self.api.create_completion_stream(request, &mut |chunk: ChatCompletionChunk| {
          model = chunk.model;
          for choice in chunk.choices
          {   let streamed = choices.entry(choice.index).or_default();
              if choice.finish_reason.is_some()
              {   streamed.finish_reason = choice.finish_reason;
              }
              let content = choice.delta.content.unwrap_or_default();

              let mut piece = StreamingChunk::new(content);
              piece.metadata.insert("model".to_string(), json!(model));
              piece.metadata.insert("index".to_string(), json!(choice.index));
              piece.metadata.insert(
                "finish_reason".to_string(),
                json!(streamed.finish_reason)
              );
              callback.call(&piece);
              streamed.content.push_str(&piece.content);
          }
        }).await?;

        trace!("Stream produced {} choices", choices.len());
        Ok(choices.into_iter().map(|(index, streamed)| {
          let mut message = ChatMessage::from_assistant(streamed.content);
          message.metadata = reply_metadata(
            &model, index, streamed.finish_reason, Map::new()
          );
          message
        }).collect())
    }
}

#[derive(Debug, Default)]
struct StreamedChoice
{   content: String
  , finish_reason: Option<String>
}

fn reply_metadata(
  model: &str
, index: u32
, finish_reason: Option<String>
, usage: Map<String, Value>
) -> Map<String, Value>
{   let mut metadata = Map::new();
    metadata.insert("model".to_string(), json!(model));
    metadata.insert("index".to_string(), json!(index));
    metadata.insert("finish_reason".to_string(), json!(finish_reason));
    metadata.insert("usage".to_string(), Value::Object(usage));
    metadata
}

/// One assistant message per choice, in API order
pub fn build_replies(
  completion: &ChatCompletionResponse
) -> Result<Vec<ChatMessage>, Error>
{   completion.choices
      .iter()
      .map(|choice| build_reply(completion, choice))
      .collect()
}

fn build_reply(
  completion: &ChatCompletionResponse
, choice: &Choice
) -> Result<ChatMessage, Error>
{   let content = if choice.finish_reason.as_deref() == Some(FUNCTION_CALL)
    {   let call = choice.message.function_call.clone().ok_or_else(|| {
          error!("function_call finish without payload");
          Error::ParseError(
            "finish_reason is function_call but no function_call was returned"
              .to_string()
          )
        })?;
        Content::FunctionCall(call)
    } else
    {   Content::Text(choice.message.content.clone().unwrap_or_default())
    };

    let mut message = ChatMessage::from_assistant(content);
    message.metadata = reply_metadata(
      &completion.model,
      choice.index,
      choice.finish_reason.clone(),
      completion.usage.clone()
    );
    Ok(message)
}

fn default_model_name() -> String
{   DEFAULT_GPT_MODEL.to_string()
}

fn default_api_base_url() -> String
{   OPENAI_API_BASE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GptInitParameters
{   api_key: String
  , #[serde(default = "default_model_name")]
    model_name: String
  , #[serde(default)]
    system_prompt: Option<String>
  , #[serde(default)]
    streaming_callback: Option<String>
  , #[serde(default = "default_api_base_url")]
    api_base_url: String
  , #[serde(flatten)]
    model_parameters: Map<String, Value>
}

impl Component for GptGenerator<OpenAiClient>
{   const TYPE_NAME: &'static str = "chatforge::generators::GptGenerator";

    fn to_dict(&self) -> Result<ComponentDict, Error>
    {   let config = &self.config;
        default_to_dict(Self::TYPE_NAME, &GptInitParameters
        {   api_key: config.api_key.clone()
          , model_name: config.model_name.clone()
          , system_prompt: config.system_prompt.clone()
          , streaming_callback: config.streaming_callback
              .as_ref()
              .and_then(|callback| callback.key().map(str::to_string))
          , api_base_url: config.api_base_url.clone()
          , model_parameters: config.model_parameters.clone()
        })
    }

    fn from_dict(data: ComponentDict) -> Result<Self, Error>
    {   let params: GptInitParameters
          = default_from_dict(Self::TYPE_NAME, data)?;
        let streaming_callback
          = resolve_optional(params.streaming_callback.as_deref())?;
        Ok(GptGenerator::new(GptConfig
        {   api_key: params.api_key
          , model_name: params.model_name
          , system_prompt: params.system_prompt
          , api_base_url: params.api_base_url
          , model_parameters: params.model_parameters
          , streaming_callback
        }))
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::callbacks::{register_streaming_callback, PRINT_STREAMING_CHUNK};
    use crate::chat_message::{ChatRole, FunctionCall};
    use crate::request::ResponseMessage;

    fn completion(choices: Vec<Choice>) -> ChatCompletionResponse
    {   let mut usage = Map::new();
        usage.insert("prompt_tokens".to_string(), json!(57));
        usage.insert("completion_tokens".to_string(), json!(40));
        usage.insert("total_tokens".to_string(), json!(97));
        ChatCompletionResponse
        {   model: "gpt-3.5-turbo-0613".to_string()
          , choices
          , usage
        }
    }

    fn text_choice(index: u32, text: &str) -> Choice
    {   Choice
        {   index
          , message: ResponseMessage
            {   content: Some(text.to_string())
              , function_call: None
            }
          , finish_reason: Some("stop".to_string())
        }
    }

    #[test]
    fn test_request_with_system_prompt()
    {   let generator = GptGenerator::new(
          GptConfig::new("sk-test")
            .with_system_prompt("Be concise")
            .with_parameter("max_tokens", json!(10))
        );
        let messages = normalize_prompt(
          Prompt::from("Hello"),
          generator.config().system_prompt.as_deref()
        );
        let request = generator.build_request(&messages);
        assert_eq!(
          serde_json::to_value(&request).unwrap(),
          json!({
            "model": "gpt-3.5-turbo",
            "messages": [
              {"role": "system", "content": "Be concise"},
              {"role": "user", "content": "Hello"}
            ],
            "stream": false,
            "max_tokens": 10
          })
        );
    }

    #[test]
    fn test_replies_follow_choice_order()
    {   let replies = build_replies(&completion(vec![
          text_choice(0, "first"),
          text_choice(1, "second"),
        ])).unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].text(), Some("first"));
        assert_eq!(replies[1].text(), Some("second"));
        assert!(replies[1].is_from(ChatRole::Assistant));
        assert_eq!(replies[1].metadata["model"], json!("gpt-3.5-turbo-0613"));
        assert_eq!(replies[1].metadata["index"], json!(1));
        assert_eq!(replies[1].metadata["finish_reason"], json!("stop"));
        assert_eq!(replies[1].metadata["usage"]["total_tokens"], json!(97));
    }

    #[test]
    fn test_function_call_reply()
    {   let call = FunctionCall
        {   name: "get_weather".to_string()
          , arguments: "{\"city\": \"Berlin\"}".to_string()
        };
        let choice = Choice
        {   index: 0
          , message: ResponseMessage
            {   content: None
              , function_call: Some(call.clone())
            }
          , finish_reason: Some(FUNCTION_CALL.to_string())
        };
        let replies = build_replies(&completion(vec![choice])).unwrap();
        assert_eq!(replies[0].content, Content::FunctionCall(call));
    }

    #[test]
    fn test_function_call_without_payload()
    {   let mut choice = text_choice(0, "");
        choice.finish_reason = Some(FUNCTION_CALL.to_string());
        let err = build_replies(&completion(vec![choice])).unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    /// Replays canned chunks; records what it was asked
    struct FakeApi
    {   chunks: Vec<ChatCompletionChunk>
      , seen: std::sync::Mutex<Vec<ChatCompletionRequest>>
    }

    #[async_trait::async_trait]
    impl ChatCompletionApi for FakeApi
    {   async fn create_completion(
          &self
        , request: &ChatCompletionRequest
        ) -> Result<ChatCompletionResponse, Error>
        {   self.seen.lock().unwrap().push(request.clone());
            Ok(completion(vec![text_choice(0, "plain")]))
        }

        async fn create_completion_stream(
          &self
        , request: &ChatCompletionRequest
        , on_chunk: &mut (dyn FnMut(ChatCompletionChunk) + Send)
        ) -> Result<(), Error>
        {   self.seen.lock().unwrap().push(request.clone());
            for chunk in self.chunks.clone()
            {   on_chunk(chunk);
            }
            Ok(())
        }
    }

    fn chunk(index: u32, content: &str, finish: Option<&str>) -> ChatCompletionChunk
    {   serde_json::from_value(json!({
          "model": "gpt-4-0613",
          "choices": [{
            "index": index,
            "delta": {"content": content},
            "finish_reason": finish
          }]
        })).unwrap()
    }

    #[test]
    fn test_stream_groups_choices_by_index()
    {   let api = FakeApi
        {   chunks: vec![
              chunk(0, "Hel", None),
              chunk(1, "Bon", None),
              chunk(0, "lo", Some("stop")),
              chunk(1, "jour", Some("length")),
            ]
          , seen: std::sync::Mutex::new(vec![])
        };
        let pieces = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
        let sink = std::sync::Arc::clone(&pieces);
        let generator = GptGenerator::with_api(
          GptConfig::new("sk-test").with_streaming_callback(
            StreamingCallback::anonymous(move |piece| {
              sink.lock().unwrap().push(piece.content.clone());
            })
          ),
          api
        );

        let output = tokio_test::block_on(generator.run("Greet me")).unwrap();
        assert_eq!(*pieces.lock().unwrap(), vec!["Hel", "Bon", "lo", "jour"]);
        assert_eq!(output.replies.len(), 2);
        assert_eq!(output.replies[0].text(), Some("Hello"));
        assert_eq!(output.replies[0].metadata["finish_reason"], json!("stop"));
        assert_eq!(output.replies[1].text(), Some("Bonjour"));
        assert_eq!(output.replies[1].metadata["index"], json!(1));
        assert_eq!(output.replies[1].metadata["model"], json!("gpt-4-0613"));
        assert_eq!(output.replies[1].metadata["usage"], json!({}));
        assert!(generator.api.seen.lock().unwrap()[0].stream);
    }

    #[test]
    fn test_run_without_callback_does_not_stream()
    {   let generator = GptGenerator::with_api(
          GptConfig::new("sk-test"),
          FakeApi { chunks: vec![], seen: std::sync::Mutex::new(vec![]) }
        );
        let output = tokio_test::block_on(
          generator.run(vec![ChatMessage::from_user("Hi")])
        ).unwrap();
        assert_eq!(output.replies[0].text(), Some("plain"));
        let seen = generator.api.seen.lock().unwrap();
        assert!(!seen[0].stream);
        assert_eq!(seen[0].messages.len(), 1);
    }

    #[test]
    fn test_to_dict()
    {   let callback = register_streaming_callback(
          "gpt_tests::noop", |_| {}
        ).unwrap();
        let generator = GptGenerator::new(
          GptConfig::new("sk-test")
            .with_model_name("gpt-4")
            .with_system_prompt("Be concise")
            .with_parameter("temperature", json!(0.5))
            .with_streaming_callback(callback)
        );
        let dict = generator.to_dict().unwrap();
        assert_eq!(dict.type_name, "chatforge::generators::GptGenerator");
        assert_eq!(
          Value::Object(dict.init_parameters),
          json!({
            "api_key": "sk-test",
            "model_name": "gpt-4",
            "system_prompt": "Be concise",
            "streaming_callback": "gpt_tests::noop",
            "api_base_url": OPENAI_API_BASE,
            "temperature": 0.5
          })
        );
    }

    #[test]
    fn test_anonymous_callback_serializes_as_null()
    {   let generator = GptGenerator::new(
          GptConfig::new("sk-test")
            .with_streaming_callback(StreamingCallback::anonymous(|_| {}))
        );
        let dict = generator.to_dict().unwrap();
        assert_eq!(dict.init_parameters["streaming_callback"], Value::Null);
    }

    #[test]
    fn test_from_dict()
    {   let dict: ComponentDict = serde_json::from_value(json!({
          "type": "chatforge::generators::GptGenerator",
          "init_parameters": {
            "api_key": "sk-test",
            "model_name": "gpt-4",
            "streaming_callback": PRINT_STREAMING_CHUNK,
            "max_tokens": 10
          }
        })).unwrap();
        let generator = <GptGenerator as Component>::from_dict(dict).unwrap();
        let config = generator.config();
        assert_eq!(config.model_name, "gpt-4");
        assert_eq!(config.api_base_url, OPENAI_API_BASE);
        assert_eq!(config.system_prompt, None);
        assert_eq!(config.model_parameters.get("max_tokens"), Some(&json!(10)));
        assert_eq!(
          config.streaming_callback.as_ref().and_then(|c| c.key()),
          Some(PRINT_STREAMING_CHUNK)
        );
    }

    #[test]
    fn test_from_dict_with_unknown_callback()
    {   let dict: ComponentDict = serde_json::from_value(json!({
          "type": "chatforge::generators::GptGenerator",
          "init_parameters": {
            "api_key": "sk-test",
            "streaming_callback": "nowhere::to_be_found"
          }
        })).unwrap();
        let err = <GptGenerator as Component>::from_dict(dict).err();
        assert!(matches!(err, Some(Error::Deserialization(_))));
    }
}
