//! Wire types of the remote completion APIs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chat_message::{ChatMessage, ChatRole, Content, FunctionCall};

// ===== OpenAI chat completions =====

/// Outbound message; empty fields are left out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage
{   pub role: ChatRole
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>
}

impl From<&ChatMessage> for WireMessage
{   fn from(message: &ChatMessage) -> Self
    {   let (content, function_call) = match &message.content
        {   Content::Text(text) if text.is_empty() => (None, None)
          , Content::Text(text) => (Some(text.clone()), None)
          , Content::FunctionCall(call) => (None, Some(call.clone()))
        };
        WireMessage
        {   role: message.role
          , content
          , name: message.name.clone().filter(|name| !name.is_empty())
          , function_call
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest
{   pub model: String
  , pub messages: Vec<WireMessage>
  , pub stream: bool
  , /// Open model parameters, flattened into the body
    #[serde(flatten)]
    pub parameters: Map<String, Value>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage
{   #[serde(default)]
    pub content: Option<String>
  , #[serde(default)]
    pub function_call: Option<FunctionCall>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice
{   pub index: u32
  , pub message: ResponseMessage
  , #[serde(default)]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse
{   pub model: String
  , pub choices: Vec<Choice>
  , /// Token accounting, kept as returned
    #[serde(default)]
    pub usage: Map<String, Value>
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Delta
{   #[serde(default)]
    pub role: Option<String>
  , #[serde(default)]
    pub content: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice
{   pub index: u32
  , #[serde(default)]
    pub delta: Delta
  , #[serde(default)]
    pub finish_reason: Option<String>
}

/// One `data:` event of a streamed chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk
{   pub model: String
  , pub choices: Vec<ChunkChoice>
}

// ===== HuggingFace text generation =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationRequest
{   pub inputs: String
  , pub parameters: Map<String, Value>
  , pub stream: bool
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationDetails
{   #[serde(default)]
    pub finish_reason: Option<String>
  , #[serde(default)]
    pub generated_tokens: Option<usize>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationResponse
{   pub generated_text: String
  , #[serde(default)]
    pub details: Option<GenerationDetails>
}

/// The hosted API answers with a list, a dedicated endpoint with an object
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextGenerationBody
{   Many(Vec<TextGenerationResponse>)
  , One(TextGenerationResponse)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamToken
{   pub id: u32
  , pub text: String
  , #[serde(default)]
    pub logprob: Option<f32>
  , #[serde(default)]
    pub special: bool
}

/// One `data:` event of a streamed text generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationStreamEvent
{   pub token: StreamToken
  , #[serde(default)]
    pub generated_text: Option<String>
  , #[serde(default)]
    pub details: Option<GenerationDetails>
}

#[cfg(test)]
mod tests
{   use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_message_drops_empty_fields()
    {   let wire = WireMessage::from(&ChatMessage::from_user("Hello"));
        assert_eq!(
          serde_json::to_value(&wire).unwrap(),
          json!({"role": "user", "content": "Hello"})
        );

        let wire = WireMessage::from(&ChatMessage::from_assistant(""));
        assert_eq!(
          serde_json::to_value(&wire).unwrap(),
          json!({"role": "assistant"})
        );

        let wire = WireMessage::from(
          &ChatMessage::from_function("22 degrees", "get_weather")
        );
        assert_eq!(
          serde_json::to_value(&wire).unwrap(),
          json!({
            "role": "function",
            "content": "22 degrees",
            "name": "get_weather"
          })
        );
    }

    #[test]
    fn test_request_flattens_parameters()
    {   let mut parameters = Map::new();
        parameters.insert("max_tokens".to_string(), json!(10));
        let request = ChatCompletionRequest
        {   model: "gpt-3.5-turbo".to_string()
          , messages: vec![]
          , stream: false
          , parameters
        };
        assert_eq!(
          serde_json::to_value(&request).unwrap(),
          json!({
            "model": "gpt-3.5-turbo",
            "messages": [],
            "stream": false,
            "max_tokens": 10
          })
        );
    }

    #[test]
    fn test_function_call_choice()
    {   let choice: Choice = serde_json::from_value(json!({
          "index": 0,
          "message": {
            "role": "assistant",
            "content": null,
            "function_call": {"name": "f", "arguments": "{}"}
          },
          "finish_reason": "function_call"
        })).unwrap();
        assert_eq!(choice.message.content, None);
        assert_eq!(
          choice.message.function_call,
          Some(FunctionCall
          {   name: "f".to_string()
            , arguments: "{}".to_string()
          })
        );
    }

    #[test]
    fn test_text_generation_body_shapes()
    {   let many: TextGenerationBody = serde_json::from_value(json!([
          {"generated_text": "hi", "details": {"finish_reason": "length", "generated_tokens": 1}}
        ])).unwrap();
        assert!(matches!(many, TextGenerationBody::Many(ref v) if v.len() == 1));

        let one: TextGenerationBody = serde_json::from_value(
          json!({"generated_text": "hi"})
        ).unwrap();
        assert!(matches!(one, TextGenerationBody::One(_)));
    }
}
