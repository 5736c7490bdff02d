pub mod error;
pub mod config;
pub mod chat_message;
pub mod callbacks;
pub mod serialization;
pub mod tokenizer;
pub mod builders;
pub mod request;
pub mod providers;
pub mod generators;

use serde_json::{Map, Value};

pub use chat_message::{ChatMessage, ChatRole, Content, FunctionCall, StreamingChunk};
pub use callbacks::{
  register_streaming_callback, resolve_streaming_callback, StreamingCallback,
};
pub use error::Error;
pub use serialization::{Component, ComponentDict};

/*

chatforge renders prompts from templates and sends them, as plain text
or as chat message lists, to remote LLM completion APIs.

chatforge/
├── Cargo.toml
├── src/
│   ├── lib.rs            # Prompt / output types and re-exports
│   ├── error.rs          # Error enum
│   ├── config.rs         # Generator configuration, logging setup
│   ├── chat_message.rs   # ChatMessage, ChatRole, StreamingChunk
│   ├── callbacks.rs      # Streaming callback registry
│   ├── serialization.rs  # {"type", "init_parameters"} dictionaries
│   ├── tokenizer.rs      # Tokenizer trait
│   ├── builders/         # PromptBuilder
│   ├── request.rs        # Wire types of the remote APIs
│   ├── providers/        # HTTP clients (OpenAI, HuggingFace)
│   └── generators/       # GPT and HuggingFace chat generators
└── tests/

*/

/// CHATFORGE API INTERFACE:

/// What a generator is asked to complete: either a bare string or a
/// conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt
{   Text(String)
  , Messages(Vec<ChatMessage>)
}

impl From<String> for Prompt
{   fn from(s: String) -> Self
    {   Prompt::Text(s)
    }
}

impl From<&str> for Prompt
{   fn from(s: &str) -> Self
    {   Prompt::Text(s.to_string())
    }
}

impl From<Vec<ChatMessage>> for Prompt
{   fn from(messages: Vec<ChatMessage>) -> Self
    {   Prompt::Messages(messages)
    }
}

/// Validates untyped pipeline input: a JSON string, or an array whose
/// every element is a chat message.
impl TryFrom<Value> for Prompt
{   type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error>
    {   let received = match &value
        {   Value::String(_) => None
          , Value::Array(items) => {
              let all_messages = items.iter().all(|item| {
                serde_json::from_value::<ChatMessage>(item.clone()).is_ok()
              });
              if all_messages
              {   None
              } else
              {   Some("list with non-ChatMessage elements")
              }
            }
          , Value::Null => Some("null")
          , Value::Bool(_) => Some("bool")
          , Value::Number(_) => Some("number")
          , Value::Object(_) => Some("object")
        };
        if let Some(received) = received
        {   log::error!("Invalid prompt of type {}", received);
            return Err(Error::InvalidInput(format!(
              "Invalid prompt. Expected either a string or a list of \
               ChatMessage(s), but got {}",
              received
            )));
        }
        match value
        {   Value::String(text) => Ok(Prompt::Text(text))
          , other => serde_json::from_value(other)
              .map(Prompt::Messages)
              .map_err(|e| Error::InvalidInput(e.to_string()))
        }
    }
}

/// Output of every chat generator: one message per completion choice
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOutput
{   pub replies: Vec<ChatMessage>
}

/// Output of text generators: replies with parallel metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextGeneratorOutput
{   pub replies: Vec<String>
  , pub metadata: Vec<Map<String, Value>>
}
