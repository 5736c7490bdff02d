//! Chat message data types shared by builders and generators

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Speaker of a single conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole
{   Assistant
  , User
  , System
  , Function
}

impl ChatRole
{   pub fn as_str(&self) -> &'static str
    {   match self
        {   ChatRole::Assistant => "assistant"
          , ChatRole::User => "user"
          , ChatRole::System => "system"
          , ChatRole::Function => "function"
        }
    }
}

/// Function invocation requested by the model.
/// `arguments` is the JSON string exactly as the API returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall
{   pub name: String
  , pub arguments: String
}

/// Body of a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content
{   Text(String)
  , FunctionCall(FunctionCall)
}

impl Content
{   /// The text of the message, if it is a plain text message
    pub fn as_text(&self) -> Option<&str>
    {   match self
        {   Content::Text(text) => Some(text)
          , Content::FunctionCall(_) => None
        }
    }
}

impl From<String> for Content
{   fn from(s: String) -> Self
    {   Content::Text(s)
    }
}

impl From<&str> for Content
{   fn from(s: &str) -> Self
    {   Content::Text(s.to_string())
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub content: Content
  , pub role: ChatRole
  , /// Only set for function messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>
  , #[serde(default)]
    pub metadata: Map<String, Value>
}

impl ChatMessage
{   fn with_role(content: Content, role: ChatRole) -> Self
    {   ChatMessage
        {   content
          , role
          , name: None
          , metadata: Map::new()
        }
    }

    pub fn from_assistant(content: impl Into<Content>) -> Self
    {   Self::with_role(content.into(), ChatRole::Assistant)
    }

    pub fn from_user(content: impl Into<String>) -> Self
    {   Self::with_role(Content::Text(content.into()), ChatRole::User)
    }

    pub fn from_system(content: impl Into<String>) -> Self
    {   Self::with_role(Content::Text(content.into()), ChatRole::System)
    }

    pub fn from_function(
      content: impl Into<String>
    , name: impl Into<String>
    ) -> Self
    {   ChatMessage
        {   name: Some(name.into())
          , ..Self::with_role(
              Content::Text(content.into()),
              ChatRole::Function
            )
        }
    }

    pub fn is_from(&self, role: ChatRole) -> bool
    {   self.role == role
    }

    /// Shortcut for `self.content.as_text()`
    pub fn text(&self) -> Option<&str>
    {   self.content.as_text()
    }
}

/// Incremental piece of a streamed reply, handed to streaming callbacks
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamingChunk
{   pub content: String
  , #[serde(default)]
    pub metadata: Map<String, Value>
}

impl StreamingChunk
{   pub fn new(content: impl Into<String>) -> Self
    {   StreamingChunk
        {   content: content.into()
          , metadata: Map::new()
        }
    }
}
