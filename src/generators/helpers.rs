use log::warn;

use crate::chat_message::ChatMessage;
use crate::tokenizer::Tokenizer;
use crate::Prompt;

/// Cut `prompt` down to its first `max_tokens_limit` tokens.
/// Prompts already within the limit are returned as they are.
pub fn enforce_token_limit<T>(
  prompt: &str
, tokenizer: &T
, max_tokens_limit: usize
) -> String
where T: Tokenizer + ?Sized
{   let tokens = tokenizer.encode(prompt);
    let token_count = tokens.len();
    if token_count <= max_tokens_limit
    {   return prompt.to_string();
    }
    warn!(
      "The prompt has been truncated from {} tokens to {} tokens so that \
       the prompt fits within the max token limit. Reduce the length of \
       the prompt to prevent it from being cut off.",
      token_count, max_tokens_limit
    );
    tokenizer.decode(&tokens[..max_tokens_limit])
}

/// Message list sent for `prompt`. A string becomes a user message,
/// preceded by `system_prompt` when one is configured.
pub(crate) fn normalize_prompt(
  prompt: Prompt
, system_prompt: Option<&str>
) -> Vec<ChatMessage>
{   match prompt
    {   Prompt::Text(text) => {
          let message = ChatMessage::from_user(text);
          match system_prompt.filter(|s| !s.is_empty())
          {   Some(system) => vec![ChatMessage::from_system(system), message]
            , None => vec![message]
          }
        }
      , Prompt::Messages(messages) => messages
    }
}
