//! Renders prompts from jinja templates.
//!
//! ```
//! use chatforge::builders::PromptBuilder;
//! use chatforge::Prompt;
//!
//! let builder = PromptBuilder::from_template(
//!   "Translate the following context to {{ target_language }}. \
//!    Context: {{ snippet }}; Translation:"
//! ).unwrap();
//! let output = builder.run(None, serde_json::json!({
//!   "target_language": "spanish",
//!   "snippet": "I can't speak spanish."
//! })).unwrap();
//! assert!(matches!(output.prompt, Prompt::Text(_)));
//! ```

use std::collections::BTreeMap;

use log::{debug, error, trace};
use minijinja::Environment;
use serde::{Deserialize, Serialize};

use crate::chat_message::{ChatMessage, ChatRole, Content};
use crate::error::Error;
use crate::serialization::{
  default_from_dict, default_to_dict, Component, ComponentDict,
};
use crate::Prompt;

/// Name of the static input that carries chat messages
pub const MESSAGES_INPUT: &str = "messages";

/// Accepted type of one builder input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType
{   /// Template variable; any serializable value
    Any
  , /// Optional list of chat messages
    OptionalMessages
}

/// Output of `PromptBuilder::run`
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderOutput
{   pub prompt: Prompt
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PromptBuilderParams
{   template: String
}

#[derive(Debug, Clone)]
pub struct PromptBuilder
{   template: Option<String>
  , input_types: BTreeMap<String, InputType>
}

impl PromptBuilder
{   /// Builder whose inputs are the undeclared variables of `template`
    pub fn from_template(
      template: impl Into<String>
    ) -> Result<Self, Error>
    {   let template = template.into();
        let variables = undeclared_variables(&template)?;
        debug!(
          "PromptBuilder template declares {} variables",
          variables.len()
        );
        Ok(PromptBuilder
        {   input_types: input_types(variables)
          , template: Some(template)
        })
    }

    /// Builder that trusts `variables` as its inputs and has no
    /// template of its own; it can only render message lists.
    pub fn from_variables<I, S>(variables: I) -> Result<Self, Error>
    where I: IntoIterator<Item = S>
        , S: Into<String>
    {   let variables: Vec<String>
          = variables.into_iter().map(Into::into).collect();
        if variables.is_empty()
        {   error!("PromptBuilder created without variables");
            return Err(Error::Configuration(
              "template_variables must not be empty".to_string()
            ));
        }
        Ok(PromptBuilder
        {   template: None
          , input_types: input_types(variables)
        })
    }

    /// A non-empty variable list wins over the template
    pub fn new(
      template: Option<String>
    , template_variables: Option<Vec<String>>
    ) -> Result<Self, Error>
    {   match (template, template_variables)
        {   (_, Some(variables)) if !variables.is_empty() => {
              Self::from_variables(variables)
            }
          , (Some(template), _) if !template.is_empty() => {
              Self::from_template(template)
            }
          , _ => {
              error!("PromptBuilder needs a template or variables");
              Err(Error::Configuration(
                "Either template or template_variables must be provided."
                  .to_string()
              ))
            }
        }
    }

    pub fn template(&self) -> Option<&str>
    {   self.template.as_deref()
    }

    /// Accepted inputs: `messages` plus every dynamic variable
    pub fn input_types(&self) -> &BTreeMap<String, InputType>
    {   &self.input_types
    }

    /// Render the prompt.
    ///
    /// With a non-empty `messages` list only the last message is
    /// touched: when it comes from the user its content is rendered as
    /// a template against `variables`. Otherwise the builder's own
    /// template is rendered.
    pub fn run<S: Serialize>(
      &self
    , messages: Option<Vec<ChatMessage>>
    , variables: S
    ) -> Result<BuilderOutput, Error>
    {   let env = Environment::new();
        match messages
        {   Some(mut messages) if !messages.is_empty() => {
              if let Some(last) = messages.last_mut()
              {   render_last_user_message(&env, last, &variables)?;
              }
              Ok(BuilderOutput { prompt: Prompt::Messages(messages) })
            }
          , _ => {
              let template = self.template.as_deref().ok_or_else(|| {
                error!("PromptBuilder has no template to render");
                Error::Configuration(
                  "PromptBuilder built from variables has no template; \
                   pass messages instead".to_string()
                )
              })?;
              let prompt = env.render_str(template, &variables)?;
              trace!("Rendered prompt: {}", prompt);
              Ok(BuilderOutput { prompt: Prompt::Text(prompt) })
            }
        }
    }
}

impl Component for PromptBuilder
{   const TYPE_NAME: &'static str = "chatforge::builders::PromptBuilder";

    fn to_dict(&self) -> Result<ComponentDict, Error>
    {   let template = self.template.clone().ok_or_else(|| {
          Error::Serialization(
            "PromptBuilder built from variables can't be serialized"
              .to_string()
          )
        })?;
        default_to_dict(Self::TYPE_NAME, &PromptBuilderParams { template })
    }

    fn from_dict(data: ComponentDict) -> Result<Self, Error>
    {   let params: PromptBuilderParams
          = default_from_dict(Self::TYPE_NAME, data)?;
        Self::from_template(params.template)
    }
}

fn render_last_user_message<S: Serialize>(
  env: &Environment<'_>
, last: &mut ChatMessage
, variables: &S
) -> Result<(), Error>
{   if !last.is_from(ChatRole::User)
    {   return Ok(());
    }
    if let Some(text) = last.text()
    {   let rendered = env.render_str(text, variables)?;
        trace!("Rendered last user message: {}", rendered);
        last.content = Content::Text(rendered);
    }
    Ok(())
}

fn undeclared_variables(template: &str) -> Result<Vec<String>, Error>
{   let env = Environment::new();
    let parsed = env.template_from_str(template).map_err(|e| {
      error!("Failed to parse template: {}", e);
      Error::Template(e.to_string())
    })?;
    Ok(parsed.undeclared_variables(false).into_iter().collect())
}

fn input_types(variables: Vec<String>) -> BTreeMap<String, InputType>
{   let mut types: BTreeMap<String, InputType> = variables
      .into_iter()
      .map(|name| (name, InputType::Any))
      .collect();
    types.insert(MESSAGES_INPUT.to_string(), InputType::OptionalMessages);
    types
}
