use std::fmt;

/// Custom error type for chatforge operations
/// Implements Clone so replies can be fanned out to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Required construction parameters are missing or inconsistent
    Configuration(String)
  , /// A prompt value of an unsupported shape was received
    InvalidInput(String)
  , /// A component could not be written out as a dictionary
    Serialization(String)
  , /// A component dictionary could not be turned back into a component
    Deserialization(String)
  , /// Template failed to parse or render
    Template(String)
  , /// API key is missing for a provider
    MissingApiKey(String)
  , /// HTTP request error
    HttpError(String)
  , /// API returned an error response
    ApiError(String)
  , /// Failed to parse API response
    ParseError(String)
  , /// No choices in API response
    NoChoicesInResponse
  , /// Generic error
    Other(String)
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) 
      -> fmt::Result
    {   match self
        {   Error::Configuration(msg) => {
              write!(f, "Configuration error: {}", msg)
            }
          , Error::InvalidInput(msg) => {
              write!(f, "Invalid input: {}", msg)
            }
          , Error::Serialization(msg) => {
              write!(f, "Serialization error: {}", msg)
            }
          , Error::Deserialization(msg) => {
              write!(f, "Deserialization error: {}", msg)
            }
          , Error::Template(msg) => {
              write!(f, "Template error: {}", msg)
            }
          , Error::MissingApiKey(provider) => {
              write!(f, "Missing API key for: {}", provider)
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ApiError(msg) => {
              write!(f, "API error: {}", msg)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::NoChoicesInResponse => {
              write!(f, "API response contained no choices")
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

impl From<minijinja::Error> for Error
{   fn from(e: minijinja::Error) -> Self
    {   Error::Template(e.to_string())
    }
}
