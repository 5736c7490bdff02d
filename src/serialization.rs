//! Dictionary form of configured components:
//! `{"type": <component path>, "init_parameters": {...}}`

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDict
{   #[serde(rename = "type")]
    pub type_name: String
  , #[serde(default)]
    pub init_parameters: Map<String, Value>
}

/// A component that can be persisted and rebuilt from its init parameters
pub trait Component: Sized
{   const TYPE_NAME: &'static str;

    fn to_dict(&self) -> Result<ComponentDict, Error>;

    fn from_dict(data: ComponentDict) -> Result<Self, Error>;
}

/// Serialize `params` as the init parameters of `type_name`.
/// `params` must serialize to a JSON object.
pub fn default_to_dict<P: Serialize>(
  type_name: &str
, params: &P
) -> Result<ComponentDict, Error>
{   debug!("Serializing component {}", type_name);
    match serde_json::to_value(params)
    {   Ok(Value::Object(init_parameters)) => {
          Ok(ComponentDict
          {   type_name: type_name.to_string()
            , init_parameters
          })
        }
      , Ok(other) => {
          error!("Init parameters are not an object: {}", other);
          Err(Error::Serialization(format!(
            "init parameters of {} must be an object", type_name
          )))
        }
      , Err(e) => Err(Error::Serialization(e.to_string()))
    }
}

/// Check the type tag and decode the init parameters
pub fn default_from_dict<P: DeserializeOwned>(
  type_name: &str
, data: ComponentDict
) -> Result<P, Error>
{   if data.type_name != type_name
    {   error!(
          "Expected component {}, got {}",
          type_name, data.type_name
        );
        return Err(Error::Deserialization(format!(
          "Class '{}' can't be deserialized as '{}'",
          data.type_name, type_name
        )));
    }
    serde_json::from_value(Value::Object(data.init_parameters))
      .map_err(|e| Error::Deserialization(e.to_string()))
}
