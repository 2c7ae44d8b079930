//! Endpoint and model catalog served by the gateway docs API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::debug;

/// Root of the docs configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiDocsConfig
{   #[serde(default)]
    pub endpoints: Vec<EndpointConfig>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig
{   #[serde(rename = "type")]
    pub kind: crate::EndpointType
  , #[serde(default)]
    pub name: String
  , #[serde(default)]
    pub description: String
  , /// Absolute URL or gateway path, e.g. `/v1/video/generations`
    pub endpoint: String
  , #[serde(default = "default_method")]
    pub method: String
  , #[serde(default)]
    pub models: Vec<ModelDocConfig>
  , #[serde(default)]
    pub request: ExampleDocConfig
  , #[serde(default)]
    pub response: ExampleDocConfig
}

fn default_method() -> String
{   "POST".to_string()
}

/// Per-model metadata used to seed request defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDocConfig
{   pub id: String
  , #[serde(default)]
    pub name: String
  , #[serde(default)]
    pub vendor: String
  , /// text2video, image2video, text2image, ...
    #[serde(rename = "type", default)]
    pub kind: String
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_duration: Option<u32>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_resolution: Option<String>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ratio: Option<String>
  , #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_durations: Vec<u32>
  , #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_resolutions: Vec<String>
  , #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_ratios: Vec<String>
  , #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_sizes: Vec<String>
  , #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterConfig>
}

impl ModelDocConfig
{   /// Bare model with no metadata beyond its id
    pub fn named(id: impl Into<String>) -> Self
    {   ModelDocConfig
        {   id: id.into()
          , ..ModelDocConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig
{   pub name: String
  , /// string, int, bool, array
    #[serde(rename = "type", default)]
    pub kind: String
  , #[serde(default)]
    pub required: bool
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>
  , #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleDocConfig
{   #[serde(default)]
    pub content_type: String
  , #[serde(default)]
    pub example: Value
}

impl ApiDocsConfig
{   pub fn from_json(json: &str)
      -> Result<Self, crate::error::Error>
    {   let config: ApiDocsConfig = serde_json::from_str(json)?;
        debug!("Catalog loaded with {} endpoints", config.endpoints.len());
        Ok(config)
    }

    /// Accepts both the bare config and the `{ success, data }` envelope
    /// returned by the docs API
    pub fn from_value(value: Value)
      -> Result<Self, crate::error::Error>
    {   let inner = match value
        {   Value::Object(mut map) if map.contains_key("data")
              && !map.contains_key("endpoints") => {
              map.remove("data").unwrap_or(Value::Null)
            }
          , other => other
        };
        Ok(serde_json::from_value(inner)?)
    }

    /// First endpoint of the given type
    pub fn endpoint_for(&self, kind: crate::EndpointType)
      -> Option<&EndpointConfig>
    {   self.endpoints.iter().find(|e| e.kind == kind)
    }

    /// Find the endpoint that lists `model_id`, optionally
    /// restricted to one endpoint type
    pub fn find_model(
      &self
    , model_id: &str
    , kind: Option<crate::EndpointType>
    ) -> Option<(&EndpointConfig, &ModelDocConfig)>
    {   self.endpoints
          .iter()
          .filter(|e| kind.map_or(true, |k| e.kind == k))
          .find_map(|e| e.model(model_id).map(|m| (e, m)))
    }
}

impl EndpointConfig
{   pub fn model(&self, model_id: &str) -> Option<&ModelDocConfig>
    {   self.models.iter().find(|m| m.id == model_id)
    }
}
