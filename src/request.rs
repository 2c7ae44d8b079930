//! Request context and per-endpoint request body assembly

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use log::{debug, trace};

use crate::catalog::{EndpointConfig, ModelDocConfig};
use crate::EndpointType;

/// Raw form values keyed by parameter name
pub type FormValues = Map<String, Value>;

const DEFAULT_CHAT_PROMPT: &str = "Hello!";
const DEFAULT_VIDEO_PROMPT: &str = "A cat running on the grass";
const DEFAULT_IMAGE_PROMPT: &str = "A cute cat";
const DEFAULT_INPUT: &str = "Hello, world!";

const VIDEO_STRING_FIELDS: &[&str] = &[
  "resolution", "aspect_ratio", "first_frame", "last_frame", "image"
];
const VIDEO_STYLE_FIELDS: &[&str] = &[
  "mode", "motion", "style", "movement_amplitude"
, "negative_prompt", "notifyHook"
];
const VIDEO_FLAG_FIELDS: &[&str] = &[
  "generate_audio", "prompt_optimizer", "aigc_watermark"
, "watermark", "private", "hd"
];
const VIDEO_LIST_FIELDS: &[&str] = &["images", "subject_reference"];

/// Body of one generation request, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationRequest(Map<String, Value>);

impl GenerationRequest
{   pub fn model(&self) -> Option<&str>
    {   self.0.get("model").and_then(Value::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Value>
    {   self.0.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value>
    {   &self.0
    }

    pub fn to_value(&self) -> Value
    {   Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for GenerationRequest
{   fn from(map: Map<String, Value>) -> Self
    {   GenerationRequest(map)
    }
}

/// Everything one submission needs: target endpoint, model metadata,
/// form values and the selected stored token
#[derive(Debug, Clone)]
pub struct RequestContext
{   pub endpoint: String
  , pub kind: EndpointType
  , pub model: ModelDocConfig
  , pub form: FormValues
  , pub selected_token: Option<String>
}

impl RequestContext
{   /// New context with form values seeded from the model defaults
    pub fn new(
      endpoint: impl Into<String>
    , kind: EndpointType
    , model: ModelDocConfig
    ) -> Self
    {   let form = default_form_values(kind, &model);
        RequestContext
        {   endpoint: endpoint.into()
          , kind
          , model
          , form
          , selected_token: None
        }
    }

    pub fn from_catalog(
      endpoint: &EndpointConfig
    , model: &ModelDocConfig
    ) -> Self
    {   RequestContext::new(
          endpoint.endpoint.clone()
        , endpoint.kind
        , model.clone()
        )
    }

    /// Set one form value
    pub fn set(&mut self, name: impl Into<String>, value: Value)
      -> &mut Self
    {   self.form.insert(name.into(), value);
        self
    }

    /// Remove a form value so its default is no longer sent
    pub fn unset(&mut self, name: &str) -> &mut Self
    {   self.form.remove(name);
        self
    }

    pub fn select_token(&mut self, token: Option<String>) -> &mut Self
    {   self.selected_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Selected token first, then the free-text `api_key` value
    pub fn api_key(&self) -> Result<String, crate::error::Error>
    {   if let Some(token) = &self.selected_token
        {   if !token.is_empty()
            {   return Ok(token.clone());
            }
        }
        match self.form.get("api_key").and_then(Value::as_str)
        {   Some(key) if !key.is_empty() => Ok(key.to_string())
          , _ => Err(crate::error::Error::MissingApiKey)
        }
    }

    pub fn build_body(&self) -> GenerationRequest
    {   build_request_body(self.kind, &self.model.id, &self.form)
    }
}

/// Default form values for an endpoint type and model
pub fn default_form_values(
  kind: EndpointType
, model: &ModelDocConfig
) -> FormValues
{   let mut values = Map::new();
    values.insert("model".into(), json!(model.id));

    match kind
    {   EndpointType::Chat => {
          values.insert("prompt".into(), json!(DEFAULT_CHAT_PROMPT));
          values.insert("temperature".into(), json!(0.7));
          values.insert("stream".into(), json!(false));
          values.insert("max_tokens".into(), json!(1024));
        }
      , EndpointType::Video => {
          values.insert("prompt".into(), json!(DEFAULT_VIDEO_PROMPT));
          values.insert(
            "duration".into()
          , json!(model.default_duration.unwrap_or(5))
          );
          let resolution = model.default_resolution.clone()
            .or_else(|| model.supported_resolutions.first().cloned());
          if let Some(resolution) = resolution
          {   values.insert("resolution".into(), json!(resolution));
          }
          let ratio = model.supported_ratios.first()
            .map(String::as_str)
            .unwrap_or("16:9");
          values.insert("aspect_ratio".into(), json!(ratio));
        }
      , EndpointType::Image => {
          values.insert("prompt".into(), json!(DEFAULT_IMAGE_PROMPT));
          let size = model.supported_sizes.first()
            .map(String::as_str)
            .unwrap_or("1024x1024");
          values.insert("size".into(), json!(size));
          values.insert("n".into(), json!(1));
        }
      , EndpointType::Embedding => {
          values.insert("input".into(), json!(DEFAULT_INPUT));
        }
      , EndpointType::Audio => {
          values.insert("input".into(), json!(DEFAULT_INPUT));
          values.insert("voice".into(), json!("alloy"));
        }
      , EndpointType::Rerank => {}
    }

    for param in &model.parameters
    {   if let Some(default) = &param.default
        {   values.entry(param.name.clone())
              .or_insert_with(|| default.clone());
        }
    }

    trace!("Default form values for {}: {:?}", model.id, values);
    values
}

/// Assemble the JSON body sent to the endpoint
pub fn build_request_body(
  kind: EndpointType
, model_id: &str
, form: &FormValues
) -> GenerationRequest
{   let mut body = Map::new();
    body.insert("model".into(), json!(model_id));

    match kind
    {   EndpointType::Chat => {
          let prompt = truthy_field(form, "prompt")
            .cloned()
            .unwrap_or_else(|| json!(DEFAULT_CHAT_PROMPT));
          body.insert(
            "messages".into()
          , json!([{ "role": "user", "content": prompt }])
          );
          copy_defined(form, &mut body, &["temperature", "stream"]);
          copy_truthy(form, &mut body, &["max_tokens"]);
        }
      , EndpointType::Video => {
          copy_truthy(form, &mut body, &["prompt"]);
          if let Some(duration) = truthy_field(form, "duration")
            .and_then(parse_int)
          {   body.insert("duration".into(), json!(duration));
          }
          copy_truthy(form, &mut body, VIDEO_STRING_FIELDS);
          for name in VIDEO_LIST_FIELDS
          {   if let Some(urls) = truthy_field(form, name)
                .and_then(split_lines)
              {   body.insert((*name).into(), json!(urls));
              }
          }
          copy_truthy(form, &mut body, VIDEO_STYLE_FIELDS);
          copy_defined(form, &mut body, VIDEO_FLAG_FIELDS);
          insert_number(form, &mut body, "seed", parse_int);
          insert_number(form, &mut body, "cfg_scale", parse_float);
          insert_number(form, &mut body, "fps", parse_int);
          copy_defined(form, &mut body, &["fast_pretreatment"]);
        }
      , EndpointType::Image => {
          let prompt = truthy_field(form, "prompt")
            .cloned()
            .unwrap_or_else(|| json!(DEFAULT_IMAGE_PROMPT));
          body.insert("prompt".into(), prompt);
          copy_truthy(form, &mut body, &["size"]);
          if let Some(n) = truthy_field(form, "n").and_then(parse_int)
          {   body.insert("n".into(), json!(n));
          }
          copy_truthy(form, &mut body, &["quality", "response_format"]);
          insert_number(form, &mut body, "seed", parse_int);
          copy_truthy(form, &mut body, &["style", "user"]);
        }
      , EndpointType::Embedding => {
          body.insert("input".into(), input_or_default(form));
        }
      , EndpointType::Audio => {
          body.insert("input".into(), input_or_default(form));
          copy_truthy(form, &mut body, &["voice"]);
        }
      , EndpointType::Rerank => {}
    }

    debug!("Built {} request body with {} fields", kind, body.len());
    GenerationRequest(body)
}

fn input_or_default(form: &FormValues) -> Value
{   truthy_field(form, "input")
      .cloned()
      .unwrap_or_else(|| json!(DEFAULT_INPUT))
}

/// Present and not null
fn defined_field<'a>(form: &'a FormValues, name: &str)
  -> Option<&'a Value>
{   form.get(name).filter(|v| !v.is_null())
}

/// Present and not null, false, zero or empty
fn truthy_field<'a>(form: &'a FormValues, name: &str)
  -> Option<&'a Value>
{   form.get(name).filter(|v| is_truthy(v))
}

fn is_truthy(value: &Value) -> bool
{   match value
    {   Value::Null => false
      , Value::Bool(b) => *b
      , Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0)
      , Value::String(s) => !s.is_empty()
      , Value::Array(_) | Value::Object(_) => true
    }
}

fn copy_truthy(form: &FormValues, body: &mut Map<String, Value>, names: &[&str])
{   for name in names
    {   if let Some(value) = truthy_field(form, name)
        {   body.insert((*name).into(), value.clone());
        }
    }
}

fn copy_defined(form: &FormValues, body: &mut Map<String, Value>, names: &[&str])
{   for name in names
    {   if let Some(value) = defined_field(form, name)
        {   body.insert((*name).into(), value.clone());
        }
    }
}

/// Defined, non-blank numeric field; unparseable values are dropped
fn insert_number(
  form: &FormValues
, body: &mut Map<String, Value>
, name: &str
, parse: fn(&Value) -> Option<Value>
)
{   let value = defined_field(form, name)
      .filter(|v| v.as_str() != Some(""));
    if let Some(parsed) = value.and_then(parse)
    {   body.insert(name.into(), parsed);
    }
}

fn parse_int(value: &Value) -> Option<Value>
{   match value
    {   Value::Number(n) => {
          n.as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(|i| json!(i))
        }
      , Value::String(s) => {
          let s = s.trim();
          let end = s.char_indices()
            .take_while(|(i, c)| {
              c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))
            })
            .map(|(i, c)| i + c.len_utf8())
            .last()?;
          s[..end].parse::<i64>().ok().map(|i| json!(i))
        }
      , _ => None
    }
}

fn parse_float(value: &Value) -> Option<Value>
{   match value
    {   Value::Number(n) => n.as_f64().map(|f| json!(f))
      , Value::String(s) => {
          s.trim().parse::<f64>().ok()
            .filter(|f| f.is_finite())
            .map(|f| json!(f))
        }
      , _ => None
    }
}

/// Newline-separated URLs, or an array passed through; empty lists are dropped
fn split_lines(value: &Value) -> Option<Vec<Value>>
{   let urls: Vec<Value> = match value
    {   Value::String(s) => {
          s.split('\n')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| json!(u))
            .collect()
        }
      , Value::Array(items) => items.clone()
      , _ => return None
    };
    if urls.is_empty()
    {   None
    } else
    {   Some(urls)
    }
}
