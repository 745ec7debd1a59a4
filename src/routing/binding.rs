//! Route bindings: one HTTP operation mapped onto one remote procedure.
//!
//! # Responsibilities
//! - Describe verb, path template, procedure and call shape
//! - Decode JSON bodies, path variables and query parameters into the bound
//!   request message and encode it as protobuf
//! - Decode protobuf responses and render them as JSON
//!
//! # Design Decisions
//! - Message types are erased behind [`MessageCodec`] so the registry holds
//!   bindings of different shapes in one table
//! - Unknown JSON fields are ignored; missing required fields fail decoding
//! - Bindings without a body take their fields from path and query strings,
//!   which allows scalar coercion ("3" → 3) the way form decoding does
//! - Path variables on body bindings are coerced by the field's default value

use std::marker::PhantomData;
use std::sync::Arc;

use axum::http::Method;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tonic::Status;

use crate::routing::matcher::{PathParams, PathPattern};
use crate::routing::registry::RegistrationError;
use crate::rpc::Procedure;

/// Where the request message comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRule {
    /// No body; fields come from path variables and the query string.
    Empty,
    /// The whole JSON body is the request message; path variables override.
    Whole,
}

/// Shape of the remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Unary,
    ServerStreaming,
}

/// Request body could not be turned into the bound message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("invalid request parameters: {0}")]
    Params(String),
}

/// Request material gathered from the HTTP request.
#[derive(Debug, Default)]
pub struct RequestInput<'a> {
    pub body: &'a [u8],
    pub path: &'a [(String, String)],
    pub query: &'a [(String, String)],
}

/// JSON ⇄ protobuf translation for one binding.
pub trait MessageCodec: Send + Sync {
    /// Build the protobuf request message.
    fn decode_request(&self, rule: BodyRule, input: RequestInput<'_>) -> Result<Bytes, DecodeError>;

    /// Render one protobuf response message as JSON.
    fn encode_response(&self, message: &[u8]) -> Result<Value, Status>;
}

/// [`MessageCodec`] for a prost request/response pair that also derives serde.
pub struct JsonProto<Req, Resp> {
    _marker: PhantomData<fn() -> (Req, Resp)>,
}

impl<Req, Resp> JsonProto<Req, Resp> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<Req, Resp> Default for JsonProto<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> MessageCodec for JsonProto<Req, Resp>
where
    Req: prost::Message + Default + Serialize + DeserializeOwned + 'static,
    Resp: prost::Message + Default + Serialize + 'static,
{
    fn decode_request(
        &self,
        rule: BodyRule,
        input: RequestInput<'_>,
    ) -> Result<Bytes, DecodeError> {
        let request: Req = match rule {
            BodyRule::Whole => {
                let mut value = if input.body.iter().all(u8::is_ascii_whitespace) {
                    Value::Object(Map::new())
                } else {
                    serde_json::from_slice(input.body)?
                };
                let object = value.as_object_mut().ok_or(DecodeError::NotAnObject)?;
                let shape = serde_json::to_value(Req::default()).unwrap_or(Value::Null);
                merge_path_params(object, input.path, &shape);
                serde_json::from_value(value)?
            }
            BodyRule::Empty => {
                let fields: PathParams = input
                    .query
                    .iter()
                    .filter(|(name, _)| !input.path.iter().any(|(p, _)| p == name))
                    .chain(input.path.iter())
                    .cloned()
                    .collect();
                let encoded = serde_urlencoded::to_string(&fields)
                    .map_err(|e| DecodeError::Params(e.to_string()))?;
                serde_urlencoded::from_str(&encoded)
                    .map_err(|e| DecodeError::Params(e.to_string()))?
            }
        };
        Ok(Bytes::from(request.encode_to_vec()))
    }

    fn encode_response(&self, message: &[u8]) -> Result<Value, Status> {
        let response = Resp::decode(message)
            .map_err(|e| Status::internal(format!("malformed response from backend: {}", e)))?;
        serde_json::to_value(&response)
            .map_err(|e| Status::internal(format!("failed to render response: {}", e)))
    }
}

/// Overlay path variables on a JSON body.
///
/// `shape` is the serialized default message. It decides the key a variable
/// lands under and how its text is coerced. Any spelling of the field already
/// present in the body is replaced.
fn merge_path_params(object: &mut Map<String, Value>, path: &[(String, String)], shape: &Value) {
    for (name, raw) in path {
        let camel = camel_case(name);
        object.remove(name);
        object.remove(&camel);

        let (key, template) = match (shape.get(name), shape.get(&camel)) {
            (Some(template), _) => (name.clone(), Some(template)),
            (None, Some(template)) => (camel, Some(template)),
            (None, None) => (name.clone(), None),
        };
        object.insert(key, coerce(raw, template));
    }
}

/// Text to JSON following the type of the field's default value.
/// Unparseable text stays a string so decoding reports the mismatch.
fn coerce(raw: &str, template: Option<&Value>) -> Value {
    match template {
        Some(Value::Number(_)) => {
            if let Ok(n) = raw.parse::<i64>() {
                Value::from(n)
            } else if let Ok(n) = raw.parse::<u64>() {
                Value::from(n)
            } else {
                raw.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map_or_else(|| Value::String(raw.to_string()), Value::Number)
            }
        }
        Some(Value::Bool(_)) => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// One registered operation.
#[derive(Clone)]
pub struct RouteBinding {
    pub(crate) method: Method,
    pub(crate) pattern: PathPattern,
    pub(crate) procedure: Procedure,
    pub(crate) body: BodyRule,
    pub(crate) kind: CallKind,
    pub(crate) codec: Arc<dyn MessageCodec>,
}

impl RouteBinding {
    /// Bind a unary procedure.
    pub fn unary<Req, Resp>(
        method: Method,
        pattern: &str,
        procedure: &str,
    ) -> Result<Self, RegistrationError>
    where
        Req: prost::Message + Default + Serialize + DeserializeOwned + 'static,
        Resp: prost::Message + Default + Serialize + 'static,
    {
        Self::build(
            method,
            pattern,
            procedure,
            CallKind::Unary,
            Arc::new(JsonProto::<Req, Resp>::new()),
        )
    }

    /// Bind a server-streaming procedure.
    pub fn server_streaming<Req, Resp>(
        method: Method,
        pattern: &str,
        procedure: &str,
    ) -> Result<Self, RegistrationError>
    where
        Req: prost::Message + Default + Serialize + DeserializeOwned + 'static,
        Resp: prost::Message + Default + Serialize + 'static,
    {
        Self::build(
            method,
            pattern,
            procedure,
            CallKind::ServerStreaming,
            Arc::new(JsonProto::<Req, Resp>::new()),
        )
    }

    fn build(
        method: Method,
        pattern: &str,
        procedure: &str,
        kind: CallKind,
        codec: Arc<dyn MessageCodec>,
    ) -> Result<Self, RegistrationError> {
        Ok(Self {
            method,
            pattern: PathPattern::parse(pattern)?,
            procedure: Procedure::new(procedure)?,
            body: BodyRule::Empty,
            kind,
            codec,
        })
    }

    /// Take the request message from the JSON body.
    pub fn with_body(mut self) -> Self {
        self.body = BodyRule::Whole;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn procedure(&self) -> &Procedure {
        &self.procedure
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }
}

impl std::fmt::Debug for RouteBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBinding")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("procedure", &self.procedure)
            .field("body", &self.body)
            .field("kind", &self.kind)
            .finish()
    }
}
