//! Endpoint descriptors and parameter encodings.
//!
//! An [`Endpoint`] is an immutable description of one API call: method, path,
//! parameters, the encoding that turns the parameters into a query or body,
//! and a decode function from raw response bytes to a typed result. Endpoints
//! carry no mutable state and can be reused across any number of requests.
//!
//! # Example
//!
//! ```ignore
//! use endpoints::{Endpoint, Method, ParameterEncoding};
//!
//! #[derive(serde::Deserialize)]
//! struct Post { id: u64, title: String }
//!
//! fn posts() -> Endpoint<Vec<Post>> {
//!     Endpoint::json(Method::Get, "posts", None, ParameterEncoding::Url)
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::request::{HttpRequest, RequestBody};
use crate::error::{ApiError, Result};

/// Ordered parameter mapping for an endpoint.
pub type Parameters = serde_json::Map<String, Value>;

/// HTTP request methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP OPTIONS method.
    Options,
    /// HTTP GET method.
    Get,
    /// HTTP HEAD method.
    Head,
    /// HTTP POST method.
    Post,
    /// HTTP PUT method.
    Put,
    /// HTTP PATCH method.
    Patch,
    /// HTTP DELETE method.
    Delete,
    /// HTTP TRACE method.
    Trace,
    /// HTTP CONNECT method.
    Connect,
}

impl Method {
    /// Convert to reqwest method.
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Options => reqwest::Method::OPTIONS,
            Self::Get => reqwest::Method::GET,
            Self::Head => reqwest::Method::HEAD,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
            Self::Trace => reqwest::Method::TRACE,
            Self::Connect => reqwest::Method::CONNECT,
        }
    }

    /// Whether URL-encoded parameters belong in the query string for this
    /// method (as opposed to a form body).
    fn encodes_parameters_in_url(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Options => write!(f, "OPTIONS"),
            Self::Get => write!(f, "GET"),
            Self::Head => write!(f, "HEAD"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Patch => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
            Self::Trace => write!(f, "TRACE"),
            Self::Connect => write!(f, "CONNECT"),
        }
    }
}

/// How endpoint parameters become an HTTP query or body.
#[derive(Clone, Debug)]
pub enum ParameterEncoding {
    /// JSON object body with `Content-Type: application/json`.
    Json,
    /// Query string or `application/x-www-form-urlencoded` body, depending on
    /// the method: GET, HEAD and DELETE carry parameters in the URL, all
    /// other methods in a form body.
    Url,
    /// XML property-list body with `Content-Type: application/x-plist`.
    Plist,
    /// A top-level JSON array body. The endpoint's parameter mapping is
    /// ignored; the supplied sequence is serialized in order.
    RawArray(Vec<Value>),
}

impl ParameterEncoding {
    /// Apply this encoding to a request under construction.
    ///
    /// Serialization failures surface as [`ApiError::Encoding`]; parameters
    /// are never silently dropped.
    pub(crate) fn apply(
        &self,
        method: Method,
        parameters: Option<&Parameters>,
        request: &mut HttpRequest,
    ) -> Result<()> {
        match self {
            Self::Url => {
                let Some(parameters) = parameters else {
                    return Ok(());
                };
                if parameters.is_empty() {
                    return Ok(());
                }
                let pairs: Vec<(String, String)> = parameters
                    .iter()
                    .map(|(key, value)| (key.clone(), query_value(value)))
                    .collect();
                if method.encodes_parameters_in_url() {
                    let mut serializer = request.url.query_pairs_mut();
                    for (key, value) in &pairs {
                        serializer.append_pair(key, value);
                    }
                } else {
                    request.body = RequestBody::Form(pairs);
                }
            }
            Self::Json => {
                let Some(parameters) = parameters else {
                    return Ok(());
                };
                let data = serde_json::to_vec(parameters)
                    .map_err(|e| ApiError::Encoding(e.to_string()))?;
                request.set_body(Bytes::from(data), "application/json");
            }
            Self::Plist => {
                let Some(parameters) = parameters else {
                    return Ok(());
                };
                let mut data = Vec::new();
                plist::to_writer_xml(&mut data, parameters)
                    .map_err(|e| ApiError::Encoding(e.to_string()))?;
                request.set_body(Bytes::from(data), "application/x-plist");
            }
            Self::RawArray(values) => {
                let data =
                    serde_json::to_vec(values).map_err(|e| ApiError::Encoding(e.to_string()))?;
                request.set_body(Bytes::from(data), "application/json");
            }
        }
        Ok(())
    }
}

/// Render a JSON value as a query-string value.
///
/// Scalars use their plain display form; null becomes the empty string;
/// arrays and objects fall back to their JSON text.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// An immutable descriptor of one API call and how to decode its response.
pub struct Endpoint<R> {
    method: Method,
    path: String,
    parameters: Option<Parameters>,
    encoding: ParameterEncoding,
    decode: Arc<dyn Fn(&[u8]) -> Result<R> + Send + Sync>,
}

impl<R> Clone for Endpoint<R> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            path: self.path.clone(),
            parameters: self.parameters.clone(),
            encoding: self.encoding.clone(),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<R> Endpoint<R> {
    /// Create an endpoint with an explicit decode function.
    ///
    /// Construction never fails; the decode function may fail at request time
    /// and surfaces as [`ApiError::Decode`].
    pub fn new<F>(
        method: Method,
        path: impl Into<String>,
        parameters: Option<Parameters>,
        encoding: ParameterEncoding,
        decode: F,
    ) -> Self
    where
        F: Fn(&[u8]) -> Result<R> + Send + Sync + 'static,
    {
        Self {
            method,
            path: path.into(),
            parameters,
            encoding,
            decode: Arc::new(decode),
        }
    }

    /// Get the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Get the path, relative to the client's base URL unless absolute.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the parameters.
    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    /// Get the parameter encoding.
    pub fn encoding(&self) -> &ParameterEncoding {
        &self.encoding
    }

    /// Run the decode function over raw response bytes.
    pub(crate) fn decode(&self, body: &[u8]) -> Result<R> {
        (self.decode)(body)
    }
}

impl<R: DeserializeOwned> Endpoint<R> {
    /// Create an endpoint whose response decodes from JSON.
    pub fn json(
        method: Method,
        path: impl Into<String>,
        parameters: Option<Parameters>,
        encoding: ParameterEncoding,
    ) -> Self {
        Self::new(method, path, parameters, encoding, |data| {
            serde_json::from_slice(data).map_err(|e| ApiError::Decode(e.to_string()))
        })
    }
}

impl Endpoint<()> {
    /// Create an endpoint with no response content.
    ///
    /// Decoding always succeeds and ignores the response bytes.
    pub fn no_content(
        method: Method,
        path: impl Into<String>,
        parameters: Option<Parameters>,
        encoding: ParameterEncoding,
    ) -> Self {
        Self::new(method, path, parameters, encoding, |_| Ok(()))
    }
}

impl<R> fmt::Debug for Endpoint<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("encoding", &self.encoding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_display_matches_verb() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Connect.to_string(), "CONNECT");
    }

    #[test]
    fn query_value_rendering() {
        assert_eq!(query_value(&Value::from(1)), "1");
        assert_eq!(query_value(&Value::from(true)), "true");
        assert_eq!(query_value(&Value::from("a b")), "a b");
        assert_eq!(query_value(&Value::Null), "");
        assert_eq!(query_value(&serde_json::json!([1, 2])), "[1,2]");
    }

    #[test]
    fn no_content_ignores_body() {
        let endpoint = Endpoint::no_content(Method::Delete, "posts/1", None, ParameterEncoding::Url);
        assert!(endpoint.decode(b"anything at all").is_ok());
        assert!(endpoint.decode(b"").is_ok());
    }

    #[test]
    fn json_decode_failure_is_decode_error() {
        let endpoint: Endpoint<Vec<u64>> =
            Endpoint::json(Method::Get, "ids", None, ParameterEncoding::Url);
        match endpoint.decode(b"not json") {
            Err(ApiError::Decode(_)) => {}
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
