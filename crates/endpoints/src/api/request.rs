//! Pre-transport request representation.
//!
//! [`HttpRequest`] is the value the pipeline hands to the pluggable policies:
//! the adapter may rewrite it, the retrier and validator observe it. It is
//! converted into a transport request only at send time.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use url::Url;

use crate::endpoint::Method;

/// The body of an outgoing request.
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    None,
    /// Raw bytes, already serialized by a parameter encoding.
    Bytes(Bytes),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
}

/// A built request, ready to be adapted, validated against, and sent.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: Method,
    /// The fully resolved request URL, including any encoded query.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestBody,
}

impl HttpRequest {
    pub(crate) fn new(method: Method, url: Url, headers: HeaderMap) -> Self {
        Self {
            method,
            url,
            headers,
            body: RequestBody::None,
        }
    }

    /// Install a serialized body and its content type.
    pub(crate) fn set_body(&mut self, data: Bytes, content_type: &'static str) {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = RequestBody::Bytes(data);
    }

    /// Convert into a transport request on the given client.
    pub(crate) fn to_reqwest(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut builder = client
            .request(self.method.to_reqwest(), self.url.clone())
            .headers(self.headers.clone());
        match &self.body {
            RequestBody::None => {}
            RequestBody::Bytes(data) => {
                builder = builder.body(data.clone());
            }
            RequestBody::Form(pairs) => {
                builder = builder.form(pairs);
            }
        }
        builder
    }
}
