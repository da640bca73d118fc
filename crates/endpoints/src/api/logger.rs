//! Human-readable request/response traces.
//!
//! The logger is side-effect only: it formats outgoing requests and incoming
//! responses into readable text and hands the result to a pluggable sink. It
//! never influences control flow and never fails a request.

use http::HeaderMap;

use crate::api::request::HttpRequest;
use crate::endpoint::Parameters;

type LogSink = Box<dyn Fn(&str, bool) + Send + Sync>;

/// Formats network traffic for inspection.
///
/// The default sink writes through `tracing`; installing a custom sink
/// redirects the traces elsewhere (a file, a debug console, a test buffer).
/// The boolean passed to the sink reports whether the traced event was a
/// success.
pub struct NetworkLogger {
    sink: LogSink,
}

impl Default for NetworkLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkLogger {
    /// Create a logger that writes through `tracing`.
    pub fn new() -> Self {
        Self::with_sink(|trace, is_success| {
            if is_success {
                tracing::debug!(target: "endpoints::net", "{trace}");
            } else {
                tracing::warn!(target: "endpoints::net", "{trace}");
            }
        })
    }

    /// Create a logger with a custom sink.
    pub fn with_sink(sink: impl Fn(&str, bool) + Send + Sync + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    pub(crate) fn log_request(&self, request: &HttpRequest, parameters: Option<&Parameters>) {
        (self.sink)(&format_request(request, parameters), true);
    }

    pub(crate) fn log_response(
        &self,
        request: &HttpRequest,
        status: u16,
        headers: &HeaderMap,
        body: &[u8],
        is_success: bool,
    ) {
        (self.sink)(
            &format_response(request, status, headers, body),
            is_success,
        );
    }
}

impl std::fmt::Debug for NetworkLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkLogger").finish()
    }
}

fn format_request(request: &HttpRequest, parameters: Option<&Parameters>) -> String {
    let mut trace = format!("--> {} {}", request.method, request.url);
    if let Some(json) = headers_json(&request.headers) {
        trace.push_str("\nHEADERS ----------\n");
        trace.push_str(&json);
    }
    if let Some(parameters) = parameters
        && !parameters.is_empty()
        && let Ok(json) = serde_json::to_string_pretty(parameters)
    {
        trace.push_str("\nPARAMETERS ----------\n");
        trace.push_str(&json);
    }
    trace
}

fn format_response(request: &HttpRequest, status: u16, headers: &HeaderMap, body: &[u8]) -> String {
    let mut trace = format!("<-- {} {} {}", request.method, status, request.url);
    if let Some(json) = headers_json(headers) {
        trace.push_str("\nHEADERS ----------\n");
        trace.push_str(&json);
    }
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body)
        && let Ok(json) = serde_json::to_string_pretty(&value)
    {
        trace.push_str("\nRESPONSE ----------\n");
        trace.push_str(&json);
    }
    trace
}

/// Pretty-print a header map as a JSON object, skipping non-UTF-8 values.
fn headers_json(headers: &HeaderMap) -> Option<String> {
    if headers.is_empty() {
        return None;
    }
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), serde_json::Value::from(v)))
        })
        .collect();
    serde_json::to_string_pretty(&map).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Method;
    use http::HeaderValue;
    use url::Url;

    fn request() -> HttpRequest {
        let mut request = HttpRequest::new(
            Method::Get,
            Url::parse("https://api.example.com/posts").unwrap(),
            HeaderMap::new(),
        );
        request
            .headers
            .insert("accept", HeaderValue::from_static("application/json"));
        request
    }

    #[test]
    fn request_trace_contains_method_url_and_sections() {
        let mut parameters = Parameters::new();
        parameters.insert("page".to_string(), serde_json::Value::from(2));

        let trace = format_request(&request(), Some(&parameters));
        assert!(trace.starts_with("--> GET https://api.example.com/posts"));
        assert!(trace.contains("HEADERS ----------"));
        assert!(trace.contains("PARAMETERS ----------"));
        assert!(trace.contains("\"page\": 2"));
    }

    #[test]
    fn response_trace_pretty_prints_json_bodies() {
        let trace = format_response(&request(), 200, &HeaderMap::new(), br#"{"id":1}"#);
        assert!(trace.starts_with("<-- GET 200 https://api.example.com/posts"));
        assert!(trace.contains("RESPONSE ----------"));
        assert!(trace.contains("\"id\": 1"));
    }

    #[test]
    fn response_trace_skips_non_json_bodies() {
        let trace = format_response(&request(), 204, &HeaderMap::new(), b"");
        assert!(!trace.contains("RESPONSE ----------"));
    }

    #[test]
    fn custom_sink_receives_success_flag() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let saw_failure = Arc::new(AtomicBool::new(false));
        let saw = saw_failure.clone();
        let logger = NetworkLogger::with_sink(move |_, is_success| {
            if !is_success {
                saw.store(true, Ordering::SeqCst);
            }
        });

        logger.log_response(&request(), 500, &HeaderMap::new(), b"", false);
        assert!(saw_failure.load(Ordering::SeqCst));
    }
}
