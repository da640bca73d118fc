//! Pluggable request policies and the bridges that wire them into the
//! pipeline.
//!
//! Each policy is a small capability trait: the adapter may rewrite an
//! outgoing request, the retrier decides whether a failed request is
//! reissued, and the validator judges a response before it is decoded.
//! Policies are installed on a client at any time and take effect on the
//! next request.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use http::HeaderMap;

use crate::api::request::HttpRequest;
use crate::error::{ApiError, Result};

/// A hook that may rewrite an outgoing request before it is sent.
///
/// # Example
///
/// ```ignore
/// struct TokenAdapter { token: String }
///
/// impl RequestAdapter for TokenAdapter {
///     fn adapt(&self, mut request: HttpRequest) -> Result<HttpRequest> {
///         let value = format!("Bearer {}", self.token).parse()?;
///         request.headers.insert(http::header::AUTHORIZATION, value);
///         Ok(request)
///     }
/// }
/// ```
pub trait RequestAdapter: Send + Sync {
    /// Rewrite the request, or fail the request construction.
    fn adapt(&self, request: HttpRequest) -> Result<HttpRequest>;
}

/// The outcome of a retry evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryDecision {
    /// Whether the failed request should be reissued.
    pub retry: bool,
    /// How long to wait before reissuing.
    pub delay: Duration,
}

impl RetryDecision {
    /// Reissue the request after the given delay.
    pub fn retry_after(delay: Duration) -> Self {
        Self { retry: true, delay }
    }

    /// Surface the failure to the caller.
    pub fn give_up() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// A hook that decides whether and after what delay a failed request is
/// reissued.
///
/// The decision is asynchronous: it may itself depend on asynchronous work,
/// such as refreshing a credential before retrying.
pub trait RequestRetrier: Send + Sync {
    /// Evaluate a retry decision for a failed request.
    fn should_retry<'a>(
        &'a self,
        request: &'a HttpRequest,
        error: &'a ApiError,
    ) -> BoxFuture<'a, Result<RetryDecision>>;
}

/// A policy that judges a response before its body is decoded.
///
/// When no validator is installed, 2xx and 3xx statuses are accepted.
pub trait RequestValidator: Send + Sync {
    /// Accept or reject a response.
    fn validate(
        &self,
        status: u16,
        request: Option<&HttpRequest>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<()>;
}

/// Adapts an installed retrier into the pipeline's retry hook.
pub(crate) struct RetrierBridge {
    retrier: Arc<dyn RequestRetrier>,
}

impl RetrierBridge {
    pub(crate) fn new(retrier: Arc<dyn RequestRetrier>) -> Self {
        Self { retrier }
    }

    /// Evaluate the installed policy.
    ///
    /// A failed request with no outgoing request representation is never
    /// retried. A policy that fails while evaluating surfaces as
    /// [`ApiError::RetryEvaluation`].
    pub(crate) async fn should_retry(
        &self,
        request: Option<&HttpRequest>,
        error: &ApiError,
    ) -> Result<RetryDecision> {
        let Some(request) = request else {
            return Ok(RetryDecision::give_up());
        };
        self.retrier
            .should_retry(request, error)
            .await
            .map_err(|e| ApiError::RetryEvaluation(e.to_string()))
    }
}

/// Adapts the optional validator into the pipeline's validation hook.
pub(crate) struct ValidatorBridge<'a> {
    validator: Option<&'a Arc<dyn RequestValidator>>,
}

impl<'a> ValidatorBridge<'a> {
    pub(crate) fn new(validator: Option<&'a Arc<dyn RequestValidator>>) -> Self {
        Self { validator }
    }

    pub(crate) fn validate(
        &self,
        status: u16,
        request: Option<&HttpRequest>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<()> {
        match self.validator {
            Some(validator) => validator.validate(status, request, headers, body),
            None => {
                if (200..400).contains(&status) {
                    Ok(())
                } else {
                    Err(ApiError::Validation {
                        status,
                        message: None,
                    })
                }
            }
        }
    }
}
