//! API client orchestration.
//!
//! [`ApiClient`] turns an [`Endpoint`] into a transport request, attaches the
//! installed policies (adapter, retrier, validator, logger), executes it, and
//! exposes the decoded outcome as a single-fire, cancellable
//! [`PendingRequest`].
//!
//! # Example
//!
//! ```ignore
//! use endpoints::{ApiClient, Endpoint, Method, ParameterEncoding};
//!
//! let client = ApiClient::new("https://jsonplaceholder.typicode.com".parse()?);
//!
//! let posts: Vec<Post> = client
//!     .request(&Endpoint::json(Method::Get, "posts", None, ParameterEncoding::Url))
//!     .await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use url::Url;

use crate::api::hooks::{
    RequestAdapter, RequestRetrier, RequestValidator, RetrierBridge, ValidatorBridge,
};
use crate::api::logger::NetworkLogger;
use crate::api::request::HttpRequest;
use crate::api::session::{SessionConfig, Transport};
use crate::endpoint::Endpoint;
use crate::error::{ApiError, Result};

struct ClientInner {
    base_url: Url,
    transport: Transport,
    headers: RwLock<HeaderMap>,
    logger: RwLock<Option<Arc<NetworkLogger>>>,
    adapter: RwLock<Option<Arc<dyn RequestAdapter>>>,
    retrier: RwLock<Option<Arc<dyn RequestRetrier>>>,
    validator: RwLock<Option<Arc<dyn RequestValidator>>>,
    /// Serializes response handling (validation, logging, decode) so callback
    /// delivery for one client is never reentrant.
    callback_lock: tokio::sync::Mutex<()>,
}

/// A typed HTTP client over a base URL.
///
/// The client is cheaply cloneable; clones share the same transport,
/// static headers, and installed policies.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a client with default session configuration.
    pub fn new(base_url: Url) -> Self {
        Self::with_config(base_url, SessionConfig::default(), Vec::new())
            .expect("Failed to create API client with default configuration")
    }

    /// Create a client with a custom session configuration and an optional
    /// allow-list of domains exempt from trust evaluation.
    pub fn with_config(
        base_url: Url,
        config: SessionConfig,
        trusted_domains: Vec<String>,
    ) -> Result<Self> {
        let transport = Transport::new(&config, trusted_domains)?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                transport,
                headers: RwLock::new(HeaderMap::new()),
                logger: RwLock::new(None),
                adapter: RwLock::new(None),
                retrier: RwLock::new(None),
                validator: RwLock::new(None),
                callback_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Get the configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Set a static header sent with every request.
    pub fn set_header(&self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::try_from(name)?;
        let value = HeaderValue::try_from(value)?;
        self.inner.headers.write().insert(name, value);
        Ok(())
    }

    /// Remove a static header.
    pub fn remove_header(&self, name: &str) {
        if let Ok(name) = HeaderName::try_from(name) {
            self.inner.headers.write().remove(name);
        }
    }

    /// Remove all static headers.
    pub fn clear_headers(&self) {
        self.inner.headers.write().clear();
    }

    /// Install a network logger. Takes effect on the next request.
    pub fn set_logger(&self, logger: NetworkLogger) {
        *self.inner.logger.write() = Some(Arc::new(logger));
    }

    /// Remove the installed network logger.
    pub fn clear_logger(&self) {
        *self.inner.logger.write() = None;
    }

    /// Install a request adapter, replacing any previous one.
    pub fn set_request_adapter(&self, adapter: impl RequestAdapter + 'static) {
        *self.inner.adapter.write() = Some(Arc::new(adapter));
    }

    /// Remove the installed request adapter; requests pass through unmodified.
    pub fn clear_request_adapter(&self) {
        *self.inner.adapter.write() = None;
    }

    /// Install a request retrier, replacing any previous one.
    pub fn set_request_retrier(&self, retrier: impl RequestRetrier + 'static) {
        *self.inner.retrier.write() = Some(Arc::new(retrier));
    }

    /// Remove the installed request retrier; failures surface immediately.
    pub fn clear_request_retrier(&self) {
        *self.inner.retrier.write() = None;
    }

    /// Install a response validator, replacing any previous one.
    pub fn set_request_validator(&self, validator: impl RequestValidator + 'static) {
        *self.inner.validator.write() = Some(Arc::new(validator));
    }

    /// Remove the installed validator; 2xx and 3xx responses are accepted.
    pub fn clear_request_validator(&self) {
        *self.inner.validator.write() = None;
    }

    /// Resolve an endpoint path against the base URL.
    ///
    /// Absolute `http(s)` paths are used verbatim; anything else is appended
    /// to the base URL path.
    fn resolve_url(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl("base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Build the transport request for an endpoint without sending it.
    ///
    /// Runs the parameter encoding and the installed request adapter, exactly
    /// as [`ApiClient::request`] does before dispatch.
    pub fn build_request<R>(&self, endpoint: &Endpoint<R>) -> Result<HttpRequest> {
        let url = self.resolve_url(endpoint.path())?;
        let headers = self.inner.headers.read().clone();
        let mut request = HttpRequest::new(endpoint.method(), url, headers);
        endpoint
            .encoding()
            .apply(endpoint.method(), endpoint.parameters(), &mut request)?;
        let adapter = self.inner.adapter.read().clone();
        if let Some(adapter) = adapter {
            request = adapter.adapt(request)?;
        }
        Ok(request)
    }

    /// Execute an endpoint and return a single-fire, cancellable result.
    ///
    /// Exactly one terminal outcome is delivered per invocation: the decoded
    /// value, an error, or cancellation. Cancelling aborts the in-flight
    /// transport request; no value is delivered afterwards.
    pub fn request<R: Send + 'static>(&self, endpoint: &Endpoint<R>) -> PendingRequest<R> {
        let (result_tx, result_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = RequestHandle {
            cancel_tx: Arc::new(Mutex::new(Some(cancel_tx))),
        };

        let client = self.clone();
        let endpoint = endpoint.clone();
        let task_handle = handle.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = client.execute(&endpoint) => {
                    // Taking the cancel slot marks the request completed;
                    // if cancel() emptied it first, the cancellation won and
                    // the result is discarded.
                    if task_handle.cancel_tx.lock().take().is_some() {
                        let _ = result_tx.send(result);
                    }
                }
                _ = cancel_rx => {
                    // Cancelled: the transport future is dropped and nothing
                    // is delivered.
                }
            }
        });

        PendingRequest {
            receiver: result_rx,
            handle,
        }
    }

    async fn execute<R>(&self, endpoint: &Endpoint<R>) -> Result<R> {
        // A failure here has no request representation and is never retried.
        let request = self.build_request(endpoint)?;

        loop {
            let logger = self.inner.logger.read().clone();
            if let Some(logger) = &logger {
                logger.log_request(&request, endpoint.parameters());
            }

            let error = match self.send(&request).await {
                Ok((status, headers, body)) => {
                    let _guard = self.inner.callback_lock.lock().await;
                    let validator = self.inner.validator.read().clone();
                    let validation = ValidatorBridge::new(validator.as_ref()).validate(
                        status,
                        Some(&request),
                        &headers,
                        &body,
                    );
                    if let Some(logger) = &logger {
                        logger.log_response(&request, status, &headers, &body, validation.is_ok());
                    }
                    match validation {
                        Ok(()) => return endpoint.decode(&body),
                        Err(error) => error,
                    }
                }
                Err(error) => error,
            };

            let retrier = self.inner.retrier.read().clone();
            let Some(retrier) = retrier else {
                return Err(error);
            };
            let decision = RetrierBridge::new(retrier)
                .should_retry(Some(&request), &error)
                .await?;
            if !decision.retry {
                return Err(error);
            }
            tokio::time::sleep(decision.delay).await;
        }
    }

    async fn send(&self, request: &HttpRequest) -> Result<(u16, HeaderMap, Bytes)> {
        let transport = self.inner.transport.client_for(&request.url);
        let response = request.to_reqwest(transport).send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok((status, headers, body))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("has_adapter", &self.inner.adapter.read().is_some())
            .field("has_retrier", &self.inner.retrier.read().is_some())
            .field("has_validator", &self.inner.validator.read().is_some())
            .finish()
    }
}

/// A handle to a pending request that can be cancelled.
pub struct RequestHandle {
    cancel_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl RequestHandle {
    /// Cancel the pending request.
    ///
    /// Returns `true` if the cancellation signal was sent, `false` if the
    /// request already completed or was already cancelled.
    pub fn cancel(&self) -> bool {
        if let Some(tx) = self.cancel_tx.lock().take() {
            tx.send(()).is_ok()
        } else {
            false
        }
    }

    /// Check if the request is still pending.
    pub fn is_pending(&self) -> bool {
        self.cancel_tx.lock().is_some()
    }
}

impl Clone for RequestHandle {
    fn clone(&self) -> Self {
        Self {
            cancel_tx: self.cancel_tx.clone(),
        }
    }
}

/// A single-fire asynchronous result.
///
/// Awaiting yields the decoded value or the request's single error.
/// After [`PendingRequest::cancel`] the future resolves to
/// [`ApiError::Cancelled`]; no success or failure value is delivered.
pub struct PendingRequest<R> {
    receiver: oneshot::Receiver<Result<R>>,
    handle: RequestHandle,
}

impl<R> PendingRequest<R> {
    /// Get a cloneable handle for cancelling this request.
    pub fn handle(&self) -> RequestHandle {
        self.handle.clone()
    }

    /// Cancel the request, aborting the underlying transport request.
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    /// Check if the request is still pending.
    pub fn is_pending(&self) -> bool {
        self.handle.is_pending()
    }
}

impl<R> Future for PendingRequest<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The executing task dropped without delivering: cancelled.
            Poll::Ready(Err(_)) => Poll::Ready(Err(ApiError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
