//! Declarative HTTP endpoints with typed decoding and progress-tracked
//! uploads.
//!
//! This crate wraps a networking transport (reqwest) and asynchronous stream
//! primitives (tokio channels) behind two small facades:
//!
//! - **[`ApiClient`]**: executes [`Endpoint`] descriptors against a base URL
//!   and delivers each result through a single-fire, cancellable future.
//! - **[`Uploader`]**: manages a deduplicated queue of file uploads, each
//!   observable as an ordered stream of state transitions.
//!
//! # Endpoints
//!
//! An endpoint describes one API call — method, path, parameters, encoding,
//! and how to decode the response:
//!
//! ```ignore
//! use endpoints::{ApiClient, Endpoint, Method, ParameterEncoding};
//!
//! #[derive(serde::Deserialize)]
//! struct Post { id: u64, title: String }
//!
//! fn posts() -> Endpoint<Vec<Post>> {
//!     Endpoint::json(Method::Get, "posts", None, ParameterEncoding::Url)
//! }
//!
//! let client = ApiClient::new("https://jsonplaceholder.typicode.com".parse()?);
//! let posts = client.request(&posts()).await?;
//! ```
//!
//! Requests can be cancelled through their handle; a cancelled request aborts
//! the underlying transport request and delivers no value:
//!
//! ```ignore
//! let pending = client.request(&posts());
//! let handle = pending.handle();
//! handle.cancel();
//! assert!(matches!(pending.await, Err(endpoints::ApiError::Cancelled)));
//! ```
//!
//! # Pluggable policies
//!
//! Authentication, retry, and response validation are strategy objects
//! installed on the client at any time:
//!
//! ```ignore
//! client.set_request_adapter(TokenAdapter { token });
//! client.set_request_retrier(RefreshingRetrier::new(credentials));
//! client.set_request_validator(EnvelopeValidator);
//! client.set_logger(endpoints::NetworkLogger::new());
//! ```
//!
//! # Uploads
//!
//! ```ignore
//! use endpoints::{Method, Uploader, UploadState};
//!
//! let uploader: Uploader<std::path::PathBuf> = Uploader::new();
//! let info = uploader.upload(path, url, Method::Post, None, true)?;
//!
//! let mut states = info.state_stream();
//! while let Some(state) = states.next().await {
//!     match state {
//!         UploadState::InProgress(p) => println!("{:.0}%", p.fraction_completed * 100.0),
//!         UploadState::Completed => println!("done"),
//!         _ => {}
//!     }
//! }
//! ```

pub mod api;
mod endpoint;
mod error;
pub mod upload;

pub use api::{
    ApiClient, HttpRequest, NetworkLogger, PendingRequest, RequestAdapter, RequestBody,
    RequestHandle, RequestRetrier, RequestValidator, RetryDecision, SessionConfig,
};
pub use endpoint::{Endpoint, Method, ParameterEncoding, Parameters};
pub use error::{ApiError, Result, UploadError};
pub use upload::{
    UploadId, UploadInfo, UploadProgress, UploadState, UploadStateStream, Uploadable, Uploader,
};
