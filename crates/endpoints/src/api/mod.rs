//! Typed API client over a base URL.
//!
//! This module provides the request/response pipeline: building a transport
//! request from an [`Endpoint`](crate::Endpoint), running the installed
//! policies, executing it, and decoding the result.
//!
//! # Example
//!
//! ```ignore
//! use endpoints::{ApiClient, Endpoint, Method, ParameterEncoding};
//!
//! let client = ApiClient::new("https://api.example.com".parse()?);
//! client.set_header("Accept", "application/json")?;
//!
//! let user: User = client
//!     .request(&Endpoint::json(Method::Get, "users/1", None, ParameterEncoding::Url))
//!     .await?;
//! ```

mod client;
mod hooks;
mod logger;
pub(crate) mod request;
mod session;

pub use client::{ApiClient, PendingRequest, RequestHandle};
pub use hooks::{RequestAdapter, RequestRetrier, RequestValidator, RetryDecision};
pub use logger::NetworkLogger;
pub use request::{HttpRequest, RequestBody};
pub use session::SessionConfig;

pub(crate) use session::Transport;
