//! Transport session configuration.

use std::time::Duration;

use reqwest::redirect::Policy;
use url::Url;

use crate::error::{ApiError, Result};

/// Configuration for the underlying transport session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
    /// Whether to enable cookie storage.
    pub cookies_enabled: bool,
    /// Default user agent.
    pub user_agent: Option<String>,
    /// Cap on idle pooled connections per host. Upload sessions raise this.
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            follow_redirects: true,
            max_redirects: 10,
            cookies_enabled: true,
            user_agent: Some(format!("endpoints/{} (Rust)", env!("CARGO_PKG_VERSION"))),
            pool_max_idle_per_host: None,
        }
    }
}

impl SessionConfig {
    fn build_client(&self, disable_trust_evaluation: bool) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        if self.follow_redirects {
            builder = builder.redirect(Policy::limited(self.max_redirects));
        } else {
            builder = builder.redirect(Policy::none());
        }

        if self.cookies_enabled {
            builder = builder.cookie_store(true);
        }

        if let Some(ref ua) = self.user_agent {
            builder = builder.user_agent(ua);
        }

        if let Some(max_idle) = self.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(max_idle);
        }

        if disable_trust_evaluation {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))
    }
}

/// The transport clients a session owns.
///
/// Hosts on the trusted-domain allow-list are routed through a second client
/// built with certificate verification disabled; everything else goes through
/// the default client.
pub(crate) struct Transport {
    client: reqwest::Client,
    trusted_client: Option<reqwest::Client>,
    trusted_domains: Vec<String>,
}

impl Transport {
    pub(crate) fn new(config: &SessionConfig, trusted_domains: Vec<String>) -> Result<Self> {
        let client = config.build_client(false)?;
        let trusted_client = if trusted_domains.is_empty() {
            None
        } else {
            Some(config.build_client(true)?)
        };
        Ok(Self {
            client,
            trusted_client,
            trusted_domains,
        })
    }

    /// Pick the client for a URL based on the trusted-domain allow-list.
    pub(crate) fn client_for(&self, url: &Url) -> &reqwest::Client {
        if let (Some(trusted), Some(host)) = (self.trusted_client.as_ref(), url.host_str())
            && self.trusted_domains.iter().any(|domain| domain == host)
        {
            return trusted;
        }
        &self.client
    }
}
