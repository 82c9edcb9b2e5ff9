//! Middleware client used by [`HttpTransport`](super::HttpTransport).
//!
//! Requests are traced through `reqwest-tracing`. Request-level retries are
//! off unless [`HttpClientConfig::retries`] says otherwise, since whole
//! attempts are already retried by the orchestrator where the attempt counter
//! stays visible.
//!
//! ```rust
//! use ferry::transport::{create_http_client, HttpClientConfig};
//! use std::time::Duration;
//!
//! let config = HttpClientConfig {
//!     connect_timeout: Some(Duration::from_secs(10)),
//!     ..HttpClientConfig::default()
//! };
//! let client = create_http_client(config)?;
//! # let _ = client;
//! # Ok::<(), reqwest::Error>(())
//! ```

use reqwest::{header::HeaderMap, Proxy};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_tracing::TracingMiddleware;
use std::time::Duration;

/// Options for the underlying reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpClientConfig {
    /// Transient failures retried inside a single attempt.
    pub retries: u32,
    pub proxy: Option<Proxy>,
    /// Sent with every request.
    pub headers: Option<HeaderMap>,
    /// Bound on TCP/TLS setup. The whole attempt is bounded separately.
    pub connect_timeout: Option<Duration>,
}

impl HttpClientConfig {
    fn reqwest_client(self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = self.proxy {
            builder = builder.proxy(proxy);
        }
        if let Some(headers) = self.headers {
            builder = builder.default_headers(headers);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        builder.build()
    }
}

/// Build the traced middleware client described by `config`.
pub fn create_http_client(config: HttpClientConfig) -> Result<ClientWithMiddleware, reqwest::Error> {
    let retries = config.retries;
    let mut builder = ClientBuilder::new(config.reqwest_client()?).with(TracingMiddleware::default());
    if retries > 0 {
        let policy = ExponentialBackoff::builder().build_with_max_retries(retries);
        builder = builder.with(RetryTransientMiddleware::new_with_policy(policy));
    }
    Ok(builder.build())
}
