//! Rate-limited HTTP dispatch.
//!
//! Every connector owns one [`Requester`] and routes all REST traffic
//! through it. A request first takes a token from the authenticated or
//! unauthenticated bucket, then goes out on the shared `reqwest` client.
//! The configured timeout covers both the token wait and the HTTP exchange.
//!
//! The requester never retries. Transient failures surface as
//! [`Error::Timeout`], [`Error::Http`] or [`Error::Status`] and the caller
//! decides what to do.

mod limit;
mod nonce;

pub use limit::RateLimit;
pub use nonce::Nonce;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::RateLimitsConfig;
use crate::error::{Error, Result};

/// Applied when an exchange config leaves the timeout at zero.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// One outbound HTTP request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add a header. Invalid names or values are rejected.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Connection(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Connection(format!("invalid header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json<T: serde::Serialize>(mut self, payload: &T) -> Result<Self> {
        self.body = Some(serde_json::to_string(payload)?);
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }
}

/// A fully read HTTP response with a 2xx status.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Per-exchange HTTP dispatcher with two request quotas.
#[derive(Debug)]
pub struct Requester {
    exchange: String,
    client: RwLock<Client>,
    authenticated: RateLimit,
    unauthenticated: RateLimit,
    timeout: RwLock<Duration>,
    user_agent: RwLock<String>,
    proxy: RwLock<Option<Url>>,
    verbose: AtomicBool,
}

impl Requester {
    pub fn new(
        exchange: impl Into<String>,
        authenticated: RateLimit,
        unauthenticated: RateLimit,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            client: RwLock::new(Client::new()),
            authenticated,
            unauthenticated,
            timeout: RwLock::new(DEFAULT_HTTP_TIMEOUT),
            user_agent: RwLock::new(String::new()),
            proxy: RwLock::new(None),
            verbose: AtomicBool::new(false),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn authenticated_limit(&self) -> &RateLimit {
        &self.authenticated
    }

    pub fn unauthenticated_limit(&self) -> &RateLimit {
        &self.unauthenticated
    }

    /// Apply per-bucket overrides; missing buckets keep their defaults.
    pub fn apply_rate_limits(&self, config: &RateLimitsConfig) {
        if let Some(auth) = &config.authenticated {
            self.authenticated.apply(auth);
        }
        if let Some(unauth) = &config.unauthenticated {
            self.unauthenticated.apply(unauth);
        }
    }

    pub fn timeout(&self) -> Duration {
        *self.timeout.read()
    }

    /// Zero restores [`DEFAULT_HTTP_TIMEOUT`].
    pub fn set_timeout(&self, timeout: Duration) {
        let timeout = if timeout.is_zero() {
            DEFAULT_HTTP_TIMEOUT
        } else {
            timeout
        };
        *self.timeout.write() = timeout;
    }

    pub fn user_agent(&self) -> String {
        self.user_agent.read().clone()
    }

    pub fn set_user_agent(&self, agent: impl Into<String>) {
        *self.user_agent.write() = agent.into();
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    pub fn proxy(&self) -> Option<Url> {
        self.proxy.read().clone()
    }

    /// Build a client routed through `proxy` without installing it.
    pub fn prepare_proxy(&self, proxy: &Url) -> Result<Client> {
        let route = reqwest::Proxy::all(proxy.as_str())
            .map_err(|e| Error::Proxy(format!("{}: {proxy}: {e}", self.exchange)))?;
        Client::builder()
            .proxy(route)
            .build()
            .map_err(|e| Error::Proxy(format!("{}: {proxy}: {e}", self.exchange)))
    }

    /// Install a client built by [`Requester::prepare_proxy`].
    pub fn commit_proxy(&self, proxy: Url, client: Client) {
        *self.client.write() = client;
        *self.proxy.write() = Some(proxy);
    }

    /// Take a token, then perform the request.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] when token wait plus transfer exceed the timeout
    /// - [`Error::Http`] on transport failure
    /// - [`Error::Status`] on a non-2xx status
    pub async fn send(&self, authenticated: bool, spec: RequestSpec) -> Result<Response> {
        let timeout = self.timeout();
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.dispatch(authenticated, spec)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                exchange: self.exchange.clone(),
                elapsed: started.elapsed(),
            }),
        }
    }

    /// [`Requester::send`], then decode the body as JSON.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        authenticated: bool,
        spec: RequestSpec,
    ) -> Result<T> {
        self.send(authenticated, spec).await?.json()
    }

    async fn dispatch(&self, authenticated: bool, spec: RequestSpec) -> Result<Response> {
        let bucket = if authenticated {
            &self.authenticated
        } else {
            &self.unauthenticated
        };
        bucket.acquire().await;

        let verbose = self.verbose.load(Ordering::Relaxed);
        if verbose {
            debug!(
                exchange = %self.exchange,
                method = %spec.method,
                url = %spec.url,
                authenticated,
                "sending request"
            );
        }

        let client = self.client.read().clone();
        let mut request = client.request(spec.method, &spec.url).headers(spec.headers);
        let agent = self.user_agent();
        if !agent.is_empty() {
            request = request.header(USER_AGENT, agent);
        }
        if let Some(body) = spec.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if verbose {
            debug!(
                exchange = %self.exchange,
                status = status.as_u16(),
                body = %body,
                "received response"
            );
        }

        if !status.is_success() {
            return Err(Error::Status {
                exchange: self.exchange.clone(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(Response {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_restores_default() {
        let requester = Requester::new("ZB", RateLimit::unlimited(), RateLimit::unlimited());
        requester.set_timeout(Duration::from_secs(3));
        assert_eq!(requester.timeout(), Duration::from_secs(3));
        requester.set_timeout(Duration::ZERO);
        assert_eq!(requester.timeout(), DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn missing_bucket_overrides_keep_defaults() {
        let requester = Requester::new(
            "ZB",
            RateLimit::new(Duration::from_secs(1), 10),
            RateLimit::new(Duration::from_secs(1), 20),
        );
        requester.apply_rate_limits(&RateLimitsConfig {
            authenticated: Some(crate::config::RateLimitConfig {
                duration_ms: 2_000,
                rate: 3,
            }),
            unauthenticated: None,
        });
        assert_eq!(requester.authenticated_limit().rate(), 3);
        assert_eq!(requester.unauthenticated_limit().rate(), 20);
    }

    #[test]
    fn proxy_preparation_does_not_install() {
        let requester = Requester::new("ZB", RateLimit::unlimited(), RateLimit::unlimited());
        let proxy = Url::parse("http://127.0.0.1:8080").unwrap();
        let client = requester.prepare_proxy(&proxy).unwrap();
        assert!(requester.proxy().is_none());

        requester.commit_proxy(proxy.clone(), client);
        assert_eq!(requester.proxy(), Some(proxy));
    }

    #[test]
    fn request_spec_rejects_bad_header() {
        assert!(RequestSpec::get("http://x").header("bad header", "v").is_err());
        let spec = RequestSpec::post("http://x")
            .json(&serde_json::json!({"a": 1}))
            .unwrap();
        assert_eq!(spec.body.as_deref(), Some(r#"{"a":1}"#));
    }
}
