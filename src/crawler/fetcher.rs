//! HTTP fetcher implementation
//!
//! This module handles all network reads for discovery and export:
//! - The [`Transport`] seam and its reqwest-backed implementation
//! - Normalizing response payloads into text or raw bytes
//! - Retry with exponential backoff for retryable failures
//! - Per-host throttling before every attempt

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::scheduler::HostRateLimiter;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;

/// How the caller wants the response body delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// HTML or XML text
    Text,
    /// Raw bytes (images)
    Binary,
}

/// Response body as handed back by a transport
///
/// Transports differ in what they produce; [`Payload::into_bytes`] and
/// [`Payload::into_text`] give the rest of the crate one uniform view.
#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
    Shared(Arc<[u8]>),
    Empty,
    /// A body the transport could not express as bytes
    Opaque(String),
}

impl Payload {
    /// Normalizes the payload into an owned byte buffer
    ///
    /// `Empty` and `Opaque` payloads are a non-retryable
    /// [`FetchError::UnsupportedPayload`].
    pub fn into_bytes(self) -> Result<Vec<u8>, FetchError> {
        match self {
            Self::Text(text) => Ok(text.into_bytes()),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Shared(shared) => Ok(shared.to_vec()),
            Self::Empty => Err(FetchError::UnsupportedPayload("empty body".to_string())),
            Self::Opaque(kind) => Err(FetchError::UnsupportedPayload(kind)),
        }
    }

    /// Normalizes the payload into text, replacing invalid UTF-8
    pub fn into_text(self) -> Result<String, FetchError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Empty => Ok(String::new()),
            other => {
                let bytes = other.into_bytes()?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }
}

/// Raw transport result before status classification
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub payload: Payload,
}

/// Fetch-with-timeout collaborator
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        kind: ResponseKind,
        timeout: Duration,
    ) -> Result<TransportResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Transport`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Network("connection refused".to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        kind: ResponseKind,
        timeout: Duration,
    ) -> Result<TransportResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        if !(200..400).contains(&status) {
            return Ok(TransportResponse {
                status,
                payload: Payload::Empty,
            });
        }

        let payload = match kind {
            ResponseKind::Text => Payload::Text(response.text().await.map_err(classify_reqwest_error)?),
            ResponseKind::Binary => {
                Payload::Bytes(response.bytes().await.map_err(classify_reqwest_error)?.to_vec())
            }
        };

        Ok(TransportResponse { status, payload })
    }
}

/// Retry and timeout settings for one fetcher
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff_base: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            retries: config.retries,
            backoff_base: config.backoff_base(),
            timeout: config.timeout(),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// Throttled, retrying reader shared by discovery and export
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    limiter: Arc<HostRateLimiter>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: Arc<HostRateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            limiter,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn limiter(&self) -> &HostRateLimiter {
        &self.limiter
    }

    /// Same transport and throttle, smaller retry budget
    pub fn with_retries(&self, retries: u32) -> Self {
        Self {
            transport: self.transport.clone(),
            limiter: self.limiter.clone(),
            policy: RetryPolicy {
                retries: retries.min(self.policy.retries),
                ..self.policy
            },
        }
    }

    /// Fetches a page or XML document as text
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let payload = self.fetch_with_retry(url, ResponseKind::Text).await?;
        payload.into_text()
    }

    /// Fetches a binary resource as raw bytes
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let payload = self.fetch_with_retry(url, ResponseKind::Binary).await?;
        payload.into_bytes()
    }

    /// Runs up to `retries + 1` attempts
    ///
    /// Each attempt waits for the host throttle and is bounded by the policy
    /// timeout. Non-retryable failures return immediately without consuming
    /// the remaining budget.
    async fn fetch_with_retry(&self, url: &str, kind: ResponseKind) -> Result<Payload, FetchError> {
        let mut last_error = FetchError::Network("request-failed".to_string());

        for attempt in 0..=self.policy.retries {
            self.limiter.wait(url).await;

            let outcome = match tokio::time::timeout(
                self.policy.timeout,
                self.transport.get(url, kind, self.policy.timeout),
            )
            .await
            {
                Ok(result) => result.and_then(check_status),
                Err(_) => Err(FetchError::Timeout),
            };

            match outcome {
                Ok(payload) => {
                    if kind == ResponseKind::Binary {
                        // Surface unsupported shapes before the retry decision
                        if let Payload::Opaque(shape) = &payload {
                            return Err(FetchError::UnsupportedPayload(shape.clone()));
                        }
                    }
                    return Ok(payload);
                }
                Err(e) if !e.is_retryable() => {
                    tracing::debug!("Non-retryable failure for {}: {}", url, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        self.policy.retries + 1,
                        url,
                        e
                    );
                    last_error = e;
                }
            }

            if attempt < self.policy.retries {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }

        Err(last_error)
    }
}

fn check_status(response: TransportResponse) -> Result<Payload, FetchError> {
    if (200..400).contains(&response.status) {
        Ok(response.payload)
    } else {
        Err(FetchError::Http {
            status: response.status,
        })
    }
}
