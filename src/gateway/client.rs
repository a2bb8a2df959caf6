//! HTTP implementation of the search gateway
//!
//! One `RequestGateway` is bound to one credential. Every call waits for a
//! concurrency permit and then for the rate limiter before touching the
//! network, and retries transient failures with exponential backoff.

use crate::config::GatewayConfig;
use crate::credentials::Credential;
use crate::gateway::retry::{classify_status, ResponseClass, RetryPolicy};
use crate::gateway::stats::{GatewayCounters, GatewayStats};
use crate::gateway::wire::{SearchRequest, SuggestResponse};
use crate::gateway::{
    GatewayError, QueryResult, RemoteErrorKind, SearchClient, SearchQuery, ShutdownMode,
};
use crate::state::Entity;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Connection settings shared by every gateway in a run
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Full URL of the suggest call
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_concurrent: u32,
    pub requests_per_second: u32,
    pub result_cap: u32,
}

impl GatewaySettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            endpoint: join_endpoint(&config.base_url, &config.endpoint_path),
            timeout: Duration::from_millis(config.timeout_ms),
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            max_concurrent: config.max_concurrent,
            requests_per_second: config.requests_per_second,
            result_cap: config.result_cap,
        }
    }
}

fn join_endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Outcome of a single HTTP attempt
enum AttemptError {
    /// May succeed if tried again
    Transient(GatewayError),
    Final(GatewayError),
}

/// Rate-limited, retrying client for the suggest endpoint
pub struct RequestGateway {
    http: Client,
    endpoint: String,
    credential: String,
    result_cap: u32,
    retry: RetryPolicy,
    max_concurrent: u32,
    permits: Semaphore,
    limiter: DefaultDirectRateLimiter,
    accepting: AtomicBool,
    discard_queued: AtomicBool,
    counters: GatewayCounters,
}

impl RequestGateway {
    /// Builds a gateway that authenticates as the given credential
    ///
    /// The secret header falls back to the API token when the credential has
    /// no separate secret.
    pub fn connect(
        settings: &GatewaySettings,
        credential: &Credential,
    ) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();

        let mut token = HeaderValue::from_str(&format!("Token {}", credential.api_key))
            .map_err(|e| {
                GatewayError::Build(format!("invalid API token in {}: {}", credential.name, e))
            })?;
        token.set_sensitive(true);
        headers.insert(AUTHORIZATION, token);

        let secret = credential
            .secret_key
            .as_deref()
            .unwrap_or(credential.api_key.as_str());
        let mut secret = HeaderValue::from_str(secret).map_err(|e| {
            GatewayError::Build(format!("invalid secret in {}: {}", credential.name, e))
        })?;
        secret.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-secret"), secret);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| GatewayError::Build(e.to_string()))?;

        let rate = NonZeroU32::new(settings.requests_per_second).ok_or_else(|| {
            GatewayError::Build("requests-per-second must be greater than zero".to_string())
        })?;
        let max_concurrent = settings.max_concurrent.max(1);

        debug!(
            "Connected gateway for {} ({} concurrent, {}/s)",
            credential.name, max_concurrent, rate
        );

        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            credential: credential.name.clone(),
            result_cap: settings.result_cap.max(1),
            retry: settings.retry,
            max_concurrent,
            permits: Semaphore::new(max_concurrent as usize),
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            accepting: AtomicBool::new(true),
            discard_queued: AtomicBool::new(false),
            counters: GatewayCounters::default(),
        })
    }

    /// Name of the credential this gateway authenticates as
    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// Requests currently holding a concurrency permit
    pub fn in_flight(&self) -> usize {
        (self.max_concurrent as usize).saturating_sub(self.permits.available_permits())
    }

    /// Zeroes the counters without affecting requests in progress
    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    async fn attempt(&self, body: &SearchRequest<'_>) -> Result<QueryResult, AttemptError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AttemptError::Transient(GatewayError::Remote {
                    kind: RemoteErrorKind::Network,
                    status: None,
                    message: e.to_string(),
                })
            })?;

        let status = response.status().as_u16();
        match classify_status(status) {
            ResponseClass::Success => {
                let parsed: SuggestResponse = response.json().await.map_err(|e| {
                    AttemptError::Final(GatewayError::Remote {
                        kind: RemoteErrorKind::Decode,
                        status: Some(status),
                        message: e.to_string(),
                    })
                })?;
                Ok(into_result(parsed))
            }
            ResponseClass::QuotaExceeded => {
                let body = response.text().await.unwrap_or_default();
                let message = if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body
                };
                Err(AttemptError::Final(GatewayError::QuotaExceeded { message }))
            }
            ResponseClass::Transient => Err(AttemptError::Transient(GatewayError::Remote {
                kind: RemoteErrorKind::Server,
                status: Some(status),
                message: response.text().await.unwrap_or_default(),
            })),
            ResponseClass::Client => Err(AttemptError::Final(GatewayError::Remote {
                kind: RemoteErrorKind::Client,
                status: Some(status),
                message: response.text().await.unwrap_or_default(),
            })),
        }
    }
}

fn into_result(response: SuggestResponse) -> QueryResult {
    let returned = response.suggestions.len();
    let entities = response
        .suggestions
        .into_iter()
        .filter_map(|suggestion| suggestion.data)
        .filter_map(Entity::from_suggestion_data)
        .collect();

    QueryResult { entities, returned }
}

#[async_trait]
impl SearchClient for RequestGateway {
    async fn search(&self, query: &SearchQuery) -> Result<QueryResult, GatewayError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(GatewayError::Closed);
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GatewayError::Closed)?;

        if self.discard_queued.load(Ordering::Acquire) {
            return Err(GatewayError::Closed);
        }

        self.counters.request();
        let count = query.count.clamp(1, self.result_cap);
        let body = SearchRequest::new(query, count);

        let mut retry = 0;
        loop {
            self.limiter.until_ready().await;

            match self.attempt(&body).await {
                Ok(result) => {
                    self.counters.success();
                    debug!(
                        "Query '{}' returned {} results via {}",
                        query.text, result.returned, self.credential
                    );
                    return Ok(result);
                }
                Err(AttemptError::Transient(error)) => {
                    retry += 1;
                    if !self.retry.should_retry(retry) {
                        self.counters.failure();
                        return Err(error);
                    }
                    let delay = self.retry.backoff(retry);
                    warn!(
                        "Retry {}/{} for '{}' in {:?}: {}",
                        retry, self.retry.max_retries, query.text, delay, error
                    );
                    self.counters.retry();
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Final(error)) => {
                    if error.is_quota() {
                        self.counters.quota();
                    } else {
                        self.counters.failure();
                    }
                    return Err(error);
                }
            }
        }
    }

    async fn shutdown(&self, mode: ShutdownMode) {
        let was_accepting = self.accepting.swap(false, Ordering::AcqRel);
        if mode == ShutdownMode::Discard {
            self.discard_queued.store(true, Ordering::Release);
        }

        // Holding every permit means nothing is in flight and nothing queued
        // ahead of us remains.
        if let Ok(all) = self.permits.acquire_many(self.max_concurrent).await {
            self.permits.close();
            drop(all);
        }

        if was_accepting {
            let stats = self.counters.snapshot();
            info!(
                "Gateway for {} closed: {} requests, {} ok, {} failed, {} quota errors, {} retries",
                self.credential,
                stats.total,
                stats.successes,
                stats.failures,
                stats.quota_errors,
                stats.retries
            );
        }
    }

    fn stats(&self) -> GatewayStats {
        self.counters.snapshot()
    }
}
