//! Resilient outbound client.
//!
//! # Responsibilities
//! - Send JSON requests to named peers with bounded retries
//! - Enforce a deadline on every attempt
//! - Propagate the correlation ID on every attempt
//! - Emit one `RetryAttempt` record per attempt, in order
//! - Probe peer health without touching the shared pools
//!
//! # Design Decisions
//! - The retry loop is a plain bounded loop; waits go through `Sleeper`
//! - Every failure is classified once and the kind alone decides retry
//! - A peer's `Retry-After` can stretch a delay but never past the cap

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::Instrument;

use crate::client::error::CallError;
use crate::client::health::HealthReport;
use crate::client::pool::{PeerPool, PoolError};
use crate::client::transport::{PeerResponse, TransportError};
use crate::config::{RelayConfig, TimeoutConfig};
use crate::observability::metrics;
use crate::observability::{CorrelationId, LogSink, TelemetrySink, X_CORRELATION_ID};
use crate::resilience::timeouts::with_deadline;
use crate::resilience::{
    classify, classify_status, AttemptOutcome, ErrorKind, Failure, RetryAttempt, RetryPolicy,
    Sleeper, TokioSleeper,
};
use crate::security::RedactedHeaders;

/// Peer error bodies kept in errors and logs are cut to this many bytes.
const MAX_ERROR_BODY_BYTES: usize = 1024;

/// Deadlines used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub attempt: Duration,
    pub health_check: Duration,
    pub pool: Duration,
}

impl From<&TimeoutConfig> for ClientTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            attempt: Duration::from_millis(config.attempt_ms),
            health_check: Duration::from_millis(config.health_check_ms),
            pool: Duration::from_millis(config.pool_ms),
        }
    }
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// Per-call overrides.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub method: Method,
    /// Extra headers; the correlation header always wins over these.
    pub headers: HeaderMap,
    pub max_attempts: Option<u32>,
    pub attempt_timeout: Option<Duration>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            max_attempts: None,
            attempt_timeout: None,
        }
    }
}

/// Successful (2xx) peer response plus the attempts it took.
#[derive(Debug, Clone)]
pub struct CallResponse {
    pub peer: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub attempts: Vec<RetryAttempt>,
}

impl CallResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, CallError> {
        serde_json::from_slice(&self.body).map_err(|e| CallError::Validation {
            peer: self.peer.clone(),
            details: format!("response body is not valid JSON: {}", e),
            attempts: self.attempts.len() as u32,
        })
    }
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("peer '{peer}' has an invalid base URL: {source}")]
    InvalidBaseUrl {
        peer: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid user agent: {0}")]
    UserAgent(#[from] InvalidHeaderValue),
}

/// How one attempt failed, before it becomes a [`CallError`].
#[derive(Debug)]
enum AttemptFailure {
    Pool(PoolError),
    Transport(TransportError),
    Status(PeerResponse),
}

impl AttemptFailure {
    fn kind(&self) -> ErrorKind {
        match self {
            AttemptFailure::Pool(PoolError::Exhausted(_)) => ErrorKind::Timeout,
            AttemptFailure::Pool(PoolError::Closed) => ErrorKind::Unknown,
            AttemptFailure::Transport(err) => classify(err.failure()),
            AttemptFailure::Status(response) => classify(Failure::Status(response.status.as_u16())),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AttemptFailure::Status(response) => parse_retry_after(&response.headers),
            _ => None,
        }
    }

    fn into_call_error(self, peer: &str, attempts: u32) -> CallError {
        let peer = peer.to_string();
        match self {
            AttemptFailure::Pool(PoolError::Exhausted(_)) => CallError::Timeout { peer, attempts },
            AttemptFailure::Pool(PoolError::Closed) => CallError::Unknown {
                peer,
                reason: PoolError::Closed.to_string(),
                status: None,
                attempts,
            },
            AttemptFailure::Transport(err) => match err {
                TransportError::Timeout(_) => CallError::Timeout { peer, attempts },
                TransportError::Connect(_) | TransportError::Dropped(_) => {
                    CallError::ConnectionRefused {
                        peer,
                        reason: err.to_string(),
                        attempts,
                    }
                }
                TransportError::InvalidRequest(details) => CallError::Validation {
                    peer,
                    details,
                    attempts,
                },
            },
            AttemptFailure::Status(response) => {
                let status = response.status.as_u16();
                let body = error_body(&response.body);
                match classify_status(status) {
                    ErrorKind::ThrottledOrTimeoutRetryable => CallError::Throttled {
                        peer,
                        status,
                        retry_after: parse_retry_after(&response.headers),
                        attempts,
                    },
                    ErrorKind::ClientRejected => CallError::ClientRejected {
                        peer,
                        status,
                        body,
                        attempts,
                    },
                    ErrorKind::PeerUnavailable => CallError::PeerUnavailable {
                        peer,
                        status,
                        body,
                        attempts,
                    },
                    _ => CallError::Unknown {
                        peer,
                        reason: format!("unexpected status {}", status),
                        status: Some(status),
                        attempts,
                    },
                }
            }
        }
    }
}

/// Outbound client with per-peer pools, retries and deadlines.
pub struct ResilientClient {
    peers: HashMap<String, Arc<PeerPool>>,
    policy: RetryPolicy,
    timeouts: ClientTimeouts,
    sleeper: Arc<dyn Sleeper>,
    sink: Arc<dyn TelemetrySink>,
    user_agent: HeaderValue,
}

impl ResilientClient {
    /// Build hyper-backed pools for every configured peer.
    pub fn from_config(
        config: &RelayConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self, ClientBuildError> {
        let pools = config
            .peers
            .iter()
            .map(|peer| {
                PeerPool::from_config(peer)
                    .map(Arc::new)
                    .map_err(|source| ClientBuildError::InvalidBaseUrl {
                        peer: peer.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let user_agent = HeaderValue::from_str(&format!(
            "{}/{}",
            config.service.name, config.service.version
        ))?;

        Ok(Self::new(
            pools,
            RetryPolicy::from(config.retries.clone()),
            ClientTimeouts::from(&config.timeouts),
            user_agent,
        )
        .with_sink(sink))
    }

    pub fn new(
        pools: Vec<Arc<PeerPool>>,
        policy: RetryPolicy,
        timeouts: ClientTimeouts,
        user_agent: HeaderValue,
    ) -> Self {
        let peers = pools
            .into_iter()
            .map(|pool| (pool.name().to_string(), pool))
            .collect();

        Self {
            peers,
            policy,
            timeouts,
            sleeper: Arc::new(TokioSleeper),
            sink: Arc::new(LogSink),
            user_agent,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn pool(&self, peer: &str) -> Option<&Arc<PeerPool>> {
        self.peers.get(peer)
    }

    /// Configured peer names, sorted.
    pub fn peer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.peers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Send `payload` as JSON to `path` on `peer`, retrying per policy.
    ///
    /// Returns the first 2xx response, or the classified error of the last
    /// attempt once the attempt budget is spent or a terminal kind is seen.
    pub async fn call<T: Serialize + ?Sized>(
        &self,
        peer: &str,
        path: &str,
        payload: &T,
        correlation_id: &CorrelationId,
        options: &CallOptions,
    ) -> Result<CallResponse, CallError> {
        let pool = self.peers.get(peer).ok_or_else(|| CallError::Unknown {
            peer: peer.to_string(),
            reason: "peer is not configured".to_string(),
            status: None,
            attempts: 0,
        })?;

        let body = serde_json::to_vec(payload)
            .map(Bytes::from)
            .map_err(|e| CallError::Validation {
                peer: peer.to_string(),
                details: format!("payload could not be serialized: {}", e),
                attempts: 0,
            })?;

        let max_attempts = options.max_attempts.unwrap_or(self.policy.max_attempts).max(1);
        let attempt_timeout = options.attempt_timeout.unwrap_or(self.timeouts.attempt);

        let mut records = Vec::with_capacity(max_attempts as usize);
        let mut retry_after = None;
        let mut attempt = 0u32;

        loop {
            let delay = self.policy.delay_before(attempt, retry_after.take());
            if !delay.is_zero() {
                self.sleeper.sleep(delay).await;
            }

            let started = Instant::now();
            let result = self
                .attempt_once(pool, path, &body, correlation_id, options, attempt_timeout)
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    let record = RetryAttempt {
                        attempt_index: attempt,
                        delay_before_attempt_ms: delay.as_millis() as u64,
                        outcome: AttemptOutcome::Success,
                        error_kind: None,
                        elapsed_ms,
                    };
                    self.sink.attempt(peer, correlation_id.as_str(), &record);
                    records.push(record);

                    return Ok(CallResponse {
                        peer: peer.to_string(),
                        status: response.status,
                        headers: response.headers,
                        body: response.body,
                        attempts: records,
                    });
                }
                Err(failure) => {
                    let kind = failure.kind();
                    let retry = self.policy.should_retry(attempt, max_attempts, kind);
                    let record = RetryAttempt {
                        attempt_index: attempt,
                        delay_before_attempt_ms: delay.as_millis() as u64,
                        outcome: if retry {
                            AttemptOutcome::RetryableFailure
                        } else {
                            AttemptOutcome::TerminalFailure
                        },
                        error_kind: Some(kind),
                        elapsed_ms,
                    };
                    self.sink.attempt(peer, correlation_id.as_str(), &record);
                    records.push(record);

                    if retry {
                        retry_after = failure.retry_after();
                        attempt += 1;
                        continue;
                    }

                    let error = failure.into_call_error(peer, attempt + 1);
                    if kind == ErrorKind::Unknown {
                        tracing::error!(
                            peer,
                            correlation_id = %correlation_id,
                            error_kind = %kind,
                            attempts = attempt + 1,
                            peer_status = ?error.peer_status(),
                            error = %error,
                            "Outbound call failed with an unclassified error"
                        );
                    } else {
                        tracing::warn!(
                            peer,
                            correlation_id = %correlation_id,
                            error_kind = %kind,
                            attempts = attempt + 1,
                            error = %error,
                            "Outbound call failed"
                        );
                    }
                    return Err(error);
                }
            }
        }
    }

    /// [`call`](Self::call) on a spawned task.
    ///
    /// The call runs to completion even if the caller's future is dropped.
    pub async fn call_detached<T>(
        self: &Arc<Self>,
        peer: &str,
        path: &str,
        payload: T,
        correlation_id: &CorrelationId,
        options: CallOptions,
    ) -> Result<CallResponse, CallError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let client = Arc::clone(self);
        let peer_name = peer.to_string();
        let path = path.to_string();
        let correlation_id = correlation_id.clone();

        let task = tokio::spawn(
            async move {
                client
                    .call(&peer_name, &path, &payload, &correlation_id, &options)
                    .await
            }
            .in_current_span(),
        );

        match task.await {
            Ok(result) => result,
            Err(join_error) => Err(CallError::Unknown {
                peer: peer.to_string(),
                reason: format!("call task failed: {}", join_error),
                status: None,
                attempts: 0,
            }),
        }
    }

    async fn attempt_once(
        &self,
        pool: &PeerPool,
        path: &str,
        body: &Bytes,
        correlation_id: &CorrelationId,
        options: &CallOptions,
        attempt_timeout: Duration,
    ) -> Result<PeerResponse, AttemptFailure> {
        let lease = pool
            .acquire(self.timeouts.pool)
            .await
            .map_err(AttemptFailure::Pool)?;

        let mut request = Request::new(Body::from(body.clone()));
        *request.method_mut() = options.method.clone();
        *request.uri_mut() = pool.uri_for(path).map_err(AttemptFailure::Transport)?;

        let headers = request.headers_mut();
        headers.extend(options.headers.clone());
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::USER_AGENT, self.user_agent.clone());
        headers.insert(X_CORRELATION_ID, correlation_id.header_value());

        tracing::debug!(
            peer = pool.name(),
            method = %request.method(),
            uri = %request.uri(),
            headers = %RedactedHeaders(request.headers()),
            "Sending outbound request"
        );

        let response = with_deadline(attempt_timeout, lease.send(request))
            .await
            .map_err(|elapsed| AttemptFailure::Transport(TransportError::Timeout(elapsed.to_string())))?
            .map_err(AttemptFailure::Transport)?;

        if response.status.is_success() {
            Ok(response)
        } else {
            tracing::debug!(
                peer = pool.name(),
                status = %response.status,
                headers = %RedactedHeaders(&response.headers),
                "Peer answered with a non-success status"
            );
            Err(AttemptFailure::Status(response))
        }
    }

    /// One probe of `peer`'s health endpoint. Never fails and never retries.
    pub async fn health_check(&self, peer: &str) -> HealthReport {
        let started = Instant::now();
        let Some(pool) = self.peers.get(peer) else {
            return HealthReport::unhealthy(peer, 0, None, "peer is not configured");
        };

        let result = pool.probe(self.timeouts.health_check, &self.user_agent).await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let report = match result {
            Ok(response) if response.status.is_success() => {
                HealthReport::healthy(peer, response_time_ms, response.status.as_u16())
            }
            Ok(response) => HealthReport::unhealthy(
                peer,
                response_time_ms,
                Some(response.status.as_u16()),
                format!("health endpoint answered {}", response.status),
            ),
            Err(err) => HealthReport::unhealthy(peer, response_time_ms, None, err.to_string()),
        };

        if !report.is_healthy() {
            tracing::warn!(
                peer,
                response_time_ms,
                reason = report.reason.as_deref().unwrap_or_default(),
                "Health check failed"
            );
        }
        metrics::record_peer_health(peer, report.is_healthy());
        report
    }

    /// Health of every configured peer, sorted by name.
    pub async fn check_all(&self) -> Vec<HealthReport> {
        let mut reports = Vec::with_capacity(self.peers.len());
        for peer in self.peer_names() {
            reports.push(self.health_check(peer).await);
        }
        reports
    }

    /// Close every pool. Calls made afterwards fail as `Unknown`.
    pub fn shutdown(&self) {
        for pool in self.peers.values() {
            pool.close();
        }
        tracing::info!(peers = self.peers.len(), "Outbound connection pools closed");
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("peers", &self.peer_names())
            .field("policy", &self.policy)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn error_body(body: &Bytes) -> String {
    let cut = body.len().min(MAX_ERROR_BODY_BYTES);
    String::from_utf8_lossy(&body[..cut]).into_owned()
}
