//! The async and blocking clients.
//!
//! Both clients drive the same loop for every operation:
//!
//! 1. wait for the rate-limit gate,
//! 2. build a fresh [`PreparedRequest`](crate::api::PreparedRequest),
//! 3. execute one attempt on the transport,
//! 4. record quota headers,
//! 5. ask the retry policy whether to go again,
//! 6. map the final outcome.
//!
//! Steps 1, 2, 4, 5 and 6 live in [`Pipeline`] and are shared. The clients
//! differ only in how they perform I/O and how they sleep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::rate_limit::{Clock, RateLimiter};
use crate::api::request::{AttemptStamp, OperationDescriptor, PreparedRequest, build_request};
use crate::api::response::{ApiResponse, map_outcome};
use crate::api::retry::Decision;
use crate::api::transport::{
    AttemptOutcome, BlockingReqwestTransport, BlockingTransport, ReqwestTransport, Transport,
};
use crate::auth::{CredentialFragment, CredentialSource, Credentials, sources_with_file};
use crate::config::{ClientConfig, ConfigFile};
use crate::error::{Error, Result};
use crate::resources::{AgentSwarm, Analytics, Memory, Projects, Vectors};

/// Shared, mode-independent half of a client.
#[derive(Debug)]
pub(crate) struct Pipeline {
    credentials: Credentials,
    config: ClientConfig,
    limiter: RateLimiter,
}

/// What the caller should do after an attempt.
pub(crate) enum Step {
    Retry(Duration),
    Done(Result<ApiResponse>),
}

impl Pipeline {
    fn new(credentials: Credentials, config: ClientConfig, clock: Arc<dyn Clock>) -> Self {
        let limiter = RateLimiter::with_clock(config.max_rate_limit_wait, clock);
        Self {
            credentials,
            config,
            limiter,
        }
    }

    /// Proactive delay before the next attempt, if quota is exhausted.
    fn gate(&self) -> Option<Duration> {
        let wait = self.limiter.wait_time()?;
        debug!("Rate limit exhausted, waiting {wait:?} before next request");
        Some(wait)
    }

    fn prepare(&self, op: &OperationDescriptor) -> Result<PreparedRequest> {
        build_request(op, &self.credentials, self.config.timeout, &AttemptStamp::fresh())
    }

    fn settle(
        &self,
        op: &OperationDescriptor,
        attempt: u32,
        outcome: AttemptOutcome,
        elapsed: Duration,
    ) -> Step {
        if let Some(headers) = outcome.headers() {
            self.limiter.observe(headers);
        }

        let status = outcome
            .status()
            .map_or_else(|| "transport failure".to_string(), |s| s.to_string());
        debug!(
            "{} {} -> {status} in {}ms (attempt {attempt})",
            op.method,
            op.path,
            elapsed.as_millis(),
        );

        let now = self.limiter.clock().now();
        match self.config.retry.decide_at(&outcome, attempt, op, now) {
            Decision::Retry(delay) => {
                warn!(
                    "Transient failure on {} {} (attempt {}/{}): {status}. Retrying in {delay:?}...",
                    op.method,
                    op.path,
                    attempt,
                    self.config.retry.attempts_for(op),
                );
                Step::Retry(delay)
            }
            Decision::GiveUp => Step::Done(map_outcome(outcome, now)),
        }
    }
}

// ── Async client ──

/// Async client for the AINative platform.
///
/// Cheap to clone; clones share the connection pool and rate-limit state.
#[derive(Clone)]
pub struct AinativeClient {
    pipeline: Arc<Pipeline>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for AinativeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AinativeClient")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl AinativeClient {
    /// Client with an explicit API key; other settings from the environment,
    /// the config file, and defaults.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    /// Client configured entirely from the environment and config file.
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Execute `op` with retries and rate-limit cooperation.
    ///
    /// Dropping the returned future cancels the operation.
    pub async fn send(&self, op: &OperationDescriptor) -> Result<ApiResponse> {
        let mut attempt = 1;
        loop {
            if let Some(wait) = self.pipeline.gate() {
                tokio::time::sleep(wait).await;
            }
            let request = self.pipeline.prepare(op)?;
            let started = Instant::now();
            let outcome = self.transport.execute(request).await;
            match self.pipeline.settle(op, attempt, outcome, started.elapsed()) {
                Step::Retry(delay) => {
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Step::Done(result) => return result,
            }
        }
    }

    /// Like [`send`](Self::send), but stops with
    /// [`ErrorKind::Cancelled`](crate::ErrorKind::Cancelled) once `token` fires.
    /// No attempt is started after cancellation.
    pub async fn send_cancellable(
        &self,
        op: &OperationDescriptor,
        token: &CancellationToken,
    ) -> Result<ApiResponse> {
        if token.is_cancelled() {
            return Err(Error::cancelled());
        }
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("{} {} cancelled by caller", op.method, op.path);
                Err(Error::cancelled())
            }
            result = self.send(op) => result,
        }
    }

    /// Execute `op` and decode the body into `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, op: &OperationDescriptor) -> Result<T> {
        self.send(op).await?.json()
    }

    /// `GET /health` on the platform.
    pub async fn health_check(&self) -> Result<serde_json::Value> {
        Ok(self.send(&crate::resources::health()).await?.into_body())
    }

    pub fn credentials(&self) -> &Credentials {
        &self.pipeline.credentials
    }

    pub fn config(&self) -> &ClientConfig {
        &self.pipeline.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.pipeline.limiter
    }

    pub fn projects(&self) -> Projects<'_> {
        Projects::new(self)
    }

    pub fn vectors(&self) -> Vectors<'_> {
        Vectors::new(self)
    }

    pub fn memory(&self) -> Memory<'_> {
        Memory::new(self)
    }

    pub fn analytics(&self) -> Analytics<'_> {
        Analytics::new(self)
    }

    pub fn agent_swarm(&self) -> AgentSwarm<'_> {
        AgentSwarm::new(self)
    }
}

// ── Blocking client ──

/// Blocking client. Shares all policy with [`AinativeClient`]; only the
/// transport and the sleep differ.
///
/// Do not use from inside an async runtime thread.
pub struct BlockingClient {
    pipeline: Arc<Pipeline>,
    transport: Arc<dyn BlockingTransport>,
}

impl std::fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl BlockingClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ClientBuilder::default().api_key(api_key).build_blocking()
    }

    pub fn send(&self, op: &OperationDescriptor) -> Result<ApiResponse> {
        let mut attempt = 1;
        loop {
            if let Some(wait) = self.pipeline.gate() {
                std::thread::sleep(wait);
            }
            let request = self.pipeline.prepare(op)?;
            let started = Instant::now();
            let outcome = self.transport.execute(request);
            match self.pipeline.settle(op, attempt, outcome, started.elapsed()) {
                Step::Retry(delay) => {
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Step::Done(result) => return result,
            }
        }
    }

    pub fn send_json<T: DeserializeOwned>(&self, op: &OperationDescriptor) -> Result<T> {
        self.send(op)?.json()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.pipeline.credentials
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.pipeline.limiter
    }
}

// ── Builder ──

/// Builder for [`AinativeClient`] and [`BlockingClient`].
///
/// Explicit values win over `AINATIVE_*` environment variables, which win
/// over the config file, which wins over defaults.
pub struct ClientBuilder {
    explicit: CredentialFragment,
    config: Option<ClientConfig>,
    timeout: Option<Duration>,
    max_attempts: Option<u32>,
    transport: Option<Arc<dyn Transport>>,
    blocking_transport: Option<Arc<dyn BlockingTransport>>,
    clock: Option<Arc<dyn Clock>>,
    ambient: bool,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            explicit: CredentialFragment::default(),
            config: None,
            timeout: None,
            max_attempts: None,
            transport: None,
            blocking_transport: None,
            clock: None,
            ambient: true,
        }
    }
}

impl ClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.explicit.api_key = Some(api_key.into());
        self
    }

    pub fn api_secret(mut self, secret: impl Into<String>) -> Self {
        self.explicit.api_secret = Some(secret.into());
        self
    }

    pub fn organization_id(mut self, organization_id: impl Into<String>) -> Self {
        self.explicit.organization_id = Some(organization_id.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.explicit.base_url = Some(base_url.into());
        self
    }

    /// Replace the whole transport configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Use a custom async transport instead of `reqwest`.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom blocking transport instead of `reqwest::blocking`.
    pub fn blocking_transport(mut self, transport: Arc<dyn BlockingTransport>) -> Self {
        self.blocking_transport = Some(transport);
        self
    }

    /// Clock used for rate-limit windows and HTTP-date `Retry-After` values.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Ignore the environment and the config file.
    pub fn without_ambient_sources(mut self) -> Self {
        self.ambient = false;
        self
    }

    fn resolve(&self) -> Result<(Credentials, ClientConfig)> {
        if self.ambient {
            // One read serves both the credential chain and the client settings.
            let file = ConfigFile::load_default()?;
            self.resolve_with(&sources_with_file(self.explicit.clone(), &file), &file)
        } else {
            let explicit = self.explicit.clone();
            let sources: Vec<CredentialSource> = vec![
                Box::new(move || Ok(explicit.clone())),
                Box::new(|| Ok(CredentialFragment::defaults())),
            ];
            self.resolve_with(&sources, &ConfigFile::default())
        }
    }

    fn resolve_with(&self, sources: &[CredentialSource], file: &ConfigFile) -> Result<(Credentials, ClientConfig)> {
        let credentials = Credentials::resolve(sources)?;
        let mut config = match &self.config {
            Some(config) => config.clone(),
            None => ClientConfig::default().apply_file(file),
        };
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(attempts) = self.max_attempts {
            config.retry.max_attempts = attempts.max(1);
        }
        Ok((credentials, config))
    }

    fn pipeline(&self, credentials: Credentials, config: ClientConfig) -> Arc<Pipeline> {
        let clock = self
            .clock
            .clone()
            .unwrap_or_else(|| Arc::new(crate::api::rate_limit::SystemClock));
        Arc::new(Pipeline::new(credentials, config, clock))
    }

    pub fn build(self) -> Result<AinativeClient> {
        let (credentials, config) = self.resolve()?;
        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(ReqwestTransport::new(&config)?),
        };
        Ok(AinativeClient {
            pipeline: self.pipeline(credentials, config),
            transport,
        })
    }

    pub fn build_blocking(self) -> Result<BlockingClient> {
        let (credentials, config) = self.resolve()?;
        let transport: Arc<dyn BlockingTransport> = match &self.blocking_transport {
            Some(transport) => transport.clone(),
            None => Arc::new(BlockingReqwestTransport::new(&config)?),
        };
        Ok(BlockingClient {
            pipeline: self.pipeline(credentials, config),
            transport,
        })
    }
}
