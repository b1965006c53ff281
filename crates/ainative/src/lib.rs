//! Resilient Rust client for the AINative platform.
//!
//! `ainative` gives typed access to ZeroDB projects, vector search, memory
//! storage, analytics, and agent-swarm orchestration over HTTPS. The core is
//! a small transport layer that every call goes through: authenticated request
//! construction, retry with exponential backoff, cooperation with the server's
//! rate limits, and a closed error taxonomy.
//!
//! # Getting started
//!
//! ```ignore
//! use ainative::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> ainative::Result<()> {
//!     // Reads AINATIVE_API_KEY etc. when not given explicitly.
//!     let client = AinativeClient::builder()
//!         .api_key("ak_live_...")
//!         .max_attempts(5)
//!         .build()?;
//!
//!     let projects = client.projects().list(&Default::default()).await?;
//!     println!("{projects}");
//!
//!     let hits = client
//!         .vectors()
//!         .search(&VectorSearch::new("proj_1", vec![0.1, 0.2, 0.3]))
//!         .await?;
//!     println!("{} matches", hits.len());
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Credentials and signing:** [`auth`]. Explicit values beat
//!   `AINATIVE_*` environment variables, which beat the config file.
//! - **Timeouts, retry budget, rate-limit wait cap:** [`ClientConfig`] and
//!   [`RetryConfig`](api::RetryConfig).
//! - **Raw calls:** build an [`OperationDescriptor`](api::OperationDescriptor)
//!   and pass it to [`AinativeClient::send`]. The [`resources`] modules are
//!   thin constructors over the same type.
//! - **Errors:** match on [`Error::kind`]. Retryable kinds have already been
//!   retried locally by the time you see them.
//! - **No async runtime:** use [`BlockingClient`]; it shares all policy with
//!   the async client.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Request builder, transport seam, retry policy, rate limiter, response mapper |
//! | [`client`] | [`AinativeClient`], [`BlockingClient`], [`ClientBuilder`] |
//! | [`resources`] | Projects, vectors, memory, analytics, agent swarm |
//! | [`auth`] | Credential resolution and request signing |
//! | [`config`] | [`ClientConfig`] and the TOML config file |
//! | [`error`] | [`Error`], [`ErrorKind`] |

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod prelude;
pub mod resources;

pub use client::{AinativeClient, BlockingClient, ClientBuilder};
pub use config::ClientConfig;
pub use error::{ConfigProblem, Error, ErrorKind, FieldError, Result};

// ── Constants ──────────────────────────────────────────────────────

/// Public platform endpoint; `/api/v1` is appended during normalization.
pub const DEFAULT_BASE_URL: &str = "https://api.ainative.studio";

/// Sent as `X-SDK-Version`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sent as `X-SDK-Language`.
pub const SDK_LANGUAGE: &str = "Rust";

pub const USER_AGENT: &str = concat!("ainative-rust/", env!("CARGO_PKG_VERSION"));
