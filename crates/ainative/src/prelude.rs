//! Convenience re-exports for common `ainative` types.
//!
//! ```ignore
//! use ainative::prelude::*;
//! ```
//!
//! Pulls in the clients, the builder, configuration, the error types, the
//! descriptor type for raw calls, and the parameter structs used by the
//! resource handles. Transport internals (the `Transport` traits, outcomes,
//! clocks) stay in [`crate::api`].

// ── Clients ─────────────────────────────────────────────────────────
pub use crate::{AinativeClient, BlockingClient, ClientBuilder, ClientConfig};

// ── Errors ──────────────────────────────────────────────────────────
pub use crate::{ConfigProblem, Error, ErrorKind, FieldError, Result};

// ── Raw calls ───────────────────────────────────────────────────────
pub use crate::api::{ApiResponse, Method, OperationDescriptor, RetryConfig};
pub use tokio_util::sync::CancellationToken;

// ── Resources ───────────────────────────────────────────────────────
pub use crate::resources::agent_swarm::{AgentType, SwarmStatus};
pub use crate::resources::analytics::Window;
pub use crate::resources::memory::{ListMemories, MemoryPriority, MemorySearch, MemoryUpdate, NewMemory};
pub use crate::resources::projects::{ListProjects, NewProject, ProjectStatus, ProjectUpdate};
pub use crate::resources::vectors::{VectorRecord, VectorSearch, VectorSelection};
