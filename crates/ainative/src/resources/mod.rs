//! Platform endpoints as [`OperationDescriptor`] constructors.
//!
//! Each submodule has two layers:
//!
//! - free functions that build descriptors (pure, unit-testable, usable with
//!   either client via `send`);
//! - a borrowed handle (`client.projects()`, `client.vectors()`, ...) that
//!   sends those descriptors on an [`AinativeClient`] and unwraps list
//!   envelopes.
//!
//! Payloads stay opaque [`serde_json::Value`]s; the transport core gives them
//! no meaning.

pub mod agent_swarm;
pub mod analytics;
pub mod memory;
pub mod projects;
pub mod vectors;

use serde_json::{Map, Value};

use crate::api::request::OperationDescriptor;
use crate::client::AinativeClient;
use crate::error::Result;

pub use agent_swarm::{AgentSwarm, AgentType, SwarmStatus};
pub use analytics::Analytics;
pub use memory::{Memory, MemoryPriority};
pub use projects::{ProjectStatus, Projects};
pub use vectors::Vectors;

/// `GET /health` (platform-wide).
pub fn health() -> OperationDescriptor {
    OperationDescriptor::get("/health")
}

/// `GET /zerodb/health`.
pub fn zerodb_health() -> OperationDescriptor {
    OperationDescriptor::get("/zerodb/health")
}

/// `GET /zerodb/usage`.
pub fn zerodb_usage() -> OperationDescriptor {
    OperationDescriptor::get("/zerodb/usage")
}

/// Send `op` and return the decoded body.
pub(crate) async fn fetch(client: &AinativeClient, op: OperationDescriptor) -> Result<Value> {
    Ok(client.send(&op).await?.into_body())
}

/// Send `op` and return the array under `key` (empty when absent).
pub(crate) async fn fetch_list(
    client: &AinativeClient,
    op: OperationDescriptor,
    key: &str,
) -> Result<Vec<Value>> {
    Ok(client.send(&op).await?.list(key))
}

/// JSON object builder that skips absent optional fields.
#[derive(Debug, Default)]
pub(crate) struct Body(Map<String, Value>);

impl Body {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub(crate) fn set_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    pub(crate) fn build(self) -> Value {
        Value::Object(self.0)
    }
}

/// Lowercase wire name shared by the resource enums.
macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> $crate::error::Result<Self> {
                let wanted = s.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        $crate::error::Error::validation(format!(
                            "unknown {} '{s}'",
                            stringify!($name)
                        ))
                    })
            }
        }

        impl From<$name> for serde_json::Value {
            fn from(value: $name) -> Self {
                serde_json::Value::String(value.as_str().to_string())
            }
        }
    };
}
pub(crate) use wire_enum;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::Method;
    use serde_json::json;

    #[test]
    fn health_descriptors() {
        assert_eq!(health().path, "/health");
        assert_eq!(zerodb_health().method, Method::Get);
        assert_eq!(zerodb_usage().path, "/zerodb/usage");
    }

    #[test]
    fn body_skips_absent_fields() {
        let body = Body::new()
            .set("name", "demo")
            .set_opt("description", None::<String>)
            .set_opt("limit", Some(5))
            .build();
        assert_eq!(body, json!({"name": "demo", "limit": 5}));
    }
}
