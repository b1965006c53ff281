//! Memory entries: creation, listing, semantic search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Body, fetch, fetch_list};
use crate::api::request::OperationDescriptor;
use crate::client::AinativeClient;
use crate::error::Result;

const BASE: &str = "/zerodb/memory";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

super::wire_enum!(MemoryPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// Fields for [`create`].
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub content: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub priority: MemoryPriority,
    pub metadata: Option<Value>,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Filters for [`list`].
#[derive(Debug, Clone)]
pub struct ListMemories {
    pub limit: u32,
    pub offset: u32,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub tags: Vec<String>,
    pub priority: Option<MemoryPriority>,
    pub search: Option<String>,
}

impl Default for ListMemories {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            project_id: None,
            user_id: None,
            tags: Vec::new(),
            priority: None,
            search: None,
        }
    }
}

/// Fields for [`update`]; only the `Some` fields are sent.
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<MemoryPriority>,
    pub metadata: Option<Value>,
}

/// Parameters for [`search`].
#[derive(Debug, Clone)]
pub struct MemorySearch {
    pub query: String,
    pub limit: u32,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub semantic: bool,
}

impl MemorySearch {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 10,
            project_id: None,
            user_id: None,
            semantic: true,
        }
    }
}

pub fn create(memory: &NewMemory) -> OperationDescriptor {
    let body = Body::new()
        .set("content", memory.content.as_str())
        .set(
            "title",
            memory.title.as_deref().unwrap_or("Memory Entry"),
        )
        .set("tags", json!(memory.tags))
        .set("priority", memory.priority)
        .set("metadata", memory.metadata.clone().unwrap_or_else(|| json!({})))
        .set_opt("project_id", memory.project_id.clone())
        .set_opt("user_id", memory.user_id.clone())
        .set_opt("expires_at", memory.expires_at.map(|t| t.to_rfc3339()));
    OperationDescriptor::post(BASE).with_body(body.build())
}

/// `GET /zerodb/memories`.
pub fn list(query: &ListMemories) -> OperationDescriptor {
    let tags = (!query.tags.is_empty()).then(|| query.tags.join(","));
    OperationDescriptor::get("/zerodb/memories")
        .with_query("limit", query.limit)
        .with_query("offset", query.offset)
        .with_query_opt("project_id", query.project_id.as_deref())
        .with_query_opt("user_id", query.user_id.as_deref())
        .with_query_opt("tags", tags)
        .with_query_opt("priority", query.priority)
        .with_query_opt("search", query.search.as_deref())
}

pub fn get(memory_id: &str) -> OperationDescriptor {
    OperationDescriptor::get(format!("{BASE}/{{id}}")).with_path_param("id", memory_id)
}

pub fn update(memory_id: &str, update: &MemoryUpdate) -> OperationDescriptor {
    OperationDescriptor::patch(format!("{BASE}/{{id}}"))
        .with_path_param("id", memory_id)
        .with_body(
            Body::new()
                .set_opt("content", update.content.clone())
                .set_opt("title", update.title.clone())
                .set_opt("tags", update.tags.as_ref().map(|t| json!(t)))
                .set_opt("priority", update.priority)
                .set_opt("metadata", update.metadata.clone())
                .build(),
        )
}

pub fn delete(memory_id: &str) -> OperationDescriptor {
    OperationDescriptor::delete(format!("{BASE}/{{id}}")).with_path_param("id", memory_id)
}

/// `POST /zerodb/memory/search`. Read-only, so safe to retry.
pub fn search(params: &MemorySearch) -> OperationDescriptor {
    OperationDescriptor::post(format!("{BASE}/search"))
        .with_idempotent(true)
        .with_body(
            Body::new()
                .set("query", params.query.as_str())
                .set("limit", params.limit)
                .set("semantic", params.semantic)
                .set_opt("project_id", params.project_id.clone())
                .set_opt("user_id", params.user_id.clone())
                .build(),
        )
}

/// `POST /zerodb/memory/bulk`.
pub fn bulk_create(memories: Vec<Value>, project_id: Option<&str>) -> OperationDescriptor {
    OperationDescriptor::post(format!("{BASE}/bulk")).with_body(
        Body::new()
            .set("memories", Value::Array(memories))
            .set_opt("project_id", project_id)
            .build(),
    )
}

/// `GET /zerodb/memory/{id}/related`.
pub fn related(memory_id: &str, limit: u32) -> OperationDescriptor {
    OperationDescriptor::get(format!("{BASE}/{{id}}/related"))
        .with_path_param("id", memory_id)
        .with_query("limit", limit)
}

/// Memory operations bound to a client.
#[derive(Debug, Clone, Copy)]
pub struct Memory<'a> {
    client: &'a AinativeClient,
}

impl<'a> Memory<'a> {
    pub(crate) fn new(client: &'a AinativeClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, memory: &NewMemory) -> Result<Value> {
        fetch(self.client, create(memory)).await
    }

    pub async fn list(&self, query: &ListMemories) -> Result<Value> {
        fetch(self.client, list(query)).await
    }

    pub async fn get(&self, memory_id: &str) -> Result<Value> {
        fetch(self.client, get(memory_id)).await
    }

    pub async fn update(&self, memory_id: &str, changes: &MemoryUpdate) -> Result<Value> {
        fetch(self.client, update(memory_id, changes)).await
    }

    pub async fn delete(&self, memory_id: &str) -> Result<Value> {
        fetch(self.client, delete(memory_id)).await
    }

    pub async fn search(&self, params: &MemorySearch) -> Result<Vec<Value>> {
        fetch_list(self.client, search(params), "results").await
    }

    pub async fn bulk_create(&self, memories: Vec<Value>, project_id: Option<&str>) -> Result<Value> {
        fetch(self.client, bulk_create(memories, project_id)).await
    }

    pub async fn related(&self, memory_id: &str, limit: u32) -> Result<Vec<Value>> {
        fetch_list(self.client, related(memory_id, limit), "memories").await
    }
}
