//! ZeroDB project management.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Body, fetch, fetch_list};
use crate::api::request::OperationDescriptor;
use crate::client::AinativeClient;
use crate::error::Result;

const BASE: &str = "/zerodb/projects";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Suspended,
    Archived,
    Deleted,
}

super::wire_enum!(ProjectStatus {
    Active => "active",
    Suspended => "suspended",
    Archived => "archived",
    Deleted => "deleted",
});

/// Filters for [`list`].
#[derive(Debug, Clone)]
pub struct ListProjects {
    pub limit: u32,
    pub offset: u32,
    pub status: Option<ProjectStatus>,
    pub organization_id: Option<String>,
}

impl Default for ListProjects {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            status: None,
            organization_id: None,
        }
    }
}

/// Fields for [`create`].
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub metadata: Option<Value>,
    pub config: Option<Value>,
}

impl NewProject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Fields for [`update`]; only the `Some` fields are sent.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Value>,
    pub config: Option<Value>,
}

pub fn list(query: &ListProjects) -> OperationDescriptor {
    OperationDescriptor::get(BASE)
        .with_query("limit", query.limit)
        .with_query("offset", query.offset)
        .with_query_opt("status", query.status)
        .with_query_opt("organization_id", query.organization_id.as_deref())
}

pub fn create(project: &NewProject) -> OperationDescriptor {
    OperationDescriptor::post(BASE).with_body(json!({
        "name": project.name,
        "description": project.description.clone().unwrap_or_default(),
        "metadata": project.metadata.clone().unwrap_or_else(|| json!({})),
        "config": project.config.clone().unwrap_or_else(|| json!({})),
    }))
}

pub fn get(project_id: &str) -> OperationDescriptor {
    OperationDescriptor::get(format!("{BASE}/{{id}}")).with_path_param("id", project_id)
}

pub fn update(project_id: &str, update: &ProjectUpdate) -> OperationDescriptor {
    OperationDescriptor::patch(format!("{BASE}/{{id}}"))
        .with_path_param("id", project_id)
        .with_body(
            Body::new()
                .set_opt("name", update.name.clone())
                .set_opt("description", update.description.clone())
                .set_opt("metadata", update.metadata.clone())
                .set_opt("config", update.config.clone())
                .build(),
        )
}

/// `PUT .../{id}/status`. Setting a status is idempotent.
pub fn update_status(
    project_id: &str,
    status: ProjectStatus,
    reason: Option<&str>,
) -> OperationDescriptor {
    OperationDescriptor::put(format!("{BASE}/{{id}}/status"))
        .with_path_param("id", project_id)
        .with_body(json!({ "status": status, "reason": reason }))
}

pub fn suspend(project_id: &str, reason: Option<&str>) -> OperationDescriptor {
    update_status(project_id, ProjectStatus::Suspended, reason)
}

pub fn activate(project_id: &str) -> OperationDescriptor {
    update_status(project_id, ProjectStatus::Active, None)
}

pub fn delete(project_id: &str) -> OperationDescriptor {
    OperationDescriptor::delete(format!("{BASE}/{{id}}")).with_path_param("id", project_id)
}

pub fn statistics(project_id: &str) -> OperationDescriptor {
    OperationDescriptor::get(format!("{BASE}/{{id}}/statistics")).with_path_param("id", project_id)
}

pub fn collections(project_id: &str) -> OperationDescriptor {
    OperationDescriptor::get(format!("{BASE}/{{id}}/collections"))
        .with_path_param("id", project_id)
}

/// Project operations bound to a client.
#[derive(Debug, Clone, Copy)]
pub struct Projects<'a> {
    client: &'a AinativeClient,
}

impl<'a> Projects<'a> {
    pub(crate) fn new(client: &'a AinativeClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &ListProjects) -> Result<Value> {
        fetch(self.client, list(query)).await
    }

    pub async fn create(&self, project: &NewProject) -> Result<Value> {
        fetch(self.client, create(project)).await
    }

    pub async fn get(&self, project_id: &str) -> Result<Value> {
        fetch(self.client, get(project_id)).await
    }

    pub async fn update(&self, project_id: &str, changes: &ProjectUpdate) -> Result<Value> {
        fetch(self.client, update(project_id, changes)).await
    }

    pub async fn suspend(&self, project_id: &str, reason: Option<&str>) -> Result<Value> {
        fetch(self.client, suspend(project_id, reason)).await
    }

    pub async fn activate(&self, project_id: &str) -> Result<Value> {
        fetch(self.client, activate(project_id)).await
    }

    pub async fn delete(&self, project_id: &str) -> Result<Value> {
        fetch(self.client, delete(project_id)).await
    }

    pub async fn statistics(&self, project_id: &str) -> Result<Value> {
        fetch(self.client, statistics(project_id)).await
    }

    pub async fn collections(&self, project_id: &str) -> Result<Vec<Value>> {
        fetch_list(self.client, collections(project_id), "collections").await
    }
}
