//! Vector upsert, similarity search, and maintenance.

use serde::Serialize;
use serde_json::{Value, json};

use super::{Body, fetch, fetch_list};
use crate::api::request::OperationDescriptor;
use crate::client::AinativeClient;
use crate::error::{Error, Result};

const BASE: &str = "/zerodb/vectors";
pub const DEFAULT_NAMESPACE: &str = "default";

/// One vector to upsert. A missing id is assigned by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub vector: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl VectorRecord {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            id: None,
            metadata: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Parameters for [`search`].
#[derive(Debug, Clone)]
pub struct VectorSearch {
    pub project_id: String,
    pub vector: Vec<f32>,
    pub top_k: u32,
    pub namespace: String,
    pub filter: Option<Value>,
    pub include_metadata: bool,
    pub include_values: bool,
}

impl VectorSearch {
    pub fn new(project_id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            project_id: project_id.into(),
            vector,
            top_k: 10,
            namespace: DEFAULT_NAMESPACE.to_string(),
            filter: None,
            include_metadata: true,
            include_values: false,
        }
    }
}

/// Which vectors [`delete`] removes.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorSelection {
    Ids(Vec<String>),
    Filter(Value),
    All,
}

/// `PUT /zerodb/vectors`. Upserts are idempotent.
pub fn upsert(project_id: &str, namespace: &str, records: &[VectorRecord]) -> OperationDescriptor {
    OperationDescriptor::put(BASE).with_body(json!({
        "project_id": project_id,
        "namespace": namespace,
        "items": records,
    }))
}

/// `POST /zerodb/vectors/search`. Read-only, so safe to retry.
pub fn search(params: &VectorSearch) -> OperationDescriptor {
    OperationDescriptor::post(format!("{BASE}/search"))
        .with_idempotent(true)
        .with_body(
            Body::new()
                .set("project_id", params.project_id.as_str())
                .set("vector", json!(params.vector))
                .set("top_k", params.top_k)
                .set("namespace", params.namespace.as_str())
                .set("include_metadata", params.include_metadata)
                .set("include_values", params.include_values)
                .set_opt("filter", params.filter.clone())
                .build(),
        )
}

/// `GET /zerodb/vectors` by id.
pub fn get(project_id: &str, ids: &[String], namespace: &str) -> OperationDescriptor {
    OperationDescriptor::get(BASE)
        .with_query("project_id", project_id)
        .with_query("ids", ids.join(","))
        .with_query("namespace", namespace)
        .with_query("include_metadata", true)
        .with_query("include_values", true)
}

/// `DELETE /zerodb/vectors`. An empty id list is rejected before sending.
pub fn delete(
    project_id: &str,
    namespace: &str,
    selection: &VectorSelection,
) -> Result<OperationDescriptor> {
    let body = Body::new()
        .set("project_id", project_id)
        .set("namespace", namespace);
    let body = match selection {
        VectorSelection::All => body.set("delete_all", true),
        VectorSelection::Ids(ids) if !ids.is_empty() => body.set("ids", json!(ids)),
        VectorSelection::Filter(filter) if !filter.is_null() => body.set("filter", filter.clone()),
        _ => {
            return Err(Error::validation(
                "vector delete needs ids, a filter, or delete-all",
            ));
        }
    };
    Ok(OperationDescriptor::delete(BASE).with_body(body.build()))
}

/// `PATCH /zerodb/vectors/{id}/metadata`.
pub fn update_metadata(
    project_id: &str,
    vector_id: &str,
    metadata: Value,
    namespace: &str,
) -> OperationDescriptor {
    OperationDescriptor::patch(format!("{BASE}/{{id}}/metadata"))
        .with_path_param("id", vector_id)
        .with_body(json!({
            "project_id": project_id,
            "id": vector_id,
            "metadata": metadata,
            "namespace": namespace,
        }))
}

/// `GET /zerodb/vectors/stats`.
pub fn stats(project_id: &str, namespace: Option<&str>) -> OperationDescriptor {
    OperationDescriptor::get(format!("{BASE}/stats"))
        .with_query("project_id", project_id)
        .with_query_opt("namespace", namespace)
}

/// Vector operations bound to a client.
#[derive(Debug, Clone, Copy)]
pub struct Vectors<'a> {
    client: &'a AinativeClient,
}

impl<'a> Vectors<'a> {
    pub(crate) fn new(client: &'a AinativeClient) -> Self {
        Self { client }
    }

    pub async fn upsert(
        &self,
        project_id: &str,
        namespace: &str,
        records: &[VectorRecord],
    ) -> Result<Value> {
        fetch(self.client, upsert(project_id, namespace, records)).await
    }

    /// Matches with scores, unwrapped from `results`.
    pub async fn search(&self, params: &VectorSearch) -> Result<Vec<Value>> {
        fetch_list(self.client, search(params), "results").await
    }

    pub async fn get(&self, project_id: &str, ids: &[String], namespace: &str) -> Result<Vec<Value>> {
        fetch_list(self.client, get(project_id, ids, namespace), "vectors").await
    }

    pub async fn delete(
        &self,
        project_id: &str,
        namespace: &str,
        selection: &VectorSelection,
    ) -> Result<Value> {
        fetch(self.client, delete(project_id, namespace, selection)?).await
    }

    pub async fn update_metadata(
        &self,
        project_id: &str,
        vector_id: &str,
        metadata: Value,
        namespace: &str,
    ) -> Result<Value> {
        fetch(
            self.client,
            update_metadata(project_id, vector_id, metadata, namespace),
        )
        .await
    }

    pub async fn stats(&self, project_id: &str, namespace: Option<&str>) -> Result<Value> {
        fetch(self.client, stats(project_id, namespace)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::Method;
    use crate::error::ErrorKind;

    #[test]
    fn upsert_serializes_records() {
        let records = [
            VectorRecord::new(vec![0.5, 1.0]).with_id("v1"),
            VectorRecord::new(vec![0.25]).with_metadata(json!({"tag": "x"})),
        ];
        let op = upsert("p1", DEFAULT_NAMESPACE, &records);
        assert_eq!(op.method, Method::Put);
        assert!(op.idempotent);
        assert_eq!(
            op.body,
            Some(json!({
                "project_id": "p1",
                "namespace": "default",
                "items": [
                    {"vector": [0.5, 1.0], "id": "v1"},
                    {"vector": [0.25], "metadata": {"tag": "x"}},
                ],
            }))
        );
    }

    #[test]
    fn search_is_retry_safe_post() {
        let op = search(&VectorSearch::new("p1", vec![1.0]));
        assert_eq!(op.method, Method::Post);
        assert!(op.is_retry_safe());
        let body = op.body.unwrap();
        assert_eq!(body["top_k"], 10);
        assert_eq!(body["include_values"], false);
        assert!(body.get("filter").is_none());
    }

    #[test]
    fn get_joins_ids() {
        let op = get("p1", &["a".to_string(), "b".to_string()], "ns");
        assert!(op.query.contains(&("ids".to_string(), Some("a,b".to_string()))));
    }

    #[test]
    fn delete_requires_a_selection() {
        let err = delete("p1", "default", &VectorSelection::Ids(vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(delete("p1", "default", &VectorSelection::Filter(Value::Null)).is_err());

        let op = delete("p1", "default", &VectorSelection::All).unwrap();
        assert_eq!(op.method, Method::Delete);
        assert_eq!(op.body.unwrap()["delete_all"], true);

        let op = delete("p1", "default", &VectorSelection::Ids(vec!["v1".into()])).unwrap();
        assert_eq!(op.body.unwrap()["ids"], json!(["v1"]));
    }

    #[test]
    fn stats_namespace_optional() {
        let op = stats("p1", None);
        assert_eq!(op.path, "/zerodb/vectors/stats");
        assert!(op.query.contains(&("namespace".to_string(), None)));
    }
}
