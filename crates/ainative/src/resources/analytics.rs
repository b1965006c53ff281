//! Usage, cost, and performance analytics.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Body, fetch, fetch_list};
use crate::api::request::OperationDescriptor;
use crate::client::AinativeClient;
use crate::error::Result;

const BASE: &str = "/zerodb/analytics";

/// Optional project scope and date window shared by several reports.
#[derive(Debug, Clone, Default)]
pub struct Window {
    pub project_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    fn apply(&self, op: OperationDescriptor) -> OperationDescriptor {
        op.with_query_opt("project_id", self.project_id.as_deref())
            .with_query_opt("start_date", self.start.map(|t| t.to_rfc3339()))
            .with_query_opt("end_date", self.end.map(|t| t.to_rfc3339()))
    }
}

fn report(name: &str) -> OperationDescriptor {
    OperationDescriptor::get(format!("{BASE}/{name}"))
}

pub fn usage(window: &Window, granularity: &str) -> OperationDescriptor {
    window.apply(report("usage").with_query("granularity", granularity))
}

pub fn performance(project_id: Option<&str>, metric_type: &str) -> OperationDescriptor {
    report("performance")
        .with_query("metric_type", metric_type)
        .with_query_opt("project_id", project_id)
}

pub fn storage(project_id: Option<&str>) -> OperationDescriptor {
    report("storage").with_query_opt("project_id", project_id)
}

pub fn queries(project_id: Option<&str>, limit: u32) -> OperationDescriptor {
    report("queries")
        .with_query("limit", limit)
        .with_query_opt("project_id", project_id)
}

pub fn costs(window: &Window) -> OperationDescriptor {
    window.apply(report("costs"))
}

pub fn trends(metric: &str, project_id: Option<&str>, period_days: u32) -> OperationDescriptor {
    report("trends")
        .with_query("metric", metric)
        .with_query("period", period_days)
        .with_query_opt("project_id", project_id)
}

pub fn anomalies(project_id: Option<&str>, severity: &str) -> OperationDescriptor {
    report("anomalies")
        .with_query("severity", severity)
        .with_query_opt("project_id", project_id)
}

/// `POST /zerodb/analytics/export`.
pub fn export(report_type: &str, format: &str, window: &Window) -> OperationDescriptor {
    OperationDescriptor::post(format!("{BASE}/export")).with_body(
        Body::new()
            .set("report_type", report_type)
            .set("format", format)
            .set_opt("project_id", window.project_id.clone())
            .set_opt("start_date", window.start.map(|t| t.to_rfc3339()))
            .set_opt("end_date", window.end.map(|t| t.to_rfc3339()))
            .build(),
    )
}

/// Analytics operations bound to a client.
#[derive(Debug, Clone, Copy)]
pub struct Analytics<'a> {
    client: &'a AinativeClient,
}

impl<'a> Analytics<'a> {
    pub(crate) fn new(client: &'a AinativeClient) -> Self {
        Self { client }
    }

    pub async fn usage(&self, window: &Window, granularity: &str) -> Result<Value> {
        fetch(self.client, usage(window, granularity)).await
    }

    pub async fn performance(&self, project_id: Option<&str>, metric_type: &str) -> Result<Value> {
        fetch(self.client, performance(project_id, metric_type)).await
    }

    pub async fn storage(&self, project_id: Option<&str>) -> Result<Value> {
        fetch(self.client, storage(project_id)).await
    }

    pub async fn queries(&self, project_id: Option<&str>, limit: u32) -> Result<Value> {
        fetch(self.client, queries(project_id, limit)).await
    }

    pub async fn costs(&self, window: &Window) -> Result<Value> {
        fetch(self.client, costs(window)).await
    }

    /// Data points, unwrapped from `data`.
    pub async fn trends(
        &self,
        metric: &str,
        project_id: Option<&str>,
        period_days: u32,
    ) -> Result<Vec<Value>> {
        fetch_list(self.client, trends(metric, project_id, period_days), "data").await
    }

    pub async fn anomalies(&self, project_id: Option<&str>, severity: &str) -> Result<Vec<Value>> {
        fetch_list(self.client, anomalies(project_id, severity), "anomalies").await
    }

    pub async fn export(&self, report_type: &str, format: &str, window: &Window) -> Result<Value> {
        fetch(self.client, export(report_type, format, window)).await
    }
}
