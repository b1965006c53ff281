//! Agent swarm orchestration.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Body, fetch, fetch_list};
use crate::api::request::OperationDescriptor;
use crate::client::AinativeClient;
use crate::error::Result;

const BASE: &str = "/agent-swarm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Researcher,
    Coder,
    Reviewer,
    Tester,
    Documenter,
    Analyst,
    Designer,
    Orchestrator,
}

super::wire_enum!(AgentType {
    Researcher => "researcher",
    Coder => "coder",
    Reviewer => "reviewer",
    Tester => "tester",
    Documenter => "documenter",
    Analyst => "analyst",
    Designer => "designer",
    Orchestrator => "orchestrator",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmStatus {
    Idle,
    Starting,
    Running,
    Paused,
    Stopping,
    Completed,
    Failed,
}

super::wire_enum!(SwarmStatus {
    Idle => "idle",
    Starting => "starting",
    Running => "running",
    Paused => "paused",
    Stopping => "stopping",
    Completed => "completed",
    Failed => "failed",
});

impl SwarmStatus {
    /// No further transitions happen from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, SwarmStatus::Completed | SwarmStatus::Failed)
    }
}

/// `POST /agent-swarm/start`.
pub fn start(
    project_id: &str,
    objective: &str,
    agents: Vec<Value>,
    config: Option<Value>,
) -> OperationDescriptor {
    OperationDescriptor::post(format!("{BASE}/start")).with_body(json!({
        "project_id": project_id,
        "agents": agents,
        "objective": objective,
        "config": config.unwrap_or_else(|| json!({})),
    }))
}

/// `POST /agent-swarm/orchestrate`.
pub fn orchestrate(
    swarm_id: &str,
    task: &str,
    context: Option<Value>,
    agents: &[String],
) -> OperationDescriptor {
    let agents = (!agents.is_empty()).then(|| json!(agents));
    OperationDescriptor::post(format!("{BASE}/orchestrate")).with_body(
        Body::new()
            .set("swarm_id", swarm_id)
            .set("task", task)
            .set("context", context.unwrap_or_else(|| json!({})))
            .set_opt("agents", agents)
            .build(),
    )
}

fn per_swarm(suffix: &str) -> String {
    format!("{BASE}/{{swarm_id}}/{suffix}")
}

pub fn status(swarm_id: &str) -> OperationDescriptor {
    OperationDescriptor::get(per_swarm("status")).with_path_param("swarm_id", swarm_id)
}

pub fn metrics(swarm_id: Option<&str>, project_id: Option<&str>) -> OperationDescriptor {
    OperationDescriptor::get(format!("{BASE}/metrics"))
        .with_query_opt("swarm_id", swarm_id)
        .with_query_opt("project_id", project_id)
}

pub fn agent_types() -> OperationDescriptor {
    OperationDescriptor::get(format!("{BASE}/agent-types"))
}

/// `PUT /agent-swarm/{swarm_id}/agents/{agent_id}/config`.
pub fn configure_agent(swarm_id: &str, agent_id: &str, config: Value) -> OperationDescriptor {
    OperationDescriptor::put(format!("{BASE}/{{swarm_id}}/agents/{{agent_id}}/config"))
        .with_path_param("swarm_id", swarm_id)
        .with_path_param("agent_id", agent_id)
        .with_body(config)
}

pub fn set_agent_prompt(
    swarm_id: &str,
    agent_id: &str,
    prompt: &str,
    system_prompt: Option<&str>,
) -> OperationDescriptor {
    OperationDescriptor::post(format!("{BASE}/{{swarm_id}}/agents/{{agent_id}}/prompt"))
        .with_path_param("swarm_id", swarm_id)
        .with_path_param("agent_id", agent_id)
        .with_body(
            Body::new()
                .set("prompt", prompt)
                .set_opt("system_prompt", system_prompt)
                .build(),
        )
}

/// Repeating a stop has no further effect, so it is marked idempotent.
pub fn stop(swarm_id: &str, force: bool) -> OperationDescriptor {
    OperationDescriptor::post(per_swarm("stop"))
        .with_path_param("swarm_id", swarm_id)
        .with_idempotent(true)
        .with_body(json!({ "force": force }))
}

pub fn pause(swarm_id: &str) -> OperationDescriptor {
    OperationDescriptor::post(per_swarm("pause")).with_path_param("swarm_id", swarm_id)
}

pub fn resume(swarm_id: &str) -> OperationDescriptor {
    OperationDescriptor::post(per_swarm("resume")).with_path_param("swarm_id", swarm_id)
}

pub fn history(swarm_id: &str, limit: u32) -> OperationDescriptor {
    OperationDescriptor::get(per_swarm("history"))
        .with_path_param("swarm_id", swarm_id)
        .with_query("limit", limit)
}

pub fn communications(swarm_id: &str, agent_id: Option<&str>) -> OperationDescriptor {
    OperationDescriptor::get(per_swarm("communications"))
        .with_path_param("swarm_id", swarm_id)
        .with_query_opt("agent_id", agent_id)
}

/// `POST /agent-swarm/agents`.
pub fn create_agent(
    name: &str,
    agent_type: AgentType,
    capabilities: &[String],
    prompt: &str,
    config: Option<Value>,
) -> OperationDescriptor {
    OperationDescriptor::post(format!("{BASE}/agents")).with_body(json!({
        "name": name,
        "type": agent_type,
        "capabilities": capabilities,
        "prompt": prompt,
        "config": config.unwrap_or_else(|| json!({})),
    }))
}

/// Swarm operations bound to a client.
#[derive(Debug, Clone, Copy)]
pub struct AgentSwarm<'a> {
    client: &'a AinativeClient,
}

impl<'a> AgentSwarm<'a> {
    pub(crate) fn new(client: &'a AinativeClient) -> Self {
        Self { client }
    }

    pub async fn start(
        &self,
        project_id: &str,
        objective: &str,
        agents: Vec<Value>,
        config: Option<Value>,
    ) -> Result<Value> {
        fetch(self.client, start(project_id, objective, agents, config)).await
    }

    pub async fn orchestrate(
        &self,
        swarm_id: &str,
        task: &str,
        context: Option<Value>,
        agents: &[String],
    ) -> Result<Value> {
        fetch(self.client, orchestrate(swarm_id, task, context, agents)).await
    }

    pub async fn status(&self, swarm_id: &str) -> Result<Value> {
        fetch(self.client, status(swarm_id)).await
    }

    pub async fn metrics(&self, swarm_id: Option<&str>, project_id: Option<&str>) -> Result<Value> {
        fetch(self.client, metrics(swarm_id, project_id)).await
    }

    pub async fn agent_types(&self) -> Result<Vec<Value>> {
        fetch_list(self.client, agent_types(), "agent_types").await
    }

    pub async fn configure_agent(&self, swarm_id: &str, agent_id: &str, config: Value) -> Result<Value> {
        fetch(self.client, configure_agent(swarm_id, agent_id, config)).await
    }

    pub async fn set_agent_prompt(
        &self,
        swarm_id: &str,
        agent_id: &str,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Value> {
        fetch(
            self.client,
            set_agent_prompt(swarm_id, agent_id, prompt, system_prompt),
        )
        .await
    }

    pub async fn stop(&self, swarm_id: &str, force: bool) -> Result<Value> {
        fetch(self.client, stop(swarm_id, force)).await
    }

    pub async fn pause(&self, swarm_id: &str) -> Result<Value> {
        fetch(self.client, pause(swarm_id)).await
    }

    pub async fn resume(&self, swarm_id: &str) -> Result<Value> {
        fetch(self.client, resume(swarm_id)).await
    }

    pub async fn history(&self, swarm_id: &str, limit: u32) -> Result<Vec<Value>> {
        fetch_list(self.client, history(swarm_id, limit), "history").await
    }

    pub async fn communications(&self, swarm_id: &str, agent_id: Option<&str>) -> Result<Vec<Value>> {
        fetch_list(self.client, communications(swarm_id, agent_id), "communications").await
    }

    pub async fn create_agent(
        &self,
        name: &str,
        agent_type: AgentType,
        capabilities: &[String],
        prompt: &str,
        config: Option<Value>,
    ) -> Result<Value> {
        fetch(
            self.client,
            create_agent(name, agent_type, capabilities, prompt, config),
        )
        .await
    }
}
