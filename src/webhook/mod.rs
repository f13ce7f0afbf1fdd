//! Linear webhook ingest (spec §4.7). Verifies the HMAC signature, mirrors
//! the payload into the Store, and hands off to the Lifecycle Manager when
//! an issue's normalized state and assignee name match an idle agent.
use crate::lifecycle::LifecycleManager;
use crate::models::{LinearIssue, LinearProject, LinearWorkflowState, Priority};
use crate::security::verify_webhook_signature;
use crate::store::{AgentFilter, Store};
use crate::{FleetError, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub action: String,
    pub data: serde_json::Value,
}

/// Verifies `body` against `signature_hex` under `secret`. Any failure —
/// missing secret, malformed header, or a mismatched digest — is a hard
/// 401 with no leaked detail (spec §7).
pub fn verify_signature(secret: Option<&str>, body: &[u8], signature_hex: &str) -> Result<()> {
    let Some(secret) = secret else {
        return Err(FleetError::Unauthorized);
    };
    if verify_webhook_signature(secret, body, signature_hex) {
        Ok(())
    } else {
        Err(FleetError::Unauthorized)
    }
}

pub struct WebhookIngest {
    store: Arc<dyn Store>,
    lifecycle: Arc<LifecycleManager>,
}

impl WebhookIngest {
    pub fn new(store: Arc<dyn Store>, lifecycle: Arc<LifecycleManager>) -> Self {
        Self { store, lifecycle }
    }

    pub async fn handle(&self, payload: WebhookPayload) -> Result<()> {
        match payload.entity_type.as_str() {
            "Issue" => {
                if payload.action == "remove" {
                    if let Some(id) = payload.data["id"].as_str() {
                        self.store.delete_linear_issue(id).await?;
                    }
                    Ok(())
                } else {
                    self.handle_issue(payload.data).await
                }
            }
            "Project" => self.handle_project(payload.data).await,
            "Cycle" => {
                info!("ignoring Cycle webhook (no control-plane mapping)");
                Ok(())
            }
            other => {
                warn!(entity_type = %other, "unrecognized linear webhook entity type");
                Ok(())
            }
        }
    }

    async fn handle_project(&self, data: serde_json::Value) -> Result<()> {
        let id = data["id"].as_str().ok_or_else(|| {
            FleetError::Validation("project webhook payload missing id".to_string())
        })?;
        let name = data["name"].as_str().unwrap_or("untitled").to_string();
        self.store
            .upsert_linear_project(LinearProject {
                id: id.to_string(),
                name,
                updated_at: now(),
            })
            .await?;

        if let Some(states) = data["states"].as_array() {
            for state in states {
                if let (Some(state_id), Some(state_name), Some(state_type)) = (
                    state["id"].as_str(),
                    state["name"].as_str(),
                    state["type"].as_str(),
                ) {
                    self.store
                        .upsert_linear_workflow_state(LinearWorkflowState {
                            id: state_id.to_string(),
                            project_id: id.to_string(),
                            name: state_name.to_string(),
                            state_type: state_type.to_string(),
                        })
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn handle_issue(&self, data: serde_json::Value) -> Result<()> {
        let id = data["id"]
            .as_str()
            .ok_or_else(|| FleetError::Validation("issue webhook payload missing id".to_string()))?;
        let title = data["title"].as_str().unwrap_or("untitled").to_string();
        let project_id = data["project"]["id"].as_str().map(str::to_string);
        let priority = data["priority"].as_u64().map(|p| p as u8);
        let state_type = data["state"]["type"].as_str().map(normalize);
        let state_name = data["state"]["name"].as_str().map(normalize);
        let assignee_name = data["assignee"]["displayName"].as_str().map(normalize);

        let issue = self
            .store
            .upsert_linear_issue(LinearIssue {
                id: id.to_string(),
                project_id,
                title,
                priority,
                state_type,
                state_name,
                assignee_name,
                agent_task_id: None,
                updated_at: now(),
            })
            .await?;

        self.maybe_auto_assign(&issue.id).await
    }

    /// `maybeAutoAssign` (spec §4.7): an issue in a started/in-progress
    /// state whose assignee name matches an Agent's normalised name is
    /// handed off to that agent's `assignTask`.
    async fn maybe_auto_assign(&self, issue_id: &str) -> Result<()> {
        let Some(issue) = self.store.get_linear_issue(issue_id).await? else {
            return Ok(());
        };
        if issue.agent_task_id.is_some() {
            return Ok(());
        }

        let in_progress = matches!(issue.state_type.as_deref(), Some("started") | Some("in_progress"))
            || matches!(
                issue.state_name.as_deref(),
                Some("started") | Some("in progress") | Some("in_progress")
            );
        if !in_progress {
            return Ok(());
        }
        let Some(assignee_name) = issue.assignee_name.as_deref() else {
            return Ok(());
        };

        let agents = self.store.list_agents(AgentFilter::default()).await?;
        let Some(agent) = agents.into_iter().find(|a| normalize(&a.name) == assignee_name) else {
            info!(%issue_id, %assignee_name, "no agent matches webhook assignee name");
            return Ok(());
        };

        let priority = derive_priority(issue.priority);
        let task_id = format!("linear_{issue_id}");
        self.lifecycle
            .assign_task(
                &agent.id,
                &task_id,
                issue.title.clone(),
                priority,
                Some(issue.id.clone()),
                issue.project_id.clone(),
            )
            .await?;
        info!(agent_id = %agent.id, %issue_id, "auto-assigned linear issue");
        Ok(())
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Linear priority is 0 (none) to 4 (urgent); 3+ maps to high (spec §4.7).
fn derive_priority(linear_priority: Option<u8>) -> Priority {
    match linear_priority {
        Some(p) if p >= 3 => Priority::High,
        Some(2) => Priority::Medium,
        _ => Priority::Low,
    }
}

fn now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
