//! Seed data for the in-memory stores.
//!
//! A fixtures file is a JSON document:
//!
//! ```json
//! {
//!   "tenants":   [{ "tenant_id": "...", "business_name": "...", "provider": { ... } }],
//!   "contacts":  [{ "id": "...", "tenant_id": "...", "name": "Ana", "phone": "+55..." }],
//!   "workflows": [{ "id": "...", "tenantId": "...", "name": "...", "status": "active", "nodes": [], "edges": [] }]
//! }
//! ```

use crate::error::WorkerError;
use crate::worker::Stores;
use relaydesk_automation::{Contact, TenantProfile, TriggerIndex, Workflow, WorkflowDefinition};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Tenants, contacts and workflows to preload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub tenants: Vec<TenantProfile>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub workflows: Vec<WorkflowDefinition>,
}

/// Counts of what was installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixtureSummary {
    pub tenants: usize,
    pub contacts: usize,
    pub workflows: usize,
    pub triggers: usize,
}

impl Fixtures {
    /// Reads and parses a fixtures file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid fixtures JSON.
    pub fn load(path: &Path) -> relaydesk_core::Result<Self, WorkerError> {
        let fixtures_error = |details: String| WorkerError::Fixtures {
            path: path.display().to_string(),
            details,
        };
        let text = fs::read_to_string(path).map_err(|e| fixtures_error(e.to_string()))?;
        let fixtures = serde_json::from_str(&text).map_err(|e| fixtures_error(e.to_string()))?;
        Ok(fixtures)
    }

    /// Validates every workflow, then fills the stores and registers triggers.
    ///
    /// # Errors
    ///
    /// Returns an error if a workflow definition is invalid or the trigger
    /// index rejects it. Nothing is installed when validation fails.
    pub async fn install(self, stores: &Stores) -> relaydesk_core::Result<FixtureSummary, WorkerError> {
        let workflows = self
            .workflows
            .into_iter()
            .map(|definition| {
                let name = definition.name.clone();
                Workflow::try_from(definition).map_err(|e| WorkerError::InvalidWorkflow {
                    name,
                    details: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut summary = FixtureSummary {
            tenants: self.tenants.len(),
            contacts: self.contacts.len(),
            workflows: workflows.len(),
            triggers: 0,
        };
        for profile in self.tenants {
            stores.tenants.insert(profile);
        }
        for contact in self.contacts {
            stores.contacts.insert(contact);
        }
        for workflow in workflows {
            let registered = stores.triggers.sync_workflow(&workflow).await.map_err(|e| {
                WorkerError::TriggerSync {
                    name: workflow.name.clone(),
                    details: e.to_string(),
                }
            })?;
            debug!(workflow_id = %workflow.id, name = %workflow.name, registered, "workflow installed");
            summary.triggers += registered;
            stores.workflows.insert(workflow);
        }

        info!(
            tenants = summary.tenants,
            contacts = summary.contacts,
            workflows = summary.workflows,
            triggers = summary.triggers,
            "fixtures installed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use relaydesk_automation::{Edge, WorkflowStatus};
    use relaydesk_core::TenantId;
    use relaydesk_integration::ProviderAccount;
    use serde_json::{Map, json};
    use std::io::Write;

    pub(crate) fn demo_fixtures() -> (Fixtures, Contact) {
        let tenant_id = TenantId::new();
        let contact = Contact::new(tenant_id)
            .with_name("Ana")
            .with_phone("+5511999990000");
        let workflow = WorkflowDefinition::new(tenant_id, "VIP welcome")
            .with_status(WorkflowStatus::Active)
            .with_node("T", "new_contact_with_tag", json!({ "tag": "vip" }))
            .with_node("A", "add_tag", json!({ "tag": "welcomed" }))
            .with_node("B", "send_text_message", json!({ "text": "Hi {{contact.name}}" }))
            .with_edge(Edge::new("T", "A"))
            .with_edge(Edge::new("A", "B"));

        let fixtures = Fixtures {
            tenants: vec![TenantProfile {
                tenant_id,
                business_name: "Padaria Central".to_string(),
                provider: ProviderAccount {
                    phone_number_id: "1055".to_string(),
                    access_token: "token".to_string(),
                },
                settings: Map::new(),
            }],
            contacts: vec![contact.clone()],
            workflows: vec![workflow],
        };
        (fixtures, contact)
    }

    #[tokio::test]
    async fn loads_and_installs_from_file() {
        let (fixtures, contact) = demo_fixtures();
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(serde_json::to_string(&fixtures).expect("json").as_bytes())
            .expect("write");

        let loaded = Fixtures::load(file.path()).expect("load");
        let stores = Stores::new();
        let summary = loaded.install(&stores).await.expect("install");

        assert_eq!(
            summary,
            FixtureSummary {
                tenants: 1,
                contacts: 1,
                workflows: 1,
                triggers: 1,
            }
        );
        assert_eq!(stores.workflows.len(), 1);
        assert_eq!(stores.triggers.len(), 1);
        assert!(stores.contacts.get(contact.id).is_some());
    }

    #[test]
    fn unreadable_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(Fixtures::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn malformed_json_is_reported() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"{ \"tenants\": 3 }").expect("write");
        assert!(Fixtures::load(file.path()).is_err());
    }

    #[tokio::test]
    async fn invalid_workflow_installs_nothing() {
        let (mut fixtures, _) = demo_fixtures();
        let tenant_id = fixtures.tenants[0].tenant_id;
        fixtures.workflows.push(
            WorkflowDefinition::new(tenant_id, "broken").with_node("x", "send_fax", json!({})),
        );

        let stores = Stores::new();
        assert!(fixtures.install(&stores).await.is_err());
        assert!(stores.workflows.is_empty());
        assert!(stores.triggers.is_empty());
    }
}
