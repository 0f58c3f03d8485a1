//! Trigger matching: from an inbound event to the registrations it fires.

use crate::error::DispatchError;
use crate::node::NodeId;
use crate::store::TriggerIndex;
use crate::trigger::EventType;
use relaydesk_core::{TenantId, TriggerId, WorkflowId};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A registration that fired for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    pub trigger_id: TriggerId,
    pub workflow_id: WorkflowId,
    pub entry_node_id: NodeId,
}

/// Looks up and filters trigger registrations.
#[derive(Clone)]
pub struct TriggerMatcher {
    index: Arc<dyn TriggerIndex>,
}

impl TriggerMatcher {
    #[must_use]
    pub fn new(index: Arc<dyn TriggerIndex>) -> Self {
        Self { index }
    }

    /// Returns every registration of the tenant that matches the event.
    ///
    /// Exact-match types are filtered by the index; keyword and
    /// case-insensitive types are listed whole and filtered here.
    #[instrument(skip(self, payload), fields(tenant_id = %tenant_id, event_type = %event_type))]
    pub async fn find_matches(
        &self,
        tenant_id: TenantId,
        event_type: EventType,
        payload: &JsonValue,
    ) -> relaydesk_core::Result<Vec<TriggerMatch>, DispatchError> {
        let trigger_type = event_type.trigger_type();
        let strategy = trigger_type.match_strategy();
        let value = trigger_type.event_value(payload);
        let key = if strategy.filters_by_key() {
            // an exact trigger cannot match an event without a value
            let Some(value) = value.as_deref() else {
                debug!("event has no value for an exact trigger");
                return Ok(Vec::new());
            };
            Some(value)
        } else {
            None
        };

        let registrations = self
            .index
            .list(tenant_id, trigger_type, key)
            .await
            .map_err(|e| DispatchError::TriggerLookup {
                tenant_id,
                reason: e.to_string(),
            })?;

        let matches: Vec<TriggerMatch> = registrations
            .into_iter()
            .filter(|registration| registration.matches(value.as_deref()))
            .map(|registration| TriggerMatch {
                trigger_id: registration.id,
                workflow_id: registration.workflow_id,
                entry_node_id: registration.entry_node_id,
            })
            .collect();
        debug!(count = matches.len(), "trigger registrations matched");

        Ok(matches)
    }
}
