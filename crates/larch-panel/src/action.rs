//! Panel actions
//!
//! An action runs an inline handler, dispatches a named command on the bus,
//! or fires a workflow transition on the selected record.

use async_trait::async_trait;
use larch_types::{AdminContext, AdminResult, Record};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Actions that stay available whatever the workflow state
pub const PASSIVE_ACTIONS: &[&str] = &["view", "edit", "delete", "create_translation"];

/// Body of an action or bulk-action request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub payload: Record,
}

impl ActionRequest {
    pub fn for_id(id: impl Into<String>) -> Self {
        Self {
            ids: vec![id.into()],
            payload: Record::new(),
        }
    }

    /// Payload map handed to commands: the body plus `ids`, and `id` when
    /// exactly one record is selected.
    pub fn to_payload(&self) -> Record {
        let mut payload = self.payload.clone();
        payload.insert("ids".into(), json!(self.ids));
        if let [id] = self.ids.as_slice() {
            payload.entry("id").or_insert_with(|| json!(id));
        }
        payload
    }
}

/// Inline action implementation
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, ctx: &AdminContext, request: ActionRequest) -> AdminResult<Option<Value>>;
}

#[derive(Clone)]
pub enum ActionTarget {
    Handler(Arc<dyn ActionHandler>),
    Command(String),
    Transition(String),
    /// Rendered by the client; the server only decides whether it is offered
    Client,
}

impl fmt::Debug for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTarget::Handler(_) => f.write_str("Handler(..)"),
            ActionTarget::Command(name) => f.debug_tuple("Command").field(name).finish(),
            ActionTarget::Transition(name) => f.debug_tuple("Transition").field(name).finish(),
            ActionTarget::Client => f.write_str("Client"),
        }
    }
}

/// A named panel action
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub label: String,
    /// Overrides the panel's edit permission
    pub permission: Option<String>,
    pub target: ActionTarget,
}

impl Action {
    pub fn handler(name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        Self::new(name, ActionTarget::Handler(handler))
    }

    pub fn command(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(name, ActionTarget::Command(command.into()))
    }

    /// Action that fires the workflow transition of the same name
    pub fn transition(name: impl Into<String>) -> Self {
        let name = name.into();
        let transition = name.clone();
        Self::new(name, ActionTarget::Transition(transition))
    }

    /// Client-side action such as `view` or `edit`
    pub fn client(name: impl Into<String>) -> Self {
        Self::new(name, ActionTarget::Client)
    }

    fn new(name: impl Into<String>, target: ActionTarget) -> Self {
        let name = name.into();
        Self {
            label: name.replace('_', " "),
            name,
            permission: None,
            target,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn is_passive(&self) -> bool {
        PASSIVE_ACTIONS.contains(&self.name.as_str())
    }

    pub fn transition_name(&self) -> Option<&str> {
        match &self.target {
            ActionTarget::Transition(t) => Some(t),
            _ => None,
        }
    }

    pub fn describe(&self) -> Value {
        let kind = match &self.target {
            ActionTarget::Handler(_) => "handler",
            ActionTarget::Command(_) => "command",
            ActionTarget::Transition(_) => "transition",
            ActionTarget::Client => "client",
        };
        json!({
            "name": self.name,
            "label": self.label,
            "kind": kind,
            "permission": self.permission,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_carries_ids() {
        let mut request = ActionRequest::for_id("p1");
        request.payload.insert("note".into(), json!("x"));
        let payload = request.to_payload();
        assert_eq!(payload["id"], "p1");
        assert_eq!(payload["ids"], json!(["p1"]));
        assert_eq!(payload["note"], "x");

        let bulk = ActionRequest {
            ids: vec!["a".into(), "b".into()],
            payload: Record::new(),
        };
        assert!(!bulk.to_payload().contains_key("id"));
    }

    #[test]
    fn test_passive_and_transition() {
        assert!(Action::command("view", "noop").is_passive());
        let publish = Action::transition("publish");
        assert_eq!(publish.transition_name(), Some("publish"));
        assert_eq!(publish.describe()["kind"], "transition");

        let view = Action::client("view");
        assert!(view.is_passive());
        assert_eq!(view.transition_name(), None);
        assert_eq!(view.describe()["kind"], "client");
    }
}
