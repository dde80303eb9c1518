//! Change records shipped to the renderer, and the per-pass batch that orders them.
//!
//! Invariants:
//! - A flushed batch is `creates ++ changes ++ deletes`, so no record references an id
//!   before its `NewNode` and deletions always come last.
//! - Deletions cascade bottom-up: descendants are recorded before their ancestors.
//! - A node created and deleted within the same pass never reaches the renderer; every
//!   record mentioning it is dropped at flush time.
//!
//! The wire shape is a flat record with PascalCase keys; optional keys are omitted.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    SetRoot,
    NewNode,
    DelNode,
    SetAttr,
    DelAttr,
    SetText,
    AppendChild,
    RemoveChild,
    ReplaceChild,
}

/// One renderer instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireChange", try_from = "WireChange")]
pub enum Change {
    SetRoot {
        id: NodeId,
    },
    NewNode {
        id: NodeId,
        compo_id: Option<NodeId>,
        node_type: String,
        namespace: Option<String>,
        is_compo: bool,
    },
    DelNode {
        id: NodeId,
    },
    SetAttr {
        id: NodeId,
        key: String,
        value: String,
    },
    DelAttr {
        id: NodeId,
        key: String,
    },
    SetText {
        id: NodeId,
        value: String,
    },
    AppendChild {
        parent: NodeId,
        child: NodeId,
    },
    RemoveChild {
        parent: NodeId,
        child: NodeId,
    },
    ReplaceChild {
        parent: NodeId,
        old: NodeId,
        new: NodeId,
    },
}

impl Change {
    pub fn action(&self) -> Action {
        match self {
            Change::SetRoot { .. } => Action::SetRoot,
            Change::NewNode { .. } => Action::NewNode,
            Change::DelNode { .. } => Action::DelNode,
            Change::SetAttr { .. } => Action::SetAttr,
            Change::DelAttr { .. } => Action::DelAttr,
            Change::SetText { .. } => Action::SetText,
            Change::AppendChild { .. } => Action::AppendChild,
            Change::RemoveChild { .. } => Action::RemoveChild,
            Change::ReplaceChild { .. } => Action::ReplaceChild,
        }
    }

    /// The record's subject: the node acted upon, or the parent for child operations.
    pub fn node_id(&self) -> &NodeId {
        match self {
            Change::SetRoot { id }
            | Change::NewNode { id, .. }
            | Change::DelNode { id }
            | Change::SetAttr { id, .. }
            | Change::DelAttr { id, .. }
            | Change::SetText { id, .. } => id,
            Change::AppendChild { parent, .. }
            | Change::RemoveChild { parent, .. }
            | Change::ReplaceChild { parent, .. } => parent,
        }
    }

    pub fn references(&self, id: &NodeId) -> bool {
        match self {
            Change::AppendChild { parent, child } | Change::RemoveChild { parent, child } => {
                parent == id || child == id
            }
            Change::ReplaceChild { parent, old, new } => parent == id || old == id || new == id,
            Change::NewNode { id: own, compo_id, .. } => own == id || compo_id.as_ref() == Some(id),
            other => other.node_id() == id,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct WireChange {
    #[serde(rename = "Action")]
    action: Option<Action>,
    #[serde(rename = "NodeID")]
    node_id: Option<NodeId>,
    #[serde(rename = "CompoID", default, skip_serializing_if = "Option::is_none")]
    compo_id: Option<NodeId>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    node_type: Option<String>,
    #[serde(rename = "Namespace", default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(rename = "Key", default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(rename = "ChildID", default, skip_serializing_if = "Option::is_none")]
    child_id: Option<NodeId>,
    #[serde(rename = "NewChildID", default, skip_serializing_if = "Option::is_none")]
    new_child_id: Option<NodeId>,
    #[serde(rename = "IsCompo", default, skip_serializing_if = "std::ops::Not::not")]
    is_compo: bool,
}

impl From<Change> for WireChange {
    fn from(change: Change) -> Self {
        let action = Some(change.action());
        match change {
            Change::SetRoot { id } | Change::DelNode { id } => WireChange {
                action,
                node_id: Some(id),
                ..Default::default()
            },
            Change::NewNode {
                id,
                compo_id,
                node_type,
                namespace,
                is_compo,
            } => WireChange {
                action,
                node_id: Some(id),
                compo_id,
                node_type: Some(node_type),
                namespace,
                is_compo,
                ..Default::default()
            },
            Change::SetAttr { id, key, value } => WireChange {
                action,
                node_id: Some(id),
                key: Some(key),
                value: Some(value),
                ..Default::default()
            },
            Change::DelAttr { id, key } => WireChange {
                action,
                node_id: Some(id),
                key: Some(key),
                ..Default::default()
            },
            Change::SetText { id, value } => WireChange {
                action,
                node_id: Some(id),
                value: Some(value),
                ..Default::default()
            },
            Change::AppendChild { parent, child } | Change::RemoveChild { parent, child } => {
                WireChange {
                    action,
                    node_id: Some(parent),
                    child_id: Some(child),
                    ..Default::default()
                }
            }
            Change::ReplaceChild { parent, old, new } => WireChange {
                action,
                node_id: Some(parent),
                child_id: Some(old),
                new_child_id: Some(new),
                ..Default::default()
            },
        }
    }
}

/// A wire record missing a key its action requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{action:?} record is missing {field}")]
pub struct WireError {
    action: Option<Action>,
    field: &'static str,
}

impl TryFrom<WireChange> for Change {
    type Error = WireError;

    fn try_from(wire: WireChange) -> Result<Self, Self::Error> {
        let action = wire.action;
        let missing = |field| WireError { action, field };
        let action = action.ok_or(missing("Action"))?;
        let id = wire.node_id.ok_or(missing("NodeID"))?;
        Ok(match action {
            Action::SetRoot => Change::SetRoot { id },
            Action::DelNode => Change::DelNode { id },
            Action::NewNode => Change::NewNode {
                id,
                compo_id: wire.compo_id,
                node_type: wire.node_type.ok_or(missing("Type"))?,
                namespace: wire.namespace,
                is_compo: wire.is_compo,
            },
            Action::SetAttr => Change::SetAttr {
                id,
                key: wire.key.ok_or(missing("Key"))?,
                value: wire.value.unwrap_or_default(),
            },
            Action::DelAttr => Change::DelAttr {
                id,
                key: wire.key.ok_or(missing("Key"))?,
            },
            Action::SetText => Change::SetText {
                id,
                value: wire.value.unwrap_or_default(),
            },
            Action::AppendChild => Change::AppendChild {
                parent: id,
                child: wire.child_id.ok_or(missing("ChildID"))?,
            },
            Action::RemoveChild => Change::RemoveChild {
                parent: id,
                child: wire.child_id.ok_or(missing("ChildID"))?,
            },
            Action::ReplaceChild => Change::ReplaceChild {
                parent: id,
                old: wire.child_id.ok_or(missing("ChildID"))?,
                new: wire.new_child_id.ok_or(missing("NewChildID"))?,
            },
        })
    }
}

/// Change buffers for one mount or render pass.
#[derive(Debug, Default)]
pub(crate) struct Batch {
    creates: Vec<Change>,
    changes: Vec<Change>,
    deletes: Vec<Change>,
    created: HashSet<NodeId>,
    deleted: HashSet<NodeId>,
}

impl Batch {
    pub(crate) fn create(&mut self, change: Change) {
        self.created.insert(change.node_id().clone());
        self.creates.push(change);
    }

    pub(crate) fn change(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub(crate) fn delete(&mut self, id: NodeId) {
        self.deleted.insert(id.clone());
        self.deletes.push(Change::DelNode { id });
    }

    pub(crate) fn clear(&mut self) {
        self.creates.clear();
        self.changes.clear();
        self.deletes.clear();
        self.created.clear();
        self.deleted.clear();
    }

    /// Drains the buffers into one ordered batch.
    pub(crate) fn take(&mut self) -> Vec<Change> {
        let churn: HashSet<NodeId> = self.created.intersection(&self.deleted).cloned().collect();
        let mut out =
            Vec::with_capacity(self.creates.len() + self.changes.len() + self.deletes.len());
        out.append(&mut self.creates);
        out.append(&mut self.changes);
        out.append(&mut self.deletes);
        self.clear();
        if !churn.is_empty() {
            log::trace!(target: "dom.sync", "dropping {} short-lived nodes from batch", churn.len());
            out.retain(|c| !churn.iter().any(|id| c.references(id)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[test]
    fn wire_shape_omits_absent_keys() {
        let change = Change::NewNode {
            id: id("div:1"),
            compo_id: Some(id("hello:1")),
            node_type: "div".into(),
            namespace: None,
            is_compo: false,
        };
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({"Action": "newNode", "NodeID": "div:1", "CompoID": "hello:1", "Type": "div"})
        );

        let replace = Change::ReplaceChild {
            parent: id("div:1"),
            old: id("h1:1"),
            new: id("h2:1"),
        };
        assert_eq!(
            serde_json::to_value(&replace).unwrap(),
            json!({"Action": "replaceChild", "NodeID": "div:1", "ChildID": "h1:1", "NewChildID": "h2:1"})
        );

        let attr = Change::SetAttr {
            id: id("div:1"),
            key: "disabled".into(),
            value: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&attr).unwrap(),
            json!({"Action": "setAttr", "NodeID": "div:1", "Key": "disabled", "Value": ""})
        );
    }

    #[test]
    fn wire_records_parse_back() {
        let change: Change = serde_json::from_value(
            json!({"Action": "newNode", "NodeID": "app.mur:1", "Type": "app.mur", "IsCompo": true}),
        )
        .unwrap();
        assert_eq!(change, Change::NewNode {
            id: id("app.mur:1"),
            compo_id: None,
            node_type: "app.mur".into(),
            namespace: None,
            is_compo: true,
        });

        let err = serde_json::from_value::<Change>(json!({"Action": "appendChild", "NodeID": "div:1"}))
            .unwrap_err();
        assert!(err.to_string().contains("ChildID"), "unexpected error: {err}");
    }

    #[test]
    fn batch_orders_creates_changes_then_deletes() {
        let mut batch = Batch::default();
        batch.delete(id("p:old"));
        batch.change(Change::SetText {
            id: id("text:1"),
            value: "x".into(),
        });
        batch.create(Change::NewNode {
            id: id("text:1"),
            compo_id: None,
            node_type: "text".into(),
            namespace: None,
            is_compo: false,
        });
        let actions: Vec<Action> = batch.take().iter().map(Change::action).collect();
        assert_eq!(actions, vec![Action::NewNode, Action::SetText, Action::DelNode]);
        assert!(batch.take().is_empty(), "take must drain the buffers");
    }

    #[test]
    fn batch_drops_nodes_created_and_deleted_in_one_pass() {
        let mut batch = Batch::default();
        batch.create(Change::NewNode {
            id: id("span:tmp"),
            compo_id: None,
            node_type: "span".into(),
            namespace: None,
            is_compo: false,
        });
        batch.change(Change::AppendChild {
            parent: id("div:1"),
            child: id("span:tmp"),
        });
        batch.change(Change::SetAttr {
            id: id("div:1"),
            key: "class".into(),
            value: "x".into(),
        });
        batch.change(Change::RemoveChild {
            parent: id("div:1"),
            child: id("span:tmp"),
        });
        batch.delete(id("span:tmp"));
        let out = batch.take();
        assert_eq!(out, vec![Change::SetAttr {
            id: id("div:1"),
            key: "class".into(),
            value: "x".into(),
        }]);
    }
}
