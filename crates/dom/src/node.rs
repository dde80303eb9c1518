//! Node identity and the engine's flat node registry entries.
//!
//! Invariants:
//! - Ids are `<prefix>:<uuid>` where the prefix is the element tag, `text`, or the
//!   registered component name. Ids are never reused.
//! - Parents own children by id; every id in a `children` list or `root` slot is present
//!   in the registry while the parent is.

use markup::{Attrs, Namespace};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub(crate) fn generate(prefix: &str) -> Self {
        NodeId(format!("{prefix}:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tag, `text`, or component name the id was generated for.
    pub fn prefix(&self) -> &str {
        self.0.rsplit_once(':').map_or(self.0.as_str(), |(p, _)| p)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

/// A node held by the engine. `compo_id` names the component whose template produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Text {
        compo_id: NodeId,
        value: String,
    },
    Element {
        compo_id: NodeId,
        tag: String,
        namespace: Option<Namespace>,
        attrs: Attrs,
        children: Vec<NodeId>,
    },
    /// A mounted component; `compo_id` is the enclosing component, absent for the root.
    Component {
        compo_id: Option<NodeId>,
        name: String,
        attrs: Attrs,
        root: Option<NodeId>,
    },
}

impl Node {
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Element { children, .. } => children,
            Node::Component { root: Some(root), .. } => std::slice::from_ref(root),
            _ => &[],
        }
    }
}
