//! Renderer-side replica built purely from change batches.
//!
//! `Mirror` applies batches the way a renderer would and validates each record as it
//! goes, which makes it both a reference consumer of the change protocol and the oracle
//! the engine's tests compare against.
//!
//! Invariants checked:
//! - Ids are created once and referenced only while alive.
//! - A node has at most one parent and operations never create cycles.
//! - A component node holds at most one root child.
//! - Deletions arrive bottom-up: a node is deleted only after its children.

use crate::change::Change;
use crate::node::NodeId;
use markup::elements::is_void_element;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error("node {0} already exists")]
    DuplicateId(NodeId),
    #[error("node {0} does not exist")]
    MissingId(NodeId),
    #[error("node {0} does not support this operation")]
    WrongNodeKind(NodeId),
    #[error("node {child} already has a parent")]
    AlreadyAttached { child: NodeId },
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("attaching {child} under {parent} would create a cycle")]
    CycleDetected { parent: NodeId, child: NodeId },
    #[error("node {0} was deleted before its children")]
    LiveChildren(NodeId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MirrorNode {
    Text(String),
    Element {
        tag: String,
        namespace: Option<String>,
        attrs: BTreeMap<String, String>,
        children: Vec<NodeId>,
    },
    Component {
        name: String,
        root: Option<NodeId>,
    },
}

#[derive(Debug, Default)]
pub struct Mirror {
    nodes: HashMap<NodeId, MirrorNode>,
    parents: HashMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    pub fn node(&self, id: &str) -> Option<&MirrorNode> {
        self.nodes.get(id)
    }

    pub fn parent(&self, id: &str) -> Option<&NodeId> {
        self.parents.get(id)
    }

    /// Applies a batch; stops at the first invalid record.
    pub fn apply(&mut self, batch: &[Change]) -> Result<(), MirrorError> {
        for change in batch {
            self.apply_one(change)?;
        }
        Ok(())
    }

    fn get_mut(&mut self, id: &NodeId) -> Result<&mut MirrorNode, MirrorError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| MirrorError::MissingId(id.clone()))
    }

    fn ensure_exists(&self, id: &NodeId) -> Result<(), MirrorError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(MirrorError::MissingId(id.clone()))
        }
    }

    fn ensure_attachable(&self, parent: &NodeId, child: &NodeId) -> Result<(), MirrorError> {
        self.ensure_exists(parent)?;
        self.ensure_exists(child)?;
        if self.parents.contains_key(child) {
            return Err(MirrorError::AlreadyAttached {
                child: child.clone(),
            });
        }
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(MirrorError::CycleDetected {
                    parent: parent.clone(),
                    child: child.clone(),
                });
            }
            cursor = self.parents.get(current);
        }
        Ok(())
    }

    fn apply_one(&mut self, change: &Change) -> Result<(), MirrorError> {
        match change {
            Change::SetRoot { id } => {
                self.ensure_exists(id)?;
                self.root = Some(id.clone());
            }
            Change::NewNode {
                id,
                node_type,
                namespace,
                is_compo,
                ..
            } => {
                if self.nodes.contains_key(id) {
                    return Err(MirrorError::DuplicateId(id.clone()));
                }
                let node = if *is_compo {
                    MirrorNode::Component {
                        name: node_type.clone(),
                        root: None,
                    }
                } else if node_type == "text" && namespace.is_none() {
                    MirrorNode::Text(String::new())
                } else {
                    MirrorNode::Element {
                        tag: node_type.clone(),
                        namespace: namespace.clone(),
                        attrs: BTreeMap::new(),
                        children: Vec::new(),
                    }
                };
                self.nodes.insert(id.clone(), node);
            }
            Change::DelNode { id } => {
                let live_children = match self.nodes.get(id) {
                    None => return Err(MirrorError::MissingId(id.clone())),
                    Some(MirrorNode::Element { children, .. }) => !children.is_empty(),
                    Some(MirrorNode::Component { root, .. }) => root.is_some(),
                    Some(MirrorNode::Text(_)) => false,
                };
                if live_children {
                    return Err(MirrorError::LiveChildren(id.clone()));
                }
                if let Some(parent) = self.parents.remove(id) {
                    self.detach(&parent, id);
                }
                self.nodes.remove(id);
                if self.root.as_ref() == Some(id) {
                    self.root = None;
                }
            }
            Change::SetAttr { id, key, value } => match self.get_mut(id)? {
                MirrorNode::Element { attrs, .. } => {
                    attrs.insert(key.clone(), value.clone());
                }
                _ => return Err(MirrorError::WrongNodeKind(id.clone())),
            },
            Change::DelAttr { id, key } => match self.get_mut(id)? {
                MirrorNode::Element { attrs, .. } => {
                    attrs.remove(key);
                }
                _ => return Err(MirrorError::WrongNodeKind(id.clone())),
            },
            Change::SetText { id, value } => match self.get_mut(id)? {
                MirrorNode::Text(text) => *text = value.clone(),
                _ => return Err(MirrorError::WrongNodeKind(id.clone())),
            },
            Change::AppendChild { parent, child } => {
                self.ensure_attachable(parent, child)?;
                match self.get_mut(parent)? {
                    MirrorNode::Element { children, .. } => children.push(child.clone()),
                    MirrorNode::Component { root: root @ None, .. } => *root = Some(child.clone()),
                    _ => return Err(MirrorError::WrongNodeKind(parent.clone())),
                }
                self.parents.insert(child.clone(), parent.clone());
            }
            Change::RemoveChild { parent, child } => {
                if self.parents.get(child) != Some(parent) {
                    return Err(MirrorError::NotAChild {
                        parent: parent.clone(),
                        child: child.clone(),
                    });
                }
                self.detach(parent, child);
                self.parents.remove(child);
            }
            Change::ReplaceChild { parent, old, new } => {
                if self.parents.get(old) != Some(parent) {
                    return Err(MirrorError::NotAChild {
                        parent: parent.clone(),
                        child: old.clone(),
                    });
                }
                self.ensure_attachable(parent, new)?;
                match self.get_mut(parent)? {
                    MirrorNode::Element { children, .. } => {
                        for slot in children.iter_mut().filter(|c| *c == old) {
                            *slot = new.clone();
                        }
                    }
                    MirrorNode::Component { root, .. } => *root = Some(new.clone()),
                    MirrorNode::Text(_) => return Err(MirrorError::WrongNodeKind(parent.clone())),
                }
                self.parents.remove(old);
                self.parents.insert(new.clone(), parent.clone());
            }
        }
        Ok(())
    }

    fn detach(&mut self, parent: &NodeId, child: &NodeId) {
        match self.nodes.get_mut(parent) {
            Some(MirrorNode::Element { children, .. }) => children.retain(|c| c != child),
            Some(MirrorNode::Component { root, .. }) if root.as_ref() == Some(child) => {
                *root = None;
            }
            _ => {}
        }
    }

    /// Serializes the tree under the root. Component nodes are transparent.
    pub fn markup(&self) -> Option<String> {
        let root = self.root.as_ref()?;
        let mut out = String::new();
        self.write_node(root, &mut out);
        Some(out)
    }

    fn write_node(&self, id: &NodeId, out: &mut String) {
        match self.nodes.get(id) {
            Some(MirrorNode::Text(text)) => out.push_str(text),
            Some(MirrorNode::Component { root: Some(root), .. }) => self.write_node(root, out),
            Some(MirrorNode::Element {
                tag,
                attrs,
                children,
                ..
            }) => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attrs {
                    if value.is_empty() {
                        out.push_str(&format!(" {key}"));
                    } else {
                        out.push_str(&format!(" {key}=\"{value}\""));
                    }
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                for child in children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Some(MirrorNode::Component { root: None, .. }) | None => {}
        }
    }
}
