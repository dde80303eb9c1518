use crate::svg::Namespace;
use std::collections::BTreeMap;

/// Attribute map of a decoded tag. Ordered so diffs and change batches are deterministic.
pub type Attrs = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag(String),
    Text(String),
    Comment(String),
    Doctype(String),
}

/// A node of the decoded markup tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tag {
    Text(String),
    Element {
        name: String,
        namespace: Option<Namespace>,
        attrs: Attrs,
        children: Vec<Tag>,
    },
    /// A reference to a registered component; never has children.
    Component { name: String, attrs: Attrs },
}

impl Tag {
    pub fn element(name: impl Into<String>) -> Self {
        Tag::Element {
            name: name.into(),
            namespace: None,
            attrs: Attrs::new(),
            children: Vec::new(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Tag::Text(value.into())
    }

    /// Builder helper used by tests and callers assembling trees by hand.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            Tag::Element { attrs, .. } | Tag::Component { attrs, .. } => {
                attrs.insert(key.into(), value.into());
            }
            Tag::Text(_) => {}
        }
        self
    }

    pub fn with_child(mut self, child: Tag) -> Self {
        if let Tag::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Tag::Element { name, .. } | Tag::Component { name, .. } => Some(name),
            Tag::Text(_) => None,
        }
    }
}
