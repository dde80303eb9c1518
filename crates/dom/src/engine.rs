//! The reconciliation engine: mount, positional diff, dismount.
//!
//! Each public mutating call is one pass. A pass works on the node registry and records
//! changes into a `Batch`; the batch is flushed through the sync hook exactly once at the
//! end. If anything fails, including the hook, the registry is restored from the snapshot
//! taken when the pass began and the pending records are discarded.
//!
//! Children are matched by position. At each position the old node is patched in place
//! when the new tag has the same kind and name, otherwise the new subtree is mounted and
//! replaces the old one, which is then deleted bottom-up.
//!
//! Nested components remapped during a failed pass are mapped again from their restored
//! attributes, so their fields match the tree the renderer holds.
//!
//! Mount and dismount hooks run after a successful flush. A component created and removed
//! within one pass gets neither.

use crate::change::{Batch, Change};
use crate::component::{AsAny, Component, ComponentRef, Subscription, identity};
use crate::config::EngineConfig;
use crate::error::{Error, RenderError};
use crate::mapping::{self, Mapping};
use crate::node::{Node, NodeId};
use crate::registry::{Registration, Registry};
use crate::sync::{Discard, SyncHook};
use crate::template;
use markup::{Attrs, Decoder, Tag};
use std::cell::{Ref, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone)]
struct Mounted {
    component: ComponentRef,
    registration: Rc<Registration>,
}

/// Everything a failed pass must restore.
#[derive(Clone, Default)]
struct Tree {
    nodes: HashMap<NodeId, Node>,
    components: HashMap<NodeId, Mounted>,
    identities: HashMap<usize, NodeId>,
    root: Option<NodeId>,
}

fn borrow(component: &ComponentRef) -> Result<Ref<'_, dyn Component>, Error> {
    component
        .try_borrow()
        .map_err(|_| Error::Structural("component is mutably borrowed elsewhere".to_string()))
}

fn borrow_mut(component: &ComponentRef) -> Result<RefMut<'_, dyn Component>, Error> {
    component
        .try_borrow_mut()
        .map_err(|_| Error::Structural("component is borrowed elsewhere".to_string()))
}

fn map_fields(
    registration: &Registration,
    component: &ComponentRef,
    attrs: &Attrs,
) -> Result<(), Error> {
    let mut guard = borrow_mut(component)?;
    registration
        .descriptor
        .map_attrs((&mut *guard).as_any_mut(), attrs)
        .map_err(|source| Error::FieldMapping {
            component: registration.name.clone(),
            source,
        })
}

pub struct Engine {
    registry: Rc<Registry>,
    decoder: Decoder,
    sync: Box<dyn SyncHook>,
    tree: Tree,
    batch: Batch,
    subscriptions: HashMap<NodeId, Subscription>,
    mounted: Vec<NodeId>,
    dismounted: Vec<(NodeId, ComponentRef)>,
    remapped: Vec<NodeId>,
}

impl Engine {
    /// An engine with no transforms, no allow-list and a hook that discards batches.
    pub fn new(registry: Rc<Registry>) -> Self {
        Engine {
            registry,
            decoder: Decoder::new(),
            sync: Box::new(Discard),
            tree: Tree::default(),
            batch: Batch::default(),
            subscriptions: HashMap::new(),
            mounted: Vec::new(),
            dismounted: Vec::new(),
            remapped: Vec::new(),
        }
    }

    pub fn from_config(registry: Rc<Registry>, config: &EngineConfig) -> Self {
        let mut engine = Engine::new(registry).allow_nodes(&config.allowed_nodes);
        if config.event_handlers {
            engine = engine.with_transform(markup::event_handler);
        }
        if config.href_components {
            engine = engine.with_transform(markup::href_component);
        }
        engine
    }

    pub fn with_sync(mut self, hook: impl SyncHook + 'static) -> Self {
        self.sync = Box::new(hook);
        self
    }

    /// Appends an attribute transform; transforms run in the order they were added.
    pub fn with_transform(
        mut self,
        transform: impl Fn(String, String) -> (String, String) + 'static,
    ) -> Self {
        self.decoder.add_transform(Box::new(transform));
        self
    }

    pub fn allow_nodes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.decoder.allow_nodes(names);
        self
    }

    /// Closes the current tree, then mounts `component` as the new root.
    pub fn mount(&mut self, component: &ComponentRef) -> Result<NodeId, Error> {
        self.close();
        let registration = self.registry.entry_for(&*borrow(component)?)?;
        log::debug!(target: "dom.engine", "mounting root {}", registration.name);
        self.transaction(|engine| {
            let id = engine.mount_component(Rc::clone(component), registration, None, Attrs::new())?;
            engine.batch.change(Change::SetRoot { id: id.clone() });
            engine.tree.root = Some(id.clone());
            Ok(id)
        })
    }

    /// Re-renders a mounted component and syncs the difference.
    pub fn render(&mut self, component: &ComponentRef) -> Result<(), Error> {
        let id = self.id_of(component).ok_or_else(|| self.not_mounted(component))?;
        self.transaction(|engine| engine.update_component(&id))
    }

    /// Resolves a renderer event against its component, runs it, then re-renders the
    /// component.
    pub fn dispatch(&mut self, mapping: &Mapping) -> Result<(), Error> {
        let mounted = self
            .tree
            .components
            .get(mapping.compo_id.as_str())
            .cloned()
            .ok_or_else(|| Error::NotMounted(mapping.compo_id.clone()))?;
        {
            let mut guard = borrow_mut(&mounted.component)?;
            let target = (&mut *guard).as_any_mut();
            let call = mapping::resolve(
                &*mounted.registration.descriptor,
                target,
                &mapping.field_or_method,
                &mapping.json_value,
            )?;
            if let Some(call) = call {
                call();
            }
        }
        log::debug!(
            target: "dom.mapping",
            "dispatched {} on {}",
            mapping.field_or_method,
            mapping.compo_id
        );
        let id = NodeId::from(mapping.compo_id.as_str());
        self.transaction(|engine| engine.update_component(&id))
    }

    /// Drops every node and component. Nothing is synced; dismount hooks run immediately.
    pub fn close(&mut self) {
        if let Some(root) = self.tree.root.take() {
            log::debug!(target: "dom.engine", "closing {root}");
            self.delete_node(&root);
        }
        self.batch.clear();
        self.mounted.clear();
        self.remapped.clear();
        for (id, component) in std::mem::take(&mut self.dismounted) {
            self.dismount_hooks(&id, &component);
        }
        for (_, subscription) in self.subscriptions.drain() {
            subscription.close();
        }
        self.tree = Tree::default();
    }

    pub fn contains(&self, component: &ComponentRef) -> bool {
        self.tree.identities.contains_key(&identity(component))
    }

    pub fn id_of(&self, component: &ComponentRef) -> Option<NodeId> {
        self.tree.identities.get(&identity(component)).cloned()
    }

    pub fn by_id(&self, id: &str) -> Result<ComponentRef, Error> {
        self.tree
            .components
            .get(id)
            .map(|m| Rc::clone(&m.component))
            .ok_or_else(|| Error::NotMounted(id.to_string()))
    }

    pub fn root_id(&self) -> Option<&NodeId> {
        self.tree.root.as_ref()
    }

    /// Number of mounted components.
    pub fn len(&self) -> usize {
        self.tree.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.components.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.tree.nodes.len()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.tree.nodes.get(id)
    }

    fn not_mounted(&self, component: &ComponentRef) -> Error {
        let name = borrow(component)
            .ok()
            .and_then(|c| self.registry.name_of(&*c).map(str::to_string))
            .unwrap_or_else(|| "unregistered component".to_string());
        Error::NotMounted(name)
    }

    fn transaction<T>(
        &mut self,
        pass: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let snapshot = self.tree.clone();
        let result = pass(self).and_then(|value| self.flush().map(|()| value));
        match result {
            Ok(value) => {
                self.remapped.clear();
                self.run_hooks();
                Ok(value)
            }
            Err(err) => {
                log::debug!(target: "dom.engine", "pass failed, rolling back: {err}");
                self.tree = snapshot;
                self.batch.clear();
                self.mounted.clear();
                self.dismounted.clear();
                self.restore_fields();
                Err(err)
            }
        }
    }

    /// Maps the restored attributes back onto every component remapped by the failed pass.
    fn restore_fields(&mut self) {
        for id in std::mem::take(&mut self.remapped) {
            let (Some(Node::Component { attrs, .. }), Some(mounted)) =
                (self.tree.nodes.get(&id), self.tree.components.get(&id))
            else {
                continue;
            };
            if let Err(err) = map_fields(&mounted.registration, &mounted.component, attrs) {
                log::warn!(target: "dom.engine", "{id}: restoring fields failed: {err}");
            }
        }
    }

    fn flush(&mut self) -> Result<(), Error> {
        let batch = self.batch.take();
        log::debug!(target: "dom.sync", "syncing {} changes", batch.len());
        self.sync.sync(&batch).map_err(Error::Sync)
    }

    fn run_hooks(&mut self) {
        let mounted = std::mem::take(&mut self.mounted);
        for (id, component) in std::mem::take(&mut self.dismounted) {
            if !mounted.contains(&id) {
                self.dismount_hooks(&id, &component);
            }
        }
        for id in mounted {
            let Some(entry) = self.tree.components.get(&id) else {
                continue;
            };
            let component = Rc::clone(&entry.component);
            let Ok(mut guard) = component.try_borrow_mut() else {
                log::warn!(target: "dom.engine", "skipping mount hook of {id}: component is borrowed");
                continue;
            };
            guard.on_mount();
            if let Some(subscription) = guard.subscribe() {
                self.subscriptions.insert(id, subscription);
            }
        }
    }

    fn dismount_hooks(&mut self, id: &NodeId, component: &ComponentRef) {
        if let Some(subscription) = self.subscriptions.remove(id) {
            subscription.close();
        }
        match component.try_borrow_mut() {
            Ok(mut guard) => guard.on_dismount(),
            Err(_) => {
                log::warn!(target: "dom.engine", "skipping dismount hook of {id}: component is borrowed")
            }
        }
        log::debug!(target: "dom.engine", "dismounted {id}");
    }

    fn entry(&self, id: &NodeId) -> Result<Mounted, Error> {
        self.tree
            .components
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotMounted(id.to_string()))
    }

    /// Renders the component's template and decodes it into a tag tree.
    fn decode(&self, id: &NodeId) -> Result<Tag, Error> {
        let mounted = self.entry(id)?;
        let guard = borrow(&mounted.component)?;
        let decode = || -> Result<Tag, RenderError> {
            let state = mounted.registration.state(&*guard)?;
            let markup = template::render(&*guard, state)?;
            log::trace!(target: "dom.engine", "{id} rendered {} bytes", markup.len());
            Ok(self.decoder.decode(&markup)?)
        };
        decode().map_err(|source| Error::Decode {
            component: mounted.registration.name.clone(),
            source,
        })
    }

    fn mount_component(
        &mut self,
        component: ComponentRef,
        registration: Rc<Registration>,
        owner: Option<&NodeId>,
        attrs: Attrs,
    ) -> Result<NodeId, Error> {
        let key = identity(&component);
        if self.tree.identities.contains_key(&key) {
            return Err(Error::Structural(format!(
                "{} is already mounted",
                registration.name
            )));
        }

        let id = NodeId::generate(&registration.name);
        self.batch.create(Change::NewNode {
            id: id.clone(),
            compo_id: owner.cloned(),
            node_type: registration.name.clone(),
            namespace: None,
            is_compo: true,
        });
        self.tree.nodes.insert(
            id.clone(),
            Node::Component {
                compo_id: owner.cloned(),
                name: registration.name.clone(),
                attrs,
                root: None,
            },
        );
        self.tree.identities.insert(key, id.clone());
        self.tree.components.insert(
            id.clone(),
            Mounted {
                component,
                registration,
            },
        );

        let tag = self.decode(&id)?;
        let root = self.mount_tag(tag, &id)?;
        self.batch.change(Change::AppendChild {
            parent: id.clone(),
            child: root.clone(),
        });
        self.set_component_root(&id, root)?;
        self.mounted.push(id.clone());
        log::debug!(target: "dom.engine", "mounted {id}");
        Ok(id)
    }

    fn set_component_root(&mut self, id: &NodeId, new_root: NodeId) -> Result<(), Error> {
        match self.tree.nodes.get_mut(id) {
            Some(Node::Component { root, .. }) => {
                *root = Some(new_root);
                Ok(())
            }
            _ => Err(Error::Structural(format!("{id} is not a component node"))),
        }
    }

    /// Creates the nodes for `tag` and everything below it.
    fn mount_tag(&mut self, tag: Tag, compo_id: &NodeId) -> Result<NodeId, Error> {
        match tag {
            Tag::Text(value) => {
                let id = NodeId::generate("text");
                self.batch.create(Change::NewNode {
                    id: id.clone(),
                    compo_id: Some(compo_id.clone()),
                    node_type: "text".to_string(),
                    namespace: None,
                    is_compo: false,
                });
                self.batch.change(Change::SetText {
                    id: id.clone(),
                    value: value.clone(),
                });
                self.tree.nodes.insert(
                    id.clone(),
                    Node::Text {
                        compo_id: compo_id.clone(),
                        value,
                    },
                );
                Ok(id)
            }
            Tag::Element {
                name,
                namespace,
                attrs,
                children,
            } => {
                let id = NodeId::generate(&name);
                self.batch.create(Change::NewNode {
                    id: id.clone(),
                    compo_id: Some(compo_id.clone()),
                    node_type: name.clone(),
                    namespace: namespace.map(|ns| ns.uri().to_string()),
                    is_compo: false,
                });
                for (key, value) in &attrs {
                    self.batch.change(Change::SetAttr {
                        id: id.clone(),
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
                let mut child_ids = Vec::with_capacity(children.len());
                for child in children {
                    let child_id = self.mount_tag(child, compo_id)?;
                    self.batch.change(Change::AppendChild {
                        parent: id.clone(),
                        child: child_id.clone(),
                    });
                    child_ids.push(child_id);
                }
                self.tree.nodes.insert(
                    id.clone(),
                    Node::Element {
                        compo_id: compo_id.clone(),
                        tag: name,
                        namespace,
                        attrs,
                        children: child_ids,
                    },
                );
                Ok(id)
            }
            Tag::Component { name, attrs } => {
                let registration = self.registry.entry(&name)?;
                let component = registration.build();
                map_fields(&registration, &component, &attrs)?;
                self.mount_component(component, registration, Some(compo_id), attrs)
            }
        }
    }

    /// Re-renders a mounted component against its current root.
    fn update_component(&mut self, id: &NodeId) -> Result<(), Error> {
        let tag = self.decode(id)?;
        let old_root = match self.tree.nodes.get(id) {
            Some(Node::Component { root, .. }) => root.clone(),
            _ => return Err(Error::NotMounted(id.to_string())),
        };

        let new_root = match &old_root {
            Some(old) => self.sync_tag(old, tag, id)?,
            None => self.mount_tag(tag, id)?,
        };
        match old_root {
            None => self.batch.change(Change::AppendChild {
                parent: id.clone(),
                child: new_root.clone(),
            }),
            Some(old) if old != new_root => {
                log::debug!(target: "dom.engine", "{id}: replacing root {old} with {new_root}");
                self.batch.change(Change::ReplaceChild {
                    parent: id.clone(),
                    old: old.clone(),
                    new: new_root.clone(),
                });
                self.delete_node(&old);
            }
            Some(_) => {}
        }
        self.set_component_root(id, new_root)
    }

    /// Brings the node at `old` in line with `tag`. Returns `old` when patched in place, or
    /// the id of a freshly mounted replacement; the caller links it and deletes `old`.
    fn sync_tag(&mut self, old: &NodeId, tag: Tag, compo_id: &NodeId) -> Result<NodeId, Error> {
        let same_kind = match (self.tree.nodes.get(old), &tag) {
            (Some(Node::Text { .. }), Tag::Text(_)) => true,
            (
                Some(Node::Element { tag: current, namespace: current_ns, .. }),
                Tag::Element { name, namespace, .. },
            ) => current == name && current_ns == namespace,
            (Some(Node::Component { name: current, .. }), Tag::Component { name, .. }) => {
                current.eq_ignore_ascii_case(name)
            }
            _ => false,
        };
        if !same_kind {
            log::trace!(target: "dom.engine", "{old} does not match {:?}, remounting", tag.name());
            return self.mount_tag(tag, compo_id);
        }

        match tag {
            Tag::Text(value) => self.sync_text(old, value),
            Tag::Element {
                attrs, children, ..
            } => self.sync_element(old, attrs, children, compo_id)?,
            Tag::Component { attrs, .. } => self.sync_component(old, attrs)?,
        }
        Ok(old.clone())
    }

    fn sync_text(&mut self, id: &NodeId, value: String) {
        let Some(Node::Text { value: current, .. }) = self.tree.nodes.get_mut(id) else {
            return;
        };
        if *current != value {
            current.clone_from(&value);
            self.batch.change(Change::SetText {
                id: id.clone(),
                value,
            });
        }
    }

    fn sync_element(
        &mut self,
        id: &NodeId,
        attrs: Attrs,
        children: Vec<Tag>,
        compo_id: &NodeId,
    ) -> Result<(), Error> {
        let (old_attrs, old_children) = match self.tree.nodes.get_mut(id) {
            Some(Node::Element {
                attrs, children, ..
            }) => (std::mem::take(attrs), std::mem::take(children)),
            _ => return Err(Error::Structural(format!("{id} is not an element"))),
        };

        for (key, value) in &attrs {
            if old_attrs.get(key) != Some(value) {
                self.batch.change(Change::SetAttr {
                    id: id.clone(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        for key in old_attrs.keys().filter(|k| !attrs.contains_key(*k)) {
            self.batch.change(Change::DelAttr {
                id: id.clone(),
                key: key.clone(),
            });
        }

        let kept = self.sync_children(id, old_children, children, compo_id)?;
        if let Some(Node::Element {
            attrs: current_attrs,
            children: current_children,
            ..
        }) = self.tree.nodes.get_mut(id)
        {
            *current_attrs = attrs;
            *current_children = kept;
        }
        Ok(())
    }

    /// Positional child diff: shared positions recurse, surplus old children are removed,
    /// surplus new children are mounted and appended.
    fn sync_children(
        &mut self,
        parent: &NodeId,
        old: Vec<NodeId>,
        new: Vec<Tag>,
        compo_id: &NodeId,
    ) -> Result<Vec<NodeId>, Error> {
        let mut kept = Vec::with_capacity(new.len());
        let mut new = new.into_iter();

        for old_child in old {
            match new.next() {
                Some(tag) => {
                    let child = self.sync_tag(&old_child, tag, compo_id)?;
                    if child != old_child {
                        self.batch.change(Change::ReplaceChild {
                            parent: parent.clone(),
                            old: old_child.clone(),
                            new: child.clone(),
                        });
                        self.delete_node(&old_child);
                    }
                    kept.push(child);
                }
                None => {
                    self.batch.change(Change::RemoveChild {
                        parent: parent.clone(),
                        child: old_child.clone(),
                    });
                    self.delete_node(&old_child);
                }
            }
        }

        for tag in new {
            let child = self.mount_tag(tag, compo_id)?;
            self.batch.change(Change::AppendChild {
                parent: parent.clone(),
                child: child.clone(),
            });
            kept.push(child);
        }
        Ok(kept)
    }

    /// Same-named nested component: remap and re-render only when its attributes changed.
    fn sync_component(&mut self, id: &NodeId, attrs: Attrs) -> Result<(), Error> {
        match self.tree.nodes.get_mut(id) {
            Some(Node::Component { attrs: current, .. }) => {
                if *current == attrs {
                    return Ok(());
                }
                current.clone_from(&attrs);
            }
            _ => return Err(Error::Structural(format!("{id} is not a component node"))),
        }
        let mounted = self.entry(id)?;
        map_fields(&mounted.registration, &mounted.component, &attrs)?;
        self.remapped.push(id.clone());
        self.update_component(id)
    }

    /// Removes `id` and its subtree, recording deletions children first.
    fn delete_node(&mut self, id: &NodeId) {
        let Some(node) = self.tree.nodes.remove(id) else {
            return;
        };
        for child in node.children() {
            self.delete_node(child);
        }
        if matches!(node, Node::Component { .. }) {
            if let Some(mounted) = self.tree.components.remove(id) {
                self.tree.identities.remove(&identity(&mounted.component));
                self.dismounted.push((id.clone(), mounted.component));
            }
        }
        self.batch.delete(id.clone());
    }
}
