//! The component contract.
//!
//! A component is a record whose serialized state feeds a template. Mounted components are
//! shared as `ComponentRef` so the caller can keep mutating them and ask the engine to
//! re-render; identity is the allocation, not the value.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A template helper, registered as a filter under the name it is paired with.
pub type Helper =
    fn(&tera::Value, &HashMap<String, tera::Value>) -> tera::Result<tera::Value>;

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub trait Component: AsAny {
    /// Template source. It is rendered with the component's serialized fields as context
    /// and must produce exactly one root node.
    fn render(&self) -> String;

    /// Runs after the component's first batch reached the renderer.
    fn on_mount(&mut self) {}

    /// Runs after the batch removing the component reached the renderer.
    fn on_dismount(&mut self) {}

    /// Event subscription kept alive while the component is mounted.
    fn subscribe(&mut self) -> Option<Subscription> {
        None
    }

    /// Extra template helpers. Names may not shadow `raw`, `compo`, `time` or `json`.
    fn helpers(&self) -> Vec<(&'static str, Helper)> {
        Vec::new()
    }
}

pub type ComponentRef = Rc<RefCell<dyn Component>>;

pub fn component_ref<C: Component>(component: C) -> ComponentRef {
    Rc::new(RefCell::new(component))
}

/// Pointer identity of a shared component.
pub(crate) fn identity(component: &ComponentRef) -> usize {
    Rc::as_ptr(component) as *const () as usize
}

/// Placeholder field for components that carry no state of their own.
///
/// A component type must not be zero-sized; embedding this keeps it addressable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroComponent {
    #[serde(skip)]
    placeholder: u8,
}

/// Resources released when a component is dismounted.
#[derive(Default)]
pub struct Subscription {
    closers: Vec<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_close(mut self, close: impl FnOnce() + 'static) -> Self {
        self.closers.push(Box::new(close));
        self
    }

    pub fn close(self) {
        for close in self.closers {
            close();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closers", &self.closers.len())
            .finish()
    }
}
