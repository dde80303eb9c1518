//! Component factory.
//!
//! The registry is built once by the application root, then shared with the engine. It
//! maps lower-cased component names to constructors, and concrete types to their
//! descriptors so a root component handed over by value can be looked up.

use crate::component::{AsAny, Component, ComponentRef};
use crate::describe::{Describe, Descriptor, Reflect, short_type_name};
use crate::error::Error;
use serde::Serialize;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub(crate) struct Registration {
    pub(crate) name: String,
    build: fn() -> ComponentRef,
    state: fn(&dyn Any) -> Result<Value, serde_json::Error>,
    pub(crate) descriptor: Box<dyn Reflect>,
}

impl Registration {
    pub(crate) fn build(&self) -> ComponentRef {
        (self.build)()
    }

    pub(crate) fn state(&self, component: &dyn Component) -> Result<Value, serde_json::Error> {
        (self.state)(component.as_any())
    }
}

fn build<C: Component + Default>() -> ComponentRef {
    Rc::new(RefCell::new(C::default()))
}

fn state_of<C: Serialize + 'static>(value: &dyn Any) -> Result<Value, serde_json::Error> {
    match value.downcast_ref::<C>() {
        Some(component) => serde_json::to_value(component),
        None => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
            "state is not a {}",
            short_type_name::<C>()
        ))),
    }
}

/// `<module>.<type>`, lower-cased: `app::ui::Menu` derives `ui.menu`.
fn derived_name<C>() -> String {
    let full = std::any::type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    let mut segments = base.rsplit("::");
    let type_name = segments.next().unwrap_or(base);
    let name = match segments.next() {
        Some(module) => format!("{module}.{type_name}"),
        None => type_name.to_string(),
    };
    name.to_ascii_lowercase()
}

fn validate_name(name: &str) -> Result<(), Error> {
    let valid_chars = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-' | b':'));
    if name.is_empty() || !valid_chars || !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(Error::Structural(format!(
            "{name:?} is not a valid component name"
        )));
    }
    if markup::elements::is_html_element(name) {
        return Err(Error::Structural(format!(
            "{name:?} is a standard element name and would never decode as a component"
        )));
    }
    Ok(())
}

#[derive(Default)]
pub struct Registry {
    by_name: HashMap<String, Rc<Registration>>,
    by_type: HashMap<TypeId, Rc<Registration>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `C` under its module-qualified type name, such as `ui.menu` for
    /// `app::ui::Menu`, and returns that name.
    pub fn register<C>(&mut self) -> Result<String, Error>
    where
        C: Component + Describe + Serialize + Default,
    {
        let name = derived_name::<C>();
        self.register_as::<C>(&name)?;
        Ok(name)
    }

    /// Registers `C` under an explicit, possibly qualified name such as `app.hello`.
    pub fn register_as<C>(&mut self, name: &str) -> Result<(), Error>
    where
        C: Component + Describe + Serialize + Default,
    {
        let name = name.to_ascii_lowercase();
        validate_name(&name)?;
        if std::mem::size_of::<C>() == 0 {
            return Err(Error::Structural(format!(
                "{} is zero-sized; embed a ZeroComponent field",
                short_type_name::<C>()
            )));
        }
        let descriptor = Descriptor::<C>::of();
        if let Some(problem) = descriptor.problems().first() {
            return Err(Error::Structural(problem.clone()));
        }

        let registration = Rc::new(Registration {
            name: name.clone(),
            build: build::<C>,
            state: state_of::<C>,
            descriptor: Box::new(descriptor),
        });
        log::debug!(target: "dom.registry", "registered {} as {name}", short_type_name::<C>());
        self.by_type.insert(TypeId::of::<C>(), Rc::clone(&registration));
        self.by_name.insert(name, registration);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_ascii_lowercase())
    }

    /// Builds a fresh instance of the component registered under `name`.
    pub fn new_by_name(&self, name: &str) -> Result<ComponentRef, Error> {
        Ok(self.entry(name)?.build())
    }

    /// Registered name of the component's concrete type.
    pub fn name_of(&self, component: &dyn Component) -> Option<&str> {
        self.by_type
            .get(&component.as_any().type_id())
            .map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub(crate) fn entry(&self, name: &str) -> Result<Rc<Registration>, Error> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnknownComponent(name.to_string()))
    }

    pub(crate) fn entry_for(&self, component: &dyn Component) -> Result<Rc<Registration>, Error> {
        self.by_type
            .get(&component.as_any().type_id())
            .cloned()
            .ok_or_else(|| {
                Error::Structural("component type is not registered".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ZeroComponent;
    use crate::describe::Descriptor;

    #[derive(Default, Serialize)]
    struct Hello {
        name: String,
    }

    impl Component for Hello {
        fn render(&self) -> String {
            "<p>{{ name }}</p>".into()
        }
    }

    impl Describe for Hello {
        fn describe(d: &mut Descriptor<Self>) {
            d.field("Name", |h| &mut h.name);
        }
    }

    #[derive(Default, Serialize)]
    struct Empty;

    impl Component for Empty {
        fn render(&self) -> String {
            "<p></p>".into()
        }
    }

    impl Describe for Empty {
        fn describe(_: &mut Descriptor<Self>) {}
    }

    #[derive(Default, Serialize)]
    struct Placeholder {
        #[serde(skip)]
        _zero: ZeroComponent,
    }

    impl Component for Placeholder {
        fn render(&self) -> String {
            "<p></p>".into()
        }
    }

    impl Describe for Placeholder {
        fn describe(_: &mut Descriptor<Self>) {}
    }

    #[test]
    fn registers_under_module_qualified_type_name() {
        let mut registry = Registry::new();
        assert_eq!(registry.register::<Hello>().unwrap(), "tests.hello");
        assert!(registry.is_registered("tests.hello"));
        assert!(registry.is_registered("Tests.Hello"));
        assert!(!registry.is_registered("hello"));
        let c = registry.new_by_name("tests.hello").unwrap();
        assert!((*c.borrow()).as_any().is::<Hello>());
        assert_eq!(registry.name_of(&*c.borrow()), Some("tests.hello"));
    }

    #[derive(Default, Serialize)]
    struct Menu {
        open: bool,
    }

    impl Component for Menu {
        fn render(&self) -> String {
            "<nav>{{ open }}</nav>".into()
        }
    }

    impl Describe for Menu {
        fn describe(d: &mut Descriptor<Self>) {
            d.field("Open", |m| &mut m.open);
        }
    }

    #[test]
    fn element_named_types_register_through_their_module() {
        let mut registry = Registry::new();
        assert_eq!(registry.register::<Menu>().unwrap(), "tests.menu");
        assert!(matches!(
            registry.register_as::<Menu>("menu"),
            Err(Error::Structural(_))
        ));
    }

    #[test]
    fn registers_qualified_names() {
        let mut registry = Registry::new();
        registry.register_as::<Hello>("app.Hello").unwrap();
        assert!(registry.is_registered("app.hello"));
        assert!(!registry.is_registered("hello"));
    }

    #[test]
    fn unknown_names_are_reported() {
        let registry = Registry::new();
        assert!(matches!(
            registry.new_by_name("nope"),
            Err(Error::UnknownComponent(name)) if name == "nope"
        ));
    }

    #[test]
    fn rejects_zero_sized_components_and_element_names() {
        let mut registry = Registry::new();
        assert!(matches!(registry.register::<Empty>(), Err(Error::Structural(_))));
        assert!(registry.register::<Placeholder>().is_ok());
        assert!(matches!(
            registry.register_as::<Hello>("div"),
            Err(Error::Structural(_))
        ));
        assert!(matches!(
            registry.register_as::<Hello>("my hello"),
            Err(Error::Structural(_))
        ));
    }
}
