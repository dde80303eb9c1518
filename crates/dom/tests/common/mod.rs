#![allow(dead_code)]

use dom::{
    AsAny, BoxError, Change, Component, ComponentRef, Describe, Descriptor, Engine, EngineConfig,
    Mirror, Registry, Subscription, SyncHook, ZeroComponent,
};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

thread_local! {
    static HOOKS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record_hook(event: String) {
    HOOKS.with(|h| h.borrow_mut().push(event));
}

/// Hook events recorded on this thread since the last call.
pub fn take_hooks() -> Vec<String> {
    HOOKS.with(|h| std::mem::take(&mut *h.borrow_mut()))
}

/// Sync hook that keeps every batch and replays it into a `Mirror`.
#[derive(Clone, Default)]
pub struct Recorder {
    batches: Rc<RefCell<Vec<Vec<Change>>>>,
    mirror: Rc<RefCell<Mirror>>,
    fail_next: Rc<Cell<bool>>,
}

impl SyncHook for Recorder {
    fn sync(&mut self, batch: &[Change]) -> Result<(), BoxError> {
        if self.fail_next.replace(false) {
            return Err("renderer unavailable".into());
        }
        self.mirror.borrow_mut().apply(batch)?;
        self.batches.borrow_mut().push(batch.to_vec());
        Ok(())
    }
}

impl Recorder {
    pub fn fail_next(&self) {
        self.fail_next.set(true);
    }

    pub fn count(&self) -> usize {
        self.batches.borrow().len()
    }

    pub fn last(&self) -> Vec<Change> {
        self.batches.borrow().last().cloned().unwrap_or_default()
    }

    pub fn markup(&self) -> Option<String> {
        self.mirror.borrow().markup()
    }

    pub fn mirror_len(&self) -> usize {
        self.mirror.borrow().len()
    }
}

pub fn edit<C: Component>(component: &ComponentRef, f: impl FnOnce(&mut C)) {
    let mut guard = component.borrow_mut();
    let concrete = (&mut *guard)
        .as_any_mut()
        .downcast_mut::<C>()
        .expect("unexpected component type");
    f(concrete);
}

pub fn read<C: Component, R>(component: &ComponentRef, f: impl FnOnce(&C) -> R) -> R {
    let guard = component.borrow();
    let concrete = (*guard)
        .as_any()
        .downcast_ref::<C>()
        .expect("unexpected component type");
    f(concrete)
}

/// `<div class="test" [disabled]>value</div>`
#[derive(Default, Serialize)]
pub struct Hello {
    pub value: String,
    pub disabled: bool,
}

impl Component for Hello {
    fn render(&self) -> String {
        r#"<div class="test" {% if disabled %}disabled{% endif %}>{{ value }}</div>"#.into()
    }
}

impl Describe for Hello {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Value", |h| &mut h.value)
            .field("Disabled", |h| &mut h.disabled);
    }
}

/// Switches its heading level and list length with state.
#[derive(Default, Serialize)]
pub struct Page {
    pub title: String,
    pub big: bool,
    pub items: Vec<String>,
}

impl Component for Page {
    fn render(&self) -> String {
        r#"
        <div>
            {% if big %}<h1>{{ title }}</h1>{% else %}<h2>{{ title }}</h2>{% endif %}
            <ul>{% for item in items %}<li>{{ item }}</li>{% endfor %}</ul>
        </div>
        "#
        .into()
    }
}

impl Describe for Page {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Title", |p| &mut p.title)
            .field("Big", |p| &mut p.big)
            .field("Items", |p| &mut p.items);
    }
}

/// Nested component addressed as `app.badge`.
#[derive(Default, Serialize)]
pub struct Badge {
    pub label: String,
    pub count: u32,
}

impl Component for Badge {
    fn render(&self) -> String {
        r#"<span title="{{ label }}">{{ count }}</span>"#.into()
    }

    fn on_mount(&mut self) {
        record_hook(format!("mount badge {}", self.label));
    }

    fn on_dismount(&mut self) {
        record_hook(format!("dismount badge {}", self.label));
    }

    fn subscribe(&mut self) -> Option<Subscription> {
        let label = self.label.clone();
        Some(Subscription::new().on_close(move || record_hook(format!("unsubscribe {label}"))))
    }
}

impl Describe for Badge {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Label", |b| &mut b.label)
            .field("Count", |b| &mut b.count);
    }
}

/// Nested component addressed as `app.tag`.
#[derive(Default, Serialize)]
pub struct Marker {
    pub label: String,
}

impl Component for Marker {
    fn render(&self) -> String {
        r#"<em>{{ label }}</em>"#.into()
    }
}

impl Describe for Marker {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Label", |m| &mut m.label);
    }
}

/// Hosts a nested component chosen by state.
#[derive(Default, Serialize)]
pub struct Shell {
    pub label: String,
    pub count: u32,
    pub marker: bool,
}

impl Component for Shell {
    fn render(&self) -> String {
        r#"
        <section>
            {% if marker %}<app.tag label="{{ label }}">{% else %}<app.badge label="{{ label }}" count="{{ count }}">{% endif %}
        </section>
        "#
        .into()
    }

    fn on_mount(&mut self) {
        record_hook("mount shell".into());
    }

    fn on_dismount(&mut self) {
        record_hook("dismount shell".into());
    }
}

impl Describe for Shell {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Label", |s| &mut s.label)
            .field("Count", |s| &mut s.count)
            .field("Marker", |s| &mut s.marker);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub label: String,
    pub runs: u32,
}

impl Describe for Task {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Label", |t| &mut t.label)
            .method("Run", |t, ()| t.runs += 1);
    }
}

/// Event target for dispatch tests.
#[derive(Default, Serialize)]
pub struct Board {
    pub count: i64,
    pub slice: Vec<i64>,
    pub tasks: Vec<Task>,
}

impl Component for Board {
    fn render(&self) -> String {
        r#"
        <div>
            <button onclick="Increment">{{ count }}</button>
            <ul>{% for task in tasks %}<li>{{ task.label }}:{{ task.runs }}</li>{% endfor %}</ul>
        </div>
        "#
        .into()
    }
}

impl Describe for Board {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Count", |b| &mut b.count)
            .field("Slice", |b| &mut b.slice)
            .records("Tasks", |b| &mut b.tasks)
            .method("Increment", |b, ()| b.count += 1)
            .method("Add", |b, (n,): (i64,)| b.count += n);
    }
}

/// References a component nobody registered.
#[derive(Default, Serialize)]
pub struct Broken {
    #[serde(skip)]
    _zero: ZeroComponent,
}

impl Component for Broken {
    fn render(&self) -> String {
        "<div><app.missing></div>".into()
    }
}

impl Describe for Broken {
    fn describe(_: &mut Descriptor<Self>) {}
}

/// Passes a non-numeric value to an integer field.
#[derive(Default, Serialize)]
pub struct Mismatch {
    pub text: String,
}

impl Component for Mismatch {
    fn render(&self) -> String {
        r#"<div><app.badge count="{{ text }}"></div>"#.into()
    }
}

impl Describe for Mismatch {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Text", |m| &mut m.text);
    }
}

/// Renders whatever markup it holds verbatim.
#[derive(Default, Serialize)]
pub struct Raw {
    pub markup: String,
}

impl Component for Raw {
    fn render(&self) -> String {
        "{{ markup | raw }}".into()
    }
}

impl Describe for Raw {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Markup", |r| &mut r.markup);
    }
}

pub fn registry() -> Rc<Registry> {
    let mut registry = Registry::new();
    registry.register::<Hello>().unwrap();
    registry.register::<Page>().unwrap();
    registry.register_as::<Badge>("app.badge").unwrap();
    registry.register_as::<Marker>("app.tag").unwrap();
    registry.register::<Shell>().unwrap();
    registry.register::<Board>().unwrap();
    registry.register::<Broken>().unwrap();
    registry.register::<Mismatch>().unwrap();
    registry.register::<Raw>().unwrap();
    Rc::new(registry)
}

pub fn engine(recorder: &Recorder) -> Engine {
    Engine::from_config(registry(), &EngineConfig::default()).with_sync(recorder.clone())
}
