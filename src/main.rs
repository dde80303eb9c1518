use dom::{
    AsAny, BoxError, Change, Component, ComponentRef, Describe, Descriptor, Engine, EngineConfig,
    Mapping, Registry, component_ref,
};
use mimalloc::MiMalloc;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Clone, Default, Serialize, Deserialize)]
struct Todo {
    label: String,
    done: bool,
}

impl Describe for Todo {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Label", |t| &mut t.label)
            .method("Toggle", |t, ()| t.done = !t.done);
    }
}

#[derive(Default, Serialize)]
struct Todos {
    title: String,
    todos: Vec<Todo>,
}

impl Component for Todos {
    fn render(&self) -> String {
        r#"
        <main>
            <h1>{{ title }}</h1>
            <ul>
            {% for todo in todos %}
                <li onclick="Todos.{{ loop.index0 }}.Toggle">
                    <app.check checked="{{ todo.done }}">
                    {{ todo.label }}
                </li>
            {% endfor %}
            </ul>
            <a href="/about">about</a>
        </main>
        "#
        .into()
    }

    fn on_mount(&mut self) {
        log::info!(target: "livedom", "{} mounted with {} todos", self.title, self.todos.len());
    }
}

impl Describe for Todos {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Title", |t| &mut t.title)
            .records("Todos", |t| &mut t.todos)
            .method("Add", |t, (label,): (String,)| {
                t.todos.push(Todo { label, done: false })
            });
    }
}

#[derive(Default, Serialize)]
struct Check {
    checked: bool,
}

impl Component for Check {
    fn render(&self) -> String {
        r#"<input type="checkbox" {% if checked %}checked{% endif %}>"#.into()
    }
}

impl Describe for Check {
    fn describe(d: &mut Descriptor<Self>) {
        d.field("Checked", |c| &mut c.checked);
    }
}

fn print_batch(batch: &[Change]) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string(batch)?);
    Ok(())
}

fn load_config() -> Result<EngineConfig, BoxError> {
    match std::env::args().nth(1) {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn edit_todos(component: &ComponentRef, f: impl FnOnce(&mut Todos)) {
    let mut guard = component.borrow_mut();
    if let Some(todos) = (&mut *guard).as_any_mut().downcast_mut::<Todos>() {
        f(todos);
    }
}

fn main() -> Result<(), BoxError> {
    env_logger::init();
    let config = load_config()?;

    let mut registry = Registry::new();
    registry.register::<Todos>()?;
    registry.register_as::<Check>("app.check")?;

    let mut engine = Engine::from_config(Rc::new(registry), &config).with_sync(print_batch);

    let todos = component_ref(Todos {
        title: "Groceries".into(),
        todos: vec![Todo {
            label: "milk".into(),
            done: false,
        }],
    });
    let root = engine.mount(&todos)?;

    edit_todos(&todos, |t| t.title = "Weekend groceries".into());
    engine.render(&todos)?;

    engine.dispatch(&Mapping::new(root.as_str(), "Add", r#""bread""#))?;
    engine.dispatch(&Mapping::new(root.as_str(), "Todos.0.Toggle", ""))?;

    log::info!(
        target: "livedom",
        "{} components, {} nodes",
        engine.len(),
        engine.node_count()
    );
    engine.close();
    Ok(())
}
