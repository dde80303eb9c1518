//! Template rendering with tera.
//!
//! Each render builds a one-template `Tera` instance named `component.html`, so output is
//! HTML-escaped unless a helper marks it safe. Built-in helpers:
//! - `raw` filter: inserts the value unescaped.
//! - `compo` filter and function: emits a component tag, `{{ "app.hello" | compo }}`.
//! - `time` filter: formats an RFC 3339 timestamp with a strftime `layout`.
//! - `json` filter: serializes the value as JSON text.

use crate::component::Component;
use crate::error::RenderError;
use std::collections::HashMap;
use std::fmt::Write;
use tera::{Context, Filter, Function, Tera, Value};

pub const BUILTIN_HELPERS: &[&str] = &["raw", "compo", "time", "json"];

const TEMPLATE_NAME: &str = "component.html";
const DEFAULT_TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

struct Raw;

impl Filter for Raw {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        Ok(Value::String(as_text(value)))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

fn component_tag(name: &str) -> tera::Result<Value> {
    if name.is_empty() || name.contains(['<', '>', '"', '\'']) {
        return Err(tera::Error::msg(format!("compo: invalid component name {name:?}")));
    }
    Ok(Value::String(format!("<{name}>")))
}

struct CompoFilter;

impl Filter for CompoFilter {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        component_tag(&as_text(value))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

struct CompoFunction;

impl Function for CompoFunction {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("compo: missing `name` argument"))?;
        component_tag(name)
    }

    fn is_safe(&self) -> bool {
        true
    }
}

struct Time;

impl Filter for Time {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let raw = value
            .as_str()
            .ok_or_else(|| tera::Error::msg("time: expected an RFC 3339 string"))?;
        let at = chrono::DateTime::parse_from_rfc3339(raw)
            .map_err(|e| tera::Error::msg(format!("time: {raw:?}: {e}")))?;
        let layout = args
            .get("layout")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TIME_LAYOUT);
        let mut out = String::new();
        write!(out, "{}", at.format(layout))
            .map_err(|_| tera::Error::msg(format!("time: invalid layout {layout:?}")))?;
        Ok(Value::String(out))
    }
}

struct Json;

impl Filter for Json {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        serde_json::to_string(value)
            .map(Value::String)
            .map_err(|e| tera::Error::msg(format!("json: {e}")))
    }
}

/// Renders the component's template against its serialized state.
pub(crate) fn render(component: &dyn Component, state: Value) -> Result<String, RenderError> {
    let mut tera = Tera::default();
    tera.register_filter("raw", Raw);
    tera.register_filter("compo", CompoFilter);
    tera.register_function("compo", CompoFunction);
    tera.register_filter("time", Time);
    tera.register_filter("json", Json);
    for (name, helper) in component.helpers() {
        if BUILTIN_HELPERS.contains(&name) {
            return Err(RenderError::ReservedHelper(name.to_string()));
        }
        tera.register_filter(name, helper);
    }

    tera.add_raw_template(TEMPLATE_NAME, &component.render())?;
    let context = Context::from_value(state)?;
    Ok(tera.render(TEMPLATE_NAME, &context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Page {
        source: &'static str,
        helpers: Vec<(&'static str, crate::component::Helper)>,
    }

    impl Component for Page {
        fn render(&self) -> String {
            self.source.to_string()
        }

        fn helpers(&self) -> Vec<(&'static str, crate::component::Helper)> {
            self.helpers.clone()
        }
    }

    fn page(source: &'static str) -> Page {
        Page {
            source,
            helpers: Vec::new(),
        }
    }

    fn shout(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
        Ok(Value::String(as_text(value).to_uppercase()))
    }

    #[test]
    fn renders_state_with_escaping() {
        let out = render(&page("<p>{{ text }}</p>"), json!({"text": "<b>&"})).unwrap();
        assert_eq!(out, "<p>&lt;b&gt;&amp;</p>");
    }

    #[test]
    fn raw_and_compo_are_not_escaped() {
        let out = render(
            &page(r#"<div>{{ html | raw }}{{ "app.hello" | compo }}{{ compo(name="world") }}</div>"#),
            json!({"html": "<i>x</i>"}),
        )
        .unwrap();
        assert_eq!(out, "<div><i>x</i><app.hello><world></div>");
    }

    #[test]
    fn time_formats_rfc3339_values() {
        let out = render(
            &page(r#"<p>{{ at | time(layout="%d/%m/%Y") }}</p>"#),
            json!({"at": "2024-03-05T10:00:00Z"}),
        )
        .unwrap();
        assert_eq!(out, "<p>05&#x2F;03&#x2F;2024</p>");

        let err = render(&page("<p>{{ at | time }}</p>"), json!({"at": "yesterday"}));
        assert!(matches!(err, Err(RenderError::Template(_))));
    }

    #[test]
    fn json_serializes_values() {
        let out = render(
            &page(r#"<p data-x="{{ items | json }}"></p>"#),
            json!({"items": [1, 2]}),
        )
        .unwrap();
        assert_eq!(out, r#"<p data-x="[1,2]"></p>"#);
    }

    #[test]
    fn component_helpers_are_registered() {
        let mut p = page("<p>{{ name | shout }}</p>");
        p.helpers.push(("shout", shout));
        let out = render(&p, json!({"name": "max"})).unwrap();
        assert_eq!(out, "<p>MAX</p>");
    }

    #[test]
    fn helpers_may_not_shadow_builtins() {
        let mut p = page("<p></p>");
        p.helpers.push(("raw", shout));
        assert!(matches!(
            render(&p, json!({})),
            Err(RenderError::ReservedHelper(name)) if name == "raw"
        ));
    }

    #[test]
    fn template_errors_surface() {
        assert!(matches!(
            render(&page("<p>{{ missing }}</p>"), json!({})),
            Err(RenderError::Template(_))
        ));
        assert!(matches!(
            render(&page("<p>{% if %}</p>"), json!({})),
            Err(RenderError::Template(_))
        ));
    }
}
