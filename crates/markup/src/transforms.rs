//! Attribute transforms applied by the decoder.
//!
//! A transform maps `(name, value)` to a new `(name, value)`. Transforms run in the order
//! they were added, each one seeing the output of the previous.

/// Boxed attribute transform.
pub type AttrTransform = Box<dyn Fn(String, String) -> (String, String)>;

const HANDLER_CALL: &str = "callCompoHandler";
const JS_PREFIX: &str = "js:";
const COMPONENT_SCHEME: &str = "compo";

/// Rewrites `on*` attributes into a call routing the event back to the owning component.
///
/// Values prefixed with `js:` are left alone so raw script handlers stay possible.
pub fn event_handler(name: String, value: String) -> (String, String) {
    if !name.starts_with("on") || value.starts_with(JS_PREFIX) {
        return (name, value);
    }
    let value = format!("{HANDLER_CALL}(this, event, '{value}')");
    (name, value)
}

/// Rewrites scheme-less `href` values into component URLs (`compo:///path`).
pub fn href_component(name: String, value: String) -> (String, String) {
    if name != "href" || has_scheme(&value) {
        return (name, value);
    }
    if value.starts_with("//") {
        return (name, format!("{COMPONENT_SCHEME}:{value}"));
    }
    let split = value.find(['?', '#']).unwrap_or(value.len());
    let (path, rest) = value.split_at(split);
    let value = match path {
        "" => format!("{COMPONENT_SCHEME}:{rest}"),
        p if p.starts_with('/') => format!("{COMPONENT_SCHEME}://{p}{rest}"),
        p => format!("{COMPONENT_SCHEME}:///{p}{rest}"),
    };
    (name, value)
}

fn has_scheme(value: &str) -> bool {
    let Some(colon) = value.find(':') else {
        return false;
    };
    let scheme = &value[..colon];
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
