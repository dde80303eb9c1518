use thiserror::Error;

/// Error type returned by a sync hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the engine and its registry.
#[derive(Debug, Error)]
pub enum Error {
    #[error("decoding {component} failed: {source}")]
    Decode {
        component: String,
        #[source]
        source: RenderError,
    },
    #[error("component {0:?} is not registered")]
    UnknownComponent(String),
    #[error("mapping attributes onto {component} failed: {source}")]
    FieldMapping {
        component: String,
        #[source]
        source: FieldError,
    },
    #[error(transparent)]
    CallbackResolution(#[from] CallbackError),
    #[error("syncing changes failed: {0}")]
    Sync(#[source] BoxError),
    #[error("{0}")]
    Structural(String),
    #[error("not mounted: {0}")]
    NotMounted(String),
}

/// Failures while turning a component into a tag tree.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Markup(#[from] markup::DecodeError),
    #[error("template: {0}")]
    Template(#[from] tera::Error),
    #[error("helper {0:?} collides with a built-in helper")]
    ReservedHelper(String),
    #[error("serializing state: {0}")]
    State(#[from] serde_json::Error),
}

/// An attribute value that could not be converted into its field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {field}: cannot map {value:?}: {reason}")]
pub struct FieldError {
    pub field: String,
    pub value: String,
    pub reason: String,
}

/// A callback target that could not be resolved or invoked.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("empty callback target")]
    Empty,
    #[error("{path:?}: empty segment")]
    EmptySegment { path: String },
    #[error("{path:?}: {segment:?} is not exported")]
    Unexported { path: String, segment: String },
    #[error("{path:?}: {type_name} has no field or method {segment:?}")]
    NoMember {
        path: String,
        segment: String,
        type_name: &'static str,
    },
    #[error("{path:?}: {segment:?} is reached through a plain value")]
    NotNavigable { path: String, segment: String },
    #[error("{path:?}: {segment:?} is not a list index")]
    NotAnIndex { path: String, segment: String },
    #[error("{path:?}: index {index} is out of range for length {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
    #[error("{path:?}: a method must be the last segment")]
    TrailingSegments { path: String },
    #[error("{path:?}: methods taking {arity} arguments are not supported")]
    TooManyArguments { path: String, arity: usize },
    #[error("{path:?}: invalid JSON value: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing engine config: {0}")]
    Parse(#[from] toml::de::Error),
}
