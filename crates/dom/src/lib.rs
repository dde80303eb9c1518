//! Live component tree.
//!
//! Components render templates; the engine decodes the output, keeps a node registry in
//! step with it and emits ordered change batches for a renderer to replay.

mod change;
mod component;
mod config;
mod describe;
mod engine;
mod error;
mod mapping;
mod mirror;
mod node;
mod registry;
mod sync;
mod template;

pub use change::{Action, Change, WireError};
pub use component::{AsAny, Component, ComponentRef, Helper, Subscription, ZeroComponent, component_ref};
pub use config::EngineConfig;
pub use describe::{Args, Describe, Descriptor, FieldValue};
pub use engine::Engine;
pub use error::{BoxError, CallbackError, ConfigError, Error, FieldError, RenderError};
pub use mapping::{Mapping, pipeline};
pub use mirror::{Mirror, MirrorError, MirrorNode};
pub use node::{Node, NodeId};
pub use registry::Registry;
pub use sync::{Discard, SyncHook};
pub use template::BUILTIN_HELPERS;

pub use markup;
