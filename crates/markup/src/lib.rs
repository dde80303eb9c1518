//! Markup decoding for component templates.
//!
//! Turns the text produced by rendering a component template into a `Tag` tree with
//! elements, text and component references told apart.

pub mod decoder;
pub mod elements;
mod entities;
mod error;
pub mod svg;
pub mod tokenizer;
pub mod transforms;
mod types;

pub use decoder::{Decoder, decode};
pub use error::DecodeError;
pub use svg::{Namespace, SVG_NAMESPACE};
pub use tokenizer::tokenize;
pub use transforms::{AttrTransform, event_handler, href_component};
pub use types::{Attrs, Tag, Token};
