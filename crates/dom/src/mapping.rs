//! Callback resolution: routing a renderer event to a component member.
//!
//! A `Mapping` names a mounted component and a dotted path such as `Actions.2.Run`.
//! Segments walk exported fields, nested records and record-list indices; the last
//! segment is either a method (invoked later, once resolution succeeded) or a value
//! (assigned immediately from the JSON payload).

use crate::describe::{Invocable, Reflect, Step};
use crate::error::CallbackError;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Event routing record sent back by the renderer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(rename = "CompoID")]
    pub compo_id: String,
    #[serde(rename = "FieldOrMethod")]
    pub field_or_method: String,
    #[serde(rename = "JSONValue", default)]
    pub json_value: String,
    #[serde(rename = "Override", default, skip_serializing_if = "String::is_empty")]
    pub override_event: String,
}

impl Mapping {
    pub fn new(
        compo_id: impl Into<String>,
        field_or_method: impl Into<String>,
        json_value: impl Into<String>,
    ) -> Self {
        Mapping {
            compo_id: compo_id.into(),
            field_or_method: field_or_method.into(),
            json_value: json_value.into(),
            override_event: String::new(),
        }
    }
}

/// Splits a dotted target into its segments.
pub fn pipeline(target: &str) -> Result<Vec<&str>, CallbackError> {
    if target.is_empty() {
        return Err(CallbackError::Empty);
    }
    let segments: Vec<&str> = target.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(CallbackError::EmptySegment {
            path: target.to_string(),
        });
    }
    Ok(segments)
}

enum Cursor<'a> {
    Root(&'a dyn Reflect, &'a mut dyn Any),
    At(Step<'a>),
}

fn member<'a>(
    reflect: &'a dyn Reflect,
    target: &'a mut dyn Any,
    segment: &str,
    path: &str,
) -> Result<Step<'a>, CallbackError> {
    if segment.starts_with(|c: char| c.is_lowercase()) {
        return Err(CallbackError::Unexported {
            path: path.to_string(),
            segment: segment.to_string(),
        });
    }
    reflect
        .lookup(target, segment)
        .ok_or_else(|| CallbackError::NoMember {
            path: path.to_string(),
            segment: segment.to_string(),
            type_name: reflect.type_name(),
        })
}

/// Resolves `path` against `target`.
///
/// Returns the method call to make, or `None` when the path ended on a value, which has
/// already been assigned from `json`.
pub(crate) fn resolve<'a>(
    reflect: &'a dyn Reflect,
    target: &'a mut dyn Any,
    path: &str,
    json: &str,
) -> Result<Option<Invocable<'a>>, CallbackError> {
    let segments = pipeline(path)?;
    let json_error = |source| CallbackError::Json {
        path: path.to_string(),
        source,
    };

    let mut cursor = Cursor::Root(reflect, target);
    for segment in segments {
        cursor = match cursor {
            Cursor::Root(reflect, target) => Cursor::At(member(reflect, target, segment, path)?),
            Cursor::At(Step::Record { reflect, value }) => {
                Cursor::At(member(reflect, value.any_mut(), segment, path)?)
            }
            Cursor::At(Step::List { reflect, items }) => {
                let index: usize = segment.parse().map_err(|_| CallbackError::NotAnIndex {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })?;
                let len = items.len();
                let value = items
                    .item(index)
                    .ok_or_else(|| CallbackError::IndexOutOfRange {
                        path: path.to_string(),
                        index,
                        len,
                    })?;
                Cursor::At(Step::Record { reflect, value })
            }
            Cursor::At(Step::Field(_)) => {
                return Err(CallbackError::NotNavigable {
                    path: path.to_string(),
                    segment: segment.to_string(),
                });
            }
            Cursor::At(Step::Method { .. }) => {
                return Err(CallbackError::TrailingSegments {
                    path: path.to_string(),
                });
            }
        };
    }

    match cursor {
        Cursor::Root(..) => Err(CallbackError::Empty),
        Cursor::At(Step::Method { arity: 0, bind }) => bind("null").map(Some).map_err(json_error),
        Cursor::At(Step::Method { arity: 1, bind }) => bind(json).map(Some).map_err(json_error),
        Cursor::At(Step::Method { arity, .. }) => Err(CallbackError::TooManyArguments {
            path: path.to_string(),
            arity,
        }),
        Cursor::At(Step::Field(slot)) | Cursor::At(Step::Record { value: slot, .. }) => {
            slot.assign_json(json).map_err(json_error)?;
            Ok(None)
        }
        Cursor::At(Step::List { items, .. }) => {
            items.assign_json(json).map_err(json_error)?;
            Ok(None)
        }
    }
}
