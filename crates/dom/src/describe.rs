//! Explicit member descriptors.
//!
//! A type lists its exported members once, in `Describe::describe`. The resulting
//! `Descriptor` drives both attribute mapping (markup attributes onto fields) and callback
//! resolution (dotted paths onto fields, nested records, list items and methods).
//!
//! Invariants:
//! - Exported names start with an upper-case letter; attribute keys are the lower-cased name.
//! - A method and a field may share a name; resolution prefers the method.
//! - Only record lists are indexable. A plain `Vec` field is an opaque value.

use crate::error::FieldError;
use markup::Attrs;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};

pub trait Describe: Sized + 'static {
    fn describe(d: &mut Descriptor<Self>);
}

/// A value an attribute string can be mapped onto.
///
/// The default conversion parses the attribute as JSON.
pub trait FieldValue: DeserializeOwned + 'static {
    fn from_attr(value: &str) -> Result<Self, String> {
        serde_json::from_str(value).map_err(|e| e.to_string())
    }

    /// Value assigned when the attribute is missing; `None` leaves the field untouched.
    fn when_absent() -> Option<Self> {
        None
    }
}

impl FieldValue for String {
    fn from_attr(value: &str) -> Result<Self, String> {
        Ok(value.to_string())
    }
}

impl FieldValue for bool {
    fn from_attr(value: &str) -> Result<Self, String> {
        match value {
            "" | "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            other => Err(format!("{other:?} is not a boolean")),
        }
    }

    fn when_absent() -> Option<Self> {
        Some(false)
    }
}

/// Parses an integer with an optional sign and `0x`, `0o`, `0b` or leading-`0` base prefix.
fn parse_int(value: &str) -> Result<i128, String> {
    let invalid = || format!("{value:?} is not an integer");
    let (negative, unsigned) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let (radix, digits) = match unsigned.get(..2) {
        Some("0x" | "0X") => (16, &unsigned[2..]),
        Some("0o" | "0O") => (8, &unsigned[2..]),
        Some("0b" | "0B") => (2, &unsigned[2..]),
        _ if unsigned.len() > 1 && unsigned.starts_with('0') => (8, &unsigned[1..]),
        _ => (10, unsigned),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(invalid());
    }
    let magnitude = u128::from_str_radix(digits, radix).map_err(|_| invalid())?;
    let magnitude = i128::try_from(magnitude).map_err(|_| invalid())?;
    Ok(if negative { -magnitude } else { magnitude })
}

macro_rules! int_field_value {
    ($($t:ty),*) => {$(
        impl FieldValue for $t {
            fn from_attr(value: &str) -> Result<Self, String> {
                let n = parse_int(value)?;
                <$t>::try_from(n)
                    .map_err(|_| format!("{value:?} is out of range for {}", stringify!($t)))
            }
        }
    )*};
}

int_field_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! float_field_value {
    ($($t:ty),*) => {$(
        impl FieldValue for $t {
            fn from_attr(value: &str) -> Result<Self, String> {
                value.trim().parse::<$t>().map_err(|e| format!("{value:?}: {e}"))
            }
        }
    )*};
}

float_field_value!(f32, f64);

impl<T: DeserializeOwned + 'static> FieldValue for Vec<T> {}
impl<T: DeserializeOwned + 'static> FieldValue for Option<T> {}
impl<V: DeserializeOwned + 'static> FieldValue for BTreeMap<String, V> {}
impl<V: DeserializeOwned + 'static> FieldValue for HashMap<String, V> {}
impl FieldValue for serde_json::Value {}

/// Argument tuple of a described method, decoded from the callback's JSON payload.
pub trait Args: Sized + 'static {
    const ARITY: usize;
    fn decode(json: &str) -> Result<Self, serde_json::Error>;
}

impl Args for () {
    const ARITY: usize = 0;

    fn decode(_json: &str) -> Result<Self, serde_json::Error> {
        Ok(())
    }
}

impl<A: DeserializeOwned + 'static> Args for (A,) {
    const ARITY: usize = 1;

    fn decode(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<A>(json).map(|a| (a,))
    }
}

impl<A, B> Args for (A, B)
where
    A: DeserializeOwned + 'static,
    B: DeserializeOwned + 'static,
{
    const ARITY: usize = 2;

    fn decode(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl<A, B, C> Args for (A, B, C)
where
    A: DeserializeOwned + 'static,
    B: DeserializeOwned + 'static,
    C: DeserializeOwned + 'static,
{
    const ARITY: usize = 3;

    fn decode(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

pub(crate) type Invocable<'a> = Box<dyn FnOnce() + 'a>;
pub(crate) type Binder<'a> =
    Box<dyn FnOnce(&str) -> Result<Invocable<'a>, serde_json::Error> + 'a>;

/// A value that can be replaced wholesale from JSON.
pub(crate) trait Slot {
    fn any_mut(&mut self) -> &mut dyn Any;
    fn assign_json(&mut self, json: &str) -> Result<(), serde_json::Error>;
}

impl<T: DeserializeOwned + 'static> Slot for T {
    fn any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn assign_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        *self = serde_json::from_str(json)?;
        Ok(())
    }
}

pub(crate) trait ListSlot {
    fn len(&self) -> usize;
    fn item(&mut self, index: usize) -> Option<&mut dyn Slot>;
    fn assign_json(&mut self, json: &str) -> Result<(), serde_json::Error>;
}

impl<U: DeserializeOwned + 'static> ListSlot for Vec<U> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn item(&mut self, index: usize) -> Option<&mut dyn Slot> {
        self.get_mut(index).map(|u| u as &mut dyn Slot)
    }

    fn assign_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        *self = serde_json::from_str(json)?;
        Ok(())
    }
}

/// Where one path segment leads.
pub(crate) enum Step<'a> {
    Method { arity: usize, bind: Binder<'a> },
    Field(&'a mut dyn Slot),
    Record {
        reflect: &'a dyn Reflect,
        value: &'a mut dyn Slot,
    },
    List {
        reflect: &'a dyn Reflect,
        items: &'a mut dyn ListSlot,
    },
}

/// Type-erased view of a `Descriptor`.
pub(crate) trait Reflect {
    fn type_name(&self) -> &'static str;
    fn problems(&self) -> &[String];
    fn map_attrs(&self, target: &mut dyn Any, attrs: &Attrs) -> Result<(), FieldError>;
    fn lookup<'a>(&'a self, target: &'a mut dyn Any, name: &str) -> Option<Step<'a>>;
}

trait MemberAccess<T> {
    fn step<'a>(&'a self, target: &'a mut T) -> Step<'a>;
}

/// A parsed attribute waiting to be written into its field.
type Assign<T> = Box<dyn FnOnce(&mut T)>;

trait AttrMapper<T> {
    /// Converts the attribute; `None` means the field is left untouched.
    fn parse(&self, value: Option<&str>) -> Result<Option<Assign<T>>, String>;
}

struct FieldAccess<T, V> {
    access: fn(&mut T) -> &mut V,
}

impl<T: 'static, V: FieldValue> MemberAccess<T> for FieldAccess<T, V> {
    fn step<'a>(&'a self, target: &'a mut T) -> Step<'a> {
        Step::Field((self.access)(target))
    }
}

impl<T: 'static, V: FieldValue> AttrMapper<T> for FieldAccess<T, V> {
    fn parse(&self, value: Option<&str>) -> Result<Option<Assign<T>>, String> {
        let parsed = match value {
            Some(value) => V::from_attr(value)?,
            None => match V::when_absent() {
                Some(absent) => absent,
                None => return Ok(None),
            },
        };
        let access = self.access;
        Ok(Some(Box::new(move |target: &mut T| *access(target) = parsed)))
    }
}

/// Attribute mapping for record members: the attribute carries JSON.
struct JsonAccess<T, U> {
    access: fn(&mut T) -> &mut U,
}

impl<T: 'static, U: DeserializeOwned + 'static> AttrMapper<T> for JsonAccess<T, U> {
    fn parse(&self, value: Option<&str>) -> Result<Option<Assign<T>>, String> {
        let Some(value) = value else {
            return Ok(None);
        };
        let parsed: U = serde_json::from_str(value).map_err(|e| e.to_string())?;
        let access = self.access;
        Ok(Some(Box::new(move |target: &mut T| *access(target) = parsed)))
    }
}

struct RecordAccess<T, U> {
    access: fn(&mut T) -> &mut U,
    descriptor: Descriptor<U>,
}

impl<T: 'static, U: DeserializeOwned + 'static> MemberAccess<T> for RecordAccess<T, U> {
    fn step<'a>(&'a self, target: &'a mut T) -> Step<'a> {
        Step::Record {
            reflect: &self.descriptor,
            value: (self.access)(target),
        }
    }
}

struct ListAccess<T, U> {
    access: fn(&mut T) -> &mut Vec<U>,
    descriptor: Descriptor<U>,
}

impl<T: 'static, U: DeserializeOwned + 'static> MemberAccess<T> for ListAccess<T, U> {
    fn step<'a>(&'a self, target: &'a mut T) -> Step<'a> {
        Step::List {
            reflect: &self.descriptor,
            items: (self.access)(target),
        }
    }
}

struct MethodAccess<T, A> {
    call: fn(&mut T, A),
}

impl<T: 'static, A: Args> MemberAccess<T> for MethodAccess<T, A> {
    fn step<'a>(&'a self, target: &'a mut T) -> Step<'a> {
        let call = self.call;
        Step::Method {
            arity: A::ARITY,
            bind: Box::new(move |json: &str| {
                let args = A::decode(json)?;
                let invocable: Invocable<'a> = Box::new(move || call(target, args));
                Ok(invocable)
            }),
        }
    }
}

/// Last path segment of a type name without generics, e.g. `Hello` for `app::ui::Hello<T>`.
pub(crate) fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Members of `T` visible to markup attributes and callbacks.
pub struct Descriptor<T> {
    type_name: &'static str,
    attrs: Vec<(String, &'static str, Box<dyn AttrMapper<T>>)>,
    methods: HashMap<&'static str, Box<dyn MemberAccess<T>>>,
    members: HashMap<&'static str, Box<dyn MemberAccess<T>>>,
    problems: Vec<String>,
}

impl<T: Describe> Descriptor<T> {
    pub(crate) fn of() -> Self {
        let mut d = Descriptor {
            type_name: short_type_name::<T>(),
            attrs: Vec::new(),
            methods: HashMap::new(),
            members: HashMap::new(),
            problems: Vec::new(),
        };
        T::describe(&mut d);
        d
    }

    fn check_name(&mut self, name: &'static str, method: bool) {
        if !name.starts_with(|c: char| c.is_uppercase()) {
            self.problems.push(format!(
                "{}: member {name:?} must start with an upper-case letter",
                self.type_name
            ));
        }
        let taken = if method {
            self.methods.contains_key(name)
        } else {
            self.members.contains_key(name)
        };
        if taken {
            self.problems
                .push(format!("{}: member {name:?} is declared twice", self.type_name));
        }
    }

    /// A field mapped from the attribute named after it, lower-cased.
    pub fn field<V: FieldValue>(&mut self, name: &'static str, access: fn(&mut T) -> &mut V) -> &mut Self {
        self.check_name(name, false);
        self.attrs.push((
            name.to_lowercase(),
            name,
            Box::new(FieldAccess { access }),
        ));
        self.members.insert(name, Box::new(FieldAccess { access }));
        self
    }

    /// A nested record whose own members can be reached by callbacks.
    pub fn record<U>(&mut self, name: &'static str, access: fn(&mut T) -> &mut U) -> &mut Self
    where
        U: Describe + DeserializeOwned,
    {
        self.check_name(name, false);
        self.attrs
            .push((name.to_lowercase(), name, Box::new(JsonAccess { access })));
        self.members.insert(
            name,
            Box::new(RecordAccess {
                access,
                descriptor: Descriptor::<U>::of(),
            }),
        );
        self
    }

    /// A list of records; callbacks index it with numeric segments.
    pub fn records<U>(&mut self, name: &'static str, access: fn(&mut T) -> &mut Vec<U>) -> &mut Self
    where
        U: Describe + DeserializeOwned,
    {
        self.check_name(name, false);
        self.attrs
            .push((name.to_lowercase(), name, Box::new(JsonAccess { access })));
        self.members.insert(
            name,
            Box::new(ListAccess {
                access,
                descriptor: Descriptor::<U>::of(),
            }),
        );
        self
    }

    /// A callable member. `A` is `()` or a tuple of JSON-decodable arguments.
    pub fn method<A: Args>(&mut self, name: &'static str, call: fn(&mut T, A)) -> &mut Self {
        self.check_name(name, true);
        self.methods.insert(name, Box::new(MethodAccess { call }));
        self
    }
}

impl<T: 'static> Reflect for Descriptor<T> {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn problems(&self) -> &[String] {
        &self.problems
    }

    fn map_attrs(&self, target: &mut dyn Any, attrs: &Attrs) -> Result<(), FieldError> {
        let Some(target) = target.downcast_mut::<T>() else {
            return Err(FieldError {
                field: String::new(),
                value: String::new(),
                reason: format!("target is not a {}", self.type_name),
            });
        };
        // Every attribute converts before any field is written.
        let mut pending = Vec::with_capacity(self.attrs.len());
        for (key, name, mapper) in &self.attrs {
            let value = attrs.get(key).map(String::as_str);
            let assign = mapper.parse(value).map_err(|reason| FieldError {
                field: (*name).to_string(),
                value: value.unwrap_or_default().to_string(),
                reason,
            })?;
            pending.extend(assign);
        }
        for assign in pending {
            assign(&mut *target);
        }
        Ok(())
    }

    fn lookup<'a>(&'a self, target: &'a mut dyn Any, name: &str) -> Option<Step<'a>> {
        let target = target.downcast_mut::<T>()?;
        let access = self.methods.get(name).or_else(|| self.members.get(name))?;
        Some(access.step(target))
    }
}
