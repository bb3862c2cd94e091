//! Typed argument values.
//!
//! Resolvers produce untyped [`ArgumentValue`]s; the handler invoker then
//! turns each one back into the declared Rust type through [`BindingType`].

use std::ops::{Deref, DerefMut};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use waypoint_core::{Message, MessageHeaders, Payload};

use super::parameter::{DeclaredType, ValueKind};
use crate::error::ArgumentResolutionError;

/// A resolved argument before conversion to its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    /// An absent optional value.
    Null,
    String(String),
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F64(f64),
    Headers(MessageHeaders),
    Message(Message),
    Bytes(Bytes),
    Json(Value),
}

impl ArgumentValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => ValueKind::String.name(),
            Self::Bool(_) => ValueKind::Bool.name(),
            Self::I32(_) => ValueKind::I32.name(),
            Self::I64(_) => ValueKind::I64.name(),
            Self::U32(_) => ValueKind::U32.name(),
            Self::U64(_) => ValueKind::U64.name(),
            Self::F64(_) => ValueKind::F64.name(),
            Self::Headers(_) => ValueKind::Headers.name(),
            Self::Message(_) => ValueKind::Message.name(),
            Self::Bytes(_) => ValueKind::Bytes.name(),
            Self::Json(_) => ValueKind::Json.name(),
        }
    }
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug)]
struct Slot {
    label: String,
    value: Option<ArgumentValue>,
}

/// The bound arguments for one invocation, in declaration order.
///
/// Allocated fresh for every dispatched message.
#[derive(Debug, Default)]
pub struct Arguments {
    slots: Vec<Slot>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Appends the next argument.
    pub fn push(&mut self, label: impl Into<String>, value: ArgumentValue) {
        self.slots.push(Slot {
            label: label.into(),
            value: Some(value),
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrows the raw value at `index`, if still present.
    pub fn get(&self, index: usize) -> Option<&ArgumentValue> {
        self.slots.get(index).and_then(|s| s.value.as_ref())
    }

    /// Moves the value at `index` out and converts it to `T`.
    pub fn take<T: BindingType>(&mut self, index: usize) -> Result<T, ArgumentResolutionError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(ArgumentResolutionError::Unbound { index })?;
        let value = slot
            .value
            .take()
            .ok_or(ArgumentResolutionError::Unbound { index })?;

        T::from_argument(value).map_err(|reason| ArgumentResolutionError::Conversion {
            parameter: slot.label.clone(),
            expected: T::declared_type().type_name,
            reason,
        })
    }
}

// =============================================================================
// BindingType
// =============================================================================

/// A Rust type that a handler parameter can be declared as.
pub trait BindingType: Sized {
    /// Describes the type for resolver selection.
    fn declared_type() -> DeclaredType;

    /// Converts a resolved value into `Self`.
    fn from_argument(value: ArgumentValue) -> Result<Self, String>;
}

fn mismatch<T>(expected: &str, value: &ArgumentValue) -> Result<T, String> {
    Err(format!("expected {expected}, got {}", value.kind_name()))
}

macro_rules! impl_binding_type {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl BindingType for $ty {
                fn declared_type() -> DeclaredType {
                    DeclaredType::new(ValueKind::$kind, stringify!($ty))
                }

                fn from_argument(value: ArgumentValue) -> Result<Self, String> {
                    match value {
                        ArgumentValue::$kind(v) => Ok(v),
                        other => mismatch(stringify!($ty), &other),
                    }
                }
            }
        )*
    };
}

impl_binding_type!(
    String => String,
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f64 => F64,
    MessageHeaders => Headers,
    Message => Message,
    Bytes => Bytes,
    Value => Json,
);

impl BindingType for Vec<u8> {
    fn declared_type() -> DeclaredType {
        DeclaredType::new(ValueKind::Bytes, "Vec<u8>")
    }

    fn from_argument(value: ArgumentValue) -> Result<Self, String> {
        match value {
            ArgumentValue::Bytes(b) => Ok(b.to_vec()),
            other => mismatch("Vec<u8>", &other),
        }
    }
}

impl BindingType for Payload {
    fn declared_type() -> DeclaredType {
        DeclaredType::new(ValueKind::Bytes, "Payload")
    }

    fn from_argument(value: ArgumentValue) -> Result<Self, String> {
        match value {
            ArgumentValue::Bytes(b) => Ok(Payload::from(b)),
            other => mismatch("Payload", &other),
        }
    }
}

impl<T: BindingType> BindingType for Option<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType {
            optional: true,
            ..T::declared_type()
        }
    }

    fn from_argument(value: ArgumentValue) -> Result<Self, String> {
        match value {
            ArgumentValue::Null => Ok(None),
            other => T::from_argument(other).map(Some),
        }
    }
}

// =============================================================================
// Json
// =============================================================================

/// A parameter or return value carried as JSON.
///
/// As a parameter, the payload (or header) is deserialized into `T`. As a
/// return value, `T` is serialized and sent with `application/json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Json<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: DeserializeOwned> BindingType for Json<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::new(ValueKind::Json, std::any::type_name::<T>())
    }

    fn from_argument(value: ArgumentValue) -> Result<Self, String> {
        match value {
            ArgumentValue::Json(v) => serde_json::from_value(v).map(Json).map_err(|e| e.to_string()),
            other => mismatch("JSON", &other),
        }
    }
}
