//! Parameter descriptors.
//!
//! A [`ParameterDescriptor`] is built once per handler parameter when the
//! handler method is declared. It records how the argument is to be resolved
//! ([`ResolutionKind`]) and what Rust type it must end up as
//! ([`DeclaredType`]), so dispatch never inspects types at runtime.

use std::fmt;

use super::binding::BindingType;

/// The closed set of value shapes a parameter can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Bool,
    I32,
    I64,
    U32,
    U64,
    F64,
    /// The full header map.
    Headers,
    /// The whole inbound message.
    Message,
    /// Raw payload bytes.
    Bytes,
    /// A structured JSON value.
    Json,
}

impl ValueKind {
    /// Returns `true` for kinds that can be parsed from a single string.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Self::String | Self::Bool | Self::I32 | Self::I64 | Self::U32 | Self::U64 | Self::F64
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F64 => "f64",
            Self::Headers => "headers",
            Self::Message => "message",
            Self::Bytes => "bytes",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The declared Rust type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredType {
    pub kind: ValueKind,
    /// `true` for `Option<T>` parameters.
    pub optional: bool,
    /// The Rust type name, for error messages.
    pub type_name: &'static str,
}

impl DeclaredType {
    pub const fn new(kind: ValueKind, type_name: &'static str) -> Self {
        Self {
            kind,
            optional: false,
            type_name,
        }
    }

    /// Returns the declared type of `T`.
    pub fn of<T: BindingType>() -> Self {
        T::declared_type()
    }
}

/// How a parameter's value is obtained from an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionKind {
    /// A single named header.
    Header {
        name: String,
        required: bool,
        default_value: Option<String>,
    },
    /// The full header map.
    Headers,
    /// A variable captured by the matched pattern.
    PathVariable { name: String },
    /// The message body.
    Payload { required: bool },
    /// The whole inbound message.
    Message,
}

impl ResolutionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Header { .. } => "header",
            Self::Headers => "headers",
            Self::PathVariable { .. } => "path variable",
            Self::Payload { .. } => "payload",
            Self::Message => "message",
        }
    }
}

/// Everything the framework needs to bind one handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Position in the handler's parameter list.
    pub index: usize,
    /// The parameter name, if known.
    pub name: Option<String>,
    pub declared_type: DeclaredType,
    pub kind: ResolutionKind,
}

impl ParameterDescriptor {
    fn new<T: BindingType>(kind: ResolutionKind) -> Self {
        Self {
            index: 0,
            name: None,
            declared_type: T::declared_type(),
            kind,
        }
    }

    /// Binds to the header `name`. The header is required unless `T` is an
    /// `Option` or a default is set.
    pub fn header<T: BindingType>(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new::<T>(ResolutionKind::Header {
            name: name.clone(),
            required: true,
            default_value: None,
        })
        .named(name)
    }

    /// Binds to the full header map.
    pub fn headers<T: BindingType>() -> Self {
        Self::new::<T>(ResolutionKind::Headers)
    }

    /// Binds to the path variable `name`.
    pub fn path_variable<T: BindingType>(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new::<T>(ResolutionKind::PathVariable { name: name.clone() }).named(name)
    }

    /// Binds to the message payload.
    pub fn payload<T: BindingType>() -> Self {
        Self::new::<T>(ResolutionKind::Payload { required: true })
    }

    /// Chooses a binding from the type alone: header maps bind to all
    /// headers, messages to the whole message, anything else to the payload.
    pub fn inferred<T: BindingType>(name: impl Into<String>) -> Self {
        let kind = match T::declared_type().kind {
            ValueKind::Headers => ResolutionKind::Headers,
            ValueKind::Message => ResolutionKind::Message,
            _ => ResolutionKind::Payload { required: true },
        };
        Self::new::<T>(kind).named(name)
    }

    /// Sets the parameter name used in error messages.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the literal used when a header is absent. Ignored for other kinds.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        if let ResolutionKind::Header { default_value, .. } = &mut self.kind {
            *default_value = Some(value.into());
        }
        self
    }

    /// Sets whether a header or payload must be present.
    pub fn required(mut self, value: bool) -> Self {
        match &mut self.kind {
            ResolutionKind::Header { required, .. } | ResolutionKind::Payload { required } => {
                *required = value;
            }
            _ => {}
        }
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Returns the name, or `#index` when unnamed.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.index),
        }
    }
}
