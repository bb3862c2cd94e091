//! Header-backed resolvers.

use waypoint_core::Message;

use super::ArgumentResolver;
use super::coerce::{coerce_json, coerce_str};
use crate::error::{ArgumentResolutionError, ResolveResult};
use crate::handler::{ArgumentValue, ParameterDescriptor, ResolutionKind, ValueKind};
use crate::matcher::PathVariables;

/// Binds a single named header.
///
/// An absent (or JSON `null`) header falls back to the configured default.
/// Without a default, a required non-`Option` parameter fails with
/// [`ArgumentResolutionError::MissingHeader`]; otherwise it binds as `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderResolver;

impl ArgumentResolver for HeaderResolver {
    fn name(&self) -> &'static str {
        "header"
    }

    fn supports(&self, param: &ParameterDescriptor) -> bool {
        matches!(param.kind, ResolutionKind::Header { .. })
            && (param.declared_type.kind.is_scalar()
                || matches!(param.declared_type.kind, ValueKind::Json | ValueKind::Bytes))
    }

    fn resolve(
        &self,
        param: &ParameterDescriptor,
        message: &Message,
        _variables: &PathVariables,
    ) -> ResolveResult<ArgumentValue> {
        let ResolutionKind::Header {
            name,
            required,
            default_value,
        } = &param.kind
        else {
            return Err(ArgumentResolutionError::Unbound { index: param.index });
        };

        let label = param.label();
        match message.headers().get(name).filter(|v| !v.is_null()) {
            Some(value) => coerce_json(value, &param.declared_type, &label),
            None => match default_value {
                Some(default) => coerce_str(default, &param.declared_type, &label),
                None if *required && !param.declared_type.optional => {
                    Err(ArgumentResolutionError::MissingHeader { name: name.clone() })
                }
                None => Ok(ArgumentValue::Null),
            },
        }
    }
}

/// Binds the full header map.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadersResolver;

impl ArgumentResolver for HeadersResolver {
    fn name(&self) -> &'static str {
        "headers"
    }

    fn supports(&self, param: &ParameterDescriptor) -> bool {
        param.kind == ResolutionKind::Headers && param.declared_type.kind == ValueKind::Headers
    }

    fn resolve(
        &self,
        _param: &ParameterDescriptor,
        message: &Message,
        _variables: &PathVariables,
    ) -> ResolveResult<ArgumentValue> {
        Ok(ArgumentValue::Headers(message.headers().clone()))
    }
}

/// Binds the whole inbound message.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageResolver;

impl ArgumentResolver for MessageResolver {
    fn name(&self) -> &'static str {
        "message"
    }

    fn supports(&self, param: &ParameterDescriptor) -> bool {
        param.kind == ResolutionKind::Message && param.declared_type.kind == ValueKind::Message
    }

    fn resolve(
        &self,
        _param: &ParameterDescriptor,
        message: &Message,
        _variables: &PathVariables,
    ) -> ResolveResult<ArgumentValue> {
        Ok(ArgumentValue::Message(message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use waypoint_core::MessageHeaders;

    use super::*;

    fn message() -> Message {
        Message::builder()
            .destination("/headers")
            .header("foo", "bar")
            .header("count", 3)
            .header("nothing", serde_json::Value::Null)
            .build()
    }

    fn resolve(param: ParameterDescriptor) -> ResolveResult<ArgumentValue> {
        HeaderResolver.resolve(&param, &message(), &PathVariables::new())
    }

    #[test]
    fn test_named_header() {
        assert_eq!(
            resolve(ParameterDescriptor::header::<String>("foo")).unwrap(),
            ArgumentValue::String("bar".into())
        );
        assert_eq!(
            resolve(ParameterDescriptor::header::<u32>("count")).unwrap(),
            ArgumentValue::U32(3)
        );
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            resolve(ParameterDescriptor::header::<String>("absent")).unwrap_err(),
            ArgumentResolutionError::MissingHeader {
                name: "absent".into()
            }
        );
        // A JSON null counts as absent.
        assert!(resolve(ParameterDescriptor::header::<String>("nothing")).is_err());
    }

    #[test]
    fn test_missing_header_with_default_or_option() {
        assert_eq!(
            resolve(ParameterDescriptor::header::<i64>("absent").default_value("9")).unwrap(),
            ArgumentValue::I64(9)
        );
        assert_eq!(
            resolve(ParameterDescriptor::header::<Option<String>>("absent")).unwrap(),
            ArgumentValue::Null
        );
    }

    #[test]
    fn test_supports() {
        assert!(HeaderResolver.supports(&ParameterDescriptor::header::<i32>("a")));
        assert!(!HeaderResolver.supports(&ParameterDescriptor::header::<MessageHeaders>("a")));
        assert!(!HeaderResolver.supports(&ParameterDescriptor::payload::<String>()));
        assert!(HeadersResolver.supports(&ParameterDescriptor::headers::<MessageHeaders>()));
        assert!(!HeadersResolver.supports(&ParameterDescriptor::headers::<String>()));
    }

    #[test]
    fn test_headers_map() {
        let param = ParameterDescriptor::headers::<MessageHeaders>();
        let ArgumentValue::Headers(headers) = HeadersResolver
            .resolve(&param, &message(), &PathVariables::new())
            .unwrap()
        else {
            panic!("expected headers");
        };
        assert_eq!(headers.get("foo"), Some(&json!("bar")));
    }
}
