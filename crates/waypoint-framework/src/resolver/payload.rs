//! Payload binding and conversion.

use std::sync::Arc;

use waypoint_core::{Message, MessageHeaders, Payload};

use super::ArgumentResolver;
use super::coerce::coerce_str;
use crate::error::{ArgumentResolutionError, ResolveResult};
use crate::handler::{ArgumentValue, DeclaredType, ParameterDescriptor, ResolutionKind, ValueKind};
use crate::matcher::PathVariables;

/// Turns a raw payload into a parameter value.
pub trait PayloadConverter: Send + Sync {
    /// Returns `true` if this converter can produce `declared`.
    fn can_convert(&self, declared: &DeclaredType) -> bool;

    /// Converts `payload` for `param`.
    fn convert(
        &self,
        payload: &Payload,
        headers: &MessageHeaders,
        param: &ParameterDescriptor,
    ) -> ResolveResult<ArgumentValue>;
}

/// The built-in conversions: bytes pass through, text must be UTF-8, scalars
/// are parsed from the text, and JSON is decoded with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPayloadConverter;

impl PayloadConverter for DefaultPayloadConverter {
    fn can_convert(&self, declared: &DeclaredType) -> bool {
        !matches!(declared.kind, ValueKind::Headers | ValueKind::Message)
    }

    fn convert(
        &self,
        payload: &Payload,
        _headers: &MessageHeaders,
        param: &ParameterDescriptor,
    ) -> ResolveResult<ArgumentValue> {
        let declared = &param.declared_type;
        let conversion = |reason: String| ArgumentResolutionError::Conversion {
            parameter: param.label(),
            expected: declared.type_name,
            reason,
        };

        match declared.kind {
            ValueKind::Bytes => Ok(ArgumentValue::Bytes(payload.to_bytes())),
            ValueKind::Json => serde_json::from_slice(payload.as_bytes())
                .map(ArgumentValue::Json)
                .map_err(|e| conversion(e.to_string())),
            kind if kind.is_scalar() => {
                let text = payload
                    .as_str()
                    .ok_or_else(|| conversion("payload is not valid UTF-8".to_string()))?;
                coerce_str(text, declared, &param.label())
            }
            kind => Err(conversion(format!("cannot convert a payload to {kind}"))),
        }
    }
}

/// Binds the message payload through a [`PayloadConverter`].
#[derive(Clone)]
pub struct PayloadResolver {
    converter: Arc<dyn PayloadConverter>,
}

impl PayloadResolver {
    pub fn new(converter: Arc<dyn PayloadConverter>) -> Self {
        Self { converter }
    }
}

impl Default for PayloadResolver {
    fn default() -> Self {
        Self::new(Arc::new(DefaultPayloadConverter))
    }
}

impl ArgumentResolver for PayloadResolver {
    fn name(&self) -> &'static str {
        "payload"
    }

    fn supports(&self, param: &ParameterDescriptor) -> bool {
        matches!(param.kind, ResolutionKind::Payload { .. })
            && self.converter.can_convert(&param.declared_type)
    }

    fn resolve(
        &self,
        param: &ParameterDescriptor,
        message: &Message,
        _variables: &PathVariables,
    ) -> ResolveResult<ArgumentValue> {
        let required = matches!(param.kind, ResolutionKind::Payload { required: true });

        if message.payload().is_empty() {
            if param.declared_type.optional || !required {
                return Ok(ArgumentValue::Null);
            }
            return Err(ArgumentResolutionError::MissingPayload {
                parameter: param.label(),
            });
        }

        self.converter
            .convert(message.payload(), message.headers(), param)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::handler::Json;

    fn with_payload(body: &'static str) -> Message {
        Message::builder().payload(body).build()
    }

    fn resolve(param: ParameterDescriptor, message: &Message) -> ResolveResult<ArgumentValue> {
        PayloadResolver::default().resolve(&param, message, &PathVariables::new())
    }

    #[test]
    fn test_text_and_bytes() {
        let msg = with_payload("hello");
        assert_eq!(
            resolve(ParameterDescriptor::payload::<String>(), &msg).unwrap(),
            ArgumentValue::String("hello".into())
        );
        assert_eq!(
            resolve(ParameterDescriptor::payload::<Vec<u8>>(), &msg).unwrap(),
            ArgumentValue::Bytes(bytes::Bytes::from_static(b"hello"))
        );
    }

    #[test]
    fn test_scalar_payload() {
        assert_eq!(
            resolve(ParameterDescriptor::payload::<u64>(), &with_payload("42")).unwrap(),
            ArgumentValue::U64(42)
        );
    }

    #[test]
    fn test_json_payload() {
        let msg = with_payload(r#"{"name":"x"}"#);
        assert_eq!(
            resolve(ParameterDescriptor::payload::<Json<serde_json::Value>>(), &msg).unwrap(),
            ArgumentValue::Json(json!({ "name": "x" }))
        );

        let bad = with_payload("{not json");
        assert!(matches!(
            resolve(ParameterDescriptor::payload::<Json<serde_json::Value>>(), &bad),
            Err(ArgumentResolutionError::Conversion { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let msg = Message::builder().payload(vec![0xff, 0xfe]).build();
        assert!(matches!(
            resolve(ParameterDescriptor::payload::<String>(), &msg),
            Err(ArgumentResolutionError::Conversion { .. })
        ));
    }

    #[test]
    fn test_empty_payload() {
        let empty = Message::default();
        assert!(matches!(
            resolve(ParameterDescriptor::payload::<i32>(), &empty),
            Err(ArgumentResolutionError::MissingPayload { .. })
        ));
        assert_eq!(
            resolve(ParameterDescriptor::payload::<Option<i32>>(), &empty).unwrap(),
            ArgumentValue::Null
        );
        assert!(matches!(
            resolve(ParameterDescriptor::payload::<String>(), &empty),
            Err(ArgumentResolutionError::MissingPayload { .. })
        ));
    }

    #[test]
    fn test_headers_not_convertible() {
        assert!(
            !PayloadResolver::default()
                .supports(&ParameterDescriptor::payload::<waypoint_core::MessageHeaders>())
        );
    }
}
