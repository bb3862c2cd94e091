//! Scalar coercion shared by the resolvers.

use bytes::Bytes;
use serde_json::Value;

use crate::error::{ArgumentResolutionError, ResolveResult};
use crate::handler::{ArgumentValue, DeclaredType, ValueKind};

fn mismatch(parameter: &str, value: impl Into<String>, declared: &DeclaredType) -> ArgumentResolutionError {
    ArgumentResolutionError::TypeMismatch {
        parameter: parameter.to_string(),
        value: value.into(),
        expected: declared.type_name,
    }
}

/// Parses `raw` as the declared type.
pub(crate) fn coerce_str(
    raw: &str,
    declared: &DeclaredType,
    parameter: &str,
) -> ResolveResult<ArgumentValue> {
    let err = || mismatch(parameter, raw, declared);

    let value = match declared.kind {
        ValueKind::String => ArgumentValue::String(raw.to_string()),
        ValueKind::Bool => ArgumentValue::Bool(raw.trim().parse().map_err(|_| err())?),
        ValueKind::I32 => ArgumentValue::I32(raw.trim().parse().map_err(|_| err())?),
        ValueKind::I64 => ArgumentValue::I64(raw.trim().parse().map_err(|_| err())?),
        ValueKind::U32 => ArgumentValue::U32(raw.trim().parse().map_err(|_| err())?),
        ValueKind::U64 => ArgumentValue::U64(raw.trim().parse().map_err(|_| err())?),
        ValueKind::F64 => ArgumentValue::F64(raw.trim().parse().map_err(|_| err())?),
        ValueKind::Bytes => ArgumentValue::Bytes(Bytes::copy_from_slice(raw.as_bytes())),
        // A bare word that is not JSON binds as a JSON string.
        ValueKind::Json => ArgumentValue::Json(
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        ),
        ValueKind::Headers | ValueKind::Message => return Err(err()),
    };
    Ok(value)
}

/// Converts a JSON header value to the declared type.
///
/// Numbers and booleans bind directly; strings are parsed.
pub(crate) fn coerce_json(
    value: &Value,
    declared: &DeclaredType,
    parameter: &str,
) -> ResolveResult<ArgumentValue> {
    if let Value::String(s) = value {
        return coerce_str(s, declared, parameter);
    }

    let err = || mismatch(parameter, value.to_string(), declared);

    let coerced = match (declared.kind, value) {
        (ValueKind::Json, v) => ArgumentValue::Json(v.clone()),
        (ValueKind::String, Value::Number(_) | Value::Bool(_)) => {
            ArgumentValue::String(value.to_string())
        }
        (ValueKind::Bool, Value::Bool(b)) => ArgumentValue::Bool(*b),
        (ValueKind::I32, Value::Number(n)) => {
            ArgumentValue::I32(n.as_i64().and_then(|v| i32::try_from(v).ok()).ok_or_else(err)?)
        }
        (ValueKind::I64, Value::Number(n)) => ArgumentValue::I64(n.as_i64().ok_or_else(err)?),
        (ValueKind::U32, Value::Number(n)) => {
            ArgumentValue::U32(n.as_u64().and_then(|v| u32::try_from(v).ok()).ok_or_else(err)?)
        }
        (ValueKind::U64, Value::Number(n)) => ArgumentValue::U64(n.as_u64().ok_or_else(err)?),
        (ValueKind::F64, Value::Number(n)) => ArgumentValue::F64(n.as_f64().ok_or_else(err)?),
        _ => return Err(err()),
    };
    Ok(coerced)
}
