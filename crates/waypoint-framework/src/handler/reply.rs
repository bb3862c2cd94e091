//! Handler return values.
//!
//! Anything a handler returns is turned into an optional [`Reply`] through
//! [`IntoReply`]. `()` and `None` produce no reply; `Err` becomes an
//! [`InvocationError`] and nothing is forwarded.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use waypoint_core::Payload;

use super::binding::Json;
use crate::error::{BoxError, InvocationError};

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";

/// An encoded return value, ready to be wrapped in an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub payload: Payload,
    pub content_type: Option<String>,
}

impl Reply {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn text(body: String) -> Self {
        Self::new(body).with_content_type(TEXT_PLAIN)
    }
}

/// Converts a handler's return value into an optional reply.
pub trait IntoReply {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError>;
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        Ok(None)
    }
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        Ok(Some(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        Ok(Some(Reply::text(self)))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        Ok(Some(Reply::new(self).with_content_type(TEXT_PLAIN)))
    }
}

impl IntoReply for Payload {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        Ok(Some(Reply::new(self)))
    }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        Ok(Some(Reply::new(self)))
    }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        Ok(Some(Reply::new(self)))
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        let body = serde_json::to_vec(&self).map_err(InvocationError::new)?;
        Ok(Some(Reply::new(body).with_content_type(APPLICATION_JSON)))
    }
}

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        let body = serde_json::to_vec(&self.0).map_err(InvocationError::new)?;
        Ok(Some(Reply::new(body).with_content_type(APPLICATION_JSON)))
    }
}

macro_rules! impl_into_reply_display {
    ($($ty:ty),*) => {
        $(
            impl IntoReply for $ty {
                fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
                    Ok(Some(Reply::text(self.to_string())))
                }
            }
        )*
    };
}

impl_into_reply_display!(bool, i32, i64, u32, u64, f64);

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        match self {
            Some(inner) => inner.into_reply(),
            None => Ok(None),
        }
    }
}

impl<T: IntoReply, E: Into<BoxError>> IntoReply for Result<T, E> {
    fn into_reply(self) -> Result<Option<Reply>, InvocationError> {
        match self {
            Ok(inner) => inner.into_reply(),
            Err(e) => Err(InvocationError::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_and_none_produce_nothing() {
        assert!(().into_reply().unwrap().is_none());
        assert!(None::<String>.into_reply().unwrap().is_none());
    }

    #[test]
    fn test_text_reply() {
        let reply = "hello".to_string().into_reply().unwrap().unwrap();
        assert_eq!(reply.payload.as_str(), Some("hello"));
        assert_eq!(reply.content_type.as_deref(), Some(TEXT_PLAIN));

        let reply = 42_i64.into_reply().unwrap().unwrap();
        assert_eq!(reply.payload.as_str(), Some("42"));
    }

    #[test]
    fn test_json_reply() {
        #[derive(Serialize)]
        struct Out {
            ok: bool,
        }

        let reply = Json(Out { ok: true }).into_reply().unwrap().unwrap();
        assert_eq!(reply.payload.as_str(), Some(r#"{"ok":true}"#));
        assert_eq!(reply.content_type.as_deref(), Some(APPLICATION_JSON));
    }

    #[test]
    fn test_err_becomes_invocation_error() {
        let result: Result<String, std::io::Error> = Err(std::io::Error::other("boom"));
        let err = result.into_reply().unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }
}
