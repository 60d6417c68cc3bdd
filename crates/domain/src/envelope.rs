use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ErrorCode};

/// The user-visible response envelope: exactly one of `data` or
/// `error_code` is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error_code: None,
            error_msg: None,
        }
    }

    pub fn err(error: CoreError) -> Self {
        Self {
            data: None,
            error_code: Some(error.code),
            error_msg: Some(error.message),
        }
    }
}

impl<T> From<crate::error::Result<T>> for Envelope<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(v) => Envelope::ok(v),
            Err(e) => Envelope::err(e),
        }
    }
}
