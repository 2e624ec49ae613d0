//! Error types for the inference core.
//!
//! Analysis never fails on unsupported constructs; those degrade to
//! [`NativeType::Unknown`](crate::types::NativeType::Unknown). The variants
//! here cover the edges of the library: parsing source text and lookups by
//! name made by callers.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ZythError {
    #[error("Python parse error: {message}")]
    Parse { message: String },

    #[error("function `{name}` is not defined in this compilation unit")]
    FunctionNotFound { name: String },
}

impl ZythError {
    pub fn parse(message: impl Into<String>) -> Self {
        ZythError::Parse {
            message: message.into(),
        }
    }

    pub fn function_not_found(name: impl Into<String>) -> Self {
        ZythError::FunctionNotFound { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ZythError::parse("unexpected indent").to_string(),
            "Python parse error: unexpected indent"
        );
        assert_eq!(
            ZythError::function_not_found("main").to_string(),
            "function `main` is not defined in this compilation unit"
        );
    }
}
