//! Error types for casts and codecs
//!
//! Recoverable conditions are reported by value: lookups that miss return
//! `None`, predicates return `false`, and fallible conversions return these
//! errors. Precondition violations (wrong container kind, illegal element
//! kind) are programming errors and panic.

use crate::kind::DataKind;
use std::fmt;

/// Error from a numeric cast or transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastError {
    /// Value does not fit the target type's range.
    OutOfRange,
    /// Source kind is not numeric (String, Null, Pointer, containers).
    TypeMismatch(DataKind),
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastError::OutOfRange => write!(f, "value out of range for target type"),
            CastError::TypeMismatch(kind) => {
                write!(f, "cannot cast non-numeric kind {}", kind.name())
            }
        }
    }
}

impl std::error::Error for CastError {}

/// Error from the JSON tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Token capacity exhausted.
    NoMemory,
    /// Invalid character in the input.
    Invalid,
    /// Premature end of input.
    Part,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::NoMemory => write!(f, "token capacity exhausted"),
            TokenError::Invalid => write!(f, "invalid character in JSON input"),
            TokenError::Part => write!(f, "premature end of JSON input"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Error from a codec decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// JSON tokenization failed.
    Json(TokenError),
    /// A JSON primitive could not be converted to a value.
    JsonNumber,
    /// CBOR input malformed, with a short reason.
    Cbor(&'static str),
    /// XML input malformed.
    Xml(String),
    /// YAML input malformed; the payload reads "<problem> at line <n>".
    Yaml(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Json(e) => write!(f, "JSON: {}", e),
            ParseError::JsonNumber => write!(f, "JSON: malformed number"),
            ParseError::Cbor(reason) => write!(f, "CBOR: {}", reason),
            ParseError::Xml(detail) => write!(f, "XML: {}", detail),
            ParseError::Yaml(detail) => write!(f, "{}", detail),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<TokenError> for ParseError {
    fn from(e: TokenError) -> ParseError {
        ParseError::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(CastError::OutOfRange.to_string(), "value out of range for target type");
        assert_eq!(
            CastError::TypeMismatch(DataKind::String).to_string(),
            "cannot cast non-numeric kind String"
        );
        assert_eq!(ParseError::Cbor("truncated input").to_string(), "CBOR: truncated input");
        let yaml = ParseError::Yaml("did not find expected key at line 3".into());
        assert_eq!(yaml.to_string(), "did not find expected key at line 3");
    }
}
