//! Tether data: a refcounted, self-describing value model with codecs
//!
//! Key design principles:
//! - `Data`: one cheap handle type for every value kind; cloning takes a
//!   reference, mutating a shared value copies its top level first
//! - Containers (Array, Vector, List, Map) describe their element and key
//!   kinds so consumers can assert shape with a `TypeCode`
//! - Codecs (JSON, CBOR, XML, YAML, base64) operate on values directly;
//!   hashing and comparison are structural

pub mod array;
pub mod cast;
pub mod cbor;
pub mod compress;
pub mod error;
pub mod json;
pub mod kind;
pub mod list;
pub mod map;
pub mod path;
#[cfg(feature = "serde")]
pub mod serialize;
pub mod time;
pub mod uuid;
pub mod value;
pub mod vector;
#[cfg(feature = "xml")]
pub mod xml;
#[cfg(feature = "yaml")]
pub mod yaml;

// Re-export key types
pub use array::ArrayElement;
pub use cast::CastTarget;
pub use error::{CastError, ParseError, TokenError};
pub use json::{Token, TokenKind, tokenize};
pub use kind::{DataKind, TypeCode};
pub use value::{Data, PointerValue};
