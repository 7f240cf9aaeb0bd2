//! Data kinds and typecodes
//!
//! Every value carries a `DataKind` tag. The ordinal order of the variants
//! is load-bearing: cross-kind comparison orders values by this ordinal,
//! and the contiguous ranges (scalars, composed containers) are used for
//! range checks throughout the crate.

/// Kind tag for a [`Data`](crate::Data) value.
///
/// `Multi` is not a value kind; it marks a container whose element (or key)
/// kind is unrestricted. `Invalid` is the parse failure sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DataKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Bool,
    Pointer,
    String,
    Null,
    Binary,
    Array,
    Vector,
    List,
    Map,
    Multi,
    Invalid,
}

const KIND_NAMES: [&str; 21] = [
    "Int8", "UInt8", "Int16", "UInt16", "Int32", "UInt32", "Int64", "UInt64", "Float32", "Float64",
    "Bool", "Pointer", "String", "Null", "Binary", "Array", "Vector", "List", "Map", "Multi",
    "Invalid",
];

// Element sizes in bytes for the array-legal kinds (Int8..=Bool)
const KIND_SIZES: [usize; 11] = [1, 1, 2, 2, 4, 4, 8, 8, 4, 8, 1];

impl DataKind {
    /// Display name of the kind ("Int8", "Map", ...).
    pub fn name(self) -> &'static str {
        KIND_NAMES[self as usize]
    }

    /// Parse a kind from its name, case-insensitively.
    /// Unknown names yield `Invalid`.
    pub fn parse(name: &str) -> DataKind {
        ALL_KINDS
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name))
            .unwrap_or(DataKind::Invalid)
    }

    /// Element size in bytes for kinds legal inside an Array, 0 otherwise.
    pub fn size(self) -> usize {
        if self <= DataKind::Bool { KIND_SIZES[self as usize] } else { 0 }
    }

    /// Integer, float or Bool: the kinds `cast` accepts on either side.
    pub fn is_numeric(self) -> bool {
        self <= DataKind::Bool
    }

    /// Integer kinds only.
    pub fn is_integer(self) -> bool {
        self <= DataKind::UInt64
    }

    /// Kinds that may appear as Array elements (scalars, no String).
    pub fn is_array_element(self) -> bool {
        self <= DataKind::Bool
    }

    /// Composed containers whose hash is an XOR fold over children.
    pub fn is_composed(self) -> bool {
        matches!(self, DataKind::Vector | DataKind::List | DataKind::Map)
    }
}

const ALL_KINDS: [DataKind; 21] = [
    DataKind::Int8,
    DataKind::UInt8,
    DataKind::Int16,
    DataKind::UInt16,
    DataKind::Int32,
    DataKind::UInt32,
    DataKind::Int64,
    DataKind::UInt64,
    DataKind::Float32,
    DataKind::Float64,
    DataKind::Bool,
    DataKind::Pointer,
    DataKind::String,
    DataKind::Null,
    DataKind::Binary,
    DataKind::Array,
    DataKind::Vector,
    DataKind::List,
    DataKind::Map,
    DataKind::Multi,
    DataKind::Invalid,
];

/// Structural type description: `(kind, element kind, key kind)`.
///
/// Element and key kinds only participate in equality where they are
/// meaningful: the element kind for Array/Vector/List/Map/Multi, the key
/// kind for Map.
#[derive(Debug, Clone, Copy)]
pub struct TypeCode {
    pub kind: DataKind,
    pub element: DataKind,
    pub key: DataKind,
}

impl TypeCode {
    pub fn new(kind: DataKind, element: DataKind, key: DataKind) -> TypeCode {
        TypeCode { kind, element, key }
    }

    /// Typecode for a scalar or other non-container kind.
    pub fn scalar(kind: DataKind) -> TypeCode {
        TypeCode { kind, element: DataKind::Invalid, key: DataKind::Invalid }
    }

    /// Typecode for an Array of the given element kind.
    pub fn array(element: DataKind) -> TypeCode {
        TypeCode { kind: DataKind::Array, element, key: DataKind::Invalid }
    }

    /// Typecode for a Vector of the given element kind (`Multi` for untyped).
    pub fn vector(element: DataKind) -> TypeCode {
        TypeCode { kind: DataKind::Vector, element, key: DataKind::Invalid }
    }

    /// Typecode for a List of the given element kind (`Multi` for untyped).
    pub fn list(element: DataKind) -> TypeCode {
        TypeCode { kind: DataKind::List, element, key: DataKind::Invalid }
    }

    /// Typecode for a Map with the given key and element kinds.
    pub fn map(key: DataKind, element: DataKind) -> TypeCode {
        TypeCode { kind: DataKind::Map, element, key }
    }
}

impl PartialEq for TypeCode {
    fn eq(&self, other: &TypeCode) -> bool {
        if self.kind != other.kind {
            return false;
        }
        if (self.kind >= DataKind::Array && self.kind <= DataKind::Multi)
            && self.element != other.element
        {
            return false;
        }
        if self.kind == DataKind::Map && self.key != other.key {
            return false;
        }
        true
    }
}

impl Eq for TypeCode {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ordering() {
        assert!(DataKind::Int8 < DataKind::UInt8);
        assert!(DataKind::Bool < DataKind::Pointer);
        assert!(DataKind::Binary < DataKind::Array);
        assert!(DataKind::Map < DataKind::Multi);
    }

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in ALL_KINDS {
            assert_eq!(DataKind::parse(kind.name()), kind);
        }
        assert_eq!(DataKind::parse("uint32"), DataKind::UInt32);
        assert_eq!(DataKind::parse("FLOAT64"), DataKind::Float64);
        assert_eq!(DataKind::parse("NoSuchKind"), DataKind::Invalid);
    }

    #[test]
    fn test_kind_sizes() {
        assert_eq!(DataKind::Int8.size(), 1);
        assert_eq!(DataKind::UInt16.size(), 2);
        assert_eq!(DataKind::Float32.size(), 4);
        assert_eq!(DataKind::UInt64.size(), 8);
        assert_eq!(DataKind::String.size(), 0);
        assert_eq!(DataKind::Map.size(), 0);
    }

    #[test]
    fn test_typecode_scalar_equality_ignores_element() {
        let a = TypeCode::scalar(DataKind::Int32);
        let b = TypeCode::new(DataKind::Int32, DataKind::UInt8, DataKind::String);
        assert_eq!(a, b);
    }

    #[test]
    fn test_typecode_container_equality() {
        assert_eq!(TypeCode::array(DataKind::UInt8), TypeCode::array(DataKind::UInt8));
        assert_ne!(TypeCode::array(DataKind::UInt8), TypeCode::array(DataKind::Int8));
        assert_ne!(
            TypeCode::map(DataKind::String, DataKind::Multi),
            TypeCode::map(DataKind::Multi, DataKind::Multi)
        );
        assert_eq!(
            TypeCode::vector(DataKind::Multi),
            TypeCode::new(DataKind::Vector, DataKind::Multi, DataKind::Invalid)
        );
    }
}
