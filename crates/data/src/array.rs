//! Arrays and binaries: contiguous buffers of one scalar element kind
//!
//! An Array owns (or borrows, for `'static` data) a typed buffer of
//! scalars. A Binary is byte-for-byte an Array of UInt8 carrying a
//! different kind tag so codecs choose base64/bytestring encodings;
//! the tag can be switched in place both ways.

use crate::cast::cast_numeric;
use crate::kind::DataKind;
use crate::value::{Data, Value, hash_bytes};
use std::borrow::Cow;

#[derive(Debug, Clone)]
pub(crate) enum ArrayValue {
    Int8(Cow<'static, [i8]>),
    UInt8(Cow<'static, [u8]>),
    Int16(Cow<'static, [i16]>),
    UInt16(Cow<'static, [u16]>),
    Int32(Cow<'static, [i32]>),
    UInt32(Cow<'static, [u32]>),
    Int64(Cow<'static, [i64]>),
    UInt64(Cow<'static, [u64]>),
    Float32(Cow<'static, [f32]>),
    Float64(Cow<'static, [f64]>),
    Bool(Cow<'static, [bool]>),
}

macro_rules! for_each_array {
    ($value:expr, $slice:ident => $body:expr) => {
        match $value {
            ArrayValue::Int8($slice) => $body,
            ArrayValue::UInt8($slice) => $body,
            ArrayValue::Int16($slice) => $body,
            ArrayValue::UInt16($slice) => $body,
            ArrayValue::Int32($slice) => $body,
            ArrayValue::UInt32($slice) => $body,
            ArrayValue::Int64($slice) => $body,
            ArrayValue::UInt64($slice) => $body,
            ArrayValue::Float32($slice) => $body,
            ArrayValue::Float64($slice) => $body,
            ArrayValue::Bool($slice) => $body,
        }
    };
}

impl ArrayValue {
    pub(crate) fn element_kind(&self) -> DataKind {
        match self {
            ArrayValue::Int8(_) => DataKind::Int8,
            ArrayValue::UInt8(_) => DataKind::UInt8,
            ArrayValue::Int16(_) => DataKind::Int16,
            ArrayValue::UInt16(_) => DataKind::UInt16,
            ArrayValue::Int32(_) => DataKind::Int32,
            ArrayValue::UInt32(_) => DataKind::UInt32,
            ArrayValue::Int64(_) => DataKind::Int64,
            ArrayValue::UInt64(_) => DataKind::UInt64,
            ArrayValue::Float32(_) => DataKind::Float32,
            ArrayValue::Float64(_) => DataKind::Float64,
            ArrayValue::Bool(_) => DataKind::Bool,
        }
    }

    /// Length in elements.
    pub(crate) fn len(&self) -> usize {
        for_each_array!(self, s => s.len())
    }

    /// Length in bytes.
    pub(crate) fn byte_len(&self) -> usize {
        self.len() * self.element_kind().size()
    }

    /// djb2 fold over the element bytes in memory order.
    pub(crate) fn hash32(&self) -> u32 {
        let mut hash = 538u32;
        let mut feed = |bytes: &[u8]| {
            for b in bytes {
                hash = hash.wrapping_shl(5).wrapping_add(hash) ^ (*b as u32);
            }
        };
        match self {
            ArrayValue::UInt8(s) => feed(s),
            ArrayValue::Int8(s) => s.iter().for_each(|v| feed(&v.to_ne_bytes())),
            ArrayValue::Int16(s) => s.iter().for_each(|v| feed(&v.to_ne_bytes())),
            ArrayValue::UInt16(s) => s.iter().for_each(|v| feed(&v.to_ne_bytes())),
            ArrayValue::Int32(s) => s.iter().for_each(|v| feed(&v.to_ne_bytes())),
            ArrayValue::UInt32(s) => s.iter().for_each(|v| feed(&v.to_ne_bytes())),
            ArrayValue::Int64(s) => s.iter().for_each(|v| feed(&v.to_ne_bytes())),
            ArrayValue::UInt64(s) => s.iter().for_each(|v| feed(&v.to_ne_bytes())),
            ArrayValue::Float32(s) => s.iter().for_each(|v| feed(&v.to_ne_bytes())),
            ArrayValue::Float64(s) => s.iter().for_each(|v| feed(&v.to_ne_bytes())),
            ArrayValue::Bool(s) => s.iter().for_each(|v| feed(&[*v as u8])),
        }
        hash
    }

    /// Length, then element kind, then byte-lexicographic content.
    pub(crate) fn compare(&self, other: &ArrayValue) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        let ord = self.len().cmp(&other.len());
        if ord != Ordering::Equal {
            return ord;
        }
        let ord = self.element_kind().cmp(&other.element_kind());
        if ord != Ordering::Equal {
            return ord;
        }
        macro_rules! cmp_bytes {
            ($a:expr, $b:expr) => {{
                for (x, y) in $a.iter().zip($b.iter()) {
                    let ord = x.to_ne_bytes().cmp(&y.to_ne_bytes());
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            }};
        }
        match (self, other) {
            (ArrayValue::UInt8(a), ArrayValue::UInt8(b)) => a.cmp(b),
            (ArrayValue::Int8(a), ArrayValue::Int8(b)) => cmp_bytes!(a, b),
            (ArrayValue::Int16(a), ArrayValue::Int16(b)) => cmp_bytes!(a, b),
            (ArrayValue::UInt16(a), ArrayValue::UInt16(b)) => cmp_bytes!(a, b),
            (ArrayValue::Int32(a), ArrayValue::Int32(b)) => cmp_bytes!(a, b),
            (ArrayValue::UInt32(a), ArrayValue::UInt32(b)) => cmp_bytes!(a, b),
            (ArrayValue::Int64(a), ArrayValue::Int64(b)) => cmp_bytes!(a, b),
            (ArrayValue::UInt64(a), ArrayValue::UInt64(b)) => cmp_bytes!(a, b),
            (ArrayValue::Float32(a), ArrayValue::Float32(b)) => cmp_bytes!(a, b),
            (ArrayValue::Float64(a), ArrayValue::Float64(b)) => cmp_bytes!(a, b),
            (ArrayValue::Bool(a), ArrayValue::Bool(b)) => a.cmp(b),
            _ => unreachable!("element kind equality checked above"),
        }
    }

    /// Element at `index` as a scalar value.
    pub(crate) fn get(&self, index: usize) -> Option<Data> {
        if index >= self.len() {
            return None;
        }
        Some(match self {
            ArrayValue::Int8(s) => Data::from(s[index]),
            ArrayValue::UInt8(s) => Data::from(s[index]),
            ArrayValue::Int16(s) => Data::from(s[index]),
            ArrayValue::UInt16(s) => Data::from(s[index]),
            ArrayValue::Int32(s) => Data::from(s[index]),
            ArrayValue::UInt32(s) => Data::from(s[index]),
            ArrayValue::Int64(s) => Data::from(s[index]),
            ArrayValue::UInt64(s) => Data::from(s[index]),
            ArrayValue::Float32(s) => Data::from(s[index]),
            ArrayValue::Float64(s) => Data::from(s[index]),
            ArrayValue::Bool(s) => Data::from(s[index]),
        })
    }
}

/// Scalar types that can back an Array. Sealed: exactly the Int8..Bool set.
pub trait ArrayElement: private::Sealed + Clone + 'static {}

impl<T: private::Sealed + Clone + 'static> ArrayElement for T {}

mod private {
    use super::ArrayValue;
    use std::borrow::Cow;

    pub trait Sealed: Sized + Clone + 'static {
        fn wrap(data: Cow<'static, [Self]>) -> ArrayValue;
        fn unwrap(value: &ArrayValue) -> Option<&[Self]>;
    }
}

use private::Sealed;

macro_rules! array_element {
    ($t:ty, $variant:ident) => {
        impl private::Sealed for $t {
            fn wrap(data: Cow<'static, [$t]>) -> ArrayValue {
                ArrayValue::$variant(data)
            }
            fn unwrap(value: &ArrayValue) -> Option<&[$t]> {
                match value {
                    ArrayValue::$variant(s) => Some(s),
                    _ => None,
                }
            }
        }
    };
}

array_element!(i8, Int8);
array_element!(u8, UInt8);
array_element!(i16, Int16);
array_element!(u16, UInt16);
array_element!(i32, Int32);
array_element!(u32, UInt32);
array_element!(i64, Int64);
array_element!(u64, UInt64);
array_element!(f32, Float32);
array_element!(f64, Float64);
array_element!(bool, Bool);

impl Data {
    /// An Array taking ownership of `elements`.
    pub fn array<T: ArrayElement>(elements: Vec<T>) -> Data {
        let value = T::wrap(Cow::Owned(elements));
        let hash = value.hash32();
        Data::with_hash(Value::Array(value), hash)
    }

    /// An Array copying `elements`.
    pub fn array_from<T: ArrayElement>(elements: &[T]) -> Data {
        Data::array(elements.to_vec())
    }

    /// An Array borrowing a `'static` slice; the buffer is never copied
    /// or freed.
    pub fn array_static<T: ArrayElement>(elements: &'static [T]) -> Data {
        let value = T::wrap(Cow::Borrowed(elements));
        let hash = value.hash32();
        Data::with_hash(Value::Array(value), hash)
    }

    /// A Binary taking ownership of `bytes`.
    pub fn binary(bytes: Vec<u8>) -> Data {
        let value = ArrayValue::UInt8(Cow::Owned(bytes));
        let hash = value.hash32();
        Data::with_hash(Value::Binary(value), hash)
    }

    /// A Binary copying `bytes`.
    pub fn binary_from(bytes: &[u8]) -> Data {
        Data::binary(bytes.to_vec())
    }

    fn array_value(&self) -> &ArrayValue {
        match self.value() {
            Value::Array(a) | Value::Binary(a) => a,
            _ => panic!("array operation on {}", self.kind_name()),
        }
    }

    /// Length in elements. Panics when the value is not an Array/Binary.
    pub fn array_len(&self) -> u32 {
        self.array_value().len() as u32
    }

    /// Length in bytes.
    pub fn array_byte_len(&self) -> u32 {
        self.array_value().byte_len() as u32
    }

    /// The element kind of an Array/Binary.
    pub fn array_kind(&self) -> DataKind {
        self.array_value().element_kind()
    }

    /// Typed view of the backing buffer; `None` when the element type
    /// does not match.
    pub fn array_as_slice<T: ArrayElement>(&self) -> Option<&[T]> {
        T::unwrap(self.array_value())
    }

    /// Byte view of a Binary or UInt8 Array.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.value() {
            Value::Array(ArrayValue::UInt8(s)) | Value::Binary(ArrayValue::UInt8(s)) => Some(s),
            _ => None,
        }
    }

    /// Element at `index` as a scalar value.
    pub fn array_get(&self, index: u32) -> Option<Data> {
        self.array_value().get(index as usize)
    }

    /// Iterate elements as scalar values.
    pub fn array_iter(&self) -> impl Iterator<Item = Data> + '_ {
        let value = self.array_value();
        (0..value.len()).map(move |i| value.get(i).unwrap())
    }

    /// Switch a UInt8 Array's kind tag to Binary in place. The backing
    /// buffer is untouched. Panics unless the element kind is UInt8.
    pub fn array_to_binary(&mut self) {
        assert_eq!(self.array_kind(), DataKind::UInt8, "binary tag requires UInt8 elements");
        let inner = self.inner_mut();
        if let Value::Array(a) = &mut inner.value {
            let payload = std::mem::replace(a, ArrayValue::UInt8(Cow::Borrowed(&[])));
            inner.value = Value::Binary(payload);
        }
    }

    /// Switch a Binary's kind tag to Array in place.
    pub fn binary_to_array(&mut self) {
        assert_eq!(self.array_kind(), DataKind::UInt8, "binary tag requires UInt8 elements");
        let inner = self.inner_mut();
        if let Value::Binary(a) = &mut inner.value {
            let payload = std::mem::replace(a, ArrayValue::UInt8(Cow::Borrowed(&[])));
            inner.value = Value::Array(payload);
        }
    }

    /// New Array of `kind` holding every element castable to it; elements
    /// out of range are skipped. Panics when self is not an Array or
    /// `kind` is not a scalar kind.
    pub fn array_transform(&self, kind: DataKind) -> Data {
        assert!(kind.is_array_element(), "illegal array element kind {}", kind.name());
        let value = self.array_value();
        macro_rules! transform_to {
            ($t:ty) => {{
                let mut out: Vec<$t> = Vec::with_capacity(value.len());
                for i in 0..value.len() {
                    let element = value.get(i).unwrap();
                    if let Ok(v) = cast_numeric::<$t>(&element) {
                        out.push(v);
                    }
                }
                Data::array(out)
            }};
        }
        match kind {
            DataKind::Int8 => transform_to!(i8),
            DataKind::UInt8 => transform_to!(u8),
            DataKind::Int16 => transform_to!(i16),
            DataKind::UInt16 => transform_to!(u16),
            DataKind::Int32 => transform_to!(i32),
            DataKind::UInt32 => transform_to!(u32),
            DataKind::Int64 => transform_to!(i64),
            DataKind::UInt64 => transform_to!(u64),
            DataKind::Float32 => transform_to!(f32),
            DataKind::Float64 => transform_to!(f64),
            DataKind::Bool => transform_to!(bool),
            _ => unreachable!(),
        }
    }

    /// Decode a base64 string into a UInt8 Array; `None` on bad input.
    pub fn array_from_base64(encoded: &str) -> Option<Data> {
        use base64::prelude::*;
        BASE64_STANDARD.decode(encoded).ok().map(Data::array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_basics() {
        let a = Data::array(vec![1i32, 2, 3]);
        assert_eq!(a.kind(), DataKind::Array);
        assert_eq!(a.array_kind(), DataKind::Int32);
        assert_eq!(a.array_len(), 3);
        assert_eq!(a.array_byte_len(), 12);
        assert_eq!(a.array_as_slice::<i32>(), Some(&[1i32, 2, 3][..]));
        assert!(a.array_as_slice::<u8>().is_none());
        assert_eq!(a.array_get(1).and_then(|d| d.as_i32()), Some(2));
        assert!(a.array_get(3).is_none());
    }

    #[test]
    fn test_array_static_borrows() {
        static WINDOW: [u16; 4] = [10, 20, 30, 40];
        let a = Data::array_static(&WINDOW);
        assert_eq!(a.array_len(), 4);
        assert!(a.equal(&Data::array(WINDOW.to_vec())));
    }

    #[test]
    fn test_binary_tag_switch() {
        let mut b = Data::binary(vec![1, 2, 3]);
        assert_eq!(b.kind(), DataKind::Binary);
        assert_eq!(b.element_kind(), DataKind::UInt8);
        let hash = b.hash32();
        b.binary_to_array();
        assert_eq!(b.kind(), DataKind::Array);
        assert_eq!(b.as_bytes(), Some(&[1u8, 2, 3][..]));
        b.array_to_binary();
        assert_eq!(b.kind(), DataKind::Binary);
        assert_eq!(b.hash32(), hash);
    }

    #[test]
    fn test_binary_and_array_compare_by_kind() {
        // Binary orders before Array regardless of content
        let bin = Data::binary(vec![9, 9]);
        let arr = Data::array(vec![0u8, 0]);
        assert_eq!(bin.compare(&arr), std::cmp::Ordering::Less);
    }

    #[test]
    fn test_array_compare_length_first() {
        let short = Data::array(vec![9i32, 9]);
        let long = Data::array(vec![1i32, 1, 1]);
        assert_eq!(short.compare(&long), std::cmp::Ordering::Less);
    }

    #[test]
    fn test_array_equal_and_hash() {
        let a = Data::array(vec![1u8, 2, 3]);
        let b = Data::array(vec![1u8, 2, 3]);
        let c = Data::array(vec![1u8, 2, 4]);
        assert!(a.equal(&b));
        assert_eq!(a.hash32(), b.hash32());
        assert!(!a.equal(&c));
        // byte arrays share the string hash function
        assert_eq!(a.hash32(), crate::value::hash_bytes(&[1, 2, 3]));
    }

    #[test]
    fn test_array_transform_skips_out_of_range() {
        let a = Data::array(vec![100i32, 300, -5, 200]);
        let b = a.array_transform(DataKind::UInt8);
        assert_eq!(b.array_as_slice::<u8>(), Some(&[100u8, 200][..]));

        let bools = a.array_transform(DataKind::Bool);
        // any nonzero value converts to true
        assert_eq!(bools.array_as_slice::<bool>(), Some(&[true, true, true, true][..]));
    }

    #[test]
    fn test_array_from_base64() {
        let a = Data::array_from_base64("AQID").unwrap();
        assert_eq!(a.kind(), DataKind::Array);
        assert_eq!(a.as_bytes(), Some(&[1u8, 2, 3][..]));
        assert!(Data::array_from_base64("!!!").is_none());
    }
}
