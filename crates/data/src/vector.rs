//! Vectors: fixed-size tables of optional owned values
//!
//! Slots may be empty (null); `compact` drops empty slots preserving
//! order. Vectors are the JSON array representation and support shape
//! probing (`vector_dimensions`) plus flattening transforms into typed
//! arrays or vectors.

use crate::cast::cast_numeric;
use crate::kind::DataKind;
use crate::value::{Data, Value};

#[derive(Debug, Clone)]
pub(crate) struct VectorValue {
    pub(crate) element: DataKind,
    pub(crate) slots: Vec<Option<Data>>,
}

impl Data {
    /// A Vector of `size` empty slots, unrestricted element kind.
    pub fn vector(size: u32) -> Data {
        Data::typed_vector(size, DataKind::Multi)
    }

    /// A Vector of `size` empty slots accepting only `element` values.
    pub fn typed_vector(size: u32, element: DataKind) -> Data {
        Data::container(Value::Vector(VectorValue {
            element,
            slots: vec![None; size as usize],
        }))
    }

    /// A Vector populated from `values`, one per slot.
    pub fn vector_of(values: impl IntoIterator<Item = Data>) -> Data {
        let slots: Vec<Option<Data>> = values.into_iter().map(Some).collect();
        let mut vector = Data::vector(slots.len() as u32);
        for (i, slot) in slots.into_iter().enumerate() {
            vector.vector_set(i as u32, slot);
        }
        vector
    }

    fn vector_value(&self) -> &VectorValue {
        match self.value() {
            Value::Vector(v) => v,
            _ => panic!("vector operation on {}", self.kind_name()),
        }
    }

    pub fn vector_len(&self) -> u32 {
        self.vector_value().slots.len() as u32
    }

    pub fn vector_kind(&self) -> DataKind {
        self.vector_value().element
    }

    /// Value at `index`; `None` for an empty slot. Panics out of bounds.
    pub fn vector_get(&self, index: u32) -> Option<&Data> {
        let v = self.vector_value();
        assert!((index as usize) < v.slots.len(), "vector index {} out of bounds", index);
        v.slots[index as usize].as_ref()
    }

    /// Store `value` (or empty the slot) at `index`. Panics out of bounds
    /// or on an element kind mismatch.
    pub fn vector_set(&mut self, index: u32, value: Option<Data>) {
        {
            let v = self.vector_value();
            assert!((index as usize) < v.slots.len(), "vector index {} out of bounds", index);
            if let Some(value) = &value {
                assert!(
                    v.element == DataKind::Multi || v.element == value.kind(),
                    "vector element kind mismatch: expected {}, got {}",
                    v.element.name(),
                    value.kind_name()
                );
            }
        }
        let hash = value.as_ref().map_or(0, Data::hash32);
        let inner = self.inner_mut();
        let Value::Vector(v) = &mut inner.value else { unreachable!() };
        let previous = std::mem::replace(&mut v.slots[index as usize], value);
        if previous.is_some() {
            Data::mark_rehash(inner);
        } else {
            Data::hash_xor(inner, hash);
        }
    }

    /// Grow (empty slots) or shrink (dropping the tail) to `size`.
    pub fn vector_resize(&mut self, size: u32) {
        let inner = self.inner_mut();
        let Value::Vector(v) = &mut inner.value else {
            panic!("vector operation on non-vector");
        };
        if v.slots.len() != size as usize {
            v.slots.resize(size as usize, None);
            Data::mark_rehash(inner);
        }
    }

    /// Remove empty slots, preserving order; returns the new size.
    pub fn vector_compact(&mut self) -> u32 {
        let inner = self.inner_mut();
        let Value::Vector(v) = &mut inner.value else {
            panic!("vector operation on non-vector");
        };
        v.slots.retain(Option::is_some);
        v.slots.len() as u32
    }

    /// Iterate the slots; empty slots yield `None`.
    pub fn vector_iter(&self) -> impl DoubleEndedIterator<Item = Option<&Data>> {
        self.vector_value().slots.iter().map(Option::as_ref)
    }

    /// Mutable slot iteration; the container hash is marked stale.
    pub fn vector_iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Option<Data>> {
        let inner = self.inner_mut();
        Data::mark_rehash(inner);
        match &mut inner.value {
            Value::Vector(v) => v.slots.iter_mut(),
            _ => panic!("vector operation on non-vector"),
        }
    }

    /// First occupied slot matching the predicate.
    pub fn vector_find(&self, mut pred: impl FnMut(&Data) -> bool) -> Option<&Data> {
        self.vector_value().slots.iter().flatten().find(|d| pred(d))
    }

    /// Count elements of `kind`, descending into nested vectors when
    /// `recurse` is set (nested vectors themselves are not counted).
    pub fn vector_element_count(&self, kind: DataKind, recurse: bool) -> u32 {
        let mut count = 0;
        for slot in self.vector_value().slots.iter().flatten() {
            if recurse && slot.kind() == DataKind::Vector && kind != DataKind::Vector {
                count += slot.vector_element_count(kind, true);
            } else if slot.kind() == kind {
                count += 1;
            }
        }
        count
    }

    /// Dimensions of a uniformly nested vector-of-vectors: a UInt32 Array
    /// of per-level widths and the total leaf count. `None` when any level
    /// mixes vectors with non-vectors or widths differ.
    pub fn vector_dimensions(&self) -> Option<(Data, u32)> {
        let mut dims = Vec::new();
        let mut total = 1u32;
        if !vector_dims(self, 0, &mut dims, &mut total) {
            return None;
        }
        Some((Data::array(dims), total))
    }

    /// Flatten into a typed Array of `kind`, skipping elements that do not
    /// cast; `recurse` descends nested vectors.
    pub fn vector_to_array(&self, kind: DataKind, recurse: bool) -> Data {
        assert!(kind.is_array_element(), "illegal array element kind {}", kind.name());
        macro_rules! collect_to {
            ($t:ty) => {{
                let mut out: Vec<$t> = Vec::new();
                collect_cast(self, recurse, &mut |d| {
                    if let Ok(v) = cast_numeric::<$t>(d) {
                        out.push(v);
                    }
                });
                Data::array(out)
            }};
        }
        match kind {
            DataKind::Int8 => collect_to!(i8),
            DataKind::UInt8 => collect_to!(u8),
            DataKind::Int16 => collect_to!(i16),
            DataKind::UInt16 => collect_to!(u16),
            DataKind::Int32 => collect_to!(i32),
            DataKind::UInt32 => collect_to!(u32),
            DataKind::Int64 => collect_to!(i64),
            DataKind::UInt64 => collect_to!(u64),
            DataKind::Float32 => collect_to!(f32),
            DataKind::Float64 => collect_to!(f64),
            DataKind::Bool => collect_to!(bool),
            _ => unreachable!(),
        }
    }

    /// Transform into a Vector of `kind` scalars, skipping elements that
    /// do not cast; `recurse` flattens nested vectors.
    pub fn vector_to_vector(&self, kind: DataKind, recurse: bool) -> Data {
        assert!(kind.is_numeric(), "illegal element kind {}", kind.name());
        let mut out = Vec::new();
        collect_cast(self, recurse, &mut |d| {
            if let Ok(v) = d.transform(kind) {
                out.push(v);
            }
        });
        let mut vector = Data::typed_vector(out.len() as u32, kind);
        for (i, v) in out.into_iter().enumerate() {
            vector.vector_set(i as u32, Some(v));
        }
        vector
    }
}

fn collect_cast(vector: &Data, recurse: bool, push: &mut impl FnMut(&Data)) {
    for slot in vector.vector_iter().flatten() {
        if recurse && slot.kind() == DataKind::Vector {
            collect_cast(slot, true, push);
        } else {
            push(slot);
        }
    }
}

fn vector_dims(vector: &Data, level: usize, dims: &mut Vec<u32>, total: &mut u32) -> bool {
    let size = vector.vector_len();
    let child_vectors = vector.vector_element_count(DataKind::Vector, false);
    if dims.len() == level {
        dims.push(size);
        *total = total.saturating_mul(size);
    } else if dims[level] != size {
        return false;
    }
    if child_vectors == 0 {
        // Leaf level: nothing below
        return true;
    }
    if child_vectors != size {
        // Mixed vectors and scalars at one level
        return false;
    }
    vector.vector_iter().flatten().all(|child| vector_dims(child, level + 1, dims, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_vector(values: &[i64]) -> Data {
        Data::vector_of(values.iter().map(|v| Data::from(*v)))
    }

    #[test]
    fn test_vector_slots() {
        let mut v = Data::vector(3);
        assert_eq!(v.vector_len(), 3);
        assert!(v.vector_get(0).is_none());
        v.vector_set(1, Some(Data::from("mid")));
        assert_eq!(v.vector_get(1).and_then(Data::as_str), Some("mid"));
        v.vector_set(1, None);
        assert!(v.vector_get(1).is_none());
    }

    #[test]
    fn test_vector_out_of_bounds_panics() {
        let v = Data::vector(2);
        assert!(std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| v.vector_get(2))).is_err());
    }

    #[test]
    fn test_typed_vector_enforces_kind() {
        let mut v = Data::typed_vector(2, DataKind::Int32);
        v.vector_set(0, Some(Data::from(1i32)));
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            v.vector_set(1, Some(Data::from("nope")));
        }));
        assert!(r.is_err());
    }

    #[test]
    fn test_resize_and_compact() {
        let mut v = Data::vector(4);
        v.vector_set(0, Some(Data::from(1i32)));
        v.vector_set(2, Some(Data::from(3i32)));
        assert_eq!(v.vector_compact(), 2);
        let values: Vec<i32> = v.vector_iter().flatten().filter_map(Data::as_i32).collect();
        assert_eq!(values, vec![1, 3]);
        v.vector_resize(5);
        assert_eq!(v.vector_len(), 5);
        assert!(v.vector_get(4).is_none());
        v.vector_resize(1);
        assert_eq!(v.vector_len(), 1);
        assert_eq!(v.vector_get(0).and_then(Data::as_i32), Some(1));
    }

    #[test]
    fn test_vector_equality_and_hash() {
        let a = int_vector(&[1, 2, 3]);
        let b = int_vector(&[1, 2, 3]);
        assert!(a.equal(&b));
        assert_eq!(a.hash32(), b.hash32());
        let c = int_vector(&[1, 2, 4]);
        assert!(!a.equal(&c));
    }

    #[test]
    fn test_vector_dimensions_uniform() {
        // [[1,2],[2,3],[3,4]] -> dims [3,2], total 6
        let v = Data::vector_of(vec![
            int_vector(&[1, 2]),
            int_vector(&[2, 3]),
            int_vector(&[3, 4]),
        ]);
        let (dims, total) = v.vector_dimensions().unwrap();
        assert_eq!(dims.array_as_slice::<u32>(), Some(&[3u32, 2][..]));
        assert_eq!(total, 6);
    }

    #[test]
    fn test_vector_dimensions_ragged() {
        let v = Data::vector_of(vec![int_vector(&[1, 2]), int_vector(&[2, 3, 4])]);
        assert!(v.vector_dimensions().is_none());

        // Mixed nesting: a vector next to a scalar
        let mixed = Data::vector_of(vec![int_vector(&[1]), Data::from(2i64)]);
        assert!(mixed.vector_dimensions().is_none());
    }

    #[test]
    fn test_vector_to_array_recurse() {
        let v = Data::vector_of(vec![int_vector(&[1, 300]), int_vector(&[2, 3])]);
        let flat = v.vector_to_array(DataKind::UInt8, true);
        // 300 does not fit a u8 and is skipped
        assert_eq!(flat.array_as_slice::<u8>(), Some(&[1u8, 2, 3][..]));

        let shallow = v.vector_to_array(DataKind::UInt8, false);
        assert_eq!(shallow.array_len(), 0);
    }

    #[test]
    fn test_vector_to_vector() {
        let v = Data::vector_of(vec![Data::from(1i64), Data::from("skip"), Data::from(2i64)]);
        let out = v.vector_to_vector(DataKind::Float64, false);
        assert_eq!(out.vector_kind(), DataKind::Float64);
        let values: Vec<f64> = out.vector_iter().flatten().filter_map(Data::as_f64).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_vector_element_count() {
        let v = Data::vector_of(vec![
            Data::from(1i64),
            int_vector(&[2, 3]),
            Data::from("s"),
        ]);
        assert_eq!(v.vector_element_count(DataKind::Int64, false), 1);
        assert_eq!(v.vector_element_count(DataKind::Int64, true), 3);
        assert_eq!(v.vector_element_count(DataKind::Vector, false), 1);
    }
}
