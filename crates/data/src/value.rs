//! Data: refcounted, self-describing values
//!
//! `Data` is a cheaply clonable handle to an immutable-when-shared value.
//! Cloning a handle takes a reference; dropping the last handle releases
//! owned buffers, tears down container children and runs a Pointer
//! payload's destructor. In-place mutation goes through `&mut self` and
//! copies the top level first when the value is shared, so a published
//! value can never be raced.
//!
//! # Kinds
//!
//! Scalars (`Int8`..`Bool`), `Pointer` (opaque payload with custom drop),
//! `String`, `Null`, `Binary`/`Array` (typed contiguous buffers),
//! `Vector` (fixed table of optional values), `List` (double-ended
//! sequence) and `Map` (ordered key→value tree).
//!
//! # Hashing
//!
//! Every value carries a cached 32-bit hash. Scalar hashes are computed on
//! construction; container hashes are XOR folds maintained incrementally
//! on insertion and recomputed lazily after a mutation marks them stale.
//! Values equal by [`Data::compare`] always hash equal.

use crate::array::ArrayValue;
use crate::kind::{DataKind, TypeCode};
use crate::list::ListValue;
use crate::map::MapValue;
use crate::vector::VectorValue;
use std::any::Any;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as MemOrdering};
use std::sync::{Arc, LazyLock};

/// djb2 (xor variant) over a byte slice; shared by strings and arrays.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut hash = 538u32;
    for b in bytes {
        hash = hash.wrapping_shl(5).wrapping_add(hash) ^ (*b as u32);
    }
    hash
}

/// String storage: owned or borrowed-for-process-lifetime.
pub(crate) type Str = Cow<'static, str>;

/// Opaque payload for Pointer values. The payload's `Drop` implementation
/// is the custom deleter; identity (address) drives compare and hash.
#[derive(Clone)]
pub struct PointerValue(pub(crate) Arc<dyn Any + Send + Sync>);

impl PointerValue {
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for PointerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({:#x})", self.addr())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Value {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Pointer(PointerValue),
    String(Str),
    Null,
    Binary(ArrayValue),
    Array(ArrayValue),
    Vector(VectorValue),
    List(ListValue),
    Map(MapValue),
}

pub(crate) struct Inner {
    pub(crate) value: Value,
    pub(crate) meta: Option<Data>,
    hash: AtomicU32,
    rehash: AtomicBool,
}

impl Clone for Inner {
    // Shallow: container payloads clone their structure with shared
    // children. This is what Arc::make_mut runs when a shared value is
    // mutated in place.
    fn clone(&self) -> Inner {
        Inner {
            value: self.value.clone(),
            meta: self.meta.clone(),
            hash: AtomicU32::new(self.hash.load(MemOrdering::Relaxed)),
            rehash: AtomicBool::new(self.rehash.load(MemOrdering::Relaxed)),
        }
    }
}

/// Refcounted handle to a value. `Clone` takes a reference.
#[derive(Clone)]
pub struct Data {
    inner: Arc<Inner>,
}

static TRUE: LazyLock<Data> = LazyLock::new(|| Data::with_hash(Value::Bool(true), 1));
static FALSE: LazyLock<Data> = LazyLock::new(|| Data::with_hash(Value::Bool(false), 0));
static NULL: LazyLock<Data> = LazyLock::new(|| Data::with_hash(Value::Null, 0));

// Reserved metadata key for JSON object key ordering. A Pointer compares
// by address, so any clone of this singleton matches only itself.
struct OrderingKey;
static ORDER_KEY: LazyLock<Data> = LazyLock::new(|| Data::pointer(OrderingKey));

impl Data {
    pub(crate) fn with_hash(value: Value, hash: u32) -> Data {
        Data {
            inner: Arc::new(Inner {
                value,
                meta: None,
                hash: AtomicU32::new(hash),
                rehash: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn container(value: Value) -> Data {
        Data::with_hash(value, 0)
    }

    pub(crate) fn value(&self) -> &Value {
        &self.inner.value
    }

    /// Unique access to the payload, copying the top level if shared.
    pub(crate) fn inner_mut(&mut self) -> &mut Inner {
        Arc::make_mut(&mut self.inner)
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// The shared Null singleton.
    pub fn null() -> Data {
        NULL.clone()
    }

    /// The shared Bool singletons; `Data::same` holds between any two
    /// handles of the same truth value.
    pub fn bool_value(value: bool) -> Data {
        if value { TRUE.clone() } else { FALSE.clone() }
    }

    /// A String borrowing a `'static` str; the buffer is never copied.
    pub fn from_static(value: &'static str) -> Data {
        Data::with_hash(Value::String(Cow::Borrowed(value)), hash_bytes(value.as_bytes()))
    }

    /// A Pointer value wrapping an arbitrary payload. The payload's `Drop`
    /// runs when the last handle is released.
    pub fn pointer<T: Any + Send + Sync>(payload: T) -> Data {
        Data::pointer_arc(Arc::new(payload))
    }

    /// A Pointer value sharing an existing payload allocation.
    pub fn pointer_arc(payload: Arc<dyn Any + Send + Sync>) -> Data {
        let ptr = PointerValue(payload);
        let hash = ptr.addr() as u32;
        Data::with_hash(Value::Pointer(ptr), hash)
    }

    /// The reserved ordering-metadata key (see the JSON codec).
    pub fn order_key() -> Data {
        ORDER_KEY.clone()
    }

    /// A String holding a freshly generated v4 UUID in canonical form.
    pub fn uuid_string() -> Data {
        Data::from(crate::uuid::generate().to_string())
    }

    /// A 16-byte UInt8 Array holding a freshly generated v4 UUID.
    pub fn uuid_value() -> Data {
        Data::array(crate::uuid::generate().into_bytes().to_vec())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn kind(&self) -> DataKind {
        match &self.inner.value {
            Value::Int8(_) => DataKind::Int8,
            Value::UInt8(_) => DataKind::UInt8,
            Value::Int16(_) => DataKind::Int16,
            Value::UInt16(_) => DataKind::UInt16,
            Value::Int32(_) => DataKind::Int32,
            Value::UInt32(_) => DataKind::UInt32,
            Value::Int64(_) => DataKind::Int64,
            Value::UInt64(_) => DataKind::UInt64,
            Value::Float32(_) => DataKind::Float32,
            Value::Float64(_) => DataKind::Float64,
            Value::Bool(_) => DataKind::Bool,
            Value::Pointer(_) => DataKind::Pointer,
            Value::String(_) => DataKind::String,
            Value::Null => DataKind::Null,
            Value::Binary(_) => DataKind::Binary,
            Value::Array(_) => DataKind::Array,
            Value::Vector(_) => DataKind::Vector,
            Value::List(_) => DataKind::List,
            Value::Map(_) => DataKind::Map,
        }
    }

    pub fn is(&self, kind: DataKind) -> bool {
        self.kind() == kind
    }

    pub fn is_null(&self) -> bool {
        matches!(self.inner.value, Value::Null)
    }

    /// Element kind for Array/Binary/Vector/List/Map, `Invalid` otherwise.
    pub fn element_kind(&self) -> DataKind {
        match &self.inner.value {
            Value::Binary(a) | Value::Array(a) => a.element_kind(),
            Value::Vector(v) => v.element,
            Value::List(l) => l.element,
            Value::Map(m) => m.element,
            _ => DataKind::Invalid,
        }
    }

    /// Key kind for Map, `Invalid` otherwise.
    pub fn key_kind(&self) -> DataKind {
        match &self.inner.value {
            Value::Map(m) => m.key,
            _ => DataKind::Invalid,
        }
    }

    pub fn type_code(&self) -> TypeCode {
        TypeCode::new(self.kind(), self.element_kind(), self.key_kind())
    }

    /// Typecode equality against `tc` (see [`TypeCode`]).
    pub fn matches(&self, tc: &TypeCode) -> bool {
        self.type_code() == *tc
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Number of live handles to this value.
    pub fn ref_count(&self) -> u32 {
        Arc::strong_count(&self.inner) as u32
    }

    /// Pointer identity: both handles refer to the same allocation.
    pub fn same(&self, other: &Data) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Scalar accessors (strict kind match)
    // ------------------------------------------------------------------

    pub fn as_i8(&self) -> Option<i8> {
        match self.inner.value {
            Value::Int8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self.inner.value {
            Value::UInt8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self.inner.value {
            Value::Int16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self.inner.value {
            Value::UInt16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self.inner.value {
            Value::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self.inner.value {
            Value::UInt32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.inner.value {
            Value::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.inner.value {
            Value::UInt64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self.inner.value {
            Value::Float32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.inner.value {
            Value::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.inner.value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.inner.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Downcast a Pointer payload to a concrete type.
    pub fn pointer_as<T: Any>(&self) -> Option<&T> {
        match &self.inner.value {
            Value::Pointer(p) => p.0.downcast_ref(),
            _ => None,
        }
    }

    /// The shared Pointer payload, for re-wrapping elsewhere.
    pub fn pointer_payload(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        match &self.inner.value {
            Value::Pointer(p) => Some(p.0.clone()),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Attach metadata under `key`. The metadata map is owned by this value
    /// and released with it; deep copies share it.
    pub fn set_metadata(&mut self, key: Data, meta: Data) {
        let inner = self.inner_mut();
        let map = inner
            .meta
            .get_or_insert_with(|| Data::typed_map(DataKind::Multi, DataKind::Multi));
        map.map_insert(key, meta);
    }

    pub fn get_metadata(&self, key: &Data) -> Option<&Data> {
        self.inner.meta.as_ref()?.map_get(key)
    }

    // ------------------------------------------------------------------
    // Hashing and comparison
    // ------------------------------------------------------------------

    /// XOR `h` into the cached hash. Caller must hold unique access
    /// (i.e. be inside a mutation through `inner_mut`).
    pub(crate) fn hash_xor(inner: &mut Inner, h: u32) {
        *inner.hash.get_mut() ^= h;
    }

    pub(crate) fn mark_rehash(inner: &mut Inner) {
        *inner.rehash.get_mut() = true;
    }

    /// Overwrite the cached hash and clear the stale flag.
    pub(crate) fn hash_set(inner: &mut Inner, h: u32) {
        *inner.hash.get_mut() = h;
        *inner.rehash.get_mut() = false;
    }

    /// The 32-bit structural hash, recomputing a stale container fold.
    pub fn hash32(&self) -> u32 {
        if self.inner.rehash.load(MemOrdering::Acquire) {
            let mut hash = 0u32;
            match &self.inner.value {
                Value::Vector(v) => {
                    for slot in v.slots.iter() {
                        hash ^= slot.as_ref().map_or(0, Data::hash32);
                    }
                }
                Value::List(l) => {
                    for item in l.items.iter() {
                        hash ^= item.hash32();
                    }
                }
                Value::Map(m) => {
                    for (key, value) in m.iter() {
                        hash ^= MapValue::pair_hash(key, value);
                    }
                }
                _ => hash = self.inner.hash.load(MemOrdering::Relaxed),
            }
            // Concurrent recomputation is benign: both writers store the
            // same fold for the same structure.
            self.inner.hash.store(hash, MemOrdering::Relaxed);
            self.inner.rehash.store(false, MemOrdering::Release);
        }
        self.inner.hash.load(MemOrdering::Relaxed)
    }

    /// Total-by-convention ordering: distinct kinds order by kind ordinal;
    /// within a kind, natural value order. Containers short-circuit on
    /// length, then hash, then first differing element.
    pub fn compare(&self, other: &Data) -> Ordering {
        if self.same(other) {
            return Ordering::Equal;
        }
        let (k1, k2) = (self.kind(), other.kind());
        if k1 != k2 {
            return k1.cmp(&k2);
        }
        match (&self.inner.value, &other.inner.value) {
            (Value::Int8(a), Value::Int8(b)) => a.cmp(b),
            (Value::UInt8(a), Value::UInt8(b)) => a.cmp(b),
            (Value::Int16(a), Value::Int16(b)) => a.cmp(b),
            (Value::UInt16(a), Value::UInt16(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::UInt32(a), Value::UInt32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::UInt64(a), Value::UInt64(b)) => a.cmp(b),
            (Value::Float32(a), Value::Float32(b)) => float_cmp(*a as f64, *b as f64),
            (Value::Float64(a), Value::Float64(b)) => float_cmp(*a, *b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Pointer(a), Value::Pointer(b)) => a.addr().cmp(&b.addr()),
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Binary(a), Value::Binary(b)) | (Value::Array(a), Value::Array(b)) => {
                a.compare(b)
            }
            (Value::Vector(a), Value::Vector(b)) => {
                compare_lengths(a.slots.len(), b.slots.len())
                    .then_with(|| self.hash32().cmp(&other.hash32()))
                    .then_with(|| {
                        for (x, y) in a.slots.iter().zip(b.slots.iter()) {
                            let ord = compare_slots(x.as_ref(), y.as_ref());
                            if ord != Ordering::Equal {
                                return ord;
                            }
                        }
                        Ordering::Equal
                    })
            }
            (Value::List(a), Value::List(b)) => compare_lengths(a.items.len(), b.items.len())
                .then_with(|| self.hash32().cmp(&other.hash32()))
                .then_with(|| {
                    for (x, y) in a.items.iter().zip(b.items.iter()) {
                        let ord = x.compare(y);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                }),
            (Value::Map(a), Value::Map(b)) => compare_lengths(a.len() as usize, b.len() as usize)
                .then_with(|| self.hash32().cmp(&other.hash32()))
                .then_with(|| {
                    for ((k1, v1), (k2, v2)) in a.iter().zip(b.iter()) {
                        let ord = k1.compare(k2).then_with(|| v1.compare(v2));
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                }),
            _ => unreachable!("kind equality checked above"),
        }
    }

    /// Structural equality: hash equality plus `compare == Equal`.
    pub fn equal(&self, other: &Data) -> bool {
        self.hash32() == other.hash32() && self.compare(other) == Ordering::Equal
    }

    /// Compare with numeric coercion: numeric (and Bool) operands compare
    /// by value regardless of kind; anything else falls back to `compare`.
    pub fn compare_value(&self, other: &Data) -> Ordering {
        match (numeric_rank(&self.inner.value), numeric_rank(&other.inner.value)) {
            (Some(a), Some(b)) => a.compare(&b),
            _ => self.compare(other),
        }
    }

    /// Equality with numeric coercion.
    pub fn equal_value(&self, other: &Data) -> bool {
        self.compare_value(other) == Ordering::Equal
    }

    // ------------------------------------------------------------------
    // Copies
    // ------------------------------------------------------------------

    /// Deep copy: containers copy recursively, buffers are duplicated,
    /// Pointer values return another handle to themselves. Metadata is
    /// shared by reference.
    pub fn deep_copy(&self) -> Data {
        let mut copy = match &self.inner.value {
            Value::Bool(_) | Value::Null | Value::Pointer(_) => return self.clone(),
            Value::String(s) => Data::with_hash(
                Value::String(s.clone()),
                self.inner.hash.load(MemOrdering::Relaxed),
            ),
            Value::Binary(a) => Data::with_hash(
                Value::Binary(a.clone()),
                self.inner.hash.load(MemOrdering::Relaxed),
            ),
            Value::Array(a) => Data::with_hash(
                Value::Array(a.clone()),
                self.inner.hash.load(MemOrdering::Relaxed),
            ),
            Value::Map(m) => {
                let mut map = Data::typed_map(m.key, m.element);
                for (key, value) in m.iter() {
                    map.map_insert(key.deep_copy(), value.deep_copy());
                }
                map
            }
            Value::Vector(v) => {
                let mut vector = Data::typed_vector(v.slots.len() as u32, v.element);
                for (index, slot) in v.slots.iter().enumerate() {
                    vector.vector_set(index as u32, slot.as_ref().map(Data::deep_copy));
                }
                vector
            }
            Value::List(l) => {
                let mut list = Data::typed_list(l.element);
                for item in l.items.iter() {
                    list.list_push_back(item.deep_copy());
                }
                list
            }
            scalar => Data::with_hash(scalar.clone(), self.inner.hash.load(MemOrdering::Relaxed)),
        };
        if let Some(meta) = &self.inner.meta {
            copy.inner_mut().meta = Some(meta.clone());
        }
        copy
    }

    /// Shallow copy: for Map/Vector/List a new container whose children
    /// are shared references; anything else is another handle.
    pub fn shallow_copy(&self) -> Data {
        match &self.inner.value {
            Value::Map(_) | Value::Vector(_) | Value::List(_) => Data {
                inner: Arc::new((*self.inner).clone()),
            },
            _ => self.clone(),
        }
    }

    // ------------------------------------------------------------------
    // In-place numeric mutation
    // ------------------------------------------------------------------

    /// Add one to a numeric value in place; no-op on anything else.
    pub fn increment(&mut self) {
        self.inc_dec(true);
    }

    /// Subtract one from a numeric value in place; no-op on anything else.
    pub fn decrement(&mut self) {
        self.inc_dec(false);
    }

    fn inc_dec(&mut self, inc: bool) {
        if !self.kind().is_numeric() || self.kind() == DataKind::Bool {
            return;
        }
        let inner = self.inner_mut();
        let hash;
        match &mut inner.value {
            Value::Int8(v) => {
                *v = if inc { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                hash = *v as u32;
            }
            Value::UInt8(v) => {
                *v = if inc { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                hash = *v as u32;
            }
            Value::Int16(v) => {
                *v = if inc { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                hash = *v as u32;
            }
            Value::UInt16(v) => {
                *v = if inc { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                hash = *v as u32;
            }
            Value::Int32(v) => {
                *v = if inc { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                hash = *v as u32;
            }
            Value::UInt32(v) => {
                *v = if inc { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                hash = *v;
            }
            Value::Int64(v) => {
                *v = if inc { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                hash = *v as u32;
            }
            Value::UInt64(v) => {
                *v = if inc { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                hash = *v as u32;
            }
            Value::Float32(v) => {
                *v = if inc { *v + 1.0 } else { *v - 1.0 };
                hash = *v as u32;
            }
            Value::Float64(v) => {
                *v = if inc { *v + 1.0 } else { *v - 1.0 };
                hash = *v as u32;
            }
            _ => return,
        }
        *inner.hash.get_mut() = hash;
    }
}

fn float_cmp(a: f64, b: f64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn compare_lengths(a: usize, b: usize) -> Ordering {
    a.cmp(&b)
}

fn compare_slots(a: Option<&Data>, b: Option<&Data>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.compare(y),
    }
}

/// Numeric value lifted to a comparable common form.
pub(crate) enum Numeric {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Numeric {
    pub(crate) fn compare(&self, other: &Numeric) -> Ordering {
        use Numeric::*;
        match (self, other) {
            (Signed(a), Signed(b)) => a.cmp(b),
            (Unsigned(a), Unsigned(b)) => a.cmp(b),
            (Float(a), Float(b)) => float_cmp(*a, *b),
            (Signed(a), Unsigned(b)) => {
                if *a < 0 { Ordering::Less } else { (*a as u64).cmp(b) }
            }
            (Unsigned(a), Signed(b)) => {
                if *b < 0 { Ordering::Greater } else { a.cmp(&(*b as u64)) }
            }
            (Signed(a), Float(b)) => float_cmp(*a as f64, *b),
            (Float(a), Signed(b)) => float_cmp(*a, *b as f64),
            (Unsigned(a), Float(b)) => float_cmp(*a as f64, *b),
            (Float(a), Unsigned(b)) => float_cmp(*a, *b as f64),
        }
    }
}

pub(crate) fn numeric_rank(value: &Value) -> Option<Numeric> {
    Some(match value {
        Value::Int8(v) => Numeric::Signed(*v as i64),
        Value::Int16(v) => Numeric::Signed(*v as i64),
        Value::Int32(v) => Numeric::Signed(*v as i64),
        Value::Int64(v) => Numeric::Signed(*v),
        Value::UInt8(v) => Numeric::Unsigned(*v as u64),
        Value::UInt16(v) => Numeric::Unsigned(*v as u64),
        Value::UInt32(v) => Numeric::Unsigned(*v as u64),
        Value::UInt64(v) => Numeric::Unsigned(*v),
        Value::Float32(v) => Numeric::Float(*v as f64),
        Value::Float64(v) => Numeric::Float(*v),
        Value::Bool(v) => Numeric::Unsigned(*v as u64),
        _ => return None,
    })
}

impl PartialEq for Data {
    fn eq(&self, other: &Data) -> bool {
        self.equal(other)
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind_name(), self.to_json())
    }
}

macro_rules! scalar_from {
    ($t:ty, $variant:ident, $hash:expr) => {
        impl From<$t> for Data {
            fn from(v: $t) -> Data {
                Data::with_hash(Value::$variant(v), ($hash)(v))
            }
        }
    };
}

scalar_from!(i8, Int8, |v| v as u32);
scalar_from!(u8, UInt8, |v| v as u32);
scalar_from!(i16, Int16, |v| v as u32);
scalar_from!(u16, UInt16, |v| v as u32);
scalar_from!(i32, Int32, |v| v as u32);
scalar_from!(u32, UInt32, |v| v);
scalar_from!(i64, Int64, |v| v as u32);
scalar_from!(u64, UInt64, |v| v as u32);
scalar_from!(f32, Float32, |v| v as u32);
scalar_from!(f64, Float64, |v| v as u32);

impl From<bool> for Data {
    fn from(v: bool) -> Data {
        Data::bool_value(v)
    }
}

impl From<&str> for Data {
    fn from(v: &str) -> Data {
        Data::with_hash(Value::String(Cow::Owned(v.to_owned())), hash_bytes(v.as_bytes()))
    }
}

impl From<String> for Data {
    fn from(v: String) -> Data {
        let hash = hash_bytes(v.as_bytes());
        Data::with_hash(Value::String(Cow::Owned(v)), hash)
    }
}
