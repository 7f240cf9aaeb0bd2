//! serde export of values
//!
//! Enables handing values to external systems (files, queues, HTTP
//! bodies) through any serde serializer. Pointer values carry opaque
//! runtime state and refuse to serialize; everything else maps onto the
//! serde data model directly (Binary as a byte string, empty Vector
//! slots as nulls). Decoding external data comes in through the crate's
//! own codecs, so no `Deserialize` is provided.

use crate::value::{Data, Value};
use serde::ser::{Error, Serialize, SerializeMap, SerializeSeq, Serializer};

impl Serialize for Data {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value() {
            Value::Int8(v) => serializer.serialize_i8(*v),
            Value::UInt8(v) => serializer.serialize_u8(*v),
            Value::Int16(v) => serializer.serialize_i16(*v),
            Value::UInt16(v) => serializer.serialize_u16(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::UInt32(v) => serializer.serialize_u32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::UInt64(v) => serializer.serialize_u64(*v),
            Value::Float32(v) => serializer.serialize_f32(*v),
            Value::Float64(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Null => serializer.serialize_unit(),
            Value::Pointer(_) => Err(S::Error::custom("Pointer values are not serializable")),
            Value::Binary(_) => serializer.serialize_bytes(self.as_bytes().unwrap()),
            Value::Array(_) => {
                let mut seq = serializer.serialize_seq(Some(self.array_len() as usize))?;
                for element in self.array_iter() {
                    seq.serialize_element(&element)?;
                }
                seq.end()
            }
            Value::Vector(v) => {
                let mut seq = serializer.serialize_seq(Some(v.slots.len()))?;
                for slot in v.slots.iter() {
                    seq.serialize_element(slot)?;
                }
                seq.end()
            }
            Value::List(l) => {
                let mut seq = serializer.serialize_seq(Some(l.items.len()))?;
                for item in l.items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len() as usize))?;
                for (key, value) in m.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}
