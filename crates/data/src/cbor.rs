//! CBOR codec
//!
//! Encoding uses the shortest argument width for every integer (negatives
//! as major type 1 with argument `-1 - v`), single/double precision
//! floats as supplied, definite-length strings, arrays and maps. The
//! output buffer starts at 512 bytes and doubles until 4096, then grows
//! in 1024 byte steps; the result is a Binary value.
//!
//! Decoding additionally accepts indefinite-length byte/text strings
//! (chunks are concatenated), indefinite arrays and maps, half-precision
//! floats, and unwraps tagged items to their content. Trailing bytes
//! after the first complete item are ignored.

use crate::error::ParseError;
use crate::kind::DataKind;
use crate::value::{Data, Value};

const CBOR_BUFF_SIZE: usize = 512;
const CBOR_BUFF_DOUBLING_LIMIT: usize = 4096;
const CBOR_BUFF_INCREMENT: usize = 1024;

const MAJOR_UINT: u8 = 0x00;
const MAJOR_NEGINT: u8 = 0x20;
const MAJOR_BYTES: u8 = 0x40;
const MAJOR_TEXT: u8 = 0x60;
const MAJOR_ARRAY: u8 = 0x80;
const MAJOR_MAP: u8 = 0xa0;

const SIMPLE_FALSE: u8 = 0xf4;
const SIMPLE_TRUE: u8 = 0xf5;
const SIMPLE_NULL: u8 = 0xf6;
const FLOAT_HALF: u8 = 0xf9;
const FLOAT_SINGLE: u8 = 0xfa;
const FLOAT_DOUBLE: u8 = 0xfb;
const BREAK: u8 = 0xff;

struct CborBuf {
    data: Vec<u8>,
    capacity: usize,
}

impl CborBuf {
    fn new(capacity: usize) -> CborBuf {
        CborBuf { data: Vec::with_capacity(capacity), capacity }
    }

    fn ensure(&mut self, required: usize) {
        if self.capacity - self.data.len() < required {
            let mut inc = if self.capacity > CBOR_BUFF_DOUBLING_LIMIT {
                CBOR_BUFF_INCREMENT
            } else {
                self.capacity
            };
            if inc < required {
                inc = required;
            }
            self.capacity += inc;
            self.data.reserve(self.capacity - self.data.len());
        }
    }

    fn byte(&mut self, b: u8) {
        self.ensure(1);
        self.data.push(b);
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        self.data.extend_from_slice(bytes);
    }

    /// Head byte for `major` with the shortest argument encoding.
    fn head(&mut self, major: u8, value: u64) {
        if value < 0x18 {
            self.byte(major + value as u8);
        } else if value <= u8::MAX as u64 {
            self.byte(major + 0x18);
            self.byte(value as u8);
        } else if value <= u16::MAX as u64 {
            self.byte(major + 0x19);
            self.bytes(&(value as u16).to_be_bytes());
        } else if value <= u32::MAX as u64 {
            self.byte(major + 0x1a);
            self.bytes(&(value as u32).to_be_bytes());
        } else {
            self.byte(major + 0x1b);
            self.bytes(&value.to_be_bytes());
        }
    }

    fn int(&mut self, value: i64) {
        if value < 0 {
            self.head(MAJOR_NEGINT, !(value) as u64);
        } else {
            self.head(MAJOR_UINT, value as u64);
        }
    }
}

fn encode(buf: &mut CborBuf, data: &Data) {
    match data.value() {
        Value::Int8(v) => buf.int(*v as i64),
        Value::Int16(v) => buf.int(*v as i64),
        Value::Int32(v) => buf.int(*v as i64),
        Value::Int64(v) => buf.int(*v),
        Value::UInt8(v) => buf.head(MAJOR_UINT, *v as u64),
        Value::UInt16(v) => buf.head(MAJOR_UINT, *v as u64),
        Value::UInt32(v) => buf.head(MAJOR_UINT, *v as u64),
        Value::UInt64(v) => buf.head(MAJOR_UINT, *v),
        Value::Float32(v) => {
            buf.byte(FLOAT_SINGLE);
            buf.bytes(&v.to_be_bytes());
        }
        Value::Float64(v) => {
            buf.byte(FLOAT_DOUBLE);
            buf.bytes(&v.to_be_bytes());
        }
        Value::Bool(v) => buf.byte(if *v { SIMPLE_TRUE } else { SIMPLE_FALSE }),
        Value::Null => buf.byte(SIMPLE_NULL),
        Value::Pointer(_) => {}
        Value::String(s) => {
            buf.head(MAJOR_TEXT, s.len() as u64);
            buf.bytes(s.as_bytes());
        }
        Value::Binary(_) => {
            let bytes = data.as_bytes().unwrap();
            buf.head(MAJOR_BYTES, bytes.len() as u64);
            buf.bytes(bytes);
        }
        Value::Array(_) => {
            buf.head(MAJOR_ARRAY, data.array_len() as u64);
            for element in data.array_iter() {
                encode(buf, &element);
            }
        }
        Value::Vector(v) => {
            buf.head(MAJOR_ARRAY, v.slots.len() as u64);
            for slot in v.slots.iter() {
                match slot {
                    Some(value) => encode(buf, value),
                    None => buf.byte(SIMPLE_NULL),
                }
            }
        }
        Value::List(l) => {
            buf.head(MAJOR_ARRAY, l.items.len() as u64);
            for item in l.items.iter() {
                encode(buf, item);
            }
        }
        Value::Map(m) => {
            buf.head(MAJOR_MAP, m.len() as u64);
            for (key, value) in m.iter() {
                encode(buf, key);
                encode(buf, value);
            }
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, ParseError> {
        let b = *self.buf.get(self.pos).ok_or(ParseError::Cbor("truncated input"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        if self.pos + n > self.buf.len() {
            return Err(ParseError::Cbor("truncated input"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Argument value and its encoded width class (0, 1, 2, 4, 8 bytes).
    fn argument(&mut self, info: u8) -> Result<(u64, u8), ParseError> {
        Ok(match info {
            0..=0x17 => (info as u64, 0),
            0x18 => (self.byte()? as u64, 1),
            0x19 => (u16::from_be_bytes(self.take(2)?.try_into().unwrap()) as u64, 2),
            0x1a => (u32::from_be_bytes(self.take(4)?.try_into().unwrap()) as u64, 4),
            0x1b => (u64::from_be_bytes(self.take(8)?.try_into().unwrap()), 8),
            _ => return Err(ParseError::Cbor("unsupported argument encoding")),
        })
    }

    /// Concatenate the chunks of a definite or indefinite string.
    fn string_payload(&mut self, major: u8, info: u8) -> Result<Vec<u8>, ParseError> {
        if info != 0x1f {
            let (len, _) = self.argument(info)?;
            return Ok(self.take(len as usize)?.to_vec());
        }
        let mut payload = Vec::new();
        loop {
            let head = self.byte()?;
            if head == BREAK {
                return Ok(payload);
            }
            if head & 0xe0 != major || head & 0x1f == 0x1f {
                return Err(ParseError::Cbor("bad chunk in indefinite string"));
            }
            let (len, _) = self.argument(head & 0x1f)?;
            payload.extend_from_slice(self.take(len as usize)?);
        }
    }

    fn item(&mut self) -> Result<Data, ParseError> {
        let head = self.byte()?;
        let major = head & 0xe0;
        let info = head & 0x1f;
        match major {
            MAJOR_UINT => {
                let (value, width) = self.argument(info)?;
                Ok(match width {
                    0 | 1 => Data::from(value as u8),
                    2 => Data::from(value as u16),
                    4 => Data::from(value as u32),
                    _ => Data::from(value),
                })
            }
            MAJOR_NEGINT => {
                let (value, width) = self.argument(info)?;
                if value > i64::MAX as u64 {
                    return Err(ParseError::Cbor("negative integer overflow"));
                }
                let v = -1i64 - value as i64;
                Ok(match width {
                    0 | 1 => Data::from(v as i16),
                    2 => Data::from(v as i32),
                    _ => Data::from(v),
                })
            }
            MAJOR_BYTES => Ok(Data::binary(self.string_payload(MAJOR_BYTES, info)?)),
            MAJOR_TEXT => {
                let payload = self.string_payload(MAJOR_TEXT, info)?;
                let text = String::from_utf8(payload)
                    .map_err(|_| ParseError::Cbor("text string is not UTF-8"))?;
                Ok(Data::from(text))
            }
            MAJOR_ARRAY => {
                let mut elements = Vec::new();
                if info == 0x1f {
                    loop {
                        if self.buf.get(self.pos) == Some(&BREAK) {
                            self.pos += 1;
                            break;
                        }
                        elements.push(self.item()?);
                    }
                } else {
                    let (len, _) = self.argument(info)?;
                    for _ in 0..len {
                        elements.push(self.item()?);
                    }
                }
                Ok(Data::vector_of(elements))
            }
            MAJOR_MAP => {
                let mut map = Data::map(DataKind::String);
                let mut decode_pair = |r: &mut Reader<'a>| -> Result<(), ParseError> {
                    let key = r.item()?;
                    if key.kind() != DataKind::String {
                        return Err(ParseError::Cbor("map key must be a text string"));
                    }
                    let value = r.item()?;
                    map.map_insert(key, value);
                    Ok(())
                };
                if info == 0x1f {
                    loop {
                        if self.buf.get(self.pos) == Some(&BREAK) {
                            self.pos += 1;
                            break;
                        }
                        decode_pair(self)?;
                    }
                } else {
                    let (len, _) = self.argument(info)?;
                    for _ in 0..len {
                        decode_pair(self)?;
                    }
                }
                Ok(map)
            }
            0xc0 => {
                // Tagged item: the tag is dropped, the content kept
                let _ = self.argument(info)?;
                self.item()
            }
            _ => match head {
                SIMPLE_FALSE => Ok(Data::from(false)),
                SIMPLE_TRUE => Ok(Data::from(true)),
                SIMPLE_NULL | 0xf7 => Ok(Data::null()),
                FLOAT_HALF => {
                    let bits = u16::from_be_bytes(self.take(2)?.try_into().unwrap());
                    Ok(Data::from(half_to_f32(bits)))
                }
                FLOAT_SINGLE => {
                    let bits = u32::from_be_bytes(self.take(4)?.try_into().unwrap());
                    Ok(Data::from(f32::from_bits(bits)))
                }
                FLOAT_DOUBLE => {
                    let bits = u64::from_be_bytes(self.take(8)?.try_into().unwrap());
                    Ok(Data::from(f64::from_bits(bits)))
                }
                _ => Err(ParseError::Cbor("unsupported item")),
            },
        }
    }
}

fn half_to_f32(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0f32 } else { 1.0 };
    let exp = (bits >> 10) & 0x1f;
    let frac = (bits & 0x03ff) as f32;
    sign * match exp {
        0 => frac * (-24f32).exp2(),
        0x1f => {
            if frac == 0.0 {
                f32::INFINITY
            } else {
                f32::NAN
            }
        }
        e => (1.0 + frac / 1024.0) * ((e as i32 - 15) as f32).exp2(),
    }
}

impl Data {
    /// Encode to CBOR, returned as a Binary value.
    pub fn to_cbor(&self) -> Data {
        self.to_cbor_with_size(CBOR_BUFF_SIZE)
    }

    /// Encode to CBOR with a caller-chosen initial buffer size.
    pub fn to_cbor_with_size(&self, size: usize) -> Data {
        let mut buf = CborBuf::new(size.max(1));
        encode(&mut buf, self);
        Data::binary(buf.data)
    }

    /// Decode the first complete CBOR item; trailing bytes are ignored.
    pub fn from_cbor(bytes: &[u8]) -> Result<Data, ParseError> {
        Reader { buf: bytes, pos: 0 }.item()
    }

    /// Decode CBOR held in a Binary value.
    pub fn from_cbor_value(cbor: &Data) -> Result<Data, ParseError> {
        let bytes = cbor.as_bytes().ok_or(ParseError::Cbor("input must be a Binary value"))?;
        Data::from_cbor(bytes)
    }
}
