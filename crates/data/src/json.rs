//! JSON codec: tokenizer, value builder and emitter
//!
//! The tokenizer produces a flat token stream over the input without
//! allocating per-token text; the builder walks the stream creating
//! values. Objects become String-keyed Maps (ordered mode attaches the
//! key appearance order as metadata under [`Data::order_key`]), arrays
//! become Vectors, and primitives widen: any number with '.', 'e' or 'E'
//! is Float64, a leading '-' makes Int64, anything else is Int64 unless
//! it only fits UInt64.
//!
//! The emitter sizes escaped strings before appending so the buffer grows
//! at most once per fragment: doubling up to 4096 bytes, then in 1024
//! byte steps. Infinities are emitted as the overflow sentinels `1e400`
//! (Float32) and `1e800` (Float64), which parse back to infinity.

use crate::error::{ParseError, TokenError};
use crate::kind::DataKind;
use crate::value::{Data, Value};
use base64::prelude::*;

/// Token kind in the flat stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Undefined,
    Object,
    Array,
    String,
    /// String containing at least one escape sequence.
    StringEscaped,
    Primitive,
}

/// One token: byte offsets into the input, child count and parent index
/// (-1 for the root).
#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub start: i32,
    pub end: i32,
    pub size: u32,
    pub parent: i32,
}

impl Token {
    fn open() -> Token {
        Token { kind: TokenKind::Undefined, start: -1, end: -1, size: 0, parent: -1 }
    }

    fn text<'a>(&self, json: &'a str) -> &'a str {
        &json[self.start as usize..self.end as usize]
    }
}

struct Tokenizer {
    pos: usize,
    toksuper: i32,
    tokens: Vec<Token>,
    max_tokens: usize,
}

impl Tokenizer {
    fn alloc(&mut self) -> Result<usize, TokenError> {
        if self.tokens.len() >= self.max_tokens {
            return Err(TokenError::NoMemory);
        }
        self.tokens.push(Token::open());
        Ok(self.tokens.len() - 1)
    }

    fn parse_primitive(&mut self, js: &[u8]) -> Result<(), TokenError> {
        let start = self.pos;
        while self.pos < js.len() {
            match js[self.pos] {
                b'\t' | b'\r' | b'\n' | b' ' | b',' | b']' | b'}' | b':' => break,
                c if c < 32 || c >= 127 => {
                    self.pos = start;
                    return Err(TokenError::Invalid);
                }
                _ => self.pos += 1,
            }
        }
        let index = self.alloc().inspect_err(|_| self.pos = start)?;
        self.tokens[index] = Token {
            kind: TokenKind::Primitive,
            start: start as i32,
            end: self.pos as i32,
            size: 0,
            parent: self.toksuper,
        };
        self.pos -= 1;
        Ok(())
    }

    fn parse_string(&mut self, js: &[u8]) -> Result<(), TokenError> {
        let start = self.pos;
        let mut escaped = false;
        self.pos += 1; // skip opening quote
        while self.pos < js.len() {
            let c = js[self.pos];
            if c == b'"' {
                let index = self.alloc().inspect_err(|_| self.pos = start)?;
                self.tokens[index] = Token {
                    kind: if escaped { TokenKind::StringEscaped } else { TokenKind::String },
                    start: start as i32 + 1,
                    end: self.pos as i32,
                    size: 0,
                    parent: self.toksuper,
                };
                return Ok(());
            }
            if c == b'\\' && self.pos + 1 < js.len() {
                escaped = true;
                self.pos += 1;
                match js[self.pos] {
                    b'"' | b'/' | b'\\' | b'b' | b'f' | b'r' | b'n' | b't' => {}
                    b'u' => {
                        for _ in 0..4 {
                            self.pos += 1;
                            if self.pos >= js.len() || !js[self.pos].is_ascii_hexdigit() {
                                self.pos = start;
                                return Err(TokenError::Invalid);
                            }
                        }
                    }
                    _ => {
                        self.pos = start;
                        return Err(TokenError::Invalid);
                    }
                }
            }
            self.pos += 1;
        }
        self.pos = start;
        Err(TokenError::Part)
    }
}

/// Tokenize `json` into at most `max_tokens` tokens.
pub fn tokenize(json: &str, max_tokens: u32) -> Result<Vec<Token>, TokenError> {
    let js = json.as_bytes();
    let mut p = Tokenizer {
        pos: 0,
        toksuper: -1,
        tokens: Vec::new(),
        max_tokens: max_tokens as usize,
    };

    while p.pos < js.len() {
        match js[p.pos] {
            c @ (b'{' | b'[') => {
                let index = p.alloc()?;
                if p.toksuper != -1 {
                    p.tokens[p.toksuper as usize].size += 1;
                }
                p.tokens[index] = Token {
                    kind: if c == b'{' { TokenKind::Object } else { TokenKind::Array },
                    start: p.pos as i32,
                    end: -1,
                    size: 0,
                    parent: p.toksuper,
                };
                p.toksuper = index as i32;
            }
            c @ (b'}' | b']') => {
                let kind = if c == b'}' { TokenKind::Object } else { TokenKind::Array };
                // Close the innermost open token, which must match
                let mut index = p.tokens.len() as i32 - 1;
                while index >= 0 {
                    let token = &mut p.tokens[index as usize];
                    if token.start != -1 && token.end == -1 {
                        if token.kind != kind {
                            return Err(TokenError::Invalid);
                        }
                        token.end = p.pos as i32 + 1;
                        p.toksuper = token.parent;
                        break;
                    }
                    index -= 1;
                }
                if index == -1 {
                    return Err(TokenError::Invalid);
                }
            }
            b'"' => {
                p.parse_string(js)?;
                if p.toksuper != -1 {
                    p.tokens[p.toksuper as usize].size += 1;
                }
            }
            b'\t' | b'\r' | b'\n' | b' ' => {}
            b':' => p.toksuper = p.tokens.len() as i32 - 1,
            b',' => {
                if p.toksuper != -1
                    && !matches!(
                        p.tokens[p.toksuper as usize].kind,
                        TokenKind::Array | TokenKind::Object
                    )
                {
                    p.toksuper = p.tokens[p.toksuper as usize].parent;
                }
            }
            _ => {
                p.parse_primitive(js)?;
                if p.toksuper != -1 {
                    p.tokens[p.toksuper as usize].size += 1;
                }
            }
        }
        p.pos += 1;
    }

    if p.tokens.iter().any(|t| t.start != -1 && t.end == -1) {
        return Err(TokenError::Part);
    }
    Ok(p.tokens)
}

// ----------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------

fn decode_escapes(raw: &str) -> Result<String, ParseError> {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            let c = raw[i..].chars().next().unwrap();
            out.push(c);
            i += c.len_utf8();
            continue;
        }
        i += 1;
        match bytes[i] {
            b'b' => out.push('\u{0008}'),
            b'f' => out.push('\u{000c}'),
            b'r' => out.push('\r'),
            b'n' => out.push('\n'),
            b't' => out.push('\t'),
            b'u' => {
                let hex = &raw[i + 1..i + 5];
                let cp = u32::from_str_radix(hex, 16).map_err(|_| TokenError::Invalid)?;
                // Only the Latin-1 range (high byte 00 or 01) is supported
                if cp > 0x01ff {
                    return Err(ParseError::Json(TokenError::Invalid));
                }
                out.push(char::from_u32(cp).unwrap());
                i += 4;
            }
            c => out.push(c as char),
        }
        i += 1;
    }
    Ok(out)
}

fn string_from_token(json: &str, token: &Token) -> Result<String, ParseError> {
    let raw = token.text(json);
    if token.kind == TokenKind::StringEscaped {
        decode_escapes(raw)
    } else {
        Ok(raw.to_owned())
    }
}

/// Dedup a parsed string through the shared cache map.
fn cached_string(cache: &mut Data, text: String) -> Data {
    let value = Data::from(text);
    if let Some(cached) = cache.map_get(&value).cloned() {
        return cached;
    }
    cache.map_insert(value.clone(), value.clone());
    value
}

fn primitive_from_token(json: &str, token: &Token) -> Result<Data, ParseError> {
    let text = token.text(json);
    match text.as_bytes().first() {
        Some(b't') => Ok(Data::from(true)),
        Some(b'f') => Ok(Data::from(false)),
        Some(b'n') => Ok(Data::null()),
        _ => {
            if text.contains(['.', 'e', 'E']) {
                // Overflowing literals (1e400, 1e800) parse to infinity
                text.parse::<f64>().map(Data::from).map_err(|_| ParseError::JsonNumber)
            } else if text.starts_with('-') {
                text.parse::<i64>().map(Data::from).map_err(|_| ParseError::JsonNumber)
            } else {
                let wide = text.parse::<u64>().map_err(|_| ParseError::JsonNumber)?;
                Ok(match i64::try_from(wide) {
                    Ok(narrow) => Data::from(narrow),
                    Err(_) => Data::from(wide),
                })
            }
        }
    }
}

struct Builder<'a> {
    json: &'a str,
    tokens: &'a [Token],
    next: usize,
    ordered: bool,
}

impl Builder<'_> {
    fn take(&mut self) -> Result<&Token, ParseError> {
        let token = self.tokens.get(self.next).ok_or(ParseError::Json(TokenError::Part))?;
        self.next += 1;
        Ok(token)
    }

    fn string(&mut self, cache: &mut Data) -> Result<Data, ParseError> {
        let token = *self.take()?;
        let text = string_from_token(self.json, &token)?;
        Ok(cached_string(cache, text))
    }

    fn value(&mut self, cache: &mut Data) -> Result<Data, ParseError> {
        let token = *self.take()?;
        match token.kind {
            TokenKind::Primitive => primitive_from_token(self.json, &token),
            TokenKind::Object => {
                let mut map = Data::map(DataKind::String);
                let mut ordering =
                    if self.ordered { Some(Data::vector(token.size)) } else { None };
                for i in 0..token.size {
                    let key = self.string(cache)?;
                    if let Some(ordering) = ordering.as_mut() {
                        ordering.vector_set(i, Some(key.clone()));
                    }
                    let value = self.value(cache)?;
                    map.map_insert(key, value);
                }
                if let Some(ordering) = ordering {
                    map.set_metadata(Data::order_key(), ordering);
                }
                Ok(map)
            }
            TokenKind::Array => {
                let mut vector = Data::vector(token.size);
                for i in 0..token.size {
                    let value = self.value(cache)?;
                    vector.vector_set(i, Some(value));
                }
                Ok(vector)
            }
            _ => {
                self.next -= 1;
                self.string(cache)
            }
        }
    }
}

impl Data {
    /// Decode JSON. Empty input yields Null.
    pub fn from_json(json: &str) -> Result<Data, ParseError> {
        Data::from_json_with_cache(json, false, None)
    }

    /// Decode JSON; in ordered mode every object carries its key
    /// appearance order as metadata, which the emitter honours.
    pub fn from_json_ordered(json: &str, ordered: bool) -> Result<Data, ParseError> {
        Data::from_json_with_cache(json, ordered, None)
    }

    /// Decode JSON, deduplicating every parsed string (keys and values)
    /// through a caller-supplied String-keyed cache map. The cache is not
    /// owned by the result and may be reused across documents.
    pub fn from_json_with_cache(
        json: &str,
        ordered: bool,
        cache: Option<&mut Data>,
    ) -> Result<Data, ParseError> {
        if json.is_empty() {
            return Ok(Data::null());
        }
        // Approximate token count from the separator density
        let mut count: u32 = 1;
        for c in json.bytes() {
            match c {
                b',' | b'{' => count += 1,
                b':' | b'[' => count += 2,
                _ => {}
            }
        }
        let tokens = tokenize(json, count)?;
        let mut builder = Builder { json, tokens: &tokens, next: 0, ordered };
        match cache {
            Some(cache) => {
                assert!(
                    cache.kind() == DataKind::Map && cache.key_kind() == DataKind::String,
                    "string cache must be a String-keyed map"
                );
                builder.value(cache)
            }
            None => builder.value(&mut Data::map(DataKind::String)),
        }
    }

    /// Encode to JSON.
    pub fn to_json(&self) -> String {
        self.to_json_with_size(JSON_BUFF_SIZE)
    }

    /// Encode to JSON with a caller-chosen initial buffer size.
    pub fn to_json_with_size(&self, size: usize) -> String {
        let mut buf = JsonBuf::new(size.max(1));
        emit(&mut buf, self);
        buf.data
    }
}

// ----------------------------------------------------------------------
// Emitter
// ----------------------------------------------------------------------

const JSON_BUFF_SIZE: usize = 512;
const JSON_BUFF_DOUBLING_LIMIT: usize = 4096;
const JSON_BUFF_INCREMENT: usize = 1024;

struct JsonBuf {
    data: String,
    capacity: usize,
}

impl JsonBuf {
    fn new(capacity: usize) -> JsonBuf {
        JsonBuf { data: String::with_capacity(capacity), capacity }
    }

    fn ensure(&mut self, required: usize) {
        if self.capacity - self.data.len() < required {
            let mut inc = if self.capacity > JSON_BUFF_DOUBLING_LIMIT {
                JSON_BUFF_INCREMENT
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

    fn raw(&mut self, s: &str) {
        self.ensure(s.len());
        self.data.push_str(s);
    }

    /// Byte footprint of one char once escaped.
    fn repr_size(c: char) -> usize {
        match c {
            '"' | '\\' | '\u{0008}' | '\u{000c}' | '\n' | '\r' | '\t' => 2,
            c if (c as u32) < 0x20 => 6,
            c => c.len_utf8(),
        }
    }

    /// Append with JSON escaping, sized up front.
    fn escaped(&mut self, s: &str) {
        let adjusted: usize = s.chars().map(Self::repr_size).sum();
        self.ensure(adjusted);
        if adjusted == s.len() {
            self.data.push_str(s);
            return;
        }
        for c in s.chars() {
            match c {
                '"' => self.data.push_str("\\\""),
                '\\' => self.data.push_str("\\\\"),
                '\u{0008}' => self.data.push_str("\\b"),
                '\u{000c}' => self.data.push_str("\\f"),
                '\n' => self.data.push_str("\\n"),
                '\r' => self.data.push_str("\\r"),
                '\t' => self.data.push_str("\\t"),
                c if (c as u32) < 0x20 => {
                    self.data.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => self.data.push(c),
            }
        }
    }
}

fn emit_f32(buf: &mut JsonBuf, v: f32) {
    if v.is_infinite() {
        buf.raw("1e400");
    } else {
        buf.raw(&format!("{:.8e}", v));
    }
}

fn emit_f64(buf: &mut JsonBuf, v: f64) {
    if v.is_infinite() {
        buf.raw("1e800");
    } else {
        buf.raw(&format!("{:.16e}", v));
    }
}

fn emit(buf: &mut JsonBuf, data: &Data) {
    match data.value() {
        Value::Int8(v) => buf.raw(&v.to_string()),
        Value::UInt8(v) => buf.raw(&v.to_string()),
        Value::Int16(v) => buf.raw(&v.to_string()),
        Value::UInt16(v) => buf.raw(&v.to_string()),
        Value::Int32(v) => buf.raw(&v.to_string()),
        Value::UInt32(v) => buf.raw(&v.to_string()),
        Value::Int64(v) => buf.raw(&v.to_string()),
        Value::UInt64(v) => buf.raw(&v.to_string()),
        Value::Float32(v) => emit_f32(buf, *v),
        Value::Float64(v) => emit_f64(buf, *v),
        Value::Bool(v) => buf.raw(if *v { "true" } else { "false" }),
        Value::Null | Value::Pointer(_) => buf.raw("null"),
        Value::String(s) => {
            buf.raw("\"");
            buf.escaped(s);
            buf.raw("\"");
        }
        Value::Binary(_) => {
            buf.raw("\"");
            let encoded = BASE64_STANDARD.encode(data.as_bytes().unwrap());
            buf.raw(&encoded);
            buf.raw("\"");
        }
        Value::Array(_) => {
            buf.raw("[");
            let len = data.array_len();
            for (i, element) in data.array_iter().enumerate() {
                emit(buf, &element);
                if (i as u32) < len - 1 {
                    buf.raw(",");
                }
            }
            buf.raw("]");
        }
        Value::Vector(v) => {
            buf.raw("[");
            for (i, slot) in v.slots.iter().enumerate() {
                match slot {
                    Some(value) => emit(buf, value),
                    None => buf.raw("null"),
                }
                if i < v.slots.len() - 1 {
                    buf.raw(",");
                }
            }
            buf.raw("]");
        }
        Value::List(l) => {
            buf.raw("[");
            for (i, item) in l.items.iter().enumerate() {
                emit(buf, item);
                if i < l.items.len() - 1 {
                    buf.raw(",");
                }
            }
            buf.raw("]");
        }
        Value::Map(m) => {
            buf.raw("{");
            let ordering = data.get_metadata(&Data::order_key());
            let mut first = true;
            let mut emit_pair = |buf: &mut JsonBuf, key: &Data, value: &Data| {
                if !first {
                    buf.raw(",");
                }
                let quoted = key.kind() != DataKind::String;
                if quoted {
                    buf.raw("\"");
                }
                emit(buf, key);
                if quoted {
                    buf.raw("\"");
                }
                buf.raw(":");
                emit(buf, value);
                first = false;
            };
            match ordering {
                Some(ordering) => {
                    for key in ordering.vector_iter().flatten() {
                        if let Some(value) = data.map_get(key) {
                            emit_pair(buf, key, value);
                        }
                    }
                }
                None => {
                    for (key, value) in m.iter() {
                        emit_pair(buf, key, value);
                    }
                }
            }
            buf.raw("}");
        }
    }
}
