//! XML decoding into nested maps
//!
//! Every element becomes a String-keyed Map `{name, attributes,
//! children?, content?}`: `attributes` is always present (possibly
//! empty), `children` is a Vector added with the first child element,
//! and `content` carries the element's trailing text when it is not
//! pure whitespace.

use crate::error::ParseError;
use crate::kind::DataKind;
use crate::value::Data;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

struct Element {
    map: Data,
    children: Vec<Data>,
    content: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Element, ParseError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Data::map(DataKind::String);
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| ParseError::Xml(e.to_string()))?;
            attrs.map_insert_str(&key, Data::from(value.into_owned()));
        }
        let mut map = Data::map(DataKind::String);
        map.map_insert_str("name", Data::from(name));
        map.map_insert_str("attributes", attrs);
        Ok(Element { map, children: Vec::new(), content: String::new() })
    }

    fn close(mut self) -> Data {
        if !self.children.is_empty() {
            self.map.map_insert_str("children", Data::vector_of(self.children));
        }
        if !self.content.trim().is_empty() {
            self.map.map_insert_str("content", Data::from(self.content));
        }
        self.map
    }
}

impl Data {
    /// Decode an XML document into its element-map form.
    pub fn from_xml(xml: &str) -> Result<Data, ParseError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        loop {
            match reader.read_event().map_err(|e| ParseError::Xml(e.to_string()))? {
                Event::Start(start) => {
                    if let Some(parent) = stack.last_mut() {
                        // Text preceding a child element is dropped
                        parent.content.clear();
                    }
                    stack.push(Element::open(&start)?);
                }
                Event::Empty(start) => {
                    let element = Element::open(&start)?.close();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let Some(element) = stack.pop() else {
                        return Err(ParseError::Xml("unexpected closing element".into()));
                    };
                    let element = element.close();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        let chunk = text.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                        top.content.push_str(&chunk);
                    }
                }
                Event::Eof => {
                    return Err(ParseError::Xml("unexpected end of document".into()));
                }
                // Declarations, comments, processing instructions, CDATA
                _ => {}
            }
        }
    }
}
