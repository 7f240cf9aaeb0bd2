//! YAML decoding
//!
//! Mappings become String-keyed Maps, sequences become Vectors, and
//! plain scalars are recognised as bool/null/integer/float before
//! falling back to strings (quoted scalars always stay strings).
//! Malformed input reports "<problem> at line <n>".

use crate::error::ParseError;
use crate::kind::DataKind;
use crate::value::Data;
use serde_yaml::Value as Yaml;

fn convert(value: Yaml) -> Result<Data, ParseError> {
    Ok(match value {
        Yaml::Null => Data::null(),
        Yaml::Bool(b) => Data::from(b),
        Yaml::Number(n) => {
            if let Some(v) = n.as_i64() {
                Data::from(v)
            } else if let Some(v) = n.as_u64() {
                Data::from(v)
            } else {
                Data::from(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Yaml::String(s) => Data::from(s),
        Yaml::Sequence(seq) => {
            let mut elements = Vec::with_capacity(seq.len());
            for item in seq {
                elements.push(convert(item)?);
            }
            Data::vector_of(elements)
        }
        Yaml::Mapping(mapping) => {
            let mut map = Data::map(DataKind::String);
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Bool(b) => b.to_string(),
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Null => "null".to_owned(),
                    _ => {
                        return Err(ParseError::Yaml(
                            "unsupported composite mapping key".into(),
                        ));
                    }
                };
                map.map_insert_str(&key, convert(value)?);
            }
            map
        }
        Yaml::Tagged(tagged) => convert(tagged.value)?,
    })
}

impl Data {
    /// Decode a YAML document. An empty document yields Null.
    pub fn from_yaml(yaml: &str) -> Result<Data, ParseError> {
        if yaml.trim().is_empty() {
            return Ok(Data::null());
        }
        let value: Yaml =
            serde_yaml::from_str(yaml).map_err(|e| ParseError::Yaml(e.to_string()))?;
        convert(value)
    }
}
