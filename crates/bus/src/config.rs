//! Typed accessors over configuration maps
//!
//! Component factories read their settings from String-keyed data maps.
//! Numeric getters coerce (an `Interval` written as `500` in JSON arrives
//! as Int64 and still configures a u64 field); a miss or an impossible
//! coercion logs an error and yields `None`.

use tether_data::{Data, DataKind};
use tracing::error;

fn config_cast<T: tether_data::CastTarget>(map: &Data, key: &str) -> Option<T> {
    let value = map.map_get_str(key)?;
    match value.cast::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            error!(key, %e, "failed to resolve configuration value");
            None
        }
    }
}

pub fn config_i64(map: &Data, key: &str) -> Option<i64> {
    config_cast(map, key)
}

pub fn config_u64(map: &Data, key: &str) -> Option<u64> {
    config_cast(map, key)
}

pub fn config_i32(map: &Data, key: &str) -> Option<i32> {
    config_cast(map, key)
}

pub fn config_u32(map: &Data, key: &str) -> Option<u32> {
    config_cast(map, key)
}

pub fn config_f64(map: &Data, key: &str) -> Option<f64> {
    config_cast(map, key)
}

pub fn config_bool(map: &Data, key: &str) -> Option<bool> {
    config_cast(map, key)
}

/// Strictly a String value; no coercion.
pub fn config_string<'a>(map: &'a Data, key: &str) -> Option<&'a str> {
    match map.map_get_str(key) {
        Some(value) if value.kind() == DataKind::String => value.as_str(),
        Some(value) => {
            error!(key, kind = value.kind_name(), "configuration value is not a string");
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Data {
        Data::from_json(r#"{"Interval": 500, "Name": "core", "Retain": true, "Rate": 2.5}"#)
            .unwrap()
    }

    #[test]
    fn test_numeric_coercion() {
        let map = sample();
        // JSON integers arrive as Int64 and coerce to the asked width
        assert_eq!(config_u64(&map, "Interval"), Some(500));
        assert_eq!(config_i32(&map, "Interval"), Some(500));
        assert_eq!(config_f64(&map, "Rate"), Some(2.5));
        assert_eq!(config_bool(&map, "Retain"), Some(true));
    }

    #[test]
    fn test_missing_and_mismatched() {
        let map = sample();
        assert_eq!(config_u64(&map, "Absent"), None);
        assert_eq!(config_u32(&map, "Name"), None);
        assert_eq!(config_string(&map, "Interval"), None);
        assert_eq!(config_string(&map, "Name"), Some("core"));
    }
}
