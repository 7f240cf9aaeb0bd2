//! Numeric casts and transforms
//!
//! A cast succeeds when the source value fits the target type: integer
//! targets accept any numeric whose value lies in range (fractional
//! sources truncate toward zero), float targets accept anything within
//! their magnitude, and Bool converts both ways through 0/1 (any nonzero
//! source is true). Non-numeric sources always fail with a kind mismatch.

use crate::error::CastError;
use crate::kind::DataKind;
use crate::value::{Data, Numeric, numeric_rank};

/// Numeric target types for [`Data::cast`].
pub trait CastTarget: Sized + private::Sealed {}

impl<T: Sized + private::Sealed> CastTarget for T {}

mod private {
    use crate::value::Numeric;

    pub trait Sealed: Sized {
        fn from_numeric(n: &Numeric) -> Option<Self>;
    }
}

use private::Sealed;

macro_rules! int_target {
    ($t:ty) => {
        impl private::Sealed for $t {
            fn from_numeric(n: &Numeric) -> Option<$t> {
                match n {
                    Numeric::Signed(v) => <$t>::try_from(*v).ok(),
                    Numeric::Unsigned(v) => <$t>::try_from(*v).ok(),
                    Numeric::Float(v) => {
                        // Range check then truncate toward zero
                        if v.is_nan() || *v < (<$t>::MIN as f64) || *v > (<$t>::MAX as f64) {
                            None
                        } else {
                            Some(*v as $t)
                        }
                    }
                }
            }
        }
    };
}

int_target!(i8);
int_target!(u8);
int_target!(i16);
int_target!(u16);
int_target!(i32);
int_target!(u32);
int_target!(i64);
int_target!(u64);

impl private::Sealed for f32 {
    fn from_numeric(n: &Numeric) -> Option<f32> {
        let v = match n {
            Numeric::Signed(v) => *v as f64,
            Numeric::Unsigned(v) => *v as f64,
            Numeric::Float(v) => *v,
        };
        if v.is_finite() && (v < -f32::MAX as f64 || v > f32::MAX as f64) {
            None
        } else {
            Some(v as f32)
        }
    }
}

impl private::Sealed for f64 {
    fn from_numeric(n: &Numeric) -> Option<f64> {
        Some(match n {
            Numeric::Signed(v) => *v as f64,
            Numeric::Unsigned(v) => *v as f64,
            Numeric::Float(v) => *v,
        })
    }
}

impl private::Sealed for bool {
    fn from_numeric(n: &Numeric) -> Option<bool> {
        Some(match n {
            Numeric::Signed(v) => *v != 0,
            Numeric::Unsigned(v) => *v != 0,
            Numeric::Float(v) => *v != 0.0,
        })
    }
}

pub(crate) fn cast_numeric<T: CastTarget>(data: &Data) -> Result<T, CastError> {
    let Some(n) = numeric_rank(data.value()) else {
        return Err(CastError::TypeMismatch(data.kind()));
    };
    T::from_numeric(&n).ok_or(CastError::OutOfRange)
}

impl Data {
    /// Cast a numeric (or Bool) value to a concrete numeric type.
    ///
    /// Fails with `OutOfRange` when the value does not fit and
    /// `TypeMismatch` when the source is not numeric.
    pub fn cast<T: CastTarget>(&self) -> Result<T, CastError> {
        cast_numeric(self)
    }

    /// A new value of `kind` holding this value's casted content. A
    /// same-kind transform returns another handle to this value.
    pub fn transform(&self, kind: DataKind) -> Result<Data, CastError> {
        if self.kind() == kind {
            return Ok(self.clone());
        }
        Ok(match kind {
            DataKind::Int8 => Data::from(self.cast::<i8>()?),
            DataKind::UInt8 => Data::from(self.cast::<u8>()?),
            DataKind::Int16 => Data::from(self.cast::<i16>()?),
            DataKind::UInt16 => Data::from(self.cast::<u16>()?),
            DataKind::Int32 => Data::from(self.cast::<i32>()?),
            DataKind::UInt32 => Data::from(self.cast::<u32>()?),
            DataKind::Int64 => Data::from(self.cast::<i64>()?),
            DataKind::UInt64 => Data::from(self.cast::<u64>()?),
            DataKind::Float32 => Data::from(self.cast::<f32>()?),
            DataKind::Float64 => Data::from(self.cast::<f64>()?),
            DataKind::Bool => Data::from(self.cast::<bool>()?),
            _ => return Err(CastError::TypeMismatch(self.kind())),
        })
    }

    /// Parse a value of `kind` from its text form. `None` on a malformed
    /// number or a non-parseable kind.
    pub fn from_string(kind: DataKind, text: &str) -> Option<Data> {
        Some(match kind {
            DataKind::Int8 => Data::from(text.parse::<i8>().ok()?),
            DataKind::UInt8 => Data::from(text.parse::<u8>().ok()?),
            DataKind::Int16 => Data::from(text.parse::<i16>().ok()?),
            DataKind::UInt16 => Data::from(text.parse::<u16>().ok()?),
            DataKind::Int32 => Data::from(text.parse::<i32>().ok()?),
            DataKind::UInt32 => Data::from(text.parse::<u32>().ok()?),
            DataKind::Int64 => Data::from(text.parse::<i64>().ok()?),
            DataKind::UInt64 => Data::from(text.parse::<u64>().ok()?),
            DataKind::Float32 => Data::from(text.parse::<f32>().ok()?),
            DataKind::Float64 => Data::from(text.parse::<f64>().ok()?),
            DataKind::Bool => Data::from(text.starts_with('t') || text.starts_with('T')),
            DataKind::String => Data::from(text),
            _ => return None,
        })
    }

    /// Parse from a kind name and text form ("Int32", "-5").
    pub fn from_strings(kind_name: &str, text: &str) -> Option<Data> {
        Data::from_string(DataKind::parse(kind_name), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_to_int_in_range() {
        assert_eq!(Data::from(200i32).cast::<u8>(), Ok(200u8));
        assert_eq!(Data::from(-1i8).cast::<i64>(), Ok(-1i64));
        assert_eq!(Data::from(u64::MAX).cast::<u64>(), Ok(u64::MAX));
    }

    #[test]
    fn test_int_to_int_out_of_range() {
        assert_eq!(Data::from(256i32).cast::<u8>(), Err(CastError::OutOfRange));
        assert_eq!(Data::from(-1i32).cast::<u32>(), Err(CastError::OutOfRange));
        assert_eq!(Data::from(u64::MAX).cast::<i64>(), Err(CastError::OutOfRange));
        assert_eq!(Data::from(i64::MIN).cast::<i32>(), Err(CastError::OutOfRange));
    }

    #[test]
    fn test_float_casts() {
        assert_eq!(Data::from(2.0f64).cast::<i32>(), Ok(2));
        assert_eq!(Data::from(2.5f64).cast::<i32>(), Ok(2));
        assert_eq!(Data::from(1e10f64).cast::<i32>(), Err(CastError::OutOfRange));
        assert_eq!(Data::from(f64::NAN).cast::<i32>(), Err(CastError::OutOfRange));
        assert_eq!(Data::from(1e300f64).cast::<f32>(), Err(CastError::OutOfRange));
        assert_eq!(Data::from(1.5f32).cast::<f64>(), Ok(1.5f64));
        assert_eq!(Data::from(300i64).cast::<f32>(), Ok(300.0f32));
    }

    #[test]
    fn test_bool_casts() {
        assert_eq!(Data::from(true).cast::<i32>(), Ok(1));
        assert_eq!(Data::from(false).cast::<u64>(), Ok(0));
        assert_eq!(Data::from(0u8).cast::<bool>(), Ok(false));
        assert_eq!(Data::from(-3i16).cast::<bool>(), Ok(true));
        assert_eq!(Data::from(0.5f32).cast::<bool>(), Ok(true));
    }

    #[test]
    fn test_non_numeric_mismatch() {
        assert_eq!(
            Data::from("5").cast::<i32>(),
            Err(CastError::TypeMismatch(DataKind::String))
        );
        assert_eq!(Data::null().cast::<u8>(), Err(CastError::TypeMismatch(DataKind::Null)));
        assert!(Data::vector(1).cast::<i64>().is_err());
    }

    #[test]
    fn test_transform_same_kind_shares_identity() {
        let v = Data::from(42i32);
        let t = v.transform(DataKind::Int32).unwrap();
        assert!(v.same(&t));
        assert_eq!(v.ref_count(), 2);
    }

    #[test]
    fn test_transform_new_kind() {
        let v = Data::from(42i32);
        let t = v.transform(DataKind::UInt16).unwrap();
        assert_eq!(t.kind(), DataKind::UInt16);
        assert_eq!(t.as_u16(), Some(42));
        assert_eq!(t.ref_count(), 1);
        assert!(v.transform(DataKind::String).is_err());
    }

    #[test]
    fn test_from_string() {
        assert_eq!(Data::from_string(DataKind::Int32, "-5").unwrap().as_i32(), Some(-5));
        assert_eq!(Data::from_string(DataKind::UInt8, "255").unwrap().as_u8(), Some(255));
        assert!(Data::from_string(DataKind::UInt8, "256").is_none());
        assert_eq!(Data::from_string(DataKind::Bool, "true").unwrap().as_bool(), Some(true));
        assert_eq!(Data::from_string(DataKind::Bool, "False").unwrap().as_bool(), Some(false));
        assert_eq!(Data::from_string(DataKind::String, "text").unwrap().as_str(), Some("text"));
        assert!(Data::from_string(DataKind::Map, "{}").is_none());
        assert_eq!(Data::from_strings("float64", "2.5").unwrap().as_f64(), Some(2.5));
    }
}
