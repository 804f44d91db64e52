use crate::collection::{Document, NestId};
use crate::common::Value;
use crate::errors::{ErrorKind, NestError, NestResult};
use chrono::{DateTime, Utc};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};

/// Conversion between a leaf Rust type and a [`Value`].
///
/// Numbers convert across widths as long as the value fits the target type;
/// anything else is a [`ErrorKind::MappingError`].
pub trait FieldValue: Sized {
    fn to_value(&self) -> NestResult<Value>;
    fn from_value(value: &Value) -> NestResult<Self>;
}

fn mismatch<T>(value: &Value) -> NestError {
    let target = std::any::type_name::<T>();
    log::error!("Value {} cannot be read as {}", value, target);
    NestError::new(
        &format!("Value {} of type {} cannot be read as {}", value, value.type_name(), target),
        ErrorKind::MappingError,
    )
}

macro_rules! impl_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                #[inline]
                fn to_value(&self) -> NestResult<Value> {
                    Ok(Value::from(*self))
                }

                fn from_value(value: &Value) -> NestResult<Self> {
                    let converted = match value {
                        Value::U64(v) => <$ty>::try_from(*v).ok(),
                        other => other.as_i64().and_then(|v| <$ty>::try_from(v).ok()),
                    };
                    converted.ok_or_else(|| mismatch::<$ty>(value))
                }
            }
        )*
    };
}

impl_integer!(i8, u8, i16, u16, i32, u32, i64, u64);

impl FieldValue for f64 {
    #[inline]
    fn to_value(&self) -> NestResult<Value> {
        Ok(Value::F64(*self))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        value.as_f64().ok_or_else(|| mismatch::<f64>(value))
    }
}

impl FieldValue for f32 {
    #[inline]
    fn to_value(&self) -> NestResult<Value> {
        Ok(Value::F32(*self))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        match value {
            Value::F32(v) => Ok(*v),
            other => other
                .as_f64()
                .filter(|v| !v.is_finite() || v.abs() <= f32::MAX as f64)
                .map(|v| v as f32)
                .ok_or_else(|| mismatch::<f32>(value)),
        }
    }
}

impl FieldValue for bool {
    #[inline]
    fn to_value(&self) -> NestResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        value.as_bool().ok_or_else(|| mismatch::<bool>(value))
    }
}

impl FieldValue for char {
    #[inline]
    fn to_value(&self) -> NestResult<Value> {
        Ok(Value::Char(*self))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        match value {
            Value::Char(c) => Ok(*c),
            Value::String(s) if s.chars().count() == 1 => {
                s.chars().next().ok_or_else(|| mismatch::<char>(value))
            }
            _ => Err(mismatch::<char>(value)),
        }
    }
}

impl FieldValue for String {
    #[inline]
    fn to_value(&self) -> NestResult<Value> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Char(c) => Ok(c.to_string()),
            _ => Err(mismatch::<String>(value)),
        }
    }
}

impl FieldValue for NestId {
    #[inline]
    fn to_value(&self) -> NestResult<Value> {
        Ok(Value::NestId(*self))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        value.as_nest_id().copied().ok_or_else(|| mismatch::<NestId>(value))
    }
}

impl FieldValue for DateTime<Utc> {
    #[inline]
    fn to_value(&self) -> NestResult<Value> {
        Ok(Value::DateTime(*self))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        value
            .as_date_time()
            .copied()
            .ok_or_else(|| mismatch::<DateTime<Utc>>(value))
    }
}

impl FieldValue for Document {
    #[inline]
    fn to_value(&self) -> NestResult<Value> {
        Ok(Value::Document(self.clone()))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        value.as_document().cloned().ok_or_else(|| mismatch::<Document>(value))
    }
}

impl FieldValue for Value {
    #[inline]
    fn to_value(&self) -> NestResult<Value> {
        Ok(self.clone())
    }

    #[inline]
    fn from_value(value: &Value) -> NestResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> NestResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Sequences become arrays, except `Vec<u8>` which is stored as bytes.
impl<T: FieldValue + 'static> FieldValue for Vec<T> {
    fn to_value(&self) -> NestResult<Value> {
        if TypeId::of::<T>() == TypeId::of::<u8>() {
            if let Some(bytes) = (self as &dyn Any).downcast_ref::<Vec<u8>>() {
                return Ok(Value::Bytes(bytes.clone()));
            }
        }
        self.iter()
            .map(|item| item.to_value())
            .collect::<NestResult<Vec<Value>>>()
            .map(Value::Array)
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            Value::Bytes(bytes) => bytes.iter().map(|b| T::from_value(&Value::U8(*b))).collect(),
            _ => Err(mismatch::<Vec<T>>(value)),
        }
    }
}

impl<T: FieldValue> FieldValue for HashMap<String, T> {
    fn to_value(&self) -> NestResult<Value> {
        let mut doc = Document::new();
        for (key, value) in self.iter() {
            doc.put(key, value.to_value()?)?;
        }
        Ok(Value::Document(doc))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        let doc = value.as_document().ok_or_else(|| mismatch::<HashMap<String, T>>(value))?;
        doc.iter()
            .map(|(key, value)| T::from_value(value).map(|v| (key.clone(), v)))
            .collect()
    }
}

impl<T: FieldValue> FieldValue for BTreeMap<String, T> {
    fn to_value(&self) -> NestResult<Value> {
        let mut doc = Document::new();
        for (key, value) in self.iter() {
            doc.put(key, value.to_value()?)?;
        }
        Ok(Value::Document(doc))
    }

    fn from_value(value: &Value) -> NestResult<Self> {
        let doc = value.as_document().ok_or_else(|| mismatch::<BTreeMap<String, T>>(value))?;
        doc.iter()
            .map(|(key, value)| T::from_value(value).map(|v| (key.clone(), v)))
            .collect()
    }
}
