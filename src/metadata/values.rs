use crate::core::{DataType, PersistenceError, Result, Value};

/// Conversion between a Rust field type and a storage [`Value`].
///
/// Implemented for the scalar types an entity property may have. `Option<T>`
/// maps `None` to `NULL` and marks the column nullable.
pub trait PersistValue: Sized {
    fn data_type() -> DataType;

    fn nullable() -> bool {
        false
    }

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: &str, value: &Value) -> PersistenceError {
    PersistenceError::Mapping(format!(
        "expected {} value, got {}",
        expected,
        value.type_name()
    ))
}

impl PersistValue for i64 {
    fn data_type() -> DataType {
        DataType::Integer
    }

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("INTEGER", &value))
    }
}

impl PersistValue for i32 {
    fn data_type() -> DataType {
        DataType::Integer
    }

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| mismatch("INTEGER (i32)", &value))
    }
}

impl PersistValue for u32 {
    fn data_type() -> DataType {
        DataType::Integer
    }

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_i64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| mismatch("INTEGER (u32)", &value))
    }
}

impl PersistValue for f64 {
    fn data_type() -> DataType {
        DataType::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("FLOAT", &value))
    }
}

impl PersistValue for f32 {
    fn data_type() -> DataType {
        DataType::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| mismatch("FLOAT", &value))
    }
}

impl PersistValue for bool {
    fn data_type() -> DataType {
        DataType::Boolean
    }

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch("BOOLEAN", &value))
    }
}

impl PersistValue for String {
    fn data_type() -> DataType {
        DataType::Text
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("TEXT", &other)),
        }
    }
}

impl<T: PersistValue> PersistValue for Option<T> {
    fn data_type() -> DataType {
        T::data_type()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Value {
        match self {
            Some(value) => value.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

/// Types usable as an entity identity. Zero counts as "no identity yet".
pub trait IdentityValue: Sized {
    fn identity(&self) -> Option<i64>;

    fn from_identity(id: i64) -> Self;
}

impl IdentityValue for i64 {
    fn identity(&self) -> Option<i64> {
        (*self != 0).then_some(*self)
    }

    fn from_identity(id: i64) -> Self {
        id
    }
}

impl IdentityValue for Option<i64> {
    fn identity(&self) -> Option<i64> {
        (*self).filter(|id| *id != 0)
    }

    fn from_identity(id: i64) -> Self {
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_maps_null() {
        assert_eq!(None::<String>.to_value(), Value::Null);
        assert!(<Option<String>>::nullable());
        assert_eq!(<Option<i32>>::from_value(Value::Null).unwrap(), None);
        assert_eq!(<Option<i32>>::from_value(Value::Integer(4)).unwrap(), Some(4));
    }

    #[test]
    fn test_mismatched_value_is_mapping_error() {
        let err = i64::from_value(Value::Text("x".into())).unwrap_err();
        assert!(matches!(err, PersistenceError::Mapping(_)));
        assert!(i32::from_value(Value::Integer(i64::MAX)).is_err());
    }

    #[test]
    fn test_float_accepts_integer_storage() {
        assert_eq!(f64::from_value(Value::Integer(3)).unwrap(), 3.0);
    }

    #[test]
    fn test_zero_identity_is_absent() {
        assert_eq!(0i64.identity(), None);
        assert_eq!(Some(0i64).identity(), None);
        assert_eq!(Some(9i64).identity(), Some(9));
        assert_eq!(<Option<i64>>::from_identity(3), Some(3));
    }
}
