///
/// Owned SQLite values and the parameter-binding trait.
///
/// `Value` is a detached copy of one SQLite value: it is what custom SQL
/// functions receive and return, and what `Column::get_value` snapshots.
///
/// `ToParam` describes how a Rust value is bound to a statement parameter.
/// Implementations only describe the value (`ParamRef`); the statement
/// performs the native bind call.
///

use crate::consts::ColumnType;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Null => ColumnType::Null,
            Value::Integer(_) => ColumnType::Integer,
            Value::Real(_) => ColumnType::Float,
            Value::Text(_) => ColumnType::Text,
            Value::Blob(_) => ColumnType::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Borrowed description of a parameter value, ready for a native bind call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamRef<'a> {
    Null,
    Int(i32),
    Int64(i64),
    Double(f64),
    Text(&'a str),
    Blob(&'a [u8]),
}

/// SQL NULL, for binding without an `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Null;

pub trait ToParam {
    fn to_param(&self) -> ParamRef<'_>;
}

impl ToParam for i32 {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Int(*self)
    }
}

/// Unsigned 32-bit values do not fit a native int and are bound as 64-bit.
impl ToParam for u32 {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Int64(i64::from(*self))
    }
}

impl ToParam for i64 {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Int64(*self)
    }
}

impl ToParam for bool {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Int(i32::from(*self))
    }
}

impl ToParam for f64 {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Double(*self)
    }
}

impl ToParam for str {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Text(self)
    }
}

impl ToParam for String {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Text(self)
    }
}

impl ToParam for [u8] {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Blob(self)
    }
}

impl<const N: usize> ToParam for [u8; N] {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Blob(self)
    }
}

impl ToParam for Vec<u8> {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Blob(self)
    }
}

impl ToParam for Null {
    fn to_param(&self) -> ParamRef<'_> {
        ParamRef::Null
    }
}

impl<T: ToParam> ToParam for Option<T> {
    fn to_param(&self) -> ParamRef<'_> {
        match self {
            Some(v) => v.to_param(),
            None => ParamRef::Null,
        }
    }
}

impl ToParam for Value {
    fn to_param(&self) -> ParamRef<'_> {
        match self {
            Value::Null => ParamRef::Null,
            Value::Integer(i) => ParamRef::Int64(*i),
            Value::Real(f) => ParamRef::Double(*f),
            Value::Text(s) => ParamRef::Text(s),
            Value::Blob(b) => ParamRef::Blob(b),
        }
    }
}

impl<T: ToParam + ?Sized> ToParam for &T {
    fn to_param(&self) -> ParamRef<'_> {
        (**self).to_param()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_descriptions() {
        assert_eq!(7i32.to_param(), ParamRef::Int(7));
        assert_eq!(u32::MAX.to_param(), ParamRef::Int64(4_294_967_295));
        assert_eq!(true.to_param(), ParamRef::Int(1));
        assert_eq!("abc".to_param(), ParamRef::Text("abc"));
        assert_eq!(vec![1u8, 2].to_param(), ParamRef::Blob(&[1, 2]));
        assert_eq!(Null.to_param(), ParamRef::Null);
        assert_eq!(None::<i64>.to_param(), ParamRef::Null);
        assert_eq!(Some(2.5f64).to_param(), ParamRef::Double(2.5));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(Some(3i64)), Value::Integer(3));
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from("x").column_type(), ColumnType::Text);
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
        assert_eq!(Value::Text("hi".into()).as_bytes(), Some(&b"hi"[..]));
        assert!(Value::Null.is_null());
    }
}
