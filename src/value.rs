use std::sync::Arc;

use bigdecimal::BigDecimal;
use time::OffsetDateTime;

#[derive(thiserror::Error, Debug)]
pub enum RowError {
    #[error("invalid column index: index={0}, length={1}")]
    InvalidColumnIndex(usize, usize),
    #[error("no column found in struct: name={0}")]
    NoColumnFoundInStruct(String),
    #[error("invalid type: {0}")]
    Decode(String),
}

/// A decoded destination value. The variant set mirrors the destination
/// types the schema reducer can produce, plus the narrowed integer and
/// float forms the cell decoder supports.
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Null,
    Int64(i64),
    Int32(i32),
    Int16(i16),
    Int8(i8),
    Float64(f64),
    Float32(f32),
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Timestamp(OffsetDateTime),
    Numeric(BigDecimal),
    Array(Vec<Value>),
    Struct(StructValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int64(_) => "Int64",
            Value::Int32(_) => "Int32",
            Value::Int16(_) => "Int16",
            Value::Int8(_) => "Int8",
            Value::Float64(_) => "Float64",
            Value::Float32(_) => "Float32",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Bool(_) => "Bool",
            Value::Timestamp(_) => "Timestamp",
            Value::Numeric(_) => "Numeric",
            Value::Array(_) => "Array",
            Value::Struct(_) => "Struct",
        }
    }
}

/// A decoded RECORD: named fields in destination-record order.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StructValue {
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn column_by_name<T: TryFromValue>(&self, name: &str) -> Result<T, RowError> {
        let value = self
            .get(name)
            .ok_or_else(|| RowError::NoColumnFoundInStruct(name.to_string()))?;
        T::try_from(value)
    }
}

// Not std::convert::TryFrom: a blanket Vec<T> impl next to a Vec<u8> impl
// is only coherent on a crate-local trait.
pub trait TryFromValue: Sized {
    fn try_from(value: &Value) -> Result<Self, RowError>;
}

/// One decoded row with by-index typed access:
///
/// ```ignore
/// let name: String = row.column(0)?;
/// let count: Option<i64> = row.column(1)?;
/// ```
#[derive(Debug)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Vec<String>>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn column<T: TryFromValue>(&self, index: usize) -> Result<T, RowError> {
        let value = self
            .values
            .get(index)
            .ok_or(RowError::InvalidColumnIndex(index, self.values.len()))?;
        T::try_from(value)
    }
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T, RowError> {
    Err(RowError::Decode(format!(
        "invalid value for {expected}: {}",
        value.type_name()
    )))
}

impl TryFromValue for i64 {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Int64(v) => Ok(*v),
            Value::Int32(v) => Ok(*v as i64),
            Value::Int16(v) => Ok(*v as i64),
            Value::Int8(v) => Ok(*v as i64),
            other => mismatch("i64", other),
        }
    }
}

impl TryFromValue for i32 {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Int32(v) => Ok(*v),
            Value::Int16(v) => Ok(*v as i32),
            Value::Int8(v) => Ok(*v as i32),
            Value::Int64(v) => Ok(*v as i32),
            other => mismatch("i32", other),
        }
    }
}

impl TryFromValue for i16 {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Int16(v) => Ok(*v),
            Value::Int8(v) => Ok(*v as i16),
            other => mismatch("i16", other),
        }
    }
}

impl TryFromValue for i8 {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Int8(v) => Ok(*v),
            other => mismatch("i8", other),
        }
    }
}

impl TryFromValue for f64 {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Float64(v) => Ok(*v),
            Value::Float32(v) => Ok(*v as f64),
            other => mismatch("f64", other),
        }
    }
}

impl TryFromValue for f32 {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Float32(v) => Ok(*v),
            Value::Float64(v) => Ok(*v as f32),
            other => mismatch("f32", other),
        }
    }
}

impl TryFromValue for bool {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Bool(v) => Ok(*v),
            other => mismatch("bool", other),
        }
    }
}

impl TryFromValue for String {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::String(v) => Ok(v.clone()),
            other => mismatch("String", other),
        }
    }
}

impl TryFromValue for Vec<u8> {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Bytes(v) => Ok(v.clone()),
            other => mismatch("Vec<u8>", other),
        }
    }
}

impl TryFromValue for OffsetDateTime {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Timestamp(v) => Ok(*v),
            other => mismatch("OffsetDateTime", other),
        }
    }
}

impl TryFromValue for BigDecimal {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Numeric(v) => Ok(v.clone()),
            other => mismatch("BigDecimal", other),
        }
    }
}

impl TryFromValue for StructValue {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Struct(v) => Ok(v.clone()),
            other => mismatch("StructValue", other),
        }
    }
}

impl TryFromValue for Value {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        Ok(value.clone())
    }
}

impl<T: TryFromValue> TryFromValue for Option<T> {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Null => Ok(None),
            other => T::try_from(other).map(Some),
        }
    }
}

impl<T: TryFromValue> TryFromValue for Vec<T> {
    fn try_from(value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Array(items) => items.iter().map(T::try_from).collect(),
            other => mismatch("Vec", other),
        }
    }
}
