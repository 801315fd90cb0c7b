use std::collections::HashMap;

use base64::prelude::*;
use bigdecimal::BigDecimal;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::Error;
use crate::http::types::{QueryParameter, QueryParameterStructType, QueryParameterType, QueryParameterValue};

/// A bound parameter value. The reflective dispatch of the source becomes a
/// tagged value here; `From` conversions keep call sites terse.
#[derive(Clone, PartialEq, Debug)]
pub enum QueryValue {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Float32(f32),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(OffsetDateTime),
    Numeric(BigDecimal),
    /// An absent optional. Keeps its scalar type so the wire declaration stays typed.
    Null(NullKind),
    /// Homogeneous array; the element type is taken from the first element.
    Array(Vec<QueryValue>),
    /// Named-field record, encoded depth-recursively as a STRUCT.
    Struct(Vec<(String, QueryValue)>),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NullKind {
    Bool,
    Int64,
    Float64,
    String,
    Bytes,
    Timestamp,
    Numeric,
}

impl NullKind {
    fn type_name(&self) -> &'static str {
        match self {
            NullKind::Bool => "BOOL",
            NullKind::Int64 => "INT64",
            NullKind::Float64 => "FLOAT64",
            NullKind::String => "STRING",
            NullKind::Bytes => "BYTES",
            NullKind::Timestamp => "TIMESTAMP",
            NullKind::Numeric => "BIGNUMERIC",
        }
    }
}

/// One statement parameter: positional when unnamed, named otherwise.
#[derive(Clone, PartialEq, Debug)]
pub struct Param {
    pub name: Option<String>,
    pub value: QueryValue,
}

impl Param {
    pub fn pos(value: impl Into<QueryValue>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    /// Encodes the parameter into the warehouse wire shape.
    pub fn to_query_parameter(&self) -> Result<QueryParameter, Error> {
        let (parameter_type, parameter_value) = encode(&self.value)?;
        Ok(QueryParameter {
            name: self.name.clone(),
            parameter_type,
            parameter_value,
        })
    }
}

fn scalar_type(name: &str) -> QueryParameterType {
    QueryParameterType {
        parameter_type: name.to_string(),
        ..Default::default()
    }
}

fn scalar_value(value: String) -> QueryParameterValue {
    QueryParameterValue {
        value: Some(value),
        ..Default::default()
    }
}

fn encode(value: &QueryValue) -> Result<(QueryParameterType, QueryParameterValue), Error> {
    match value {
        QueryValue::Bool(v) => Ok((scalar_type("BOOL"), scalar_value(v.to_string()))),
        // all integer widths widen to INT64; the warehouse has no narrower integer type
        QueryValue::Int64(v) => Ok((scalar_type("INT64"), scalar_value(v.to_string()))),
        QueryValue::Float64(v) => Ok((scalar_type("FLOAT64"), scalar_value(v.to_string()))),
        // formatted at f32 precision so the text round-trips to the source value
        QueryValue::Float32(v) => Ok((scalar_type("FLOAT64"), scalar_value(v.to_string()))),
        QueryValue::String(v) => Ok((scalar_type("STRING"), scalar_value(v.clone()))),
        QueryValue::Bytes(v) => Ok((scalar_type("BYTES"), scalar_value(BASE64_STANDARD.encode(v)))),
        QueryValue::Timestamp(v) => {
            let formatted = v
                .format(&Rfc3339)
                .map_err(|e| Error::UnsupportedType(format!("unformattable timestamp: {e}")))?;
            Ok((scalar_type("TIMESTAMP"), scalar_value(formatted)))
        }
        QueryValue::Numeric(v) => Ok((scalar_type("BIGNUMERIC"), scalar_value(v.to_string()))),
        QueryValue::Null(kind) => {
            let value = match kind {
                // empty strings are meaningful and must survive JSON encoding
                NullKind::String => scalar_value(String::new()),
                _ => QueryParameterValue::default(),
            };
            Ok((scalar_type(kind.type_name()), value))
        }
        QueryValue::Array(items) => {
            let first = items
                .first()
                .ok_or_else(|| Error::UnsupportedType("cannot infer the element type of an empty array".to_string()))?;
            let (element_type, _) = encode(first)?;
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                let (_, item_value) = encode(item)?;
                values.push(item_value);
            }
            Ok((
                QueryParameterType {
                    parameter_type: "ARRAY".to_string(),
                    array_type: Some(Box::new(element_type)),
                    ..Default::default()
                },
                QueryParameterValue {
                    array_values: Some(values),
                    ..Default::default()
                },
            ))
        }
        QueryValue::Struct(fields) => {
            let mut struct_types = Vec::with_capacity(fields.len());
            let mut struct_values = HashMap::with_capacity(fields.len());
            for (name, field_value) in fields {
                let (field_type, field_val) = encode(field_value)?;
                struct_types.push(QueryParameterStructType {
                    name: Some(name.clone()),
                    field_type,
                    description: None,
                });
                struct_values.insert(name.clone(), field_val);
            }
            Ok((
                QueryParameterType {
                    parameter_type: "STRUCT".to_string(),
                    struct_types: Some(struct_types),
                    ..Default::default()
                },
                QueryParameterValue {
                    struct_values: Some(struct_values),
                    ..Default::default()
                },
            ))
        }
    }
}

impl From<bool> for QueryValue {
    fn from(v: bool) -> Self {
        QueryValue::Bool(v)
    }
}

impl From<i8> for QueryValue {
    fn from(v: i8) -> Self {
        QueryValue::Int64(v as i64)
    }
}

impl From<i16> for QueryValue {
    fn from(v: i16) -> Self {
        QueryValue::Int64(v as i64)
    }
}

impl From<i32> for QueryValue {
    fn from(v: i32) -> Self {
        QueryValue::Int64(v as i64)
    }
}

impl From<i64> for QueryValue {
    fn from(v: i64) -> Self {
        QueryValue::Int64(v)
    }
}

impl From<u16> for QueryValue {
    fn from(v: u16) -> Self {
        QueryValue::Int64(v as i64)
    }
}

impl From<u32> for QueryValue {
    fn from(v: u32) -> Self {
        QueryValue::Int64(v as i64)
    }
}

impl From<f32> for QueryValue {
    fn from(v: f32) -> Self {
        QueryValue::Float32(v)
    }
}

impl From<f64> for QueryValue {
    fn from(v: f64) -> Self {
        QueryValue::Float64(v)
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::String(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::String(v)
    }
}

impl From<Vec<u8>> for QueryValue {
    fn from(v: Vec<u8>) -> Self {
        QueryValue::Bytes(v)
    }
}

impl From<&[u8]> for QueryValue {
    fn from(v: &[u8]) -> Self {
        QueryValue::Bytes(v.to_vec())
    }
}

impl From<OffsetDateTime> for QueryValue {
    fn from(v: OffsetDateTime) -> Self {
        QueryValue::Timestamp(v)
    }
}

impl From<BigDecimal> for QueryValue {
    fn from(v: BigDecimal) -> Self {
        QueryValue::Numeric(v)
    }
}

impl From<Vec<QueryValue>> for QueryValue {
    fn from(v: Vec<QueryValue>) -> Self {
        QueryValue::Array(v)
    }
}

impl From<Vec<i64>> for QueryValue {
    fn from(v: Vec<i64>) -> Self {
        QueryValue::Array(v.into_iter().map(QueryValue::from).collect())
    }
}

impl From<Vec<f64>> for QueryValue {
    fn from(v: Vec<f64>) -> Self {
        QueryValue::Array(v.into_iter().map(QueryValue::from).collect())
    }
}

impl From<Vec<bool>> for QueryValue {
    fn from(v: Vec<bool>) -> Self {
        QueryValue::Array(v.into_iter().map(QueryValue::from).collect())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(v: Vec<String>) -> Self {
        QueryValue::Array(v.into_iter().map(QueryValue::from).collect())
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(v: Vec<&str>) -> Self {
        QueryValue::Array(v.into_iter().map(QueryValue::from).collect())
    }
}

/// Scalar types that keep a typed wire declaration when absent.
pub trait ParamScalar: Into<QueryValue> {
    fn null_kind() -> NullKind;
}

impl ParamScalar for bool {
    fn null_kind() -> NullKind {
        NullKind::Bool
    }
}

impl ParamScalar for i64 {
    fn null_kind() -> NullKind {
        NullKind::Int64
    }
}

impl ParamScalar for i32 {
    fn null_kind() -> NullKind {
        NullKind::Int64
    }
}

impl ParamScalar for f64 {
    fn null_kind() -> NullKind {
        NullKind::Float64
    }
}

impl ParamScalar for String {
    fn null_kind() -> NullKind {
        NullKind::String
    }
}

impl ParamScalar for &str {
    fn null_kind() -> NullKind {
        NullKind::String
    }
}

impl ParamScalar for Vec<u8> {
    fn null_kind() -> NullKind {
        NullKind::Bytes
    }
}

impl ParamScalar for OffsetDateTime {
    fn null_kind() -> NullKind {
        NullKind::Timestamp
    }
}

impl ParamScalar for BigDecimal {
    fn null_kind() -> NullKind {
        NullKind::Numeric
    }
}

impl<T: ParamScalar> From<Option<T>> for QueryValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(value) => value.into(),
            None => QueryValue::Null(T::null_kind()),
        }
    }
}
