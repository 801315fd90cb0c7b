use crate::error::Error;
use crate::http::table::{TableFieldSchema, TableSchema};

pub mod decoder;

/// Destination type descriptor for one column, derived from the
/// server-advertised table schema. The Rust rendition of the source's
/// runtime-synthesized scan types: a tagged variant carried by the decoder.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DestType {
    Int64,
    Int32,
    Int16,
    Int8,
    Float64,
    Float32,
    String,
    Bytes,
    Bool,
    /// Wall-clock instant; covers TIMESTAMP, DATETIME, TIME and DATE columns.
    Timestamp,
    /// Arbitrary-precision decimal (BIGNUMERIC).
    Numeric,
    /// Carry-through sentinel: the decoder picks the natural value per source type.
    Any,
    /// NULLABLE leaf.
    Nullable(Box<DestType>),
    /// REPEATED field.
    List(Box<DestType>),
    /// RECORD field with named sub-fields.
    Record(Vec<RecordField>),
}

impl DestType {
    /// Display name used in binding diagnostics.
    pub fn name(&self) -> String {
        match self {
            DestType::Int64 => "i64".to_string(),
            DestType::Int32 => "i32".to_string(),
            DestType::Int16 => "i16".to_string(),
            DestType::Int8 => "i8".to_string(),
            DestType::Float64 => "f64".to_string(),
            DestType::Float32 => "f32".to_string(),
            DestType::String => "String".to_string(),
            DestType::Bytes => "Vec<u8>".to_string(),
            DestType::Bool => "bool".to_string(),
            DestType::Timestamp => "OffsetDateTime".to_string(),
            DestType::Numeric => "BigDecimal".to_string(),
            DestType::Any => "Value".to_string(),
            DestType::Nullable(inner) => format!("Option<{}>", inner.name()),
            DestType::List(inner) => format!("Vec<{}>", inner.name()),
            DestType::Record(_) => "Struct".to_string(),
        }
    }
}

/// One named field of a RECORD destination. The name is the schema name with
/// its first letter upper-cased; the tag keeps the original name, with an
/// omit-empty marker iff the schema sub-field is NULLABLE.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RecordField {
    pub name: String,
    pub tag: String,
    pub omit_empty: bool,
    pub dest: DestType,
}

/// Builds one destination type descriptor per top-level schema field.
/// Pure: depends only on the schema, never reads rows.
pub fn build_schema_types(schema: &TableSchema) -> Result<Vec<DestType>, Error> {
    schema.fields.iter().map(build_field_type).collect()
}

/// Builds a destination type from one schema field.
pub fn build_field_type(field: &TableFieldSchema) -> Result<DestType, Error> {
    let mut dest = if field.sub_fields().is_empty() {
        map_basic_type(&field.data_type, field.is_nullable())
            .map_err(|err| Error::UnsupportedType(format!("failed to build field {}: {err}", field.name)))?
    } else {
        let mut record_fields = Vec::with_capacity(field.sub_fields().len());
        for sub_field in field.sub_fields() {
            let sub_type = build_field_type(sub_field)?;
            record_fields.push(RecordField {
                name: upper_first(&sub_field.name),
                tag: sub_field.name.clone(),
                omit_empty: sub_field.is_nullable(),
                dest: sub_type,
            });
        }
        DestType::Record(record_fields)
    };
    if field.is_repeated() {
        dest = DestType::List(Box::new(dest));
    }
    Ok(dest)
}

fn map_basic_type(data_type: &str, nullable: bool) -> Result<DestType, String> {
    let dest = map_basic_raw_type(data_type)?;
    Ok(if nullable { DestType::Nullable(Box::new(dest)) } else { dest })
}

fn map_basic_raw_type(data_type: &str) -> Result<DestType, String> {
    match data_type {
        "INTEGER" | "INT64" | "INT" | "SMALLINT" | "BIGINT" | "TINYINT" | "BYTEINT" => Ok(DestType::Int64),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "DECIMAL" => Ok(DestType::Float64),
        "STRING" => Ok(DestType::String),
        "BYTES" => Ok(DestType::Bytes),
        "BOOLEAN" | "BOOL" => Ok(DestType::Bool),
        "TIMESTAMP" | "DATETIME" | "TIME" | "DATE" => Ok(DestType::Timestamp),
        "BIGNUMERIC" | "BIGDECIMAL" => Ok(DestType::Numeric),
        _ => Err(format!("unsupported type: {data_type}")),
    }
}

pub(crate) fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
