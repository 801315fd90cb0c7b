use base64::prelude::*;
use bigdecimal::BigDecimal;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::error::Error;
use crate::http::table::{TableFieldSchema, TableSchema};
use crate::http::tabledata::{Cell, Tuple, Value as WireValue};
use crate::schema::{DestType, RecordField};
use crate::value::{StructValue, Value};

/// Decode function for one column, pre-compiled for the
/// (wire source type, destination type) pair and reused across rows.
type CellFn = Box<dyn Fn(&WireValue) -> Result<Value, String> + Send + Sync>;

/// Per-result-set decoder: one compiled cell function per column.
pub(crate) struct Decoder {
    columns: Vec<(String, CellFn)>,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("columns", &self.columns.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .finish()
    }
}

impl Decoder {
    /// Compiles cell decoders binding the advertised schema to the given
    /// destination types (one per top-level field). Any pair outside the
    /// supported matrix is a permanent error here, before any row is read.
    pub(crate) fn new(schema: &TableSchema, dest_types: &[DestType]) -> Result<Self, Error> {
        if schema.fields.len() != dest_types.len() {
            return Err(Error::UnsupportedType(format!(
                "destination type count {} does not match schema field count {}",
                dest_types.len(),
                schema.fields.len()
            )));
        }
        let mut columns = Vec::with_capacity(dest_types.len());
        for (field, dest) in schema.fields.iter().zip(dest_types) {
            let cell_fn =
                compile(field, dest).map_err(|message| Error::decode(field.name.clone(), message))?;
            columns.push((field.name.clone(), cell_fn));
        }
        Ok(Self { columns })
    }

    /// Decodes one wire row. A failure names the offending column and is
    /// fatal for the result set it occurred in.
    pub(crate) fn decode_row(&self, tuple: &Tuple) -> Result<Vec<Value>, Error> {
        if tuple.f.len() != self.columns.len() {
            return Err(Error::decode(
                "",
                format!("row has {} cells, schema has {} fields", tuple.f.len(), self.columns.len()),
            ));
        }
        let mut values = Vec::with_capacity(self.columns.len());
        for (cell, (name, cell_fn)) in tuple.f.iter().zip(self.columns.iter()) {
            let value = cell_fn(&cell.v).map_err(|message| Error::decode(name.clone(), message))?;
            values.push(value);
        }
        Ok(values)
    }
}

fn compile(field: &TableFieldSchema, dest: &DestType) -> Result<CellFn, String> {
    match dest {
        DestType::Nullable(inner) => {
            let inner_fn = compile(field, inner)?;
            Ok(Box::new(move |wire| match wire {
                WireValue::Null => Ok(Value::Null),
                other => inner_fn(other),
            }))
        }
        DestType::List(inner) => {
            let item_fn = compile_list_item(field, inner)?;
            Ok(Box::new(move |wire| match wire {
                WireValue::Array(cells) => {
                    let mut items = Vec::with_capacity(cells.len());
                    for Cell { v } in cells {
                        items.push(item_fn(v)?);
                    }
                    Ok(Value::Array(items))
                }
                WireValue::Null => Ok(Value::Array(vec![])),
                other => Err(unexpected_shape("array cell", other)),
            }))
        }
        DestType::Record(record_fields) => compile_record(field, record_fields),
        leaf => compile_leaf(&field.data_type, leaf),
    }
}

/// A REPEATED child cell is decoded with the leaf rules of the same field;
/// a NULLABLE item inside a list still yields nulls.
fn compile_list_item(field: &TableFieldSchema, item: &DestType) -> Result<CellFn, String> {
    match item {
        DestType::Record(record_fields) => compile_record(field, record_fields),
        DestType::Nullable(inner) => {
            let inner_fn = compile_list_item(field, inner)?;
            Ok(Box::new(move |wire| match wire {
                WireValue::Null => Ok(Value::Null),
                other => inner_fn(other),
            }))
        }
        leaf => compile_leaf(&field.data_type, leaf),
    }
}

/// Matches schema sub-fields against destination record fields (exact name
/// first, then case-insensitive with underscores stripped) and compiles one
/// sub-decoder per schema sub-field. An unmatched sub-field is an error.
fn compile_record(field: &TableFieldSchema, record_fields: &[RecordField]) -> Result<CellFn, String> {
    let sub_fields = field.sub_fields();
    let mut bindings: Vec<(usize, CellFn)> = Vec::with_capacity(sub_fields.len());
    for sub_field in sub_fields {
        let index = match_field(record_fields, &sub_field.name).ok_or_else(|| {
            format!(
                "failed to match {}.{} with destination record",
                field.data_type, sub_field.name
            )
        })?;
        let sub_fn = compile(sub_field, &record_fields[index].dest)?;
        bindings.push((index, sub_fn));
    }
    let names: Vec<String> = record_fields.iter().map(|f| f.name.clone()).collect();
    Ok(Box::new(move |wire| match wire {
        WireValue::Struct(tuple) => {
            if tuple.f.len() != bindings.len() {
                return Err(format!(
                    "record has {} cells, schema has {} sub-fields",
                    tuple.f.len(),
                    bindings.len()
                ));
            }
            let mut slots: Vec<Value> = vec![Value::Null; names.len()];
            for (cell, (index, sub_fn)) in tuple.f.iter().zip(bindings.iter()) {
                slots[*index] = sub_fn(&cell.v)?;
            }
            Ok(Value::Struct(StructValue {
                fields: names.iter().cloned().zip(slots).collect(),
            }))
        }
        WireValue::Null => Ok(Value::Null),
        other => Err(unexpected_shape("record cell", other)),
    }))
}

fn match_field(record_fields: &[RecordField], name: &str) -> Option<usize> {
    if let Some(index) = record_fields.iter().position(|f| f.name == name) {
        return Some(index);
    }
    let wanted = normalize_for_fuzzy_match(name);
    record_fields
        .iter()
        .position(|f| normalize_for_fuzzy_match(&f.name) == wanted)
}

fn normalize_for_fuzzy_match(name: &str) -> String {
    name.chars().filter(|c| *c != '_').flat_map(char::to_lowercase).collect()
}

fn compile_leaf(source_type: &str, dest: &DestType) -> Result<CellFn, String> {
    match source_type {
        "INTEGER" | "INT64" | "INT" | "SMALLINT" | "BIGINT" | "TINYINT" | "BYTEINT" => match dest {
            DestType::Int64 => Ok(int_leaf(Value::Int64)),
            DestType::Int32 => Ok(int_leaf(|i| Value::Int32(i as i32))),
            DestType::Int16 => Ok(int_leaf(|i| Value::Int16(i as i16))),
            DestType::Int8 => Ok(int_leaf(|i| Value::Int8(i as i8))),
            DestType::String => Ok(text_leaf()),
            DestType::Any => Ok(int_leaf(Value::Int64)),
            other => Err(unsupported_binding(source_type, other)),
        },
        "FLOAT" | "FLOAT64" | "NUMERIC" | "DECIMAL" => match dest {
            DestType::Float64 => Ok(float_leaf(Value::Float64)),
            DestType::Float32 => Ok(float_leaf(|f| Value::Float32(f as f32))),
            DestType::String => Ok(text_leaf()),
            DestType::Numeric => Ok(numeric_leaf()),
            DestType::Any => Ok(float_leaf(Value::Float64)),
            other => Err(unsupported_binding(source_type, other)),
        },
        "BIGNUMERIC" | "BIGDECIMAL" => match dest {
            DestType::Numeric => Ok(numeric_leaf()),
            DestType::Int64 => Ok(int_leaf(Value::Int64)),
            DestType::Float64 => Ok(float_leaf(Value::Float64)),
            DestType::String => Ok(text_leaf()),
            DestType::Any => Ok(numeric_leaf()),
            other => Err(unsupported_binding(source_type, other)),
        },
        "STRING" => match dest {
            DestType::String | DestType::Any => Ok(string_leaf()),
            other => Err(unsupported_binding(source_type, other)),
        },
        "BYTES" => match dest {
            DestType::Bytes | DestType::Any => Ok(bytes_leaf()),
            DestType::String => Ok(text_leaf()),
            other => Err(unsupported_binding(source_type, other)),
        },
        "TIME" | "TIMESTAMP" | "DATETIME" => match dest {
            DestType::Timestamp => Ok(time_leaf(Value::Timestamp)),
            DestType::Int64 => Ok(time_leaf(|ts| Value::Int64((ts.unix_timestamp_nanos()) as i64))),
            DestType::Int32 => Ok(time_leaf(|ts| Value::Int32(ts.unix_timestamp() as i32))),
            DestType::String => Ok(time_leaf(|ts| {
                Value::String(ts.format(&Rfc3339).unwrap_or_default())
            })),
            DestType::Any => Ok(time_leaf(Value::Timestamp)),
            other => Err(unsupported_binding(source_type, other)),
        },
        "DATE" => match dest {
            DestType::Timestamp | DestType::Any => Ok(date_leaf(Value::Timestamp)),
            DestType::String => Ok(text_leaf()),
            other => Err(unsupported_binding(source_type, other)),
        },
        "BOOLEAN" | "BOOL" => match dest {
            DestType::Bool => Ok(bool_leaf(Value::Bool)),
            DestType::Int8 => Ok(bool_leaf(|b| Value::Int8(b as i8))),
            DestType::Int64 => Ok(bool_leaf(|b| Value::Int64(b as i64))),
            DestType::String => Ok(text_leaf()),
            DestType::Any => Ok(bool_leaf(Value::Bool)),
            other => Err(unsupported_binding(source_type, other)),
        },
        _ => Err(format!("unsupported source type: {source_type}")),
    }
}

fn unsupported_binding(source_type: &str, dest: &DestType) -> String {
    format!("unsupported binding type {} to {}", source_type, dest.name())
}

fn unexpected_shape(expected: &str, wire: &WireValue) -> String {
    let actual = match wire {
        WireValue::Null => "null",
        WireValue::String(_) => "scalar",
        WireValue::Array(_) => "array",
        WireValue::Struct(_) => "record",
    };
    format!("expected {expected}, found {actual} cell")
}

/// Leaf scalars arrive as JSON strings; a wire null into a non-nullable
/// destination is written as the destination's zero value.
fn scalar(wire: &WireValue) -> Result<Option<&str>, String> {
    match wire {
        WireValue::Null => Ok(None),
        WireValue::String(text) => Ok(Some(text.as_str())),
        other => Err(unexpected_shape("scalar cell", other)),
    }
}

fn int_leaf(wrap: impl Fn(i64) -> Value + Send + Sync + 'static) -> CellFn {
    Box::new(move |wire| match scalar(wire)? {
        Some(text) => {
            let parsed = i64::from_str(text).map_err(|e| format!("invalid integer {text:?}: {e}"))?;
            Ok(wrap(parsed))
        }
        None => Ok(wrap(0)),
    })
}

fn float_leaf(wrap: impl Fn(f64) -> Value + Send + Sync + 'static) -> CellFn {
    Box::new(move |wire| match scalar(wire)? {
        Some(text) => {
            let parsed = f64::from_str(text).map_err(|e| format!("invalid float {text:?}: {e}"))?;
            Ok(wrap(parsed))
        }
        None => Ok(wrap(0.0)),
    })
}

fn numeric_leaf() -> CellFn {
    Box::new(|wire| match scalar(wire)? {
        Some(text) => {
            let parsed = BigDecimal::from_str(text).map_err(|e| format!("invalid numeric {text:?}: {e}"))?;
            Ok(Value::Numeric(parsed))
        }
        None => Ok(Value::Numeric(BigDecimal::from(0))),
    })
}

fn bool_leaf(wrap: impl Fn(bool) -> Value + Send + Sync + 'static) -> CellFn {
    Box::new(move |wire| match scalar(wire)? {
        Some(text) => {
            let parsed = bool::from_str(text).map_err(|e| format!("invalid boolean {text:?}: {e}"))?;
            Ok(wrap(parsed))
        }
        None => Ok(wrap(false)),
    })
}

/// The raw scalar text, verbatim.
fn text_leaf() -> CellFn {
    Box::new(|wire| match scalar(wire)? {
        Some(text) => Ok(Value::String(text.to_string())),
        None => Ok(Value::String(String::new())),
    })
}

fn string_leaf() -> CellFn {
    text_leaf()
}

fn bytes_leaf() -> CellFn {
    Box::new(|wire| match scalar(wire)? {
        Some(text) => {
            let data = BASE64_STANDARD
                .decode(text)
                .map_err(|e| format!("invalid base64 {text:?}: {e}"))?;
            Ok(Value::Bytes(data))
        }
        None => Ok(Value::Bytes(vec![])),
    })
}

/// TIMESTAMP/DATETIME/TIME cells carry epoch seconds with a fractional part:
/// `ns = round(f * 1e6) microseconds`.
fn time_leaf(wrap: impl Fn(OffsetDateTime) -> Value + Send + Sync + 'static) -> CellFn {
    Box::new(move |wire| match scalar(wire)? {
        Some(text) => Ok(wrap(parse_epoch(text)?)),
        None => Ok(wrap(OffsetDateTime::UNIX_EPOCH)),
    })
}

fn parse_epoch(text: &str) -> Result<OffsetDateTime, String> {
    let seconds = f64::from_str(text).map_err(|e| format!("invalid timestamp {text:?}: {e}"))?;
    let nanos = (seconds * 1e6).round() as i64 as i128 * 1_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|e| format!("invalid timestamp {text:?}: {e}"))
}

/// DATE cells carry `YYYY-MM-DD`.
fn date_leaf(wrap: impl Fn(OffsetDateTime) -> Value + Send + Sync + 'static) -> CellFn {
    Box::new(move |wire| match scalar(wire)? {
        Some(text) => {
            let date = Date::parse(text, format_description!("[year]-[month]-[day]"))
                .map_err(|e| format!("invalid date {text:?}: {e}"))?;
            Ok(wrap(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc()))
        }
        None => Ok(wrap(OffsetDateTime::UNIX_EPOCH)),
    })
}
