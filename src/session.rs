use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::Error;
use crate::http::table::{TableFieldMode, TableSchema};
use crate::http::tabledata::Tuple;
use crate::schema::decoder::Decoder;
use crate::schema::{build_schema_types, DestType};
use crate::value::{Row, Value};

/// Per-result-set decoding state, built once from the first response and
/// carried across pages. Destination types and cell decoders are compiled
/// exactly once; the chunk holds the current page's rows.
pub(crate) struct Session {
    pub(crate) schema: TableSchema,
    pub(crate) dest_types: Vec<DestType>,
    pub(crate) columns: Arc<Vec<String>>,
    decoder: Decoder,
    pub(crate) chunk: VecDeque<Tuple>,
    pub(crate) total_rows: u64,
    pub(crate) processed_rows: u64,
}

impl Session {
    /// Dynamic binding: destination types derived from the schema.
    pub(crate) fn new(schema: TableSchema) -> Result<Self, Error> {
        let dest_types = build_schema_types(&schema)?;
        Self::with_dest_types(schema, dest_types)
    }

    /// Schema-first binding: the caller supplies the destination types and
    /// they are matched against the schema before the first row is decoded.
    pub(crate) fn with_dest_types(schema: TableSchema, dest_types: Vec<DestType>) -> Result<Self, Error> {
        let decoder = Decoder::new(&schema, &dest_types)?;
        let columns = Arc::new(schema.fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>());
        Ok(Self {
            schema,
            dest_types,
            columns,
            decoder,
            chunk: VecDeque::new(),
            total_rows: 0,
            processed_rows: 0,
        })
    }

    pub(crate) fn column_type_database_type_name(&self, index: usize) -> Option<&str> {
        self.schema.fields.get(index).map(|f| f.data_type.as_str())
    }

    pub(crate) fn column_type_nullable(&self, index: usize) -> Option<bool> {
        self.schema.fields.get(index).map(|f| f.mode() == TableFieldMode::Nullable)
    }

    pub(crate) fn has_next(&self) -> bool {
        self.processed_rows < self.total_rows
    }

    /// Decodes and yields the next buffered row.
    pub(crate) fn decode_next(&mut self) -> Option<Result<Row, Error>> {
        let tuple = self.chunk.pop_front()?;
        let values: Vec<Value> = match self.decoder.decode_row(&tuple) {
            Ok(values) => values,
            Err(err) => return Some(Err(err)),
        };
        self.processed_rows += 1;
        Some(Ok(Row::new(self.columns.clone(), values)))
    }
}
