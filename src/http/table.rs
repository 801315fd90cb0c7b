#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    /// Required. The ID of the project containing this table.
    pub project_id: String,
    /// Required. The ID of the dataset containing this table.
    pub dataset_id: String,
    /// Required. The ID of the table.
    /// The ID must contain only letters (a-z, A-Z), numbers (0-9), or underscores (_).
    /// The maximum length is 1,024 characters.
    pub table_id: String,
}

/// The field mode. The default value is NULLABLE.
#[derive(Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableFieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TableFieldSchema {
    /// Required. The field name.
    /// The name must contain only letters (a-z, A-Z), numbers (0-9), or underscores (_),
    /// and must start with a letter or underscore.
    pub name: String,
    /// Required. The field data type. Possible values include:
    ///
    /// STRING
    /// BYTES
    /// INTEGER (or INT64)
    /// FLOAT (or FLOAT64)
    /// BOOLEAN (or BOOL)
    /// TIMESTAMP
    /// DATE
    /// TIME
    /// DATETIME
    /// NUMERIC
    /// BIGNUMERIC
    /// RECORD (or STRUCT)
    ///
    /// Use of RECORD/STRUCT indicates that the field contains a nested schema.
    /// Kept as the raw string because the scan-type mapping and the decoder
    /// dispatch on it, aliases included.
    #[serde(rename(serialize = "type", deserialize = "type"))]
    pub data_type: String,
    /// Optional. The field mode. Possible values include NULLABLE, REQUIRED and REPEATED.
    pub mode: Option<TableFieldMode>,
    /// Optional. Describes the nested schema fields if the type property is set to RECORD.
    pub fields: Option<Vec<TableFieldSchema>>,
    /// Optional. The field description. The maximum length is 1,024 characters.
    pub description: Option<String>,
}

impl TableFieldSchema {
    pub fn mode(&self) -> TableFieldMode {
        self.mode.unwrap_or_default()
    }

    pub fn is_nullable(&self) -> bool {
        self.mode() == TableFieldMode::Nullable
    }

    pub fn is_repeated(&self) -> bool {
        self.mode() == TableFieldMode::Repeated
    }

    pub fn sub_fields(&self) -> &[TableFieldSchema] {
        self.fields.as_deref().unwrap_or_default()
    }
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Describes the fields in a table.
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    #[default]
    Csv,
    Avro,
    NewlineDelimitedJson,
    DatastoreBackup,
    GoogleSheets,
    Bigtable,
    Parquet,
    Orc,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimePartitionType {
    #[default]
    Hour,
    Day,
    Month,
    Year,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimePartitioning {
    /// Required. The supported types are DAY, HOUR, MONTH, and YEAR,
    /// which will generate one partition per day, hour, month, and year, respectively.
    #[serde(rename(serialize = "type", deserialize = "type"))]
    pub partition_type: TimePartitionType,
    /// Optional. Number of milliseconds for which to keep the storage for a partition.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub expiration_ms: Option<i64>,
    /// Optional. If not set, the table is partitioned by pseudo column '_PARTITIONTIME';
    /// if set, the table is partitioned by this field.
    /// The field must be a top-level TIMESTAMP or DATE field.
    pub field: Option<String>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartitionRange {
    /// Required. [Experimental] The start of range partitioning, inclusive.
    pub start: String,
    /// Required. [Experimental] The end of range partitioning, exclusive.
    pub end: String,
    /// Required. [Experimental] The width of each interval.
    pub interval: String,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RangePartitioning {
    /// Required. [Experimental] The table is partitioned by this field.
    /// The field must be a top-level NULLABLE/REQUIRED field.
    /// The only supported type is INTEGER/INT64.
    pub field: String,
    /// [Experimental] Defines the ranges for range partitioning.
    pub range: PartitionRange,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Clustering {
    /// One or more fields on which data should be clustered.
    /// Only top-level, non-repeated, simple-type fields are supported.
    pub fields: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct HivePartitioningOptions {
    /// Optional. When set, what mode of hive partitioning to use when reading data.
    /// AUTO, STRINGS and CUSTOM are supported.
    pub mode: Option<String>,
    /// Optional. When hive partition detection is requested,
    /// a common prefix for all source uris must be required.
    pub source_uri_prefix: Option<String>,
    /// Optional. If set to true, queries over this table require a partition
    /// filter that can be used for partition elimination to be specified.
    pub require_partition_filter: Option<bool>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParquetOptions {
    /// Optional. Indicates whether to infer Parquet ENUM logical type as STRING instead of BYTES by default.
    pub enum_as_string: Option<bool>,
    /// Optional. Indicates whether to use schema inference specifically for Parquet LIST logical type.
    pub enable_list_interface: Option<bool>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecimalTargetType {
    /// Decimal values could be converted to NUMERIC type.
    #[default]
    Numeric,
    /// Decimal values could be converted to BIGNUMERIC type.
    Bignumeric,
    /// Decimal values could be converted to STRING type.
    String,
}
