use std::collections::HashMap;

use crate::http::table::{
    Clustering, DecimalTargetType, HivePartitioningOptions, ParquetOptions, RangePartitioning, SourceFormat,
    TableReference, TableSchema, TimePartitioning,
};
use crate::http::types::{ConnectionProperty, DatasetReference, EncryptionConfiguration, ErrorProto, QueryParameter};

pub mod get;
pub mod get_query_results;
pub mod insert;

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    /// If the table does not exist, BigQuery creates the table.
    #[default]
    CreateIfNeeded,
    /// The table must already exist. If it does not, a 'notFound' error is returned in the job result.
    CreateNever,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    /// If the table already exists, BigQuery overwrites the table data and uses the schema from the query result.
    WriteTruncate,
    /// If the table already exists, BigQuery appends the data to the table.
    WriteAppend,
    /// If the table already exists and contains data, a 'duplicate' error is returned in the job result.
    #[default]
    WriteEmpty,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    #[default]
    Interactive,
    Batch,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaUpdateOption {
    /// allow adding a nullable field to the schema.
    AllowFieldAddition,
    /// allow relaxing a required field in the original schema to nullable.
    AllowFieldRelaxation,
}

/// Configuration of a load job. Every field is reachable from an ingestion
/// hint block, so the whole surface of the Jobs API load configuration is
/// kept user-overridable.
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationLoad {
    /// The fully-qualified URIs that point to data in Google Cloud Storage.
    /// When empty, the job body is uploaded as media instead.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_uris: Vec<String>,
    /// Optional. The schema for the destination table. The schema can be
    /// omitted if the destination table already exists, or if the data is
    /// being auto-detected.
    pub schema: Option<TableSchema>,
    /// [Required] The destination table to load the data into.
    pub destination_table: TableReference,
    /// Optional. Specifies whether the job is allowed to create new tables.
    pub create_disposition: Option<CreateDisposition>,
    /// Optional. Specifies the action that occurs if the destination table already exists.
    pub write_disposition: Option<WriteDisposition>,
    /// Optional. Specifies a string that represents a null value in a CSV file.
    pub null_marker: Option<String>,
    /// Optional. The separator character for fields in a CSV file.
    pub field_delimiter: Option<String>,
    /// Optional. The number of rows at the top of a CSV file that BigQuery will skip when loading the data.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub skip_leading_rows: Option<i64>,
    /// Optional. The character encoding of the data. The default value is UTF-8.
    pub encoding: Option<String>,
    /// Optional. The value that is used to quote data sections in a CSV file.
    pub quote: Option<String>,
    /// Optional. The maximum number of bad records that BigQuery can ignore when running the job.
    pub max_bad_records: Option<i64>,
    /// Indicates if BigQuery should allow quoted data sections that contain newline characters in a CSV file.
    pub allow_quoted_newlines: Option<bool>,
    /// Optional. The format of the data files. The default value is CSV.
    pub source_format: Option<SourceFormat>,
    /// Optional. Accept rows that are missing trailing optional columns. Only applicable to CSV.
    pub allow_jagged_rows: Option<bool>,
    /// Optional. Indicates if BigQuery should allow extra values that are not represented in the table schema.
    pub ignore_unknown_values: Option<bool>,
    /// If sourceFormat is set to "DATASTORE_BACKUP", indicates which entity
    /// properties to load into BigQuery from a Cloud Datastore backup.
    pub projection_fields: Option<Vec<String>>,
    /// Optional. Indicates if we should automatically infer the options and schema for CSV and JSON sources.
    pub autodetect: Option<bool>,
    /// Allows the schema of the destination table to be updated as a side effect of the load job.
    pub schema_update_options: Option<Vec<SchemaUpdateOption>>,
    /// Time-based partitioning specification for the destination table.
    /// Only one of timePartitioning and rangePartitioning should be specified.
    pub time_partitioning: Option<TimePartitioning>,
    /// Range partitioning specification for the destination table.
    /// Only one of timePartitioning and rangePartitioning should be specified.
    pub range_partitioning: Option<RangePartitioning>,
    /// Clustering specification for the destination table.
    pub clustering: Option<Clustering>,
    /// Custom encryption configuration (e.g., Cloud KMS keys).
    pub destination_encryption_configuration: Option<EncryptionConfiguration>,
    /// Optional. If sourceFormat is set to "AVRO", indicates whether to interpret
    /// logical types as the corresponding BigQuery data type instead of the raw type.
    pub use_avro_logical_types: Option<bool>,
    /// Optional. The user can provide a reference file with the reader schema.
    /// Enabled for AVRO, PARQUET and ORC.
    pub reference_file_schema_uri: Option<String>,
    /// Optional. When set, configures hive partitioning support.
    pub hive_partitioning_options: Option<HivePartitioningOptions>,
    /// Defines the list of possible SQL data types to which the source decimal
    /// values are converted.
    pub decimal_target_types: Option<Vec<DecimalTargetType>>,
    /// Optional. Additional properties to set if sourceFormat is set to PARQUET.
    pub parquet_options: Option<ParquetOptions>,
    /// Optional. When sourceFormat is set to "CSV", indicates whether the
    /// embedded ASCII control characters are preserved.
    pub preserve_ascii_control_characters: Option<bool>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationQuery {
    /// [Required] SQL query text to execute.
    /// The useLegacySql field can be used to indicate whether the query uses legacy SQL or GoogleSQL.
    #[serde(default)]
    pub query: String,
    /// Optional. Describes the table where the query results should be stored.
    pub destination_table: Option<TableReference>,
    /// Optional. Specifies whether the job is allowed to create new tables.
    pub create_disposition: Option<CreateDisposition>,
    /// Optional. Specifies the action that occurs if the destination table already exists.
    pub write_disposition: Option<WriteDisposition>,
    /// Optional. Specifies the default dataset to use for unqualified table names in the query.
    pub default_dataset: Option<DatasetReference>,
    /// Optional. Specifies a priority for the query. The default value is INTERACTIVE.
    pub priority: Option<Priority>,
    /// Optional. If true and the query uses legacy SQL dialect, allows the
    /// query to produce arbitrarily large result tables. Requires
    /// destinationTable to be set.
    pub allow_large_results: Option<bool>,
    /// Optional. Whether to look for the result in the query cache.
    pub use_query_cache: Option<bool>,
    /// Optional. If true and the query uses legacy SQL dialect, flattens all
    /// nested and repeated fields in the query results.
    pub flatten_results: Option<bool>,
    /// Limits the bytes billed for this job.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub maximum_bytes_billed: Option<i64>,
    /// Optional. Specifies whether to use BigQuery's legacy SQL dialect for this query.
    /// The service default is true; the driver always sends an explicit value.
    pub use_legacy_sql: Option<bool>,
    /// GoogleSQL only. Set to POSITIONAL to use positional (?) query parameters
    /// or to NAMED to use named (@myparam) query parameters in this query.
    pub parameter_mode: Option<String>,
    /// Query parameters for GoogleSQL queries.
    pub query_parameters: Option<Vec<QueryParameter>>,
    /// Allows the schema of the destination table to be updated as a side effect of the query job.
    pub schema_update_options: Option<Vec<SchemaUpdateOption>>,
    /// Time-based partitioning specification for the destination table.
    /// Only one of timePartitioning and rangePartitioning should be specified.
    pub time_partitioning: Option<TimePartitioning>,
    /// Range partitioning specification for the destination table.
    /// Only one of timePartitioning and rangePartitioning should be specified.
    pub range_partitioning: Option<RangePartitioning>,
    /// Clustering specification for the destination table.
    pub clustering: Option<Clustering>,
    /// Custom encryption configuration (e.g., Cloud KMS keys).
    pub destination_encryption_configuration: Option<EncryptionConfiguration>,
    /// Connection properties which can modify the query behavior.
    pub connection_properties: Option<Vec<ConnectionProperty>>,
    /// If true, the job creates a new session using a randomly generated session id.
    pub create_session: Option<bool>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum JobType {
    Query(JobConfigurationQuery),
    Load(JobConfigurationLoad),
}

impl Default for JobType {
    fn default() -> Self {
        Self::Query(JobConfigurationQuery::default())
    }
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobConfiguration {
    /// Output only. The type of the job. Can be QUERY, LOAD, EXTRACT, COPY or UNKNOWN.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_type: String,
    /// [Pick one] Configures a job.
    #[serde(flatten)]
    pub job: JobType,
    /// Optional. If set, don't actually run this job.
    pub dry_run: Option<bool>,
    /// Optional. Job timeout in milliseconds.
    /// If this time limit is exceeded, BigQuery might attempt to stop the job.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub job_timeout_ms: Option<i64>,
    /// The labels associated with this job.
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    /// Required. The ID of the project containing this job.
    #[serde(default)]
    pub project_id: String,
    /// Required. The ID of the job. Not present when the job is a dry run.
    #[serde(default)]
    pub job_id: String,
    /// Optional. The geographic location of the job. The default value is US.
    pub location: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Pending,
    Running,
    Done,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Output only. Final error result of the job.
    /// If present, indicates that the job has completed and was unsuccessful.
    pub error_result: Option<ErrorProto>,
    /// Output only. The first errors encountered during the running of the job.
    /// Errors here do not necessarily mean that the job has not completed or was unsuccessful.
    pub errors: Option<Vec<ErrorProto>>,
    /// Output only. Running state of the job. Valid states include 'PENDING', 'RUNNING', and 'DONE'.
    pub state: JobState,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Output only. The resource type.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Output only. Opaque ID field of the job.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Required. Describes the job configuration.
    pub configuration: JobConfiguration,
    /// Reference describing the unique-per-user name of the job.
    #[serde(default)]
    pub job_reference: JobReference,
    /// Output only. Information about the job, including starting time and ending time of the job.
    pub statistics: Option<JobStatistics>,
    /// Output only. The status of this job. Examine this value when polling an
    /// asynchronous job to see if the job is complete.
    #[serde(default)]
    pub status: JobStatus,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    /// Output only. Creation time of this job, in milliseconds since the epoch.
    /// Present on all jobs.
    #[serde(deserialize_with = "crate::http::from_str")]
    pub creation_time: i64,
    /// Output only. Start time of this job, in milliseconds since the epoch.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub start_time: Option<i64>,
    /// Output only. End time of this job, in milliseconds since the epoch.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub end_time: Option<i64>,
    /// Output only. Total bytes processed for the job.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub total_bytes_processed: Option<i64>,
    /// Output only. Statistics for a query job.
    pub query: Option<JobStatisticsQuery>,
    /// Output only. Statistics for a load job.
    pub load: Option<JobStatisticsLoad>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobStatisticsQuery {
    /// Output only. Total bytes processed for the job.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub total_bytes_processed: Option<i64>,
    /// Output only. Total bytes billed for the job, when on-demand pricing applies.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub total_bytes_billed: Option<i64>,
    /// Output only. The number of rows affected by a DML statement.
    /// Present only for DML statements INSERT, UPDATE or DELETE.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub num_dml_affected_rows: Option<i64>,
    /// Output only. The type of query statement, if valid.
    pub statement_type: Option<String>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobStatisticsLoad {
    /// Output only. Number of source files in a load job.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub input_files: Option<i64>,
    /// Output only. Number of bytes of source data in a load job.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub input_file_bytes: Option<i64>,
    /// Output only. Number of rows imported in a load job.
    /// Note that while an import job is in the running state, this value may change.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub output_rows: Option<i64>,
    /// Output only. Size of the loaded data in bytes.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub output_bytes: Option<i64>,
    /// Output only. The number of bad records encountered.
    #[serde(default, deserialize_with = "crate::http::from_str_option")]
    pub bad_records: Option<i64>,
}
