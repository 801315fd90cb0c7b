use std::io::{BufRead, BufReader, Read};

use crate::error::Error;
use crate::hint;
use crate::http::bigquery_job_client::BigqueryJobClient;
use crate::http::bigquery_tabledata_client::BigqueryTabledataClient;
use crate::http::job::{Job, JobConfiguration, JobConfigurationLoad, JobReference, JobType};
use crate::http::table::{SourceFormat, TableReference};
use crate::http::tabledata::insert_all::{InsertAllRequest, InsertError, Row};
use crate::ingestion::{parser, reader, Destination, Ingestion, Kind};
use crate::retry::run_with_retries;
use crate::wait::wait_for_job_completion;

/// The service quota allows 10,000 rows per streaming request; stay just below it.
const MAX_STREAM_BATCH_COUNT: usize = 9999;
const ATTEMPTS: usize = 3;

/// Executes parsed LOAD/STREAM statements against a connection-bound
/// project, dataset and location.
pub(crate) struct IngestionService {
    job_client: BigqueryJobClient,
    tabledata_client: BigqueryTabledataClient,
    project_id: String,
    dataset_id: String,
    location: String,
}

impl IngestionService {
    pub(crate) fn new(
        job_client: BigqueryJobClient,
        tabledata_client: BigqueryTabledataClient,
        project_id: String,
        dataset_id: String,
        location: String,
    ) -> Self {
        Self {
            job_client,
            tabledata_client,
            project_id,
            dataset_id,
            location,
        }
    }

    /// Ingests data as described by the statement; returns the affected row
    /// count. A LOAD reports the warehouse's `outputRows`; a STREAM reports
    /// the number of rows submitted.
    pub(crate) async fn ingest(&self, sql: &str) -> Result<i64, Error> {
        let hint_body = hint::extract(sql);
        let sql = hint::strip(sql);

        let mut ingestion = parser::parse(sql.trim_end())?;
        ingestion.hint = hint_body.unwrap_or_default();
        ingestion.destination.init(&self.project_id, &self.dataset_id);

        match ingestion.kind {
            Kind::Load => self.load(&ingestion).await,
            Kind::Stream => self.stream(&ingestion).await,
        }
    }

    async fn load(&self, ingestion: &Ingestion) -> Result<i64, Error> {
        let config = prepare_load_config(ingestion)?;

        // a hint with explicit sourceUris runs URI-sourced, without a body
        let media = if config.source_uris.is_empty() {
            let mut stream = reader::get(&ingestion.reader_id)?;
            let mut buffer = Vec::new();
            stream.read_to_end(&mut buffer)?;
            Some(buffer)
        } else {
            None
        };

        let job = Job {
            configuration: JobConfiguration {
                job: JobType::Load(config),
                ..Default::default()
            },
            job_reference: JobReference {
                project_id: self.project_id.clone(),
                location: Some(self.location.clone()),
                ..Default::default()
            },
            ..Default::default()
        };

        let submitted = match media {
            Some(buffer) => {
                run_with_retries(|| self.job_client.create_with_media(&job, buffer.clone()), ATTEMPTS).await?
            }
            None => run_with_retries(|| self.job_client.create(&job), ATTEMPTS).await?,
        };

        let completed = wait_for_job_completion(
            &self.job_client,
            &self.project_id,
            Some(self.location.as_str()),
            &submitted.job_reference.job_id,
        )
        .await?;

        Ok(completed
            .statistics
            .and_then(|statistics| statistics.load)
            .and_then(|load| load.output_rows)
            .unwrap_or(0))
    }

    async fn stream(&self, ingestion: &Ingestion) -> Result<i64, Error> {
        let stream = reader::get(&ingestion.reader_id)?;
        let rows = read_rows(stream, &ingestion.insert_id_field)?;
        self.stream_all(rows, &ingestion.destination).await
    }

    /// Submits rows in order, at most `MAX_STREAM_BATCH_COUNT` per request.
    /// Returns the offset after the last successful batch.
    async fn stream_all(&self, all_rows: Vec<Row<serde_json::Value>>, destination: &Destination) -> Result<i64, Error> {
        let mut offset = 0usize;
        while offset < all_rows.len() {
            let count = MAX_STREAM_BATCH_COUNT.min(all_rows.len() - offset);
            let batch = &all_rows[offset..offset + count];
            offset += count;

            let response = run_with_retries(
                || {
                    let request = InsertAllRequest {
                        rows: batch.to_vec(),
                        ..Default::default()
                    };
                    let client = self.tabledata_client.clone();
                    let destination = destination.clone();
                    async move {
                        client
                            .insert(
                                &destination.project_id,
                                &destination.dataset_id,
                                &destination.table_id,
                                &request,
                            )
                            .await
                    }
                },
                ATTEMPTS,
            )
            .await?;

            if let Some(insert_errors) = response.insert_errors {
                if !insert_errors.is_empty() {
                    return Err(Error::StreamingInsert(to_insert_error(&insert_errors)));
                }
            }
        }
        Ok(offset as i64)
    }
}

/// Builds the load configuration: the hint JSON is unmarshalled onto it so
/// every load-job field is user-overridable, then the parsed destination and
/// format are applied on top.
fn prepare_load_config(ingestion: &Ingestion) -> Result<JobConfigurationLoad, Error> {
    let mut config = if ingestion.hint.is_empty() {
        JobConfigurationLoad::default()
    } else {
        serde_json::from_str(&ingestion.hint).map_err(|source| Error::InvalidHint {
            hint: ingestion.hint.clone(),
            source,
        })?
    };

    config.destination_table = TableReference {
        project_id: ingestion.destination.project_id.clone(),
        dataset_id: ingestion.destination.dataset_id.clone(),
        table_id: ingestion.destination.table_id.clone(),
    };

    if config.source_format.is_none() {
        config.source_format = Some(match ingestion.format.to_uppercase().as_str() {
            "CSV" => SourceFormat::Csv,
            "JSON" => SourceFormat::NewlineDelimitedJson,
            "PARQUET" => SourceFormat::Parquet,
            other => return Err(Error::UnsupportedType(format!("unsupported load format: {other}"))),
        });
    }
    Ok(config)
}

/// Reads newline-delimited JSON rows. When `insert_id_field` is non-empty
/// its value is pulled with a targeted byte scan and used as the row's
/// deduplication key.
fn read_rows(stream: impl Read, insert_id_field: &str) -> Result<Vec<Row<serde_json::Value>>, Error> {
    let mut rows = Vec::new();
    for line in BufReader::new(stream).lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let json: serde_json::Value = serde_json::from_str(&line)
            .map_err(|e| Error::StreamingInsert(format!("invalid row {line:?}: {e}")))?;
        let insert_id = if insert_id_field.is_empty() {
            None
        } else {
            Some(extract_json_key_value(line.as_bytes(), insert_id_field)?)
        };
        rows.push(Row { insert_id, json });
    }
    Ok(rows)
}

/// Locates `"key":` in a serialized JSON object and returns the value text
/// up to the next `,` or `}`, quotes stripped. No full JSON decode.
fn extract_json_key_value(data: &[u8], key: &str) -> Result<String, Error> {
    let needle = format!("\"{key}\":");
    let offset = data
        .windows(needle.len())
        .position(|window| window == needle.as_bytes())
        .ok_or_else(|| Error::StreamingInsert(format!("failed to locate: {key}")))?;
    let value_start = offset + needle.len();
    let mut limit = value_start;
    while limit < data.len() {
        match data[limit] {
            b',' | b'}' => break,
            _ => limit += 1,
        }
    }
    let mut value = String::from_utf8_lossy(&data[value_start..limit]).trim().to_string();
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        value = value[1..value.len() - 1].to_string();
    }
    Ok(value)
}

fn to_insert_error(insert_errors: &[InsertError]) -> String {
    let mut messages = Vec::new();
    for insert_error in insert_errors {
        if let Some(first) = insert_error.errors.first() {
            messages.push(format!("row {}: {}", insert_error.index, first.message));
        }
    }
    if messages.is_empty() {
        format!("{} rows rejected", insert_errors.len())
    } else {
        messages.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_json_key_value, prepare_load_config, read_rows};
    use crate::http::table::SourceFormat;
    use crate::ingestion::{parser, Destination, Ingestion, Kind};

    fn load_ingestion(hint: &str) -> Ingestion {
        let mut ingestion = parser::parse("LOAD 'Reader:csv:r1' DATA INTO TABLE proj.ds.t").unwrap();
        ingestion.hint = hint.to_string();
        ingestion
    }

    #[test]
    fn test_prepare_load_config_defaults() {
        let config = prepare_load_config(&load_ingestion("")).unwrap();
        assert_eq!(config.source_format, Some(SourceFormat::Csv));
        assert_eq!(config.destination_table.project_id, "proj");
        assert_eq!(config.destination_table.dataset_id, "ds");
        assert_eq!(config.destination_table.table_id, "t");
    }

    #[test]
    fn test_prepare_load_config_hint_overrides() {
        let hint = r#"{"fieldDelimiter":"|","maxBadRecords":3,"writeDisposition":"WRITE_TRUNCATE","sourceFormat":"PARQUET"}"#;
        let config = prepare_load_config(&load_ingestion(hint)).unwrap();
        assert_eq!(config.field_delimiter.as_deref(), Some("|"));
        assert_eq!(config.max_bad_records, Some(3));
        // the hint's sourceFormat wins over the parsed format
        assert_eq!(config.source_format, Some(SourceFormat::Parquet));
        // the destination always comes from the statement
        assert_eq!(config.destination_table.table_id, "t");
    }

    #[test]
    fn test_prepare_load_config_json_format() {
        let mut ingestion = load_ingestion("");
        ingestion.format = "json".to_string();
        let config = prepare_load_config(&ingestion).unwrap();
        assert_eq!(config.source_format, Some(SourceFormat::NewlineDelimitedJson));
    }

    #[test]
    fn test_prepare_load_config_invalid_hint() {
        let err = prepare_load_config(&load_ingestion("{not json")).unwrap_err();
        assert!(err.to_string().contains("invalid hint"), "{err}");
    }

    #[test]
    fn test_read_rows_with_insert_id() {
        let data = "{\"ID\":\"r1\",\"name\":\"a\"}\n\n{\"ID\":\"r2\",\"name\":\"b\"}\n";
        let rows = read_rows(data.as_bytes(), "ID").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].insert_id.as_deref(), Some("r1"));
        assert_eq!(rows[1].insert_id.as_deref(), Some("r2"));
        assert_eq!(rows[1].json["name"], "b");
    }

    #[test]
    fn test_read_rows_without_insert_id() {
        let data = "{\"name\":\"a\"}\n{\"name\":\"b\"}\n";
        let rows = read_rows(data.as_bytes(), "").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].insert_id.is_none());
    }

    #[test]
    fn test_read_rows_broken_row() {
        let data = "{\"name\":\"a\"}\n{broken\n";
        assert!(read_rows(data.as_bytes(), "").is_err());
    }

    #[test]
    fn test_extract_json_key_value() {
        assert_eq!(extract_json_key_value(br#"{"ID":"r1","x":1}"#, "ID").unwrap(), "r1");
        assert_eq!(extract_json_key_value(br#"{"x":1,"ID":25}"#, "ID").unwrap(), "25");
        assert!(extract_json_key_value(br#"{"x":1}"#, "ID").is_err());
    }

    #[test]
    fn test_destination_defaults() {
        let mut destination = Destination {
            table_id: "t".to_string(),
            ..Default::default()
        };
        destination.init("p-default", "d-default");
        assert_eq!(destination.project_id, "p-default");
        assert_eq!(destination.dataset_id, "d-default");

        let mut destination = Destination {
            project_id: "p".to_string(),
            dataset_id: "d".to_string(),
            table_id: "t".to_string(),
        };
        destination.init("p-default", "d-default");
        assert_eq!(destination.project_id, "p");
        assert_eq!(destination.dataset_id, "d");
    }

    #[test]
    fn test_stream_kind_parses_with_hint_stripped() {
        let sql = "STREAM 'Reader:ID:json:123' DATA INTO TABLE t1";
        let ingestion = parser::parse(sql).unwrap();
        assert_eq!(ingestion.kind, Kind::Stream);
    }
}
