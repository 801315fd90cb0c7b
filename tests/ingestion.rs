use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bigquery_driver::driver::{ClientOptions, Connection, Driver};
use bigquery_driver::ingestion::reader;

#[ctor::ctor]
fn init() {
    let _ = tracing_subscriber::fmt::try_init();
}

async fn connect(server: &MockServer) -> Connection {
    Driver::open_with_options(
        "bigquery://p1/us/ds1",
        ClientOptions {
            endpoint: Some(server.uri()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

fn load_job(job_id: &str, state: &str) -> serde_json::Value {
    json!({
        "configuration": {"load": {"destinationTable": {"projectId": "proj", "datasetId": "ds", "tableId": "t"}}},
        "jobReference": {"projectId": "p1", "jobId": job_id, "location": "us"},
        "status": {"state": state}
    })
}

#[tokio::test]
#[serial]
async fn test_csv_load_happy_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/bigquery/v2/projects/p1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_job("load1", "RUNNING")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/p1/jobs/load1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "configuration": {"load": {"destinationTable": {"projectId": "proj", "datasetId": "ds", "tableId": "t"}}},
            "jobReference": {"projectId": "p1", "jobId": "load1"},
            "status": {"state": "DONE"},
            "statistics": {"creationTime": "1", "load": {"outputRows": "2", "inputFiles": "1"}}
        })))
        .mount(&server)
        .await;

    reader::register("R1", std::io::Cursor::new(b"1,alice\n2,bob\n".to_vec()));

    let conn = connect(&server).await;
    let stmt = conn.prepare("LOAD 'Reader:csv:R1' DATA INTO TABLE proj.ds.t").unwrap();
    assert_eq!(stmt.num_input(), 0);
    let result = stmt.execute(&[]).await.unwrap();
    assert_eq!(result.rows_affected(), 2);

    // the registered stream was drained and auto-unregistered on EOF
    assert!(!reader::is_registered("R1"));

    let requests = server.received_requests().await.unwrap();
    let upload = requests
        .iter()
        .find(|r| r.url.path() == "/upload/bigquery/v2/projects/p1/jobs")
        .expect("upload request");
    assert_eq!(upload.url.query(), Some("uploadType=multipart"));
    let raw = String::from_utf8_lossy(&upload.body);
    assert!(raw.contains("1,alice"), "media payload missing");
    assert!(raw.contains("\"sourceFormat\":\"CSV\""), "metadata part missing source format");
}

#[tokio::test]
#[serial]
async fn test_load_hint_overrides_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/bigquery/v2/projects/p1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_job("load2", "RUNNING")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/p1/jobs/load2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "configuration": {"load": {"destinationTable": {"projectId": "p1", "datasetId": "ds1", "tableId": "t"}}},
            "jobReference": {"projectId": "p1", "jobId": "load2"},
            "status": {"state": "DONE"},
            "statistics": {"creationTime": "1", "load": {"outputRows": "1"}}
        })))
        .mount(&server)
        .await;

    reader::register("R2", std::io::Cursor::new(b"a|b\n".to_vec()));

    let conn = connect(&server).await;
    let stmt = conn
        .prepare("LOAD /*+ {\"fieldDelimiter\":\"|\",\"writeDisposition\":\"WRITE_TRUNCATE\"} +*/ 'Reader:csv:R2' DATA INTO TABLE t")
        .unwrap();
    let result = stmt.execute(&[]).await.unwrap();
    assert_eq!(result.rows_affected(), 1);

    let requests = server.received_requests().await.unwrap();
    let upload = requests
        .iter()
        .find(|r| r.url.path() == "/upload/bigquery/v2/projects/p1/jobs")
        .unwrap();
    let raw = String::from_utf8_lossy(&upload.body);
    assert!(raw.contains("\"fieldDelimiter\":\"|\""), "{raw}");
    assert!(raw.contains("\"writeDisposition\":\"WRITE_TRUNCATE\""), "{raw}");
    // the destination falls back to the connection defaults
    assert!(raw.contains("\"datasetId\":\"ds1\""), "{raw}");
    assert!(raw.contains("\"projectId\":\"p1\""), "{raw}");
}

#[tokio::test]
#[serial]
async fn test_load_with_source_uris_skips_reader() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_job("load3", "RUNNING")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/p1/jobs/load3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "configuration": {"load": {"destinationTable": {"projectId": "p1", "datasetId": "ds1", "tableId": "t"}}},
            "jobReference": {"projectId": "p1", "jobId": "load3"},
            "status": {"state": "DONE"},
            "statistics": {"creationTime": "1", "load": {"outputRows": "10"}}
        })))
        .mount(&server)
        .await;

    // no reader registered: sourceUris in the hint run the job URI-sourced
    let conn = connect(&server).await;
    let stmt = conn
        .prepare("LOAD /*+ {\"sourceUris\":[\"gs://bucket/data.csv\"]} +*/ 'Reader:csv:unused' DATA INTO TABLE t")
        .unwrap();
    let result = stmt.execute(&[]).await.unwrap();
    assert_eq!(result.rows_affected(), 10);

    let requests = server.received_requests().await.unwrap();
    let insert = requests
        .iter()
        .find(|r| r.url.path() == "/bigquery/v2/projects/p1/jobs")
        .expect("plain job insert");
    let body: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
    assert_eq!(body["configuration"]["load"]["sourceUris"][0], "gs://bucket/data.csv");
}

#[tokio::test]
#[serial]
async fn test_streaming_batch_rollup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/datasets/ds1/tables/t1/insertAll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "bigquery#tableDataInsertAllResponse"})))
        .mount(&server)
        .await;

    let mut payload = String::new();
    for i in 0..23_000 {
        payload.push_str(&format!("{{\"n\":{i}}}\n"));
    }
    reader::register("R3", std::io::Cursor::new(payload.into_bytes()));

    let conn = connect(&server).await;
    let stmt = conn.prepare("STREAM 'Reader::json:R3' DATA INTO TABLE t1").unwrap();
    let result = stmt.execute(&[]).await.unwrap();
    assert_eq!(result.rows_affected(), 23_000);

    let requests = server.received_requests().await.unwrap();
    let sizes: Vec<usize> = requests
        .iter()
        .filter(|r| r.url.path().ends_with("/insertAll"))
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["rows"].as_array().unwrap().len()
        })
        .collect();
    assert_eq!(sizes, vec![9999, 9999, 3002]);
}

#[tokio::test]
#[serial]
async fn test_streaming_insert_id_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/datasets/ds1/tables/t1/insertAll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "bigquery#tableDataInsertAllResponse"})))
        .mount(&server)
        .await;

    reader::register(
        "R4",
        std::io::Cursor::new(b"{\"ID\":\"a1\",\"v\":1}\n{\"ID\":\"a2\",\"v\":2}\n".to_vec()),
    );

    let conn = connect(&server).await;
    let stmt = conn.prepare("STREAM 'Reader:ID:json:R4' DATA INTO TABLE t1").unwrap();
    let result = stmt.execute(&[]).await.unwrap();
    assert_eq!(result.rows_affected(), 2);

    let requests = server.received_requests().await.unwrap();
    let insert = requests.iter().find(|r| r.url.path().ends_with("/insertAll")).unwrap();
    let body: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
    assert_eq!(body["rows"][0]["insertId"], "a1");
    assert_eq!(body["rows"][1]["insertId"], "a2");
    assert_eq!(body["rows"][1]["json"]["v"], 2);
}

#[tokio::test]
#[serial]
async fn test_streaming_insert_errors_abort() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/datasets/ds1/tables/t1/insertAll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "bigquery#tableDataInsertAllResponse",
            "insertErrors": [{"index": 0, "errors": [{"reason": "invalid", "location": "n", "message": "no such field"}]}]
        })))
        .mount(&server)
        .await;

    reader::register("R5", std::io::Cursor::new(b"{\"n\":1}\n".to_vec()));

    let conn = connect(&server).await;
    let stmt = conn.prepare("STREAM 'Reader::json:R5' DATA INTO TABLE t1").unwrap();
    let err = stmt.execute(&[]).await.unwrap_err();
    assert!(err.to_string().contains("no such field"), "{err}");
}

#[tokio::test]
#[serial]
async fn test_unknown_reader_fails() {
    let server = MockServer::start().await;
    let conn = connect(&server).await;
    let stmt = conn.prepare("LOAD 'Reader:csv:missing' DATA INTO TABLE t").unwrap();
    let err = stmt.execute(&[]).await.unwrap_err();
    assert!(err.to_string().contains("unknown reader: missing"), "{err}");
}

#[tokio::test]
#[serial]
async fn test_dsl_rejections() {
    let server = MockServer::start().await;
    let conn = connect(&server).await;

    for sql in [
        " LOAD 'Reader:csv:r1' DATA INTO TABLE t",
        "LOAD'Reader:csv:r1' DATA INTO TABLE t",
        "LOAD 'Reader :csv:r1' DATA INTO TABLE t",
        "LOAD 'Reader: csv:r1' DATA INTO TABLE t",
        "LOAD 'Reader:csv:r1' DATA INTO TABLE proj.9set.t",
        "LOAD 'Reader:csv:r1' DATA INTO TABLE t garbage",
    ] {
        let stmt = conn.prepare(sql).unwrap();
        assert!(stmt.execute(&[]).await.is_err(), "must reject: {sql}");
    }
}
