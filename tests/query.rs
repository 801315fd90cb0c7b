use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bigquery_driver::driver::{ClientOptions, Connection, Driver};
use bigquery_driver::param::Param;
use bigquery_driver::schema::DestType;
use bigquery_driver::value::StructValue;

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

fn done_job(job_id: &str) -> serde_json::Value {
    json!({
        "configuration": {"query": {"query": "q"}},
        "jobReference": {"projectId": "p1", "jobId": job_id, "location": "us"},
        "status": {"state": "DONE"}
    })
}

async fn mock_job_insert(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_job(job_id)))
        .mount(server)
        .await;
}

async fn mock_query_results(server: &MockServer, job_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/bigquery/v2/projects/p1/queries/{job_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_primitive_select() {
    let server = MockServer::start().await;
    mock_job_insert(&server, "job1").await;
    mock_query_results(
        &server,
        "job1",
        json!({
            "kind": "bigquery#getQueryResultsResponse",
            "schema": {"fields": [
                {"name": "f1", "type": "INTEGER", "mode": "NULLABLE"},
                {"name": "f2", "type": "STRING", "mode": "NULLABLE"},
                {"name": "f3", "type": "FLOAT", "mode": "NULLABLE"},
                {"name": "f4", "type": "TIMESTAMP", "mode": "NULLABLE"}
            ]},
            "jobReference": {"projectId": "p1", "jobId": "job1"},
            "totalRows": "1",
            "rows": [
                {"f": [{"v": "1"}, {"v": "test"}, {"v": "3.4"}, {"v": "1.5778368E9"}]}
            ],
            "jobComplete": true
        }),
    )
    .await;

    let conn = connect(&server).await;
    let stmt = conn
        .prepare(r#"SELECT 1 AS f1, "test" AS f2, 3.4 AS f3, TIMESTAMP("2020-01-01 00:00:00 UTC") AS f4"#)
        .unwrap();
    let mut rows = stmt.query(&[]).await.unwrap();

    assert_eq!(rows.columns(), &["f1", "f2", "f3", "f4"]);
    assert_eq!(rows.total_rows(), 1);
    assert_eq!(rows.column_type_database_type_name(0), Some("INTEGER"));
    assert_eq!(rows.column_type_nullable(0), Some(true));
    assert_eq!(
        rows.column_type_scan_type(0),
        Some(&DestType::Nullable(Box::new(DestType::Int64)))
    );

    let row = rows.next().await.unwrap().unwrap();
    let f1: i64 = row.column(0).unwrap();
    let f2: String = row.column(1).unwrap();
    let f3: f64 = row.column(2).unwrap();
    let f4: time::OffsetDateTime = row.column(3).unwrap();
    assert_eq!(f1, 1);
    assert_eq!(f2, "test");
    assert_eq!(f3, 3.4);
    assert_eq!(f4, time::macros::datetime!(2020-01-01 00:00:00 UTC));

    assert!(rows.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_nested_and_repeated_select() {
    let server = MockServer::start().await;
    mock_job_insert(&server, "job2").await;

    let runner = |name: &str, s1: &str, s2: &str| {
        json!({"f": [
            {"v": "800M"},
            {"v": {"f": [{"v": name}, {"v": [{"v": s1}, {"v": s2}]}]}}
        ]})
    };
    mock_query_results(
        &server,
        "job2",
        json!({
            "schema": {"fields": [
                {"name": "event", "type": "STRING", "mode": "REQUIRED"},
                {"name": "runner", "type": "RECORD", "mode": "REQUIRED", "fields": [
                    {"name": "name", "type": "STRING", "mode": "REQUIRED"},
                    {"name": "splits", "type": "FLOAT", "mode": "REPEATED"}
                ]}
            ]},
            "jobReference": {"projectId": "p1", "jobId": "job2"},
            "totalRows": "2",
            "rows": [runner("Ben", "23.6", "26.3"), runner("Frank", "23.4", "26.3")],
            "jobComplete": true
        }),
    )
    .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT event, runner FROM race").unwrap();
    let mut rows = stmt.query(&[]).await.unwrap();

    let row = rows.next().await.unwrap().unwrap();
    let event: String = row.column(0).unwrap();
    let runner: StructValue = row.column(1).unwrap();
    assert_eq!(event, "800M");
    let name: String = runner.column_by_name("Name").unwrap();
    let splits: Vec<f64> = runner.column_by_name("Splits").unwrap();
    assert_eq!(name, "Ben");
    assert_eq!(splits, vec![23.6, 26.3]);

    let row = rows.next().await.unwrap().unwrap();
    let runner: StructValue = row.column(1).unwrap();
    let name: String = runner.column_by_name("Name").unwrap();
    let splits: Vec<f64> = runner.column_by_name("Splits").unwrap();
    assert_eq!(name, "Frank");
    assert_eq!(splits, vec![23.4, 26.3]);

    assert!(rows.next().await.unwrap().is_none());
}

fn word_count_results(job_id: &str) -> serde_json::Value {
    json!({
        "schema": {"fields": [
            {"name": "word", "type": "STRING", "mode": "NULLABLE"},
            {"name": "word_count", "type": "INTEGER", "mode": "NULLABLE"}
        ]},
        "jobReference": {"projectId": "p1", "jobId": job_id},
        "totalRows": "1",
        "rows": [{"f": [{"v": "the"}, {"v": "614"}]}],
        "jobComplete": true
    })
}

#[tokio::test]
async fn test_positional_parameters_encoding() {
    let server = MockServer::start().await;
    mock_job_insert(&server, "job3").await;
    mock_query_results(&server, "job3", word_count_results("job3")).await;

    let conn = connect(&server).await;
    let stmt = conn
        .prepare("SELECT word, word_count FROM corpus WHERE corpus = ? AND word_count >= ?")
        .unwrap();
    assert_eq!(stmt.num_input(), 2);

    let mut rows = stmt.query(&[Param::pos("romeoandjuliet"), Param::pos(250i64)]).await.unwrap();
    let row = rows.next().await.unwrap().unwrap();
    let count: i64 = row.column(1).unwrap();
    assert_eq!(count, 614);

    let requests = server.received_requests().await.unwrap();
    let insert = requests
        .iter()
        .find(|r| r.url.path().ends_with("/jobs"))
        .expect("job insert request");
    let body: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
    let params = &body["configuration"]["query"]["queryParameters"];
    assert_eq!(params[0]["parameterType"]["type"], "STRING");
    assert_eq!(params[0]["parameterValue"]["value"], "romeoandjuliet");
    assert!(params[0].get("name").is_none());
    assert_eq!(params[1]["parameterType"]["type"], "INT64");
    assert_eq!(params[1]["parameterValue"]["value"], "250");
}

#[tokio::test]
async fn test_named_parameters_encoding() {
    let server = MockServer::start().await;
    mock_job_insert(&server, "job4").await;
    mock_query_results(&server, "job4", word_count_results("job4")).await;

    let conn = connect(&server).await;
    let stmt = conn
        .prepare("SELECT word, word_count FROM corpus WHERE corpus = @corpus AND word_count >= @min_word_count")
        .unwrap();
    assert_eq!(stmt.num_input(), 2);

    let mut rows = stmt
        .query(&[
            Param::named("corpus", "romeoandjuliet"),
            Param::named("min_word_count", 250i64),
        ])
        .await
        .unwrap();
    assert!(rows.next().await.unwrap().is_some());

    let requests = server.received_requests().await.unwrap();
    let insert = requests
        .iter()
        .find(|r| r.url.path().ends_with("/jobs"))
        .expect("job insert request");
    let body: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
    let params = &body["configuration"]["query"]["queryParameters"];
    assert_eq!(params[0]["name"], "corpus");
    assert_eq!(params[1]["name"], "min_word_count");
}

#[tokio::test]
async fn test_expand_dsn_hint() {
    let server = MockServer::start().await;
    mock_job_insert(&server, "job5").await;
    mock_query_results(
        &server,
        "job5",
        json!({
            "schema": {"fields": [{"name": "p", "type": "STRING", "mode": "NULLABLE"}]},
            "jobReference": {"projectId": "p1", "jobId": "job5"},
            "totalRows": "1",
            "rows": [{"f": [{"v": "p1"}]}],
            "jobComplete": true
        }),
    )
    .await;

    let conn = connect(&server).await;
    let stmt = conn
        .prepare(r#"SELECT /*+ {"ExpandDSN":true} +*/ '$ProjectID' AS p"#)
        .unwrap();
    let mut rows = stmt.query(&[]).await.unwrap();
    let row = rows.next().await.unwrap().unwrap();
    let p: String = row.column(0).unwrap();
    assert_eq!(p, conn.project_id());

    let requests = server.received_requests().await.unwrap();
    let insert = requests.iter().find(|r| r.url.path().ends_with("/jobs")).unwrap();
    let body: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
    let query = body["configuration"]["query"]["query"].as_str().unwrap();
    assert!(query.contains("'p1'"), "expanded query: {query}");
    assert!(!query.contains("$ProjectID"), "expanded query: {query}");
}

#[tokio::test]
async fn test_paging_yields_total_rows() {
    let server = MockServer::start().await;
    mock_job_insert(&server, "job6").await;

    let page = |values: &[i64], token: Option<&str>| {
        let mut body = json!({
            "schema": {"fields": [{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]},
            "jobReference": {"projectId": "p1", "jobId": "job6"},
            "totalRows": "4",
            "rows": values.iter().map(|v| json!({"f": [{"v": v.to_string()}]})).collect::<Vec<_>>(),
            "jobComplete": true
        });
        if let Some(token) = token {
            body["pageToken"] = json!(token);
        }
        body
    };

    // the second page is matched by its carried token; the first page mock
    // has lower priority and catches the token-less initial call
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/p1/queries/job6"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[3, 4], None)))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/p1/queries/job6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1, 2], Some("page-2"))))
        .with_priority(5)
        .mount(&server)
        .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT n FROM numbers").unwrap();
    let mut rows = stmt.query(&[]).await.unwrap();

    let mut collected = Vec::new();
    while let Some(row) = rows.next().await.unwrap() {
        let n: i64 = row.column(0).unwrap();
        collected.push(n);
    }
    assert_eq!(collected, vec![1, 2, 3, 4]);
    assert_eq!(rows.total_rows(), 4);
}

#[tokio::test]
async fn test_retries_on_transient_status() {
    let server = MockServer::start().await;
    // two 503s, then success
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/jobs"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"error": {"code": 503, "message": "unavailable"}})),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_job("job7")))
        .with_priority(5)
        .mount(&server)
        .await;
    mock_query_results(
        &server,
        "job7",
        json!({
            "schema": {"fields": [{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]},
            "jobReference": {"projectId": "p1", "jobId": "job7"},
            "totalRows": "0",
            "jobComplete": true
        }),
    )
    .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT n FROM numbers").unwrap();
    let mut rows = stmt.query(&[]).await.unwrap();
    assert!(rows.next().await.unwrap().is_none());

    let requests = server.received_requests().await.unwrap();
    let inserts = requests.iter().filter(|r| r.url.path().ends_with("/jobs")).count();
    assert_eq!(inserts, 3);
}

#[tokio::test]
async fn test_retries_exhausted_surfaces_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/jobs"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"error": {"code": 503, "message": "unavailable"}})),
        )
        .mount(&server)
        .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT 1").unwrap();
    let err = stmt.query(&[]).await.unwrap_err();
    assert!(err.to_string().contains("unavailable"), "{err}");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_terminal_status_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/jobs"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": {"code": 400, "message": "bad query"}})))
        .mount(&server)
        .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT bogus").unwrap();
    let err = stmt.query(&[]).await.unwrap_err();
    assert!(err.to_string().contains("bad query"), "{err}");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_poller_waits_until_done() {
    let server = MockServer::start().await;
    // job submit comes back RUNNING, the poller then sees RUNNING twice before DONE
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "configuration": {"query": {"query": "q"}},
            "jobReference": {"projectId": "p1", "jobId": "job8", "location": "us"},
            "status": {"state": "RUNNING"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/p1/jobs/job8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "configuration": {"query": {"query": "q"}},
            "jobReference": {"projectId": "p1", "jobId": "job8"},
            "status": {"state": "RUNNING"}
        })))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/p1/jobs/job8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_job("job8")))
        .with_priority(5)
        .mount(&server)
        .await;
    mock_query_results(
        &server,
        "job8",
        json!({
            "schema": {"fields": [{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]},
            "jobReference": {"projectId": "p1", "jobId": "job8"},
            "totalRows": "1",
            "rows": [{"f": [{"v": "7"}]}],
            "jobComplete": true
        }),
    )
    .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT n FROM numbers").unwrap();
    let mut rows = stmt.query(&[]).await.unwrap();
    let row = rows.next().await.unwrap().unwrap();
    let n: i64 = row.column(0).unwrap();
    assert_eq!(n, 7);

    let requests = server.received_requests().await.unwrap();
    let polls = requests
        .iter()
        .filter(|r| r.url.path() == "/bigquery/v2/projects/p1/jobs/job8")
        .count();
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn test_job_failure_surfaces_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "configuration": {"query": {"query": "q"}},
            "jobReference": {"projectId": "p1", "jobId": "job9", "location": "us"},
            "status": {"state": "RUNNING"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/p1/jobs/job9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "configuration": {"query": {"query": "q"}},
            "jobReference": {"projectId": "p1", "jobId": "job9"},
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalidQuery", "message": "Syntax error at [1:8]"},
                "errors": [{"reason": "invalidQuery", "message": "Syntax error at [1:8]"}]
            }
        })))
        .mount(&server)
        .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT bogus FROM").unwrap();
    let err = stmt.query(&[]).await.unwrap_err();
    let text = err.to_string();
    assert!(text.contains("Syntax error at [1:8]"), "{text}");
    assert!(text.contains("invalidQuery"), "{text}");
}

#[tokio::test]
async fn test_execute_reports_dml_affected_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/p1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_job("job10")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/p1/jobs/job10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "configuration": {"query": {"query": "q"}},
            "jobReference": {"projectId": "p1", "jobId": "job10"},
            "status": {"state": "DONE"},
            "statistics": {"creationTime": "1", "query": {"numDmlAffectedRows": "5"}}
        })))
        .mount(&server)
        .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("DELETE FROM t WHERE a < 10").unwrap();
    let result = stmt.execute(&[]).await.unwrap();
    assert_eq!(result.rows_affected(), 5);
    assert!(result.last_insert_id().is_err());
}

#[tokio::test]
async fn test_transactions_are_noop() {
    let server = MockServer::start().await;
    let conn = connect(&server).await;
    conn.begin().unwrap().commit().unwrap();
    conn.begin().unwrap().rollback().unwrap();
    conn.ping().await.unwrap();
}

#[tokio::test]
async fn test_schema_first_binding() {
    let server = MockServer::start().await;
    mock_job_insert(&server, "job12").await;
    mock_query_results(
        &server,
        "job12",
        json!({
            "schema": {"fields": [
                {"name": "n", "type": "INTEGER", "mode": "REQUIRED"},
                {"name": "flag", "type": "BOOLEAN", "mode": "REQUIRED"}
            ]},
            "jobReference": {"projectId": "p1", "jobId": "job12"},
            "totalRows": "1",
            "rows": [{"f": [{"v": "42"}, {"v": "true"}]}],
            "jobComplete": true
        }),
    )
    .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT n, flag FROM t").unwrap();
    // scan the INTEGER into text and the BOOLEAN into a 0/1 integer
    let mut rows = stmt
        .query_with_dest_types(&[], vec![DestType::String, DestType::Int8])
        .await
        .unwrap();
    let row = rows.next().await.unwrap().unwrap();
    let n: String = row.column(0).unwrap();
    let flag: i8 = row.column(1).unwrap();
    assert_eq!(n, "42");
    assert_eq!(flag, 1);
}

#[tokio::test]
async fn test_schema_first_mismatch_fails_at_construction() {
    let server = MockServer::start().await;
    mock_job_insert(&server, "job13").await;
    mock_query_results(
        &server,
        "job13",
        json!({
            "schema": {"fields": [{"name": "s", "type": "STRING", "mode": "REQUIRED"}]},
            "jobReference": {"projectId": "p1", "jobId": "job13"},
            "totalRows": "1",
            "rows": [{"f": [{"v": "x"}]}],
            "jobComplete": true
        }),
    )
    .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT s FROM t").unwrap();
    let err = stmt
        .query_with_dest_types(&[], vec![DestType::Timestamp])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unsupported binding"), "{err}");
}

#[tokio::test]
async fn test_decode_error_poisons_rows() {
    let server = MockServer::start().await;
    mock_job_insert(&server, "job11").await;
    mock_query_results(
        &server,
        "job11",
        json!({
            "schema": {"fields": [{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]},
            "jobReference": {"projectId": "p1", "jobId": "job11"},
            "totalRows": "2",
            "rows": [{"f": [{"v": "boom"}]}, {"f": [{"v": "2"}]}],
            "jobComplete": true
        }),
    )
    .await;

    let conn = connect(&server).await;
    let stmt = conn.prepare("SELECT n FROM numbers").unwrap();
    let mut rows = stmt.query(&[]).await.unwrap();

    let first = rows.next().await.unwrap_err().to_string();
    assert!(first.contains("n"), "{first}");
    // poisoned: the same error comes back again
    let second = rows.next().await.unwrap_err().to_string();
    assert_eq!(first, second);
}
