//! # bigquery-driver
//!
//! SQL-style driver for Google BigQuery over the HTTP/JSON API.
//!
//! BigQuery is job-based: a query submits a job, the driver polls until the
//! job completes, then pages rows over HTTP and decodes the wire JSON into
//! typed values chosen from the server-advertised schema. Ingestion is
//! exposed through the non-standard `LOAD`/`STREAM` verbs, translated into
//! load jobs or streaming inserts.
//!
//! ## Query
//!
//! ```rust,ignore
//! use bigquery_driver::driver::Driver;
//! use bigquery_driver::param::Param;
//!
//! async fn run() -> Result<(), bigquery_driver::error::Error> {
//!     let conn = Driver::open("bigquery://my-project/us/my_dataset").await?;
//!     let stmt = conn.prepare("SELECT word, word_count FROM corpus WHERE corpus = ?")?;
//!     let mut rows = stmt.query(&[Param::pos("romeoandjuliet")]).await?;
//!     while let Some(row) = rows.next().await? {
//!         let word: String = row.column(0)?;
//!         let count: i64 = row.column(1)?;
//!         println!("{word}: {count}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Ingestion
//!
//! Callers register a byte stream, then execute a `LOAD` or `STREAM`
//! statement referencing it:
//!
//! ```rust,ignore
//! use bigquery_driver::driver::Driver;
//! use bigquery_driver::ingestion::reader;
//!
//! async fn run() -> Result<(), bigquery_driver::error::Error> {
//!     reader::register("r1", std::io::Cursor::new(b"1,alice\n2,bob\n".to_vec()));
//!     let conn = Driver::open("bigquery://my-project/us/my_dataset").await?;
//!     let stmt = conn.prepare("LOAD 'Reader:csv:r1' DATA INTO TABLE my_dataset.users")?;
//!     let result = stmt.execute(&[]).await?;
//!     assert_eq!(result.rows_affected(), 2);
//!     Ok(())
//! }
//! ```
//!
//! An optional `/*+ {...} +*/` hint block augments the job configuration;
//! with `"ExpandDSN": true` the driver substitutes `$ProjectID`,
//! `$DatasetID` and `$Location` in the query body.

pub mod driver;
pub mod dsn;
pub mod error;
pub(crate) mod hint;
pub mod http;
pub mod ingestion;
pub mod param;
pub(crate) mod retry;
pub mod schema;
pub(crate) mod session;
pub mod token;
pub mod value;
pub(crate) mod wait;
