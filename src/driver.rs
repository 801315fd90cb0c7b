use std::collections::VecDeque;
use std::sync::{Arc, OnceLock, RwLock};

use crate::dsn::{parse_dsn, Config};
use crate::error::Error;
use crate::hint::{self, QueryHint};
use crate::http::bigquery_client::{Authorizer, BigqueryClient};
use crate::http::bigquery_job_client::BigqueryJobClient;
use crate::http::bigquery_tabledata_client::BigqueryTabledataClient;
use crate::http::job::get_query_results::GetQueryResultsRequest;
use crate::http::job::{Job, JobConfiguration, JobConfigurationQuery, JobReference, JobState, JobType};
use crate::http::types::DatasetReference;
use crate::ingestion::service::IngestionService;
use crate::ingestion::Kind;
use crate::param::Param;
use crate::retry::run_with_retries;
use crate::schema::DestType;
use crate::session::Session;
use crate::token::TokenSource;
use crate::value::Row;
use crate::wait::wait_for_job_completion;

const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com";
const SUBMIT_ATTEMPTS: usize = 3;

/// Process-wide client options, set once and snapshotted at `open` time.
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Base endpoint override, e.g. an emulator address.
    pub endpoint: Option<String>,
    /// User agent override.
    pub user_agent: Option<String>,
    /// Prebuilt HTTP client; transport pooling lives here.
    pub http: Option<reqwest::Client>,
    /// Explicit token source, bypassing credential discovery.
    pub token_source: Option<Arc<dyn TokenSource>>,
    /// Trace response bodies at debug level.
    pub debug: bool,
}

fn global_options() -> &'static RwLock<ClientOptions> {
    static OPTIONS: OnceLock<RwLock<ClientOptions>> = OnceLock::new();
    OPTIONS.get_or_init(|| RwLock::new(ClientOptions::default()))
}

/// Sets the process-wide client options used by `Driver::open`.
pub fn set_client_options(options: ClientOptions) {
    *global_options().write().expect("client options lock poisoned") = options;
}

/// Builds a token source from parsed credential material. OAuth2 flows are
/// deployment glue; callers wire a provider before opening connections that
/// rely on DSN-carried credentials.
pub trait TokenSourceProvider: Send + Sync {
    fn token_source(&self, config: &Config) -> Result<Arc<dyn TokenSource>, Error>;
}

fn token_source_provider() -> &'static RwLock<Option<Arc<dyn TokenSourceProvider>>> {
    static PROVIDER: OnceLock<RwLock<Option<Arc<dyn TokenSourceProvider>>>> = OnceLock::new();
    PROVIDER.get_or_init(|| RwLock::new(None))
}

pub fn set_token_source_provider(provider: Arc<dyn TokenSourceProvider>) {
    *token_source_provider().write().expect("token source provider lock poisoned") = Some(provider);
}

/// Entry point. Opens connections from a DSN; the scheme is validated here.
pub struct Driver;

impl Driver {
    pub async fn open(dsn: &str) -> Result<Connection, Error> {
        let config = parse_dsn(dsn)?;
        Self::connect(config, None).await
    }

    pub async fn open_with_options(dsn: &str, options: ClientOptions) -> Result<Connection, Error> {
        let config = parse_dsn(dsn)?;
        Self::connect(config, Some(options)).await
    }

    async fn connect(config: Config, options: Option<ClientOptions>) -> Result<Connection, Error> {
        let options = match options {
            Some(options) => options,
            None => global_options().read().expect("client options lock poisoned").clone(),
        };

        let authorizer = if let Some(token_source) = &options.token_source {
            Authorizer::Bearer(token_source.clone())
        } else if !config.api_key.is_empty() {
            Authorizer::ApiKey(config.api_key.clone())
        } else if config.has_credentials() {
            let provider = token_source_provider()
                .read()
                .expect("token source provider lock poisoned")
                .clone();
            match provider {
                Some(provider) => Authorizer::Bearer(provider.token_source(&config)?),
                None => {
                    return Err(Error::Credential(
                        "credentials configured but no token source provider is registered".to_string(),
                    ))
                }
            }
        } else {
            // ambient/discovery path: a registered provider may still resolve
            // default credentials, otherwise requests go out anonymous
            let provider = token_source_provider()
                .read()
                .expect("token source provider lock poisoned")
                .clone();
            match provider {
                Some(provider) => Authorizer::Bearer(provider.token_source(&config)?),
                None => Authorizer::None,
            }
        };

        let endpoint = options
            .endpoint
            .clone()
            .or_else(|| (!config.endpoint.is_empty()).then(|| config.endpoint.clone()))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let user_agent = if !config.user_agent.is_empty() {
            config.user_agent.clone()
        } else {
            options.user_agent.clone().unwrap_or_else(|| "bigquery-driver".to_string())
        };
        let quota_project = (!config.quota_project.is_empty()).then(|| config.quota_project.clone());

        let client = Arc::new(BigqueryClient::new(
            authorizer,
            &endpoint,
            user_agent,
            config.app.clone(),
            quota_project,
            options.http.clone().unwrap_or_default(),
            options.debug,
        ));

        Ok(Connection {
            project_id: config.project_id.clone(),
            job_client: BigqueryJobClient::new(client.clone()),
            tabledata_client: BigqueryTabledataClient::new(client),
            config,
        })
    }
}

/// One open connection. Single-owner: not safe for concurrent use; open
/// several connections instead.
pub struct Connection {
    config: Config,
    project_id: String,
    job_client: BigqueryJobClient,
    tabledata_client: BigqueryTabledataClient,
}

impl Connection {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Prepares a statement. LOAD/STREAM statements become ingestion
    /// statements; everything else is forwarded verbatim as a query job.
    pub fn prepare(&self, sql: &str) -> Result<Statement, Error> {
        if is_ingestion(sql) {
            return Ok(Statement {
                inner: StatementInner::Ingestion(IngestionStatement {
                    service: IngestionService::new(
                        self.job_client.clone(),
                        self.tabledata_client.clone(),
                        self.project_id.clone(),
                        self.config.dataset_id.clone(),
                        self.config.location.clone(),
                    ),
                    sql: sql.to_string(),
                }),
            });
        }

        let job = self.job_configuration(sql)?;
        let num_input = check_query_parameters(sql);
        Ok(Statement {
            inner: StatementInner::Query(QueryStatement {
                job,
                job_client: self.job_client.clone(),
                project_id: self.project_id.clone(),
                location: self.config.location.clone(),
                num_input,
            }),
        })
    }

    /// Builds the query job configuration, applying the optional JSON hint
    /// and the `ExpandDSN` substitution.
    fn job_configuration(&self, sql: &str) -> Result<Job, Error> {
        let mut query = sql.to_string();
        let mut config = JobConfigurationQuery {
            use_legacy_sql: Some(false),
            ..Default::default()
        };

        if let Some(hint_body) = hint::extract(sql) {
            let parsed: QueryHint = serde_json::from_str(&hint_body).map_err(|source| Error::InvalidHint {
                hint: hint_body.clone(),
                source,
            })?;
            if parsed.expand_dsn {
                query = hint::expand_dsn(&query, &self.project_id, &self.config.dataset_id, &self.config.location);
            }
            config = parsed.config;
            if config.use_legacy_sql.is_none() {
                config.use_legacy_sql = Some(false);
            }
        }

        config.query = query;
        if !self.config.dataset_id.is_empty() {
            config.default_dataset = Some(DatasetReference {
                project_id: self.project_id.clone(),
                dataset_id: self.config.dataset_id.clone(),
            });
        }

        Ok(Job {
            configuration: JobConfiguration {
                job: JobType::Query(config),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Transactions are accepted but have no effect; the warehouse has no
    /// interactive transactions at this surface.
    pub fn begin(&self) -> Result<Transaction, Error> {
        Ok(Transaction {})
    }

    pub async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }
}

fn is_ingestion(sql: &str) -> bool {
    let normalized = sql.trim_start().to_uppercase();
    normalized.starts_with(Kind::Load.as_str()) || normalized.starts_with(Kind::Stream.as_str())
}

/// Rough positional/named parameter estimate: `?` and `@` outside
/// single-quoted literals, `\'` escapes honored. Advisory only.
fn check_query_parameters(query: &str) -> usize {
    let bytes = query.as_bytes();
    let mut count = 0;
    let mut in_quote = false;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'\'' => {
                if i > 0 && in_quote && bytes[i - 1] == b'\\' {
                    continue;
                }
                in_quote = !in_quote;
            }
            b'?' | b'@' if !in_quote => count += 1,
            _ => {}
        }
    }
    count
}

pub struct Statement {
    inner: StatementInner,
}

enum StatementInner {
    Query(QueryStatement),
    Ingestion(IngestionStatement),
}

impl Statement {
    /// Advisory bound-parameter count; any number of values is accepted.
    pub fn num_input(&self) -> usize {
        match &self.inner {
            StatementInner::Query(statement) => statement.num_input,
            StatementInner::Ingestion(_) => 0,
        }
    }

    /// Runs the statement and iterates its result rows.
    pub async fn query(&self, params: &[Param]) -> Result<Rows, Error> {
        match &self.inner {
            StatementInner::Query(statement) => statement.query(params, None).await,
            StatementInner::Ingestion(_) => Err(Error::Parse(
                "ingestion statements do not return rows; use execute".to_string(),
            )),
        }
    }

    /// Schema-first variant of [`Statement::query`]: the caller supplies one
    /// destination type per column and it is matched against the advertised
    /// schema (record fields by exact name, then case-insensitive with
    /// underscores stripped) before the first row is decoded.
    pub async fn query_with_dest_types(&self, params: &[Param], dest_types: Vec<DestType>) -> Result<Rows, Error> {
        match &self.inner {
            StatementInner::Query(statement) => statement.query(params, Some(dest_types)).await,
            StatementInner::Ingestion(_) => Err(Error::Parse(
                "ingestion statements do not return rows; use execute".to_string(),
            )),
        }
    }

    /// Runs the statement and reports the affected row count.
    pub async fn execute(&self, params: &[Param]) -> Result<ExecuteResult, Error> {
        match &self.inner {
            StatementInner::Query(statement) => statement.execute(params).await,
            StatementInner::Ingestion(statement) => {
                let affected = statement.service.ingest(&statement.sql).await?;
                Ok(ExecuteResult { rows_affected: affected })
            }
        }
    }
}

struct IngestionStatement {
    service: IngestionService,
    sql: String,
}

struct QueryStatement {
    job: Job,
    job_client: BigqueryJobClient,
    project_id: String,
    location: String,
    num_input: usize,
}

impl QueryStatement {
    fn job_with_params(&self, params: &[Param]) -> Result<Job, Error> {
        let mut job = self.job.clone();
        job.job_reference = JobReference {
            project_id: self.project_id.clone(),
            location: Some(self.location.clone()),
            ..Default::default()
        };
        if let JobType::Query(config) = &mut job.configuration.job {
            if !params.is_empty() {
                let mut encoded = Vec::with_capacity(params.len());
                for param in params {
                    encoded.push(param.to_query_parameter()?);
                }
                config.query_parameters = Some(encoded);
            }
        }
        Ok(job)
    }

    async fn submit_job(&self, job: &Job) -> Result<Job, Error> {
        let submitted = run_with_retries(|| self.job_client.create(job), SUBMIT_ATTEMPTS).await?;
        Ok(submitted)
    }

    async fn query(&self, params: &[Param], dest_types: Option<Vec<DestType>>) -> Result<Rows, Error> {
        let job = self.job_with_params(params)?;
        let submitted = self.submit_job(&job).await?;
        if submitted.status.state != JobState::Done {
            wait_for_job_completion(
                &self.job_client,
                &self.project_id,
                Some(self.location.as_str()),
                &submitted.job_reference.job_id,
            )
            .await?;
        }
        Rows::new(
            self.job_client.clone(),
            self.project_id.clone(),
            self.location.clone(),
            submitted.job_reference.job_id,
            dest_types,
        )
        .await
    }

    async fn execute(&self, params: &[Param]) -> Result<ExecuteResult, Error> {
        let job = self.job_with_params(params)?;
        let submitted = self.submit_job(&job).await?;
        let completed = wait_for_job_completion(
            &self.job_client,
            &self.project_id,
            Some(self.location.as_str()),
            &submitted.job_reference.job_id,
        )
        .await?;
        let rows_affected = completed
            .statistics
            .and_then(|statistics| statistics.query)
            .and_then(|query| query.num_dml_affected_rows)
            .unwrap_or(0);
        Ok(ExecuteResult { rows_affected })
    }
}

/// Result of a non-query execution.
#[derive(Debug)]
pub struct ExecuteResult {
    rows_affected: i64,
}

impl ExecuteResult {
    /// DML-affected rows for queries; accepted rows for ingestion.
    pub fn rows_affected(&self) -> i64 {
        self.rows_affected
    }

    pub fn last_insert_id(&self) -> Result<i64, Error> {
        Err(Error::LastInsertIdUnsupported)
    }
}

/// No-op transaction handle.
pub struct Transaction {}

impl Transaction {
    pub fn commit(self) -> Result<(), Error> {
        Ok(())
    }

    pub fn rollback(self) -> Result<(), Error> {
        Ok(())
    }
}

/// Streaming result iterator. The first `getQueryResults` response carries
/// the schema (driving destination types and decoder compilation), the
/// total row count, the first page and possibly a page token; further pages
/// are fetched on demand, strictly in order.
pub struct Rows {
    session: Session,
    job_client: BigqueryJobClient,
    project_id: String,
    location: String,
    job_id: String,
    page_token: Option<String>,
    poisoned: Option<(String, String)>,
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("job_id", &self.job_id)
            .field("page_token", &self.page_token)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl Rows {
    pub(crate) async fn new(
        job_client: BigqueryJobClient,
        project_id: String,
        location: String,
        job_id: String,
        dest_types: Option<Vec<DestType>>,
    ) -> Result<Self, Error> {
        let request = GetQueryResultsRequest {
            location: Some(location.clone()),
            ..Default::default()
        };
        let response = job_client.get_query_results(&project_id, &job_id, &request).await?;
        let schema = response
            .schema
            .ok_or_else(|| Error::decode("", "query response carries no schema"))?;
        let mut session = match dest_types {
            Some(dest_types) => Session::with_dest_types(schema, dest_types)?,
            None => Session::new(schema)?,
        };
        session.total_rows = response.total_rows.unwrap_or_default();
        session.chunk = VecDeque::from(response.rows.unwrap_or_default());
        Ok(Self {
            session,
            job_client,
            project_id,
            location,
            job_id,
            page_token: response.page_token,
            poisoned: None,
        })
    }

    /// Column names, in schema order.
    pub fn columns(&self) -> &[String] {
        &self.session.columns
    }

    /// Destination type the column decodes into.
    pub fn column_type_scan_type(&self, index: usize) -> Option<&DestType> {
        self.session.dest_types.get(index)
    }

    /// The warehouse type string, as advertised.
    pub fn column_type_database_type_name(&self, index: usize) -> Option<&str> {
        self.session.column_type_database_type_name(index)
    }

    /// Whether the column mode is NULLABLE.
    pub fn column_type_nullable(&self, index: usize) -> Option<bool> {
        self.session.column_type_nullable(index)
    }

    /// Total rows in the result set, from the first response.
    pub fn total_rows(&self) -> u64 {
        self.session.total_rows
    }

    /// Yields the next row, fetching the next page when the buffered page is
    /// exhausted. Returns `None` exactly when every row has been yielded.
    /// A decode failure poisons the iterator: every further call returns the
    /// same error.
    pub async fn next(&mut self) -> Result<Option<Row>, Error> {
        if let Some((column, message)) = &self.poisoned {
            return Err(Error::decode(column.clone(), message.clone()));
        }
        if !self.session.has_next() {
            return Ok(None);
        }
        if self.session.chunk.is_empty() {
            self.fetch_page().await?;
            if self.session.chunk.is_empty() {
                return Ok(None);
            }
        }
        match self.session.decode_next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(err)) => {
                if let Error::Decode { column, message } = &err {
                    self.poisoned = Some((column.clone(), message.clone()));
                }
                Err(err)
            }
            None => Ok(None),
        }
    }

    async fn fetch_page(&mut self) -> Result<(), Error> {
        let request = GetQueryResultsRequest {
            location: Some(self.location.clone()),
            page_token: self.page_token.clone(),
            ..Default::default()
        };
        let response = self
            .job_client
            .get_query_results(&self.project_id, &self.job_id, &request)
            .await?;
        self.session.chunk = VecDeque::from(response.rows.unwrap_or_default());
        self.page_token = response.page_token;
        Ok(())
    }

    pub fn close(self) {}
}
