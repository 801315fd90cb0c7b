use crate::http::error::Error as HttpError;

/// Driver-level error taxonomy. Configuration problems are fatal at
/// open/prepare; transport errors may have been retried before surfacing;
/// job failures are terminal server-side outcomes; decode errors poison the
/// Rows they occurred on.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid dsn: {0}")]
    InvalidDsn(String),

    #[error("invalid hint {hint}, {source}")]
    InvalidHint {
        hint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Http(#[from] HttpError),

    /// A job that reached DONE with an error result. The message keeps the
    /// server's top-level text; the details are the JSON-encoded sub-errors.
    #[error("{message}: {details}")]
    JobFailure { message: String, details: String },

    #[error("failed to decode column {column}: {message}")]
    Decode { column: String, message: String },

    /// Ingestion DSL syntax error, naming the expected token.
    #[error("{0}")]
    Parse(String),

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("unknown reader: {0}")]
    UnknownReader(String),

    #[error("streaming insert failed: {0}")]
    StreamingInsert(String),

    #[error("failed to load credentials: {0}")]
    Credential(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("lastInsertId is not supported")]
    LastInsertIdUnsupported,
}

impl Error {
    pub(crate) fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Decode {
            column: column.into(),
            message: message.into(),
        }
    }
}
