use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error returned by the BigQuery service as a JSON error envelope.
    #[error(transparent)]
    Response(#[from] ErrorResponse),

    /// An error from the HTTP client.
    #[error(transparent)]
    HttpClient(#[from] reqwest::Error),

    /// A response body that does not deserialize into the expected shape.
    #[error("invalid response body: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// An error from a token source.
    #[error("token source failed: {0}")]
    TokenSource(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// HTTP status carried by the error, when one is known.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Response(response) => Some(response.code),
            Error::HttpClient(err) => err.status().map(|s| s.as_u16()),
            Error::Deserialize(_) | Error::TokenSource(_) => None,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// An HTTP status value, without the textual description.
    pub code: u16,

    /// Description of the error. Same as `errors.message`.
    pub message: String,

    /// Individual errors that make up the failure.
    #[serde(default)]
    pub errors: Option<Vec<ErrorItem>>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorItem {
    pub reason: Option<String>,
    pub location: Option<String>,
    pub message: Option<String>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl std::error::Error for ErrorResponse {}

#[derive(serde::Deserialize)]
pub(crate) struct ErrorWrapper {
    pub(crate) error: ErrorResponse,
}
