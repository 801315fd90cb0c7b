use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response};

use crate::http::error::{Error, ErrorWrapper};
use crate::token::TokenSource;

pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/bigquery",
    "https://www.googleapis.com/auth/bigquery.insertdata",
    "https://www.googleapis.com/auth/cloud-platform",
];

/// Credential attached to every outgoing request.
#[derive(Clone)]
pub enum Authorizer {
    /// Bearer token fetched from a token source per request.
    Bearer(Arc<dyn TokenSource>),
    /// API key appended as the `key` query parameter.
    ApiKey(String),
    /// Anonymous access, only useful against emulators.
    None,
}

#[derive(Clone)]
pub struct BigqueryClient {
    authorizer: Authorizer,
    endpoint: String,
    upload_endpoint: String,
    user_agent: String,
    app: String,
    quota_project: Option<String>,
    http: Client,
    debug: bool,
}

impl BigqueryClient {
    pub(crate) fn new(
        authorizer: Authorizer,
        endpoint: &str,
        user_agent: String,
        app: String,
        quota_project: Option<String>,
        http: Client,
        debug: bool,
    ) -> Self {
        let endpoint = endpoint.trim_end_matches('/');
        Self {
            authorizer,
            endpoint: format!("{endpoint}/bigquery/v2"),
            upload_endpoint: format!("{endpoint}/upload/bigquery/v2"),
            user_agent,
            app,
            quota_project,
            http,
            debug,
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub(crate) fn upload_endpoint(&self) -> &str {
        self.upload_endpoint.as_str()
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    async fn with_headers(&self, builder: RequestBuilder) -> Result<RequestBuilder, Error> {
        let mut builder = builder
            .header("X-Goog-Api-Client", self.app.as_str())
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str());
        if let Some(quota_project) = &self.quota_project {
            builder = builder.header("X-Goog-User-Project", quota_project.as_str());
        }
        match &self.authorizer {
            Authorizer::Bearer(ts) => {
                let token = ts.token().await.map_err(Error::TokenSource)?;
                Ok(builder.header(reqwest::header::AUTHORIZATION, token))
            }
            Authorizer::ApiKey(key) => Ok(builder.query(&[("key", key.as_str())])),
            Authorizer::None => Ok(builder),
        }
    }

    pub async fn send<T>(&self, builder: RequestBuilder) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let request = self.with_headers(builder).await?;
        let response = request.send().await?;
        let response = Self::check_response_status(response).await?;
        if self.debug {
            let text = response.text().await?;
            tracing::debug!("{}", text);
            Ok(serde_json::from_str(text.as_str())?)
        } else {
            Ok(response.json().await?)
        }
    }

    /// Checks whether an HTTP response is successful and returns it, or returns an error.
    async fn check_response_status(response: Response) -> Result<Response, Error> {
        let error = match response.error_for_status_ref() {
            Ok(_) => return Ok(response),
            Err(error) => error,
        };

        // try to extract a response error, falling back to the status error if it can not be parsed.
        Err(response
            .json::<ErrorWrapper>()
            .await
            .map(|wrapper| Error::Response(wrapper.error))
            .unwrap_or(Error::HttpClient(error)))
    }
}
