use std::error::Error;
use std::fmt::Debug;

/// Source of `Authorization` header values. Credential discovery, OAuth2
/// flows and token caching live behind this seam; the driver only asks for
/// the current header value.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + Debug {
    /// Returns a valid `Authorization` header value, e.g. `Bearer ya29...`.
    async fn token(&self) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// A fixed token, useful for emulators and tests.
#[derive(Debug)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(format!("Bearer {}", self.token))
    }
}
