use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, RwLock};

use base64::prelude::*;
use url::Url;

use crate::error::Error;

const SCHEME: &str = "bigquery";
const OPT_CREDENTIALS_JSON: &str = "credJSON";
const OPT_CREDENTIALS_URL: &str = "credURL";
const OPT_CREDENTIALS_KEY: &str = "credKey";
const OPT_CRED_ID: &str = "credID";
const OPT_ENDPOINT: &str = "endpoint";
const OPT_USER_AGENT: &str = "ua";
const OPT_API_KEY: &str = "apiKey";
const OPT_QUOTA_PROJECT: &str = "quotaProject";
const OPT_SCOPES: &str = "scopes";
const OPT_APP: &str = "app";
const DEFAULT_APP: &str = "go-sql-bq";
const DEFAULT_LOCATION: &str = "us";

/// Connection configuration parsed from a DSN of the form
/// `bigquery://<projectID>/<location>/<datasetID>?opt=...`.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub project_id: String,
    pub dataset_id: String,
    pub location: String,
    pub endpoint: String,
    pub user_agent: String,
    pub api_key: String,
    pub credential_json: Vec<u8>,
    pub credentials_url: String,
    pub credentials_key: String,
    pub cred_id: String,
    pub quota_project: String,
    pub scopes: Vec<String>,
    pub app: String,
    /// All query options, as parsed.
    pub values: HashMap<String, Vec<String>>,
}

impl Config {
    /// True if any explicit credential source is configured. With none, and
    /// no ambient credential, the connector falls through to the discovery
    /// auth path.
    pub fn has_credentials(&self) -> bool {
        !self.cred_id.is_empty() || !self.credential_json.is_empty() || !self.credentials_url.is_empty()
    }
}

/// Parses a DSN string into a `Config`.
pub fn parse_dsn(dsn: &str) -> Result<Config, Error> {
    let url = Url::parse(dsn).map_err(|e| Error::InvalidDsn(e.to_string()))?;
    if url.scheme() != SCHEME {
        return Err(Error::InvalidDsn(format!(
            "invalid scheme, expected {SCHEME}, but had: {}",
            url.scheme()
        )));
    }

    let mut path = url.path().trim_matches('/').to_string();
    let mut location = String::new();
    if let Some(index) = path.find('/') {
        location = path[..index].to_string();
        path = path[index + 1..].to_string();
    }

    let mut values: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url.query_pairs() {
        values.entry(key.into_owned()).or_default().push(value.into_owned());
    }

    let first = |key: &str| -> String { values.get(key).and_then(|v| v.first()).cloned().unwrap_or_default() };

    let mut cfg = Config {
        project_id: url.host_str().unwrap_or_default().to_string(),
        dataset_id: path,
        location,
        endpoint: first(OPT_ENDPOINT),
        user_agent: first(OPT_USER_AGENT),
        api_key: first(OPT_API_KEY),
        credential_json: first(OPT_CREDENTIALS_JSON).into_bytes(),
        credentials_url: first(OPT_CREDENTIALS_URL),
        credentials_key: first(OPT_CREDENTIALS_KEY),
        cred_id: first(OPT_CRED_ID),
        quota_project: first(OPT_QUOTA_PROJECT),
        scopes: values.get(OPT_SCOPES).cloned().unwrap_or_default(),
        app: first(OPT_APP),
        values,
    };

    cfg.initialise_secrets()?;

    if cfg.app.is_empty() {
        cfg.app = DEFAULT_APP.to_string();
    }
    if cfg.location.is_empty() {
        cfg.location = DEFAULT_LOCATION.to_string();
    }
    Ok(cfg)
}

impl Config {
    /// Resolves inline and indirect credential material: base64-url encoded
    /// fields are unwrapped when they decode cleanly, and credURL/credID
    /// sources are loaded through the secret loader (cached per URL).
    fn initialise_secrets(&mut self) -> Result<(), Error> {
        if !self.credentials_url.is_empty() {
            if let Ok(decoded) = BASE64_URL_SAFE_NO_PAD.decode(&self.credentials_url) {
                self.credentials_url = String::from_utf8_lossy(&decoded).into_owned();
            }
        }
        if !self.credentials_key.is_empty() {
            if let Ok(decoded) = BASE64_URL_SAFE_NO_PAD.decode(&self.credentials_key) {
                self.credentials_key = String::from_utf8_lossy(&decoded).into_owned();
            }
        }
        if !self.credential_json.is_empty() {
            if let Ok(decoded) = BASE64_URL_SAFE_NO_PAD.decode(&self.credential_json) {
                self.credential_json = decoded;
            }
        }
        if !self.cred_id.is_empty() {
            let resource = lookup_secret_resource(&self.cred_id)
                .ok_or_else(|| Error::Credential(format!("failed to lookup secret id: {}", self.cred_id)))?;
            self.credential_json = credentials().lookup(&resource)?.into_bytes();
        }
        if !self.credentials_url.is_empty() {
            let resource = SecretResource {
                url: self.credentials_url.clone(),
                key: self.credentials_key.clone(),
            };
            self.credential_json = credentials().lookup(&resource)?.into_bytes();
        }
        Ok(())
    }
}

/// A credential bundle location: a URL plus an optional unwrap key.
#[derive(Clone, Debug, Default)]
pub struct SecretResource {
    pub url: String,
    pub key: String,
}

/// Loads secret material from a resource. The transport behind a resource
/// URL is deployment glue; the default loader only handles local files.
pub trait SecretLoader: Send + Sync {
    fn load(&self, resource: &SecretResource) -> Result<String, Error>;
}

struct FileSecretLoader;

impl SecretLoader for FileSecretLoader {
    fn load(&self, resource: &SecretResource) -> Result<String, Error> {
        let path = resource.url.strip_prefix("file://").unwrap_or(&resource.url);
        std::fs::read_to_string(path).map_err(|e| Error::Credential(format!("failed to load secret from {path}: {e}")))
    }
}

/// Read-mostly process-wide credential cache, keyed by resource URL.
struct CredentialRegistry {
    registry: RwLock<HashMap<String, String>>,
    loader: Box<dyn SecretLoader>,
}

impl CredentialRegistry {
    fn lookup(&self, resource: &SecretResource) -> Result<String, Error> {
        {
            let registry = self.registry.read().expect("credential cache lock poisoned");
            if let Some(found) = registry.get(&resource.url) {
                return Ok(found.clone());
            }
        }
        let secret = self.loader.load(resource)?;
        self.registry
            .write()
            .expect("credential cache lock poisoned")
            .insert(resource.url.clone(), secret.clone());
        Ok(secret)
    }
}

fn credentials() -> &'static CredentialRegistry {
    static CREDENTIALS: OnceLock<CredentialRegistry> = OnceLock::new();
    CREDENTIALS.get_or_init(|| CredentialRegistry {
        registry: RwLock::new(HashMap::new()),
        loader: Box::new(FileSecretLoader),
    })
}

/// Process-wide `credID` to resource mapping, registered by the caller
/// before `open`.
fn secret_resources() -> &'static Mutex<HashMap<String, SecretResource>> {
    static RESOURCES: OnceLock<Mutex<HashMap<String, SecretResource>>> = OnceLock::new();
    RESOURCES.get_or_init(|| Mutex::new(HashMap::new()))
}

pub fn register_secret_resource(id: impl Into<String>, resource: SecretResource) {
    secret_resources()
        .lock()
        .expect("secret resource lock poisoned")
        .insert(id.into(), resource);
}

fn lookup_secret_resource(id: &str) -> Option<SecretResource> {
    secret_resources()
        .lock()
        .expect("secret resource lock poisoned")
        .get(id)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::parse_dsn;

    #[test]
    fn test_full_dsn() {
        let cfg = parse_dsn("bigquery://my-project/us-east1/my_dataset?app=tester&ua=agent/1.0").unwrap();
        assert_eq!(cfg.project_id, "my-project");
        assert_eq!(cfg.location, "us-east1");
        assert_eq!(cfg.dataset_id, "my_dataset");
        assert_eq!(cfg.app, "tester");
        assert_eq!(cfg.user_agent, "agent/1.0");
    }

    #[test]
    fn test_defaults() {
        let cfg = parse_dsn("bigquery://my-project/my_dataset").unwrap();
        assert_eq!(cfg.location, "us");
        assert_eq!(cfg.dataset_id, "my_dataset");
        assert_eq!(cfg.app, "go-sql-bq");
        assert!(!cfg.has_credentials());
    }

    #[test]
    fn test_invalid_scheme() {
        let err = parse_dsn("postgres://host/db").unwrap_err();
        assert!(err.to_string().contains("invalid scheme"), "{err}");
    }

    #[test]
    fn test_not_a_url() {
        assert!(parse_dsn("not a dsn").is_err());
    }

    #[test]
    fn test_scopes_repeatable() {
        let cfg = parse_dsn("bigquery://p/d?scopes=a&scopes=b").unwrap();
        assert_eq!(cfg.scopes, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_cred_json_base64_unwrap() {
        // "{}" base64-url encoded
        let cfg = parse_dsn("bigquery://p/d?credJSON=e30").unwrap();
        assert_eq!(cfg.credential_json, b"{}");
        assert!(cfg.has_credentials());
    }

    #[test]
    fn test_cred_json_raw_passthrough() {
        let cfg = parse_dsn("bigquery://p/d?credJSON=%7B%22k%22:1%7D").unwrap();
        assert_eq!(cfg.credential_json, b"{\"k\":1}");
    }

    #[test]
    fn test_api_key() {
        let cfg = parse_dsn("bigquery://p/d?apiKey=secret").unwrap();
        assert_eq!(cfg.api_key, "secret");
    }
}
