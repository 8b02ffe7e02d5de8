//! MongoDB Atlas Data API client.
//!
//! Talks to the Data API's `action` endpoints over HTTPS: `find` with an
//! empty filter for whole-collection snapshots, `findOne` as a cheap
//! connectivity probe. One client is built per run and dropped with it.

use super::Auth;
use crate::etl::DocumentSource;
use crate::schema::Kind;
use base64::Engine;
use eyre::{bail, Context, Result};
use reqwest::header::{self, HeaderMap};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where and how to reach the Data API.
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// Base endpoint URL, e.g.
    /// `https://data.mongodb-api.com/app/data-abcde/endpoint/data/v1`.
    pub url: Url,
    /// Cluster name as configured in Atlas, e.g. `Cluster0`.
    pub data_source: String,
    /// Database holding the five telemetry collections.
    pub database: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl AtlasConfig {
    pub fn new(url: Url, data_source: String, database: String) -> Self {
        Self {
            url,
            data_source,
            database,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// HTTP client for the document store.
#[derive(Clone, Debug)]
pub struct AtlasClient {
    client: Client,
    url: Url,
    data_source: String,
    database: String,
}

impl AtlasClient {
    /// Build the HTTP client with the credential headers baked in.
    ///
    /// # Errors
    /// Returns an error if a header value or the HTTP client cannot be
    /// built.
    pub fn try_new(config: AtlasConfig, auth: &Auth) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "application/json".parse()?);
        match auth {
            Auth::Apikey(apikey) => {
                headers.insert("api-key", apikey.parse()?);
            }
            Auth::Basic(username, password) => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                headers.insert(
                    header::AUTHORIZATION,
                    format!("Basic {}", credentials).parse()?,
                );
            }
            Auth::None => {}
        };

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url,
            data_source: config.data_source,
            database: config.database,
        })
    }

    /// Fetch every document of one collection (a `find` with no filter).
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success status, or a
    /// response without a `documents` array.
    pub async fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        let body = json!({
            "dataSource": self.data_source,
            "database": self.database,
            "collection": collection,
            "filter": {},
        });
        let mut response = self
            .action("find", &body)
            .await
            .with_context(|| format!("Failed to fetch collection '{}'", collection))?;

        match response.get_mut("documents").map(Value::take) {
            Some(Value::Array(documents)) => {
                log::debug!(
                    "Collection '{}' returned {} document(s)",
                    collection,
                    documents.len()
                );
                Ok(documents)
            }
            _ => bail!(
                "Response for collection '{}' is missing the documents array",
                collection
            ),
        }
    }

    /// Cheap connectivity probe: a `findOne` against the single-document
    /// session pointer collection.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached or refuses the
    /// credentials.
    pub async fn test_connection(&self) -> Result<()> {
        let body = json!({
            "dataSource": self.data_source,
            "database": self.database,
            "collection": Kind::LatestSession.collection(),
            "filter": {},
        });
        self.action("findOne", &body)
            .await
            .context("Document store connection check failed")?;
        Ok(())
    }

    /// POST one Data API action and return the parsed response body.
    async fn action(&self, action: &str, body: &Value) -> Result<Value> {
        let url = action_url(&self.url, action)?;
        log::debug!("POST {}", url);

        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Action '{}' returned {}: {}", action, status, body);
        }
        Ok(response.json().await?)
    }
}

impl DocumentSource for AtlasClient {
    async fn ping(&self) -> Result<()> {
        self.test_connection().await
    }

    async fn fetch_collection(&self, collection: &str) -> Result<Vec<Value>> {
        self.find_all(collection).await
    }
}

impl std::fmt::Display for AtlasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (database: {})", self.url, self.database)
    }
}

/// Resolve `action/<action>` against the base endpoint. `Url::join` treats
/// the last path segment as a file unless the base ends with a slash, so
/// normalize first.
fn action_url(base: &Url, action: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    Ok(base.join(&format!("action/{}", action))?)
}
