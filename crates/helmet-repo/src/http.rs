//! HTTP access to chart repositories
//!
//! `IndexCache` memoizes repository indexes for the duration of one
//! synchronization run: charts sharing a repository share one in-flight fetch
//! and its outcome, failures included.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::error::{RepoError, Result};
use crate::index::ChartRepoIndex;

/// Timeout applied to every request
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Thin wrapper over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("helmet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }

    /// Fetch a URL, failing on non-success status codes
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(url, "GET");

        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        Ok(bytes.to_vec())
    }
}

type IndexOutcome = std::result::Result<Arc<ChartRepoIndex>, Arc<RepoError>>;
type IndexCell = Arc<OnceCell<IndexOutcome>>;

/// Single-flight, per-URL cache of parsed repository indexes
///
/// A failed fetch is remembered too: every chart of a failing repository
/// reports the same error without another request.
#[derive(Debug)]
pub struct IndexCache {
    client: HttpClient,
    slots: Mutex<HashMap<String, IndexCell>>,
}

impl IndexCache {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get the index at `url`, fetching it at most once
    pub async fn get(&self, url: &str) -> Result<Arc<ChartRepoIndex>> {
        let cell = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(url.to_string()).or_default().clone()
        };

        let outcome = cell
            .get_or_init(|| async {
                tracing::info!(url, "fetching repository index");
                self.fetch(url).await.map_err(Arc::new)
            })
            .await;

        outcome
            .as_ref()
            .map(Arc::clone)
            .map_err(|source| RepoError::IndexUnavailable {
                url: url.to_string(),
                source: Arc::clone(source),
            })
    }

    async fn fetch(&self, url: &str) -> Result<Arc<ChartRepoIndex>> {
        let bytes = self.client.get_bytes(url).await?;
        ChartRepoIndex::from_bytes(&bytes).map(Arc::new)
    }

    /// The underlying HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}
