use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use words_core::model::SheetRemoteId;

use crate::error::RemoteError;

/// Where synchronized words come from.
#[async_trait]
pub trait RemoteWordSource: Send + Sync {
    /// Fetch the raw CSV export of a sheet. An empty body is a valid sheet
    /// with no rows.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on network failure or a non-success status.
    async fn fetch(&self, remote_id: &SheetRemoteId) -> Result<String, RemoteError>;
}

#[derive(Clone, Debug)]
pub struct RemoteSourceConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for RemoteSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://docs.google.com/spreadsheets/d".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RemoteSourceConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = env::var("WORDS_SHEETS_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(defaults.base_url);
        let timeout = env::var("WORDS_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map_or(defaults.timeout, Duration::from_secs);
        Self { base_url, timeout }
    }
}

/// Fetches sheets through the spreadsheet CSV export endpoint.
#[derive(Clone)]
pub struct SheetsExportClient {
    client: Client,
    config: RemoteSourceConfig,
}

impl SheetsExportClient {
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: RemoteSourceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, reqwest::Error> {
        Self::new(RemoteSourceConfig::from_env())
    }

    fn export_url(&self, remote_id: &SheetRemoteId) -> String {
        format!(
            "{}/{}/export?format=csv&gid={}",
            self.config.base_url.trim_end_matches('/'),
            remote_id.spreadsheet_id(),
            remote_id.sheet_index()
        )
    }
}

#[async_trait]
impl RemoteWordSource for SheetsExportClient {
    async fn fetch(&self, remote_id: &SheetRemoteId) -> Result<String, RemoteError> {
        let response = self.client.get(self.export_url(remote_id)).send().await?;

        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }

        Ok(response.text().await?)
    }
}
