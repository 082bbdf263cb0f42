//! Archive download.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::error::{MarketplaceError, Result};

/// Downloads archives into memory.
///
/// Requests are unauthenticated: archive URLs come from the catalog and the
/// content is checked against the declared hash before anything is written.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: Client,
}

impl ArchiveFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("dojo-marketplace/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| MarketplaceError::Transport {
                operation: "build download client",
                url: String::new(),
                source: e,
            })?;
        Ok(Self { client })
    }

    /// Download `url` and return the full body.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError::Download`] for a non-success status and
    /// [`MarketplaceError::Transport`] when no complete response arrives.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "Downloading archive");
        let transport = |e| MarketplaceError::Transport {
            operation: "download archive",
            url: url.to_string(),
            source: e,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketplaceError::Download {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response.bytes().await.map_err(transport)?;
        debug!(url, size = bytes.len(), "Archive downloaded");
        Ok(bytes.to_vec())
    }
}
