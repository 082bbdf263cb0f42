//! Remote catalog lookups.
//!
//! The catalog is the source of truth for item metadata and version
//! records. Every call is a fresh authenticated request; nothing is cached.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{MarketplaceError, Result};

/// Kind of marketplace item. Determines the install subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Skill,
    Plugin,
    Tool,
}

impl ItemCategory {
    /// All categories, in install-root order.
    pub const ALL: [ItemCategory; 3] = [Self::Skill, Self::Plugin, Self::Tool];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Plugin => "plugin",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item metadata returned by a slug lookup.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResolvedItem {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub category: ItemCategory,
    pub latest_version: String,
}

/// Metadata for one published version of an item.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct VersionRecord {
    pub id: String,
    pub item_id: String,
    pub version: String,
    pub file_url: String,
    /// Hex SHA-256 declared by the publisher at upload time.
    pub file_hash: String,
    #[serde(default)]
    pub file_size_bytes: u64,
    /// Opaque configuration the caller merges into its own settings.
    #[serde(default)]
    pub config_snippet: Option<serde_json::Value>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub post_install_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Bearer credential forwarded verbatim to the catalog.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Remote catalog operations used by the installer.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Look up an item by slug.
    async fn resolve_slug(&self, slug: &str, credential: &ApiKey) -> Result<ResolvedItem>;

    /// Fetch the record for one version of an item.
    async fn get_version_record(
        &self,
        item_id: &str,
        version: &str,
        credential: &ApiKey,
    ) -> Result<VersionRecord>;

    /// Bump the item's install counter.
    async fn increment_usage_count(&self, item_id: &str, credential: &ApiKey) -> Result<()>;
}

/// [`CatalogService`] backed by the marketplace REST API.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: Client,
    base_url: Url,
}

impl HttpCatalog {
    /// Create a catalog client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed or the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| MarketplaceError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .user_agent(concat!("dojo-marketplace/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| MarketplaceError::Transport {
                operation: "build catalog client",
                url: base_url.to_string(),
                source: e,
            })?;
        Ok(Self { client, base_url })
    }

    /// Build `{base}/v1/marketplace/items/<segments...>` with each segment
    /// percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| MarketplaceError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "cannot be used as a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["v1", "marketplace", "items"])
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
        url: &Url,
        credential: &ApiKey,
    ) -> Result<Response> {
        request
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| MarketplaceError::Transport {
                operation,
                url: url.to_string(),
                source: e,
            })
    }
}

#[async_trait]
impl CatalogService for HttpCatalog {
    async fn resolve_slug(&self, slug: &str, credential: &ApiKey) -> Result<ResolvedItem> {
        let url = self.endpoint(&["by-slug", slug])?;
        debug!(slug, %url, "Resolving slug");

        let response = self
            .send(self.client.get(url.clone()), "resolve slug", &url, credential)
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarketplaceError::SlugResolution {
                slug: slug.to_string(),
                status,
            });
        }

        response
            .json::<ResolvedItem>()
            .await
            .map_err(|e| MarketplaceError::CatalogResponse {
                operation: "resolve slug",
                source: e,
            })
    }

    async fn get_version_record(
        &self,
        item_id: &str,
        version: &str,
        credential: &ApiKey,
    ) -> Result<VersionRecord> {
        let url = self.endpoint(&[item_id, "versions", version])?;
        debug!(item_id, version, %url, "Fetching version record");

        let response = self
            .send(
                self.client.get(url.clone()),
                "fetch version record",
                &url,
                credential,
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarketplaceError::VersionFetch {
                item_id: item_id.to_string(),
                version: version.to_string(),
                status,
            });
        }

        response
            .json::<VersionRecord>()
            .await
            .map_err(|e| MarketplaceError::CatalogResponse {
                operation: "fetch version record",
                source: e,
            })
    }

    async fn increment_usage_count(&self, item_id: &str, credential: &ApiKey) -> Result<()> {
        let url = self.endpoint(&[item_id, "usage"])?;
        let response = self
            .send(
                self.client.post(url.clone()),
                "increment usage count",
                &url,
                credential,
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarketplaceError::UsageCount {
                item_id: item_id.to_string(),
                status,
            });
        }
        Ok(())
    }
}
