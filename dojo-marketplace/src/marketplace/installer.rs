//! End-to-end install: resolve, download, verify, extract.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::archive::ArchiveInstaller;
use super::catalog::{ApiKey, CatalogService, ItemCategory};
use super::error::Result;
use super::fetcher::ArchiveFetcher;
use super::hash;
use super::paths::InstallPaths;

/// Error text reported when a download does not match its declared hash.
pub const INTEGRITY_FAILURE_MESSAGE: &str = "Integrity check failed — file hash mismatch";

/// Installer for marketplace items.
#[derive(Clone)]
pub struct Installer {
    catalog: Arc<dyn CatalogService>,
    fetcher: ArchiveFetcher,
    archive: ArchiveInstaller,
    paths: InstallPaths,
    /// Usage notifications still in flight.
    background: Arc<Mutex<JoinSet<()>>>,
}

/// Installation request.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub slug: String,
    /// Version to install (default: the catalog's latest at resolution time).
    pub version: Option<String>,
    pub credential: ApiKey,
}

/// An item that was verified and extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledItem {
    pub item_name: String,
    pub category: ItemCategory,
    pub version_installed: String,
    pub config_snippet: Option<serde_json::Value>,
    pub instructions: Option<String>,
    pub post_install_notes: Option<String>,
    /// Digest computed over the downloaded archive.
    pub file_hash: String,
    pub install_dir: PathBuf,
    pub files_written: usize,
}

/// A download whose digest did not match the version record.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityFailure {
    pub item_name: String,
    pub version: String,
    pub expected_hash: String,
    /// Digest computed over the downloaded archive.
    pub file_hash: String,
}

/// Outcome of an install that could be attempted.
///
/// Errors before the integrity gate (lookup, download) and after it
/// (path check, extraction) are returned as `Err`; a failed gate is a
/// normal result the caller branches on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "InstallReport")]
pub enum InstallResult {
    Installed(InstalledItem),
    IntegrityFailure(IntegrityFailure),
}

impl InstallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Installed(_))
    }

    pub fn item_name(&self) -> &str {
        match self {
            Self::Installed(item) => &item.item_name,
            Self::IntegrityFailure(failure) => &failure.item_name,
        }
    }

    /// The digest computed over the download, populated in both variants.
    pub fn file_hash(&self) -> &str {
        match self {
            Self::Installed(item) => &item.file_hash,
            Self::IntegrityFailure(failure) => &failure.file_hash,
        }
    }

    pub fn error(&self) -> Option<&'static str> {
        match self {
            Self::Installed(_) => None,
            Self::IntegrityFailure(_) => Some(INTEGRITY_FAILURE_MESSAGE),
        }
    }
}

/// Flat serialized form of [`InstallResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallReport {
    pub success: bool,
    pub item_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_installed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_snippet: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_install_notes: Option<String>,
    pub file_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<InstallResult> for InstallReport {
    fn from(result: InstallResult) -> Self {
        match result {
            InstallResult::Installed(item) => Self {
                success: true,
                item_name: item.item_name,
                version_installed: Some(item.version_installed),
                config_snippet: item.config_snippet,
                instructions: item.instructions,
                post_install_notes: item.post_install_notes,
                file_hash: item.file_hash,
                error: None,
            },
            InstallResult::IntegrityFailure(failure) => Self {
                success: false,
                item_name: failure.item_name,
                version_installed: Some(failure.version),
                config_snippet: None,
                instructions: None,
                post_install_notes: None,
                file_hash: failure.file_hash,
                error: Some(INTEGRITY_FAILURE_MESSAGE.to_string()),
            },
        }
    }
}

/// Result of removing a locally installed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UninstallResult {
    pub success: bool,
    pub item_name: String,
    pub removal_instructions: String,
    #[serde(skip)]
    pub removed: Vec<PathBuf>,
}

impl Installer {
    /// Create a new installer.
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        fetcher: ArchiveFetcher,
        paths: InstallPaths,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            archive: ArchiveInstaller::default(),
            paths,
            background: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Replace the archive extractor (e.g. to change the entry size cap).
    pub fn with_archive_installer(mut self, archive: ArchiveInstaller) -> Self {
        self.archive = archive;
        self
    }

    pub fn paths(&self) -> &InstallPaths {
        &self.paths
    }

    /// Install an item.
    ///
    /// # Process
    ///
    /// 1. Resolve the slug to an item
    /// 2. Fetch the requested (or latest) version record
    /// 3. Download the archive
    /// 4. Verify its SHA-256 against the record; stop with
    ///    [`InstallResult::IntegrityFailure`] on mismatch
    /// 5. Resolve the install directory from category and slug
    /// 6. Extract the archive there, overwriting existing files
    /// 7. Bump the usage count in the background
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The slug or version cannot be resolved
    /// - The download fails
    /// - The slug escapes the category directory
    /// - Extraction fails
    ///
    /// Concurrent installs of the same slug are not serialized; the last
    /// writer wins for each file.
    pub async fn install(&self, request: InstallRequest) -> Result<InstallResult> {
        let InstallRequest {
            slug,
            version,
            credential,
        } = request;

        let item = self.catalog.resolve_slug(&slug, &credential).await?;
        let version = version.unwrap_or_else(|| item.latest_version.clone());
        debug!(slug, item_id = %item.id, version, "Resolved item");

        let record = self
            .catalog
            .get_version_record(&item.id, &version, &credential)
            .await?;

        let bytes = self.fetcher.fetch(&record.file_url).await?;

        let computed_hash = hash::digest(&bytes);
        if !hash::matches_digest(&computed_hash, &record.file_hash) {
            warn!(
                slug,
                version = record.version,
                expected = record.file_hash,
                actual = computed_hash,
                "Archive failed integrity check"
            );
            return Ok(InstallResult::IntegrityFailure(IntegrityFailure {
                item_name: item.name,
                version: record.version,
                expected_hash: record.file_hash,
                file_hash: computed_hash,
            }));
        }

        let install_dir = self.paths.resolve_install_dir(item.category, &item.slug)?;
        let files_written = self.archive.install(&bytes, &install_dir)?;

        self.notify_usage(item.id.clone(), credential);

        info!(
            slug = item.slug,
            version = record.version,
            path = %install_dir.display(),
            "Installed item"
        );

        Ok(InstallResult::Installed(InstalledItem {
            item_name: item.name,
            category: item.category,
            version_installed: record.version,
            config_snippet: record.config_snippet,
            instructions: record.instructions,
            post_install_notes: record.post_install_notes,
            file_hash: computed_hash,
            install_dir,
            files_written,
        }))
    }

    /// Remove a locally installed item from every category directory.
    ///
    /// Uninstalling something that is not present succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the slug escapes a category directory or a
    /// directory cannot be removed.
    pub fn uninstall(&self, slug: &str) -> Result<UninstallResult> {
        let mut removed = Vec::new();
        for category in ItemCategory::ALL {
            let dir = self.paths.resolve_install_dir(category, slug)?;
            if dir.is_dir() {
                std::fs::remove_dir_all(&dir)?;
                info!(slug, %category, path = %dir.display(), "Removed installed item");
                removed.push(dir);
            }
        }

        let removal_instructions = if removed.is_empty() {
            "No removal steps required.".to_string()
        } else {
            format!(
                "Removed {} director{}. Remove any configuration merged for '{slug}' from your settings.",
                removed.len(),
                if removed.len() == 1 { "y" } else { "ies" }
            )
        };

        Ok(UninstallResult {
            success: true,
            item_name: slug.to_string(),
            removal_instructions,
            removed,
        })
    }

    /// Wait up to `timeout` for pending usage notifications, aborting any
    /// that are still running afterwards.
    ///
    /// Call before the runtime shuts down. Returns the number of
    /// notifications that were abandoned.
    pub async fn wait_for_background(&self, timeout: Duration) -> usize {
        let mut tasks = std::mem::take(
            &mut *self
                .background
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if tasks.is_empty() {
            return 0;
        }

        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Usage notification task failed");
                }
            }
        })
        .await;

        if drained.is_ok() {
            return 0;
        }
        let pending = tasks.len();
        warn!(pending, "Abandoning usage notifications still in flight");
        tasks.abort_all();
        pending
    }

    /// Background usage increment; failures are only logged.
    fn notify_usage(&self, item_id: String, credential: ApiKey) {
        let catalog = Arc::clone(&self.catalog);
        let mut tasks = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            if let Err(e) = catalog.increment_usage_count(&item_id, &credential).await {
                warn!(item_id, error = %e, "Failed to increment usage count");
            }
        });
    }
}
