//! Marketplace client for installing skills, plugins and tools.
//!
//! The marketplace allows users to:
//! - Resolve an item by slug and pick a version
//! - Download its archive and verify the SHA-256 before touching disk
//! - Extract it under `~/.claude/<category>/<slug>`
//! - Remove a local install
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Marketplace CLI                    │
//! │        ┌──────────┐            ┌───────────┐        │
//! │        │ Install  │            │ Uninstall │        │
//! │        └──────────┘            └───────────┘        │
//! └─────────────────────────────────────────────────────┘
//!              │                        │
//!              ▼                        │
//!    ┌──────────────────────────┐       │
//!    │   Catalog (REST API)     │       │
//!    │  slug → item → version   │       │
//!    └──────────────────────────┘       │
//!              │                        │
//!              ▼                        │
//!    ┌──────────────────────────┐       │
//!    │  Fetcher → SHA-256 gate  │       │
//!    └──────────────────────────┘       │
//!              │                        │
//!              ▼                        ▼
//!    ┌──────────────────────────────────────────┐
//!    │     ~/.claude/{skills,plugins,tools}     │
//!    │      zip / tar.gz, traversal-checked     │
//!    └──────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! # Install the latest version
//! DOJO_API_KEY=... dojo-marketplace install code-reviewer
//!
//! # Install a specific version, report as JSON
//! dojo-marketplace install code-reviewer --version 1.2.0 --json
//!
//! # Remove a local install
//! dojo-marketplace uninstall code-reviewer --yes
//! ```

pub mod archive;
pub mod catalog;
pub mod cli;
pub mod error;
pub mod fetcher;
pub mod hash;
pub mod installer;
pub mod paths;

pub use archive::{ArchiveFormat, ArchiveInstaller, DEFAULT_MAX_ENTRY_BYTES};
pub use catalog::{ApiKey, CatalogService, HttpCatalog, ItemCategory, ResolvedItem, VersionRecord};
pub use cli::{MarketplaceCommand, execute};
pub use error::{MarketplaceError, Result};
pub use fetcher::ArchiveFetcher;
pub use installer::{
    INTEGRITY_FAILURE_MESSAGE, InstallReport, InstallRequest, InstallResult, InstalledItem,
    Installer, IntegrityFailure, UninstallResult,
};
pub use paths::{InstallPaths, category_dir_name};
