//! Dojo Marketplace - install skills, plugins and tools into `~/.claude`
//!
//! Items are published to the marketplace catalog as versioned zip or
//! tar.gz archives with a declared SHA-256. Installing one resolves the
//! slug, downloads the chosen version, refuses it unless the digest
//! matches, then extracts it into the category directory.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      dojo-marketplace                            │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │   Config    │  │  Catalog    │  │       Installer         │  │
//! │  │ (TOML + env)│  │ (REST API)  │  │ (verify + extract)      │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                              │
//!                                              ▼
//!                           ┌────────┐  ┌─────────┐  ┌───────┐
//!                           │ skills │  │ plugins │  │ tools │
//!                           └────────┘  └─────────┘  └───────┘
//! ```

pub mod config;
pub mod marketplace;

pub use config::{ConfigError, MarketplaceConfig};
pub use marketplace::{InstallRequest, InstallResult, Installer, MarketplaceError};
