//! CLI commands and output formatting for the marketplace.

use clap::Subcommand;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MarketplaceConfig;

use super::catalog::{ApiKey, HttpCatalog};
use super::error::Result;
use super::fetcher::ArchiveFetcher;
use super::installer::{InstallRequest, InstallResult, Installer, UninstallResult};

/// How long to wait for background work after a command finishes.
const BACKGROUND_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Marketplace subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum MarketplaceCommand {
    /// Download, verify and install an item
    Install {
        /// Slug of the item
        slug: String,

        /// Version to install (default: latest)
        #[arg(long, value_name = "VERSION")]
        version: Option<String>,

        /// Marketplace API key
        #[arg(long, env = "DOJO_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a locally installed item
    Uninstall {
        /// Slug of the item
        slug: String,

        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute a marketplace command.
///
/// Returns `Ok(false)` when the command ran but did not succeed (a failed
/// integrity check), so the caller can exit non-zero.
pub async fn execute(command: MarketplaceCommand, config: &MarketplaceConfig) -> Result<bool> {
    let catalog = HttpCatalog::new(&config.api_base_url, config.request_timeout())?;
    let fetcher = ArchiveFetcher::new(config.download_timeout())?;
    let installer = Installer::new(Arc::new(catalog), fetcher, config.install_paths()?);

    let outcome = match command {
        MarketplaceCommand::Install {
            slug,
            version,
            api_key,
            json,
        } => handle_install(&installer, slug, version, ApiKey::new(api_key), json).await,
        MarketplaceCommand::Uninstall { slug, yes, json } => {
            handle_uninstall(&installer, slug, yes, json)
        }
    };

    // Output is already printed; give the usage notification a moment to land.
    installer.wait_for_background(BACKGROUND_DRAIN_TIMEOUT).await;
    outcome
}

async fn handle_install(
    installer: &Installer,
    slug: String,
    version: Option<String>,
    credential: ApiKey,
    json: bool,
) -> Result<bool> {
    let spinner = (!json && is_tty()).then(|| start_spinner(format!("Installing {slug}")));

    let outcome = installer
        .install(InstallRequest {
            slug,
            version,
            credential,
        })
        .await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let result = outcome?;

    if json {
        println!("{}", format_json(&result)?);
    } else {
        println!("{}", render_install_summary(&result));
    }

    Ok(result.is_success())
}

fn handle_uninstall(installer: &Installer, slug: String, yes: bool, json: bool) -> Result<bool> {
    if !yes && is_tty() {
        let prompt = format!("Remove {slug}?");
        if !confirm(&prompt)? {
            eprintln!("Removal cancelled");
            return Ok(true);
        }
    }

    let result = installer.uninstall(&slug)?;

    if json {
        println!("{}", format_json(&result)?);
    } else {
        println!("{}", render_uninstall_summary(&result));
    }

    Ok(result.success)
}

/// Human-readable summary of an install.
fn render_install_summary(result: &InstallResult) -> String {
    let mut lines = Vec::new();
    match result {
        InstallResult::Installed(item) => {
            lines.push(format!(
                "Installed {} v{} ({}) to {}",
                item.item_name,
                item.version_installed,
                item.category,
                item.install_dir.display()
            ));
            lines.push(format!("Files written: {}", item.files_written));
            lines.push(format!("SHA-256: {}", item.file_hash));
            if let Some(snippet) = &item.config_snippet {
                lines.push(String::new());
                lines.push("Configuration:".to_string());
                let rendered =
                    serde_json::to_string_pretty(snippet).unwrap_or_else(|_| snippet.to_string());
                lines.extend(rendered.lines().map(|l| format!("  {l}")));
            }
            if let Some(instructions) = &item.instructions {
                lines.push(String::new());
                lines.push("Instructions:".to_string());
                lines.extend(instructions.lines().map(|l| format!("  {l}")));
            }
            if let Some(notes) = &item.post_install_notes {
                lines.push(String::new());
                lines.push("Notes:".to_string());
                lines.extend(notes.lines().map(|l| format!("  {l}")));
            }
        }
        InstallResult::IntegrityFailure(failure) => {
            lines.push(format!(
                "{}: {} v{} was not installed",
                result.error().unwrap_or_default(),
                failure.item_name,
                failure.version
            ));
            lines.push(format!("  expected: {}", failure.expected_hash));
            lines.push(format!("  actual:   {}", failure.file_hash));
        }
    }
    lines.join("\n")
}

fn render_uninstall_summary(result: &UninstallResult) -> String {
    let mut lines = Vec::new();
    if result.removed.is_empty() {
        lines.push(format!("{} is not installed", result.item_name));
    } else {
        for path in &result.removed {
            lines.push(format!("Removed {}", path.display()));
        }
    }
    lines.push(result.removal_instructions.clone());
    lines.join("\n")
}

fn start_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Check if stdout is a TTY.
fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Prompt user for confirmation.
fn confirm(prompt: &str) -> Result<bool> {
    let result = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(result)
}

/// Format data as JSON.
fn format_json<T: serde::Serialize>(data: &T) -> Result<String> {
    let json = serde_json::to_string_pretty(data)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::catalog::ItemCategory;
    use crate::marketplace::installer::{INTEGRITY_FAILURE_MESSAGE, InstalledItem, IntegrityFailure};
    use std::path::PathBuf;

    fn installed() -> InstallResult {
        InstallResult::Installed(InstalledItem {
            item_name: "Test Skill".to_string(),
            category: ItemCategory::Skill,
            version_installed: "1.2.0".to_string(),
            config_snippet: Some(serde_json::json!({"mcpServers": {"test": {}}})),
            instructions: Some("Restart your editor.".to_string()),
            post_install_notes: None,
            file_hash: "abc123".to_string(),
            install_dir: PathBuf::from("/home/user/.claude/skills/test-skill"),
            files_written: 3,
        })
    }

    #[test]
    fn test_format_json() {
        #[derive(serde::Serialize)]
        struct TestData {
            name: String,
            value: i32,
        }

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        if let Ok(json) = format_json(&data) {
            assert!(json.contains("\"name\""));
            assert!(json.contains("\"test\""));
            assert!(json.contains("42"));
        } else {
            panic!("Should serialize to JSON");
        }
    }

    #[test]
    fn test_install_summary_lists_guidance() {
        let summary = render_install_summary(&installed());
        assert!(summary.starts_with("Installed Test Skill v1.2.0 (skill)"));
        assert!(summary.contains("Files written: 3"));
        assert!(summary.contains("\"mcpServers\""));
        assert!(summary.contains("  Restart your editor."));
        assert!(!summary.contains("Notes:"));
    }

    #[test]
    fn test_install_summary_integrity_failure() {
        let result = InstallResult::IntegrityFailure(IntegrityFailure {
            item_name: "Test Skill".to_string(),
            version: "1.2.0".to_string(),
            expected_hash: "expected".to_string(),
            file_hash: "actual".to_string(),
        });
        let summary = render_install_summary(&result);
        assert!(summary.starts_with(INTEGRITY_FAILURE_MESSAGE));
        assert!(summary.contains("expected: expected"));
        assert!(summary.contains("actual:   actual"));
    }

    #[test]
    fn test_uninstall_summary_nothing_removed() {
        let result = UninstallResult {
            success: true,
            item_name: "test-skill".to_string(),
            removal_instructions: "No removal steps required.".to_string(),
            removed: Vec::new(),
        };
        assert_eq!(
            render_uninstall_summary(&result),
            "test-skill is not installed\nNo removal steps required."
        );
    }
}
