//! Install directory layout and slug validation.
//!
//! Items land in `<root>/<category dir>/<slug>/`, where `root` defaults to
//! `~/.claude`:
//!
//! ```text
//! skill  -> ~/.claude/skills/<slug>/
//! plugin -> ~/.claude/plugins/<slug>/
//! tool   -> ~/.claude/tools/<slug>/
//! ```

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::catalog::ItemCategory;
use super::error::{MarketplaceError, Result};

/// Directory name under the root for each category.
pub fn category_dir_name(category: ItemCategory) -> &'static str {
    match category {
        ItemCategory::Skill => "skills",
        ItemCategory::Plugin => "plugins",
        ItemCategory::Tool => "tools",
    }
}

/// Resolves where catalog items are installed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    root: PathBuf,
}

impl InstallPaths {
    /// Create a resolver rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolver rooted at `~/.claude`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn from_home() -> Result<Self> {
        let base_dirs = directories::BaseDirs::new().ok_or(MarketplaceError::HomeDirectory)?;
        Ok(Self::new(base_dirs.home_dir().join(".claude")))
    }

    /// Get the install root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Base directory shared by every item of `category`.
    pub fn category_dir(&self, category: ItemCategory) -> PathBuf {
        normalize_lexically(&self.root.join(category_dir_name(category)))
    }

    /// Compute the install directory for `slug`.
    ///
    /// The slug comes from the catalog and is untrusted. The resulting path
    /// must be a strict descendant of the category directory, both lexically
    /// and after resolving symlinks in whatever part of it already exists.
    /// Nothing is created on disk.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError::InvalidSlug`] when the slug is empty,
    /// absolute, or traverses out of (or onto) the category directory.
    pub fn resolve_install_dir(&self, category: ItemCategory, slug: &str) -> Result<PathBuf> {
        let invalid = || MarketplaceError::InvalidSlug {
            slug: slug.to_string(),
        };

        if slug.trim().is_empty() {
            return Err(invalid());
        }

        let base = self.category_dir(category);
        let candidate = normalize_lexically(&base.join(slug));
        if !is_strict_descendant(&candidate, &base) {
            return Err(invalid());
        }

        // Any existing component below the base may be a symlink pointing
        // elsewhere; missing components are later created under it.
        if let Some(existing) = deepest_existing_ancestor(&candidate, &base) {
            let real_base = std::fs::canonicalize(&base).map_err(|_| invalid())?;
            let real_existing = std::fs::canonicalize(existing).map_err(|_| invalid())?;
            if !is_strict_descendant(&real_existing, &real_base) {
                return Err(invalid());
            }
        }

        debug!(%category, slug, path = %candidate.display(), "Resolved install directory");
        Ok(candidate)
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Deepest path between `base` (exclusive) and `path` (inclusive) that
/// exists on disk, without following a final symlink.
fn deepest_existing_ancestor<'a>(path: &'a Path, base: &Path) -> Option<&'a Path> {
    path.ancestors()
        .take_while(|ancestor| is_strict_descendant(ancestor, base))
        .find(|ancestor| std::fs::symlink_metadata(ancestor).is_ok())
}

fn is_strict_descendant(path: &Path, base: &Path) -> bool {
    path != base && path.starts_with(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_temp_paths() -> (TempDir, InstallPaths) {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => panic!("Failed to create temp dir: {e}"),
        };
        let paths = InstallPaths::new(temp_dir.path().join(".claude"));
        (temp_dir, paths)
    }

    #[test]
    fn test_category_dir_names() {
        assert_eq!(category_dir_name(ItemCategory::Skill), "skills");
        assert_eq!(category_dir_name(ItemCategory::Plugin), "plugins");
        assert_eq!(category_dir_name(ItemCategory::Tool), "tools");
    }

    #[test]
    fn test_resolve_maps_each_category() {
        let (_temp, paths) = create_temp_paths();

        for (category, slug) in [
            (ItemCategory::Skill, "my-skill"),
            (ItemCategory::Plugin, "my-plugin"),
            (ItemCategory::Tool, "my-tool"),
        ] {
            match paths.resolve_install_dir(category, slug) {
                Ok(dir) => assert_eq!(dir, paths.category_dir(category).join(slug)),
                Err(e) => panic!("Should resolve {slug}: {e}"),
            }
        }
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let (_temp, paths) = create_temp_paths();

        for slug in ["../../.ssh", "../../../etc", "..", "nested/../../escape"] {
            let result = paths.resolve_install_dir(ItemCategory::Skill, slug);
            assert!(
                matches!(result, Err(MarketplaceError::InvalidSlug { .. })),
                "slug {slug:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_rejects_sibling_category() {
        let (_temp, paths) = create_temp_paths();
        let result = paths.resolve_install_dir(ItemCategory::Plugin, "../skills/foo");
        assert!(matches!(result, Err(MarketplaceError::InvalidSlug { .. })));
    }

    #[test]
    fn test_resolve_rejects_base_directory_itself() {
        let (_temp, paths) = create_temp_paths();

        for slug in ["", ".", "./", "foo/.."] {
            let result = paths.resolve_install_dir(ItemCategory::Tool, slug);
            assert!(
                matches!(result, Err(MarketplaceError::InvalidSlug { .. })),
                "slug {slug:?} should be rejected"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_absolute_slug() {
        let (_temp, paths) = create_temp_paths();
        let result = paths.resolve_install_dir(ItemCategory::Skill, "/etc/passwd");
        assert!(matches!(result, Err(MarketplaceError::InvalidSlug { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let (temp, paths) = create_temp_paths();
        let base = paths.category_dir(ItemCategory::Skill);
        let outside = temp.path().join("outside");
        if let Err(e) = std::fs::create_dir_all(&base) {
            panic!("Failed to create base dir: {e}");
        }
        if let Err(e) = std::fs::create_dir_all(&outside) {
            panic!("Failed to create outside dir: {e}");
        }
        if let Err(e) = std::os::unix::fs::symlink(&outside, base.join("sneaky")) {
            panic!("Failed to create symlink: {e}");
        }

        let result = paths.resolve_install_dir(ItemCategory::Skill, "sneaky");
        assert!(matches!(result, Err(MarketplaceError::InvalidSlug { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_slug_through_intermediate_symlink() {
        let (temp, paths) = create_temp_paths();
        let base = paths.category_dir(ItemCategory::Skill);
        let outside = temp.path().join("outside");
        if let Err(e) = std::fs::create_dir_all(&base) {
            panic!("Failed to create base dir: {e}");
        }
        if let Err(e) = std::fs::create_dir_all(&outside) {
            panic!("Failed to create outside dir: {e}");
        }
        if let Err(e) = std::os::unix::fs::symlink(&outside, base.join("link")) {
            panic!("Failed to create symlink: {e}");
        }

        for slug in ["link/payload", "link/deeper/payload"] {
            let result = paths.resolve_install_dir(ItemCategory::Skill, slug);
            assert!(
                matches!(result, Err(MarketplaceError::InvalidSlug { .. })),
                "slug {slug:?} should be rejected"
            );
        }
        assert!(!outside.join("payload").exists());
    }

    #[test]
    fn test_resolve_accepts_new_dir_under_existing_parent() {
        let (_temp, paths) = create_temp_paths();
        let parent = paths.category_dir(ItemCategory::Skill).join("team");
        if let Err(e) = std::fs::create_dir_all(&parent) {
            panic!("Failed to create parent dir: {e}");
        }

        match paths.resolve_install_dir(ItemCategory::Skill, "team/reviewer") {
            Ok(dir) => assert_eq!(dir, parent.join("reviewer")),
            Err(e) => panic!("Should accept nested slug: {e}"),
        }
    }

    #[test]
    fn test_resolve_accepts_existing_install() {
        let (_temp, paths) = create_temp_paths();
        let existing = paths.category_dir(ItemCategory::Skill).join("installed");
        if let Err(e) = std::fs::create_dir_all(&existing) {
            panic!("Failed to create install dir: {e}");
        }

        match paths.resolve_install_dir(ItemCategory::Skill, "installed") {
            Ok(dir) => assert_eq!(dir, existing),
            Err(e) => panic!("Should accept existing install dir: {e}"),
        }
    }

    #[test]
    fn test_resolve_does_not_create_directories() {
        let (_temp, paths) = create_temp_paths();
        if let Ok(dir) = paths.resolve_install_dir(ItemCategory::Tool, "fresh") {
            assert!(!dir.exists());
            assert!(!paths.root().exists());
        } else {
            panic!("Should resolve");
        }
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
    }
}
