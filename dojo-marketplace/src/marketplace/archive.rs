//! Archive extraction into an install directory.
//!
//! Supports ZIP archives and gzip-compressed tarballs, detected by their
//! magic bytes. Entry names are untrusted: every entry is checked by
//! [`sanitize_entry_path`] before anything is written, independently of the
//! slug check that produced the target directory.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use super::error::{MarketplaceError, Result};

/// Default cap on the decompressed size of a single entry (100 MB).
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 100 * 1024 * 1024;

/// Archive container formats understood by the installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Detect the format from the leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Extracts verified archives, overwriting files that already exist.
#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    max_entry_bytes: u64,
}

impl Default for ArchiveInstaller {
    fn default() -> Self {
        Self {
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }
}

impl ArchiveInstaller {
    /// Installer with a custom per-entry size cap.
    pub fn with_max_entry_bytes(max_entry_bytes: u64) -> Self {
        Self { max_entry_bytes }
    }

    /// Extract `bytes` into `target_dir`, creating it and its parents.
    ///
    /// Returns the number of files written. Reinstalling the same archive
    /// produces the same tree. A failure part-way through may leave some
    /// files written; rerunning the install overwrites them.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError::UnsafeArchiveEntry`] for entries that
    /// would escape `target_dir`, and [`MarketplaceError::ExtractionFailed`]
    /// for malformed archives or write failures.
    pub fn install(&self, bytes: &[u8], target_dir: &Path) -> Result<usize> {
        let format = ArchiveFormat::detect(bytes).ok_or_else(|| {
            extraction_error(
                target_dir,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "unsupported archive format (expected zip or tar.gz)",
                ),
            )
        })?;

        fs::create_dir_all(target_dir).map_err(|e| extraction_error(target_dir, e))?;

        let written = match format {
            ArchiveFormat::Zip => self.extract_zip(bytes, target_dir)?,
            ArchiveFormat::TarGz => self.extract_tar_gz(bytes, target_dir)?,
        };

        debug!(?format, files = written, target = %target_dir.display(), "Archive extracted");
        Ok(written)
    }

    fn extract_zip(&self, bytes: &[u8], target_dir: &Path) -> Result<usize> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| extraction_error(target_dir, e))?;

        let mut written = 0;
        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| extraction_error(target_dir, e))?;
            let Some(relative) = sanitize_entry_path(entry.name())? else {
                continue;
            };
            let dest = target_dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&dest).map_err(|e| extraction_error(target_dir, e))?;
                continue;
            }

            self.write_entry(&mut entry, &dest, target_dir)?;
            written += 1;
        }
        Ok(written)
    }

    fn extract_tar_gz(&self, bytes: &[u8], target_dir: &Path) -> Result<usize> {
        use tar::EntryType;

        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive.set_preserve_permissions(false);
        #[cfg(unix)]
        archive.set_unpack_xattrs(false);

        let entries = archive
            .entries()
            .map_err(|e| extraction_error(target_dir, e))?;

        let mut written = 0;
        for entry in entries {
            let mut entry = entry.map_err(|e| extraction_error(target_dir, e))?;
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

            match entry.header().entry_type() {
                EntryType::Symlink | EntryType::Link => {
                    return Err(MarketplaceError::UnsafeArchiveEntry { entry: name });
                }
                EntryType::Directory => {
                    if let Some(relative) = sanitize_entry_path(&name)? {
                        fs::create_dir_all(target_dir.join(relative))
                            .map_err(|e| extraction_error(target_dir, e))?;
                    }
                }
                EntryType::Regular | EntryType::Continuous => {
                    let Some(relative) = sanitize_entry_path(&name)? else {
                        continue;
                    };
                    self.write_entry(&mut entry, &target_dir.join(relative), target_dir)?;
                    written += 1;
                }
                other => {
                    debug!(entry = %name, kind = ?other, "Skipping archive entry");
                }
            }
        }
        Ok(written)
    }

    fn write_entry(&self, reader: &mut impl Read, dest: &Path, target_dir: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| extraction_error(target_dir, e))?;
        }

        // Never write through a symlink left behind in the target tree.
        if let Ok(meta) = fs::symlink_metadata(dest)
            && meta.file_type().is_symlink()
        {
            fs::remove_file(dest).map_err(|e| extraction_error(target_dir, e))?;
        }

        let mut file = fs::File::create(dest).map_err(|e| extraction_error(target_dir, e))?;
        let copied = std::io::copy(&mut reader.take(self.max_entry_bytes + 1), &mut file)
            .map_err(|e| extraction_error(target_dir, e))?;
        if copied > self.max_entry_bytes {
            return Err(extraction_error(
                target_dir,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "entry {} exceeds {} bytes",
                        dest.display(),
                        self.max_entry_bytes
                    ),
                ),
            ));
        }
        Ok(())
    }
}

/// Turn an archive entry name into a path relative to the target directory.
///
/// Both `/` and `\` are treated as separators. Absolute names, drive
/// prefixes and `..` components are rejected; `.` and empty components are
/// dropped. Returns `None` for names that reduce to nothing.
///
/// # Errors
///
/// Returns [`MarketplaceError::UnsafeArchiveEntry`] for names that could
/// resolve outside the target directory.
pub fn sanitize_entry_path(name: &str) -> Result<Option<PathBuf>> {
    let unsafe_entry = || MarketplaceError::UnsafeArchiveEntry {
        entry: name.to_string(),
    };

    if name.starts_with(['/', '\\']) || name.contains('\0') {
        return Err(unsafe_entry());
    }

    let mut relative = PathBuf::new();
    for (index, part) in name.split(['/', '\\']).enumerate() {
        match part {
            "" | "." => {}
            ".." => return Err(unsafe_entry()),
            _ if index == 0 && is_drive_prefix(part) => return Err(unsafe_entry()),
            _ => relative.push(part),
        }
    }

    if relative.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(relative))
    }
}

fn is_drive_prefix(part: &str) -> bool {
    let bytes = part.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn extraction_error(
    target_dir: &Path,
    source: impl std::error::Error + Send + Sync + 'static,
) -> MarketplaceError {
    MarketplaceError::ExtractionFailed {
        path: target_dir.to_path_buf(),
        source: Box::new(source),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory archive builders shared by the installer tests.

    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use zip::write::SimpleFileOptions;

    /// Build a ZIP archive from `(name, contents)` pairs.
    pub fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, contents) in files {
            if let Err(e) = writer.start_file(*name, SimpleFileOptions::default()) {
                panic!("Failed to start zip entry {name}: {e}");
            }
            if let Err(e) = writer.write_all(contents.as_bytes()) {
                panic!("Failed to write zip entry {name}: {e}");
            }
        }
        match writer.finish() {
            Ok(cursor) => cursor.into_inner(),
            Err(e) => panic!("Failed to finish zip: {e}"),
        }
    }

    /// Build a gzip-compressed tarball from `(name, contents)` pairs.
    ///
    /// Names are copied into the header verbatim so hostile names can be
    /// exercised.
    pub fn tar_gz_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            for (name, contents) in files {
                let mut header = tar::Header::new_gnu();
                let raw_name = name.as_bytes();
                header.as_old_mut().name[..raw_name.len()].copy_from_slice(raw_name);
                header.set_size(contents.len() as u64);
                header.set_mode(0o644);
                header.set_entry_type(tar::EntryType::Regular);
                header.set_cksum();
                if let Err(e) = builder.append(&header, contents.as_bytes()) {
                    panic!("Failed to append tar entry {name}: {e}");
                }
            }
            if let Err(e) = builder.finish() {
                panic!("Failed to finish tar: {e}");
            }
        }
        match encoder.finish() {
            Ok(bytes) => bytes,
            Err(e) => panic!("Failed to finish gzip: {e}"),
        }
    }
}
