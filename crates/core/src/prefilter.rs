//! File prefilter: decides, cheaply and without reading content, whether a
//! directory entry is worth handing to the matchers at all.

use crate::options::ScanOptions;
use std::fs::Metadata;
use std::path::Path;

/// Why the prefilter rejected a candidate. Callers log this at debug level;
/// it is never surfaced as a [`crate::error::ScanError`] since skipping a
/// single file is not a scan failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SkippableDir,
    NotRegularFile,
    TooLarge,
    BlacklistedExtension,
}

/// `true` if any path component exactly matches one of the configured
/// skip-directory names. Component-wise, never a substring check, so a file
/// named `my-target-dir/file.rs` is not skipped by a `target` rule.
pub fn is_skippable_dir(path: &Path, options: &ScanOptions) -> bool {
    path.components().any(|c| {
        c.as_os_str().to_str().map(|s| options.skip_dirs.contains(s)).unwrap_or(false)
    })
}

fn extension_of(path: &Path) -> String {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()).unwrap_or_default()
}

/// Decide whether a candidate file should be read and matched. `metadata`
/// must already reflect the resolved (non-symlink) target.
pub fn should_scan(path: &Path, metadata: &Metadata, options: &ScanOptions) -> Result<(), SkipReason> {
    if is_skippable_dir(path, options) {
        return Err(SkipReason::SkippableDir);
    }
    if !metadata.is_file() {
        return Err(SkipReason::NotRegularFile);
    }
    let max_bytes = options.maximum_file_size_kb.saturating_mul(1024);
    if metadata.len() > max_bytes {
        return Err(SkipReason::TooLarge);
    }
    if options.extension_blacklist.contains(&extension_of(path)) {
        return Err(SkipReason::BlacklistedExtension);
    }
    Ok(())
}

/// Loosen permissions on a file extracted from an image layer so it can be
/// read regardless of the mode baked into the layer tar. Local-directory
/// scans never call this — only the image extractor, on its own temp copies.
#[cfg(unix)]
pub fn prepare_extracted_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
pub fn prepare_extracted_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_configured_directory_components() {
        let options = ScanOptions::default();
        assert!(is_skippable_dir(Path::new("repo/node_modules/pkg/index.js"), &options));
        assert!(is_skippable_dir(Path::new("repo/.git/HEAD"), &options));
        assert!(!is_skippable_dir(Path::new("repo/src/my-target-dir/file.rs"), &options));
    }

    #[test]
    fn rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&vec![0u8; 2048]).unwrap();
        drop(f);

        let mut options = ScanOptions::default();
        options.maximum_file_size_kb = 1;
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(should_scan(&path, &meta, &options), Err(SkipReason::TooLarge));
    }

    #[test]
    fn rejects_blacklisted_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let options = ScanOptions::default();
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(should_scan(&path, &meta, &options), Err(SkipReason::BlacklistedExtension));
    }

    #[test]
    fn accepts_ordinary_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rs");
        std::fs::write(&path, b"fn main() {}").unwrap();

        let options = ScanOptions::default();
        let meta = std::fs::metadata(&path).unwrap();
        assert!(should_scan(&path, &meta, &options).is_ok());
    }

    #[test]
    fn rejects_directory_itself() {
        let dir = tempfile::tempdir().unwrap();
        let options = ScanOptions::default();
        let meta = std::fs::metadata(dir.path()).unwrap();
        assert_eq!(should_scan(dir.path(), &meta, &options), Err(SkipReason::NotRegularFile));
    }
}
