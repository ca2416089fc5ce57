//! Process-wide configuration snapshot. Immutable once a scan starts.

use std::collections::HashSet;
use std::path::PathBuf;

/// Directory names the prefilter refuses to descend into. Matched on a path
/// component basis, never as a substring.
pub fn default_skip_dirs() -> HashSet<String> {
    [
        "proc", "sys", "dev", ".git", "node_modules", "vendor", "target", ".cache",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Extensions the prefilter treats as uninteresting binary/media blobs.
pub fn default_extension_blacklist() -> HashSet<String> {
    [
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "mp3", "mp4", "avi", "mov",
        "mkv", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "so", "dll", "dylib", "exe", "o",
        "a", "class", "jar", "pdf", "woff", "woff2", "ttf", "eot",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Immutable, process-wide scan configuration. Built once from CLI flags (or
/// programmatically by embedders) and shared by reference into every scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub maximum_file_size_kb: u64,
    pub max_secrets: usize,
    pub multi_match: bool,
    pub max_multi_match: usize,
    /// When greater than 1, the traversal driver shards a directory's
    /// candidate files across a `rayon` thread pool of this size instead of
    /// matching them one at a time.
    pub workers_per_scan: usize,
    pub inactive_threshold_secs: u64,
    pub temp_directory: PathBuf,
    pub host_mount_path: Option<String>,
    pub skip_dirs: HashSet<String>,
    pub extension_blacklist: HashSet<String>,
    /// Excerpt context window, in bytes, on each side of a match.
    pub excerpt_context_bytes: usize,
    /// Maximum width of the reported match line.
    pub match_line_width: usize,
    pub fail_on_count: Option<usize>,
    pub fail_on_high_count: Option<usize>,
    pub fail_on_medium_count: Option<usize>,
    pub fail_on_low_count: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            maximum_file_size_kb: 256,
            max_secrets: 1000,
            multi_match: false,
            max_multi_match: 3,
            workers_per_scan: 1,
            inactive_threshold_secs: 600,
            temp_directory: std::env::temp_dir(),
            host_mount_path: None,
            skip_dirs: default_skip_dirs(),
            extension_blacklist: default_extension_blacklist(),
            excerpt_context_bytes: 50,
            match_line_width: 300,
            fail_on_count: None,
            fail_on_high_count: None,
            fail_on_medium_count: None,
            fail_on_low_count: None,
        }
    }
}
