//! Ephemeral per-candidate-file record shared by the prefilter and matchers.

use std::path::PathBuf;

/// A file the traversal driver has decided is worth presenting to the
/// matchers. Never persisted past the lifetime of one file's processing.
#[derive(Debug, Clone)]
pub struct MatchFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub base_name: String,
    pub extension: String,
    /// Empty for local scans; the extracted layer id for image scans.
    pub layer_id: String,
    pub byte_len: u64,
}

impl MatchFile {
    pub fn new(abs_path: PathBuf, rel_path: String, layer_id: String, byte_len: u64) -> Self {
        let base_name =
            abs_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let extension = abs_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        MatchFile { abs_path, rel_path, base_name, extension, layer_id, byte_len }
    }
}
