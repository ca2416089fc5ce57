//! The scan engine's unit of output.

use crate::rule::Severity;
use serde::Serialize;

/// A single hit: rule × file × offset, with excerpt and severity.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub rule_id: u32,
    pub rule: String,
    pub severity: Severity,
    pub score: u32,
    pub layer_id: String,
    pub full_filename: String,
    pub filename: String,
    pub file_extension: String,
    pub starting_line_number: Option<usize>,
    #[serde(rename = "match")]
    pub match_excerpt: String,
    pub match_line: String,
    pub match_from_byte: usize,
    pub match_to_byte: usize,
}

/// On-wire enrichment of a [`Finding`] with the enclosing scan id. Used only
/// at the RPC/JSONL boundary — the engine itself never constructs these.
#[derive(Debug, Clone, Serialize)]
pub struct SecretScanDoc {
    pub scan_id: String,
    #[serde(flatten)]
    pub finding: Finding,
}
