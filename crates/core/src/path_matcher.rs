//! Path/name matcher: filename, extension, and path-substring rules. Runs
//! ahead of the content matcher and never opens the file.

use crate::catalog::Catalog;
use crate::content_matcher::{finding_from, ScanCounters};
use crate::finding::Finding;
use crate::matchfile::MatchFile;
use crate::rule::{Rule, Signature};
use std::sync::Arc;

fn rule_matches_metadata(rule: &Rule, file: &MatchFile) -> bool {
    match &rule.signature {
        Signature::FilenameGlob(glob) => glob.is_match(&file.base_name),
        Signature::ExtensionExact(ext) => file.extension == *ext,
        Signature::PathContains(needle) => file.rel_path.contains(needle.as_str()),
        Signature::Regex(_) | Signature::LiteralSubstring { .. } => false,
    }
}

/// Evaluate every metadata rule against a candidate's path and name. Unlike
/// the content matcher, a metadata hit has no byte range: the excerpt and
/// match line are both empty, and the "whole filename" stands in for them.
pub fn match_path(
    catalog: &Catalog,
    file: &MatchFile,
    counters: &Arc<ScanCounters>,
) -> (Vec<Finding>, bool) {
    let mut findings = Vec::new();
    let mut cap_hit = counters.cap_reached();

    for rule in catalog.metadata_rules() {
        if cap_hit {
            break;
        }
        if rule_matches_metadata(rule, file) {
            findings.push(finding_from(rule, file, "", "", 0, 0, None));
            cap_hit = counters.record();
        }
    }

    (findings, cap_hit)
}
