//! Rule catalog: loading, merging, compiling, and per-file selection.

use crate::error::ScanError;
use crate::matchfile::MatchFile;
use crate::rule::{Part, Rule, RuleFile};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The default catalog, embedded with the binary so a scan always has
/// something to run even with no `-config-path` supplied.
const DEFAULT_CATALOG_TOML: &str = include_str!("default_rules.toml");

/// An ordered, deduplicated collection of compiled rules, partitioned into a
/// content index (optionally bucketed by extension) and a metadata index.
pub struct Catalog {
    rules: Vec<Rule>,
    /// Indices of content rules with no extension filter — always eligible.
    content_unfiltered: Vec<usize>,
    /// Indices of content rules, bucketed by each extension they accept.
    content_by_ext: HashMap<String, Vec<usize>>,
    metadata: Vec<usize>,
}

impl Catalog {
    /// Load the default embedded catalog plus any user-supplied rule files.
    ///
    /// By default, supplying `config_paths` *replaces* the default catalog;
    /// with `merge` on, user rules are appended to it. A parse failure in any
    /// file aborts the whole load.
    pub fn load(config_paths: &[PathBuf], merge: bool) -> Result<Catalog, ScanError> {
        let mut defs = Vec::new();

        if config_paths.is_empty() || merge {
            defs.extend(Self::parse_rule_file(Path::new("<default>"), DEFAULT_CATALOG_TOML)?);
        }

        for path in config_paths {
            let content = std::fs::read_to_string(path).map_err(|e| ScanError::Configuration {
                path: path.clone(),
                message: e.to_string(),
            })?;
            defs.extend(Self::parse_rule_file(path, &content)?);
        }

        info!(rule_count = defs.len(), "rule catalog loaded");
        Self::compile(defs)
    }

    fn parse_rule_file(
        path: &Path,
        content: &str,
    ) -> Result<Vec<crate::rule::RuleDef>, ScanError> {
        let file: RuleFile = toml::from_str(content).map_err(|e| ScanError::Configuration {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(file.rules)
    }

    fn compile(defs: Vec<crate::rule::RuleDef>) -> Result<Catalog, ScanError> {
        let mut rules = Vec::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            let rule = Rule::compile(i as u32, def).map_err(|message| ScanError::Configuration {
                path: PathBuf::from("<catalog>"),
                message,
            })?;
            rules.push(rule);
        }

        let mut content_unfiltered = Vec::new();
        let mut content_by_ext: HashMap<String, Vec<usize>> = HashMap::new();
        let mut metadata = Vec::new();

        for (idx, rule) in rules.iter().enumerate() {
            match rule.part {
                Part::Contents => {
                    if rule.extension_filter.is_empty() {
                        content_unfiltered.push(idx);
                    } else {
                        for ext in &rule.extension_filter {
                            content_by_ext.entry(ext.clone()).or_default().push(idx);
                        }
                    }
                }
                Part::Filename | Part::Extension | Part::Path => metadata.push(idx),
            }
        }

        debug!(
            content_rules = content_unfiltered.len() + content_by_ext.len(),
            metadata_rules = metadata.len(),
            "catalog compiled"
        );

        Ok(Catalog { rules, content_unfiltered, content_by_ext, metadata })
    }

    /// Content rules eligible for this file: extension-filtered rules that
    /// accept its extension, plus every unfiltered rule.
    pub fn content_rules_for(&self, file: &MatchFile) -> Vec<&Rule> {
        let mut out: Vec<&Rule> =
            self.content_unfiltered.iter().map(|&i| &self.rules[i]).collect();
        if let Some(indices) = self.content_by_ext.get(&file.extension) {
            out.extend(indices.iter().map(|&i| &self.rules[i]));
        }
        out
    }

    /// Metadata rules, already filtered to the relevant `part`.
    pub fn metadata_rules(&self) -> impl Iterator<Item = &Rule> {
        self.metadata.iter().map(move |&i| &self.rules[i])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub(crate) fn warn_unreadable(path: &Path, err: &std::io::Error) {
    warn!(path = %path.display(), error = %err, "failed to read file, skipping");
}
