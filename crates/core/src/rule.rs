//! Compiled catalog entries.
//!
//! A [`Rule`] is the unit the catalog indexes and the matchers evaluate. Rule
//! *files* on disk are loaded as [`RuleDef`] (serde-mapped TOML) and compiled
//! into `Rule` once at catalog build time — signature compilation (regex,
//! glob) happens exactly once, never per-file.

use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;

/// Which aspect of a candidate file a rule evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    Contents,
    Filename,
    Extension,
    Path,
}

/// Severity bucket a rule falls into. Ordered least to most severe so
/// `Severity::High.max(Severity::Low) == Severity::High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric weight per the scoring resolution in the design notes:
    /// low=1, medium=3, high=7, critical=10, anything else=1.
    pub fn score(self) -> u32 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 3,
            Severity::High => 7,
            Severity::Critical => 10,
        }
    }
}

/// The raw, on-disk shape of a rule file entry (`[[rule]]` table in a TOML
/// catalog). Exactly one of `regex`, `match`, `extension`, `filename`, `path`
/// must be set; `Catalog::compile` rejects entries violating that.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDef {
    pub name: String,
    pub part: Part,
    pub severity: Severity,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(rename = "match", default)]
    pub match_literal: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Literal match is case-sensitive when true. Default: case-insensitive.
    #[serde(default)]
    pub case_sensitive: bool,
}

/// A rule file, as loaded from TOML: a tabular array of rule entries.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuleFile {
    #[serde(rename = "rule", default)]
    pub rules: Vec<RuleDef>,
}

/// The compiled signature a rule tests against a candidate.
#[derive(Debug, Clone)]
pub enum Signature {
    LiteralSubstring { needle: String, case_sensitive: bool },
    Regex(Box<Regex>),
    FilenameGlob(Box<GlobMatcher>),
    ExtensionExact(String),
    PathContains(String),
}

/// A compiled, immutable catalog entry.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: u32,
    pub name: String,
    pub part: Part,
    pub severity: Severity,
    pub signature: Signature,
    pub extension_filter: HashSet<String>,
    pub severity_score: u32,
}

impl Rule {
    /// Normalize an extension to lowercase with no leading dot.
    pub fn normalize_ext(ext: &str) -> String {
        ext.trim_start_matches('.').to_ascii_lowercase()
    }

    pub(crate) fn compile(id: u32, def: &RuleDef) -> Result<Rule, String> {
        let present = [
            def.regex.is_some(),
            def.match_literal.is_some(),
            def.extension.is_some(),
            def.filename.is_some(),
            def.path.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count();
        if present != 1 {
            return Err(format!(
                "rule '{}' must declare exactly one of regex/match/extension/filename/path",
                def.name
            ));
        }

        let signature = if let Some(pattern) = &def.regex {
            let compiled = Regex::new(pattern)
                .map_err(|e| format!("rule '{}': bad regex: {e}", def.name))?;
            Signature::Regex(Box::new(compiled))
        } else if let Some(lit) = &def.match_literal {
            Signature::LiteralSubstring {
                needle: if def.case_sensitive { lit.clone() } else { lit.to_lowercase() },
                case_sensitive: def.case_sensitive,
            }
        } else if let Some(ext) = &def.extension {
            Signature::ExtensionExact(Rule::normalize_ext(ext))
        } else if let Some(glob) = &def.filename {
            let compiled = Glob::new(glob)
                .map_err(|e| format!("rule '{}': bad filename glob: {e}", def.name))?
                .compile_matcher();
            Signature::FilenameGlob(Box::new(compiled))
        } else if let Some(p) = &def.path {
            Signature::PathContains(p.clone())
        } else {
            unreachable!("presence check above guarantees one variant is set");
        };

        let extension_filter: HashSet<String> =
            def.extensions.iter().map(|e| Rule::normalize_ext(e)).collect();

        Ok(Rule {
            id,
            name: def.name.clone(),
            part: def.part,
            severity: def.severity,
            signature,
            extension_filter,
            severity_score: def.severity.score(),
        })
    }
}
