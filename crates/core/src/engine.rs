//! The engine owns the compiled rule catalog and process-wide options for
//! the lifetime of the host process. A coordinator is created from it per
//! scan request.

use crate::catalog::Catalog;
use crate::error::ScanError;
use crate::options::ScanOptions;
use std::path::PathBuf;

/// Long-lived, shared state: one catalog and one options snapshot serve
/// every scan the process runs. Construct once at startup.
pub struct Engine {
    pub catalog: Catalog,
    pub options: ScanOptions,
}

impl Engine {
    pub fn new(catalog: Catalog, options: ScanOptions) -> Self {
        Engine { catalog, options }
    }

    /// Build an engine from CLI-supplied rule file paths and options,
    /// loading (and validating) the catalog once.
    pub fn from_config_paths(config_paths: &[PathBuf], merge: bool, options: ScanOptions) -> Result<Engine, ScanError> {
        let catalog = Catalog::load(config_paths, merge)?;
        Ok(Engine::new(catalog, options))
    }
}
