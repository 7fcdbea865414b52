//! The boundary every bundler integration goes through.
//!
//! A bundler plugin owns one [`SourcePlugin`], asks it about each module id and
//! gets back new code only when something was annotated.

use crate::config::TransformConfig;
use crate::error::ConfigError;
use crate::internal::InternalPatterns;
use crate::rewrite::{Rewriter, TransformOutput};

/// Module extensions the rewriter understands.
pub const TRANSFORM_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".mjs", ".cjs", ".mts", ".cts"];

/// Module id without a `?query` or `#fragment` suffix.
fn strip_query(id: &str) -> &str {
    id.split(['?', '#']).next().unwrap_or(id)
}

/// Decides which module ids are offered to the rewriter.
#[derive(Debug, Clone, Default)]
pub struct ModuleFilter {
    patterns: InternalPatterns,
}

impl ModuleFilter {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            patterns: InternalPatterns::new(&config.library_markers),
        }
    }

    pub fn accepts(&self, id: &str) -> bool {
        let path = strip_query(id);
        if path.is_empty() || self.patterns.is_skipped_file(id) {
            return false;
        }
        TRANSFORM_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }
}

/// Run one module through the filter and the rewriter.
///
/// `None` means the bundler should keep the module as it is.
pub fn transform_module(
    rewriter: &Rewriter,
    filter: &ModuleFilter,
    source: &str,
    id: &str,
) -> Option<TransformOutput> {
    if !filter.accepts(id) {
        log::trace!("{id}: not offered to the rewriter");
        return None;
    }
    let output = rewriter.transform(source, strip_query(id));
    output.changed.then_some(output)
}

/// Rewriter and filter built from one plugin configuration.
#[derive(Debug, Clone)]
pub struct SourcePlugin {
    rewriter: Rewriter,
    filter: ModuleFilter,
}

impl Default for SourcePlugin {
    fn default() -> Self {
        Self {
            rewriter: crate::default_rewriter().clone(),
            filter: ModuleFilter::default(),
        }
    }
}

impl SourcePlugin {
    pub fn new(config: TransformConfig) -> Result<Self, ConfigError> {
        let filter = ModuleFilter::new(&config);
        let rewriter = Rewriter::new(config)?;
        Ok(Self { rewriter, filter })
    }

    /// Build from the raw options a bundler passes through. Never fails; a
    /// rejected configuration is logged and replaced by the defaults.
    pub fn from_plugin_config(json: Option<&str>) -> Self {
        match Self::new(TransformConfig::from_plugin_config(json)) {
            Ok(plugin) => plugin,
            Err(e) => {
                log::warn!("ignoring plugin config, using defaults: {e}");
                Self::default()
            }
        }
    }

    pub fn rewriter(&self) -> &Rewriter {
        &self.rewriter
    }

    pub fn filter(&self) -> &ModuleFilter {
        &self.filter
    }

    pub fn transform_module(&self, source: &str, id: &str) -> Option<TransformOutput> {
        transform_module(&self.rewriter, &self.filter, source, id)
    }
}
