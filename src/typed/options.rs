//! Load and dump settings.

use crate::tree::DEFAULT_MAX_DEPTH;
use serde::Deserialize;

/// LoadOptions controls how documents are parsed and bound.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Deepest nesting accepted before failing with `RecursionLimit`.
    pub max_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl LoadOptions {
    pub fn builder() -> LoadOptionsBuilder {
        LoadOptionsBuilder::default()
    }
}

/// LoadOptionsBuilder is a builder for creating LoadOptions.
#[derive(Debug, Default)]
pub struct LoadOptionsBuilder {
    options: LoadOptions,
}

impl LoadOptionsBuilder {
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    pub fn build(self) -> LoadOptions {
        self.options
    }
}

/// DumpOptions controls how documents are written.
///
/// Indentation applies to block collections created in memory; collections
/// read from text keep their own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    pub indent: usize,
    /// Prefix of generated anchor names (`id001`, `id002`, ...).
    pub anchor_prefix: String,
    pub max_depth: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        DumpOptions {
            indent: 2,
            anchor_prefix: "id".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DumpOptions {
    pub fn builder() -> DumpOptionsBuilder {
        DumpOptionsBuilder::default()
    }
}

/// DumpOptionsBuilder is a builder for creating DumpOptions.
#[derive(Debug, Default)]
pub struct DumpOptionsBuilder {
    options: DumpOptions,
}

impl DumpOptionsBuilder {
    pub fn indent(mut self, indent: usize) -> Self {
        self.options.indent = indent;
        self
    }

    pub fn anchor_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.anchor_prefix = prefix.into();
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    pub fn build(self) -> DumpOptions {
        self.options
    }
}
