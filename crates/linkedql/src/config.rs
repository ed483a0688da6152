//! Execution settings.

use serde::{Deserialize, Serialize};

/// Default compiled-regex size limit for `Filter` predicates (1 MiB).
pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Stop the result stream after this many results.
    pub max_results: Option<usize>,
    /// Size limit handed to the regex compiler for `RegExp` / `Like` filters.
    pub regex_size_limit: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_results: None,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
        }
    }
}

impl ExecutionConfig {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}
