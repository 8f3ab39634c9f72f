use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AdvisorError, AdvisorResult};

/// Index identifiers longer than this are truncated
pub const MAX_INDEX_NAME_LENGTH: usize = 64;

/// Bytes kept free when computing a prefix length
pub const PREFIX_SAFETY_MARGIN: usize = 2;

/// Length of the suffix appended to colliding index names
pub const NAME_SUFFIX_LENGTH: usize = 4;

/// Configuration options for index advice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Overall index key byte budget
    pub max_index_bytes: usize,
    /// Largest indexed width of a single column
    pub max_index_bytes_per_column: usize,
    /// Maximum number of columns in a composite index
    pub max_index_columns: usize,
    /// Maximum subquery nesting depth that is searched
    pub max_subquery_depth: usize,
    /// Whether redundant existing indexes may be proposed for dropping
    pub allow_drop_index: bool,
    /// MySQL version as a number, e.g. 50727 or 80000
    pub server_version: u32,
    /// Database assumed for unqualified table names
    pub default_database: String,
    /// Whether reports include sampled cardinality percentages
    pub sampling: bool,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            max_index_bytes: 3072,
            max_index_bytes_per_column: 767,
            max_index_columns: 5,
            max_subquery_depth: 5,
            allow_drop_index: false,
            server_version: 80000,
            default_database: String::new(),
            sampling: true,
        }
    }
}

impl AdvisorConfig {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> AdvisorResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: AdvisorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Advisor configuration loaded from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> AdvisorResult<()> {
        if self.max_index_bytes == 0 || self.max_index_bytes_per_column == 0 {
            return Err(AdvisorError::config("index byte budgets must be positive"));
        }
        if self.max_index_bytes_per_column > self.max_index_bytes {
            return Err(AdvisorError::config(format!(
                "max_index_bytes_per_column ({}) exceeds max_index_bytes ({})",
                self.max_index_bytes_per_column, self.max_index_bytes
            )));
        }
        if self.max_index_bytes_per_column <= PREFIX_SAFETY_MARGIN {
            return Err(AdvisorError::config("max_index_bytes_per_column leaves no room for a prefix"));
        }
        if self.max_index_columns == 0 {
            return Err(AdvisorError::config("max_index_columns must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = AdvisorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_index_bytes, 3072);
        assert_eq!(config.max_index_bytes_per_column, 767);
        assert!(!config.allow_drop_index);
    }

    #[test]
    fn test_invalid_budgets_are_rejected() {
        let config = AdvisorConfig {
            max_index_bytes: 500,
            ..AdvisorConfig::default()
        };
        assert!(matches!(config.validate(), Err(AdvisorError::Config { .. })));

        let config = AdvisorConfig {
            max_index_columns: 0,
            ..AdvisorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"allow_drop_index": true, "default_database": "shop"}}"#).unwrap();

        let config = AdvisorConfig::from_file(file.path()).unwrap();
        assert!(config.allow_drop_index);
        assert_eq!(config.default_database, "shop");
        assert_eq!(config.max_index_columns, 5);
    }
}
