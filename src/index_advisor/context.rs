use std::sync::Arc;

use tracing::{debug, warn};

use super::config::AdvisorConfig;
use crate::dictionary::DataDictionary;
use crate::error::AdvisorError;
use crate::types::{IndexMetadataCache, TableIndexInfo};

/// State owned by one advisory call. Never shared between statements.
pub struct AdvisorContext {
    pub config: AdvisorConfig,
    dictionary: Option<Arc<dyn DataDictionary>>,
    index_cache: IndexMetadataCache,
    degraded: bool,
}

impl AdvisorContext {
    pub fn new(config: AdvisorConfig, dictionary: Option<Arc<dyn DataDictionary>>) -> Self {
        Self {
            config,
            dictionary,
            index_cache: IndexMetadataCache::new(),
            degraded: false,
        }
    }

    /// The dictionary, unless absent or given up on after a failure
    pub fn dictionary(&self) -> Option<Arc<dyn DataDictionary>> {
        if self.degraded {
            None
        } else {
            self.dictionary.clone()
        }
    }

    pub fn is_live(&self) -> bool {
        self.dictionary.is_some() && !self.degraded
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn mark_degraded(&mut self) {
        self.degraded = true;
    }

    /// Record a dictionary failure. Missing tables are expected and only logged.
    pub fn record_failure(&mut self, error: &AdvisorError) {
        if error.is_table_not_found() {
            debug!("{}", error);
            return;
        }
        if !self.degraded {
            warn!("Data dictionary unavailable, falling back to single-column advice: {}", error);
        }
        self.degraded = true;
    }

    pub fn default_database(&self) -> String {
        if !self.config.default_database.is_empty() {
            return self.config.default_database.clone();
        }
        self.dictionary
            .as_ref()
            .map(|dictionary| dictionary.default_database().to_string())
            .unwrap_or_default()
    }

    /// Existing indexes of a table, loaded once per call
    pub fn table_indexes(&mut self, database: &str, table: &str) -> Option<&TableIndexInfo> {
        if !self.index_cache.contains(database, table) {
            let dictionary = self.dictionary()?;
            let loaded = match dictionary.list_indexes(database, table) {
                Ok(rows) => Some(TableIndexInfo::new(rows)),
                Err(e) => {
                    self.record_failure(&e);
                    None
                }
            };
            self.index_cache.insert(database, table, loaded);
        }
        self.index_cache.get(database, table)
    }
}
