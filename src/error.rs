use thiserror::Error;

/// Main error type for the index advisor
#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Data dictionary error: {message}")]
    Dictionary { message: String },

    #[error("Table not found: {database}.{table}")]
    TableNotFound { database: String, table: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdvisorError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into() }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }

    pub fn dictionary(message: impl Into<String>) -> Self {
        Self::Dictionary { message: message.into() }
    }

    pub fn table_not_found(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::TableNotFound {
            database: database.into(),
            table: table.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Missing or temporary tables are expected while resolving columns
    pub fn is_table_not_found(&self) -> bool {
        matches!(self, Self::TableNotFound { .. })
    }
}

/// Result type alias for advisor operations
pub type AdvisorResult<T> = Result<T, AdvisorError>;
