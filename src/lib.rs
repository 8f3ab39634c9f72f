pub mod error;
pub mod types;
pub mod sql_parser;
pub mod dictionary;
pub mod index_advisor;
