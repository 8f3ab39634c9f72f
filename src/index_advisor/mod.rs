// Index advisory engine: classify, resolve, estimate, synthesize, bound, merge
pub mod advisor;
pub mod cardinality;
pub mod classifier;
pub mod config;
pub mod context;
pub mod length_checker;
pub mod merger;
pub mod metadata;
pub mod report;
pub mod storage;
pub mod synthesizer;


pub use advisor::*;
pub use config::*;
pub use context::*;
pub use merger::{duplicate_key_check, DuplicateKeyFinding};
pub use report::*;
