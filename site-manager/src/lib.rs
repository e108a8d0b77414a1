//! Signal Sciences site manager library
//!
//! Back up a site's configuration to a JSON document, deploy it as a new
//! site, merge it onto existing sites, and rewrite it for another corp.
pub mod audit;
pub mod backup;
pub mod category;
pub mod cli;
pub mod compare;
pub mod credentials;
pub mod dependencies;
pub mod deploy;
pub mod document;
pub mod error;
pub mod merge;
pub mod migrate;
pub mod users;
pub mod validate;

// Re-export commonly used types
pub use category::{Category, CategorySet};
pub use document::BackupDocument;
pub use error::{ManagerError, Result};
pub use merge::{CategoryReport, MergeSource, MergeSummary};
