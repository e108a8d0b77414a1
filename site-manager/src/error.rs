//! Error types for the site manager application
use crate::credentials::CredentialError;

/// Custom error type for site manager operations
#[derive(thiserror::Error, Debug)]
pub enum ManagerError {
    /// Signal Sciences API error
    #[error("Signal Sciences API error: {0}")]
    SigSciApi(#[from] sigsci_platform::SigSciError),

    /// Site lookup or creation error
    #[error("Site error: {0}")]
    Site(#[from] sigsci_platform::SiteError),

    /// User management error
    #[error("User error: {0}")]
    User(#[from] sigsci_platform::UserError),

    /// Credential error
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// File I/O error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV input error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP error outside the dashboard API (validation test requests)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid regular expression
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Invalid wildcard site pattern
    #[error("Invalid site pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Invalid category selection or argument combination
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Backup file content is unusable
    #[error("Invalid backup file: {0}")]
    InvalidBackup(String),

    /// Migrating without --strip requires the backup's own corp
    #[error("Corp mismatch: {0}")]
    CorpMismatch(String),

    /// Audit baseline missing or malformed
    #[error("Audit baseline error: {0}")]
    Baseline(String),
}

/// Result type alias for site manager operations
pub type Result<T> = std::result::Result<T, ManagerError>;
