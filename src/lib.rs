//! # Reclink - Record identity resolution and link graph
//!
//! Links records that live in external systems with no shared identifier
//! space (an e-commerce platform and a product catalog, say).
//!
//! Reclink provides:
//! - Deduplicated, tenant-scoped identities for external records
//! - All-or-nothing batch creation of directed links across a cross-product
//! - Filtered traversal of incoming/outgoing links
//! - A two-tier (soft/hard) error model with per-edge or consolidated output
//! - SQLite-backed storage

pub mod record;
pub mod link;
pub mod storage;
pub mod resolver;
pub mod linker;
pub mod lookup;
pub mod aggregate;
pub mod options;
pub mod config;
pub mod output;
pub mod ui;


// Re-exports for convenient access
pub use record::{IdList, Record, RecordKey, TenantId};
pub use link::{Direction, Edge, Link};
pub use storage::{LinkStore, SqliteStore};
pub use resolver::IdentityResolver;
pub use linker::{BatchLinker, LinkError, LinkRequest};
pub use lookup::{AnchorOutcome, LookupEngine, LookupRequest, RecordFilter};
pub use aggregate::{OutputFlags, OutputRecord, Status};
pub use options::{LinkCommand, LinkOptions};

/// Result type alias for Reclink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Reclink operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Data integrity fault: {0}")]
    Integrity(String),

    #[error("Cross-tenant link rejected: {source_tenant} -> {target_tenant}")]
    TenantMismatch {
        source_tenant: String,
        target_tenant: String,
    },

    #[error("Connection is already inside a transaction")]
    NestedTransaction,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for rejecting a caller-supplied value
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
