//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - records(tenant_id, system, record_type, external_id)
//! - links(source_record_id, target_record_id)
//!
//! The resolver, batch linker and lookup engine only talk to the
//! [`LinkStore`] trait. It is implemented for a plain `rusqlite::Connection`,
//! so a `Transaction` (which derefs to one) can be handed to the same code.

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, JournalMode, SqliteStore, StoreConfig};

use crate::Result;
use crate::link::{Link, Side};
use crate::lookup::RecordFilter;
use crate::record::{Record, RecordKey, TenantId};

/// Persistence operations the link graph needs.
pub trait LinkStore {
    /// Find the record for `key` under `tenant`, creating it if absent.
    ///
    /// Safe under concurrent callers: uniqueness is enforced by the store.
    fn resolve_or_create(&self, tenant: &TenantId, key: &RecordKey) -> Result<Record>;

    /// Create the link `source → target`, or return the existing one.
    fn create_edge(&self, source: &Record, target: &Record) -> Result<Link>;

    /// Records on one side of `anchor`, restricted by `filter`, in link order.
    fn query_edges(&self, anchor: &Record, side: Side, filter: &RecordFilter) -> Result<Vec<Record>>;
}
