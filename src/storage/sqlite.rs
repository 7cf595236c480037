//! SQLite storage implementation

use std::path::{Path, PathBuf};
use std::time::Duration;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::link::{Direction, Link, Side};
use crate::lookup::RecordFilter;
use crate::record::{Record, RecordKey, TenantId};
use super::{LinkStore, schema};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const RECORD_COLUMNS: &str = "id, tenant_id, system, record_type, external_id, created_at";

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// WAL journal mode, lets readers run alongside a writer
    #[default]
    Wal,
    /// Delete journal mode (legacy)
    Delete,
}

impl JournalMode {
    pub fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "wal",
            JournalMode::Delete => "delete",
        }
    }
}

/// Connection settings for [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout: Duration,
    pub journal_mode: JournalMode,
}

impl StoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            journal_mode: JournalMode::default(),
        }
    }
}

/// SQLite-backed storage for records and links
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(&StoreConfig::at(path))
    }

    /// Open a database file with explicit connection settings
    pub fn open_with_config(config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(config.busy_timeout)?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            config.journal_mode.pragma_value(),
            |row| row.get(0),
        )?;
        tracing::debug!("Opened {} (journal_mode={})", config.path.display(), mode);
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Borrow the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ========== Transactions ==========

    /// Run `f` inside a fresh `BEGIN IMMEDIATE` transaction.
    ///
    /// Commits when `f` succeeds and rolls back everything it wrote when it
    /// fails. Refuses to start if a caller-managed transaction is already
    /// open on this connection, so the work is never folded into an outer
    /// transaction that might later be committed partially.
    pub fn with_transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<Error> + std::fmt::Display,
    {
        if !self.conn.is_autocommit() {
            return Err(Error::NestedTransaction.into());
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(Error::from)?;
        let outcome = f(&*tx);
        match outcome {
            Ok(value) => {
                tx.commit().map_err(Error::from)?;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!("Rolling back transaction: {}", e);
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Begin a caller-managed transaction
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a caller-managed transaction
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a caller-managed transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }

    // ========== Record Operations ==========

    /// Get a record by its identity, without creating it
    pub fn get_record(&self, tenant: &TenantId, key: &RecordKey) -> Result<Option<Record>> {
        find_record(&self.conn, tenant, key)
    }

    /// Count records, optionally for one tenant
    pub fn count_records(&self, tenant: Option<&TenantId>) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE ?1 IS NULL OR tenant_id = ?1",
            [tenant.map(TenantId::as_str)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ========== Link Operations ==========

    /// Get the link between two record identities, if any
    pub fn get_link(&self, tenant: &TenantId, source: &RecordKey, target: &RecordKey) -> Result<Option<Link>> {
        let (Some(source), Some(target)) = (
            find_record(&self.conn, tenant, source)?,
            find_record(&self.conn, tenant, target)?,
        ) else {
            return Ok(None);
        };
        find_link(&self.conn, source.id, target.id)
    }

    /// Count links, optionally for one tenant
    pub fn count_links(&self, tenant: Option<&TenantId>) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM links l
            JOIN records r ON r.id = l.source_record_id
            WHERE ?1 IS NULL OR r.tenant_id = ?1
            "#,
            [tenant.map(TenantId::as_str)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete the link `source → target`. Endpoint records are kept.
    ///
    /// Returns whether a link was removed.
    pub fn remove_link(&self, tenant: &TenantId, source: &RecordKey, target: &RecordKey) -> Result<bool> {
        let Some(link) = self.get_link(tenant, source, target)? else {
            return Ok(false);
        };
        let removed = self.conn.execute("DELETE FROM links WHERE id = ?1", [link.id])?;
        tracing::debug!("Removed link {} -> {}", source, target);
        Ok(removed > 0)
    }

    /// Delete every link touching `key` in the given direction. Endpoint
    /// records are kept.
    ///
    /// Returns the number of links removed.
    pub fn remove_links_from(&self, tenant: &TenantId, key: &RecordKey, direction: Direction) -> Result<usize> {
        let Some(record) = find_record(&self.conn, tenant, key)? else {
            return Ok(0);
        };

        let mut removed = 0;
        for side in direction.sides() {
            let sql = match side {
                Side::Source => "DELETE FROM links WHERE target_record_id = ?1",
                Side::Target => "DELETE FROM links WHERE source_record_id = ?1",
            };
            removed += self.conn.execute(sql, [record.id])?;
        }
        tracing::debug!("Removed {} link(s) around {}", removed, key);
        Ok(removed)
    }

    /// Get database statistics
    pub fn stats(&self, tenant: Option<&TenantId>) -> Result<DbStats> {
        Ok(DbStats {
            records: self.count_records(tenant)?,
            links: self.count_links(tenant)?,
        })
    }
}

impl LinkStore for SqliteStore {
    fn resolve_or_create(&self, tenant: &TenantId, key: &RecordKey) -> Result<Record> {
        self.conn.resolve_or_create(tenant, key)
    }

    fn create_edge(&self, source: &Record, target: &Record) -> Result<Link> {
        self.conn.create_edge(source, target)
    }

    fn query_edges(&self, anchor: &Record, side: Side, filter: &RecordFilter) -> Result<Vec<Record>> {
        self.conn.query_edges(anchor, side, filter)
    }
}

impl LinkStore for Connection {
    fn resolve_or_create(&self, tenant: &TenantId, key: &RecordKey) -> Result<Record> {
        key.validate()?;
        self.execute(
            r#"
            INSERT INTO records (tenant_id, system, record_type, external_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(tenant_id, system, record_type, external_id) DO NOTHING
            "#,
            params![
                tenant.as_str(),
                key.system,
                key.record_type,
                key.external_id,
                Utc::now(),
            ],
        )?;

        // A losing racer lands here too; the winner's row is what it reads.
        find_record(self, tenant, key)?.ok_or_else(|| {
            Error::Integrity(format!("record {} for tenant {} vanished after upsert", key, tenant))
        })
    }

    fn create_edge(&self, source: &Record, target: &Record) -> Result<Link> {
        if source.tenant_id != target.tenant_id {
            return Err(Error::TenantMismatch {
                source_tenant: source.tenant_id.to_string(),
                target_tenant: target.tenant_id.to_string(),
            });
        }

        self.execute(
            r#"
            INSERT INTO links (source_record_id, target_record_id, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(source_record_id, target_record_id) DO NOTHING
            "#,
            params![source.id, target.id, Utc::now()],
        )?;

        find_link(self, source.id, target.id)?.ok_or_else(|| {
            Error::Integrity(format!("link {} -> {} vanished after upsert", source.key, target.key))
        })
    }

    fn query_edges(&self, anchor: &Record, side: Side, filter: &RecordFilter) -> Result<Vec<Record>> {
        let (join_column, anchor_column) = match side {
            Side::Source => ("source_record_id", "target_record_id"),
            Side::Target => ("target_record_id", "source_record_id"),
        };
        let sql = format!(
            r#"
            SELECT r.id, r.tenant_id, r.system, r.record_type, r.external_id, r.created_at
            FROM links l
            JOIN records r ON r.id = l.{join_column}
            WHERE l.{anchor_column} = ?1
              AND r.tenant_id = ?2
              AND (?3 IS NULL OR r.system = ?3)
              AND (?4 IS NULL OR r.record_type = ?4)
            ORDER BY l.id
            "#
        );

        let mut stmt = self.prepare_cached(&sql)?;
        let records = stmt
            .query_map(
                params![anchor.id, anchor.tenant_id.as_str(), filter.system(), filter.record_type()],
                row_to_record,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}

fn find_record(conn: &Connection, tenant: &TenantId, key: &RecordKey) -> Result<Option<Record>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM records WHERE tenant_id = ?1 AND system = ?2 AND record_type = ?3 AND external_id = ?4",
            RECORD_COLUMNS
        ),
        params![tenant.as_str(), key.system, key.record_type, key.external_id],
        row_to_record,
    )
    .optional()
    .map_err(Into::into)
}

fn find_link(conn: &Connection, source_id: i64, target_id: i64) -> Result<Option<Link>> {
    conn.query_row(
        "SELECT id, source_record_id, target_record_id, created_at FROM links WHERE source_record_id = ?1 AND target_record_id = ?2",
        params![source_id, target_id],
        |row| {
            Ok(Link {
                id: row.get(0)?,
                source_record_id: row.get(1)?,
                target_record_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

/// Helper to convert a row to a Record
fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<Record> {
    let tenant_str: String = row.get(1)?;
    let tenant_id = TenantId::new(tenant_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Record {
        id: row.get(0)?,
        tenant_id,
        key: RecordKey {
            system: row.get(2)?,
            record_type: row.get(3)?,
            external_id: row.get(4)?,
        },
        created_at: row.get(5)?,
    })
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub records: usize,
    pub links: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Records: {}", self.records)?;
        writeln!(f, "  Links: {}", self.links)
    }
}
