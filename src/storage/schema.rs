//! Database schema definitions

/// SQL to create the records table
pub const CREATE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL CHECK (length(tenant_id) > 0),
    system TEXT NOT NULL CHECK (length(system) > 0),
    record_type TEXT NOT NULL CHECK (length(record_type) > 0),
    external_id TEXT NOT NULL CHECK (length(external_id) > 0),
    created_at TEXT NOT NULL,
    UNIQUE(tenant_id, system, record_type, external_id)
)
"#;

/// SQL to create the links table
/// Ownership is carried by the referenced records, not stored on the link
pub const CREATE_LINKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_record_id INTEGER NOT NULL REFERENCES records(id),
    target_record_id INTEGER NOT NULL REFERENCES records(id),
    created_at TEXT NOT NULL,
    UNIQUE(source_record_id, target_record_id)
)
"#;

/// Rejects links whose endpoints belong to different tenants
pub const CREATE_SAME_TENANT_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS links_same_tenant
BEFORE INSERT ON links
WHEN (SELECT tenant_id FROM records WHERE id = NEW.source_record_id)
     IS NOT (SELECT tenant_id FROM records WHERE id = NEW.target_record_id)
BEGIN
    SELECT RAISE(ABORT, 'cross-tenant link');
END
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_records_tenant ON records(tenant_id)",
    "CREATE INDEX IF NOT EXISTS idx_records_system_type ON records(system, record_type)",
    "CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_record_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_RECORDS_TABLE,
        CREATE_LINKS_TABLE,
        CREATE_SAME_TENANT_TRIGGER,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
