//! Identity resolver - find-or-create for external record identities
//!
//! Every other operation goes through here first to turn a
//! (tenant, system, type, external id) tuple into a persisted [`Record`].
//! Resolution never reports "not found": an unknown identity is created.

use crate::Result;
use crate::record::{Record, RecordKey, TenantId};
use crate::storage::LinkStore;

/// Resolves record identities against a [`LinkStore`]
pub struct IdentityResolver<'a, S: LinkStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: LinkStore + ?Sized> IdentityResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve `(tenant, system, record_type, external_id)` to its record,
    /// creating it on first reference.
    pub fn resolve(
        &self,
        tenant: &TenantId,
        system: &str,
        record_type: &str,
        external_id: &str,
    ) -> Result<Record> {
        let key = RecordKey::new(system, record_type, external_id)?;
        self.resolve_key(tenant, &key)
    }

    /// Resolve an already-built key
    pub fn resolve_key(&self, tenant: &TenantId, key: &RecordKey) -> Result<Record> {
        let record = self.store.resolve_or_create(tenant, key)?;
        tracing::debug!("Resolved {} for tenant {} to record {}", key, tenant, record.id);
        Ok(record)
    }
}
