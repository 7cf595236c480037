//! Lookup engine - filtered traversal around anchor records
//!
//! One [`AnchorOutcome`] is produced per anchor id, in input order:
//! - `Success`: at least one linked record matched
//! - `SoftError`: nothing matched the direction/filter (a 404, not a fault)
//! - `HardError`: the store failed while resolving or traversing (a 500)
//!
//! Anchors that were never seen before are created on the fly, so a missing
//! anchor shows up as a soft "no matching link", never as a hard failure.

use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::aggregate::{ErrorDetail, Status};
use crate::link::{Direction, Side};
use crate::record::{RecordKey, RecordSet, TenantId};
use crate::resolver::IdentityResolver;
use crate::storage::LinkStore;

/// Exact-match restriction on the records reached by a traversal.
///
/// A type filter is only meaningful within a system, so `record_type`
/// without `system` is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    system: Option<String>,
    record_type: Option<String>,
}

impl RecordFilter {
    /// Matches every record
    pub fn any() -> Self {
        Self::default()
    }

    /// Build a filter. Blank values count as unset.
    pub fn new(system: Option<String>, record_type: Option<String>) -> Result<Self> {
        let system = system.filter(|s| !s.trim().is_empty());
        let record_type = record_type.filter(|t| !t.trim().is_empty());
        if record_type.is_some() && system.is_none() {
            return Err(Error::invalid("filter type requires a filter system"));
        }
        Ok(Self { system, record_type })
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn record_type(&self) -> Option<&str> {
        self.record_type.as_deref()
    }
}

/// A lookup over one or more anchors of the same system and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub tenant: TenantId,
    pub anchors: RecordSet,
    pub filter: RecordFilter,
    pub direction: Direction,
}

/// Records linked to one anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorLinks {
    pub anchor: RecordKey,
    /// Records linking to the anchor
    pub sources: Vec<RecordKey>,
    /// Records the anchor links to
    pub targets: Vec<RecordKey>,
}

impl AnchorLinks {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.targets.is_empty()
    }
}

/// Result of looking up one anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorOutcome {
    Success(AnchorLinks),
    SoftError(ErrorDetail),
    HardError(ErrorDetail),
}

impl AnchorOutcome {
    pub fn status(&self) -> Status {
        match self {
            AnchorOutcome::Success(_) => Status::Ok,
            AnchorOutcome::SoftError(_) => Status::NotFound,
            AnchorOutcome::HardError(_) => Status::Internal,
        }
    }
}

/// Lookup engine over a [`LinkStore`]
pub struct LookupEngine<'a, S: LinkStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: LinkStore + ?Sized> LookupEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Look up every anchor of `request`
    pub fn lookup(&self, request: &LookupRequest) -> Vec<AnchorOutcome> {
        request
            .anchors
            .ids
            .iter()
            .map(|id| match request.anchors.key_for(id) {
                Ok(key) => self.lookup_anchor(&request.tenant, &key, &request.filter, request.direction),
                Err(e) => AnchorOutcome::HardError(
                    ErrorDetail::new(format!("invalid anchor id {:?}", id)).with_cause(&e),
                ),
            })
            .collect()
    }

    /// Look up a single anchor
    pub fn lookup_anchor(
        &self,
        tenant: &TenantId,
        key: &RecordKey,
        filter: &RecordFilter,
        direction: Direction,
    ) -> AnchorOutcome {
        let detail = |message: &str| ErrorDetail::for_anchor(key, filter, direction, message);

        let anchor = match IdentityResolver::new(self.store).resolve_key(tenant, key) {
            Ok(anchor) => anchor,
            Err(e) => {
                tracing::error!("Resolving anchor {} failed: {}", key, e);
                return AnchorOutcome::HardError(detail("failed to resolve anchor record").with_cause(&e));
            }
        };

        let mut links = AnchorLinks {
            anchor: key.clone(),
            sources: Vec::new(),
            targets: Vec::new(),
        };

        for side in direction.sides() {
            let records = match self.store.query_edges(&anchor, *side, filter) {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!("Traversing links of {} failed: {}", key, e);
                    return AnchorOutcome::HardError(detail("failed to traverse links").with_cause(&e));
                }
            };
            let keys = records.into_iter().map(|r| r.key);
            match side {
                Side::Source => links.sources.extend(keys),
                Side::Target => links.targets.extend(keys),
            }
        }

        if links.is_empty() {
            tracing::debug!("No {} links for {} under filter {:?}", direction, key, filter);
            return AnchorOutcome::SoftError(detail("no matching link found"));
        }

        AnchorOutcome::Success(links)
    }
}
