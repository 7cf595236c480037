//! Batch linker - all-or-nothing creation of a cross-product of links
//!
//! Every source id is linked to every target id (source-major order). The
//! whole batch runs in one fresh transaction: either every link exists
//! afterwards or none of the batch's writes were kept.

use std::collections::HashSet;
use std::fmt;
use crate::Error;
use crate::link::Edge;
use crate::record::{RecordSet, TenantId};
use crate::resolver::IdentityResolver;
use crate::storage::{LinkStore, SqliteStore};

/// A batch link request: `sources × targets` under one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub tenant: TenantId,
    pub sources: RecordSet,
    pub targets: RecordSet,
}

impl LinkRequest {
    pub fn new(tenant: TenantId, sources: RecordSet, targets: RecordSet) -> Self {
        Self { tenant, sources, targets }
    }

    /// Number of links the request asks for (duplicates included)
    pub fn pair_count(&self) -> usize {
        self.sources.ids.len() * self.targets.ids.len()
    }
}

/// A failed batch. Always a hard failure; nothing from the batch was kept.
#[derive(Debug, thiserror::Error)]
#[error("failed to link {}: {cause}", edge_label(.failed_edge))]
pub struct LinkError {
    /// The pair being processed when the batch failed, if any
    pub failed_edge: Option<Edge>,
    #[source]
    pub cause: Error,
}

impl LinkError {
    pub fn at(edge: &Edge, cause: Error) -> Self {
        Self {
            failed_edge: Some(edge.clone()),
            cause,
        }
    }
}

impl From<Error> for LinkError {
    fn from(cause: Error) -> Self {
        Self { failed_edge: None, cause }
    }
}

fn edge_label(edge: &Option<Edge>) -> String {
    match edge {
        Some(edge) => edge.to_string(),
        None => "batch".to_string(),
    }
}

/// Creates link batches against a [`SqliteStore`]
pub struct BatchLinker<'a> {
    store: &'a mut SqliteStore,
}

impl<'a> BatchLinker<'a> {
    pub fn new(store: &'a mut SqliteStore) -> Self {
        Self { store }
    }

    /// Create every link of `request` atomically.
    ///
    /// Returns the created-or-existing edges in source-major order.
    /// Repeating a successful request returns the same list.
    pub fn create_links(&mut self, request: &LinkRequest) -> Result<Vec<Edge>, LinkError> {
        tracing::debug!(
            "Linking {} pair(s) for tenant {}: {}",
            request.pair_count(),
            request.tenant,
            request
        );

        match self.store.with_transaction(|tx| create_links_in(tx, request)) {
            Ok(edges) => {
                tracing::info!("Committed {} link(s) for tenant {}", edges.len(), request.tenant);
                Ok(edges)
            }
            Err(e) => {
                tracing::error!("Link batch for tenant {} failed: {}", request.tenant, e);
                Err(e)
            }
        }
    }
}

/// Create the cross-product of `request` through `store`.
///
/// Does not manage a transaction itself; callers wanting atomicity run it
/// inside [`SqliteStore::with_transaction`], as [`BatchLinker`] does.
pub fn create_links_in<S: LinkStore + ?Sized>(store: &S, request: &LinkRequest) -> Result<Vec<Edge>, LinkError> {
    let resolver = IdentityResolver::new(store);
    let source_keys = request.sources.keys()?;
    let target_keys = request.targets.keys()?;

    let mut seen = HashSet::new();
    let mut edges = Vec::with_capacity(request.pair_count());

    for source_key in &source_keys {
        for target_key in &target_keys {
            let edge = Edge::new(source_key.clone(), target_key.clone());
            if !seen.insert(edge.clone()) {
                continue;
            }

            let source = resolver
                .resolve_key(&request.tenant, source_key)
                .map_err(|e| LinkError::at(&edge, e))?;
            let target = resolver
                .resolve_key(&request.tenant, target_key)
                .map_err(|e| LinkError::at(&edge, e))?;
            let link = store
                .create_edge(&source, &target)
                .map_err(|e| LinkError::at(&edge, e))?;

            tracing::debug!("Link {} ({})", link.id, edge);
            edges.push(edge);
        }
    }

    Ok(edges)
}

impl fmt::Display for LinkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} [{}] -> {}/{} [{}]",
            self.sources.system,
            self.sources.record_type,
            self.sources.ids.as_slice().join(", "),
            self.targets.system,
            self.targets.record_type,
            self.targets.ids.as_slice().join(", "),
        )
    }
}
