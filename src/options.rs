//! Per-call options and their validation into a command
//!
//! [`LinkOptions`] is the typed form of the options document the calling
//! layer supplies (JSON or TOML, camelCase keys). It is validated once into
//! a [`LinkCommand`]; nothing past that point sees unvalidated input.

use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::aggregate::{self, OutputFlags, OutputRecord};
use crate::link::Direction;
use crate::linker::{BatchLinker, LinkRequest};
use crate::lookup::{LookupEngine, LookupRequest, RecordFilter};
use crate::record::{IdList, RecordSet, TenantId};
use crate::storage::SqliteStore;

/// Options for one call.
///
/// `system`/`type`/`externalId` name the source records when creating links
/// and the anchors when looking up. `externalId` and `targetId` accept a
/// single id or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkOptions {
    pub system: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub external_id: IdList,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<IdList>,

    /// Create links instead of looking them up. Default: false
    #[serde(default)]
    pub create_link: bool,
    /// Lookup direction. Default: `all`
    #[serde(default)]
    pub direction: Direction,
    /// One output record per edge. Default: false
    #[serde(default)]
    pub emit_per_edge: bool,
    /// Fail the whole lookup if any anchor has no match. Default: false
    #[serde(default)]
    pub require_all: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
}

impl LinkOptions {
    /// Options for a lookup with every flag at its default
    pub fn lookup(system: impl Into<String>, record_type: impl Into<String>, ids: IdList) -> Self {
        Self {
            system: system.into(),
            record_type: record_type.into(),
            external_id: ids,
            target_system: None,
            target_type: None,
            target_id: None,
            create_link: false,
            direction: Direction::default(),
            emit_per_edge: false,
            require_all: false,
            filter_system: None,
            filter_type: None,
        }
    }

    pub fn flags(&self) -> OutputFlags {
        OutputFlags {
            emit_per_edge: self.emit_per_edge,
            require_all: self.require_all,
        }
    }

    /// Validate into a command for `tenant`
    pub fn into_command(self, tenant: TenantId) -> Result<LinkCommand> {
        let flags = self.flags();
        let records = RecordSet::new(self.system, self.record_type, self.external_id)?;

        if self.create_link {
            let (Some(target_system), Some(target_type), Some(target_ids)) =
                (self.target_system, self.target_type, self.target_id)
            else {
                return Err(Error::invalid(
                    "createLink requires targetSystem, targetType and targetId",
                ));
            };
            if self.filter_system.is_some() || self.filter_type.is_some() {
                tracing::debug!("Ignoring lookup filters in createLink mode");
            }
            let targets = RecordSet::new(target_system, target_type, target_ids)?;
            return Ok(LinkCommand::Create {
                request: LinkRequest::new(tenant, records, targets),
                flags,
            });
        }

        let filter = RecordFilter::new(self.filter_system, self.filter_type)?;
        Ok(LinkCommand::Lookup {
            request: LookupRequest {
                tenant,
                anchors: records,
                filter,
                direction: self.direction,
            },
            flags,
        })
    }
}

/// A validated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    Create { request: LinkRequest, flags: OutputFlags },
    Lookup { request: LookupRequest, flags: OutputFlags },
}

impl LinkCommand {
    /// Execute against `store` and render the output records
    pub fn run(&self, store: &mut SqliteStore) -> Vec<OutputRecord> {
        match self {
            LinkCommand::Create { request, flags } => {
                let result = BatchLinker::new(store).create_links(request);
                aggregate::aggregate_created(result, *flags)
            }
            LinkCommand::Lookup { request, flags } => {
                let outcomes = LookupEngine::new(&*store).lookup(request);
                aggregate::aggregate_lookup(outcomes, *flags)
            }
        }
    }
}

/// Validate `options` for `tenant` and run them
pub fn run(store: &mut SqliteStore, tenant: TenantId, options: LinkOptions) -> Result<Vec<OutputRecord>> {
    let command = options.into_command(tenant)?;
    Ok(command.run(store))
}
