//! Record identity - tenant-scoped identity for a record in an external system
//!
//! Text form of a key: `<system>/<type>/<external-id>`
//!
//! Examples:
//! - `shopify/order/1001`
//! - `catalog/product/SKU-77/blue` (the external id keeps any further slashes)

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-supplied partition key owning every record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::invalid("tenant must not be empty"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity coordinates of an external record: (system, type, external id).
///
/// Serializes as `{system, type, id}`, the shape used in lookup results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// External system the record lives in
    pub system: String,
    /// Record type within that system
    #[serde(rename = "type")]
    pub record_type: String,
    /// Identifier assigned by the external system
    #[serde(rename = "id")]
    pub external_id: String,
}

impl RecordKey {
    /// Create a key, rejecting empty coordinates
    pub fn new(
        system: impl Into<String>,
        record_type: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Result<Self> {
        let key = Self {
            system: system.into(),
            record_type: record_type.into(),
            external_id: external_id.into(),
        };
        key.validate()?;
        Ok(key)
    }

    /// Check that every coordinate is non-empty
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("system", &self.system),
            ("type", &self.record_type),
            ("external id", &self.external_id),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }

    /// Parse `<system>/<type>/<external-id>`
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.splitn(3, '/');
        let system = parts.next().unwrap_or_default();
        let record_type = parts
            .next()
            .ok_or_else(|| Error::invalid(format!("record key must be system/type/id: {}", text)))?;
        let external_id = parts
            .next()
            .ok_or_else(|| Error::invalid(format!("record key must be system/type/id: {}", text)))?;
        Self::new(system, record_type, external_id)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.system, self.record_type, self.external_id)
    }
}

impl FromStr for RecordKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A persisted record identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned row id
    pub id: i64,
    pub tenant_id: TenantId,
    pub key: RecordKey,
    pub created_at: DateTime<Utc>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}

/// Non-empty, ordered list of external ids.
///
/// Deserializes from a scalar (`"42"` or `42`) or a sequence of them, so the
/// batch and single-id forms of an input look the same to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdList(Vec<String>);

impl IdList {
    pub fn new<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(Error::invalid("id list must not be empty"));
        }
        if ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::invalid("external id must not be empty"));
        }
        Ok(Self(ids))
    }

    pub fn single(id: impl Into<String>) -> Result<Self> {
        Self::new([id.into()])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a IdList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Records of one system and type, addressed by a list of external ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    pub system: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub ids: IdList,
}

impl RecordSet {
    pub fn new(system: impl Into<String>, record_type: impl Into<String>, ids: IdList) -> Result<Self> {
        let set = Self {
            system: system.into(),
            record_type: record_type.into(),
            ids,
        };
        // Validate system/type once against the first id
        set.key_for(&set.ids.as_slice()[0])?;
        Ok(set)
    }

    /// Key for one id of this set
    pub fn key_for(&self, external_id: &str) -> Result<RecordKey> {
        RecordKey::new(self.system.clone(), self.record_type.clone(), external_id)
    }

    /// Keys for every id, in input order
    pub fn keys(&self) -> Result<Vec<RecordKey>> {
        self.ids.iter().map(|id| self.key_for(id)).collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarId {
    Text(String),
    Int(i64),
}

impl From<ScalarId> for String {
    fn from(value: ScalarId) -> Self {
        match value {
            ScalarId::Text(s) => s,
            ScalarId::Int(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(ScalarId),
    Many(Vec<ScalarId>),
}

impl<'de> Deserialize<'de> for IdList {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let ids: Vec<String> = match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(id) => vec![id.into()],
            OneOrMany::Many(ids) => ids.into_iter().map(Into::into).collect(),
        };
        IdList::new(ids).map_err(serde::de::Error::custom)
    }
}
