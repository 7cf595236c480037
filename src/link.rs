//! Link types - directed edges between record identities
//!
//! A link always points source → target. Looking a record up by
//! direction means:
//! - `Sources`: records linking *to* the anchor (incoming)
//! - `Targets`: records the anchor links *to* (outgoing)
//! - `Both`: each of the above, reported separately

use crate::record::RecordKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Traversal direction for a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Follow incoming links (other → anchor)
    #[serde(rename = "source", alias = "sources")]
    Sources,
    /// Follow outgoing links (anchor → other)
    #[serde(rename = "target", alias = "targets")]
    Targets,
    /// Follow both, independently
    #[default]
    #[serde(rename = "all", alias = "both")]
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sources => "source",
            Direction::Targets => "target",
            Direction::Both => "all",
        }
    }

    pub fn all() -> &'static [Direction] {
        &[Direction::Sources, Direction::Targets, Direction::Both]
    }

    /// The link endpoints this direction traverses, sources first
    pub fn sides(&self) -> &'static [Side] {
        match self {
            Direction::Sources => &[Side::Source],
            Direction::Targets => &[Side::Target],
            Direction::Both => &[Side::Source, Side::Target],
        }
    }
}

impl FromStr for Direction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "source" | "sources" | "incoming" | "in" => Ok(Direction::Sources),
            "target" | "targets" | "outgoing" | "out" => Ok(Direction::Targets),
            "all" | "both" => Ok(Direction::Both),
            _ => Err(crate::Error::invalid(format!("Unknown direction: {}", s))),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One endpoint role relative to an anchor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The other record is the link's source (incoming to the anchor)
    Source,
    /// The other record is the link's target (outgoing from the anchor)
    Target,
}

/// A persisted link row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub source_record_id: i64,
    pub target_record_id: i64,
    pub created_at: DateTime<Utc>,
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.source_record_id == other.source_record_id
            && self.target_record_id == other.target_record_id
    }
}

impl Eq for Link {}

/// A link described by the coordinates of both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: RecordKey,
    pub target: RecordKey,
}

impl Edge {
    pub fn new(source: RecordKey, target: RecordKey) -> Self {
        Self { source, target }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}
