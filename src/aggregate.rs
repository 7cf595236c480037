//! Result aggregation - turns per-anchor outcomes into output records
//!
//! Two independent flags shape the output:
//! - `emit_per_edge`: one record per individual edge (and per soft failure)
//!   instead of one consolidated record per anchor
//! - `require_all`: any soft failure fails the whole call with a single
//!   consolidated 404 and no successes
//!
//! A hard failure anywhere always wins: the output is exactly one
//! consolidated 500 record, whatever the flags say.

use serde::{Serialize, Serializer};
use crate::link::{Direction, Edge};
use crate::linker::LinkError;
use crate::lookup::{AnchorLinks, AnchorOutcome, RecordFilter};
use crate::record::RecordKey;

/// Outcome status, rendered as its HTTP-style code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 200
    Ok,
    /// 404: nothing matched; recoverable
    NotFound,
    /// 500: persistence fault; fatal to the batch
    Internal,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NotFound => 404,
            Status::Internal => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.code())
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Output shaping flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputFlags {
    pub emit_per_edge: bool,
    pub require_all: bool,
}

/// What went wrong, and under which coordinates and filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
    pub message: String,
    /// Underlying error, present for hard failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Detail for a lookup anchor
    pub fn for_anchor(key: &RecordKey, filter: &RecordFilter, direction: Direction, message: impl Into<String>) -> Self {
        Self {
            system: Some(key.system.clone()),
            record_type: Some(key.record_type.clone()),
            id: Some(key.external_id.clone()),
            direction: Some(direction),
            filter_system: filter.system().map(str::to_string),
            filter_type: filter.record_type().map(str::to_string),
            ..Self::new(message)
        }
    }

    /// Detail for a failed link batch
    pub fn for_link(error: &LinkError) -> Self {
        let detail = Self::new("failed to create links").with_cause(&error.cause);
        match &error.failed_edge {
            Some(edge) => Self {
                system: Some(edge.source.system.clone()),
                record_type: Some(edge.source.record_type.clone()),
                id: Some(edge.source.external_id.clone()),
                target_system: Some(edge.target.system.clone()),
                target_type: Some(edge.target.record_type.clone()),
                target_id: Some(edge.target.external_id.clone()),
                ..detail
            },
            None => detail,
        }
    }

    pub fn with_cause(mut self, cause: &dyn std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

/// A single detail, or the full list when failures are consolidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    One(ErrorDetail),
    Many(Vec<ErrorDetail>),
}

impl ErrorDetails {
    pub fn len(&self) -> usize {
        match self {
            ErrorDetails::One(_) => 1,
            ErrorDetails::Many(details) => details.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub status: Status,
    pub source_system: String,
    pub source_type: String,
    pub source_id: String,
    pub target_system: String,
    pub target_type: String,
    pub target_id: String,
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            status: Status::Ok,
            source_system: edge.source.system.clone(),
            source_type: edge.source.record_type.clone(),
            source_id: edge.source.external_id.clone(),
            target_system: edge.target.system.clone(),
            target_type: edge.target.record_type.clone(),
            target_id: edge.target.external_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub status: Status,
    pub system: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub record_id: String,
    pub sources: Vec<RecordKey>,
    pub targets: Vec<RecordKey>,
}

impl From<AnchorLinks> for AggregateRecord {
    fn from(links: AnchorLinks) -> Self {
        Self {
            status: Status::Ok,
            system: links.anchor.system,
            record_type: links.anchor.record_type,
            record_id: links.anchor.external_id,
            sources: links.sources,
            targets: links.targets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub status: Status,
    pub error_detail: ErrorDetails,
}

/// One record handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutputRecord {
    Edge(EdgeRecord),
    Aggregate(AggregateRecord),
    Error(ErrorRecord),
}

impl OutputRecord {
    pub fn status(&self) -> Status {
        match self {
            OutputRecord::Edge(r) => r.status,
            OutputRecord::Aggregate(r) => r.status,
            OutputRecord::Error(r) => r.status,
        }
    }

    fn error(status: Status, detail: ErrorDetails) -> Self {
        OutputRecord::Error(ErrorRecord {
            status,
            error_detail: detail,
        })
    }
}

/// Render lookup outcomes.
pub fn aggregate_lookup(outcomes: Vec<AnchorOutcome>, flags: OutputFlags) -> Vec<OutputRecord> {
    let mut errors = Vec::new();
    let mut successes = Vec::new();
    let mut hard_failure = false;

    for outcome in outcomes {
        match outcome {
            AnchorOutcome::Success(links) => successes.push(links),
            AnchorOutcome::SoftError(detail) => errors.push(detail),
            AnchorOutcome::HardError(detail) => {
                hard_failure = true;
                errors.push(detail);
            }
        }
    }

    if hard_failure {
        tracing::error!("Lookup failed: {} error(s), reporting one hard failure", errors.len());
        return vec![OutputRecord::error(Status::Internal, ErrorDetails::Many(errors))];
    }

    let mut output = Vec::new();

    if !errors.is_empty() {
        tracing::warn!("{} anchor(s) had no matching link", errors.len());
        if flags.require_all {
            return vec![OutputRecord::error(Status::NotFound, ErrorDetails::Many(errors))];
        }
        if flags.emit_per_edge {
            output.extend(
                errors
                    .into_iter()
                    .map(|detail| OutputRecord::error(Status::NotFound, ErrorDetails::One(detail))),
            );
        } else {
            output.push(OutputRecord::error(Status::NotFound, ErrorDetails::Many(errors)));
        }
    }

    for links in successes {
        if flags.emit_per_edge {
            output.extend(edges_of(&links).iter().map(|e| OutputRecord::Edge(e.into())));
        } else {
            output.push(OutputRecord::Aggregate(links.into()));
        }
    }

    output
}

/// Render the result of a link batch.
///
/// A failed batch is one 500 record. A successful one is either one edge
/// record per link or one aggregate record per distinct source listing its
/// targets.
pub fn aggregate_created(result: Result<Vec<Edge>, LinkError>, flags: OutputFlags) -> Vec<OutputRecord> {
    let edges = match result {
        Ok(edges) => edges,
        Err(e) => {
            return vec![OutputRecord::error(
                Status::Internal,
                ErrorDetails::Many(vec![ErrorDetail::for_link(&e)]),
            )];
        }
    };

    if flags.emit_per_edge {
        return edges.iter().map(|e| OutputRecord::Edge(e.into())).collect();
    }

    let mut grouped: Vec<AnchorLinks> = Vec::new();
    for edge in edges {
        match grouped.iter_mut().find(|g| g.anchor == edge.source) {
            Some(group) => group.targets.push(edge.target),
            None => grouped.push(AnchorLinks {
                anchor: edge.source,
                sources: Vec::new(),
                targets: vec![edge.target],
            }),
        }
    }
    grouped
        .into_iter()
        .map(|links| OutputRecord::Aggregate(links.into()))
        .collect()
}

/// Individual edges around an anchor: incoming first, then outgoing
fn edges_of(links: &AnchorLinks) -> Vec<Edge> {
    let incoming = links
        .sources
        .iter()
        .map(|source| Edge::new(source.clone(), links.anchor.clone()));
    let outgoing = links
        .targets
        .iter()
        .map(|target| Edge::new(links.anchor.clone(), target.clone()));
    incoming.chain(outgoing).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn key(system: &str, id: &str) -> RecordKey {
        RecordKey::new(system, "item", id).unwrap()
    }

    fn success(id: &str, targets: &[&str]) -> AnchorOutcome {
        AnchorOutcome::Success(AnchorLinks {
            anchor: key("shopify", id),
            sources: vec![key("crm", "c1")],
            targets: targets.iter().map(|t| key("catalog", t)).collect(),
        })
    }

    fn soft(id: &str) -> AnchorOutcome {
        AnchorOutcome::SoftError(ErrorDetail::for_anchor(
            &key("shopify", id),
            &RecordFilter::any(),
            Direction::Both,
            "no matching link found",
        ))
    }

    fn hard(id: &str) -> AnchorOutcome {
        AnchorOutcome::HardError(
            ErrorDetail::for_anchor(&key("shopify", id), &RecordFilter::any(), Direction::Both, "failed")
                .with_cause(&"disk I/O error"),
        )
    }

    fn flags(emit_per_edge: bool, require_all: bool) -> OutputFlags {
        OutputFlags { emit_per_edge, require_all }
    }

    fn statuses(records: &[OutputRecord]) -> Vec<u16> {
        records.iter().map(|r| r.status().code()).collect()
    }

    #[test]
    fn test_require_all_escalation() {
        for emit_per_edge in [false, true] {
            let out = aggregate_lookup(vec![success("A", &["x"]), soft("B")], flags(emit_per_edge, true));
            assert_eq!(statuses(&out), vec![404]);
            let OutputRecord::Error(record) = &out[0] else {
                panic!("expected error record");
            };
            assert_eq!(record.error_detail.len(), 1);
        }
    }

    #[test]
    fn test_soft_failure_reported_alongside_success() {
        let out = aggregate_lookup(vec![success("A", &["x"]), soft("B")], flags(false, false));
        assert_eq!(statuses(&out), vec![404, 200]);
        let OutputRecord::Aggregate(record) = &out[1] else {
            panic!("expected aggregate record");
        };
        assert_eq!(record.record_id, "A");
    }

    #[test]
    fn test_soft_failures_consolidated_unless_per_edge() {
        let outcomes = || vec![soft("A"), soft("B"), success("C", &["x"])];

        let consolidated = aggregate_lookup(outcomes(), flags(false, false));
        assert_eq!(statuses(&consolidated), vec![404, 200]);
        let OutputRecord::Error(record) = &consolidated[0] else {
            panic!("expected error record");
        };
        assert_eq!(record.error_detail.len(), 2);

        let per_edge = aggregate_lookup(outcomes(), flags(true, false));
        // two soft failures, then C's incoming and outgoing edges
        assert_eq!(statuses(&per_edge), vec![404, 404, 200, 200]);
        assert!(matches!(
            &per_edge[0],
            OutputRecord::Error(ErrorRecord { error_detail: ErrorDetails::One(_), .. })
        ));
    }

    #[test]
    fn test_hard_failure_dominates() {
        for emit_per_edge in [false, true] {
            for require_all in [false, true] {
                let out = aggregate_lookup(
                    vec![soft("A"), hard("B"), success("C", &["x"])],
                    flags(emit_per_edge, require_all),
                );
                assert_eq!(statuses(&out), vec![500]);
                let OutputRecord::Error(record) = &out[0] else {
                    panic!("expected error record");
                };
                assert_eq!(record.error_detail.len(), 2);
            }
        }
    }

    #[test]
    fn test_per_edge_provenance() {
        let out = aggregate_lookup(vec![success("A", &["x", "y"])], flags(true, false));
        assert_eq!(out.len(), 3);

        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": 200,
                "sourceSystem": "crm", "sourceType": "item", "sourceId": "c1",
                "targetSystem": "shopify", "targetType": "item", "targetId": "A",
            })
        );
        let OutputRecord::Edge(last) = &out[2] else {
            panic!("expected edge record");
        };
        assert_eq!(last.source_id, "A");
        assert_eq!(last.target_id, "y");
    }

    #[test]
    fn test_aggregate_record_shape() {
        let out = aggregate_lookup(vec![success("A", &["x"])], OutputFlags::default());
        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": 200,
                "system": "shopify", "type": "item", "recordId": "A",
                "sources": [{"system": "crm", "type": "item", "id": "c1"}],
                "targets": [{"system": "catalog", "type": "item", "id": "x"}],
            })
        );
    }

    #[test]
    fn test_error_record_shape() {
        let out = aggregate_lookup(vec![soft("B")], flags(true, false));
        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": 404,
                "errorDetail": {
                    "system": "shopify", "type": "item", "id": "B",
                    "direction": "all",
                    "message": "no matching link found",
                },
            })
        );
    }

    #[test]
    fn test_created_failure_is_single_hard_error() {
        let edge = Edge::new(key("shopify", "B"), key("catalog", "Y"));
        let err = LinkError::at(&edge, Error::Integrity("boom".into()));

        for emit_per_edge in [false, true] {
            let out = aggregate_created(Err(LinkError::at(&edge, Error::Integrity("boom".into()))), flags(emit_per_edge, false));
            assert_eq!(statuses(&out), vec![500]);
        }

        let detail = ErrorDetail::for_link(&err);
        assert_eq!(detail.id.as_deref(), Some("B"));
        assert_eq!(detail.target_id.as_deref(), Some("Y"));
        assert_eq!(detail.cause.as_deref(), Some("Data integrity fault: boom"));
    }

    #[test]
    fn test_created_success_shapes() {
        let edges = vec![
            Edge::new(key("shopify", "A"), key("catalog", "X")),
            Edge::new(key("shopify", "A"), key("catalog", "Y")),
            Edge::new(key("shopify", "B"), key("catalog", "X")),
        ];

        let per_edge = aggregate_created(Ok(edges.clone()), flags(true, false));
        assert_eq!(statuses(&per_edge), vec![200, 200, 200]);

        let grouped = aggregate_created(Ok(edges), OutputFlags::default());
        assert_eq!(grouped.len(), 2);
        let OutputRecord::Aggregate(first) = &grouped[0] else {
            panic!("expected aggregate record");
        };
        assert_eq!(first.record_id, "A");
        assert_eq!(first.targets.len(), 2);
        assert!(first.sources.is_empty());
    }
}
