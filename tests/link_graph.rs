//! End-to-end behaviour through the options boundary.

use reclink::aggregate::{self, ErrorDetails, OutputRecord, Status};
use reclink::link::{Link, Side};
use reclink::lookup::{LookupEngine, LookupRequest, RecordFilter};
use reclink::options::{self, LinkOptions};
use reclink::record::{Record, RecordSet};
use reclink::{Direction, Error, IdList, LinkStore, OutputFlags, RecordKey, Result, SqliteStore, TenantId};

fn tenant() -> TenantId {
    TenantId::new("acme").unwrap()
}

fn options(json: &str) -> LinkOptions {
    serde_json::from_str(json).unwrap()
}

fn statuses(records: &[OutputRecord]) -> Vec<u16> {
    records.iter().map(|r| r.status().code()).collect()
}

#[test]
fn round_trip_through_a_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SqliteStore::open(&dir.path().join("links.db")).unwrap();

    let created = options::run(
        &mut store,
        tenant(),
        options(
            r#"{"system": "sys1", "type": "typeA", "externalId": "1",
                "targetSystem": "sys2", "targetType": "typeB", "targetId": "2",
                "createLink": true}"#,
        ),
    )
    .unwrap();
    assert_eq!(statuses(&created), vec![200]);

    let found = options::run(
        &mut store,
        tenant(),
        options(
            r#"{"system": "sys1", "type": "typeA", "externalId": "1",
                "direction": "target", "filterSystem": "sys2", "filterType": "typeB"}"#,
        ),
    )
    .unwrap();

    let json = serde_json::to_value(&found).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{
            "status": 200,
            "system": "sys1", "type": "typeA", "recordId": "1",
            "sources": [],
            "targets": [{"system": "sys2", "type": "typeB", "id": "2"}],
        }])
    );
}

#[test]
fn require_all_escalation() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    options::run(
        &mut store,
        tenant(),
        options(
            r#"{"system": "shopify", "type": "order", "externalId": "A",
                "targetSystem": "catalog", "targetType": "product", "targetId": "X",
                "createLink": true}"#,
        ),
    )
    .unwrap();

    let strict = options::run(
        &mut store,
        tenant(),
        options(r#"{"system": "shopify", "type": "order", "externalId": ["A", "B"], "requireAll": true}"#),
    )
    .unwrap();
    assert_eq!(statuses(&strict), vec![404]);

    let lenient = options::run(
        &mut store,
        tenant(),
        options(r#"{"system": "shopify", "type": "order", "externalId": ["A", "B"]}"#),
    )
    .unwrap();
    assert_eq!(statuses(&lenient), vec![404, 200]);
    let OutputRecord::Error(error) = &lenient[0] else {
        panic!("expected error record first");
    };
    let ErrorDetails::Many(details) = &error.error_detail else {
        panic!("expected consolidated details");
    };
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].id.as_deref(), Some("B"));
}

#[test]
fn per_edge_lookup_keeps_provenance() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    options::run(
        &mut store,
        tenant(),
        options(
            r#"{"system": "shopify", "type": "order", "externalId": "A",
                "targetSystem": "catalog", "targetType": "product", "targetId": ["X", "Y"],
                "createLink": true}"#,
        ),
    )
    .unwrap();

    let out = options::run(
        &mut store,
        tenant(),
        options(r#"{"system": "shopify", "type": "order", "externalId": "A", "emitPerEdge": true}"#),
    )
    .unwrap();

    let targets: Vec<String> = out
        .iter()
        .map(|r| match r {
            OutputRecord::Edge(edge) => edge.target_id.clone(),
            other => panic!("unexpected record {:?}", other),
        })
        .collect();
    assert_eq!(targets, vec!["X", "Y"]);
}

#[test]
fn tenants_do_not_see_each_other() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    options::run(
        &mut store,
        tenant(),
        options(
            r#"{"system": "shopify", "type": "order", "externalId": "A",
                "targetSystem": "catalog", "targetType": "product", "targetId": "X",
                "createLink": true}"#,
        ),
    )
    .unwrap();

    let other = options::run(
        &mut store,
        TenantId::new("globex").unwrap(),
        options(r#"{"system": "shopify", "type": "order", "externalId": "A"}"#),
    )
    .unwrap();
    assert_eq!(statuses(&other), vec![404]);
}

/// Real store, except resolving the anchor named `broken` fails.
struct BrokenAnchor<'a> {
    inner: &'a SqliteStore,
    broken: &'static str,
}

impl LinkStore for BrokenAnchor<'_> {
    fn resolve_or_create(&self, tenant: &TenantId, key: &RecordKey) -> Result<Record> {
        if key.external_id == self.broken {
            return Err(Error::Integrity("database disk image is malformed".into()));
        }
        self.inner.resolve_or_create(tenant, key)
    }

    fn create_edge(&self, source: &Record, target: &Record) -> Result<Link> {
        self.inner.create_edge(source, target)
    }

    fn query_edges(&self, anchor: &Record, side: Side, filter: &RecordFilter) -> Result<Vec<Record>> {
        self.inner.query_edges(anchor, side, filter)
    }
}

#[test]
fn hard_failure_dominates_soft_failure() {
    let store = SqliteStore::open_in_memory().unwrap();
    let broken = BrokenAnchor { inner: &store, broken: "B" };

    let request = LookupRequest {
        tenant: tenant(),
        anchors: RecordSet::new("shopify", "order", IdList::new(["A", "B"]).unwrap()).unwrap(),
        filter: RecordFilter::any(),
        direction: Direction::Both,
    };
    let outcomes = LookupEngine::new(&broken).lookup(&request);
    assert_eq!(outcomes[0].status(), Status::NotFound);
    assert_eq!(outcomes[1].status(), Status::Internal);

    for emit_per_edge in [false, true] {
        for require_all in [false, true] {
            let out = aggregate::aggregate_lookup(outcomes.clone(), OutputFlags { emit_per_edge, require_all });
            assert_eq!(statuses(&out), vec![500]);
        }
    }
}
