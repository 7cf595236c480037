//! Several connections (standing in for separate processes) racing on the
//! same database file.

use reclink::linker::{BatchLinker, LinkRequest};
use reclink::record::RecordSet;
use reclink::{IdList, IdentityResolver, RecordKey, SqliteStore, TenantId};

const WORKERS: usize = 8;

#[test]
fn concurrent_resolution_yields_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("links.db");
    SqliteStore::open(&path).unwrap();

    let tenant = TenantId::new("acme").unwrap();
    let key = RecordKey::new("shopify", "order", "1001").unwrap();

    let ids: Vec<i64> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                s.spawn(|| {
                    let store = SqliteStore::open(&path).unwrap();
                    IdentityResolver::new(&store).resolve_key(&tenant, &key).unwrap().id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(ids.len(), WORKERS);
    assert!(ids.iter().all(|id| *id == ids[0]));

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.count_records(None).unwrap(), 1);
}

#[test]
fn concurrent_batches_never_duplicate_links() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("links.db");
    SqliteStore::open(&path).unwrap();

    let request = LinkRequest::new(
        TenantId::new("acme").unwrap(),
        RecordSet::new("shopify", "order", IdList::new(["A", "B"]).unwrap()).unwrap(),
        RecordSet::new("catalog", "product", IdList::new(["X", "Y"]).unwrap()).unwrap(),
    );

    std::thread::scope(|s| {
        for _ in 0..WORKERS {
            s.spawn(|| {
                let mut store = SqliteStore::open(&path).unwrap();
                let edges = BatchLinker::new(&mut store).create_links(&request).unwrap();
                assert_eq!(edges.len(), 4);
            });
        }
    });

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.count_links(None).unwrap(), 4);
    assert_eq!(store.count_records(None).unwrap(), 4);
}
