use docrepo_core::db::open_db;
use docrepo_core::{
    DbError, Document, ManualClock, RepoError, Repository, Store, StoreConfig, SyncSummary,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn doc(value: Value) -> Document {
    Document::from_value(value).unwrap()
}

fn repo(store: &Store) -> Repository<'_> {
    Repository::try_new(store, "tasks")
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(1_000, 10)))
}

#[test]
fn synchronizing_same_entity_twice_keeps_one_document() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let tasks = repo(&store);
    let entity = doc(json!({ "id": "t1", "title": "feed cows" }));

    let first = tasks.synchronize([entity.clone()]).unwrap();
    let second = tasks
        .synchronize([entity.with("title", "feed the cows")])
        .unwrap();

    assert_eq!(first, SyncSummary { inserted: 1, updated: 0 });
    assert_eq!(second, SyncSummary { inserted: 0, updated: 1 });
    assert_eq!(tasks.count().unwrap(), 1);

    let stored = tasks.find_by_id("t1").unwrap().unwrap();
    assert_eq!(stored.get("title"), Some(&json!("feed the cows")));
    assert_eq!(stored.created(), Some(1_000));
    assert_eq!(stored.updated_at(), Some(1_010));
}

#[test]
fn entity_without_id_is_inserted_with_fresh_id() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let tasks = repo(&store);

    let summary = tasks
        .synchronize([doc(json!({ "title": "new" }))])
        .unwrap();

    assert_eq!(summary.inserted, 1);
    let all = tasks.chain().unwrap().data();
    assert_eq!(all.len(), 1);
    assert!(all[0].id().is_some());
}

#[test]
fn later_entities_see_earlier_writes() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let tasks = repo(&store);

    let summary = tasks
        .synchronize([
            doc(json!({ "id": "t1", "n": 1 })),
            doc(json!({ "id": "t1", "n": 2 })),
            doc(json!({ "id": "t2" })),
        ])
        .unwrap();

    assert_eq!(summary, SyncSummary { inserted: 2, updated: 1 });
    assert_eq!(summary.total(), 3);
    assert_eq!(
        tasks.find_by_id("t1").unwrap().unwrap().get("n"),
        Some(&json!(2))
    );
}

#[test]
fn stale_seq_on_unknown_entity_still_inserts() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let tasks = repo(&store);
    let mut entity = doc(json!({ "id": "t9" }));
    entity.seq = Some(42);

    let summary = tasks.synchronize([entity]).unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(tasks.find_by_id("t9").unwrap().unwrap().seq, Some(1));
}

#[test]
fn empty_input_changes_nothing() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let tasks = repo(&store);

    let summary = tasks.synchronize(Vec::<Document>::new()).unwrap();

    assert_eq!(summary, SyncSummary::default());
    assert_eq!(tasks.count().unwrap(), 0);
}

#[test]
fn failure_stops_run_and_keeps_earlier_entities() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    let conn = open_db(&path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_boom BEFORE INSERT ON documents
         WHEN NEW.body LIKE '%boom%'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    )
    .unwrap();

    {
        let store = Store::from_connection(conn, StoreConfig::default());
        let tasks = repo(&store);
        let result = tasks.synchronize([
            doc(json!({ "id": "a" })),
            doc(json!({ "id": "b" })),
            doc(json!({ "id": "c", "title": "boom" })),
            doc(json!({ "id": "d" })),
        ]);

        assert!(matches!(result, Err(RepoError::Db(DbError::Sqlite(_)))));
        assert_eq!(tasks.find_by_id("d").unwrap(), None);
    }

    let store = Store::open(&path, StoreConfig::default()).unwrap();
    let tasks = repo(&store);
    assert_eq!(tasks.count().unwrap(), 2);
    assert!(tasks.find_by_id("a").unwrap().is_some());
    assert!(tasks.find_by_id("b").unwrap().is_some());
    assert_eq!(tasks.find_by_id("c").unwrap(), None);
    assert_eq!(tasks.find_by_id("d").unwrap(), None);
}
