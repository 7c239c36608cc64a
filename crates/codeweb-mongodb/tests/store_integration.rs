//! Integration tests for the document access operations.
//!
//! These tests require a MongoDB server to be running.
//! Set MONGODB_URL (default: mongodb://localhost:27017) and run with --ignored.

use bson::{doc, oid::ObjectId, Bson};
use codeweb_mongodb::{CodewebError, Connection, FindQuery, PoolConfig, SortDirection, Store};

const COLLECTION: &str = "items";

async fn setup() -> (Store, String) {
    let url = std::env::var("MONGODB_URL")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let connection = Connection::with_config(&url, PoolConfig::default())
        .await
        .expect("MongoDB should be reachable");
    let database = format!("codeweb_test_{}", ObjectId::new().to_hex());
    (Store::new(connection), database)
}

async fn teardown(store: &Store, database: &str) {
    store.connection().database(database).drop().await.unwrap();
    store.connection().close().await;
}

#[tokio::test]
#[ignore] // Only run with --ignored flag when database is available
async fn test_insert_count_delete_scenario() {
    let (store, db) = setup().await;

    store
        .insert_one(&db, COLLECTION, doc! { "email": "a@x.com" })
        .await
        .unwrap();

    let count = store
        .count(&db, COLLECTION, doc! {}, doc! { "email__eq": "a@x.com" })
        .await
        .unwrap();
    assert_eq!(count, 1);

    let deleted = store
        .delete_one(&db, COLLECTION, doc! { "email": "a@x.com" })
        .await
        .unwrap();
    assert!(deleted);

    let count = store
        .count(&db, COLLECTION, doc! {}, doc! { "email__eq": "a@x.com" })
        .await
        .unwrap();
    assert_eq!(count, 0);

    teardown(&store, &db).await;
}

#[tokio::test]
#[ignore]
async fn test_identifier_round_trip() {
    let (store, db) = setup().await;

    let id = store
        .insert_one(&db, COLLECTION, doc! { "name": "first" })
        .await
        .unwrap();
    assert_eq!(id.len(), 24);

    let found = store
        .find_many(&db, COLLECTION, FindQuery::new().filter(doc! { "_id": id.as_str() }))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_str("_id").unwrap(), id);
    assert_eq!(found[0].get_str("name").unwrap(), "first");

    let updated = store
        .update_one(&db, COLLECTION, doc! { "_id": id.as_str() }, doc! { "name": "renamed" }, false)
        .await
        .unwrap();
    assert!(updated);

    let one = store
        .find_one(&db, COLLECTION, doc! { "_id": id.as_str() })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.get_str("name").unwrap(), "renamed");

    teardown(&store, &db).await;
}

#[tokio::test]
#[ignore]
async fn test_malformed_identifier_touches_nothing() {
    let (store, db) = setup().await;

    store
        .insert_one(&db, COLLECTION, doc! { "name": "keep" })
        .await
        .unwrap();

    let err = store
        .delete_many(&db, COLLECTION, doc! { "_id": "not-an-id" })
        .await
        .unwrap_err();
    assert!(matches!(err, CodewebError::Conversion { .. }));

    let err = store
        .find_many(&db, COLLECTION, FindQuery::new().condition("_id", "not-an-id"))
        .await
        .unwrap_err();
    assert!(err.is_conversion());

    let count = store.count(&db, COLLECTION, doc! {}, doc! {}).await.unwrap();
    assert_eq!(count, 1);

    teardown(&store, &db).await;
}

#[tokio::test]
#[ignore]
async fn test_insert_many_preserves_order() {
    let (store, db) = setup().await;

    let ids = store
        .insert_many(
            &db,
            COLLECTION,
            vec![doc! { "n": 1 }, doc! { "n": 2 }],
        )
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    for (expected, id) in [1, 2].iter().zip(&ids) {
        let doc = store
            .find_one(&db, COLLECTION, doc! { "_id": id.as_str() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.get_i32("n").unwrap(), *expected);
    }

    let empty = store.insert_many(&db, COLLECTION, Vec::new()).await.unwrap();
    assert!(empty.is_empty());

    teardown(&store, &db).await;
}

#[tokio::test]
#[ignore]
async fn test_update_one_upsert() {
    let (store, db) = setup().await;

    let modified = store
        .update_one(&db, COLLECTION, doc! { "email": "b@x.com" }, doc! { "name": "B" }, false)
        .await
        .unwrap();
    assert!(!modified);
    assert_eq!(store.count(&db, COLLECTION, doc! {}, doc! {}).await.unwrap(), 0);

    let upserted = store
        .update_one(&db, COLLECTION, doc! { "email": "b@x.com" }, doc! { "name": "B" }, true)
        .await
        .unwrap();
    assert!(upserted);

    let doc = store
        .find_one(&db, COLLECTION, doc! { "name": "B" })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.get_str("name").unwrap(), "B");
    // upserted document satisfies the filter and carries the update fields
    assert_eq!(doc.get_str("email").unwrap(), "b@x.com");
    assert!(matches!(doc.get("_id"), Some(Bson::String(_))));

    teardown(&store, &db).await;
}

#[tokio::test]
#[ignore]
async fn test_update_many_and_delete_many() {
    let (store, db) = setup().await;

    store
        .insert_many(
            &db,
            COLLECTION,
            vec![
                doc! { "group": "a", "flag": false },
                doc! { "group": "a", "flag": false },
                doc! { "group": "b", "flag": false },
            ],
        )
        .await
        .unwrap();

    let modified = store
        .update_many(&db, COLLECTION, doc! { "group": "a" }, doc! { "flag": true })
        .await
        .unwrap();
    assert_eq!(modified, 2);

    let none = store
        .delete_many(&db, COLLECTION, doc! { "group": "zzz" })
        .await
        .unwrap();
    assert_eq!(none, 0);

    let removed = store
        .delete_many(&db, COLLECTION, doc! { "flag": true })
        .await
        .unwrap();
    assert_eq!(removed, 2);

    teardown(&store, &db).await;
}

#[tokio::test]
#[ignore]
async fn test_find_many_sort_skip_limit_and_merge() {
    let (store, db) = setup().await;

    let docs = (1..=5).map(|n| doc! { "n": n, "kind": "x" }).collect();
    store.insert_many(&db, COLLECTION, docs).await.unwrap();

    let page = store
        .find_many(
            &db,
            COLLECTION,
            FindQuery::new()
                .sort("n", SortDirection::Desc)
                .skip(1)
                .limit(2)
                .projection(doc! { "kind": 0 }),
        )
        .await
        .unwrap();
    let ns: Vec<i32> = page.iter().map(|d| d.get_i32("n").unwrap()).collect();
    assert_eq!(ns, vec![4, 3]);
    assert!(page.iter().all(|d| !d.contains_key("kind")));
    assert!(page.iter().all(|d| matches!(d.get("_id"), Some(Bson::String(_)))));

    // simplified condition overrides the raw filter on the same field
    let merged = store
        .find_many(
            &db,
            COLLECTION,
            FindQuery::new().filter(doc! { "n": 1 }).condition("n__eq", 2),
        )
        .await
        .unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].get_i32("n").unwrap(), 2);

    teardown(&store, &db).await;
}

#[tokio::test]
#[ignore]
async fn test_aggregate_and_distinct() {
    let (store, db) = setup().await;

    store
        .insert_many(
            &db,
            COLLECTION,
            vec![
                doc! { "tag": "rust", "n": 1 },
                doc! { "tag": "rust", "n": 2 },
                doc! { "tag": "go", "n": 3 },
            ],
        )
        .await
        .unwrap();

    let groups = store
        .aggregate(
            &db,
            COLLECTION,
            vec![
                doc! { "$group": { "_id": "$tag", "total": { "$sum": "$n" } } },
                doc! { "$sort": { "_id": 1 } },
            ],
        )
        .await
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].get_str("_id").unwrap(), "go");
    assert_eq!(groups[1].get_i32("total").unwrap(), 3);

    let mut tags = store
        .distinct(&db, COLLECTION, "tag", doc! {}, doc! { "n__gte": 2 })
        .await
        .unwrap();
    tags.sort_by_key(|b| b.as_str().map(str::to_string));
    assert_eq!(tags, vec![Bson::from("go"), Bson::from("rust")]);

    // group keys of any type come back as strings
    let totals = store
        .aggregate(
            &db,
            COLLECTION,
            vec![doc! { "$group": { "_id": Bson::Null, "total": { "$sum": "$n" } } }],
        )
        .await
        .unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].get_str("_id").unwrap(), "null");
    assert_eq!(totals[0].get_i32("total").unwrap(), 6);

    let by_n = store
        .aggregate(
            &db,
            COLLECTION,
            vec![
                doc! { "$group": { "_id": "$n" } },
                doc! { "$sort": { "_id": 1 } },
            ],
        )
        .await
        .unwrap();
    let keys: Vec<&str> = by_n.iter().map(|d| d.get_str("_id").unwrap()).collect();
    assert_eq!(keys, vec!["1", "2", "3"]);

    let ids = store
        .distinct(&db, COLLECTION, "_id", doc! {}, doc! {})
        .await
        .unwrap();
    assert!(ids.iter().all(|id| matches!(id, Bson::String(_))));

    teardown(&store, &db).await;
}

#[tokio::test]
#[ignore]
async fn test_close_is_idempotent() {
    let (store, db) = setup().await;
    teardown(&store, &db).await;

    assert!(store.connection().is_closed());
    store.connection().close().await;
    assert!(store.connection().is_closed());
}
