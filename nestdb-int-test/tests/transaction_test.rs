use nestdb::collection::NestCollection;
use nestdb::doc;
use nestdb::errors::{ErrorKind, NestResult};
use nestdb::index::{IndexKind, IndexLookup};
use nestdb::store::NestMapProvider;
use nestdb_int_test::test_util::{cleanup, create_test_context, run_test};

fn indexed_collection(ctx: &nestdb_int_test::test_util::TestContext) -> NestResult<NestCollection> {
    let collection = ctx.db().collection("accounts")?;
    collection.create_index("email", IndexKind::Unique)?;
    collection.create_index("phone", IndexKind::Unique)?;
    collection.create_index("login", IndexKind::Unique)?;
    collection.create_index("city", IndexKind::NonUnique)?;
    Ok(collection)
}

#[test]
fn test_violation_on_last_index_leaves_nothing() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = indexed_collection(&ctx)?;
            collection.insert(doc! { email: "a@x.org", phone: "1", login: "alice", city: "Oslo" })?;

            // email and phone are new, only login collides
            let err = collection
                .insert(doc! { email: "b@x.org", phone: "2", login: "alice", city: "Bergen" })
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);

            assert_eq!(collection.size()?, 1);
            assert!(collection.query_index("email", &IndexLookup::eq("b@x.org"))?.is_empty());
            assert!(collection.query_index("phone", &IndexLookup::eq("2"))?.is_empty());
            assert!(collection.query_index("city", &IndexLookup::eq("Bergen"))?.is_empty());
            assert_eq!(collection.query_index("login", &IndexLookup::eq("alice"))?.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_update_keeps_previous_state() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = indexed_collection(&ctx)?;
            collection.insert(doc! { email: "a@x.org", phone: "1", login: "alice", city: "Oslo" })?;
            let bob = collection.insert(doc! { email: "b@x.org", phone: "2", login: "bob", city: "Bergen" })?;

            let mut document = collection.get_by_id(&bob)?.expect("stored document");
            document.put("email", "new@x.org")?;
            document.put("city", "Tromso")?;
            document.put("login", "alice")?;
            let err = collection.update(document).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);

            let stored = collection.get_by_id(&bob)?.expect("stored document");
            assert_eq!(stored.get("email"), Some("b@x.org".into()));
            assert_eq!(collection.query_index("email", &IndexLookup::eq("b@x.org"))?, vec![bob]);
            assert!(collection.query_index("email", &IndexLookup::eq("new@x.org"))?.is_empty());
            assert_eq!(collection.query_index("city", &IndexLookup::eq("Bergen"))?, vec![bob]);
            assert!(collection.query_index("city", &IndexLookup::eq("Tromso"))?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_many_is_all_or_nothing() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = indexed_collection(&ctx)?;

            let err = collection
                .insert_many(vec![
                    doc! { email: "a@x.org", login: "a" },
                    doc! { email: "b@x.org", login: "b" },
                    doc! { email: "a@x.org", login: "c" },
                ])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
            assert_eq!(collection.size()?, 0);
            assert!(collection.query_index("login", &IndexLookup::eq("a"))?.is_empty());

            let ids = collection.insert_many(vec![
                doc! { email: "a@x.org", login: "a" },
                doc! { email: "b@x.org", login: "b" },
            ])?;
            assert_eq!(ids.len(), 2);
            assert_eq!(collection.size()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unchanged_indexed_value_is_not_a_conflict() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = indexed_collection(&ctx)?;
            let id = collection.insert(doc! { email: "a@x.org", login: "alice" })?;

            let mut document = collection.get_by_id(&id)?.expect("stored document");
            document.put("note", "only this changes")?;
            collection.update(document)?;

            assert_eq!(collection.query_index("email", &IndexLookup::eq("a@x.org"))?, vec![id]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_uncommitted_transaction_is_discarded() {
    run_test(
        create_test_context,
        |ctx| {
            let store = ctx.db().store();
            let mut tx = store.begin();
            tx.put("scratch", vec![1], vec![1]);
            assert_eq!(tx.get("scratch", &[1])?, Some(vec![1]));
            tx.rollback();

            assert!(!store.has_map("scratch")? || store.open_map("scratch")?.is_empty()?);

            let mut tx = store.begin();
            tx.put("scratch", vec![2], vec![2]);
            tx.commit()?;
            assert_eq!(store.open_map("scratch")?.get(&[2])?, Some(vec![2]));
            Ok(())
        },
        cleanup,
    )
}
