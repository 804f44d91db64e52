use nestdb::collection::{Document, NestId};
use nestdb::common::Value;
use nestdb::errors::ErrorKind;
use nestdb::{doc, val};
use nestdb_int_test::test_util::{cleanup, create_test_context, insert_test_documents, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_insert_assigns_ids() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            let first = collection.insert(doc! { name: "a" })?;
            let second = collection.insert(doc! { name: "b" })?;
            assert!(second > first);

            let stored = collection.get_by_id(&first)?.expect("inserted document");
            assert_eq!(stored.id()?, first);
            assert_eq!(stored.get("name"), Some(val!("a")));
            assert_eq!(collection.size()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_keeps_explicit_id() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            let mut document = doc! { name: "explicit" };
            document.put("_id", NestId::from(42))?;

            let id = collection.insert(document.clone())?;
            assert_eq!(id, NestId::from(42));

            let err = collection.insert(document).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
            assert_eq!(collection.size()?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_many_and_find_all() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            insert_test_documents(&collection)?;

            let all = collection.find_all()?;
            assert_eq!(all.len(), 3);
            let names: Vec<Value> = all.iter().filter_map(|d| d.get("first_name")).collect();
            assert_eq!(names, vec![val!("fn1"), val!("fn2"), val!("fn3")]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_replaces_document() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            let id = collection.insert(doc! { name: "old", age: 30 })?;

            let mut updated = collection.get_by_id(&id)?.expect("stored document");
            updated.put("name", "new")?;
            updated.remove("age");
            collection.update(updated)?;

            let stored = collection.get_by_id(&id)?.expect("updated document");
            assert_eq!(stored.get("name"), Some(val!("new")));
            assert_eq!(stored.get("age"), None);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_requires_existing_document() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;

            let err = collection.update(doc! { name: "no id" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidId);

            let mut missing = doc! { name: "missing" };
            missing.put("_id", NestId::from(7))?;
            let err = collection.update(missing).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotFound);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_upsert() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            let id = collection.upsert(doc! { name: "first" })?;

            let mut document = collection.get_by_id(&id)?.expect("upserted document");
            document.put("name", "second")?;
            assert_eq!(collection.upsert(document)?, id);

            assert_eq!(collection.size()?, 1);
            let stored = collection.get_by_id(&id)?.expect("upserted document");
            assert_eq!(stored.get("name"), Some(val!("second")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            let id = collection.insert(doc! { name: "gone" })?;

            let removed = collection.remove(&id)?.expect("removed document");
            assert_eq!(removed.get("name"), Some(val!("gone")));
            assert!(collection.get_by_id(&id)?.is_none());
            assert!(collection.remove(&id)?.is_none());
            assert_eq!(collection.size()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stored_documents_are_copies() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            let mut document = doc! { profile: { city: "Oslo" } };
            let id = collection.insert(document.clone())?;

            document.put("profile.city", "Bergen")?;
            let mut fetched = collection.get_by_id(&id)?.expect("stored document");
            fetched.put("profile.city", "Tromso")?;

            let stored = collection.get_by_id(&id)?.expect("stored document");
            assert_eq!(stored.get("profile.city"), Some(val!("Oslo")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_clear_keeps_collection() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let collection = db.collection("test")?;
            insert_test_documents(&collection)?;

            collection.clear()?;
            assert_eq!(collection.size()?, 0);
            assert!(db.has_collection("test")?);
            collection.insert(Document::new())?;
            assert_eq!(collection.size()?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_drop_collection() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let collection = db.collection("test")?;
            insert_test_documents(&collection)?;

            collection.drop()?;
            assert!(collection.is_dropped());
            assert!(!db.has_collection("test")?);

            let err = collection.size().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            let reopened = db.collection("test")?;
            assert_eq!(reopened.size()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_list_and_destroy_collections() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.collection("alpha")?;
            db.collection("beta")?.insert(doc! { x: 1 })?;

            let names: Vec<String> = db.list_collection_names()?.into_iter().collect();
            assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);

            db.destroy_collection("beta")?;
            assert!(!db.has_collection("beta")?);
            assert!(db.has_collection("alpha")?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_collection_names() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            for name in ["", "$system"] {
                let err = db.collection(name).err().expect("invalid name");
                assert_eq!(err.kind(), &ErrorKind::ValidationError);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_closed_database_refuses_work() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let collection = db.collection("test")?;
            db.close()?;
            assert!(db.is_closed()?);

            let err = collection.insert(doc! { x: 1 }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
            assert!(db.collection("test").is_err());
            Ok(())
        },
        cleanup,
    )
}
