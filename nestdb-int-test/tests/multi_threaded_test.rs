use fake::faker::name::en::Name;
use fake::Fake;
use nestdb::doc;
use nestdb::errors::ErrorKind;
use nestdb::index::{IndexKind, IndexLookup};
use nestdb_int_test::test_util::{cleanup, create_test_context, run_test, to_error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const PER_THREAD: usize = 50;

#[test]
fn test_concurrent_inserts() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            collection.create_index("seq", IndexKind::Unique)?;
            collection.create_index("worker", IndexKind::NonUnique)?;

            let mut handles = Vec::new();
            for worker in 0..THREADS {
                let collection = collection.clone();
                handles.push(thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let name: String = Name().fake();
                        let seq = (worker * PER_THREAD + i) as i64;
                        collection.insert(doc! { seq: seq, worker: (worker as i64), name: name })?;
                    }
                    Ok::<(), nestdb::errors::NestError>(())
                }));
            }
            for handle in handles {
                handle.join().map_err(|_| to_error("worker panicked"))??;
            }

            assert_eq!(collection.size()?, (THREADS * PER_THREAD) as u64);
            for worker in 0..THREADS {
                let ids = collection.query_index("worker", &IndexLookup::eq(worker as i64))?;
                assert_eq!(ids.len(), PER_THREAD);
            }
            let ids = collection.query_index("seq", &IndexLookup::between(0i64, 99i64))?;
            assert_eq!(ids.len(), 100);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_unique_conflicts() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            collection.create_index("code", IndexKind::Unique)?;

            let violations = Arc::new(AtomicUsize::new(0));
            let mut handles = Vec::new();
            for _ in 0..THREADS {
                let collection = collection.clone();
                let violations = violations.clone();
                handles.push(thread::spawn(move || {
                    // every worker competes for the same codes
                    for code in 0..PER_THREAD {
                        match collection.insert(doc! { code: (code as i64) }) {
                            Ok(_) => {}
                            Err(e) if e.kind() == &ErrorKind::UniqueConstraintViolation => {
                                violations.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    Ok(())
                }));
            }
            for handle in handles {
                handle.join().map_err(|_| to_error("worker panicked"))??;
            }

            assert_eq!(collection.size()?, PER_THREAD as u64);
            assert_eq!(violations.load(Ordering::Relaxed), (THREADS - 1) * PER_THREAD);
            for code in 0..PER_THREAD {
                let ids = collection.query_index("code", &IndexLookup::eq(code as i64))?;
                assert_eq!(ids.len(), 1);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_readers_see_whole_writes() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection("test")?;
            collection.create_index("group", IndexKind::NonUnique)?;

            let writer = {
                let collection = collection.clone();
                thread::spawn(move || {
                    for i in 0..200i64 {
                        collection.insert(doc! { group: "g", n: i })?;
                    }
                    Ok::<(), nestdb::errors::NestError>(())
                })
            };

            // every id an index returns resolves to a stored document
            for _ in 0..50 {
                for id in collection.query_index("group", &IndexLookup::eq("g"))? {
                    assert!(collection.get_by_id(&id)?.is_some());
                }
            }
            writer.join().map_err(|_| to_error("writer panicked"))??;
            assert_eq!(collection.size()?, 200);
            Ok(())
        },
        cleanup,
    )
}
