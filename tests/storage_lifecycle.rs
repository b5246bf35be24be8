mod common;

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use common::{test_options, ScriptedFactory};
use rulegraph::storage::METADATA_FILE_NAME;
use rulegraph::{GraphError, PersistentGraphStore, Result};

#[test]
fn open_creates_root_and_metadata_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("g1");
    let store = PersistentGraphStore::open_with(&root, test_options())?;
    assert!(root.is_dir());
    assert!(root.join(METADATA_FILE_NAME).is_file());
    assert_eq!(store.root(), root.as_path());
    Ok(())
}

#[test]
fn storage_manager_is_created_once_and_cached() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = PersistentGraphStore::open_with(dir.path().join("g1"), test_options())?;

    assert!(store.storage_manager("orders", false)?.is_none());

    let created = store
        .storage_manager("orders", true)?
        .expect("create requested");
    let loc = created.insert(b"order-1")?;

    let cached = store
        .storage_manager("orders", false)?
        .expect("cached handle");
    assert!(Arc::ptr_eq(&created, &cached));
    assert_eq!(cached.fetch(loc)?, Some(b"order-1".to_vec()));
    Ok(())
}

#[test]
fn existing_data_is_picked_up_without_create_flag() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("g1");
    let loc = {
        let store = PersistentGraphStore::open_with(&root, test_options())?;
        let orders = store.storage_manager("orders", true)?.expect("created");
        let loc = orders.insert(b"order-1")?;
        store.close()?;
        loc
    };

    let store = PersistentGraphStore::open_with(&root, test_options())?;
    let orders = store
        .storage_manager("orders", false)?
        .expect("on-disk data exists");
    assert_eq!(orders.fetch(loc)?, Some(b"order-1".to_vec()));
    assert!(store.storage_manager("invoices", false)?.is_none());
    Ok(())
}

#[test]
fn concurrent_first_access_yields_one_handle() -> Result<()> {
    const THREADS: usize = 8;
    let dir = tempfile::tempdir()?;
    let factory = Arc::new(ScriptedFactory::default());
    let store = Arc::new(PersistentGraphStore::open_with(
        dir.path().join("g1"),
        test_options().factory(factory.clone()),
    )?);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.storage_manager("shared", true)
            })
        })
        .collect();

    let mut managers = Vec::new();
    for handle in handles {
        managers.push(handle.join().unwrap()?.expect("create requested"));
    }
    assert_eq!(factory.open_count(), 1);
    for manager in &managers[1..] {
        assert!(Arc::ptr_eq(&managers[0], manager));
    }
    Ok(())
}

#[test]
fn close_attempts_every_handle_when_one_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let factory = Arc::new(ScriptedFactory::failing(&["b"]));
    let store = PersistentGraphStore::open_with(
        dir.path().join("g1"),
        test_options().factory(factory.clone()),
    )?;
    for name in ["a", "b", "c"] {
        store.storage_manager(name, true)?;
    }

    let err = store.close().err().expect("one handle fails");
    assert_eq!(factory.close_count(), 3);
    match &err {
        GraphError::Closing(errors) => assert_eq!(errors.causes().len(), 1),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("cannot close b"));
    Ok(())
}

#[test]
fn close_reports_all_failures_with_store_name() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("g1");
    let factory = Arc::new(ScriptedFactory::failing(&["a", "b", "c"]));
    let store = PersistentGraphStore::open_with(&root, test_options().factory(factory.clone()))?;
    for name in ["a", "b", "c"] {
        store.storage_manager(name, true)?;
    }

    let message = store.close().err().expect("all handles fail").to_string();
    assert_eq!(factory.close_count(), 3);
    assert!(message.contains(store.name()));
    for name in ["a", "b", "c"] {
        assert!(message.contains(&format!("cannot close {name}")), "{message}");
    }
    assert_eq!(message.matches("; ").count(), 2);
    Ok(())
}

#[test]
fn rollback_restores_last_flushed_metadata() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("g1");
    let store = PersistentGraphStore::open_with(&root, test_options())?;
    store.metadata().insert("part", "main");
    store.flush()?;
    let flushed = fs::read(root.join(METADATA_FILE_NAME))?;

    {
        let mut metadata = store.metadata();
        metadata.insert("part", "scratch");
        metadata.remove("part", "main");
    }
    store.rollback()?;

    let metadata = store.metadata();
    assert!(metadata.contains("part", "main"));
    assert!(!metadata.contains("part", "scratch"));
    assert!(!metadata.is_dirty());
    drop(metadata);
    assert_eq!(fs::read(root.join(METADATA_FILE_NAME))?, flushed);
    Ok(())
}

#[test]
fn flush_failure_is_reported_as_flushing_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("g1");
    let store = PersistentGraphStore::open_with(&root, test_options())?;
    store.metadata().insert("part", "main");
    fs::remove_dir_all(&root)?;
    assert!(matches!(store.flush(), Err(GraphError::Flushing(_))));
    Ok(())
}
