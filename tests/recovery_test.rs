//! Tests de recuperación tras reinicio
//! tests/recovery_test.rs
//!
//! Simulan caídas cerrando el Dispatcher y reabriendo los mismos archivos.

use dispatch_server::jobs::snapshot::{Snapshot, SnapshotFile};
use dispatch_server::jobs::{Dispatcher, DispatcherConfig, JobStatus};
use std::fs;
use std::path::Path;

fn reopen(config: &DispatcherConfig) -> Dispatcher {
    Dispatcher::open(config).expect("reopen dispatcher")
}

/// Tabla y snapshot en directorios separados, para poder romper uno solo
fn split_config(root: &Path) -> DispatcherConfig {
    let mut config = DispatcherConfig::in_dir(root);
    config.db_path = root.join("db").join("requests.json");
    config.snapshot_path = root.join("queue").join("request_queue.json");
    fs::create_dir_all(root.join("db")).unwrap();
    fs::create_dir_all(root.join("queue")).unwrap();
    config
}

/// Todos los jobs `pending` no entregados están en la cola
fn assert_pending_rows_queued(dispatcher: &Dispatcher, ids: &[u64]) {
    for &id in ids {
        if matches!(dispatcher.read(id), Ok(record) if record.status == JobStatus::Pending) {
            assert!(dispatcher.queue().ids().contains(&id), "job {} stranded", id);
        }
    }
}

#[test]
fn test_restart_preserves_pending_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatcherConfig::in_dir(dir.path());

    {
        let dispatcher = reopen(&config);
        for text in ["a", "b", "c"] {
            dispatcher.submit(text).unwrap();
        }
    }

    let dispatcher = reopen(&config);
    assert_eq!(dispatcher.queue().ids(), vec![1, 2, 3]);
    assert_eq!(dispatcher.fetch_next().unwrap().unwrap().text, "a");
}

#[test]
fn test_fetched_job_not_redelivered_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatcherConfig::in_dir(dir.path());

    {
        let dispatcher = reopen(&config);
        dispatcher.submit("a").unwrap();
        dispatcher.submit("b").unwrap();
        // Worker toma "a" y nunca reporta
        assert_eq!(dispatcher.fetch_next().unwrap().unwrap().id, 1);
    }

    let dispatcher = reopen(&config);
    assert_eq!(dispatcher.queue().ids(), vec![2]);

    // Sigue pendiente en el store, consultable
    assert_eq!(dispatcher.read(1).unwrap().status, JobStatus::Pending);
}

#[test]
fn test_ids_continue_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatcherConfig::in_dir(dir.path());

    {
        let dispatcher = reopen(&config);
        dispatcher.submit("a").unwrap();
        dispatcher.submit("b").unwrap();
    }

    let dispatcher = reopen(&config);
    assert_eq!(dispatcher.submit("c").unwrap(), 3);
    assert_eq!(dispatcher.queue().ids(), vec![1, 2, 3]);
}

#[test]
fn test_orphaned_job_readmitted() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatcherConfig::in_dir(dir.path());

    {
        let dispatcher = reopen(&config);
        dispatcher.submit("a").unwrap();
        dispatcher.submit("b").unwrap();
    }

    // Snapshot más viejo que la tabla
    SnapshotFile::new(&config.snapshot_path)
        .write(&Snapshot::new(1, vec![1]))
        .unwrap();

    let (dispatcher, report) = Dispatcher::open_with_report(&config).unwrap();
    assert_eq!(report.restored, vec![1]);
    assert_eq!(report.readmitted, vec![2]);
    assert_eq!(dispatcher.queue().ids(), vec![1, 2]);
}

#[test]
fn test_stale_snapshot_entries_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatcherConfig::in_dir(dir.path());

    {
        let dispatcher = reopen(&config);
        dispatcher.submit("a").unwrap();
        dispatcher.submit("b").unwrap();
        dispatcher.complete(1, "done").unwrap();
    }

    // Snapshot con un id completado, uno desconocido y uno repetido
    SnapshotFile::new(&config.snapshot_path)
        .write(&Snapshot::new(2, vec![1, 99, 2, 2]))
        .unwrap();

    let (dispatcher, report) = Dispatcher::open_with_report(&config).unwrap();
    assert_eq!(report.restored, vec![2]);
    assert_eq!(report.dropped, vec![1, 99, 2]);
    assert!(report.readmitted.is_empty());
    assert_eq!(dispatcher.queue().ids(), vec![2]);

    // El snapshot se reescribe limpio
    let on_disk = SnapshotFile::new(&config.snapshot_path).load().unwrap().unwrap();
    assert_eq!(on_disk.pending, vec![2]);
}

#[test]
fn test_missing_snapshot_readmits_all_pending() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatcherConfig::in_dir(dir.path());

    {
        let dispatcher = reopen(&config);
        dispatcher.submit("a").unwrap();
        dispatcher.submit("b").unwrap();
        dispatcher.complete(2, "done").unwrap();
    }

    std::fs::remove_file(&config.snapshot_path).unwrap();

    let dispatcher = reopen(&config);
    assert_eq!(dispatcher.queue().ids(), vec![1]);
}

#[test]
fn test_corrupt_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatcherConfig::in_dir(dir.path());

    drop(reopen(&config));
    std::fs::write(&config.snapshot_path, b"{not json").unwrap();

    assert!(Dispatcher::open(&config).is_err());
}

// ==================== Fallos de escritura en submit ====================

#[test]
fn test_failed_snapshot_leaves_no_job() {
    let dir = tempfile::tempdir().unwrap();
    let config = split_config(dir.path());
    let queue_dir = dir.path().join("queue");

    {
        let dispatcher = reopen(&config);
        fs::remove_dir_all(&queue_dir).unwrap();
        assert!(dispatcher.submit("a").is_err());
        assert_eq!(dispatcher.stats().unwrap().jobs_total, 0);

        fs::create_dir_all(&queue_dir).unwrap();
        assert_eq!(dispatcher.submit("b").unwrap(), 1);
    }

    let dispatcher = reopen(&config);
    assert_eq!(dispatcher.queue().ids(), vec![1]);
    assert_pending_rows_queued(&dispatcher, &[1, 2]);

    let job = dispatcher.fetch_next().unwrap().unwrap();
    assert_eq!((job.id, job.text.as_str()), (1, "b"));
}

#[test]
fn test_failed_insert_removes_queued_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = split_config(dir.path());
    let db_dir = dir.path().join("db");

    {
        let dispatcher = reopen(&config);
        dispatcher.submit("a").unwrap();

        fs::remove_dir_all(&db_dir).unwrap();
        assert!(dispatcher.submit("b").is_err());
        assert_eq!(dispatcher.queue().ids(), vec![1]);

        let on_disk = SnapshotFile::new(&config.snapshot_path).load().unwrap().unwrap();
        assert_eq!(on_disk.pending, vec![1]);

        fs::create_dir_all(&db_dir).unwrap();
        assert_eq!(dispatcher.submit("c").unwrap(), 2);
    }

    let dispatcher = reopen(&config);
    assert_eq!(dispatcher.queue().ids(), vec![1, 2]);
    assert_eq!(dispatcher.read(2).unwrap().text, "c");
    assert_pending_rows_queued(&dispatcher, &[1, 2]);
}

#[test]
fn test_snapshot_id_without_row_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatcherConfig::in_dir(dir.path());

    {
        let dispatcher = reopen(&config);
        dispatcher.submit("a").unwrap();
    }

    // Caída entre el snapshot de "b" y su insert
    SnapshotFile::new(&config.snapshot_path)
        .write(&Snapshot::new(2, vec![1, 2]))
        .unwrap();

    let (dispatcher, report) = Dispatcher::open_with_report(&config).unwrap();
    assert_eq!(report.dropped, vec![2]);
    assert_eq!(dispatcher.queue().ids(), vec![1]);

    // El ID sin fila se vuelve a usar
    assert_eq!(dispatcher.submit("b").unwrap(), 2);
    assert_eq!(dispatcher.queue().ids(), vec![1, 2]);
}
