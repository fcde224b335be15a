//! # Recuperación de la Cola al Arrancar
//! src/jobs/recovery.rs
//!
//! Se ejecuta una sola vez al inicio. Rehidrata la cola desde el último
//! snapshot y la reconcilia contra el store, que es la fuente de verdad:
//!
//! 1. IDs del snapshot que el store no conoce o que ya no están `pending`
//!    se descartan. Un ID sin fila es un submit que cayó entre la escritura
//!    del snapshot y el insert.
//! 2. Jobs `pending` del store con ID mayor al `high_water` del snapshot se
//!    agregan al final en orden de ID. Solo aparecen si el snapshot falta o
//!    es más viejo que la tabla.
//! 3. Jobs `pending` con ID <= `high_water` que no están en el snapshot ya
//!    fueron despachados a algún worker. No se reentregan.
//!
//! Al final se escribe un snapshot nuevo con la cola reconciliada.

use crate::error::{DispatchError, DispatchResult};
use crate::jobs::pool::ConnectionPool;
use crate::jobs::queue::PendingQueue;
use crate::jobs::snapshot::{Snapshot, SnapshotFile};
use crate::jobs::types::JobId;
use std::collections::HashSet;

/// Resumen de lo que hizo la recuperación
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// IDs restaurados desde el snapshot
    pub restored: Vec<JobId>,

    /// IDs del snapshot descartados (desconocidos, completados o repetidos)
    pub dropped: Vec<JobId>,

    /// Jobs huérfanos reincorporados desde el store
    pub readmitted: Vec<JobId>,
}

/// Reconstruye la cola pendiente desde `file` usando `pool` para consultar el store
pub fn recover(file: SnapshotFile, pool: &ConnectionPool) -> DispatchResult<(PendingQueue, RecoveryReport)> {
    file.prepare()?;

    let snapshot = match file.load()? {
        Some(snapshot) => snapshot,
        None => {
            tracing::info!(path = %file.path().display(), "no queue snapshot found, starting empty");
            Snapshot::empty()
        }
    };

    let mut report = RecoveryReport::default();
    let mut seen = HashSet::new();
    let mut pending = Vec::with_capacity(snapshot.pending.len());

    pool.with_connection(|conn| {
        for id in &snapshot.pending {
            if !seen.insert(*id) {
                report.dropped.push(*id);
                continue;
            }
            match conn.get(*id) {
                Ok(record) if record.is_pending() => {
                    pending.push(*id);
                    report.restored.push(*id);
                }
                Ok(_) | Err(DispatchError::NotFound(_)) => report.dropped.push(*id),
                Err(e) => return Err(e),
            }
        }

        for id in conn.pending_ids() {
            if id > snapshot.high_water && !seen.contains(&id) {
                pending.push(id);
                report.readmitted.push(id);
            }
        }

        Ok(())
    })?;

    let high_water = pending
        .iter()
        .copied()
        .max()
        .unwrap_or(0)
        .max(snapshot.high_water);

    if !report.dropped.is_empty() {
        tracing::warn!(ids = ?report.dropped, "dropped stale ids from queue snapshot");
    }
    if !report.readmitted.is_empty() {
        tracing::warn!(ids = ?report.readmitted, "re-admitted orphaned pending jobs");
    }

    let queue = PendingQueue::from_snapshot(file, Snapshot::new(high_water, pending));
    queue.persist()?;

    tracing::info!(
        restored = report.restored.len(),
        readmitted = report.readmitted.len(),
        depth = queue.len(),
        high_water,
        "pending queue recovered"
    );

    Ok((queue, report))
}
