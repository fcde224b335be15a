//! # Cola Pendiente con Snapshot
//! src/jobs/queue.rs
//!
//! Cola FIFO thread-safe de IDs de jobs esperando un worker. Cada mutación
//! exitosa se persiste completa en el snapshot antes de retornar, dentro de
//! la misma sección crítica: ningún otro thread puede intercalar su propio
//! snapshot entre la mutación y la escritura.
//!
//! Si el snapshot no se puede escribir, la mutación en memoria se revierte.
//! La cola en memoria nunca va por delante de la cola durable.

use crate::error::DispatchResult;
use crate::jobs::snapshot::{Snapshot, SnapshotFile};
use crate::jobs::types::JobId;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct QueueState {
    /// IDs en orden FIFO
    ids: VecDeque<JobId>,

    /// ID más alto admitido alguna vez
    high_water: JobId,
}

impl QueueState {
    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.high_water, self.ids.iter().copied().collect())
    }
}

/// Pasos para dar de alta un job nuevo en la cola
pub trait Admission {
    /// Reserva el ID del job
    fn reserve(&mut self) -> DispatchResult<JobId>;

    /// Guarda el job con el ID reservado
    fn commit(&mut self, id: JobId) -> DispatchResult<()>;

    /// Libera un ID reservado que no llegó a guardarse
    fn release(&mut self, id: JobId);
}

/// Cola FIFO de IDs pendientes
pub struct PendingQueue {
    state: Mutex<QueueState>,
    snapshot: SnapshotFile,
}

impl PendingQueue {
    /// Cola vacía que persistirá en `snapshot`
    pub fn new(snapshot: SnapshotFile) -> Self {
        Self::from_snapshot(snapshot, Snapshot::empty())
    }

    /// Cola inicializada con el contenido de un snapshot, preservando el orden
    pub fn from_snapshot(file: SnapshotFile, snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(QueueState {
                ids: snapshot.pending.into_iter().collect(),
                high_water: snapshot.high_water,
            }),
            snapshot: file,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encola un ID al final
    pub fn enqueue(&self, id: JobId) -> DispatchResult<()> {
        let mut state = self.lock();
        self.push_persisted(&mut state, id)?;
        tracing::debug!(id, depth = state.ids.len(), "job enqueued");
        Ok(())
    }

    /// Da de alta un job nuevo dentro de la sección crítica de la cola.
    ///
    /// Orden de pasos: reservar ID, escribir el snapshot que lo contiene y
    /// recién entonces guardar la fila. Si falla la fila, el ID sale de la
    /// cola; si además el snapshot no se puede reescribir, queda un ID sin
    /// fila que la recuperación descarta. Nunca queda una fila `pending`
    /// que la cola no vaya a entregar.
    pub fn admit<A, F>(&self, begin: F) -> DispatchResult<JobId>
    where
        A: Admission,
        F: FnOnce() -> DispatchResult<A>,
    {
        let mut state = self.lock();

        let mut admission = begin()?;
        let id = admission.reserve()?;

        let previous_high_water = match self.push_persisted(&mut state, id) {
            Ok(previous) => previous,
            Err(e) => {
                admission.release(id);
                return Err(e);
            }
        };

        if let Err(e) = admission.commit(id) {
            state.ids.pop_back();
            state.high_water = previous_high_water;
            admission.release(id);
            if let Err(snapshot_err) = self.snapshot.write(&state.snapshot()) {
                tracing::warn!(id, error = %snapshot_err, "queue snapshot keeps an id without row");
            }
            tracing::error!(id, error = %e, "job insert failed, enqueue rolled back");
            return Err(e);
        }

        tracing::debug!(id, depth = state.ids.len(), "job admitted");
        Ok(id)
    }

    /// Agrega `id` al final y escribe el snapshot; si la escritura falla
    /// revierte. Retorna el `high_water` anterior.
    fn push_persisted(&self, state: &mut QueueState, id: JobId) -> DispatchResult<JobId> {
        let previous_high_water = state.high_water;
        state.ids.push_back(id);
        state.high_water = previous_high_water.max(id);

        if let Err(e) = self.snapshot.write(&state.snapshot()) {
            state.ids.pop_back();
            state.high_water = previous_high_water;
            tracing::error!(id, error = %e, "queue snapshot failed, enqueue rolled back");
            return Err(e);
        }

        Ok(previous_high_water)
    }

    /// Saca el ID de la cabeza sin bloquear.
    ///
    /// `Ok(None)` si la cola está vacía; los workers deben volver a
    /// consultar más tarde.
    pub fn dequeue(&self) -> DispatchResult<Option<JobId>> {
        let mut state = self.lock();

        let Some(id) = state.ids.pop_front() else {
            return Ok(None);
        };

        if let Err(e) = self.snapshot.write(&state.snapshot()) {
            state.ids.push_front(id);
            tracing::error!(id, error = %e, "queue snapshot failed, dequeue rolled back");
            return Err(e);
        }

        tracing::debug!(id, depth = state.ids.len(), "job dequeued");
        Ok(Some(id))
    }

    /// Escribe el estado actual sin mutarlo (usado tras la recuperación)
    pub fn persist(&self) -> DispatchResult<()> {
        let state = self.lock();
        self.snapshot.write(&state.snapshot())
    }

    /// Copia ordenada de los IDs pendientes
    pub fn ids(&self) -> Vec<JobId> {
        self.lock().ids.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn high_water(&self) -> JobId {
        self.lock().high_water
    }

    pub fn snapshot_file(&self) -> &SnapshotFile {
        &self.snapshot
    }
}
