//! # Coordinador de Despacho
//! src/jobs/dispatcher.rs
//!
//! Compone store, pool y cola en las operaciones que consume la capa HTTP:
//! submit, fetch_next, complete y read. Se construye una sola vez al
//! arrancar y se comparte con los threads de conexión vía `Arc`.

use crate::error::{DispatchError, DispatchResult};
use crate::jobs::pool::{ConnectionPool, PooledConnection};
use crate::jobs::queue::{Admission, PendingQueue};
use crate::jobs::recovery::{self, RecoveryReport};
use crate::jobs::snapshot::SnapshotFile;
use crate::jobs::store::JobStore;
use crate::jobs::types::{JobId, JobRecord};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuración del Dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Archivo de la tabla de jobs
    pub db_path: PathBuf,

    /// Archivo del snapshot de la cola
    pub snapshot_path: PathBuf,

    /// Número de conexiones del pool
    pub pool_size: usize,

    /// Espera máxima por una conexión (None = indefinida)
    pub acquire_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/requests.json"),
            snapshot_path: PathBuf::from("./data/request_queue.json"),
            pool_size: 5,
            acquire_timeout: None,
        }
    }
}

impl DispatcherConfig {
    /// Crea una configuración desde el Config principal
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            db_path: PathBuf::from(&config.db_path),
            snapshot_path: PathBuf::from(&config.queue_snapshot),
            pool_size: config.pool_size,
            acquire_timeout: config.acquire_timeout(),
        }
    }

    /// Configuración con ambos archivos dentro de `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            db_path: dir.join("requests.json"),
            snapshot_path: dir.join("request_queue.json"),
            ..Self::default()
        }
    }
}

/// Job entregado a un worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedJob {
    #[serde(rename = "request_id")]
    pub id: JobId,

    #[serde(rename = "query")]
    pub text: String,
}

/// Estadísticas del motor de despacho
#[derive(Debug, Clone, Serialize)]
pub struct DispatchStats {
    pub queue_depth: usize,
    pub high_water: JobId,
    pub pool_size: usize,
    pub pool_in_use: usize,
    pub jobs_total: usize,
}

/// Alta de un job sobre una conexión del pool
struct NewJob<'t> {
    conn: PooledConnection,
    text: &'t str,
}

impl Admission for NewJob<'_> {
    fn reserve(&mut self) -> DispatchResult<JobId> {
        Ok(self.conn.reserve_id())
    }

    fn commit(&mut self, id: JobId) -> DispatchResult<()> {
        self.conn.insert(id, self.text)
    }

    fn release(&mut self, id: JobId) {
        self.conn.release_id(id);
    }
}

/// Coordinador central
pub struct Dispatcher {
    queue: PendingQueue,
    pool: ConnectionPool,
}

impl Dispatcher {
    /// Abre el store, arma el pool y recupera la cola desde el snapshot
    pub fn open(config: &DispatcherConfig) -> DispatchResult<Self> {
        Self::open_with_report(config).map(|(dispatcher, _)| dispatcher)
    }

    /// Como [`Dispatcher::open`], retornando además el resumen de la recuperación
    pub fn open_with_report(config: &DispatcherConfig) -> DispatchResult<(Self, RecoveryReport)> {
        let store = JobStore::open(&config.db_path)?;
        let pool = ConnectionPool::new(&store, config.pool_size, config.acquire_timeout)?;
        let (queue, report) = recovery::recover(SnapshotFile::new(&config.snapshot_path), &pool)?;

        Ok((Self { queue, pool }, report))
    }

    /// Registra un job nuevo y lo deja en la cola
    ///
    /// Todo ocurre dentro de la sección crítica de la cola, así los IDs
    /// entran en orden. El snapshot con el ID nuevo se escribe antes que la
    /// fila: si la fila no se puede guardar, el ID sale de la cola y el job
    /// no existe.
    pub fn submit(&self, text: &str) -> DispatchResult<JobId> {
        if text.is_empty() {
            return Err(DispatchError::Validation(
                "Invalid request, no query provided".to_string(),
            ));
        }

        let id = self.queue.admit(|| {
            Ok(NewJob {
                conn: self.pool.acquire()?,
                text,
            })
        })?;

        tracing::info!(id, "request submitted");
        Ok(id)
    }

    /// Entrega el próximo job pendiente, si hay.
    ///
    /// El ID sale de la cola (y del snapshot) antes de leer el store. Un
    /// job entregado no se vuelve a entregar aunque el worker nunca reporte.
    pub fn fetch_next(&self) -> DispatchResult<Option<FetchedJob>> {
        let Some(id) = self.queue.dequeue()? else {
            tracing::debug!("no pending requests in queue");
            return Ok(None);
        };

        let record = self.pool.with_connection(|conn| conn.get(id)).map_err(|e| {
            tracing::error!(id, error = %e, "dequeued id could not be read from store");
            e
        })?;

        tracing::info!(id, "request fetched");
        Ok(Some(FetchedJob {
            id: record.id,
            text: record.text,
        }))
    }

    /// Guarda el resultado de un job.
    ///
    /// No verifica que el job haya sido entregado; un segundo complete
    /// sobrescribe el resultado. Un ID desconocido es `NotFound`.
    pub fn complete(&self, id: JobId, result: &str) -> DispatchResult<()> {
        if result.is_empty() {
            return Err(DispatchError::Validation(
                "Invalid request, missing request_id or result".to_string(),
            ));
        }

        self.pool.with_connection(|conn| conn.complete(id, result))?;

        tracing::info!(id, "result submitted");
        Ok(())
    }

    /// Lee estado y resultado de un job
    pub fn read(&self, id: JobId) -> DispatchResult<JobRecord> {
        self.pool.with_connection(|conn| conn.get(id))
    }

    /// Estadísticas de la cola y del pool
    pub fn stats(&self) -> DispatchResult<DispatchStats> {
        let jobs_total = self.pool.with_connection(|conn| Ok(conn.count()))?;

        Ok(DispatchStats {
            queue_depth: self.queue.len(),
            high_water: self.queue.high_water(),
            pool_size: self.pool.size(),
            pool_in_use: self.pool.in_use(),
            jobs_total,
        })
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}
