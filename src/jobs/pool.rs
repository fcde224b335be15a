//! # Pool de Conexiones al Store
//! src/jobs/pool.rs
//!
//! Conjunto fijo de N conexiones reutilizables. `acquire()` bloquea el
//! thread hasta que haya una libre; la conexión vuelve al pool cuando el
//! guard [`PooledConnection`] se destruye, sin importar si la operación
//! terminó bien, con error de validación, con error de storage o con panic.
//!
//! Invariante: nunca hay más de N conexiones fuera del pool.

use crate::error::{DispatchError, DispatchResult};
use crate::jobs::store::{Connection, JobStore};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct PoolInner {
    /// Conexiones libres
    idle: Mutex<Vec<Connection>>,

    /// Condvar para despertar a quien espera una conexión
    available: Condvar,

    /// Tamaño fijo del pool
    size: usize,

    /// Tiempo máximo de espera en `acquire` (None = esperar indefinidamente)
    acquire_timeout: Option<Duration>,
}

impl PoolInner {
    fn lock_idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, conn: Connection) {
        let mut idle = self.lock_idle();
        idle.push(conn);
        self.available.notify_one();
    }
}

/// Pool bloqueante de conexiones
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Crea un pool de `size` conexiones sobre `store`
    ///
    /// `acquire_timeout = None` reproduce el comportamiento clásico: esperar
    /// indefinidamente hasta que alguien devuelva una conexión.
    pub fn new(
        store: &JobStore,
        size: usize,
        acquire_timeout: Option<Duration>,
    ) -> DispatchResult<Self> {
        if size == 0 {
            return Err(DispatchError::Validation(
                "Connection pool size must be >= 1".to_string(),
            ));
        }

        let connections: Vec<Connection> = (0..size).map(|slot| store.connect(slot)).collect();

        tracing::info!(size, ?acquire_timeout, "connection pool ready");

        Ok(Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(connections),
                available: Condvar::new(),
                size,
                acquire_timeout,
            }),
        })
    }

    /// Toma una conexión del pool, bloqueando si no hay ninguna libre
    pub fn acquire(&self) -> DispatchResult<PooledConnection> {
        // Un timeout que desborda Instant equivale a esperar indefinidamente
        let deadline = self
            .inner
            .acquire_timeout
            .and_then(|t| Instant::now().checked_add(t));
        let mut idle = self.inner.lock_idle();

        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection {
                    conn: Some(conn),
                    pool: Arc::clone(&self.inner),
                });
            }

            idle = match deadline {
                None => self
                    .inner
                    .available
                    .wait(idle)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let waited_ms = self
                            .inner
                            .acquire_timeout
                            .map(|t| t.as_millis() as u64)
                            .unwrap_or_default();
                        tracing::warn!(waited_ms, "timed out waiting for a store connection");
                        return Err(DispatchError::PoolTimeout { waited_ms });
                    }
                    self.inner
                        .available
                        .wait_timeout(idle, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Ejecuta `f` con una conexión prestada y la devuelve al terminar
    pub fn with_connection<T, F>(&self, f: F) -> DispatchResult<T>
    where
        F: FnOnce(&mut Connection) -> DispatchResult<T>,
    {
        let mut conn = self.acquire()?;
        f(&mut *conn)
    }

    /// Tamaño fijo del pool
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Conexiones libres en este momento
    pub fn available(&self) -> usize {
        self.inner.lock_idle().len()
    }

    /// Conexiones prestadas en este momento
    pub fn in_use(&self) -> usize {
        self.inner.size - self.available()
    }
}

/// Conexión prestada; vuelve al pool en `Drop`
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Solo es None dentro de drop
        self.conn.as_ref().expect("pooled connection used after release")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("pooled connection used after release")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
