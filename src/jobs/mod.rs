//! # Motor de Despacho de Jobs
//!
//! Núcleo durable del servidor: los clientes registran jobs de texto, los
//! workers remotos piden el siguiente pendiente y reportan el resultado.
//!
//! ## Endpoints
//!
//! - `POST /submit-request` - Registrar job (`{"query": ...}`)
//! - `GET /fetch-requests` - Tomar el siguiente job pendiente
//! - `POST /submit-result` - Reportar resultado (`{"request_id", "result"}`)
//! - `GET /get-result/{id}` - Consultar estado y resultado
//! - `GET /stats` - Profundidad de la cola y uso del pool

pub mod dispatcher;
pub mod durable;
pub mod handlers;
pub mod pool;
pub mod queue;
pub mod recovery;
pub mod snapshot;
pub mod store;
pub mod types;

pub use dispatcher::{Dispatcher, DispatcherConfig, FetchedJob};
pub use pool::{ConnectionPool, PooledConnection};
pub use queue::PendingQueue;
pub use store::{Connection, JobStore};
pub use types::{JobId, JobRecord, JobStatus};
