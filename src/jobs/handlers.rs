//! # Handlers HTTP para Jobs
//! src/jobs/handlers.rs
//!
//! Traduce requests HTTP a operaciones del [`Dispatcher`] y sus resultados
//! a respuestas JSON:
//! - POST /submit-request
//! - GET /fetch-requests
//! - POST /submit-result
//! - GET /get-result/{id}
//! - GET /stats

use crate::error::DispatchError;
use crate::http::{Request, Response, StatusCode};
use crate::jobs::dispatcher::Dispatcher;
use crate::jobs::types::JobId;
use serde::Deserialize;
use serde_json::json;

/// Prefijo de la ruta de consulta de resultados
pub const GET_RESULT_PREFIX: &str = "/get-result/";

const MISSING_QUERY: &str = "Invalid request, no query provided";
const MISSING_RESULT_FIELDS: &str = "Invalid request, missing request_id or result";

#[derive(Debug, Deserialize)]
struct SubmitBody {
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    request_id: Option<JobId>,
    result: Option<String>,
}

/// Convierte un error del núcleo en respuesta HTTP
fn error_response(err: &DispatchError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!(error = %err, "dispatch operation failed");
    } else {
        tracing::warn!(error = %err, "request rejected");
    }
    Response::error(status, &err.client_message())
}

/// Handler para POST /submit-request
///
/// # Body
/// ```json
/// {"query": "hello"}
/// ```
///
/// # Ejemplo de response
/// ```json
/// {"message": "Request submitted", "request_id": 1}
/// ```
pub fn submit_handler(req: &Request, dispatcher: &Dispatcher) -> Response {
    let query = match req.json::<SubmitBody>() {
        Ok(SubmitBody { query: Some(query) }) => query,
        _ => {
            tracing::warn!("invalid request: no query provided");
            return Response::error(StatusCode::BadRequest, MISSING_QUERY);
        }
    };

    match dispatcher.submit(&query) {
        Ok(id) => Response::json(
            StatusCode::Ok,
            &json!({"message": "Request submitted", "request_id": id}),
        ),
        Err(e) => error_response(&e),
    }
}

/// Handler para GET /fetch-requests
///
/// Retorna `{"request_id", "query"}` o `{"message": "No pending requests"}`.
/// Nunca bloquea: si no hay trabajo, el worker debe volver a preguntar.
pub fn fetch_handler(_req: &Request, dispatcher: &Dispatcher) -> Response {
    match dispatcher.fetch_next() {
        Ok(Some(job)) => Response::json(StatusCode::Ok, &job),
        Ok(None) => Response::json(StatusCode::Ok, &json!({"message": "No pending requests"})),
        Err(e) => error_response(&e),
    }
}

/// Handler para POST /submit-result
///
/// # Body
/// ```json
/// {"request_id": 1, "result": "Processed query: hello"}
/// ```
pub fn result_handler(req: &Request, dispatcher: &Dispatcher) -> Response {
    let (id, result) = match req.json::<ResultBody>() {
        // Los IDs empiezan en 1; un 0 cuenta como ausente
        Ok(ResultBody {
            request_id: Some(id),
            result: Some(result),
        }) if id > 0 => (id, result),
        _ => {
            tracing::warn!("invalid result submission: missing request_id or result");
            return Response::error(StatusCode::BadRequest, MISSING_RESULT_FIELDS);
        }
    };

    match dispatcher.complete(id, &result) {
        Ok(()) => Response::json(StatusCode::Ok, &json!({"message": "Result submitted"})),
        Err(e) => error_response(&e),
    }
}

/// Handler para GET /get-result/{id}
///
/// # Ejemplo de response
/// ```json
/// {"status": "completed", "result": "Processed query: hello"}
/// ```
pub fn get_result_handler(req: &Request, dispatcher: &Dispatcher) -> Response {
    let raw_id = req.path().strip_prefix(GET_RESULT_PREFIX).unwrap_or_default();

    let id: JobId = match raw_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return Response::error(
                StatusCode::BadRequest,
                &format!("Invalid request id: {}", raw_id),
            );
        }
    };

    match dispatcher.read(id) {
        Ok(record) => Response::json(
            StatusCode::Ok,
            &json!({"status": record.status, "result": record.result}),
        ),
        Err(DispatchError::NotFound(_)) => {
            tracing::warn!(id, "request not found");
            Response::error(StatusCode::NotFound, "Request not found")
        }
        Err(e) => error_response(&e),
    }
}

/// Handler para GET /stats
pub fn stats_handler(_req: &Request, dispatcher: &Dispatcher) -> Response {
    match dispatcher.stats() {
        Ok(stats) => Response::json(StatusCode::Ok, &stats),
        Err(e) => error_response(&e),
    }
}
