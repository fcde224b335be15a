//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Mapea (método, path) a handlers de la API de despacho.
//!
//! ```text
//! Request → Router → Handler(&Request, &Dispatcher) → Response
//! ```
//!
//! Las rutas pueden ser exactas (`/fetch-requests`) o por prefijo
//! (`/get-result/` + id). Si el path existe pero no con ese método se
//! responde 405; si no existe, 404.

use crate::http::{Method, Request, Response, StatusCode};
use crate::jobs::Dispatcher;

/// Tipo de función handler
pub type Handler = fn(&Request, &Dispatcher) -> Response;

/// Forma en que una ruta compara el path
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathMatch {
    Exact(String),
    Prefix(String),
}

impl PathMatch {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathMatch::Exact(p) => p == path,
            PathMatch::Prefix(p) => path.starts_with(p.as_str()),
        }
    }
}

struct Route {
    method: Method,
    path: PathMatch,
    handler: Handler,
}

/// Router que mapea rutas a handlers
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router con todas las rutas de la API de despacho
    pub fn with_dispatch_routes() -> Self {
        use crate::jobs::handlers;

        let mut router = Self::new();
        router.register(Method::POST, "/submit-request", handlers::submit_handler);
        router.register(Method::GET, "/fetch-requests", handlers::fetch_handler);
        router.register(Method::POST, "/submit-result", handlers::result_handler);
        router.register_prefix(Method::GET, handlers::GET_RESULT_PREFIX, handlers::get_result_handler);
        router.register(Method::GET, "/stats", handlers::stats_handler);
        router
    }

    /// Registra una ruta exacta
    pub fn register(&mut self, method: Method, path: &str, handler: Handler) {
        self.routes.push(Route {
            method,
            path: PathMatch::Exact(path.to_string()),
            handler,
        });
    }

    /// Registra una ruta por prefijo (el handler extrae el resto del path)
    pub fn register_prefix(&mut self, method: Method, prefix: &str, handler: Handler) {
        self.routes.push(Route {
            method,
            path: PathMatch::Prefix(prefix.to_string()),
            handler,
        });
    }

    /// Encuentra y ejecuta el handler apropiado para un request
    pub fn route(&self, request: &Request, dispatcher: &Dispatcher) -> Response {
        let path = request.path();
        let mut path_known = false;

        for route in &self.routes {
            if !route.path.matches(path) {
                continue;
            }
            if route.method == request.method() {
                let mut response = (route.handler)(request, dispatcher);
                self.add_common_headers(&mut response);
                return response;
            }
            path_known = true;
        }

        let mut response = if path_known {
            Response::error(
                StatusCode::MethodNotAllowed,
                &format!("Method {} not allowed for {}", request.method().as_str(), path),
            )
        } else {
            Response::error(StatusCode::NotFound, &format!("Route not found: {}", path))
        };
        self.add_common_headers(&mut response);
        response
    }

    /// Headers comunes a todas las respuestas
    fn add_common_headers(&self, response: &mut Response) {
        response.add_header("Server", "dispatch-server/1.0");
        response.add_header("Connection", "close");
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
