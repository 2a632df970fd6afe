//! Builder API for route maps and routers.
//!
//! This module provides fluent builders and macros for assembling a router
//! with minimal boilerplate. Route tables are validated as a whole and every
//! problem is reported at once.

pub mod error;
pub mod macros;
pub mod router;
pub mod routes;
mod validation;

pub use error::{BuildError, RouteMapError};
pub use router::RouterBuilder;
pub use routes::RouteMapBuilder;

pub(crate) use validation::validate_definitions;

use crate::core::DEFAULT_LOG_CAPACITY;
use crate::handler::HandlerRegistry;
use crate::recognizer::RouteMap;
use crate::router::{MemoryUrlHost, Router};
use std::sync::Arc;

/// Build a router over `routes` where every route uses the blank handler.
///
/// # Example
///
/// ```
/// use waypost::builder::simple_router;
/// use waypost::recognizer::RouteMap;
///
/// let routes = RouteMap::builder().route("index", "/").build().unwrap();
/// let router = simple_router(routes);
/// assert!(router.has_route("index"));
/// ```
pub fn simple_router(routes: RouteMap) -> Router {
    Router::assemble(
        Arc::new(routes),
        HandlerRegistry::new(),
        Arc::new(MemoryUrlHost::new()),
        None,
        None,
        DEFAULT_LOG_CAPACITY,
    )
}
