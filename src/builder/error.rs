//! Build errors for route maps and routers.

use thiserror::Error;

/// Errors that can occur when building a route map or a router.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("No recognizer specified. Call .route_map(map) or .recognizer(r) before .build()")]
    MissingRecognizer,

    #[error("Invalid route map: {}", describe(.0))]
    InvalidRouteMap(Vec<RouteMapError>),

    #[error("Handlers registered for unknown routes: {}", .0.join(", "))]
    UnknownHandlers(Vec<String>),
}

/// A problem in a route table definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteMapError {
    #[error("route with path '{path}' has an empty name")]
    EmptyName { path: String },

    #[error("route '{0}' is defined more than once")]
    DuplicateName(String),

    #[error("route '{route}' has malformed segment '{segment}'")]
    MalformedSegment { route: String, segment: String },

    #[error("route '{route}' has a star segment that is not last")]
    StarNotLast { route: String },

    #[error("route '{route}' uses param '{param}' more than once in its chain")]
    DuplicateParam { route: String, param: String },
}

fn describe(errors: &[RouteMapError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
