//! URL recognition and generation.
//!
//! The router only talks to the [`Recognizer`] trait. [`RouteMap`] is the
//! bundled implementation: a nested route table with static, dynamic
//! (`:name`) and star (`*name`) segments.

mod definition;
pub(crate) mod route_map;

pub use definition::RouteDefinition;
pub use route_map::RouteMap;

use crate::core::{Params, QueryParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One handler in a route's chain, with the names of its dynamic segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSpec {
    pub handler: String,
    pub names: Vec<String>,
}

impl HandlerSpec {
    pub fn new(handler: impl Into<String>, names: Vec<String>) -> Self {
        Self {
            handler: handler.into(),
            names,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        !self.names.is_empty()
    }
}

/// A handler matched by [`Recognizer::recognize`] with its captured params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedHandler {
    pub handler: String,
    pub params: Params,
}

/// Result of recognizing a URL: the handler chain root first, plus the
/// parsed query string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Recognized {
    pub handlers: Vec<RecognizedHandler>,
    pub query_params: QueryParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognizerError {
    #[error("there is no route named '{0}'")]
    UnknownRoute(String),

    #[error("route '{route}' needs a value for '{param}'")]
    MissingParam { route: String, param: String },

    #[error("route '{route}' can't have an empty '{param}'")]
    EmptyParam { route: String, param: String },
}

/// Boundary between the transition engine and URL matching.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, url: &str) -> Option<Recognized>;

    /// Build a URL for `name` from the merged params of its chain.
    fn generate(
        &self,
        name: &str,
        params: &Params,
        query_params: &QueryParams,
    ) -> Result<String, RecognizerError>;

    fn handlers_for(&self, name: &str) -> Option<Vec<HandlerSpec>>;

    fn has_route(&self, name: &str) -> bool {
        self.handlers_for(name).is_some()
    }
}
