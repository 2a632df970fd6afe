//! Builder for routers.

use crate::builder::error::BuildError;
use crate::core::{HandlerInfo, DEFAULT_LOG_CAPACITY};
use crate::handler::{HandlerRegistry, RouteHandler, SharedHandler};
use crate::recognizer::{Recognizer, RouteMap};
use crate::router::{
    DidTransitionCallback, MemoryUrlHost, Router, UrlHost, WillTransitionCallback,
};
use crate::transition::Transition;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Builder for a [`Router`] with a fluent API.
///
/// Only the recognizer is required. Routes without a registered handler
/// get the fallback handler, and the URL host defaults to an in-memory
/// history.
pub struct RouterBuilder {
    recognizer: Option<Arc<dyn Recognizer>>,
    handlers: HandlerRegistry,
    host: Option<Arc<dyn UrlHost>>,
    did_transition: Option<DidTransitionCallback>,
    will_transition: Option<WillTransitionCallback>,
    log_capacity: usize,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            recognizer: None,
            handlers: HandlerRegistry::new(),
            host: None,
            did_transition: None,
            will_transition: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    pub fn recognizer(self, recognizer: impl Recognizer + 'static) -> Self {
        self.shared_recognizer(Arc::new(recognizer))
    }

    pub fn shared_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn route_map(self, routes: RouteMap) -> Self {
        self.recognizer(routes)
    }

    /// Register the handler for a route.
    pub fn handler(self, name: impl Into<String>, handler: impl RouteHandler + 'static) -> Self {
        self.shared_handler(name, Arc::new(handler))
    }

    pub fn shared_handler(mut self, name: impl Into<String>, handler: SharedHandler) -> Self {
        self.handlers = self.handlers.register(name, handler);
        self
    }

    /// Handler used for routes with no registered handler.
    pub fn fallback_handler(mut self, handler: impl RouteHandler + 'static) -> Self {
        self.handlers = self.handlers.with_fallback(Arc::new(handler));
        self
    }

    pub fn url_host(self, host: impl UrlHost + 'static) -> Self {
        self.shared_url_host(Arc::new(host))
    }

    /// Share a host with the caller, e.g. to inspect a [`MemoryUrlHost`].
    pub fn shared_url_host(mut self, host: Arc<dyn UrlHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn on_did_transition<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[Arc<HandlerInfo>]) + Send + Sync + 'static,
    {
        self.did_transition = Some(Box::new(callback));
        self
    }

    pub fn on_will_transition<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[Arc<HandlerInfo>], &[Arc<HandlerInfo>], &Transition) + Send + Sync + 'static,
    {
        self.will_transition = Some(Box::new(callback));
        self
    }

    /// Number of committed transitions kept in [`Router::log`].
    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Build the router.
    /// Fails if no recognizer was given or a handler names an unknown route.
    pub fn build(self) -> Result<Router, BuildError> {
        let recognizer = self.recognizer.ok_or(BuildError::MissingRecognizer)?;

        let checks: Vec<Validation<(), NonEmptyVec<String>>> = self
            .handlers
            .names()
            .map(|name| {
                if recognizer.has_route(name) {
                    Validation::success(())
                } else {
                    Validation::fail(name.to_owned())
                }
            })
            .collect();
        if let Validation::Failure(unknown) = Validation::all_vec(checks).map(|_| ()) {
            let mut unknown: Vec<String> = unknown.iter().cloned().collect();
            unknown.sort();
            return Err(BuildError::UnknownHandlers(unknown));
        }

        let host = self
            .host
            .unwrap_or_else(|| Arc::new(MemoryUrlHost::new()) as Arc<dyn UrlHost>);
        Ok(Router::assemble(
            recognizer,
            self.handlers,
            host,
            self.did_transition,
            self.will_transition,
            self.log_capacity,
        ))
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BlankHandler;

    fn routes() -> RouteMap {
        RouteMap::builder()
            .route("index", "/")
            .route("about", "/about")
            .build()
            .unwrap()
    }

    #[test]
    fn builder_requires_recognizer() {
        let result = RouterBuilder::new().build();
        assert!(matches!(result, Err(BuildError::MissingRecognizer)));
    }

    #[test]
    fn builder_rejects_handlers_for_unknown_routes() {
        let result = RouterBuilder::new()
            .route_map(routes())
            .handler("about", BlankHandler)
            .handler("contact", BlankHandler)
            .handler("blog", BlankHandler)
            .build();
        assert_eq!(
            result.unwrap_err(),
            BuildError::UnknownHandlers(vec!["blog".into(), "contact".into()])
        );
    }

    #[test]
    fn fluent_api_builds_router() {
        let router = RouterBuilder::new()
            .route_map(routes())
            .handler("index", BlankHandler)
            .fallback_handler(BlankHandler)
            .url_host(MemoryUrlHost::new())
            .on_did_transition(|_| {})
            .log_capacity(8)
            .build()
            .unwrap();
        assert!(router.has_route("about"));
        assert!(router.state().is_empty());
        assert_eq!(router.log().capacity(), 8);
    }
}
