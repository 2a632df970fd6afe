//! Route handlers: the hook objects an application registers per route.
//!
//! A handler implements whichever life-cycle hooks it needs. Every method has
//! a default, so a blank handler is valid for routes that only group
//! children.

mod events;

pub use events::{EventDisposition, FinalizedQueryParam, RouteEvent};
pub(crate) use events::trigger;

use crate::core::{Context, Params};
use crate::transition::Transition;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure returned by a hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

pub type HookResult<T = ()> = Result<T, HookError>;

/// Life-cycle hooks of one route.
///
/// Model hooks run while a transition resolves, shallow to deep:
/// `before_model`, then `deserialize` (which defaults to `model`), then
/// `after_model`. After every handler resolved, the router exits, resets,
/// enters and sets up handlers according to the tree diff.
///
/// Hooks receive the in-flight [`Transition`]. Starting another transition
/// from a hook (through [`Transition::router`]) aborts the current one,
/// which is how redirects work.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::json;
/// use waypost::core::{Context, Params};
/// use waypost::handler::{HookResult, RouteHandler};
/// use waypost::transition::Transition;
///
/// struct PostHandler;
///
/// #[async_trait]
/// impl RouteHandler for PostHandler {
///     async fn model(&self, params: &Params, _t: &Transition) -> HookResult<Context> {
///         Ok(json!({ "id": params.get("post_id"), "title": "Hello" }))
///     }
/// }
/// ```
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn before_model(&self, _transition: &Transition) -> HookResult {
        Ok(())
    }

    /// Load the context for this route from its URL params.
    async fn model(&self, _params: &Params, _transition: &Transition) -> HookResult<Context> {
        Ok(Context::Null)
    }

    async fn deserialize(&self, params: &Params, transition: &Transition) -> HookResult<Context> {
        self.model(params, transition).await
    }

    /// Runs with the resolved context. Rebinding a model is done with
    /// [`Transition::set_resolved_model`].
    async fn after_model(&self, _context: &Context, _transition: &Transition) -> HookResult {
        Ok(())
    }

    /// Turn a context back into URL params. Returning `None` falls back to
    /// the context's `id` field for single-segment routes.
    fn serialize(&self, _context: &Context, _names: &[String]) -> Option<Params> {
        None
    }

    /// Called after this handler resolved, before deeper ones.
    fn redirect(&self, _context: &Context, _transition: &Transition) -> HookResult {
        Ok(())
    }

    fn enter(&self, _transition: Option<&Transition>) -> HookResult {
        Ok(())
    }

    fn setup(&self, _context: &Context, _transition: Option<&Transition>) -> HookResult {
        Ok(())
    }

    fn reset(&self, _is_exiting: bool, _transition: Option<&Transition>) -> HookResult {
        Ok(())
    }

    fn exit(&self, _transition: Option<&Transition>) -> HookResult {
        Ok(())
    }

    fn context_did_change(&self) {}

    /// Handlers that can't be reached by URL suppress URL entry and
    /// URL reflection.
    fn inaccessible_by_url(&self) -> bool {
        false
    }

    fn on_event(&self, _event: &mut RouteEvent<'_>) -> EventDisposition {
        EventDisposition::Unhandled
    }
}

pub type SharedHandler = Arc<dyn RouteHandler>;

/// Handler with no hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlankHandler;

impl RouteHandler for BlankHandler {}

/// Handler lookup owned by the router.
///
/// Routes without a registered handler get the fallback, a
/// [`BlankHandler`] unless configured otherwise.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, SharedHandler>,
    fallback: SharedHandler,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(BlankHandler),
        }
    }

    pub fn register(mut self, name: impl Into<String>, handler: SharedHandler) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn with_fallback(mut self, fallback: SharedHandler) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn get(&self, name: &str) -> SharedHandler {
        self.handlers
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish_non_exhaustive()
    }
}
