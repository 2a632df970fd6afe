//! The externally observable transition handle.
//!
//! A [`Transition`] is a cheap, cloneable handle to one transition attempt.
//! Its pipeline runs as a Tokio task. Awaiting the handle (or
//! [`Transition::finished`]) yields the outcome, which settles exactly once
//! and is shared by every awaiter.

use crate::core::{Context, HandlerInfo, Params, QueryParams, TransitionIntent, TransitionState};
use crate::error::TransitionError;
use crate::handler::{self, RouteEvent};
use crate::router::{Router, RouterInner};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// How a successful transition settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The route tree changed and `target` is now the leaf.
    Entered { target: String },
    /// Only query params changed; no model hooks ran.
    QueryParamsChanged,
    /// Nothing changed.
    Unchanged,
}

pub type TransitionResult = Result<TransitionOutcome, TransitionError>;

pub type TransitionFuture = Shared<BoxFuture<'static, TransitionResult>>;

/// How a committed transition is reflected in the URL host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlMethod {
    #[default]
    Update,
    Replace,
}

#[derive(Debug, Default)]
struct Resolution {
    resolved_models: HashMap<String, Context>,
    params: BTreeMap<String, Params>,
    resolve_index: usize,
}

pub(crate) struct TransitionInner {
    sequence: Option<u64>,
    intent: Option<Arc<TransitionIntent>>,
    state: Mutex<TransitionState>,
    resolution: Mutex<Resolution>,
    data: Mutex<Map<String, Value>>,
    target_name: Option<String>,
    pivot_handler: Option<String>,
    aborted: AtomicBool,
    active: AtomicBool,
    url_method: Mutex<Option<UrlMethod>>,
    caused_by_aborting: AtomicBool,
    caused_by_initial: AtomicBool,
    query_params_only: bool,
    visible_query_params: Mutex<Option<QueryParams>>,
    router: Weak<RouterInner>,
    completion: OnceLock<TransitionFuture>,
    superseded_by: OnceLock<Transition>,
}

/// One transition attempt.
///
/// Once aborted a transition stays aborted. [`retry`](Self::retry) starts a
/// new transition from the same intent.
#[derive(Clone)]
pub struct Transition {
    inner: Arc<TransitionInner>,
}

impl Transition {
    pub(crate) fn new(
        router: Weak<RouterInner>,
        sequence: Option<u64>,
        intent: Option<Arc<TransitionIntent>>,
        state: TransitionState,
        query_params_only: bool,
    ) -> Self {
        let target_name = state.target_name().map(str::to_owned);
        let pivot_handler = state
            .handler_infos
            .iter()
            .take_while(|info| info.is_resolved())
            .last()
            .map(|info| info.name().to_owned());
        let params = state.params.clone();

        Self {
            inner: Arc::new(TransitionInner {
                sequence,
                intent,
                state: Mutex::new(state),
                resolution: Mutex::new(Resolution {
                    params,
                    ..Resolution::default()
                }),
                data: Mutex::new(Map::new()),
                target_name,
                pivot_handler,
                aborted: AtomicBool::new(false),
                active: AtomicBool::new(true),
                url_method: Mutex::new(Some(UrlMethod::Update)),
                caused_by_aborting: AtomicBool::new(false),
                caused_by_initial: AtomicBool::new(false),
                query_params_only,
                visible_query_params: Mutex::new(None),
                router,
                completion: OnceLock::new(),
                superseded_by: OnceLock::new(),
            }),
        }
    }

    /// A transition over `state` that belongs to no router.
    ///
    /// Useful for driving [`TransitionState::resolve`] or handler hooks
    /// directly. It never settles on its own.
    pub fn detached(state: TransitionState) -> Self {
        Self::new(Weak::new(), None, None, state, false)
    }

    /// Settle immediately with `result`.
    pub(crate) fn settle(self, result: TransitionResult) -> Self {
        let _ = self
            .inner
            .completion
            .set(futures::future::ready(result).boxed().shared());
        self
    }

    /// Run `pipeline` on `runtime` and settle with its result.
    ///
    /// A panicking hook settles the transition with `Interrupted` and
    /// releases the router's active slot.
    pub(crate) fn start<F>(&self, runtime: &Handle, pipeline: F)
    where
        F: Future<Output = TransitionResult> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let completion = async move {
            rx.await.unwrap_or_else(|_| {
                Err(TransitionError::Interrupted(
                    "transition task was dropped before settling".into(),
                ))
            })
        };
        let _ = self.inner.completion.set(completion.boxed().shared());

        let transition = self.clone();
        runtime.spawn(async move {
            let result = match AssertUnwindSafe(pipeline).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(transition.interrupt(panic_message(panic.as_ref()))),
            };
            let _ = tx.send(result);
        });
    }

    /// Give up on a transition whose pipeline can't finish.
    pub(crate) fn interrupt(&self, reason: String) -> TransitionError {
        tracing::error!(
            sequence = ?self.inner.sequence,
            route = ?self.inner.target_name,
            reason = %reason,
            "transition was interrupted"
        );
        self.inner.active.store(false, Ordering::SeqCst);
        if let Some(router) = self.inner.router.upgrade() {
            router.clear_active_if(self);
        }
        TransitionError::Interrupted(reason)
    }

    /// The shared outcome of this transition.
    pub fn finished(&self) -> TransitionFuture {
        match self.inner.completion.get() {
            Some(completion) => completion.clone(),
            None => futures::future::ready(Err(TransitionError::Interrupted(
                "transition was never started".into(),
            )))
            .boxed()
            .shared(),
        }
    }

    /// Abort the transition. Idempotent.
    ///
    /// Records the router's committed tree on the intent so a later
    /// [`retry`](Self::retry) can fall back to its contexts.
    pub fn abort(&self) -> &Self {
        if self.inner.aborted.swap(true, Ordering::SeqCst) {
            return self;
        }
        tracing::debug!(
            sequence = ?self.inner.sequence,
            route = ?self.inner.target_name,
            "transition was aborted"
        );
        self.inner.active.store(false, Ordering::SeqCst);

        if let Some(router) = self.inner.router.upgrade() {
            let committed = router.committed_state();
            if let Some(intent) = &self.inner.intent {
                intent.record_pre_transition_state(committed);
            }
            router.clear_active_if(self);
        }
        self
    }

    /// Abort this transition and start a new one from the same intent.
    pub fn retry(&self) -> Transition {
        self.abort();
        let (Some(router), Some(intent)) = (self.router(), self.inner.intent.clone()) else {
            return Self::detached(TransitionState::default())
                .settle(Err(TransitionError::NotRetryable));
        };

        let retried = router.transition_by_intent(intent, false);
        if let Some(method) = self.url_method() {
            retried.method(method);
        }
        retried
    }

    /// Choose how the committed URL is reflected. `None` leaves the URL
    /// alone. Set it before the transition commits.
    pub fn method(&self, method: impl Into<Option<UrlMethod>>) -> &Self {
        *self.inner.url_method.lock() = method.into();
        self
    }

    /// Fire `event` on the handlers resolved so far, leaf first.
    pub fn trigger(
        &self,
        ignore_failure: bool,
        event: &mut RouteEvent<'_>,
    ) -> Result<bool, TransitionError> {
        let resolve_index = self.inner.resolution.lock().resolve_index;
        let infos: Vec<Arc<HandlerInfo>> = {
            let state = self.inner.state.lock();
            let end = (resolve_index + 1).min(state.handler_infos.len());
            state.handler_infos[..end].to_vec()
        };
        handler::trigger(Some(&infos), ignore_failure, event)
    }

    /// Await this transition. If it was aborted because another transition
    /// replaced it (a redirect), await that one instead, and so on.
    pub async fn follow_redirects(&self) -> TransitionResult {
        let mut current = self.clone();
        loop {
            let result = current.finished().await;
            match (&result, current.superseded_by()) {
                (Err(error), Some(next)) if error.is_aborted() => current = next,
                _ => return result,
            }
        }
    }

    /// The transition that aborted this one by starting, if any.
    pub fn superseded_by(&self) -> Option<Transition> {
        self.inner.superseded_by.get().cloned()
    }

    pub(crate) fn supersede_with(&self, next: &Transition) {
        let _ = self.inner.superseded_by.set(next.clone());
    }

    /// `Err(Aborted)` once the transition has been aborted. Hooks that do
    /// long work can call this to bail out early.
    pub fn check_for_abort(&self) -> Result<(), TransitionError> {
        if self.is_aborted() {
            tracing::debug!(sequence = ?self.inner.sequence, "detected abort");
            Err(TransitionError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Position among the router's transitions. `None` for transitions
    /// that never resolve models (no-ops, query-param changes, failures).
    pub fn sequence(&self) -> Option<u64> {
        self.inner.sequence
    }

    /// The intent this transition was built from, if any.
    pub fn intent(&self) -> Option<&Arc<TransitionIntent>> {
        self.inner.intent.as_ref()
    }

    /// Snapshot of the candidate tree, including infos promoted so far.
    pub fn state(&self) -> TransitionState {
        self.inner.state.lock().clone()
    }

    /// Leaf route of the candidate tree.
    pub fn target_name(&self) -> Option<&str> {
        self.inner.target_name.as_deref()
    }

    /// Deepest handler that was already resolved when the transition began.
    pub fn pivot_handler(&self) -> Option<&str> {
        self.inner.pivot_handler.as_deref()
    }

    /// True once [`abort`](Self::abort) has been called. Never resets.
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// True until the transition commits or is aborted.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// How the URL will be updated on commit. `None` leaves it alone.
    pub fn url_method(&self) -> Option<UrlMethod> {
        *self.inner.url_method.lock()
    }

    /// True when only query params changed, so no model hooks run.
    pub fn is_query_params_only(&self) -> bool {
        self.inner.query_params_only
    }

    /// True when starting this transition aborted another one.
    pub fn is_caused_by_aborting_transition(&self) -> bool {
        self.inner.caused_by_aborting.load(Ordering::SeqCst)
    }

    /// True when this transition superseded the router's first
    /// transition. Such transitions replace the URL instead of pushing one.
    pub fn is_caused_by_initial_transition(&self) -> bool {
        self.inner.caused_by_initial.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_causes(&self, aborting: bool, initial: bool) {
        self.inner.caused_by_aborting.store(aborting, Ordering::SeqCst);
        self.inner.caused_by_initial.store(initial, Ordering::SeqCst);
    }

    /// True when `route` is not part of the candidate tree.
    pub fn is_exiting(&self, route: &str) -> bool {
        self.inner.state.lock().find(route).is_none()
    }

    /// The model resolved for `route` so far.
    pub fn resolved_model(&self, route: &str) -> Option<Context> {
        self.inner.resolution.lock().resolved_models.get(route).cloned()
    }

    /// Replace the model for `route`. Called from `after_model` this
    /// rebinds the context the route resolves to.
    pub fn set_resolved_model(&self, route: &str, model: Context) {
        self.inner
            .resolution
            .lock()
            .resolved_models
            .insert(route.to_owned(), model);
    }

    /// Params per route, as known during resolution.
    pub fn params(&self) -> BTreeMap<String, Params> {
        self.inner.resolution.lock().params.clone()
    }

    /// Query params of the candidate tree.
    pub fn query_params(&self) -> QueryParams {
        self.inner.state.lock().query_params.clone()
    }

    /// Value stored with [`set_data`](Self::set_data).
    pub fn data(&self, key: &str) -> Option<Value> {
        self.inner.data.lock().get(key).cloned()
    }

    /// Attach arbitrary data for hooks later in the pipeline.
    pub fn set_data(&self, key: impl Into<String>, value: Value) {
        self.inner.data.lock().insert(key.into(), value);
    }

    /// The router that started this transition, if it is still alive.
    pub fn router(&self) -> Option<Router> {
        self.inner.router.upgrade().map(Router::from_inner)
    }

    /// True when both handles refer to the same transition.
    pub fn ptr_eq(&self, other: &Transition) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn deactivate(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
    }

    pub(crate) fn begin_resolution(&self, params: BTreeMap<String, Params>) {
        let mut resolution = self.inner.resolution.lock();
        resolution.params = params;
        resolution.resolve_index = 0;
    }

    pub(crate) fn promote(&self, index: usize, info: Arc<HandlerInfo>) {
        if let Some(slot) = self.inner.state.lock().handler_infos.get_mut(index) {
            *slot = info;
        }
    }

    pub(crate) fn set_resolve_index(&self, index: usize) {
        self.inner.resolution.lock().resolve_index = index;
    }

    pub(crate) fn set_route_params(&self, route: &str, params: Params) {
        self.inner
            .resolution
            .lock()
            .params
            .insert(route.to_owned(), params);
    }

    pub(crate) fn set_query_params(&self, query_params: QueryParams) {
        self.inner.state.lock().query_params = query_params;
    }

    pub(crate) fn visible_query_params(&self) -> Option<QueryParams> {
        self.inner.visible_query_params.lock().clone()
    }

    pub(crate) fn set_visible_query_params(&self, query_params: QueryParams) {
        *self.inner.visible_query_params.lock() = Some(query_params);
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    format!("a hook panicked: {detail}")
}

impl IntoFuture for Transition {
    type Output = TransitionResult;
    type IntoFuture = TransitionFuture;

    fn into_future(self) -> Self::IntoFuture {
        self.finished()
    }
}

impl IntoFuture for &Transition {
    type Output = TransitionResult;
    type IntoFuture = TransitionFuture;

    fn into_future(self) -> Self::IntoFuture {
        self.finished()
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("sequence", &self.inner.sequence)
            .field("target_name", &self.inner.target_name)
            .field("aborted", &self.is_aborted())
            .field("query_params_only", &self.inner.query_params_only)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BlankHandler, EventDisposition, RouteHandler};
    use serde_json::json;

    #[tokio::test]
    async fn settled_transition_resolves_for_every_awaiter() {
        let transition = Transition::detached(TransitionState::default())
            .settle(Ok(TransitionOutcome::Unchanged));
        let again = transition.clone();
        assert_eq!(transition.await, Ok(TransitionOutcome::Unchanged));
        assert_eq!(again.finished().await, Ok(TransitionOutcome::Unchanged));
    }

    #[tokio::test]
    async fn started_pipeline_settles_with_its_result() {
        let transition = Transition::detached(TransitionState::default());
        transition.start(&Handle::current(), async { Err(TransitionError::Aborted) });
        assert_eq!((&transition).await, Err(TransitionError::Aborted));
    }

    #[tokio::test]
    async fn panicking_pipeline_settles_as_interrupted() {
        let transition = Transition::detached(TransitionState::default());
        fn explode() -> TransitionResult {
            panic!("model exploded")
        }
        transition.start(&Handle::current(), async { explode() });
        assert_eq!(
            transition.finished().await,
            Err(TransitionError::Interrupted("a hook panicked: model exploded".into()))
        );
        assert!(!transition.is_active());
    }

    #[tokio::test]
    async fn unstarted_transition_reports_interruption() {
        let transition = Transition::detached(TransitionState::default());
        assert!(matches!(
            transition.finished().await,
            Err(TransitionError::Interrupted(_))
        ));
    }

    #[test]
    fn abort_is_monotonic() {
        let transition = Transition::detached(TransitionState::default());
        assert!(transition.check_for_abort().is_ok());
        transition.abort().abort();
        assert!(transition.is_aborted());
        assert!(!transition.is_active());
        assert_eq!(transition.check_for_abort(), Err(TransitionError::Aborted));
    }

    #[tokio::test]
    async fn retry_without_router_is_not_retryable() {
        let transition = Transition::detached(TransitionState::default());
        assert_eq!(transition.retry().await, Err(TransitionError::NotRetryable));
    }

    #[test]
    fn method_can_be_cleared() {
        let transition = Transition::detached(TransitionState::default());
        assert_eq!(transition.url_method(), Some(UrlMethod::Update));
        transition.method(UrlMethod::Replace);
        assert_eq!(transition.url_method(), Some(UrlMethod::Replace));
        transition.method(None);
        assert_eq!(transition.url_method(), None);
    }

    #[test]
    fn data_and_models_are_per_transition() {
        let transition = Transition::detached(TransitionState::default());
        transition.set_data("from", json!("menu"));
        transition.set_resolved_model("post", json!({"id": 1}));
        assert_eq!(transition.data("from"), Some(json!("menu")));
        assert_eq!(transition.resolved_model("post"), Some(json!({"id": 1})));
        assert!(transition.resolved_model("comment").is_none());
    }

    #[test]
    fn target_and_pivot_come_from_the_state() {
        let handler: crate::handler::SharedHandler = Arc::new(BlankHandler);
        let state = TransitionState::new(
            vec![
                Arc::new(HandlerInfo::resolved("application", handler.clone(), Value::Null, Params::new())),
                Arc::new(HandlerInfo::resolved("posts", handler.clone(), Value::Null, Params::new())),
                Arc::new(HandlerInfo::param("post", handler, Params::new())),
            ],
            QueryParams::new(),
        );
        let transition = Transition::detached(state);
        assert_eq!(transition.target_name(), Some("post"));
        assert_eq!(transition.pivot_handler(), Some("posts"));
        assert!(!transition.is_exiting("posts"));
        assert!(transition.is_exiting("about"));
    }

    #[test]
    fn trigger_targets_resolved_prefix() {
        struct Catch;
        impl RouteHandler for Catch {
            fn on_event(&self, _event: &mut RouteEvent<'_>) -> EventDisposition {
                EventDisposition::Handled
            }
        }

        let state = TransitionState::new(
            vec![
                Arc::new(HandlerInfo::param("application", Arc::new(BlankHandler), Params::new())),
                Arc::new(HandlerInfo::param("post", Arc::new(Catch), Params::new())),
            ],
            QueryParams::new(),
        );
        let transition = Transition::detached(state);
        let mut event = RouteEvent::Custom { name: "save", args: &[] };

        // only the root has been reached
        assert_eq!(
            transition.trigger(false, &mut event),
            Err(TransitionError::UnhandledEvent("save".into()))
        );
        transition.set_resolve_index(1);
        assert_eq!(transition.trigger(false, &mut event), Ok(true));
    }
}
