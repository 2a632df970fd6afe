//! Router orchestration.
//!
//! The router owns the committed route tree and allows at most one active
//! transition. Starting a transition aborts the active one. A transition
//! resolves its candidate tree on a Tokio task. On success the router diffs
//! the committed tree against the candidate and runs exit, reset, enter and
//! setup hooks in order, then commits and reflects the URL.
//!
//! No router state lock is held while a hook runs, so hooks may call back
//! into the router (to redirect, for example). Commits are serialized by a
//! reentrant guard: on a multi-thread runtime a newer transition waits for
//! an older one to finish entering (or roll back) before it commits.

mod host;
mod partition;
mod request;

pub use host::{MemoryUrlHost, NoUrlHost, UrlHost};
pub use partition::{partition_handlers, HandlerPartition};
pub use request::TransitionRequest;

use crate::builder::RouterBuilder;
use crate::core::{
    get_changelist, handler_infos_equal, Changelist, Context, HandlerInfo, NamedIntent, Params,
    QueryParams, ResolveFailure, TransitionIntent, TransitionLog, TransitionRecord,
    TransitionState, UrlIntent,
};
use crate::error::TransitionError;
use crate::handler::{self, HandlerRegistry, HookError, RouteEvent};
use crate::recognizer::Recognizer;
use crate::transition::{
    panic_message, Transition, TransitionOutcome, TransitionResult, UrlMethod,
};
use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use request::Target;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Called with the new tree after every committed transition.
pub type DidTransitionCallback = Box<dyn Fn(&[Arc<HandlerInfo>]) + Send + Sync>;

/// Called with the old tree, the candidate tree and the transition before
/// a transition starts resolving.
pub type WillTransitionCallback =
    Box<dyn Fn(&[Arc<HandlerInfo>], &[Arc<HandlerInfo>], &Transition) + Send + Sync>;

#[derive(Default)]
struct RouterState {
    committed: TransitionState,
    active: Option<Transition>,
    /// Handlers entered so far by the commit in progress, then the whole
    /// committed tree.
    current_handler_infos: Option<Vec<Arc<HandlerInfo>>>,
    /// Set while `QueryParamsDidChange` is being delivered.
    changed_query_params: Option<QueryParams>,
    contexts: HashMap<String, Context>,
    sequence: u64,
    log: TransitionLog,
}

pub(crate) struct RouterInner {
    recognizer: Arc<dyn Recognizer>,
    handlers: HandlerRegistry,
    host: Arc<dyn UrlHost>,
    did_transition: Option<DidTransitionCallback>,
    will_transition: Option<WillTransitionCallback>,
    state: Mutex<RouterState>,
    /// Held while the committed tree is being replaced.
    commit_guard: ReentrantMutex<()>,
}

impl RouterInner {
    pub(crate) fn committed_state(&self) -> TransitionState {
        self.state.lock().committed.clone()
    }

    /// Drop the active transition, but only if it is `transition`.
    pub(crate) fn clear_active_if(&self, transition: &Transition) {
        let mut state = self.state.lock();
        if state
            .active
            .as_ref()
            .is_some_and(|active| active.ptr_eq(transition))
        {
            state.active = None;
        }
    }
}

/// Handle to a router. Clones share the same router.
///
/// # Example
///
/// ```rust
/// use waypost::recognizer::RouteMap;
/// use waypost::router::Router;
/// use waypost::transition::TransitionOutcome;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let routes = RouteMap::builder()
///     .route("index", "/")
///     .route("about", "/about")
///     .build()
///     .unwrap();
/// let router = Router::builder().route_map(routes).build().unwrap();
///
/// let outcome = router.transition_to("/about").await;
/// assert_eq!(outcome, Ok(TransitionOutcome::Entered { target: "about".into() }));
/// assert!(router.is_active("about"));
/// # }
/// ```
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub(crate) fn assemble(
        recognizer: Arc<dyn Recognizer>,
        handlers: HandlerRegistry,
        host: Arc<dyn UrlHost>,
        did_transition: Option<DidTransitionCallback>,
        will_transition: Option<WillTransitionCallback>,
        log_capacity: usize,
    ) -> Self {
        let state = RouterState {
            log: TransitionLog::with_capacity(log_capacity),
            ..RouterState::default()
        };
        Self {
            inner: Arc::new(RouterInner {
                recognizer,
                handlers,
                host,
                did_transition,
                will_transition,
                state: Mutex::new(state),
                commit_guard: ReentrantMutex::new(()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RouterInner>) -> Self {
        Self { inner }
    }

    /// Transition to a route by name (with contexts) or by URL.
    pub fn transition_to(&self, request: impl Into<TransitionRequest>) -> Transition {
        self.do_transition(request.into(), false)
    }

    /// Like [`transition_to`](Self::transition_to), replacing the current
    /// URL instead of adding an entry.
    pub fn replace_with(&self, request: impl Into<TransitionRequest>) -> Transition {
        let transition = self.do_transition(request.into(), false);
        transition.method(UrlMethod::Replace);
        transition
    }

    /// Enter the target tree immediately, without model hooks or URL
    /// updates. Contexts must be supplied or already active.
    pub fn intermediate_transition_to(&self, request: impl Into<TransitionRequest>) -> Transition {
        self.do_transition(request.into(), true)
    }

    /// Transition to a URL that the host already shows. The URL is not
    /// updated afterwards.
    pub fn handle_url(&self, url: &str) -> Transition {
        let url = if url.starts_with('/') {
            url.to_owned()
        } else {
            format!("/{url}")
        };
        let transition = self.do_transition(TransitionRequest::url(url), false);
        transition.method(None);
        transition
    }

    /// Re-run model hooks from `pivot` (the root by default) down, keeping
    /// the current target and query params.
    pub fn refresh(&self, pivot: Option<&str>) -> Transition {
        let state = match self.active_transition() {
            Some(active) => active.state(),
            None => self.state(),
        };
        let Some(target) = state.target_name() else {
            return self.failed(None, TransitionError::NoActiveRoute);
        };

        let query_params = self
            .inner
            .state
            .lock()
            .changed_query_params
            .clone()
            .unwrap_or_else(|| state.query_params.clone());
        let pivot = pivot
            .map(str::to_owned)
            .or_else(|| state.handler_infos.first().map(|info| info.name().to_owned()));

        tracing::debug!(route = target, pivot = ?pivot, "starting a refresh transition");
        let mut intent = NamedIntent::new(target).query_params(query_params);
        intent.pivot_handler = pivot;
        self.transition_by_intent(Arc::new(intent.into()), false)
    }

    /// URL for a route, serializing the given contexts.
    pub fn generate(&self, request: impl Into<TransitionRequest>) -> Result<String, TransitionError> {
        let request = request.into();
        let name = match request.target {
            Target::Url(url) => return Ok(url),
            Target::Named(name) => name,
            Target::Current => self.current_target()?,
        };

        let intent = TransitionIntent::from(NamedIntent::new(name.as_str()).contexts(request.contexts));
        let state = intent.apply_to_state(
            &self.state(),
            self.inner.recognizer.as_ref(),
            &self.inner.handlers,
            false,
        )?;

        let mut params = Params::new();
        for info in &state.handler_infos {
            params.extend(info.serialize());
        }
        Ok(self
            .inner
            .recognizer
            .generate(&name, &params, &request.query_params)?)
    }

    /// Whether the named route is in the committed tree with the given
    /// contexts and, when supplied, query params.
    pub fn is_active(&self, request: impl Into<TransitionRequest>) -> bool {
        let request = request.into();
        let Target::Named(name) = &request.target else {
            return false;
        };

        let state = self.state();
        let Some(target) = state.target_name() else {
            return false;
        };
        let Some(recognized) = self.inner.recognizer.handlers_for(target) else {
            return false;
        };
        let Some(index) = state
            .handler_infos
            .iter()
            .take(recognized.len())
            .position(|info| info.name() == name)
        else {
            return false;
        };

        let test_state = TransitionState::new(
            state.handler_infos[..=index].to_vec(),
            QueryParams::new(),
        );
        let intent = NamedIntent::new(target).contexts(request.contexts.clone());
        let Ok(new_state) = intent.apply_to_handlers(
            &test_state,
            &recognized[..=index],
            &self.inner.handlers,
            target,
            true,
            true,
        ) else {
            return false;
        };

        let handlers_equal =
            handler_infos_equal(&new_state.handler_infos, &test_state.handler_infos);
        if !handlers_equal || request.query_params.is_empty() {
            return handlers_equal;
        }

        let mut active_query_params = request.query_params.clone();
        for (key, value) in &state.query_params {
            if let Some(slot) = active_query_params.get_mut(key) {
                *slot = value.clone();
            }
        }
        get_changelist(&active_query_params, &request.query_params).is_none()
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.inner.recognizer.has_route(name)
    }

    /// Exit every committed handler, leaf first, and clear the committed
    /// tree.
    pub fn reset(&self) -> Result<(), TransitionError> {
        let _guard = self.inner.commit_guard.lock();
        let infos = self.state().handler_infos;
        for info in infos.iter().rev() {
            tracing::debug!(route = info.name(), hook = "exit", "calling hook");
            info.handler()
                .exit(None)
                .map_err(|e| TransitionError::hook(info.name(), e))?;
        }

        let mut state = self.inner.state.lock();
        state.committed = TransitionState::default();
        state.current_handler_infos = None;
        state.contexts.clear();
        Ok(())
    }

    /// Fire `event` on the current handlers, leaf first. Fails if nothing
    /// handles it.
    pub fn trigger(&self, event: &mut RouteEvent<'_>) -> Result<bool, TransitionError> {
        let current = self.current_handler_infos();
        handler::trigger(current.as_deref(), false, event)
    }

    /// The committed tree.
    pub fn state(&self) -> TransitionState {
        self.inner.committed_state()
    }

    pub fn active_transition(&self) -> Option<Transition> {
        self.inner.state.lock().active.clone()
    }

    pub fn current_handler_infos(&self) -> Option<Vec<Arc<HandlerInfo>>> {
        self.inner.state.lock().current_handler_infos.clone()
    }

    /// Context a currently entered handler was set up with.
    pub fn context_for(&self, route: &str) -> Option<Context> {
        self.inner.state.lock().contexts.get(route).cloned()
    }

    pub fn log(&self) -> TransitionLog {
        self.inner.state.lock().log.clone()
    }

    /// Start a transition for `intent`. Intent failures settle the returned
    /// transition with the error.
    pub fn transition_by_intent(
        &self,
        intent: Arc<TransitionIntent>,
        is_intermediate: bool,
    ) -> Transition {
        match self.get_transition_by_intent(&intent, is_intermediate) {
            Ok(transition) => transition,
            Err(error) => self.failed(Some(intent), error),
        }
    }

    fn do_transition(&self, request: TransitionRequest, is_intermediate: bool) -> Transition {
        match self.intent_for(request) {
            Ok(intent) => self.transition_by_intent(Arc::new(intent), is_intermediate),
            Err(error) => self.failed(None, error),
        }
    }

    fn intent_for(&self, request: TransitionRequest) -> Result<TransitionIntent, TransitionError> {
        match request.target {
            Target::Url(url) => {
                tracing::debug!(url = %url, "attempting URL transition");
                Ok(UrlIntent::new(url).into())
            }
            Target::Named(name) => {
                tracing::debug!(route = %name, "attempting transition");
                Ok(NamedIntent::new(name)
                    .contexts(request.contexts)
                    .query_params(request.query_params)
                    .into())
            }
            Target::Current => {
                tracing::debug!("updating query params");
                Ok(NamedIntent::new(self.current_target()?)
                    .query_params(request.query_params)
                    .into())
            }
        }
    }

    fn current_target(&self) -> Result<String, TransitionError> {
        self.state()
            .target_name()
            .map(str::to_owned)
            .ok_or(TransitionError::NoActiveRoute)
    }

    fn settled(&self, intent: Option<Arc<TransitionIntent>>, result: TransitionResult) -> Transition {
        Transition::new(
            Arc::downgrade(&self.inner),
            None,
            intent,
            TransitionState::default(),
            false,
        )
        .settle(result)
    }

    fn failed(&self, intent: Option<Arc<TransitionIntent>>, error: TransitionError) -> Transition {
        self.settled(intent, Err(error))
    }

    fn get_transition_by_intent(
        &self,
        intent: &Arc<TransitionIntent>,
        is_intermediate: bool,
    ) -> Result<Transition, TransitionError> {
        let active = self.active_transition();
        let was_transitioning = active.is_some();
        let old_state = match &active {
            Some(active) => active.state(),
            None => self.state(),
        };

        let new_state = intent.apply_to_state(
            &old_state,
            self.inner.recognizer.as_ref(),
            &self.inner.handlers,
            is_intermediate,
        )?;
        let changelist = get_changelist(&old_state.query_params, &new_state.query_params);

        if handler_infos_equal(&new_state.handler_infos, &old_state.handler_infos) {
            if let Some(changelist) = &changelist {
                return Ok(self.query_params_transition(
                    changelist,
                    was_transitioning,
                    old_state,
                    &new_state,
                ));
            }
            return Ok(active
                .unwrap_or_else(|| self.settled(None, Ok(TransitionOutcome::Unchanged))));
        }

        if is_intermediate {
            let target = new_state.target_name().unwrap_or_default().to_owned();
            let result = self
                .setup_contexts(&new_state, None)
                .map(|_| TransitionOutcome::Entered { target });
            return Ok(Transition::new(
                Arc::downgrade(&self.inner),
                None,
                Some(Arc::clone(intent)),
                new_state,
                false,
            )
            .settle(result));
        }

        let runtime = Handle::try_current().map_err(|_| TransitionError::RuntimeUnavailable)?;

        let sequence = {
            let mut state = self.inner.state.lock();
            let sequence = state.sequence;
            state.sequence += 1;
            sequence
        };
        let transition = Transition::new(
            Arc::downgrade(&self.inner),
            Some(sequence),
            Some(Arc::clone(intent)),
            new_state.clone(),
            false,
        );
        transition.mark_causes(
            was_transitioning,
            active.as_ref().is_some_and(|previous| {
                previous.is_caused_by_initial_transition() || previous.sequence() == Some(0)
            }),
        );

        if let Some(previous) = &active {
            previous.supersede_with(&transition);
            previous.abort();
        }
        self.inner.state.lock().active = Some(transition.clone());

        if !was_transitioning {
            self.notify_existing_handlers(&new_state, &transition);
        }
        self.fire_query_param_did_change(&new_state, changelist.as_ref());

        let router = self.clone();
        let pipeline = {
            let transition = transition.clone();
            async move { router.run(transition).await }
        };
        transition.start(&runtime, pipeline);
        Ok(transition)
    }

    async fn run(&self, transition: Transition) -> TransitionResult {
        tracing::debug!(
            sequence = ?transition.sequence(),
            route = ?transition.target_name(),
            "resolving transition"
        );

        let state = transition.state();
        let should_continue = {
            let transition = transition.clone();
            move || transition.check_for_abort()
        };

        match state.resolve(should_continue, &transition).await {
            Ok(mut resolved) => {
                resolved.query_params = transition.query_params();
                self.finalize_transition(&transition, resolved)
            }
            Err(failure) => Err(self.handle_resolve_failure(&transition, failure)),
        }
    }

    fn handle_resolve_failure(&self, transition: &Transition, failure: ResolveFailure) -> TransitionError {
        if failure.was_aborted || transition.is_aborted() {
            tracing::debug!(sequence = ?transition.sequence(), "transition was aborted");
            return TransitionError::Aborted;
        }

        tracing::warn!(
            sequence = ?transition.sequence(),
            route = ?failure.handler_with_error,
            error = %failure.error,
            "transition failed while resolving"
        );
        let _ = transition.trigger(
            true,
            &mut RouteEvent::Error {
                error: &failure.error,
                route: failure.handler_with_error.as_deref(),
                transition,
            },
        );
        transition.abort();
        failure.error
    }

    fn finalize_transition(&self, transition: &Transition, new_state: TransitionState) -> TransitionResult {
        tracing::debug!(
            sequence = ?transition.sequence(),
            "resolved all models on destination route; finalizing transition"
        );

        match self.commit(transition, &new_state) {
            Err(error) if !error.is_aborted() => {
                tracing::warn!(
                    sequence = ?transition.sequence(),
                    error = %error,
                    "transition failed while finalizing"
                );
                let _ = transition.trigger(
                    true,
                    &mut RouteEvent::Error {
                        error: &error,
                        route: new_state.target_name(),
                        transition,
                    },
                );
                transition.abort();
                Err(error)
            }
            result => result,
        }
    }

    /// Enter the resolved tree and reflect it in the URL.
    ///
    /// The URL is updated after the new handlers have been entered. If the
    /// host rejects it, the new tree stays committed and the transition
    /// settles with the host's error.
    fn commit(&self, transition: &Transition, new_state: &TransitionState) -> TransitionResult {
        let _guard = self.inner.commit_guard.lock();
        let from = self.state().target_name().map(str::to_owned);
        let committed = self.setup_contexts(new_state, Some(transition))?;

        if transition.is_aborted() {
            let mut state = self.inner.state.lock();
            if let Some(current) = state.current_handler_infos.clone() {
                if handler_infos_equal(&state.committed.handler_infos, &new_state.handler_infos) {
                    state.committed.handler_infos = current;
                }
            }
            tracing::debug!(sequence = ?transition.sequence(), "transition was aborted during setup");
            return Err(TransitionError::Aborted);
        }

        let url = self.update_url(transition, &committed)?;
        transition.deactivate();
        self.inner.clear_active_if(transition);

        let target = committed.target_name().unwrap_or_default().to_owned();
        self.inner.state.lock().log.push(TransitionRecord {
            sequence: transition.sequence().unwrap_or_default(),
            from,
            to: target.clone(),
            url,
            timestamp: Utc::now(),
        });

        let current = self.current_handler_infos();
        let _ = handler::trigger(current.as_deref(), true, &mut RouteEvent::DidTransition);
        self.call_did_transition();

        tracing::info!(sequence = ?transition.sequence(), route = %target, "transition complete");
        Ok(TransitionOutcome::Entered { target })
    }

    fn call_did_transition(&self) {
        if let Some(callback) = &self.inner.did_transition {
            let current = self.current_handler_infos().unwrap_or_default();
            callback(&current);
        }
    }

    /// Exit, reset, enter and set up handlers to move from the committed
    /// tree to `new_state`, committing it. Rolls the commit back if a hook
    /// fails, panics, or the transition is aborted while entering.
    ///
    /// A transition only commits while it is still the router's active
    /// transition.
    fn setup_contexts(
        &self,
        new_state: &TransitionState,
        transition: Option<&Transition>,
    ) -> Result<TransitionState, TransitionError> {
        let _guard = self.inner.commit_guard.lock();
        let (old_state, old_contexts) = {
            let state = self.inner.state.lock();
            if let Some(transition) = transition {
                let owns_commit = state
                    .active
                    .as_ref()
                    .is_some_and(|active| active.ptr_eq(transition));
                if !owns_commit || transition.is_aborted() {
                    return Err(TransitionError::Aborted);
                }
            }
            (state.committed.clone(), state.contexts.clone())
        };
        let partition = partition_handlers(&old_state, new_state);

        for info in &partition.exited {
            self.inner.state.lock().contexts.remove(info.name());
            let handler = info.handler();
            tracing::debug!(route = info.name(), hook = "exit", "calling hook");
            handler
                .reset(true, transition)
                .and_then(|_| handler.exit(transition))
                .map_err(|e| TransitionError::hook(info.name(), e))?;
        }

        {
            let mut state = self.inner.state.lock();
            state.committed = new_state.clone();
            state.current_handler_infos = Some(partition.unchanged.clone());
        }

        let entered = panic::catch_unwind(AssertUnwindSafe(|| {
            self.enter_handlers(&partition, transition)
        }))
        .unwrap_or_else(|panic| Err(TransitionError::Interrupted(panic_message(panic.as_ref()))));

        if let Err(error) = entered {
            let mut state = self.inner.state.lock();
            if handler_infos_equal(&state.committed.handler_infos, &new_state.handler_infos) {
                tracing::debug!(route = ?new_state.target_name(), "rolling back commit");
                state.current_handler_infos = Some(old_state.handler_infos.clone());
                state.committed = old_state;
                state.contexts = old_contexts;
            }
            return Err(error);
        }

        let current = self.current_handler_infos().unwrap_or_default();
        let query_params =
            self.finalize_query_param_change(&current, &new_state.query_params, transition);

        let mut state = self.inner.state.lock();
        state.committed.query_params = query_params;
        Ok(state.committed.clone())
    }

    fn enter_handlers(
        &self,
        partition: &HandlerPartition,
        transition: Option<&Transition>,
    ) -> Result<(), TransitionError> {
        for info in &partition.reset {
            tracing::debug!(route = info.name(), hook = "reset", "calling hook");
            info.handler()
                .reset(false, transition)
                .map_err(|e| TransitionError::hook(info.name(), e))?;
        }
        for info in &partition.updated_context {
            self.handler_entered_or_updated(info, false, transition)?;
        }
        for info in &partition.entered {
            self.handler_entered_or_updated(info, true, transition)?;
        }
        Ok(())
    }

    fn handler_entered_or_updated(
        &self,
        info: &Arc<HandlerInfo>,
        enter: bool,
        transition: Option<&Transition>,
    ) -> Result<(), TransitionError> {
        let handler = info.handler();
        let hook_error = |e: HookError| TransitionError::hook(info.name(), e);
        let check_for_abort = || transition.map_or(Ok(()), Transition::check_for_abort);

        if enter {
            tracing::debug!(route = info.name(), hook = "enter", "calling hook");
            handler.enter(transition).map_err(hook_error)?;
        }
        check_for_abort()?;

        let context = info.context().cloned().unwrap_or_default();
        self.inner
            .state
            .lock()
            .contexts
            .insert(info.name().to_owned(), context.clone());
        handler.context_did_change();
        tracing::debug!(route = info.name(), hook = "setup", "calling hook");
        handler.setup(&context, transition).map_err(hook_error)?;
        check_for_abort()?;

        if let Some(current) = self.inner.state.lock().current_handler_infos.as_mut() {
            current.push(Arc::clone(info));
        }
        Ok(())
    }

    /// Let the new tree claim the query params. Unclaimed params pass
    /// through as visible.
    fn finalize_query_param_change(
        &self,
        infos: &[Arc<HandlerInfo>],
        query_params: &QueryParams,
        transition: Option<&Transition>,
    ) -> QueryParams {
        let mut event = RouteEvent::FinalizeQueryParamChange {
            params: query_params,
            finalized: Vec::new(),
            transition,
        };
        let handled = handler::trigger(Some(infos), true, &mut event).unwrap_or(false);
        let finalized = match event {
            RouteEvent::FinalizeQueryParamChange { finalized, .. } => finalized,
            _ => Vec::new(),
        };

        let (final_params, visible) = if !handled && finalized.is_empty() {
            (query_params.clone(), query_params.clone())
        } else {
            let mut final_params = QueryParams::new();
            let mut visible = QueryParams::new();
            for param in finalized {
                if param.visible {
                    visible.insert(param.key.clone(), param.value.clone());
                }
                final_params.insert(param.key, param.value);
            }
            (final_params, visible)
        };

        if let Some(transition) = transition {
            transition.set_visible_query_params(visible);
        }
        final_params
    }

    /// Reflect `state` in the URL host. Returns the URL, or `None` when the
    /// transition doesn't touch the URL.
    fn update_url(
        &self,
        transition: &Transition,
        state: &TransitionState,
    ) -> Result<Option<String>, TransitionError> {
        let Some(method) = transition.url_method() else {
            return Ok(None);
        };
        let Some(leaf) = state.leaf() else {
            return Ok(None);
        };

        let mut params = Params::new();
        for info in state.handler_infos.iter().rev() {
            if info.handler().inaccessible_by_url() {
                return Ok(None);
            }
            params.extend(info.serialize());
        }

        let query_params = transition
            .visible_query_params()
            .unwrap_or_else(|| state.query_params.clone());
        let url = self
            .inner
            .recognizer
            .generate(leaf.name(), &params, &query_params)?;

        let replace_and_not_aborting =
            method == UrlMethod::Replace && !transition.is_caused_by_aborting_transition();
        if transition.is_caused_by_initial_transition() || replace_and_not_aborting {
            self.inner.host.replace_url(&url)?;
        } else {
            self.inner.host.update_url(&url)?;
        }
        Ok(Some(url))
    }

    fn notify_existing_handlers(&self, new_state: &TransitionState, transition: &Transition) {
        let old_infos = self.state().handler_infos;
        let leaving: Vec<String> = old_infos
            .iter()
            .enumerate()
            .position(|(i, old)| {
                new_state
                    .handler_infos
                    .get(i)
                    .map_or(true, |new| new.name() != old.name())
            })
            .map(|index| {
                old_infos[index..]
                    .iter()
                    .map(|info| info.name().to_owned())
                    .collect()
            })
            .unwrap_or_default();

        let _ = handler::trigger(
            Some(&old_infos),
            true,
            &mut RouteEvent::WillTransition {
                transition,
                leaving: &leaving,
            },
        );
        if let Some(callback) = &self.inner.will_transition {
            callback(&old_infos, &new_state.handler_infos, transition);
        }
    }

    fn fire_query_param_did_change(&self, new_state: &TransitionState, changelist: Option<&Changelist>) {
        let Some(changelist) = changelist else {
            return;
        };

        self.inner.state.lock().changed_query_params = Some(changelist.all.clone());
        let _ = handler::trigger(
            Some(&new_state.handler_infos),
            true,
            &mut RouteEvent::QueryParamsDidChange {
                changed: &changelist.changed,
                all: &changelist.all,
                removed: &changelist.removed,
            },
        );
        self.inner.state.lock().changed_query_params = None;
    }

    /// Only query params changed: skip model hooks, commit the finalized
    /// params and update the URL.
    fn query_params_transition(
        &self,
        changelist: &Changelist,
        was_transitioning: bool,
        old_state: TransitionState,
        new_state: &TransitionState,
    ) -> Transition {
        self.fire_query_param_did_change(new_state, Some(changelist));

        if !was_transitioning {
            // a queryParamsDidChange listener started a transition
            if let Some(active) = self.active_transition() {
                return active;
            }
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => return self.failed(None, TransitionError::RuntimeUnavailable),
        };

        let transition = Transition::new(Arc::downgrade(&self.inner), None, None, old_state, true);
        let finalized = self.finalize_query_param_change(
            &new_state.handler_infos,
            &new_state.query_params,
            Some(&transition),
        );
        transition.set_query_params(finalized.clone());

        match self.active_transition() {
            Some(active) if was_transitioning => active.set_query_params(finalized),
            _ => self.inner.state.lock().committed.query_params = finalized,
        }

        let router = self.clone();
        let pipeline = {
            let transition = transition.clone();
            async move {
                let state = transition.state();
                router.update_url(&transition, &state)?;
                router.call_did_transition();
                Ok(TransitionOutcome::QueryParamsChanged)
            }
        };
        transition.start(&runtime, pipeline);
        transition
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Router")
            .field("handlers", &self.inner.handlers)
            .field("committed", &state.committed.names())
            .field("active", &state.active)
            .finish_non_exhaustive()
    }
}
