//! Ordered route trees and their asynchronous resolution.

use super::handler_info::HandlerInfo;
use super::params::{Params, QueryParams};
use crate::error::TransitionError;
use crate::transition::Transition;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A route tree, root first.
///
/// The router keeps one committed state. Each in-flight transition owns a
/// candidate state until it commits.
#[derive(Clone, Debug, Default)]
pub struct TransitionState {
    pub handler_infos: Vec<Arc<HandlerInfo>>,
    /// Params per handler name.
    pub params: BTreeMap<String, Params>,
    pub query_params: QueryParams,
}

/// Why [`TransitionState::resolve`] stopped.
#[derive(Clone, Debug)]
pub struct ResolveFailure {
    pub error: TransitionError,
    /// Handler being resolved when the failure happened.
    pub handler_with_error: Option<String>,
    /// True when an abort check failed rather than a hook.
    pub was_aborted: bool,
    /// The partially resolved state.
    pub state: TransitionState,
}

impl TransitionState {
    pub fn new(handler_infos: Vec<Arc<HandlerInfo>>, query_params: QueryParams) -> Self {
        Self {
            handler_infos,
            params: BTreeMap::new(),
            query_params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handler_infos.is_empty()
    }

    pub fn leaf(&self) -> Option<&Arc<HandlerInfo>> {
        self.handler_infos.last()
    }

    /// Name of the deepest handler.
    pub fn target_name(&self) -> Option<&str> {
        self.leaf().map(|info| info.name())
    }

    pub fn names(&self) -> Vec<&str> {
        self.handler_infos.iter().map(|info| info.name()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&Arc<HandlerInfo>> {
        self.handler_infos.iter().find(|info| info.name() == name)
    }

    /// Params of every handler, keyed by name. Object infos contribute an
    /// empty map.
    pub fn flat_params(&self) -> BTreeMap<String, Params> {
        self.handler_infos
            .iter()
            .map(|info| {
                (
                    info.name().to_owned(),
                    info.params().cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Resolve every handler info shallow to deep.
    ///
    /// The flat params are computed before any hook runs. After each newly
    /// resolved handler its `redirect` hook runs and `should_continue` is
    /// checked again. A failed abort check yields `was_aborted`.
    pub async fn resolve<C>(
        &self,
        should_continue: C,
        payload: &Transition,
    ) -> Result<TransitionState, ResolveFailure>
    where
        C: Fn() -> Result<(), TransitionError> + Send + Sync,
    {
        let mut state = self.clone();
        state.params = state.flat_params();
        payload.begin_resolution(state.params.clone());

        let was_aborted = AtomicBool::new(false);
        let inner_should_continue = || {
            should_continue().inspect_err(|_| was_aborted.store(true, Ordering::SeqCst))
        };

        let mut resolve_index = 0;
        let result = async {
            while let Some(info) = state.handler_infos.get(resolve_index).cloned() {
                let was_already_resolved = info.is_resolved();
                let resolved = info.resolve(&inner_should_continue, payload).await?;

                state.handler_infos[resolve_index] = Arc::clone(&resolved);
                payload.promote(resolve_index, Arc::clone(&resolved));
                resolve_index += 1;
                payload.set_resolve_index(resolve_index);

                if !was_already_resolved {
                    let context = resolved.context().cloned().unwrap_or_default();
                    resolved
                        .handler()
                        .redirect(&context, payload)
                        .map_err(|e| TransitionError::hook(resolved.name(), e))?;
                }
                inner_should_continue()?;
            }
            Ok::<(), TransitionError>(())
        }
        .await;

        match result {
            Ok(()) => Ok(state),
            Err(error) => {
                let index = resolve_index.min(state.handler_infos.len().saturating_sub(1));
                Err(ResolveFailure {
                    error,
                    handler_with_error: state
                        .handler_infos
                        .get(index)
                        .map(|info| info.name().to_owned()),
                    was_aborted: was_aborted.load(Ordering::SeqCst),
                    state,
                })
            }
        }
    }
}

/// True when both trees hold the same info instances in the same order.
pub fn handler_infos_equal(a: &[Arc<HandlerInfo>], b: &[Arc<HandlerInfo>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Context;
    use crate::handler::{HookError, HookResult, RouteHandler, SharedHandler};
    use crate::params;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Step {
        name: &'static str,
        log: Log,
        fail_model: bool,
        fail_redirect: bool,
    }

    #[async_trait]
    impl RouteHandler for Step {
        async fn before_model(&self, _t: &Transition) -> HookResult {
            self.log.lock().push(format!("{}.before_model", self.name));
            Ok(())
        }

        async fn model(&self, _p: &Params, _t: &Transition) -> HookResult<Context> {
            self.log.lock().push(format!("{}.model", self.name));
            if self.fail_model {
                return Err(HookError::new("model failed"));
            }
            Ok(json!(self.name))
        }

        async fn after_model(&self, _c: &Context, _t: &Transition) -> HookResult {
            self.log.lock().push(format!("{}.after_model", self.name));
            Ok(())
        }

        fn redirect(&self, _c: &Context, _t: &Transition) -> HookResult {
            self.log.lock().push(format!("{}.redirect", self.name));
            if self.fail_redirect {
                return Err(HookError::new("redirected"));
            }
            Ok(())
        }
    }

    fn step(name: &'static str, log: &Log) -> SharedHandler {
        Arc::new(Step {
            name,
            log: log.clone(),
            fail_model: false,
            fail_redirect: false,
        })
    }

    fn state_of(handlers: Vec<(&'static str, SharedHandler)>) -> TransitionState {
        let infos = handlers
            .into_iter()
            .map(|(name, handler)| Arc::new(HandlerInfo::param(name, handler, params! { "id" => name })))
            .collect();
        TransitionState::new(infos, QueryParams::new())
    }

    #[tokio::test]
    async fn resolves_shallow_to_deep() {
        let log = Log::default();
        let state = state_of(vec![("a", step("a", &log)), ("b", step("b", &log))]);
        let payload = Transition::detached(state.clone());

        let resolved = state.resolve(|| Ok(()), &payload).await.unwrap();

        assert!(resolved.handler_infos.iter().all(|info| info.is_resolved()));
        assert_eq!(resolved.params["a"], params! { "id" => "a" });
        assert_eq!(
            *log.lock(),
            [
                "a.before_model", "a.model", "a.after_model", "a.redirect",
                "b.before_model", "b.model", "b.after_model", "b.redirect",
            ]
        );
        assert!(!state.handler_infos[0].is_resolved());
    }

    #[tokio::test]
    async fn failure_reports_handler_and_partial_state() {
        let log = Log::default();
        let failing: SharedHandler = Arc::new(Step {
            name: "b",
            log: log.clone(),
            fail_model: true,
            fail_redirect: false,
        });
        let state = state_of(vec![("a", step("a", &log)), ("b", failing), ("c", step("c", &log))]);
        let payload = Transition::detached(state.clone());

        let failure = state.resolve(|| Ok(()), &payload).await.unwrap_err();

        assert_eq!(failure.handler_with_error.as_deref(), Some("b"));
        assert!(!failure.was_aborted);
        assert!(failure.state.handler_infos[0].is_resolved());
        assert!(!failure.state.handler_infos[1].is_resolved());
        assert!(!log.lock().iter().any(|call| call.starts_with("c.")));
    }

    #[tokio::test]
    async fn abort_check_marks_was_aborted() {
        let log = Log::default();
        let state = state_of(vec![("a", step("a", &log)), ("b", step("b", &log))]);
        let payload = Transition::detached(state.clone());
        let checks = Mutex::new(0);

        let failure = state
            .resolve(
                || {
                    let mut count = checks.lock();
                    *count += 1;
                    // a: before, after before_model, after model, after after_model, after redirect
                    if *count > 5 {
                        Err(TransitionError::Aborted)
                    } else {
                        Ok(())
                    }
                },
                &payload,
            )
            .await
            .unwrap_err();

        assert!(failure.was_aborted);
        assert_eq!(failure.error, TransitionError::Aborted);
        assert_eq!(failure.handler_with_error.as_deref(), Some("b"));
        assert!(!log.lock().iter().any(|call| call.starts_with("b.")));
    }

    #[tokio::test]
    async fn redirect_failure_stops_deeper_handlers() {
        let log = Log::default();
        let redirecting: SharedHandler = Arc::new(Step {
            name: "a",
            log: log.clone(),
            fail_model: false,
            fail_redirect: true,
        });
        let state = state_of(vec![("a", redirecting), ("b", step("b", &log))]);
        let payload = Transition::detached(state.clone());

        let failure = state.resolve(|| Ok(()), &payload).await.unwrap_err();

        assert_eq!(failure.error, TransitionError::hook("a", HookError::new("redirected")));
        assert_eq!(failure.handler_with_error.as_deref(), Some("b"));
        assert!(!log.lock().iter().any(|call| call.starts_with("b.")));
    }

    #[test]
    fn handler_infos_equal_is_identity() {
        let log = Log::default();
        let state = state_of(vec![("a", step("a", &log))]);
        let same = state.handler_infos.clone();
        let copy: Vec<_> = state
            .handler_infos
            .iter()
            .map(|info| Arc::new(HandlerInfo::clone(info)))
            .collect();
        assert!(handler_infos_equal(&state.handler_infos, &same));
        assert!(!handler_infos_equal(&state.handler_infos, &copy));
        assert!(!handler_infos_equal(&state.handler_infos, &[]));
    }
}
