//! Transition intents: what a transition is asked to reach.
//!
//! An intent turns the current tree into a candidate tree without touching
//! the current one. Entries that don't need re-resolution are reused as the
//! same `Arc`, which is what lets the router detect no-op transitions.

use super::handler_info::{scalar_param, Context, HandlerInfo};
use super::params::{Params, QueryParams};
use super::state::TransitionState;
use crate::error::TransitionError;
use crate::handler::HandlerRegistry;
use crate::recognizer::{HandlerSpec, Recognizer};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// A context passed to a named transition.
///
/// Strings and numbers fill dynamic segments directly and force the model
/// hook to run; objects are used as the route's model.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteContext {
    Param(String),
    Object(Value),
}

impl RouteContext {
    pub fn is_param(&self) -> bool {
        matches!(self, Self::Param(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Param(param) => Value::String(param),
            Self::Object(value) => value,
        }
    }
}

impl From<&str> for RouteContext {
    fn from(param: &str) -> Self {
        Self::Param(param.to_owned())
    }
}

impl From<String> for RouteContext {
    fn from(param: String) -> Self {
        Self::Param(param)
    }
}

macro_rules! route_context_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for RouteContext {
                fn from(param: $ty) -> Self {
                    Self::Param(param.to_string())
                }
            }
        )*
    };
}

route_context_from_number!(i32, i64, u32, u64, usize);

impl From<Value> for RouteContext {
    fn from(value: Value) -> Self {
        match scalar_param(&value) {
            Some(param) => Self::Param(param),
            None => Self::Object(value),
        }
    }
}

/// Transition to a route by name.
///
/// Contexts fill dynamic segments from the deepest handler up.
#[derive(Debug, Default)]
pub struct NamedIntent {
    pub name: String,
    pub contexts: Vec<RouteContext>,
    pub query_params: QueryParams,
    /// Handlers from this one down are re-resolved (used by refresh).
    pub pivot_handler: Option<String>,
    pre_transition_state: Mutex<Option<TransitionState>>,
}

impl NamedIntent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn context(mut self, context: impl Into<RouteContext>) -> Self {
        self.contexts.push(context.into());
        self
    }

    pub fn contexts(mut self, contexts: Vec<RouteContext>) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn query_params(mut self, query_params: QueryParams) -> Self {
        self.query_params = query_params;
        self
    }

    pub fn pivot(mut self, pivot_handler: impl Into<String>) -> Self {
        self.pivot_handler = Some(pivot_handler.into());
        self
    }

    pub fn pre_transition_state(&self) -> Option<TransitionState> {
        self.pre_transition_state.lock().clone()
    }

    fn apply_to_state(
        &self,
        old: &TransitionState,
        recognizer: &dyn Recognizer,
        registry: &HandlerRegistry,
        is_intermediate: bool,
    ) -> Result<TransitionState, TransitionError> {
        let handlers = recognizer
            .handlers_for(&self.name)
            .ok_or_else(|| TransitionError::UnknownRoute(self.name.clone()))?;
        let target = handlers
            .last()
            .map(|spec| spec.handler.clone())
            .unwrap_or_else(|| self.name.clone());
        self.apply_to_handlers(old, &handlers, registry, &target, is_intermediate, false)
    }

    /// Build the candidate tree for `handlers`.
    ///
    /// `checking_if_active` builds resolved infos that keep the old contexts,
    /// so the result only differs from `old` where params differ.
    pub(crate) fn apply_to_handlers(
        &self,
        old: &TransitionState,
        handlers: &[HandlerSpec],
        registry: &HandlerRegistry,
        target: &str,
        is_intermediate: bool,
        checking_if_active: bool,
    ) -> Result<TransitionState, TransitionError> {
        let mut objects = self.contexts.clone();
        let mut invalidate_index = handlers.len();

        if let Some(pivot) = &self.pivot_handler {
            if let Some(position) = handlers.iter().position(|spec| &spec.handler == pivot) {
                invalidate_index = position;
            }
        }

        let mut infos = Vec::with_capacity(handlers.len());
        for (i, spec) in handlers.iter().enumerate().rev() {
            let name = spec.handler.as_str();
            let handler = registry.get(name);
            let old_info = old.handler_infos.get(i);

            let mut new_info = if spec.is_dynamic() && i < invalidate_index {
                self.get_handler_info_for_dynamic_segment(spec, registry, &mut objects, old_info, i)?
            } else {
                Arc::new(create_param_handler_info(spec, registry, &mut objects, old_info)?)
            };

            if checking_if_active {
                let old_context = old_info.and_then(|info| info.context()).cloned();
                let params = if spec.is_dynamic() && new_info.context() == old_context.as_ref() {
                    old_info
                        .and_then(|info| info.params())
                        .cloned()
                        .unwrap_or_default()
                } else {
                    new_info.serialize()
                };
                new_info = Arc::new(HandlerInfo::resolved(
                    name,
                    handler.clone(),
                    old_context.unwrap_or_default(),
                    params,
                ));
            }

            let mut to_use = match old_info {
                Some(old_info)
                    if i < invalidate_index && !new_info.should_supersede(Some(old_info.as_ref())) =>
                {
                    Arc::clone(old_info)
                }
                _ => {
                    invalidate_index = invalidate_index.min(i);
                    new_info
                }
            };

            if is_intermediate && !checking_if_active {
                let context = to_use.context().cloned().unwrap_or_default();
                to_use = Arc::new(to_use.become_resolved(None, context));
            }
            infos.push(to_use);
        }
        infos.reverse();

        if !objects.is_empty() {
            return Err(TransitionError::TooManyContexts {
                route: target.to_owned(),
            });
        }

        if !is_intermediate {
            for info in infos.iter_mut().skip(invalidate_index) {
                *info = info.get_unresolved();
            }
        }

        Ok(TransitionState::new(infos, self.query_params.clone()))
    }

    fn get_handler_info_for_dynamic_segment(
        &self,
        spec: &HandlerSpec,
        registry: &HandlerRegistry,
        objects: &mut Vec<RouteContext>,
        old_info: Option<&Arc<HandlerInfo>>,
        index: usize,
    ) -> Result<Arc<HandlerInfo>, TransitionError> {
        let context: Context = match objects.last().map(RouteContext::is_param) {
            Some(true) => {
                return Ok(Arc::new(create_param_handler_info(
                    spec, registry, objects, old_info,
                )?));
            }
            Some(false) => objects
                .pop()
                .map(RouteContext::into_value)
                .unwrap_or_default(),
            None => match old_info {
                Some(old_info) if old_info.name() == spec.handler => {
                    return Ok(Arc::clone(old_info));
                }
                _ => match self.pre_transition_state.lock().as_ref() {
                    Some(pre) => pre
                        .handler_infos
                        .get(index)
                        .and_then(|info| info.context())
                        .cloned()
                        .unwrap_or_default(),
                    None => {
                        return Err(TransitionError::MissingParams {
                            route: spec.handler.clone(),
                        })
                    }
                },
            },
        };

        Ok(Arc::new(HandlerInfo::object(
            spec.handler.clone(),
            registry.get(&spec.handler),
            context,
            spec.names.clone(),
        )))
    }
}

/// Soak up trailing param contexts for `spec`'s dynamic segments, falling
/// back to the old info's params when it is the same route.
fn create_param_handler_info(
    spec: &HandlerSpec,
    registry: &HandlerRegistry,
    objects: &mut Vec<RouteContext>,
    old_info: Option<&Arc<HandlerInfo>>,
) -> Result<HandlerInfo, TransitionError> {
    let old_params = old_info
        .filter(|info| info.name() == spec.handler)
        .and_then(|info| info.params());

    let mut params = Params::new();
    for name in spec.names.iter().rev() {
        if let Some(RouteContext::Param(value)) = objects.last() {
            params.insert(name.clone(), value.clone());
            objects.pop();
        } else if let Some(value) = old_params.and_then(|old| old.get(name)) {
            params.insert(name.clone(), value.clone());
        } else {
            return Err(TransitionError::MissingParams {
                route: spec.handler.clone(),
            });
        }
    }

    Ok(HandlerInfo::param(
        spec.handler.clone(),
        registry.get(&spec.handler),
        params,
    ))
}

/// Transition to whatever a URL recognizes as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlIntent {
    pub url: String,
}

impl UrlIntent {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn apply_to_state(
        &self,
        old: &TransitionState,
        recognizer: &dyn Recognizer,
        registry: &HandlerRegistry,
    ) -> Result<TransitionState, TransitionError> {
        let recognized = recognizer
            .recognize(&self.url)
            .ok_or_else(|| TransitionError::UnrecognizedUrl(self.url.clone()))?;

        let mut states_differ = false;
        let mut infos = Vec::with_capacity(recognized.handlers.len());
        for (i, result) in recognized.handlers.into_iter().enumerate() {
            let handler = registry.get(&result.handler);
            if handler.inaccessible_by_url() {
                return Err(TransitionError::UnrecognizedUrl(self.url.clone()));
            }

            let new_info = HandlerInfo::param(result.handler, handler, result.params);
            let old_info = old.handler_infos.get(i);
            if states_differ || new_info.should_supersede(old_info.map(Arc::as_ref)) {
                states_differ = true;
                infos.push(Arc::new(new_info));
            } else if let Some(old_info) = old_info {
                infos.push(Arc::clone(old_info));
            }
        }

        Ok(TransitionState::new(infos, recognized.query_params))
    }
}

#[derive(Debug)]
pub enum TransitionIntent {
    Named(NamedIntent),
    Url(UrlIntent),
}

impl TransitionIntent {
    /// Compute the candidate tree. `old` is never modified.
    pub fn apply_to_state(
        &self,
        old: &TransitionState,
        recognizer: &dyn Recognizer,
        registry: &HandlerRegistry,
        is_intermediate: bool,
    ) -> Result<TransitionState, TransitionError> {
        match self {
            Self::Named(intent) => intent.apply_to_state(old, recognizer, registry, is_intermediate),
            Self::Url(intent) => intent.apply_to_state(old, recognizer, registry),
        }
    }

    /// Remember the tree that was committed when a transition for this
    /// intent was aborted, so a retry can reuse its contexts.
    pub fn record_pre_transition_state(&self, state: TransitionState) {
        if let Self::Named(intent) = self {
            *intent.pre_transition_state.lock() = Some(state);
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Named(_) => None,
            Self::Url(intent) => Some(&intent.url),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(intent) => Some(&intent.name),
            Self::Url(_) => None,
        }
    }
}

impl From<NamedIntent> for TransitionIntent {
    fn from(intent: NamedIntent) -> Self {
        Self::Named(intent)
    }
}

impl From<UrlIntent> for TransitionIntent {
    fn from(intent: UrlIntent) -> Self {
        Self::Url(intent)
    }
}
