//! One matched route segment and its resolution state.

use super::params::{params_match, Params};
use crate::error::TransitionError;
use crate::handler::{RouteEvent, RouteHandler, SharedHandler};
use crate::transition::Transition;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The value a route resolves to (its model).
pub type Context = Value;

#[derive(Clone, Debug, PartialEq)]
pub enum HandlerInfoKind {
    /// Matched by URL params; the model still has to be loaded.
    Param { params: Params },
    /// Given a context object; the context still has to pass the model hooks.
    Object { context: Context, names: Vec<String> },
    /// Final for this transition.
    Resolved { context: Context, params: Params },
}

/// A route segment in a [`TransitionState`](super::TransitionState).
///
/// Infos are never mutated. Resolution produces a new `Resolved` info and
/// the state replaces its entry, so trees may share `Arc`s with each other.
#[derive(Clone)]
pub struct HandlerInfo {
    name: String,
    handler: SharedHandler,
    kind: HandlerInfoKind,
}

impl HandlerInfo {
    /// An info matched from URL params. Its model is loaded by `model`
    /// (or `deserialize`) when the transition resolves.
    pub fn param(name: impl Into<String>, handler: SharedHandler, params: Params) -> Self {
        Self {
            name: name.into(),
            handler,
            kind: HandlerInfoKind::Param { params },
        }
    }

    /// An info for a supplied context. `names` are the dynamic segment
    /// names the context serializes into.
    pub fn object(
        name: impl Into<String>,
        handler: SharedHandler,
        context: Context,
        names: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            handler,
            kind: HandlerInfoKind::Object { context, names },
        }
    }

    /// An info whose context is final.
    ///
    /// # Example
    ///
    /// ```rust
    /// use serde_json::json;
    /// use std::sync::Arc;
    /// use waypost::core::{HandlerInfo, Params};
    /// use waypost::handler::BlankHandler;
    ///
    /// let info = HandlerInfo::resolved("post", Arc::new(BlankHandler), json!({"id": 1}), Params::new());
    /// assert!(info.is_resolved());
    /// assert_eq!(info.context(), Some(&json!({"id": 1})));
    /// ```
    pub fn resolved(
        name: impl Into<String>,
        handler: SharedHandler,
        context: Context,
        params: Params,
    ) -> Self {
        Self {
            name: name.into(),
            handler,
            kind: HandlerInfoKind::Resolved { context, params },
        }
    }

    /// Route name this info belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &SharedHandler {
        &self.handler
    }

    /// Resolution state of this info.
    pub fn kind(&self) -> &HandlerInfoKind {
        &self.kind
    }

    /// True once the model hooks have run (or were never needed).
    pub fn is_resolved(&self) -> bool {
        matches!(self.kind, HandlerInfoKind::Resolved { .. })
    }

    /// Params this info carries itself (`Param` and `Resolved`).
    pub fn params(&self) -> Option<&Params> {
        match &self.kind {
            HandlerInfoKind::Param { params } | HandlerInfoKind::Resolved { params, .. } => {
                Some(params)
            }
            HandlerInfoKind::Object { .. } => None,
        }
    }

    /// Context this info carries itself (`Object` and `Resolved`).
    pub fn context(&self) -> Option<&Context> {
        match &self.kind {
            HandlerInfoKind::Object { context, .. }
            | HandlerInfoKind::Resolved { context, .. } => Some(context),
            HandlerInfoKind::Param { .. } => None,
        }
    }

    /// URL params for this segment, from its own params or context.
    pub fn serialize(&self) -> Params {
        self.serialize_with(&Value::Null)
    }

    /// URL params for this segment. Object infos serialize `model` when it
    /// is given, their own context otherwise.
    pub fn serialize_with(&self, model: &Context) -> Params {
        match &self.kind {
            HandlerInfoKind::Param { params } | HandlerInfoKind::Resolved { params, .. } => {
                params.clone()
            }
            HandlerInfoKind::Object { context, names } => {
                let model = if model.is_null() { context } else { model };
                serialize_context(self.handler.as_ref(), model, names)
            }
        }
    }

    /// Resolved infos fall back to params so the next resolution reloads
    /// their model.
    pub fn get_unresolved(self: &Arc<Self>) -> Arc<Self> {
        match &self.kind {
            HandlerInfoKind::Resolved { params, .. } => Arc::new(Self::param(
                self.name.clone(),
                self.handler.clone(),
                params.clone(),
            )),
            _ => Arc::clone(self),
        }
    }

    /// Whether this info replaces `other` at the same tree position.
    pub fn should_supersede(&self, other: Option<&HandlerInfo>) -> bool {
        let Some(other) = other else {
            return true;
        };
        if other.name != self.name {
            return true;
        }
        if let Some(context) = self.context() {
            if other.context() != Some(context) {
                return true;
            }
        }
        match self.params() {
            Some(params) => !params_match(Some(params), other.params()),
            None => false,
        }
    }

    /// Promote to `Resolved` with `context`, recording the model and the
    /// serialized params on the transition.
    pub fn become_resolved(&self, payload: Option<&Transition>, context: Context) -> Self {
        let params = self.serialize_with(&context);
        if let Some(payload) = payload {
            payload.set_resolved_model(&self.name, context.clone());
            payload.set_route_params(&self.name, params.clone());
        }
        Self::resolved(self.name.clone(), self.handler.clone(), context, params)
    }

    /// Run this segment's model hooks, checking for an abort between every
    /// step.
    pub async fn resolve<C>(
        self: &Arc<Self>,
        should_continue: &C,
        payload: &Transition,
    ) -> Result<Arc<Self>, TransitionError>
    where
        C: Fn() -> Result<(), TransitionError> + Sync,
    {
        if let HandlerInfoKind::Resolved { context, .. } = &self.kind {
            payload.set_resolved_model(&self.name, context.clone());
            return Ok(Arc::clone(self));
        }

        should_continue()?;
        self.run_before_model(payload).await?;
        should_continue()?;
        let model = self.get_model(payload).await?;
        should_continue()?;
        let context = self.run_after_model(payload, model).await?;
        should_continue()?;

        Ok(Arc::new(self.become_resolved(Some(payload), context)))
    }

    async fn run_before_model(&self, payload: &Transition) -> Result<(), TransitionError> {
        payload.trigger(
            true,
            &mut RouteEvent::WillResolveModel {
                transition: payload,
                route: &self.name,
            },
        )?;
        tracing::debug!(route = %self.name, hook = "before_model", "calling hook");
        self.handler
            .before_model(payload)
            .await
            .map_err(|e| TransitionError::hook(&self.name, e))
    }

    async fn get_model(&self, payload: &Transition) -> Result<Context, TransitionError> {
        match &self.kind {
            HandlerInfoKind::Param { params } => {
                tracing::debug!(route = %self.name, hook = "deserialize", "calling hook");
                self.handler
                    .deserialize(params, payload)
                    .await
                    .map_err(|e| TransitionError::hook(&self.name, e))
            }
            HandlerInfoKind::Object { context, .. } | HandlerInfoKind::Resolved { context, .. } => {
                Ok(context.clone())
            }
        }
    }

    async fn run_after_model(
        &self,
        payload: &Transition,
        model: Context,
    ) -> Result<Context, TransitionError> {
        payload.set_resolved_model(&self.name, model.clone());
        tracing::debug!(route = %self.name, hook = "after_model", "calling hook");
        self.handler
            .after_model(&model, payload)
            .await
            .map_err(|e| TransitionError::hook(&self.name, e))?;
        Ok(payload.resolved_model(&self.name).unwrap_or(model))
    }
}

impl fmt::Debug for HandlerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Default context serialization.
///
/// Scalars fill the first dynamic segment directly. Otherwise the handler's
/// own `serialize` wins, and single-segment routes fall back to the
/// context's `id` field.
pub fn serialize_context(handler: &dyn RouteHandler, model: &Context, names: &[String]) -> Params {
    let mut params = Params::new();
    let Some(first) = names.first() else {
        return params;
    };

    if let Some(value) = scalar_param(model) {
        params.insert(first.clone(), value);
        return params;
    }
    if let Some(serialized) = handler.serialize(model, names) {
        return serialized;
    }
    if names.len() != 1 {
        return params;
    }
    if let Some(id) = model.get("id").and_then(scalar_param) {
        params.insert(first.clone(), id);
    }
    params
}

/// Strings and numbers are URL params; everything else is an object.
pub(crate) fn scalar_param(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
