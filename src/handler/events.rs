//! Events delivered to handlers, bubbling from the leaf towards the root.

use crate::core::{HandlerInfo, QueryParams, QueryValue};
use crate::error::TransitionError;
use crate::transition::Transition;
use serde_json::Value;
use std::sync::Arc;

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDisposition {
    /// No listener; the event keeps bubbling.
    #[default]
    Unhandled,
    /// Handled; bubbling stops here.
    Handled,
    /// Handled, and parents get to see it too.
    Bubble,
}

/// A query param claimed by a handler while finalizing a query-param change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedQueryParam {
    pub key: String,
    pub value: QueryValue,
    /// Visible params are reflected in the URL.
    pub visible: bool,
}

#[derive(Debug)]
pub enum RouteEvent<'a> {
    /// Sent to the current tree before a new transition starts resolving.
    WillTransition {
        transition: &'a Transition,
        /// Names of handlers that will be exited.
        leaving: &'a [String],
    },
    /// Sent before a handler's `before_model` hook. Failure to handle is
    /// ignored.
    WillResolveModel {
        transition: &'a Transition,
        route: &'a str,
    },
    QueryParamsDidChange {
        changed: &'a QueryParams,
        all: &'a QueryParams,
        removed: &'a QueryParams,
    },
    /// Lets the new tree claim, rename or hide query params by pushing onto
    /// `finalized`.
    FinalizeQueryParamChange {
        params: &'a QueryParams,
        finalized: Vec<FinalizedQueryParam>,
        transition: Option<&'a Transition>,
    },
    DidTransition,
    Error {
        error: &'a TransitionError,
        route: Option<&'a str>,
        transition: &'a Transition,
    },
    Custom {
        name: &'a str,
        args: &'a [Value],
    },
}

impl RouteEvent<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::WillTransition { .. } => "willTransition",
            Self::WillResolveModel { .. } => "willResolveModel",
            Self::QueryParamsDidChange { .. } => "queryParamsDidChange",
            Self::FinalizeQueryParamChange { .. } => "finalizeQueryParamChange",
            Self::DidTransition => "didTransition",
            Self::Error { .. } => "error",
            Self::Custom { name, .. } => name,
        }
    }
}

/// Deliver `event` to `infos` from the deepest handler up.
///
/// Returns whether any handler handled the event. Fails when nothing
/// handled it (or there is no tree) unless `ignore_failure` is set.
pub(crate) fn trigger(
    infos: Option<&[Arc<HandlerInfo>]>,
    ignore_failure: bool,
    event: &mut RouteEvent<'_>,
) -> Result<bool, TransitionError> {
    let Some(infos) = infos else {
        return if ignore_failure {
            Ok(false)
        } else {
            Err(TransitionError::NoActiveHandlers(event.name().to_owned()))
        };
    };

    let mut handled = false;
    for info in infos.iter().rev() {
        match info.handler().on_event(event) {
            EventDisposition::Unhandled => {}
            EventDisposition::Bubble => handled = true,
            EventDisposition::Handled => {
                tracing::trace!(event = event.name(), route = info.name(), "event handled");
                return Ok(true);
            }
        }
    }

    if !handled && !ignore_failure {
        return Err(TransitionError::UnhandledEvent(event.name().to_owned()));
    }
    Ok(handled)
}
