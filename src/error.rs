//! Errors a transition can settle with.

use crate::handler::HookError;
use crate::recognizer::RecognizerError;
use thiserror::Error;

/// Every failure a [`Transition`](crate::transition::Transition) can settle with.
///
/// The type is `Clone` because a transition's outcome is shared by every
/// party awaiting it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    /// The transition was superseded, redirected, or explicitly aborted.
    #[error("transition aborted")]
    Aborted,

    #[error("url '{0}' was not recognized")]
    UnrecognizedUrl(String),

    #[error("there is no route named '{0}'")]
    UnknownRoute(String),

    #[error(
        "not enough string/numeric parameters to satisfy all of the dynamic segments for route '{route}'"
    )]
    MissingParams { route: String },

    #[error("more context objects were passed than there are dynamic segments for route '{route}'")]
    TooManyContexts { route: String },

    #[error("hook failed in route '{route}': {source}")]
    Hook {
        route: String,
        #[source]
        source: HookError,
    },

    #[error("nothing handled the event '{0}'")]
    UnhandledEvent(String),

    #[error("could not trigger event '{0}': there are no active handlers")]
    NoActiveHandlers(String),

    #[error("there is no active route to transition from")]
    NoActiveRoute,

    #[error("this transition has no intent to retry")]
    NotRetryable,

    #[error("{method} is not implemented by the url host")]
    UrlHostUnimplemented { method: &'static str },

    #[error("url generation failed: {0}")]
    Recognizer(#[from] RecognizerError),

    #[error("transitions must be started from within a Tokio runtime")]
    RuntimeUnavailable,

    #[error("transition task was interrupted: {0}")]
    Interrupted(String),
}

impl TransitionError {
    /// Wrap a hook failure with the route it came from.
    pub fn hook(route: impl Into<String>, source: HookError) -> Self {
        Self::Hook {
            route: route.into(),
            source,
        }
    }

    /// True for graceful cancellation (supersession, redirect, explicit abort).
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_is_distinguished_from_failures() {
        assert!(TransitionError::Aborted.is_aborted());
        assert!(!TransitionError::UnrecognizedUrl("/nope".into()).is_aborted());
        assert!(!TransitionError::hook("post", HookError::new("boom")).is_aborted());
    }

    #[test]
    fn hook_error_names_route() {
        let err = TransitionError::hook("post", HookError::new("model exploded"));
        assert_eq!(
            err.to_string(),
            "hook failed in route 'post': model exploded"
        );
    }

    #[test]
    fn recognizer_errors_convert() {
        let err: TransitionError = RecognizerError::UnknownRoute("ghost".into()).into();
        assert!(matches!(err, TransitionError::Recognizer(_)));
    }
}
