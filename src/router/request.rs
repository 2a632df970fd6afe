//! What callers ask the router for.

use crate::core::{QueryParams, QueryValue, RouteContext};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Named(String),
    Url(String),
    /// The current leaf route, used for query-param-only updates.
    Current,
}

/// A transition request: a route name with contexts, a URL, or a
/// query-param change on the current route.
///
/// Strings starting with `/` convert into URL requests, anything else into
/// named ones.
///
/// # Example
///
/// ```rust
/// use waypost::router::TransitionRequest;
/// use serde_json::json;
///
/// let by_name = TransitionRequest::named("post")
///     .context(json!({ "id": 5 }))
///     .query_param("sort", "asc");
/// let by_url = TransitionRequest::from("/posts/5");
/// let only_query = TransitionRequest::query_params_only(Default::default());
/// # let _ = (by_name, by_url, only_query);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub(crate) target: Target,
    pub(crate) contexts: Vec<RouteContext>,
    pub(crate) query_params: QueryParams,
}

impl TransitionRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_target(Target::Named(name.into()))
    }

    /// Query params are ignored for URL requests; the URL carries its own.
    pub fn url(url: impl Into<String>) -> Self {
        Self::with_target(Target::Url(url.into()))
    }

    pub fn query_params_only(query_params: QueryParams) -> Self {
        Self::with_target(Target::Current).query_params(query_params)
    }

    fn with_target(target: Target) -> Self {
        Self {
            target,
            contexts: Vec::new(),
            query_params: QueryParams::new(),
        }
    }

    pub fn context(mut self, context: impl Into<RouteContext>) -> Self {
        self.contexts.push(context.into());
        self
    }

    pub fn contexts<I, C>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<RouteContext>,
    {
        self.contexts.extend(contexts.into_iter().map(Into::into));
        self
    }

    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn query_params(mut self, query_params: QueryParams) -> Self {
        self.query_params.extend(query_params);
        self
    }
}

impl From<&str> for TransitionRequest {
    fn from(target: &str) -> Self {
        if target.starts_with('/') {
            Self::url(target)
        } else {
            Self::named(target)
        }
    }
}

impl From<String> for TransitionRequest {
    fn from(target: String) -> Self {
        Self::from(target.as_str())
    }
}
