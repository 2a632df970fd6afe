//! Route trees and the algorithms over them.
//!
//! This module holds the data the transition pipeline works on:
//! - Params, query params and query-param change detection
//! - Handler infos, one per matched route segment
//! - Transition states (route trees) and their resolution
//! - Intents that compute a candidate tree from the current one
//! - The log of committed transitions
//!
//! Intents and changelists are pure. Only [`TransitionState::resolve`]
//! calls into handlers.

mod handler_info;
mod history;
mod intent;
mod params;
mod state;

pub use handler_info::{serialize_context, Context, HandlerInfo, HandlerInfoKind};
pub(crate) use handler_info::scalar_param;
pub use history::{TransitionLog, TransitionRecord, DEFAULT_LOG_CAPACITY};
pub use intent::{NamedIntent, RouteContext, TransitionIntent, UrlIntent};
pub use params::{get_changelist, Changelist, Params, QueryParams, QueryValue};
pub use state::{handler_infos_equal, ResolveFailure, TransitionState};
