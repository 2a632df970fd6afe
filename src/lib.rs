//! Waypost: an abortable, hierarchical route transition engine
//!
//! Waypost moves an application from one nested route tree to another.
//! A transition computes a candidate tree from an intent (a route name with
//! contexts, or a URL), resolves each route's model through async hooks,
//! then exits, enters and sets up handlers according to the diff between
//! the committed tree and the candidate, and finally reflects the result in
//! the URL.
//!
//! # Core Concepts
//!
//! - **Handler infos**: One per route in a tree, unresolved (params or a
//!   supplied context) until its model hooks have run
//! - **Transition state**: A route tree plus query params, resolved shallow
//!   to deep
//! - **Intents**: Pure computations of a candidate tree, reusing old infos
//!   wherever nothing changed
//! - **Transitions**: Cloneable, awaitable handles; starting a new one
//!   aborts the active one, which is how redirects work
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use serde_json::json;
//! use waypost::core::{Context, Params};
//! use waypost::handler::{HookResult, RouteHandler};
//! use waypost::recognizer::RouteMap;
//! use waypost::transition::{Transition, TransitionOutcome};
//! use waypost::Router;
//!
//! struct PostHandler;
//!
//! #[async_trait]
//! impl RouteHandler for PostHandler {
//!     async fn model(&self, params: &Params, _t: &Transition) -> HookResult<Context> {
//!         Ok(json!({ "id": params["post_id"], "title": "Hello" }))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let routes = RouteMap::builder()
//!     .route("index", "/")
//!     .nest("posts", "/posts", |posts| posts.route("post", "/:post_id"))
//!     .build()
//!     .unwrap();
//!
//! let router = Router::builder()
//!     .route_map(routes)
//!     .handler("post", PostHandler)
//!     .build()
//!     .unwrap();
//!
//! let outcome = router.transition_to("/posts/1").await;
//! assert_eq!(outcome, Ok(TransitionOutcome::Entered { target: "post".into() }));
//! assert_eq!(router.context_for("post").unwrap()["title"], "Hello");
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod error;
pub mod handler;
pub mod recognizer;
pub mod router;
pub mod transition;

// Re-export commonly used types
pub use builder::{BuildError, RouteMapBuilder, RouterBuilder};
pub use core::{HandlerInfo, NamedIntent, TransitionIntent, TransitionState, UrlIntent};
pub use error::TransitionError;
pub use handler::{RouteEvent, RouteHandler};
pub use router::{Router, TransitionRequest};
pub use transition::{Transition, TransitionOutcome};
