//! Property-based tests for query-param diffs, URL round trips and tree
//! partitioning.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use waypost::core::{get_changelist, HandlerInfo, Params, QueryParams, QueryValue, TransitionState};
use waypost::handler::BlankHandler;
use waypost::params;
use waypost::recognizer::{Recognizer, RecognizerError, RouteMap};
use waypost::router::partition_handlers;

prop_compose! {
    fn arbitrary_query_params()(
        entries in prop::collection::btree_map("[a-d]", "[a-z0-9]{1,4}", 0..4)
    ) -> QueryParams {
        entries
            .into_iter()
            .map(|(key, value)| (key, QueryValue::from(value)))
            .collect()
    }
}

prop_compose! {
    /// Keys and values full of URL-reserved characters.
    fn reserved_query_params()(
        entries in prop::collection::btree_map("[a-z /?#&=+%\\[\\]]{1,6}", "\\PC{0,6}", 0..4)
    ) -> QueryParams {
        entries
            .into_iter()
            .map(|(key, value)| (key, QueryValue::from(value)))
            .collect()
    }
}

prop_compose! {
    fn arbitrary_tree()(
        nodes in prop::collection::vec((0..3usize, 0..2i64), 0..5)
    ) -> TransitionState {
        let names = ["a", "b", "c"];
        let infos = nodes
            .into_iter()
            .map(|(name, context)| {
                Arc::new(HandlerInfo::resolved(
                    names[name],
                    Arc::new(BlankHandler),
                    json!(context),
                    Params::new(),
                ))
            })
            .collect();
        TransitionState::new(infos, QueryParams::new())
    }
}

fn blog() -> RouteMap {
    RouteMap::builder()
        .route("index", "/")
        .nest("posts", "/posts", |posts| {
            posts.nest("post", "/:post_id", |post| {
                post.route("comment", "/comments/:comment_id")
            })
        })
        .route("files", "/files/*path")
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn changelist_is_none_iff_maps_are_equal(
        old in arbitrary_query_params(),
        new in arbitrary_query_params(),
    ) {
        prop_assert!(get_changelist(&old, &old).is_none());
        prop_assert_eq!(get_changelist(&old, &new).is_none(), old == new);
    }

    #[test]
    fn changelist_partitions_keys(
        old in arbitrary_query_params(),
        new in arbitrary_query_params(),
    ) {
        if let Some(changes) = get_changelist(&old, &new) {
            prop_assert_eq!(&changes.all, &new);
            for (key, value) in &changes.changed {
                prop_assert_eq!(new.get(key), Some(value));
                prop_assert_ne!(old.get(key), Some(value));
            }
            for key in changes.removed.keys() {
                prop_assert!(old.contains_key(key));
                prop_assert!(!new.contains_key(key));
            }
        }
    }

    #[test]
    fn generated_urls_are_recognized(
        post_id in "\\PC{1,8}",
        comment_id in "[0-9/?#&= %]{1,5}",
        query in reserved_query_params(),
    ) {
        let map = blog();
        let url = map
            .generate("comment", &params! { "post_id" => post_id, "comment_id" => comment_id }, &query)
            .unwrap();
        let recognized = map.recognize(&url).unwrap();

        let names: Vec<_> = recognized.handlers.iter().map(|h| h.handler.as_str()).collect();
        prop_assert_eq!(names, vec!["posts", "post", "comment"]);
        prop_assert_eq!(&recognized.handlers[1].params["post_id"], &post_id);
        prop_assert_eq!(&recognized.handlers[2].params["comment_id"], &comment_id);
        prop_assert_eq!(recognized.query_params, query);
    }

    #[test]
    fn empty_dynamic_segments_are_not_generated(query in reserved_query_params()) {
        prop_assert_eq!(
            blog().generate("post", &params! { "post_id" => "" }, &query),
            Err(RecognizerError::EmptyParam { route: "post".into(), param: "post_id".into() })
        );
    }

    #[test]
    fn star_segments_capture_the_rest(parts in prop::collection::vec("[a-z]{1,5}", 1..4)) {
        let path = parts.join("/");
        let recognized = blog().recognize(&format!("/files/{path}")).unwrap();
        prop_assert_eq!(&recognized.handlers[0].params["path"], &path);
    }

    #[test]
    fn partition_accounts_for_every_handler(
        old in arbitrary_tree(),
        new in arbitrary_tree(),
    ) {
        let partition = partition_handlers(&old, &new);
        let kept = partition.unchanged.len() + partition.updated_context.len();

        prop_assert_eq!(kept + partition.entered.len(), new.handler_infos.len());
        prop_assert_eq!(kept + partition.exited.len(), old.handler_infos.len());
        prop_assert_eq!(partition.reset.len(), partition.updated_context.len());
    }

    #[test]
    fn partition_of_identical_trees_changes_nothing(tree in arbitrary_tree()) {
        let partition = partition_handlers(&tree, &tree);
        prop_assert_eq!(partition.unchanged.len(), tree.handler_infos.len());
        prop_assert!(partition.entered.is_empty());
        prop_assert!(partition.exited.is_empty());
        prop_assert!(partition.updated_context.is_empty());
    }
}
