//! Diff between the committed tree and a candidate tree.

use crate::core::{HandlerInfo, TransitionState};
use std::sync::Arc;

/// Which handlers a commit exits, enters, updates or leaves alone.
#[derive(Debug, Clone, Default)]
pub struct HandlerPartition {
    /// Same route, new context (or a parent's context changed). Root first.
    pub updated_context: Vec<Arc<HandlerInfo>>,
    /// Old handlers no longer in the tree. Leaf first.
    pub exited: Vec<Arc<HandlerInfo>>,
    /// New handlers. Root first.
    pub entered: Vec<Arc<HandlerInfo>>,
    /// Old infos kept as they are. Root first.
    pub unchanged: Vec<Arc<HandlerInfo>>,
    /// Handlers whose `reset(false)` runs before entering. Root first.
    pub reset: Vec<Arc<HandlerInfo>>,
}

/// Walk both trees index by index.
///
/// Once a route differs by name at index `i`, every new handler from `i` on
/// is entered and every old one exited. Before that, a context change marks
/// the handler as updated and every deeper handler with it.
pub fn partition_handlers(old: &TransitionState, new: &TransitionState) -> HandlerPartition {
    let mut partition = HandlerPartition::default();
    let mut handler_changed = false;
    let mut context_changed = false;

    for (i, new_info) in new.handler_infos.iter().enumerate() {
        let old_info = old.handler_infos.get(i);
        if old_info.map_or(true, |old_info| old_info.name() != new_info.name()) {
            handler_changed = true;
        }

        match old_info {
            Some(old_info) if !handler_changed => {
                if context_changed || old_info.context() != new_info.context() {
                    context_changed = true;
                    partition.updated_context.push(Arc::clone(new_info));
                } else {
                    partition.unchanged.push(Arc::clone(old_info));
                }
            }
            _ => {
                partition.entered.push(Arc::clone(new_info));
                if let Some(old_info) = old_info {
                    partition.exited.insert(0, Arc::clone(old_info));
                }
            }
        }
    }

    for old_info in old.handler_infos.iter().skip(new.handler_infos.len()) {
        partition.exited.insert(0, Arc::clone(old_info));
    }

    partition.reset = partition.updated_context.clone();
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Params, QueryParams};
    use crate::handler::BlankHandler;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn tree(nodes: &[(&str, Value)]) -> TransitionState {
        let infos = nodes
            .iter()
            .map(|(name, context)| {
                Arc::new(HandlerInfo::resolved(
                    *name,
                    Arc::new(BlankHandler),
                    context.clone(),
                    Params::new(),
                ))
            })
            .collect();
        TransitionState::new(infos, QueryParams::new())
    }

    fn names(infos: &[Arc<HandlerInfo>]) -> Vec<&str> {
        infos.iter().map(|info| info.name()).collect()
    }

    #[test]
    fn replaced_leaf_and_changed_context() {
        let old = tree(&[("a", json!(1)), ("b", json!(1)), ("c", json!(1))]);
        let new = tree(&[("a", json!(1)), ("b", json!(2)), ("d", json!(1))]);
        let partition = partition_handlers(&old, &new);

        assert_eq!(names(&partition.unchanged), ["a"]);
        assert_eq!(names(&partition.updated_context), ["b"]);
        assert_eq!(names(&partition.reset), ["b"]);
        assert_eq!(names(&partition.entered), ["d"]);
        assert_eq!(names(&partition.exited), ["c"]);
    }

    #[test]
    fn context_change_propagates_down() {
        let old = tree(&[("a", json!(1)), ("b", json!(1)), ("c", json!(1))]);
        let new = tree(&[("a", json!(2)), ("b", json!(1)), ("c", json!(1))]);
        let partition = partition_handlers(&old, &new);

        assert_eq!(names(&partition.updated_context), ["a", "b", "c"]);
        assert!(partition.unchanged.is_empty());
    }

    #[test]
    fn shorter_tree_exits_leaf_first() {
        let old = tree(&[("a", json!(1)), ("b", json!(1)), ("c", json!(1))]);
        let new = tree(&[("a", json!(1))]);
        let partition = partition_handlers(&old, &new);

        assert_eq!(names(&partition.exited), ["c", "b"]);
        assert_eq!(names(&partition.unchanged), ["a"]);
    }

    #[test]
    fn name_change_enters_everything_below() {
        let old = tree(&[("a", json!(1)), ("b", json!(1)), ("c", json!(1))]);
        let new = tree(&[("a", json!(1)), ("x", json!(1)), ("c", json!(1))]);
        let partition = partition_handlers(&old, &new);

        assert_eq!(names(&partition.entered), ["x", "c"]);
        assert_eq!(names(&partition.exited), ["c", "b"]);
    }

    #[test]
    fn empty_old_tree_enters_everything() {
        let new = tree(&[("a", json!(1)), ("b", json!(1))]);
        let partition = partition_handlers(&TransitionState::default(), &new);
        assert_eq!(names(&partition.entered), ["a", "b"]);
        assert!(partition.exited.is_empty());
    }
}
