//! Closure and tree behavior of the hierarchy index over gateway data.

use std::collections::HashSet;
use std::sync::Arc;

use orgdir_query::{Closure, HierarchyIndex};
use orgdir_test_utils::fixtures::{self, activity};
use orgdir_test_utils::generators::arb_activity_forest;
use orgdir_test_utils::{Activity, ActivityId, InMemoryGateway};
use proptest::prelude::*;

fn index(gateway: &Arc<InMemoryGateway>) -> HierarchyIndex {
    HierarchyIndex::new(gateway.clone())
}

#[tokio::test]
async fn test_chain_closure_respects_depth() {
    let gateway = Arc::new(fixtures::chain_gateway(6));
    let index = index(&gateway);

    assert_eq!(index.closure(1, 3).await.unwrap(), Closure::from([1, 2, 3, 4]));
    assert_eq!(index.closure(1, 2).await.unwrap(), Closure::from([1, 2, 3]));
    assert_eq!(index.closure(4, 3).await.unwrap(), Closure::from([4, 5, 6]));
}

#[tokio::test]
async fn test_one_children_call_per_level() {
    let gateway = Arc::new(fixtures::reference_gateway());
    let index = index(&gateway);

    let closure = index.closure(1, 3).await.unwrap();
    assert_eq!(closure, Closure::from([1, 5, 6, 7, 13, 14, 15]));
    // the third call finds no children below the level-3 leaves
    assert_eq!(gateway.calls("activity_children"), 3);
}

#[tokio::test]
async fn test_expansion_stops_on_empty_frontier() {
    let gateway = Arc::new(fixtures::reference_gateway());
    let index = index(&gateway);

    let closure = index.closure(13, 3).await.unwrap();
    assert_eq!(closure, Closure::from([13]));
    assert_eq!(gateway.calls("activity_children"), 1);
}

#[tokio::test]
async fn test_unknown_root_is_empty() {
    let gateway = Arc::new(fixtures::reference_gateway());
    let closure = index(&gateway).closure(999, 3).await.unwrap();
    assert!(closure.is_empty());
    assert_eq!(gateway.calls("activity_children"), 0);
}

#[tokio::test]
async fn test_cycle_terminates() {
    // 1 -> 2 -> 3 -> 1
    let gateway = Arc::new(fixtures::forest_gateway(&[
        activity(1, "one", Some(3), 1),
        activity(2, "two", Some(1), 2),
        activity(3, "three", Some(2), 3),
    ]));
    let index = index(&gateway);

    let closure = index.closure(1, 3).await.unwrap();
    assert_eq!(closure, Closure::from([1, 2, 3]));

    let tree = index.tree(1, 3).await.unwrap().expect("root exists");
    assert_eq!(tree.ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_self_parent_terminates() {
    let gateway = Arc::new(fixtures::forest_gateway(&[activity(7, "loop", Some(7), 1)]));
    let closure = index(&gateway).closure(7, 3).await.unwrap();
    assert_eq!(closure, Closure::from([7]));
}

#[tokio::test]
async fn test_reference_tree() {
    let gateway = Arc::new(fixtures::reference_gateway());
    let tree = index(&gateway).tree(2, 3).await.unwrap().expect("root exists");

    assert_eq!(tree.activity.name, "Automobiles");
    assert_eq!(tree.ids(), vec![2, 8, 9, 10, 16, 17]);
    assert_eq!(tree.height(), 3);

    let shallow = index(&gateway).tree(2, 1).await.unwrap().expect("root exists");
    assert_eq!(shallow.ids(), vec![2, 8, 9, 10]);
}

#[tokio::test]
async fn test_storage_failure_propagates() {
    let gateway = Arc::new(fixtures::reference_gateway());
    gateway.set_unavailable(true);
    let result = index(&gateway).closure(1, 3).await;
    orgdir_test_utils::assertions::assert_storage_unavailable(&result);
}

/// Descendants of `root` at most `depth` levels below it, root included.
fn naive_closure(forest: &[Activity], root: ActivityId, depth: u32) -> HashSet<ActivityId> {
    let mut result = HashSet::from([root]);
    let mut frontier = vec![root];
    for _ in 0..depth {
        frontier = forest
            .iter()
            .filter(|a| a.parent_id.map_or(false, |p| frontier.contains(&p)))
            .map(|a| a.id)
            .collect();
        result.extend(frontier.iter().copied());
    }
    result
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_closure_matches_bounded_descendants(
        forest in arb_activity_forest(40),
        root_pick in any::<prop::sample::Index>(),
        depth in 0u32..=5,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let root = forest[root_pick.index(forest.len())].id;
        let gateway = Arc::new(fixtures::forest_gateway(&forest));

        let closure = runtime.block_on(index(&gateway).closure(root, depth)).unwrap();

        prop_assert!(closure.contains(&root));
        prop_assert_eq!(closure, naive_closure(&forest, root, depth.min(3)));
    }
}
