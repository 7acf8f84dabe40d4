//! Bounded-depth closure over the activity taxonomy.
//!
//! Expansion is breadth-first and level-batched: each level costs exactly one
//! `activity_children` call for the whole frontier. A visited set guarantees
//! termination even if the stored parent relation contains a cycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use orgdir_core::{Activity, ActivityId, ActivityNode, OrgdirResult, MAX_HIERARCHY_DEPTH};
use orgdir_storage::StorageGateway;
use tracing::debug;

/// Activity ids reachable from a root, root included.
pub type Closure = HashSet<ActivityId>;

/// Computes closures and subtrees of the activity taxonomy.
#[derive(Clone)]
pub struct HierarchyIndex {
    gateway: Arc<dyn StorageGateway>,
}

impl HierarchyIndex {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self { gateway }
    }

    /// Closure of `root_id` down to `max_depth` levels (capped at
    /// [`MAX_HIERARCHY_DEPTH`]). An unknown root yields an empty set.
    pub async fn closure(&self, root_id: ActivityId, max_depth: u32) -> OrgdirResult<Closure> {
        match self.gateway.activity_get(root_id).await? {
            Some(root) => self.closure_of(&root, max_depth).await,
            None => Ok(Closure::new()),
        }
    }

    /// Closure of an already resolved root.
    pub async fn closure_of(&self, root: &Activity, max_depth: u32) -> OrgdirResult<Closure> {
        let (visited, _) = self.expand(root.id, max_depth).await?;
        Ok(visited)
    }

    /// Nested subtree of `root_id` down to `max_depth` levels. Children are
    /// ordered by id. `None` if the root does not exist.
    pub async fn tree(
        &self,
        root_id: ActivityId,
        max_depth: u32,
    ) -> OrgdirResult<Option<ActivityNode>> {
        let root = match self.gateway.activity_get(root_id).await? {
            Some(root) => root,
            None => return Ok(None),
        };
        let (_, descendants) = self.expand(root.id, max_depth).await?;

        let mut by_parent: HashMap<ActivityId, Vec<Activity>> = HashMap::new();
        for activity in descendants {
            if let Some(parent_id) = activity.parent_id {
                by_parent.entry(parent_id).or_default().push(activity);
            }
        }
        Ok(Some(build_node(root, &mut by_parent)))
    }

    /// Level-batched BFS. Returns the visited set (root included) and the
    /// descendants in discovery order.
    async fn expand(
        &self,
        root_id: ActivityId,
        max_depth: u32,
    ) -> OrgdirResult<(Closure, Vec<Activity>)> {
        let depth = max_depth.min(MAX_HIERARCHY_DEPTH);
        let mut visited = Closure::from([root_id]);
        let mut frontier = vec![root_id];
        let mut descendants = Vec::new();

        for level in 1..=depth {
            if frontier.is_empty() {
                break;
            }
            let children = self.gateway.activity_children(&frontier).await?;
            let mut next = Vec::with_capacity(children.len());
            for child in children {
                if visited.insert(child.id) {
                    next.push(child.id);
                    descendants.push(child);
                } else {
                    debug!(
                        root_id,
                        activity_id = child.id,
                        level,
                        "activity already visited; cycle in taxonomy broken"
                    );
                }
            }
            frontier = next;
        }

        Ok((visited, descendants))
    }
}

fn build_node(activity: Activity, by_parent: &mut HashMap<ActivityId, Vec<Activity>>) -> ActivityNode {
    let mut children = by_parent.remove(&activity.id).unwrap_or_default();
    children.sort_by_key(|a| a.id);
    let children = children
        .into_iter()
        .map(|child| build_node(child, by_parent))
        .collect();
    ActivityNode { activity, children }
}
