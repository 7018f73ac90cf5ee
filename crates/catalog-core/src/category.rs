//! # Category Tree Rules
//!
//! Level computation and re-parent checks for the self-referential
//! category tree.
//!
//! ## Level Invariant
//! ```text
//!   Food (level 0)
//!    ├── Dairy (level 1)
//!    │    └── Milk (level 2)
//!    └── Bakery (level 1)
//!
//!   move Dairy under Bakery:
//!
//!   Food (0)
//!    └── Bakery (1)
//!         └── Dairy (2)        ← re-parented
//!              └── Milk (3)    ← cascaded
//! ```
//!
//! Storage code fetches the rows, asks [`plan_reparent`] what to write, and
//! writes it. Nothing here touches storage.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{CoreError, CoreResult};
use crate::types::Category;

/// Level of a category placed under `parent` (root when `None`).
pub fn level_under(parent: Option<&Category>) -> i64 {
    parent.map_or(0, |p| p.level + 1)
}

/// The writes needed to move a category.
#[derive(Debug, Clone, PartialEq)]
pub struct ReparentPlan {
    pub parent_id: Option<String>,
    /// New level of the moved category.
    pub level: i64,
    /// `(id, level)` for every descendant whose level changes.
    pub descendant_levels: Vec<(String, i64)>,
}

/// Validates a move of `category` under `new_parent` and computes levels.
///
/// `tree` is every stored category (active or not), used to find
/// descendants and detect cycles.
///
/// ## Errors
/// - [`CoreError::SelfParent`] when `new_parent` is the category itself
/// - [`CoreError::CategoryCycle`] when `new_parent` lies in its subtree
pub fn plan_reparent(
    category: &Category,
    new_parent: Option<&Category>,
    tree: &[Category],
) -> CoreResult<ReparentPlan> {
    if let Some(parent) = new_parent {
        if parent.id == category.id {
            return Err(CoreError::SelfParent {
                id: category.id.clone(),
            });
        }
        if is_descendant(&parent.id, &category.id, tree) {
            return Err(CoreError::CategoryCycle {
                id: category.id.clone(),
                parent_id: parent.id.clone(),
            });
        }
    }

    let level = level_under(new_parent);
    let descendant_levels = cascade_levels(&category.id, level, tree);

    Ok(ReparentPlan {
        parent_id: new_parent.map(|p| p.id.clone()),
        level,
        descendant_levels,
    })
}

/// True when `candidate` sits somewhere below `ancestor`.
fn is_descendant(candidate: &str, ancestor: &str, tree: &[Category]) -> bool {
    let parents: HashMap<&str, Option<&str>> = tree
        .iter()
        .map(|c| (c.id.as_str(), c.parent_id.as_deref()))
        .collect();

    let mut seen = HashSet::new();
    let mut current = parents.get(candidate).copied().flatten();
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        // stored data may already contain a loop
        if !seen.insert(id) {
            return false;
        }
        current = parents.get(id).copied().flatten();
    }
    false
}

/// Levels for the subtree below `root_id` once the root sits at `root_level`.
///
/// Only descendants whose stored level differs are returned.
pub fn cascade_levels(root_id: &str, root_level: i64, tree: &[Category]) -> Vec<(String, i64)> {
    let mut children: HashMap<&str, Vec<&Category>> = HashMap::new();
    for c in tree {
        if let Some(parent) = c.parent_id.as_deref() {
            children.entry(parent).or_default().push(c);
        }
    }

    let mut updates = Vec::new();
    let mut visited = HashSet::from([root_id]);
    let mut queue = VecDeque::from([(root_id, root_level)]);

    while let Some((id, level)) = queue.pop_front() {
        for child in children.get(id).into_iter().flatten() {
            if !visited.insert(child.id.as_str()) {
                continue;
            }
            let child_level = level + 1;
            if child.level != child_level {
                updates.push((child.id.clone(), child_level));
            }
            queue.push_back((child.id.as_str(), child_level));
        }
    }

    updates
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(id: &str, parent: Option<&str>, level: i64) -> Category {
        let now = Utc::now();
        Category {
            id: id.into(),
            name: id.into(),
            slug: id.into(),
            description: String::new(),
            parent_id: parent.map(Into::into),
            level,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn tree() -> Vec<Category> {
        vec![
            category("food", None, 0),
            category("dairy", Some("food"), 1),
            category("milk", Some("dairy"), 2),
            category("bakery", Some("food"), 1),
        ]
    }

    #[test]
    fn test_level_under() {
        let food = category("food", None, 0);
        assert_eq!(level_under(None), 0);
        assert_eq!(level_under(Some(&food)), 1);
    }

    #[test]
    fn test_self_parent_rejected() {
        let tree = tree();
        let dairy = &tree[1];
        let err = plan_reparent(dairy, Some(dairy), &tree).unwrap_err();
        assert!(matches!(err, CoreError::SelfParent { .. }));
    }

    #[test]
    fn test_move_under_descendant_rejected() {
        let tree = tree();
        let err = plan_reparent(&tree[0], Some(&tree[2]), &tree).unwrap_err();
        assert!(matches!(err, CoreError::CategoryCycle { .. }));
    }

    #[test]
    fn test_reparent_cascades_levels() {
        let tree = tree();
        let plan = plan_reparent(&tree[1], Some(&tree[3]), &tree).unwrap();
        assert_eq!(plan.parent_id.as_deref(), Some("bakery"));
        assert_eq!(plan.level, 2);
        assert_eq!(plan.descendant_levels, vec![("milk".to_string(), 3)]);
    }

    #[test]
    fn test_move_to_root() {
        let tree = tree();
        let plan = plan_reparent(&tree[1], None, &tree).unwrap();
        assert_eq!(plan.parent_id, None);
        assert_eq!(plan.level, 0);
        assert_eq!(plan.descendant_levels, vec![("milk".to_string(), 1)]);
    }

    #[test]
    fn test_unchanged_levels_not_rewritten() {
        let tree = tree();
        let plan = plan_reparent(&tree[2], Some(&tree[1]), &tree).unwrap();
        assert_eq!(plan.level, 2);
        assert!(plan.descendant_levels.is_empty());
    }
}
