//! Product category hierarchy

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A product category; roots have no parent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

/// A category with its children, for tree rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: Uuid,
    pub name: String,
    pub children: Vec<CategoryNode>,
}

/// Input for creating a category
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name must be 1-100 characters"))]
    pub name: String,
    pub parent_id: Option<Uuid>,
}

/// Build the category forest, children sorted by name.
///
/// Categories whose parent is missing from the input are treated as roots.
pub fn build_category_tree(categories: &[Category]) -> Vec<CategoryNode> {
    let known: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();
    let mut children: HashMap<Option<Uuid>, Vec<&Category>> = HashMap::new();
    for category in categories {
        let parent = category.parent_id.filter(|p| known.contains(p));
        children.entry(parent).or_default().push(category);
    }

    fn build(
        parent: Option<Uuid>,
        children: &HashMap<Option<Uuid>, Vec<&Category>>,
        visited: &mut HashSet<Uuid>,
    ) -> Vec<CategoryNode> {
        let mut level: Vec<&Category> = children.get(&parent).cloned().unwrap_or_default();
        level.sort_by(|a, b| a.name.cmp(&b.name));
        let mut nodes = Vec::new();
        for c in level {
            if visited.insert(c.id) {
                nodes.push(CategoryNode {
                    id: c.id,
                    name: c.name.clone(),
                    children: build(Some(c.id), children, visited),
                });
            }
        }
        nodes
    }

    let mut visited = HashSet::new();
    build(None, &children, &mut visited)
}

/// Ancestor chain from the root down to `id` (inclusive).
///
/// Returns an empty path when `id` is unknown. Stops on cycles.
pub fn category_path(categories: &[Category], id: Uuid) -> Vec<Category> {
    let by_id: HashMap<Uuid, &Category> = categories.iter().map(|c| (c.id, c)).collect();
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut current = by_id.get(&id).copied();
    while let Some(category) = current {
        if !seen.insert(category.id) {
            break;
        }
        path.push(category.clone());
        current = category.parent_id.and_then(|p| by_id.get(&p).copied());
    }
    path.reverse();
    path
}

/// `id` and every category below it
pub fn category_descendants(categories: &[Category], id: Uuid) -> Vec<Uuid> {
    let mut result = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        result.push(current);
        stack.extend(
            categories
                .iter()
                .filter(|c| c.parent_id == Some(current))
                .map(|c| c.id),
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(name: &str, parent: Option<Uuid>) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            parent_id: parent,
        }
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let food = cat("Food", None);
        let drinks = cat("Drinks", Some(food.id));
        let juice = cat("Juice", Some(drinks.id));
        let tools = cat("Tools", None);
        let categories = vec![juice.clone(), tools.clone(), food.clone(), drinks.clone()];

        let tree = build_category_tree(&categories);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "Food");
        assert_eq!(tree[0].children[0].name, "Drinks");
        assert_eq!(tree[0].children[0].children[0].id, juice.id);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn path_runs_from_root() {
        let food = cat("Food", None);
        let drinks = cat("Drinks", Some(food.id));
        let juice = cat("Juice", Some(drinks.id));
        let categories = vec![food.clone(), drinks.clone(), juice.clone()];

        let names: Vec<String> = category_path(&categories, juice.id)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Food", "Drinks", "Juice"]);
        assert!(category_path(&categories, Uuid::new_v4()).is_empty());
    }

    #[test]
    fn descendants_include_self_and_subtree() {
        let food = cat("Food", None);
        let drinks = cat("Drinks", Some(food.id));
        let juice = cat("Juice", Some(drinks.id));
        let tools = cat("Tools", None);
        let categories = vec![food.clone(), drinks.clone(), juice.clone(), tools.clone()];

        let ids = category_descendants(&categories, drinks.id);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&drinks.id));
        assert!(ids.contains(&juice.id));
        assert!(!ids.contains(&tools.id));
    }

    #[test]
    fn cycles_do_not_loop_forever() {
        let a_id = Uuid::new_v4();
        let b_id = Uuid::new_v4();
        let categories = vec![
            Category { id: a_id, name: "A".into(), parent_id: Some(b_id) },
            Category { id: b_id, name: "B".into(), parent_id: Some(a_id) },
        ];
        assert_eq!(category_path(&categories, a_id).len(), 2);
        assert_eq!(category_descendants(&categories, a_id).len(), 2);
    }
}
