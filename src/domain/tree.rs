//! Reply-tree assembly from flat comment rows.
//!
//! Rows are loaded into an id-indexed arena first and linked by lookup
//! afterwards, so a thread of any depth costs one store round trip and the
//! result cannot contain a cycle: a link is only formed to an id that is
//! present in the loaded set, and a selected root is never linked below
//! another node. Assembly is iterative, so deep threads do not grow the stack.

use std::collections::{HashMap, HashSet};

use crate::domain::entities::CommentRecord;

/// Build a nested forest from `records`.
///
/// * `root = Some(id)`: the record with that id is the only root, even when
///   its own parent is part of `records`. Missing root yields an empty forest.
/// * `root = None`: every record without a parent is a root, kept in input
///   order (the store's page order).
///
/// Siblings are ordered by `created_at` ascending, ties broken by id.
/// Records whose parent is absent from `records` are dropped rather than
/// reported; the builder never fails.
pub fn build_comment_tree(records: Vec<CommentRecord>, root: Option<i64>) -> Vec<CommentRecord> {
    let mut order: Vec<i64> = Vec::with_capacity(records.len());
    let mut nodes: HashMap<i64, CommentRecord> = HashMap::with_capacity(records.len());

    for mut record in records {
        if nodes.contains_key(&record.id) {
            continue;
        }
        record.children.clear();
        order.push(record.id);
        nodes.insert(record.id, record);
    }

    let roots: Vec<i64> = match root {
        Some(id) if nodes.contains_key(&id) => vec![id],
        Some(_) => Vec::new(),
        None => order
            .iter()
            .copied()
            .filter(|id| nodes.get(id).is_some_and(CommentRecord::is_top_level))
            .collect(),
    };
    let root_set: HashSet<i64> = roots.iter().copied().collect();

    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for id in &order {
        if root_set.contains(id) {
            continue;
        }
        let Some(parent_id) = nodes.get(id).and_then(|node| node.parent_id) else {
            continue;
        };
        if parent_id != *id && nodes.contains_key(&parent_id) {
            children.entry(parent_id).or_default().push(*id);
        }
    }

    for ids in children.values_mut() {
        ids.sort_by(|left, right| {
            let (left, right) = (&nodes[left], &nodes[right]);
            left.created_at
                .cmp(&right.created_at)
                .then(left.id.cmp(&right.id))
        });
    }

    let preorder = preorder_from(&roots, &children);

    // Reverse pre-order visits every node after all of its descendants.
    for id in preorder.iter().rev() {
        let Some(child_ids) = children.get(id) else {
            continue;
        };
        let attached: Vec<CommentRecord> = child_ids
            .iter()
            .filter_map(|child_id| nodes.remove(child_id))
            .collect();
        if let Some(node) = nodes.get_mut(id) {
            node.children = attached;
        }
    }

    roots
        .into_iter()
        .filter_map(|id| nodes.remove(&id))
        .collect()
}

fn preorder_from(roots: &[i64], children: &HashMap<i64, Vec<i64>>) -> Vec<i64> {
    let mut visited: HashSet<i64> = HashSet::new();
    let mut preorder = Vec::new();
    let mut stack: Vec<i64> = roots.iter().rev().copied().collect();

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        preorder.push(id);
        if let Some(child_ids) = children.get(&id) {
            stack.extend(
                child_ids
                    .iter()
                    .rev()
                    .copied()
                    .filter(|child| !visited.contains(child)),
            );
        }
    }

    preorder
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    fn make_record(id: i64, parent_id: Option<i64>, minute: i64) -> CommentRecord {
        let at = OffsetDateTime::UNIX_EPOCH + Duration::minutes(minute);
        CommentRecord {
            id,
            post_id: 1,
            parent_id,
            content: format!("comment {id}"),
            author: "tester".to_string(),
            created_at: at,
            updated_at: at,
            children: Vec::new(),
        }
    }

    fn ids(nodes: &[CommentRecord]) -> Vec<i64> {
        nodes.iter().map(|node| node.id).collect()
    }

    #[test]
    fn empty_input_yields_empty_forest() {
        assert!(build_comment_tree(Vec::new(), None).is_empty());
        assert!(build_comment_tree(Vec::new(), Some(7)).is_empty());
    }

    #[test]
    fn subtree_nests_replies_in_created_order() {
        // Store order deliberately differs from creation order.
        let records = vec![
            make_record(1, None, 0),
            make_record(4, Some(1), 30),
            make_record(2, Some(1), 10),
            make_record(3, Some(2), 20),
            make_record(5, Some(1), 5),
        ];

        let tree = build_comment_tree(records, Some(1));
        assert_eq!(tree.len(), 1);
        let root = &tree[0];
        assert_eq!(root.id, 1);
        assert_eq!(ids(&root.children), vec![5, 2, 4]);
        assert_eq!(ids(&root.children[1].children), vec![3]);
        assert_eq!(root.subtree_len(), 5);
    }

    #[test]
    fn equal_timestamps_order_by_id() {
        let records = vec![
            make_record(1, None, 0),
            make_record(9, Some(1), 1),
            make_record(8, Some(1), 1),
        ];

        let tree = build_comment_tree(records, Some(1));
        assert_eq!(ids(&tree[0].children), vec![8, 9]);
    }

    #[test]
    fn forest_keeps_page_order_for_roots() {
        let records = vec![
            make_record(3, None, 30),
            make_record(1, None, 10),
            make_record(2, None, 20),
            make_record(10, Some(1), 40),
        ];

        let forest = build_comment_tree(records, None);
        assert_eq!(ids(&forest), vec![3, 1, 2]);
        assert_eq!(ids(&forest[1].children), vec![10]);
    }

    #[test]
    fn orphan_is_left_unattached() {
        let records = vec![
            make_record(1, None, 0),
            make_record(2, Some(1), 1),
            make_record(3, Some(99), 2),
        ];

        let forest = build_comment_tree(records, None);
        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(forest[0].subtree_len(), 2);
    }

    #[test]
    fn selected_root_surfaces_even_when_its_parent_is_loaded() {
        let records = vec![
            make_record(1, None, 0),
            make_record(2, Some(1), 1),
            make_record(3, Some(2), 2),
        ];

        let tree = build_comment_tree(records, Some(2));
        assert_eq!(ids(&tree), vec![2]);
        assert_eq!(ids(&tree[0].children), vec![3]);
    }

    #[test]
    fn missing_root_yields_empty_forest() {
        let records = vec![make_record(1, None, 0), make_record(2, Some(1), 1)];
        assert!(build_comment_tree(records, Some(42)).is_empty());
    }

    #[test]
    fn malformed_cycles_terminate() {
        let records = vec![
            make_record(1, Some(2), 0),
            make_record(2, Some(1), 1),
            make_record(3, Some(3), 2),
        ];

        let tree = build_comment_tree(records.clone(), Some(1));
        assert_eq!(ids(&tree), vec![1]);
        assert_eq!(ids(&tree[0].children), vec![2]);
        assert!(tree[0].children[0].children.is_empty());

        assert!(build_comment_tree(records, None).is_empty());
    }

    #[test]
    fn deep_thread_does_not_recurse() {
        let depth = 2_000;
        let mut records = vec![make_record(0, None, 0)];
        for id in 1..depth {
            records.push(make_record(id, Some(id - 1), id));
        }

        let tree = build_comment_tree(records, Some(0));
        let mut cursor = &tree[0];
        let mut seen = 1;
        while let Some(next) = cursor.children.first() {
            cursor = next;
            seen += 1;
        }
        assert_eq!(seen, depth);
    }
}
