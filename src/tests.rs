extern crate std;

use std::{ops::Range, prelude::v1::*};

use core::ptr::NonNull;

use proptest::prelude::*;

use crate::map::AvlMap;
use crate::model::{self, TestNode};
use crate::set::AvlSet;

use super::*;

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

// Height of the whole tree in edges; -1 for an empty tree.
fn height(tree: &AvlTree<TestNode>) -> i8 {
    fn node_height(tree: &AvlTree<TestNode>, link: Link<TestNode>) -> i8 {
        match link {
            Some(node) => unsafe {
                let left = node_height(tree, tree.links(node).left());
                let right = node_height(tree, tree.links(node).right());
                1 + left.max(right)
            },
            None => -1,
        }
    }

    node_height(tree, tree.root)
}

unsafe fn assert_node(tree: &AvlTree<TestNode>, node: NonNull<TestNode>, key: u32, balance: i8) {
    unsafe {
        assert_eq!(node.as_ref().key, key);
        assert_eq!(tree.links(node).balance_factor(), balance);
    }
}

#[test]
fn ascending_run_triggers_single_rotation() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [10, 20, 30] {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    unsafe {
        let root = tree.root.unwrap();
        assert_node(&tree, root, 20, 0);
        assert_node(&tree, tree.links(root).left().unwrap(), 10, 0);
        assert_node(&tree, tree.links(root).right().unwrap(), 30, 0);
    }
}

#[test]
fn zigzag_run_triggers_double_rotation() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [30, 10, 20] {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    unsafe {
        let root = tree.root.unwrap();
        assert_node(&tree, root, 20, 0);
        assert_node(&tree, tree.links(root).left().unwrap(), 10, 0);
        assert_node(&tree, tree.links(root).right().unwrap(), 30, 0);
    }
}

#[test]
fn ascending_seven_builds_perfect_tree() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in 1..=7 {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    assert_eq!(height(&tree), 2);

    unsafe {
        let root = tree.root.unwrap();
        assert_node(&tree, root, 4, 0);

        let left = tree.links(root).left().unwrap();
        let right = tree.links(root).right().unwrap();
        assert_node(&tree, left, 2, 0);
        assert_node(&tree, right, 6, 0);

        assert_node(&tree, tree.links(left).left().unwrap(), 1, 0);
        assert_node(&tree, tree.links(left).right().unwrap(), 3, 0);
        assert_node(&tree, tree.links(right).left().unwrap(), 5, 0);
        assert_node(&tree, tree.links(right).right().unwrap(), 7, 0);
    }
}

#[test]
fn removing_binary_root_promotes_successor() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [10, 20, 30] {
        tree.insert(TestNode::new(key));
    }

    let removed = tree.remove(&20).expect("item not found");
    assert_eq!(removed.key, 20);

    tree.assert_invariants();
    assert_eq!(tree.len(), 2);

    unsafe {
        let root = tree.root.unwrap();
        assert_node(&tree, root, 30, -1);
        assert_node(&tree, tree.links(root).left().unwrap(), 10, 0);
        assert!(tree.links(root).right().is_none());
    }
}

#[test]
fn duplicate_insert_is_rejected() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [2, 1, 3] {
        assert!(tree.insert(TestNode::new(key)).is_none());
    }

    let rejected = tree.insert(TestNode::new(2)).expect("duplicate not rejected");
    assert_eq!(rejected.key, 2);

    tree.assert_invariants();
    assert_eq!(tree.len(), 3);
    assert!(tree.iter().map(|node| node.key).eq([1, 2, 3]));
}

#[test]
fn insert_then_remove_restores_key_set() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [5, 2, 8, 1, 9, 3, 7] {
        tree.insert(TestNode::new(key));
    }

    let before: Vec<u32> = tree.iter().map(|node| node.key).collect();

    tree.insert(TestNode::new(6));
    tree.assert_invariants();

    let removed = tree.remove(&6).expect("item not found");
    assert_eq!(removed.key, 6);
    tree.assert_invariants();

    let after: Vec<u32> = tree.iter().map(|node| node.key).collect();
    assert_eq!(before, after);
}

#[test]
fn height_stays_within_avl_bound() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    // Fixed-seed congruential sequence keeps the test deterministic.
    let mut state = 0x9e3779b97f4a7c15u64;
    for _ in 0..4096 {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        tree.insert(TestNode::new((state >> 32) as u32));
    }

    tree.assert_invariants();

    let n = tree.len() as f64;
    let bound = 1.4405 * (n + 2.0).log2() - 0.3277;
    assert!(f64::from(height(&tree)) <= bound);
}

#[test]
fn map_insert_get_remove() {
    let mut map: AvlMap<u32, &str> = AvlMap::new();

    assert_eq!(map.insert(3, "three"), None);
    assert_eq!(map.insert(1, "one"), None);
    assert_eq!(map.insert(2, "two"), None);

    assert_eq!(map.len(), 3);
    assert_eq!(map.get(&2), Some(&"two"));
    assert_eq!(map.insert(2, "deux"), Some("two"));
    assert_eq!(map.len(), 3);

    assert!(map
        .iter()
        .map(|(&k, &v)| (k, v))
        .eq([(1, "one"), (2, "deux"), (3, "three")]));

    assert_eq!(map.first_key_value(), Some((&1, &"one")));
    assert_eq!(map.last_key_value(), Some((&3, &"three")));

    assert_eq!(map.remove(&1), Some("one"));
    assert_eq!(map.remove(&1), None);
    assert_eq!(map.pop_first(), Some((2, "deux")));
    assert_eq!(map.pop_last(), Some((3, "three")));
    assert!(map.is_empty());
}

#[test]
fn set_insert_contains_remove() {
    let mut set: AvlSet<u32> = AvlSet::new();

    assert!(set.insert(2));
    assert!(set.insert(1));
    assert!(set.insert(3));
    assert!(!set.insert(2));

    assert_eq!(set.len(), 3);
    assert!(set.contains(&1));
    assert!(!set.contains(&4));
    assert!(set.iter().copied().eq([1, 2, 3]));

    assert_eq!(set.first(), Some(&1));
    assert_eq!(set.last(), Some(&3));

    assert!(set.remove(&1));
    assert!(!set.remove(&1));
    assert_eq!(set.take(&2), Some(2));
    assert_eq!(set.pop_first(), Some(3));
    assert!(set.is_empty());
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(any::<u32>(), 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), 0..200),
    ) {
        model::run_cursor_equivalence(values, ops);
    }

    #[test]
    fn insert_all_remove_all(keys in proptest::collection::hash_set(any::<u32>(), 0..50)) {
        let keys: Vec<u32> = keys.into_iter().collect();

        let mut tree: AvlTree<TestNode> = AvlTree::new();

        for &key in &keys {
            tree.insert(TestNode::new(key));
            tree.assert_invariants();
        }

        prop_assert_eq!(tree.len(), keys.len());

        // Removal in sorted order differs from the insertion order above.
        let mut sorted = keys;
        sorted.sort_unstable();

        for &key in &sorted {
            let node = tree.remove(&key).expect("item not found");
            prop_assert_eq!(node.key, key);
            tree.assert_invariants();
        }

        prop_assert!(tree.is_empty());
    }
}
