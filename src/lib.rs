//! An intrusive AVL tree.

// Conventions used in comments:
// - The height of a node `x`, h(x), is the edge count of the longest path from `x`
//   down to a leaf; a missing child has height -1.
// - The balance factor of `x` is bf(x) = h(right(x)) - h(left(x)).
// - A node leans toward a side when its balance factor is nonzero; the side it leans
//   toward is the sign of the factor (left = -1, right = +1).
//
// The fundamental invariants of an AVL tree are:
// 1. bf(x) ∈ {-1, 0, +1} for every node `x`.
// 2. bf(x) always equals the true height difference of `x`'s subtrees.
//
// Attaching or unlinking a leaf changes one subtree height by one, so a factor of ±2
// can appear on the retrace path between a mutation and the rotation that repairs it.
// Such a node exists only inside `rebalance_inserted`/`rebalance_removed`; it is never
// observable from outside a mutating call.

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, marker::PhantomPinned, mem, ops::Not,
    pin::Pin, ptr::NonNull,
};

use cordyceps::Linked;

mod cursor;
mod debug;
mod entry;
mod iter;

pub mod map;
pub mod set;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use cursor::{Cursor, CursorMut};
pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use iter::Iter;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// The tree orders nodes by [`TreeNode::key`] and repairs the height-balance invariant
/// after every insertion and removal by retracing the mutated path and rotating where
/// a node's subtrees come to differ in height by two.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

impl<T: ?Sized> core::fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Links").finish_non_exhaustive()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

impl Dir {
    /// The balance factor of a node leaning one level toward this side.
    #[inline]
    fn balance(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Some(root) = self.root {
            unsafe {
                assert!(
                    T::links(root).as_ref().parent().is_none(),
                    "root must not have a parent"
                );
                self.assert_invariants_at(root);
            }
        }
    }

    // Checks the search-order, balance, and parent-consistency invariants below `node`,
    // returning the height of `node`'s subtree.
    unsafe fn assert_invariants_at(&self, node: NonNull<T>) -> i8 {
        unsafe {
            let mut heights = [-1i8; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    // Ensure the child sorts on its side of this node.
                    match dir {
                        Dir::Left => assert!(child.as_ref().key() < node.as_ref().key()),
                        Dir::Right => assert!(child.as_ref().key() > node.as_ref().key()),
                    }

                    // Ensure the child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    heights[dir as usize] = self.assert_invariants_at(child);
                }
            }

            // Ensure the stored balance factor is in range and agrees with the true
            // subtree heights.
            let balance = T::links(node).as_ref().balance_factor();
            assert!((-1..=1).contains(&balance), "balance factor out of range");
            assert_eq!(balance, heights[1] - heights[0]);

            1 + heights[0].max(heights[1])
        }
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Returns a pinned mutable reference to the node corresponding to `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;

        // SAFETY: `ptr` is an element of `self`, and elements are pinned by contract
        // with `Linked`.
        Some(unsafe { Pin::new_unchecked(ptr.as_mut()) })
    }

    /// Returns `true` if the tree contains a node corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<&T> {
        self.first_raw().map(|node| unsafe { node.as_ref() })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<&T> {
        self.last_raw().map(|node| unsafe { node.as_ref() })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        self.first_raw().map(|node| unsafe { self.remove_at(node) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        self.last_raw().map(|node| unsafe { self.remove_at(node) })
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        let root = self.root?;
        Some(unsafe { self.min_in_subtree(root).0 })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        let root = self.root?;
        Some(unsafe { self.max_in_subtree(root) })
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[cfg(not(debug_assertions))]
    #[inline]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Option<NonNull<T>>,
    ) {
        unsafe {
            if T::links(parent).as_ref().child(Dir::Left) == Some(old_child) {
                T::links(parent).as_mut().set_child(Dir::Left, new_child);
            } else {
                T::links(parent).as_mut().set_child(Dir::Right, new_child);
            }
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[cfg(debug_assertions)]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Option<NonNull<T>>,
    ) {
        unsafe {
            if T::links(parent).as_ref().child(Dir::Left) == Some(old_child) {
                if let Some(new_child) = new_child {
                    assert_ne!(
                        T::links(parent).as_ref().child(Dir::Right),
                        Some(new_child),
                        "`new_child` must not be a child of `parent`"
                    );
                }

                T::links(parent).as_mut().set_child(Dir::Left, new_child);
            } else if T::links(parent).as_ref().child(Dir::Right) == Some(old_child) {
                if let Some(new_child) = new_child {
                    assert_ne!(
                        T::links(parent).as_ref().child(Dir::Left),
                        Some(new_child),
                        "`new_child` must not be a child of `parent`"
                    );
                }

                T::links(parent).as_mut().set_child(Dir::Right, new_child);
            } else {
                unreachable!("`old_child` must be a child of `parent`");
            }
        }
    }

    // Performs a single rotation, moving `up` up and its parent `down` down, and
    // recomputes the balance factors of both.
    //
    // `up` must be the child of `down` on the side whose subtree is two levels taller.
    fn rotate_at(&mut self, down: NonNull<T>, up: NonNull<T>) {
        unsafe {
            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let dir = if T::links(down).as_ref().right() == Some(up) {
                Dir::Left
            } else {
                Dir::Right
            };

            debug_assert_ne!(self.root, Some(up));

            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            T::links(up).as_mut().set_child(dir, Some(down));
            let parent = T::links(down).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));

            // `up` is balanced at entry only when a removal shortened `down`'s other
            // side; the rotated subtree then keeps its height and both nodes stay
            // uneven. In every other case (always after an insertion) both end up
            // balanced.
            if T::links(up).as_ref().balance_factor() == 0 {
                T::links(down).as_mut().set_balance((!dir).balance());
                T::links(up).as_mut().set_balance(dir.balance());
            } else {
                T::links(down).as_mut().set_balance(0);
                T::links(up).as_mut().set_balance(0);
            }
        }
    }

    // Performs a double rotation, moving `up` up two levels past `down_first` and
    // `down_second`, and recomputes the balance factors of all three.
    //
    // `up` must be the child of `down_first` facing `down_second` (the inner grandchild
    // of the unbalanced node).
    fn rotate_twice_at(&mut self, down_second: NonNull<T>, down_first: NonNull<T>, up: NonNull<T>) {
        unsafe {
            let dir = if T::links(down_first).as_ref().right() == Some(up) {
                Dir::Right
            } else {
                Dir::Left
            };

            // `up`'s balance at entry decides how its subtrees land under the two
            // demoted nodes.
            let up_balance = T::links(up).as_ref().balance_factor();

            let across_first = T::links(up).as_ref().child(!dir);
            let across_second = T::links(up).as_ref().child(dir);

            self.maybe_set_parent(across_first, Some(down_first));

            T::links(down_first).as_mut().set_child(dir, across_first);
            T::links(down_first).as_mut().set_parent(Some(up));

            self.maybe_set_parent(across_second, Some(down_second));

            T::links(down_second)
                .as_mut()
                .set_child(!dir, across_second);
            let parent = T::links(down_second).as_mut().set_parent(Some(up));

            T::links(up).as_mut().set_parent(parent);
            T::links(up).as_mut().set_child(!dir, Some(down_first));
            T::links(up).as_mut().set_child(dir, Some(down_second));

            self.replace_child_or_set_root(parent, down_second, Some(up));

            // `up` ends balanced. Whichever demoted node received `up`'s shorter
            // subtree absorbs a lean away from it; with `up` balanced at entry both
            // of its subtrees are the same height and both nodes end up balanced.
            let outer = (!dir).balance();
            if up_balance == 0 {
                T::links(down_second).as_mut().set_balance(0);
                T::links(down_first).as_mut().set_balance(0);
            } else if up_balance == outer {
                T::links(down_second).as_mut().set_balance(-outer);
                T::links(down_first).as_mut().set_balance(0);
            } else {
                T::links(down_second).as_mut().set_balance(0);
                T::links(down_first).as_mut().set_balance(outer);
            }
            T::links(up).as_mut().set_balance(0);
        }
    }

    // Returns which child slot of `parent` holds `child`.
    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { T::links(parent).as_ref().left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an item with an equal key, the tree is left
    /// unchanged and `item` is handed back to the caller.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        let Some(root) = self.root else {
            unsafe { self.insert_as_root(ptr) };
            return None;
        };

        let mut cur = root;

        // Descend the tree, looking for the vacant slot where `item` belongs.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(cur.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,

                // The key is already present. Reject the new item without taking
                // ownership of it.
                Ordering::Equal => return Some(unsafe { T::from_ptr(ptr) }),
            };

            match unsafe { T::links(cur).as_ref().child(dir) } {
                Some(child) => cur = child,
                None => {
                    unsafe { self.insert_as_child(cur, dir, ptr) };
                    return None;
                }
            }
        }
    }

    pub(crate) unsafe fn insert_as_root(&mut self, ptr: NonNull<T>) {
        unsafe { T::links(ptr).as_mut().clear() };

        self.root = Some(ptr);
        self.len += 1;
    }

    pub(crate) unsafe fn insert_as_child(&mut self, parent: NonNull<T>, dir: Dir, ptr: NonNull<T>) {
        unsafe {
            debug_assert!(T::links(parent).as_ref().child(dir).is_none());

            // New nodes always enter the tree as balanced leaves.
            let links = T::links(ptr).as_mut();
            links.clear();
            links.set_parent(Some(parent));

            T::links(parent).as_mut().set_child(dir, Some(ptr));
        }

        self.rebalance_inserted(ptr);
        self.len += 1;
    }

    // Performs a bottom-up retrace of the tree after the insertion of `node`.
    //
    // `node`'s subtree has grown one level taller. Each ancestor's balance factor is
    // updated in turn until the growth is either absorbed by a shorter sibling side or
    // repaired by a rotation; both leave the subtree above at its pre-insertion height,
    // ending the retrace.
    fn rebalance_inserted(&mut self, node: NonNull<T>) {
        debug_assert_eq!(unsafe { T::links(node).as_ref().balance_factor() }, 0);

        let mut cur = node;

        while let Some(parent) = unsafe { T::links(cur).as_ref().parent() } {
            let dir = unsafe { self.which_child(parent, cur) };
            let parent_balance = unsafe { T::links(parent).as_ref().balance_factor() };

            debug_assert!(parent_balance.abs() <= 1);

            if parent_balance == dir.balance() {
                // The subtree grew on the side `parent` was already leaning toward,
                // putting `parent` out of AVL balance. If `cur` leans toward the
                // interior of `parent`'s subtree, its inner child must come up two
                // levels; otherwise rotating `cur` up once suffices.
                let cur_balance = unsafe { T::links(cur).as_ref().balance_factor() };

                if cur_balance == (!dir).balance() {
                    let inner = unsafe {
                        T::links(cur)
                            .as_ref()
                            .child(!dir)
                            .expect("interior-leaning node must have an inner child")
                    };
                    self.rotate_twice_at(parent, cur, inner);
                } else {
                    self.rotate_at(parent, cur);
                }

                return;
            }

            if parent_balance == (!dir).balance() {
                // The growth is absorbed: `parent`'s shorter side caught up and its
                // overall height is unchanged.
                unsafe { T::links(parent).as_mut().set_balance(0) };
                return;
            }

            // `parent` was balanced. It now leans toward `cur`, its own subtree has
            // grown a level, and the retrace continues upward.
            unsafe { T::links(parent).as_mut().set_balance(dir.balance()) };
            cur = parent;
        }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    // Returns the maximum node in the subtree.
    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        let mut cur = root;

        while let Some(right) = unsafe { T::links(cur).as_ref().right() } {
            cur = right;
        }

        cur
    }

    // Returns the in-order successor of `node`, if any.
    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe {
            if let Some(right) = T::links(node).as_ref().right() {
                return Some(self.min_in_subtree(right).0);
            }

            let mut cur = node;
            while let Some(parent) = T::links(cur).as_ref().parent() {
                if self.which_child(parent, cur) == Dir::Left {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    // Returns the in-order predecessor of `node`, if any.
    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe {
            if let Some(left) = T::links(node).as_ref().left() {
                return Some(self.max_in_subtree(left));
            }

            let mut cur = node;
            while let Some(parent) = T::links(cur).as_ref().parent() {
                if self.which_child(parent, cur) == Dir::Right {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    /// Removes the item associated with `key` from the tree, if any.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`,
    /// and not any other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are three possible cases:
        //
        // 1. `node` is a leaf. Unlinking it leaves its parent's vacated side one level
        //    shorter.
        //
        // 2. `node` has one child. The child is spliced into `node`'s place, and the
        //    parent's side holding the spliced subtree is one level shorter.
        //
        // 3. `node` has two children. Its in-order successor, the leftmost node of the
        //    right subtree, is spliced out of its own position (elevating the
        //    successor's right child, if any) and then assumes `node`'s position and
        //    balance factor. The height loss appears where the successor used to be:
        //    below its old parent's left side, or below the successor itself when it
        //    was `node`'s right child.
        //
        // In all three cases the retrace starts at the parent of the spliced-out
        // position, on the side that lost a level.

        unsafe {
            let parent = T::links(node).as_ref().parent();
            let left = T::links(node).as_ref().left();
            let right = T::links(node).as_ref().right();

            let shrunk: Option<(NonNull<T>, Dir)> = match (left, right) {
                (Some(left), Some(right)) => {
                    let (successor, successor_parent) = self.min_in_subtree(right);

                    let start = match successor_parent {
                        Some(successor_parent) => {
                            // Splice the successor out of the left edge of `right`'s
                            // subtree and give it `node`'s right subtree.
                            let successor_right = T::links(successor).as_ref().right();
                            T::links(successor_parent)
                                .as_mut()
                                .set_left(successor_right);
                            self.maybe_set_parent(successor_right, Some(successor_parent));

                            T::links(successor).as_mut().set_right(Some(right));
                            T::links(right).as_mut().set_parent(Some(successor));

                            (successor_parent, Dir::Left)
                        }

                        // The successor is `node`'s right child and keeps its own
                        // right subtree; the vacancy is below its right side.
                        None => (successor, Dir::Right),
                    };

                    // The successor takes over `node`'s position and balance factor.
                    self.replace_child_or_set_root(parent, node, Some(successor));
                    T::links(successor).as_mut().set_parent(parent);
                    T::links(successor).as_mut().set_left(Some(left));
                    T::links(left).as_mut().set_parent(Some(successor));

                    let balance = T::links(node).as_ref().balance_factor();
                    T::links(successor).as_mut().set_balance(balance);

                    Some(start)
                }

                (Some(child), None) | (None, Some(child)) => {
                    // Splice the unary node out by relinking its parent to its sole
                    // child.
                    let dir = parent.map(|p| self.which_child(p, node));

                    self.replace_child_or_set_root(parent, node, Some(child));
                    T::links(child).as_mut().set_parent(parent);

                    parent.zip(dir)
                }

                (None, None) => {
                    let dir = parent.map(|p| self.which_child(p, node));

                    self.replace_child_or_set_root(parent, node, None);

                    parent.zip(dir)
                }
            };

            if let Some((start, dir)) = shrunk {
                self.rebalance_removed(start, dir);
            }

            T::links(node).as_mut().clear();
            self.len -= 1;

            T::from_ptr(node)
        }
    }

    // Performs a bottom-up retrace of the tree after a removal below `parent`.
    //
    // `parent`'s subtree on the `shrunk` side has lost one level of height. Each
    // ancestor's balance factor is updated in turn; unlike insertion, a rotation here
    // may leave the repaired subtree a level shorter than it was, in which case the
    // retrace must keep climbing.
    fn rebalance_removed(&mut self, parent: NonNull<T>, shrunk: Dir) {
        let mut parent = parent;
        let mut shrunk = shrunk;

        loop {
            let parent_balance = unsafe { T::links(parent).as_ref().balance_factor() };

            debug_assert!(parent_balance.abs() <= 1);

            // The node whose subtree is one level shorter after this step.
            let next;

            if parent_balance == (!shrunk).balance() {
                // `parent` was already leaning away from the side that shrank and is
                // now out of AVL balance. Restructure around the sibling of the
                // removed subtree.
                let sibling = unsafe {
                    T::links(parent)
                        .as_ref()
                        .child(!shrunk)
                        .expect("out-of-balance node must have a child on its taller side")
                };
                let sibling_balance = unsafe { T::links(sibling).as_ref().balance_factor() };

                if sibling_balance == shrunk.balance() {
                    // The sibling leans toward the interior of `parent`'s subtree;
                    // its inner child comes up two levels.
                    let inner = unsafe {
                        T::links(sibling)
                            .as_ref()
                            .child(shrunk)
                            .expect("interior-leaning node must have an inner child")
                    };
                    self.rotate_twice_at(parent, sibling, inner);
                    next = inner;
                } else {
                    self.rotate_at(parent, sibling);

                    if sibling_balance == 0 {
                        // The rotated subtree kept its height; nothing above changes.
                        return;
                    }

                    next = sibling;
                }
            } else if parent_balance == 0 {
                // `parent` now leans toward the side that did not shrink; its overall
                // height is unchanged and the retrace ends.
                unsafe { T::links(parent).as_mut().set_balance((!shrunk).balance()) };
                return;
            } else {
                // `parent` was leaning toward the side that shrank; it is balanced
                // now, but its subtree is one level shorter.
                unsafe { T::links(parent).as_mut().set_balance(0) };
                next = parent;
            }

            match unsafe { T::links(next).as_ref().parent() } {
                Some(p) => {
                    shrunk = unsafe { self.which_child(p, next) };
                    parent = p;
                }
                None => return,
            }
        }
    }

    /// Returns the entry in the tree associated with `key`.
    pub fn entry<'tree, 'key, Q>(&'tree mut self, key: &'key Q) -> Entry<'tree, 'key, T, Q>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let Some(root) = self.root else {
            return unsafe { Entry::vacant_root(self, key) };
        };

        let mut cur = root;

        loop {
            let ordering = key.cmp(unsafe { cur.as_ref().key().borrow() });

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
                Ordering::Equal => return unsafe { Entry::occupied(self, cur) },
            };

            match unsafe { T::links(cur).as_ref().child(dir) } {
                Some(child) => cur = child,
                None => return unsafe { Entry::vacant_child(self, key, cur, dir) },
            }
        }
    }

    /// Returns an iterator over the elements of the tree, sorted by key.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing to the first element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::first(self)
    }

    /// Returns a mutable cursor pointing to the first element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::first(self)
    }

    /// Returns a cursor pointing to the last element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::last(self)
    }

    /// Returns a mutable cursor pointing to the last element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::last(self)
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| T::links(cur).as_ref().parent());

                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None). Balance factors
                // go stale from here on, but every node is dropped before the loop
                // ends.
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had
                // no parent, the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    pub(crate) unsafe fn links<'a>(&'a self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    pub(crate) unsafe fn links_mut<'a>(&'a mut self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns the node's balance factor: the height of its right subtree minus the
    /// height of its left subtree.
    #[inline]
    pub fn balance_factor(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    pub(crate) fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    pub(crate) fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    pub(crate) fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    pub(crate) fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    pub(crate) fn set_balance(&mut self, balance: i8) {
        self.inner.get_mut().balance = balance;
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.balance = 0;
    }
}
