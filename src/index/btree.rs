use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use log::debug;
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{
    PageId, RecordId, Result, StratumError, HEADER_PAGE_ID, INVALID_PAGE_ID,
};
use crate::storage::page::btree_page::write_parent_page_id;
use crate::storage::page::{BTreePageView, HeaderPage, IndexKey, InternalPage, LeafPage};

use super::index_iterator::BPlusTreeIter;
use super::key_comparator::KeyComparator;

/// Which structural hazard a write descent must guard against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Insert,
    Remove,
}

/// Latches held along a write descent: the tree guard (whose protected value
/// is the root page id) plus the retained root-to-leaf chain of write
/// guards in acquisition order.
struct WriteContext<'a> {
    tree_guard: Option<RwLockWriteGuard<'a, PageId>>,
    chain: Vec<WritePageGuard>,
}

impl WriteContext<'_> {
    /// Releases everything held so far, oldest first: the tree guard, then
    /// the retained ancestors in acquisition order.
    fn release_ancestors(&mut self) {
        self.tree_guard = None;
        self.chain.drain(..);
    }
}

/// Disk-backed B+ tree with unique keys. Every page access goes through the
/// buffer pool; concurrent operations use latch crabbing: readers hold at
/// most a parent/child pair of read latches, writers retain the chain of
/// ancestors that might be touched by a split or merge and release it the
/// moment a safe child is latched.
pub struct BPlusTree<K: IndexKey, C: KeyComparator<K>> {
    index_name: String,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: u32,
    internal_max_size: u32,
    /// Tree-wide guard over the root page id. Writers that might change the
    /// root keep the write half until a safe child proves they cannot.
    tree_guard: RwLock<PageId>,
    _key: PhantomData<K>,
}

impl<K: IndexKey, C: KeyComparator<K>> BPlusTree<K, C> {
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Self {
        assert!(leaf_max_size >= 2, "leaf max size must be at least 2");
        assert!(
            internal_max_size >= 3,
            "internal max size must be at least 3"
        );
        Self {
            index_name: index_name.into(),
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            tree_guard: RwLock::new(INVALID_PAGE_ID),
            _key: PhantomData,
        }
    }

    /// Reopens an index persisted in the header page.
    pub fn open(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Self> {
        let index_name = index_name.into();
        let root = {
            let guard = bpm.read_page(HEADER_PAGE_ID)?;
            HeaderPage::new(guard.data())
                .find_record(&index_name)
                .unwrap_or(INVALID_PAGE_ID)
        };

        let mut tree = Self::new(index_name, bpm, comparator, leaf_max_size, internal_max_size);
        tree.tree_guard = RwLock::new(root);
        Ok(tree)
    }

    pub fn is_empty(&self) -> bool {
        *self.tree_guard.read() == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        *self.tree_guard.read()
    }

    /// Point lookup with read crabbing: the child is read-latched before the
    /// parent latch and pin are dropped.
    pub fn get_value(&self, key: &K) -> Result<Option<RecordId>> {
        let root_guard = self.tree_guard.read();
        let root = *root_guard;
        if root == INVALID_PAGE_ID {
            return Ok(None);
        }

        let mut guard = self.bpm.read_page(root)?;
        loop {
            if BTreePageView::new(guard.data()).is_leaf() {
                break;
            }
            let child_pid =
                InternalPage::<_, K>::new(guard.data()).lookup(key, &self.comparator);
            let child_guard = self.bpm.read_page(child_pid)?;
            guard = child_guard;
        }

        let leaf = LeafPage::<_, K>::new(guard.data());
        Ok(leaf.lookup(key, &self.comparator))
    }

    /// Inserts a key/value pair. Returns false (with no state change) if the
    /// key already exists.
    pub fn insert(&self, key: &K, value: RecordId) -> Result<bool> {
        let mut root_guard = self.tree_guard.write();

        if *root_guard == INVALID_PAGE_ID {
            // First key: a single leaf becomes the root.
            let mut guard = self.bpm.new_page()?;
            let root_pid = guard.page_id();
            let mut leaf = LeafPage::<_, K>::new(guard.data_mut());
            leaf.init(root_pid, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.insert(key, value, &self.comparator)
                .expect("insert into an empty root leaf");

            *root_guard = root_pid;
            self.persist_root(root_pid)?;
            debug!("index {}: created root leaf {}", self.index_name, root_pid);
            return Ok(true);
        }

        let mut ctx = WriteContext {
            tree_guard: Some(root_guard),
            chain: Vec::new(),
        };
        self.descend_for_write(key, WriteOp::Insert, &mut ctx)?;

        let leaf_idx = ctx.chain.len() - 1;

        // Probe read-only first so a duplicate leaves the page clean.
        {
            let leaf = LeafPage::<_, K>::new(ctx.chain[leaf_idx].data());
            if leaf.lookup(key, &self.comparator).is_some() {
                return Ok(false);
            }
        }

        let new_size = {
            let leaf_guard = ctx.chain.last_mut().unwrap();
            let mut leaf = LeafPage::<_, K>::new(leaf_guard.data_mut());
            leaf.insert(key, value, &self.comparator)
                .expect("duplicate was ruled out under the leaf latch")
        };

        if new_size < self.leaf_max_size {
            return Ok(true);
        }

        // Capacity reached: split the leaf and propagate.
        let mut extras: Vec<WritePageGuard> = Vec::new();
        self.split_leaf(&mut ctx, &mut extras)?;
        Ok(true)
    }

    /// Removes a key if present. Underfull nodes borrow from a sibling or
    /// merge; emptied pages are reclaimed only after every latch is dropped.
    pub fn remove(&self, key: &K) -> Result<()> {
        let root_guard = self.tree_guard.write();
        if *root_guard == INVALID_PAGE_ID {
            return Ok(());
        }

        let mut ctx = WriteContext {
            tree_guard: Some(root_guard),
            chain: Vec::new(),
        };
        self.descend_for_write(key, WriteOp::Remove, &mut ctx)?;

        let leaf_idx = ctx.chain.len() - 1;

        let found = {
            let leaf = LeafPage::<_, K>::new(ctx.chain[leaf_idx].data());
            let index = leaf.key_index(key, &self.comparator);
            if index < leaf.size() as usize
                && self.comparator.compare(&leaf.key_at(index), key) == Ordering::Equal
            {
                Some(index)
            } else {
                None
            }
        };
        let Some(index) = found else {
            return Ok(());
        };

        let underfull = {
            let leaf_guard = ctx.chain.last_mut().unwrap();
            let mut leaf = LeafPage::<_, K>::new(leaf_guard.data_mut());
            leaf.remove_at(index);
            leaf.size() < leaf.min_size()
        };

        let mut extras: Vec<WritePageGuard> = Vec::new();
        let mut deleted: Vec<PageId> = Vec::new();
        if underfull {
            self.rebalance(&mut ctx, &mut extras, &mut deleted, leaf_idx)?;
        }

        // Reclaim only once every latch and pin is gone.
        drop(ctx);
        drop(extras);
        for pid in deleted {
            self.bpm.delete_page(pid)?;
        }
        Ok(())
    }

    /// Iterator positioned at the smallest key. The tree guard is held only
    /// until the first leaf is read-latched; the iterator itself never takes
    /// it.
    pub fn iter(&self) -> Result<BPlusTreeIter<K>> {
        let root_guard = self.tree_guard.read();
        let root = *root_guard;
        if root == INVALID_PAGE_ID {
            return Ok(BPlusTreeIter::end(Arc::clone(&self.bpm)));
        }

        let mut guard = self.bpm.read_page(root)?;
        loop {
            if BTreePageView::new(guard.data()).is_leaf() {
                break;
            }
            let child_pid = InternalPage::<_, K>::new(guard.data()).value_at(0);
            let child_guard = self.bpm.read_page(child_pid)?;
            guard = child_guard;
        }
        Ok(BPlusTreeIter::new(Arc::clone(&self.bpm), guard, 0))
    }

    /// Iterator positioned at the first key >= `key`.
    pub fn iter_from(&self, key: &K) -> Result<BPlusTreeIter<K>> {
        let root_guard = self.tree_guard.read();
        let root = *root_guard;
        if root == INVALID_PAGE_ID {
            return Ok(BPlusTreeIter::end(Arc::clone(&self.bpm)));
        }

        let mut guard = self.bpm.read_page(root)?;
        loop {
            if BTreePageView::new(guard.data()).is_leaf() {
                break;
            }
            let child_pid =
                InternalPage::<_, K>::new(guard.data()).lookup(key, &self.comparator);
            let child_guard = self.bpm.read_page(child_pid)?;
            guard = child_guard;
        }

        let index = LeafPage::<_, K>::new(guard.data()).key_index(key, &self.comparator);
        Ok(BPlusTreeIter::new(Arc::clone(&self.bpm), guard, index))
    }

    /// A node is safe when the pending operation cannot propagate a split or
    /// merge through it; latching a safe child lets the descent release all
    /// retained ancestors.
    fn is_safe(view: &BTreePageView<'_>, op: WriteOp) -> bool {
        match op {
            WriteOp::Insert => {
                if view.is_leaf() {
                    view.size() + 1 < view.max_size()
                } else {
                    view.size() < view.max_size()
                }
            }
            WriteOp::Remove => {
                if view.is_root() {
                    // The root only changes when a leaf root empties or an
                    // internal root drops to a single child.
                    if view.is_leaf() {
                        view.size() > 1
                    } else {
                        view.size() > 2
                    }
                } else {
                    view.size() > view.min_size()
                }
            }
        }
    }

    /// Write crabbing: latch each node top-down, releasing every retained
    /// ancestor (tree guard included, FIFO) as soon as the freshly latched
    /// node is safe. On return the chain ends with the target leaf.
    fn descend_for_write(
        &self,
        key: &K,
        op: WriteOp,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        let mut pid = *ctx
            .tree_guard
            .as_deref()
            .expect("descent starts with the tree guard held");

        loop {
            let guard = self.bpm.write_page(pid)?;
            let is_leaf = {
                let view = BTreePageView::new(guard.data());
                if Self::is_safe(&view, op) {
                    ctx.release_ancestors();
                }
                if !view.is_leaf() {
                    pid = InternalPage::<_, K>::new(guard.data()).lookup(key, &self.comparator);
                    false
                } else {
                    true
                }
            };
            ctx.chain.push(guard);
            if is_leaf {
                return Ok(());
            }
        }
    }

    /// Splits the overfull leaf at the end of the chain and propagates the
    /// new separator to the parent.
    fn split_leaf(
        &self,
        ctx: &mut WriteContext<'_>,
        extras: &mut Vec<WritePageGuard>,
    ) -> Result<()> {
        let mut sibling_guard = self.bpm.new_page()?;
        let sibling_pid = sibling_guard.page_id();

        let leaf_idx = ctx.chain.len() - 1;
        let leaf_pid = ctx.chain[leaf_idx].page_id();

        let (old_key, new_key) = {
            let leaf_guard = ctx.chain.last_mut().unwrap();
            let mut leaf = LeafPage::<_, K>::new(leaf_guard.data_mut());
            let mut sibling = LeafPage::<_, K>::new(sibling_guard.data_mut());
            sibling.init(sibling_pid, leaf.parent_page_id(), self.leaf_max_size);

            // Splice into the sibling chain, then move the tail across
            // until the new leaf reaches its minimum occupancy.
            sibling.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(sibling_pid);
            while sibling.size() < sibling.min_size() {
                leaf.shift_tail_to_front(&mut sibling);
            }
            (leaf.key_at(0), sibling.key_at(0))
        };

        extras.push(sibling_guard);
        self.insert_into_parent(ctx, extras, leaf_idx, old_key, leaf_pid, new_key, sibling_pid)
    }

    /// Records the split of `chain[child_idx]` in its parent, splitting
    /// upward as needed. `old_key` re-labels the surviving node (its first
    /// key may have shifted); `(new_key, new_pid)` is the fresh sibling.
    #[allow(clippy::too_many_arguments)]
    fn insert_into_parent(
        &self,
        ctx: &mut WriteContext<'_>,
        extras: &mut Vec<WritePageGuard>,
        child_idx: usize,
        old_key: K,
        old_pid: PageId,
        new_key: K,
        new_pid: PageId,
    ) -> Result<()> {
        if child_idx == 0 {
            // The split node was the topmost retained node, i.e. the root:
            // grow the tree by one level.
            let mut root_guard = self.bpm.new_page()?;
            let new_root_pid = root_guard.page_id();
            {
                let mut root = InternalPage::<_, K>::new(root_guard.data_mut());
                root.init(new_root_pid, INVALID_PAGE_ID, self.internal_max_size);
                root.build_root(&old_key, old_pid, &new_key, new_pid);
            }
            extras.push(root_guard);
            self.reparent(ctx, extras, old_pid, new_root_pid)?;
            self.reparent(ctx, extras, new_pid, new_root_pid)?;

            let tree_guard = ctx
                .tree_guard
                .as_mut()
                .expect("root split requires the tree guard");
            **tree_guard = new_root_pid;
            self.persist_root(new_root_pid)?;
            debug!(
                "index {}: root split, new root {}",
                self.index_name, new_root_pid
            );
            return Ok(());
        }

        let parent_idx = child_idx - 1;
        let parent_pid = ctx.chain[parent_idx].page_id();

        let parent_size = {
            let parent_guard = &mut ctx.chain[parent_idx];
            let mut parent = InternalPage::<_, K>::new(parent_guard.data_mut());
            let index = parent
                .value_index(old_pid)
                .expect("split child missing from its parent");
            parent.set_key_at(index, &old_key);
            parent.insert(&new_key, new_pid, &self.comparator)
        };
        self.reparent(ctx, extras, new_pid, parent_pid)?;

        if parent_size <= self.internal_max_size {
            return Ok(());
        }

        // The parent overflowed by one entry: carve off a sibling and
        // promote the sibling's first key as the next separator.
        let mut sibling_guard = self.bpm.new_page()?;
        let sibling_pid = sibling_guard.page_id();
        let mut moved: Vec<PageId> = Vec::new();

        let (parent_first_key, sibling_first_key) = {
            let parent_guard = &mut ctx.chain[parent_idx];
            let mut parent = InternalPage::<_, K>::new(parent_guard.data_mut());
            let mut sibling = InternalPage::<_, K>::new(sibling_guard.data_mut());
            sibling.init(sibling_pid, parent.parent_page_id(), self.internal_max_size);

            while sibling.size() < sibling.min_size() {
                moved.push(parent.relocate_tail_to_front(&mut sibling));
            }
            (parent.key_at(0), sibling.key_at(0))
        };

        extras.push(sibling_guard);
        for pid in moved {
            self.reparent(ctx, extras, pid, sibling_pid)?;
        }

        self.insert_into_parent(
            ctx,
            extras,
            parent_idx,
            parent_first_key,
            parent_pid,
            sibling_first_key,
            sibling_pid,
        )
    }

    /// Restores occupancy of the underfull node at `chain[idx]`: borrow from
    /// the left sibling, else the right, else merge. Recurses on the parent
    /// when a merge leaves it deficient.
    fn rebalance(
        &self,
        ctx: &mut WriteContext<'_>,
        extras: &mut Vec<WritePageGuard>,
        deleted: &mut Vec<PageId>,
        idx: usize,
    ) -> Result<()> {
        if idx == 0 {
            return self.adjust_root(ctx, extras, deleted);
        }

        let node_pid = ctx.chain[idx].page_id();
        let (node_is_leaf, min_size) = {
            let view = BTreePageView::new(ctx.chain[idx].data());
            (view.is_leaf(), view.min_size())
        };
        let (node_index, parent_size) = {
            let parent = InternalPage::<_, K>::new(ctx.chain[idx - 1].data());
            (
                parent
                    .value_index(node_pid)
                    .expect("underfull node missing from its parent"),
                parent.size() as usize,
            )
        };

        // Borrow from the left sibling if it has spare entries.
        if node_index > 0 {
            let left_pid =
                InternalPage::<_, K>::new(ctx.chain[idx - 1].data()).value_at(node_index - 1);
            let mut left_guard = self.bpm.write_page(left_pid)?;

            if BTreePageView::new(left_guard.data()).size() > min_size {
                let mut moved_child = None;
                {
                    let (head, tail) = ctx.chain.split_at_mut(idx);
                    let parent_guard = &mut head[idx - 1];
                    let node_guard = &mut tail[0];
                    let mut parent = InternalPage::<_, K>::new(parent_guard.data_mut());

                    if node_is_leaf {
                        let mut node = LeafPage::<_, K>::new(node_guard.data_mut());
                        let mut left = LeafPage::<_, K>::new(left_guard.data_mut());
                        left.shift_tail_to_front(&mut node);
                        parent.set_key_at(node_index, &node.key_at(0));
                    } else {
                        let mut node = InternalPage::<_, K>::new(node_guard.data_mut());
                        let mut left = InternalPage::<_, K>::new(left_guard.data_mut());
                        moved_child = Some(left.relocate_tail_to_front(&mut node));
                        parent.set_key_at(node_index, &node.key_at(0));
                    }
                }
                if let Some(child) = moved_child {
                    self.reparent(ctx, extras, child, node_pid)?;
                }
                return Ok(());
            }
        }

        // Borrow from the right sibling.
        if node_index + 1 < parent_size {
            let right_pid =
                InternalPage::<_, K>::new(ctx.chain[idx - 1].data()).value_at(node_index + 1);
            let mut right_guard = self.bpm.write_page(right_pid)?;

            if BTreePageView::new(right_guard.data()).size() > min_size {
                let mut moved_child = None;
                {
                    let (head, tail) = ctx.chain.split_at_mut(idx);
                    let parent_guard = &mut head[idx - 1];
                    let node_guard = &mut tail[0];
                    let mut parent = InternalPage::<_, K>::new(parent_guard.data_mut());

                    if node_is_leaf {
                        let mut node = LeafPage::<_, K>::new(node_guard.data_mut());
                        let mut right = LeafPage::<_, K>::new(right_guard.data_mut());
                        right.shift_head_to_back(&mut node);
                        // The separator tracks the right sibling's new
                        // first key, not this node's.
                        parent.set_key_at(node_index + 1, &right.key_at(0));
                    } else {
                        let mut node = InternalPage::<_, K>::new(node_guard.data_mut());
                        let mut right = InternalPage::<_, K>::new(right_guard.data_mut());
                        moved_child = Some(right.relocate_head_to_back(&mut node));
                        parent.set_key_at(node_index + 1, &right.key_at(0));
                    }
                }
                if let Some(child) = moved_child {
                    self.reparent(ctx, extras, child, node_pid)?;
                }
                return Ok(());
            }
        }

        // No sibling can spare an entry: merge.
        let mut moved_children: Vec<PageId> = Vec::new();
        if node_index > 0 {
            // Fold this node into its left sibling.
            let left_pid =
                InternalPage::<_, K>::new(ctx.chain[idx - 1].data()).value_at(node_index - 1);
            let mut left_guard = self.bpm.write_page(left_pid)?;
            {
                let (head, tail) = ctx.chain.split_at_mut(idx);
                let parent_guard = &mut head[idx - 1];
                let node_guard = &mut tail[0];
                let mut parent = InternalPage::<_, K>::new(parent_guard.data_mut());

                if node_is_leaf {
                    let mut node = LeafPage::<_, K>::new(node_guard.data_mut());
                    let mut left = LeafPage::<_, K>::new(left_guard.data_mut());
                    while node.size() > 0 {
                        node.shift_head_to_back(&mut left);
                    }
                    left.set_next_page_id(node.next_page_id());
                } else {
                    let mut node = InternalPage::<_, K>::new(node_guard.data_mut());
                    let mut left = InternalPage::<_, K>::new(left_guard.data_mut());
                    while node.size() > 0 {
                        moved_children.push(node.relocate_head_to_back(&mut left));
                    }
                }
                parent.remove_at(node_index);
            }
            for child in &moved_children {
                self.reparent(ctx, extras, *child, left_pid)?;
            }
            deleted.push(node_pid);
            // The survivor may still be needed (e.g. root promotion).
            extras.push(left_guard);
        } else {
            // Leftmost child: fold the right sibling into this node.
            let right_pid =
                InternalPage::<_, K>::new(ctx.chain[idx - 1].data()).value_at(node_index + 1);
            let mut right_guard = self.bpm.write_page(right_pid)?;
            {
                let (head, tail) = ctx.chain.split_at_mut(idx);
                let parent_guard = &mut head[idx - 1];
                let node_guard = &mut tail[0];
                let mut parent = InternalPage::<_, K>::new(parent_guard.data_mut());

                if node_is_leaf {
                    let mut node = LeafPage::<_, K>::new(node_guard.data_mut());
                    let mut right = LeafPage::<_, K>::new(right_guard.data_mut());
                    while right.size() > 0 {
                        right.shift_head_to_back(&mut node);
                    }
                    node.set_next_page_id(right.next_page_id());
                } else {
                    let mut node = InternalPage::<_, K>::new(node_guard.data_mut());
                    let mut right = InternalPage::<_, K>::new(right_guard.data_mut());
                    while right.size() > 0 {
                        moved_children.push(right.relocate_head_to_back(&mut node));
                    }
                }
                parent.remove_at(node_index + 1);
            }
            for child in &moved_children {
                self.reparent(ctx, extras, *child, node_pid)?;
            }
            deleted.push(right_pid);
            extras.push(right_guard);
        }

        let parent_underfull = {
            let view = BTreePageView::new(ctx.chain[idx - 1].data());
            view.size() < view.min_size()
        };
        if parent_underfull {
            self.rebalance(ctx, extras, deleted, idx - 1)?;
        }
        Ok(())
    }

    /// Root fixups after deletion: an empty leaf root clears the tree; an
    /// internal root left with one child hands the root to that child.
    fn adjust_root(
        &self,
        ctx: &mut WriteContext<'_>,
        extras: &mut Vec<WritePageGuard>,
        deleted: &mut Vec<PageId>,
    ) -> Result<()> {
        let root_pid = ctx.chain[0].page_id();
        let (is_leaf, size) = {
            let view = BTreePageView::new(ctx.chain[0].data());
            (view.is_leaf(), view.size())
        };

        if is_leaf {
            if size == 0 {
                let tree_guard = ctx
                    .tree_guard
                    .as_mut()
                    .expect("root change requires the tree guard");
                **tree_guard = INVALID_PAGE_ID;
                self.persist_root(INVALID_PAGE_ID)?;
                deleted.push(root_pid);
                debug!("index {}: tree emptied", self.index_name);
            }
            return Ok(());
        }

        if size == 1 {
            let child_pid = {
                let root_guard = &mut ctx.chain[0];
                let mut root = InternalPage::<_, K>::new(root_guard.data_mut());
                root.remove_and_return_only_child()
            };

            {
                let tree_guard = ctx
                    .tree_guard
                    .as_mut()
                    .expect("root change requires the tree guard");
                **tree_guard = child_pid;
            }
            self.persist_root(child_pid)?;
            self.reparent(ctx, extras, child_pid, INVALID_PAGE_ID)?;
            deleted.push(root_pid);
            debug!(
                "index {}: root collapsed, new root {}",
                self.index_name, child_pid
            );
        }
        Ok(())
    }

    /// Rewrites a child's parent pointer. The child is mutated through a
    /// guard this descent already holds when possible; a thread re-latching
    /// a page it holds would deadlock, so the fetch only happens for pages
    /// outside the held set.
    fn reparent(
        &self,
        ctx: &mut WriteContext<'_>,
        extras: &mut Vec<WritePageGuard>,
        child_pid: PageId,
        new_parent: PageId,
    ) -> Result<()> {
        for guard in ctx.chain.iter_mut().chain(extras.iter_mut()) {
            if guard.page_id() == child_pid {
                write_parent_page_id(guard.data_mut(), new_parent);
                return Ok(());
            }
        }

        let mut guard = self.bpm.write_page(child_pid)?;
        write_parent_page_id(guard.data_mut(), new_parent);
        Ok(())
    }

    /// Publishes a root change through the header page.
    fn persist_root(&self, root: PageId) -> Result<()> {
        let mut guard = self.bpm.write_page(HEADER_PAGE_ID)?;
        let mut header = HeaderPage::new(guard.data_mut());
        if !header.update_record(&self.index_name, root)
            && !header.insert_record(&self.index_name, root)
        {
            return Err(StratumError::HeaderPageFull);
        }
        Ok(())
    }
}
