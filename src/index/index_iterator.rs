use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{RecordId, Result, INVALID_PAGE_ID};
use crate::storage::page::{IndexKey, LeafPage};

/// Ordered scan over the leaf chain. Holds a read latch and a pin on the
/// current leaf only; advancing past a leaf releases it before the next leaf
/// is latched. The iterator tolerates concurrent inserts that preserve the
/// sibling chain but must not be used across structural deletes.
pub struct BPlusTreeIter<K: IndexKey> {
    bpm: Arc<BufferPoolManager>,
    current: Option<ReadPageGuard>,
    index: usize,
    _key: PhantomData<K>,
}

impl<K: IndexKey> BPlusTreeIter<K> {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, leaf: ReadPageGuard, index: usize) -> Self {
        Self {
            bpm,
            current: Some(leaf),
            index,
            _key: PhantomData,
        }
    }

    /// The exhausted iterator.
    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            current: None,
            index: 0,
            _key: PhantomData,
        }
    }

    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }
}

impl<K: IndexKey> Iterator for BPlusTreeIter<K> {
    type Item = Result<(K, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let guard = self.current.as_ref()?;
            let leaf = LeafPage::<_, K>::new(guard.data());

            if self.index < leaf.size() as usize {
                let item = (leaf.key_at(self.index), leaf.value_at(self.index));
                self.index += 1;
                return Some(Ok(item));
            }

            let next_pid = leaf.next_page_id();

            // Release the exhausted leaf before touching its successor.
            self.current = None;
            self.index = 0;

            if next_pid == INVALID_PAGE_ID {
                return None;
            }
            match self.bpm.read_page(next_pid) {
                Ok(next_guard) => self.current = Some(next_guard),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
