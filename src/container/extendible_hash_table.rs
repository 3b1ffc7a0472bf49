use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

use parking_lot::Mutex;

/// A bucket holds up to `bucket_size` entries in insertion order and carries
/// its own local depth.
struct Bucket<K, V> {
    items: Vec<(K, V)>,
    local_depth: u32,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(bucket_size: usize, local_depth: u32) -> Self {
        Self {
            items: Vec::with_capacity(bucket_size),
            local_depth,
        }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.items.iter().position(|(k, _)| k == key) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Inserts or overwrites. Returns false iff the bucket is full and the
    /// key is not already present.
    fn insert(&mut self, key: K, value: V, bucket_size: usize) -> bool {
        if let Some(slot) = self.items.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return true;
        }
        if self.items.len() >= bucket_size {
            return false;
        }
        self.items.push((key, value));
        true
    }
}

struct HashTableInner<K, V> {
    global_depth: u32,
    /// Directory of length 2^global_depth; entries index into `buckets`.
    /// Multiple directory slots alias the same bucket while its local depth
    /// is below the global depth.
    dir: Vec<usize>,
    /// Bucket slab. Buckets are never removed (no merging on delete).
    buckets: Vec<Bucket<K, V>>,
}

/// Extendible hash table: a power-of-two directory over bounded-size buckets
/// with per-bucket local depths. Used as the buffer pool's page table.
///
/// A full bucket whose local depth equals the global depth doubles the
/// directory (duplicating pointers); the bucket then splits into a sibling
/// and its entries are redistributed on the newly significant hash bit.
/// Insertion retries from the top because the incoming key may still land in
/// a full bucket when every resident entry shares the discriminating bit.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_size: usize,
    hasher: S,
    inner: Mutex<HashTableInner<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> ExtendibleHashTable<K, V, RandomState> {
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            bucket_size,
            hasher,
            inner: Mutex::new(HashTableInner {
                global_depth: 0,
                dir: vec![0],
                buckets: vec![Bucket::new(bucket_size, 0)],
            }),
        }
    }

    fn hash(&self, key: &K) -> u64 {
        let mut h = self.hasher.build_hasher();
        key.hash(&mut h);
        h.finish()
    }

    fn index_of(&self, key: &K, global_depth: u32) -> usize {
        (self.hash(key) & ((1u64 << global_depth) - 1)) as usize
    }

    pub fn find(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock();
        let idx = self.index_of(key, inner.global_depth);
        inner.buckets[inner.dir[idx]].find(key).cloned()
    }

    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let idx = self.index_of(key, inner.global_depth);
        let bucket = inner.dir[idx];
        inner.buckets[bucket].remove(key)
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();

        loop {
            let idx = self.index_of(&key, inner.global_depth);
            let bucket_idx = inner.dir[idx];

            if inner.buckets[bucket_idx].insert(key.clone(), value.clone(), self.bucket_size)
            {
                return;
            }

            if inner.buckets[bucket_idx].local_depth == inner.global_depth {
                // Double the directory, duplicating the existing pointers
                // into the upper half.
                let old_len = inner.dir.len();
                inner.global_depth += 1;
                for i in 0..old_len {
                    let b = inner.dir[i];
                    inner.dir.push(b);
                }
            }

            self.split_bucket(&mut inner, bucket_idx);
        }
    }

    /// Splits `bucket_idx` into itself and a fresh sibling, redistributing
    /// entries on the bit at the old local depth and rewiring the directory
    /// slots that carry that bit.
    fn split_bucket(&self, inner: &mut HashTableInner<K, V>, bucket_idx: usize) {
        let old_depth = inner.buckets[bucket_idx].local_depth;
        let new_depth = old_depth + 1;

        let items = std::mem::take(&mut inner.buckets[bucket_idx].items);
        inner.buckets[bucket_idx].local_depth = new_depth;

        let mut sibling = Bucket::new(self.bucket_size, new_depth);
        for (k, v) in items {
            if (self.hash(&k) >> old_depth) & 1 == 1 {
                sibling.items.push((k, v));
            } else {
                inner.buckets[bucket_idx].items.push((k, v));
            }
        }

        let sibling_idx = inner.buckets.len();
        inner.buckets.push(sibling);

        // Rewire every directory alias of the old bucket whose
        // discriminating bit is set.
        let dir_len = inner.dir.len();
        for i in 0..dir_len {
            if inner.dir[i] == bucket_idx && (i >> old_depth) & 1 == 1 {
                inner.dir[i] = sibling_idx;
            }
        }
    }

    pub fn global_depth(&self) -> u32 {
        self.inner.lock().global_depth
    }

    pub fn local_depth(&self, dir_index: usize) -> Option<u32> {
        let inner = self.inner.lock();
        inner
            .dir
            .get(dir_index)
            .map(|&b| inner.buckets[b].local_depth)
    }

    pub fn num_buckets(&self) -> usize {
        self.inner.lock().buckets.len()
    }

    pub fn dir_size(&self) -> usize {
        self.inner.lock().dir.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_table_basic() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(4);

        table.insert(1, 10);
        table.insert(2, 20);
        table.insert(3, 30);

        assert_eq!(table.find(&1), Some(10));
        assert_eq!(table.find(&2), Some(20));
        assert_eq!(table.find(&3), Some(30));
        assert_eq!(table.find(&4), None);
    }

    #[test]
    fn test_hash_table_overwrite() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(4);

        table.insert(1, 10);
        table.insert(1, 11);
        assert_eq!(table.find(&1), Some(11));
        assert_eq!(table.num_buckets(), 1);
    }

    #[test]
    fn test_hash_table_remove() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(4);

        table.insert(1, 10);
        assert!(table.remove(&1));
        assert!(!table.remove(&1));
        assert_eq!(table.find(&1), None);
    }

    #[test]
    fn test_hash_table_grows() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(2);

        for i in 0..64 {
            table.insert(i, i * 100);
        }
        for i in 0..64 {
            assert_eq!(table.find(&i), Some(i * 100), "key {} lost", i);
        }
        assert!(table.num_buckets() > 1);
        assert_eq!(table.dir_size(), 1 << table.global_depth());
    }

    #[test]
    fn test_hash_table_directory_invariants() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(2);

        for i in 0..128 {
            table.insert(i, i);
        }

        let global = table.global_depth();
        assert_eq!(table.dir_size(), 1usize << global);
        for i in 0..table.dir_size() {
            let local = table.local_depth(i).unwrap();
            assert!(local <= global);
        }
    }
}
