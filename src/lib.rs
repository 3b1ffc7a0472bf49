//! Stratum - the storage-engine core of a disk-oriented DBMS
//!
//! All access to the paged database file goes through a buffer pool that
//! caches hot pages in a fixed set of in-memory frames. On top of it sits a
//! disk-backed, concurrent B+ tree index.
//!
//! # Architecture
//!
//! - **Disk layer** (`storage::disk`): page-granular file I/O
//!   - `DiskManager`: reads, writes, allocates and deallocates pages
//!   - `DiskScheduler`: background I/O worker with synchronous wrappers
//!
//! - **Buffer pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: materialises pages on demand, coordinating a
//!     free list, the page table and the replacer under one latch
//!   - `LruKReplacer`: LRU-K eviction with +inf distance for cold frames
//!   - `ReadPageGuard`/`WritePageGuard`: pin-counted RAII page handles
//!
//! - **Page table** (`container`): `ExtendibleHashTable`, a power-of-two
//!   directory over bounded buckets with per-bucket local depths
//!
//! - **Index** (`index` + `storage::page`): `BPlusTree` over typed leaf and
//!   internal page layouts, with latch crabbing for concurrent operations
//!   and an ordered leaf-chain iterator
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stratum::buffer::BufferPoolManager;
//! use stratum::index::{BPlusTree, OrdComparator};
//! use stratum::storage::disk::DiskManager;
//! use stratum::{PageId, RecordId, SlotId};
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! let tree: BPlusTree<u64, OrdComparator> =
//!     BPlusTree::new("orders_pk", Arc::clone(&bpm), OrdComparator, 32, 32);
//!
//! tree.insert(&42, RecordId::new(PageId::new(7), SlotId::new(0))).unwrap();
//! assert!(tree.get_value(&42).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod container;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, RecordId, Result, SlotId, StratumError};
