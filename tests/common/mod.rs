#![allow(dead_code)]

use std::sync::Arc;

use stratum::buffer::BufferPoolManager;
use stratum::storage::disk::DiskManager;
use stratum::{PageId, RecordId, SlotId};
use tempfile::NamedTempFile;

/// Log configuration for tests; safe to call repeatedly.
pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn create_bpm(pool_size: usize, k: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    (Arc::new(BufferPoolManager::new(pool_size, k, dm)), temp_file)
}

/// Record id derived from the key, so scans can be verified end to end.
pub fn rid(key: u64) -> RecordId {
    RecordId::new(PageId::new((key / 1000 + 1000) as u32), SlotId::new((key % 1000) as u16))
}
