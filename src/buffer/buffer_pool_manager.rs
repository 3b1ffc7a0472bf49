use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{
    FrameId, PageId, Result, StratumError, INVALID_PAGE_ID, PAGE_SIZE, PAGE_TABLE_BUCKET_SIZE,
};
use crate::container::ExtendibleHashTable;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Pool state shared with the page guards' release callbacks.
struct PoolState {
    /// The buffer frames; a frame's index is its FrameId
    frames: Vec<Arc<FrameHeader>>,
    /// Page table: resident page id -> frame id
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// Frames not currently holding any page
    free_list: Mutex<VecDeque<FrameId>>,
    /// LRU-K eviction policy
    replacer: LruKReplacer,
    /// Pool-wide latch, held for the entire duration of every public
    /// operation. Per-page content latches are acquired by guards strictly
    /// outside of it.
    latch: Mutex<()>,
}

impl PoolState {
    /// Unpin path shared by guard release and the public API. Returns false
    /// if the page is not resident or its pin count is already zero. Dirty
    /// is monotone for a resident page: once set it stays set until a flush
    /// or eviction write-back clears it.
    fn unpin_page(&self, page_id: PageId, dirty: bool) -> bool {
        let _guard = self.latch.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() == 0 {
            return false;
        }
        if dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == Some(0) {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }
}

/// BufferPoolManager mediates every access to the paged file: it owns a
/// fixed array of frames, materialises pages on demand, and coordinates the
/// free list, the extendible-hash page table and the LRU-K replacer. Callers
/// hold pages through pin-counted RAII guards.
pub struct BufferPoolManager {
    pool_size: usize,
    state: Arc<PoolState>,
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(PoolState {
            frames,
            page_table: ExtendibleHashTable::new(PAGE_TABLE_BUCKET_SIZE),
            free_list: Mutex::new(free_list),
            replacer: LruKReplacer::new(replacer_k, pool_size),
            latch: Mutex::new(()),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and returns it pinned (pin count 1), zeroed
    /// and write-latched. Fails with `BufferPoolFull` when neither the free
    /// list nor the replacer can produce a frame.
    pub fn new_page(&self) -> Result<WritePageGuard> {
        let (frame_id, page_id) = {
            let _guard = self.state.latch.lock();

            let frame_id = self.acquire_frame()?;
            let page_id = self.disk_scheduler.disk_manager().allocate_page()?;

            let frame = &self.state.frames[frame_id.as_usize()];
            frame.set_page_id(page_id);
            frame.pin();

            self.state.page_table.insert(page_id, frame_id);
            self.state.replacer.record_access(frame_id);
            self.state.replacer.set_evictable(frame_id, false);

            (frame_id, page_id)
        };

        Ok(self.make_write_guard(page_id, frame_id))
    }

    /// Fetches a page for shared access. The returned guard holds a pin and
    /// the page's read latch.
    pub fn read_page(&self, page_id: PageId) -> Result<ReadPageGuard> {
        if page_id == INVALID_PAGE_ID {
            return Err(StratumError::InvalidPageId(page_id));
        }

        let frame_id = {
            let _guard = self.state.latch.lock();
            self.pin_resident_or_load(page_id)?
        };

        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            ReadPageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, dirty| {
                    state.unpin_page(pid, dirty);
                }),
            )
        };
        Ok(guard)
    }

    /// Fetches a page for exclusive access. The returned guard holds a pin
    /// and the page's write latch.
    pub fn write_page(&self, page_id: PageId) -> Result<WritePageGuard> {
        if page_id == INVALID_PAGE_ID {
            return Err(StratumError::InvalidPageId(page_id));
        }

        let frame_id = {
            let _guard = self.state.latch.lock();
            self.pin_resident_or_load(page_id)?
        };

        Ok(self.make_write_guard(page_id, frame_id))
    }

    /// Manually releases one pin. Guard-based callers never need this; it
    /// is the raw unpin underlying guard release.
    pub fn unpin_page(&self, page_id: PageId, dirty: bool) -> bool {
        self.state.unpin_page(page_id, dirty)
    }

    /// Writes a resident page to disk regardless of its dirty flag and
    /// clears the flag. Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let _guard = self.state.latch.lock();

        let Some(frame_id) = self.state.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_into(&mut data);
        self.disk_scheduler.write_page_sync(page_id, &data)?;
        frame.set_dirty(false);

        Ok(true)
    }

    /// Writes every resident dirty page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let _guard = self.state.latch.lock();

        for frame in &self.state.frames {
            let page_id = frame.page_id();
            if page_id != INVALID_PAGE_ID && frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_into(&mut data);
                self.disk_scheduler.write_page_sync(page_id, &data)?;
                frame.set_dirty(false);
            }
        }
        Ok(())
    }

    /// Drops a page from the pool and deallocates it on disk. Returns true
    /// if the page was not resident (nothing to do) or was removed; false
    /// if it is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let _guard = self.state.latch.lock();

        let Some(frame_id) = self.state.page_table.find(&page_id) else {
            return Ok(true);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Ok(false);
        }

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_into(&mut data);
            self.disk_scheduler.write_page_sync(page_id, &data)?;
        }

        self.state.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        self.state.free_list.lock().push_back(frame_id);
        self.disk_scheduler.disk_manager().deallocate_page(page_id);

        Ok(true)
    }

    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let _guard = self.state.latch.lock();
        self.state
            .page_table
            .find(&page_id)
            .map(|frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    /// Dirty flag of a resident page, for inspection in tests.
    pub fn is_page_dirty(&self, page_id: PageId) -> Option<bool> {
        let _guard = self.state.latch.lock();
        self.state
            .page_table
            .find(&page_id)
            .map(|frame_id| self.state.frames[frame_id.as_usize()].is_dirty())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.free_list.lock().len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Residency check plus pin for a hit, or frame acquisition plus disk
    /// read for a miss. Caller holds the pool latch.
    fn pin_resident_or_load(&self, page_id: PageId) -> Result<FrameId> {
        if let Some(frame_id) = self.state.page_table.find(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id);
            self.state.replacer.set_evictable(frame_id, false);
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        debug!("page {} miss, loading into frame {}", page_id, frame_id);
        let mut data = [0u8; PAGE_SIZE];
        self.disk_scheduler.read_page_sync(page_id, &mut data)?;

        frame.fill_from(&data);
        frame.set_page_id(page_id);
        frame.pin();

        self.state.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(frame_id)
    }

    /// Pops the free list, or evicts. A dirty victim is written back before
    /// its frame is reused. Caller holds the pool latch.
    fn acquire_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.state.free_list.lock().pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.state.replacer.evict() else {
            return Err(StratumError::BufferPoolFull);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            debug!("evicting dirty page {}, writing back", old_page_id);
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_into(&mut data);
            self.disk_scheduler.write_page_sync(old_page_id, &data)?;
        }

        self.state.page_table.remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }

    fn make_write_guard(&self, page_id: PageId, frame_id: FrameId) -> WritePageGuard {
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);

        unsafe {
            WritePageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, dirty| {
                    state.unpin_page(pid, dirty);
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, 2, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_buffer_pool_manager_new() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_new_page_is_pinned() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap();
        let page_id = guard.page_id();
        assert_eq!(page_id, PageId::new(1)); // page 0 is the header page
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        assert_eq!(bpm.free_frame_count(), 9);

        drop(guard);
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_read_write_roundtrip() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = {
            let mut guard = bpm.new_page().unwrap();
            guard.data_mut()[0] = 42;
            guard.data_mut()[100] = 255;
            guard.page_id()
        };

        let guard = bpm.read_page(page_id).unwrap();
        assert_eq!(guard.data()[0], 42);
        assert_eq!(guard.data()[100], 255);
    }

    #[test]
    fn test_unpin_semantics() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap();
        let page_id = guard.page_id();
        drop(guard);

        // Already unpinned: further unpins report failure.
        assert!(!bpm.unpin_page(page_id, false));
        // Unknown pages report failure too.
        assert!(!bpm.unpin_page(PageId::new(9999), false));
    }

    #[test]
    fn test_eviction_writes_back_dirty_page() {
        let (bpm, _temp) = create_bpm(2);

        let dirty_pid = {
            let mut guard = bpm.new_page().unwrap();
            guard.data_mut()[0] = 0xAB;
            guard.page_id()
        };
        let _clean_pid = bpm.new_page().unwrap().page_id();

        let writes_before = bpm.disk_manager().num_writes();

        // Pool is full and both pages are evictable; allocating two more
        // pages reuses both frames, write-backing the dirty one.
        let _p3 = bpm.new_page().unwrap().page_id();
        let _p4 = bpm.new_page().unwrap().page_id();
        assert_eq!(bpm.disk_manager().num_writes(), writes_before + 1);

        // The evicted dirty page reloads with its data intact.
        let guard = bpm.read_page(dirty_pid).unwrap();
        assert_eq!(guard.data()[0], 0xAB);
    }

    #[test]
    fn test_pool_exhaustion() {
        let (bpm, _temp) = create_bpm(2);

        let _g1 = bpm.new_page().unwrap();
        let _g2 = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(StratumError::BufferPoolFull)));
    }

    #[test]
    fn test_flush_clears_dirty() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = {
            let mut guard = bpm.new_page().unwrap();
            guard.data_mut()[0] = 1;
            guard.page_id()
        };
        assert_eq!(bpm.is_page_dirty(page_id), Some(true));

        assert!(bpm.flush_page(page_id).unwrap());
        assert_eq!(bpm.is_page_dirty(page_id), Some(false));

        // Not resident -> false.
        assert!(!bpm.flush_page(PageId::new(9999)).unwrap());
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap();
        let page_id = guard.page_id();

        // Pinned: refuse.
        assert!(!bpm.delete_page(page_id).unwrap());
        drop(guard);

        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 10);

        // Not resident counts as success.
        assert!(bpm.delete_page(page_id).unwrap());
    }
}
