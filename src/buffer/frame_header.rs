use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// A single buffer frame: page metadata plus the page bytes.
///
/// The pin count and dirty flag are only mutated under the buffer pool's
/// latch; the data `RwLock` is the per-page content latch, held by page
/// guards entirely outside the pool latch.
pub struct FrameHeader {
    /// Index of this frame in the buffer pool
    frame_id: FrameId,
    /// The page resident in this frame (INVALID_PAGE_ID if empty)
    page_id: Mutex<PageId>,
    /// Number of outstanding pins
    pin_count: AtomicU32,
    /// Whether the page has been modified since it was last written out
    is_dirty: AtomicBool,
    /// Page contents, guarded by the per-page read/write latch
    pub(crate) data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl FrameHeader {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: Mutex::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        *self.page_id.lock()
    }

    pub fn set_page_id(&self, page_id: PageId) {
        *self.page_id.lock() = page_id;
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count, returning the new value.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count, returning the new value, or None if the
    /// count was already zero.
    pub fn unpin(&self) -> Option<u32> {
        let current = self.pin_count.load(Ordering::Acquire);
        if current == 0 {
            return None;
        }
        self.pin_count.store(current - 1, Ordering::Release);
        Some(current - 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Copies `data` into the frame (page load).
    pub fn fill_from(&self, data: &[u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(data);
    }

    /// Copies the frame contents into `data` (page write-out).
    pub fn copy_into(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        data.copy_from_slice(&**self.data.read());
    }

    /// Clears all metadata and zeroes the page bytes.
    pub fn reset(&self) {
        *self.page_id.lock() = INVALID_PAGE_ID;
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_header_new() {
        let frame = FrameHeader::new(FrameId::new(0));
        assert_eq!(frame.frame_id(), FrameId::new(0));
        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_header_pin_unpin() {
        let frame = FrameHeader::new(FrameId::new(0));

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.unpin(), Some(1));
        assert_eq!(frame.unpin(), Some(0));
        assert_eq!(frame.unpin(), None);
    }

    #[test]
    fn test_frame_header_roundtrip_and_reset() {
        let frame = FrameHeader::new(FrameId::new(0));
        frame.set_page_id(PageId::new(7));
        frame.set_dirty(true);

        let mut buf = [0u8; PAGE_SIZE];
        buf[0] = 42;
        buf[PAGE_SIZE - 1] = 7;
        frame.fill_from(&buf);

        let mut out = [0u8; PAGE_SIZE];
        frame.copy_into(&mut out);
        assert_eq!(out[0], 42);
        assert_eq!(out[PAGE_SIZE - 1], 7);

        frame.reset();
        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert!(!frame.is_dirty());
        frame.copy_into(&mut out);
        assert_eq!(out[0], 0);
    }
}
