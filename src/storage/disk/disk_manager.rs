use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, PAGE_SIZE};

/// DiskManager reads and writes fixed-size pages against a single database
/// file. Page 0 is reserved for the header page; fresh page ids are handed
/// out by a monotone counter, and deallocated ids are recycled.
pub struct DiskManager {
    file: Mutex<File>,
    /// High-water mark of allocated pages (page 0 always counts)
    num_pages: AtomicU32,
    /// Deallocated page ids available for reuse
    free_pages: Mutex<Vec<PageId>>,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Opens (or creates) the database file at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(db_path.as_ref())?;

        let file_pages = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file: Mutex::new(file),
            num_pages: AtomicU32::new(file_pages.max(1)),
            free_pages: Mutex::new(Vec::new()),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    /// Reads a page into `data`. Reads past the end of the file yield zeroed
    /// bytes, so freshly allocated pages are observed blank.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");

        let offset = page_id.as_u32() as u64 * PAGE_SIZE as u64;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = file.read(&mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data[filled..].fill(0);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a page from `data` and flushes it.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");

        let offset = page_id.as_u32() as u64 * PAGE_SIZE as u64;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Hands out a fresh page id, recycling deallocated ids first.
    pub fn allocate_page(&self) -> Result<PageId> {
        if let Some(page_id) = self.free_pages.lock().pop() {
            return Ok(page_id);
        }
        Ok(PageId::new(self.num_pages.fetch_add(1, Ordering::SeqCst)))
    }

    /// Marks a page id freeable; it may be handed out again.
    pub fn deallocate_page(&self, page_id: PageId) {
        self.free_pages.lock().push(page_id);
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Relaxed)
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.file.get_mut().sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_manager_new() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        // Page 0 is always reserved for the header page.
        assert_eq!(dm.num_pages(), 1);
        assert_eq!(dm.allocate_page().unwrap(), PageId::new(1));
    }

    #[test]
    fn test_disk_manager_read_write() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        let page_id = dm.allocate_page().unwrap();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[PAGE_SIZE - 1] = 128;
        dm.write_page(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut read_data).unwrap();
        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[PAGE_SIZE - 1], 128);

        assert_eq!(dm.num_reads(), 1);
        assert_eq!(dm.num_writes(), 1);
    }

    #[test]
    fn test_disk_manager_short_read_zero_filled() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        // Never written; read comes back all zeroes.
        let page_id = dm.allocate_page().unwrap();
        let mut data = [0xFFu8; PAGE_SIZE];
        dm.read_page(page_id, &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_disk_manager_recycles_deallocated_ids() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        let p1 = dm.allocate_page().unwrap();
        let _p2 = dm.allocate_page().unwrap();
        dm.deallocate_page(p1);
        assert_eq!(dm.allocate_page().unwrap(), p1);
    }

    #[test]
    fn test_disk_manager_persistence() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let page_id;

        {
            let dm = DiskManager::new(temp_file.path()).unwrap();
            page_id = dm.allocate_page().unwrap();
            let mut data = [0u8; PAGE_SIZE];
            data[0] = 123;
            dm.write_page(page_id, &data).unwrap();
        }

        {
            let dm = DiskManager::new(temp_file.path()).unwrap();
            assert_eq!(dm.num_pages(), 2);
            let mut data = [0u8; PAGE_SIZE];
            dm.read_page(page_id, &mut data).unwrap();
            assert_eq!(data[0], 123);
        }
    }
}
