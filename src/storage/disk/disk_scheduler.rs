use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::common::{PageId, Result, StratumError, PAGE_SIZE};

use super::DiskManager;

/// A queued page operation. Requests own their buffers, so the worker never
/// touches caller memory; results travel back over the per-request reply
/// channel, errors included.
enum DiskCommand {
    Read {
        page_id: PageId,
        reply: Sender<Result<Box<[u8; PAGE_SIZE]>>>,
    },
    Write {
        page_id: PageId,
        data: Box<[u8; PAGE_SIZE]>,
        reply: Sender<Result<()>>,
    },
}

/// DiskScheduler owns the worker thread that executes all page I/O.
///
/// The command queue is unbounded: the buffer pool issues at most one
/// request at a time under its latch, so queue depth never grows beyond the
/// number of pools sharing the disk. Shutdown needs no flag or polling:
/// dropping the scheduler closes the channel, and the worker drains whatever
/// is still queued before it exits.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    commands: Option<Sender<DiskCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (commands, receiver) = unbounded();

        let dm = Arc::clone(&disk_manager);
        let worker = thread::Builder::new()
            .name("stratum-disk".into())
            .spawn(move || Self::run_worker(dm, receiver))
            .expect("failed to spawn disk worker thread");

        Self {
            disk_manager,
            commands: Some(commands),
            worker: Some(worker),
        }
    }

    fn submit(&self, command: DiskCommand) -> Result<()> {
        self.commands
            .as_ref()
            .expect("scheduler has shut down")
            .send(command)
            .map_err(|_| StratumError::DiskScheduler("disk worker is gone".into()))
    }

    /// Reads a page through the worker, blocking until it completes.
    pub fn read_page_sync(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        assert_eq!(buf.len(), PAGE_SIZE);

        let (reply, response) = crossbeam_channel::bounded(1);
        self.submit(DiskCommand::Read { page_id, reply })?;

        let data = response.recv().map_err(|_| {
            StratumError::DiskScheduler(format!("no reply for read of {}", page_id))
        })??;
        buf.copy_from_slice(&data[..]);
        Ok(())
    }

    /// Writes a page through the worker, blocking until it completes.
    pub fn write_page_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let mut owned = Box::new([0u8; PAGE_SIZE]);
        owned.copy_from_slice(data);

        let (reply, response) = crossbeam_channel::bounded(1);
        self.submit(DiskCommand::Write {
            page_id,
            data: owned,
            reply,
        })?;

        response.recv().map_err(|_| {
            StratumError::DiskScheduler(format!("no reply for write of {}", page_id))
        })?
    }

    /// Worker loop: runs until every command sender is dropped, which also
    /// drains any still-queued requests.
    fn run_worker(disk_manager: Arc<DiskManager>, commands: Receiver<DiskCommand>) {
        for command in commands {
            match command {
                DiskCommand::Read { page_id, reply } => {
                    let mut buf = Box::new([0u8; PAGE_SIZE]);
                    let result = disk_manager
                        .read_page(page_id, &mut buf[..])
                        .map(|()| buf);
                    let _ = reply.send(result);
                }
                DiskCommand::Write {
                    page_id,
                    data,
                    reply,
                } => {
                    let _ = reply.send(disk_manager.write_page(page_id, &data[..]));
                }
            }
        }
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the command channel is the shutdown signal.
        self.commands.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
