//! File system
//!
//! `Fs` owns the buffer cache, the inode table and the super block
//! table of one running system. Every handle it hands out borrows it,
//! so a handle can never outlive the tables it refers to.

use std::sync::Arc;

mod bio;
mod bitmap;
mod block_dev;
mod dir;
mod file;
mod inode;
mod namei;
mod open;
mod pipe;
mod stat;
mod superblock;
mod truncate;

pub use bio::{ Bcache, Buf, BufData, BufFlags, BufId, Rw };
pub use dir::{ DirEntryRef, DirEntryInfo };
pub use file::{ File, OpenFile };
pub use inode::{ Inode, InodeGuard, InodeId };
pub use pipe::{ PipeReader, PipeWriter };
pub use stat::Stat;
pub use superblock::{ FsStat, SuperInfo };

use crate::define::fs::{ Dev, FsConfig };
use crate::driver::BlockDevice;
use crate::error::FsError;
use crate::time::{ Clock, SystemClock };

use inode::InodeTable;
use superblock::SuperTable;

pub struct Fs {
    pub(crate) bcache: Bcache,
    pub(crate) inodes: InodeTable,
    pub(crate) supers: SuperTable,
    clock: Box<dyn Clock>,
    root_dev: Dev,
}

impl Fs {
    pub fn new(config: FsConfig) -> Result<Self, FsError> {
        Self::with_clock(config, SystemClock)
    }

    /// Build the tables `config` asks for, refusing sizes the file
    /// system can't run with.
    pub fn with_clock(config: FsConfig, clock: impl Clock + 'static) -> Result<Self, FsError> {
        config.validate()?;
        log::info!(
            "fs: {} buffers, {} inodes, root device {:#06x}",
            config.nr_buffers,
            config.nr_inodes,
            config.root_dev
        );
        Ok(Self {
            bcache: Bcache::new(config.nr_buffers),
            inodes: InodeTable::new(config.nr_inodes),
            supers: SuperTable::new(),
            clock: Box::new(clock),
            root_dev: config.root_dev,
        })
    }

    pub fn register_device(&self, dev: Dev, device: Arc<dyn BlockDevice>) {
        self.bcache.register_device(dev, device);
    }

    pub fn bcache(&self) -> &Bcache {
        &self.bcache
    }

    pub fn root_dev(&self) -> Dev {
        self.root_dev
    }

    /// Current time for inode stamps.
    pub fn now(&self) -> u32 {
        self.clock.now()
    }

    /// Write back everything cached for `dev`: dirty buffers, then
    /// dirty inodes, then the buffers those inodes dirtied.
    pub fn sync_dev(&self, dev: Dev) {
        self.bcache.do_sync(Some(dev));
        self.sync_inodes();
        self.bcache.do_sync(Some(dev));
    }

    /// Write back every dirty inode and buffer.
    pub fn sys_sync(&self) {
        self.sync_inodes();
        self.bcache.do_sync(None);
    }

    /// Called when a removable medium may have been swapped. Drops the
    /// super block, inodes and buffers of `dev` if it was.
    pub fn check_disk_change(&self, dev: Dev) {
        let changed = match self.bcache.device(dev) {
            Some(device) => device.media_changed(),
            None => false,
        };
        if !changed {
            return;
        }
        log::info!("disk change on dev {:#06x}", dev);
        if self.supers.find(dev).is_some() {
            // refused for the root and for busy volumes, which put_super logs
            let _ = self.put_super(dev);
        }
        self.invalidate_inodes(dev);
        self.bcache.invalidate_buffers(dev);
    }
}
