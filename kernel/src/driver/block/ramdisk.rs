//! In-memory block device.

use std::sync::atomic::{ AtomicBool, AtomicU32, Ordering };

use fs_lib::{ BlockData, BLOCK_SIZE };

use super::BlockDevice;
use crate::define::fs::BlockNo;
use crate::error::FsError;
use crate::lock::Spinlock;

pub struct RamDisk {
    data: Spinlock<Vec<u8>>,
    /// Reads of this block and above fail.
    fail_reads_from: AtomicU32,
    changed: AtomicBool,
    reads: AtomicU32,
    writes: AtomicU32,
}

impl RamDisk {
    /// A zero-filled disk of `blocks` blocks.
    pub fn new(blocks: usize) -> Self {
        Self::from_image(vec![0; blocks * BLOCK_SIZE])
    }

    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            data: Spinlock::new(image, "ramdisk"),
            fail_reads_from: AtomicU32::new(u32::MAX),
            changed: AtomicBool::new(false),
            reads: AtomicU32::new(0),
            writes: AtomicU32::new(0),
        }
    }

    /// Format the disk with an empty file system.
    pub fn formatted(blocks: usize, ninodes: Option<u16>) -> Result<Self, fs_lib::FormatError> {
        let mut image = vec![0; blocks * BLOCK_SIZE];
        fs_lib::format(&mut image, ninodes, 0)?;
        Ok(Self::from_image(image))
    }

    pub fn blocks(&self) -> usize {
        self.data.acquire().len() / BLOCK_SIZE
    }

    /// Copy of the whole image.
    pub fn image(&self) -> Vec<u8> {
        self.data.acquire().clone()
    }

    /// Make reads of `block` and every later block fail.
    pub fn fail_reads_from(&self, block: BlockNo) {
        self.fail_reads_from.store(block, Ordering::SeqCst);
    }

    /// Pretend the medium was swapped for `image`.
    pub fn swap_media(&self, image: Vec<u8>) {
        *self.data.acquire() = image;
        self.changed.store(true, Ordering::SeqCst);
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    fn range(&self, len: usize, block: BlockNo) -> Result<std::ops::Range<usize>, FsError> {
        let start = block as usize * BLOCK_SIZE;
        if start + BLOCK_SIZE > len {
            log::error!("ramdisk: block {} out of range", block);
            return Err(FsError::Io);
        }
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block: BlockNo, data: &mut BlockData) -> Result<(), FsError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if block >= self.fail_reads_from.load(Ordering::SeqCst) {
            return Err(FsError::Io);
        }
        let disk = self.data.acquire();
        let range = self.range(disk.len(), block)?;
        data.copy_from_slice(&disk[range]);
        Ok(())
    }

    fn write_block(&self, block: BlockNo, data: &BlockData) -> Result<(), FsError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut disk = self.data.acquire();
        let range = self.range(disk.len(), block)?;
        disk[range].copy_from_slice(data);
        Ok(())
    }

    fn media_changed(&self) -> bool {
        self.changed.swap(false, Ordering::SeqCst)
    }
}
