//! File system parameters and flag sets.

pub use fs_lib::{ BLOCK_SIZE, BLOCK_SIZE_BITS, NAME_LEN, ROOT_INO, I_MAP_SLOTS, Z_MAP_SLOTS, BITS_PER_BLOCK };
pub use fs_lib::{ NR_DIRECT, NR_INDIRECT, MAX_FILE_BLOCKS, MAX_DIR_ENTRIES, DIR_ENTRIES_PER_BLOCK, DIR_ENTRY_SIZE };
use crate::error::FsError;

pub use fs_lib::{ S_IFMT, S_IFREG, S_IFBLK, S_IFDIR, S_IFCHR, S_IFIFO, S_ISUID, S_ISGID, S_ISVTX };

/// Device number: major in the high byte, minor in the low byte.
pub type Dev = u16;
/// Block number on a device.
pub type BlockNo = u32;

/// number of buffers in the cache unless configured otherwise
pub const NR_BUFFERS: usize = 128;
/// maximum number of active i-nodes
pub const NR_INODE: usize = 32;
/// maximum number of mounted volumes
pub const NR_SUPER: usize = 8;
/// device number of the root volume (first hard disk)
pub const ROOT_DEV: Dev = 0x301;

/// Most links an inode may have; `nlinks` is a byte.
pub const LINK_MAX: u8 = 250;
/// Buffers that must stay unpinned once every mounted volume's
/// bitmaps are held, so path walks and block maps can make progress.
pub const MIN_FREE_BUFFERS: usize = 6;

/// A pipe buffers this many bytes, one of which always stays empty.
pub const PAGE_SIZE: usize = 4096;

pub const MAY_EXEC: u16 = 1;
pub const MAY_WRITE: u16 = 2;
pub const MAY_READ: u16 = 4;

#[inline]
pub fn major(dev: Dev) -> u8 {
    (dev >> 8) as u8
}

#[inline]
pub fn minor(dev: Dev) -> u8 {
    (dev & 0xFF) as u8
}

#[inline]
pub fn mkdev(major: u8, minor: u8) -> Dev {
    ((major as Dev) << 8) | minor as Dev
}

bitflags! {
    /// Flags accepted by `Fs::open_namei`.
    pub struct OpenFlags: u32 {
        const RDONLY = 0o0;
        const WRONLY = 0o1;
        const RDWR = 0o2;
        const ACCMODE = 0o3;
        const CREAT = 0o100;
        const EXCL = 0o200;
        const NOCTTY = 0o400;
        const TRUNC = 0o1000;
        const APPEND = 0o2000;
        const NONBLOCK = 0o4000;
    }
}

impl OpenFlags {
    /// Access mode bits: 0 read, 1 write, 2 read/write.
    pub fn access(&self) -> u32 {
        (*self & OpenFlags::ACCMODE).bits()
    }

    /// Permission mask the access mode asks for.
    pub fn permission_mask(&self) -> u16 {
        match self.access() {
            0 => MAY_READ,
            1 => MAY_WRITE,
            2 => MAY_READ | MAY_WRITE,
            _ => 0o377,
        }
    }

    pub fn readable(&self) -> bool {
        matches!(self.access(), 0 | 2)
    }

    pub fn writeable(&self) -> bool {
        matches!(self.access(), 1 | 2)
    }
}

/// Sizes of the in-memory tables.
#[derive(Clone, Debug)]
pub struct FsConfig {
    /// Buffers in the block cache, at least eight.
    pub nr_buffers: usize,
    /// Slots in the inode table.
    pub nr_inodes: usize,
    /// Device mounted by `Fs::mount_root`.
    pub root_dev: Dev,
}

impl FsConfig {
    /// Check the table sizes before any table is built. Room for the
    /// bitmaps of each volume is checked again when it is mounted.
    pub fn validate(&self) -> Result<(), FsError> {
        if self.nr_buffers < 2 + MIN_FREE_BUFFERS {
            return Err(FsError::BadConfig("too few buffers for one volume's bitmaps"));
        }
        if self.nr_inodes < 2 {
            return Err(FsError::BadConfig("inode table needs at least two slots"));
        }
        if self.root_dev == 0 {
            return Err(FsError::BadConfig("root device 0"));
        }
        Ok(())
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            nr_buffers: NR_BUFFERS,
            nr_inodes: NR_INODE,
            root_dev: ROOT_DEV,
        }
    }
}
