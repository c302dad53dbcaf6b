use zerocopy::{ FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned };

use super::{ BlockData, U16, U32 };
use super::{ DIR_ENTRIES_PER_BLOCK, INODES_PER_BLOCK, INODE_SIZE, DIR_ENTRY_SIZE, NAME_LEN, NR_INDIRECT };
use super::{ S_IFMT, S_IFREG, S_IFDIR, S_IFBLK, S_IFCHR, S_IFIFO };

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InodeType {
    Regular,
    Directory,
    CharDevice,
    BlockDevice,
    Fifo,
    Unknown,
}

impl InodeType {
    pub fn from_mode(mode: u16) -> Self {
        match mode & S_IFMT {
            S_IFREG => Self::Regular,
            S_IFDIR => Self::Directory,
            S_IFCHR => Self::CharDevice,
            S_IFBLK => Self::BlockDevice,
            S_IFIFO => Self::Fifo,
            _ => Self::Unknown,
        }
    }
}

/// On-disk inode structure
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct DiskInode {
    pub mode: U16,
    pub uid: U16,
    /// Size of file (bytes)
    pub size: U32,
    pub mtime: U32,
    pub gid: u8,
    /// Number of links to inode in file system
    pub nlinks: u8,
    /// 7 direct zones, one indirect, one double indirect
    pub zone: [U16; 9],
}

impl DiskInode {
    pub fn new() -> Self {
        Self::new_zeroed()
    }
}

/// A 16-byte directory entry. `inode == 0` marks a free slot.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct DirEntry {
    pub inode: U16,
    pub name: [u8; NAME_LEN],
}

impl DirEntry {
    pub fn new(inode: u16, name: &[u8]) -> Self {
        let mut de = Self::new_zeroed();
        de.inode.set(inode);
        de.set_name(name);
        de
    }

    /// Name bytes up to the first NUL.
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_LEN);
        &self.name[..len]
    }

    /// Store `name`, truncated to `NAME_LEN` and NUL padded.
    pub fn set_name(&mut self, name: &[u8]) {
        let len = name.len().min(NAME_LEN);
        self.name = [0; NAME_LEN];
        self.name[..len].copy_from_slice(&name[..len]);
    }

    /// Whether this live entry is named exactly `name`.
    pub fn matches(&self, name: &[u8]) -> bool {
        let len = name.len();
        if self.inode.get() == 0 || len > NAME_LEN {
            return false;
        }
        if len < NAME_LEN && self.name[len] != 0 {
            return false;
        }
        &self.name[..len] == name
    }
}

const _: () = assert!(core::mem::size_of::<DiskInode>() == INODE_SIZE);
const _: () = assert!(core::mem::size_of::<DirEntry>() == DIR_ENTRY_SIZE);

pub fn as_inodes(block: &BlockData) -> &[DiskInode; INODES_PER_BLOCK] {
    zerocopy::transmute_ref!(block)
}

pub fn as_inodes_mut(block: &mut BlockData) -> &mut [DiskInode; INODES_PER_BLOCK] {
    zerocopy::transmute_mut!(block)
}

pub fn as_dir_entries(block: &BlockData) -> &[DirEntry; DIR_ENTRIES_PER_BLOCK] {
    zerocopy::transmute_ref!(block)
}

pub fn as_dir_entries_mut(block: &mut BlockData) -> &mut [DirEntry; DIR_ENTRIES_PER_BLOCK] {
    zerocopy::transmute_mut!(block)
}

/// An indirect block viewed as its zone numbers.
pub fn as_zones(block: &BlockData) -> &[U16; NR_INDIRECT] {
    zerocopy::transmute_ref!(block)
}

pub fn as_zones_mut(block: &mut BlockData) -> &mut [U16; NR_INDIRECT] {
    zerocopy::transmute_mut!(block)
}
