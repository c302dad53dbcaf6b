#![cfg_attr(not(test), no_std)]
//! On-disk layout of the Minix v1 file system, shared by the kernel
//! and by `mkfs`.
//!
//! A volume is a sequence of 1 KiB blocks:
//!
//! | block | contents |
//! |-------|----------|
//! | 0 | boot block (unused) |
//! | 1 | super block |
//! | 2.. | inode bitmap (`imap_blocks` blocks) |
//! | .. | zone bitmap (`zmap_blocks` blocks) |
//! | .. | inode table |
//! | `firstdatazone`.. | data zones |

mod bitmap;
mod format;
mod inode;
mod superblock;

pub use bitmap::{ clear_bit, find_first_zero, set_bit, test_bit };
pub use format::{ format, FormatError, Geometry };
pub use inode::{ as_dir_entries, as_dir_entries_mut, as_inodes, as_inodes_mut, as_zones, as_zones_mut };
pub use inode::{ DirEntry, DiskInode, InodeType };
pub use superblock::DiskSuperBlock;

/// Little-endian on-disk integers.
pub use zerocopy::byteorder::little_endian::{ U16, U32 };

/// magic number identifying a Minix v1 file system with 14-byte names
pub const SUPER_MAGIC: u16 = 0x137F;
/// size of disk block
pub const BLOCK_SIZE: usize = 1024;
pub const BLOCK_SIZE_BITS: usize = 10;
/// block number of the super block
pub const SUPER_BLOCK: u32 = 1;
/// inode number of the root directory of every volume
pub const ROOT_INO: u16 = 1;

/// Maximum number of inode bitmap blocks a super block can describe.
pub const I_MAP_SLOTS: usize = 8;
/// Maximum number of zone bitmap blocks a super block can describe.
pub const Z_MAP_SLOTS: usize = 8;

/// Bitmap bits per block
pub const BITS_PER_BLOCK: usize = BLOCK_SIZE * 8;

/// Directory entries hold names up to this length, NUL padded.
pub const NAME_LEN: usize = 14;

pub const INODE_SIZE: usize = 32;
pub const DIR_ENTRY_SIZE: usize = 16;
/// Inodes per block.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
/// Directory entries per block.
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

/// zone[0..7] map file blocks directly
pub const NR_DIRECT: usize = 7;
/// zone[7] names a block of this many 16-bit zone numbers
pub const NR_INDIRECT: usize = BLOCK_SIZE / 2;
/// zone[8] names a block of indirect blocks
pub const NR_DINDIRECT: usize = NR_INDIRECT * NR_INDIRECT;
/// Largest file, in blocks.
pub const MAX_FILE_BLOCKS: usize = NR_DIRECT + NR_INDIRECT + NR_DINDIRECT;
/// Largest directory, in entries.
pub const MAX_DIR_ENTRIES: usize = MAX_FILE_BLOCKS * DIR_ENTRIES_PER_BLOCK;

pub type BlockData = [u8; BLOCK_SIZE];

/// File type bits of `DiskInode::mode`.
pub const S_IFMT: u16 = 0o170000;
pub const S_IFREG: u16 = 0o100000;
pub const S_IFBLK: u16 = 0o060000;
pub const S_IFDIR: u16 = 0o040000;
pub const S_IFCHR: u16 = 0o020000;
pub const S_IFIFO: u16 = 0o010000;
pub const S_ISUID: u16 = 0o4000;
pub const S_ISGID: u16 = 0o2000;
pub const S_ISVTX: u16 = 0o1000;

/// Block that holds inode `num` inside the inode table.
#[inline]
pub fn inode_block(imap_blocks: u16, zmap_blocks: u16, num: u16) -> u32 {
    2 + imap_blocks as u32 + zmap_blocks as u32 + (num as u32 - 1) / INODES_PER_BLOCK as u32
}

/// Slot of inode `num` inside its inode table block.
#[inline]
pub fn inode_offset(num: u16) -> usize {
    (num as usize - 1) % INODES_PER_BLOCK
}
