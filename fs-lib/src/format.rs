//! Laying down an empty file system on a block image.

use core::fmt;

use zerocopy::FromZeros;

use super::{ as_dir_entries_mut, as_inodes_mut, set_bit, inode_block, inode_offset };
use super::{ BlockData, DirEntry, DiskInode, DiskSuperBlock };
use super::{ BLOCK_SIZE, BITS_PER_BLOCK, INODES_PER_BLOCK, I_MAP_SLOTS, Z_MAP_SLOTS };
use super::{ MAX_FILE_BLOCKS, ROOT_INO, SUPER_MAGIC, S_IFDIR, DIR_ENTRY_SIZE };

/// Placement of the metadata areas on a volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub ninodes: u16,
    pub nzones: u16,
    pub imap_blocks: u16,
    pub zmap_blocks: u16,
    pub inode_blocks: u16,
    pub firstdatazone: u16,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FormatError {
    /// The image is not a whole number of blocks or is too large.
    BadImageSize(usize),
    /// The requested layout does not fit the image or the bitmap slots.
    TooSmall,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::BadImageSize(len) => write!(f, "image of {} bytes is not a valid volume size", len),
            FormatError::TooSmall => write!(f, "volume too small for the requested inode count"),
        }
    }
}

fn div_ceil(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

impl Geometry {
    pub fn new(nzones: u16, ninodes: u16) -> Result<Self, FormatError> {
        if ninodes == 0 {
            return Err(FormatError::TooSmall);
        }
        // bit 0 of each map is reserved
        let imap_blocks = div_ceil(ninodes as usize + 1, BITS_PER_BLOCK);
        let zmap_blocks = div_ceil(nzones as usize + 1, BITS_PER_BLOCK);
        let inode_blocks = div_ceil(ninodes as usize, INODES_PER_BLOCK);
        let firstdatazone = 2 + imap_blocks + zmap_blocks + inode_blocks;
        if imap_blocks > I_MAP_SLOTS || zmap_blocks > Z_MAP_SLOTS || firstdatazone >= nzones as usize {
            return Err(FormatError::TooSmall);
        }
        Ok(Self {
            ninodes,
            nzones,
            imap_blocks: imap_blocks as u16,
            zmap_blocks: zmap_blocks as u16,
            inode_blocks: inode_blocks as u16,
            firstdatazone: firstdatazone as u16,
        })
    }

    /// Default inode count for a volume: one inode per three blocks.
    pub fn for_blocks(nzones: u16) -> Result<Self, FormatError> {
        Self::new(nzones, (nzones / 3).max(16))
    }

    /// Zone-bitmap bit that tracks `zone`.
    pub fn zone_bit(&self, zone: u16) -> usize {
        (zone - self.firstdatazone + 1) as usize
    }

    pub fn super_block(&self) -> DiskSuperBlock {
        let mut sb = DiskSuperBlock::new_zeroed();
        sb.ninodes.set(self.ninodes);
        sb.nzones.set(self.nzones);
        sb.imap_blocks.set(self.imap_blocks);
        sb.zmap_blocks.set(self.zmap_blocks);
        sb.firstdatazone.set(self.firstdatazone);
        sb.max_size.set((MAX_FILE_BLOCKS * BLOCK_SIZE) as u32);
        sb.magic.set(SUPER_MAGIC);
        sb
    }
}

fn block_mut(image: &mut [u8], nr: usize) -> &mut BlockData {
    let block = &mut image[nr * BLOCK_SIZE..(nr + 1) * BLOCK_SIZE];
    match block.try_into() {
        Ok(block) => block,
        Err(_) => unreachable!(),
    }
}

/// Mark every bit from `from` to the end of a bitmap area as in use, so
/// the allocator never hands out numbers past the end of the volume.
fn fill_tail(image: &mut [u8], first_block: usize, blocks: usize, from: usize) {
    for bit in from..blocks * BITS_PER_BLOCK {
        set_bit(block_mut(image, first_block + bit / BITS_PER_BLOCK), bit % BITS_PER_BLOCK);
    }
}

/// Write an empty file system over `image`.
///
/// The root directory (inode 1) gets one data zone holding `.` and
/// `..`, both pointing back at itself. `now` stamps the root inode.
pub fn format(image: &mut [u8], ninodes: Option<u16>, now: u32) -> Result<Geometry, FormatError> {
    if image.len() % BLOCK_SIZE != 0 || image.len() / BLOCK_SIZE > u16::MAX as usize {
        return Err(FormatError::BadImageSize(image.len()));
    }
    let nzones = (image.len() / BLOCK_SIZE) as u16;
    let geo = match ninodes {
        Some(n) => Geometry::new(nzones, n)?,
        None => Geometry::for_blocks(nzones)?,
    };
    image.iter_mut().for_each(|b| *b = 0);

    geo.super_block().write(block_mut(image, 1));

    let imap_start = 2;
    let zmap_start = imap_start + geo.imap_blocks as usize;
    fill_tail(image, imap_start, geo.imap_blocks as usize, geo.ninodes as usize + 1);
    fill_tail(image, zmap_start, geo.zmap_blocks as usize, (geo.nzones - geo.firstdatazone) as usize + 1);

    // reserved bit 0 and the root directory
    let imap = block_mut(image, imap_start);
    set_bit(imap, 0);
    set_bit(imap, ROOT_INO as usize);
    let zmap = block_mut(image, zmap_start);
    set_bit(zmap, 0);
    set_bit(zmap, geo.zone_bit(geo.firstdatazone));

    let mut root = DiskInode::new();
    root.mode.set(S_IFDIR | 0o755);
    root.size.set(2 * DIR_ENTRY_SIZE as u32);
    root.mtime.set(now);
    root.nlinks = 2;
    root.zone[0].set(geo.firstdatazone);
    let itable = block_mut(image, inode_block(geo.imap_blocks, geo.zmap_blocks, ROOT_INO) as usize);
    as_inodes_mut(itable)[inode_offset(ROOT_INO)] = root;

    let dir = as_dir_entries_mut(block_mut(image, geo.firstdatazone as usize));
    dir[0] = DirEntry::new(ROOT_INO, b".");
    dir[1] = DirEntry::new(ROOT_INO, b"..");

    Ok(geo)
}
