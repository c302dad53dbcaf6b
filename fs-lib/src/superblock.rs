use zerocopy::{ FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned };

use super::{ BlockData, U16, U32, SUPER_MAGIC };

/// On-disk super block, stored at the start of block 1.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct DiskSuperBlock {
    /// Number of inodes
    pub ninodes: U16,
    /// Number of zones, counting the metadata blocks
    pub nzones: U16,
    pub imap_blocks: U16,
    pub zmap_blocks: U16,
    /// First block that holds file data
    pub firstdatazone: U16,
    pub log_zone_size: U16,
    /// Maximum file size in bytes
    pub max_size: U32,
    pub magic: U16,
}

impl DiskSuperBlock {
    /// Decode the super block from the contents of block 1.
    pub fn read(block: &BlockData) -> Self {
        // the block is always larger than the record
        match Self::read_from_prefix(&block[..]) {
            Ok((sb, _)) => sb,
            Err(_) => unreachable!(),
        }
    }

    pub fn write(&self, block: &mut BlockData) {
        block[..core::mem::size_of::<Self>()].copy_from_slice(self.as_bytes());
    }

    pub fn is_valid(&self) -> bool {
        self.magic.get() == SUPER_MAGIC
    }
}

const _: () = assert!(core::mem::size_of::<DiskSuperBlock>() == 18);
