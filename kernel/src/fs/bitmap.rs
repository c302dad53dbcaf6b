//! Zone and inode allocation.
//!
//! Bit `n` of the zone bitmap stands for zone `n + firstdatazone - 1`;
//! bit `n` of the inode bitmap for inode `n`. Bit 0 of both maps is
//! always set. The bitmap blocks stay referenced in the buffer cache
//! for as long as the volume is mounted.

use fs_lib::{ clear_bit, find_first_zero, set_bit, test_bit };

use super::{ BufId, Fs, Inode, SuperInfo };
use super::inode::InodeFlags;
use crate::define::fs::{ BlockNo, Dev, BITS_PER_BLOCK };
use crate::error::FsError;
use crate::process::Task;

impl Fs {
    /// Find a clear bit in `maps`, set it and return `(map, bit)`.
    /// Another allocator may take the bit between the search and the
    /// set; the search is then repeated.
    fn claim_bit(&self, maps: &[BufId]) -> Option<(usize, usize)> {
        loop {
            let (i, bit) = maps
                .iter()
                .enumerate()
                .find_map(|(i, &map)| find_first_zero(&self.bcache.data_of(map)).map(|bit| (i, bit)))?;
            if set_bit(&mut self.bcache.data_of(maps[i]), bit) {
                continue;
            }
            self.bcache.mark_dirty_of(maps[i]);
            return Some((i, bit));
        }
    }

    fn super_for_alloc(&self, dev: Dev, what: &str) -> SuperInfo {
        match self.get_super(dev) {
            Some(sb) => sb,
            None => panic!("trying to {} on nonexistent device {:#06x}", what, dev),
        }
    }

    /// Allocate a zone on `dev`. The zone's buffer is zeroed and marked
    /// dirty, so the disk copy is cleared on the next write-back.
    pub fn new_block(&self, dev: Dev) -> Result<BlockNo, FsError> {
        let sb = self.super_for_alloc(dev, "get new block");
        let (i, bit) = match self.claim_bit(&sb.zmap) {
            Some(found) => found,
            None => {
                log::debug!("new_block: no free zones on dev {:#06x}", dev);
                return Err(FsError::NoSpace);
            }
        };
        let zone = (i * BITS_PER_BLOCK + bit) as BlockNo + sb.firstdatazone as BlockNo - 1;
        if zone >= sb.nzones as BlockNo {
            self.rollback_bit(sb.zmap[i], bit);
            log::debug!("new_block: no free zones on dev {:#06x}", dev);
            return Err(FsError::NoSpace);
        }
        let buf = self.bcache.getblk(dev, zone);
        if buf.count() != 1 {
            drop(buf);
            self.rollback_bit(sb.zmap[i], bit);
            log::error!("new_block: count is != 1 for zone {} on dev {:#06x}", zone, dev);
            return Err(FsError::Busy);
        }
        buf.data().fill(0);
        buf.set_uptodate();
        buf.mark_dirty();
        Ok(zone)
    }

    /// Give a zone back to `dev`. Returns false, and leaves the zone
    /// allocated, if someone still holds its buffer.
    pub fn free_block(&self, dev: Dev, block: BlockNo) -> bool {
        let sb = self.super_for_alloc(dev, "free block");
        if block < sb.firstdatazone as BlockNo || block >= sb.nzones as BlockNo {
            panic!("trying to free block {} not in datazone of dev {:#06x}", block, dev);
        }
        if let Some(buf) = self.bcache.get_hash_table(dev, block) {
            if buf.count() != 1 {
                log::warn!("trying to free block ({:#06x}:{}), count={}", dev, block, buf.count() - 1);
                return false;
            }
            buf.discard();
        }
        let bit = (block - (sb.firstdatazone as BlockNo - 1)) as usize;
        let map = sb.zmap[bit / BITS_PER_BLOCK];
        if !clear_bit(&mut self.bcache.data_of(map), bit % BITS_PER_BLOCK) {
            panic!("free_block ({:#06x}:{}): bit already cleared", dev, block);
        }
        self.bcache.mark_dirty_of(map);
        true
    }

    /// Allocate an inode on `dev`, owned by the task's effective ids.
    /// The inode starts with one link and is marked dirty.
    pub fn new_inode(&self, dev: Dev, task: &Task<'_>) -> Result<Inode<'_>, FsError> {
        let inode = self.get_empty_inode();
        let sb = self.super_for_alloc(dev, "get new inode");
        let (i, bit) = match self.claim_bit(&sb.imap) {
            Some(found) => found,
            None => {
                log::debug!("new_inode: no free inodes on dev {:#06x}", dev);
                return Err(FsError::NoSpace);
            }
        };
        let num = i * BITS_PER_BLOCK + bit;
        if num > sb.ninodes as usize {
            self.rollback_bit(sb.imap[i], bit);
            log::debug!("new_inode: no free inodes on dev {:#06x}", dev);
            return Err(FsError::NoSpace);
        }
        let now = self.now();
        inode.update(|m| {
            m.nlinks = 1;
            m.dev = dev;
            m.num = num as u16;
            m.uid = task.euid;
            m.gid = task.egid;
            m.mtime = now;
            m.atime = now;
            m.ctime = now;
            m.flags.insert(InodeFlags::DIRTY);
        });
        Ok(inode)
    }

    /// Release an inode that has no links and no other references,
    /// clearing its bitmap bit and emptying its slot.
    pub fn free_inode(&self, inode: Inode<'_>) {
        let id = inode.into_raw();
        self.free_inode_index(id.0);
    }

    pub(crate) fn free_inode_index(&self, index: usize) {
        let (dev, num, count, nlinks) = {
            let slots = self.inodes.slots.acquire();
            let inode = &slots.inodes[index];
            (inode.dev, inode.num, inode.count, inode.nlinks)
        };
        if dev == 0 {
            self.clear_inode_slot(index);
            return;
        }
        if count > 1 {
            panic!("trying to free inode with count={}", count);
        }
        if nlinks != 0 {
            panic!("trying to free inode with links");
        }
        let sb = self.super_for_alloc(dev, "free inode");
        if num < 1 || num > sb.ninodes {
            panic!("trying to free inode 0 or nonexistant inode");
        }
        let bit = num as usize;
        let map = sb.imap[bit / BITS_PER_BLOCK];
        if !clear_bit(&mut self.bcache.data_of(map), bit % BITS_PER_BLOCK) {
            log::warn!("free_inode: bit already cleared for inode {} on dev {:#06x}", num, dev);
        }
        self.bcache.mark_dirty_of(map);
        self.clear_inode_slot(index);
    }

    fn clear_inode_slot(&self, index: usize) {
        let mut slots = self.inodes.slots.acquire();
        let inode = &mut slots.inodes[index];
        inode.dev = 0;
        inode.num = 0;
        inode.count = 0;
        inode.flags = InodeFlags::empty();
        inode.mode = 0;
        inode.size = 0;
        inode.nlinks = 0;
        inode.zone = [0; 9];
        drop(slots);
        self.inodes.empty_inode_wait.wake_up();
    }

    /// Whether the inode's bit is set in its volume's bitmap.
    pub fn inode_allocated(&self, dev: Dev, num: u16) -> bool {
        match self.get_super(dev) {
            Some(sb) => self.bit_set(&sb.imap, num as usize),
            None => false,
        }
    }

    /// Whether a zone's bit is set in its volume's bitmap.
    pub fn zone_allocated(&self, dev: Dev, zone: BlockNo) -> bool {
        match self.get_super(dev) {
            Some(sb) if zone >= sb.firstdatazone as BlockNo && zone < sb.nzones as BlockNo => {
                self.bit_set(&sb.zmap, (zone - (sb.firstdatazone as BlockNo - 1)) as usize)
            }
            _ => false,
        }
    }

    fn bit_set(&self, maps: &[BufId], bit: usize) -> bool {
        match maps.get(bit / BITS_PER_BLOCK) {
            Some(&map) => test_bit(&self.bcache.data_of(map), bit % BITS_PER_BLOCK),
            None => false,
        }
    }
}
