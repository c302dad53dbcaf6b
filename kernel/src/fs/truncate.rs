//! Releasing the data zones of a file.

use fs_lib::as_zones;

use super::{ Fs, Inode };
use super::inode::InodeFlags;
use crate::define::fs::{ BlockNo, Dev, NR_DIRECT };

impl Fs {
    /// Free every zone of a regular file or directory and set its size
    /// to zero. Other inode types are left alone.
    pub fn truncate(&self, inode: &Inode<'_>) {
        self.truncate_index(inode.index);
    }

    pub(crate) fn truncate_index(&self, index: usize) {
        let now = self.now();
        let (dev, zones) = {
            let mut slots = self.inodes.slots.acquire();
            let inode = &mut slots.inodes[index];
            if !(inode.is_reg() || inode.is_dir()) {
                return;
            }
            let zones = inode.zone;
            inode.zone = [0; 9];
            inode.size = 0;
            inode.mtime = now;
            inode.ctime = now;
            inode.flags.insert(InodeFlags::DIRTY);
            (inode.dev, zones)
        };
        for &zone in &zones[..NR_DIRECT] {
            if zone != 0 {
                self.free_block(dev, zone as BlockNo);
            }
        }
        self.free_ind(dev, zones[7] as BlockNo);
        self.free_dind(dev, zones[8] as BlockNo);
    }

    /// Free the zones an indirect block lists, then the block itself.
    fn free_ind(&self, dev: Dev, block: BlockNo) {
        if block == 0 {
            return;
        }
        match self.indirect_zones(dev, block) {
            Some(zones) => zones.into_iter().for_each(|zone| {
                self.free_block(dev, zone);
            }),
            None => log::warn!("truncate: unable to read indirect block {} on dev {:#06x}", block, dev),
        }
        self.free_block(dev, block);
    }

    fn free_dind(&self, dev: Dev, block: BlockNo) {
        if block == 0 {
            return;
        }
        match self.indirect_zones(dev, block) {
            Some(zones) => zones.into_iter().for_each(|zone| self.free_ind(dev, zone)),
            None => log::warn!("truncate: unable to read double indirect block {} on dev {:#06x}", block, dev),
        }
        self.free_block(dev, block);
    }

    /// Nonzero entries of an indirect block. The buffer is released
    /// before returning so the block itself can be freed.
    fn indirect_zones(&self, dev: Dev, block: BlockNo) -> Option<Vec<BlockNo>> {
        let buf = self.bcache.bread(dev, block).ok()?;
        let data = buf.data();
        let zones = as_zones(&data)
            .iter()
            .map(|zone| zone.get() as BlockNo)
            .filter(|&zone| zone != 0)
            .collect();
        Some(zones)
    }
}
