//! Super block operations
//!
//! The super table holds one entry per mounted volume: the on-disk
//! super block fields, references to every bitmap block, and the two
//! inodes that tie the volume into the tree: `isup`, the root of the
//! volume, and `imount`, the directory it is mounted on.

use array_macro::array;

use fs_lib::{ clear_bit, set_bit, test_bit, DiskSuperBlock, INODES_PER_BLOCK, SUPER_BLOCK };

use super::{ BufId, Fs, InodeId };
use super::inode::InodeFlags;
use crate::define::fs::{ Dev, BITS_PER_BLOCK, I_MAP_SLOTS, MIN_FREE_BUFFERS, NR_SUPER, ROOT_INO, Z_MAP_SLOTS };
use crate::error::FsError;
use crate::lock::{ Spinlock, SpinlockGuard, WaitQueue };
use crate::process::Task;

bitflags! {
    pub struct SuperFlags: u8 {
        /// being read in or released
        const LOCKED = 1 << 0;
        const RDONLY = 1 << 1;
    }
}

struct SuperBlock {
    ninodes: u16,
    nzones: u16,
    imap_blocks: u16,
    zmap_blocks: u16,
    firstdatazone: u16,
    log_zone_size: u16,
    max_size: u32,
    imap: Vec<BufId>,
    zmap: Vec<BufId>,
    dev: Dev,
    isup: Option<InodeId>,
    imount: Option<InodeId>,
    flags: SuperFlags,
}

impl SuperBlock {
    const fn new() -> Self {
        Self {
            ninodes: 0,
            nzones: 0,
            imap_blocks: 0,
            zmap_blocks: 0,
            firstdatazone: 0,
            log_zone_size: 0,
            max_size: 0,
            imap: Vec::new(),
            zmap: Vec::new(),
            dev: 0,
            isup: None,
            imount: None,
            flags: SuperFlags::empty(),
        }
    }

    fn info(&self) -> SuperInfo {
        SuperInfo {
            dev: self.dev,
            ninodes: self.ninodes,
            nzones: self.nzones,
            imap_blocks: self.imap_blocks,
            zmap_blocks: self.zmap_blocks,
            firstdatazone: self.firstdatazone,
            log_zone_size: self.log_zone_size,
            max_size: self.max_size,
            imap: self.imap.clone(),
            zmap: self.zmap.clone(),
            isup: self.isup,
            imount: self.imount,
            read_only: self.flags.contains(SuperFlags::RDONLY),
        }
    }
}

/// Snapshot of a mounted volume's super block.
#[derive(Clone, Debug)]
pub struct SuperInfo {
    pub dev: Dev,
    pub ninodes: u16,
    pub nzones: u16,
    pub imap_blocks: u16,
    pub zmap_blocks: u16,
    pub firstdatazone: u16,
    pub log_zone_size: u16,
    pub max_size: u32,
    /// inode bitmap blocks, held for as long as the volume is mounted
    pub imap: Vec<BufId>,
    pub zmap: Vec<BufId>,
    pub isup: Option<InodeId>,
    pub imount: Option<InodeId>,
    pub read_only: bool,
}

/// Free and total counts of a mounted volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsStat {
    pub nzones: u16,
    pub free_zones: u32,
    pub ninodes: u16,
    pub free_inodes: u32,
}

pub(crate) struct SuperTable {
    slots: Spinlock<[SuperBlock; NR_SUPER]>,
    waits: [WaitQueue; NR_SUPER],
}

impl SuperTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Spinlock::new(array![_ => SuperBlock::new(); NR_SUPER], "super_block"),
            waits: array![_ => WaitQueue::new("super"); NR_SUPER],
        }
    }

    /// Slot currently assigned to `dev`, locked or not.
    pub(crate) fn find(&self, dev: Dev) -> Option<usize> {
        if dev == 0 {
            return None;
        }
        self.slots.acquire().iter().position(|sb| sb.dev == dev)
    }

    /// Device mounted on the directory `imount`.
    pub(crate) fn mounted_on(&self, imount: InodeId) -> Option<Dev> {
        self.slots
            .acquire()
            .iter()
            .find(|sb| sb.dev != 0 && sb.imount == Some(imount))
            .map(|sb| sb.dev)
    }

    fn wait_on_super<'g>(
        &'g self,
        mut slots: SpinlockGuard<'g, [SuperBlock; NR_SUPER]>,
        index: usize,
    ) -> SpinlockGuard<'g, [SuperBlock; NR_SUPER]> {
        while slots[index].flags.contains(SuperFlags::LOCKED) {
            self.waits[index].sleep_on(slots);
            slots = self.slots.acquire();
        }
        slots
    }

    fn unlock_super(&self, index: usize) {
        self.slots.acquire()[index].flags.remove(SuperFlags::LOCKED);
        self.waits[index].wake_up();
    }
}

impl Fs {
    /// The super block of a mounted device.
    pub fn get_super(&self, dev: Dev) -> Option<SuperInfo> {
        if dev == 0 {
            return None;
        }
        loop {
            let slots = self.supers.slots.acquire();
            let index = slots.iter().position(|sb| sb.dev == dev)?;
            let slots = self.supers.wait_on_super(slots, index);
            if slots[index].dev == dev {
                return Some(slots[index].info());
            }
        }
    }

    /// Read the super block of `dev` into the table, or return the one
    /// already there.
    pub fn read_super(&self, dev: Dev) -> Result<SuperInfo, FsError> {
        if dev == 0 {
            return Err(FsError::NoDevice);
        }
        self.check_disk_change(dev);
        if let Some(sb) = self.get_super(dev) {
            return Ok(sb);
        }
        let index = {
            let mut slots = self.supers.slots.acquire();
            if slots.iter().any(|sb| sb.dev == dev) {
                drop(slots);
                return self.get_super(dev).ok_or(FsError::NoDevice);
            }
            let index = match slots.iter().position(|sb| sb.dev == 0 && !sb.flags.contains(SuperFlags::LOCKED)) {
                Some(index) => index,
                None => {
                    log::warn!("read_super: super block table full");
                    return Err(FsError::Busy);
                }
            };
            slots[index] = SuperBlock::new();
            slots[index].dev = dev;
            slots[index].flags.insert(SuperFlags::LOCKED);
            index
        };
        let result = self.load_super(index, dev);
        if result.is_err() {
            self.supers.slots.acquire()[index].dev = 0;
        }
        self.supers.unlock_super(index);
        result?;
        log::info!("read_super: dev {:#06x}", dev);
        self.get_super(dev).ok_or(FsError::NoDevice)
    }

    fn load_super(&self, index: usize, dev: Dev) -> Result<(), FsError> {
        let disk = {
            let buf = self.bcache.bread(dev, SUPER_BLOCK)?;
            let data = buf.data();
            DiskSuperBlock::read(&data)
        };
        if !disk.is_valid() {
            log::warn!("read_super: bad magic {:#06x} on dev {:#06x}", disk.magic.get(), dev);
            return Err(FsError::BadMagic);
        }
        let (imap_blocks, zmap_blocks) = (disk.imap_blocks.get(), disk.zmap_blocks.get());
        if imap_blocks == 0 || zmap_blocks == 0
            || imap_blocks as usize > I_MAP_SLOTS || zmap_blocks as usize > Z_MAP_SLOTS
        {
            log::warn!("read_super: bad bitmap sizes {}/{} on dev {:#06x}", imap_blocks, zmap_blocks, dev);
            return Err(FsError::InvalidArgument);
        }
        let inode_blocks = (disk.ninodes.get() as usize + INODES_PER_BLOCK - 1) / INODES_PER_BLOCK;
        let first = disk.firstdatazone.get();
        if disk.ninodes.get() == 0
            || (first as usize) < 2 + imap_blocks as usize + zmap_blocks as usize + inode_blocks
            || first >= disk.nzones.get()
        {
            log::warn!("read_super: bad first data zone {} on dev {:#06x}", first, dev);
            return Err(FsError::InvalidArgument);
        }
        let pinned: usize = self.supers.slots.acquire().iter().map(|sb| sb.imap.len() + sb.zmap.len()).sum();
        if pinned + (imap_blocks + zmap_blocks) as usize + MIN_FREE_BUFFERS > self.bcache.nr_buffers() {
            log::warn!("read_super: {} buffers can't hold the bitmaps of dev {:#06x}", self.bcache.nr_buffers(), dev);
            return Err(FsError::BadConfig("too few buffers for the mounted bitmaps"));
        }

        let mut imap = Vec::with_capacity(imap_blocks as usize);
        for i in 0..imap_blocks as u32 {
            imap.push(self.bcache.bread(dev, 2 + i)?);
        }
        let mut zmap = Vec::with_capacity(zmap_blocks as usize);
        for i in 0..zmap_blocks as u32 {
            zmap.push(self.bcache.bread(dev, 2 + imap_blocks as u32 + i)?);
        }
        // bit 0 stands for no inode and no zone
        set_bit(&mut imap[0].data(), 0);
        set_bit(&mut zmap[0].data(), 0);

        let mut slots = self.supers.slots.acquire();
        let sb = &mut slots[index];
        sb.ninodes = disk.ninodes.get();
        sb.nzones = disk.nzones.get();
        sb.imap_blocks = imap_blocks;
        sb.zmap_blocks = zmap_blocks;
        sb.firstdatazone = disk.firstdatazone.get();
        sb.log_zone_size = disk.log_zone_size.get();
        sb.max_size = disk.max_size.get();
        sb.imap = imap.into_iter().map(|buf| buf.into_raw()).collect();
        sb.zmap = zmap.into_iter().map(|buf| buf.into_raw()).collect();
        Ok(())
    }

    /// Drop the super block of `dev` and its bitmap buffers. Refused
    /// for the root device and while something is mounted on it.
    pub fn put_super(&self, dev: Dev) -> Result<(), FsError> {
        if dev == self.root_dev {
            log::warn!("root diskette changed: prepare for armageddon");
            return Err(FsError::Busy);
        }
        let (imap, zmap) = {
            let slots = self.supers.slots.acquire();
            let index = match slots.iter().position(|sb| sb.dev == dev) {
                Some(index) => index,
                None => return Ok(()),
            };
            let mut slots = self.supers.wait_on_super(slots, index);
            let sb = &mut slots[index];
            if sb.dev != dev {
                return Ok(());
            }
            if sb.imount.is_some() {
                log::warn!("Mounted disk changed - tssk, tssk");
                return Err(FsError::Busy);
            }
            let maps = (std::mem::take(&mut sb.imap), std::mem::take(&mut sb.zmap));
            *sb = SuperBlock::new();
            maps
        };
        for id in imap.into_iter().chain(zmap) {
            drop(self.bcache.from_raw(id));
        }
        log::info!("put_super: dev {:#06x}", dev);
        Ok(())
    }

    /// Mount the volume on block device `dev_name` over the directory
    /// `dir_name`.
    pub fn mount(&self, task: &Task<'_>, dev_name: &str, dir_name: &str, read_only: bool) -> Result<(), FsError> {
        let dev_i = self.namei(task, dev_name)?;
        if dev_i.itype() != fs_lib::InodeType::BlockDevice {
            return Err(FsError::NotPermitted);
        }
        let dev = dev_i.zone(0);
        drop(dev_i);

        let dir_i = self.namei(task, dir_name)?;
        if dir_i.count() != 1 || dir_i.num() == ROOT_INO {
            return Err(FsError::Busy);
        }
        if !dir_i.is_dir() {
            return Err(FsError::NotPermitted);
        }
        let sb = self.read_super(dev)?;
        if sb.imount.is_some() {
            return Err(FsError::Busy);
        }
        if dir_i.is_mount_point() {
            return Err(FsError::NotPermitted);
        }
        let root = self.iget(dev, ROOT_INO)?;

        {
            let mut slots = self.supers.slots.acquire();
            let sb = match slots.iter_mut().find(|sb| sb.dev == dev) {
                Some(sb) => sb,
                None => return Err(FsError::NoDevice),
            };
            if sb.imount.is_some() {
                return Err(FsError::Busy);
            }
            sb.isup = Some(root.id());
            sb.imount = Some(dir_i.id());
            if read_only {
                sb.flags.insert(SuperFlags::RDONLY);
            }
        }
        dir_i.update(|inode| inode.flags.insert(InodeFlags::MOUNT | InodeFlags::DIRTY));
        // both references now belong to the super block
        root.into_raw();
        dir_i.into_raw();
        log::info!("mount: dev {:#06x} on {}", dev, dir_name);
        Ok(())
    }

    /// Unmount the volume named by its block device or by its root
    /// directory.
    pub fn umount(&self, task: &Task<'_>, name: &str) -> Result<(), FsError> {
        let inode = self.namei(task, name)?;
        let dev = match inode.itype() {
            fs_lib::InodeType::BlockDevice => {
                let dev = inode.zone(0);
                match self.get_super(dev) {
                    Some(sb) if sb.imount.is_some() => dev,
                    _ => return Err(FsError::NotFound),
                }
            }
            fs_lib::InodeType::Directory => {
                match self.get_super(inode.dev()) {
                    Some(sb) if sb.imount.is_some() && sb.isup == Some(inode.id()) => sb.dev,
                    Some(sb) if sb.imount.is_some() => {
                        log::warn!("umount: {} is not the root of a mounted volume", name);
                        return Err(FsError::NotBlockDevice);
                    }
                    _ => return Err(FsError::NotFound),
                }
            }
            _ => return Err(FsError::NotBlockDevice),
        };
        drop(inode);

        if dev == self.root_dev {
            return Err(FsError::Busy);
        }
        if self.dev_busy(dev) {
            return Err(FsError::Busy);
        }

        let (isup, imount) = {
            let mut slots = self.supers.slots.acquire();
            match slots.iter_mut().find(|sb| sb.dev == dev) {
                Some(sb) => (sb.isup.take(), sb.imount.take()),
                None => return Err(FsError::NotFound),
            }
        };
        if let Some(imount) = imount {
            let imount = self.inode_from_raw(imount);
            let was_mounted = imount.update(|inode| {
                let was = inode.flags.contains(InodeFlags::MOUNT);
                inode.flags.remove(InodeFlags::MOUNT);
                inode.flags.insert(InodeFlags::DIRTY);
                was
            });
            if !was_mounted {
                log::warn!("Mounted inode has i_mount=0");
            }
        }
        if let Some(isup) = isup {
            drop(self.inode_from_raw(isup));
        }
        // cached inodes of the volume can only be written while its super block is loaded
        self.sync_dev(dev);
        self.put_super(dev)?;
        self.invalidate_inodes(dev);
        log::info!("umount: dev {:#06x}", dev);
        Ok(())
    }

    /// Mount the root device and make its root directory the task's
    /// root and working directory.
    pub fn mount_root<'a>(&'a self, task: &mut Task<'a>) -> Result<(), FsError> {
        let dev = self.root_dev;
        self.read_super(dev).map_err(|err| {
            log::error!("Unable to mount root: {}", err);
            err
        })?;
        let root = self.iget(dev, ROOT_INO)?;
        {
            let mut slots = self.supers.slots.acquire();
            if let Some(sb) = slots.iter_mut().find(|sb| sb.dev == dev) {
                if sb.isup.is_some() {
                    return Err(FsError::Busy);
                }
                sb.isup = Some(root.clone().into_raw());
                sb.imount = Some(root.clone().into_raw());
            }
        }
        task.pwd = Some(root.clone());
        task.root = Some(root);
        if let Ok(stat) = self.statfs(dev) {
            log::info!("{}/{} free blocks", stat.free_zones, stat.nzones);
            log::info!("{}/{} free inodes", stat.free_inodes, stat.ninodes);
        }
        Ok(())
    }

    /// Count the clear bits of both bitmaps.
    pub fn statfs(&self, dev: Dev) -> Result<FsStat, FsError> {
        let sb = self.get_super(dev).ok_or(FsError::NotFound)?;
        let zones = (sb.nzones - sb.firstdatazone) as usize;
        Ok(FsStat {
            nzones: sb.nzones,
            free_zones: self.count_free(&sb.zmap, zones),
            ninodes: sb.ninodes,
            free_inodes: self.count_free(&sb.imap, sb.ninodes as usize),
        })
    }

    /// Clear bits among bits 1..=`last` of a bitmap.
    fn count_free(&self, map: &[BufId], last: usize) -> u32 {
        let mut free = 0;
        for (i, &id) in map.iter().enumerate() {
            let first = i * BITS_PER_BLOCK;
            let data = self.bcache.data_of(id);
            for bit in first.max(1)..(first + BITS_PER_BLOCK).min(last + 1) {
                if !test_bit(&data, bit - first) {
                    free += 1;
                }
            }
        }
        free
    }

    /// Clear a bitmap bit set by an allocation that is being undone.
    pub(crate) fn rollback_bit(&self, map: BufId, bit: usize) {
        clear_bit(&mut self.bcache.data_of(map), bit);
        self.bcache.mark_dirty_of(map);
    }
}
