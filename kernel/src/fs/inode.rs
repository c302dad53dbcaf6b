//! In-memory inodes.
//!
//! The inode table caches a fixed number of inodes. A slot is named by
//! `(dev, num)`; slots with a zero count stay cached until reclaimed by
//! `get_empty_inode`. A slot is LOCKED while it is being read from or
//! written to disk, and sleepers re-check its identity once it is
//! unlocked.

use std::fmt;

use fs_lib::{ as_inodes, as_inodes_mut, as_zones, as_zones_mut, inode_block, inode_offset, DiskInode, InodeType };

use super::pipe::PipeState;
use super::Fs;
use crate::define::fs::{ BlockNo, Dev, MAX_FILE_BLOCKS, NR_DIRECT, NR_INDIRECT, ROOT_INO, S_IFMT, S_IFBLK };
use crate::error::FsError;
use crate::lock::{ Spinlock, SpinlockGuard, WaitQueue };

bitflags! {
    pub struct InodeFlags: u8 {
        /// being read or written, or held by `Inode::lock`
        const LOCKED = 1 << 0;
        /// the disk copy is stale
        const DIRTY = 1 << 1;
        /// a volume is mounted on this directory
        const MOUNT = 1 << 2;
    }
}

/// One slot of the inode table.
pub(crate) struct MInode {
    pub(crate) mode: u16,
    pub(crate) uid: u16,
    pub(crate) size: u32,
    pub(crate) mtime: u32,
    pub(crate) gid: u8,
    pub(crate) nlinks: u8,
    pub(crate) zone: [u16; 9],
    // in memory only
    pub(crate) atime: u32,
    pub(crate) ctime: u32,
    pub(crate) dev: Dev,
    pub(crate) num: u16,
    pub(crate) count: u32,
    pub(crate) flags: InodeFlags,
    pub(crate) pipe: Option<PipeState>,
}

impl MInode {
    fn empty() -> Self {
        Self {
            mode: 0,
            uid: 0,
            size: 0,
            mtime: 0,
            gid: 0,
            nlinks: 0,
            zone: [0; 9],
            atime: 0,
            ctime: 0,
            dev: 0,
            num: 0,
            count: 0,
            flags: InodeFlags::empty(),
            pipe: None,
        }
    }

    fn load(&mut self, disk: &DiskInode) {
        self.mode = disk.mode.get();
        self.uid = disk.uid.get();
        self.size = disk.size.get();
        self.mtime = disk.mtime.get();
        self.atime = self.mtime;
        self.ctime = self.mtime;
        self.gid = disk.gid;
        self.nlinks = disk.nlinks;
        for (zone, disk_zone) in self.zone.iter_mut().zip(disk.zone.iter()) {
            *zone = disk_zone.get();
        }
    }

    fn to_disk(&self) -> DiskInode {
        let mut disk = DiskInode::new();
        disk.mode.set(self.mode);
        disk.uid.set(self.uid);
        disk.size.set(self.size);
        disk.mtime.set(self.mtime);
        disk.gid = self.gid;
        disk.nlinks = self.nlinks;
        for (disk_zone, &zone) in disk.zone.iter_mut().zip(self.zone.iter()) {
            disk_zone.set(zone);
        }
        disk
    }

    pub(crate) fn is_dir(&self) -> bool {
        InodeType::from_mode(self.mode) == InodeType::Directory
    }

    pub(crate) fn is_reg(&self) -> bool {
        InodeType::from_mode(self.mode) == InodeType::Regular
    }

    pub(crate) fn touch_change(&mut self, now: u32) {
        self.ctime = now;
        self.flags.insert(InodeFlags::DIRTY);
    }
}

pub(crate) struct InodeSlots {
    pub(crate) inodes: Vec<MInode>,
    /// where the next search for an empty slot starts
    last: usize,
}

impl InodeSlots {
    fn find(&self, dev: Dev, num: u16) -> Option<usize> {
        self.inodes.iter().position(|inode| inode.dev == dev && inode.num == num)
    }
}

pub(crate) struct InodeTable {
    pub(crate) slots: Spinlock<InodeSlots>,
    /// one queue per slot, for its lock flag and for pipe readers and writers
    pub(crate) waits: Box<[WaitQueue]>,
    pub(crate) empty_inode_wait: WaitQueue,
}

impl InodeTable {
    pub(crate) fn new(nr_inodes: usize) -> Self {
        Self {
            slots: Spinlock::new(
                InodeSlots {
                    inodes: (0..nr_inodes).map(|_| MInode::empty()).collect(),
                    last: 0,
                },
                "inode_table",
            ),
            waits: (0..nr_inodes).map(|_| WaitQueue::new("inode")).collect(),
            empty_inode_wait: WaitQueue::new("empty_inode"),
        }
    }
}

impl Fs {
    pub(crate) fn wait_on_inode<'g>(
        &'g self,
        mut slots: SpinlockGuard<'g, InodeSlots>,
        index: usize,
    ) -> SpinlockGuard<'g, InodeSlots> {
        while slots.inodes[index].flags.contains(InodeFlags::LOCKED) {
            self.inodes.waits[index].sleep_on(slots);
            slots = self.inodes.slots.acquire();
        }
        slots
    }

    pub(crate) fn lock_inode(&self, index: usize) {
        let mut slots = self.wait_on_inode(self.inodes.slots.acquire(), index);
        slots.inodes[index].flags.insert(InodeFlags::LOCKED);
    }

    pub(crate) fn unlock_inode(&self, index: usize) {
        self.inodes.slots.acquire().inodes[index].flags.remove(InodeFlags::LOCKED);
        self.inodes.waits[index].wake_up();
    }

    /// Get a referenced inode, reading it from disk if it is not
    /// cached. Asking for a directory something is mounted on yields
    /// the root of the mounted volume instead.
    pub fn iget(&self, dev: Dev, num: u16) -> Result<Inode<'_>, FsError> {
        if dev == 0 {
            panic!("iget with dev==0");
        }
        let (mut dev, mut num) = (dev, num);
        loop {
            let mut slots = self.inodes.slots.acquire();
            if let Some(index) = slots.find(dev, num) {
                slots.inodes[index].count += 1;
                let mut slots = self.wait_on_inode(slots, index);
                let inode = &mut slots.inodes[index];
                if inode.dev != dev || inode.num != num {
                    inode.count -= 1;
                    let unused = inode.count == 0;
                    drop(slots);
                    if unused {
                        self.inodes.empty_inode_wait.wake_up();
                    }
                    continue;
                }
                let mounted = inode.flags.contains(InodeFlags::MOUNT);
                drop(slots);
                let handle = Inode { fs: self, index };
                if mounted {
                    match self.supers.mounted_on(handle.id()) {
                        Some(mounted_dev) => {
                            // the mount keeps its own reference
                            drop(handle);
                            dev = mounted_dev;
                            num = ROOT_INO;
                            continue;
                        }
                        None => log::warn!("Mounted inode hasn't got sb"),
                    }
                }
                return Ok(handle);
            }
            drop(slots);

            let empty = self.get_empty_inode();
            let mut slots = self.inodes.slots.acquire();
            if slots.find(dev, num).is_some() {
                // cached by someone else while we looked for a slot
                drop(slots);
                drop(empty);
                continue;
            }
            let inode = &mut slots.inodes[empty.index];
            inode.dev = dev;
            inode.num = num;
            inode.flags.insert(InodeFlags::LOCKED);
            drop(slots);
            self.read_inode(empty.index)?;
            return Ok(empty);
        }
    }

    /// Drop a reference. The last reference to an unlinked inode frees
    /// its zones and the inode itself; the last reference to a dirty
    /// inode writes it back first.
    fn iput(&self, index: usize) {
        let mut slots = self.wait_on_inode(self.inodes.slots.acquire(), index);
        if slots.inodes[index].count == 0 {
            drop(slots);
            panic!("iput: trying to free free inode");
        }
        if slots.inodes[index].pipe.is_some() {
            let inode = &mut slots.inodes[index];
            inode.count -= 1;
            if inode.count == 0 {
                inode.pipe = None;
                inode.flags = InodeFlags::empty();
            }
            let unused = inode.count == 0;
            drop(slots);
            // the other end may be asleep waiting for us
            self.inodes.waits[index].wake_up();
            if unused {
                self.inodes.empty_inode_wait.wake_up();
            }
            return;
        }
        if slots.inodes[index].dev == 0 {
            slots.inodes[index].count -= 1;
            drop(slots);
            self.inodes.empty_inode_wait.wake_up();
            return;
        }
        if slots.inodes[index].mode & S_IFMT == S_IFBLK {
            let rdev = slots.inodes[index].zone[0];
            drop(slots);
            self.sync_dev(rdev);
            slots = self.wait_on_inode(self.inodes.slots.acquire(), index);
        }
        let mut written = false;
        loop {
            let inode = &mut slots.inodes[index];
            if inode.count > 1 {
                inode.count -= 1;
                return;
            }
            if inode.nlinks == 0 {
                drop(slots);
                self.truncate_index(index);
                self.free_inode_index(index);
                return;
            }
            // a failed write leaves the slot dirty for get_empty_inode to retry
            if inode.flags.contains(InodeFlags::DIRTY) && !written {
                drop(slots);
                let _ = self.write_inode(index);
                written = true;
                slots = self.wait_on_inode(self.inodes.slots.acquire(), index);
                continue;
            }
            inode.count -= 1;
            drop(slots);
            self.inodes.empty_inode_wait.wake_up();
            return;
        }
    }

    /// Claim an unused slot, preferring clean unlocked ones. Dirty
    /// slots are written back before reuse. Sleeps while every slot is
    /// referenced. The result has count 1 and no identity.
    pub fn get_empty_inode(&self) -> Inode<'_> {
        loop {
            let mut slots = self.inodes.slots.acquire();
            let n = slots.inodes.len();
            let mut chosen = None;
            for _ in 0..n {
                slots.last = (slots.last + 1) % n;
                let last = slots.last;
                let inode = &slots.inodes[last];
                if inode.count == 0 {
                    chosen = Some(last);
                    if !inode.flags.intersects(InodeFlags::DIRTY | InodeFlags::LOCKED) {
                        break;
                    }
                }
            }
            let index = match chosen {
                Some(index) => index,
                None => {
                    log::debug!("inode table full, waiting");
                    self.inodes.empty_inode_wait.sleep_on(slots);
                    continue;
                }
            };
            let slots = self.wait_on_inode(slots, index);
            if slots.inodes[index].count != 0 {
                continue;
            }
            if slots.inodes[index].flags.contains(InodeFlags::DIRTY) {
                drop(slots);
                if self.write_inode(index).is_err() {
                    let mut slots = self.inodes.slots.acquire();
                    let inode = &mut slots.inodes[index];
                    if inode.count == 0 {
                        log::error!("dropping unwritten inode {} on dev {:#06x}", inode.num, inode.dev);
                        inode.flags.remove(InodeFlags::DIRTY);
                    }
                }
                continue;
            }
            let mut slots = slots;
            let inode = &mut slots.inodes[index];
            *inode = MInode::empty();
            inode.count = 1;
            return Inode { fs: self, index };
        }
    }

    /// Fill a slot whose identity is set and which the caller locked.
    /// On failure the slot loses its identity again.
    fn read_inode(&self, index: usize) -> Result<(), FsError> {
        let (dev, num) = {
            let slots = self.inodes.slots.acquire();
            (slots.inodes[index].dev, slots.inodes[index].num)
        };
        let result = self.get_super(dev).ok_or(FsError::NoDevice).and_then(|sb| {
            if num == 0 || num > sb.ninodes {
                log::error!("read_inode: inode {} out of range on dev {:#06x}", num, dev);
                return Err(FsError::InvalidArgument);
            }
            let buf = self.bcache.bread(dev, inode_block(sb.imap_blocks, sb.zmap_blocks, num))?;
            let data = buf.data();
            let disk = as_inodes(&data)[inode_offset(num)];
            self.inodes.slots.acquire().inodes[index].load(&disk);
            Ok(())
        });
        if result.is_err() {
            let mut slots = self.inodes.slots.acquire();
            slots.inodes[index].dev = 0;
            slots.inodes[index].num = 0;
        }
        self.unlock_inode(index);
        result
    }

    /// Copy a dirty inode into its buffer. On failure it stays dirty.
    fn write_inode(&self, index: usize) -> Result<(), FsError> {
        self.lock_inode(index);
        let (dev, num, dirty) = {
            let slots = self.inodes.slots.acquire();
            let inode = &slots.inodes[index];
            (inode.dev, inode.num, inode.flags.contains(InodeFlags::DIRTY))
        };
        if !dirty || dev == 0 {
            self.unlock_inode(index);
            return Ok(());
        }
        let sb = match self.get_super(dev) {
            Some(sb) => sb,
            None => panic!("trying to write inode without device"),
        };
        let result = self.bcache.bread(dev, inode_block(sb.imap_blocks, sb.zmap_blocks, num)).map(|buf| {
            {
                let mut data = buf.data();
                let mut slots = self.inodes.slots.acquire();
                let inode = &mut slots.inodes[index];
                as_inodes_mut(&mut data)[inode_offset(num)] = inode.to_disk();
                inode.flags.remove(InodeFlags::DIRTY);
            }
            buf.mark_dirty();
        });
        if let Err(err) = result {
            log::error!("write_inode: inode {} on dev {:#06x}: {}", num, dev, err);
        }
        self.unlock_inode(index);
        result
    }

    /// Write every dirty inode to its buffer.
    pub fn sync_inodes(&self) {
        for index in 0..self.inodes.waits.len() {
            let slots = self.wait_on_inode(self.inodes.slots.acquire(), index);
            let inode = &slots.inodes[index];
            if inode.flags.contains(InodeFlags::DIRTY) && inode.pipe.is_none() {
                drop(slots);
                let _ = self.write_inode(index);
            }
        }
    }

    /// Forget every cached inode of `dev` without writing it back.
    pub fn invalidate_inodes(&self, dev: Dev) {
        for index in 0..self.inodes.waits.len() {
            let mut slots = self.wait_on_inode(self.inodes.slots.acquire(), index);
            let inode = &mut slots.inodes[index];
            if inode.dev == dev {
                if inode.count != 0 {
                    log::warn!("inode {} in use on removed disk {:#06x}", inode.num, dev);
                }
                inode.dev = 0;
                inode.flags.remove(InodeFlags::DIRTY);
            }
        }
    }

    /// Whether anything but the root of `dev` is referenced, or the
    /// root more than once.
    pub(crate) fn dev_busy(&self, dev: Dev) -> bool {
        let slots = self.inodes.slots.acquire();
        slots.inodes.iter().filter(|inode| inode.dev == dev).any(|inode| {
            if inode.num == ROOT_INO {
                inode.count > 1
            } else {
                inode.count != 0
            }
        })
    }

    /// Disk block holding byte `block * BLOCK_SIZE` of the file, or
    /// `None` for a hole.
    pub fn bmap(&self, inode: &Inode<'_>, block: usize) -> Option<BlockNo> {
        self.map_block(inode.index, block, false)
    }

    /// Like `bmap`, allocating the block and any indirect blocks on the
    /// way. `None` when the device is full or the block is past the
    /// largest file.
    pub fn create_block(&self, inode: &Inode<'_>, block: usize) -> Option<BlockNo> {
        self.map_block(inode.index, block, true)
    }

    fn map_block(&self, index: usize, block: usize, create: bool) -> Option<BlockNo> {
        if block >= MAX_FILE_BLOCKS {
            log::warn!("_bmap: block {} too big", block);
            return None;
        }
        let dev = self.inodes.slots.acquire().inodes[index].dev;
        if block < NR_DIRECT {
            return self.zone_entry(index, block, dev, create);
        }
        let block = block - NR_DIRECT;
        if block < NR_INDIRECT {
            let ind = self.zone_entry(index, 7, dev, create)?;
            return self.indirect_entry(dev, ind, block, create);
        }
        let block = block - NR_INDIRECT;
        let dind = self.zone_entry(index, 8, dev, create)?;
        let ind = self.indirect_entry(dev, dind, block / NR_INDIRECT, create)?;
        self.indirect_entry(dev, ind, block % NR_INDIRECT, create)
    }

    fn zone_entry(&self, index: usize, i: usize, dev: Dev, create: bool) -> Option<BlockNo> {
        let zone = self.inodes.slots.acquire().inodes[index].zone[i];
        if zone != 0 || !create {
            return nonzero(zone);
        }
        let new = self.new_block(dev).ok()?;
        let mut slots = self.inodes.slots.acquire();
        let inode = &mut slots.inodes[index];
        if inode.zone[i] == 0 {
            inode.zone[i] = new as u16;
            inode.touch_change(self.now());
            return Some(new);
        }
        // filled in while we were allocating
        let existing = inode.zone[i];
        drop(slots);
        self.free_block(dev, new);
        nonzero(existing)
    }

    fn indirect_entry(&self, dev: Dev, block: BlockNo, i: usize, create: bool) -> Option<BlockNo> {
        let buf = self.bcache.bread(dev, block).ok()?;
        let zone = as_zones(&buf.data())[i].get();
        if zone != 0 || !create {
            return nonzero(zone);
        }
        let new = self.new_block(dev).ok()?;
        let existing = {
            let mut data = buf.data();
            let zones = as_zones_mut(&mut data);
            let existing = zones[i].get();
            if existing == 0 {
                zones[i].set(new as u16);
            }
            existing
        };
        if existing == 0 {
            buf.mark_dirty();
            return Some(new);
        }
        drop(buf);
        self.free_block(dev, new);
        nonzero(existing)
    }

    pub(crate) fn inode_from_raw(&self, id: InodeId) -> Inode<'_> {
        Inode { fs: self, index: id.0 }
    }

    /// New handle for a slot whose reference is held as a raw id.
    pub(crate) fn inode_dup_raw(&self, id: InodeId) -> Inode<'_> {
        self.inodes.slots.acquire().inodes[id.0].count += 1;
        Inode { fs: self, index: id.0 }
    }
}

fn nonzero(zone: u16) -> Option<BlockNo> {
    match zone {
        0 => None,
        zone => Some(zone as BlockNo),
    }
}

/// A referenced slot of the inode table. Cloning takes another
/// reference, dropping releases one.
pub struct Inode<'a> {
    pub(crate) fs: &'a Fs,
    pub(crate) index: usize,
}

/// An inode reference detached from its handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InodeId(pub(crate) usize);

impl<'a> Inode<'a> {
    pub(crate) fn with<R>(&self, f: impl FnOnce(&MInode) -> R) -> R {
        f(&self.fs.inodes.slots.acquire().inodes[self.index])
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut MInode) -> R) -> R {
        f(&mut self.fs.inodes.slots.acquire().inodes[self.index])
    }

    pub fn dev(&self) -> Dev {
        self.with(|i| i.dev)
    }

    pub fn num(&self) -> u16 {
        self.with(|i| i.num)
    }

    pub fn mode(&self) -> u16 {
        self.with(|i| i.mode)
    }

    pub fn uid(&self) -> u16 {
        self.with(|i| i.uid)
    }

    pub fn gid(&self) -> u8 {
        self.with(|i| i.gid)
    }

    pub fn size(&self) -> u32 {
        self.with(|i| i.size)
    }

    pub fn nlinks(&self) -> u8 {
        self.with(|i| i.nlinks)
    }

    pub fn zone(&self, i: usize) -> u16 {
        self.with(|inode| inode.zone[i])
    }

    pub fn atime(&self) -> u32 {
        self.with(|i| i.atime)
    }

    pub fn mtime(&self) -> u32 {
        self.with(|i| i.mtime)
    }

    pub fn ctime(&self) -> u32 {
        self.with(|i| i.ctime)
    }

    /// Live references, this one included.
    pub fn count(&self) -> u32 {
        self.with(|i| i.count)
    }

    pub fn itype(&self) -> InodeType {
        InodeType::from_mode(self.mode())
    }

    pub fn is_dir(&self) -> bool {
        self.itype() == InodeType::Directory
    }

    pub fn is_dirty(&self) -> bool {
        self.with(|i| i.flags.contains(InodeFlags::DIRTY))
    }

    pub fn is_mount_point(&self) -> bool {
        self.with(|i| i.flags.contains(InodeFlags::MOUNT))
    }

    pub fn is_pipe(&self) -> bool {
        self.with(|i| i.pipe.is_some())
    }

    pub fn mark_dirty(&self) {
        self.update(|i| i.flags.insert(InodeFlags::DIRTY))
    }

    /// Whether both handles refer to the same slot.
    pub fn same(&self, other: &Inode<'_>) -> bool {
        self.index == other.index
    }

    pub fn id(&self) -> InodeId {
        InodeId(self.index)
    }

    /// Keep the reference without a handle.
    pub fn into_raw(self) -> InodeId {
        let id = self.id();
        std::mem::forget(self);
        id
    }

    /// Sleep until the inode is unlocked, then lock it.
    pub fn lock(&self) -> InodeGuard<'_, 'a> {
        self.fs.lock_inode(self.index);
        InodeGuard { inode: self }
    }
}

impl Clone for Inode<'_> {
    fn clone(&self) -> Self {
        self.fs.inode_dup_raw(self.id())
    }
}

impl Drop for Inode<'_> {
    fn drop(&mut self) {
        self.fs.iput(self.index);
    }
}

impl fmt::Debug for Inode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (dev, num, count) = self.with(|i| (i.dev, i.num, i.count));
        f.debug_struct("Inode")
            .field("dev", &format_args!("{:#06x}", dev))
            .field("num", &num)
            .field("count", &count)
            .finish()
    }
}

/// Holds the lock flag of an inode; unlocks on drop.
pub struct InodeGuard<'b, 'a> {
    inode: &'b Inode<'a>,
}

impl Drop for InodeGuard<'_, '_> {
    fn drop(&mut self) {
        self.inode.fs.unlock_inode(self.inode.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::define::fs::{ FsConfig, OpenFlags };
    use crate::driver::RamDisk;
    use crate::process::Task;
    use crate::time::FixedClock;

    const DEV: Dev = 0x301;

    fn setup(nr_inodes: usize, ninodes: u16) -> (Fs, Arc<RamDisk>) {
        let config = FsConfig { nr_inodes, ..FsConfig::default() };
        let fs = Fs::with_clock(config, FixedClock::new(1000)).unwrap();
        let disk = Arc::new(RamDisk::formatted(64, Some(ninodes)).unwrap());
        fs.register_device(DEV, disk.clone());
        (fs, disk)
    }

    fn free_slots(fs: &Fs) -> usize {
        fs.inodes.slots.acquire().inodes.iter().filter(|i| i.count == 0).count()
    }

    #[test]
    fn dirty_slot_is_written_back_before_reuse() {
        let (fs, _disk) = setup(3, 32);
        let mut task = Task::superuser();
        fs.mount_root(&mut task).unwrap();
        let f = fs.open_namei(&task, "/f", OpenFlags::CREAT | OpenFlags::WRONLY, 0o644).unwrap();
        let (num, index) = (f.num(), f.index);
        drop(f);
        {
            let mut slots = fs.inodes.slots.acquire();
            let inode = &mut slots.inodes[index];
            assert_eq!((inode.num, inode.count), (num, 0));
            inode.mtime = 4242;
            inode.flags.insert(InodeFlags::DIRTY);
        }

        // the clean slot goes first, then the dirty one must be reclaimed
        let a = fs.get_empty_inode();
        assert_ne!(a.index, index);
        let b = fs.get_empty_inode();
        assert_eq!(b.index, index);
        drop((a, b));

        let f = fs.iget(DEV, num).unwrap();
        assert_eq!(f.mtime(), 4242);
        drop(f);
        task.release();
    }

    #[test]
    fn failed_read_gives_the_slot_back() {
        // inode 40 lives in the second inode block, never read at mount
        let (fs, disk) = setup(3, 64);
        let mut task = Task::superuser();
        fs.mount_root(&mut task).unwrap();
        let sb = fs.get_super(DEV).unwrap();
        let block = inode_block(sb.imap_blocks, sb.zmap_blocks, 40);
        assert_ne!(block, inode_block(sb.imap_blocks, sb.zmap_blocks, ROOT_INO));

        disk.fail_reads_from(block);
        assert_eq!(fs.iget(DEV, 40).unwrap_err(), FsError::Io);
        assert_eq!(free_slots(&fs), 2);
        assert!(fs.inodes.slots.acquire().find(DEV, 40).is_none());

        disk.fail_reads_from(u32::MAX);
        let inode = fs.iget(DEV, 40).unwrap();
        assert_eq!((inode.num(), inode.count()), (40, 1));
        drop(inode);
        task.release();
    }

    #[test]
    fn unwritable_inode_does_not_hang_its_last_put() {
        let (fs, disk) = setup(4, 64);
        let mut task = Task::superuser();
        fs.mount_root(&mut task).unwrap();
        let sb = fs.get_super(DEV).unwrap();
        let block = inode_block(sb.imap_blocks, sb.zmap_blocks, 40);

        disk.fail_reads_from(block);
        let inode = fs.get_empty_inode();
        inode.update(|i| {
            i.dev = DEV;
            i.num = 40;
            i.nlinks = 1;
            i.flags.insert(InodeFlags::DIRTY);
        });
        let index = inode.index;
        drop(inode);
        assert!(fs.inodes.slots.acquire().inodes[index].flags.contains(InodeFlags::DIRTY));

        // reclaiming the slot gives up on the write
        let held: Vec<_> = (0..3).map(|_| fs.get_empty_inode()).collect();
        assert!(held.iter().any(|i| i.index == index));
        drop(held);
        disk.fail_reads_from(u32::MAX);
        task.release();
    }
}
