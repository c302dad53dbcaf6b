//! buffer cache layer
//!
//! Each buffer caches one block of one device. A buffer is named by
//! `(dev, blockno)` through a hash index and sits on a circular free
//! list in least-recently-claimed order; buffers with live references
//! stay on the list but are skipped when a buffer is reclaimed.
//!
//! A buffer is LOCKED while a transfer is in flight. Nobody but the
//! transfer touches its data while the flag is set.

use std::collections::HashMap;
use std::ops::{ Deref, DerefMut };
use std::sync::Arc;

use fs_lib::{ BlockData, BLOCK_SIZE };

use crate::define::fs::{ BlockNo, Dev, PAGE_SIZE };
use crate::driver::{ BlockDevice, DeviceTable };
use crate::error::FsError;
use crate::lock::{ Spinlock, SpinlockGuard, WaitQueue };

const NIL: usize = usize::MAX;

bitflags! {
    pub struct BufFlags: u8 {
        /// data matches the disk
        const UPTODATE = 1 << 0;
        /// data must be written back before the buffer is reused
        const DIRTY = 1 << 1;
        /// a transfer is in flight
        const LOCKED = 1 << 2;
    }
}

/// Direction of a block transfer. The read/write-ahead variants are
/// dropped instead of waiting when the buffer is already locked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rw {
    Read,
    Write,
    ReadAhead,
    WriteAhead,
}

impl Rw {
    fn is_write(self) -> bool {
        matches!(self, Rw::Write | Rw::WriteAhead)
    }

    fn is_ahead(self) -> bool {
        matches!(self, Rw::ReadAhead | Rw::WriteAhead)
    }
}

pub struct Bcache {
    ctrl: Spinlock<BufLru>,
    bufs: Box<[BufInner]>,
    /// sleepers waiting for any buffer to become free
    buffer_wait: WaitQueue,
    devices: DeviceTable,
}

impl Bcache {
    /// Sizes are checked by `FsConfig::validate`.
    pub(crate) fn new(nr_buffers: usize) -> Self {
        log::debug!("bcache: {} buffers = {} bytes buffer space", nr_buffers, nr_buffers * BLOCK_SIZE);
        Self {
            ctrl: Spinlock::new(BufLru::new(nr_buffers), "BufLru"),
            bufs: (0..nr_buffers).map(|_| BufInner::new()).collect(),
            buffer_wait: WaitQueue::new("buffer_wait"),
            devices: DeviceTable::new(),
        }
    }

    pub fn register_device(&self, dev: Dev, device: Arc<dyn BlockDevice>) {
        self.devices.register(dev, device);
    }

    pub fn device(&self, dev: Dev) -> Option<Arc<dyn BlockDevice>> {
        self.devices.get(dev)
    }

    pub fn nr_buffers(&self) -> usize {
        self.bufs.len()
    }

    /// Sleep until buffer `index` is unlocked, returning with the
    /// control lock held again.
    fn wait_unlocked<'g>(&'g self, mut ctrl: SpinlockGuard<'g, BufLru>, index: usize) -> SpinlockGuard<'g, BufLru> {
        while ctrl.inner[index].flags.contains(BufFlags::LOCKED) {
            self.bufs[index].wait.sleep_on(ctrl);
            ctrl = self.ctrl.acquire();
        }
        ctrl
    }

    pub fn wait_on_buffer(&self, buf: &Buf<'_>) {
        drop(self.wait_unlocked(self.ctrl.acquire(), buf.index));
    }

    /// Find a cached buffer and take a reference to it.
    ///
    /// Returns once the buffer is unlocked; `None` if the block is not
    /// cached.
    pub fn get_hash_table(&self, dev: Dev, blockno: BlockNo) -> Option<Buf<'_>> {
        loop {
            let mut ctrl = self.ctrl.acquire();
            let index = ctrl.find(dev, blockno)?;
            ctrl.inner[index].refcnt += 1;
            let mut ctrl = self.wait_unlocked(ctrl, index);
            let b = &mut ctrl.inner[index];
            if b.dev == dev && b.blockno == blockno {
                return Some(Buf { cache: self, index, dev, blockno });
            }
            b.refcnt -= 1;
        }
    }

    /// Get a referenced buffer for the block, claiming a free one when
    /// the block is not cached. The returned buffer is not necessarily
    /// up to date.
    pub fn getblk(&self, dev: Dev, blockno: BlockNo) -> Buf<'_> {
        'repeat: loop {
            if let Some(buf) = self.get_hash_table(dev, blockno) {
                return buf;
            }
            let ctrl = self.ctrl.acquire();
            let index = match ctrl.victim() {
                Some(index) => index,
                None => {
                    self.buffer_wait.sleep_on(ctrl);
                    continue;
                }
            };
            let mut ctrl = self.wait_unlocked(ctrl, index);
            if ctrl.inner[index].refcnt != 0 {
                continue;
            }
            while ctrl.inner[index].flags.contains(BufFlags::DIRTY) {
                let (old_dev, old_blockno) = (ctrl.inner[index].dev, ctrl.inner[index].blockno);
                drop(ctrl);
                self.transfer(Rw::Write, index, old_dev, old_blockno);
                ctrl = self.wait_unlocked(self.ctrl.acquire(), index);
                if ctrl.inner[index].refcnt != 0 {
                    continue 'repeat;
                }
            }
            // someone else may have added the block while we slept
            if ctrl.find(dev, blockno).is_some() {
                continue;
            }
            ctrl.remove_from_queues(index);
            let b = &mut ctrl.inner[index];
            b.refcnt = 1;
            b.flags = BufFlags::empty();
            b.dev = dev;
            b.blockno = blockno;
            ctrl.insert_into_queues(index);
            return Buf { cache: self, index, dev, blockno };
        }
    }

    /// Drop a reference. Releasing an unreferenced buffer is fatal.
    fn brelse(&self, index: usize) {
        let mut ctrl = self.wait_unlocked(self.ctrl.acquire(), index);
        let b = &mut ctrl.inner[index];
        if b.refcnt == 0 {
            drop(ctrl);
            panic!("Trying to free free buffer");
        }
        b.refcnt -= 1;
        drop(ctrl);
        self.buffer_wait.wake_up();
    }

    /// Read a block, from the cache if possible.
    pub fn bread(&self, dev: Dev, blockno: BlockNo) -> Result<Buf<'_>, FsError> {
        let buf = self.getblk(dev, blockno);
        if buf.uptodate() {
            return Ok(buf);
        }
        self.ll_rw_block(Rw::Read, &buf);
        self.wait_on_buffer(&buf);
        if buf.uptodate() {
            Ok(buf)
        } else {
            Err(FsError::Io)
        }
    }

    /// Like `bread`, additionally starting read-ahead of `ahead`, which
    /// are not waited for.
    pub fn breada(&self, dev: Dev, first: BlockNo, ahead: &[BlockNo]) -> Result<Buf<'_>, FsError> {
        let buf = self.getblk(dev, first);
        if !buf.uptodate() {
            self.ll_rw_block(Rw::Read, &buf);
        }
        for &blockno in ahead {
            let tmp = self.getblk(dev, blockno);
            if !tmp.uptodate() {
                self.ll_rw_block(Rw::ReadAhead, &tmp);
            }
        }
        self.wait_on_buffer(&buf);
        if buf.uptodate() {
            Ok(buf)
        } else {
            Err(FsError::Io)
        }
    }

    /// Read four blocks into one page. Zero block numbers are skipped
    /// and leave their part of the page untouched, as do failed reads.
    pub fn bread_page(&self, dev: Dev, blocks: &[BlockNo; 4], page: &mut [u8; PAGE_SIZE]) {
        let bufs: Vec<Option<Buf<'_>>> = blocks
            .iter()
            .map(|&blockno| {
                if blockno == 0 {
                    return None;
                }
                let buf = self.getblk(dev, blockno);
                if !buf.uptodate() {
                    self.ll_rw_block(Rw::Read, &buf);
                }
                Some(buf)
            })
            .collect();
        for (chunk, buf) in page.chunks_mut(BLOCK_SIZE).zip(bufs.iter()) {
            if let Some(buf) = buf {
                self.wait_on_buffer(buf);
                if buf.uptodate() {
                    chunk.copy_from_slice(&buf.data()[..]);
                }
            }
        }
    }

    /// Start a transfer for a referenced buffer. Transfers are
    /// synchronous; the buffer is unlocked again on return.
    pub fn ll_rw_block(&self, rw: Rw, buf: &Buf<'_>) {
        self.transfer(rw, buf.index, buf.dev, buf.blockno);
    }

    fn transfer(&self, rw: Rw, index: usize, dev: Dev, blockno: BlockNo) {
        let mut ctrl = self.ctrl.acquire();
        if ctrl.inner[index].flags.contains(BufFlags::LOCKED) {
            if rw.is_ahead() {
                return;
            }
            ctrl = self.wait_unlocked(ctrl, index);
        }
        let b = &mut ctrl.inner[index];
        if b.dev != dev || b.blockno != blockno {
            return;
        }
        if rw.is_write() && !b.flags.contains(BufFlags::DIRTY) {
            return;
        }
        b.flags.insert(BufFlags::LOCKED);
        // changes made from here on dirty the buffer again
        b.flags.remove(BufFlags::DIRTY);
        drop(ctrl);

        let result = match self.devices.get(dev) {
            Some(device) => {
                let mut data = self.bufs[index].data.acquire();
                if rw.is_write() {
                    device.write_block(blockno, &data)
                } else {
                    device.read_block(blockno, &mut data)
                }
            }
            None => {
                log::error!("ll_rw_block: trying to access nonexistent block-device {:#06x}", dev);
                Err(FsError::NoDevice)
            }
        };

        let mut ctrl = self.ctrl.acquire();
        let flags = &mut ctrl.inner[index].flags;
        match result {
            Ok(()) => flags.insert(BufFlags::UPTODATE),
            Err(err) => {
                log::error!("I/O error: dev {:#06x}, block {}: {}", dev, blockno, err);
                flags.remove(BufFlags::UPTODATE);
            }
        }
        flags.remove(BufFlags::LOCKED);
        drop(ctrl);
        self.bufs[index].wait.wake_up();
    }

    /// Write back dirty buffers of `dev`, or of every device.
    pub(crate) fn do_sync(&self, dev: Option<Dev>) {
        for index in 0..self.bufs.len() {
            let ctrl = self.ctrl.acquire();
            if dev.map_or(false, |dev| ctrl.inner[index].dev != dev) {
                continue;
            }
            let ctrl = self.wait_unlocked(ctrl, index);
            let b = &ctrl.inner[index];
            if dev.map_or(true, |dev| b.dev == dev) && b.flags.contains(BufFlags::DIRTY) {
                let (bdev, blockno) = (b.dev, b.blockno);
                drop(ctrl);
                self.transfer(Rw::Write, index, bdev, blockno);
            }
        }
    }

    /// Forget the contents of every buffer of `dev`, dirty or not.
    pub fn invalidate_buffers(&self, dev: Dev) {
        for index in 0..self.bufs.len() {
            let ctrl = self.ctrl.acquire();
            if ctrl.inner[index].dev != dev {
                continue;
            }
            let mut ctrl = self.wait_unlocked(ctrl, index);
            let b = &mut ctrl.inner[index];
            if b.dev == dev {
                b.flags.remove(BufFlags::UPTODATE | BufFlags::DIRTY);
            }
        }
    }

    fn flags(&self, index: usize) -> BufFlags {
        self.ctrl.acquire().inner[index].flags
    }

    fn update_flags(&self, index: usize, f: impl FnOnce(&mut BufFlags)) {
        f(&mut self.ctrl.acquire().inner[index].flags)
    }

    fn data(&self, index: usize) -> SpinlockGuard<'_, BufData> {
        drop(self.wait_unlocked(self.ctrl.acquire(), index));
        self.bufs[index].data.acquire()
    }

    /// Turn a reference leaked with `Buf::into_raw` back into a handle.
    pub fn from_raw(&self, id: BufId) -> Buf<'_> {
        let ctrl = self.ctrl.acquire();
        let b = &ctrl.inner[id.0];
        assert!(b.refcnt > 0, "bcache: stale buffer id");
        Buf { cache: self, index: id.0, dev: b.dev, blockno: b.blockno }
    }

    /// Data of a buffer whose reference is held as a raw id.
    pub(crate) fn data_of(&self, id: BufId) -> SpinlockGuard<'_, BufData> {
        self.data(id.0)
    }

    pub(crate) fn mark_dirty_of(&self, id: BufId) {
        self.update_flags(id.0, |flags| flags.insert(BufFlags::DIRTY));
    }
}

/// A referenced buffer. Dropping it releases the reference.
pub struct Buf<'a> {
    cache: &'a Bcache,
    index: usize,
    dev: Dev,
    blockno: BlockNo,
}

/// A buffer reference detached from its handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufId(usize);

impl<'a> Buf<'a> {
    pub fn dev(&self) -> Dev {
        self.dev
    }

    pub fn blockno(&self) -> BlockNo {
        self.blockno
    }

    /// Cache slot backing this buffer.
    pub fn slot(&self) -> usize {
        self.index
    }

    /// Lock the data, after waiting for any transfer to finish.
    /// Do not sleep while holding the guard.
    pub fn data(&self) -> SpinlockGuard<'_, BufData> {
        self.cache.data(self.index)
    }

    pub fn uptodate(&self) -> bool {
        self.cache.flags(self.index).contains(BufFlags::UPTODATE)
    }

    pub fn dirty(&self) -> bool {
        self.cache.flags(self.index).contains(BufFlags::DIRTY)
    }

    pub fn set_uptodate(&self) {
        self.cache.update_flags(self.index, |flags| flags.insert(BufFlags::UPTODATE));
    }

    pub fn mark_dirty(&self) {
        self.cache.update_flags(self.index, |flags| flags.insert(BufFlags::DIRTY));
    }

    /// Drop both the cached contents and any pending write-back.
    pub fn discard(&self) {
        self.cache.update_flags(self.index, |flags| flags.remove(BufFlags::UPTODATE | BufFlags::DIRTY));
    }

    /// Number of live references, this one included.
    pub fn count(&self) -> u32 {
        self.cache.ctrl.acquire().inner[self.index].refcnt
    }

    /// Keep the reference without a handle; see `Bcache::from_raw`.
    pub fn into_raw(self) -> BufId {
        let id = BufId(self.index);
        std::mem::forget(self);
        id
    }
}

impl<'a> Drop for Buf<'a> {
    fn drop(&mut self) {
        self.cache.brelse(self.index);
    }
}

struct BufLru {
    inner: Vec<BufCtrl>,
    hash: HashMap<(Dev, BlockNo), usize>,
    /// oldest buffer on the circular free list
    free_list: usize,
}

impl BufLru {
    fn new(n: usize) -> Self {
        let inner = (0..n)
            .map(|i| BufCtrl {
                prev: (i + n - 1) % n,
                next: (i + 1) % n,
                ..BufCtrl::new()
            })
            .collect();
        Self {
            inner,
            hash: HashMap::new(),
            free_list: 0,
        }
    }

    fn find(&self, dev: Dev, blockno: BlockNo) -> Option<usize> {
        self.hash.get(&(dev, blockno)).copied()
    }

    /// The unreferenced buffer cheapest to reclaim, scanning from the
    /// oldest. Clean beats dirty, unlocked beats locked.
    fn victim(&self) -> Option<usize> {
        let mut best: Option<(usize, u8)> = None;
        let mut index = self.free_list;
        loop {
            let b = &self.inner[index];
            if b.refcnt == 0 {
                let badness = b.badness();
                if best.map_or(true, |(_, min)| badness < min) {
                    best = Some((index, badness));
                    if badness == 0 {
                        break;
                    }
                }
            }
            index = b.next;
            if index == self.free_list {
                break;
            }
        }
        best.map(|(index, _)| index)
    }

    fn remove_from_queues(&mut self, index: usize) {
        let (dev, blockno) = (self.inner[index].dev, self.inner[index].blockno);
        if dev != 0 && self.hash.get(&(dev, blockno)) == Some(&index) {
            self.hash.remove(&(dev, blockno));
        }
        let (prev, next) = (self.inner[index].prev, self.inner[index].next);
        if prev == NIL || next == NIL {
            panic!("Free block list corrupted");
        }
        self.inner[prev].next = next;
        self.inner[next].prev = prev;
        if self.free_list == index {
            self.free_list = next;
        }
        self.inner[index].prev = NIL;
        self.inner[index].next = NIL;
    }

    /// Put the buffer at the tail of the free list and index it.
    fn insert_into_queues(&mut self, index: usize) {
        let head = self.free_list;
        let tail = self.inner[head].prev;
        self.inner[index].next = head;
        self.inner[index].prev = tail;
        self.inner[tail].next = index;
        self.inner[head].prev = index;
        let (dev, blockno) = (self.inner[index].dev, self.inner[index].blockno);
        if dev != 0 {
            self.hash.insert((dev, blockno), index);
        }
    }
}

struct BufCtrl {
    dev: Dev,
    blockno: BlockNo,
    refcnt: u32,
    flags: BufFlags,
    prev: usize,
    next: usize,
}

impl BufCtrl {
    const fn new() -> Self {
        Self {
            dev: 0,
            blockno: 0,
            refcnt: 0,
            flags: BufFlags::empty(),
            prev: NIL,
            next: NIL,
        }
    }

    fn badness(&self) -> u8 {
        ((self.flags.contains(BufFlags::DIRTY) as u8) << 1) + self.flags.contains(BufFlags::LOCKED) as u8
    }
}

struct BufInner {
    data: Spinlock<BufData>,
    wait: WaitQueue,
}

impl BufInner {
    fn new() -> Self {
        Self {
            data: Spinlock::new(BufData::new(), "BufData"),
            wait: WaitQueue::new("buffer"),
        }
    }
}

/// Alignment of BufData should suffice for other structs
/// that might convert from this struct.
#[repr(C, align(8))]
pub struct BufData(BlockData);

impl BufData {
    const fn new() -> Self {
        Self([0; BLOCK_SIZE])
    }
}

impl Deref for BufData {
    type Target = BlockData;
    fn deref(&self) -> &BlockData {
        &self.0
    }
}

impl DerefMut for BufData {
    fn deref_mut(&mut self) -> &mut BlockData {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RamDisk;
    use std::sync::atomic::{ AtomicBool, Ordering };
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    const DEV: Dev = 0x301;

    fn cache(nr_buffers: usize) -> (Bcache, Arc<RamDisk>) {
        let disk = Arc::new(RamDisk::new(64));
        let cache = Bcache::new(nr_buffers);
        cache.register_device(DEV, disk.clone());
        (cache, disk)
    }

    #[test]
    fn bread_hits_the_cache() {
        let (cache, disk) = cache(4);
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = 0xab;
        disk.write_block(7, &block).unwrap();

        let buf = cache.bread(DEV, 7).unwrap();
        assert_eq!(buf.data()[0], 0xab);
        drop(buf);
        let reads = disk.reads();
        let buf = cache.bread(DEV, 7).unwrap();
        assert_eq!(buf.data()[0], 0xab);
        assert_eq!(disk.reads(), reads);
    }

    #[test]
    fn one_buffer_per_block() {
        let (cache, _) = cache(4);
        let a = cache.getblk(DEV, 3);
        let b = cache.getblk(DEV, 3);
        assert_eq!(a.slot(), b.slot());
        assert_eq!(a.count(), 2);
        let c = cache.getblk(DEV, 4);
        assert_ne!(a.slot(), c.slot());
    }

    #[test]
    fn reclaiming_a_dirty_buffer_writes_it_back() {
        let (cache, disk) = cache(2);
        {
            let buf = cache.getblk(DEV, 10);
            buf.data()[5] = 42;
            buf.set_uptodate();
            buf.mark_dirty();
        }
        // with the only clean buffer held, the dirty one must be reused
        let _held = cache.getblk(DEV, 11);
        drop(cache.getblk(DEV, 12));
        let mut block = [0u8; BLOCK_SIZE];
        disk.read_block(10, &mut block).unwrap();
        assert_eq!(block[5], 42);
        assert!(cache.get_hash_table(DEV, 10).is_none());
    }

    #[test]
    fn clean_buffers_are_reclaimed_first() {
        let (cache, disk) = cache(3);
        let dirty = cache.getblk(DEV, 1);
        dirty.set_uptodate();
        dirty.mark_dirty();
        drop(dirty);
        drop(cache.getblk(DEV, 2));
        drop(cache.getblk(DEV, 3));
        let writes = disk.writes();
        // the oldest buffer is dirty, so the clean one behind it goes
        drop(cache.getblk(DEV, 4));
        assert_eq!(disk.writes(), writes);
        assert!(cache.get_hash_table(DEV, 1).is_some());
        assert!(cache.get_hash_table(DEV, 2).is_none());
    }

    #[test]
    fn failed_read_returns_error() {
        let (cache, disk) = cache(4);
        disk.fail_reads_from(20);
        assert_eq!(cache.bread(DEV, 20).err(), Some(FsError::Io));
        let buf = cache.getblk(DEV, 20);
        assert!(!buf.uptodate());
        assert_eq!(buf.count(), 1);
    }

    #[test]
    fn unknown_device_reads_fail() {
        let (cache, _) = cache(4);
        assert!(cache.bread(0x999, 1).is_err());
    }

    #[test]
    fn breada_reads_ahead() {
        let (cache, disk) = cache(8);
        let buf = cache.breada(DEV, 1, &[2, 3]).unwrap();
        assert!(buf.uptodate());
        drop(buf);
        let reads = disk.reads();
        drop(cache.bread(DEV, 3).unwrap());
        assert_eq!(disk.reads(), reads);
    }

    #[test]
    fn bread_page_skips_zero_blocks() {
        let (cache, disk) = cache(8);
        let block = [7u8; BLOCK_SIZE];
        disk.write_block(5, &block).unwrap();
        let mut page = [1u8; PAGE_SIZE];
        cache.bread_page(DEV, &[5, 0, 6, 0], &mut page);
        assert!(page[..BLOCK_SIZE].iter().all(|&b| b == 7));
        assert!(page[BLOCK_SIZE..2 * BLOCK_SIZE].iter().all(|&b| b == 1));
        assert!(page[2 * BLOCK_SIZE..3 * BLOCK_SIZE].iter().all(|&b| b == 0));
    }

    #[test]
    fn sync_writes_dirty_buffers() {
        let (cache, disk) = cache(4);
        let buf = cache.getblk(DEV, 9);
        buf.data()[0] = 9;
        buf.set_uptodate();
        buf.mark_dirty();
        cache.do_sync(Some(DEV));
        assert!(!buf.dirty());
        let mut block = [0u8; BLOCK_SIZE];
        disk.read_block(9, &mut block).unwrap();
        assert_eq!(block[0], 9);
    }

    #[test]
    fn invalidate_forces_a_reread() {
        let (cache, disk) = cache(4);
        drop(cache.bread(DEV, 2).unwrap());
        cache.invalidate_buffers(DEV);
        let reads = disk.reads();
        drop(cache.bread(DEV, 2).unwrap());
        assert_eq!(disk.reads(), reads + 1);
    }

    #[test]
    #[should_panic(expected = "Trying to free free buffer")]
    fn double_release_is_fatal() {
        let (cache, _) = cache(2);
        let id = cache.getblk(DEV, 1).into_raw();
        drop(cache.from_raw(id));
        cache.brelse(id.0);
    }

    #[test]
    fn concurrent_getblk_agrees_on_one_buffer() {
        let (cache, _) = cache(4);
        let barrier = Barrier::new(8);
        let slots: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let buf = cache.getblk(DEV, 33);
                        barrier.wait();
                        buf.slot()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(slots.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.getblk(DEV, 33).count(), 1);
    }

    #[test]
    fn getblk_sleeps_until_a_buffer_is_released() {
        let (cache, _) = cache(2);
        let a = cache.getblk(DEV, 1);
        let b = cache.getblk(DEV, 2);
        let done = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| {
                let c = cache.getblk(DEV, 3);
                done.store(true, Ordering::SeqCst);
                assert_eq!(c.blockno(), 3);
            });
            thread::sleep(Duration::from_millis(50));
            assert!(!done.load(Ordering::SeqCst));
            drop(a);
        });
        assert!(done.load(Ordering::SeqCst));
        drop(b);
    }
}
