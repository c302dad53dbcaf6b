//! Directory entries.
//!
//! A directory is a file of 16-byte entries. Entries with inode 0 are
//! free and may sit anywhere below the directory's size.

use fs_lib::{ as_dir_entries, as_dir_entries_mut, DirEntry };

use super::{ Buf, Fs, Inode };
use super::inode::InodeFlags;
use crate::define::fs::{ BlockNo, DIR_ENTRIES_PER_BLOCK, DIR_ENTRY_SIZE, MAX_DIR_ENTRIES, NAME_LEN, ROOT_INO };
use crate::error::FsError;
use crate::process::Task;

/// A directory entry, pinned in the buffer cache.
pub struct DirEntryRef<'a> {
    buf: Buf<'a>,
    slot: usize,
}

impl<'a> DirEntryRef<'a> {
    pub fn inode(&self) -> u16 {
        as_dir_entries(&self.buf.data())[self.slot].inode.get()
    }

    pub fn name(&self) -> Vec<u8> {
        as_dir_entries(&self.buf.data())[self.slot].name().to_vec()
    }

    /// Block holding the entry.
    pub fn blockno(&self) -> BlockNo {
        self.buf.blockno()
    }

    /// Free the entry.
    pub(crate) fn clear(&self) {
        as_dir_entries_mut(&mut self.buf.data())[self.slot].inode.set(0);
        self.buf.mark_dirty();
    }
}

/// A live entry, as listed by `Fs::read_dir`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub inode: u16,
    pub name: String,
}

fn clip(name: &[u8]) -> &[u8] {
    &name[..name.len().min(NAME_LEN)]
}

impl Fs {
    /// Look `name` up in `dir`. Names longer than `NAME_LEN` are
    /// truncated.
    ///
    /// `..` is special: in the task's root directory it means `.`, and
    /// in the root of a mounted volume it is looked up in the directory
    /// the volume is mounted on, which then replaces `dir`.
    pub fn find_entry<'a>(&'a self, task: &Task<'a>, dir: &mut Inode<'a>, name: &[u8]) -> Option<DirEntryRef<'a>> {
        let mut name = clip(name);
        if name.is_empty() {
            return None;
        }
        if name == b".." {
            if dir.same(task.root()) {
                name = &b"."[..];
            } else if dir.num() == ROOT_INO {
                if let Some(imount) = self.get_super(dir.dev()).and_then(|sb| sb.imount) {
                    *dir = self.inode_dup_raw(imount);
                }
            }
        }
        let (size, dev, zone0) = dir.with(|i| (i.size, i.dev, i.zone[0]));
        if zone0 == 0 {
            return None;
        }
        let entries = size as usize / DIR_ENTRY_SIZE;
        for block in 0..(entries + DIR_ENTRIES_PER_BLOCK - 1) / DIR_ENTRIES_PER_BLOCK {
            let blockno = match self.bmap(dir, block) {
                Some(blockno) => blockno,
                None => continue,
            };
            let buf = match self.bcache.bread(dev, blockno) {
                Ok(buf) => buf,
                Err(_) => continue,
            };
            let live = (entries - block * DIR_ENTRIES_PER_BLOCK).min(DIR_ENTRIES_PER_BLOCK);
            let found = as_dir_entries(&buf.data())[..live].iter().position(|de| de.matches(name));
            if let Some(slot) = found {
                return Some(DirEntryRef { buf, slot });
            }
        }
        None
    }

    /// Store `(inr, name)` in the first free entry of `dir`, growing the
    /// directory when it has none. The inode number and the name are
    /// written together, so a lookup never sees half an entry.
    pub fn add_entry<'a>(&'a self, dir: &Inode<'a>, name: &[u8], inr: u16) -> Result<DirEntryRef<'a>, FsError> {
        let name = clip(name);
        if name.is_empty() {
            return Err(FsError::NotFound);
        }
        if dir.zone(0) == 0 {
            return Err(FsError::NoSpace);
        }
        let dev = dir.dev();
        let mut i = 0;
        while i < MAX_DIR_ENTRIES {
            let blockno = self.create_block(dir, i / DIR_ENTRIES_PER_BLOCK).ok_or(FsError::NoSpace)?;
            let buf = match self.bcache.bread(dev, blockno) {
                Ok(buf) => buf,
                Err(_) => {
                    i += DIR_ENTRIES_PER_BLOCK;
                    continue;
                }
            };
            let _lock = dir.lock();
            for slot in 0..DIR_ENTRIES_PER_BLOCK {
                let now = self.now();
                let mut data = buf.data();
                let de = &mut as_dir_entries_mut(&mut data)[slot];
                let past_end = dir.update(|inode| {
                    let past_end = i * DIR_ENTRY_SIZE >= inode.size as usize;
                    if past_end {
                        inode.size = ((i + 1) * DIR_ENTRY_SIZE) as u32;
                        inode.touch_change(now);
                    }
                    past_end
                });
                if past_end {
                    de.inode.set(0);
                }
                if de.inode.get() == 0 {
                    *de = DirEntry::new(inr, name);
                    drop(data);
                    dir.update(|inode| {
                        inode.mtime = now;
                        inode.flags.insert(InodeFlags::DIRTY);
                    });
                    buf.mark_dirty();
                    return Ok(DirEntryRef { buf, slot });
                }
                i += 1;
            }
        }
        Err(FsError::NoSpace)
    }

    /// Whether a directory holds nothing but `.` and `..`. A directory
    /// without those two is reported as not empty.
    pub fn is_empty_dir(&self, inode: &Inode<'_>) -> bool {
        let (size, dev, num, zone0) = inode.with(|i| (i.size, i.dev, i.num, i.zone[0]));
        let entries = size as usize / DIR_ENTRY_SIZE;
        let first = match (entries >= 2 && zone0 != 0).then(|| self.bcache.bread(dev, zone0 as BlockNo)) {
            Some(Ok(buf)) => buf,
            _ => {
                log::warn!("warning - bad directory on dev {:#06x}", dev);
                return false;
            }
        };
        {
            let data = first.data();
            let de = as_dir_entries(&data);
            if de[0].inode.get() != num || de[1].inode.get() == 0 || !de[0].matches(b".") || !de[1].matches(b"..") {
                log::warn!("warning - bad directory on dev {:#06x}", dev);
                return false;
            }
        }
        drop(first);
        for block in 0..(entries + DIR_ENTRIES_PER_BLOCK - 1) / DIR_ENTRIES_PER_BLOCK {
            let buf = match self.bmap(inode, block).map(|b| self.bcache.bread(dev, b)) {
                Some(Ok(buf)) => buf,
                _ => continue,
            };
            let start = if block == 0 { 2 } else { 0 };
            let live = (entries - block * DIR_ENTRIES_PER_BLOCK).min(DIR_ENTRIES_PER_BLOCK);
            let data = buf.data();
            if as_dir_entries(&data)[start.min(live)..live].iter().any(|de| de.inode.get() != 0) {
                return false;
            }
        }
        true
    }

    /// Every live entry of a directory, in on-disk order.
    pub fn read_dir(&self, dir: &Inode<'_>) -> Result<Vec<DirEntryInfo>, FsError> {
        if !dir.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let (size, dev) = dir.with(|i| (i.size, i.dev));
        let entries = size as usize / DIR_ENTRY_SIZE;
        let mut list = Vec::new();
        for block in 0..(entries + DIR_ENTRIES_PER_BLOCK - 1) / DIR_ENTRIES_PER_BLOCK {
            let blockno = match self.bmap(dir, block) {
                Some(blockno) => blockno,
                None => continue,
            };
            let buf = self.bcache.bread(dev, blockno)?;
            let live = (entries - block * DIR_ENTRIES_PER_BLOCK).min(DIR_ENTRIES_PER_BLOCK);
            let data = buf.data();
            list.extend(as_dir_entries(&data)[..live].iter().filter(|de| de.inode.get() != 0).map(|de| DirEntryInfo {
                inode: de.inode.get(),
                name: String::from_utf8_lossy(de.name()).into_owned(),
            }));
        }
        Ok(list)
    }
}
