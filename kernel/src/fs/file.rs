//! Reading and writing file data through the block map.

use super::{ Fs, Inode, Stat };
use super::inode::InodeFlags;
use crate::define::fs::{ OpenFlags, BLOCK_SIZE, S_IFBLK, S_IFMT };
use crate::error::FsError;
use crate::process::Task;

pub trait File {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError>;

    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError>;

    fn readable(&self) -> bool;

    fn writeable(&self) -> bool;
}

/// A file, directory or block device opened by `Fs::open`.
#[derive(Debug)]
pub struct OpenFile<'a> {
    inode: Inode<'a>,
    pos: u32,
    flags: OpenFlags,
}

impl<'a> OpenFile<'a> {
    pub fn inode(&self) -> &Inode<'a> {
        &self.inode
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn seek(&mut self, pos: u32) {
        self.pos = pos;
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn stat(&self) -> Stat {
        self.inode.stat()
    }
}

impl File for OpenFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        if !self.readable() {
            return Err(FsError::InvalidArgument);
        }
        let fs = self.inode.fs;
        fs.file_read(&self.inode, &mut self.pos, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        if !self.writeable() {
            return Err(FsError::InvalidArgument);
        }
        let fs = self.inode.fs;
        let append = self.flags.contains(OpenFlags::APPEND);
        fs.file_write(&self.inode, &mut self.pos, buf, append)
    }

    fn readable(&self) -> bool {
        self.flags.readable()
    }

    fn writeable(&self) -> bool {
        self.flags.writeable()
    }
}

impl Fs {
    /// Open `path`, creating it if asked. Opening a block device checks
    /// it for a media change first.
    pub fn open<'a>(&'a self, task: &Task<'a>, path: &str, flags: OpenFlags, mode: u16) -> Result<OpenFile<'a>, FsError> {
        let inode = self.open_namei(task, path, flags, mode)?;
        if inode.mode() & S_IFMT == S_IFBLK {
            self.check_disk_change(inode.zone(0));
        }
        let mut flags = flags;
        if flags.contains(OpenFlags::TRUNC) && flags.access() == 0 {
            flags.insert(OpenFlags::WRONLY);
        }
        Ok(OpenFile { inode, pos: 0, flags })
    }

    /// Read from `*pos`, stopping at the end of the file. Holes read
    /// as zeros. A block device is read raw.
    pub fn file_read(&self, inode: &Inode<'_>, pos: &mut u32, buf: &mut [u8]) -> Result<usize, FsError> {
        if inode.mode() & S_IFMT == S_IFBLK {
            return self.block_read(inode.zone(0), pos, buf);
        }
        let (size, dev) = inode.with(|i| (i.size, i.dev));
        if *pos >= size || buf.is_empty() {
            return Ok(0);
        }
        let count = buf.len().min((size - *pos) as usize);
        let mut done = 0;
        while done < count {
            let offset = *pos as usize % BLOCK_SIZE;
            let chars = (BLOCK_SIZE - offset).min(count - done);
            let dst = &mut buf[done..done + chars];
            match self.bmap(inode, *pos as usize / BLOCK_SIZE) {
                Some(blockno) => match self.bcache.bread(dev, blockno) {
                    Ok(b) => dst.copy_from_slice(&b.data()[offset..offset + chars]),
                    Err(_) => break,
                },
                None => dst.fill(0),
            }
            *pos += chars as u32;
            done += chars;
        }
        let now = self.now();
        inode.update(|i| i.atime = now);
        match done {
            0 => Err(FsError::Io),
            done => Ok(done),
        }
    }

    /// Write at `*pos`, or at the end of the file when appending,
    /// allocating blocks as needed. `*pos` is left alone on append.
    /// A block device is written raw and never appended to.
    pub fn file_write(&self, inode: &Inode<'_>, pos: &mut u32, buf: &[u8], append: bool) -> Result<usize, FsError> {
        if inode.mode() & S_IFMT == S_IFBLK {
            return self.block_write(inode.zone(0), pos, buf);
        }
        let dev = inode.dev();
        let mut at = if append { inode.size() } else { *pos };
        let mut done = 0;
        while done < buf.len() {
            let blockno = match self.create_block(inode, at as usize / BLOCK_SIZE) {
                Some(blockno) => blockno,
                None => break,
            };
            let b = match self.bcache.bread(dev, blockno) {
                Ok(b) => b,
                Err(_) => break,
            };
            let offset = at as usize % BLOCK_SIZE;
            let chars = (BLOCK_SIZE - offset).min(buf.len() - done);
            b.data()[offset..offset + chars].copy_from_slice(&buf[done..done + chars]);
            b.mark_dirty();
            drop(b);
            at += chars as u32;
            done += chars;
            let now = self.now();
            inode.update(|i| {
                if at > i.size {
                    i.size = at;
                    i.touch_change(now);
                }
            });
        }
        let now = self.now();
        inode.update(|i| {
            i.mtime = now;
            i.flags.insert(InodeFlags::DIRTY);
        });
        if !append {
            *pos = at;
        }
        match done {
            0 if !buf.is_empty() => Err(FsError::NoSpace),
            done => Ok(done),
        }
    }
}
