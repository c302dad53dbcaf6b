//! Pipes.
//!
//! A pipe is an inode without a device whose data lives in one page.
//! The inode is referenced once by the read end and once by the write
//! end, so a count below two means the other end is gone. Both ends
//! sleep on the inode's wait queue.

use super::{ File, Fs, Inode };
use crate::define::fs::PAGE_SIZE;
use crate::error::FsError;

pub(crate) struct PipeState {
    page: Box<[u8; PAGE_SIZE]>,
    /// next byte written
    head: usize,
    /// next byte read
    tail: usize,
}

impl PipeState {
    fn new() -> Self {
        Self {
            page: Box::new([0; PAGE_SIZE]),
            head: 0,
            tail: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.head.wrapping_sub(self.tail) & (PAGE_SIZE - 1)
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len() == PAGE_SIZE - 1
    }
}

impl Fs {
    /// A fresh pipe inode with a count of two, one per end.
    pub fn get_pipe_inode(&self) -> Inode<'_> {
        let inode = self.get_empty_inode();
        inode.update(|i| {
            i.count = 2;
            i.pipe = Some(PipeState::new());
        });
        inode
    }

    pub fn pipe(&self) -> (PipeReader<'_>, PipeWriter<'_>) {
        let reader = self.get_pipe_inode();
        // the second reference was taken by get_pipe_inode
        let writer = self.inode_from_raw(reader.id());
        (PipeReader { inode: reader }, PipeWriter { inode: writer })
    }

    /// Fill `buf`, sleeping while the pipe is empty. Returns early once
    /// the write end is gone.
    pub fn read_pipe(&self, inode: &Inode<'_>, buf: &mut [u8]) -> usize {
        let index = inode.index;
        let wait = &self.inodes.waits[index];
        let mut read = 0;
        while read < buf.len() {
            let mut slots = self.inodes.slots.acquire();
            loop {
                let inode = &slots.inodes[index];
                if inode.pipe.as_ref().map_or(0, |p| p.len()) != 0 {
                    break;
                }
                wait.wake_up();
                if inode.count != 2 || inode.pipe.is_none() {
                    return read;
                }
                wait.sleep_on(slots);
                slots = self.inodes.slots.acquire();
            }
            let pipe = match slots.inodes[index].pipe.as_mut() {
                Some(pipe) => pipe,
                None => return read,
            };
            let chars = (PAGE_SIZE - pipe.tail).min(buf.len() - read).min(pipe.len());
            buf[read..read + chars].copy_from_slice(&pipe.page[pipe.tail..pipe.tail + chars]);
            pipe.tail = (pipe.tail + chars) & (PAGE_SIZE - 1);
            read += chars;
        }
        wait.wake_up();
        read
    }

    /// Write all of `buf`, sleeping while the pipe is full. Fails with
    /// `BrokenPipe` if the read end is gone before anything was written.
    pub fn write_pipe(&self, inode: &Inode<'_>, buf: &[u8]) -> Result<usize, FsError> {
        let index = inode.index;
        let wait = &self.inodes.waits[index];
        let broken = |written: usize| match written {
            0 => Err(FsError::BrokenPipe),
            written => Ok(written),
        };
        let mut written = 0;
        while written < buf.len() {
            let mut slots = self.inodes.slots.acquire();
            loop {
                let inode = &slots.inodes[index];
                if inode.count != 2 || inode.pipe.is_none() {
                    wait.wake_up();
                    return broken(written);
                }
                if !inode.pipe.as_ref().map_or(true, |p| p.is_full()) {
                    break;
                }
                wait.wake_up();
                wait.sleep_on(slots);
                slots = self.inodes.slots.acquire();
            }
            let pipe = match slots.inodes[index].pipe.as_mut() {
                Some(pipe) => pipe,
                None => return broken(written),
            };
            let room = PAGE_SIZE - 1 - pipe.len();
            let chars = (PAGE_SIZE - pipe.head).min(buf.len() - written).min(room);
            pipe.page[pipe.head..pipe.head + chars].copy_from_slice(&buf[written..written + chars]);
            pipe.head = (pipe.head + chars) & (PAGE_SIZE - 1);
            written += chars;
        }
        wait.wake_up();
        Ok(written)
    }
}

/// Read end of a pipe.
pub struct PipeReader<'a> {
    inode: Inode<'a>,
}

/// Write end of a pipe.
pub struct PipeWriter<'a> {
    inode: Inode<'a>,
}

impl PipeReader<'_> {
    pub fn inode(&self) -> &Inode<'_> {
        &self.inode
    }
}

impl PipeWriter<'_> {
    pub fn inode(&self) -> &Inode<'_> {
        &self.inode
    }
}

impl File for PipeReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        Ok(self.inode.fs.read_pipe(&self.inode, buf))
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, FsError> {
        Err(FsError::InvalidArgument)
    }

    fn readable(&self) -> bool {
        true
    }

    fn writeable(&self) -> bool {
        false
    }
}

impl File for PipeWriter<'_> {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, FsError> {
        Err(FsError::InvalidArgument)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        self.inode.fs.write_pipe(&self.inode, buf)
    }

    fn readable(&self) -> bool {
        false
    }

    fn writeable(&self) -> bool {
        true
    }
}
