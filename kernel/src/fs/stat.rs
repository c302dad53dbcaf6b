use super::{ Fs, Inode };
use crate::define::fs::Dev;
use crate::error::FsError;
use crate::process::Task;

/// Attributes of an inode, as `stat` reports them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stat {
    pub dev: Dev,
    pub ino: u16,
    pub mode: u16,
    pub nlink: u8,
    pub uid: u16,
    pub gid: u8,
    /// device number of a special file
    pub rdev: Dev,
    pub size: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

impl Inode<'_> {
    pub fn stat(&self) -> Stat {
        self.with(|i| Stat {
            dev: i.dev,
            ino: i.num,
            mode: i.mode,
            nlink: i.nlinks,
            uid: i.uid,
            gid: i.gid,
            rdev: i.zone[0],
            size: i.size,
            atime: i.atime,
            mtime: i.mtime,
            ctime: i.ctime,
        })
    }
}

impl Fs {
    pub fn stat(&self, task: &Task<'_>, path: &str) -> Result<Stat, FsError> {
        Ok(self.resolve(task, path)?.stat())
    }
}
