//! Operations on the attributes of a named file, and on the task's
//! working and root directories.

use super::Fs;
use super::inode::InodeFlags;
use crate::error::FsError;
use crate::process::Task;

impl Fs {
    pub fn chdir<'a>(&'a self, task: &mut Task<'a>, path: &str) -> Result<(), FsError> {
        let inode = self.namei(task, path)?;
        if !inode.is_dir() {
            return Err(FsError::NotDirectory);
        }
        task.pwd = Some(inode);
        Ok(())
    }

    /// Make `path` the task's root. `..` no longer leads above it.
    pub fn chroot<'a>(&'a self, task: &mut Task<'a>, path: &str) -> Result<(), FsError> {
        let inode = self.namei(task, path)?;
        if !inode.is_dir() {
            return Err(FsError::NotDirectory);
        }
        task.root = Some(inode);
        Ok(())
    }

    /// Change the permission bits. The file type bits are kept.
    pub fn chmod(&self, task: &Task<'_>, path: &str, mode: u16) -> Result<(), FsError> {
        let inode = self.namei(task, path)?;
        if task.euid != inode.uid() && !task.suser() {
            return Err(FsError::PermissionDenied);
        }
        let now = self.now();
        inode.update(|i| {
            i.mode = (mode & 0o7777) | (i.mode & !0o7777);
            i.touch_change(now);
        });
        Ok(())
    }

    /// Change the owner. Only the super-user may.
    pub fn chown(&self, task: &Task<'_>, path: &str, uid: u16, gid: u8) -> Result<(), FsError> {
        let inode = self.namei(task, path)?;
        if !task.suser() {
            return Err(FsError::PermissionDenied);
        }
        let now = self.now();
        inode.update(|i| {
            i.uid = uid;
            i.gid = gid;
            i.touch_change(now);
        });
        Ok(())
    }

    /// Set access and modification times, or stamp both with the
    /// current time.
    pub fn utime(&self, task: &Task<'_>, path: &str, times: Option<(u32, u32)>) -> Result<(), FsError> {
        let inode = self.resolve(task, path)?;
        let (atime, mtime) = times.unwrap_or_else(|| {
            let now = self.now();
            (now, now)
        });
        inode.update(|i| {
            i.atime = atime;
            i.mtime = mtime;
            i.flags.insert(InodeFlags::DIRTY);
        });
        Ok(())
    }

    /// Check `mode` (a `MAY_*` mask) against the real ids of the task.
    /// The super-user passes, except for execute on a file nobody may
    /// execute.
    pub fn access(&self, task: &Task<'_>, path: &str, mode: u16) -> Result<(), FsError> {
        let inode = self.namei(task, path).map_err(|_| FsError::PermissionDenied)?;
        let i_mode = inode.mode() & 0o777;
        let mode = mode & 0o7;
        let res = if task.uid == inode.uid() {
            i_mode >> 6
        } else if task.gid == inode.gid() {
            i_mode >> 3
        } else {
            i_mode
        };
        if res & 0o7 & mode == mode {
            return Ok(());
        }
        if task.uid == 0 && (mode & 1 == 0 || i_mode & 0o111 != 0) {
            return Ok(());
        }
        Err(FsError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::define::fs::{ FsConfig, OpenFlags, MAY_EXEC, MAY_READ, MAY_WRITE, S_IFREG };
    use crate::driver::RamDisk;
    use crate::time::FixedClock;

    fn setup() -> Fs {
        let fs = Fs::with_clock(FsConfig::default(), FixedClock::new(500)).unwrap();
        fs.register_device(0x301, Arc::new(RamDisk::formatted(128, None).unwrap()));
        fs
    }

    #[test]
    fn chdir_changes_relative_lookups() {
        let fs = setup();
        let mut task = Task::superuser();
        fs.mount_root(&mut task).unwrap();
        fs.mkdir(&task, "/home", 0o755).unwrap();
        fs.chdir(&mut task, "home").unwrap();
        drop(fs.open_namei(&task, "notes", OpenFlags::CREAT | OpenFlags::WRONLY, 0o644).unwrap());
        assert!(fs.namei(&task, "/home/notes").is_ok());
        assert_eq!(fs.chdir(&mut task, "notes").unwrap_err(), FsError::NotDirectory);
        task.release();
    }

    #[test]
    fn chmod_keeps_file_type() {
        let fs = setup();
        let mut task = Task::superuser();
        fs.mount_root(&mut task).unwrap();
        drop(fs.open_namei(&task, "/f", OpenFlags::CREAT | OpenFlags::WRONLY, 0o644).unwrap());
        fs.chmod(&task, "/f", 0o4711).unwrap();
        assert_eq!(fs.namei(&task, "/f").unwrap().mode(), S_IFREG | 0o4711);
        let stranger = task.with_ids(9, 9);
        assert_eq!(fs.chmod(&stranger, "/f", 0o777).unwrap_err(), FsError::PermissionDenied);
        assert_eq!(fs.chown(&stranger, "/f", 9, 9).unwrap_err(), FsError::PermissionDenied);
        drop(stranger);
        task.release();
    }

    #[test]
    fn utime_sets_both_stamps() {
        let fs = setup();
        let mut task = Task::superuser();
        fs.mount_root(&mut task).unwrap();
        drop(fs.open_namei(&task, "/f", OpenFlags::CREAT | OpenFlags::WRONLY, 0o644).unwrap());
        fs.utime(&task, "/f", Some((10, 20))).unwrap();
        let stat = fs.stat(&task, "/f").unwrap();
        assert_eq!((stat.mtime, stat.atime), (20, 10));
        task.release();
    }

    #[test]
    fn access_uses_real_ids() {
        let fs = setup();
        let mut task = Task::superuser();
        fs.mount_root(&mut task).unwrap();
        drop(fs.open_namei(&task, "/f", OpenFlags::CREAT | OpenFlags::WRONLY, 0o640).unwrap());
        fs.chown(&task, "/f", 3, 4).unwrap();
        assert!(fs.access(&task, "/f", MAY_READ | MAY_WRITE).is_ok());
        assert!(fs.access(&task, "/f", MAY_EXEC).is_err());
        let mut group = task.with_ids(5, 4);
        group.euid = 0;
        assert!(fs.access(&group, "/f", MAY_READ).is_ok());
        assert!(fs.access(&group, "/f", MAY_WRITE).is_err());
        assert!(fs.access(&group, "/missing", MAY_READ).is_err());
        drop(group);
        task.release();
    }
}
