//! Pathname resolution and the operations that change the namespace.
//!
//! Paths are walked one component at a time from the task's root or
//! working directory. Every directory passed through needs execute
//! permission. Components longer than `NAME_LEN` are truncated and an
//! empty component (as in `a//b`) stands for the directory itself.

use super::{ Fs, Inode };
use super::inode::InodeFlags;
use crate::define::fs::{ Dev, OpenFlags, LINK_MAX, MAY_EXEC, MAY_WRITE, S_IFBLK, S_IFCHR, S_IFDIR, S_IFMT, S_IFREG, S_ISVTX };
use crate::error::FsError;
use crate::process::Task;

impl Fs {
    /// Whether the task may access `inode` as `mask` asks. Not even the
    /// super-user can touch a file whose last link is gone.
    pub fn permission(&self, task: &Task<'_>, inode: &Inode<'_>, mask: u16) -> bool {
        let (mode, uid, gid, dev, nlinks) = inode.with(|i| (i.mode, i.uid, i.gid, i.dev, i.nlinks));
        if dev != 0 && nlinks == 0 {
            return false;
        }
        let mode = if task.euid == uid {
            mode >> 6
        } else if task.egid == gid {
            mode >> 3
        } else {
            mode
        };
        (mode & mask & 0o7) == mask || task.suser()
    }

    /// Walk every component but the last and return the directory it
    /// would be looked up in.
    pub fn get_dir_i<'a>(&'a self, task: &Task<'a>, path: &[u8]) -> Result<Inode<'a>, FsError> {
        let (mut inode, mut path) = match path.first() {
            Some(b'/') => (task.root().clone(), &path[1..]),
            Some(_) => (task.pwd().clone(), path),
            None => return Err(FsError::NotFound),
        };
        loop {
            if !inode.is_dir() {
                return Err(FsError::NotDirectory);
            }
            if !self.permission(task, &inode, MAY_EXEC) {
                return Err(FsError::PermissionDenied);
            }
            let len = match path.iter().position(|&c| c == b'/') {
                Some(len) => len,
                None => return Ok(inode),
            };
            let name = &path[..len];
            path = &path[len + 1..];
            if name.is_empty() {
                continue;
            }
            let de = self.find_entry(task, &mut inode, name).ok_or(FsError::NotFound)?;
            let (dev, inr) = (inode.dev(), de.inode());
            drop(de);
            drop(inode);
            inode = self.iget(dev, inr)?;
        }
    }

    /// The directory holding the last component of `path`, and that
    /// component. A path ending in `/` yields an empty name.
    pub fn dir_namei<'a, 'p>(&'a self, task: &Task<'a>, path: &'p [u8]) -> Result<(Inode<'a>, &'p [u8]), FsError> {
        let dir = self.get_dir_i(task, path)?;
        let base = match path.iter().rposition(|&c| c == b'/') {
            Some(slash) => &path[slash + 1..],
            None => path,
        };
        Ok((dir, base))
    }

    /// Look a name up in `dir` and get its inode. Consumes `dir`, since
    /// `..` may have swapped it for a directory on another volume.
    fn lookup<'a>(&'a self, task: &Task<'a>, mut dir: Inode<'a>, name: &[u8]) -> Result<Inode<'a>, FsError> {
        let de = self.find_entry(task, &mut dir, name).ok_or(FsError::NotFound)?;
        let (dev, inr) = (dir.dev(), de.inode());
        drop(de);
        drop(dir);
        self.iget(dev, inr)
    }

    /// Resolve `path` to its inode and stamp the access time.
    pub fn namei<'a>(&'a self, task: &Task<'a>, path: &str) -> Result<Inode<'a>, FsError> {
        let (dir, name) = self.dir_namei(task, path.as_bytes())?;
        if name.is_empty() {
            return Ok(dir);
        }
        let inode = self.lookup(task, dir, name)?;
        let now = self.now();
        inode.update(|i| {
            i.atime = now;
            i.flags.insert(InodeFlags::DIRTY);
        });
        Ok(inode)
    }

    /// Resolve `path` for opening, creating a regular file when asked.
    /// `mode` is masked with the task's umask. Directories can only be
    /// opened read-only.
    pub fn open_namei<'a>(&'a self, task: &Task<'a>, path: &str, flags: OpenFlags, mode: u16) -> Result<Inode<'a>, FsError> {
        let mut flags = flags;
        if flags.contains(OpenFlags::TRUNC) && flags.access() == 0 {
            flags.insert(OpenFlags::WRONLY);
        }
        let mode = (mode & 0o777 & !task.umask) | S_IFREG;
        let (mut dir, name) = self.dir_namei(task, path.as_bytes())?;
        if name.is_empty() {
            if flags.intersects(OpenFlags::ACCMODE | OpenFlags::CREAT | OpenFlags::TRUNC) {
                return Err(FsError::IsDirectory);
            }
            return Ok(dir);
        }

        let de = match self.find_entry(task, &mut dir, name) {
            Some(de) => de,
            None => {
                if !flags.contains(OpenFlags::CREAT) {
                    return Err(FsError::NotFound);
                }
                if !self.permission(task, &dir, MAY_WRITE) {
                    return Err(FsError::PermissionDenied);
                }
                let inode = self.new_inode(dir.dev(), task)?;
                inode.update(|i| {
                    i.mode = mode;
                    i.flags.insert(InodeFlags::DIRTY);
                });
                if let Err(err) = self.add_entry(&dir, name, inode.num()) {
                    inode.update(|i| i.nlinks = 0);
                    return Err(err);
                }
                return Ok(inode);
            }
        };
        let (dev, inr) = (dir.dev(), de.inode());
        drop(de);
        drop(dir);
        if flags.contains(OpenFlags::EXCL) {
            return Err(FsError::Exists);
        }
        let inode = self.iget(dev, inr)?;
        if inode.is_dir() && flags.access() != 0 {
            return Err(FsError::IsDirectory);
        }
        if !self.permission(task, &inode, flags.permission_mask()) {
            return Err(FsError::PermissionDenied);
        }
        let now = self.now();
        inode.update(|i| i.atime = now);
        if flags.contains(OpenFlags::TRUNC) {
            self.truncate(&inode);
        }
        Ok(inode)
    }

    /// Directory and name of a new entry, checked for write permission
    /// and for an existing entry of the same name.
    fn dir_for_create<'a, 'p>(&'a self, task: &Task<'a>, path: &'p str) -> Result<(Inode<'a>, &'p [u8]), FsError> {
        let (mut dir, name) = self.dir_namei(task, path.as_bytes())?;
        if name.is_empty() {
            return Err(FsError::NotFound);
        }
        if !self.permission(task, &dir, MAY_WRITE) {
            return Err(FsError::PermissionDenied);
        }
        if self.find_entry(task, &mut dir, name).is_some() {
            return Err(FsError::Exists);
        }
        Ok((dir, name))
    }

    /// Make a special file or a regular file. Only the super-user may.
    pub fn mknod(&self, task: &Task<'_>, path: &str, mode: u16, dev: Dev) -> Result<(), FsError> {
        if !task.suser() {
            return Err(FsError::NotPermitted);
        }
        let (dir, name) = self.dir_for_create(task, path)?;
        let inode = self.new_inode(dir.dev(), task)?;
        let now = self.now();
        inode.update(|i| {
            i.mode = mode;
            if matches!(mode & S_IFMT, S_IFBLK | S_IFCHR) {
                i.zone[0] = dev;
            }
            i.mtime = now;
            i.ctime = now;
            i.atime = now;
            i.flags.insert(InodeFlags::DIRTY);
        });
        if let Err(err) = self.add_entry(&dir, name, inode.num()) {
            inode.update(|i| i.nlinks = 0);
            return Err(err);
        }
        Ok(())
    }

    /// Make a directory holding `.` and `..`. Only the super-user may.
    pub fn mkdir(&self, task: &Task<'_>, path: &str, mode: u16) -> Result<(), FsError> {
        if !task.suser() {
            return Err(FsError::NotPermitted);
        }
        let (dir, name) = self.dir_for_create(task, path)?;
        if dir.nlinks() >= LINK_MAX {
            return Err(FsError::TooManyLinks);
        }
        let inode = self.new_inode(dir.dev(), task)?;
        let dev = inode.dev();
        let block = match self.new_block(dev) {
            Ok(block) => block,
            Err(err) => {
                inode.update(|i| i.nlinks = 0);
                return Err(err);
            }
        };
        inode.update(|i| i.zone[0] = block as u16);
        let buf = match self.bcache.bread(dev, block) {
            Ok(buf) => buf,
            Err(err) => {
                // the mode is still unset, so dropping the inode won't free the block
                self.free_block(dev, block);
                inode.update(|i| {
                    i.zone[0] = 0;
                    i.nlinks = 0;
                });
                return Err(err);
            }
        };
        {
            let mut data = buf.data();
            let de = fs_lib::as_dir_entries_mut(&mut data);
            de[0] = fs_lib::DirEntry::new(inode.num(), b".");
            de[1] = fs_lib::DirEntry::new(dir.num(), b"..");
        }
        buf.mark_dirty();
        drop(buf);

        let now = self.now();
        inode.update(|i| {
            i.size = 32;
            i.nlinks = 2;
            i.mode = S_IFDIR | (mode & 0o777 & !task.umask);
            i.mtime = now;
            i.ctime = now;
            i.atime = now;
            i.flags.insert(InodeFlags::DIRTY);
        });
        if let Err(err) = self.add_entry(&dir, name, inode.num()) {
            // truncate gives the block back once the last reference goes
            inode.update(|i| i.nlinks = 0);
            return Err(err);
        }
        dir.update(|i| {
            i.nlinks += 1;
            i.touch_change(now);
        });
        Ok(())
    }

    /// Remove an empty directory. Only the super-user may.
    pub fn rmdir(&self, task: &Task<'_>, path: &str) -> Result<(), FsError> {
        if !task.suser() {
            return Err(FsError::NotPermitted);
        }
        let (mut dir, name) = self.dir_namei(task, path.as_bytes())?;
        if name.is_empty() {
            return Err(FsError::NotFound);
        }
        if !self.permission(task, &dir, MAY_WRITE) {
            return Err(FsError::PermissionDenied);
        }
        let de = self.find_entry(task, &mut dir, name).ok_or(FsError::NotFound)?;
        let inode = self.iget(dir.dev(), de.inode())?;
        if dir.mode() & S_ISVTX != 0 && !task.suser() && inode.uid() != task.euid {
            return Err(FsError::NotPermitted);
        }
        if inode.dev() != dir.dev() || inode.count() > 1 {
            return Err(FsError::Busy);
        }
        if inode.same(&dir) {
            // "." can't go, though "../dir" can
            return Err(FsError::NotPermitted);
        }
        if !inode.is_dir() {
            return Err(FsError::NotDirectory);
        }
        if !self.is_empty_dir(&inode) {
            return Err(FsError::NotEmpty);
        }
        if inode.nlinks() != 2 {
            log::warn!("empty directory has nlink!=2 ({})", inode.nlinks());
        }
        de.clear();
        drop(de);
        inode.update(|i| {
            i.nlinks = 0;
            i.flags.insert(InodeFlags::DIRTY);
        });
        drop(inode);
        let now = self.now();
        dir.update(|i| {
            i.nlinks = i.nlinks.saturating_sub(1);
            i.mtime = now;
            i.touch_change(now);
        });
        Ok(())
    }

    /// Remove a name. The file itself goes when its last link and last
    /// reference are gone.
    pub fn unlink(&self, task: &Task<'_>, path: &str) -> Result<(), FsError> {
        let (mut dir, name) = self.dir_namei(task, path.as_bytes())?;
        if name.is_empty() {
            return Err(FsError::NotFound);
        }
        if !self.permission(task, &dir, MAY_WRITE) {
            return Err(FsError::PermissionDenied);
        }
        let de = self.find_entry(task, &mut dir, name).ok_or(FsError::NotFound)?;
        let inode = self.iget(dir.dev(), de.inode())?;
        if dir.mode() & S_ISVTX != 0 && !task.suser() && task.euid != inode.uid() && task.euid != dir.uid() {
            return Err(FsError::NotPermitted);
        }
        if inode.is_dir() {
            return Err(FsError::NotPermitted);
        }
        if inode.nlinks() == 0 {
            log::warn!("Deleting nonexistent file ({:#06x}:{}), 0", inode.dev(), inode.num());
            inode.update(|i| i.nlinks = 1);
        }
        de.clear();
        drop(de);
        let now = self.now();
        inode.update(|i| {
            i.nlinks -= 1;
            i.touch_change(now);
        });
        Ok(())
    }

    /// Give the file at `old` a second name. Directories can't be
    /// linked and both names must be on one volume.
    pub fn link(&self, task: &Task<'_>, old: &str, new: &str) -> Result<(), FsError> {
        let inode = self.namei(task, old)?;
        if inode.is_dir() {
            return Err(FsError::NotPermitted);
        }
        let (mut dir, name) = self.dir_namei(task, new.as_bytes())?;
        if name.is_empty() {
            return Err(FsError::NotPermitted);
        }
        if dir.dev() != inode.dev() {
            return Err(FsError::CrossDevice);
        }
        if !self.permission(task, &dir, MAY_WRITE) {
            return Err(FsError::PermissionDenied);
        }
        if self.find_entry(task, &mut dir, name).is_some() {
            return Err(FsError::Exists);
        }
        if inode.nlinks() >= LINK_MAX {
            return Err(FsError::TooManyLinks);
        }
        self.add_entry(&dir, name, inode.num())?;
        drop(dir);
        let now = self.now();
        inode.update(|i| {
            i.nlinks += 1;
            i.touch_change(now);
        });
        Ok(())
    }

    /// Like `namei`, but without touching the access time.
    pub(crate) fn resolve<'a>(&'a self, task: &Task<'a>, path: &str) -> Result<Inode<'a>, FsError> {
        let (dir, name) = self.dir_namei(task, path.as_bytes())?;
        if name.is_empty() {
            return Ok(dir);
        }
        self.lookup(task, dir, name)
    }
}
