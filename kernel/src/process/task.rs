//! The per-process state the file system looks at.

use crate::fs::Inode;

/// Credentials, file creation mask and directory references of the
/// calling process.
#[derive(Clone, Debug)]
pub struct Task<'a> {
    pub uid: u16,
    pub euid: u16,
    pub gid: u8,
    pub egid: u8,
    pub umask: u16,
    pub(crate) pwd: Option<Inode<'a>>,
    pub(crate) root: Option<Inode<'a>>,
}

impl<'a> Task<'a> {
    pub fn new(uid: u16, gid: u8) -> Self {
        Self {
            uid,
            euid: uid,
            gid,
            egid: gid,
            umask: 0o022,
            pwd: None,
            root: None,
        }
    }

    /// The super-user, as the first process runs.
    pub fn superuser() -> Self {
        Self::new(0, 0)
    }

    pub fn suser(&self) -> bool {
        self.euid == 0
    }

    pub fn pwd(&self) -> &Inode<'a> {
        match &self.pwd {
            Some(pwd) => pwd,
            None => panic!("No cwd inode"),
        }
    }

    pub fn root(&self) -> &Inode<'a> {
        match &self.root {
            Some(root) => root,
            None => panic!("No root inode"),
        }
    }

    /// Same credentials and directories, under another identity.
    pub fn with_ids(&self, uid: u16, gid: u8) -> Self {
        Self {
            uid,
            euid: uid,
            gid,
            egid: gid,
            ..self.clone()
        }
    }

    /// Give up the directory references, e.g. before the file system
    /// is torn down.
    pub fn release(&mut self) {
        self.pwd = None;
        self.root = None;
    }
}
