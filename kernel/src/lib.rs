//! A Minix v1 file system core: block buffer cache, bitmap allocator,
//! inode cache, super blocks and mounting, and pathname resolution.
//!
//! Everything hangs off an [`Fs`]. Block devices are registered with
//! it under their device numbers; the calling process is described by
//! a [`Task`].

#[macro_use]
extern crate bitflags;

pub mod define;
pub mod driver;
pub mod error;
pub mod fs;
pub mod lock;
pub mod process;
pub mod time;

pub use define::fs::{ Dev, BlockNo, FsConfig, OpenFlags };
pub use driver::{ BlockDevice, RamDisk };
pub use error::FsError;
pub use fs::{ Fs, File, Inode, OpenFile, Stat };
pub use process::Task;
pub use time::{ Clock, FixedClock, SystemClock };
