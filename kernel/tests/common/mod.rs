#![allow(dead_code)]

use std::sync::Arc;

use minixfs::{ Dev, FixedClock, Fs, FsConfig, RamDisk };

pub const ROOT: Dev = 0x301;
pub const SECOND: Dev = 0x302;
pub const START: u32 = 1_000;

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn disk(blocks: usize, ninodes: u16) -> Arc<RamDisk> {
    Arc::new(RamDisk::formatted(blocks, Some(ninodes)).unwrap())
}

/// A file system whose root device is `root`. The caller mounts it.
pub fn boot(root: Arc<RamDisk>) -> Fs {
    boot_with(FsConfig::default(), root)
}

pub fn boot_with(config: FsConfig, root: Arc<RamDisk>) -> Fs {
    init_log();
    let fs = Fs::with_clock(config, FixedClock::new(START)).unwrap();
    fs.register_device(ROOT, root);
    fs
}
