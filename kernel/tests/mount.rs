mod common;

use std::sync::Arc;

use common::*;
use minixfs::define::fs::{ BLOCK_SIZE, ROOT_INO, S_IFBLK };
use minixfs::{ File, Fs, FsConfig, FsError, OpenFlags, RamDisk, Task };

/// Root volume with `/dev/hd2` naming the second disk and an empty `/mnt`.
fn setup<'a>(fs: &'a Fs, task: &mut Task<'a>) -> Arc<RamDisk> {
    fs.mount_root(task).unwrap();
    fs.mkdir(task, "/dev", 0o755).unwrap();
    fs.mkdir(task, "/mnt", 0o755).unwrap();
    fs.mknod(task, "/dev/hd2", S_IFBLK | 0o600, SECOND).unwrap();
    let second = disk(64, 32);
    fs.register_device(SECOND, second.clone());
    second
}

#[test]
fn files_land_on_the_mounted_volume() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    setup(&fs, &mut task);
    let root_free = fs.statfs(ROOT).unwrap();

    fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap();
    assert!(fs.namei(&task, "/mnt").unwrap().is_dir());
    assert_eq!(fs.namei(&task, "/mnt").unwrap().dev(), SECOND);

    let mut file = fs.open(&task, "/mnt/x", OpenFlags::CREAT | OpenFlags::WRONLY, 0o644).unwrap();
    file.write(b"on the second disk").unwrap();
    assert_eq!(file.inode().dev(), SECOND);
    drop(file);
    assert_eq!(fs.statfs(ROOT).unwrap(), root_free);
    assert_eq!(fs.statfs(SECOND).unwrap().free_zones, 57);

    let up = fs.namei(&task, "/mnt/..").unwrap();
    assert_eq!((up.dev(), up.num()), (ROOT, ROOT_INO));
    drop(up);
    task.release();
}

#[test]
fn umount_waits_for_open_files_and_data_persists() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    setup(&fs, &mut task);
    fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap();

    let mut file = fs.open(&task, "/mnt/x", OpenFlags::CREAT | OpenFlags::RDWR, 0o644).unwrap();
    file.write(b"kept").unwrap();
    assert_eq!(fs.umount(&task, "/dev/hd2").unwrap_err(), FsError::Busy);
    drop(file);

    fs.umount(&task, "/dev/hd2").unwrap();
    assert!(fs.get_super(SECOND).is_none());
    assert_eq!(fs.namei(&task, "/mnt/x").unwrap_err(), FsError::NotFound);
    assert_eq!(fs.namei(&task, "/mnt").unwrap().dev(), ROOT);

    fs.mount(&task, "/dev/hd2", "/mnt", true).unwrap();
    let mut file = fs.open(&task, "/mnt/x", OpenFlags::RDONLY, 0).unwrap();
    let mut out = [0u8; 8];
    let n = file.read(&mut out).unwrap();
    assert_eq!(&out[..n], b"kept");
    drop(file);

    // by the root of the mounted volume this time
    fs.umount(&task, "/mnt").unwrap();
    assert!(fs.get_super(SECOND).is_none());
    task.release();
}

#[test]
fn umount_rejects_root_and_plain_directories() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    setup(&fs, &mut task);
    assert_eq!(fs.umount(&task, "/").unwrap_err(), FsError::Busy);
    assert_eq!(fs.umount(&task, "/dev").unwrap_err(), FsError::NotBlockDevice);
    assert_eq!(fs.umount(&task, "/dev/hd2").unwrap_err(), FsError::NotFound);
    task.release();
}

#[test]
fn mount_point_must_be_an_idle_directory() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    setup(&fs, &mut task);
    drop(fs.open(&task, "/file", OpenFlags::CREAT | OpenFlags::WRONLY, 0o644).unwrap());

    assert_eq!(fs.mount(&task, "/dev/hd2", "/file", false).unwrap_err(), FsError::NotPermitted);
    assert_eq!(fs.mount(&task, "/file", "/mnt", false).unwrap_err(), FsError::NotPermitted);
    assert_eq!(fs.mount(&task, "/dev/hd2", "/", false).unwrap_err(), FsError::Busy);

    let held = fs.namei(&task, "/mnt").unwrap();
    assert_eq!(fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap_err(), FsError::Busy);
    drop(held);

    fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap();
    assert_eq!(fs.mount(&task, "/dev/hd2", "/dev", false).unwrap_err(), FsError::Busy);
    fs.umount(&task, "/dev/hd2").unwrap();
    task.release();
}

#[test]
fn unformatted_device_is_refused() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    fs.mkdir(&task, "/mnt", 0o755).unwrap();
    fs.mknod(&task, "/blank", S_IFBLK | 0o600, SECOND).unwrap();
    fs.register_device(SECOND, Arc::new(RamDisk::new(64)));
    assert_eq!(fs.mount(&task, "/blank", "/mnt", false).unwrap_err(), FsError::BadMagic);
    assert!(fs.get_super(SECOND).is_none());
    task.release();
}

#[test]
fn unreadable_bitmap_leaves_no_super_block_behind() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    let second = setup(&fs, &mut task);

    // block 2 is the inode map, block 3 the zone map
    second.fail_reads_from(3);
    assert_eq!(fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap_err(), FsError::Io);
    assert!(fs.get_super(SECOND).is_none());
    let imap = fs.bcache().get_hash_table(SECOND, 2).unwrap();
    assert_eq!(imap.count(), 1);
    drop(imap);

    second.fail_reads_from(u32::MAX);
    fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap();
    assert_eq!(fs.statfs(SECOND).unwrap().free_zones, 58);
    fs.umount(&task, "/mnt").unwrap();
    task.release();
}

#[test]
fn corrupt_first_data_zone_is_refused() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    let second = setup(&fs, &mut task);

    let mut image = second.image();
    image[BLOCK_SIZE + 8..BLOCK_SIZE + 10].copy_from_slice(&0u16.to_le_bytes());
    second.swap_media(image.clone());
    assert_eq!(fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap_err(), FsError::InvalidArgument);
    assert!(fs.get_super(SECOND).is_none());

    // past the end of the volume
    image[BLOCK_SIZE + 8..BLOCK_SIZE + 10].copy_from_slice(&64u16.to_le_bytes());
    second.swap_media(image);
    assert_eq!(fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap_err(), FsError::InvalidArgument);
    task.release();
}

#[test]
fn mounting_needs_buffers_beyond_the_bitmaps() {
    let config = FsConfig { nr_buffers: 8, ..FsConfig::default() };
    let fs = boot_with(config, disk(64, 32));
    let mut task = Task::superuser();
    setup(&fs, &mut task);
    assert!(matches!(fs.mount(&task, "/dev/hd2", "/mnt", false), Err(FsError::BadConfig(_))));
    assert!(fs.get_super(SECOND).is_none());
    assert!(matches!(Fs::new(FsConfig { nr_buffers: 4, ..FsConfig::default() }), Err(FsError::BadConfig(_))));
    task.release();
}

#[test]
fn block_device_reads_and_writes_raw_bytes() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    let second = setup(&fs, &mut task);

    let mut dev = fs.open(&task, "/dev/hd2", OpenFlags::RDWR, 0).unwrap();
    let start = 10 * BLOCK_SIZE + 1000;
    dev.seek(start as u32);
    let data: Vec<u8> = (0..2500u32).map(|i| (i % 211) as u8 + 1).collect();
    assert_eq!(dev.write(&data).unwrap(), 2500);
    assert_eq!(dev.pos() as usize, start + 2500);
    assert_eq!(dev.inode().size(), 0);
    drop(dev);
    let image = second.image();
    assert!(image[start..start + 2500] == data[..]);

    let mut dev = fs.open(&task, "/dev/hd2", OpenFlags::RDONLY, 0).unwrap();
    dev.seek(BLOCK_SIZE as u32);
    let mut sb = [0u8; 18];
    assert_eq!(dev.read(&mut sb).unwrap(), 18);
    assert_eq!(&sb[..], &image[BLOCK_SIZE..BLOCK_SIZE + 18]);
    drop(dev);
    task.release();
}

#[test]
fn swapped_media_is_noticed_on_open_and_mount() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    let second = setup(&fs, &mut task);
    fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap();
    drop(fs.open(&task, "/mnt/old", OpenFlags::CREAT | OpenFlags::WRONLY, 0o644).unwrap());
    fs.umount(&task, "/mnt").unwrap();

    let mut dev = fs.open(&task, "/dev/hd2", OpenFlags::RDONLY, 0).unwrap();
    let mut before = [0u8; 4];
    dev.seek(BLOCK_SIZE as u32);
    dev.read(&mut before).unwrap();
    drop(dev);

    let fresh = RamDisk::formatted(64, Some(16)).unwrap().image();
    second.swap_media(fresh.clone());
    // the cached super block is stale until the change is noticed
    let mut dev = fs.open(&task, "/dev/hd2", OpenFlags::RDONLY, 0).unwrap();
    let mut after = [0u8; 4];
    dev.seek(BLOCK_SIZE as u32);
    dev.read(&mut after).unwrap();
    drop(dev);
    assert_ne!(before, after);
    assert_eq!(&after[..], &fresh[BLOCK_SIZE..BLOCK_SIZE + 4]);

    second.swap_media(fresh);
    fs.mount(&task, "/dev/hd2", "/mnt", false).unwrap();
    assert_eq!(fs.statfs(SECOND).unwrap().ninodes, 16);
    assert_eq!(fs.namei(&task, "/mnt/old").unwrap_err(), FsError::NotFound);
    fs.umount(&task, "/mnt").unwrap();
    task.release();
}
