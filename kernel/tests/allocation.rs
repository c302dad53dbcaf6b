mod common;

use std::collections::HashSet;

use common::*;
use minixfs::{ FsConfig, FsError, OpenFlags, Task };

#[test]
fn zones_are_unique_until_the_disk_is_full() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    let before = fs.statfs(ROOT).unwrap();
    assert_eq!(before.free_zones, 58);

    let mut zones = Vec::new();
    loop {
        match fs.new_block(ROOT) {
            Ok(zone) => zones.push(zone),
            Err(err) => {
                assert_eq!(err, FsError::NoSpace);
                break;
            }
        }
    }
    assert_eq!(zones.len(), 58);
    let distinct: HashSet<_> = zones.iter().collect();
    assert_eq!(distinct.len(), zones.len());
    assert!(zones.iter().all(|&zone| fs.zone_allocated(ROOT, zone)));
    assert_eq!(fs.statfs(ROOT).unwrap().free_zones, 0);

    let victim = zones[17];
    assert!(fs.free_block(ROOT, victim));
    assert!(!fs.zone_allocated(ROOT, victim));
    assert_eq!(fs.new_block(ROOT).unwrap(), victim);
    assert_eq!(fs.new_block(ROOT).unwrap_err(), FsError::NoSpace);
    task.release();
}

#[test]
fn new_blocks_are_zeroed_and_dirty() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    let zone = fs.new_block(ROOT).unwrap();
    let buf = fs.bcache().bread(ROOT, zone).unwrap();
    assert!(buf.dirty());
    assert!(buf.data().iter().all(|&b| b == 0));
    task.release();
}

#[test]
fn free_then_alloc_restores_counts() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    let before = fs.statfs(ROOT).unwrap();
    let zone = fs.new_block(ROOT).unwrap();
    assert_eq!(fs.statfs(ROOT).unwrap().free_zones, before.free_zones - 1);
    fs.free_block(ROOT, zone);
    assert_eq!(fs.statfs(ROOT).unwrap(), before);
    task.release();
}

#[test]
fn freeing_a_held_block_is_refused() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    let zone = fs.new_block(ROOT).unwrap();
    let held = fs.bcache().bread(ROOT, zone).unwrap();
    assert!(!fs.free_block(ROOT, zone));
    assert!(fs.zone_allocated(ROOT, zone));
    drop(held);
    assert!(fs.free_block(ROOT, zone));
    task.release();
}

#[test]
fn inodes_are_unique_and_owned_by_the_caller() {
    let config = FsConfig { nr_inodes: 64, ..FsConfig::default() };
    let fs = boot_with(config, disk(64, 32));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    let user = task.with_ids(7, 3);

    let mut inodes = Vec::new();
    loop {
        match fs.new_inode(ROOT, &user) {
            Ok(inode) => inodes.push(inode),
            Err(err) => {
                assert_eq!(err, FsError::NoSpace);
                break;
            }
        }
    }
    // inode 1 is the root directory
    assert_eq!(inodes.len(), 31);
    let nums: HashSet<_> = inodes.iter().map(|inode| inode.num()).collect();
    assert_eq!(nums.len(), 31);
    assert!(!nums.contains(&0) && !nums.contains(&1));
    for inode in &inodes {
        assert!(fs.inode_allocated(ROOT, inode.num()));
        assert_eq!((inode.uid(), inode.gid(), inode.nlinks()), (7, 3, 1));
        assert_eq!(inode.mtime(), START);
        assert!(inode.is_dirty());
    }
    assert_eq!(fs.statfs(ROOT).unwrap().free_inodes, 0);
    drop(inodes);
    drop(user);
    task.release();
}

#[test]
fn unlinked_inode_goes_back_to_the_bitmap() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    let free = fs.statfs(ROOT).unwrap().free_inodes;
    let inode = fs.open_namei(&task, "/tmp", OpenFlags::CREAT | OpenFlags::WRONLY, 0o600).unwrap();
    let num = inode.num();
    assert!(fs.inode_allocated(ROOT, num));
    assert_eq!(fs.statfs(ROOT).unwrap().free_inodes, free - 1);

    // still open, so unlinking keeps the inode alive
    fs.unlink(&task, "/tmp").unwrap();
    assert!(fs.inode_allocated(ROOT, num));
    assert_eq!(inode.nlinks(), 0);
    drop(inode);
    assert!(!fs.inode_allocated(ROOT, num));
    assert_eq!(fs.statfs(ROOT).unwrap().free_inodes, free);
    task.release();
}

#[test]
#[should_panic(expected = "bit already cleared")]
fn double_free_of_a_zone_is_fatal() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    let zone = fs.new_block(ROOT).unwrap();
    fs.free_block(ROOT, zone);
    fs.free_block(ROOT, zone);
}

#[test]
#[should_panic(expected = "not in datazone")]
fn freeing_metadata_blocks_is_fatal() {
    let fs = boot(disk(64, 32));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    fs.free_block(ROOT, 2);
}
