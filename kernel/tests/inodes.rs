mod common;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use common::*;
use minixfs::{ FsConfig, Inode, OpenFlags, Task };

const PATIENCE: Duration = Duration::from_secs(5);

/// Fill a four-slot table: the root, `/x` and two fresh inodes.
fn full_table<'a>(fs: &'a minixfs::Fs, task: &mut Task<'a>) -> (Inode<'a>, Inode<'a>, Inode<'a>) {
    fs.mount_root(task).unwrap();
    let x = fs.open_namei(task, "/x", OpenFlags::CREAT | OpenFlags::WRONLY, 0o644).unwrap();
    let a = fs.new_inode(ROOT, task).unwrap();
    let b = fs.new_inode(ROOT, task).unwrap();
    (x, a, b)
}

#[test]
fn freeing_an_inode_wakes_a_waiter_for_a_slot() {
    let fs = boot_with(FsConfig { nr_inodes: 4, ..FsConfig::default() }, disk(64, 32));
    let mut task = Task::superuser();
    let (x, a, b) = full_table(&fs, &mut task);
    let num = x.num();
    fs.unlink(&task, "/x").unwrap();

    let (tx, rx) = mpsc::channel();
    thread::scope(|s| {
        let fs = &fs;
        s.spawn(move || {
            let slot = fs.get_empty_inode();
            tx.send(slot.count()).unwrap();
        });
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());

        fs.free_inode(x);
        let woke = rx.recv_timeout(PATIENCE);
        // let the waiter finish either way
        drop((a, b));
        assert_eq!(woke, Ok(1));
    });
    assert!(!fs.inode_allocated(ROOT, num));
    task.release();
}

#[test]
fn last_put_wakes_a_waiter_for_a_slot() {
    let fs = boot_with(FsConfig { nr_inodes: 4, ..FsConfig::default() }, disk(64, 32));
    let mut task = Task::superuser();
    let (x, a, b) = full_table(&fs, &mut task);

    let (tx, rx) = mpsc::channel();
    thread::scope(|s| {
        let fs = &fs;
        s.spawn(move || {
            let slot = fs.get_empty_inode();
            tx.send(slot.count()).unwrap();
        });
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());

        drop(x);
        let woke = rx.recv_timeout(PATIENCE);
        drop((a, b));
        assert_eq!(woke, Ok(1));
    });
    // still linked, so it was written back rather than freed
    assert!(fs.namei(&task, "/x").is_ok());
    task.release();
}

#[test]
fn changes_survive_slot_reuse_in_a_small_table() {
    let root = disk(64, 32);
    let fs = boot_with(FsConfig { nr_inodes: 3, ..FsConfig::default() }, root.clone());
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    for i in 0..10u16 {
        let path = format!("/f{}", i);
        drop(fs.open_namei(&task, &path, OpenFlags::CREAT | OpenFlags::WRONLY, 0o644).unwrap());
        fs.chown(&task, &path, 100 + i, i as u8).unwrap();
    }
    fs.sys_sync();
    task.release();
    drop(task);
    drop(fs);

    let fs = boot(std::sync::Arc::new(minixfs::RamDisk::from_image(root.image())));
    let mut task = Task::superuser();
    fs.mount_root(&mut task).unwrap();
    for i in 0..10u16 {
        let stat = fs.stat(&task, &format!("/f{}", i)).unwrap();
        assert_eq!((stat.uid, stat.gid), (100 + i, i as u8));
    }
    task.release();
}
