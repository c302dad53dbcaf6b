mod common;

use std::thread;

use common::*;
use minixfs::{ File, Fs, FsConfig, FsError };

#[test]
fn bytes_arrive_in_order_across_threads() {
    init_log();
    let fs = Fs::new(FsConfig::default()).unwrap();
    let (mut reader, mut writer) = fs.pipe();
    let data: Vec<u8> = (0..100_000u32).map(|i| (i % 241) as u8).collect();

    let received = thread::scope(|s| {
        let data = &data;
        s.spawn(move || {
            for chunk in data.chunks(1500) {
                assert_eq!(writer.write(chunk).unwrap(), chunk.len());
            }
        });
        let consumer = s.spawn(move || {
            let mut received = Vec::new();
            let mut buf = [0u8; 1000];
            loop {
                match reader.read(&mut buf).unwrap() {
                    0 => break,
                    n => received.extend_from_slice(&buf[..n]),
                }
            }
            received
        });
        consumer.join().unwrap()
    });
    assert_eq!(received.len(), data.len());
    assert!(received == data);
}

#[test]
fn writing_without_a_reader_is_a_broken_pipe() {
    init_log();
    let fs = Fs::new(FsConfig::default()).unwrap();
    let (reader, mut writer) = fs.pipe();
    assert!(writer.writeable() && !writer.readable());
    drop(reader);
    assert_eq!(writer.write(b"lost").unwrap_err(), FsError::BrokenPipe);
}

#[test]
fn pipe_ends_refuse_the_wrong_direction() {
    init_log();
    let fs = Fs::new(FsConfig::default()).unwrap();
    let (mut reader, mut writer) = fs.pipe();
    assert_eq!(reader.write(b"x").unwrap_err(), FsError::InvalidArgument);
    assert_eq!(writer.read(&mut [0u8; 1]).unwrap_err(), FsError::InvalidArgument);
    assert!(reader.inode().is_pipe());
    assert!(reader.inode().same(writer.inode()));
}

#[test]
fn writer_blocks_until_the_reader_drains() {
    init_log();
    let fs = Fs::new(FsConfig::default()).unwrap();
    let (mut reader, mut writer) = fs.pipe();
    let big = vec![9u8; 10_000];

    thread::scope(|s| {
        s.spawn(move || {
            assert_eq!(writer.write(&big).unwrap(), 10_000);
        });
        let mut total = 0;
        let mut buf = [0u8; 512];
        while total < 10_000 {
            let n = reader.read(&mut buf).unwrap();
            assert!(buf[..n].iter().all(|&b| b == 9));
            total += n;
        }
        assert_eq!(total, 10_000);
    });
}
