//! Raw access to a block device through the buffer cache.

use super::Fs;
use crate::define::fs::{ BlockNo, Dev, BLOCK_SIZE, BLOCK_SIZE_BITS };
use crate::error::FsError;

impl Fs {
    /// Write `buf` to `dev` at byte `*pos`. Whole blocks are not read
    /// first. Fails only if nothing could be written.
    pub fn block_write(&self, dev: Dev, pos: &mut u32, buf: &[u8]) -> Result<usize, FsError> {
        let mut block = (*pos >> BLOCK_SIZE_BITS) as BlockNo;
        let mut offset = *pos as usize & (BLOCK_SIZE - 1);
        let mut written = 0;
        while written < buf.len() {
            let chars = (BLOCK_SIZE - offset).min(buf.len() - written);
            let b = if chars == BLOCK_SIZE {
                let b = self.bcache.getblk(dev, block);
                b.set_uptodate();
                b
            } else {
                match self.bcache.breada(dev, block, &[block + 1, block + 2]) {
                    Ok(b) => b,
                    Err(err) if written == 0 => return Err(err),
                    Err(_) => break,
                }
            };
            b.data()[offset..offset + chars].copy_from_slice(&buf[written..written + chars]);
            b.mark_dirty();
            drop(b);
            *pos += chars as u32;
            written += chars;
            offset = 0;
            block += 1;
        }
        Ok(written)
    }

    /// Read from `dev` at byte `*pos`, reading two blocks ahead.
    pub fn block_read(&self, dev: Dev, pos: &mut u32, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut block = (*pos >> BLOCK_SIZE_BITS) as BlockNo;
        let mut offset = *pos as usize & (BLOCK_SIZE - 1);
        let mut read = 0;
        while read < buf.len() {
            let chars = (BLOCK_SIZE - offset).min(buf.len() - read);
            let b = match self.bcache.breada(dev, block, &[block + 1, block + 2]) {
                Ok(b) => b,
                Err(err) if read == 0 => return Err(err),
                Err(_) => break,
            };
            buf[read..read + chars].copy_from_slice(&b.data()[offset..offset + chars]);
            drop(b);
            *pos += chars as u32;
            read += chars;
            offset = 0;
            block += 1;
        }
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::define::fs::FsConfig;
    use crate::driver::RamDisk;
    use crate::time::FixedClock;

    const RAW: Dev = 0x303;

    fn setup(blocks: usize) -> (Fs, Arc<RamDisk>) {
        let fs = Fs::with_clock(FsConfig::default(), FixedClock::new(1000)).unwrap();
        let disk = Arc::new(RamDisk::new(blocks));
        fs.register_device(RAW, disk.clone());
        (fs, disk)
    }

    #[test]
    fn writes_straddle_block_boundaries() {
        let (fs, disk) = setup(8);
        let data: Vec<u8> = (0..3000u32).map(|i| (i % 199) as u8).collect();
        let mut pos = 1000;
        assert_eq!(fs.block_write(RAW, &mut pos, &data).unwrap(), 3000);
        assert_eq!(pos, 4000);
        fs.sync_dev(RAW);
        assert!(disk.image()[1000..4000] == data[..]);
        assert!(disk.image()[..1000].iter().all(|&b| b == 0));

        let mut pos = 1000;
        let mut out = vec![0u8; 3000];
        assert_eq!(fs.block_read(RAW, &mut pos, &mut out).unwrap(), 3000);
        assert!(out == data);
    }

    #[test]
    fn reads_stop_at_the_end_of_the_device() {
        let (fs, _disk) = setup(2);
        let mut pos = 1500;
        let mut out = vec![0u8; 2000];
        assert_eq!(fs.block_read(RAW, &mut pos, &mut out).unwrap(), 548);
        assert_eq!(pos, 2048);
        assert_eq!(fs.block_read(RAW, &mut pos, &mut out).unwrap_err(), FsError::Io);
    }
}
