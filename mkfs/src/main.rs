//! Write a Minix v1 file system image, optionally with host files
//! copied into its root directory.

use std::collections::HashSet;
use std::fs::{ self, OpenOptions };
use std::io::{ self, Write };
use std::path::PathBuf;
use std::process::exit;
use std::time::{ SystemTime, UNIX_EPOCH };

use clap::Parser;
use thiserror::Error;
use zerocopy::IntoBytes;

use fs_lib::{ as_inodes, as_inodes_mut, as_zones, as_zones_mut, find_first_zero, format, set_bit, test_bit };
use fs_lib::{ inode_block, inode_offset };
use fs_lib::{ BlockData, DirEntry, DiskInode, FormatError, Geometry };
use fs_lib::{ BLOCK_SIZE, BITS_PER_BLOCK, MAX_FILE_BLOCKS, NAME_LEN, NR_DIRECT, NR_INDIRECT, ROOT_INO, S_IFREG };

#[derive(Parser, Debug)]
#[command(name = "mkfs", about = "Make a Minix v1 file system image")]
struct Args {
    /// Image file to write
    image: PathBuf,
    /// Files copied into the root directory
    files: Vec<PathBuf>,
    /// Size of the volume in 1 KiB blocks
    #[arg(short, long, default_value_t = 1440)]
    blocks: u16,
    /// Number of inodes, one per three blocks if not given
    #[arg(short, long)]
    inodes: Option<u16>,
}

#[derive(Debug, Error)]
enum MkfsError {
    #[error("{0}")]
    Format(FormatError),
    #[error("{path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("out of inodes")]
    NoInodes,
    #[error("out of zones")]
    NoZones,
    #[error("inode {0}: file too large")]
    TooLarge(u16),
    #[error("{0}: bad file name")]
    BadName(String),
    #[error("{0}: name already used in the root directory")]
    Duplicate(String),
}

/// A volume being built in memory.
struct Image {
    data: Vec<u8>,
    geo: Geometry,
    now: u32,
}

impl Image {
    fn new(blocks: u16, inodes: Option<u16>, now: u32) -> Result<Self, MkfsError> {
        let mut data = vec![0u8; blocks as usize * BLOCK_SIZE];
        let geo = format(&mut data, inodes, now).map_err(MkfsError::Format)?;
        Ok(Self { data, geo, now })
    }

    fn block(&self, nr: u16) -> &BlockData {
        let start = nr as usize * BLOCK_SIZE;
        match self.data[start..start + BLOCK_SIZE].try_into() {
            Ok(block) => block,
            Err(_) => unreachable!(),
        }
    }

    fn block_mut(&mut self, nr: u16) -> &mut BlockData {
        let start = nr as usize * BLOCK_SIZE;
        match (&mut self.data[start..start + BLOCK_SIZE]).try_into() {
            Ok(block) => block,
            Err(_) => unreachable!(),
        }
    }

    /// Set the first clear bit of the bitmap stored in `blocks` blocks
    /// from `first` on.
    fn claim(&mut self, first: u16, blocks: u16) -> Option<usize> {
        for i in 0..blocks {
            let map = self.block_mut(first + i);
            if let Some(bit) = find_first_zero(map) {
                set_bit(map, bit);
                return Some(i as usize * BITS_PER_BLOCK + bit);
            }
        }
        None
    }

    fn ialloc(&mut self, mode: u16) -> Result<u16, MkfsError> {
        let num = self.claim(2, self.geo.imap_blocks).ok_or(MkfsError::NoInodes)? as u16;
        let mut inode = DiskInode::new();
        inode.mode.set(mode);
        inode.nlinks = 1;
        inode.mtime.set(self.now);
        self.write_inode(num, inode);
        Ok(num)
    }

    fn balloc(&mut self) -> Result<u16, MkfsError> {
        let bit = self.claim(2 + self.geo.imap_blocks, self.geo.zmap_blocks).ok_or(MkfsError::NoZones)?;
        Ok(bit as u16 + self.geo.firstdatazone - 1)
    }

    fn inode_block(&self, num: u16) -> u16 {
        inode_block(self.geo.imap_blocks, self.geo.zmap_blocks, num) as u16
    }

    fn read_inode(&self, num: u16) -> DiskInode {
        as_inodes(self.block(self.inode_block(num)))[inode_offset(num)]
    }

    fn write_inode(&mut self, num: u16, inode: DiskInode) {
        let block = self.inode_block(num);
        as_inodes_mut(self.block_mut(block))[inode_offset(num)] = inode;
    }

    fn inode_zone(&mut self, inode: &mut DiskInode, i: usize) -> Result<u16, MkfsError> {
        if inode.zone[i].get() == 0 {
            let zone = self.balloc()?;
            inode.zone[i].set(zone);
        }
        Ok(inode.zone[i].get())
    }

    fn indirect_zone(&mut self, block: u16, i: usize) -> Result<u16, MkfsError> {
        let zone = as_zones(self.block(block))[i].get();
        if zone != 0 {
            return Ok(zone);
        }
        let zone = self.balloc()?;
        as_zones_mut(self.block_mut(block))[i].set(zone);
        Ok(zone)
    }

    /// Zone of file block `fbn`, allocating it and its indirect blocks.
    fn bmap(&mut self, inode: &mut DiskInode, fbn: usize) -> Result<u16, MkfsError> {
        if fbn < NR_DIRECT {
            return self.inode_zone(inode, fbn);
        }
        let fbn = fbn - NR_DIRECT;
        if fbn < NR_INDIRECT {
            let ind = self.inode_zone(inode, 7)?;
            return self.indirect_zone(ind, fbn);
        }
        let fbn = fbn - NR_INDIRECT;
        let dind = self.inode_zone(inode, 8)?;
        let ind = self.indirect_zone(dind, fbn / NR_INDIRECT)?;
        self.indirect_zone(ind, fbn % NR_INDIRECT)
    }

    /// Append `data` to the end of inode `num`.
    fn iappend(&mut self, num: u16, data: &[u8]) -> Result<(), MkfsError> {
        let mut inode = self.read_inode(num);
        let mut off = inode.size.get() as usize;
        let mut done = 0;
        while done < data.len() {
            let fbn = off / BLOCK_SIZE;
            if fbn >= MAX_FILE_BLOCKS {
                return Err(MkfsError::TooLarge(num));
            }
            let zone = self.bmap(&mut inode, fbn)?;
            let offset = off % BLOCK_SIZE;
            let n = (BLOCK_SIZE - offset).min(data.len() - done);
            self.block_mut(zone)[offset..offset + n].copy_from_slice(&data[done..done + n]);
            off += n;
            done += n;
        }
        inode.size.set(off as u32);
        self.write_inode(num, inode);
        Ok(())
    }

    /// New regular file in the root directory.
    fn add_file(&mut self, name: &[u8], contents: &[u8]) -> Result<u16, MkfsError> {
        let num = self.ialloc(S_IFREG | 0o644)?;
        self.iappend(num, contents)?;
        self.iappend(ROOT_INO, DirEntry::new(num, name).as_bytes())?;
        Ok(num)
    }

    /// Clear bits among the first `bits` bits after bit 0.
    fn count_free(&self, first: u16, bits: usize) -> usize {
        (1..=bits).filter(|&bit| !test_bit(self.block(first + (bit / BITS_PER_BLOCK) as u16), bit % BITS_PER_BLOCK)).count()
    }

    /// Free inodes and free zones.
    fn free_counts(&self) -> (usize, usize) {
        let geo = &self.geo;
        (
            self.count_free(2, geo.ninodes as usize),
            self.count_free(2 + geo.imap_blocks, (geo.nzones - geo.firstdatazone) as usize),
        )
    }
}

fn run(args: &Args) -> Result<(), MkfsError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    let mut image = Image::new(args.blocks, args.inodes, now)?;
    let geo = image.geo;
    log::info!(
        "nzones {} ninodes {}: imap {} zmap {} inode blocks {} firstdatazone {}",
        geo.nzones, geo.ninodes, geo.imap_blocks, geo.zmap_blocks, geo.inode_blocks, geo.firstdatazone
    );

    let mut names = HashSet::new();
    for path in &args.files {
        let shown = path.display().to_string();
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Err(MkfsError::BadName(shown)),
        };
        let name = name.as_bytes();
        if name.len() > NAME_LEN {
            log::warn!("{}: name truncated to {} bytes", shown, NAME_LEN);
        }
        let name = &name[..name.len().min(NAME_LEN)];
        if !names.insert(name.to_vec()) {
            return Err(MkfsError::Duplicate(shown));
        }
        let contents = fs::read(path).map_err(|source| MkfsError::Io { path: shown.clone(), source })?;
        let num = image.add_file(name, &contents)?;
        log::info!("{}: inode {}, {} bytes", shown, num, contents.len());
    }

    let shown = args.image.display().to_string();
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&args.image)
        .map_err(|source| MkfsError::Io { path: shown.clone(), source })?;
    file.write_all(&image.data).map_err(|source| MkfsError::Io { path: shown, source })?;

    let (free_inodes, free_zones) = image.free_counts();
    log::info!("{}/{} free inodes", free_inodes, geo.ninodes);
    log::info!("{}/{} free zones", free_zones, geo.nzones - geo.firstdatazone);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(err) = run(&args) {
        log::error!("mkfs: {}", err);
        exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_lib::as_dir_entries;

    fn contents(image: &Image, num: u16) -> Vec<u8> {
        let mut inode = image.read_inode(num);
        let size = inode.size.get() as usize;
        let mut scratch = Image { data: image.data.clone(), geo: image.geo, now: 0 };
        let mut out = Vec::with_capacity(size);
        for fbn in 0..(size + BLOCK_SIZE - 1) / BLOCK_SIZE {
            let zone = scratch.bmap(&mut inode, fbn).unwrap();
            let n = (size - out.len()).min(BLOCK_SIZE);
            out.extend_from_slice(&image.block(zone)[..n]);
        }
        out
    }

    #[test]
    fn files_are_linked_into_the_root() {
        let mut image = Image::new(128, Some(32), 7).unwrap();
        let num = image.add_file(b"hello.txt", b"hello, world").unwrap();
        assert_eq!(num, 2);

        let root = image.read_inode(ROOT_INO);
        assert_eq!(root.size.get(), 48);
        let entries = as_dir_entries(image.block(root.zone[0].get()));
        assert_eq!(entries[2].inode.get(), num);
        assert_eq!(entries[2].name(), b"hello.txt");

        let inode = image.read_inode(num);
        assert_eq!(inode.mode.get(), S_IFREG | 0o644);
        assert_eq!(inode.nlinks, 1);
        assert_eq!(inode.mtime.get(), 7);
        assert_eq!(contents(&image, num), b"hello, world");
        assert_eq!(image.free_counts(), (30, 128 - 5 - 2));
    }

    #[test]
    fn large_files_use_the_indirect_block() {
        let mut image = Image::new(128, Some(32), 0).unwrap();
        let data: Vec<u8> = (0..20 * BLOCK_SIZE).map(|i| (i % 199) as u8).collect();
        let num = image.add_file(b"big", &data).unwrap();
        let inode = image.read_inode(num);
        assert_ne!(inode.zone[7].get(), 0);
        assert_eq!(inode.zone[8].get(), 0);
        assert_eq!(contents(&image, num), data);
        // 20 data zones, the indirect block, and the root directory
        assert_eq!(image.free_counts().1, 128 - 5 - 22);
    }

    #[test]
    fn running_out_of_zones_is_reported() {
        let mut image = Image::new(32, Some(16), 0).unwrap();
        let data = vec![1u8; 64 * BLOCK_SIZE];
        assert!(matches!(image.add_file(b"huge", &data), Err(MkfsError::NoZones)));
    }
}
