//! Image formatter: lays out superblock, bitmap, inode table and data
//! region in a fresh file and plants the root directory.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::layout::{DiskInode, InodeKind, SuperBlock};

/// Format parameters. The defaults give a 1 MiB-class teaching image.
#[derive(Debug, Clone)]
pub struct MkfsOptions {
    /// Bytes per data block; a power of two, at least 128.
    pub block_size: u16,
    /// Data blocks in the image; at most 65535 (`u16` pointers, all-ones
    /// reserved).
    pub blocks: u32,
    /// Inode-table slots, slot 0 included (it is never used).
    pub inodes: u32,
}

impl Default for MkfsOptions {
    fn default() -> Self {
        Self {
            block_size: 512,
            blocks: 2048,
            inodes: 128,
        }
    }
}

const BITMAP_START: u32 = 64;
const INODE_SLOT_SIZE: u16 = 20;
const ROOT_INUMBER: u16 = 1;

/// Create (or overwrite) `path` and format it.
pub fn mkfs(path: impl AsRef<Path>, opts: &MkfsOptions) -> io::Result<()> {
    let invalid = |msg| Err(io::Error::new(io::ErrorKind::InvalidInput, msg));
    if !opts.block_size.is_power_of_two() || opts.block_size < 128 {
        return invalid("block size must be a power of two, at least 128");
    }
    if opts.blocks == 0 || opts.blocks > u16::MAX as u32 {
        return invalid("block count must be between 1 and 65535");
    }
    if opts.inodes < 2 || opts.inodes > u16::MAX as u32 {
        return invalid("inode count must be between 2 and 65535");
    }

    let bitmap_size = opts.blocks.div_ceil(8);
    let inode_table_start = BITMAP_START + bitmap_size;
    let table_end = inode_table_start + opts.inodes * INODE_SLOT_SIZE as u32;
    let data_start = table_end.next_multiple_of(opts.block_size as u32);
    let fs_size = data_start as u64 + opts.blocks as u64 * opts.block_size as u64;

    let sb = SuperBlock::new(
        opts.block_size,
        ROOT_INUMBER,
        fs_size,
        BITMAP_START,
        bitmap_size,
        inode_table_start,
        opts.inodes,
        INODE_SLOT_SIZE,
        data_start,
    );

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.set_len(fs_size)?;

    // set_len leaves everything zero: a zeroed bitmap, a free inode
    // table. Only the padding bits, the root inode and the superblock
    // need writing.
    let mut bitmap = vec![0u8; bitmap_size as usize];
    for bit in opts.blocks..bitmap_size * 8 {
        bitmap[bit as usize / 8] |= 1u8 << (bit % 8);
    }
    file.write_all_at(&bitmap, BITMAP_START as u64)?;

    let root = DiskInode::new(InodeKind::Directory);
    file.write_all_at(&root.encode(), sb.inode_offset(ROOT_INUMBER))?;

    file.write_all_at(&sb.encode(), crate::SUPER_BLOCK_OFFSET)?;

    log::debug!(
        "formatted image: {} blocks of {} bytes, {} inodes",
        opts.blocks,
        opts.block_size,
        opts.inodes
    );
    Ok(())
}
