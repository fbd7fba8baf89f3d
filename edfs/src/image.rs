//! # 镜像句柄层
//!
//! Owns the backing file and the superblock read at open time. All disk
//! access goes through the positioned reads and writes here; a transfer
//! shorter than requested is an I/O error, never a partial success.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::layout::{DiskInode, Inode, InodeKind, SuperBlock};
use crate::{FsError, FsResult, SUPER_BLOCK_OFFSET};

pub struct Image {
    file: File,
    sb: SuperBlock,
}

impl Image {
    /// Open an image read/write and validate its superblock.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut raw = [0; SuperBlock::SIZE];
        file.read_exact_at(&mut raw, SUPER_BLOCK_OFFSET)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "superblock unreadable"))?;
        let sb = SuperBlock::decode(&raw);

        if !sb.is_valid() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not an EdFS image: magic number mismatch",
            ));
        }
        if file.metadata()?.len() < sb.fs_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "file system size larger than image size",
            ));
        }

        Ok(Self { file, sb })
    }

    #[inline]
    pub fn sb(&self) -> &SuperBlock {
        &self.sb
    }

    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> FsResult<()> {
        self.file.read_exact_at(buf, offset).map_err(|_| FsError::Io)
    }

    pub fn write_at(&self, buf: &[u8], offset: u64) -> FsResult<()> {
        self.file.write_all_at(buf, offset).map_err(|_| FsError::Io)
    }

    /// Read a whole data block.
    pub fn read_block(&self, block: u16) -> FsResult<Vec<u8>> {
        let mut buf = vec![0; self.sb.block_size as usize];
        self.read_at(&mut buf, self.sb.block_offset(block))?;
        Ok(buf)
    }

    /// Write a whole data block; `buf` must be one block long.
    pub fn write_block(&self, block: u16, buf: &[u8]) -> FsResult<()> {
        debug_assert_eq!(buf.len(), self.sb.block_size as usize);
        self.write_at(buf, self.sb.block_offset(block))
    }
}

/*
 * Inode-table operations. Inumber 0 is the "no such inode" sentinel and
 * is never handed out; the root inumber comes from the superblock.
 */
impl Image {
    pub fn read_inode(&self, inumber: u16) -> FsResult<Inode> {
        if inumber as u32 >= self.sb.n_inodes {
            return Err(FsError::NotFound);
        }

        let mut raw = vec![0; self.sb.inode_size as usize];
        self.read_at(&mut raw, self.sb.inode_offset(inumber))?;

        Ok(Inode {
            inumber,
            disk: DiskInode::decode(&raw)?,
        })
    }

    pub fn root_inode(&self) -> FsResult<Inode> {
        self.read_inode(self.sb.root_inumber)
    }

    pub fn write_inode(&self, inode: &Inode) -> FsResult<()> {
        if inode.inumber as u32 >= self.sb.n_inodes {
            return Err(FsError::NotFound);
        }

        let mut raw = vec![0; self.sb.inode_size as usize];
        raw[..DiskInode::SIZE].copy_from_slice(&inode.disk.encode());
        self.write_at(&raw, self.sb.inode_offset(inode.inumber))
    }

    /// Zero the slot, marking it free.
    pub fn clear_inode(&self, inumber: u16) -> FsResult<()> {
        if inumber as u32 >= self.sb.n_inodes {
            return Err(FsError::NotFound);
        }

        let raw = vec![0; self.sb.inode_size as usize];
        self.write_at(&raw, self.sb.inode_offset(inumber))
    }

    /// First free slot from inumber 1 upwards, or `None` on a full table.
    /// Slots that fail to decode are skipped, never reused.
    pub fn find_free_inode(&self) -> Option<u16> {
        let slots = self.sb.n_inodes.min(u16::MAX as u32) as u16;
        (1..slots)
            .find(|&inumber| matches!(self.read_inode(inumber), Ok(inode) if inode.disk.is_free()))
    }

    /// Build a fresh in-memory inode in a free slot. The slot only counts
    /// as allocated once the caller writes it back.
    pub fn new_inode(&self, kind: InodeKind) -> FsResult<Inode> {
        let inumber = self.find_free_inode().ok_or(FsError::NoSpace)?;

        Ok(Inode {
            inumber,
            disk: DiskInode::new(kind),
        })
    }
}
