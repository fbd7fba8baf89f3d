//! # 索引节点层
//!
//! The operation dispatcher: every file system call enters here with a
//! path, gets resolved to inodes, and is carried out against the image
//! through the bitmap, block map and directory store. One operation runs
//! to completion before the next begins; nothing here takes a lock or
//! keeps state between calls.

use std::io;
use std::ops::ControlFlow;
use std::path::Path;

use crate::layout::InodeKind;
use crate::{bitmap, block_map, dir, path, FsError, FsResult, Image, BLOCK_INVALID};

pub struct Edfs {
    img: Image,
}

/// What `getattr` reports for one file system object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub inumber: u16,
    pub kind: StatKind,
    pub size: u64,
    pub nlink: u32,
    pub perm: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    File,
    Directory,
}

/// Volume totals for the bridge's statfs callback.
#[derive(Debug, Clone, Copy)]
pub struct FsStats {
    pub block_size: u16,
    pub blocks: u64,
    pub free_blocks: u64,
    pub inodes: u64,
    pub free_inodes: u64,
    pub name_max: u32,
}

impl Edfs {
    /// Open a mounted-image handle; validation lives in [`Image::open`].
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            img: Image::open(path.as_ref())?,
        })
    }

    pub fn image(&self) -> &Image {
        &self.img
    }

    pub fn getattr(&self, path: &str) -> FsResult<Stat> {
        if path == "/" {
            let root = self.img.root_inode()?;
            return Ok(Stat {
                inumber: root.inumber,
                kind: StatKind::Directory,
                size: 0,
                nlink: 2,
                perm: 0o755,
            });
        }

        let inode = path::find_inode(&self.img, path)?;
        Ok(if inode.disk.is_directory() {
            Stat {
                inumber: inode.inumber,
                kind: StatKind::Directory,
                size: inode.disk.size as u64,
                nlink: 2,
                perm: 0o770,
            }
        } else {
            Stat {
                inumber: inode.inumber,
                kind: StatKind::File,
                size: inode.disk.size as u64,
                nlink: 1,
                perm: 0o660,
            }
        })
    }

    /// List a directory. `.` and `..` are synthesized; they are never
    /// stored on disk.
    pub fn readdir(&self, path: &str) -> FsResult<Vec<(String, StatKind)>> {
        let dir_inode = path::find_inode(&self.img, path)?;
        if !dir_inode.disk.is_directory() {
            return Err(FsError::NotADirectory);
        }

        let mut found: Vec<(String, u16)> = Vec::new();
        dir::scan(&self.img, &dir_inode, |entry| {
            found.push((entry.name().to_owned(), entry.inumber));
            ControlFlow::<()>::Continue(())
        })?;

        let mut entries = vec![
            (".".to_owned(), StatKind::Directory),
            ("..".to_owned(), StatKind::Directory),
        ];
        for (name, inumber) in found {
            let inode = self.img.read_inode(inumber)?;
            let kind = if inode.disk.is_directory() {
                StatKind::Directory
            } else {
                StatKind::File
            };
            entries.push((name, kind));
        }

        Ok(entries)
    }

    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        self.make_node(path, InodeKind::Directory)
    }

    pub fn create(&self, path: &str) -> FsResult<()> {
        self.make_node(path, InodeKind::File)
    }

    fn make_node(&self, path: &str, kind: InodeKind) -> FsResult<()> {
        let mut parent = path::parent_inode(&self.img, path)?;
        if !parent.disk.is_directory() {
            return Err(FsError::NotADirectory);
        }
        let name = path::basename(path).ok_or(FsError::InvalidInput)?;

        if dir::lookup(&self.img, &parent, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        // The child inode hits the disk before the directory points at
        // it, mirroring the bitmap-before-link ordering for blocks.
        let child = self.img.new_inode(kind)?;
        self.img.write_inode(&child)?;
        dir::add_entry(&self.img, &mut parent, name, child.inumber)?;

        log::debug!("{path}: new {kind:?} inode {}", child.inumber);
        Ok(())
    }

    pub fn rmdir(&self, path: &str) -> FsResult<()> {
        let target = path::find_inode(&self.img, path)?;
        if !target.disk.is_directory() {
            return Err(FsError::NotADirectory);
        }
        if !dir::is_empty(&self.img, &target)? {
            return Err(FsError::DirectoryNotEmpty);
        }

        let parent = path::parent_inode(&self.img, path)?;
        dir::remove_entry(&self.img, &parent, target.inumber)?;

        // An empty directory should own no blocks; free any stragglers.
        for block in target.disk.blocks {
            if block != BLOCK_INVALID {
                bitmap::free(&self.img, block)?;
            }
        }

        log::debug!("{path}: removed directory inode {}", target.inumber);
        self.img.clear_inode(target.inumber)
    }

    pub fn unlink(&self, path: &str) -> FsResult<()> {
        let target = path::find_inode(&self.img, path)?;
        if target.disk.is_directory() {
            return Err(FsError::IsADirectory);
        }

        if target.disk.has_indirect() {
            for block in target.disk.blocks {
                if block == BLOCK_INVALID {
                    continue;
                }
                for ptr in block_map::read_indirect(&self.img, block)? {
                    if ptr != BLOCK_INVALID {
                        bitmap::free(&self.img, ptr)?;
                    }
                }
                bitmap::free(&self.img, block)?;
            }
        } else {
            for block in target.disk.blocks {
                if block != BLOCK_INVALID {
                    bitmap::free(&self.img, block)?;
                }
            }
        }

        let parent = path::parent_inode(&self.img, path)?;
        dir::remove_entry(&self.img, &parent, target.inumber)?;

        log::debug!("{path}: removed file inode {}", target.inumber);
        self.img.clear_inode(target.inumber)
    }

    /// Read up to `buf.len()` bytes from `offset`, clamped to the file
    /// size. Reading at or past the end returns 0.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        let inode = path::find_inode(&self.img, path)?;
        if inode.disk.is_directory() {
            return Err(FsError::IsADirectory);
        }

        let size = inode.disk.size as u64;
        if offset >= size {
            return Ok(0);
        }
        let wanted = (buf.len() as u64).min(size - offset) as usize;

        let bs = self.img.sb().block_size as u64;
        let mut done = 0;
        while done < wanted {
            let (block, in_block) = block_map::translate(&self.img, &inode.disk, offset + done as u64)?;
            let chunk = ((bs - in_block) as usize).min(wanted - done);
            self.img.read_at(
                &mut buf[done..done + chunk],
                self.img.sb().block_offset(block) + in_block,
            )?;
            done += chunk;
        }

        Ok(done)
    }

    /// Write `data` at `offset`, allocating blocks as needed and growing
    /// the file size when the write ends past it. Writing beyond the old
    /// end leaves any skipped-over range as a hole.
    pub fn write(&self, path: &str, data: &[u8], offset: u64) -> FsResult<usize> {
        let mut inode = path::find_inode(&self.img, path)?;
        if inode.disk.is_directory() {
            return Err(FsError::IsADirectory);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let bs = self.img.sb().block_size as u64;
        let mut done = 0;
        while done < data.len() {
            let pos = offset + done as u64;
            let block = block_map::ensure(&self.img, &mut inode, pos / bs)?;
            let in_block = pos % bs;
            let chunk = ((bs - in_block) as usize).min(data.len() - done);
            self.img.write_at(
                &data[done..done + chunk],
                self.img.sb().block_offset(block) + in_block,
            )?;
            done += chunk;
        }

        let end = offset + done as u64;
        if end > inode.disk.size as u64 {
            inode.disk.size = end as u32;
            self.img.write_inode(&inode)?;
        }

        Ok(done)
    }

    /// Set the file size. Growing only makes sure the *last* block
    /// exists; anything in between stays a hole. Shrinking frees every
    /// block past the new end and unlinks its pointer.
    pub fn truncate(&self, path: &str, new_size: u64) -> FsResult<()> {
        let mut inode = path::find_inode(&self.img, path)?;
        if inode.disk.is_directory() {
            return Err(FsError::IsADirectory);
        }

        let bs = self.img.sb().block_size as u64;
        let old_size = inode.disk.size as u64;

        if new_size > old_size {
            block_map::ensure(&self.img, &mut inode, (new_size - 1) / bs)?;
        } else {
            for index in new_size.div_ceil(bs)..old_size.div_ceil(bs) {
                block_map::release(&self.img, &mut inode, index)?;
            }
        }

        inode.disk.size = new_size as u32;
        self.img.write_inode(&inode)
    }

    /// The open check: the path must exist and must not be a directory.
    /// No per-open state is kept.
    pub fn open_file(&self, path: &str) -> FsResult<()> {
        let inode = path::find_inode(&self.img, path)?;
        if inode.disk.is_directory() {
            return Err(FsError::IsADirectory);
        }
        Ok(())
    }

    pub fn stat_fs(&self) -> FsResult<FsStats> {
        let sb = self.img.sb();

        let mut bmp = vec![0; sb.bitmap_size as usize];
        self.img.read_at(&mut bmp, sb.bitmap_start as u64)?;
        // Padding bits past the last real block are formatted as set, so
        // zeros count exactly the free blocks.
        let free_blocks = bmp.iter().map(|byte| byte.count_zeros() as u64).sum();

        let slots = sb.n_inodes.min(u16::MAX as u32) as u16;
        let free_inodes = (1..slots)
            .filter(|&inumber| {
                matches!(self.img.read_inode(inumber), Ok(inode) if inode.disk.is_free())
            })
            .count() as u64;

        Ok(FsStats {
            block_size: sb.block_size,
            blocks: sb.n_blocks(),
            free_blocks,
            inodes: sb.n_inodes as u64,
            free_inodes,
            name_max: sb.name_max(),
        })
    }
}
