//! Directory store: fixed-size entry slots spread over a directory's
//! direct data blocks, in pointer-array order then slot order. Removal
//! zeroes an entry in place; blocks that become entirely empty are never
//! given back.

use std::ops::ControlFlow;

use crate::layout::{DirEntry, Inode};
use crate::{bitmap, FsError, FsResult, Image, BLOCK_INVALID, FILENAME_MAX};

/// Walk every non-empty entry. `step` returning `Break` stops the scan
/// and surfaces the value; reaching the end yields `None`.
pub fn scan<T>(
    img: &Image,
    dir: &Inode,
    mut step: impl FnMut(&DirEntry) -> ControlFlow<T>,
) -> FsResult<Option<T>> {
    if !dir.disk.is_directory() {
        return Err(FsError::NotADirectory);
    }

    let per_block = img.sb().entries_per_block();
    for &block in &dir.disk.blocks {
        if block == BLOCK_INVALID {
            continue;
        }

        let raw = img.read_block(block)?;
        for slot in 0..per_block {
            let entry = DirEntry::decode(&raw[slot * DirEntry::SIZE..]);
            if entry.is_empty() {
                continue;
            }
            if let ControlFlow::Break(value) = step(&entry) {
                return Ok(Some(value));
            }
        }
    }

    Ok(None)
}

/// Inumber of the entry named `name`, if present.
pub fn lookup(img: &Image, dir: &Inode, name: &str) -> FsResult<Option<u16>> {
    scan(img, dir, |entry| {
        if entry.name() == name {
            ControlFlow::Break(entry.inumber)
        } else {
            ControlFlow::Continue(())
        }
    })
}

pub fn is_empty(img: &Image, dir: &Inode) -> FsResult<bool> {
    Ok(scan(img, dir, |_| ControlFlow::Break(()))?.is_none())
}

/// Insert `name` → `inumber`. First pass reuses an empty slot in an
/// existing block; otherwise a fresh block goes into a free pointer
/// slot. Name uniqueness is the caller's business.
pub fn add_entry(img: &Image, dir: &mut Inode, name: &str, inumber: u16) -> FsResult<()> {
    if !dir.disk.is_directory() {
        return Err(FsError::NotADirectory);
    }
    if name.len() >= FILENAME_MAX {
        return Err(FsError::InvalidInput);
    }

    let entry = DirEntry::new(name, inumber);
    let per_block = img.sb().entries_per_block();

    for &block in &dir.disk.blocks {
        if block == BLOCK_INVALID {
            continue;
        }

        let mut raw = img.read_block(block)?;
        for slot in 0..per_block {
            let at = slot * DirEntry::SIZE;
            if DirEntry::decode(&raw[at..]).is_empty() {
                raw[at..at + DirEntry::SIZE].copy_from_slice(&entry.encode());
                return img.write_block(block, &raw);
            }
        }
    }

    let Some(free_slot) = dir.disk.blocks.iter().position(|&b| b == BLOCK_INVALID) else {
        return Err(FsError::NoSpace);
    };

    let block = bitmap::alloc(img)?;
    let mut raw = vec![0; img.sb().block_size as usize];
    raw[..DirEntry::SIZE].copy_from_slice(&entry.encode());
    img.write_block(block, &raw)?;

    dir.disk.blocks[free_slot] = block;
    img.write_inode(dir)
}

/// Zero the entry whose inumber matches, in place.
pub fn remove_entry(img: &Image, dir: &Inode, inumber: u16) -> FsResult<()> {
    if !dir.disk.is_directory() {
        return Err(FsError::NotADirectory);
    }

    let per_block = img.sb().entries_per_block();
    for &block in &dir.disk.blocks {
        if block == BLOCK_INVALID {
            continue;
        }

        let mut raw = img.read_block(block)?;
        for slot in 0..per_block {
            let at = slot * DirEntry::SIZE;
            let entry = DirEntry::decode(&raw[at..]);
            if !entry.is_empty() && entry.inumber == inumber {
                raw[at..at + DirEntry::SIZE].fill(0);
                return img.write_block(block, &raw);
            }
        }
    }

    log::warn!("directory {}: no entry for inode {}", dir.inumber, inumber);
    Err(FsError::Io)
}
