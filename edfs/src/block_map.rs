//! Maps logical block indices of an inode to physical data blocks.
//!
//! A file starts with the six direct pointers in its inode. The first
//! write past that capacity promotes it: one indirect block is allocated,
//! the direct pointers move into its first six slots (keeping their
//! logical positions), and from then on every inode pointer names an
//! indirect block of `block_size / 2` data pointers.
//!
//! Allocation order everywhere: bitmap bit first, block content second,
//! the link (inode or indirect slot) last. A crash in between leaks a
//! block instead of double-allocating one.

use crate::layout::{DiskInode, Inode};
use crate::{bitmap, FsError, FsResult, Image, BLOCK_INVALID, N_DIRECT};

/// Physical block backing logical block `index`, or `None` for a hole.
///
/// An index outside what the inode's layout can address is corruption
/// (the size invariant should have prevented it) and comes back as `Io`.
pub fn lookup(img: &Image, inode: &DiskInode, index: u64) -> FsResult<Option<u16>> {
    if !inode.has_indirect() {
        if index >= N_DIRECT as u64 {
            return Err(FsError::Io);
        }
        let block = inode.blocks[index as usize];
        return Ok((block != BLOCK_INVALID).then_some(block));
    }

    let per = img.sb().ptrs_per_indirect() as u64;
    let slot = index / per;
    if slot >= N_DIRECT as u64 {
        return Err(FsError::Io);
    }

    let indirect = inode.blocks[slot as usize];
    if indirect == BLOCK_INVALID {
        return Ok(None);
    }

    let block = read_indirect(img, indirect)?[(index % per) as usize];
    Ok((block != BLOCK_INVALID).then_some(block))
}

/// Translate a byte offset to `(physical block, offset within block)`.
/// The offset must fall inside the file; a hole reads as [`FsError::Io`].
pub fn translate(img: &Image, inode: &DiskInode, offset: u64) -> FsResult<(u16, u64)> {
    if offset >= inode.size as u64 {
        return Err(FsError::InvalidInput);
    }

    let bs = img.sb().block_size as u64;
    let block = lookup(img, inode, offset / bs)?.ok_or(FsError::Io)?;
    Ok((block, offset % bs))
}

/// Make logical block `index` exist, allocating data blocks (and the
/// indirect machinery) as needed, and return its physical number. The
/// inode is written back whenever it changes.
pub fn ensure(img: &Image, inode: &mut Inode, index: u64) -> FsResult<u16> {
    if !inode.disk.has_indirect() {
        if index < N_DIRECT as u64 {
            let slot = index as usize;
            if inode.disk.blocks[slot] == BLOCK_INVALID {
                inode.disk.blocks[slot] = bitmap::alloc(img)?;
                img.write_inode(inode)?;
            }
            return Ok(inode.disk.blocks[slot]);
        }
        promote(img, inode)?;
    }

    let per = img.sb().ptrs_per_indirect() as u64;
    let slot = index / per;
    let within = (index % per) as usize;
    if slot >= N_DIRECT as u64 {
        return Err(FsError::FileTooBig);
    }
    let slot = slot as usize;

    if inode.disk.blocks[slot] == BLOCK_INVALID {
        let indirect = bitmap::alloc(img)?;
        img.write_block(indirect, &vec![0xFF; img.sb().block_size as usize])?;
        inode.disk.blocks[slot] = indirect;
        img.write_inode(inode)?;
    }

    let indirect = inode.disk.blocks[slot];
    let mut ptrs = read_indirect(img, indirect)?;
    if ptrs[within] == BLOCK_INVALID {
        ptrs[within] = bitmap::alloc(img)?;
        write_indirect(img, indirect, &ptrs)?;
    }

    Ok(ptrs[within])
}

/// Free the backing of logical block `index` and unlink its pointer.
/// Holes are left alone. Returns the freed block, if any. The caller is
/// responsible for writing the inode back.
pub fn release(img: &Image, inode: &mut Inode, index: u64) -> FsResult<Option<u16>> {
    if !inode.disk.has_indirect() {
        if index >= N_DIRECT as u64 {
            return Err(FsError::Io);
        }
        let slot = index as usize;
        let block = inode.disk.blocks[slot];
        if block == BLOCK_INVALID {
            return Ok(None);
        }
        bitmap::free(img, block)?;
        inode.disk.blocks[slot] = BLOCK_INVALID;
        return Ok(Some(block));
    }

    let per = img.sb().ptrs_per_indirect() as u64;
    let slot = index / per;
    if slot >= N_DIRECT as u64 {
        return Err(FsError::Io);
    }

    let indirect = inode.disk.blocks[slot as usize];
    if indirect == BLOCK_INVALID {
        return Ok(None);
    }

    let within = (index % per) as usize;
    let mut ptrs = read_indirect(img, indirect)?;
    let block = ptrs[within];
    if block == BLOCK_INVALID {
        return Ok(None);
    }

    bitmap::free(img, block)?;
    ptrs[within] = BLOCK_INVALID;
    write_indirect(img, indirect, &ptrs)?;
    Ok(Some(block))
}

/// One-time direct → indirect conversion.
fn promote(img: &Image, inode: &mut Inode) -> FsResult<()> {
    let bs = img.sb().block_size as usize;
    let indirect = bitmap::alloc(img)?;

    // All-ones fill so every slot past the copied pointers is INVALID.
    let mut raw = vec![0xFF; bs];
    for (slot, block) in inode.disk.blocks.iter().enumerate() {
        raw[slot * 2..slot * 2 + 2].copy_from_slice(&block.to_le_bytes());
    }
    img.write_block(indirect, &raw)?;

    inode.disk.blocks = [BLOCK_INVALID; N_DIRECT];
    inode.disk.blocks[0] = indirect;
    inode.disk.set_indirect();
    img.write_inode(inode)
}

pub(crate) fn read_indirect(img: &Image, block: u16) -> FsResult<Vec<u16>> {
    let raw = img.read_block(block)?;
    Ok(raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

fn write_indirect(img: &Image, block: u16, ptrs: &[u16]) -> FsResult<()> {
    let mut raw = Vec::with_capacity(ptrs.len() * 2);
    for ptr in ptrs {
        raw.extend_from_slice(&ptr.to_le_bytes());
    }
    img.write_block(block, &raw)
}
