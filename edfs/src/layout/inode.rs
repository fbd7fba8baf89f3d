use crate::{FsError, FsResult, BLOCK_INVALID, N_DIRECT};

const KIND_MASK: u8 = 0x03;
const FLAG_INDIRECT: u8 = 0x04;

/// What an inode slot holds.
///
/// The on-disk type byte keeps the kind in its two low bits, so a zeroed
/// slot reads back as [`InodeKind::Free`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    #[default]
    Free,
    File,
    Directory,
}

/// On-disk inode.
///
/// `size` counts bytes and only means something for files; directories
/// keep it at zero. `blocks` holds direct data-block pointers, or, when
/// the indirect flag is set, pointers to indirect blocks.
#[derive(Debug, Clone)]
pub struct DiskInode {
    kind: InodeKind,
    indirect: bool,
    pub size: u32,
    pub blocks: [u16; N_DIRECT],
}

/// An inode paired with its table slot; short-lived, built per operation.
#[derive(Debug, Clone)]
pub struct Inode {
    pub inumber: u16,
    pub disk: DiskInode,
}

impl DiskInode {
    /// Encoded size in bytes. Table slots may be larger; the tail is zero.
    pub const SIZE: usize = 18;

    pub fn new(kind: InodeKind) -> Self {
        Self {
            kind,
            indirect: false,
            size: 0,
            blocks: [BLOCK_INVALID; N_DIRECT],
        }
    }

    #[inline]
    pub fn kind(&self) -> InodeKind {
        self.kind
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.kind == InodeKind::Free
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    #[inline]
    pub fn has_indirect(&self) -> bool {
        self.indirect
    }

    /// Flip the layout to indirect. Promotion is one-way.
    #[inline]
    pub fn set_indirect(&mut self) {
        self.indirect = true;
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let kind = match self.kind {
            InodeKind::Free => 0,
            InodeKind::File => 1,
            InodeKind::Directory => 2,
        };
        let mut raw = [0; Self::SIZE];
        raw[0] = kind | if self.indirect { FLAG_INDIRECT } else { 0 };
        // raw[1] reserved
        raw[2..6].copy_from_slice(&self.size.to_le_bytes());
        for (slot, block) in self.blocks.iter().enumerate() {
            raw[6 + slot * 2..8 + slot * 2].copy_from_slice(&block.to_le_bytes());
        }
        raw
    }

    /// Fails with [`FsError::Io`] on a type byte no version ever wrote.
    pub fn decode(raw: &[u8]) -> FsResult<Self> {
        if raw.len() < Self::SIZE {
            return Err(FsError::Io);
        }

        let kind = match raw[0] & KIND_MASK {
            0 => InodeKind::Free,
            1 => InodeKind::File,
            2 => InodeKind::Directory,
            _ => return Err(FsError::Io),
        };

        let mut blocks = [BLOCK_INVALID; N_DIRECT];
        for (slot, block) in blocks.iter_mut().enumerate() {
            *block = u16::from_le_bytes([raw[6 + slot * 2], raw[7 + slot * 2]]);
        }

        Ok(Self {
            kind,
            indirect: raw[0] & FLAG_INDIRECT != 0,
            size: u32::from_le_bytes(raw[2..6].try_into().unwrap()),
            blocks,
        })
    }
}
