use std::io;

/// Engine-level failure of a file system operation.
///
/// The host bridge turns these into negative errno values; nothing inside
/// the engine ever looks at an errno.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Path component, inode slot or bitmap bit was not there.
    NotFound,
    NotADirectory,
    IsADirectory,
    AlreadyExists,
    DirectoryNotEmpty,
    /// Inode table, directory or bitmap is full.
    NoSpace,
    /// File grew past what single indirection can address.
    FileTooBig,
    InvalidInput,
    /// Short transfer, corrupt pointer, or a read into a hole.
    Io,
}

pub type FsResult<T> = Result<T, FsError>;

impl From<io::Error> for FsError {
    fn from(_: io::Error) -> Self {
        FsError::Io
    }
}
