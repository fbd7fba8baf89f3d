//! FUSE adapter: hands path strings to the engine and maps its errors to
//! negative errno values. This is the only place errno exists.

use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, SystemTime};

use edfs::{Edfs, FsError, Stat, StatKind};
use fuse_mt::{
    CallbackResult, CreatedEntry, DirectoryEntry, FileAttr, FileType, FilesystemMT, RequestInfo,
    ResultCreate, ResultEmpty, ResultEntry, ResultOpen, ResultReaddir, ResultSlice, ResultStatfs,
    ResultWrite, Statfs,
};

const TTL: Duration = Duration::from_secs(1);

pub struct EdfsFuse {
    fs: Edfs,
}

impl EdfsFuse {
    pub fn new(fs: Edfs) -> Self {
        Self { fs }
    }
}

fn errno(err: FsError) -> libc::c_int {
    match err {
        FsError::NotFound => libc::ENOENT,
        FsError::NotADirectory => libc::ENOTDIR,
        FsError::IsADirectory => libc::EISDIR,
        FsError::AlreadyExists => libc::EEXIST,
        FsError::DirectoryNotEmpty => libc::ENOTEMPTY,
        FsError::NoSpace => libc::ENOSPC,
        FsError::FileTooBig => libc::EFBIG,
        FsError::InvalidInput => libc::EINVAL,
        FsError::Io => libc::EIO,
    }
}

fn path_str(path: &Path) -> Result<&str, libc::c_int> {
    path.to_str().ok_or(libc::EINVAL)
}

fn join(parent: &Path, name: &OsStr) -> Result<String, libc::c_int> {
    let parent = path_str(parent)?;
    let name = name.to_str().ok_or(libc::EINVAL)?;
    Ok(if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    })
}

/// No timestamps are kept on disk, so everything reports the epoch.
fn attr(stat: &Stat) -> FileAttr {
    let kind = match stat.kind {
        StatKind::Directory => FileType::Directory,
        StatKind::File => FileType::RegularFile,
    };

    FileAttr {
        size: stat.size,
        blocks: 0,
        atime: SystemTime::UNIX_EPOCH,
        mtime: SystemTime::UNIX_EPOCH,
        ctime: SystemTime::UNIX_EPOCH,
        crtime: SystemTime::UNIX_EPOCH,
        kind,
        perm: stat.perm,
        nlink: stat.nlink,
        uid: 0,
        gid: 0,
        rdev: 0,
        flags: 0,
    }
}

impl FilesystemMT for EdfsFuse {
    fn getattr(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>) -> ResultEntry {
        let stat = self.fs.getattr(path_str(path)?).map_err(errno)?;
        Ok((TTL, attr(&stat)))
    }

    // Mode, ownership and times are accepted and dropped; only the
    // path's existence is checked.
    fn chmod(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>, _mode: u32) -> ResultEmpty {
        self.fs.getattr(path_str(path)?).map(|_| ()).map_err(errno)
    }

    fn chown(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: Option<u64>,
        _uid: Option<u32>,
        _gid: Option<u32>,
    ) -> ResultEmpty {
        self.fs.getattr(path_str(path)?).map(|_| ()).map_err(errno)
    }

    fn utimens(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: Option<u64>,
        _atime: Option<SystemTime>,
        _mtime: Option<SystemTime>,
    ) -> ResultEmpty {
        self.fs.getattr(path_str(path)?).map(|_| ()).map_err(errno)
    }

    fn truncate(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>, size: u64) -> ResultEmpty {
        log::debug!("truncate {path:?} to {size}");
        self.fs.truncate(path_str(path)?, size).map_err(errno)
    }

    fn mkdir(&self, _req: RequestInfo, parent: &Path, name: &OsStr, _mode: u32) -> ResultEntry {
        let path = join(parent, name)?;
        log::debug!("mkdir {path}");
        self.fs.mkdir(&path).map_err(errno)?;
        let stat = self.fs.getattr(&path).map_err(errno)?;
        Ok((TTL, attr(&stat)))
    }

    fn rmdir(&self, _req: RequestInfo, parent: &Path, name: &OsStr) -> ResultEmpty {
        let path = join(parent, name)?;
        log::debug!("rmdir {path}");
        self.fs.rmdir(&path).map_err(errno)
    }

    fn create(
        &self,
        _req: RequestInfo,
        parent: &Path,
        name: &OsStr,
        _mode: u32,
        flags: u32,
    ) -> ResultCreate {
        let path = join(parent, name)?;
        log::debug!("create {path}");
        self.fs.create(&path).map_err(errno)?;
        let stat = self.fs.getattr(&path).map_err(errno)?;
        Ok(CreatedEntry {
            ttl: TTL,
            attr: attr(&stat),
            fh: 0,
            flags,
        })
    }

    fn unlink(&self, _req: RequestInfo, parent: &Path, name: &OsStr) -> ResultEmpty {
        let path = join(parent, name)?;
        log::debug!("unlink {path}");
        self.fs.unlink(&path).map_err(errno)
    }

    fn open(&self, _req: RequestInfo, path: &Path, flags: u32) -> ResultOpen {
        self.fs.open_file(path_str(path)?).map_err(errno)?;
        Ok((0, flags))
    }

    fn read(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: u64,
        offset: u64,
        size: u32,
        callback: impl FnOnce(ResultSlice<'_>) -> CallbackResult,
    ) -> CallbackResult {
        let path = match path_str(path) {
            Ok(path) => path,
            Err(err) => return callback(Err(err)),
        };

        let mut buf = vec![0; size as usize];
        match self.fs.read(path, &mut buf, offset) {
            Ok(n) => callback(Ok(&buf[..n])),
            Err(err) => callback(Err(errno(err))),
        }
    }

    fn write(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: u64,
        offset: u64,
        data: Vec<u8>,
        _flags: u32,
    ) -> ResultWrite {
        let n = self.fs.write(path_str(path)?, &data, offset).map_err(errno)?;
        Ok(n as u32)
    }

    fn flush(&self, _req: RequestInfo, _path: &Path, _fh: u64, _lock_owner: u64) -> ResultEmpty {
        Ok(())
    }

    fn release(
        &self,
        _req: RequestInfo,
        _path: &Path,
        _fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> ResultEmpty {
        Ok(())
    }

    fn opendir(&self, _req: RequestInfo, path: &Path, _flags: u32) -> ResultOpen {
        let stat = self.fs.getattr(path_str(path)?).map_err(errno)?;
        if stat.kind != StatKind::Directory {
            return Err(libc::ENOTDIR);
        }
        Ok((0, 0))
    }

    fn readdir(&self, _req: RequestInfo, path: &Path, _fh: u64) -> ResultReaddir {
        let entries = self.fs.readdir(path_str(path)?).map_err(errno)?;
        Ok(entries
            .into_iter()
            .map(|(name, kind)| DirectoryEntry {
                name: name.into(),
                kind: match kind {
                    StatKind::Directory => FileType::Directory,
                    StatKind::File => FileType::RegularFile,
                },
            })
            .collect())
    }

    fn releasedir(&self, _req: RequestInfo, _path: &Path, _fh: u64, _flags: u32) -> ResultEmpty {
        Ok(())
    }

    fn statfs(&self, _req: RequestInfo, _path: &Path) -> ResultStatfs {
        let stats = self.fs.stat_fs().map_err(errno)?;
        Ok(Statfs {
            blocks: stats.blocks,
            bfree: stats.free_blocks,
            bavail: stats.free_blocks,
            files: stats.inodes,
            ffree: stats.free_inodes,
            bsize: stats.block_size as u32,
            namelen: stats.name_max,
            frsize: stats.block_size as u32,
        })
    }
}
