//! Path resolution: walks slash-separated components from the root
//! inode. Paths are absolute; repeated and trailing slashes are
//! tolerated.

use crate::layout::Inode;
use crate::{dir, FsError, FsResult, Image, FILENAME_MAX};

/// Resolve `path` to its inode. Anything that fails the walk (a missing
/// component, an overlong component, a file in directory position) reads
/// as [`FsError::NotFound`], matching what a lookup through a broken
/// path should report.
pub fn find_inode(img: &Image, path: &str) -> FsResult<Inode> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(FsError::NotFound);
    }

    let mut current = img.root_inode()?;
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if component.len() >= FILENAME_MAX {
            return Err(FsError::NotFound);
        }

        let inumber = match dir::lookup(img, &current, component) {
            Ok(Some(inumber)) => inumber,
            Ok(None) | Err(FsError::NotADirectory) => return Err(FsError::NotFound),
            Err(err) => return Err(err),
        };
        current = img.read_inode(inumber)?;
    }

    Ok(current)
}

/// Inode of the directory containing `path`'s final component.
/// `"/"` has no parent and is [`FsError::InvalidInput`].
pub fn parent_inode(img: &Image, path: &str) -> FsResult<Inode> {
    let trimmed = path.trim_end_matches('/');
    let Some((parent, _)) = trimmed.rsplit_once('/') else {
        return Err(FsError::InvalidInput);
    };

    if parent.is_empty() {
        img.root_inode()
    } else {
        find_inode(img, parent)
    }
}

/// Final component of `path`, trailing slashes dropped; `None` when
/// nothing remains (the root, or a relative path).
pub fn basename(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let (_, name) = trimmed.rsplit_once('/')?;
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::basename;

    #[test]
    fn basename_of_plain_paths() {
        assert_eq!(basename("/a.txt"), Some("a.txt"));
        assert_eq!(basename("/sub/dir/file"), Some("file"));
    }

    #[test]
    fn basename_tolerates_trailing_slashes() {
        assert_eq!(basename("/sub/dir/"), Some("dir"));
        assert_eq!(basename("/sub/dir///"), Some("dir"));
    }

    #[test]
    fn basename_of_degenerate_paths() {
        assert_eq!(basename("/"), None);
        assert_eq!(basename(""), None);
        assert_eq!(basename("relative"), None);
    }
}
