//! End-to-end operation tests over freshly formatted images.

use std::path::PathBuf;

use edfs::{Edfs, FsError, MkfsOptions, StatKind, BLOCK_INVALID, N_DIRECT};

/// Format a fresh image under the system temp dir and open it.
fn open_fresh(name: &str, opts: &MkfsOptions) -> (Edfs, PathBuf) {
    let path = std::env::temp_dir().join(name);
    std::fs::remove_file(&path).ok();
    edfs::mkfs(&path, opts).unwrap();
    (Edfs::open(&path).unwrap(), path)
}

fn read_region(fs: &Edfs, start: u64, len: usize) -> Vec<u8> {
    let mut buf = vec![0; len];
    fs.image().read_at(&mut buf, start).unwrap();
    buf
}

/// Bitmap plus inode table: everything allocation state lives in.
fn allocation_state(fs: &Edfs) -> Vec<u8> {
    let sb = fs.image().sb();
    let mut state = read_region(fs, sb.bitmap_start as u64, sb.bitmap_size as usize);
    state.extend(read_region(
        fs,
        sb.inode_table_start as u64,
        (sb.n_inodes * sb.inode_size as u32) as usize,
    ));
    state
}

fn decode_ptrs(raw: &[u8]) -> Vec<u16> {
    raw.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[test]
fn small_file_round_trip() {
    let (fs, path) = open_fresh("edfs_small_file.img", &MkfsOptions::default());

    fs.create("/a.txt").unwrap();
    assert_eq!(fs.write("/a.txt", b"abc\n", 0).unwrap(), 4);
    assert_eq!(fs.getattr("/a.txt").unwrap().size, 4);

    let mut buf = [0; 4];
    assert_eq!(fs.read("/a.txt", &mut buf, 0).unwrap(), 4);
    assert_eq!(&buf, b"abc\n");

    // A larger buffer still only yields the file.
    let mut buf = [0; 10];
    assert_eq!(fs.read("/a.txt", &mut buf, 0).unwrap(), 4);

    // Reading at or past the end is not an error.
    assert_eq!(fs.read("/a.txt", &mut buf, 4).unwrap(), 0);
    assert_eq!(fs.read("/a.txt", &mut buf, 100).unwrap(), 0);

    std::fs::remove_file(path).ok();
}

#[test]
fn truncate_up_and_down() {
    let (fs, path) = open_fresh("edfs_truncate.img", &MkfsOptions::default());

    // Creating the file also allocates the root directory's entry block;
    // baseline the free count after that.
    fs.create("/t").unwrap();
    let free_before = fs.stat_fs().unwrap().free_blocks;

    fs.truncate("/t", 1000).unwrap();
    assert_eq!(fs.getattr("/t").unwrap().size, 1000);

    // Growing only ensures the last block; block 0 stays a hole.
    assert_eq!(fs.stat_fs().unwrap().free_blocks, free_before - 1);
    let mut buf = [0; 5];
    assert_eq!(fs.read("/t", &mut buf, 995).unwrap(), 5);
    assert_eq!(fs.read("/t", &mut buf, 100), Err(FsError::Io));

    fs.truncate("/t", 10).unwrap();
    assert_eq!(fs.getattr("/t").unwrap().size, 10);
    assert_eq!(fs.stat_fs().unwrap().free_blocks, free_before);

    std::fs::remove_file(path).ok();
}

#[test]
fn indirect_promotion() {
    // BS = 512, N_DIRECT = 6: 3072 bytes exactly fill the direct range.
    let (fs, path) = open_fresh("edfs_promotion.img", &MkfsOptions::default());

    fs.create("/big").unwrap();
    let data = vec![0xAB; 6 * 512];
    assert_eq!(fs.write("/big", &data, 0).unwrap(), data.len());

    let inumber = fs.getattr("/big").unwrap().inumber;
    let direct = fs.image().read_inode(inumber).unwrap();
    assert!(!direct.disk.has_indirect());
    assert!(direct.disk.blocks.iter().all(|&b| b != BLOCK_INVALID));

    // One byte past the direct capacity flips the layout.
    assert_eq!(fs.write("/big", &[0xCD], 3072).unwrap(), 1);

    let promoted = fs.image().read_inode(inumber).unwrap();
    assert!(promoted.disk.has_indirect());
    assert_ne!(promoted.disk.blocks[0], BLOCK_INVALID);
    assert!(promoted.disk.blocks[1..].iter().all(|&b| b == BLOCK_INVALID));

    let ptrs = decode_ptrs(&fs.image().read_block(promoted.disk.blocks[0]).unwrap());
    assert_eq!(ptrs[..N_DIRECT], direct.disk.blocks[..]);
    assert_ne!(ptrs[N_DIRECT], BLOCK_INVALID);
    assert!(ptrs[N_DIRECT + 1..].iter().all(|&p| p == BLOCK_INVALID));

    // The whole file reads back through the new layout.
    let mut buf = vec![0; 3073];
    assert_eq!(fs.read("/big", &mut buf, 0).unwrap(), 3073);
    assert_eq!(&buf[..3072], &data[..]);
    assert_eq!(buf[3072], 0xCD);

    std::fs::remove_file(path).ok();
}

#[test]
fn directory_overflow() {
    // 8 entries per 512-byte block, 6 blocks: 48 slots per directory.
    let (fs, path) = open_fresh(
        "edfs_dir_overflow.img",
        &MkfsOptions {
            inodes: 64,
            ..MkfsOptions::default()
        },
    );

    fs.mkdir("/d").unwrap();
    for n in 0..48 {
        fs.create(&format!("/d/f{n}")).unwrap();
    }

    let inumber = fs.getattr("/d").unwrap().inumber;
    let dir = fs.image().read_inode(inumber).unwrap();
    assert!(dir.disk.blocks.iter().all(|&b| b != BLOCK_INVALID));

    assert_eq!(fs.create("/d/overflow"), Err(FsError::NoSpace));

    // 48 user entries plus "." and "..".
    assert_eq!(fs.readdir("/d").unwrap().len(), 50);

    std::fs::remove_file(path).ok();
}

#[test]
fn rmdir_refuses_non_empty() {
    let (fs, path) = open_fresh("edfs_rmdir.img", &MkfsOptions::default());

    fs.mkdir("/d").unwrap();
    fs.create("/d/x").unwrap();
    assert_eq!(fs.rmdir("/d"), Err(FsError::DirectoryNotEmpty));

    fs.unlink("/d/x").unwrap();
    fs.rmdir("/d").unwrap();
    assert_eq!(fs.getattr("/d"), Err(FsError::NotFound));

    std::fs::remove_file(path).ok();
}

#[test]
fn unlink_restores_allocation_state() {
    let (fs, path) = open_fresh("edfs_unlink.img", &MkfsOptions::default());

    // First create ever allocates the root directory's entry block, and
    // entry removal never gives blocks back; settle that before taking
    // the baseline.
    fs.create("/prime").unwrap();
    fs.unlink("/prime").unwrap();
    let before = allocation_state(&fs);

    // 20 KiB spans 40 blocks, well past the direct range.
    fs.create("/big").unwrap();
    let data = vec![0x5A; 20 * 1024];
    assert_eq!(fs.write("/big", &data, 0).unwrap(), data.len());
    assert_ne!(allocation_state(&fs), before);

    fs.unlink("/big").unwrap();
    assert_eq!(allocation_state(&fs), before);

    std::fs::remove_file(path).ok();
}

#[test]
fn mkdir_rmdir_restores_allocation_state() {
    let (fs, path) = open_fresh("edfs_mkdir_rmdir.img", &MkfsOptions::default());

    fs.create("/prime").unwrap();
    fs.unlink("/prime").unwrap();
    let before = allocation_state(&fs);

    fs.mkdir("/d").unwrap();
    fs.rmdir("/d").unwrap();
    assert_eq!(allocation_state(&fs), before);

    std::fs::remove_file(path).ok();
}

#[test]
fn readdir_lists_dot_entries_first() {
    let (fs, path) = open_fresh("edfs_readdir.img", &MkfsOptions::default());

    fs.mkdir("/sub").unwrap();
    fs.create("/sub/file").unwrap();

    let entries = fs.readdir("/sub").unwrap();
    assert_eq!(entries[0], (".".to_owned(), StatKind::Directory));
    assert_eq!(entries[1], ("..".to_owned(), StatKind::Directory));
    assert_eq!(entries[2], ("file".to_owned(), StatKind::File));

    assert_eq!(fs.readdir("/sub/file"), Err(FsError::NotADirectory));

    std::fs::remove_file(path).ok();
}

#[test]
fn getattr_modes() {
    let (fs, path) = open_fresh("edfs_getattr.img", &MkfsOptions::default());

    let root = fs.getattr("/").unwrap();
    assert_eq!(root.kind, StatKind::Directory);
    assert_eq!(root.perm, 0o755);
    assert_eq!(root.nlink, 2);

    fs.mkdir("/d").unwrap();
    fs.create("/f").unwrap();
    assert_eq!(fs.getattr("/d").unwrap().perm, 0o770);
    assert_eq!(fs.getattr("/f").unwrap().perm, 0o660);
    assert_eq!(fs.getattr("/f").unwrap().nlink, 1);
    assert_eq!(fs.getattr("/missing"), Err(FsError::NotFound));

    std::fs::remove_file(path).ok();
}

#[test]
fn create_rejects_duplicates_and_bad_names() {
    let (fs, path) = open_fresh("edfs_create_errors.img", &MkfsOptions::default());

    fs.create("/f").unwrap();
    assert_eq!(fs.create("/f"), Err(FsError::AlreadyExists));
    assert_eq!(fs.mkdir("/f"), Err(FsError::AlreadyExists));

    // 60 bytes and longer cannot be stored with a terminating NUL.
    let long = format!("/{}", "x".repeat(60));
    assert_eq!(fs.create(&long), Err(FsError::InvalidInput));

    // Creating below a file fails on the parent check; a longer walk
    // through a file never finds the component.
    assert_eq!(fs.create("/f/child"), Err(FsError::NotADirectory));
    assert_eq!(fs.create("/f/deeper/child"), Err(FsError::NotFound));

    std::fs::remove_file(path).ok();
}

#[test]
fn unlink_and_open_reject_wrong_kinds() {
    let (fs, path) = open_fresh("edfs_kind_errors.img", &MkfsOptions::default());

    fs.mkdir("/d").unwrap();
    fs.create("/f").unwrap();

    assert_eq!(fs.unlink("/d"), Err(FsError::IsADirectory));
    assert_eq!(fs.rmdir("/f"), Err(FsError::NotADirectory));
    assert_eq!(fs.open_file("/d"), Err(FsError::IsADirectory));
    fs.open_file("/f").unwrap();

    let mut buf = [0; 1];
    assert_eq!(fs.read("/d", &mut buf, 0), Err(FsError::IsADirectory));
    assert_eq!(fs.write("/d", &buf, 0), Err(FsError::IsADirectory));

    std::fs::remove_file(path).ok();
}

#[test]
fn write_at_offset_leaves_a_hole() {
    let (fs, path) = open_fresh("edfs_hole_write.img", &MkfsOptions::default());

    fs.create("/sparse").unwrap();
    // Skip block 0 entirely; only block 2 gets data.
    assert_eq!(fs.write("/sparse", b"tail", 1200).unwrap(), 4);
    assert_eq!(fs.getattr("/sparse").unwrap().size, 1204);

    let mut buf = [0; 4];
    assert_eq!(fs.read("/sparse", &mut buf, 1200).unwrap(), 4);
    assert_eq!(&buf, b"tail");
    assert_eq!(fs.read("/sparse", &mut buf, 0), Err(FsError::Io));

    std::fs::remove_file(path).ok();
}

#[test]
fn trailing_slashes_resolve() {
    let (fs, path) = open_fresh("edfs_slashes.img", &MkfsOptions::default());

    fs.mkdir("/d").unwrap();
    assert_eq!(fs.getattr("/d/").unwrap().kind, StatKind::Directory);
    assert_eq!(fs.readdir("/d//").unwrap().len(), 2);

    std::fs::remove_file(path).ok();
}

#[test]
fn file_growth_is_capped() {
    let (fs, path) = open_fresh("edfs_efbig.img", &MkfsOptions::default());

    fs.create("/f").unwrap();
    let max = fs.image().sb().max_file_size();
    assert_eq!(fs.truncate("/f", max + 1), Err(FsError::FileTooBig));

    std::fs::remove_file(path).ok();
}

#[test]
fn stat_fs_tracks_usage() {
    let (fs, path) = open_fresh("edfs_statfs.img", &MkfsOptions::default());

    let fresh = fs.stat_fs().unwrap();
    assert_eq!(fresh.blocks, 2048);
    assert_eq!(fresh.free_blocks, 2048);
    assert_eq!(fresh.inodes, 128);
    // Slot 0 is reserved, the root is in use.
    assert_eq!(fresh.free_inodes, 126);

    fs.create("/f").unwrap();
    fs.write("/f", &[0; 512], 0).unwrap();
    let used = fs.stat_fs().unwrap();
    // One block for the root directory's entries, one for the file data.
    assert_eq!(used.free_blocks, 2046);
    assert_eq!(used.free_inodes, 125);

    std::fs::remove_file(path).ok();
}
