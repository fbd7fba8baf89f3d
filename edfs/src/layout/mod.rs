//! # 磁盘数据结构层
//!
//! EdFS 的磁盘布局：
//! 超级块 | 空闲块位图 | 索引节点表 | 数据块区域

mod super_block;
pub use super_block::SuperBlock;

mod inode;
pub use inode::{DiskInode, Inode, InodeKind};

mod dir_entry;
pub use dir_entry::DirEntry;
