use std::path::PathBuf;

use clap::Parser;

/// Create an empty EdFS image.
#[derive(Parser)]
#[command(name = "edfs-mkfs")]
pub struct Cli {
    /// Path of the image file to create
    pub image: PathBuf,

    /// Block size in bytes (power of two)
    #[arg(long, default_value_t = 512)]
    pub block_size: u16,

    /// Number of data blocks
    #[arg(long, default_value_t = 2048)]
    pub blocks: u32,

    /// Number of inode-table slots
    #[arg(long, default_value_t = 128)]
    pub inodes: u32,
}
