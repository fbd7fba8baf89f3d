use std::path::PathBuf;

use clap::Parser;

/// Mount an EdFS image through FUSE.
#[derive(Parser)]
#[command(name = "edfuse")]
pub struct Cli {
    /// File system image to mount
    pub image: PathBuf,

    /// Directory to mount the file system on
    pub mount_point: PathBuf,

    /// Extra mount option handed to the FUSE session (repeatable)
    #[arg(short = 'o', long = "option")]
    pub options: Vec<String>,
}
