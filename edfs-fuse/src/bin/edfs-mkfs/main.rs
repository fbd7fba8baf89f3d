mod cli;

use std::io;

use clap::Parser;
use edfs::MkfsOptions;

use crate::cli::Cli;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    edfs::mkfs(
        &cli.image,
        &MkfsOptions {
            block_size: cli.block_size,
            blocks: cli.blocks,
            inodes: cli.inodes,
        },
    )?;

    println!(
        "{}: {} blocks of {} bytes, {} inodes",
        cli.image.display(),
        cli.blocks,
        cli.block_size,
        cli.inodes
    );
    Ok(())
}
