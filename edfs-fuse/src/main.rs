mod cli;
mod fs;

use std::ffi::{OsStr, OsString};
use std::io;

use clap::Parser;
use edfs::Edfs;
use fuse_mt::FuseMT;

use crate::cli::Cli;
use crate::fs::EdfsFuse;

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let fs = Edfs::open(&cli.image)?;
    log::info!(
        "mounting {} on {}",
        cli.image.display(),
        cli.mount_point.display()
    );

    let mut args: Vec<OsString> = vec!["-o".into(), "fsname=edfs".into()];
    for option in &cli.options {
        args.push("-o".into());
        args.push(OsString::from(option));
    }
    let args: Vec<&OsStr> = args.iter().map(OsString::as_os_str).collect();

    // The engine assumes one operation runs to completion before the
    // next starts; a single dispatch thread keeps that true.
    let result = fuse_mt::mount(FuseMT::new(EdfsFuse::new(fs), 1), &cli.mount_point, &args);
    log::info!("unmounted {}", cli.mount_point.display());
    result
}
