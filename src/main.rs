//! `sfs`: mounts a single-file block-device file system at a mount point, backed
//! by a fixed-size file treated as a linear array of disk blocks.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::error;

use sfs::fuse_binding::{self, SfsFuse};
use sfs::volume::Volume;

/// Single-file block-device file system, exposed over FUSE.
#[derive(Parser, Debug)]
#[command(name = "sfs", version, about)]
struct Args {
    /// Path to the backing file (created if it does not already exist).
    device: PathBuf,

    /// Directory to mount the file system at.
    mountpoint: PathBuf,

    /// Keep running in the foreground instead of daemonizing.
    #[arg(short = 'f', long)]
    foreground: bool,

    /// Raise the log level; repeatable (warn -> info -> debug -> trace).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Options passed through verbatim to the FUSE mount (`-o opt1,opt2,...`).
    #[arg(short = 'o', long = "option")]
    options: Vec<String>,
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(args.verbose)),
    )
    .init();

    let volume = match Volume::open(&args.device) {
        Ok(v) => v,
        Err(e) => {
            error!("{}: {e}", args.device.display());
            exit(1);
        }
    };

    let mountpoint = match fuse_binding::absolute(&args.mountpoint) {
        Ok(p) => p,
        Err(e) => {
            error!("{}: {e}", args.mountpoint.display());
            exit(1);
        }
    };

    let fs = SfsFuse::new(volume);
    let fuse_options: Vec<&OsStr> = args.options.iter().map(OsStr::new).collect();

    // `fuse_mt::mount` blocks the calling thread until the file system is
    // unmounted; there is no separate background mode to opt out of, so
    // `-f` is accepted (for parity with the usual FUSE host CLI shape) but
    // otherwise has no effect here.
    if let Err(e) = fuse_mt::mount(fuse_mt::FuseMT::new(fs, 1), &mountpoint, &fuse_options) {
        error!("mount failed: {e}");
        exit(1);
    }
}
