//! `mkfs`: formats a fresh SNFS disk image and seeds its root directory
//! with the contents of a list of host files, matching the invocation
//! style `mkfs fs.img file1 file2 ...`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use block_io::FileBlockDevice;
use clap::Parser;
use log::info;
use snfs_server::engine::Engine;

/// Default device size for a freshly made image.
const DEFAULT_NUM_BLOCKS: u32 = 1024;

#[derive(Debug, Parser)]
#[command(author, version, about = "Formats an SNFS disk image and seeds it with files")]
struct Args {
    /// Path of the image file to create (or overwrite) and format.
    image: PathBuf,

    /// Host files to copy into the image's root directory, under their
    /// own base name.
    files: Vec<PathBuf>,

    /// Number of blocks in the formatted device.
    #[arg(long, default_value_t = DEFAULT_NUM_BLOCKS)]
    num_blocks: u32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let device = FileBlockDevice::open(&args.image, args.num_blocks, Duration::ZERO).unwrap_or_else(|err| {
        eprintln!("failed to open {:?}: {err}", args.image);
        std::process::exit(1);
    });
    let engine = Engine::new(Box::new(device), true).unwrap_or_else(|err| {
        eprintln!("failed to format {:?}: {err}", args.image);
        std::process::exit(1);
    });
    info!("formatted {:?} ({} blocks)", args.image, args.num_blocks);

    for path in &args.files {
        if let Err(err) = seed_file(&engine, path) {
            eprintln!("failed to seed {path:?}: {err}");
            std::process::exit(1);
        }
    }
}

fn seed_file(engine: &Engine, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let name = path
        .file_name()
        .ok_or("seed path has no file name")?
        .to_str()
        .ok_or("seed path is not valid UTF-8")?;
    let contents = fs::read(path)?;

    let file = engine.create(snfs_types::ROOT_INODE_ID, name)?;
    engine.write(file, 0, &contents)?;
    info!("seeded /{name} ({} bytes)", contents.len());
    Ok(())
}
