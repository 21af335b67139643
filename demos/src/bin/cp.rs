//! Copies a file to a new path, both resolved on the same remote server.

use clap::Parser;
use demos::ConnectArgs;

#[derive(Debug, Parser)]
#[command(about = "Copies a file on an SNFS server")]
struct Args {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Path of the file to copy.
    src: String,

    /// Path of the new file.
    dst: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let ctx = args.connect.connect_stub().unwrap_or_else(|err| {
        eprintln!("failed to connect: {err}");
        std::process::exit(1);
    });
    if let Err(err) = ctx.copy(&args.src, &args.dst) {
        eprintln!("copy failed: {err}");
        std::process::exit(1);
    }
}
