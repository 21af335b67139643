//! Creates a directory on a remote server.

use clap::Parser;
use demos::ConnectArgs;

#[derive(Debug, Parser)]
#[command(about = "Creates a directory on an SNFS server")]
struct Args {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Directory path to create.
    path: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut client = args.connect.connect().unwrap_or_else(|err| {
        eprintln!("failed to connect: {err}");
        std::process::exit(1);
    });
    if let Err(err) = client.mkdir(&args.path) {
        eprintln!("mkdir failed: {err}");
        std::process::exit(1);
    }
}
