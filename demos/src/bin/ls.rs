//! Lists the entries of a remote directory.

use clap::Parser;
use demos::ConnectArgs;

#[derive(Debug, Parser)]
#[command(about = "Lists a directory on an SNFS server")]
struct Args {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Directory path to list.
    #[arg(default_value = "/")]
    path: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut client = args.connect.connect().unwrap_or_else(|err| {
        eprintln!("failed to connect: {err}");
        std::process::exit(1);
    });
    match client.listdir(&args.path) {
        Ok(entries) => {
            for (name, ty) in entries {
                println!("{ty:?}\t{name}");
            }
        }
        Err(err) => {
            eprintln!("listdir failed: {err}");
            std::process::exit(1);
        }
    }
}
