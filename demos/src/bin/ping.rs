//! Sends a ping message to an SNFS server and prints the echo.

use clap::Parser;
use demos::ConnectArgs;

#[derive(Debug, Parser)]
#[command(about = "Pings an SNFS server")]
struct Args {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Message to echo off the server.
    message: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let ctx = args.connect.connect_stub().unwrap_or_else(|err| {
        eprintln!("failed to connect: {err}");
        std::process::exit(1);
    });
    match ctx.ping(&args.message) {
        Ok(echoed) => println!("{echoed}"),
        Err(err) => {
            eprintln!("ping failed: {err}");
            std::process::exit(1);
        }
    }
}
