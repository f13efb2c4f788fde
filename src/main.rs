use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;
mod proxy;
mod resolver;
mod utils;

use cmd::{EncodeArgs, ServeArgs};

/// LiveProxy - relay streamlink / youtube-dl output over plain HTTP.
///
/// Command layout:
///   liveproxy serve  [--host H] [--port P] [--timeout SECS] [--config FILE]
///   liveproxy encode [--cmd] [--host H] [--port P] <COMMAND>...
///
/// Request forms (served by `serve`):
///   GET /base64/<urlsafe-base64 command line>/
///   GET /cmd/<percent-encoded command line>/
///
/// The first word of the command line must resolve (via PATH) to a
/// streamlink or youtube-dl family executable. Its stdout becomes the
/// response body; every failure is a 404.
///
/// Global flags / env:
///   -v / -vv        Increase verbosity
///   -q / --quiet    Errors only
///   RUST_LOG        Overrides -v / -q when set
///   LIVEPROXY_HOST / LIVEPROXY_PORT   Fallbacks for --host / --port
///
/// Examples:
///   liveproxy serve --port 53422
///   liveproxy encode "streamlink https://www.example.com/live best"
///   liveproxy encode --cmd "yt-dlp https://video.example/watch?v=abc"
#[derive(Parser, Debug)]
#[command(
    name = "liveproxy",
    version,
    author,
    about = "LiveProxy - serve streamlink / youtube-dl output over plain HTTP",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP proxy
    Serve(ServeArgs),

    /// Print proxy URLs for tool command lines
    Encode(EncodeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    match cli.command {
        Commands::Serve(args) => cmd::execute_serve(args),
        Commands::Encode(args) => cmd::execute_encode(args),
    }
}
