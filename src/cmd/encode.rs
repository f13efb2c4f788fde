/*!
`encode.rs`

Implements the `encode` subcommand: turn tool command lines into proxy URLs
that a player or IPTV playlist can use directly.

  liveproxy encode "streamlink https://www.example.com/live best"
  -> http://127.0.0.1:53422/base64/c3RyZWFtbGluayBodHRwczovL3d3dy5leGFtcGxlLmNvbS9saXZlIGJlc3Q=/

With --cmd the readable `/cmd/<percent-encoded>/` form is emitted instead.
Each command is shell-split first so a URL that the server would reject is
never printed.
*/

use anyhow::{Context, Result, bail};
use clap::Args;
use shell_words::split as shell_split;

use crate::config::{DEFAULT_HOST, DEFAULT_PORT, host_port};
use crate::proxy::request::{encode_base64, encode_cmd};

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Command line(s) to encode, e.g. "yt-dlp https://... -f best"
    #[arg(value_name = "COMMAND", required = true)]
    pub commands: Vec<String>,

    /// Emit /cmd/ URLs instead of /base64/
    #[arg(long)]
    pub cmd: bool,

    /// Host the URLs should point at
    #[arg(long, env = "LIVEPROXY_HOST", value_name = "HOST")]
    pub host: Option<String>,

    /// Port the URLs should point at
    #[arg(short, long, env = "LIVEPROXY_PORT", value_name = "PORT")]
    pub port: Option<u16>,
}

pub fn execute_encode(args: EncodeArgs) -> Result<()> {
    let host = args.host.as_deref().unwrap_or(DEFAULT_HOST);
    let port = args.port.unwrap_or(DEFAULT_PORT);

    for command in &args.commands {
        println!("{}", proxy_url(host, port, command, args.cmd)?);
    }
    Ok(())
}

/// Full proxy URL for one command line.
pub fn proxy_url(host: &str, port: u16, command: &str, cmd_form: bool) -> Result<String> {
    let parts = shell_split(command)
        .with_context(|| format!("Failed to parse command line: {command}"))?;
    if parts.is_empty() {
        bail!("Empty command line");
    }

    let path = if cmd_form {
        encode_cmd(command)
    } else {
        encode_base64(command)
    };
    Ok(format!("http://{}{}", host_port(host, port), path))
}
