/*!
Proxy core: turn an HTTP request target into a tool invocation and relay its
stdout.

Flow per request (see server.rs):
  request.rs  target -> ArgList          (decode + shell split)
  resolver    program -> executable path (memoized PATH lookup)
  tools.rs    path -> ToolFamily         (append output-forcing args)
  runner.rs   spawn + capture stdout
  server.rs   200 octet-stream, or 404 on any failure
*/

pub mod request;
pub mod runner;
pub mod server;
pub mod tools;

use std::path::PathBuf;
use thiserror::Error;

pub use server::{AppState, serve};

/// Every way a request can fail. None of these leave the connection that
/// produced them; each is answered with a 404.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Decode(#[from] request::DecodeError),
    #[error("invalid prog, can not find '{0}' on your system")]
    ProgramNotFound(String),
    #[error("unsupported tool: {}", .0.display())]
    UnknownTool(PathBuf),
    #[error(transparent)]
    Run(#[from] runner::RunError),
}
