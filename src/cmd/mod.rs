/*!
Subcommand dispatcher module.

Layout:
  src/cmd/
    mod.rs          (this file: module declarations + re-exports)
    serve.rs        (ServeArgs  + execute_serve)
    encode.rs       (EncodeArgs + execute_encode)

Conventions:
  - Each subcommand module exposes exactly one public `execute_*` function
    that returns `anyhow::Result<()>`.
  - Argument structs derive `clap::Args` and are kept minimal.
  - Proxy logic lives in `crate::proxy`; commands only wire it up.
*/

pub mod encode;
pub mod serve;

pub use encode::{EncodeArgs, execute_encode};
pub use serve::{ServeArgs, execute_serve};
