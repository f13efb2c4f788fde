/*!
request.rs - request target decoding.

Two accepted forms:
  /base64/<token>[/...]   token = URL-safe base64 of a shell-quoted command line
  /cmd/<command>[/]       percent-encoded shell-quoted command line

Both end in the same place: a shell-split argument list whose first entry is
the program name. Anything else is a `DecodeError`.
*/

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use shell_words::split as shell_split;
use thiserror::Error;

const BASE64_PREFIX: &str = "/base64/";
const CMD_PREFIX: &str = "/cmd/";

/// URL-safe alphabet; clients are inconsistent about padding, so accept both.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported path: {0}")]
    UnknownRoute(String),
    #[error("invalid base64 token: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("command is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid percent-encoding: {0}")]
    Percent(String),
    #[error("failed to split command line: {0}")]
    Split(#[from] shell_words::ParseError),
    #[error("empty command")]
    Empty,
}

/// Which of the two URL shapes carried the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Base64,
    Cmd,
}

/// Decoded argument list for one request. `program()` is the first token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgList {
    pub encoding: Encoding,
    pub args: Vec<String>,
}

impl ArgList {
    pub fn program(&self) -> &str {
        &self.args[0]
    }

    /// Everything after the program name.
    pub fn rest(&self) -> &[String] {
        &self.args[1..]
    }
}

/// Decode a raw request target (path + optional query, still percent-encoded).
pub fn parse_target(raw: &str) -> Result<ArgList, DecodeError> {
    let (encoding, command) = if raw.starts_with(BASE64_PREFIX) {
        // Second path segment only; anything after it is ignored.
        let token = raw.split('/').nth(2).unwrap_or_default();
        let bytes = URL_SAFE_LENIENT.decode(token)?;
        (Encoding::Base64, String::from_utf8(bytes)?)
    } else if let Some(rest) = raw.strip_prefix(CMD_PREFIX) {
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let decoded =
            urlencoding::decode(rest).map_err(|e| DecodeError::Percent(e.to_string()))?;
        (Encoding::Cmd, decoded.into_owned())
    } else {
        return Err(DecodeError::UnknownRoute(raw.to_string()));
    };

    let args = shell_split(&command)?;
    if args.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(ArgList { encoding, args })
}

/// Build the `/base64/<token>/` path for a command line.
pub fn encode_base64(command: &str) -> String {
    format!(
        "{BASE64_PREFIX}{}/",
        URL_SAFE_LENIENT.encode(command.as_bytes())
    )
}

/// Build the `/cmd/<command>/` path for a command line.
pub fn encode_cmd(command: &str) -> String {
    format!("{CMD_PREFIX}{}/", urlencoding::encode(command))
}
