//! Tool family classification.
//!
//! A family pairs a case-insensitive filename pattern with the arguments that
//! force the tool to write media to stdout. Families are plain data; adding
//! one never touches the request flow.

use regex::{Regex, RegexBuilder};
use std::path::Path;

pub const STREAMLINK_PATTERN: &str = r"streamlink";
pub const STREAMLINK_ARGS: &[&str] = &["--stdout", "--loglevel", "none"];

pub const YOUTUBE_DL_PATTERN: &str = r"(?:youtube|yt)[_-]dl(?:p)?";
pub const YOUTUBE_DL_ARGS: &[&str] = &["-o", "-"];

#[derive(Debug, Clone)]
pub struct ToolFamily {
    pub name: String,
    pattern: Regex,
    pub args: Vec<String>,
}

impl ToolFamily {
    /// Compile a family; the pattern is always matched case-insensitively.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: RegexBuilder::new(pattern).case_insensitive(true).build()?,
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    /// Unanchored search over an executable's base filename.
    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// streamlink first, then the youtube-dl family.
pub fn builtin_families() -> Result<Vec<ToolFamily>, regex::Error> {
    Ok(vec![
        ToolFamily::new("streamlink", STREAMLINK_PATTERN, STREAMLINK_ARGS.iter().copied())?,
        ToolFamily::new("youtube-dl", YOUTUBE_DL_PATTERN, YOUTUBE_DL_ARGS.iter().copied())?,
    ])
}

/// First family (in order) whose pattern matches the executable's file name.
pub fn classify<'a>(families: &'a [ToolFamily], program: &Path) -> Option<&'a ToolFamily> {
    let file_name = program.file_name()?.to_string_lossy();
    families.iter().find(|f| f.matches(&file_name))
}
