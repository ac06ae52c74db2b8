//! Source location tags attached to declarations and fields

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a declaration, field or enum value was written.
///
/// `line` and `offset` are 1-based; `offset` is the column of the first
/// character of the token the trace was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trace {
    pub line: u32,
    pub offset: u32,
    pub path: Option<String>,
}

impl Trace {
    pub fn new(line: u32, offset: u32, path: Option<String>) -> Self {
        Self { line, offset, path }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}:{}", path, self.line, self.offset),
            None => write!(f, "{}:{}", self.line, self.offset),
        }
    }
}
