use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::Diagnostic;

#[derive(Debug, Error)]
pub enum MdfError {
    #[error("load failed: {} error(s)", .0.len())]
    Load(Vec<Diagnostic>),

    #[error("model `{0}` is not bound to a registry")]
    Unbound(String),

    #[error("model `{0}` is bound to a different registry")]
    ForeignRegistry(String),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MdfError {
    /// Diagnostics carried by a failed load, empty for other variants
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Load(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, MdfError>;
