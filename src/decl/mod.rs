//! Declaration value objects
//!
//! A definition source declares three kinds of things: models, enums and
//! typedefs. They form a closed set, so the registry and the CLI match on
//! [`Declaration`] instead of probing for properties.

mod enumeration;
mod model;
mod typedef;

pub use enumeration::Enum;
pub use model::{BuiltField, BuiltModel, Model, ResolvedType};
pub use typedef::TypeDef;

use serde::Serialize;
use std::fmt;

use crate::trace::Trace;

/// Identity of the registry a model is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RegistryId(pub(crate) u64);

/// Which namespace a declaration lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Model,
    Enum,
    TypeDef,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Model => "model",
            DeclarationKind::Enum => "enum",
            DeclarationKind::TypeDef => "typedef",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named declaration that remembers where it was written
pub trait Named {
    fn name(&self) -> &str;
    fn trace(&self) -> &Trace;
    fn kind(&self) -> DeclarationKind;
}

/// Borrowed view over any declaration
#[derive(Debug, Clone, Copy)]
pub enum Declaration<'a> {
    Model(&'a Model),
    Enum(&'a Enum),
    TypeDef(&'a TypeDef),
}

impl Named for Declaration<'_> {
    fn name(&self) -> &str {
        match self {
            Declaration::Model(m) => m.name(),
            Declaration::Enum(e) => e.name(),
            Declaration::TypeDef(t) => t.name(),
        }
    }

    fn trace(&self) -> &Trace {
        match self {
            Declaration::Model(m) => m.trace(),
            Declaration::Enum(e) => e.trace(),
            Declaration::TypeDef(t) => t.trace(),
        }
    }

    fn kind(&self) -> DeclarationKind {
        match self {
            Declaration::Model(_) => DeclarationKind::Model,
            Declaration::Enum(_) => DeclarationKind::Enum,
            Declaration::TypeDef(_) => DeclarationKind::TypeDef,
        }
    }
}

impl fmt::Display for Declaration<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declaration::Model(m) => write!(f, "{}", m),
            Declaration::Enum(e) => write!(f, "{}", e),
            Declaration::TypeDef(t) => write!(f, "{}", t),
        }
    }
}
