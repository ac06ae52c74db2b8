use serde::Serialize;
use std::fmt;

use super::{DeclarationKind, Named};
use crate::trace::Trace;
use crate::types::FieldType;

/// A named alias for a type expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDef {
    name: String,
    #[serde(rename = "type")]
    ty: FieldType,
    trace: Trace,
}

impl TypeDef {
    pub fn new(name: impl Into<String>, ty: FieldType, trace: Trace) -> Self {
        Self {
            name: name.into(),
            ty,
            trace,
        }
    }

    /// The aliased type
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }
}

impl Named for TypeDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn trace(&self) -> &Trace {
        &self.trace
    }

    fn kind(&self) -> DeclarationKind {
        DeclarationKind::TypeDef
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "typedef({}) -> {}", self.name, self.ty)
    }
}
