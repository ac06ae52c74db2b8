//! mdf - front end for the Model Definition Format
//!
//! Turns definition sources describing models, enums and typedefs into
//! validated, cross-referenced declarations.
//!
//! ```text
//! text → Tokenizer → Parser (+ imports) → ParsedUnit → Registry → Model::build
//! ```
//!
//! # Example
//!
//! ```
//! use mdf::{Registry, ResolvedType};
//!
//! let mut registry = Registry::new();
//! registry
//!     .load_all(&[
//!         "model Post : \"posts\" { public string(120) title; Status status; }",
//!         "enum Status { Draft, Published }",
//!     ])
//!     .unwrap();
//!
//! let post = registry.model("Post").unwrap().build(&registry).unwrap();
//! assert!(matches!(
//!     post.field("status").unwrap().ty,
//!     ResolvedType::Enumeration { .. }
//! ));
//! ```

pub mod config;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod importer;
pub mod parser;
pub mod registry;
pub mod tokenizer;
pub mod trace;
pub mod types;
pub mod validate;

pub use config::MdfConfig;
pub use decl::{
    BuiltField, BuiltModel, Declaration, DeclarationKind, Enum, Model, Named, RegistryId,
    ResolvedType, TypeDef,
};
pub use diagnostics::{format_diagnostics, Diagnostic, DiagnosticCode, DiagnosticKind};
pub use error::{MdfError, Result};
pub use importer::{canonical_path, FsImporter, ImportedSource, Importer};
pub use parser::{parse_source, ParsedUnit, Parser, Redeclaration};
pub use registry::Registry;
pub use tokenizer::{tokenize, Keyword, Symbol, Token, TokenKind, Tokenizer};
pub use trace::Trace;
pub use types::{Field, FieldType, Value, Visibility, BASE_TYPES};
pub use validate::{ValidationMode, ValidationResult, Validator};
