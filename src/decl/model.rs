use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use super::{DeclarationKind, Named, RegistryId};
use crate::error::{MdfError, Result};
use crate::registry::Registry;
use crate::trace::Trace;
use crate::types::{Field, FieldType, Value, Visibility};

/// A named entity with typed fields and an optional storage table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    table: Option<String>,
    fields: IndexMap<String, Field>,
    trace: Trace,
    #[serde(skip)]
    registry: Option<RegistryId>,
}

impl Model {
    pub fn new(name: impl Into<String>, table: Option<String>, trace: Trace) -> Self {
        Self {
            name: name.into(),
            table,
            fields: IndexMap::new(),
            trace,
            registry: None,
        }
    }

    /// Add a field. A field with the same name is replaced (last write wins)
    /// and returned.
    pub fn insert_field(&mut self, field: Field) -> Option<Field> {
        self.fields.insert(field.name.clone(), field)
    }

    /// Storage table, `None` when the model is not storage-backed
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn fields(&self) -> &IndexMap<String, Field> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_trace(&self, name: &str) -> Option<&Trace> {
        self.fields.get(name).map(|f| &f.trace)
    }

    pub fn registry(&self) -> Option<RegistryId> {
        self.registry
    }

    pub fn is_bound(&self) -> bool {
        self.registry.is_some()
    }

    pub(crate) fn bind(&mut self, registry: RegistryId) {
        self.registry = Some(registry);
    }

    /// Materialize the model with every field type resolved against `registry`.
    ///
    /// The model itself is left untouched. Field types are rewritten as:
    /// - bare typedef name → the aliased type (typedef chains are followed)
    /// - model name → [`ResolvedType::Reference`]
    /// - enum name → [`ResolvedType::Enumeration`] with the declared values
    /// - anything else → unchanged
    pub fn build(&self, registry: &Registry) -> Result<BuiltModel> {
        match self.registry {
            None => return Err(MdfError::Unbound(self.name.clone())),
            Some(id) if id != registry.id() => {
                return Err(MdfError::ForeignRegistry(self.name.clone()))
            }
            Some(_) => {}
        }

        let fields = self
            .fields
            .iter()
            .map(|(name, field)| {
                let built = BuiltField {
                    name: field.name.clone(),
                    visibility: field.visibility,
                    ty: resolve_field_type(name, &field.ty, registry),
                    default: field.default.clone(),
                    trace: field.trace.clone(),
                };
                (name.clone(), built)
            })
            .collect();

        Ok(BuiltModel {
            name: self.name.clone(),
            table: self.table.clone(),
            trace: self.trace.clone(),
            fields,
        })
    }
}

fn resolve_field_type(field: &str, ty: &FieldType, registry: &Registry) -> ResolvedType {
    let mut current = ty.clone();
    let mut seen = HashSet::new();

    loop {
        if current.is_bare() {
            if let Some(typedef) = registry.typedef(&current.name) {
                if seen.insert(current.name.clone()) {
                    current = typedef.ty().clone();
                    continue;
                }
                // alias cycle
                return ResolvedType::Type(current);
            }
        }

        if registry.has_model(&current.name) {
            return ResolvedType::Reference {
                model: current.name,
                field: field.to_string(),
            };
        }

        if let Some(enumeration) = registry.enum_def(&current.name) {
            return ResolvedType::Enumeration {
                name: current.name,
                values: enumeration.values().to_vec(),
            };
        }

        return ResolvedType::Type(current);
    }
}

impl Named for Model {
    fn name(&self) -> &str {
        &self.name
    }

    fn trace(&self) -> &Trace {
        &self.trace
    }

    fn kind(&self) -> DeclarationKind {
        DeclarationKind::Model
    }
}

/// `model(User) -> users` followed by one line per field
impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model({})", self.name)?;
        if let Some(table) = &self.table {
            write!(f, " -> {}", table)?;
        }
        for field in self.fields.values() {
            write!(f, "\n{}", field)?;
        }
        Ok(())
    }
}

/// Field type after registry resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResolvedType {
    /// Base type, typedef target, or a name left as written
    Type(FieldType),
    /// Field refers to another model
    Reference { model: String, field: String },
    /// Field holds one of the enum's values
    Enumeration { name: String, values: Vec<String> },
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Type(ty) => write!(f, "{}", ty),
            ResolvedType::Reference { model, .. } => write!(f, "ref<{}>", model),
            ResolvedType::Enumeration { values, .. } => write!(f, "enum({})", values.join("|")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltField {
    pub name: String,
    pub visibility: Visibility,
    #[serde(rename = "type")]
    pub ty: ResolvedType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub trace: Trace,
}

/// Fully resolved model description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltModel {
    pub name: String,
    pub table: Option<String>,
    pub trace: Trace,
    pub fields: IndexMap<String, BuiltField>,
}

impl BuiltModel {
    pub fn field(&self, name: &str) -> Option<&BuiltField> {
        self.fields.get(name)
    }
}
