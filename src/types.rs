//! Field-level building blocks shared by the parser, registry and declarations

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::trace::Trace;

/// Built-in type names
pub const BASE_TYPES: [&str; 7] = [
    "string", "boolean", "integer", "decimal", "array", "custom", "ref",
];

pub fn is_base_type(name: &str) -> bool {
    BASE_TYPES.contains(&name)
}

/// A typed literal (field default or type option)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Unresolved type reference as written in source
///
/// `array<custom(Foo)>` is `{ name: "array", parameter: { name: "custom", options: "Foo" } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<Box<FieldType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl FieldType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter: None,
            options: None,
        }
    }

    pub fn with_parameter(mut self, parameter: FieldType) -> Self {
        self.parameter = Some(Box::new(parameter));
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    pub fn is_base(&self) -> bool {
        is_base_type(&self.name)
    }

    /// Plain name with neither a parameter nor options
    pub fn is_bare(&self) -> bool {
        self.parameter.is_none() && self.options.is_none()
    }
}

/// Renders the type the way it is written in source
impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(param) = &self.parameter {
            write!(f, "<{}>", param)?;
        }
        if let Some(options) = &self.options {
            write!(f, "({})", options)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    Secret,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Secret => "secret",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub trace: Trace,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.visibility, self.ty, self.name)?;
        if let Some(default) = &self.default {
            match default {
                Value::String(s) => write!(f, " = {:?}", s)?,
                other => write!(f, " = {}", other)?,
            }
        }
        Ok(())
    }
}
