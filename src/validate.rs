//! Semantic validation of parsed declarations
//!
//! One routine serves both load passes. [`ValidationMode::Lazy`] only
//! suppresses the unresolved-type check so that names declared by sources
//! later in a batch do not fail the pre-pass; every structural rule still
//! applies.

use std::collections::HashSet;

use crate::decl::{Enum, Model, Named, TypeDef};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::parser::ParsedUnit;
use crate::types::{is_base_type, Field, FieldType, BASE_TYPES};

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion
const SUGGESTION_THRESHOLD: f64 = 0.8;

// =============================================================================
// MODE AND RESULT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Pre-pass: unresolved types are tolerated
    Lazy,
    /// Full validation
    Strict,
}

impl ValidationMode {
    pub fn is_lazy(self) -> bool {
        self == ValidationMode::Lazy
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: vec![],
        }
    }

    pub fn from_errors(errors: Vec<Diagnostic>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

// =============================================================================
// SCOPE
// =============================================================================

/// Declared names visible to type resolution
#[derive(Debug, Clone, Default)]
pub struct Scope<'a> {
    names: HashSet<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every declaration name of a parsed unit
    pub fn with_unit(mut self, unit: &'a ParsedUnit) -> Self {
        self.extend(unit.models.keys().map(String::as_str));
        self.extend(unit.enums.keys().map(String::as_str));
        self.extend(unit.typedefs.keys().map(String::as_str));
        self
    }

    pub fn extend(&mut self, names: impl IntoIterator<Item = &'a str>) {
        self.names.extend(names);
    }

    /// Base type or declared name
    pub fn resolves(&self, name: &str) -> bool {
        is_base_type(name) || self.names.contains(name)
    }

    /// Closest known name to `input`, if any is similar enough
    pub fn suggest(&self, input: &str) -> Option<&str> {
        BASE_TYPES
            .iter()
            .copied()
            .chain(self.names.iter().copied())
            .map(|candidate| (candidate, strsim::jaro_winkler(input, candidate)))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(candidate, _)| candidate)
    }
}

// =============================================================================
// RULES
// =============================================================================

/// Structural rule for fields whose type is a base type.
/// Returns the error message, or `None` when the field is well formed.
pub fn check_field_shape(field: &Field) -> Option<String> {
    let ty = &field.ty;
    match ty.name.as_str() {
        "string" if ty.options.is_none() => Some(format!(
            "String field `{}` requires length option",
            field.name
        )),
        "array" if field.default.is_some() => {
            Some(format!("Array field `{}` cannot have default", field.name))
        }
        "custom" if ty.parameter.is_some() => Some(format!(
            "Custom field type `{}` cannot have type parameter",
            field.name
        )),
        "custom" if ty.options.is_none() => Some(format!(
            "Custom field type `{}` must specify type as option",
            field.name
        )),
        "ref" if ty.options.is_some() => Some(format!(
            "Model reference field `{}` cannot have options",
            field.name
        )),
        "ref" if ty.parameter.is_none() => Some(format!(
            "Model reference field `{}` must specify model as type parameter",
            field.name
        )),
        _ => None,
    }
}

/// Names in a type expression that do not resolve, outermost first
fn unresolved_names<'t>(ty: &'t FieldType, scope: &Scope<'_>) -> Vec<&'t str> {
    let mut missing = Vec::new();
    let mut current = Some(ty);
    while let Some(ty) = current {
        if !scope.resolves(&ty.name) {
            missing.push(ty.name.as_str());
        }
        current = ty.parameter.as_deref();
    }
    missing
}

fn unresolved_message(name: &str, context: String, scope: &Scope<'_>, suggest: bool) -> String {
    let suggestion = if suggest { scope.suggest(name) } else { None };
    match suggestion {
        Some(candidate) => format!(
            "Unresolved type `{}` in {}, did you mean `{}`?",
            name, context, candidate
        ),
        None => format!("Unresolved type `{}` in {}", name, context),
    }
}

// =============================================================================
// VALIDATOR
// =============================================================================

/// Validates declarations against a scope of known names
pub struct Validator<'a> {
    scope: &'a Scope<'a>,
    mode: ValidationMode,
    suggestions: bool,
}

impl<'a> Validator<'a> {
    pub fn new(scope: &'a Scope<'a>, mode: ValidationMode) -> Self {
        Self {
            scope,
            mode,
            suggestions: true,
        }
    }

    pub fn with_suggestions(mut self, suggestions: bool) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn validate_model(&self, model: &Model) -> Vec<Diagnostic> {
        let mut errors = Vec::new();

        for field in model.fields().values() {
            if let Some(message) = check_field_shape(field) {
                errors.push(Diagnostic::at(
                    DiagnosticCode::InvalidFieldShape,
                    message,
                    &field.trace,
                ));
            }

            if self.mode.is_lazy() {
                continue;
            }

            for name in unresolved_names(&field.ty, self.scope) {
                let context = format!("`{}` (field `{}`)", model.name(), field.name);
                errors.push(Diagnostic::at(
                    DiagnosticCode::UnresolvedType,
                    unresolved_message(name, context, self.scope, self.suggestions),
                    &field.trace,
                ));
            }
        }

        errors
    }

    pub fn validate_enum(&self, enumeration: &Enum) -> Vec<Diagnostic> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (value, trace) in enumeration.values_with_traces() {
            if seen.insert(value) {
                continue;
            }
            let message = format!(
                "Duplicate value `{}` in enum `{}`",
                value,
                enumeration.name()
            );
            let trace = trace.unwrap_or_else(|| enumeration.trace());
            errors.push(Diagnostic::at(
                DiagnosticCode::DuplicateEnumValue,
                message,
                trace,
            ));
        }

        errors
    }

    pub fn validate_typedef(&self, typedef: &TypeDef) -> Vec<Diagnostic> {
        if self.mode.is_lazy() {
            return Vec::new();
        }

        unresolved_names(typedef.ty(), self.scope)
            .into_iter()
            .map(|name| {
                let context = format!("typedef `{}`", typedef.name());
                Diagnostic::at(
                    DiagnosticCode::UnresolvedType,
                    unresolved_message(name, context, self.scope, self.suggestions),
                    typedef.trace(),
                )
            })
            .collect()
    }

    /// Names declared in more than one namespace of the unit
    pub fn check_unit_conflicts(&self, unit: &ParsedUnit) -> Vec<Diagnostic> {
        let mut errors = Vec::new();

        for enumeration in unit.enums.values() {
            if unit.models.contains_key(enumeration.name()) {
                errors.push(conflict(enumeration, "model"));
            }
        }
        for typedef in unit.typedefs.values() {
            if unit.models.contains_key(typedef.name()) {
                errors.push(conflict(typedef, "model"));
            } else if unit.enums.contains_key(typedef.name()) {
                errors.push(conflict(typedef, "enum"));
            }
        }

        errors
    }

    /// Names a source declares twice. Checked in strict mode only, like
    /// duplicates against the registry.
    pub fn check_redeclarations(&self, unit: &ParsedUnit) -> Vec<Diagnostic> {
        if self.mode.is_lazy() {
            return Vec::new();
        }

        unit.redeclared
            .iter()
            .map(|r| {
                Diagnostic::at(
                    DiagnosticCode::DuplicateDeclaration,
                    format!("Duplicate {} `{}`", r.kind, r.name),
                    &r.trace,
                )
            })
            .collect()
    }

    /// Validate a whole unit: redeclarations, name conflicts, enums,
    /// typedefs, then models
    pub fn validate_unit(&self, unit: &ParsedUnit) -> ValidationResult {
        let mut errors = self.check_redeclarations(unit);
        errors.extend(self.check_unit_conflicts(unit));

        for enumeration in unit.enums.values() {
            errors.extend(self.validate_enum(enumeration));
        }
        for typedef in unit.typedefs.values() {
            errors.extend(self.validate_typedef(typedef));
        }
        for model in unit.models.values() {
            errors.extend(self.validate_model(model));
        }

        ValidationResult::from_errors(errors)
    }
}

/// `decl` collides with a declaration of another namespace
pub(crate) fn conflict(decl: &dyn Named, other: &str) -> Diagnostic {
    Diagnostic::at(
        DiagnosticCode::NameConflict,
        format!(
            "Name `{}` of {} is already declared as a {}",
            decl.name(),
            decl.kind(),
            other
        ),
        decl.trace(),
    )
}
