use serde::Serialize;
use std::fmt;

use super::{DeclarationKind, Named};
use crate::trace::Trace;

/// An ordered set of identifier values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enum {
    name: String,
    values: Vec<String>,
    #[serde(skip)]
    value_traces: Vec<Trace>,
    trace: Trace,
}

impl Enum {
    /// `value_traces` is parallel to `values`
    pub fn new(
        name: impl Into<String>,
        values: Vec<String>,
        value_traces: Vec<Trace>,
        trace: Trace,
    ) -> Self {
        Self {
            name: name.into(),
            values,
            value_traces,
            trace,
        }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn has_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Where a value was declared (first occurrence)
    pub fn value_trace(&self, value: &str) -> Option<&Trace> {
        self.values
            .iter()
            .position(|v| v == value)
            .and_then(|i| self.value_traces.get(i))
    }

    /// Values paired with their traces, in declared order
    pub fn values_with_traces(&self) -> impl Iterator<Item = (&str, Option<&Trace>)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.as_str(), self.value_traces.get(i)))
    }
}

impl Named for Enum {
    fn name(&self) -> &str {
        &self.name
    }

    fn trace(&self) -> &Trace {
        &self.trace
    }

    fn kind(&self) -> DeclarationKind {
        DeclarationKind::Enum
    }
}

impl fmt::Display for Enum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enum({}) {{ {} }}", self.name, self.values.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role() -> Enum {
        Enum::new(
            "Role",
            vec!["Admin".into(), "Member".into()],
            vec![Trace::new(2, 5, None), Trace::new(3, 5, None)],
            Trace::new(1, 1, None),
        )
    }

    #[test]
    fn test_value_trace() {
        let e = role();
        assert_eq!(e.value_trace("Member"), Some(&Trace::new(3, 5, None)));
        assert!(e.value_trace("Guest").is_none());
    }

    #[test]
    fn test_has_value_and_display() {
        let e = role();
        assert!(e.has_value("Admin"));
        assert!(!e.has_value("admin"));
        assert_eq!(e.to_string(), "enum(Role) { Admin, Member }");
        assert_eq!(e.values_with_traces().count(), 2);
    }
}
