//! Class definitions (Hessian 2.0 grammar: `class-def`).
//!
//! A definition is written once per stream and referenced by index from every
//! instance. Two definitions with the same name but different field lists are
//! distinct entries; instances always cite an index, so there is no ambiguity.

use std::rc::Rc;

/// An immutable wire schema: a type name plus an ordered field-name list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassDef {
    name: Rc<str>,
    fields: Vec<Rc<str>>,
}

impl ClassDef {
    pub fn new(name: impl Into<Rc<str>>, fields: Vec<Rc<str>>) -> Self {
        ClassDef { name: name.into(), fields }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the name, for building records without re-allocating.
    pub fn name_rc(&self) -> Rc<str> {
        Rc::clone(&self.name)
    }

    /// Field names in wire (declaration) order.
    pub fn fields(&self) -> &[Rc<str>] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, fields: &[&str]) -> ClassDef {
        ClassDef::new(name, fields.iter().map(|f| Rc::from(*f)).collect())
    }

    #[test]
    fn preserves_field_order() {
        let d = def("com.example.Point", &["x", "y"]);
        assert_eq!(d.name(), "com.example.Point");
        assert_eq!(d.field_count(), 2);
        assert_eq!(&*d.fields()[0], "x");
        assert_eq!(&*d.fields()[1], "y");
    }

    #[test]
    fn same_name_different_fields_are_distinct() {
        let a = def("com.example.Point", &["x", "y"]);
        let b = def("com.example.Point", &["x", "y", "z"]);
        assert_ne!(a, b);
    }

    #[test]
    fn zero_field_definition_is_legal() {
        let d = def("marker", &[]);
        assert_eq!(d.field_count(), 0);
        assert!(d.fields().is_empty());
    }
}
