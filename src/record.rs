//! Record values: class-shaped objects decoded from the wire.
//!
//! Records keep their fields as an ordered `(name, value)` list in
//! class-definition order. The builder hands out a shared handle before any
//! field is populated, so a record can be registered for back-references and
//! then reference itself through its own fields.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

/// A named, ordered field→value structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: Rc<str>,
    fields: Vec<(Rc<str>, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<Rc<str>>) -> Self {
        Record { type_name: type_name.into(), fields: Vec::new() }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Shared handle to the type name.
    pub fn type_name_rc(&self) -> Rc<str> {
        Rc::clone(&self.type_name)
    }

    /// Fields in class-definition order.
    pub fn fields(&self) -> &[(Rc<str>, Value)] {
        &self.fields
    }

    /// First field with the given name, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| &**n == name).map(|(_, v)| v)
    }

    /// Appends a field. Order of insertion is the order on the wire.
    pub fn push(&mut self, name: Rc<str>, value: Value) {
        self.fields.push((name, value));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Accumulates a record's fields behind a shareable handle.
///
/// The handle from [`RecordBuilder::handle`] is the same allocation that
/// [`RecordBuilder::finish`] returns, which is what makes self-referential
/// records work: register the handle first, fill fields after.
pub struct RecordBuilder {
    cell: Rc<RefCell<Record>>,
}

impl RecordBuilder {
    pub fn new(type_name: impl Into<Rc<str>>) -> Self {
        RecordBuilder { cell: Rc::new(RefCell::new(Record::new(type_name))) }
    }

    /// A shared handle to the record under construction.
    pub fn handle(&self) -> Rc<RefCell<Record>> {
        Rc::clone(&self.cell)
    }

    pub fn push(&mut self, name: Rc<str>, value: Value) {
        self.cell.borrow_mut().push(name, value);
    }

    pub fn finish(self) -> Rc<RefCell<Record>> {
        self.cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_keep_wire_order() {
        let mut b = RecordBuilder::new("com.example.Point");
        b.push(Rc::from("y"), Value::Int(2));
        b.push(Rc::from("x"), Value::Int(1));
        let record = b.finish();
        let r = record.borrow();
        assert_eq!(r.type_name(), "com.example.Point");
        assert_eq!(&*r.fields()[0].0, "y");
        assert_eq!(&*r.fields()[1].0, "x");
        assert_eq!(r.get("x"), Some(&Value::Int(1)));
        assert_eq!(r.get("missing"), None);
    }

    #[test]
    fn handle_and_finish_share_the_allocation() {
        let mut b = RecordBuilder::new("t");
        let early = b.handle();
        b.push(Rc::from("f"), Value::Null);
        let done = b.finish();
        assert!(Rc::ptr_eq(&early, &done));
        assert_eq!(early.borrow().len(), 1);
    }

    #[test]
    fn self_referential_record() {
        let mut b = RecordBuilder::new("node");
        let handle = b.handle();
        b.push(Rc::from("next"), Value::Record(b.handle()));
        let record = b.finish();
        match &record.borrow().fields()[0].1 {
            Value::Record(inner) => assert!(Rc::ptr_eq(inner, &handle)),
            other => panic!("expected record, got {other:?}"),
        };
    }
}
