//! The decoded value model.
//!
//! Composite values (lists, maps, records) sit behind `Rc<RefCell<…>>`: a
//! back-reference on the wire clones the handle, so shared nodes stay shared
//! and a container may contain itself. Class definitions are never values;
//! the decoder materializes instances eagerly at every depth.

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::datetime::Timestamp;
use crate::record::Record;

/// Insertion-ordered map container used by [`Value::Map`].
pub type ValueMap = crate::FastIndexMap<MapKey, Value>;

/// One node of a decoded object graph.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    /// 32-bit integer (`I` and its compact tiers).
    Int(i32),
    /// 64-bit integer (`L` and its compact tiers).
    Long(i64),
    /// IEEE 754 double (`D` and its compact tiers).
    Double(f64),
    Date(Timestamp),
    String(Rc<str>),
    Bytes(Rc<[u8]>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<ValueMap>>),
    Record(Rc<RefCell<Record>>),
}

impl Value {
    /// A fresh list node owning `items`.
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// A fresh map node owning `entries`.
    pub fn map(entries: ValueMap) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value's category name, as used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Date(_) => "date",
            Value::String(_) => "string",
            Value::Bytes(_) => "binary",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "object",
        }
    }
}

/// Structural equality; composites first compare by identity, then by
/// content. Two handles to the same node are always equal, which also lets
/// self-referential graphs compare against themselves without recursing
/// forever. Distinct-but-isomorphic cyclic graphs are not supported and will
/// recurse.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Record(a), Value::Record(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(Rc::from(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Value {
        Value::Bytes(Rc::from(v))
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Value {
        Value::Date(v)
    }
}

/// A map key with a total `Eq`/`Hash` contract over all value kinds.
///
/// Primitives, strings, bytes, and dates compare structurally; doubles
/// compare by bit pattern so NaN keys behave consistently. Lists, maps, and
/// records compare by node identity. An `Int` and a `Long` holding the same
/// number are distinct keys, as they are distinct wire encodings.
#[derive(Debug, Clone)]
pub struct MapKey(Value);

impl MapKey {
    pub fn new(value: Value) -> Self {
        MapKey(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for MapKey {
    fn from(value: Value) -> Self {
        MapKey(value)
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &MapKey) -> bool {
        match (&self.0, &other.0) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(&self.0).hash(state);
        match &self.0 {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Date(v) => v.hash(state),
            Value::String(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::List(v) => (Rc::as_ptr(v) as usize).hash(state),
            Value::Map(v) => (Rc::as_ptr(v) as usize).hash(state),
            Value::Record(v) => (Rc::as_ptr(v) as usize).hash(state),
        }
    }
}
