//! ressian – Hessian 2.0 binary object-graph codec
//!
//! A decoder and encoder for the Hessian 2.0 serialization grammar: every
//! value starts with a tag byte that selects its decode routine, compact
//! tiers fold small payloads into the tag itself, and back-references let a
//! stream carry shared and even cyclic object graphs.
//!
//! # Beispiel
//!
//! ```
//! use ressian::{decode, encode, Value};
//!
//! let bytes = encode(&[Value::Int(42), Value::from("hello")]).unwrap();
//! let values = decode(&bytes).unwrap();
//! assert_eq!(values, vec![Value::Int(42), Value::from("hello")]);
//! ```
//!
//! Decoded composites sit behind `Rc<RefCell<…>>`; a back-reference resolves
//! to the same node it named on the wire:
//!
//! ```
//! use ressian::{decode, Value};
//! use std::rc::Rc;
//!
//! // W Q 0 Z: a variable list whose only element is the list itself.
//! let values = decode(&[0x57, 0x51, 0x90, 0x5A]).unwrap();
//! let Value::List(list) = &values[0] else { unreachable!() };
//! let elements = list.borrow();
//! let Value::List(inner) = &elements[0] else { unreachable!() };
//! assert!(Rc::ptr_eq(inner, list));
//! ```

pub mod class_def;
pub mod cursor;
pub mod datetime;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod record;
mod refs;
pub mod resolver;
pub mod value;

pub use class_def::ClassDef;
pub use datetime::Timestamp;
pub use decoder::{decode, Decoder};
pub use encoder::{encode, Encoder};
pub use error::{Error, Result};
pub use record::{Record, RecordBuilder};
pub use resolver::{CollectionResolvers, ListHandle, ListResolver, MapHandle, MapResolver};
pub use value::{MapKey, Value, ValueMap};

/// Hash map with the fast non-cryptographic `ahash` hasher.
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// Insertion-ordered map with the fast non-cryptographic `ahash` hasher.
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;
