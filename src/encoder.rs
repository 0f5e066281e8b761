//! Encoder producing the Hessian 2.0 wire format from a value graph.
//!
//! Scalars are written in their smallest tier. Composite nodes are tracked by
//! identity; meeting one a second time emits a back-reference instead of
//! re-serializing it, which both deduplicates shared nodes and terminates on
//! cycles. Registration happens before a node's contents are written, in the
//! same order the decoder assigns its table indices.
//!
//! The value model does not retain typed-list/typed-map type names, so the
//! encoder emits the untyped container forms.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crate::record::Record;
use crate::value::Value;
use crate::{Error, FastHashMap, Result};

/// Maximum chunk payload, in code points (strings) or bytes (binaries).
const MAX_CHUNK: usize = 0xFFFF;

/// A class definition's interning key: name plus exact field list.
#[derive(PartialEq, Eq, Hash)]
struct ClassKey {
    name: Rc<str>,
    fields: Vec<Rc<str>>,
}

/// Encodes values onto any `Write` sink.
///
/// Like the decoder, an encoder owns its reference tables and serves one
/// stream; the tables carry over between values written to the same sink.
pub struct Encoder<W> {
    sink: W,
    // Composite node identity (allocation address) -> object table index.
    object_refs: FastHashMap<usize, i32>,
    class_defs: FastHashMap<ClassKey, i32>,
}

impl<W: Write> Encoder<W> {
    pub fn new(sink: W) -> Self {
        Encoder {
            sink,
            object_refs: FastHashMap::default(),
            class_defs: FastHashMap::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Encodes one value, including everything reachable from it.
    pub fn encode_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.put(&[0x4E]),
            Value::Bool(true) => self.put(&[0x54]),
            Value::Bool(false) => self.put(&[0x46]),
            Value::Int(v) => self.encode_int(*v),
            Value::Long(v) => self.encode_long(*v),
            Value::Double(v) => self.encode_double(*v),
            Value::Date(t) => match t.as_minutes() {
                Some(minutes) => {
                    self.put(&[0x4B])?;
                    self.put(&minutes.to_be_bytes())
                }
                None => {
                    self.put(&[0x4A])?;
                    self.put(&t.millis().to_be_bytes())
                }
            },
            Value::String(s) => self.encode_string(s),
            Value::Bytes(b) => self.encode_binary(b),
            Value::List(list) => self.encode_list(list),
            Value::Map(map) => self.encode_map(map),
            Value::Record(record) => self.encode_record(record),
        }
    }

    /// Writes an integer in its smallest tier.
    pub fn encode_int(&mut self, v: i32) -> Result<()> {
        if (-16..=47).contains(&v) {
            self.put(&[(v + 0x90) as u8])
        } else if (-2048..=2047).contains(&v) {
            self.put(&[((v >> 8) + 0xC8) as u8, (v & 0xFF) as u8])
        } else if (-262_144..=262_143).contains(&v) {
            self.put(&[
                ((v >> 16) + 0xD4) as u8,
                ((v >> 8) & 0xFF) as u8,
                (v & 0xFF) as u8,
            ])
        } else {
            self.put(&[0x49])?;
            self.put(&v.to_be_bytes())
        }
    }

    /// Writes a long in its smallest tier.
    pub fn encode_long(&mut self, v: i64) -> Result<()> {
        if (-8..=15).contains(&v) {
            self.put(&[(v + 0xE0) as u8])
        } else if (-2048..=2047).contains(&v) {
            self.put(&[((v >> 8) + 0xF8) as u8, (v & 0xFF) as u8])
        } else if (-262_144..=262_143).contains(&v) {
            self.put(&[
                ((v >> 16) + 0x3C) as u8,
                ((v >> 8) & 0xFF) as u8,
                (v & 0xFF) as u8,
            ])
        } else if i32::try_from(v).is_ok() {
            self.put(&[0x59])?;
            self.put(&(v as i32).to_be_bytes())
        } else {
            self.put(&[0x4C])?;
            self.put(&v.to_be_bytes())
        }
    }

    /// Writes a double in its smallest tier that preserves the bit pattern.
    pub fn encode_double(&mut self, v: f64) -> Result<()> {
        if v.to_bits() == 0.0f64.to_bits() {
            return self.put(&[0x5B]);
        }
        if v.to_bits() == 1.0f64.to_bits() {
            return self.put(&[0x5C]);
        }
        // Integral tiers only when the exact bits survive (keeps -0.0 out).
        let truncated = v as i64;
        if (truncated as f64).to_bits() == v.to_bits() {
            if let Ok(byte) = i8::try_from(truncated) {
                self.put(&[0x5D])?;
                return self.put(&[byte as u8]);
            }
            if let Ok(short) = i16::try_from(truncated) {
                self.put(&[0x5E])?;
                return self.put(&short.to_be_bytes());
            }
        }
        let single = v as f32;
        if f64::from(single).to_bits() == v.to_bits() {
            self.put(&[0x5F])?;
            return self.put(&single.to_be_bytes());
        }
        self.put(&[0x44])?;
        self.put(&v.to_be_bytes())
    }

    /// Writes a string; lengths count code points.
    pub fn encode_string(&mut self, s: &str) -> Result<()> {
        let count = s.chars().count();
        if count < 32 {
            self.put(&[count as u8])?;
            self.put(s.as_bytes())
        } else if count < 1024 {
            self.put(&[0x30 | (count >> 8) as u8, (count & 0xFF) as u8])?;
            self.put(s.as_bytes())
        } else {
            self.encode_string_chunked(s, count)
        }
    }

    fn encode_string_chunked(&mut self, s: &str, count: usize) -> Result<()> {
        let mut offsets: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
        offsets.push(s.len());
        let mut start = 0;
        let mut remaining = count;
        while remaining > 0 {
            let take = remaining.min(MAX_CHUNK);
            let tag = if take == remaining { 0x53 } else { 0x52 };
            self.put(&[tag, (take >> 8) as u8, (take & 0xFF) as u8])?;
            self.put(s[offsets[start]..offsets[start + take]].as_bytes())?;
            start += take;
            remaining -= take;
        }
        Ok(())
    }

    /// Writes a byte buffer.
    pub fn encode_binary(&mut self, bytes: &[u8]) -> Result<()> {
        let len = bytes.len();
        if len < 16 {
            self.put(&[0x20 + len as u8])?;
            self.put(bytes)
        } else if len < 1024 {
            self.put(&[0x34 | (len >> 8) as u8, (len & 0xFF) as u8])?;
            self.put(bytes)
        } else {
            let mut remaining = bytes;
            loop {
                let take = remaining.len().min(MAX_CHUNK);
                let (chunk, rest) = remaining.split_at(take);
                let tag = if rest.is_empty() { 0x42 } else { 0x41 };
                self.put(&[tag, (take >> 8) as u8, (take & 0xFF) as u8])?;
                self.put(chunk)?;
                if rest.is_empty() {
                    return Ok(());
                }
                remaining = rest;
            }
        }
    }

    fn encode_list(&mut self, list: &Rc<RefCell<Vec<Value>>>) -> Result<()> {
        let key = Rc::as_ptr(list) as usize;
        if let Some(index) = self.object_refs.get(&key).copied() {
            return self.encode_ref(index);
        }
        self.register(key);
        let len = list.borrow().len();
        if len <= 7 {
            self.put(&[0x78 + len as u8])?;
        } else {
            self.put(&[0x58])?;
            self.encode_int(len as i32)?;
        }
        for i in 0..len {
            // Clone the element so the borrow does not span the recursion.
            let element = list.borrow()[i].clone();
            self.encode_value(&element)?;
        }
        Ok(())
    }

    fn encode_map(&mut self, map: &Rc<RefCell<crate::value::ValueMap>>) -> Result<()> {
        let key = Rc::as_ptr(map) as usize;
        if let Some(index) = self.object_refs.get(&key).copied() {
            return self.encode_ref(index);
        }
        self.register(key);
        self.put(&[0x48])?;
        let entries: Vec<(Value, Value)> = map
            .borrow()
            .iter()
            .map(|(k, v)| (k.value().clone(), v.clone()))
            .collect();
        for (k, v) in &entries {
            self.encode_value(k)?;
            self.encode_value(v)?;
        }
        self.put(&[0x5A])
    }

    fn encode_record(&mut self, record: &Rc<RefCell<Record>>) -> Result<()> {
        let key = Rc::as_ptr(record) as usize;
        if let Some(index) = self.object_refs.get(&key).copied() {
            return self.encode_ref(index);
        }
        let (class_index, fields) = {
            let r = record.borrow();
            let class_key = ClassKey {
                name: r.type_name_rc(),
                fields: r.fields().iter().map(|(n, _)| Rc::clone(n)).collect(),
            };
            (self.class_index(class_key)?, r.fields().to_vec())
        };
        self.register(key);
        if (0..=15).contains(&class_index) {
            self.put(&[0x60 + class_index as u8])?;
        } else {
            self.put(&[0x4F])?;
            self.encode_int(class_index)?;
        }
        for (_, value) in &fields {
            self.encode_value(value)?;
        }
        Ok(())
    }

    /// Index of an interned class definition, writing it on first use.
    fn class_index(&mut self, key: ClassKey) -> Result<i32> {
        if let Some(index) = self.class_defs.get(&key) {
            return Ok(*index);
        }
        let index = self.class_defs.len() as i32;
        self.put(&[0x43])?;
        self.encode_string(&key.name)?;
        self.encode_int(key.fields.len() as i32)?;
        for field in &key.fields {
            self.encode_string(field)?;
        }
        self.class_defs.insert(key, index);
        Ok(index)
    }

    fn encode_ref(&mut self, index: i32) -> Result<()> {
        self.put(&[0x51])?;
        self.encode_int(index)
    }

    fn register(&mut self, key: usize) {
        let index = self.object_refs.len() as i32;
        self.object_refs.insert(key, index);
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes).map_err(|e| Error::Io(e.to_string()))
    }
}

/// Encodes `values` back to back into a fresh byte buffer.
pub fn encode(values: &[Value]) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(Vec::new());
    for value in values {
        encoder.encode_value(value)?;
    }
    Ok(encoder.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(value: Value) -> Vec<u8> {
        encode(&[value]).unwrap()
    }

    #[test]
    fn int_tier_selection() {
        assert_eq!(bytes_of(Value::Int(0)), vec![0x90]);
        assert_eq!(bytes_of(Value::Int(-16)), vec![0x80]);
        assert_eq!(bytes_of(Value::Int(47)), vec![0xBF]);
        assert_eq!(bytes_of(Value::Int(48)), vec![0xC8, 0x30]);
        assert_eq!(bytes_of(Value::Int(-2048)), vec![0xC0, 0x00]);
        assert_eq!(bytes_of(Value::Int(2048)), vec![0xD4, 0x08, 0x00]);
        assert_eq!(bytes_of(Value::Int(-262_144)), vec![0xD0, 0x00, 0x00]);
        assert_eq!(
            bytes_of(Value::Int(262_144)),
            vec![0x49, 0x00, 0x04, 0x00, 0x00]
        );
    }

    #[test]
    fn long_tier_selection() {
        assert_eq!(bytes_of(Value::Long(0)), vec![0xE0]);
        assert_eq!(bytes_of(Value::Long(-8)), vec![0xD8]);
        assert_eq!(bytes_of(Value::Long(15)), vec![0xEF]);
        assert_eq!(bytes_of(Value::Long(-2048)), vec![0xF0, 0x00]);
        assert_eq!(bytes_of(Value::Long(262_143)), vec![0x3F, 0xFF, 0xFF]);
        assert_eq!(
            bytes_of(Value::Long(262_144)),
            vec![0x59, 0x00, 0x04, 0x00, 0x00]
        );
        assert_eq!(
            bytes_of(Value::Long(i64::from(i32::MAX) + 1)),
            {
                let mut v = vec![0x4C];
                v.extend_from_slice(&(i64::from(i32::MAX) + 1).to_be_bytes());
                v
            }
        );
    }

    #[test]
    fn double_tier_selection() {
        assert_eq!(bytes_of(Value::Double(0.0)), vec![0x5B]);
        assert_eq!(bytes_of(Value::Double(1.0)), vec![0x5C]);
        assert_eq!(bytes_of(Value::Double(-128.0)), vec![0x5D, 0x80]);
        assert_eq!(bytes_of(Value::Double(300.0)), vec![0x5E, 0x01, 0x2C]);
        let mut single = vec![0x5F];
        single.extend_from_slice(&12.5f32.to_be_bytes());
        assert_eq!(bytes_of(Value::Double(12.5)), single);
    }

    #[test]
    fn negative_zero_keeps_its_sign_bit() {
        let mut expected = vec![0x44];
        expected.extend_from_slice(&(-0.0f64).to_be_bytes());
        assert_eq!(bytes_of(Value::Double(-0.0)), expected);
    }

    #[test]
    fn date_prefers_minute_tier_when_exact() {
        use crate::datetime::Timestamp;
        assert_eq!(
            bytes_of(Value::Date(Timestamp::from_minutes(2))),
            vec![0x4B, 0x00, 0x00, 0x00, 0x02]
        );
        let mut millis = vec![0x4A];
        millis.extend_from_slice(&1001i64.to_be_bytes());
        assert_eq!(bytes_of(Value::Date(Timestamp::from_millis(1001))), millis);
    }

    #[test]
    fn string_length_counts_codepoints() {
        // Two code points, four bytes: still the short form with length 2.
        assert_eq!(bytes_of(Value::from("中A")), {
            let mut v = vec![0x02];
            v.extend_from_slice("中A".as_bytes());
            v
        });
    }

    #[test]
    fn medium_string_form() {
        let text = "y".repeat(300);
        let out = bytes_of(Value::from(text.clone()));
        assert_eq!(&out[..2], &[0x31, 0x2C]);
        assert_eq!(&out[2..], text.as_bytes());
    }

    #[test]
    fn shared_list_emits_backref() {
        let shared = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![shared.clone(), shared]);
        let out = bytes_of(outer);
        // outer (0x7A), inner (0x79, 0x91), then Q ref to index 1.
        assert_eq!(out, vec![0x7A, 0x79, 0x91, 0x51, 0x91]);
    }

    #[test]
    fn class_definition_written_once() {
        let mut a = crate::record::RecordBuilder::new("point");
        a.push(Rc::from("x"), Value::Int(1));
        let mut b = crate::record::RecordBuilder::new("point");
        b.push(Rc::from("x"), Value::Int(2));
        let out = encode(&[Value::Record(a.finish()), Value::Record(b.finish())]).unwrap();
        let defs = out.iter().filter(|&&byte| byte == 0x43).count();
        assert_eq!(defs, 1);
        // Second instance reuses compact index 0.
        assert!(out.ends_with(&[0x60, 0x92]));
    }

    #[test]
    fn cyclic_list_terminates() {
        let cell: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
        cell.borrow_mut().push(Value::List(Rc::clone(&cell)));
        let out = bytes_of(Value::List(cell));
        // One-element list whose element is a back-reference to itself.
        assert_eq!(out, vec![0x79, 0x51, 0x90]);
    }
}
