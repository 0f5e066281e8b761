//! Tag-dispatch decoder for the Hessian 2.0 object-graph wire format.
//!
//! Every value begins with a tag byte; the tag alone selects the decode
//! routine and, for the compact tiers, carries part of the payload. The
//! dispatch table below covers the full 0x00–0xFF space, so a stray byte is
//! always either decoded or rejected, never silently skipped.
//!
//! Composite containers are registered in the object table before their
//! contents are decoded, which is what makes cyclic graphs work: a
//! back-reference met while filling a container resolves to the very handle
//! being filled.

use std::io::Read;
use std::rc::Rc;

use log::trace;

use crate::class_def::ClassDef;
use crate::cursor::ByteCursor;
use crate::datetime::Timestamp;
use crate::record::RecordBuilder;
use crate::refs::RefTable;
use crate::resolver::CollectionResolvers;
use crate::value::{MapKey, Value};
use crate::{Error, Result};

/// Decodes one or more values from a byte stream.
///
/// A decoder owns its reference tables; decoding two independent streams
/// requires two decoders. After an error the tables may hold partially
/// populated entries and the decoder should be discarded.
pub struct Decoder<R> {
    cursor: ByteCursor<R>,
    class_defs: RefTable<Rc<ClassDef>>,
    object_refs: RefTable<Value>,
    type_names: RefTable<Rc<str>>,
    resolvers: CollectionResolvers,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_resolvers(reader, CollectionResolvers::new())
    }

    /// A decoder with custom collection-type resolvers.
    pub fn with_resolvers(reader: R, resolvers: CollectionResolvers) -> Self {
        Decoder {
            cursor: ByteCursor::new(reader),
            class_defs: RefTable::new("class definition"),
            object_refs: RefTable::new("object"),
            type_names: RefTable::new("type name"),
            resolvers,
        }
    }

    /// Whether another value can be read (i.e. the stream is not at EOF).
    pub fn can_read(&mut self) -> Result<bool> {
        Ok(self.cursor.peek()?.is_some())
    }

    /// Decodes the next value, whatever its tag.
    pub fn decode_value(&mut self) -> Result<Value> {
        let tag = self.peek_tag()?;
        trace!("decode tag 0x{tag:02x}");
        match tag {
            // utf-8 string, length 0-31 in the tag
            0x00..=0x1F => Ok(Value::String(self.read_short_string()?.into())),
            // binary, length 0-15 in the tag
            0x20..=0x2F => Ok(Value::Bytes(self.read_short_binary()?.into())),
            // utf-8 string, length 0-1023 over two bytes
            0x30..=0x33 => Ok(Value::String(self.read_medium_string()?.into())),
            // binary, length 0-1023 over two bytes
            0x34..=0x37 => Ok(Value::Bytes(self.read_medium_binary()?.into())),
            // long, three-byte compact
            0x38..=0x3F => Ok(Value::Long(self.read_long_three_bytes()?)),
            // reserved tags: skip and decode the value that follows
            0x40 | 0x45 | 0x47 | 0x50 => {
                self.cursor.read_byte()?;
                self.decode_value()
            }
            // binary chunks ('A' non-final, 'B' final)
            0x41 | 0x42 => Ok(Value::Bytes(self.read_chunked_binary()?.into())),
            // 'C': class definition, always followed by an instance
            0x43 => self.read_definition_then_instance(),
            // 'D': 64-bit double
            0x44 => Ok(Value::Double(self.read_double_full()?)),
            // 'F' / 'T': booleans
            0x46 | 0x54 => Ok(Value::Bool(self.read_bool()?)),
            // 'H': untyped map
            0x48 => {
                self.cursor.read_byte()?;
                self.read_map_core(None)
            }
            // 'I': 32-bit integer
            0x49 => Ok(Value::Int(self.read_int_full()?)),
            // 64-bit millisecond date
            0x4A => Ok(Value::Date(self.read_date_millis()?)),
            // 32-bit minute date
            0x4B => Ok(Value::Date(self.read_date_minutes()?)),
            // 'L': 64-bit long
            0x4C => Ok(Value::Long(self.read_long_full()?)),
            // 'M': typed map
            0x4D => {
                self.cursor.read_byte()?;
                let type_name = self.read_type_name()?;
                self.read_map_core(Some(type_name))
            }
            // 'N': null
            0x4E => {
                self.cursor.read_byte()?;
                Ok(Value::Null)
            }
            // 'O': object with full class-def index
            0x4F => self.read_object_full(),
            // 'Q': back-reference
            0x51 => self.read_ref(),
            // string chunks ('R' non-final, 'S' final)
            0x52 | 0x53 => Ok(Value::String(self.read_chunked_string()?.into())),
            // 'U': variable-length typed list
            0x55 => {
                self.cursor.read_byte()?;
                let type_name = self.read_type_name()?;
                self.read_list_core(Some(type_name), None)
            }
            // 'V': fixed-length typed list
            0x56 => {
                self.cursor.read_byte()?;
                let type_name = self.read_type_name()?;
                let length = self.read_length()?;
                self.read_list_core(Some(type_name), Some(length))
            }
            // 'W': variable-length untyped list
            0x57 => {
                self.cursor.read_byte()?;
                self.read_list_core(None, None)
            }
            // 'X': fixed-length untyped list
            0x58 => {
                self.cursor.read_byte()?;
                let length = self.read_length()?;
                self.read_list_core(None, Some(length))
            }
            // long encoded as 32 bits
            0x59 => Ok(Value::Long(self.read_long_four_bytes()?)),
            // 'Z' terminates maps and variable lists; it is never a value
            0x5A => Err(Error::UnexpectedTag { tag, expected: "value" }),
            // doubles 0.0 and 1.0 in the tag alone
            0x5B | 0x5C => {
                let tag = self.cursor.read_byte()?;
                Ok(Value::Double(f64::from(tag - 0x5B)))
            }
            // double from a signed byte
            0x5D => {
                self.cursor.read_byte()?;
                let byte = self.cursor.read_byte()?;
                Ok(Value::Double(f64::from(byte as i8)))
            }
            // double from a signed big-endian short
            0x5E => {
                self.cursor.read_byte()?;
                let bytes = self.cursor.read_array::<2>()?;
                Ok(Value::Double(f64::from(i16::from_be_bytes(bytes))))
            }
            // double from a 32-bit IEEE 754 single
            0x5F => {
                self.cursor.read_byte()?;
                let bytes = self.cursor.read_array::<4>()?;
                Ok(Value::Double(f64::from(f32::from_be_bytes(bytes))))
            }
            // object with compact class-def index 0-15
            0x60..=0x6F => self.read_object_compact(),
            // fixed typed list, length 0-7 in the tag
            0x70..=0x77 => {
                let tag = self.cursor.read_byte()?;
                let length = usize::from(tag - 0x70);
                let type_name = self.read_type_name()?;
                self.read_list_core(Some(type_name), Some(length))
            }
            // fixed untyped list, length 0-7 in the tag
            0x78..=0x7F => {
                let tag = self.cursor.read_byte()?;
                let length = usize::from(tag - 0x78);
                self.read_list_core(None, Some(length))
            }
            // int, single-byte compact
            0x80..=0xBF => Ok(Value::Int(self.read_int_single_byte()?)),
            // int, two-byte compact
            0xC0..=0xCF => Ok(Value::Int(self.read_int_two_bytes()?)),
            // int, three-byte compact
            0xD0..=0xD7 => Ok(Value::Int(self.read_int_three_bytes()?)),
            // long, single-byte compact
            0xD8..=0xEF => Ok(Value::Long(self.read_long_one_byte()?)),
            // long, two-byte compact
            0xF0..=0xFF => Ok(Value::Long(self.read_long_two_bytes()?)),
        }
    }

    // --- typed entry points ---

    /// Decodes a string in any of its encodings.
    pub fn read_string(&mut self) -> Result<String> {
        let tag = self.peek_tag()?;
        match tag {
            0x00..=0x1F => self.read_short_string(),
            0x30..=0x33 => self.read_medium_string(),
            0x52 | 0x53 => self.read_chunked_string(),
            _ => Err(Error::UnexpectedTag { tag, expected: "string" }),
        }
    }

    /// Decodes a byte buffer in any of its encodings.
    pub fn read_binary(&mut self) -> Result<Vec<u8>> {
        let tag = self.peek_tag()?;
        match tag {
            0x20..=0x2F => self.read_short_binary(),
            0x34..=0x37 => self.read_medium_binary(),
            0x41 | 0x42 => self.read_chunked_binary(),
            _ => Err(Error::UnexpectedTag { tag, expected: "binary" }),
        }
    }

    /// Decodes a 32-bit integer in any of its four tiers.
    pub fn read_int(&mut self) -> Result<i32> {
        let tag = self.peek_tag()?;
        match tag {
            0x49 => self.read_int_full(),
            0x80..=0xBF => self.read_int_single_byte(),
            0xC0..=0xCF => self.read_int_two_bytes(),
            0xD0..=0xD7 => self.read_int_three_bytes(),
            _ => Err(Error::UnexpectedTag { tag, expected: "integer" }),
        }
    }

    /// Decodes a 64-bit integer in any of its five tiers.
    pub fn read_long(&mut self) -> Result<i64> {
        let tag = self.peek_tag()?;
        match tag {
            0x4C => self.read_long_full(),
            0x38..=0x3F => self.read_long_three_bytes(),
            0x59 => self.read_long_four_bytes(),
            0xD8..=0xEF => self.read_long_one_byte(),
            0xF0..=0xFF => self.read_long_two_bytes(),
            _ => Err(Error::UnexpectedTag { tag, expected: "long" }),
        }
    }

    /// Decodes a double in any of its six tiers.
    pub fn read_double(&mut self) -> Result<f64> {
        let tag = self.peek_tag()?;
        match tag {
            0x44 => self.read_double_full(),
            0x5B | 0x5C => {
                self.cursor.read_byte()?;
                Ok(f64::from(tag - 0x5B))
            }
            0x5D => {
                self.cursor.read_byte()?;
                Ok(f64::from(self.cursor.read_byte()? as i8))
            }
            0x5E => {
                self.cursor.read_byte()?;
                Ok(f64::from(i16::from_be_bytes(self.cursor.read_array::<2>()?)))
            }
            0x5F => {
                self.cursor.read_byte()?;
                Ok(f64::from(f32::from_be_bytes(self.cursor.read_array::<4>()?)))
            }
            _ => Err(Error::UnexpectedTag { tag, expected: "double" }),
        }
    }

    /// Decodes a boolean ('T' or 'F').
    pub fn read_bool(&mut self) -> Result<bool> {
        let tag = self.cursor.read_byte()?;
        match tag {
            0x54 => Ok(true),
            0x46 => Ok(false),
            _ => Err(Error::UnexpectedTag { tag, expected: "boolean" }),
        }
    }

    /// Decodes a date in either tier.
    pub fn read_date(&mut self) -> Result<Timestamp> {
        let tag = self.peek_tag()?;
        match tag {
            0x4A => self.read_date_millis(),
            0x4B => self.read_date_minutes(),
            _ => Err(Error::UnexpectedTag { tag, expected: "date" }),
        }
    }

    /// Decodes a map in either the typed or untyped form.
    pub fn read_map(&mut self) -> Result<Value> {
        let tag = self.peek_tag()?;
        match tag {
            0x48 => {
                self.cursor.read_byte()?;
                self.read_map_core(None)
            }
            0x4D => {
                self.cursor.read_byte()?;
                let type_name = self.read_type_name()?;
                self.read_map_core(Some(type_name))
            }
            _ => Err(Error::UnexpectedTag { tag, expected: "map" }),
        }
    }

    /// Decodes an object instance, with any leading class definitions.
    pub fn read_object(&mut self) -> Result<Value> {
        let tag = self.peek_tag()?;
        match tag {
            0x43 => self.read_definition_then_instance(),
            0x4F => self.read_object_full(),
            0x60..=0x6F => self.read_object_compact(),
            _ => Err(Error::UnexpectedTag { tag, expected: "object" }),
        }
    }

    /// Resolves a back-reference ('Q' plus an integer index).
    pub fn read_ref(&mut self) -> Result<Value> {
        let tag = self.cursor.read_byte()?;
        if tag != 0x51 {
            return Err(Error::UnexpectedTag { tag, expected: "reference" });
        }
        let index = self.read_int()?;
        self.object_refs.get(index).cloned()
    }

    /// Reads and registers a class definition ('C' name count field*).
    pub fn read_class_definition(&mut self) -> Result<Rc<ClassDef>> {
        let tag = self.cursor.read_byte()?;
        if tag != 0x43 {
            return Err(Error::UnexpectedTag { tag, expected: "class definition" });
        }
        let name: Rc<str> = self.read_string()?.into();
        let count = self.read_length()?;
        let mut fields: Vec<Rc<str>> = Vec::new();
        for _ in 0..count {
            fields.push(self.read_string()?.into());
        }
        let def = Rc::new(ClassDef::new(name, fields));
        trace!(
            "class definition #{}: '{}' ({} fields)",
            self.class_defs.len(),
            def.name(),
            def.field_count()
        );
        self.class_defs.add(Rc::clone(&def));
        Ok(def)
    }

    // --- structure cores ---

    /// A class definition never stands alone: the value that follows it must
    /// be an object instance (possibly after further definitions).
    fn read_definition_then_instance(&mut self) -> Result<Value> {
        let def = self.read_class_definition()?;
        let value = self.decode_value()?;
        match value {
            Value::Record(_) => Ok(value),
            _ => Err(Error::ClassDefWithoutInstance { class: def.name().to_string() }),
        }
    }

    fn read_object_full(&mut self) -> Result<Value> {
        self.cursor.read_byte()?;
        let index = self.read_int()?;
        let def = Rc::clone(self.class_defs.get(index)?);
        self.read_object_core(def)
    }

    fn read_object_compact(&mut self) -> Result<Value> {
        let tag = self.cursor.read_byte()?;
        let def = Rc::clone(self.class_defs.get(i32::from(tag - 0x60))?);
        self.read_object_core(def)
    }

    fn read_object_core(&mut self, def: Rc<ClassDef>) -> Result<Value> {
        let mut builder = RecordBuilder::new(def.name_rc());
        // Register before reading fields so the record can reference itself.
        self.object_refs.add(Value::Record(builder.handle()));
        for field in def.fields() {
            let value = self.decode_value()?;
            builder.push(Rc::clone(field), value);
        }
        Ok(Value::Record(builder.finish()))
    }

    fn read_list_core(&mut self, type_name: Option<Rc<str>>, length: Option<usize>) -> Result<Value> {
        let list = self.resolvers.list_for(type_name.as_deref(), length);
        self.object_refs.add(Value::List(Rc::clone(&list)));
        match length {
            Some(n) => {
                for _ in 0..n {
                    let element = self.decode_value()?;
                    list.borrow_mut().push(element);
                }
            }
            None => loop {
                if self.peek_tag()? == 0x5A {
                    self.cursor.read_byte()?;
                    break;
                }
                let element = self.decode_value()?;
                list.borrow_mut().push(element);
            },
        }
        Ok(Value::List(list))
    }

    fn read_map_core(&mut self, type_name: Option<Rc<str>>) -> Result<Value> {
        let map = self.resolvers.map_for(type_name.as_deref());
        self.object_refs.add(Value::Map(Rc::clone(&map)));
        loop {
            if self.peek_tag()? == 0x5A {
                self.cursor.read_byte()?;
                break;
            }
            let key = self.decode_value()?;
            let value = self.decode_value()?;
            map.borrow_mut().insert(MapKey::from(key), value);
        }
        Ok(Value::Map(map))
    }

    /// A type slot holds either a literal string (which is registered in the
    /// type-name table) or an integer back-reference into that table.
    pub fn read_type_name(&mut self) -> Result<Rc<str>> {
        let tag = self.peek_tag()?;
        match tag {
            0x00..=0x1F | 0x30..=0x33 | 0x52 | 0x53 => {
                let name: Rc<str> = self.read_string()?.into();
                self.type_names.add(Rc::clone(&name));
                Ok(name)
            }
            _ => {
                let index = self.read_int()?;
                self.type_names.get(index).cloned()
            }
        }
    }

    // --- strings ---

    fn read_short_string(&mut self) -> Result<String> {
        let length = usize::from(self.cursor.read_byte()?);
        self.read_string_payload(length)
    }

    fn read_medium_string(&mut self) -> Result<String> {
        let high = usize::from(self.cursor.read_byte()?);
        let low = usize::from(self.cursor.read_byte()?);
        self.read_string_payload(((high - 0x30) << 8) | low)
    }

    fn read_chunked_string(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            let tag = self.cursor.read_byte()?;
            let last = match tag {
                0x53 => true,
                0x52 => false,
                _ => return Err(Error::UnexpectedTag { tag, expected: "string chunk" }),
            };
            let length = usize::from(self.cursor.read_u16()?);
            for _ in 0..length {
                out.push(self.cursor.read_utf8_codepoint()?);
            }
            if last {
                return Ok(out);
            }
        }
    }

    /// Lengths count code points, not bytes.
    fn read_string_payload(&mut self, length: usize) -> Result<String> {
        let mut out = String::with_capacity(length);
        for _ in 0..length {
            out.push(self.cursor.read_utf8_codepoint()?);
        }
        Ok(out)
    }

    // --- binary ---

    fn read_short_binary(&mut self) -> Result<Vec<u8>> {
        let length = usize::from(self.cursor.read_byte()? - 0x20);
        self.cursor.read_exact(length)
    }

    fn read_medium_binary(&mut self) -> Result<Vec<u8>> {
        let high = usize::from(self.cursor.read_byte()?);
        let low = usize::from(self.cursor.read_byte()?);
        self.cursor.read_exact(((high - 0x34) << 8) | low)
    }

    fn read_chunked_binary(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let tag = self.cursor.read_byte()?;
            let last = match tag {
                0x42 => true,
                0x41 => false,
                _ => return Err(Error::UnexpectedTag { tag, expected: "binary chunk" }),
            };
            let length = usize::from(self.cursor.read_u16()?);
            out.extend_from_slice(&self.cursor.read_exact(length)?);
            if last {
                return Ok(out);
            }
        }
    }

    // --- scalars ---

    fn read_int_full(&mut self) -> Result<i32> {
        self.cursor.read_byte()?;
        Ok(i32::from_be_bytes(self.cursor.read_array::<4>()?))
    }

    fn read_int_single_byte(&mut self) -> Result<i32> {
        Ok(i32::from(self.cursor.read_byte()?) - 0x90)
    }

    fn read_int_two_bytes(&mut self) -> Result<i32> {
        let high = i32::from(self.cursor.read_byte()?);
        let low = i32::from(self.cursor.read_byte()?);
        Ok(((high - 0xC8) << 8) | low)
    }

    fn read_int_three_bytes(&mut self) -> Result<i32> {
        let high = i32::from(self.cursor.read_byte()?);
        let mid = i32::from(self.cursor.read_byte()?);
        let low = i32::from(self.cursor.read_byte()?);
        Ok(((high - 0xD4) << 16) | (mid << 8) | low)
    }

    fn read_long_full(&mut self) -> Result<i64> {
        self.cursor.read_byte()?;
        Ok(i64::from_be_bytes(self.cursor.read_array::<8>()?))
    }

    fn read_long_one_byte(&mut self) -> Result<i64> {
        Ok(i64::from(self.cursor.read_byte()?) - 0xE0)
    }

    fn read_long_two_bytes(&mut self) -> Result<i64> {
        let high = i64::from(self.cursor.read_byte()?);
        let low = i64::from(self.cursor.read_byte()?);
        Ok(((high - 0xF8) << 8) | low)
    }

    fn read_long_three_bytes(&mut self) -> Result<i64> {
        let high = i64::from(self.cursor.read_byte()?);
        let mid = i64::from(self.cursor.read_byte()?);
        let low = i64::from(self.cursor.read_byte()?);
        Ok(((high - 0x3C) << 16) | (mid << 8) | low)
    }

    fn read_long_four_bytes(&mut self) -> Result<i64> {
        self.cursor.read_byte()?;
        Ok(i64::from(i32::from_be_bytes(self.cursor.read_array::<4>()?)))
    }

    fn read_double_full(&mut self) -> Result<f64> {
        self.cursor.read_byte()?;
        Ok(f64::from_be_bytes(self.cursor.read_array::<8>()?))
    }

    fn read_date_millis(&mut self) -> Result<Timestamp> {
        self.cursor.read_byte()?;
        Ok(Timestamp::from_millis(i64::from_be_bytes(
            self.cursor.read_array::<8>()?,
        )))
    }

    fn read_date_minutes(&mut self) -> Result<Timestamp> {
        self.cursor.read_byte()?;
        Ok(Timestamp::from_minutes(i32::from_be_bytes(
            self.cursor.read_array::<4>()?,
        )))
    }

    // --- helpers ---

    fn peek_tag(&mut self) -> Result<u8> {
        self.cursor.peek()?.ok_or(Error::UnexpectedEndOfStream)
    }

    /// A list length or field count: a wire integer that must be
    /// non-negative.
    fn read_length(&mut self) -> Result<usize> {
        let n = self.read_int()?;
        usize::try_from(n).map_err(|_| Error::InvalidLength(i64::from(n)))
    }
}

/// Decodes every value in `bytes` until the stream is exhausted.
pub fn decode(bytes: &[u8]) -> Result<Vec<Value>> {
    let mut decoder = Decoder::new(bytes);
    let mut values = Vec::new();
    while decoder.can_read()? {
        values.push(decoder.decode_value()?);
    }
    Ok(values)
}
