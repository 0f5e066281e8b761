//! Central error types for the Hessian 2.0 codec.
//!
//! Every failure mode is terminal for the current decode call. The format has
//! no resync marker, so a caller cannot recover a corrupted stream; it can
//! only abandon it.

use core::fmt;

/// All error conditions raised while decoding or encoding a value graph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The stream ended where a tag or payload byte was mandatory.
    UnexpectedEndOfStream,
    /// A tag outside the legal set for the decode routine that consumed it.
    UnexpectedTag {
        /// The offending tag byte.
        tag: u8,
        /// The value category the routine was decoding.
        expected: &'static str,
    },
    /// A class-definition marker was not followed by an object instance
    /// (Hessian 2.0 grammar: a `class-def` only ever precedes an `object`).
    ClassDefWithoutInstance {
        /// Name of the class whose instance was missing.
        class: String,
    },
    /// A back-reference or class-def/type-name index outside the table.
    InvalidReference {
        /// Which table was addressed.
        table: &'static str,
        /// The index read from the wire (may be negative).
        index: i64,
        /// Number of entries currently registered.
        len: usize,
    },
    /// A malformed UTF-8 byte inside a string payload.
    InvalidUtf8(u8),
    /// A decoded code point is a surrogate (U+D800..U+DFFF) or > U+10FFFF.
    InvalidCodePoint(u32),
    /// A negative length or field count on the wire.
    InvalidLength(i64),
    /// An I/O failure other than a clean end of stream.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEndOfStream => write!(f, "unexpected end of stream"),
            Self::UnexpectedTag { tag, expected } => {
                write!(f, "unexpected tag 0x{tag:02x} while decoding {expected}")
            }
            Self::ClassDefWithoutInstance { class } => {
                write!(f, "class definition '{class}' not followed by an object instance")
            }
            Self::InvalidReference { table, index, len } => {
                write!(f, "reference {index} outside {table} table ({len} entries)")
            }
            Self::InvalidUtf8(byte) => write!(f, "malformed UTF-8 byte 0x{byte:02x} in string"),
            Self::InvalidCodePoint(cp) => write!(f, "invalid Unicode code point U+{cp:X}"),
            Self::InvalidLength(len) => write!(f, "invalid length {len} on the wire"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_tag_display() {
        let e = Error::UnexpectedTag { tag: 0x5A, expected: "value" };
        let msg = e.to_string();
        assert!(msg.contains("0x5a"), "{msg}");
        assert!(msg.contains("value"), "{msg}");
    }

    #[test]
    fn invalid_reference_display() {
        let e = Error::InvalidReference { table: "object", index: 7, len: 3 };
        let msg = e.to_string();
        assert!(msg.contains("object"), "{msg}");
        assert!(msg.contains('7'), "{msg}");
        assert!(msg.contains('3'), "{msg}");
    }

    #[test]
    fn class_def_without_instance_display() {
        let e = Error::ClassDefWithoutInstance { class: "com.example.Point".into() };
        assert!(e.to_string().contains("com.example.Point"));
    }

    #[test]
    fn invalid_code_point_display() {
        let e = Error::InvalidCodePoint(0xD800);
        assert!(e.to_string().contains("D800"));
    }

    #[test]
    fn error_implements_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(Error::UnexpectedEndOfStream);
        assert!(!e.to_string().is_empty());
    }

    #[test]
    fn error_is_clone_and_eq() {
        let e1 = Error::InvalidLength(-1);
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }
}
