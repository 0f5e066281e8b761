//! Forward-only byte cursor over a `std::io::Read` source.
//!
//! The decoder drives everything through four primitives: a one-byte
//! lookahead (`peek`), single-byte and fixed-width reads, and a UTF-8
//! code-point read for string payloads whose lengths are counted in
//! characters rather than bytes.

use std::io::{ErrorKind, Read};

use crate::{Error, Result};

/// Buffered single-byte lookahead over any `Read` implementation.
pub struct ByteCursor<R> {
    inner: R,
    peeked: Option<u8>,
}

impl<R: Read> ByteCursor<R> {
    pub fn new(inner: R) -> Self {
        ByteCursor { inner, peeked: None }
    }

    /// Returns the next byte without consuming it, or `None` at a clean end
    /// of stream.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        if self.peeked.is_none() {
            self.peeked = self.fill_one()?;
        }
        Ok(self.peeked)
    }

    /// Consumes and returns the next byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        if let Some(byte) = self.peeked.take() {
            return Ok(byte);
        }
        self.fill_one()?.ok_or(Error::UnexpectedEndOfStream)
    }

    /// Consumes exactly `n` bytes.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        if n > 0 {
            if let Some(byte) = self.peeked.take() {
                buf[0] = byte;
                filled = 1;
            }
        }
        self.fill_buf(&mut buf[filled..])?;
        Ok(buf)
    }

    /// Consumes exactly `N` bytes into a fixed array (scalar payloads).
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        let mut filled = 0;
        if N > 0 {
            if let Some(byte) = self.peeked.take() {
                buf[0] = byte;
                filled = 1;
            }
        }
        self.fill_buf(&mut buf[filled..])?;
        Ok(buf)
    }

    /// Consumes a big-endian `u16` (chunk lengths).
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array::<2>()?))
    }

    /// Consumes one UTF-8 encoded Unicode scalar value (1 to 4 bytes).
    ///
    /// Surrogate code points and values above U+10FFFF are rejected; the
    /// string payloads never contain them in well-formed streams.
    pub fn read_utf8_codepoint(&mut self) -> Result<char> {
        let lead = self.read_byte()?;
        let (continuations, initial) = match lead {
            0x00..=0x7F => return Ok(lead as char),
            0xC0..=0xDF => (1u8, u32::from(lead & 0x1F)),
            0xE0..=0xEF => (2, u32::from(lead & 0x0F)),
            0xF0..=0xF7 => (3, u32::from(lead & 0x07)),
            _ => return Err(Error::InvalidUtf8(lead)),
        };
        let mut cp = initial;
        for _ in 0..continuations {
            let byte = self.read_byte()?;
            if byte & 0xC0 != 0x80 {
                return Err(Error::InvalidUtf8(byte));
            }
            cp = (cp << 6) | u32::from(byte & 0x3F);
        }
        char::from_u32(cp).ok_or(Error::InvalidCodePoint(cp))
    }

    fn fill_one(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e.to_string())),
            }
        }
    }

    fn fill_buf(&mut self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.inner.read(buf) {
                Ok(0) => return Err(Error::UnexpectedEndOfStream),
                Ok(n) => buf = &mut buf[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e.to_string())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(bytes: &[u8]) -> ByteCursor<&[u8]> {
        ByteCursor::new(bytes)
    }

    #[test]
    fn peek_does_not_consume() {
        let mut c = cursor(&[0xAB, 0xCD]);
        assert_eq!(c.peek().unwrap(), Some(0xAB));
        assert_eq!(c.peek().unwrap(), Some(0xAB));
        assert_eq!(c.read_byte().unwrap(), 0xAB);
        assert_eq!(c.read_byte().unwrap(), 0xCD);
        assert_eq!(c.peek().unwrap(), None);
    }

    #[test]
    fn read_byte_past_end_fails() {
        let mut c = cursor(&[]);
        assert_eq!(c.read_byte().unwrap_err(), Error::UnexpectedEndOfStream);
    }

    #[test]
    fn read_exact_after_peek_includes_buffered_byte() {
        let mut c = cursor(&[1, 2, 3]);
        assert_eq!(c.peek().unwrap(), Some(1));
        assert_eq!(c.read_exact(3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn read_exact_on_truncated_input_fails() {
        let mut c = cursor(&[1, 2]);
        assert_eq!(c.read_exact(3).unwrap_err(), Error::UnexpectedEndOfStream);
    }

    #[test]
    fn read_u16_is_big_endian() {
        let mut c = cursor(&[0x01, 0x02]);
        assert_eq!(c.read_u16().unwrap(), 0x0102);
    }

    #[test]
    fn codepoint_ascii() {
        let mut c = cursor(b"A");
        assert_eq!(c.read_utf8_codepoint().unwrap(), 'A');
    }

    #[test]
    fn codepoint_two_byte() {
        let mut c = cursor("é".as_bytes());
        assert_eq!(c.read_utf8_codepoint().unwrap(), 'é');
    }

    #[test]
    fn codepoint_three_byte() {
        let mut c = cursor("中".as_bytes());
        assert_eq!(c.read_utf8_codepoint().unwrap(), '中');
    }

    #[test]
    fn codepoint_four_byte() {
        let mut c = cursor("🎉".as_bytes());
        assert_eq!(c.read_utf8_codepoint().unwrap(), '🎉');
    }

    #[test]
    fn codepoint_bad_continuation_fails() {
        // 0xC3 expects a 10xxxxxx continuation, gets 0xFF.
        let mut c = cursor(&[0xC3, 0xFF]);
        assert_eq!(c.read_utf8_codepoint().unwrap_err(), Error::InvalidUtf8(0xFF));
    }

    #[test]
    fn codepoint_bare_continuation_fails() {
        let mut c = cursor(&[0x80]);
        assert_eq!(c.read_utf8_codepoint().unwrap_err(), Error::InvalidUtf8(0x80));
    }

    #[test]
    fn codepoint_surrogate_fails() {
        // 0xED 0xA0 0x80 decodes to U+D800, a surrogate.
        let mut c = cursor(&[0xED, 0xA0, 0x80]);
        assert_eq!(
            c.read_utf8_codepoint().unwrap_err(),
            Error::InvalidCodePoint(0xD800)
        );
    }

    #[test]
    fn codepoint_truncated_sequence_fails() {
        let mut c = cursor(&[0xE4, 0xB8]);
        assert_eq!(
            c.read_utf8_codepoint().unwrap_err(),
            Error::UnexpectedEndOfStream
        );
    }
}
