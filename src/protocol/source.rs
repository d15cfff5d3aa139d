//! Socket character source
//!
//! Adapts a byte reader into the `char` iterator the YAML pull parser
//! consumes, decoding UTF-8 incrementally so nothing is buffered beyond one
//! read chunk.
//!
//! Iterators cannot carry errors, so a read failure (or invalid UTF-8) is
//! recorded in a shared [`ErrorSlot`] and the stream simply ends; the
//! parser observes the truncated stream and asks the slot for the real
//! cause.

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

const READ_CHUNK: usize = 4096;

/// Shared cell holding the first fatal input error, if any.
#[derive(Debug, Clone, Default)]
pub struct ErrorSlot(Rc<RefCell<Option<String>>>);

impl ErrorSlot {
    /// Take the recorded error, leaving the slot empty.
    pub fn take(&self) -> Option<String> {
        self.0.borrow_mut().take()
    }

    fn record(&self, message: String) {
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            *slot = Some(message);
        }
    }
}

/// Incremental UTF-8 decoder over a blocking reader.
pub struct ReadChars<R> {
    inner: R,
    buf: [u8; READ_CHUNK],
    pos: usize,
    filled: usize,
    failed: bool,
    error: ErrorSlot,
}

impl<R: Read> ReadChars<R> {
    /// Wrap `inner`, returning the source and the slot its errors land in.
    pub fn new(inner: R) -> (Self, ErrorSlot) {
        let error = ErrorSlot::default();
        let source = ReadChars {
            inner,
            buf: [0; READ_CHUNK],
            pos: 0,
            filled: 0,
            failed: false,
            error: error.clone(),
        };
        (source, error)
    }

    /// Pull more bytes from the reader. Returns false on end-of-stream or
    /// on an error (which is recorded).
    fn refill(&mut self) -> bool {
        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }
        loop {
            match self.inner.read(&mut self.buf[self.filled..]) {
                Ok(0) => return false,
                Ok(n) => {
                    self.filled += n;
                    return true;
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.error.record(format!("read error: {err}"));
                    self.failed = true;
                    return false;
                }
            }
        }
    }

    fn fail_utf8(&mut self) -> Option<char> {
        self.error.record("invalid UTF-8 in input stream".to_owned());
        self.failed = true;
        None
    }
}

impl<R: Read> Iterator for ReadChars<R> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        if self.failed {
            return None;
        }
        if self.pos == self.filled && !self.refill() {
            return None;
        }

        let first = self.buf[self.pos];
        if first < 0x80 {
            self.pos += 1;
            return Some(first as char);
        }

        let width = match first {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return self.fail_utf8(),
        };
        while self.filled - self.pos < width {
            if !self.refill() {
                // error or EOF in the middle of a character
                return self.fail_utf8();
            }
        }

        match std::str::from_utf8(&self.buf[self.pos..self.pos + width]) {
            Ok(text) => {
                self.pos += width;
                text.chars().next()
            }
            Err(_) => self.fail_utf8(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_decodes_multibyte_sequences() {
        let (chars, errors) = ReadChars::new(Cursor::new("ação é\u{1F3AC}".as_bytes()));
        let decoded: String = chars.collect();
        assert_eq!(decoded, "ação é\u{1F3AC}");
        assert!(errors.take().is_none());
    }

    #[test]
    fn test_invalid_utf8_records_error() {
        let (chars, errors) = ReadChars::new(Cursor::new(&b"ok \xff more"[..]));
        let decoded: String = chars.collect();
        assert_eq!(decoded, "ok ");
        assert!(errors.take().unwrap().contains("UTF-8"));
    }

    #[test]
    fn test_truncated_character_records_error() {
        // first two bytes of a three-byte sequence
        let (chars, errors) = ReadChars::new(Cursor::new(&b"a\xe2\x82"[..]));
        let decoded: String = chars.collect();
        assert_eq!(decoded, "a");
        assert!(errors.take().is_some());
    }
}
