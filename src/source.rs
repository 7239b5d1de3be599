use std::io;

use crate::error::Result;

/// A pull interface over decoded characters.
///
/// Readers borrow a character source for their lifetime and never close
/// it. The blanket implementation for [`std::str::Chars`] makes in-memory
/// text the simplest source:
///
/// ```
/// use flatfile::{DelimitedOptions, Reader};
///
/// let opts = DelimitedOptions::default();
/// let mut rdr = Reader::delimited("a,b\n".chars(), &opts).unwrap();
/// assert!(rdr.read().unwrap());
/// ```
pub trait CharSource {
    /// Pull the next character, or `None` at end of input.
    fn read_one_char(&mut self) -> Result<Option<char>>;

    /// Pull up to `max` characters into `buf`, returning how many were
    /// appended. Zero means end of input.
    fn read_bulk(&mut self, buf: &mut Vec<char>, max: usize) -> Result<usize> {
        let mut n = 0;
        while n < max {
            match self.read_one_char()? {
                Some(ch) => {
                    buf.push(ch);
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl<'a> CharSource for std::str::Chars<'a> {
    fn read_one_char(&mut self) -> Result<Option<char>> {
        Ok(self.next())
    }
}

impl<S: CharSource + ?Sized> CharSource for &mut S {
    fn read_one_char(&mut self) -> Result<Option<char>> {
        (**self).read_one_char()
    }
}

/// A character source decoding UTF-8 from any [`io::Read`].
///
/// Invalid UTF-8 surfaces as an I/O error; no charset detection is
/// attempted. Wrap the reader in a [`io::BufReader`] when it is not
/// already buffered.
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
}

impl<R: io::Read> IoSource<R> {
    /// Wrap a byte reader.
    pub fn new(inner: R) -> IoSource<R> {
        IoSource { inner }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: io::Read> CharSource for IoSource<R> {
    fn read_one_char(&mut self) -> Result<Option<char>> {
        let first = match self.read_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let width = match first {
            0x00..=0x7f => return Ok(Some(first as char)),
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => return Err(invalid_utf8().into()),
        };
        let mut buf = [first, 0, 0, 0];
        for slot in buf.iter_mut().take(width).skip(1) {
            *slot = self.read_byte()?.ok_or_else(invalid_utf8)?;
        }
        let decoded = std::str::from_utf8(&buf[..width]).map_err(|_| invalid_utf8())?;
        Ok(decoded.chars().next())
    }
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "source is not valid UTF-8")
}

/// A push interface for formatted record text.
///
/// Writers borrow a character sink for their lifetime and never close it.
/// `String` implements it for in-memory output; [`IoSink`] adapts any
/// [`io::Write`].
pub trait CharSink {
    /// Push a chunk of formatted text.
    fn write(&mut self, s: &str) -> Result<()>;
}

impl CharSink for String {
    fn write(&mut self, s: &str) -> Result<()> {
        self.push_str(s);
        Ok(())
    }
}

impl<S: CharSink + ?Sized> CharSink for &mut S {
    fn write(&mut self, s: &str) -> Result<()> {
        (**self).write(s)
    }
}

/// A character sink encoding UTF-8 into any [`io::Write`].
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: io::Write> IoSink<W> {
    /// Wrap a byte writer.
    pub fn new(inner: W) -> IoSink<W> {
        IoSink { inner }
    }

    /// Unwrap the byte writer, e.g. to flush it.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> CharSink for IoSink<W> {
    fn write(&mut self, s: &str) -> Result<()> {
        self.inner.write_all(s.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chars_source_yields_everything() {
        let mut src = "ab".chars();
        assert_eq!(src.read_one_char().unwrap(), Some('a'));
        assert_eq!(src.read_one_char().unwrap(), Some('b'));
        assert_eq!(src.read_one_char().unwrap(), None);
    }

    #[test]
    fn io_source_decodes_multibyte() {
        let bytes = "héllo☃".as_bytes();
        let mut src = IoSource::new(bytes);
        let mut out = String::new();
        while let Some(ch) = src.read_one_char().unwrap() {
            out.push(ch);
        }
        assert_eq!(out, "héllo☃");
    }

    #[test]
    fn io_source_rejects_invalid_utf8() {
        let bytes: &[u8] = &[0xff, 0xfe];
        let mut src = IoSource::new(bytes);
        assert!(src.read_one_char().is_err());
    }

    #[test]
    fn io_source_rejects_truncated_sequences() {
        // First two bytes of a three-byte sequence.
        let bytes: &[u8] = &[0xe2, 0x98];
        let mut src = IoSource::new(bytes);
        assert!(src.read_one_char().is_err());
    }

    #[test]
    fn read_bulk_respects_max() {
        let mut src = "abcdef".chars();
        let mut buf = Vec::new();
        assert_eq!(src.read_bulk(&mut buf, 4).unwrap(), 4);
        assert_eq!(buf, vec!['a', 'b', 'c', 'd']);
    }

    #[test]
    fn string_sink_accumulates() {
        let mut out = String::new();
        out.write("a,b").unwrap();
        out.write("\n").unwrap();
        assert_eq!(out, "a,b\n");
    }

    #[test]
    fn io_sink_passes_bytes_through() {
        let mut sink = IoSink::new(Vec::new());
        sink.write("x☃y").unwrap();
        assert_eq!(sink.into_inner(), "x☃y".as_bytes());
    }
}
