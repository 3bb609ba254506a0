//! HTTP/1.1 chunked transfer decoding over a plain byte source.
//!
//! Wire format, repeated until a zero-size chunk:
//! - SIZE (ASCII hex) with optional `;extension`, then CRLF
//! - SIZE payload bytes, then CRLF
//!
//! The decoder never looks further ahead than one chunk-size line, so a JSON
//! parser can pull from it one byte at a time while the body is still arriving.

use std::io::{self, BufRead, BufReader, Read};

use crate::config::MAX_CHUNK_HEADER_LEN;

pub struct ChunkedReader<R> {
    inner: BufReader<R>,
    /// Payload bytes left in the current chunk.
    remaining: usize,
    peeked: Option<u8>,
    done: bool,
}

impl<R: Read> ChunkedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            remaining: 0,
            peeked: None,
            done: false,
        }
    }

    /// Bytes readable without touching the underlying source. Never more
    /// than what is left of the current chunk; between chunks (and before
    /// the first) this is whatever the source has buffered.
    pub fn available(&self) -> usize {
        if self.peeked.is_some() {
            return 1;
        }
        if self.done {
            return 0;
        }
        let buffered = self.inner.buffer().len();
        if self.remaining > 0 {
            buffered.min(self.remaining)
        } else {
            buffered
        }
    }

    /// Next payload byte, `None` once the terminating chunk was seen.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Look at the next payload byte without consuming it.
    pub fn peek(&mut self) -> io::Result<Option<u8>> {
        if self.peeked.is_none() {
            self.peeked = self.read_byte()?;
        }
        Ok(self.peeked)
    }

    #[cfg(test)]
    pub fn is_done(&self) -> bool {
        self.done && self.peeked.is_none()
    }

    /// Read the next chunk-size line. Returns false when the stream ended.
    fn next_chunk(&mut self) -> io::Result<bool> {
        let mut line = Vec::with_capacity(16);
        (&mut self.inner)
            .take(MAX_CHUNK_HEADER_LEN as u64)
            .read_until(b'\n', &mut line)?;
        if line.last() != Some(&b'\n') {
            self.discard_line()?;
        }

        let size = parse_chunk_size(&line);
        if size == 0 {
            self.done = true;
            return Ok(false);
        }
        self.remaining = size;
        Ok(true)
    }

    /// Skip the rest of an over-long chunk-size line, up to and including LF.
    fn discard_line(&mut self) -> io::Result<()> {
        loop {
            let buf = self.inner.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    self.inner.consume(i + 1);
                    return Ok(());
                }
                None => {
                    let n = buf.len();
                    self.inner.consume(n);
                }
            }
        }
    }

    /// Drop the CRLF that trails every chunk's payload. A bare LF is accepted.
    fn consume_crlf(&mut self) -> io::Result<()> {
        for expected in [b'\r', b'\n'] {
            let buf = self.inner.fill_buf()?;
            if buf.first() == Some(&expected) {
                self.inner.consume(1);
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(byte) = self.peeked.take() {
            buf[0] = byte;
            return Ok(1);
        }
        if self.done {
            return Ok(0);
        }
        if self.remaining == 0 && !self.next_chunk()? {
            return Ok(0);
        }

        let want = buf.len().min(self.remaining);
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "chunked body ended inside a chunk",
            ));
        }
        self.remaining -= n;
        if self.remaining == 0 {
            self.consume_crlf()?;
        }
        Ok(n)
    }
}

/// Size from a chunk-size line: the leading hex digits before any `;`.
/// Anything unparsable is 0, which ends the stream.
fn parse_chunk_size(line: &[u8]) -> usize {
    let Ok(text) = std::str::from_utf8(line) else {
        return 0;
    };
    let field = text.split(';').next().unwrap_or("").trim();
    let digits_end = field
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(field.len());
    usize::from_str_radix(&field[..digits_end], 16).unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Encode `payload` as chunked framing using `sizes` cyclically.
    pub(crate) fn encode_chunked(payload: &[u8], sizes: &[usize], with_ext: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offset = 0;
        let mut i = 0;
        while offset < payload.len() {
            let size = sizes[i % sizes.len()].max(1).min(payload.len() - offset);
            if with_ext && i % 2 == 1 {
                out.extend_from_slice(format!("{size:x};name=value\r\n").as_bytes());
            } else {
                out.extend_from_slice(format!("{size:X}\r\n").as_bytes());
            }
            out.extend_from_slice(&payload[offset..offset + size]);
            out.extend_from_slice(b"\r\n");
            offset += size;
            i += 1;
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    }

    /// Hands out the wrapped bytes in caller-chosen fragment sizes.
    struct Fragmented {
        data: Vec<u8>,
        pos: usize,
        fragments: Vec<usize>,
        calls: usize,
    }

    impl Read for Fragmented {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let frag = self.fragments[self.calls % self.fragments.len()].max(1);
            self.calls += 1;
            let n = frag.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn decodes_multiple_chunks() {
        let raw = b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n";
        let mut out = String::new();
        ChunkedReader::new(&raw[..]).read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello, world");
    }

    #[test]
    fn ignores_chunk_extensions_and_case() {
        let raw = b"A;foo=bar\r\n0123456789\r\na\r\nabcdefghij\r\n0;end\r\n\r\n";
        let mut out = Vec::new();
        ChunkedReader::new(&raw[..]).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123456789abcdefghij");
    }

    #[test]
    fn unparsable_size_line_ends_stream() {
        let raw = b"3\r\nabc\r\nzz\r\nnever\r\n";
        let mut reader = ChunkedReader::new(&raw[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
        assert!(reader.is_done());
    }

    #[test]
    fn byte_reads_and_peek() {
        let raw = b"2\r\nab\r\n1\r\nc\r\n0\r\n\r\n";
        let mut reader = ChunkedReader::new(&raw[..]);
        assert_eq!(reader.peek().unwrap(), Some(b'a'));
        assert_eq!(reader.peek().unwrap(), Some(b'a'));
        assert_eq!(reader.available(), 1);
        assert_eq!(reader.read_byte().unwrap(), Some(b'a'));
        assert_eq!(reader.read_byte().unwrap(), Some(b'b'));
        assert_eq!(reader.read_byte().unwrap(), Some(b'c'));
        assert_eq!(reader.read_byte().unwrap(), None);
        assert_eq!(reader.peek().unwrap(), None);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn available_is_capped_by_current_chunk() {
        let raw = b"3\r\nabcdef\r\n";
        let mut reader = ChunkedReader::new(&raw[..]);
        assert_eq!(reader.available(), 0, "nothing buffered before the first read");
        reader.read_byte().unwrap();
        assert_eq!(reader.available(), 2);
    }

    #[test]
    fn long_extension_does_not_leak_into_payload() {
        let mut raw = format!("5;name={}\r\nhello\r\n", "x".repeat(80)).into_bytes();
        raw.extend_from_slice(format!("1;{}\r\n!\r\n0\r\n\r\n", "y".repeat(200)).as_bytes());
        let source = Fragmented { data: raw, pos: 0, fragments: vec![7, 3], calls: 0 };

        let mut out = String::new();
        ChunkedReader::new(source).read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello!");
    }

    #[test]
    fn truncated_chunk_is_an_error() {
        let raw = b"10\r\nshort";
        let mut out = Vec::new();
        let err = ChunkedReader::new(&raw[..]).read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn json_parses_across_chunk_boundaries() {
        let body = br#"{"gold":3,"name":"Canada"}"#;
        let raw = encode_chunked(body, &[1, 4, 2], true);
        let v: serde_json::Value = serde_json::from_reader(ChunkedReader::new(&raw[..])).unwrap();
        assert_eq!(v["gold"], 3);
        assert_eq!(v["name"], "Canada");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Decoded output equals the payload whatever the chunking and
        /// however the source fragments delivery.
        #[test]
        fn prop_reassembles_payload(
            payload in prop::collection::vec(any::<u8>(), 0..2048),
            sizes in prop::collection::vec(1usize..300, 1..8),
            fragments in prop::collection::vec(1usize..17, 1..8),
            with_ext in any::<bool>(),
        ) {
            let data = encode_chunked(&payload, &sizes, with_ext);
            let source = Fragmented { data, pos: 0, fragments, calls: 0 };
            let mut reader = ChunkedReader::new(source);

            let mut out = Vec::new();
            while let Some(byte) = reader.read_byte().unwrap() {
                out.push(byte);
            }
            prop_assert_eq!(out, payload);
        }
    }
}
