use std::io::{self, Read};

/// Streaming guard that fails the read once JSON nesting exceeds `limit`.
///
/// Tracks `[`/`{` depth outside string literals as bytes pass through, so an
/// over-deep document is rejected before the decoder allocates for it.
pub struct NestingGuard<R> {
    inner: R,
    limit: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl<R: Read> NestingGuard<R> {
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            limit,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    fn scan(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &b in bytes {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'[' | b'{' => {
                    self.depth += 1;
                    if self.depth > self.limit {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("JSON nesting deeper than {}", self.limit),
                        ));
                    }
                }
                b']' | b'}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for NestingGuard<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.scan(&buf[..n])?;
        Ok(n)
    }
}
