//! Line rendering into fixed-capacity buffers
//!
//! Every line has the shape
//! `<timestamp>/<identity>/<app>: <message>[: <error text>]\n`.
//! Rendering happens in stages. As soon as a stage does not fit, the
//! remaining stages are skipped and the last byte of the buffer is forced to
//! `\n`, so a line is always newline-terminated and never longer than the
//! buffer.

use std::fmt::{self, Write};

/// `fmt::Write` sink over a borrowed byte slice.
///
/// Fills as much of the slice as possible and reports `fmt::Error` on the
/// first write that does not fit.
pub struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    overflowed: bool,
}

impl<'a> BoundedWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            overflowed: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn written(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Written bytes as text, cut back to the last complete character
    pub fn as_str(&self) -> &str {
        let bytes = self.written();
        match std::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                // Prefix up to valid_up_to is valid by definition.
                std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default()
            }
        }
    }
}

impl Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.overflowed {
            return Err(fmt::Error);
        }
        let room = self.buf.len() - self.len;
        let bytes = s.as_bytes();
        if bytes.len() <= room {
            self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
            self.len += bytes.len();
            Ok(())
        } else {
            self.buf[self.len..].copy_from_slice(&bytes[..room]);
            self.len = self.buf.len();
            self.overflowed = true;
            Err(fmt::Error)
        }
    }
}

/// Everything the encoder needs to render one line
#[derive(Clone, Copy)]
pub struct LineParts<'a> {
    pub timestamp: &'a str,
    pub identity: &'a str,
    pub app: &'a str,
    pub message: fmt::Arguments<'a>,
    pub error: Option<&'a str>,
}

/// Outcome of rendering a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    pub len: usize,
    pub truncated: bool,
}

fn render_stages(out: &mut BoundedWriter<'_>, parts: &LineParts<'_>) -> fmt::Result {
    write!(out, "{}/{}/{}: ", parts.timestamp, parts.identity, parts.app)?;
    out.write_fmt(parts.message)?;
    if let Some(error) = parts.error {
        write!(out, ": {}", error)?;
    }
    out.write_str("\n")
}

/// Render `parts` into `buf`, returning the number of bytes used.
///
/// An empty buffer yields a zero-length result.
pub fn encode_line(buf: &mut [u8], parts: &LineParts<'_>) -> Encoded {
    if buf.is_empty() {
        return Encoded {
            len: 0,
            truncated: true,
        };
    }

    let cap = buf.len();
    let mut out = BoundedWriter::new(buf);
    let failed = render_stages(&mut out, parts).is_err();
    let (len, overflowed) = (out.len(), out.overflowed());

    if overflowed || (failed && len == cap) {
        buf[cap - 1] = b'\n';
        return Encoded {
            len: cap,
            truncated: true,
        };
    }
    if failed {
        // A Display impl gave up before the buffer was full.
        buf[len] = b'\n';
        return Encoded {
            len: len + 1,
            truncated: true,
        };
    }
    Encoded {
        len,
        truncated: false,
    }
}

/// Render `parts` into a growable buffer with no size limit.
pub fn encode_unbounded(out: &mut Vec<u8>, parts: &LineParts<'_>) {
    use std::io::Write as _;

    let _ = write!(out, "{}/{}/{}: ", parts.timestamp, parts.identity, parts.app);
    let _ = out.write_fmt(parts.message);
    if let Some(error) = parts.error {
        let _ = write!(out, ": {}", error);
    }
    out.push(b'\n');
}
