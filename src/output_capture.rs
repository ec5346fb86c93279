//! Collecting the text that dynamic content and middleware produce.

//! Output is written into an `OutputCapture` instead of a global
//! stream. `capture` opens a nested region: what the closure writes
//! is handed back on success and dropped again on every other exit
//! path (errors, early returns, panics unwinding through it), so a
//! failing producer never leaks half of its output into the
//! response.

use std::{fmt, io};

#[derive(Debug, Default)]
pub struct OutputCapture {
    buf: String,
}

struct Region<'c> {
    capture: &'c mut OutputCapture,
    start: usize,
    committed: bool,
}

impl<'c> Drop for Region<'c> {
    fn drop(&mut self) {
        if !self.committed {
            self.capture.buf.truncate(self.start);
        }
    }
}

impl OutputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take everything written so far.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }

    /// Run `f` in a capture region. Returns its value together with
    /// the text it wrote; on `Err` that text is discarded.
    pub fn capture<T, E>(
        &mut self,
        f: impl FnOnce(&mut OutputCapture) -> Result<T, E>
    ) -> Result<(T, String), E> {
        let start = self.buf.len();
        let mut region = Region { capture: self, start, committed: false };
        let value = f(region.capture)?;
        let text = region.capture.buf.split_off(start);
        region.committed = true;
        Ok((value, text))
    }
}

impl fmt::Write for OutputCapture {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(s);
        Ok(())
    }
}

impl io::Write for OutputCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = std::str::from_utf8(buf).map_err(
            |e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.buf.push_str(s);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;
    use anyhow::{Result, bail};

    #[test]
    fn t_capture_released_on_every_path() {
        let mut out = OutputCapture::new();
        out.push_str("before;");
        let (v, text) = out.capture(|o| -> Result<u32> {
            write!(o, "inner {}", 1)?;
            Ok(7)
        }).unwrap();
        assert_eq!((v, text.as_str()), (7, "inner 1"));
        assert_eq!(out.as_str(), "before;");

        let r = out.capture(|o| -> Result<()> {
            o.push_str("half written");
            bail!("failed")
        });
        assert!(r.is_err());
        assert_eq!(out.as_str(), "before;");
    }

    #[test]
    fn t_nested_regions() {
        let mut out = OutputCapture::new();
        let ((inner, outer_len), text) = out.capture(|o| -> Result<_> {
            o.push_str("a");
            let (_, inner) = o.capture(|o| -> Result<()> {
                o.push_str("b");
                Ok(())
            })?;
            o.push_str("c");
            Ok((inner, o.as_str().len()))
        }).unwrap();
        assert_eq!(inner, "b");
        assert_eq!(outer_len, 2);
        assert_eq!(text, "ac");
        assert!(out.is_empty());
    }
}
