//! Line reader for child-process output that tolerates invalid UTF-8.
//!
//! Build tools print in whatever encoding the host locale uses. A stray
//! Latin-1 byte must not end the stream, so each line is decoded lossily.
use std::io;
use std::mem;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Newline-delimited lines with `\n` / `\r\n` stripped and invalid UTF-8
/// replaced by U+FFFD.
#[derive(Debug)]
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R> LossyLines<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Next line, or `None` at end of stream. Cancel safe: bytes of a
    /// partially read line stay buffered for the next call.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let mut raw = mem::take(&mut self.buf);
        if raw.last() == Some(&b'\n') {
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }
}
