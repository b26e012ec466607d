use bytes::{Bytes, BytesMut};
use memchr::memchr;

/// Accumulates raw chunks and hands out complete `\n`-terminated lines.
///
/// Splitting happens on bytes, so a chunk boundary inside a multi-byte UTF-8
/// sequence or inside a `\r\n` pair is harmless: the partial tail simply waits
/// for the next chunk.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: BytesMut,
    // Bytes already scanned with no newline found; avoids rescanning the tail.
    scanned: usize,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            scanned: 0,
        }
    }

    /// Append `chunk` and push every completed line into `out`, in order.
    ///
    /// Yielded lines exclude the terminator; a trailing `\r` is stripped.
    pub fn push<E>(&mut self, chunk: &[u8], out: &mut E)
    where
        E: Extend<Bytes>,
    {
        self.buffer.extend_from_slice(chunk);
        while let Some(rel) = memchr(b'\n', &self.buffer[self.scanned..]) {
            let newline = self.scanned + rel;
            let mut line = self.buffer.split_to(newline + 1);
            line.truncate(newline);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            self.scanned = 0;
            out.extend(std::iter::once(line.freeze()));
        }
        self.scanned = self.buffer.len();
    }

    /// Bytes held back waiting for a terminator.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop the unterminated tail, returning how many bytes were discarded.
    pub fn discard(&mut self) -> usize {
        let len = self.buffer.len();
        self.buffer.clear();
        self.scanned = 0;
        len
    }
}
