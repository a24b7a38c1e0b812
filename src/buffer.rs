use crate::pool;
use crate::{HproseError, Result};
use bytes::{Buf, Bytes, BytesMut};
use std::io::{ErrorKind, Read};

const CHUNK_SIZE: usize = 4096;

enum Source {
    Memory(Bytes),
    Stream {
        inner: Box<dyn Read + Send>,
        buf: BytesMut,
        eof: bool,
    },
}

/// Cursor over the input of a decode session.
///
/// A streaming source is read on demand with blocking reads. Everything read is kept until
/// [`ByteReader::reset`], so a back-reference can seek to any earlier position of the
/// message.
pub(crate) struct ByteReader {
    source: Source,
    pos: usize,
}

impl ByteReader {
    pub fn from_bytes(data: Bytes) -> Self {
        ByteReader {
            source: Source::Memory(data),
            pos: 0,
        }
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        let buf = pool::acquire_bytes(CHUNK_SIZE).unwrap_or_default();
        ByteReader {
            source: Source::Stream {
                inner: Box::new(reader),
                buf,
                eof: false,
            },
            pos: 0,
        }
    }

    fn data(&self) -> &[u8] {
        match &self.source {
            Source::Memory(data) => data,
            Source::Stream { buf, .. } => buf,
        }
    }

    /// Makes at least `n` unread bytes available. Returns false at end of input.
    fn fill(&mut self, n: usize) -> Result<bool> {
        let pos = self.pos;
        let (inner, buf, eof) = match &mut self.source {
            Source::Memory(data) => return Ok(data.len() - pos >= n),
            Source::Stream { inner, buf, eof } => (inner, buf, eof),
        };
        let mut chunk = [0u8; CHUNK_SIZE];
        while buf.len() - pos < n {
            if *eof {
                return Ok(false);
            }
            match inner.read(&mut chunk) {
                Ok(0) => *eof = true,
                Ok(read) => buf.extend_from_slice(&chunk[..read]),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(true)
    }

    pub fn next(&mut self) -> Result<u8> {
        if !self.fill(1)? {
            return Err(HproseError::UnexpectedEof);
        }
        let byte = self.data()[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    pub fn peek(&mut self) -> Result<Option<u8>> {
        if !self.fill(1)? {
            return Ok(None);
        }
        Ok(Some(self.data()[self.pos]))
    }

    pub fn read_exact(&mut self, n: usize) -> Result<&[u8]> {
        if !self.fill(n)? {
            return Err(HproseError::UnexpectedEof);
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data()[start..start + n])
    }

    /// Reads up to `delimiter` and consumes it. The delimiter is not part of the result.
    pub fn read_until(&mut self, delimiter: u8) -> Result<&[u8]> {
        let mut scanned = 0;
        loop {
            let unread = &self.data()[self.pos..];
            let found = unread[scanned..].iter().position(|&b| b == delimiter);
            let available = unread.len();
            if let Some(offset) = found {
                let start = self.pos;
                let end = start + scanned + offset;
                self.pos = end + 1;
                return Ok(&self.data()[start..end]);
            }
            scanned = available;
            if !self.fill(available + 1)? {
                return Err(HproseError::UnexpectedEof);
            }
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to an earlier position of the current message.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data().len());
    }

    /// Unread bytes that are already buffered. For a stream this is a lower bound.
    pub fn remaining_hint(&self) -> usize {
        self.data().len() - self.pos
    }

    /// Bytes of the current message seen so far.
    pub fn consumed_len(&self) -> usize {
        self.data().len()
    }

    /// Drops the bytes before the cursor. Earlier positions are no longer valid.
    pub fn compact(&mut self) {
        let pos = self.pos;
        match &mut self.source {
            Source::Memory(data) => data.advance(pos),
            Source::Stream { buf, .. } => buf.advance(pos),
        }
        self.pos = 0;
    }

    /// Replaces the input, returning a stream buffer to the pool.
    pub fn reset(&mut self, data: Bytes) {
        let previous = std::mem::replace(&mut self.source, Source::Memory(data));
        if let Source::Stream { buf, .. } = previous {
            pool::release_bytes(buf);
        }
        self.pos = 0;
    }
}

impl Drop for ByteReader {
    fn drop(&mut self) {
        if let Source::Stream { buf, .. } = &mut self.source {
            pool::release_bytes(std::mem::take(buf));
        }
    }
}
