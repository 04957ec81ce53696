use std::cmp::min;
use std::io::{Read, Write};

/// A ring byte buffer sitting between the transport stream and the protocol
/// decoders.
///
/// Bytes read from the stream are appended at the tail; decoders consume from
/// the head. The buffer never reallocates, so a stalled consumer applies
/// backpressure instead of growing without bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RingByteBuffer {
    buf: Vec<u8>,
    head: usize,
    size: usize,
}

impl RingByteBuffer {
    /// Creates a new `RingByteBuffer` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> RingByteBuffer {
        RingByteBuffer {
            buf: vec![0; capacity],
            head: 0,
            size: 0,
        }
    }

    /// Returns the number of bytes currently stored in the buffer.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the buffer contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the total capacity of the buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns the amount of free space left in the buffer in bytes.
    pub fn free_space(&self) -> usize {
        self.buf.len() - self.size
    }

    fn tail(&self) -> usize {
        (self.head + self.size) % self.buf.len()
    }

    /// Returns the contiguous readable portion at the head of the buffer.
    ///
    /// When the stored data wraps around the end of the backing storage the
    /// slice covers only the part up to the wrap point; consume it with
    /// [`skip_bytes`](RingByteBuffer::skip_bytes) and ask again for the rest.
    pub fn current_read_slice(&self) -> &[u8] {
        let end = min(self.head + self.size, self.buf.len());
        &self.buf[self.head..end]
    }

    /// Copies up to `dst.len()` bytes from the head of the buffer into `dst`
    /// without consuming them. Returns the number of bytes copied.
    pub fn peek_into(&self, dst: &mut [u8]) -> usize {
        let n = min(self.size, dst.len());
        for (i, slot) in dst.iter_mut().take(n).enumerate() {
            *slot = self.buf[(self.head + i) % self.buf.len()];
        }
        n
    }

    /// Drops up to `bytes` bytes from the head of the buffer.
    /// Returns how many bytes were actually skipped.
    pub fn skip_bytes(&mut self, bytes: usize) -> usize {
        let skipped = min(self.size, bytes);
        self.head = (self.head + skipped) % self.buf.len();
        self.size -= skipped;
        skipped
    }

    fn current_write_slice(&mut self) -> &mut [u8] {
        let current_end = self.tail();
        let write_buf_end = min(self.buf.len(), current_end + self.free_space());
        &mut self.buf[current_end..write_buf_end]
    }

    fn mark_bytes_as_written(&mut self, bytes: usize) {
        let written = min(self.free_space(), bytes);
        self.size += written;
    }

    fn partial_read_from(&mut self, upstream: &mut impl Read) -> std::io::Result<usize> {
        if self.current_write_slice().is_empty() {
            return Ok(0);
        }

        match upstream.read(self.current_write_slice()) {
            Ok(read) => {
                self.mark_bytes_as_written(read);
                Ok(read)
            }
            Err(err)
                if err.kind() == std::io::ErrorKind::TimedOut
                    || err.kind() == std::io::ErrorKind::WouldBlock =>
            {
                // A transport configured with a short read timeout reports
                // "no data yet" this way; treat it as an empty read.
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    /// Fills the buffer from an upstream `Read` source, handling the wrap
    /// around the end of the backing storage. Returns the total number of
    /// bytes read. Transport timeouts count as zero-byte reads.
    pub fn read_from(&mut self, upstream: &mut impl Read) -> std::io::Result<usize> {
        let read = self.partial_read_from(upstream)?;
        let latter_read = self.partial_read_from(upstream)?;
        Ok(read + latter_read)
    }
}

impl Read for RingByteBuffer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = {
            let slice = self.current_read_slice();
            let read = min(slice.len(), buf.len());
            buf[0..read].clone_from_slice(&slice[0..read]);
            read
        };
        self.skip_bytes(read);

        let latter_read = {
            let slice = self.current_read_slice();
            let latter_read = min(slice.len(), buf.len() - read);
            buf[read..read + latter_read].clone_from_slice(&slice[0..latter_read]);
            latter_read
        };
        self.skip_bytes(latter_read);

        Ok(read + latter_read)
    }
}

impl Write for RingByteBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = {
            let slice = self.current_write_slice();
            let written = min(slice.len(), buf.len());
            slice[0..written].clone_from_slice(&buf[0..written]);
            written
        };
        self.mark_bytes_as_written(written);

        let latter_written = {
            let slice = self.current_write_slice();
            let latter_written = min(slice.len(), buf.len() - written);
            slice[0..latter_written].clone_from_slice(&buf[written..written + latter_written]);
            latter_written
        };
        self.mark_bytes_as_written(latter_written);

        Ok(written + latter_written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
