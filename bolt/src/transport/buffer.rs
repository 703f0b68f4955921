use std::collections::VecDeque;
use std::io;

use super::chunk::{Chunk, ChunkPool};

/// A dynamically sized, double-ended, chunk-backed FIFO byte queue. Data is
/// appended at the head and read from the tail. The connection state machine
/// (`crate::connection`) keeps one `Buffer` for inbound bytes and one for
/// outbound bytes, so a PackStream message can be assembled or parsed without
/// copying it into one contiguous allocation up front.
///
/// Bolt connections in this crate use blocking sockets (spec.md §5), so
/// `WouldBlock` from `ingress`/`egress` in practice only shows up against the
/// non-blocking test doubles below; ported as-is from the teacher's mio-based
/// `net::buffer::Buffer` since the chunk bookkeeping is identical either way.
pub struct Buffer {
    chunks: VecDeque<Chunk>,
    pool: ChunkPool,
}

impl Buffer {
    #[inline]
    pub fn new() -> Buffer {
        let mut chunks = VecDeque::new();
        chunks.push_back(Chunk::new());
        Buffer { chunks, pool: ChunkPool::new() }
    }

    /// True once every chunk has been fully drained.
    pub fn is_empty(&self) -> bool {
        self.chunks.len() == 1 && self.chunks[0].remaining_data() == 0
    }

    /// Total unread bytes currently held.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Chunk::remaining_data).sum()
    }

    /// Write the data from the buffer to the supplied writer. Returns the
    /// number of bytes written once all data is flushed or the next write
    /// would block.
    pub fn egress<W: io::Write>(&mut self, mut writer: W) -> io::Result<usize> {
        let mut total_count = 0usize;

        loop {
            match self.write(&mut writer) {
                Ok(write_count) => {
                    total_count += write_count;

                    if self.chunks.len() > 1 {
                        self.pool.reclaim(self.chunks.pop_front().unwrap());
                    } else {
                        return Ok(total_count);
                    }
                }
                Err(e) => {
                    if e.kind() == io::ErrorKind::WouldBlock {
                        return Ok(total_count);
                    } else {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Read data from the reader into the buffer until the source is
    /// exhausted or the next read would block.
    pub fn ingress<R: io::Read>(&mut self, mut reader: R) -> io::Result<usize> {
        let mut total_count = 0usize;

        loop {
            match self.read(&mut reader) {
                Ok(read_count) => {
                    total_count += read_count;
                    self.chunks.push_back(self.pool.alloc())
                }
                Err(e) => {
                    if e.kind() == io::ErrorKind::WouldBlock {
                        return Ok(total_count);
                    } else {
                        return Err(e);
                    }
                }
            }
        }
    }

    #[inline]
    fn write<W: io::Write>(&mut self, writer: &mut W) -> io::Result<usize> {
        let mut total_count = 0usize;
        let chunk = self.chunks.front_mut().unwrap();

        loop {
            let write_count = writer.write(chunk.readable_slice())?;
            total_count += write_count;

            if write_count == 0 && chunk.remaining_data() > 0 {
                return Err(io::ErrorKind::WouldBlock.into());
            }

            chunk.advance(write_count);

            if chunk.remaining_data() == 0 {
                return Ok(total_count);
            }
        }
    }

    #[inline]
    fn read<R: io::Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        let mut total_count = 0usize;
        let chunk = self.chunks.back_mut().unwrap();

        loop {
            let read_count = reader.read(chunk.writeable_slice())?;
            total_count += read_count;

            if read_count == 0 && chunk.capacity() > 0 {
                return Err(io::ErrorKind::WouldBlock.into());
            }

            chunk.expand(read_count);

            if chunk.capacity() == 0 {
                return Ok(total_count);
            }
        }
    }
}

impl io::Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.egress(buf)
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ingress(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
