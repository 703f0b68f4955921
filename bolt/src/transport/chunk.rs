/// Size of one internal memory chunk backing a connection's read/write
/// buffers. Unrelated to the Bolt wire chunk size cap (0xFFFF, see
/// `transport::framing`) - this is pure storage, recycled through a
/// `ChunkPool` the way `t51core::networking::chunk`/`chunkpool` do.
pub(crate) const CHUNK_SIZE: usize = 8192;

/// A linear byte memory chunk. Consuming data from the chunk advances the
/// start cursor; writing to it advances the end cursor. When the start
/// cursor reaches the end cursor the chunk is reset to the empty state.
pub struct Chunk {
    data: Box<[u8; CHUNK_SIZE]>,
    start: usize,
    end: usize,
}

impl Chunk {
    #[inline]
    pub fn new() -> Chunk {
        Chunk { data: Box::new([0; CHUNK_SIZE]), start: 0, end: 0 }
    }

    /// Free capacity in the chunk.
    #[inline]
    pub fn capacity(&self) -> usize {
        CHUNK_SIZE - self.end
    }

    /// Remaining data in the chunk.
    #[inline]
    pub fn remaining_data(&self) -> usize {
        self.end - self.start
    }

    /// Advance the start cursor, as if a read has happened.
    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.validate_advance(count);
        self.start += count;
        self.check_clear();
    }

    /// Advance the end cursor, as if a write has happened.
    #[inline]
    pub fn expand(&mut self, count: usize) {
        let new_end = self.end + count;
        if new_end > CHUNK_SIZE {
            panic!("Attempted to expand beyond chunk size")
        }
        self.end = new_end;
    }

    /// Slice of the readable part of the chunk.
    #[inline]
    pub fn readable_slice(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    /// Slice of the writeable part of the chunk.
    #[inline]
    pub fn writeable_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.end..CHUNK_SIZE]
    }

    #[inline]
    fn check_clear(&mut self) {
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    #[inline]
    fn validate_advance(&self, count: usize) {
        if self.start + count > self.end {
            panic!("Attempted to advance past chunk edge")
        }
    }
}

/// Simple pool of chunks, avoiding reallocation of the 8KiB backing array
/// once a connection has warmed up.
pub struct ChunkPool {
    pool: Vec<Chunk>,
}

impl ChunkPool {
    pub fn new() -> ChunkPool {
        ChunkPool { pool: Vec::new() }
    }

    /// Creates a new chunk if there are none available. Provides an
    /// existing one otherwise.
    pub fn alloc(&mut self) -> Chunk {
        self.pool.pop().unwrap_or_else(Chunk::new)
    }

    /// Reclaim the supplied chunk into the pool.
    pub fn reclaim(&mut self, chunk: Chunk) {
        self.pool.push(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_empty() {
        let chunk = Chunk::new();
        assert_eq!(chunk.capacity(), CHUNK_SIZE);
        assert_eq!(chunk.remaining_data(), 0);
    }

    #[test]
    fn expand_then_advance_resets_to_empty() {
        let mut chunk = Chunk::new();
        chunk.expand(5);
        assert_eq!(chunk.remaining_data(), 5);
        chunk.advance(5);
        assert_eq!(chunk.remaining_data(), 0);
        assert_eq!(chunk.capacity(), CHUNK_SIZE);
    }

    #[test]
    #[should_panic(expected = "Attempted to advance past chunk edge")]
    fn advance_past_end_panics() {
        let mut chunk = Chunk::new();
        chunk.expand(5);
        chunk.advance(6);
    }

    #[test]
    #[should_panic(expected = "Attempted to expand beyond chunk size")]
    fn expand_past_capacity_panics() {
        let mut chunk = Chunk::new();
        chunk.expand(CHUNK_SIZE + 1);
    }

    #[test]
    fn pool_reuses_reclaimed_chunks() {
        let mut pool = ChunkPool::new();
        let chunk = pool.alloc();
        pool.reclaim(chunk);
        assert_eq!(pool.pool.len(), 1);
        let _ = pool.alloc();
        assert_eq!(pool.pool.len(), 0);
    }
}
