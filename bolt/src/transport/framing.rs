use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Chunks too large to express in a 16-bit length prefix (spec.md §4.2).
pub const MAX_CHUNK_SIZE: usize = 0xFFFF;

/// Splits `message` into one or more non-empty chunks followed by a
/// terminating empty chunk and writes the whole frame to `out` (spec.md
/// §4.2, "Chunk frame"). Every non-terminating chunk is exactly
/// `MAX_CHUNK_SIZE` payload bytes except the last, matching the testable
/// property in spec.md §8 ("Chunking").
pub fn write_message<W: Write>(out: &mut W, message: &[u8]) -> Result<()> {
    let mut remaining = message;

    loop {
        let take = remaining.len().min(MAX_CHUNK_SIZE);
        let (chunk, rest) = remaining.split_at(take);
        out.write_u16::<BigEndian>(chunk.len() as u16)?;
        out.write_all(chunk)?;
        remaining = rest;

        if remaining.is_empty() {
            break;
        }
    }

    // Terminating empty chunk: two zero bytes.
    out.write_u16::<BigEndian>(0)?;
    Ok(())
}

/// Reads chunks from `input` until the terminating empty chunk arrives and
/// returns the concatenated payload. A short read in the middle of a chunk
/// (zero bytes before the chunk is complete) surfaces as
/// `Error::EndOfTransmission` via `Error::from(io::Error)`'s `UnexpectedEof`
/// mapping (spec.md §4.2, "Blocking I/O semantics").
pub fn read_message<R: Read>(input: &mut R) -> Result<Vec<u8>> {
    let mut message = Vec::new();

    loop {
        let len = input.read_u16::<BigEndian>()? as usize;
        if len == 0 {
            break;
        }

        let start = message.len();
        message.resize(start + len, 0);
        input.read_exact(&mut message[start..])?;
    }

    Ok(message)
}

/// Like [`read_message`], but returns `Ok(None)` instead of an error when the
/// peer closes the connection cleanly before sending any chunk header at all
/// (as opposed to mid-chunk, which is still `EndOfTransmission`). Used by the
/// connection state machine to distinguish a graceful close between messages
/// from a truncated one.
pub fn try_read_message<R: Read>(input: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 2];
    match input.read(&mut len_buf[..1]) {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(e) => return Err(Error::from(e)),
    }
    input.read_exact(&mut len_buf[1..])?;
    let len = u16::from_be_bytes(len_buf) as usize;

    if len == 0 {
        return Ok(Some(Vec::new()));
    }

    let mut message = vec![0u8; len];
    input.read_exact(&mut message)?;

    loop {
        let chunk_len = input.read_u16::<BigEndian>()? as usize;
        if chunk_len == 0 {
            break;
        }
        let start = message.len();
        message.resize(start + chunk_len, 0);
        input.read_exact(&mut message[start..])?;
    }

    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn small_message_is_one_chunk_plus_terminator() {
        let mut out = Vec::new();
        write_message(&mut out, &[1, 2, 3]).unwrap();
        assert_eq!(out, vec![0x00, 0x03, 1, 2, 3, 0x00, 0x00]);
    }

    #[test]
    fn empty_message_is_just_the_terminator() {
        let mut out = Vec::new();
        write_message(&mut out, &[]).unwrap();
        assert_eq!(out, vec![0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn oversized_message_splits_into_full_chunks_plus_remainder() {
        let message = vec![7u8; MAX_CHUNK_SIZE + 10];
        let mut out = Vec::new();
        write_message(&mut out, &message).unwrap();

        // First chunk header: 0xFFFF payload bytes.
        assert_eq!(&out[0..2], &[0xFF, 0xFF]);
        let second_header_at = 2 + MAX_CHUNK_SIZE;
        assert_eq!(&out[second_header_at..second_header_at + 2], &[0x00, 0x0A]);
        let terminator_at = second_header_at + 2 + 10;
        assert_eq!(&out[terminator_at..terminator_at + 2], &[0x00, 0x00]);
        assert_eq!(out.len(), terminator_at + 2);
    }

    #[test]
    fn roundtrips_through_read_message() {
        let message = vec![9u8; MAX_CHUNK_SIZE + 1];
        let mut out = Vec::new();
        write_message(&mut out, &message).unwrap();

        let mut cursor = Cursor::new(out);
        let read_back = read_message(&mut cursor).unwrap();
        assert_eq!(read_back, message);
    }

    #[test]
    fn truncated_chunk_is_end_of_transmission() {
        // Header promises 5 bytes, only 2 follow.
        let mut cursor = Cursor::new(vec![0x00, 0x05, 1, 2]);
        let err = read_message(&mut cursor).unwrap_err();
        assert_eq!(err, Error::EndOfTransmission);
    }

    #[test]
    fn clean_close_before_any_header_is_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let result = try_read_message(&mut cursor).unwrap();
        assert!(result.is_none());
    }
}
