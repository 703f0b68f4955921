use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Magic preamble the client writes before offering candidate versions
/// (spec.md §4.2, "Handshake").
pub const PREAMBLE: u32 = 0x6060_B017;

/// The handshake always offers exactly four candidate versions, most
/// preferred first, zero-padded if fewer are supported.
pub const CANDIDATE_COUNT: usize = 4;

/// Runs the client side of the handshake over an already-connected stream:
/// writes the preamble and candidate versions, then reads back the server's
/// chosen version. Version 0 means "no agreement", which this turns into
/// `Error::ProtocolUnsupported` rather than handing back a meaningless
/// version to the caller.
pub fn negotiate<S: Read + Write>(stream: &mut S, candidates: [u32; CANDIDATE_COUNT]) -> Result<u32> {
    stream.write_u32::<BigEndian>(PREAMBLE)?;
    for candidate in &candidates {
        stream.write_u32::<BigEndian>(*candidate)?;
    }

    let agreed = stream.read_u32::<BigEndian>()?;
    if agreed == 0 {
        return Err(Error::ProtocolUnsupported);
    }

    Ok(agreed)
}

/// Runs the server side of the handshake: reads the preamble and candidate
/// versions from the client and returns them for the caller to pick from.
/// Not exercised by the driver itself, but kept alongside `negotiate` since
/// both directions share the wire layout and a server-mode test doubles as
/// documentation of it.
pub fn read_client_offer<S: Read>(stream: &mut S) -> Result<[u32; CANDIDATE_COUNT]> {
    let preamble = stream.read_u32::<BigEndian>()?;
    if preamble != PREAMBLE {
        return Err(Error::ProtocolViolation("handshake preamble mismatch"));
    }

    let mut candidates = [0u32; CANDIDATE_COUNT];
    for slot in &mut candidates {
        *slot = stream.read_u32::<BigEndian>()?;
    }
    Ok(candidates)
}

pub fn write_server_choice<S: Write>(stream: &mut S, chosen: u32) -> Result<()> {
    stream.write_u32::<BigEndian>(chosen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Loopback {
        written: Vec<u8>,
        reply: Cursor<Vec<u8>>,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reply.read(buf)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn client_writes_preamble_then_candidates() {
        let mut reply = Vec::new();
        reply.write_u32::<BigEndian>(3).unwrap();
        let mut loopback = Loopback { written: Vec::new(), reply: Cursor::new(reply) };

        let agreed = negotiate(&mut loopback, [4, 3, 0, 0]).unwrap();
        assert_eq!(agreed, 3);

        let mut expected = Vec::new();
        expected.write_u32::<BigEndian>(PREAMBLE).unwrap();
        for candidate in &[4u32, 3, 0, 0] {
            expected.write_u32::<BigEndian>(*candidate).unwrap();
        }
        assert_eq!(loopback.written, expected);
    }

    #[test]
    fn zero_version_reply_is_unsupported() {
        let mut reply = Vec::new();
        reply.write_u32::<BigEndian>(0).unwrap();
        let mut loopback = Loopback { written: Vec::new(), reply: Cursor::new(reply) };

        let err = negotiate(&mut loopback, [4, 3, 2, 1]).unwrap_err();
        assert!(matches!(err, Error::ProtocolUnsupported));
    }

    #[test]
    fn server_reads_preamble_and_four_candidates() {
        let mut offer = Vec::new();
        offer.write_u32::<BigEndian>(PREAMBLE).unwrap();
        for candidate in &[4u32, 3, 0, 0] {
            offer.write_u32::<BigEndian>(*candidate).unwrap();
        }
        let mut cursor = Cursor::new(offer);

        let candidates = read_client_offer(&mut cursor).unwrap();
        assert_eq!(candidates, [4, 3, 0, 0]);
    }

    #[test]
    fn wrong_preamble_is_a_protocol_violation() {
        let mut offer = Vec::new();
        offer.write_u32::<BigEndian>(0xDEAD_BEEF).unwrap();
        let mut cursor = Cursor::new(offer);

        let err = read_client_offer(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }
}
