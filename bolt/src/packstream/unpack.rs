use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use indexmap::IndexMap;

use super::marker;
use crate::error::{Error, Result};
use crate::value::{Structure, Value};

/// Parses a byte buffer back into a value tree. Every marker dispatches to
/// a reader that recursively parses its children (spec.md §4.1,
/// "Unpacking rules"). Truncated input surfaces as `Error::EndOfTransmission`
/// because reading past the end of the cursor raises `UnexpectedEof`, which
/// `Error::from(io::Error)` maps to that variant.
pub struct Unpacker<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Unpacker<'a> {
    pub fn new(data: &'a [u8]) -> Unpacker<'a> {
        Unpacker { cursor: Cursor::new(data) }
    }

    /// Bytes left unread in the source slice.
    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        (len - self.cursor.position()) as usize
    }

    pub fn unpack(&mut self) -> Result<Value> {
        let m = self.cursor.read_u8()?;
        self.unpack_with_marker(m)
    }

    fn unpack_with_marker(&mut self, m: u8) -> Result<Value> {
        match m {
            marker::NULL => Ok(Value::Null),
            marker::TRUE => Ok(Value::Boolean(true)),
            marker::FALSE => Ok(Value::Boolean(false)),
            marker::FLOAT_64 => Ok(Value::Float(self.cursor.read_f64::<BigEndian>()?)),
            marker::INT_8 => Ok(Value::Integer(self.cursor.read_i8()? as i64)),
            marker::INT_16 => Ok(Value::Integer(self.cursor.read_i16::<BigEndian>()? as i64)),
            marker::INT_32 => Ok(Value::Integer(self.cursor.read_i32::<BigEndian>()? as i64)),
            marker::INT_64 => Ok(Value::Integer(self.cursor.read_i64::<BigEndian>()?)),
            marker::BYTES_8 => { let len = self.read_len_u8()?; self.unpack_bytes(len) }
            marker::BYTES_16 => { let len = self.read_len_u16()?; self.unpack_bytes(len) }
            marker::BYTES_32 => { let len = self.read_len_u32()?; self.unpack_bytes(len) }
            marker::STRING_8 => { let len = self.read_len_u8()?; self.unpack_string(len) }
            marker::STRING_16 => { let len = self.read_len_u16()?; self.unpack_string(len) }
            marker::STRING_32 => { let len = self.read_len_u32()?; self.unpack_string(len) }
            marker::LIST_8 => { let len = self.read_len_u8()?; self.unpack_list(len) }
            marker::LIST_16 => { let len = self.read_len_u16()?; self.unpack_list(len) }
            marker::LIST_32 => { let len = self.read_len_u32()?; self.unpack_list(len) }
            marker::MAP_8 => { let len = self.read_len_u8()?; self.unpack_map(len) }
            marker::MAP_16 => { let len = self.read_len_u16()?; self.unpack_map(len) }
            marker::MAP_32 => { let len = self.read_len_u32()?; self.unpack_map(len) }
            m if marker::is_tiny_int(m) => Ok(Value::Integer(m as i8 as i64)),
            m if marker::is_tiny_string(m) => self.unpack_string((m & 0x0F) as usize),
            m if marker::is_tiny_list(m) => self.unpack_list((m & 0x0F) as usize),
            m if marker::is_tiny_map(m) => self.unpack_map((m & 0x0F) as usize),
            m if marker::is_tiny_struct(m) => self.unpack_structure((m & 0x0F) as usize),
            other => Err(Error::ProtocolUnsupportedType(other)),
        }
    }

    fn read_len_u8(&mut self) -> Result<usize> {
        Ok(self.cursor.read_u8()? as usize)
    }

    fn read_len_u16(&mut self) -> Result<usize> {
        Ok(self.cursor.read_u16::<BigEndian>()? as usize)
    }

    fn read_len_u32(&mut self) -> Result<usize> {
        Ok(self.cursor.read_u32::<BigEndian>()? as usize)
    }

    fn unpack_bytes(&mut self, len: usize) -> Result<Value> {
        let mut buf = vec![0u8; len];
        self.cursor.read_exact(&mut buf)?;
        Ok(Value::Bytes(buf))
    }

    fn unpack_string(&mut self, len: usize) -> Result<Value> {
        let mut buf = vec![0u8; len];
        self.cursor.read_exact(&mut buf)?;
        let s = String::from_utf8(buf).map_err(|_| Error::ProtocolViolation("string is not valid UTF-8"))?;
        Ok(Value::String(s))
    }

    fn unpack_list(&mut self, len: usize) -> Result<Value> {
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.unpack()?);
        }
        Ok(Value::List(items))
    }

    fn unpack_map(&mut self, len: usize) -> Result<Value> {
        let mut entries = IndexMap::with_capacity(len);
        for _ in 0..len {
            let key = match self.unpack()? {
                Value::String(s) => s,
                _ => return Err(Error::ProtocolViolation("map keys must be strings")),
            };
            let value = self.unpack()?;
            // Duplicate keys: last-wins (spec.md §4.1). `IndexMap::insert`
            // overwrites the value but keeps the original insertion slot;
            // that's fine here since decoders only need last-wins values,
            // not first-seen ordering for duplicate keys.
            entries.insert(key, value);
        }
        Ok(Value::Map(entries))
    }

    fn unpack_structure(&mut self, field_count: usize) -> Result<Value> {
        if field_count >= 16 {
            return Err(Error::ProtocolViolation("structure field count must be < 16"));
        }
        let signature = self.cursor.read_u8()?;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(self.unpack()?);
        }
        Ok(Value::Structure(Structure::new(signature, fields)))
    }
}

/// Parses a single value from the start of `data` and returns it together
/// with the number of bytes consumed.
pub fn unpack(data: &[u8]) -> Result<Value> {
    let mut unpacker = Unpacker::new(data);
    unpacker.unpack()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacks_tiny_map_scenario() {
        let bytes = [0xA2, 0x81, 0x78, 0x01, 0x81, 0x79, 0x92, 0x02, 0x03];
        let value = unpack(&bytes).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("x").unwrap().as_integer(), Some(1));
        let y = map.get("y").unwrap().as_list().unwrap();
        assert_eq!(y[0].as_integer(), Some(2));
        assert_eq!(y[1].as_integer(), Some(3));
    }

    #[test]
    fn truncated_input_is_end_of_transmission() {
        let bytes = [0xA2, 0x81]; // map header promising 2 entries, nothing else
        let err = unpack(&bytes).unwrap_err();
        assert_eq!(err, Error::EndOfTransmission);
    }

    #[test]
    fn unknown_marker_is_unsupported_type() {
        let err = unpack(&[0xC4]).unwrap_err();
        assert!(matches!(err, Error::ProtocolUnsupportedType(0xC4)));
    }

    #[test]
    fn oversized_struct_field_count_rejected() {
        // Tiny struct markers can never carry field_count >= 16 (4-bit
        // nibble caps at 15), so this exercises unpack_structure directly.
        let mut unpacker = Unpacker::new(&[]);
        let err = unpacker.unpack_structure(16).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }
}
