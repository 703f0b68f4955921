use byteorder::{BigEndian, WriteBytesExt};

use super::marker;
use crate::error::{Error, Result};
use crate::value::Value;

/// Packs a value tree into a byte buffer, always choosing the smallest
/// wire form (spec.md §4.1, "Packing rules"). `Unpack . Pack` round-trips
/// are byte-identical for canonical encodings because there is never a
/// choice between encodings for the same logical value.
pub struct Packer<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> Packer<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> Packer<'a> {
        Packer { out }
    }

    pub fn pack(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.pack_null(),
            Value::Boolean(b) => self.pack_bool(*b),
            Value::Integer(i) => self.pack_integer(*i),
            Value::Float(f) => self.pack_float(*f),
            Value::Bytes(b) => self.pack_bytes(b),
            Value::String(s) => self.pack_string(s),
            Value::List(items) => self.pack_list(items),
            Value::Map(entries) => self.pack_map(entries),
            Value::Structure(s) => self.pack_structure(s),
        }
    }

    fn pack_null(&mut self) -> Result<()> {
        self.out.push(marker::NULL);
        Ok(())
    }

    fn pack_bool(&mut self, b: bool) -> Result<()> {
        self.out.push(if b { marker::TRUE } else { marker::FALSE });
        Ok(())
    }

    fn pack_integer(&mut self, i: i64) -> Result<()> {
        if (-16..=127).contains(&i) {
            self.out.write_i8(i as i8)?;
        } else if (i8::MIN as i64..=i8::MAX as i64).contains(&i) {
            self.out.push(marker::INT_8);
            self.out.write_i8(i as i8)?;
        } else if (i16::MIN as i64..=i16::MAX as i64).contains(&i) {
            self.out.push(marker::INT_16);
            self.out.write_i16::<BigEndian>(i as i16)?;
        } else if (i32::MIN as i64..=i32::MAX as i64).contains(&i) {
            self.out.push(marker::INT_32);
            self.out.write_i32::<BigEndian>(i as i32)?;
        } else {
            self.out.push(marker::INT_64);
            self.out.write_i64::<BigEndian>(i)?;
        }
        Ok(())
    }

    fn pack_float(&mut self, f: f64) -> Result<()> {
        self.out.push(marker::FLOAT_64);
        self.out.write_f64::<BigEndian>(f)?;
        Ok(())
    }

    fn pack_bytes(&mut self, data: &[u8]) -> Result<()> {
        match data.len() {
            len if len <= 0xFF => {
                self.out.push(marker::BYTES_8);
                self.out.write_u8(len as u8)?;
            }
            len if len <= 0xFFFF => {
                self.out.push(marker::BYTES_16);
                self.out.write_u16::<BigEndian>(len as u16)?;
            }
            len if len <= u32::MAX as usize => {
                self.out.push(marker::BYTES_32);
                self.out.write_u32::<BigEndian>(len as u32)?;
            }
            _ => return Err(Error::ProtocolViolation("byte array length overflows 32 bits")),
        }
        self.out.extend_from_slice(data);
        Ok(())
    }

    fn pack_string(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        match bytes.len() {
            len if len < 16 => self.out.push(marker::TINY_STRING | len as u8),
            len if len <= 0xFF => {
                self.out.push(marker::STRING_8);
                self.out.write_u8(len as u8)?;
            }
            len if len <= 0xFFFF => {
                self.out.push(marker::STRING_16);
                self.out.write_u16::<BigEndian>(len as u16)?;
            }
            len if len <= u32::MAX as usize => {
                self.out.push(marker::STRING_32);
                self.out.write_u32::<BigEndian>(len as u32)?;
            }
            _ => return Err(Error::ProtocolViolation("string length overflows 32 bits")),
        }
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    fn pack_list(&mut self, items: &[Value]) -> Result<()> {
        match items.len() {
            len if len < 16 => self.out.push(marker::TINY_LIST | len as u8),
            len if len <= 0xFF => {
                self.out.push(marker::LIST_8);
                self.out.write_u8(len as u8)?;
            }
            len if len <= 0xFFFF => {
                self.out.push(marker::LIST_16);
                self.out.write_u16::<BigEndian>(len as u16)?;
            }
            len if len <= u32::MAX as usize => {
                self.out.push(marker::LIST_32);
                self.out.write_u32::<BigEndian>(len as u32)?;
            }
            _ => return Err(Error::ProtocolViolation("list length overflows 32 bits")),
        }
        for item in items {
            self.pack(item)?;
        }
        Ok(())
    }

    fn pack_map(&mut self, entries: &indexmap::IndexMap<String, Value>) -> Result<()> {
        match entries.len() {
            len if len < 16 => self.out.push(marker::TINY_MAP | len as u8),
            len if len <= 0xFF => {
                self.out.push(marker::MAP_8);
                self.out.write_u8(len as u8)?;
            }
            len if len <= 0xFFFF => {
                self.out.push(marker::MAP_16);
                self.out.write_u16::<BigEndian>(len as u16)?;
            }
            len if len <= u32::MAX as usize => {
                self.out.push(marker::MAP_32);
                self.out.write_u32::<BigEndian>(len as u32)?;
            }
            _ => return Err(Error::ProtocolViolation("map length overflows 32 bits")),
        }
        // Duplicate keys are not rejected here; decoders treat last-wins
        // (spec.md §4.1), and `IndexMap` itself cannot hold duplicates, so
        // this only matters for hand-built maps that never reach this type.
        for (key, value) in entries {
            self.pack_string(key)?;
            self.pack(value)?;
        }
        Ok(())
    }

    fn pack_structure(&mut self, structure: &crate::value::Structure) -> Result<()> {
        // Structures only have a tiny form (spec.md §4.1): field count >= 16
        // has nowhere to go on the wire.
        if structure.fields.len() >= 16 {
            return Err(Error::ProtocolViolation("structure field count must be < 16"));
        }
        self.out.push(marker::TINY_STRUCT | structure.fields.len() as u8);
        self.out.push(structure.signature);
        for field in &structure.fields {
            self.pack(field)?;
        }
        Ok(())
    }
}

/// Packs a single value into a freshly allocated buffer.
pub fn pack(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    Packer::new(&mut out).pack(value)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Structure;

    #[test]
    fn packs_tiny_map_scenario() {
        // {"x": 1, "y": [2, 3]} -> A2 81 78 01 81 79 92 02 03 (spec.md §8 scenario 1)
        let value: Value = vec![
            ("x".to_string(), Value::Integer(1)),
            ("y".to_string(), Value::from(vec![Value::Integer(2), Value::Integer(3)])),
        ]
        .into_iter()
        .collect();

        let bytes = pack(&value).unwrap();
        assert_eq!(bytes, vec![0xA2, 0x81, 0x78, 0x01, 0x81, 0x79, 0x92, 0x02, 0x03]);
    }

    #[test]
    fn integer_boundaries_pick_smallest_marker() {
        assert_eq!(pack(&Value::Integer(-17)).unwrap()[0], marker::INT_8);
        assert_eq!(pack(&Value::Integer(-16)).unwrap(), vec![0xF0]);
        assert_eq!(pack(&Value::Integer(-1)).unwrap(), vec![0xFF]);
        assert_eq!(pack(&Value::Integer(0)).unwrap(), vec![0x00]);
        assert_eq!(pack(&Value::Integer(127)).unwrap(), vec![0x7F]);
        assert_eq!(pack(&Value::Integer(128)).unwrap()[0], marker::INT_16);
        assert_eq!(pack(&Value::Integer(32767)).unwrap()[0], marker::INT_16);
        assert_eq!(pack(&Value::Integer(32768)).unwrap()[0], marker::INT_32);
        assert_eq!(pack(&Value::Integer(2_147_483_647)).unwrap()[0], marker::INT_32);
        assert_eq!(pack(&Value::Integer(2_147_483_648)).unwrap()[0], marker::INT_64);
        assert_eq!(pack(&Value::Integer(i64::MAX)).unwrap()[0], marker::INT_64);
        assert_eq!(pack(&Value::Integer(i64::MIN)).unwrap()[0], marker::INT_64);
    }

    #[test]
    fn float_is_always_eight_bytes_big_endian() {
        let bytes = pack(&Value::Float(1.5)).unwrap();
        assert_eq!(bytes[0], marker::FLOAT_64);
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn oversized_structure_is_a_protocol_violation() {
        let fields: Vec<Value> = (0..16).map(Value::Integer).collect();
        let structure = Structure::new(0x10, fields);
        let err = pack(&Value::Structure(structure)).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }
}
