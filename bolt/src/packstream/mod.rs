//! PackStream: the self-describing binary serialization Bolt packs values
//! in (spec.md §4.1). [`pack`]/[`Packer`] turn a [`crate::value::Value`]
//! into bytes; [`unpack`]/[`Unpacker`] turn bytes back into one.

pub mod marker;
mod pack;
mod unpack;

pub use pack::{pack, Packer};
pub use unpack::{unpack, Unpacker};

#[cfg(test)]
mod roundtrip_tests {
    use super::*;
    use crate::value::{Structure, Value};

    fn assert_roundtrips(value: Value) {
        let bytes = pack(&value).unwrap();
        let parsed = unpack(&bytes).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn roundtrips_every_scalar_kind() {
        assert_roundtrips(Value::Null);
        assert_roundtrips(Value::Boolean(true));
        assert_roundtrips(Value::Boolean(false));
        assert_roundtrips(Value::Integer(-16));
        assert_roundtrips(Value::Integer(128));
        assert_roundtrips(Value::Integer(i64::MIN));
        assert_roundtrips(Value::Float(std::f64::consts::PI));
        assert_roundtrips(Value::from("hello, bolt"));
        assert_roundtrips(Value::from(vec![1u8, 2, 3, 255]));
    }

    #[test]
    fn roundtrips_nested_containers() {
        let value: Value = vec![
            ("values".to_string(), Value::from(vec![Value::Integer(1), Value::Null, Value::from("x")])),
            ("node".to_string(), Value::Structure(Structure::new(0x4E, vec![Value::Integer(1)]))),
        ]
        .into_iter()
        .collect();

        assert_roundtrips(value);
    }

    #[test]
    fn large_string_uses_wide_length_prefix() {
        let big = "a".repeat(70_000);
        assert_roundtrips(Value::from(big));
    }
}
