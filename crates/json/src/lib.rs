//! Small streaming JSON reader and writer.
//!
//! This is the on-disk format of the document cache indexes. It is not a
//! general purpose JSON library:
//! - maps keep insertion order, which is part of what gets written to disk,
//! - maps and lists can be read entry by entry through a listener and written
//!   straight from an iterator, so large indexes never need to be collected,
//! - numbers are canonicalised, so `2.0` is read and written as `2`,
//! - decode errors carry the 1-based line and column of the offending
//!   character.

pub mod error;
mod reader;
mod value;
mod writer;

use std::io::Read;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::reader::Reader;
pub use crate::value::{Map, Number, Value};
pub use crate::writer::{Displayed, ToJson, Writer};

/// Parses a single value from a string.
pub fn parse(text: &str) -> Result<Value> {
    Reader::from_text(text).read_object()
}

/// Parses a single value from a UTF-8 byte stream.
pub fn from_reader(input: impl Read) -> Result<Value> {
    Reader::new(input).read_object()
}

/// Serialises a value without any whitespace.
pub fn to_string<T: ToJson + ?Sized>(value: &T) -> Result<String> {
    let mut writer = Writer::compact(Vec::new());
    writer.append_object(value)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Serialises a value with two-space indentation.
pub fn to_string_pretty<T: ToJson + ?Sized>(value: &T) -> Result<String> {
    let mut writer = Writer::pretty(Vec::new());
    writer.append_object(value)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialise() {
        let value = parse(r#" { "ids" : [ 1 , 2 ] } "#).unwrap();
        assert_eq!(to_string(&value).unwrap(), r#"{"ids":[1,2]}"#);
        assert_eq!(to_string_pretty(&value).unwrap(), "{\n  \"ids\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn test_from_reader() {
        let bytes: &[u8] = "[\"Zürich\"]".as_bytes();
        assert_eq!(from_reader(bytes).unwrap(), Value::from(vec![Value::from("Zürich")]));
    }
}
