//! Recursive-descent JSON reader.
//!
//! The reader pulls one character at a time from any [`Read`] source and
//! keeps a single character of lookahead. Maps and lists can be consumed
//! through a listener, one entry at a time in document order, so callers that
//! only index or validate never build the whole structure in memory.
//!
//! Numbers are deliberately lenient: a numeric token is any run of digits,
//! letters, `+`, `-` and `.`, and it only fails once neither an integer nor a
//! floating-point parse accepts it.

use exn::{Exn, OptionExt, ResultExt};
use std::error::Error as StdError;
use std::io::{BufReader, Bytes, Read};
use tracing::warn;

use crate::error::{Error, ErrorKind, Result};
use crate::value::{Map, Number, Value};

/// Streaming JSON reader with 1-based line/column error positions.
///
/// # Examples
///
/// ```
/// use carto_json::{Reader, Value};
///
/// let mut reader = Reader::from_text(r#"{"capital": "Paris", "area": 551695}"#);
/// let value = reader.read_object().unwrap();
/// assert_eq!(value.get("capital").and_then(Value::as_str), Some("Paris"));
/// assert_eq!(value.get("area").and_then(Value::as_i64), Some(551695));
/// ```
pub struct Reader<R: Read> {
    input: Bytes<BufReader<R>>,
    peeked: Option<char>,
    last_char_cr: bool,
    line: u64,
    column: u64,
}

impl<'a> Reader<&'a [u8]> {
    /// Reader over an in-memory document.
    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl<R: Read> Reader<R> {
    /// Reader over a UTF-8 encoded byte stream.
    pub fn new(input: R) -> Self {
        Self { input: BufReader::new(input).bytes(), peeked: None, last_char_cr: false, line: 1, column: 0 }
    }

    /// Reads whatever value comes next.
    pub fn read_object(&mut self) -> Result<Value> {
        match self.peek_first_token_char()? {
            '"' => self.read_string().map(Value::String),
            '{' => self.read_map().map(Value::Map),
            '[' => self.read_list().map(Value::List),
            't' | 'f' => self.read_bool().map(Value::Bool),
            'n' => self.read_null().map(|()| Value::Null),
            c if is_number_char(c) => self.read_number().map(Value::Number),
            c => {
                self.read()?;
                exn::bail!(self.decode_error(format!("unexpected character \\u{:04x}", c as u32)));
            },
        }
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.expect_token("\"")?;
        let mut string = String::new();
        loop {
            match self.read()? {
                '"' => return Ok(string),
                '\\' => string.push(self.read_escape_sequence()?),
                c => string.push(c),
            }
        }
    }

    pub fn read_number(&mut self) -> Result<Number> {
        self.skip_whitespaces()?;
        let mut token = String::new();
        while let Some(c) = self.peek_no_throw()?
            && is_number_char(c)
        {
            token.push(self.read()?);
        }
        if let Ok(integer) = token.parse::<i64>() {
            return Ok(Number::Integer(integer));
        }
        match token.parse::<f64>() {
            Ok(float) => Ok(Number::from_f64(float)),
            Err(_) => exn::bail!(self.decode_error("invalid number")),
        }
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let value = self.peek_first_token_char()? == 't';
        self.expect_token(if value { "true" } else { "false" })?;
        Ok(value)
    }

    pub fn read_null(&mut self) -> Result<()> {
        self.expect_token("null")
    }

    /// Reads a whole map, keeping the last value of a duplicated key.
    pub fn read_map(&mut self) -> Result<Map> {
        let mut map = Map::new();
        self.read_map_with::<ErrorKind, _>(|key, value| {
            if map.contains_key(&key) {
                warn!(key = %key, "JSON: overriding value for duplicate key");
            }
            map.insert(key, value);
            Ok(())
        })?;
        Ok(map)
    }

    /// Reads a map, handing every entry to `listener` as soon as it has been
    /// decoded. Duplicate keys are delivered as they appear.
    ///
    /// The listener's errors are returned as-is; decoding errors are raised
    /// into the listener's error kind so both share one error tree.
    pub fn read_map_with<K, F>(&mut self, mut listener: F) -> std::result::Result<(), Exn<K>>
    where
        K: From<ErrorKind> + StdError + Send + Sync + 'static,
        F: FnMut(String, Value) -> std::result::Result<(), Exn<K>>,
    {
        self.expect_token("{").map_err(lift)?;
        let mut separator = "";
        while self.peek_first_token_char().map_err(lift)? != '}' {
            self.expect_token(separator).map_err(lift)?;
            let key = self.read_string().map_err(lift)?;
            self.expect_token(":").map_err(lift)?;
            let value = self.read_object().map_err(lift)?;
            listener(key, value)?;
            separator = ",";
        }
        self.expect_token("}").map_err(lift)
    }

    pub fn read_list(&mut self) -> Result<Vec<Value>> {
        let mut list = Vec::new();
        self.read_list_with::<ErrorKind, _>(|element| {
            list.push(element);
            Ok(())
        })?;
        Ok(list)
    }

    /// Reads a list, handing every element to `listener` in order.
    pub fn read_list_with<K, F>(&mut self, mut listener: F) -> std::result::Result<(), Exn<K>>
    where
        K: From<ErrorKind> + StdError + Send + Sync + 'static,
        F: FnMut(Value) -> std::result::Result<(), Exn<K>>,
    {
        self.expect_token("[").map_err(lift)?;
        let mut separator = "";
        while self.peek_first_token_char().map_err(lift)? != ']' {
            self.expect_token(separator).map_err(lift)?;
            let element = self.read_object().map_err(lift)?;
            listener(element)?;
            separator = ",";
        }
        self.expect_token("]").map_err(lift)
    }

    fn read_escape_sequence(&mut self) -> Result<char> {
        Ok(match self.read()? {
            c @ ('"' | '\\' | '/') => c,
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => self.read_code_point()?,
            c => exn::bail!(self.decode_error(format!("invalid escape sequence character \\u{:04x}", c as u32))),
        })
    }

    /// Decodes the four hex digits after `\u`, pulling in the second half of a
    /// surrogate pair when the first unit is a high surrogate.
    fn read_code_point(&mut self) -> Result<char> {
        let unit = self.read_code_unit()?;
        let code_point = match unit {
            0xD800..=0xDBFF => {
                self.expect_char('\\')?;
                self.expect_char('u')?;
                let low = self.read_code_unit()?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    exn::bail!(self.decode_error(format!("unpaired surrogate \\u{unit:04x}")));
                }
                0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00)
            },
            0xDC00..=0xDFFF => exn::bail!(self.decode_error(format!("unpaired surrogate \\u{unit:04x}"))),
            _ => u32::from(unit),
        };
        char::from_u32(code_point).ok_or_raise(|| self.decode_error(format!("invalid code point {code_point:x}")))
    }

    fn read_code_unit(&mut self) -> Result<u16> {
        let mut unit = 0u16;
        for _ in 0..4 {
            let c = self.read()?;
            let Some(digit) = c.to_digit(16) else {
                exn::bail!(self.decode_error(format!("invalid unicode escape sequence character \\u{:04x}", c as u32)));
            };
            unit = (unit << 4) | digit as u16;
        }
        Ok(unit)
    }

    /// Skips whitespace, then consumes exactly `expected`.
    fn expect_token(&mut self, expected: &str) -> Result<()> {
        self.skip_whitespaces()?;
        for expected in expected.chars() {
            self.expect_char(expected)?;
        }
        Ok(())
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        let c = self.read()?;
        if c != expected {
            exn::bail!(self.decode_error(format!("expected '{expected}', got \\u{:04x}", c as u32)));
        }
        Ok(())
    }

    fn peek_first_token_char(&mut self) -> Result<char> {
        self.skip_whitespaces()?;
        self.peek()
    }

    fn skip_whitespaces(&mut self) -> Result<()> {
        while is_whitespace(self.peek()?) {
            self.read()?;
        }
        Ok(())
    }

    /// Consumes one character, keeping line and column up to date. A `\r\n`
    /// pair counts as a single line break.
    fn read(&mut self) -> Result<char> {
        let c = match self.peeked.take() {
            Some(c) => c,
            None => self.force_read()?,
        };
        match c {
            '\r' => {
                self.line += 1;
                self.column = 0;
                self.last_char_cr = true;
            },
            '\n' => {
                if !self.last_char_cr {
                    self.line += 1;
                    self.column = 0;
                }
                self.last_char_cr = false;
            },
            _ => {
                self.column += 1;
                self.last_char_cr = false;
            },
        }
        Ok(c)
    }

    fn peek(&mut self) -> Result<char> {
        if let Some(c) = self.peeked {
            return Ok(c);
        }
        let c = self.force_read()?;
        self.peeked = Some(c);
        Ok(c)
    }

    /// Like [`peek`](Self::peek), but end of input is not an error.
    fn peek_no_throw(&mut self) -> Result<Option<char>> {
        if self.peeked.is_none() {
            self.peeked = self.next_char()?;
        }
        Ok(self.peeked)
    }

    fn force_read(&mut self) -> Result<char> {
        match self.next_char()? {
            Some(c) => Ok(c),
            None => {
                self.column += 1;
                exn::bail!(self.decode_error("unexpected end of input"));
            },
        }
    }

    /// Decodes the next UTF-8 sequence from the byte stream.
    fn next_char(&mut self) -> Result<Option<char>> {
        let Some(first) = self.next_byte()? else {
            return Ok(None);
        };
        let width = match first {
            0x00..=0x7F => return Ok(Some(char::from(first))),
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(self.invalid_utf8()),
        };
        let mut buffer = [first, 0, 0, 0];
        for slot in buffer.iter_mut().take(width).skip(1) {
            *slot = match self.next_byte()? {
                Some(byte) => byte,
                None => return Err(self.invalid_utf8()),
            };
        }
        match std::str::from_utf8(&buffer[..width]).ok().and_then(|s| s.chars().next()) {
            Some(c) => Ok(Some(c)),
            None => Err(self.invalid_utf8()),
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        self.input.next().transpose().or_raise(|| ErrorKind::Io)
    }

    fn invalid_utf8(&mut self) -> Error {
        self.column += 1;
        Exn::from(self.decode_error("invalid UTF-8 sequence"))
    }

    fn decode_error(&self, message: impl Into<String>) -> ErrorKind {
        ErrorKind::Decode { message: message.into(), line: self.line, column: self.column }
    }
}

/// Re-raises a decoding error under the listener's error kind.
fn lift<K>(err: Error) -> Exn<K>
where
    K: From<ErrorKind> + StdError + Send + Sync + 'static,
{
    let kind = (*err).clone();
    err.raise(K::from(kind))
}

fn is_number_char(c: char) -> bool {
    matches!(c, '-' | '+' | '.') || c.is_ascii_alphanumeric()
}

fn is_whitespace(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | ' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn read(text: &str) -> Result<Value> {
        Reader::from_text(text).read_object()
    }

    fn position(text: &str) -> (String, u64, u64) {
        let err = read(text).unwrap_err();
        match &*err {
            ErrorKind::Decode { message, line, column } => (message.clone(), *line, *column),
            other => panic!("expected a decode error, got {other:?}"),
        }
    }

    #[rstest]
    #[case(r#""plain""#, "plain")]
    #[case(r#""quote \" backslash \\ slash \/""#, "quote \" backslash \\ slash /")]
    #[case(r#""\b\f\n\r\t""#, "\u{8}\u{c}\n\r\t")]
    #[case(r#""\u00e9\u00C9""#, "éÉ")]
    #[case(r#""\ud83c\udf0d""#, "🌍")]
    #[case(r#""São Tomé""#, "São Tomé")]
    fn test_strings(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(read(input).unwrap(), Value::from(expected));
    }

    #[rstest]
    #[case("0", Number::Integer(0))]
    #[case("-12", Number::Integer(-12))]
    #[case("+7", Number::Integer(7))]
    #[case("2.0", Number::Integer(2))]
    #[case("1e3", Number::Integer(1000))]
    #[case("0.5", Number::Float(0.5))]
    #[case("-2.25E1", Number::Float(-22.5))]
    #[case("9223372036854775807", Number::Integer(i64::MAX))]
    fn test_numbers(#[case] input: &str, #[case] expected: Number) {
        assert_eq!(read(input).unwrap(), Value::Number(expected));
    }

    #[test]
    fn test_number_stops_at_delimiter() {
        let value = read("[1,2.5 ,-3]").unwrap();
        assert_eq!(value, Value::from(vec![Value::from(1_i64), Value::from(2.5), Value::from(-3_i64)]));
    }

    #[rstest]
    #[case("1e5f")]
    #[case("12abc")]
    #[case("--1")]
    fn test_lenient_number_token_then_failure(#[case] input: &str) {
        let (message, _, _) = position(input);
        assert_eq!(message, "invalid number");
    }

    #[test]
    fn test_literals() {
        assert_eq!(read(" true").unwrap(), Value::Bool(true));
        assert_eq!(read("\tfalse").unwrap(), Value::Bool(false));
        assert_eq!(read("\nnull").unwrap(), Value::Null);
        assert!(read("tru").is_err());
        assert!(read("nul!").is_err());
    }

    #[test]
    fn test_nested_structures_keep_order() {
        let value = read(r#"{"b": [1, {"x": null}], "a": {}, "c": []}"#).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), ["b", "a", "c"]);
        assert_eq!(map["b"].as_list().unwrap().len(), 2);
        assert_eq!(map["a"], Value::Map(Map::new()));
        assert_eq!(map["c"], Value::List(vec![]));
    }

    #[test]
    fn test_duplicate_key_keeps_last() {
        let map = Reader::from_text(r#"{"k": 1, "other": 2, "k": 3}"#).read_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["k"], Value::from(3_i64));
        // Position of the first occurrence is kept.
        assert_eq!(map.get_index(0).map(|(k, _)| k.as_str()), Some("k"));
    }

    #[test]
    fn test_listener_sees_every_entry() {
        let mut seen = Vec::new();
        Reader::from_text(r#"{"k": 1, "k": 2}"#)
            .read_map_with::<ErrorKind, _>(|key, value| {
                seen.push((key, value));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, [("k".to_string(), Value::from(1_i64)), ("k".to_string(), Value::from(2_i64))]);
    }

    #[test]
    fn test_listener_error_stops_reading() {
        let mut calls = 0;
        let result = Reader::from_text("[1, 2, 3]").read_list_with::<ErrorKind, _>(|_| {
            calls += 1;
            exn::bail!(ErrorKind::Io);
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[rstest]
    #[case(r#"{"a": }"#, 1, 7)]
    #[case("[1, 2", 1, 6)]
    #[case("{\"a\": 1,}", 1, 9)]
    #[case("[1 2]", 1, 4)]
    #[case("{a: 1}", 1, 2)]
    #[case("[\r\n  }", 2, 3)]
    #[case("{\r\n  \"a\": ]", 2, 8)]
    #[case("\n\n  \"\\x\"", 3, 5)]
    #[case("\"\\u12g4\"", 1, 6)]
    #[case("", 1, 1)]
    fn test_error_positions(#[case] input: &str, #[case] line: u64, #[case] column: u64) {
        let (_, actual_line, actual_column) = position(input);
        assert_eq!((actual_line, actual_column), (line, column), "input: {input:?}");
    }

    #[test]
    fn test_error_messages() {
        let err = read(r#"{"a": }"#).unwrap_err();
        assert_eq!((*err).to_string(), "unexpected character \\u007d at line 1, col 7");
        assert_eq!(position(r#""\q""#).0, "invalid escape sequence character \\u0071");
        assert_eq!(position("[1 2]").0, "expected ',', got \\u0032");
        assert_eq!(position("\"abc").0, "unexpected end of input");
    }

    #[test]
    fn test_lone_surrogate_is_rejected() {
        assert!(read(r#""\udf0d""#).is_err());
        assert!(read(r#""\ud83c x""#).is_err());
    }

    #[test]
    fn test_carriage_return_without_line_feed() {
        // A lone CR is a line break of its own; the LF after other text is too.
        let (_, line, column) = position("[\r1\n}");
        assert_eq!((line, column), (3, 1));
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes: &[u8] = b"\"\xff\"";
        let err = Reader::new(bytes).read_object().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Decode { column: 2, .. }));
    }
}
