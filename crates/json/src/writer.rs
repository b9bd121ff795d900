//! JSON writer with optional pretty-printing.

use exn::ResultExt;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::io::Write;

use crate::error::{ErrorKind, Result};
use crate::value::{Number, Value};

const INDENT: &str = "  ";

/// Anything that knows how to write itself as JSON.
///
/// Implemented for [`Value`], the primitive types, strings, sequences and
/// maps with displayable keys. Wrap any other [`Display`] type in
/// [`Displayed`] to write its textual form as a JSON string.
pub trait ToJson {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()>;
}

/// Writes a value's [`Display`] output as a JSON string.
///
/// ```
/// use carto_json::{Displayed, to_string};
/// use std::net::Ipv4Addr;
///
/// let text = to_string(&Displayed(Ipv4Addr::LOCALHOST)).unwrap();
/// assert_eq!(text, r#""127.0.0.1""#);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Displayed<T>(pub T);

/// Serialises values to an output stream.
///
/// Without an indent level the output is compact, with no whitespace at all.
/// With one, every entry and element starts on its own line, indented two
/// spaces per nesting level, and the closing bracket goes back to the
/// enclosing level. Empty containers are always written as `{}` and `[]`.
///
/// Maps and lists accept any [`IntoIterator`], so a caller can stream entries
/// straight out of its own data structures without collecting them first.
///
/// ```
/// use carto_json::Writer;
///
/// let mut writer = Writer::compact(Vec::new());
/// writer.append_map((1..=2).map(|id| (id, format!("cache_{id:07}.html")))).unwrap();
/// let text = String::from_utf8(writer.into_inner()).unwrap();
/// assert_eq!(text, r#"{"1":"cache_0000001.html","2":"cache_0000002.html"}"#);
/// ```
pub struct Writer<W: Write> {
    output: W,
    indent: Option<usize>,
}

impl<W: Write> Writer<W> {
    pub fn compact(output: W) -> Self {
        Self { output, indent: None }
    }

    pub fn pretty(output: W) -> Self {
        Self::with_indent(output, 0)
    }

    /// Pretty-printing writer whose closing brackets sit at `level`.
    pub fn with_indent(output: W, level: usize) -> Self {
        Self { output, indent: Some(level) }
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    pub fn get_ref(&self) -> &W {
        &self.output
    }

    pub fn flush(&mut self) -> Result<()> {
        self.output.flush().or_raise(|| ErrorKind::Io)
    }

    /// Writes any [`ToJson`] value.
    pub fn append_object<T: ToJson + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        value.write_json(self)?;
        Ok(self)
    }

    pub fn append_string(&mut self, string: &str) -> Result<&mut Self> {
        let mut escaped = String::with_capacity(string.len() + 2);
        escaped.push('"');
        for c in string.chars() {
            match c {
                '"' | '\\' => {
                    escaped.push('\\');
                    escaped.push(c);
                },
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\t' => escaped.push_str("\\t"),
                '\u{8}' => escaped.push_str("\\b"),
                '\u{c}' => escaped.push_str("\\f"),
                c if c.is_control() => escaped.push_str(&format!("\\u{:04x}", c as u32)),
                c => escaped.push(c),
            }
        }
        escaped.push('"');
        self.append(&escaped)
    }

    /// Writes a number, as a bare integer whenever it has no fractional part
    /// and fits in an `i64`.
    pub fn append_number(&mut self, number: impl Into<Number>) -> Result<&mut Self> {
        let number = number.into();
        self.append(&number.to_string())
    }

    pub fn append_bool(&mut self, value: bool) -> Result<&mut Self> {
        self.append(if value { "true" } else { "false" })
    }

    pub fn append_null(&mut self) -> Result<&mut Self> {
        self.append("null")
    }

    /// Writes a map from an iterator of entries. Keys are written through
    /// their [`Display`] implementation.
    pub fn append_map<I, K, V>(&mut self, entries: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Display,
        V: ToJson,
    {
        let outer = self.indent;
        self.indent = outer.map(|level| level + 1);
        let mut separator = "{";
        for (key, value) in entries {
            self.append(separator)?.append_lf_and_indent()?.append_string(&key.to_string())?.append(":")?;
            if outer.is_some() {
                self.append(" ")?;
            }
            value.write_json(self)?;
            separator = ",";
        }
        self.indent = outer;
        self.close(separator, "{}", "}")
    }

    /// Writes a list from an iterator of elements.
    pub fn append_list<I, T>(&mut self, elements: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = T>,
        T: ToJson,
    {
        let outer = self.indent;
        self.indent = outer.map(|level| level + 1);
        let mut separator = "[";
        for element in elements {
            self.append(separator)?.append_lf_and_indent()?;
            element.write_json(self)?;
            separator = ",";
        }
        self.indent = outer;
        self.close(separator, "[]", "]")
    }

    /// Closes a container; `separator` is still the opening bracket when no
    /// entry was written.
    fn close(&mut self, separator: &str, empty: &str, closing: &str) -> Result<&mut Self> {
        if separator != "," {
            return self.append(empty);
        }
        self.append_lf_and_indent()?.append(closing)
    }

    fn append_lf_and_indent(&mut self) -> Result<&mut Self> {
        if let Some(level) = self.indent {
            let mut whitespace = String::with_capacity(1 + level * INDENT.len());
            whitespace.push('\n');
            for _ in 0..level {
                whitespace.push_str(INDENT);
            }
            self.append(&whitespace)?;
        }
        Ok(self)
    }

    fn append(&mut self, text: &str) -> Result<&mut Self> {
        self.output.write_all(text.as_bytes()).or_raise(|| ErrorKind::Io)?;
        Ok(self)
    }
}

impl<T: ToJson + ?Sized> ToJson for &T {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        (**self).write_json(writer)
    }
}

impl ToJson for Value {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        match self {
            Value::Null => writer.append_null()?,
            Value::Bool(b) => writer.append_bool(*b)?,
            Value::Number(n) => writer.append_number(*n)?,
            Value::String(s) => writer.append_string(s)?,
            Value::List(list) => writer.append_list(list)?,
            Value::Map(map) => writer.append_map(map)?,
        };
        Ok(())
    }
}

impl ToJson for Number {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_number(*self)?;
        Ok(())
    }
}

impl ToJson for () {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_null()?;
        Ok(())
    }
}

impl ToJson for bool {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_bool(*self)?;
        Ok(())
    }
}

macro_rules! integer_to_json {
    ($($ty:ty),*) => {$(
        impl ToJson for $ty {
            fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
                writer.append(&self.to_string())?;
                Ok(())
            }
        }
    )*};
}
integer_to_json!(i8, i16, i32, i64, u8, u16, u32);

// Outside the i64 range these are written in floating form, as the reader
// would read them.
macro_rules! wide_integer_to_json {
    ($($ty:ty),*) => {$(
        impl ToJson for $ty {
            #[allow(clippy::cast_precision_loss)]
            fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
                match i64::try_from(*self) {
                    Ok(integer) => writer.append_number(integer)?,
                    Err(_) => writer.append_number(*self as f64)?,
                };
                Ok(())
            }
        }
    )*};
}
wide_integer_to_json!(isize, u64, usize);

impl ToJson for f64 {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_number(*self)?;
        Ok(())
    }
}

impl ToJson for f32 {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_number(f64::from(*self))?;
        Ok(())
    }
}

impl ToJson for str {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_string(self)?;
        Ok(())
    }
}

impl ToJson for String {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_string(self)?;
        Ok(())
    }
}

impl<T: Display> ToJson for Displayed<T> {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_string(&self.0.to_string())?;
        Ok(())
    }
}

impl<T: ToJson> ToJson for Option<T> {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        match self {
            Some(value) => value.write_json(writer),
            None => writer.append_null().map(|_| ()),
        }
    }
}

impl<T: ToJson> ToJson for [T] {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_list(self)?;
        Ok(())
    }
}

impl<T: ToJson, const N: usize> ToJson for [T; N] {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_list(self)?;
        Ok(())
    }
}

impl<T: ToJson> ToJson for Vec<T> {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_list(self)?;
        Ok(())
    }
}

impl<K: Display, V: ToJson, S> ToJson for IndexMap<K, V, S> {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_map(self)?;
        Ok(())
    }
}

impl<K: Display, V: ToJson> ToJson for BTreeMap<K, V> {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_map(self)?;
        Ok(())
    }
}

impl<K: Display, V: ToJson, S> ToJson for HashMap<K, V, S> {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.append_map(self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reader;
    use crate::value::Map;
    use rstest::rstest;

    fn compact<T: ToJson + ?Sized>(value: &T) -> String {
        let mut writer = Writer::compact(Vec::new());
        writer.append_object(value).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    fn pretty<T: ToJson + ?Sized>(value: &T) -> String {
        let mut writer = Writer::pretty(Vec::new());
        writer.append_object(value).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    fn sample() -> Value {
        let mut inner = Map::new();
        inner.insert("flag".to_string(), Value::from("Flag_of_Peru.svg"));
        inner.insert("sizes".to_string(), Value::from(vec![Value::from(1_i64), Value::from(2.5)]));
        let mut outer = Map::new();
        outer.insert("name".to_string(), Value::from("Peru"));
        outer.insert("landlocked".to_string(), Value::from(false));
        outer.insert("media".to_string(), Value::Map(inner));
        outer.insert("motto".to_string(), Value::Null);
        Value::Map(outer)
    }

    #[rstest]
    #[case("plain", r#""plain""#)]
    #[case("a\"b\\c", r#""a\"b\\c""#)]
    #[case("line\nbreak\r\ttab", r#""line\nbreak\r\ttab""#)]
    #[case("\u{8}\u{c}", r#""\b\f""#)]
    #[case("\u{0}\u{1f}\u{7f}\u{9f}", r#""\u0000\u001f\u007f\u009f""#)]
    #[case("Côte d’Ivoire", "\"Côte d’Ivoire\"")]
    #[case("a/b", r#""a/b""#)]
    fn test_string_escaping(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(compact(input), expected);
    }

    #[rstest]
    #[case(Number::Integer(-4), "-4")]
    #[case(Number::Float(2.0), "2")]
    #[case(Number::Float(0.5), "0.5")]
    #[case(Number::Float(-1e-3), "-0.001")]
    fn test_numbers(#[case] input: Number, #[case] expected: &str) {
        assert_eq!(compact(&input), expected);
    }

    #[test]
    fn test_compact_output() {
        assert_eq!(
            compact(&sample()),
            r#"{"name":"Peru","landlocked":false,"media":{"flag":"Flag_of_Peru.svg","sizes":[1,2.5]},"motto":null}"#
        );
    }

    #[test]
    fn test_pretty_output() {
        let expected = r#"{
  "name": "Peru",
  "landlocked": false,
  "media": {
    "flag": "Flag_of_Peru.svg",
    "sizes": [
      1,
      2.5
    ]
  },
  "motto": null
}"#;
        assert_eq!(pretty(&sample()), expected);
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(compact(&Value::Map(Map::new())), "{}");
        assert_eq!(pretty(&Value::Map(Map::new())), "{}");
        assert_eq!(pretty(&Vec::<Value>::new()), "[]");
        let mut map = Map::new();
        map.insert("empty".to_string(), Value::List(vec![]));
        assert_eq!(pretty(&Value::Map(map)), "{\n  \"empty\": []\n}");
    }

    #[test]
    fn test_with_indent_level() {
        let mut writer = Writer::with_indent(Vec::new(), 1);
        writer.append_list([1, 2]).unwrap();
        assert_eq!(String::from_utf8(writer.into_inner()).unwrap(), "[\n    1,\n    2\n  ]");
    }

    #[test]
    fn test_streamed_map() {
        let mut writer = Writer::compact(Vec::new());
        writer.append_map((0..5u64).filter(|id| id % 2 == 0).map(|id| (id, format!("u{id}")))).unwrap();
        assert_eq!(String::from_utf8(writer.into_inner()).unwrap(), r#"{"0":"u0","2":"u2","4":"u4"}"#);
    }

    #[test]
    fn test_displayed_fallback() {
        assert_eq!(compact(&Displayed(std::path::Path::new("a/b").display())), r#""a/b""#);
        assert_eq!(compact(&Displayed('x')), r#""x""#);
    }

    #[test]
    fn test_options_and_unit() {
        assert_eq!(compact(&Some(3)), "3");
        assert_eq!(compact(&None::<i64>), "null");
        assert_eq!(compact(&()), "null");
    }

    #[test]
    fn test_round_trip() {
        let value = sample();
        let text = compact(&value);
        assert_eq!(Reader::from_text(&text).read_object().unwrap(), value);
        let text = pretty(&value);
        assert_eq!(Reader::from_text(&text).read_object().unwrap(), value);
    }

    #[test]
    fn test_round_trip_canonicalises_numbers() {
        let value = Value::List(vec![Value::Number(Number::Float(2.0)), Value::Number(Number::Float(0.1))]);
        let read = Reader::from_text(&compact(&value)).read_object().unwrap();
        assert_eq!(read, Value::List(vec![Value::from(2_i64), Value::from(0.1)]));
    }

    #[test]
    fn test_wide_integers_read_back_unchanged() {
        assert_eq!(compact(&42_u64), "42");
        assert_eq!(compact(&(i64::MAX as u64)), i64::MAX.to_string());
        let read = Reader::from_text(&compact(&u64::MAX)).read_number().unwrap();
        assert_eq!(read, Number::Float(u64::MAX as f64));
        let read = Reader::from_text(&compact(&(i64::MAX as u64 + 1))).read_number().unwrap();
        assert_eq!(read, Number::Float(9_223_372_036_854_775_808.0));
    }

    #[test]
    fn test_round_trip_control_characters() {
        let original = "tab\there\u{1}\u{85}end";
        let read = Reader::from_text(&compact(original)).read_string().unwrap();
        assert_eq!(read, original);
    }
}
