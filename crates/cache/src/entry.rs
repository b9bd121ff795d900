use carto_fetch::Document;
use carto_json::{ToJson, Writer};
use std::io::Write;

use crate::paths::body_file_name;

/// One cached page. Created once, never modified.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    id: u64,
    document: Document,
}

impl CacheEntry {
    pub(crate) fn new(id: u64, document: Document) -> Self {
        Self { id, document }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Charset the body file is decoded with.
    pub fn charset(&self) -> &str {
        self.document.charset()
    }

    /// Canonical URL of the page.
    pub fn base_uri(&self) -> &str {
        self.document.base_uri()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Name of the body file, relative to the cache directory.
    pub fn body_file_name(&self) -> String {
        body_file_name(self.id)
    }
}

/// Value of an entry in `properties.json`.
pub(crate) struct Properties<'a>(pub &'a CacheEntry);

impl ToJson for Properties<'_> {
    fn write_json<W: Write>(&self, writer: &mut Writer<W>) -> carto_json::Result<()> {
        writer.append_map([("charsetName", self.0.charset()), ("baseUri", self.0.base_uri())])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_json() {
        let entry = CacheEntry::new(3, Document::parse(b"<p>x</p>", "utf-8", "https://fr.wikipedia.org/wiki/Andorre"));
        assert_eq!(entry.body_file_name(), "cache_0000003.html");
        assert_eq!(
            carto_json::to_string(&Properties(&entry)).unwrap(),
            r#"{"charsetName":"UTF-8","baseUri":"https://fr.wikipedia.org/wiki/Andorre"}"#
        );
    }
}
