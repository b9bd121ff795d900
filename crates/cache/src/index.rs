//! In-memory state of a cache directory and its two index files.
//!
//! `properties.json` maps every id, in allocation order, to the charset and
//! canonical URL of its entry. `ids.json` maps the other URLs that resolved to
//! an entry, and only those: the canonical URL of an entry is implied.
//!
//! Both files are rewritten in full, compactly, after every change.

use carto_fetch::Document;
use carto_json::{Reader, Value, Writer};
use exn::{OptionExt, ResultExt};
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::entry::{CacheEntry, Properties};
use crate::error::{Error, ErrorKind, Result};
use crate::paths::{IDS_FILE_NAME, PROPERTIES_FILE_NAME, body_path};

#[derive(Debug)]
pub(crate) struct Index {
    dir: PathBuf,
    entries: IndexMap<u64, CacheEntry>,
    ids_by_url: IndexMap<String, u64>,
    next_id: u64,
}

impl Index {
    /// Loads the index files of `dir`; missing files mean an empty cache.
    pub(crate) fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let mut index = Self { dir: dir.into(), entries: IndexMap::new(), ids_by_url: IndexMap::new(), next_id: 0 };
        index.read_properties_file()?;
        index.read_ids_file()?;
        info!(
            dir = %index.dir.display(),
            entries = index.entries.len(),
            aliases = index.aliases().count(),
            "loaded document cache"
        );
        Ok(index)
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn entries(&self) -> &IndexMap<u64, CacheEntry> {
        &self.entries
    }

    pub(crate) fn id_of(&self, url: &str) -> Option<u64> {
        self.ids_by_url.get(url).copied()
    }

    /// Every URL that is not the canonical URL of its own entry.
    pub(crate) fn aliases(&self) -> impl Iterator<Item = (&str, u64)> {
        self.ids_by_url
            .iter()
            .filter(|(url, id)| self.entries.get(*id).is_none_or(|entry| entry.base_uri() != url.as_str()))
            .map(|(url, id)| (url.as_str(), *id))
    }

    /// Stores a freshly fetched page: writes its body under a new id, then
    /// records the entry and its canonical URL.
    ///
    /// The entry only becomes part of the index once `properties.json` lists
    /// it; on failure the id is reused by the next insert.
    pub(crate) fn insert_document(&mut self, body: &[u8], document: Document) -> Result<u64> {
        let id = self.next_id;
        fs::write(body_path(&self.dir, id), body).or_raise(|| ErrorKind::BodyUnwritable(id))?;
        let base_uri = document.base_uri().to_string();
        self.entries.insert(id, CacheEntry::new(id, document));
        if let Err(err) = self.write_properties_file() {
            self.entries.shift_remove(&id);
            return Err(err);
        }
        self.next_id += 1;
        info!(id, base_uri = %base_uri, "cached new document");
        self.insert_id(base_uri, id)?;
        Ok(id)
    }

    /// Records that `url` resolves to entry `id`.
    pub(crate) fn insert_id(&mut self, url: String, id: u64) -> Result<()> {
        self.ids_by_url.insert(url, id);
        self.write_ids_file()
    }

    fn read_properties_file(&mut self) -> Result<()> {
        let path = self.dir.join(PROPERTIES_FILE_NAME);
        let Some(file) = open_index(&path)? else {
            warn!(path = %path.display(), "no properties file");
            return Ok(());
        };
        Reader::new(file).read_map_with(|key, value| self.read_entry(key, value)).map_err(|err| in_file(err, &path))
    }

    fn read_entry(&mut self, key: String, value: Value) -> Result<()> {
        let id = key.parse::<u64>().or_raise(|| ErrorKind::InvalidId(key.clone()))?;
        let after = id.checked_add(1).ok_or_raise(|| ErrorKind::InvalidId(key.clone()))?;
        let properties = value.as_map().ok_or_raise(|| ErrorKind::InvalidProperties(id))?;
        let charset = properties.get("charsetName").and_then(Value::as_str);
        let base_uri = properties.get("baseUri").and_then(Value::as_str);
        let (Some(charset), Some(base_uri)) = (charset, base_uri) else {
            exn::bail!(ErrorKind::InvalidProperties(id));
        };
        if self.entries.contains_key(&id) {
            exn::bail!(ErrorKind::DuplicateId(id));
        }
        if self.ids_by_url.contains_key(base_uri) {
            exn::bail!(ErrorKind::DuplicateBaseUri(base_uri.to_string()));
        }
        let body = fs::read(body_path(&self.dir, id)).or_raise(|| ErrorKind::BodyUnreadable(id))?;
        let document = Document::parse(&body, charset, base_uri);
        self.entries.insert(id, CacheEntry::new(id, document));
        self.ids_by_url.insert(base_uri.to_string(), id);
        self.next_id = self.next_id.max(after);
        Ok(())
    }

    fn read_ids_file(&mut self) -> Result<()> {
        let path = self.dir.join(IDS_FILE_NAME);
        let Some(file) = open_index(&path)? else {
            warn!(path = %path.display(), "no ids file");
            return Ok(());
        };
        Reader::new(file).read_map_with(|url, value| self.read_alias(url, &value)).map_err(|err| in_file(err, &path))
    }

    fn read_alias(&mut self, url: String, value: &Value) -> Result<()> {
        let Some(id) = value.as_i64().and_then(|id| u64::try_from(id).ok()) else {
            exn::bail!(ErrorKind::InvalidAlias(url));
        };
        if !self.entries.contains_key(&id) {
            exn::bail!(ErrorKind::UnknownId(id));
        }
        if self.ids_by_url.contains_key(&url) {
            exn::bail!(ErrorKind::DuplicateAlias(url));
        }
        self.ids_by_url.insert(url, id);
        Ok(())
    }

    fn write_properties_file(&self) -> Result<()> {
        let path = self.dir.join(PROPERTIES_FILE_NAME);
        write_index(&path, |writer| {
            writer.append_map(self.entries.iter().map(|(id, entry)| (id, Properties(entry))))?;
            Ok(())
        })
    }

    fn write_ids_file(&self) -> Result<()> {
        let path = self.dir.join(IDS_FILE_NAME);
        write_index(&path, |writer| {
            writer.append_map(self.aliases())?;
            Ok(())
        })
    }
}

/// Opens an index file, `None` if it does not exist.
fn open_index(path: &Path) -> Result<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).or_raise(|| ErrorKind::Index(path.to_path_buf())),
    }
}

/// Names the index file in decoding errors; corruption errors already say
/// what is wrong.
fn in_file(err: Error, path: &Path) -> Error {
    if matches!(*err, ErrorKind::Json(_)) {
        err.raise(ErrorKind::Index(path.to_path_buf()))
    } else {
        err
    }
}

fn write_index<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut Writer<BufWriter<File>>) -> carto_json::Result<()>,
{
    let file = File::create(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    let mut writer = Writer::compact(BufWriter::new(file));
    write(&mut writer).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    writer.flush().or_raise(|| ErrorKind::Io(path.to_path_buf()))
}
