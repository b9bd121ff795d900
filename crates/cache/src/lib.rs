//! On-disk cache of the pages a scraping run depends on.
//!
//! A cache directory holds:
//! - `properties.json`, mapping each entry id to its charset and canonical
//!   URL (`{"0":{"charsetName":"UTF-8","baseUri":"https://..."}}`),
//! - `ids.json`, mapping every other URL that led to an entry to its id,
//! - one `cache_NNNNNNN.html` file per entry, holding the body exactly as it
//!   was received.
//!
//! [`DocumentCache`] is the only thing that reads or writes these files.
//! [`MediaStore`] keeps downloaded media files in a directory of their own.

mod cache;
mod entry;
pub mod error;
mod index;
mod media;
mod paths;

pub use crate::cache::DocumentCache;
pub use crate::entry::CacheEntry;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::media::MediaStore;
pub use crate::paths::body_file_name;
