//! Names of the files inside a cache directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

pub(crate) const PROPERTIES_FILE_NAME: &str = "properties.json";
pub(crate) const IDS_FILE_NAME: &str = "ids.json";

/// Body file of an entry. Ids are zero-padded to seven digits so that the
/// files sort in allocation order.
pub fn body_file_name(id: u64) -> String {
    format!("cache_{id:07}.html")
}

pub(crate) fn body_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(body_file_name(id))
}

/// Accepts a plain file name, rejecting anything that would resolve outside
/// of the directory it is joined to.
pub(crate) fn validate_file_name(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => exn::bail!(ErrorKind::InvalidFileName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "cache_0000000.html")]
    #[case(42, "cache_0000042.html")]
    #[case(12_345_678, "cache_12345678.html")]
    fn test_body_file_name(#[case] id: u64, #[case] expected: &str) {
        assert_eq!(body_file_name(id), expected);
    }

    #[rstest]
    #[case("Flag_of_France.svg", true)]
    #[case("../escape.svg", false)]
    #[case("nested/flag.svg", false)]
    #[case("/etc/passwd", false)]
    #[case("..", false)]
    #[case("", false)]
    fn test_validate_file_name(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(validate_file_name(name).is_ok(), valid);
    }
}
