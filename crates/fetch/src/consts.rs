use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

pub(crate) const DEFAULT_CHARSET: &str = "UTF-8";

selector!(CANONICAL_SELECTOR, r#"link[rel="canonical"][href]"#);
selector!(META_CHARSET_SELECTOR, "meta[charset]");
selector!(META_HTTP_EQUIV_SELECTOR, "meta[http-equiv][content]");
// Charset parameter of a Content-Type value, e.g. `text/html; charset="utf-8"`.
regex!(CHARSET_PARAM_REGEX, r#"(?i)charset\s*=\s*["']?([^"';\s]+)"#);
