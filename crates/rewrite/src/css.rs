//! `url(...)` and `@import "..."` rewriting for stylesheets and inline styles.
//!
//! Token-level only: there is no CSS parser here, so a `url(` inside a
//! comment or string literal is rewritten as well.

use std::sync::LazyLock;

use {
    regex::{Captures, Regex},
    url::Url,
};

use crate::link::ProxyLinker;

/// `url(...)` with a double-quoted, single-quoted or bare target.
pub(crate) const URL_PATTERN: &str = r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^"'()\s]*))\s*\)"#;

/// `@import "..."` / `@import '...'`. `@import url(...)` is covered by
/// [`URL_PATTERN`].
pub(crate) const IMPORT_PATTERN: &str = r#"@import\s*(?:"([^"]*)"|'([^']*)')"#;

#[allow(clippy::expect_used)]
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){URL_PATTERN}")).expect("css url() pattern compiles")
});

#[allow(clippy::expect_used)]
static CSS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){IMPORT_PATTERN}")).expect("css @import pattern compiles")
});

/// Rewrite every `url()` and string `@import` in `css` whose target
/// resolves to an http(s) URL. Other text is returned unchanged.
#[must_use]
pub fn rewrite_css(css: &str, base: &Url, linker: &ProxyLinker) -> String {
    let css = CSS_URL.replace_all(css, |caps: &Captures<'_>| {
        let (quote, reference) = quoted(caps);
        match linker.rewrite(reference, base) {
            Some(link) => format!("url({quote}{link}{quote})"),
            None => caps[0].to_string(),
        }
    });
    CSS_IMPORT
        .replace_all(&css, |caps: &Captures<'_>| {
            let (quote, reference) = quoted(caps);
            match linker.rewrite(reference, base) {
                Some(link) => format!("@import {quote}{link}{quote}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Quote character and inner text of a `"..."` / `'...'` / bare capture.
fn quoted<'h>(caps: &Captures<'h>) -> (&'static str, &'h str) {
    if let Some(m) = caps.get(1) {
        ("\"", m.as_str())
    } else if let Some(m) = caps.get(2) {
        ("'", m.as_str())
    } else {
        ("", caps.get(3).map_or("", |m| m.as_str()))
    }
}
