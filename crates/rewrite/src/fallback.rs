//! Pattern-based rewriting straight over the raw body bytes.
//!
//! This is the degraded-safety path, taken when a body cannot be decoded
//! or parsed as a tree. Matching markup with patterns misses references a
//! parser would find (markup assembled by script, attributes inside
//! comments that look like tags) and can touch prose that merely resembles
//! an attribute, so pages served through it are contained less reliably.
//! Bytes outside the matched references are copied through untouched,
//! whatever their encoding.

use std::{borrow::Cow, sync::LazyLock};

use {
    regex::bytes::{Captures, Regex},
    url::Url,
};

use crate::{
    css::{IMPORT_PATTERN, URL_PATTERN},
    link::ProxyLinker,
    meta::{is_refresh, rewrite_refresh},
    resolve::{is_web_url, resolve},
    srcset::rewrite_srcset,
};

/// Attribute value: double-quoted, single-quoted or unquoted.
const VALUE: &str = r#"(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        #[allow(clippy::expect_used)]
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(&$re).expect(concat!(stringify!($name), " compiles")));
    };
}

pattern!(
    ATTRIBUTE,
    format!(
        r"(?i-u)(\s)(href|src|action|data-src|data-href|formaction|poster|srcset|imagesrcset)(\s*=\s*){VALUE}"
    )
);
pattern!(META_TAG, r"(?i-u)<meta\b[^>]*>");
pattern!(HTTP_EQUIV, format!(r"(?i-u)\shttp-equiv\s*=\s*{VALUE}"));
pattern!(
    META_CONTENT,
    r#"(?i-u)(\scontent\s*=\s*)(?:"([^"]*)"|'([^']*)')"#
);
pattern!(CSS_URL, format!("(?i-u){URL_PATTERN}"));
pattern!(CSS_IMPORT, format!("(?i-u){IMPORT_PATTERN}"));
pattern!(BASE_TAG, r"(?i-u)<base\b[^>]*>");
pattern!(BASE_HREF, format!(r"(?i-u)\shref\s*=\s*{VALUE}"));
pattern!(HEAD_OPEN, r"(?i-u)<head\b[^>]*>");
pattern!(HTML_OPEN, r"(?i-u)<html\b[^>]*>");
pattern!(DOCTYPE, r"(?i-u)<!doctype\b[^>]*>");

/// Rewrite references in `html` without decoding it.
///
/// Covers the same references as the tree path: URL attributes, `srcset`,
/// `<meta http-equiv="refresh">`, CSS `url()` and `@import` anywhere in the
/// document. Every existing `<base>` is dropped and a single one pointing
/// at `effective` is inserted after the opening `<head>` (or `<html>`, or
/// the doctype, or at the very start).
#[must_use]
pub fn rewrite_bytes(html: &[u8], effective: &Url, linker: &ProxyLinker) -> Vec<u8> {
    let base = declared_base(html, effective).unwrap_or_else(|| effective.clone());

    let html = META_TAG.replace_all(html, |caps: &Captures<'_>| {
        rewrite_meta(&caps[0], &base, linker)
    });
    let html = ATTRIBUTE.replace_all(&html, |caps: &Captures<'_>| {
        rewrite_attribute(caps, &base, linker)
    });
    let html = CSS_URL.replace_all(&html, |caps: &Captures<'_>| {
        rewrite_css_token(caps, b"url(", b")", &base, linker)
    });
    let html = CSS_IMPORT.replace_all(&html, |caps: &Captures<'_>| {
        rewrite_css_token(caps, b"@import ", b"", &base, linker)
    });
    let html = BASE_TAG.replace_all(&html, &b""[..]);

    insert_base(&html, effective)
}

/// Quote and raw value of the first of three value groups starting at
/// `first` that participated in the match. Bare values get an empty quote.
fn quoted_value<'h>(caps: &Captures<'h>, first: usize) -> Option<(&'static [u8], &'h [u8])> {
    if let Some(m) = caps.get(first) {
        Some((b"\"", m.as_bytes()))
    } else if let Some(m) = caps.get(first + 1) {
        Some((b"'", m.as_bytes()))
    } else {
        caps.get(first + 2).map(|m| (&b""[..], m.as_bytes()))
    }
}

fn unescape(value: &str) -> Cow<'_, str> {
    if value.contains('&') {
        Cow::Owned(
            value
                .replace("&quot;", "\"")
                .replace("&#39;", "'")
                .replace("&amp;", "&"),
        )
    } else {
        Cow::Borrowed(value)
    }
}

fn escape(value: &str) -> Cow<'_, str> {
    if value.contains(['&', '"', '\'']) {
        Cow::Owned(
            value
                .replace('&', "&amp;")
                .replace('"', "&quot;")
                .replace('\'', "&#39;"),
        )
    } else {
        Cow::Borrowed(value)
    }
}

fn declared_base(html: &[u8], effective: &Url) -> Option<Url> {
    BASE_TAG.find_iter(html).find_map(|tag| {
        let caps = BASE_HREF.captures(tag.as_bytes())?;
        let (_, value) = quoted_value(&caps, 1)?;
        let href = unescape(std::str::from_utf8(value).ok()?).into_owned();
        let resolved = resolve(&href, effective).ok()?;
        is_web_url(&resolved).then_some(resolved)
    })
}

fn rewrite_meta(tag: &[u8], base: &Url, linker: &ProxyLinker) -> Vec<u8> {
    let refresh = HTTP_EQUIV
        .captures(tag)
        .and_then(|caps| {
            let (_, value) = quoted_value(&caps, 1)?;
            std::str::from_utf8(value).ok().map(is_refresh)
        })
        .unwrap_or(false);
    if !refresh {
        return tag.to_vec();
    }

    META_CONTENT
        .replace(tag, |caps: &Captures<'_>| {
            let rewritten = quoted_value(caps, 2).and_then(|(quote, value)| {
                let content = unescape(std::str::from_utf8(value).ok()?).into_owned();
                let content = rewrite_refresh(&content, base, linker)?;
                Some([&caps[1], quote, escape(&content).as_bytes(), quote].concat())
            });
            rewritten.unwrap_or_else(|| caps[0].to_vec())
        })
        .into_owned()
}

fn rewrite_attribute(caps: &Captures<'_>, base: &Url, linker: &ProxyLinker) -> Vec<u8> {
    let name = &caps[2];
    let rewritten = quoted_value(caps, 4).and_then(|(quote, value)| {
        let value = unescape(std::str::from_utf8(value).ok()?).into_owned();
        let value = if name.eq_ignore_ascii_case(b"srcset")
            || name.eq_ignore_ascii_case(b"imagesrcset")
        {
            rewrite_srcset(&value, base, linker)
        } else {
            linker.rewrite(&value, base)?
        };
        let quote = if quote.is_empty() { &b"\""[..] } else { quote };
        Some([&caps[1], name, &caps[3], quote, escape(&value).as_bytes(), quote].concat())
    });
    rewritten.unwrap_or_else(|| caps[0].to_vec())
}

fn rewrite_css_token(
    caps: &Captures<'_>,
    open: &[u8],
    close: &[u8],
    base: &Url,
    linker: &ProxyLinker,
) -> Vec<u8> {
    let rewritten = quoted_value(caps, 1).and_then(|(quote, value)| {
        let link = linker.rewrite(std::str::from_utf8(value).ok()?, base)?;
        Some([open, quote, link.as_bytes(), quote, close].concat())
    });
    rewritten.unwrap_or_else(|| caps[0].to_vec())
}

fn insert_base(html: &[u8], href: &Url) -> Vec<u8> {
    let tag = format!("<base href=\"{}\">", escape(href.as_str()));
    let at = HEAD_OPEN
        .find(html)
        .or_else(|| HTML_OPEN.find(html))
        .or_else(|| DOCTYPE.find(html))
        .map_or(0, |m| m.end());

    let mut out = Vec::with_capacity(html.len() + tag.len());
    out.extend_from_slice(&html[..at]);
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(&html[at..]);
    out
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(html: &[u8], base: &str) -> String {
        let base = Url::parse(base).unwrap();
        let out = rewrite_bytes(html, &base, &ProxyLinker::default());
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn attributes_keep_quote_style() {
        let out = rewrite(
            b"<a href=\"/page\">a</a><img src='x.png'><a href=rel.html>r</a>",
            "http://example.com/dir/",
        );
        assert!(out.contains("href=\"/proxy?url=http%3A%2F%2Fexample.com%2Fpage\""));
        assert!(out.contains("src='/proxy?url=http%3A%2F%2Fexample.com%2Fdir%2Fx.png'"));
        assert!(out.contains("href=\"/proxy?url=http%3A%2F%2Fexample.com%2Fdir%2Frel.html\""));
    }

    #[test]
    fn non_web_references_untouched() {
        let html = b"<a href=\"mailto:a@b.com\">m</a><a href='javascript:void(0)'>j</a>";
        let out = rewrite(html, "http://example.com/");
        assert!(out.contains("href=\"mailto:a@b.com\""));
        assert!(out.contains("href='javascript:void(0)'"));
    }

    #[test]
    fn entity_in_value_is_decoded_before_resolving() {
        let out = rewrite(b"<a href=\"/s?a=1&amp;b=2\">s</a>", "http://example.com/");
        let linker = ProxyLinker::default();
        let start = out.find("/proxy?url=").unwrap();
        let end = start + out[start..].find('"').unwrap();
        assert_eq!(
            linker.target_of(&out[start..end]).unwrap(),
            "http://example.com/s?a=1&b=2"
        );
    }

    #[test]
    fn invalid_utf8_bytes_survive() {
        let html = b"<html><head></head><body>caf\xE9 <a href=\"/x\">x</a> \xFF</body></html>";
        let base = Url::parse("http://example.com/").unwrap();
        let out = rewrite_bytes(html, &base, &ProxyLinker::default());
        assert!(out.windows(4).any(|w| w == b"caf\xE9"));
        assert!(out.windows(2).any(|w| w == b" \xFF"));
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("href=\"/proxy?url=http%3A%2F%2Fexample.com%2Fx\""));
    }

    #[test]
    fn single_base_after_head() {
        let out = rewrite(
            b"<!DOCTYPE html><html><HEAD lang=en><base href=\"/old/\"></HEAD><body></body></html>",
            "http://example.com/dir/",
        );
        assert_eq!(out.matches("<base").count(), 1);
        assert!(out.contains("<HEAD lang=en><base href=\"http://example.com/dir/\">"));
    }

    #[test]
    fn base_placement_without_head() {
        let out = rewrite(b"<html><p>x</p></html>", "http://example.com/");
        assert!(out.starts_with("<html><base href=\"http://example.com/\">"));

        let out = rewrite(b"<!doctype html><p>x</p>", "http://example.com/");
        assert!(out.starts_with("<!doctype html><base href=\"http://example.com/\">"));

        let out = rewrite(b"<p>x</p>", "http://example.com/");
        assert!(out.starts_with("<base href=\"http://example.com/\"><p>"));
    }

    #[test]
    fn header_element_is_not_head() {
        let out = rewrite(b"<header>h</header><head></head>", "http://example.com/");
        assert!(out.starts_with("<header>h</header><head><base"));
    }

    #[test]
    fn declared_base_drives_resolution() {
        let out = rewrite(
            b"<head><base href='https://cdn.example/a/'></head><img src=\"i.png\">",
            "http://example.com/",
        );
        assert!(out.contains("src=\"/proxy?url=https%3A%2F%2Fcdn.example%2Fa%2Fi.png\""));
    }

    #[test]
    fn meta_refresh_and_css() {
        let out = rewrite(
            b"<meta http-equiv=refresh content=\"0; url=/next\">\
              <div style=\"background:url(bg.png)\"></div>\
              <style>@import 'theme.css';</style>",
            "http://example.com/dir/",
        );
        assert!(out.contains("content=\"0; url=/proxy?url=http%3A%2F%2Fexample.com%2Fnext\""));
        assert!(out.contains("url(/proxy?url=http%3A%2F%2Fexample.com%2Fdir%2Fbg.png)"));
        assert!(out.contains("@import '/proxy?url=http%3A%2F%2Fexample.com%2Fdir%2Ftheme.css'"));
    }

    #[test]
    fn srcset_candidates() {
        let out = rewrite(b"<img srcset=\"a.png 1x, b.png 2x\">", "http://example.com/");
        assert!(out.contains(
            "srcset=\"/proxy?url=http%3A%2F%2Fexample.com%2Fa.png 1x, \
             /proxy?url=http%3A%2F%2Fexample.com%2Fb.png 2x\""
        ));
    }
}
