//! Character-set detection and strict decoding for HTML bodies.

use std::{borrow::Cow, sync::LazyLock};

use {
    encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE},
    regex::bytes::Regex,
};

/// How far into the body a `<meta charset>` declaration is looked for.
const META_SNIFF_BYTES: usize = 1024;

#[allow(clippy::expect_used)]
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\b[^>]*?charset\s*=\s*["']?\s*([A-Za-z0-9_.:\-]+)"#)
        .expect("meta charset pattern compiles")
});

/// The `charset` parameter of a Content-Type value, if any.
#[must_use]
pub fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|v| !v.is_empty())
    })
}

/// Pick the encoding for an HTML body: byte-order mark, then the
/// Content-Type charset, then a sniffed `<meta charset>`, then UTF-8.
#[must_use]
pub fn detect(body: &[u8], declared: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(body) {
        return encoding;
    }
    if let Some(encoding) = declared.and_then(|label| Encoding::for_label(label.as_bytes())) {
        return encoding;
    }
    let head = &body[..body.len().min(META_SNIFF_BYTES)];
    META_CHARSET
        .captures(head)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Encoding::for_label(m.as_bytes()))
        .map(|encoding| {
            // An ASCII-compatible document cannot really be UTF-16.
            if encoding == UTF_16LE || encoding == UTF_16BE {
                UTF_8
            } else {
                encoding
            }
        })
        .unwrap_or(UTF_8)
}

/// Decode without replacement characters. `None` if any byte sequence is
/// malformed for `encoding`.
#[must_use]
pub fn decode_strict<'a>(body: &'a [u8], encoding: &'static Encoding) -> Option<Cow<'a, str>> {
    let body = match Encoding::for_bom(body) {
        Some((bom_encoding, len)) if bom_encoding == encoding => &body[len..],
        _ => body,
    };
    encoding.decode_without_bom_handling_and_without_replacement(body)
}
