//! Where the proxy target comes from on an inbound request.

use {
    base64::{
        Engine,
        engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    },
    url::form_urlencoded,
    wayfarer_rewrite::resolve::has_scheme,
};

/// Name of the query parameter / form field carrying the target.
pub const TARGET_PARAM: &str = "url";

/// The `url` value of a query string or urlencoded form body, if present
/// and non-blank.
#[must_use]
pub fn target_param(encoded: &[u8]) -> Option<String> {
    form_urlencoded::parse(encoded)
        .find(|(name, _)| name == TARGET_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Accept both plain targets and base64-encoded ones (`?url=aHR0cHM6Ly8...`).
///
/// A value is only treated as base64 when it has no scheme of its own and
/// decodes to text starting with `http://` or `https://`.
#[must_use]
pub fn decode_target(raw: &str) -> String {
    if has_scheme(raw) {
        return raw.to_string();
    }
    // `+` arrives as a space once the query string is form-decoded.
    let packed = raw.replace(' ', "+");
    let packed = packed.trim_end_matches('=');
    [STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .filter_map(|engine| engine.decode(packed).ok())
        .filter_map(|bytes| String::from_utf8(bytes).ok())
        .map(|decoded| decoded.trim().to_string())
        .find(|decoded| {
            let lower = decoded.to_ascii_lowercase();
            lower.starts_with("http://") || lower.starts_with("https://")
        })
        .unwrap_or_else(|| raw.to_string())
}
