use url::Url;

use crate::link::ProxyLinker;

/// Rewrite the URL in a `<meta http-equiv="refresh">` `content` value
/// (`N; url=...`, keyword case-insensitive, value optionally quoted).
///
/// Everything before the URL is kept verbatim. Returns `None` when there is
/// no URL part or it does not resolve to an http(s) URL.
#[must_use]
pub fn rewrite_refresh(content: &str, base: &Url, linker: &ProxyLinker) -> Option<String> {
    let sep = content.find([';', ','])?;
    let after = content[sep + 1..].trim_start();
    if !after.get(..3)?.eq_ignore_ascii_case("url") {
        return None;
    }
    let rest = after[3..].trim_start().strip_prefix('=')?.trim_start();
    let value_start = content.len() - rest.len();

    let value = rest.trim_end();
    let value = match value.chars().next() {
        Some(q @ ('"' | '\'')) => {
            let inner = &value[1..];
            inner.strip_suffix(q).unwrap_or(inner)
        },
        _ => value,
    };

    let link = linker.rewrite(value, base)?;
    Some(format!("{}{link}", &content[..value_start]))
}

/// Whether an `http-equiv` value names the refresh pragma.
#[must_use]
pub fn is_refresh(http_equiv: &str) -> bool {
    http_equiv.trim().eq_ignore_ascii_case("refresh")
}
