//! Reference resolution against a document base URL.

use {thiserror::Error, url::Url};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve {reference:?}: {source}")]
pub struct ResolveError {
    reference: String,
    #[source]
    source: url::ParseError,
}

/// Whether `reference` starts with a URL scheme (`[A-Za-z][A-Za-z0-9+.-]*:`).
#[must_use]
pub fn has_scheme(reference: &str) -> bool {
    let Some((scheme, _)) = reference.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// `http` and `https` URLs are the only ones routed through the proxy.
#[must_use]
pub fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Join a possibly-relative `reference` against `base`.
///
/// - empty or whitespace-only references resolve to `base`
/// - references with a scheme are parsed as-is (`mailto:`, `data:`, ...)
/// - `//host/path` inherits the scheme of `base`
/// - `/path` keeps the scheme, host and port of `base`
/// - anything else is joined onto the directory of `base`'s path, with
///   `.` and `..` segments collapsed
pub fn resolve(reference: &str, base: &Url) -> Result<Url, ResolveError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Ok(base.clone());
    }

    let resolved = if has_scheme(reference) {
        Url::parse(reference)
    } else if let Some(rest) = reference.strip_prefix("//") {
        Url::parse(&format!("{}://{rest}", base.scheme()))
    } else {
        base.join(reference)
    };

    resolved.map_err(|source| ResolveError {
        reference: reference.to_string(),
        source,
    })
}
