use url::Url;

use crate::link::ProxyLinker;

/// Rewrite a `srcset` value (`url1 1x, url2 2x, url3 300w`).
///
/// Each candidate's URL is proxied independently; descriptors are kept and
/// candidates are re-joined with `", "`. Empty candidates are dropped.
#[must_use]
pub fn rewrite_srcset(srcset: &str, base: &Url, linker: &ProxyLinker) -> String {
    srcset
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| {
            let (reference, descriptor) = match candidate.split_once(char::is_whitespace) {
                Some((reference, descriptor)) => (reference, descriptor.trim()),
                None => (candidate, ""),
            };
            let reference = linker
                .rewrite(reference, base)
                .unwrap_or_else(|| reference.to_string());
            if descriptor.is_empty() {
                reference
            } else {
                format!("{reference} {descriptor}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_keep_descriptors() {
        let base = Url::parse("http://example.com/dir/").unwrap();
        let linker = ProxyLinker::default();
        let out = rewrite_srcset(
            "small.jpg 1x,  /big.jpg   2x ,https://cdn.example/w.jpg 300w",
            &base,
            &linker,
        );
        let parts: Vec<&str> = out.split(", ").collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].ends_with(" 1x"));
        assert!(parts[1].ends_with(" 2x"));
        assert!(parts[2].ends_with(" 300w"));

        let url_of = |part: &str| {
            let link = part.split(' ').next().unwrap();
            linker.target_of(link).unwrap()
        };
        assert_eq!(url_of(parts[0]), "http://example.com/dir/small.jpg");
        assert_eq!(url_of(parts[1]), "http://example.com/big.jpg");
        assert_eq!(url_of(parts[2]), "https://cdn.example/w.jpg");
    }

    #[test]
    fn candidate_without_descriptor() {
        let base = Url::parse("http://example.com/").unwrap();
        let linker = ProxyLinker::default();
        assert_eq!(
            rewrite_srcset("a.png", &base, &linker),
            "/proxy?url=http%3A%2F%2Fexample.com%2Fa.png"
        );
    }

    #[test]
    fn blank_candidates_dropped() {
        let base = Url::parse("http://example.com/").unwrap();
        let linker = ProxyLinker::default();
        assert_eq!(rewrite_srcset(" , ,", &base, &linker), "");
    }
}
