//! Tree-based rewriting over an html5ever document (via kuchikiki).

use {
    kuchikiki::{ElementData, NodeDataRef, NodeRef, traits::*},
    url::Url,
};

use crate::{
    StructuredError,
    css::rewrite_css,
    link::ProxyLinker,
    meta::{is_refresh, rewrite_refresh},
    resolve::{is_web_url, resolve},
    srcset::rewrite_srcset,
};

/// Attributes holding a single URL.
pub(crate) const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "data-src",
    "data-href",
    "formaction",
    "poster",
];

const SRCSET_ATTRIBUTES: &[&str] = &["srcset", "imagesrcset"];

/// Parse, rewrite and re-serialise a decoded document.
///
/// `effective` is the post-redirect URL of the response. A `<base href>`
/// declared by the page itself (resolved against `effective`) takes over as
/// the resolution base for the page's references, exactly as a browser
/// would use it; the single `<base>` left in the output always points at
/// `effective`.
pub(crate) fn rewrite_document(
    html: &str,
    effective: &Url,
    linker: &ProxyLinker,
) -> Result<String, StructuredError> {
    let document = kuchikiki::parse_html().one(html);

    let base = declared_base(&document, effective).unwrap_or_else(|| effective.clone());
    for element in document.descendants().elements() {
        rewrite_element(&element, &base, linker);
    }
    ensure_single_base(&document, effective)?;

    let mut out = Vec::with_capacity(html.len() + html.len() / 4);
    document.serialize(&mut out)?;
    Ok(String::from_utf8(out)?)
}

fn declared_base(document: &NodeRef, effective: &Url) -> Option<Url> {
    let element = document.select_first("base[href]").ok()?;
    let attributes = element.attributes.borrow();
    let resolved = resolve(attributes.get("href")?, effective).ok()?;
    is_web_url(&resolved).then_some(resolved)
}

fn rewrite_element(element: &NodeDataRef<ElementData>, base: &Url, linker: &ProxyLinker) {
    let tag: &str = &element.name.local;
    if tag == "base" {
        return;
    }

    {
        let mut attributes = element.attributes.borrow_mut();

        for &name in URL_ATTRIBUTES {
            if let Some(link) = attributes.get(name).and_then(|v| linker.rewrite(v, base)) {
                attributes.insert(name, link);
            }
        }

        for &name in SRCSET_ATTRIBUTES {
            if let Some(srcset) = attributes.get(name).map(|v| rewrite_srcset(v, base, linker)) {
                attributes.insert(name, srcset);
            }
        }

        if let Some(style) = attributes.get("style").map(str::to_string) {
            let rewritten = rewrite_css(&style, base, linker);
            if rewritten != style {
                attributes.insert("style", rewritten);
            }
        }

        if tag == "meta"
            && attributes.get("http-equiv").is_some_and(is_refresh)
            && let Some(content) = attributes
                .get("content")
                .and_then(|c| rewrite_refresh(c, base, linker))
        {
            attributes.insert("content", content);
        }
    }

    if tag == "style" {
        for child in element.as_node().children() {
            if let Some(text) = child.as_text() {
                let rewritten = rewrite_css(&text.borrow(), base, linker);
                *text.borrow_mut() = rewritten;
            }
        }
    }
}

/// Drop every existing `<base>` and put one pointing at `href` first in
/// `<head>`.
fn ensure_single_base(document: &NodeRef, href: &Url) -> Result<(), StructuredError> {
    let existing: Vec<NodeRef> = document
        .select("base")
        .map_err(|()| StructuredError::Selector("base"))?
        .map(|element| element.as_node().clone())
        .collect();
    for node in existing {
        node.detach();
    }

    let head = document
        .select_first("head")
        .map_err(|()| StructuredError::MissingHead)?;
    head.as_node().prepend(base_element(href)?);
    Ok(())
}

fn base_element(href: &Url) -> Result<NodeRef, StructuredError> {
    let scratch = kuchikiki::parse_html().one("<base>");
    let element = scratch
        .select_first("base")
        .map_err(|()| StructuredError::Selector("base"))?;
    element
        .attributes
        .borrow_mut()
        .insert("href", href.to_string());
    let node = element.as_node().clone();
    node.detach();
    Ok(node)
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(html: &str, base: &str) -> String {
        let base = Url::parse(base).unwrap();
        rewrite_document(html, &base, &ProxyLinker::default()).unwrap()
    }

    fn attr_values(html: &str, selector: &str, attr: &str) -> Vec<String> {
        let doc = kuchikiki::parse_html().one(html);
        doc.select(selector)
            .unwrap()
            .filter_map(|el| el.attributes.borrow().get(attr).map(str::to_string))
            .collect()
    }

    #[test]
    fn exactly_one_base_pointing_at_effective_url() {
        let out = rewrite(
            "<html><head><base href=\"/a/\"><base href=\"/b/\"></head><body></body></html>",
            "http://example.com/dir/",
        );
        assert_eq!(attr_values(&out, "base", "href"), vec![
            "http://example.com/dir/".to_string()
        ]);
    }

    #[test]
    fn base_added_when_head_missing() {
        let out = rewrite("<p><a href=\"x\">x</a>", "http://example.com/");
        assert_eq!(attr_values(&out, "head > base", "href"), vec![
            "http://example.com/".to_string()
        ]);
    }

    #[test]
    fn declared_base_drives_resolution() {
        let out = rewrite(
            "<head><base href=\"https://cdn.example/assets/\"></head><img src=\"i.png\">",
            "http://example.com/dir/page",
        );
        let linker = ProxyLinker::default();
        let src = attr_values(&out, "img", "src").pop().unwrap();
        assert_eq!(
            linker.target_of(&src).unwrap(),
            "https://cdn.example/assets/i.png"
        );
    }

    #[test]
    fn data_attributes_and_forms() {
        let out = rewrite(
            "<form action=\"/login\"><button formaction=\"alt\"></button></form>\
             <div data-src=\"lazy.png\" data-href=\"/more\"></div>",
            "http://example.com/dir/",
        );
        let linker = ProxyLinker::default();
        let target = |sel: &str, attr: &str| {
            linker
                .target_of(&attr_values(&out, sel, attr).pop().unwrap())
                .unwrap()
        };
        assert_eq!(target("form", "action"), "http://example.com/login");
        assert_eq!(target("button", "formaction"), "http://example.com/dir/alt");
        assert_eq!(target("div", "data-src"), "http://example.com/dir/lazy.png");
        assert_eq!(target("div", "data-href"), "http://example.com/more");
    }

    #[test]
    fn meta_refresh_and_inline_style() {
        let out = rewrite(
            "<head><meta http-equiv=\"REFRESH\" content=\"0; url=/next\"></head>\
             <body style=\"background: url(bg.png)\"></body>",
            "http://example.com/dir/",
        );
        assert_eq!(attr_values(&out, "meta", "content"), vec![
            "0; url=/proxy?url=http%3A%2F%2Fexample.com%2Fnext".to_string()
        ]);
        assert_eq!(attr_values(&out, "body", "style"), vec![
            "background: url(/proxy?url=http%3A%2F%2Fexample.com%2Fdir%2Fbg.png)".to_string()
        ]);
    }

    #[test]
    fn other_meta_content_untouched() {
        let out = rewrite(
            "<head><meta name=\"description\" content=\"0; url=/next\"></head>",
            "http://example.com/",
        );
        assert_eq!(attr_values(&out, "meta", "content"), vec![
            "0; url=/next".to_string()
        ]);
    }
}
