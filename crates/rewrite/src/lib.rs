//! HTML reference rewriting for the proxy.
//!
//! Every link, asset, form target, refresh directive and CSS `url()` in a
//! page is turned into a ProxyLink (`/proxy?url=<absolute URL>`) so that
//! following it comes back through the proxy. References that are not
//! http(s) (`mailto:`, `javascript:`, `data:`, ...) are left as they are.
//!
//! The primary path decodes the body and rewrites a parsed tree. When that
//! fails the body is rewritten byte-wise by [`fallback::rewrite_bytes`],
//! which is best-effort.

pub mod charset;
pub mod css;
mod dom;
pub mod fallback;
pub mod link;
pub mod meta;
pub mod resolve;
pub mod srcset;

use {
    encoding_rs::{Encoding, UTF_8},
    thiserror::Error,
    tracing::warn,
    url::Url,
};

pub use {
    css::rewrite_css,
    link::{DEFAULT_PROXY_PATH, ProxyLinker},
    resolve::{ResolveError, is_web_url, resolve},
    srcset::rewrite_srcset,
};

/// Why the tree-based path gave up on a document.
#[derive(Debug, Error)]
pub enum StructuredError {
    #[error("body is not valid {encoding}")]
    Decode { encoding: &'static str },

    #[error("document has no <head>")]
    MissingHead,

    #[error("selector {0:?} failed to compile")]
    Selector(&'static str),

    #[error(transparent)]
    Serialize(#[from] std::io::Error),

    #[error("serialised document is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Which path produced a rewritten body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    Structured,
    /// Degraded safety: byte-level patterns, see [`fallback`].
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Rewritten {
    /// UTF-8 for [`RewriteMode::Structured`], the source's bytes otherwise.
    pub body: Vec<u8>,
    pub mode: RewriteMode,
    /// Encoding label of `body`.
    pub charset: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct HtmlRewriter {
    linker: ProxyLinker,
}

impl HtmlRewriter {
    pub fn new(linker: ProxyLinker) -> Self {
        Self { linker }
    }

    pub fn linker(&self) -> &ProxyLinker {
        &self.linker
    }

    /// Rewrite a body with no declared charset.
    #[must_use]
    pub fn rewrite(&self, html: &[u8], base: &Url) -> Rewritten {
        self.rewrite_with_charset(html, base, None)
    }

    /// Rewrite `html`, fetched from `base` (the post-redirect URL).
    ///
    /// `charset` is the Content-Type `charset` parameter, if the upstream
    /// sent one. Never fails: anything the tree path cannot handle goes
    /// through the fallback instead.
    #[must_use]
    pub fn rewrite_with_charset(
        &self,
        html: &[u8],
        base: &Url,
        charset: Option<&str>,
    ) -> Rewritten {
        let encoding = charset::detect(html, charset);
        match self.structured(html, base, encoding) {
            Ok(body) => Rewritten {
                body: body.into_bytes(),
                mode: RewriteMode::Structured,
                charset: UTF_8.name(),
            },
            Err(e) => {
                warn!(url = %base, error = %e, "html rewrite degraded to fallback");
                Rewritten {
                    body: fallback::rewrite_bytes(html, base, &self.linker),
                    mode: RewriteMode::Fallback,
                    charset: encoding.name(),
                }
            },
        }
    }

    fn structured(
        &self,
        html: &[u8],
        base: &Url,
        encoding: &'static Encoding,
    ) -> Result<String, StructuredError> {
        let text = charset::decode_strict(html, encoding).ok_or(StructuredError::Decode {
            encoding: encoding.name(),
        })?;
        dom::rewrite_document(&text, base, &self.linker)
    }
}
