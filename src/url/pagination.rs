//! Listing-page URL construction
//!
//! The first listing page links to later pages with an `fr` token that
//! encodes the search. The token is captured once and reused verbatim for
//! every later page; it is never re-parsed from page to page.

use url::{ParseError, Url};

/// Opaque search token discovered on the first listing page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaginationToken(String);

impl PaginationToken {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Extracts the raw `fr` query value from a pagination link
    pub fn from_page_url(url: &str) -> Option<Self> {
        let query = url.split_once('?').map(|(_, q)| q)?;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("fr="))
            .and_then(|v| Self::new(v.split('#').next().unwrap_or(v)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Removes every explicit `&ap=<digits>` page offset from a link
pub fn strip_page_offset(href: &str) -> String {
    let mut out = String::with_capacity(href.len());
    let mut rest = href;

    while let Some(idx) = rest.find("&ap=") {
        let after = &rest[idx + 4..];
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            // Not a numeric offset, keep it
            out.push_str(&rest[..idx + 4]);
            rest = after;
            continue;
        }
        out.push_str(&rest[..idx]);
        rest = &after[digits..];
    }

    out.push_str(rest);
    out
}

/// Builds the URLs of listing pages after the first
#[derive(Debug, Clone)]
pub struct PageUrls {
    base: Url,
    page_base: String,
    token: Option<PaginationToken>,
}

impl PageUrls {
    /// # Arguments
    ///
    /// * `base` - Site root
    /// * `page_base` - Stripped pagination link, or the search URL when the
    ///   first page offered none
    /// * `token` - Search token, when one was found
    pub fn new(base: Url, page_base: impl Into<String>, token: Option<PaginationToken>) -> Self {
        Self {
            base,
            page_base: page_base.into(),
            token,
        }
    }

    pub fn token(&self) -> Option<&PaginationToken> {
        self.token.as_ref()
    }

    /// URL of the zero-based listing page `page`
    pub fn page_url(&self, page: u32) -> Result<Url, ParseError> {
        match &self.token {
            Some(token) => self.base.join(&format!(
                "register.php?cmd=mysearch&fr={}&auswahl=alle&ap={}",
                token.as_str(),
                page
            )),
            None => Url::parse(&format!("{}&ap={}", self.page_base, page)),
        }
    }
}
