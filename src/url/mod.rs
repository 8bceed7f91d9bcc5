//! URL handling module for Registry-Harvest
//!
//! This module builds the registry's search and listing-page URLs and
//! resolves relative links found in listing markup.

mod pagination;

use crate::region::Region;
use url::{ParseError, Url};

pub use pagination::{strip_page_offset, PageUrls, PaginationToken};

/// Builds the URL of the first listing page for a region
///
/// # Examples
///
/// ```
/// use registry_harvest::region::Region;
/// use registry_harvest::url::search_url;
/// use url::Url;
///
/// let base = Url::parse("http://www.firmenregister.de/").unwrap();
/// let region = Region::find("Berlin").unwrap();
/// let url = search_url(&base, &region).unwrap();
/// assert!(url.as_str().ends_with("bundesland=Berlin&Suchen=Suchen"));
/// ```
pub fn search_url(base: &Url, region: &Region) -> Result<Url, ParseError> {
    base.join(&format!(
        "register.php?cmd=search&stichwort=&firma=&branche=&vonplz=&ort=&strasse=&vorwahl=&bundesland={}&Suchen=Suchen",
        region.code
    ))
}

/// Resolves an href or src attribute to an absolute URL
///
/// Values that already start with `http` are returned untouched; anything
/// else is joined onto `base`. Returns None for empty or unresolvable values.
pub fn resolve_against(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("http") {
        return Some(href.to_string());
    }

    base.join(href).ok().map(|u| u.to_string())
}
