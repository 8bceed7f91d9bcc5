//! Listing-page extractor
//!
//! This module turns one registry listing page into typed records:
//! - Locates the last table inside `#content` (earlier tables are chrome)
//! - Reads every 4-cell row as a company row, positionally
//! - On the first page only, reads the pagination row for the page count
//!   and the reusable pagination token
//!
//! Missing markup never fails the page. A cell that does not have the
//! expected shape leaves its field absent; a page without the content
//! table yields an empty result with `structure_found == false`.

use crate::record::{Field, Record};
use crate::url::{resolve_against, strip_page_offset, PaginationToken};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Text identifying the pagination row
pub const PAGE_INDICATOR: &str = "Seiten:";

/// First-cell text of header and placeholder rows
pub const PLACEHOLDER_CELL: &str = "Info";

const TOOLTIP_PREFIX: &str = "return escape('";
const TOOLTIP_SUFFIX: &str = "')";

/// Result of extracting one listing page
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// Company rows in document order
    pub records: Vec<Record>,

    /// Highest page number in the pagination row (first page only)
    pub total_pages: Option<u32>,

    /// Absolute pagination link with its page offset stripped (first page only)
    pub page_base: Option<String>,

    /// Search token of that link (first page only)
    pub token: Option<PaginationToken>,

    /// False when `#content` or its table was missing
    pub structure_found: bool,
}

/// Extracts records (and on the first page, pagination) from a listing page
///
/// # Arguments
///
/// * `html` - The listing page markup
/// * `is_first_page` - Whether to read the pagination row
/// * `base` - Site root for resolving relative links and image paths
///
/// # Example
///
/// ```
/// use registry_harvest::crawler::extract_page;
/// use url::Url;
///
/// let base = Url::parse("http://www.firmenregister.de/").unwrap();
/// let page = extract_page("<html><body>Wartung</body></html>", true, &base);
/// assert!(!page.structure_found);
/// assert!(page.records.is_empty());
/// ```
pub fn extract_page(html: &str, is_first_page: bool, base: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);
    let mut page = ExtractedPage::default();

    let Some(table) = content_table(&document) else {
        tracing::warn!("Listing page has no content table");
        return page;
    };
    page.structure_found = true;

    for row in table_rows(table) {
        let cells: Vec<ElementRef> = row.children().filter_map(ElementRef::wrap).collect();

        if cells.len() != 4 {
            if is_first_page && text_of(row).contains(PAGE_INDICATOR) {
                read_pagination(row, base, &mut page);
            }
            continue;
        }

        if text_of(cells[0]).trim() == PLACEHOLDER_CELL {
            continue;
        }

        page.records.push(extract_record(&cells, base));
    }

    page
}

fn content_table(document: &Html) -> Option<ElementRef<'_>> {
    let content_selector = Selector::parse("#content").ok()?;
    let table_selector = Selector::parse("table").ok()?;

    let content = document.select(&content_selector).next()?;
    content.select(&table_selector).last()
}

/// Rows of the table's first body, not those of nested tables
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let children: Vec<ElementRef> = table.children().filter_map(ElementRef::wrap).collect();

    let body = children.iter().find(|c| c.value().name() == "tbody").copied();
    let rows_parent: Option<Vec<ElementRef>> =
        body.map(|b| b.children().filter_map(ElementRef::wrap).collect());

    rows_parent
        .unwrap_or(children)
        .into_iter()
        .filter(|el| el.value().name() == "tr")
        .collect()
}

fn read_pagination(row: ElementRef<'_>, base: &Url, page: &mut ExtractedPage) {
    let Ok(anchor_selector) = Selector::parse("a") else {
        return;
    };
    let anchors: Vec<ElementRef> = row.select(&anchor_selector).collect();

    if anchors.len() < 2 {
        tracing::debug!("Pagination row with {} anchors ignored", anchors.len());
        return;
    }

    let total = anchors
        .iter()
        .map(|a| parse_leading_int(&text_of(*a)))
        .max()
        .unwrap_or(0);
    page.total_pages = Some(total);

    if let Some(href) = anchors[1].value().attr("href") {
        let stripped = strip_page_offset(href);
        if let Some(absolute) = resolve_against(&stripped, base) {
            page.token = PaginationToken::from_page_url(&absolute);
            page.page_base = Some(absolute);
        }
    }

    tracing::info!(
        "Found {} pages (token {})",
        total,
        if page.token.is_some() { "present" } else { "absent" }
    );
}

fn extract_record(cells: &[ElementRef<'_>], base: &Url) -> Record {
    let mut record = Record::new();

    let anchor_selector = Selector::parse("a").ok();
    let product_selector = Selector::parse(r#"img[src="pic/prod.gif"]"#).ok();
    let img_selector = Selector::parse("img").ok();

    // Column 1: contact links and product tooltip
    if let Some(sel) = &anchor_selector {
        for anchor in cells[0].select(sel) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };

            if let Some(email) = href.strip_prefix("mailto:") {
                if !email.is_empty() {
                    record.set(Field::Email, email);
                }
            } else if href.starts_with("click") {
                if let Some(homepage) = anchor.value().attr("onmouseover").and_then(tooltip_payload) {
                    record.set(Field::Homepage, homepage);
                }
            }
        }
    }

    if let Some(sel) = &product_selector {
        let product = cells[0]
            .select(sel)
            .next()
            .and_then(|img| img.value().attr("onmouseover"))
            .and_then(tooltip_payload);
        if let Some(product) = product {
            record.set(Field::Products, product);
        }
    }

    // Column 2: name, address, postal code, city by anchor position
    if let Some(sel) = &anchor_selector {
        let positional = [Field::Name, Field::Address, Field::PostalCode, Field::City];
        let anchors: Vec<ElementRef> = cells[1].select(sel).collect();

        for (field, anchor) in positional.iter().zip(&anchors) {
            let text = text_of(*anchor);
            let text = text.trim();
            if !text.is_empty() {
                record.set(*field, text);
            }
        }

        if let Some(id) = anchors
            .first()
            .and_then(|a| a.value().attr("href"))
            .and_then(company_id_from_href)
        {
            record.set_source_id(id);
        }
    }

    let industry = text_of(cells[2]);
    let industry = industry.trim();
    if !industry.is_empty() {
        record.set(Field::Industry, industry);
    }

    if let Some(sel) = &img_selector {
        let image = cells[3]
            .select(sel)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| resolve_against(src, base));
        if let Some(image) = image {
            record.set(Field::ImageUrl, image);
        }
    }

    record
}

/// Parses a label the way a lenient integer parse does
///
/// Leading whitespace is skipped and the leading run of digits is read;
/// anything non-numeric (or negative) yields 0. Labels too large for a u32
/// saturate at `u32::MAX`.
pub fn parse_leading_int(text: &str) -> u32 {
    text.trim_start()
        .chars()
        .map_while(|c| c.to_digit(10))
        .fold(0u32, |acc, d| acc.saturating_mul(10).saturating_add(d))
}

/// Payload of an `onmouseover="return escape('...')"` tooltip
fn tooltip_payload(attr: &str) -> Option<String> {
    let start = attr.find(TOOLTIP_PREFIX)? + TOOLTIP_PREFIX.len();
    let rest = &attr[start..];
    let end = rest.find(TOOLTIP_SUFFIX)?;
    let payload = rest[..end].trim();

    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}

/// Registry id (`eid=<digits>`) of a company detail link
fn company_id_from_href(href: &str) -> Option<String> {
    let start = href.find("eid=")? + 4;
    let digits: String = href[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}
