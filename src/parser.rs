use log::debug;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::SelectorConfig;
use crate::error::ParseError;
use crate::models::{PageResult, ProductRecord};

/// Compiled form of a SelectorConfig. Compiling up front means a typo
/// in a selector fails the run before any page is fetched.
pub struct SelectorSet {
    entry: Selector,
    title: Selector,
    brand: Option<Selector>,
    next_page: Option<Selector>,
    pagination_meta: Option<Selector>,
    anchor: Selector,
    total_pages: Regex,
}

impl SelectorSet {
    pub fn compile(config: &SelectorConfig) -> Result<Self, ParseError> {
        Ok(Self {
            entry: compile(&config.entry)?,
            title: compile(&config.title)?,
            brand: config.brand.as_deref().map(compile).transpose()?,
            next_page: config.next_page.as_deref().map(compile).transpose()?,
            pagination_meta: config
                .pagination_meta
                .as_deref()
                .map(compile)
                .transpose()?,
            anchor: compile("a[href]")?,
            total_pages: Regex::new(r"of\s+(\d+)")
                .map_err(|e| ParseError::Selector(e.to_string()))?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|_| ParseError::Selector(selector.to_string()))
}

/// Extract product records and the next-page link from one listing page.
///
/// Entries without a title are skipped; a missing brand becomes an empty
/// string. No matching entries at all is not an error; the result just
/// carries an empty record list.
pub fn parse(
    html: &str,
    page_url: &str,
    selectors: &SelectorSet,
    page_number: u32,
) -> Result<PageResult, ParseError> {
    if html.trim().is_empty() {
        return Err(ParseError::Malformed);
    }

    let document = Html::parse_document(html);

    let mut records = Vec::new();
    for entry in document.select(&selectors.entry) {
        let title = text_of(entry.select(&selectors.title).next());
        if title.is_empty() {
            debug!("skipping entry without title on page {} of {}", page_number, page_url);
            continue;
        }

        let brand = selectors
            .brand
            .as_ref()
            .map(|sel| text_of(entry.select(sel).next()))
            .unwrap_or_default();

        records.push(ProductRecord {
            title,
            brand,
            source_url: page_url.to_string(),
            page_number,
        });
    }

    let next_page_url = selectors
        .next_page
        .as_ref()
        .and_then(|sel| document.select(sel).next())
        .and_then(|el| href_of(el, &selectors.anchor))
        .and_then(|href| resolve_url(page_url, &href));

    let total_pages_hint = selectors
        .pagination_meta
        .as_ref()
        .and_then(|sel| document.select(sel).next())
        .and_then(|el| parse_total_pages(&selectors.total_pages, &el.text().collect::<String>()));

    Ok(PageResult {
        records,
        next_page_url,
        total_pages_hint,
    })
}

fn text_of(element: Option<ElementRef>) -> String {
    element
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// The href of the matched element, or of the first anchor inside it
/// when the selector points at a wrapper like `li.pagination-next`.
fn href_of(element: ElementRef, anchor: &Selector) -> Option<String> {
    if let Some(href) = element.value().attr("href") {
        return Some(href.to_string());
    }
    element
        .select(anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.to_string())
}

/// Resolve a possibly-relative href against the page it appeared on
fn resolve_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|joined| joined.to_string())
}

/// Extract the total from pagination meta text like "Page 1 of 14"
fn parse_total_pages(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}
