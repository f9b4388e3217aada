use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::config::SourceSection;
use crate::models::{Listing, UNKNOWN_TITLE};

const ANCHOR_SELECTOR: &str = "a[href]";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

pub type ExtractResult<T> = Result<T, ExtractError>;

fn parse_selector(selector: &str) -> ExtractResult<Selector> {
    Selector::parse(selector).map_err(|err| ExtractError::Selector {
        selector: selector.to_string(),
        reason: err.to_string(),
    })
}

/// Static HTML extraction for catalog, listing and intermediary pages.
///
/// Selectors are parsed once from configuration. Every method takes the raw
/// document body and returns owned values, so no parsed DOM outlives the call.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    listing: Selector,
    title: Selector,
    anchors: Selector,
    content_box: Selector,
    intermediary_marker: String,
    terminal_marker: String,
}

impl LinkExtractor {
    pub fn new(source: &SourceSection) -> ExtractResult<Self> {
        Ok(Self {
            listing: parse_selector(&source.listing_selector)?,
            title: parse_selector(&source.title_selector)?,
            anchors: parse_selector(ANCHOR_SELECTOR)?,
            content_box: parse_selector(&source.content_box_selector)?,
            intermediary_marker: source.intermediary_marker.clone(),
            terminal_marker: source.terminal_marker.clone(),
        })
    }

    pub fn terminal_marker(&self) -> &str {
        &self.terminal_marker
    }

    /// Display title of a listing page, with the site's "Download " prefix removed.
    pub fn listing_title(&self, body: &str) -> String {
        let document = Html::parse_document(body);
        document
            .select(&self.title)
            .next()
            .map(|element| element_text(&element).replace("Download ", "").trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
    }

    /// Intermediary redirect URLs on a listing page, in document order.
    pub fn intermediary_links(&self, body: &str, page_url: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        let base = Url::parse(page_url).ok();
        document
            .select(&self.anchors)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| absolutize(base.as_ref(), href))
            .filter(|href| href.contains(&self.intermediary_marker))
            .collect()
    }

    /// Terminal-host URLs inside the content box of an intermediary page, in document order.
    pub fn terminal_links(&self, body: &str, page_url: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        let base = Url::parse(page_url).ok();
        document
            .select(&self.content_box)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| absolutize(base.as_ref(), href))
            .filter(|href| href.contains(&self.terminal_marker))
            .collect()
    }

    /// `(title, url)` pairs of a catalog page. Entries repeating an earlier URL are dropped.
    pub fn catalog_listings(&self, body: &str, page_url: &str) -> Vec<Listing> {
        let document = Html::parse_document(body);
        let base = Url::parse(page_url).ok();
        let mut seen = HashSet::new();
        let mut listings = Vec::new();
        for element in document.select(&self.listing) {
            let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| absolutize(base.as_ref(), href))
            else {
                continue;
            };
            let title = element_text(&element);
            if title.is_empty() || !seen.insert(url.clone()) {
                continue;
            }
            listings.push(Listing { title, url });
        }
        listings
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolutize(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(String::from),
        None => Some(href.to_string()),
    }
}
