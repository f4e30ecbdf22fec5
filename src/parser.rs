//! Turns one feed document into [`Article`]s.
//!
//! Journals disagree on where they put dates and abstracts, so every article
//! field is read through an ordered chain of [`Extractor`]s and the first one
//! that yields non-empty text wins. Adding a new fallback source means adding
//! an entry to a chain.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use crate::dates::normalize_date;
use crate::error::ParseError;
use crate::model::Article;
use crate::sanitize::clean_summary;

/// Root elements of the feed formats we accept.
const FEED_ROOTS: &[&str] = &["rss", "feed", "RDF"];

/// Elements that hold one article.
const ITEM_ELEMENTS: &[&str] = &["item", "entry"];

/// One way of pulling a field out of an item.
#[derive(Debug, Clone, Copy)]
pub enum Extractor {
    /// Text of the first child element with this qualified name.
    Element(&'static str),
    /// `href` attribute of an Atom `<link>`.
    LinkHref,
}

pub const TITLE_CHAIN: &[Extractor] = &[Extractor::Element("title")];

pub const LINK_CHAIN: &[Extractor] = &[Extractor::Element("link"), Extractor::LinkHref];

pub const DATE_CHAIN: &[Extractor] = &[
    Extractor::Element("pubDate"),
    Extractor::Element("dc:date"),
    Extractor::Element("date"),
    Extractor::Element("updated"),
];

pub const SUMMARY_CHAIN: &[Extractor] = &[
    Extractor::Element("description"),
    Extractor::Element("content"),
    Extractor::Element("content:encoded"),
    Extractor::Element("summary"),
];

/// The text content of one `<item>` or `<entry>`, before normalization.
#[derive(Debug, Default, Clone)]
pub struct RawItem {
    /// Direct children as (qualified name, text content), in document order.
    fields: Vec<(String, String)>,
    link_href: Option<String>,
}

impl RawItem {
    fn element(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, text)| text.as_str())
            .find(|text| !text.is_empty())
    }

    pub fn extract(&self, extractor: Extractor) -> Option<&str> {
        match extractor {
            Extractor::Element(name) => self.element(name),
            Extractor::LinkHref => self.link_href.as_deref().filter(|href| !href.is_empty()),
        }
    }

    /// First non-empty value along `chain`.
    pub fn first_match(&self, chain: &[Extractor]) -> Option<&str> {
        chain.iter().find_map(|extractor| self.extract(*extractor))
    }
}

/// Parse a feed document into normalized articles attributed to `journal`.
pub fn parse_feed(xml: &[u8], journal: &str) -> Result<Vec<Article>, ParseError> {
    let items = read_items(xml)?;
    debug!("Parsed {} items for '{}'", items.len(), journal);
    Ok(items
        .iter()
        .map(|item| build_article(item, journal))
        .collect())
}

/// Normalize one raw item.
pub fn build_article(item: &RawItem, journal: &str) -> Article {
    let title = item.first_match(TITLE_CHAIN).unwrap_or_default().to_string();
    let link = item.first_match(LINK_CHAIN).unwrap_or_default().to_string();
    let published_date = normalize_date(item.first_match(DATE_CHAIN));
    let summary = clean_summary(item.first_match(SUMMARY_CHAIN).unwrap_or_default());

    let id = if link.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        link.clone()
    };

    Article {
        id,
        journal: journal.to_string(),
        title,
        link,
        published_date,
        summary,
        matched_keywords: Vec::new(),
    }
}

/// Collect every item in the document.
///
/// Text inside an item's child is gathered from all of its descendants, so
/// inline XHTML in Atom content still yields its text.
pub fn read_items(xml: &[u8]) -> Result<Vec<RawItem>, ParseError> {
    let mut reader = Reader::from_reader(xml);

    let mut items = Vec::new();
    let mut buf = Vec::new();

    let mut root: Option<String> = None;
    let mut current_item: Option<RawItem> = None;
    // Open elements below the current item, with the text gathered so far
    let mut open: Vec<(String, String)> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let local = local_name(&e);
                if root.is_none() {
                    root = Some(local.clone());
                }

                if let Some(item) = current_item.as_mut() {
                    if open.is_empty() && local == "link" {
                        capture_href(item, &e);
                    }
                    open.push((qualified_name(&e), String::new()));
                } else if ITEM_ELEMENTS.contains(&local.as_str()) {
                    current_item = Some(RawItem::default());
                }
            }
            Ok(Event::Empty(e)) => {
                if root.is_none() {
                    root = Some(local_name(&e));
                }
                if let Some(item) = current_item.as_mut() {
                    if open.is_empty() && local_name(&e) == "link" {
                        capture_href(item, &e);
                    }
                }
            }
            Ok(Event::End(_)) => {
                if let Some(mut item) = current_item.take() {
                    match open.pop() {
                        Some((name, text)) => {
                            if open.is_empty() {
                                item.fields.push((name, text.trim().to_string()));
                            }
                            current_item = Some(item);
                        }
                        // The item element itself closed
                        None => items.push(item),
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if !open.is_empty() {
                    let text = e
                        .unescape()
                        .map(|text| text.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    append_text(&mut open, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if !open.is_empty() {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    append_text(&mut open, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    match root {
        Some(root) if FEED_ROOTS.contains(&root.as_str()) => Ok(items),
        _ => Err(ParseError::NotAFeed),
    }
}

fn append_text(open: &mut [(String, String)], text: &str) {
    for (_, content) in open.iter_mut() {
        content.push_str(text);
    }
}

fn capture_href(item: &mut RawItem, e: &BytesStart<'_>) {
    if item.link_href.is_some() {
        return;
    }
    let mut href = None;
    let mut alternate = true;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"href" => href = attr.unescape_value().ok().map(|v| v.into_owned()),
            b"rel" => alternate = attr.value.as_ref() == b"alternate",
            _ => {}
        }
    }
    if alternate {
        item.link_href = href;
    }
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}
