//! Tolerant RSS 2.0 / Atom 1.0 entry extraction.
//!
//! Built on the streaming `quick_xml` reader so that a document which turns
//! malformed part-way through still yields the entries completed before the
//! error. The error is reported next to the entries instead of replacing them.
//!
//! # Field Mapping
//!
//! | Field | RSS 2.0 | Atom 1.0 |
//! |-------|---------|----------|
//! | title | `title` | `title` |
//! | link | `link` text, else permalink `guid` | `link@href` (`rel` absent or `alternate`) |
//! | author | `author`, `dc:creator` | `author/name` |
//! | published | `pubDate`, `dc:date` | `published`, else `updated` |
//! | summary | `description` | `summary` |
//! | description | `content:encoded` | `content` |
//!
//! A bare `&` that starts no reference is escaped before reading, so one
//! sloppy title does not end the document.

use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use regex::{Captures, Regex};
use std::borrow::Cow;

/// CDATA sections and comments pass through untouched; outside them an `&`
/// either starts a complete reference or is bare.
static AMPERSAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<!\[CDATA\[.*?\]\]>|<!--.*?-->|&(?:#[0-9]+;|#[xX][0-9a-fA-F]+;|[A-Za-z_][A-Za-z0-9._-]*;)?",
    )
    .expect("valid ampersand regex")
});

/// One feed entry with every field still optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// RSS `guid` that is a permalink; used when `link` is missing.
    pub guid: Option<String>,
    /// Set when the entry's text could not be decoded; such entries are skipped.
    pub error: Option<String>,
}

/// Result of reading a feed document.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// Entries completed before `limit` was reached or the document ended.
    pub entries: Vec<RawEntry>,
    /// Why the document stopped parsing early, if it did.
    pub malformed: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Author,
    Published,
    Updated,
    Summary,
    Description,
    Guid,
}

struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

/// Read up to `limit` entries from an RSS or Atom document.
pub fn parse_feed(xml: &str, limit: usize) -> ParsedFeed {
    let mut parsed = ParsedFeed::default();
    if limit == 0 {
        return parsed;
    }

    let xml = escape_bare_ampersands(xml);
    let mut reader = Reader::from_str(&xml);
    let mut path: Vec<String> = Vec::new();
    // The entry being read and the depth of its element.
    let mut entry: Option<(RawEntry, usize)> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = local_name(&start);
                path.push(name.clone());
                let depth = path.len();

                match (entry.as_mut(), capture.as_ref()) {
                    (None, _) => {
                        if is_entry(&name) {
                            entry = Some((RawEntry::default(), depth));
                        }
                    }
                    (Some((current, entry_depth)), None) => {
                        let decoder = reader.decoder();
                        let field = field_for(&name, depth - *entry_depth)
                            .filter(|field| *field != Field::Guid || is_permalink(&start, decoder));
                        if let Some(field) = field {
                            // Atom links carry the URL in an attribute.
                            if field == Field::Link {
                                if let Some(href) = alternate_href(&start, decoder) {
                                    current.link.get_or_insert(href);
                                }
                            }
                            capture = Some(Capture {
                                field,
                                depth,
                                text: String::new(),
                            });
                        }
                    }
                    (Some(_), Some(cap)) => {
                        // Atom nests the author's name; narrow the capture to it.
                        if cap.field == Field::Author && name == "name" {
                            capture = Some(Capture {
                                field: Field::Author,
                                depth,
                                text: String::new(),
                            });
                        }
                    }
                }
            }
            Ok(Event::Empty(empty)) => {
                if let (Some((current, entry_depth)), None) = (entry.as_mut(), capture.as_ref()) {
                    if path.len() == *entry_depth && local_name(&empty) == "link" {
                        if let Some(href) = alternate_href(&empty, reader.decoder()) {
                            current.link.get_or_insert(href);
                        }
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(cap) = capture.as_mut() {
                    match text.decode() {
                        Ok(decoded) => cap.text.push_str(&decoded),
                        Err(e) => mark_entry_error(&mut entry, e.to_string()),
                    }
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(cap) = capture.as_mut() {
                    match cdata.decode() {
                        Ok(decoded) => cap.text.push_str(&decoded),
                        Err(e) => mark_entry_error(&mut entry, e.to_string()),
                    }
                }
            }
            Ok(Event::GeneralRef(reference)) => {
                if let Some(cap) = capture.as_mut() {
                    match resolve_reference(&reference) {
                        Ok(resolved) => cap.text.push_str(&resolved),
                        Err(e) => mark_entry_error(&mut entry, e),
                    }
                }
            }
            Ok(Event::End(_)) => {
                let depth = path.len();
                if capture.as_ref().is_some_and(|cap| cap.depth == depth) {
                    if let (Some(cap), Some((current, _))) = (capture.take(), entry.as_mut()) {
                        assign(current, cap.field, cap.text);
                    }
                }
                if entry.as_ref().is_some_and(|(_, entry_depth)| *entry_depth == depth) {
                    if let Some((mut finished, _)) = entry.take() {
                        if finished.link.is_none() {
                            finished.link = finished.guid.take();
                        }
                        parsed.entries.push(finished);
                    }
                    if parsed.entries.len() >= limit {
                        break;
                    }
                }
                path.pop();
            }
            Ok(Event::Eof) => {
                if entry.is_some() {
                    parsed.malformed = Some("document ended inside an entry".to_string());
                }
                break;
            }
            Ok(_) => {}
            Err(e) => {
                parsed.malformed = Some(format!("{e} (at byte {})", reader.error_position()));
                break;
            }
        }
    }

    parsed
}

/// Escape every `&` that does not start a character or entity reference.
fn escape_bare_ampersands(xml: &str) -> Cow<'_, str> {
    AMPERSAND.replace_all(xml, |caps: &Captures<'_>| match &caps[0] {
        "&" => "&amp;".to_string(),
        kept => kept.to_string(),
    })
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn is_entry(name: &str) -> bool {
    name == "item" || name == "entry"
}

/// Map an element to an entry field. `level` is 1 for direct children of the
/// entry element; deeper elements are not fields.
fn field_for(name: &str, level: usize) -> Option<Field> {
    if level != 1 {
        return None;
    }
    match name {
        "title" => Some(Field::Title),
        "link" => Some(Field::Link),
        "author" | "creator" => Some(Field::Author),
        "pubDate" | "published" | "date" | "issued" => Some(Field::Published),
        "updated" | "modified" => Some(Field::Updated),
        "summary" | "description" => Some(Field::Summary),
        "encoded" | "content" => Some(Field::Description),
        "guid" => Some(Field::Guid),
        _ => None,
    }
}

fn assign(entry: &mut RawEntry, field: Field, text: String) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    let slot = match field {
        Field::Title => &mut entry.title,
        Field::Link => &mut entry.link,
        Field::Author => &mut entry.author,
        Field::Published => &mut entry.published,
        Field::Updated => &mut entry.updated,
        Field::Summary => &mut entry.summary,
        Field::Description => &mut entry.description,
        Field::Guid => &mut entry.guid,
    };
    slot.get_or_insert_with(|| text.to_string());
}

/// Unescaped attribute value. Values with references XML cannot resolve are
/// returned raw.
fn attribute(start: &BytesStart<'_>, name: &str, decoder: Decoder) -> Option<String> {
    let attr = start.try_get_attribute(name).ok().flatten()?;
    Some(match attr.decode_and_unescape_value(decoder) {
        Ok(value) => value.into_owned(),
        Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
    })
}

fn alternate_href(start: &BytesStart<'_>, decoder: Decoder) -> Option<String> {
    let rel = attribute(start, "rel", decoder);
    if rel.as_deref().is_some_and(|rel| rel.trim() != "alternate") {
        return None;
    }
    let href = attribute(start, "href", decoder)?;
    let href = href.trim();
    (!href.is_empty()).then(|| href.to_string())
}

/// `guid` is a permalink unless `isPermaLink="false"`.
fn is_permalink(start: &BytesStart<'_>, decoder: Decoder) -> bool {
    attribute(start, "isPermaLink", decoder)
        .is_none_or(|value| !value.trim().eq_ignore_ascii_case("false"))
}

/// Resolve `&name;` / `&#NN;` inside entry text.
///
/// XML's predefined entities and character references are decoded here.
/// Unknown named entities (HTML's `&nbsp;` and friends) are kept verbatim so
/// that markup stripping can decode them later.
fn resolve_reference(reference: &BytesRef<'_>) -> Result<Cow<'static, str>, String> {
    if let Some(ch) = reference.resolve_char_ref().map_err(|e| e.to_string())? {
        return Ok(Cow::Owned(ch.to_string()));
    }
    let name = reference.decode().map_err(|e| e.to_string())?;
    Ok(match resolve_predefined_entity(&name) {
        Some(resolved) => Cow::Borrowed(resolved),
        None => Cow::Owned(format!("&{name};")),
    })
}

fn mark_entry_error(entry: &mut Option<(RawEntry, usize)>, error: String) {
    if let Some((current, _)) = entry {
        current.error.get_or_insert(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = include_str!("../../tests/fixtures/feed_rss.xml");
    const ATOM: &str = include_str!("../../tests/fixtures/feed_atom.xml");
    const TRUNCATED: &str = include_str!("../../tests/fixtures/feed_truncated.xml");
    const BARE_AMP: &str = include_str!("../../tests/fixtures/feed_bare_amp.xml");

    #[test]
    fn test_rss_items_are_extracted() {
        let parsed = parse_feed(RSS, 10);
        assert!(parsed.malformed.is_none());
        assert_eq!(parsed.entries.len(), 4);

        let first = &parsed.entries[0];
        assert_eq!(first.title.as_deref(), Some("Chips & Dips: a <review>"));
        assert_eq!(first.link.as_deref(), Some("https://example.com/chips"));
        assert_eq!(first.author.as_deref(), Some("Jane Doe"));
        assert_eq!(first.published.as_deref(), Some("Tue, 06 May 2025 08:30:00 +0000"));
        assert_eq!(
            first.summary.as_deref(),
            Some("<p>Silicon <b>news</b>&nbsp;today.</p>")
        );
        assert_eq!(first.description.as_deref(), Some("<p>Full body</p>"));

        let second = &parsed.entries[1];
        assert_eq!(second.title, None);
        assert_eq!(second.link, None);
        assert_eq!(second.published.as_deref(), Some("sometime last week"));
    }

    #[test]
    fn test_atom_entries_are_extracted() {
        let parsed = parse_feed(ATOM, 10);
        assert!(parsed.malformed.is_none());
        assert_eq!(parsed.entries.len(), 2);

        let first = &parsed.entries[0];
        assert_eq!(first.title.as_deref(), Some("Atom one"));
        assert_eq!(first.link.as_deref(), Some("https://atom.example/one"));
        assert_eq!(first.author.as_deref(), Some("Ada"));
        assert_eq!(first.published.as_deref(), Some("2025-05-06T08:30:00Z"));
        assert_eq!(first.summary.as_deref(), Some("Short & sweet"));

        let second = &parsed.entries[1];
        assert_eq!(second.published, None);
        assert_eq!(second.updated.as_deref(), Some("2025-05-05T10:00:00+02:00"));
        assert_eq!(second.author, None);
        assert_eq!(second.description.as_deref(), Some("<div>Body</div>"));
    }

    #[test]
    fn test_limit_stops_reading() {
        assert_eq!(parse_feed(RSS, 2).entries.len(), 2);
        assert!(parse_feed(RSS, 0).entries.is_empty());
    }

    #[test]
    fn test_malformed_document_keeps_completed_entries() {
        let parsed = parse_feed(TRUNCATED, 10);
        assert!(parsed.malformed.is_some());
        let titles: Vec<_> = parsed
            .entries
            .iter()
            .map(|e| e.title.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(titles, vec!["Kept one", "Kept two"]);
    }

    #[test]
    fn test_non_xml_input_is_malformed_without_entries() {
        let parsed = parse_feed("<html><body><p>oops</div></body></html>", 10);
        assert!(parsed.entries.is_empty());
        assert!(parsed.malformed.is_some());
    }

    #[test]
    fn test_bare_ampersand_does_not_end_the_document() {
        let parsed = parse_feed(BARE_AMP, 10);
        assert!(parsed.malformed.is_none());
        let titles: Vec<_> = parsed
            .entries
            .iter()
            .map(|e| e.title.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(titles, vec!["One", "AT&T news", "Third"]);

        let second = &parsed.entries[1];
        assert_eq!(second.link.as_deref(), Some("https://wire.example/2?a=1&b=2"));
        assert_eq!(
            second.summary.as_deref(),
            Some("Q&A with the <b>CEO</b> &amp; board")
        );
    }

    #[test]
    fn test_escape_bare_ampersands_keeps_references_and_cdata() {
        let xml = "<t>a & b &amp; &#38; &#x26; &nbsp;<![CDATA[x & y]]><!-- c & d --></t>";
        assert_eq!(
            escape_bare_ampersands(xml),
            "<t>a &amp; b &amp; &#38; &#x26; &nbsp;<![CDATA[x & y]]><!-- c & d --></t>"
        );
        assert!(matches!(escape_bare_ampersands("<t>clean</t>"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_permalink_guid_stands_in_for_missing_link() {
        let xml = r#"<rss><channel>
            <item><title>a</title><guid isPermaLink="true">https://g.example/a</guid></item>
            <item><title>b</title><guid>https://g.example/b</guid></item>
            <item><title>c</title><guid isPermaLink="false">tag:g.example,2025:c</guid></item>
            <item><title>d</title><link>https://g.example/d</link><guid>https://g.example/other</guid></item>
        </channel></rss>"#;

        let links: Vec<_> = parse_feed(xml, 10)
            .entries
            .into_iter()
            .map(|e| e.link)
            .collect();

        assert_eq!(
            links,
            vec![
                Some("https://g.example/a".to_string()),
                Some("https://g.example/b".to_string()),
                None,
                Some("https://g.example/d".to_string()),
            ]
        );
    }

    #[test]
    fn test_atom_href_is_attribute_unescaped() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
            <title>q</title>
            <link rel="self" href="https://a.example/self"/>
            <link href="https://a.example/q?x=1&amp;y=&#50;&amp;amp;"/>
        </entry></feed>"#;

        let parsed = parse_feed(xml, 10);

        assert_eq!(
            parsed.entries[0].link.as_deref(),
            Some("https://a.example/q?x=1&y=2&amp;")
        );
    }
}
