// src/services/feeds.rs

//! RSS and Atom feed fetcher.
//!
//! Handles RSS 2.0 `<item>`, RSS 1.0 (RDF) `<item>` and Atom `<entry>`
//! elements. Parsing is lenient about mismatched end tags because many feeds
//! embed unescaped HTML in their descriptions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{DateCandidates, RawAuthor, RawDate, RawItem, SourceDescriptor};
use crate::services::{FetchWindow, SourceFetcher};
use crate::utils::{http, resolve};

/// Fetches feed documents over HTTP.
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceFetcher for FeedFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        _window: &FetchWindow,
    ) -> Result<Vec<RawItem>> {
        let body = http::fetch_text(&self.client, &source.address).await?;
        parse_feed(&body, &source.address)
    }
}

/// Parse an RSS or Atom document into raw items.
///
/// Relative links are resolved against `feed_url`. A document whose root is
/// not `rss`, `RDF` or `feed` is an error.
pub fn parse_feed(xml: &str, feed_url: &str) -> Result<Vec<RawItem>> {
    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut root: Option<String> = None;
    let mut items = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = qualified_name(&e);
                if root.is_none() {
                    root = Some(local_name(&name).to_string());
                }
                let local = local_name(&name);
                if current.is_none() && (local == "item" || local == "entry") {
                    current = Some(ItemBuilder::default());
                    path.clear();
                    continue;
                }
                if let Some(item) = current.as_mut() {
                    if path.is_empty() && field_name(&name) == "link" {
                        item.link_attributes(&e);
                    }
                    path.push(name);
                }
            }
            Event::Empty(e) => {
                let name = qualified_name(&e);
                if root.is_none() {
                    root = Some(local_name(&name).to_string());
                }
                if let Some(item) = current.as_mut() {
                    if path.is_empty() && field_name(&name) == "link" {
                        item.link_attributes(&e);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(item) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    item.push_text(&path, &text);
                }
            }
            Event::CData(c) => {
                if let Some(item) = current.as_mut() {
                    item.push_text(&path, &String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                let Some(item) = current.as_mut() else {
                    continue;
                };
                // Unclosed HTML tags (`<br>`) leave stale entries; unwind to
                // the matching open element.
                let closes_item = match path.iter().rposition(|open| *open == name) {
                    Some(position) => {
                        unwind(item, &mut path, position);
                        false
                    }
                    None => matches!(local_name(&name), "item" | "entry"),
                };
                if closes_item {
                    unwind(item, &mut path, 0);
                    if let Some(item) = current.take() {
                        items.push(item.build(feed_url));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match root.as_deref() {
        Some("rss") | Some("rdf") | Some("feed") => Ok(items),
        other => Err(AppError::crawl(
            feed_url,
            format!("not an RSS or Atom document (root: {:?})", other),
        )),
    }
}

/// Pop open elements down to `depth`, closing each.
fn unwind(item: &mut ItemBuilder, path: &mut Vec<String>, depth: usize) {
    while path.len() > depth {
        if let Some(closed) = path.pop() {
            item.close(&closed, path.is_empty());
        }
    }
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_lowercase()
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Extension vocabularies whose elements keep their prefix.
const EXTENSION_PREFIXES: &[&str] = &["content", "dc", "itunes", "media", "slash", "wfw"];

/// Name used to pick an item field: `atom:title` reads as `title`, while
/// `dc:creator` and `media:title` stay qualified.
fn field_name(name: &str) -> &str {
    match name.split_once(':') {
        Some((prefix, local)) if !EXTENSION_PREFIXES.contains(&prefix) => local,
        _ => name,
    }
}

/// Accumulates the fields of one item while it is being read.
#[derive(Debug, Default)]
struct ItemBuilder {
    title: String,
    link_text: String,
    alternate_link: Option<String>,
    other_link: Option<String>,
    description: String,
    content: String,
    author: String,
    authors: Vec<String>,
    published: String,
    updated: String,
    guid: String,
}

impl ItemBuilder {
    /// Record an Atom-style `<link href=".." rel=".."/>`.
    fn link_attributes(&mut self, e: &BytesStart<'_>) {
        let mut href = None;
        let mut rel = None;
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).trim().to_string();
            match attr.key.as_ref() {
                b"href" => href = Some(value),
                b"rel" => rel = Some(value),
                _ => {}
            }
        }

        let Some(href) = href.filter(|h| !h.is_empty()) else {
            return;
        };
        let is_alternate = rel.as_deref().is_none_or(|r| r == "alternate");
        if is_alternate && self.alternate_link.is_none() {
            self.alternate_link = Some(href);
        } else if self.other_link.is_none() {
            self.other_link = Some(href);
        }
    }

    /// Append text to the field selected by the item-relative element path.
    fn push_text(&mut self, path: &[String], text: &str) {
        let Some(top) = path.first() else {
            return;
        };
        let buffer = match field_name(top) {
            "title" => &mut self.title,
            "link" => &mut self.link_text,
            "description" | "summary" => &mut self.description,
            "content" | "content:encoded" => &mut self.content,
            "author" | "dc:creator" => {
                // Atom nests the name; skip email and uri children.
                if path.len() > 1 && local_name(&path[path.len() - 1]) != "name" {
                    return;
                }
                &mut self.author
            }
            "pubdate" | "published" | "dc:date" | "issued" => &mut self.published,
            "updated" | "modified" | "dc:modified" => &mut self.updated,
            "guid" | "id" => &mut self.guid,
            _ => return,
        };
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(text);
    }

    /// Called when an element inside the item closes.
    fn close(&mut self, name: &str, at_item_level: bool) {
        if at_item_level && matches!(field_name(name), "author" | "dc:creator") {
            let author = std::mem::take(&mut self.author);
            let author = author.trim();
            if !author.is_empty() {
                self.authors.push(author.to_string());
            }
        }
    }

    fn build(self, feed_url: &str) -> RawItem {
        let link = self
            .alternate_link
            .or_else(|| non_empty(self.link_text))
            .or(self.other_link)
            .map(|href| resolve(feed_url, &href));

        let mut extra = BTreeMap::new();
        if let Some(guid) = non_empty(self.guid) {
            extra.insert("guid".to_string(), guid);
        }

        RawItem {
            title: non_empty(self.title),
            link,
            identifier: None,
            description: non_empty(self.description).or_else(|| non_empty(self.content)),
            authors: self.authors.into_iter().map(RawAuthor::Plain).collect(),
            dates: DateCandidates {
                published: non_empty(self.published).map(RawDate::Text),
                updated: non_empty(self.updated).map(RawDate::Text),
                ..DateCandidates::default()
            },
            extra,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Example News</title>
    <link>https://news.example/</link>
    <item>
      <title>First &amp; foremost</title>
      <link>https://news.example/first</link>
      <description>&lt;p&gt;Hello &lt;b&gt;world&lt;/b&gt;&lt;/p&gt;</description>
      <dc:creator><![CDATA[Jane Doe]]></dc:creator>
      <pubDate>Tue, 05 Mar 2024 10:20:30 GMT</pubDate>
      <guid isPermaLink="false">abc-1</guid>
    </item>
    <item>
      <title>Second</title>
      <link>/second</link>
      <content:encoded><![CDATA[<p>Full body</p>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <entry>
    <title type="html">Atom entry</title>
    <link rel="self" href="https://atom.example/self/1"/>
    <link rel="alternate" type="text/html" href="https://atom.example/entry/1"/>
    <id>urn:uuid:1</id>
    <updated>2024-03-06T12:00:00Z</updated>
    <published>2024-03-05T12:00:00Z</published>
    <summary>Short summary</summary>
    <author><name>John Roe</name><email>john@example.com</email></author>
    <author><name>Ann Poe</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let items = parse_feed(RSS, "https://news.example/feed.xml").unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title.as_deref(), Some("First & foremost"));
        assert_eq!(first.link.as_deref(), Some("https://news.example/first"));
        assert_eq!(first.description.as_deref(), Some("<p>Hello <b>world</b></p>"));
        assert_eq!(first.authors, vec![RawAuthor::Plain("Jane Doe".into())]);
        assert_eq!(
            first.dates.published,
            Some(RawDate::Text("Tue, 05 Mar 2024 10:20:30 GMT".into()))
        );
        assert_eq!(first.extra.get("guid").map(String::as_str), Some("abc-1"));
    }

    #[test]
    fn test_rss_relative_link_and_content_fallback() {
        let items = parse_feed(RSS, "https://news.example/feed.xml").unwrap();
        let second = &items[1];
        assert_eq!(second.link.as_deref(), Some("https://news.example/second"));
        assert_eq!(second.description.as_deref(), Some("<p>Full body</p>"));
        assert!(second.dates.published.is_none());
    }

    #[test]
    fn test_parse_atom_entry() {
        let items = parse_feed(ATOM, "https://atom.example/feed").unwrap();
        assert_eq!(items.len(), 1);

        let entry = &items[0];
        assert_eq!(entry.title.as_deref(), Some("Atom entry"));
        assert_eq!(entry.link.as_deref(), Some("https://atom.example/entry/1"));
        assert_eq!(entry.description.as_deref(), Some("Short summary"));
        assert_eq!(
            entry.authors,
            vec![
                RawAuthor::Plain("John Roe".into()),
                RawAuthor::Plain("Ann Poe".into())
            ]
        );
        assert_eq!(
            entry.dates.published,
            Some(RawDate::Text("2024-03-05T12:00:00Z".into()))
        );
        assert_eq!(
            entry.dates.updated,
            Some(RawDate::Text("2024-03-06T12:00:00Z".into()))
        );
        assert_eq!(entry.extra.get("guid").map(String::as_str), Some("urn:uuid:1"));
    }

    #[test]
    fn test_prefixed_atom_entry() {
        let xml = r#"<atom:feed xmlns:atom="http://www.w3.org/2005/Atom">
  <atom:entry>
    <atom:title>Hello</atom:title>
    <atom:link href="https://x.example/1"/>
    <atom:summary>Prefixed summary</atom:summary>
    <atom:author><atom:name>Ida Lee</atom:name></atom:author>
    <atom:published>2024-03-05T12:00:00Z</atom:published>
  </atom:entry>
</atom:feed>"#;
        let items = parse_feed(xml, "https://x.example/feed").unwrap();
        assert_eq!(items.len(), 1);

        let entry = &items[0];
        assert_eq!(entry.title.as_deref(), Some("Hello"));
        assert_eq!(entry.link.as_deref(), Some("https://x.example/1"));
        assert_eq!(entry.description.as_deref(), Some("Prefixed summary"));
        assert_eq!(entry.authors, vec![RawAuthor::Plain("Ida Lee".to_string())]);
        assert!(entry.dates.published.is_some());
    }

    #[test]
    fn test_media_title_does_not_join_item_title() {
        let xml = r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel><item>
  <title>Story</title>
  <link>https://m.example/1</link>
  <media:title>Photo caption</media:title>
</item></channel></rss>"#;
        let items = parse_feed(xml, "https://m.example/rss").unwrap();
        assert_eq!(items[0].title.as_deref(), Some("Story"));
    }

    #[test]
    fn test_unescaped_html_in_description() {
        let xml = r#"<rss><channel><item><title>T</title><link>https://x.example/1</link>
            <description>Intro <p>para<br> one</p> end</description></item></channel></rss>"#;
        let items = parse_feed(xml, "https://x.example/rss").unwrap();
        assert_eq!(items.len(), 1);
        let description = items[0].description.as_deref().unwrap();
        assert!(description.starts_with("Intro"));
        assert!(description.contains("para"));
    }

    #[test]
    fn test_rejects_non_feed_document() {
        let html = "<html><body><p>Service unavailable</p></body></html>";
        assert!(parse_feed(html, "https://x.example/rss").is_err());
    }

    #[test]
    fn test_empty_channel_is_ok() {
        let xml = "<rss><channel><title>Quiet</title></channel></rss>";
        assert!(parse_feed(xml, "https://x.example/rss").unwrap().is_empty());
    }
}
