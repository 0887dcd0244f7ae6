//! Re-serializes a ranked post stream as one Atom document.

use std::io::Cursor;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::model::{FeedInfo, Post};
use crate::util::xml_safe_text;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
/// Feed id used when neither an override nor any post is available.
pub const FALLBACK_FEED_ID: &str = "urn:uuid:unknown-feed";
pub const DEFAULT_FEED_TITLE: &str = "Combined Feed";

/// Feed-level overrides for the synthesized document.
#[derive(Debug, Clone, Default)]
pub struct AtomOptions {
    /// Defaults to [`DEFAULT_FEED_TITLE`].
    pub title: Option<String>,
    /// Defaults to the first post's feed URL, then [`FALLBACK_FEED_ID`].
    pub id: Option<String>,
}

/// Renders `posts`, in the order given, as an Atom feed.
///
/// Every entry carries an `<atom:source>` block describing the feed it came
/// from. Posts without a date get the current time as `<updated>` and no
/// `<published>`; Atom requires the former.
pub fn atom_feed_of_posts<'a, I>(posts: I, opts: &AtomOptions) -> Result<String>
where
    I: IntoIterator<Item = &'a Post>,
{
    render(posts.into_iter().collect(), opts, Utc::now())
}

fn render(posts: Vec<&Post>, opts: &AtomOptions, now: DateTime<Utc>) -> Result<String> {
    let updated = posts.iter().filter_map(|p| p.date).max().unwrap_or(now);
    let id = opts
        .id
        .clone()
        .or_else(|| posts.first().map(|p| p.feed_url().to_string()))
        .unwrap_or_else(|| FALLBACK_FEED_ID.to_string());
    let title = opts.title.as_deref().unwrap_or(DEFAULT_FEED_TITLE);

    let mut w = AtomWriter::new();
    w.decl()?;

    let mut feed = BytesStart::new("feed");
    feed.push_attribute(("xmlns", ATOM_NS));
    w.start(feed)?;
    w.text_element("id", &id)?;
    w.text_element("title", title)?;
    w.text_element("updated", &timestamp(updated))?;

    for post in &posts {
        write_entry(&mut w, post, now)?;
    }

    w.end("feed")?;
    w.finish()
}

fn write_entry(w: &mut AtomWriter, post: &Post, now: DateTime<Utc>) -> Result<()> {
    w.start(BytesStart::new("entry"))?;

    let id = post.guid.as_deref().unwrap_or(&post.url);
    w.text_element("id", id)?;
    w.text_element("title", &post.title)?;
    w.text_element("updated", &timestamp(post.date.unwrap_or(now)))?;
    if !post.url.is_empty() {
        w.link(&post.url)?;
    }
    if let Some(date) = post.date {
        w.text_element("published", &timestamp(date))?;
    }
    if let Some(creator) = &post.creator {
        w.start(BytesStart::new("author"))?;
        w.text_element("name", creator)?;
        w.end("author")?;
    }
    if let Some(content) = &post.content {
        let mut el = BytesStart::new("content");
        el.push_attribute(("type", "html"));
        w.start(el)?;
        w.cdata(content)?;
        w.end("content")?;
    }

    write_source(w, post.feed(), post.date.unwrap_or(now))?;

    w.end("entry")
}

/// `<source>` block preserving the originating feed.
fn write_source(w: &mut AtomWriter, feed: &FeedInfo, fallback: DateTime<Utc>) -> Result<()> {
    w.start(BytesStart::new("source"))?;
    w.text_element("id", &feed.url)?;
    w.text_element("title", &feed.title)?;
    w.text_element(
        "updated",
        &timestamp(feed.last_build_date.unwrap_or(fallback)),
    )?;
    if let Some(link) = &feed.site_link {
        w.link(link)?;
    }
    if let Some(description) = &feed.description {
        w.text_element("subtitle", description)?;
    }
    w.end("source")
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn has_markup(s: &str) -> bool {
    s.contains(['<', '>', '&'])
}

/// Thin wrapper over an indenting quick-xml writer.
struct AtomWriter {
    inner: Writer<Cursor<Vec<u8>>>,
}

impl AtomWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    fn decl(&mut self) -> Result<()> {
        self.inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .context("Failed to write XML declaration")
    }

    fn start(&mut self, el: BytesStart<'_>) -> Result<()> {
        let name = String::from_utf8_lossy(el.name().as_ref()).into_owned();
        self.inner
            .write_event(Event::Start(el))
            .with_context(|| format!("Failed to write <{name}>"))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .with_context(|| format!("Failed to write </{name}>"))
    }

    /// `<name>text</name>`. Text with markup characters goes into CDATA so
    /// it survives literally.
    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        let text = xml_safe_text(text);
        self.start(BytesStart::new(name))?;
        if has_markup(&text) {
            self.cdata(&text)?;
        } else if !text.is_empty() {
            self.inner
                .write_event(Event::Text(BytesText::new(&text)))
                .with_context(|| format!("Failed to write <{name}> text"))?;
        }
        self.end(name)
    }

    fn link(&mut self, href: &str) -> Result<()> {
        let mut el = BytesStart::new("link");
        el.push_attribute(("href", href));
        self.inner
            .write_event(Event::Empty(el))
            .context("Failed to write <link>")
    }

    /// Writes `text` as CDATA, splitting on `]]>` so the section cannot be
    /// closed early.
    fn cdata(&mut self, text: &str) -> Result<()> {
        let escaped = xml_safe_text(text).replace("]]>", "]]]]><![CDATA[>");
        self.inner
            .write_event(Event::CData(BytesCData::new(escaped)))
            .context("Failed to write CDATA")
    }

    fn finish(self) -> Result<String> {
        let mut bytes = self.inner.into_inner().into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).context("Generated Atom contains invalid UTF-8")
    }
}
