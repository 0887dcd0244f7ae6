use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use thiserror::Error;

use crate::util::{non_empty, validate_url};

/// Maximum allowed nesting depth for OPML outline elements.
const MAX_OPML_DEPTH: usize = 50;

/// Errors that can occur during OPML parsing.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// Outline nesting deeper than [`MAX_OPML_DEPTH`].
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("Malformed attribute value: {0}")]
    Attribute(String),
}

/// A feed subscription taken from one `<outline>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSource {
    /// `title` attribute, else `text`, else the feed URL.
    pub title: String,
    /// The `xmlUrl` attribute. Public http(s) only.
    pub feed_url: String,
    /// The `htmlUrl` attribute, dropped when it fails validation.
    pub site_url: Option<String>,
    /// Raw `text` attribute.
    pub text: Option<String>,
}

/// A parsed subscription list: `<head>` metadata plus the feeds in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionList {
    pub title: Option<String>,
    pub date_created: Option<String>,
    pub owner_email: Option<String>,
    pub feeds: Vec<FeedSource>,
}

/// Reads and parses an OPML file.
pub async fn read_opml(path: &std::path::Path) -> Result<SubscriptionList> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read OPML file: {}", path.display()))?;
    let list = parse_opml(&content)
        .with_context(|| format!("Failed to parse OPML file: {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        feeds = list.feeds.len(),
        "Read subscription list"
    );
    Ok(list)
}

/// Parses OPML text into a [`SubscriptionList`].
///
/// Outlines are collected at any depth; folder outlines are walked but not
/// returned. An outline is kept when it has an `xmlUrl`, its `type` is
/// missing, `rss` or `atom`, and the URL passes [`validate_url`]. Rejected
/// URLs are logged and skipped, never fatal.
///
/// # Errors
///
/// - [`OpmlError::MaxDepthExceeded`] for outlines nested deeper than 50 levels
/// - [`OpmlError::XmlParse`] for malformed XML
/// - [`OpmlError::Attribute`] for attribute values that cannot be unescaped
///
/// quick-xml (0.37) does not expand `<!ENTITY>` declarations. Custom
/// entity references fail with an unrecognized-entity error instead.
pub fn parse_opml(content: &str) -> Result<SubscriptionList, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut list = SubscriptionList::default();
    let mut depth: usize = 0;
    let mut in_head = false;
    let mut head_field: Option<HeadField> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"outline" => {
                    depth += 1;
                    if depth > MAX_OPML_DEPTH {
                        return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                    }
                    if let Some(feed) = parse_outline(&e, &reader)? {
                        list.feeds.push(feed);
                    }
                }
                b"head" => in_head = true,
                name if in_head => head_field = HeadField::from_tag(name),
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"outline" => {
                if let Some(feed) = parse_outline(&e, &reader)? {
                    list.feeds.push(feed);
                }
            }
            Event::Text(t) => {
                if let Some(field) = head_field {
                    let text = t.unescape().map_err(|e| OpmlError::XmlParse(e.into()))?;
                    field.store(&mut list, &text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"outline" => depth = depth.saturating_sub(1),
                b"head" => in_head = false,
                _ => head_field = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(list)
}

#[derive(Debug, Clone, Copy)]
enum HeadField {
    Title,
    DateCreated,
    OwnerEmail,
}

impl HeadField {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"dateCreated" => Some(Self::DateCreated),
            b"ownerEmail" => Some(Self::OwnerEmail),
            _ => None,
        }
    }

    fn store(self, list: &mut SubscriptionList, text: &str) {
        let slot = match self {
            Self::Title => &mut list.title,
            Self::DateCreated => &mut list.date_created,
            Self::OwnerEmail => &mut list.owner_email,
        };
        *slot = non_empty(text);
    }
}

/// Extracts a [`FeedSource`] from an outline element.
///
/// Returns `None` for folders, non-feed outlines and rejected URLs.
fn parse_outline(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<FeedSource>, OpmlError> {
    let mut xml_url = None;
    let mut html_url = None;
    let mut title = None;
    let mut text = None;
    let mut kind = None;

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| OpmlError::Attribute(e.to_string()))?;
        match attr.key.as_ref() {
            b"xmlUrl" => xml_url = non_empty(&value),
            b"htmlUrl" => html_url = non_empty(&value),
            b"title" => title = non_empty(&value),
            b"text" => text = non_empty(&value),
            b"type" => kind = Some(value.to_ascii_lowercase()),
            _ => {}
        }
    }

    let Some(url) = xml_url else {
        return Ok(None);
    };

    if let Some(kind) = kind.as_deref() {
        if kind != "rss" && kind != "atom" {
            tracing::debug!(url = %url, kind = %kind, "Skipping non-feed outline");
            return Ok(None);
        }
    }

    if let Err(e) = validate_url(&url) {
        tracing::warn!(url = %url, error = %e, "Skipping invalid feed URL");
        return Ok(None);
    }

    let site_url = html_url.filter(|site| match validate_url(site) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(url = %site, error = %e, "Ignoring invalid htmlUrl in OPML");
            false
        }
    });

    Ok(Some(FeedSource {
        title: title
            .or_else(|| text.clone())
            .unwrap_or_else(|| url.clone()),
        feed_url: url,
        site_url,
        text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_head_and_feeds() {
        let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="1.0">
  <head>
    <title>My Subscriptions</title>
    <dateCreated>Mon, 01 Jan 2024 12:00:00 +0000</dateCreated>
    <ownerEmail>me@example.com</ownerEmail>
  </head>
  <body>
    <outline text="xkcd.com" title="xkcd.com" type="rss" xmlUrl="https://xkcd.com/rss.xml" htmlUrl="https://xkcd.com/"/>
    <outline text="Julia Evans" title="Julia Evans" type="rss" xmlUrl="https://jvns.ca/atom.xml" htmlUrl="http://jvns.ca"/>
  </body>
</opml>"#;

        let list = parse_opml(content).expect("Failed to parse OPML");
        assert_eq!(list.title.as_deref(), Some("My Subscriptions"));
        assert_eq!(
            list.date_created.as_deref(),
            Some("Mon, 01 Jan 2024 12:00:00 +0000")
        );
        assert_eq!(list.owner_email.as_deref(), Some("me@example.com"));
        assert_eq!(
            list.feeds,
            vec![
                FeedSource {
                    title: "xkcd.com".into(),
                    feed_url: "https://xkcd.com/rss.xml".into(),
                    site_url: Some("https://xkcd.com/".into()),
                    text: Some("xkcd.com".into()),
                },
                FeedSource {
                    title: "Julia Evans".into(),
                    feed_url: "https://jvns.ca/atom.xml".into(),
                    site_url: Some("http://jvns.ca".into()),
                    text: Some("Julia Evans".into()),
                },
            ]
        );
    }

    #[test]
    fn test_nested_outlines_and_folders() {
        let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="1.0">
  <head><title>Mixed OPML</title></head>
  <body>
    <outline text="RSS Feed" title="RSS Feed" type="rss" xmlUrl="https://example.com/rss.xml"/>
    <outline text="Folder" title="Folder" type="folder">
      <outline text="Nested RSS" title="Nested RSS" type="rss" xmlUrl="https://example.com/nested.xml"/>
    </outline>
  </body>
</opml>"#;

        let list = parse_opml(content).unwrap();
        let urls: Vec<_> = list.feeds.iter().map(|f| f.feed_url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://example.com/rss.xml", "https://example.com/nested.xml"]
        );
        assert_eq!(list.title.as_deref(), Some("Mixed OPML"));
        assert_eq!(list.date_created, None);
    }

    #[test]
    fn test_non_feed_types_skipped() {
        let content = r#"<opml version="2.0"><body>
    <outline type="link" text="A link" xmlUrl="https://example.com/link"/>
    <outline type="include" text="Include" xmlUrl="https://example.com/other.opml"/>
    <outline type="RSS" text="Upper" xmlUrl="https://example.com/upper.xml"/>
    <outline type="atom" text="Atom" xmlUrl="https://example.com/atom.xml"/>
    <outline text="Untyped" xmlUrl="https://example.com/untyped.xml"/>
</body></opml>"#;

        let list = parse_opml(content).unwrap();
        let titles: Vec<_> = list.feeds.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, ["Upper", "Atom", "Untyped"]);
    }

    #[test]
    fn test_title_fallbacks() {
        let content = r#"<opml version="2.0"><body>
    <outline type="rss" text="Feed Text" xmlUrl="https://textonly.com/feed"/>
    <outline type="rss" xmlUrl="https://notitle.com/feed"/>
    <outline type="rss" title="  " text="Blank Title" xmlUrl="https://blank.com/feed"/>
</body></opml>"#;

        let list = parse_opml(content).unwrap();
        assert_eq!(list.feeds[0].title, "Feed Text");
        assert_eq!(list.feeds[0].text.as_deref(), Some("Feed Text"));
        assert_eq!(list.feeds[1].title, "https://notitle.com/feed");
        assert_eq!(list.feeds[1].text, None);
        assert_eq!(list.feeds[2].title, "Blank Title");
    }

    #[test]
    fn test_missing_html_url() {
        let content = r#"<opml version="1.0"><body>
    <outline text="Feed" title="Feed" type="rss" xmlUrl="https://example.com/feed.xml"/>
</body></opml>"#;

        let list = parse_opml(content).unwrap();
        assert_eq!(list.feeds.len(), 1);
        assert_eq!(list.feeds[0].site_url, None);
    }

    #[test]
    fn test_invalid_html_url_dropped_feed_kept() {
        let content = r#"<opml version="2.0"><body>
    <outline type="rss" text="Feed" xmlUrl="https://example.com/feed.xml" htmlUrl="javascript:alert(1)"/>
</body></opml>"#;

        let list = parse_opml(content).unwrap();
        assert_eq!(list.feeds.len(), 1);
        assert_eq!(list.feeds[0].site_url, None);
    }

    #[test]
    fn test_skip_private_and_local_feeds() {
        let content = r#"<opml version="2.0"><body>
    <outline xmlUrl="https://valid.com/feed"/>
    <outline xmlUrl="http://192.168.1.1/feed"/>
    <outline xmlUrl="http://localhost/feed"/>
    <outline xmlUrl="file:///etc/passwd"/>
</body></opml>"#;

        let list = parse_opml(content).unwrap();
        assert_eq!(list.feeds.len(), 1);
        assert_eq!(list.feeds[0].feed_url, "https://valid.com/feed");
    }

    #[test]
    fn test_outline_without_xml_url_ignored() {
        let content = r#"<opml version="2.0"><body>
    <outline type="rss" text="No URL"/>
    <outline type="rss" text="Empty URL" xmlUrl=""/>
</body></opml>"#;

        assert!(parse_opml(content).unwrap().feeds.is_empty());
    }

    #[test]
    fn test_empty_body() {
        let list = parse_opml(r#"<opml version="2.0"><body></body></opml>"#).unwrap();
        assert!(list.feeds.is_empty());
        assert_eq!(list.title, None);
    }

    #[test]
    fn test_malformed_xml_error() {
        assert!(parse_opml("<opml><body><outline></body>").is_err());
    }

    #[test]
    fn test_entities_not_expanded() {
        let malicious = r#"<?xml version="1.0"?>
<!DOCTYPE opml [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<opml version="2.0">
    <body>
        <outline text="&xxe;" xmlUrl="https://example.com/feed.xml"/>
    </body>
</opml>"#;

        match parse_opml(malicious) {
            Ok(list) => {
                for feed in &list.feeds {
                    assert!(!feed.title.contains("root:"), "entity expanded: {}", feed.title);
                }
            }
            Err(_) => {}
        }
    }

    #[test]
    fn test_deeply_nested_opml_rejected() {
        let mut opml = String::from(r#"<opml version="2.0"><body>"#);
        opml.push_str(&r#"<outline text="level">"#.repeat(MAX_OPML_DEPTH + 1));
        opml.push_str(&"</outline>".repeat(MAX_OPML_DEPTH + 1));
        opml.push_str("</body></opml>");

        let err = parse_opml(&opml).unwrap_err();
        assert!(matches!(err, OpmlError::MaxDepthExceeded(50)));
    }

    #[test]
    fn test_nesting_at_depth_limit_allowed() {
        let mut opml = String::from(r#"<opml version="2.0"><body>"#);
        opml.push_str(&r#"<outline text="level">"#.repeat(MAX_OPML_DEPTH));
        opml.push_str(r#"<outline text="Deep Feed" xmlUrl="https://deep.example.com/feed"/>"#);
        opml.push_str(&"</outline>".repeat(MAX_OPML_DEPTH));
        opml.push_str("</body></opml>");

        let list = parse_opml(&opml).unwrap();
        assert_eq!(list.feeds.len(), 1);
        assert_eq!(list.feeds[0].title, "Deep Feed");
    }

    #[tokio::test]
    async fn test_read_opml_missing_file() {
        let path = std::env::temp_dir().join("feedrank_test_missing.opml");
        let _ = std::fs::remove_file(&path);
        assert!(read_opml(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_read_opml_from_file() {
        let dir = std::env::temp_dir().join("feedrank_opml_test_read");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.opml");
        std::fs::write(
            &path,
            r#"<opml version="2.0"><body><outline type="rss" text="F" xmlUrl="https://example.com/f.xml"/></body></opml>"#,
        )
        .unwrap();

        let list = read_opml(&path).await.unwrap();
        assert_eq!(list.feeds.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
