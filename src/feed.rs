use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::info;

use crate::constants::constants;

// --- Types ---

/// One broadcast entry from the search feed.
#[derive(Debug, Clone)]
pub struct SearchItem {
  pub title: String,
  pub url: String,
  pub description: String,
  pub duration_secs: u64,
  pub category: String,
}

/// Ways a search can end. All are terminal: a search is a single
/// fetch-and-parse, never retried.
#[derive(Debug, Error)]
pub enum SearchError {
  /// The configured base URL cannot form a valid query URL.
  #[error("invalid feed URL from base {base:?}: {reason}")]
  InvalidUrl { base: String, reason: String },
  /// The endpoint was unreachable or answered with a non-success status.
  #[error("feed request failed: {0}")]
  Fetch(#[from] reqwest::Error),
  /// The response body is not well-formed XML.
  #[error("feed is not well-formed XML: {0}")]
  Parse(#[from] quick_xml::Error),
}

// --- Query URL ---

/// Build the feed query URL for a raw wildcard query string.
///
/// Wildcard syntax (`!` sender, `+` title, `#` topic, `*` description,
/// `<N`/`>N` duration minutes) is interpreted by the server, not here;
/// the query text is passed through verbatim, only URL-escaped. Fixed
/// parameters request all fields, future content and the result cap.
pub fn feed_url(base: &str, query: &str) -> Result<Url, SearchError> {
  let endpoint = format!("{}/feed", base.trim_end_matches('/'));
  let size = constants().feed_result_size.to_string();
  let params = [("query", query), ("everywhere", "true"), ("future", "true"), ("size", size.as_str())];
  Url::parse_with_params(&endpoint, params)
    .map_err(|e| SearchError::InvalidUrl { base: base.to_string(), reason: e.to_string() })
}

// --- Search ---

/// Query the feed endpoint and parse the result list.
///
/// An empty feed that parses cleanly is an empty list, not an error.
pub async fn search(client: &Client, query: &str) -> Result<Vec<SearchItem>, SearchError> {
  let url = feed_url(&constants().feed_base_url, query)?;
  info!(url = %url, "fetching search feed");

  let response = client.get(url).send().await?.error_for_status()?;
  let body = response.text().await?;

  let items = parse_feed(&body)?;
  info!(count = items.len(), "search feed parsed");
  Ok(items)
}

// --- Feed parsing ---

/// Marker the feed puts in titles that carry an audio-description track.
const AD_MARKER: &str = "Audiodeskription";

/// The item fields we extract from the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Title,
  Link,
  Description,
  Duration,
  Category,
}

impl Field {
  fn from_tag(tag: &[u8]) -> Option<Self> {
    match tag {
      b"title" => Some(Field::Title),
      b"link" => Some(Field::Link),
      b"description" => Some(Field::Description),
      b"duration" => Some(Field::Duration),
      b"category" => Some(Field::Category),
      _ => None,
    }
  }
}

/// Item under construction while its element is open.
#[derive(Default)]
struct Draft {
  title: String,
  url: String,
  description: String,
  duration_secs: u64,
  category: String,
}

impl Draft {
  fn set(&mut self, field: Field, raw: &str) {
    match field {
      Field::Title => self.title = clean_title(raw),
      Field::Link => self.url = raw.to_string(),
      Field::Description => self.description = raw.to_string(),
      // The feed supplies plain numeric seconds; anything else counts as
      // unknown and stays zero.
      Field::Duration => self.duration_secs = raw.trim().parse().unwrap_or(0),
      Field::Category => self.category = raw.to_string(),
    }
  }

  fn finish(self) -> SearchItem {
    SearchItem {
      title: self.title,
      url: self.url,
      description: self.description,
      duration_secs: self.duration_secs,
      category: self.category,
    }
  }
}

/// Parse the feed XML into items, in document order.
///
/// Each item is one structured record, so description, duration and
/// category always describe the title/url at the same position. Missing
/// optional fields stay at their empty/zero defaults; an item with
/// neither title nor link is dropped.
pub fn parse_feed(xml: &str) -> Result<Vec<SearchItem>, SearchError> {
  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text(true);

  let mut items = Vec::new();
  let mut current: Option<Draft> = None;
  let mut field: Option<Field> = None;
  let mut text = String::new();

  loop {
    match reader.read_event()? {
      Event::Start(e) => {
        if e.name().as_ref() == b"item" {
          current = Some(Draft::default());
        } else if current.is_some() {
          // Only capture fields inside an item; the channel header has
          // its own <title> and <link>.
          field = Field::from_tag(e.name().as_ref());
          text.clear();
        }
      }
      Event::Text(e) => {
        if field.is_some() {
          text.push_str(&e.unescape().map_err(quick_xml::Error::from)?);
        }
      }
      Event::CData(e) => {
        if field.is_some() {
          text.push_str(&String::from_utf8_lossy(&e));
        }
      }
      Event::End(e) => {
        if e.name().as_ref() == b"item" {
          if let Some(draft) = current.take()
            && !(draft.title.is_empty() && draft.url.is_empty())
          {
            items.push(draft.finish());
          }
        } else if let Some(f) = field.take()
          && Field::from_tag(e.name().as_ref()) == Some(f)
          && let Some(ref mut draft) = current
        {
          draft.set(f, text.trim());
        }
      }
      Event::Eof => break,
      _ => {}
    }
  }

  Ok(items)
}

/// Normalize a feed title.
///
/// Keeps the prefix before the first `" -"` separator; when the original
/// text carries the audio-description marker, the parenthesized marker is
/// stripped and one `[AD]` tag appended instead.
pub fn clean_title(raw: &str) -> String {
  let has_ad = raw.contains(AD_MARKER);
  let head = raw.split_once(" -").map_or(raw, |(head, _)| head);
  if has_ad {
    let stripped = head.replace(&format!("({AD_MARKER})"), "");
    format!("{} [AD]", stripped.trim())
  } else {
    head.trim().to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- clean_title ---

  #[test]
  fn clean_title_splits_on_first_separator() {
    assert_eq!(clean_title("Show Name - Episode"), "Show Name");
    assert_eq!(clean_title("A - B - C"), "A");
  }

  #[test]
  fn clean_title_without_separator_is_unchanged() {
    assert_eq!(clean_title("Tatort"), "Tatort");
  }

  #[test]
  fn clean_title_strips_ad_marker_and_tags_once() {
    let cleaned = clean_title("Wilsberg (Audiodeskription) - Folge 12");
    assert_eq!(cleaned, "Wilsberg [AD]");
    assert_eq!(cleaned.matches("[AD]").count(), 1);
    assert!(!cleaned.contains("Audiodeskription"));
  }

  #[test]
  fn clean_title_marker_after_separator_still_tags() {
    // The marker check runs on the pre-split text.
    assert_eq!(clean_title("Wilsberg - Folge 12 (Audiodeskription)"), "Wilsberg [AD]");
  }

  // --- feed_url ---

  #[test]
  fn feed_url_carries_query_verbatim_with_fixed_params() {
    let url = feed_url("https://mediathekviewweb.de", "!ZDF +Krimi >40").unwrap();
    assert_eq!(url.path(), "/feed");

    let pairs: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    assert_eq!(pairs[0], ("query".to_string(), "!ZDF +Krimi >40".to_string()));
    assert!(pairs.contains(&("everywhere".to_string(), "true".to_string())));
    assert!(pairs.contains(&("future".to_string(), "true".to_string())));
    assert!(pairs.contains(&("size".to_string(), "500".to_string())));
  }

  #[test]
  fn feed_url_escapes_reserved_characters() {
    let url = feed_url("https://mediathekviewweb.de", "#thema *text").unwrap();
    // The raw fragment/space characters must not survive into the URL text.
    let query = url.query().unwrap();
    assert!(!query.contains(' '));
    assert!(!query.contains('#'));
  }

  #[test]
  fn feed_url_rejects_garbage_base() {
    assert!(matches!(feed_url("not a url", "x"), Err(SearchError::InvalidUrl { .. })));
  }

  // --- parse_feed ---

  const EMPTY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
    <rss version="2.0">
      <channel>
        <title>MediathekViewWeb</title>
        <link>https://mediathekviewweb.de</link>
      </channel>
    </rss>"#;

  const FULL_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
    <rss version="2.0">
      <channel>
        <title>MediathekViewWeb</title>
        <item>
          <title>Wilsberg - Folge 1</title>
          <link>https://example.org/wilsberg1.mp4</link>
          <description>Erste Folge</description>
          <duration>5400</duration>
          <category>ZDF</category>
        </item>
        <item>
          <title>Tatort (Audiodeskription) - Sonntag</title>
          <link>https://example.org/tatort.mp4</link>
          <description><![CDATA[Mord & Totschlag]]></description>
          <duration>5280</duration>
          <category>ARD</category>
        </item>
        <item>
          <title>Kurzfilm</title>
          <link>https://example.org/kurz.mp4</link>
        </item>
      </channel>
    </rss>"#;

  #[test]
  fn empty_feed_yields_empty_list() {
    let items = parse_feed(EMPTY_FEED).unwrap();
    assert!(items.is_empty());
  }

  #[test]
  fn items_come_out_in_document_order_with_all_fields() {
    let items = parse_feed(FULL_FEED).unwrap();
    assert_eq!(items.len(), 3);

    assert_eq!(items[0].title, "Wilsberg");
    assert_eq!(items[0].url, "https://example.org/wilsberg1.mp4");
    assert_eq!(items[0].description, "Erste Folge");
    assert_eq!(items[0].duration_secs, 5400);
    assert_eq!(items[0].category, "ZDF");

    assert_eq!(items[1].title, "Tatort [AD]");
    assert_eq!(items[1].category, "ARD");
  }

  #[test]
  fn every_field_stays_aligned_with_its_item() {
    let items = parse_feed(FULL_FEED).unwrap();
    // Each record carries its own description/duration/category: the
    // second item's CDATA description must not bleed into the third.
    assert_eq!(items[1].description, "Mord & Totschlag");
    assert_eq!(items[2].description, "");
  }

  #[test]
  fn missing_optional_fields_default_to_empty_and_zero() {
    let items = parse_feed(FULL_FEED).unwrap();
    assert_eq!(items[2].title, "Kurzfilm");
    assert_eq!(items[2].description, "");
    assert_eq!(items[2].duration_secs, 0);
    assert_eq!(items[2].category, "");
  }

  #[test]
  fn non_numeric_duration_counts_as_zero() {
    let xml = r#"<rss><channel><item>
      <title>X</title><link>https://example.org/x.mp4</link>
      <duration>about an hour</duration>
    </item></channel></rss>"#;
    let items = parse_feed(xml).unwrap();
    assert_eq!(items[0].duration_secs, 0);
  }

  #[test]
  fn channel_header_title_is_not_an_item() {
    let items = parse_feed(EMPTY_FEED).unwrap();
    assert!(items.is_empty());
    let items = parse_feed(FULL_FEED).unwrap();
    assert!(items.iter().all(|i| i.title != "MediathekViewWeb"));
  }

  #[test]
  fn malformed_xml_is_a_parse_error() {
    let xml = "<rss><channel><item><title>X</wrong></item></channel></rss>";
    assert!(matches!(parse_feed(xml), Err(SearchError::Parse(_))));
  }

  #[test]
  fn escaped_entities_are_decoded() {
    let xml = r#"<rss><channel><item>
      <title>Krieg &amp; Frieden</title><link>https://example.org/kf.mp4</link>
    </item></channel></rss>"#;
    let items = parse_feed(xml).unwrap();
    assert_eq!(items[0].title, "Krieg & Frieden");
  }
}
