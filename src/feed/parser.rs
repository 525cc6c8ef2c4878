use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed, FeedType};
use feed_rs::parser;
use serde::Serialize;

/// Feed metadata and items as published by the remote source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteFeed {
    pub feed_type: String,
    /// Website the feed belongs to.
    pub link: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub items: Vec<RemoteItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteItem {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

/// Parsed feed plus the number of entries dropped because they had no link.
#[derive(Debug)]
pub struct ParseResult {
    pub feed: RemoteFeed,
    pub skipped: usize,
}

/// Parse RSS 0.x/1.0/2.0, Atom or JSON Feed bytes.
///
/// Entries without a link are skipped: the link is an article's identity.
pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    Ok(from_model(feed))
}

fn from_model(feed: Feed) -> ParseResult {
    let feed_type = match feed.feed_type {
        FeedType::Atom => "atom",
        FeedType::JSON => "json",
        FeedType::RSS0 | FeedType::RSS1 | FeedType::RSS2 => "rss",
    }
    .to_string();

    // Atom lists rel="self" next to the site link; prefer anything else
    let link = feed
        .links
        .iter()
        .find(|l| l.rel.as_deref() != Some("self"))
        .or_else(|| feed.links.first())
        .map(|l| l.href.clone());

    let mut skipped = 0;
    let items: Vec<RemoteItem> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let item = item_from_entry(entry);
            if item.is_none() {
                skipped += 1;
            }
            item
        })
        .collect();

    ParseResult {
        feed: RemoteFeed {
            feed_type,
            link,
            title: feed
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string()),
            description: feed.description.map(|d| d.content),
            image_url: feed.logo.or(feed.icon).map(|i| i.uri),
            items,
        },
        skipped,
    }
}

fn item_from_entry(entry: Entry) -> Option<RemoteItem> {
    // Atom entries may list replies/edit/enclosure links before the article itself
    let url = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone())?;
    if url.trim().is_empty() {
        return None;
    }

    let image_url = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .next()
        .or_else(|| {
            entry
                .media
                .iter()
                .flat_map(|m| m.content.iter())
                .find(|c| {
                    c.content_type
                        .as_ref()
                        .is_some_and(|ct| ct.essence().to_string().starts_with("image/"))
                })
                .and_then(|c| c.url.as_ref().map(|u| u.to_string()))
        });

    Some(RemoteItem {
        url,
        title: entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string()),
        description: entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body)),
        published_at: entry.published.or(entry.updated),
        image_url,
    })
}
