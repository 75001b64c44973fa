//! Remote entry -> local item mapping.

use chrono::Utc;
use html_escape::decode_html_entities;
use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

use crate::domain::{apply_all, Item, Source, SourceLookup};
use crate::service::miniflux::api::Entry;
use crate::service::{CommandAction, PendingCommand};

/// Items ready for the store plus the remote commands rules asked for.
#[derive(Debug, Clone, Default)]
pub struct MappedBatch {
    pub items: Vec<Item>,
    pub commands: Vec<PendingCommand>,
}

impl MappedBatch {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn map_entries(entries: Vec<Entry>, sources: &SourceLookup) -> MappedBatch {
    let mut batch = MappedBatch::default();

    for entry in entries {
        let Some(source) = sources.get(&entry.feed_id.to_string()) else {
            warn!(
                "Skipping entry {}: feed {} has no local source",
                entry.id, entry.feed_id
            );
            continue;
        };

        let (item, commands) = map_entry(entry, source);
        batch.items.push(item);
        batch.commands.extend(commands);
    }

    batch
}

/// Map one entry and run the source's rules on it.
///
/// When a rule flips the read or starred flag reported by the server, a
/// command pushing the new value back is returned alongside the item.
pub fn map_entry(entry: Entry, source: &Source) -> (Item, Vec<PendingCommand>) {
    let remote_read = entry.is_read();
    let remote_starred = entry.starred;

    let mut item = Item::new(source.id);
    item.title = decode_html_entities(&entry.title).to_string();
    item.date = entry
        .published_at
        .or(entry.created_at)
        .unwrap_or_else(Utc::now);
    item.snippet = snippet(&entry.content);
    item.thumbnail = extract_thumbnail(&entry.content, &entry.url);
    item.author = entry.author.filter(|a| !a.is_empty());
    item.is_read = remote_read;
    item.is_starred = remote_starred;
    item.service_ref = Some(entry.id.to_string());
    item.link = entry.url;
    item.content = entry.content;

    if source.rules.is_empty() {
        return (item, Vec::new());
    }

    let item = apply_all(&source.rules, &item);
    let mut commands = Vec::new();
    if item.is_read != remote_read {
        let action = if item.is_read {
            CommandAction::MarkRead
        } else {
            CommandAction::MarkUnread
        };
        commands.push(PendingCommand::new(action, item.clone()));
    }
    if item.is_starred != remote_starred {
        let action = if item.is_starred {
            CommandAction::Star
        } else {
            CommandAction::Unstar
        };
        commands.push(PendingCommand::new(action, item.clone()));
    }

    (item, commands)
}

/// Plain text of an HTML fragment, entities decoded and trimmed.
pub fn snippet(content: &str) -> String {
    let fragment = Html::parse_fragment(content);
    let text: String = fragment.root_element().text().collect();
    text.trim().to_string()
}

/// Absolute URL of the first `<img>` in `content`.
///
/// Relative sources resolve against the origin of `link`, the article's own
/// site, so `/pic.png` in a post on `https://site.example/post` becomes
/// `https://site.example/pic.png`.
pub fn extract_thumbnail(content: &str, link: &str) -> Option<String> {
    let document = Html::parse_document(content);
    let selector = Selector::parse("img").ok()?;
    let src = document.select(&selector).next()?.value().attr("src")?.trim();
    if src.is_empty() {
        return None;
    }

    let base = Url::parse(link)
        .ok()
        .filter(|u| u.has_host())
        .and_then(|u| Url::parse(&u.origin().ascii_serialization()).ok());

    let resolved = match base {
        Some(base) => base.join(src).ok()?,
        None => Url::parse(src).ok()?,
    };
    Some(resolved.to_string())
}
