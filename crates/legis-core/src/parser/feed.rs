//! RSS 2.0, RSS 1.0 and Atom items → [`RawLegalFact`].
//!
//! Element names are matched by local name, so `dc:date` and
//! `content:encoded` are recognised whatever prefix a feed binds them to.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::classify::classify_impact;
use crate::error::AppError;
use crate::models::RawLegalFact;
use crate::util::{SUMMARY_MAX_CHARS, clean_text, collapse_whitespace, truncate_chars};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Link,
    Published,
    Updated,
    Description,
    Content,
    Category,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"guid" | b"id" => Field::Id,
            b"title" => Field::Title,
            b"link" => Field::Link,
            b"pubDate" | b"published" | b"date" | b"issued" => Field::Published,
            b"updated" | b"modified" => Field::Updated,
            b"description" | b"summary" => Field::Description,
            b"content" | b"encoded" => Field::Content,
            b"category" | b"subject" => Field::Category,
            _ => return None,
        })
    }
}

#[derive(Debug, Default)]
struct FeedItem {
    about: Option<String>,
    id: Option<String>,
    title: Option<String>,
    link: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    description: Option<String>,
    content: Option<String>,
    category: Option<String>,
}

impl FeedItem {
    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::Description => &mut self.description,
            Field::Content => &mut self.content,
            Field::Category => &mut self.category,
        };
        // first occurrence wins
        if slot.is_none() && !text.trim().is_empty() {
            *slot = Some(text);
        }
    }

    fn into_raw(self, source_id: &str) -> Result<RawLegalFact, AppError> {
        let id = self
            .id
            .or(self.about)
            .or_else(|| self.link.clone())
            .map(|id| id.trim().to_string())
            .ok_or_else(|| AppError::FormatError("feed item has no guid, id or link".into()))?;

        let text = self
            .description
            .or(self.content)
            .and_then(|d| clean_text(&d));
        let category = self.category.map(|c| collapse_whitespace(&c));

        Ok(RawLegalFact {
            source_id: source_id.to_string(),
            id,
            title: self.title.and_then(|t| clean_text(&t)),
            description: text.as_deref().map(|t| truncate_chars(t, SUMMARY_MAX_CHARS)),
            date: self.published.or(self.updated).map(|d| d.trim().to_string()),
            impact: Some(classify_impact(category.as_deref().unwrap_or_default())),
            category,
            status: None,
            rationale: text,
            uri: None,
            url: self.link.map(|l| l.trim().to_string()),
        })
    }
}

/// Parse a feed document. Items without any identifier are skipped with a
/// warning; unreadable XML fails the whole document.
pub fn parse_feed(xml: &str, source_id: &str) -> Result<Vec<RawLegalFact>, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut facts = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();
    let mut index = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.local_name();
                if is_item(name.as_ref()) {
                    current = Some(FeedItem {
                        about: attribute(e, b"about"),
                        ..FeedItem::default()
                    });
                } else if let Some(item) = current.as_mut() {
                    if field.is_none() {
                        field = Field::from_local_name(name.as_ref());
                        text.clear();
                    }
                    apply_attributes(item, e, name.as_ref());
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(item) = current.as_mut() {
                    apply_attributes(item, e, e.local_name().as_ref());
                }
            }
            Ok(Event::Text(ref e)) => {
                if field.is_some() {
                    let unescaped = e
                        .unescape()
                        .map_err(|e| AppError::FormatError(format!("feed text: {e}")))?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(e)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.local_name();
                if is_item(name.as_ref()) {
                    if let Some(item) = current.take() {
                        match item.into_raw(source_id) {
                            Ok(fact) => facts.push(fact),
                            Err(e) => {
                                tracing::warn!(source = %source_id, item = index, error = %e, "Skipping feed item");
                            }
                        }
                        index += 1;
                    }
                    field = None;
                } else if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    if Field::from_local_name(name.as_ref()) == Some(f) {
                        item.set(f, std::mem::take(&mut text));
                        field = None;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AppError::FormatError(format!("feed XML: {e}"))),
            _ => {}
        }
    }

    Ok(facts)
}

fn is_item(local_name: &[u8]) -> bool {
    local_name == b"item" || local_name == b"entry"
}

/// Atom carries links and categories in attributes.
fn apply_attributes(item: &mut FeedItem, e: &BytesStart<'_>, local_name: &[u8]) {
    match local_name {
        b"link" => {
            let rel = attribute(e, b"rel");
            if matches!(rel.as_deref(), None | Some("alternate")) {
                if let Some(href) = attribute(e, b"href") {
                    item.set(Field::Link, href);
                }
            }
        }
        b"category" => {
            if let Some(term) = attribute(e, b"term").or_else(|| attribute(e, b"label")) {
                item.set(Field::Category, term);
            }
        }
        _ => {}
    }
}

/// Attribute value by local name.
fn attribute(e: &BytesStart<'_>, local_name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local_name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}
