//! Message rendering.
//!
//! A [`Message`] is the structural document handed to a delivery transport.
//! It carries no markup; transports decide how to present it.

use serde::Serialize;

use crate::content::Content;
use crate::source::Source;
use crate::subscription::Subscription;

/// Rendered message for one (item, subscription) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Source title.
    pub source_title: String,
    /// Item title.
    pub title: String,
    /// Plain-text excerpt of the item body.
    pub preview: Option<String>,
    /// Canonical item link.
    pub primary_link: String,
    /// Transcoded article URL, when the subscription wants it and one exists.
    pub transcoded_link: Option<String>,
    /// Tag text (`#a #b`).
    pub tags: Option<String>,
}

impl Message {
    /// Render the message for a subscription.
    ///
    /// `preview_length` bounds the excerpt in characters; 0 disables it.
    pub fn render(
        source: &Source,
        content: &Content,
        subscription: &Subscription,
        preview_length: usize,
    ) -> Self {
        let preview = if preview_length > 0 {
            Some(truncate_chars(&strip_html(&content.description), preview_length))
                .filter(|p| !p.is_empty())
        } else {
            None
        };

        let transcoded_link = if subscription.enable_telegraph {
            content.telegraph_url.clone()
        } else {
            None
        };

        Self {
            source_title: source.title.clone(),
            title: content.title.clone(),
            preview,
            primary_link: content.raw_link.clone(),
            transcoded_link,
            tags: subscription.tag_label().map(str::to_string),
        }
    }

    /// Render as plain text.
    pub fn to_plain_text(&self) -> String {
        let mut text = self.source_title.clone();

        if let Some(preview) = &self.preview {
            text.push_str("\n---------- Preview ----------\n");
            text.push_str(preview);
            text.push_str("\n-----------------------------");
        }

        let title = if self.title.is_empty() {
            self.primary_link.as_str()
        } else {
            self.title.as_str()
        };

        match &self.transcoded_link {
            Some(url) => {
                text.push_str(&format!(
                    "\n{} Telegraph: {} | Original: {}",
                    title, url, self.primary_link
                ));
            }
            None => {
                text.push_str(&format!("\n{}: {}", title, self.primary_link));
            }
        }

        if let Some(tags) = &self.tags {
            text.push('\n');
            text.push_str(tags);
        }

        text
    }
}

/// Truncate text to at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Strip HTML tags from text, decoding common entities and collapsing whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_entity = false;
    let mut entity = String::new();

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                // Tags separate words
                result.push(' ');
            }
            '>' => in_tag = false,
            '&' if !in_tag => {
                in_entity = true;
                entity.clear();
            }
            ';' if in_entity => {
                in_entity = false;
                match entity.as_str() {
                    "amp" => result.push('&'),
                    "lt" => result.push('<'),
                    "gt" => result.push('>'),
                    "quot" => result.push('"'),
                    "apos" => result.push('\''),
                    "nbsp" => result.push(' '),
                    _ if entity.starts_with('#') => {
                        if let Some(c) = parse_numeric_entity(&entity).and_then(char::from_u32) {
                            result.push(c);
                        }
                    }
                    _ => {
                        result.push('&');
                        result.push_str(&entity);
                        result.push(';');
                    }
                }
            }
            _ if in_entity => {
                // Not an entity after all
                if ch.is_whitespace() || entity.len() > 8 {
                    in_entity = false;
                    result.push('&');
                    result.push_str(&entity);
                    result.push(ch);
                } else {
                    entity.push(ch);
                }
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    if in_entity {
        result.push('&');
        result.push_str(&entity);
    }

    result.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        entity.strip_prefix('#')?.parse().ok()
    }
}
