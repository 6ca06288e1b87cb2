use std::borrow::Cow;

use chrono::{DateTime, FixedOffset};
use curator_core::{ChannelInfo, ImageRef, RawItem, SourceFeed};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::decode::DecodeError;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("malformed xml at byte {position}: {message}")]
    Xml { position: u64, message: String },
    #[error("document has no rss channel")]
    MissingChannel,
    #[error("item {index} has no {field}")]
    MissingField { index: usize, field: &'static str },
    #[error("item {index} has an unreadable pubDate '{value}'")]
    InvalidDate { index: usize, value: String },
}

const CHANNEL_PATH: &[&str] = &["rss", "channel"];
const ITEM_PATH: &[&str] = &["rss", "channel", "item"];

/// Parse an RSS 2.0 document into its channel metadata and items, in
/// document order. Any structural problem fails the whole document.
pub fn parse_feed(xml: &str) -> Result<SourceFeed, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut channel: Option<ChannelInfo> = None;
    let mut items = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                if name == "channel" && path == ["rss"] {
                    channel = Some(ChannelInfo::default());
                }
                if name == "item" && path == CHANNEL_PATH {
                    current = Some(ItemBuilder::default());
                } else if path == ITEM_PATH {
                    if let Some(item) = current.as_mut() {
                        item.take_media(&name, &e);
                    }
                }
                path.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(&e);
                if name == "item" && path == CHANNEL_PATH {
                    return Err(ParseError::MissingField {
                        index: items.len(),
                        field: "title",
                    });
                }
                if path == ITEM_PATH {
                    if let Some(item) = current.as_mut() {
                        item.take_media(&name, &e);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(&e);
                text.push_str(&unescape_lenient(&raw));
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(_)) => {
                let name = path.pop().unwrap_or_default();
                let value = std::mem::take(&mut text);
                if name == "item" && path == CHANNEL_PATH {
                    if let Some(builder) = current.take() {
                        let item = builder.build(items.len())?;
                        items.push(item);
                    }
                } else if path == ITEM_PATH {
                    if let Some(item) = current.as_mut() {
                        item.set_field(&name, value);
                    }
                } else if path == CHANNEL_PATH {
                    if let Some(channel) = channel.as_mut() {
                        match name.as_str() {
                            "title" => channel.title = value,
                            "link" => channel.link = value,
                            "description" => channel.description = value,
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::Eof) if path.is_empty() => break,
            Ok(Event::Eof) => {
                return Err(ParseError::Xml {
                    position: reader.buffer_position() as u64,
                    message: format!("document ends inside <{}>", path.join("/")),
                })
            }
            Err(e) => {
                return Err(ParseError::Xml {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })
            }
            _ => {}
        }
    }

    let channel = channel.ok_or(ParseError::MissingChannel)?;
    Ok(SourceFeed { channel, items })
}

/// Publication dates are RFC 2822, with a lenient pass for feeds that drop
/// the weekday or use a nonstandard zone spelling.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%a, %d %b %Y %H:%M:%S %z"))
        .or_else(|_| DateTime::parse_from_str(raw, "%d %b %Y %H:%M:%S %z"))
        .ok()
}

/// XML-unescape `raw` one reference at a time. References quick-xml does
/// not know (HTML names such as `&nbsp;`) and stray ampersands are kept
/// verbatim for the description cleanup to handle.
fn unescape_lenient(raw: &str) -> Cow<'_, str> {
    if let Ok(value) = unescape(raw) {
        return value;
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail[1..]
            .find(|c: char| c == ';' || c == '&' || c.is_whitespace())
            .map(|offset| offset + 1)
            .filter(|&offset| tail[offset..].starts_with(';'));
        match end {
            Some(end) => {
                let reference = &tail[..=end];
                match unescape(reference) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => out.push_str(reference),
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key.as_bytes())
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

/// `type`/`medium` hints, when present, must point at an image.
fn looks_like_image(e: &BytesStart<'_>) -> bool {
    let by_type = attribute(e, "type").map(|t| t.to_ascii_lowercase().starts_with("image/"));
    let by_medium = attribute(e, "medium").map(|m| m.eq_ignore_ascii_case("image"));
    by_type.or(by_medium).unwrap_or(true)
}

#[derive(Default)]
struct ItemBuilder {
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
    category: Option<String>,
    media_content: Option<String>,
    enclosure: Option<String>,
    thumbnail: Option<String>,
}

impl ItemBuilder {
    fn take_media(&mut self, name: &str, e: &BytesStart<'_>) {
        let slot = match name {
            "media:content" => &mut self.media_content,
            "enclosure" => &mut self.enclosure,
            "media:thumbnail" => &mut self.thumbnail,
            _ => return,
        };
        if slot.is_none() && (name == "media:thumbnail" || looks_like_image(e)) {
            *slot = attribute(e, "url");
        }
    }

    fn set_field(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = Some(value),
            "description" => self.description = Some(value),
            "link" => self.link = Some(value),
            "pubDate" => self.pub_date = Some(value),
            "category" if self.category.is_none() => self.category = Some(value),
            _ => {}
        }
    }

    fn build(self, index: usize) -> Result<RawItem, ParseError> {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(ParseError::MissingField {
                index,
                field: "title",
            })?;
        let published = match self.pub_date.filter(|d| !d.trim().is_empty()) {
            Some(raw) => Some(parse_pub_date(&raw).ok_or(ParseError::InvalidDate { index, value: raw })?),
            None => None,
        };
        let image = self
            .media_content
            .or(self.enclosure)
            .or(self.thumbnail)
            .map(ImageRef::from_url);

        Ok(RawItem {
            title,
            description: self.description.unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            published,
            image,
            category: self.category.filter(|c| !c.trim().is_empty()),
        })
    }
}
