use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use url::Url;

/// Image referenced by a source item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub url: String,
    /// Lowercased extension of the URL path, without the dot.
    pub extension: Option<String>,
}

impl ImageRef {
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let extension = url_extension(&url);
        Self { url, extension }
    }
}

/// Extension of the last path segment, ignoring query string and fragment.
fn url_extension(raw: &str) -> Option<String> {
    let path = match Url::parse(raw) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative or otherwise odd references: cut query/fragment by hand.
        Err(_) => raw.split(&['?', '#'][..]).next().unwrap_or(raw).to_string(),
    };
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// One item as published by a source feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published: Option<DateTime<FixedOffset>>,
    pub image: Option<ImageRef>,
    pub category: Option<String>,
}

impl RawItem {
    /// Item with only a title; handy for building fixtures.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            link: String::new(),
            published: None,
            image: None,
            category: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelInfo {
    pub title: String,
    pub link: String,
    pub description: String,
}

/// A parsed source feed: its channel metadata and items in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFeed {
    pub channel: ChannelInfo,
    pub items: Vec<RawItem>,
}
