use curator_core::SourceFeed;
use curator_logging::{curator_error, curator_info};

use crate::decode::decode_feed;
use crate::fetch::Fetcher;
use crate::parse::{parse_feed, ParseError};
use crate::{FetchError, TlsPolicy};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to parse feed: {0}")]
    Parse(#[from] ParseError),
}

/// Retrieves one source feed and parses it into items.
pub struct SourceFetcher<'a> {
    fetcher: &'a dyn Fetcher,
}

impl<'a> SourceFetcher<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self { fetcher }
    }

    pub async fn fetch(&self, url: &str, tls: TlsPolicy) -> Result<SourceFeed, SourceError> {
        let output = self.fetcher.fetch(url, tls).await.inspect_err(|err| {
            curator_error!("Failed to get xml from {}: {}", url, err);
        })?;
        let decoded = decode_feed(&output.bytes, output.metadata.content_type.as_deref())
            .map_err(ParseError::from)?;
        let feed = parse_feed(&decoded.xml).inspect_err(|err| {
            curator_error!("Malformed feed from {}: {}", url, err);
        })?;
        curator_info!(
            "Success on getting xml from {} ({} bytes, {}, {} items)",
            url,
            output.metadata.byte_len,
            decoded.encoding_label,
            feed.items.len()
        );
        Ok(feed)
    }
}
