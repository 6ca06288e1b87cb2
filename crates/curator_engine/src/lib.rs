//! Curator engine: network, parsing, image and output side of a curation run.
mod blocklist;
mod config;
mod decode;
mod fetch;
mod images;
mod parse;
mod persist;
mod render;
mod runner;
mod source;
mod types;

pub use blocklist::{bundled_block_list, BlockListProvider, RemoteBlockListProvider};
pub use config::{BlockListSettings, DownloadSettings, FeedSource, HttpSettings, JobConfig};
pub use decode::{decode_feed, DecodeError, DecodedFeed};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use images::{recompress, ImageDownloader, ImageError, ImageOutcome, StoredImage};
pub use parse::{parse_feed, parse_pub_date, ParseError};
pub use persist::{write_atomically, WriteError};
pub use render::{render_feed, RenderError};
pub use runner::{Clock, PipelineRunner, RunError, RunReport, RunSummary};
pub use source::{SourceError, SourceFetcher};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, TlsPolicy};
