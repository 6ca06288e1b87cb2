use std::path::PathBuf;
use std::time::Duration;

use curator_core::{ChannelInfo, CurationConfig, Presentation, TitleSource};
use serde::{Deserialize, Serialize};

use crate::fetch::{FetchSettings, DEFAULT_USER_AGENT};
use crate::TlsPolicy;

/// One source feed contributing items to the job's document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    #[serde(default)]
    pub title: TitleSource,
    #[serde(default)]
    pub tls: TlsPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockListSettings {
    /// `false` runs the job without word filtering.
    pub enabled: bool,
    /// Endpoint serving `{"default_words": [...]}`.
    pub url: Option<String>,
    /// Local document with the same shape, read when the endpoint fails.
    pub fallback_path: Option<PathBuf>,
}

impl Default for BlockListSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            fallback_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            max_bytes: 25 * 1024 * 1024,
        }
    }
}

impl HttpSettings {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_bytes: self.max_bytes,
            ..FetchSettings::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub max_concurrency: usize,
    /// Files larger than this are re-encoded after download.
    pub recompress_threshold_bytes: u64,
    /// JPEG quality (1-100) used when re-encoding.
    pub recompress_quality: u8,
    pub tls: TlsPolicy,
    /// Downloads still running after this many seconds are abandoned.
    pub deadline_secs: Option<u64>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            recompress_threshold_bytes: 1_000_000,
            recompress_quality: 50,
            tls: TlsPolicy::Verify,
            deadline_secs: None,
        }
    }
}

/// Everything one run needs to know about a source job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub feeds: Vec<FeedSource>,
    /// Channel metadata of the output; the first feed's channel when unset.
    pub channel: Option<ChannelInfo>,
    pub block_list: BlockListSettings,
    pub curation: CurationConfig,
    pub presentation: Presentation,
    pub http: HttpSettings,
    pub images: DownloadSettings,
    /// Directory the output document, images and run log are written under.
    pub work_dir: PathBuf,
    pub output_filename: String,
    pub log_filename: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            channel: None,
            block_list: BlockListSettings::default(),
            curation: CurationConfig::default(),
            presentation: Presentation::default(),
            http: HttpSettings::default(),
            images: DownloadSettings::default(),
            work_dir: PathBuf::from("."),
            output_filename: "feed.xml".to_string(),
            log_filename: "feed.log".to_string(),
        }
    }
}

impl JobConfig {
    pub fn output_path(&self) -> PathBuf {
        self.work_dir.join(&self.output_filename)
    }

    pub fn log_path(&self) -> PathBuf {
        self.work_dir.join(&self.log_filename)
    }
}
