use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use curator_core::{
    BlockList, BlockListOrigin, CurationDecision, FeedAssembler, ImageTask, ItemCurator,
    RejectionKind, RunContext, SourceFeed,
};
use curator_logging::{curator_info, curator_warn};
use tokio_util::sync::CancellationToken;

use crate::blocklist::{BlockListProvider, RemoteBlockListProvider};
use crate::config::JobConfig;
use crate::fetch::{Fetcher, ReqwestFetcher};
use crate::images::ImageDownloader;
use crate::parse::ParseError;
use crate::persist::{write_atomically, WriteError};
use crate::render::{render_feed, RenderError};
use crate::source::{SourceError, SourceFetcher};
use crate::FetchError;

/// Source of "now" for freshness checks and the document timestamp.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("could not fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("could not parse {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("could not write output: {0}")]
    Write(#[from] WriteError),
    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    fn from_source(url: &str, err: SourceError) -> Self {
        match err {
            SourceError::Fetch(source) => RunError::Fetch {
                url: url.to_string(),
                source,
            },
            SourceError::Parse(source) => RunError::Parse {
                url: url.to_string(),
                source,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub feeds: usize,
    pub fetched: usize,
    pub accepted: usize,
    pub rejected: BTreeMap<RejectionKind, usize>,
    pub images_downloaded: usize,
    pub images_failed: usize,
    pub images_recompressed: usize,
    pub block_list_origin: BlockListOrigin,
}

impl RunSummary {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn rejected_for(&self, kind: RejectionKind) -> usize {
        self.rejected.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} feed(s), {} item(s) fetched, {} accepted, {} rejected",
            self.feeds,
            self.fetched,
            self.accepted,
            self.rejected_total()
        )?;
        if !self.rejected.is_empty() {
            let parts: Vec<String> = self
                .rejected
                .iter()
                .map(|(kind, count)| format!("{kind}={count}"))
                .collect();
            write!(f, " ({})", parts.join(", "))?;
        }
        write!(
            f,
            "; images {} downloaded, {} failed, {} recompressed; block-list {}",
            self.images_downloaded, self.images_failed, self.images_recompressed, self.block_list_origin
        )
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub xml: String,
    pub output_path: PathBuf,
}

/// Runs one job end to end: fetch, curate, assemble, download, render and
/// write.
pub struct PipelineRunner {
    config: JobConfig,
    fetcher: Arc<dyn Fetcher>,
    block_lists: Option<Arc<dyn BlockListProvider>>,
    clock: Clock,
}

impl PipelineRunner {
    pub fn new(config: JobConfig) -> Self {
        let fetcher = Arc::new(ReqwestFetcher::new(config.http.fetch_settings()));
        Self {
            config,
            fetcher,
            block_lists: None,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the endpoint/file/bundled chain built from the job's
    /// block-list settings.
    pub fn with_block_list_provider(mut self, provider: Arc<dyn BlockListProvider>) -> Self {
        self.block_lists = Some(provider);
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport, RunError> {
        let feeds = self.fetch_sources(cancel).await?;
        let block_list = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            list = self.load_block_list() => list,
        };

        let now = (self.clock)();
        let channel = self
            .config
            .channel
            .clone()
            .or_else(|| feeds.first().map(|feed| feed.channel.clone()))
            .unwrap_or_default();

        let curator = ItemCurator::new(&self.config.curation, &block_list);
        let mut ctx = RunContext::new(now);
        let mut assembler = FeedAssembler::new(channel, now, self.config.presentation.clone());
        let mut summary = RunSummary {
            feeds: feeds.len(),
            fetched: 0,
            accepted: 0,
            rejected: BTreeMap::new(),
            images_downloaded: 0,
            images_failed: 0,
            images_recompressed: 0,
            block_list_origin: block_list.origin(),
        };
        let mut tasks: Vec<ImageTask> = Vec::new();

        for (source, feed) in self.config.feeds.iter().zip(feeds) {
            summary.fetched += feed.items.len();
            let decisions = curator.curate(feed.items, &mut ctx);
            record_decisions(&decisions, &mut summary);
            tasks.extend(decisions.iter().filter_map(|d| d.image_task().cloned()));
            assembler.append(&decisions, &source.title);
        }

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let mut document = assembler.finish();

        if !tasks.is_empty() {
            let downloads = cancel.child_token();
            let deadline = self.config.images.deadline_secs.map(|secs| {
                let token = downloads.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    curator_warn!("Image deadline of {}s reached, abandoning downloads", secs);
                    token.cancel();
                })
            });

            let downloader = ImageDownloader::new(
                self.fetcher.as_ref(),
                self.config.images.clone(),
                self.config.work_dir.clone(),
            );
            let outcomes = downloader.download_all(tasks, &downloads).await;
            if let Some(timer) = deadline {
                timer.abort();
            }

            let fallback = self.config.curation.image_policy.placeholder();
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(stored) => {
                        summary.images_downloaded += 1;
                        if stored.recompressed {
                            summary.images_recompressed += 1;
                        }
                    }
                    Err(_) => {
                        summary.images_failed += 1;
                        document.degrade_image(outcome.task.index, fallback);
                    }
                }
            }
        }

        let xml = render_feed(&document)?;
        let output_path = write_atomically(&self.config.output_path(), xml.as_bytes())?;
        curator_info!("Wrote {:?}: {}", output_path, summary);

        Ok(RunReport {
            summary,
            xml,
            output_path,
        })
    }

    /// Every source must succeed; the first failure aborts the run.
    async fn fetch_sources(&self, cancel: &CancellationToken) -> Result<Vec<SourceFeed>, RunError> {
        let sources = SourceFetcher::new(self.fetcher.as_ref());
        let mut feeds = Vec::with_capacity(self.config.feeds.len());
        for source in &self.config.feeds {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                result = sources.fetch(&source.url, source.tls) => result,
            };
            feeds.push(result.map_err(|err| RunError::from_source(&source.url, err))?);
        }
        Ok(feeds)
    }

    async fn load_block_list(&self) -> BlockList {
        if !self.config.block_list.enabled {
            curator_info!("Block-list disabled for this job");
            return BlockList::disabled();
        }
        match &self.block_lists {
            Some(provider) => provider.current().await,
            None => {
                RemoteBlockListProvider::new(
                    self.fetcher.as_ref(),
                    self.config.block_list.url.clone(),
                    self.config.block_list.fallback_path.clone(),
                )
                .current()
                .await
            }
        }
    }
}

fn record_decisions(decisions: &[CurationDecision], summary: &mut RunSummary) {
    for decision in decisions {
        match decision.rejection() {
            None => {
                summary.accepted += 1;
                match decision.image_task() {
                    Some(task) => curator_info!(
                        "Accepted '{}' (image {} -> {})",
                        decision.item.title,
                        task.index,
                        task.target_path
                    ),
                    None => curator_info!("Accepted '{}'", decision.item.title),
                }
            }
            Some(reason) => {
                *summary.rejected.entry(reason.kind()).or_insert(0) += 1;
                curator_info!("Rejected '{}': {}", decision.item.title, reason);
            }
        }
    }
}
