use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::blocklist::BlockList;
use crate::config::{CurationConfig, ImagePolicy};
use crate::filter::WordFilter;
use crate::item::RawItem;
use crate::text::{title_key, visible_chars};

/// State shared by every curation step of one run.
///
/// Multiple source feeds written into one document share a single context, so
/// the item cap, duplicate suppression and image numbering span all of them.
#[derive(Debug, Clone)]
pub struct RunContext {
    now: DateTime<Utc>,
    accepted_titles: HashSet<String>,
    next_image_index: usize,
    accepted: usize,
}

impl RunContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            accepted_titles: HashSet::new(),
            next_image_index: 0,
            accepted: 0,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn images_assigned(&self) -> usize {
        self.next_image_index
    }

    fn is_duplicate(&self, title: &str) -> bool {
        self.accepted_titles.contains(&title_key(title))
    }

    fn record_accepted(&mut self, title: &str) {
        self.accepted_titles.insert(title_key(title));
        self.accepted += 1;
    }

    fn assign_image_index(&mut self) -> usize {
        let index = self.next_image_index;
        self.next_image_index += 1;
        index
    }
}

/// An image to fetch, with its final location already decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    pub source_url: String,
    pub index: usize,
    pub extension: String,
    /// `{image_dir}/{index}.{extension}`, relative to the run's working directory.
    pub target_path: String,
}

impl ImageTask {
    fn new(source_url: &str, index: usize, extension: &str, image_dir: &str) -> Self {
        let dir = image_dir.trim_end_matches('/');
        Self {
            source_url: source_url.to_string(),
            index,
            extension: extension.to_string(),
            target_path: format!("{dir}/{index}.{extension}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAssignment {
    None,
    Task(ImageTask),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    BlockedWord { word: String },
    TooShort { chars: usize },
    /// Older than the freshness window, or undated while one is configured.
    Stale { age_hours: Option<i64> },
    Duplicate,
    MissingImage,
}

impl RejectionReason {
    pub fn kind(&self) -> RejectionKind {
        match self {
            RejectionReason::BlockedWord { .. } => RejectionKind::BlockedWord,
            RejectionReason::TooShort { .. } => RejectionKind::TooShort,
            RejectionReason::Stale { .. } => RejectionKind::Stale,
            RejectionReason::Duplicate => RejectionKind::Duplicate,
            RejectionReason::MissingImage => RejectionKind::MissingImage,
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::BlockedWord { word } => write!(f, "blocked word '{word}'"),
            RejectionReason::TooShort { chars } => write!(f, "description too short ({chars} chars)"),
            RejectionReason::Stale { age_hours: Some(h) } => write!(f, "stale ({h}h old)"),
            RejectionReason::Stale { age_hours: None } => write!(f, "stale (no publication date)"),
            RejectionReason::Duplicate => write!(f, "duplicate title"),
            RejectionReason::MissingImage => write!(f, "missing image"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RejectionKind {
    BlockedWord,
    TooShort,
    Stale,
    Duplicate,
    MissingImage,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectionKind::BlockedWord => "blocked-word",
            RejectionKind::TooShort => "too-short",
            RejectionKind::Stale => "stale",
            RejectionKind::Duplicate => "duplicate",
            RejectionKind::MissingImage => "missing-image",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted { image: ImageAssignment },
    Rejected(RejectionReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurationDecision {
    pub item: RawItem,
    pub verdict: Verdict,
}

impl CurationDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted { .. })
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match &self.verdict {
            Verdict::Rejected(reason) => Some(reason),
            Verdict::Accepted { .. } => None,
        }
    }

    pub fn image_task(&self) -> Option<&ImageTask> {
        match &self.verdict {
            Verdict::Accepted {
                image: ImageAssignment::Task(task),
            } => Some(task),
            _ => None,
        }
    }
}

/// Applies the admission rules, in order, to source items.
pub struct ItemCurator<'a> {
    config: &'a CurationConfig,
    filter: WordFilter,
}

impl<'a> ItemCurator<'a> {
    pub fn new(config: &'a CurationConfig, block_list: &BlockList) -> Self {
        Self {
            config,
            filter: WordFilter::new(block_list),
        }
    }

    /// Evaluates `items` in order until the run holds `max_items` accepted
    /// items; items past that point get no decision.
    pub fn curate(&self, items: Vec<RawItem>, ctx: &mut RunContext) -> Vec<CurationDecision> {
        let mut decisions = Vec::new();
        for item in items {
            if ctx.accepted() >= self.config.max_items {
                break;
            }
            let verdict = match self.evaluate(&item, ctx) {
                Ok(image) => {
                    ctx.record_accepted(&item.title);
                    Verdict::Accepted { image }
                }
                Err(reason) => Verdict::Rejected(reason),
            };
            decisions.push(CurationDecision { item, verdict });
        }
        decisions
    }

    fn evaluate(
        &self,
        item: &RawItem,
        ctx: &mut RunContext,
    ) -> Result<ImageAssignment, RejectionReason> {
        self.check_blocked(item)?;
        self.check_length(item)?;
        self.check_freshness(item, ctx.now())?;
        if ctx.is_duplicate(&item.title) {
            return Err(RejectionReason::Duplicate);
        }
        self.assign_image(item, ctx)
    }

    fn check_blocked(&self, item: &RawItem) -> Result<(), RejectionReason> {
        let hit = self.filter.first_match(&item.title).or_else(|| {
            if self.config.scan_description {
                self.filter.first_match(&item.description)
            } else {
                None
            }
        });
        match hit {
            Some(word) => Err(RejectionReason::BlockedWord {
                word: word.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn check_length(&self, item: &RawItem) -> Result<(), RejectionReason> {
        if self.config.min_description_chars == 0 {
            return Ok(());
        }
        let chars = visible_chars(&item.description);
        if chars < self.config.min_description_chars {
            return Err(RejectionReason::TooShort { chars });
        }
        Ok(())
    }

    fn check_freshness(&self, item: &RawItem, now: DateTime<Utc>) -> Result<(), RejectionReason> {
        let Some(max_hours) = self.config.max_age_hours else {
            return Ok(());
        };
        let Some(published) = item.published else {
            return Err(RejectionReason::Stale { age_hours: None });
        };
        let age = now.signed_duration_since(published.with_timezone(&Utc));
        let max_age = i64::try_from(max_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or(Duration::MAX);
        if age > max_age {
            return Err(RejectionReason::Stale {
                age_hours: Some(age.num_hours()),
            });
        }
        Ok(())
    }

    fn assign_image(
        &self,
        item: &RawItem,
        ctx: &mut RunContext,
    ) -> Result<ImageAssignment, RejectionReason> {
        let usable = item.image.as_ref().and_then(|img| {
            img.extension
                .as_deref()
                .filter(|ext| self.config.allows_extension(ext))
                .map(|ext| (img.url.as_str(), ext))
        });
        if let Some((url, ext)) = usable {
            let index = ctx.assign_image_index();
            return Ok(ImageAssignment::Task(ImageTask::new(
                url,
                index,
                ext,
                &self.config.image_dir,
            )));
        }
        match &self.config.image_policy {
            ImagePolicy::Required => Err(RejectionReason::MissingImage),
            ImagePolicy::Optional => Ok(ImageAssignment::None),
            ImagePolicy::Placeholder { path } => Ok(ImageAssignment::Placeholder(path.clone())),
        }
    }
}
