use chrono::{DateTime, FixedOffset, Utc};

use crate::config::{DescriptionSource, Presentation, TitleSource};
use crate::curate::{CurationDecision, ImageAssignment, Verdict};
use crate::item::{ChannelInfo, RawItem};
use crate::text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemImage {
    /// Image fetched by the run, numbered by its curation index.
    Downloaded { index: usize, path: String },
    /// Fixed local image shared by every item without its own.
    Placeholder { path: String },
}

impl ItemImage {
    pub fn path(&self) -> &str {
        match self {
            ItemImage::Downloaded { path, .. } | ItemImage::Placeholder { path } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputItem {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub published: Option<DateTime<FixedOffset>>,
    pub image: Option<ItemImage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub channel: ChannelInfo,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<OutputItem>,
}

impl FeedDocument {
    pub fn new(channel: ChannelInfo, generated_at: DateTime<Utc>) -> Self {
        Self {
            channel,
            generated_at,
            items: Vec::new(),
        }
    }

    /// Replaces the image of the item that expected download `index`, used
    /// when that download did not produce a file. Returns whether an item
    /// was affected.
    pub fn degrade_image(&mut self, index: usize, fallback: Option<&str>) -> bool {
        let target = self.items.iter_mut().find(|item| {
            matches!(item.image, Some(ItemImage::Downloaded { index: i, .. }) if i == index)
        });
        match target {
            Some(item) => {
                item.image = fallback.map(|path| ItemImage::Placeholder {
                    path: path.to_string(),
                });
                true
            }
            None => false,
        }
    }
}

/// Builds a [`FeedDocument`] from accepted curation decisions.
#[derive(Debug, Clone)]
pub struct FeedAssembler {
    presentation: Presentation,
    document: FeedDocument,
}

impl FeedAssembler {
    pub fn new(channel: ChannelInfo, generated_at: DateTime<Utc>, presentation: Presentation) -> Self {
        Self {
            presentation,
            document: FeedDocument::new(channel, generated_at),
        }
    }

    /// Appends every accepted decision, in order; rejected ones are skipped.
    pub fn append(&mut self, decisions: &[CurationDecision], title: &TitleSource) {
        for decision in decisions {
            if let Verdict::Accepted { image } = &decision.verdict {
                let item = self.output_item(&decision.item, image, title);
                self.document.items.push(item);
            }
        }
    }

    pub fn document(&self) -> &FeedDocument {
        &self.document
    }

    pub fn finish(self) -> FeedDocument {
        self.document
    }

    fn output_item(&self, item: &RawItem, image: &ImageAssignment, title: &TitleSource) -> OutputItem {
        let p = &self.presentation;
        let raw_title = match title {
            TitleSource::Original => item.title.as_str(),
            TitleSource::Category => item
                .category
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(&item.title),
            TitleSource::Label(label) => label.as_str(),
        };
        let raw_description = match p.description {
            DescriptionSource::Description => item.description.as_str(),
            DescriptionSource::Title => item.title.as_str(),
        };

        OutputItem {
            title: self.clean_title(raw_title),
            description: self.clean_description(raw_description),
            link: p
                .include_link
                .then(|| item.link.clone())
                .filter(|link| !link.is_empty()),
            published: if p.include_pub_date { item.published } else { None },
            image: match image {
                ImageAssignment::None => None,
                ImageAssignment::Task(task) => Some(ItemImage::Downloaded {
                    index: task.index,
                    path: task.target_path.clone(),
                }),
                ImageAssignment::Placeholder(path) => Some(ItemImage::Placeholder { path: path.clone() }),
            },
        }
    }

    fn clean_title(&self, title: &str) -> String {
        let p = &self.presentation;
        let mut out = if p.decode_entities {
            text::decode_entities(title)
        } else {
            title.to_string()
        };
        if p.collapse_whitespace {
            out = text::collapse_whitespace(&out);
        }
        out.trim().to_string()
    }

    fn clean_description(&self, description: &str) -> String {
        let p = &self.presentation;
        let mut out = if p.strip_markup {
            text::strip_markup(description)
        } else {
            description.to_string()
        };
        if p.decode_entities {
            out = text::decode_entities(&out);
        }
        if p.collapse_whitespace {
            out = text::collapse_whitespace(&out);
        }
        let out = out.trim();
        match p.max_description_chars {
            Some(max) => text::truncate_with_marker(out, max),
            None => out.to_string(),
        }
    }
}
