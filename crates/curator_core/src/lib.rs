//! Curator core: pure admission rules and feed assembly. No I/O happens here.
mod assemble;
mod blocklist;
mod config;
mod curate;
mod filter;
mod item;
pub mod text;

pub use assemble::{FeedAssembler, FeedDocument, ItemImage, OutputItem};
pub use blocklist::{BlockList, BlockListFormatError, BlockListOrigin};
pub use config::{CurationConfig, DescriptionSource, ImagePolicy, Presentation, TitleSource};
pub use curate::{
    CurationDecision, ImageAssignment, ImageTask, ItemCurator, RejectionKind, RejectionReason,
    RunContext, Verdict,
};
pub use filter::{contains_whole_word, WordFilter};
pub use item::{ChannelInfo, ImageRef, RawItem, SourceFeed};
