use std::path::PathBuf;

use curator_core::{BlockList, BlockListOrigin};
use curator_logging::{curator_info, curator_warn};

use crate::fetch::Fetcher;
use crate::TlsPolicy;

/// Compiled-in list used when neither the endpoint nor the local file yields
/// words.
const BUNDLED_BLOCK_LIST: &str = include_str!("../assets/blocked_words.json");

/// Supplies the block-list for a run. Called once per run; the result is
/// reused for every item.
#[async_trait::async_trait]
pub trait BlockListProvider: Send + Sync {
    async fn current(&self) -> BlockList;
}

/// Remote endpoint first, then a local file, then the bundled list.
pub struct RemoteBlockListProvider<'a> {
    fetcher: &'a dyn Fetcher,
    url: Option<String>,
    fallback_path: Option<PathBuf>,
}

impl<'a> RemoteBlockListProvider<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, url: Option<String>, fallback_path: Option<PathBuf>) -> Self {
        Self {
            fetcher,
            url,
            fallback_path,
        }
    }

    async fn from_remote(&self) -> Option<BlockList> {
        let url = self.url.as_deref()?;
        let output = match self.fetcher.fetch(url, TlsPolicy::Verify).await {
            Ok(output) => output,
            Err(err) => {
                curator_warn!("Failed to get blocked words from {}: {}", url, err);
                return None;
            }
        };
        match BlockList::from_json(&output.bytes, BlockListOrigin::Remote) {
            Ok(list) => Some(list),
            Err(err) => {
                curator_warn!("Unusable blocked words from {}: {}", url, err);
                None
            }
        }
    }

    fn from_local_file(&self) -> Option<BlockList> {
        let path = self.fallback_path.as_ref()?;
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                curator_warn!("Failed to read blocked words from {:?}: {}", path, err);
                return None;
            }
        };
        match BlockList::from_json(&bytes, BlockListOrigin::LocalFile) {
            Ok(list) => Some(list),
            Err(err) => {
                curator_warn!("Unusable blocked words in {:?}: {}", path, err);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl BlockListProvider for RemoteBlockListProvider<'_> {
    async fn current(&self) -> BlockList {
        let list = match self.from_remote().await {
            Some(list) => list,
            None => self.from_local_file().unwrap_or_else(bundled_block_list),
        };
        if list.is_degraded() {
            curator_warn!(
                "Block-list degraded: using {} list ({} words)",
                list.origin(),
                list.len()
            );
        } else {
            curator_info!("Block-list loaded from remote ({} words)", list.len());
        }
        list
    }
}

pub fn bundled_block_list() -> BlockList {
    BlockList::from_json(BUNDLED_BLOCK_LIST.as_bytes(), BlockListOrigin::Bundled)
        .unwrap_or_else(|_| BlockList::new(Vec::<String>::new(), BlockListOrigin::Bundled))
}

#[cfg(test)]
mod tests {
    use super::bundled_block_list;
    use curator_core::BlockListOrigin;

    #[test]
    fn bundled_list_is_valid_and_non_empty() {
        let list = bundled_block_list();
        assert_eq!(list.origin(), BlockListOrigin::Bundled);
        assert!(!list.is_empty());
    }
}
