use serde::{Deserialize, Serialize};

/// What to do with an item whose image is missing or not allow-listed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImagePolicy {
    /// Reject the item.
    #[default]
    Required,
    /// Accept the item without an image.
    Optional,
    /// Accept the item and point it at a fixed local image.
    Placeholder { path: String },
}

impl ImagePolicy {
    pub fn placeholder(&self) -> Option<&str> {
        match self {
            ImagePolicy::Placeholder { path } => Some(path),
            _ => None,
        }
    }
}

/// Admission rules for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    /// Upper bound on accepted items per document.
    pub max_items: usize,
    /// Also look for blocked words in the description, not just the title.
    pub scan_description: bool,
    /// Minimum visible description length; 0 disables the check.
    pub min_description_chars: usize,
    /// Freshness window; `None` accepts items of any age.
    pub max_age_hours: Option<u64>,
    pub image_policy: ImagePolicy,
    /// Lowercase extensions an image may have to be downloaded; `"*"`
    /// accepts any extension.
    pub allowed_extensions: Vec<String>,
    /// Directory, relative to the run's working directory, images land in.
    pub image_dir: String,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            max_items: 11,
            scan_description: false,
            min_description_chars: 0,
            max_age_hours: None,
            image_policy: ImagePolicy::default(),
            allowed_extensions: vec!["jpg".to_string()],
            image_dir: "images".to_string(),
        }
    }
}

impl CurationConfig {
    pub fn allows_extension(&self, ext: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(ext))
    }
}

/// Source of an output item's display title.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TitleSource {
    /// The item's own title.
    #[default]
    Original,
    /// The item's category, or its title when it has none.
    Category,
    /// A fixed label such as the publisher or section name.
    Label(String),
}

/// Source of an output item's display description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DescriptionSource {
    #[default]
    Description,
    /// The item's headline; used when the title slot carries a label.
    Title,
}

/// Normalization applied while assembling output items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presentation {
    pub description: DescriptionSource,
    pub strip_markup: bool,
    pub decode_entities: bool,
    pub collapse_whitespace: bool,
    pub max_description_chars: Option<usize>,
    pub include_pub_date: bool,
    pub include_link: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            description: DescriptionSource::Description,
            strip_markup: true,
            decode_entities: false,
            collapse_whitespace: false,
            max_description_chars: None,
            include_pub_date: false,
            include_link: false,
        }
    }
}
