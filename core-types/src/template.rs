use crate::CaptionsMap;
use serde::{Deserialize, Serialize};

/// Reusable rights/credit block applied to images.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetadataTemplate {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub authors_position: String,
    #[serde(default)]
    pub credit: String,
    #[serde(default)]
    pub copyright: CaptionsMap,
    #[serde(default)]
    pub right_usage_terms: CaptionsMap,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub instructions: String,
}

impl MetadataTemplate {
    /// Title marking a template whose only purpose is to strip the template from items.
    pub const REMOVE_TITLE: &'static str = "_REMOVE_TEMPLATE_";

    pub fn removal() -> Self {
        Self {
            title: Self::REMOVE_TITLE.to_string(),
            ..Self::default()
        }
    }

    pub fn is_removal(&self) -> bool {
        self.title == Self::REMOVE_TITLE
    }

    /// True when no field carries content. The title alone does not count.
    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
            && self.authors_position.is_empty()
            && self.credit.is_empty()
            && self.copyright.is_empty()
            && self.right_usage_terms.is_empty()
            && self.source.is_empty()
            && self.instructions.is_empty()
    }

    /// Compares everything except the title.
    pub fn same_contents(&self, other: &MetadataTemplate) -> bool {
        self.authors == other.authors
            && self.authors_position == other.authors_position
            && self.credit == other.credit
            && self.copyright == other.copyright
            && self.right_usage_terms == other.right_usage_terms
            && self.source == other.source
            && self.instructions == other.instructions
    }
}
