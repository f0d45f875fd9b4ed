use serde::{Deserialize, Serialize};

use crate::segment::Segment;
use crate::variation::{Variant, VariantId};

pub type FlagId = i64;

/// The top-level feature toggle, identified by numeric id and unique key.
///
/// Flags are published as part of an immutable [crate::Snapshot]; nothing in this crate mutates
/// one after it has been fetched.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    #[serde(default)]
    pub id: FlagId,
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub snapshot_id: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub data_records_enabled: bool,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,

    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A label attached to a flag, used for lookups by tag set.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[serde(default)]
    pub id: i64,
    pub value: String,
}

impl Flag {
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn has_tag(&self, value: &str) -> bool {
        self.tags.iter().any(|t| t.value == value)
    }

    /// Orders segments by ascending rank, keeping list order among equal ranks.
    pub fn sort_segments_by_rank(&mut self) {
        self.segments.sort_by_key(|s| s.rank);
    }

    pub(crate) fn segments_in_rank_order(&self) -> bool {
        self.segments.windows(2).all(|w| w[0].rank <= w[1].rank)
    }

    #[cfg(test)]
    pub(crate) fn new_enabled(id: FlagId, key: &str) -> Self {
        Self {
            id,
            key: key.to_string(),
            description: format!("{} description", key),
            created_by: None,
            updated_by: None,
            enabled: true,
            snapshot_id: 0,
            notes: None,
            data_records_enabled: false,
            entity_type: None,
            updated_at: None,
            segments: vec![],
            variants: vec![],
            tags: vec![],
        }
    }

    #[cfg(test)]
    pub(crate) fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags
            .iter()
            .enumerate()
            .map(|(i, value)| Tag {
                id: i as i64 + 1,
                value: value.to_string(),
            })
            .collect();
        self
    }
}
