use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::export::ExportDocument;
use crate::flag::{Flag, FlagId};

/// How a set of tags is matched against a flag's tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagMatch {
    /// The flag carries at least one of the tags.
    #[default]
    Any,
    /// The flag carries every one of the tags.
    All,
}

impl TagMatch {
    /// Parses `ANY`/`ALL` case-insensitively; anything else, including nothing, is `Any`.
    pub fn parse(s: Option<&str>) -> TagMatch {
        match s {
            Some(s) if s.eq_ignore_ascii_case("all") => TagMatch::All,
            _ => TagMatch::Any,
        }
    }
}

/// An immutable, indexed copy of every flag from one fetch.
#[derive(Debug, Default)]
pub struct Snapshot {
    flags: Vec<Arc<Flag>>,
    by_id: HashMap<FlagId, Arc<Flag>>,
    by_key: HashMap<String, Arc<Flag>>,
    // enabled flags only
    by_tag: HashMap<String, BTreeMap<FlagId, Arc<Flag>>>,
    fetched_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// The snapshot served before the first successful fetch.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_flags(flags: Vec<Flag>, fetched_at: DateTime<Utc>) -> Self {
        let mut flags: Vec<Arc<Flag>> = flags
            .into_iter()
            .map(|mut flag| {
                flag.sort_segments_by_rank();
                Arc::new(flag)
            })
            .collect();
        flags.sort_by_key(|f| f.id);

        let mut by_id = HashMap::with_capacity(flags.len());
        let mut by_key = HashMap::with_capacity(flags.len());
        let mut by_tag: HashMap<String, BTreeMap<FlagId, Arc<Flag>>> = HashMap::new();

        for flag in &flags {
            by_id.insert(flag.id, flag.clone());
            by_key.insert(flag.key.clone(), flag.clone());
            if flag.enabled {
                for tag in &flag.tags {
                    by_tag
                        .entry(tag.value.clone())
                        .or_default()
                        .insert(flag.id, flag.clone());
                }
            }
        }

        Self {
            flags,
            by_id,
            by_key,
            by_tag,
            fetched_at: Some(fetched_at),
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// When the flags in this snapshot were fetched, or `None` for the initial empty snapshot.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Every flag, ordered by id.
    pub fn flags(&self) -> &[Arc<Flag>] {
        &self.flags
    }

    pub fn get_by_id(&self, id: FlagId) -> Option<Arc<Flag>> {
        self.by_id.get(&id).cloned()
    }

    pub fn get_by_key(&self, key: &str) -> Option<Arc<Flag>> {
        self.by_key.get(key).cloned()
    }

    /// Enabled flags carrying the given tags, ordered by id. An empty tag list matches nothing.
    pub fn get_by_tags<S: AsRef<str>>(&self, tags: &[S], mode: TagMatch) -> Vec<Arc<Flag>> {
        if tags.is_empty() {
            return vec![];
        }

        match mode {
            TagMatch::Any => {
                let mut matched: BTreeMap<FlagId, Arc<Flag>> = BTreeMap::new();
                for tag in tags {
                    if let Some(flags) = self.by_tag.get(tag.as_ref()) {
                        for (id, flag) in flags {
                            matched.entry(*id).or_insert_with(|| flag.clone());
                        }
                    }
                }
                matched.into_values().collect()
            }
            TagMatch::All => {
                let Some(first) = self.by_tag.get(tags[0].as_ref()) else {
                    return vec![];
                };
                first
                    .values()
                    .filter(|flag| tags[1..].iter().all(|t| flag.has_tag(t.as_ref())))
                    .cloned()
                    .collect()
            }
        }
    }

    pub fn to_export(&self) -> ExportDocument {
        ExportDocument::new(self.flags.iter().map(|f| Flag::clone(f)).collect())
    }
}
