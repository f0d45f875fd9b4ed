use serde::{Deserialize, Serialize};

use crate::flag::Flag;

/// The flat document shared by the file and HTTP fetchers, cache export, and offline evaluators:
/// `{"flags": [...]}` with every flag fully nested.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ExportDocument {
    #[serde(default)]
    pub flags: Vec<Flag>,
}

impl ExportDocument {
    pub fn new(flags: Vec<Flag>) -> Self {
        Self { flags }
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn into_flags(self) -> Vec<Flag> {
        self.flags
    }
}
