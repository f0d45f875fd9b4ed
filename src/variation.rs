use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type VariantId = i64;

/// Opaque key/value payload attached to a variant and handed back to the caller on match.
pub type Attachment = Map<String, Value>;

/// One of the possible outcomes of evaluating a flag.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    #[serde(default)]
    pub id: VariantId,
    #[serde(default)]
    pub flag_id: i64,
    pub key: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

impl Variant {
    #[cfg(test)]
    pub(crate) fn new(id: VariantId, flag_id: i64, key: &str) -> Self {
        Variant {
            id,
            flag_id,
            key: key.to_string(),
            attachment: None,
        }
    }
}
