use serde::{Deserialize, Serialize};

use crate::constraint::{self, Constraint};
use crate::context::EvaluationContext;
use crate::rollout;
use crate::variation::VariantId;

fn default_rank() -> i64 {
    999
}

/// A ranked, conditionally applicable rule block within a [crate::Flag].
///
/// Segments are evaluated in ascending `rank`; list position and id play no part in ordering
/// beyond breaking ties.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub flag_id: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_rank")]
    pub rank: i64,
    #[serde(default)]
    pub rollout_percent: u32,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub distributions: Vec<Distribution>,
}

/// A weighted assignment of a [crate::Variant] within a segment.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub segment_id: i64,
    pub variant_id: VariantId,
    #[serde(default)]
    pub variant_key: Option<String>,
    #[serde(default)]
    pub percent: u32,
}

impl Segment {
    pub fn matches_constraints(&self, context: &EvaluationContext) -> bool {
        constraint::matches_all(&self.constraints, context)
    }

    pub fn is_rolled_out(&self, context: &EvaluationContext) -> bool {
        rollout::is_rolled_out(context.entity_id(), self.id, self.rollout_percent)
    }

    pub fn select_distribution(&self, context: &EvaluationContext) -> Option<&Distribution> {
        rollout::select_distribution(context.entity_id(), self.id, &self.distributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Operator;
    use spectral::prelude::*;

    fn new_segment(rollout_percent: u32) -> Segment {
        Segment {
            id: 11,
            flag_id: 1,
            description: None,
            rank: 0,
            rollout_percent,
            constraints: vec![Constraint {
                id: 1,
                segment_id: 11,
                property: "plan".to_string(),
                operator: Operator::Eq,
                value: "pro".to_string(),
            }],
            distributions: vec![Distribution {
                id: 1,
                segment_id: 11,
                variant_id: 7,
                variant_key: Some("on".to_string()),
                percent: 100,
            }],
        }
    }

    #[test]
    fn defaults_when_fields_missing() {
        let segment: Segment = serde_json::from_str(r#"{"flagId": 3}"#).unwrap();
        assert_that!(segment.id).is_equal_to(0);
        assert_that!(segment.rank).is_equal_to(999);
        assert_that!(segment.rollout_percent).is_equal_to(0);
        assert_that!(segment.constraints).is_empty();
        assert_that!(segment.distributions).is_empty();
    }

    #[test]
    fn constraint_match() {
        let segment = new_segment(100);
        let pro = EvaluationContext::new("jane").with_property("plan", "pro");
        let free = EvaluationContext::new("jane").with_property("plan", "free");
        assert_that!(segment.matches_constraints(&pro)).is_true();
        assert_that!(segment.matches_constraints(&free)).is_false();
    }

    #[test]
    fn rollout_bounds() {
        let jane = EvaluationContext::new("jane");
        assert_that!(new_segment(0).is_rolled_out(&jane)).is_false();
        assert_that!(new_segment(100).is_rolled_out(&jane)).is_true();
    }

    #[test]
    fn full_distribution_selects_its_variant() {
        let segment = new_segment(100);
        let selected = segment.select_distribution(&EvaluationContext::new("jane"));
        assert_that!(selected.map(|d| d.variant_id)).contains_value(7);
    }
}
