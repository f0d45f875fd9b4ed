use std::borrow::Borrow;

use itertools::{Either, Itertools};
use log::warn;
use serde::Serialize;

use crate::context::EvaluationContext;
use crate::flag::{Flag, FlagId};
use crate::segment::Distribution;
use crate::variation::{Attachment, VariantId};

/// One line of the evaluation trace, optionally tied to the segment that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDebugLog {
    #[serde(rename = "segmentID")]
    pub segment_id: Option<i64>,
    #[serde(rename = "msg")]
    pub message: String,
}

/// The outcome of evaluating a flag for one entity.
///
/// A result without a variant is not an error: the flag was off, had nothing to evaluate, or no
/// segment selected the entity. `segment_id` is the segment that produced the variant, or the last
/// segment looked at when none did.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    #[serde(rename = "variantID")]
    pub variant_id: Option<VariantId>,
    pub variant_key: Option<String>,
    pub variant_attachment: Option<Attachment>,
    #[serde(rename = "segmentID")]
    pub segment_id: Option<i64>,
    /// Empty unless debugging was requested.
    pub debug_logs: Vec<SegmentDebugLog>,
}

impl EvaluationResult {
    pub fn is_match(&self) -> bool {
        self.variant_id.is_some()
    }

    fn no_match(segment_id: Option<i64>, trace: DebugTrace) -> Self {
        Self {
            segment_id,
            debug_logs: trace.into_logs(),
            ..Self::default()
        }
    }

    fn matched(
        flag: &Flag,
        segment_id: i64,
        distribution: &Distribution,
        trace: DebugTrace,
    ) -> Self {
        let variant = flag.variant(distribution.variant_id);
        if variant.is_none() {
            warn!(
                "flag {} distribution {} references unknown variant {}",
                flag.key, distribution.id, distribution.variant_id
            );
        }

        Self {
            variant_id: Some(distribution.variant_id),
            variant_key: variant
                .map(|v| v.key.clone())
                .or_else(|| distribution.variant_key.clone()),
            variant_attachment: variant.and_then(|v| v.attachment.clone()),
            segment_id: Some(segment_id),
            debug_logs: trace.into_logs(),
        }
    }
}

/// The result for one flag of an [evaluate_batch] call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvaluation {
    #[serde(rename = "flagID")]
    pub flag_id: FlagId,
    pub flag_key: String,
    #[serde(flatten)]
    pub result: EvaluationResult,
}

// Messages are built lazily so that nothing is formatted unless debugging is on.
struct DebugTrace(Option<Vec<SegmentDebugLog>>);

impl DebugTrace {
    fn new(enabled: bool) -> Self {
        DebugTrace(enabled.then(Vec::new))
    }

    fn log(&mut self, segment_id: Option<i64>, message: impl FnOnce() -> String) {
        if let Some(logs) = &mut self.0 {
            logs.push(SegmentDebugLog {
                segment_id,
                message: message(),
            });
        }
    }

    fn into_logs(self) -> Vec<SegmentDebugLog> {
        self.0.unwrap_or_default()
    }
}

/// Evaluate a feature flag for the specified [EvaluationContext].
///
/// Segments are tried in ascending rank. The first one whose constraints match, whose rollout
/// includes the entity, and whose distributions select a variant decides the result. Evaluation is
/// a pure function of the flag and the context.
pub fn evaluate(flag: &Flag, context: &EvaluationContext, enable_debug: bool) -> EvaluationResult {
    let mut trace = DebugTrace::new(enable_debug);

    if !flag.enabled {
        trace.log(None, || format!("flagID {} is not enabled", flag.id));
        return EvaluationResult::no_match(None, trace);
    }

    if flag.segments.is_empty() {
        trace.log(None, || format!("flagID {} has no segments", flag.id));
        return EvaluationResult::no_match(None, trace);
    }

    // snapshot flags are already ranked; anything else is sorted here
    let segments = if flag.segments_in_rank_order() {
        Either::Left(flag.segments.iter())
    } else {
        Either::Right(flag.segments.iter().sorted_by_key(|s| s.rank))
    };

    let mut last_segment_id = None;
    for segment in segments {
        last_segment_id = Some(segment.id);

        if !segment.matches_constraints(context) {
            trace.log(Some(segment.id), || {
                format!("segment_id {} did not match constraints", segment.id)
            });
            continue;
        }

        if !segment.is_rolled_out(context) {
            trace.log(Some(segment.id), || format!("segment_id {} rollout no", segment.id));
            continue;
        }

        match segment.select_distribution(context) {
            Some(distribution) => {
                trace.log(Some(segment.id), || {
                    format!(
                        "matched all constraints. rollout yes. variantID: {}",
                        distribution.variant_id
                    )
                });
                return EvaluationResult::matched(flag, segment.id, distribution, trace);
            }
            None => trace.log(Some(segment.id), || {
                format!(
                    "segment_id {} matched all constraints. rollout yes. no distribution matched",
                    segment.id
                )
            }),
        }
    }

    EvaluationResult::no_match(last_segment_id, trace)
}

/// Evaluates each flag independently for the same context, preserving input order.
pub fn evaluate_batch<F: Borrow<Flag>>(
    flags: &[F],
    context: &EvaluationContext,
    enable_debug: bool,
) -> Vec<BatchEvaluation> {
    flags
        .iter()
        .map(|flag| {
            let flag = flag.borrow();
            BatchEvaluation {
                flag_id: flag.id,
                flag_key: flag.key.clone(),
                result: evaluate(flag, context, enable_debug),
            }
        })
        .collect()
}
