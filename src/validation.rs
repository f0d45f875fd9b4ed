//! Authoring-time checks for flags and their parts.
//!
//! Snapshots are never validated on read: evaluation tolerates anything that deserializes. These
//! checks are for the code paths that create or update flags.

use lazy_static::lazy_static;
use regex::Regex;

use crate::constraint::Operator;
use crate::error::ValidationError;
use crate::flag::Flag;

pub const MIN_KEY_LENGTH: usize = 3;
pub const MAX_KEY_LENGTH: usize = 63;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_SEGMENT_RANK: i64 = 9999;
const TOTAL_DISTRIBUTION_PERCENT: i64 = 100;

lazy_static! {
    static ref KEY_REGEX: Regex = Regex::new(r"^[a-z0-9_-]+$").unwrap();
}

pub type ValidationResult = Result<(), ValidationError>;

fn validate_key(field: &'static str, key: &str) -> ValidationResult {
    let length = key.chars().count();
    if key.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else if length < MIN_KEY_LENGTH {
        Err(ValidationError::TooShort {
            field,
            min: MIN_KEY_LENGTH,
        })
    } else if length > MAX_KEY_LENGTH {
        Err(ValidationError::TooLong {
            field,
            max: MAX_KEY_LENGTH,
        })
    } else if !KEY_REGEX.is_match(key) {
        Err(ValidationError::InvalidCharacters(field))
    } else {
        Ok(())
    }
}

pub fn validate_flag_key(key: &str) -> ValidationResult {
    validate_key("Flag key", key)
}

pub fn validate_variant_key(key: &str) -> ValidationResult {
    validate_key("Variant key", key)
}

pub fn validate_description(description: &str) -> ValidationResult {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "Description",
            max: MAX_DESCRIPTION_LENGTH,
        });
    }
    Ok(())
}

pub fn validate_rollout_percent(percent: i64) -> ValidationResult {
    validate_range("Rollout percent", percent, 0, 100)
}

pub fn validate_segment_rank(rank: i64) -> ValidationResult {
    validate_range("Segment rank", rank, 0, MAX_SEGMENT_RANK)
}

/// Each weight must be a percentage and together they must cover exactly 100%.
pub fn validate_distribution_percentages(percentages: &[i64]) -> ValidationResult {
    for percent in percentages {
        validate_range("Distribution percent", *percent, 0, 100)?;
    }
    let total: i64 = percentages.iter().sum();
    if total != TOTAL_DISTRIBUTION_PERCENT {
        return Err(ValidationError::DistributionSum(total));
    }
    Ok(())
}

pub fn validate_constraint(property: &str, operator: &str, value: &str) -> ValidationResult {
    if property.trim().is_empty() {
        return Err(ValidationError::Required("Property"));
    }
    if !Operator::parse(operator).is_supported() {
        return Err(ValidationError::InvalidOperator(operator.to_string()));
    }
    if value.trim().is_empty() {
        return Err(ValidationError::Required("Value"));
    }
    Ok(())
}

/// Runs every check above over a whole flag, stopping at the first failure.
pub fn validate_flag(flag: &Flag) -> ValidationResult {
    validate_flag_key(&flag.key)?;
    validate_description(&flag.description)?;

    for variant in &flag.variants {
        validate_variant_key(&variant.key)?;
    }

    for segment in &flag.segments {
        validate_segment_rank(segment.rank)?;
        validate_rollout_percent(i64::from(segment.rollout_percent))?;
        if let Some(description) = &segment.description {
            validate_description(description)?;
        }
        for constraint in &segment.constraints {
            validate_constraint(
                &constraint.property,
                constraint.operator.as_str(),
                &constraint.value,
            )?;
        }
        if !segment.distributions.is_empty() {
            let percentages: Vec<i64> = segment
                .distributions
                .iter()
                .map(|d| i64::from(d.percent))
                .collect();
            validate_distribution_percentages(&percentages)?;
        }
    }

    Ok(())
}

fn validate_range(field: &'static str, value: i64, min: i64, max: i64) -> ValidationResult {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::TestFlags;
    use spectral::prelude::*;
    use test_case::test_case;

    #[test_case("abc")]
    #[test_case("new-checkout_v2")]
    #[test_case("a1-")]
    fn valid_keys(key: &str) {
        assert_that!(validate_flag_key(key)).is_ok();
        assert_that!(validate_variant_key(key)).is_ok();
    }

    #[test_case("", ValidationError::Required("Flag key"); "empty")]
    #[test_case("   ", ValidationError::Required("Flag key"); "blank")]
    #[test_case("ab", ValidationError::TooShort { field: "Flag key", min: 3 }; "too short")]
    #[test_case("NewCheckout", ValidationError::InvalidCharacters("Flag key"); "uppercase")]
    #[test_case("new checkout", ValidationError::InvalidCharacters("Flag key"); "space")]
    #[test_case("new.checkout", ValidationError::InvalidCharacters("Flag key"); "dot")]
    fn invalid_flag_keys(key: &str, expected: ValidationError) {
        assert_that!(validate_flag_key(key)).is_err_containing(expected);
    }

    #[test]
    fn key_length_limit() {
        assert_that!(validate_variant_key(&"a".repeat(63))).is_ok();
        assert_that!(validate_variant_key(&"a".repeat(64))).is_err_containing(
            ValidationError::TooLong {
                field: "Variant key",
                max: 63,
            },
        );
    }

    #[test]
    fn description_limit() {
        assert_that!(validate_description("")).is_ok();
        assert_that!(validate_description(&"d".repeat(1000))).is_ok();
        assert_that!(validate_description(&"d".repeat(1001))).is_err();
    }

    #[test_case(0, true)]
    #[test_case(100, true)]
    #[test_case(-1, false)]
    #[test_case(101, false)]
    fn rollout_percent(percent: i64, valid: bool) {
        assert_eq!(validate_rollout_percent(percent).is_ok(), valid);
    }

    #[test_case(0, true)]
    #[test_case(9999, true)]
    #[test_case(-1, false)]
    #[test_case(10000, false)]
    fn segment_rank(rank: i64, valid: bool) {
        assert_eq!(validate_segment_rank(rank).is_ok(), valid);
    }

    #[test]
    fn distribution_percentages() {
        assert_that!(validate_distribution_percentages(&[100])).is_ok();
        assert_that!(validate_distribution_percentages(&[50, 30, 20])).is_ok();
        assert_that!(validate_distribution_percentages(&[50, 40]))
            .is_err_containing(ValidationError::DistributionSum(90));
        assert_that!(validate_distribution_percentages(&[])).is_err_containing(ValidationError::DistributionSum(0));
        assert_that!(validate_distribution_percentages(&[150, -50])).is_err_containing(
            ValidationError::OutOfRange {
                field: "Distribution percent",
                min: 0,
                max: 100,
                value: 150,
            },
        );
    }

    #[test]
    fn constraints() {
        assert_that!(validate_constraint("country", "IN", "NZ,AU")).is_ok();
        assert_that!(validate_constraint(" ", "EQ", "x"))
            .is_err_containing(ValidationError::Required("Property"));
        assert_that!(validate_constraint("country", "EQ", ""))
            .is_err_containing(ValidationError::Required("Value"));
        assert_that!(validate_constraint("country", "LIKE", "N%"))
            .is_err_containing(ValidationError::InvalidOperator("LIKE".to_string()));
        assert_that!(validate_constraint("country", "eq", "NZ"))
            .is_err_containing(ValidationError::InvalidOperator("eq".to_string()));
    }

    #[test]
    fn every_supported_operator_is_accepted() {
        for operator in Operator::SUPPORTED {
            assert_that!(validate_constraint("p", operator, "v")).is_ok();
        }
    }

    #[test]
    fn whole_flags() {
        let flags = TestFlags::new();
        assert_that!(validate_flag(flags.flag("full"))).is_ok();
        assert_that!(validate_flag(flags.flag("two-variants"))).is_ok();

        let mut flag = flags.flag("full").clone();
        flag.segments[0].distributions[0].percent = 40;
        assert_that!(validate_flag(&flag)).is_err_containing(ValidationError::DistributionSum(90));

        let mut flag = flags.flag("full").clone();
        flag.segments[0].rollout_percent = 120;
        assert_that!(validate_flag(&flag)).is_err();

        let mut flag = flags.flag("full").clone();
        flag.variants[0].key = "Red".to_string();
        assert_that!(validate_flag(&flag))
            .is_err_containing(ValidationError::InvalidCharacters("Variant key"));
    }
}
