//! Turns an expense amount, its participants and a [`SplitPolicy`] into the
//! per-participant [`Split`]s stored on the expense.
//!
//! [`compute`] never fails so it can back a live preview while the user is
//! still typing; [`check`] (or [`validate`]) decides whether the result may be
//! saved. [`split`] does both.
use std::collections::{HashMap, HashSet};

use crate::error::LedgerError;
use crate::schemas::{MemberId, Split, SplitPolicy};

/// Absolute error accepted when comparing money sums.
pub const TOLERANCE: f64 = 0.01;

pub fn validate(
    total: f64,
    participants: &[MemberId],
    policy: SplitPolicy,
    inputs: &HashMap<MemberId, f64>,
) -> bool {
    check(total, participants, policy, inputs).is_ok()
}

pub fn check(
    total: f64,
    participants: &[MemberId],
    policy: SplitPolicy,
    inputs: &HashMap<MemberId, f64>,
) -> Result<(), LedgerError> {
    if !(total > 0.0) || !total.is_finite() {
        return Err(LedgerError::NonPositiveAmount(total));
    }
    if participants.is_empty() {
        return Err(LedgerError::EmptyParticipants);
    }
    let mut seen = HashSet::with_capacity(participants.len());
    for participant in participants {
        if !seen.insert(participant) {
            return Err(LedgerError::DuplicateParticipant(participant.clone()));
        }
    }

    let expected = match policy {
        SplitPolicy::Equal => return Ok(()),
        SplitPolicy::Percentage => 100.0,
        SplitPolicy::Exact => total,
    };
    for participant in participants {
        let value = input_for(inputs, participant);
        if value < 0.0 {
            return Err(LedgerError::NegativeShare {
                participant: participant.clone(),
                value,
            });
        }
    }
    let actual: f64 = participants.iter().map(|p| input_for(inputs, p)).sum();
    if !actual.is_finite() || (actual - expected).abs() > TOLERANCE {
        return Err(LedgerError::InvalidSplit {
            policy,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Splits in participant order. Inputs missing for a participant count as 0.
pub fn compute(
    total: f64,
    participants: &[MemberId],
    policy: SplitPolicy,
    inputs: &HashMap<MemberId, f64>,
) -> Vec<Split> {
    match policy {
        SplitPolicy::Equal => {
            if participants.is_empty() {
                return Vec::new();
            }
            let share = total / participants.len() as f64;
            participants
                .iter()
                .map(|participant| Split {
                    participant_id: participant.clone(),
                    amount: share,
                    percentage: None,
                })
                .collect()
        }
        SplitPolicy::Percentage => participants
            .iter()
            .map(|participant| {
                let percentage = input_for(inputs, participant);
                Split {
                    participant_id: participant.clone(),
                    amount: total * (percentage / 100.0),
                    percentage: Some(percentage),
                }
            })
            .collect(),
        SplitPolicy::Exact => participants
            .iter()
            .map(|participant| Split {
                participant_id: participant.clone(),
                amount: input_for(inputs, participant),
                percentage: None,
            })
            .collect(),
    }
}

pub fn split(
    total: f64,
    participants: &[MemberId],
    policy: SplitPolicy,
    inputs: &HashMap<MemberId, f64>,
) -> Result<Vec<Split>, LedgerError> {
    check(total, participants, policy, inputs)?;
    Ok(compute(total, participants, policy, inputs))
}

fn input_for(inputs: &HashMap<MemberId, f64>, participant: &str) -> f64 {
    inputs.get(participant).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<MemberId> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn inputs(pairs: &[(&str, f64)]) -> HashMap<MemberId, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn amounts(splits: &[Split]) -> Vec<f64> {
        splits.iter().map(|s| s.amount).collect()
    }

    #[test]
    fn equal_split_divides_evenly() {
        let splits = split(50.0, &ids(&["A", "B"]), SplitPolicy::Equal, &HashMap::new()).unwrap();
        assert_eq!(splits[0].participant_id, "A");
        assert_eq!(splits[1].participant_id, "B");
        assert_eq!(amounts(&splits), vec![25.0, 25.0]);
    }

    #[test]
    fn equal_split_of_thirds_sums_within_tolerance() {
        let splits = split(10.0, &ids(&["A", "B", "C"]), SplitPolicy::Equal, &HashMap::new()).unwrap();
        let total: f64 = amounts(&splits).iter().sum();
        assert!((total - 10.0).abs() <= TOLERANCE);
    }

    #[test]
    fn percentage_split_records_the_percentage() {
        let splits = split(
            200.0,
            &ids(&["A", "B"]),
            SplitPolicy::Percentage,
            &inputs(&[("A", 25.0), ("B", 75.0)]),
        )
        .unwrap();
        assert_eq!(amounts(&splits), vec![50.0, 150.0]);
        assert_eq!(splits[0].percentage, Some(25.0));
    }

    #[test]
    fn percentage_over_one_hundred_is_invalid() {
        let participants = ids(&["A", "B"]);
        let inputs = inputs(&[("A", 40.0), ("B", 70.0)]);
        assert!(!validate(100.0, &participants, SplitPolicy::Percentage, &inputs));
        assert_eq!(
            split(100.0, &participants, SplitPolicy::Percentage, &inputs).unwrap_err(),
            LedgerError::InvalidSplit {
                policy: SplitPolicy::Percentage,
                expected: 100.0,
                actual: 110.0,
            }
        );
    }

    #[test]
    fn percentage_within_tolerance_is_valid() {
        let inputs = inputs(&[("A", 33.33), ("B", 33.33), ("C", 33.34)]);
        assert!(validate(90.0, &ids(&["A", "B", "C"]), SplitPolicy::Percentage, &inputs));
    }

    #[test]
    fn exact_split_must_match_total() {
        let participants = ids(&["A", "B", "C"]);
        let good = inputs(&[("A", 30.0), ("B", 30.0), ("C", 30.0)]);
        let bad = inputs(&[("A", 30.0), ("B", 30.0), ("C", 29.0)]);
        assert!(validate(90.0, &participants, SplitPolicy::Exact, &good));
        assert!(!validate(90.0, &participants, SplitPolicy::Exact, &bad));
    }

    #[test]
    fn negative_shares_are_refused_even_when_the_total_matches() {
        let participants = ids(&["A", "B"]);
        let exact = inputs(&[("A", 100.0), ("B", -10.0)]);
        assert_eq!(
            check(90.0, &participants, SplitPolicy::Exact, &exact),
            Err(LedgerError::NegativeShare {
                participant: "B".to_string(),
                value: -10.0,
            })
        );
        let percentage = inputs(&[("A", 120.0), ("B", -20.0)]);
        assert!(!validate(50.0, &participants, SplitPolicy::Percentage, &percentage));
    }

    #[test]
    fn missing_inputs_count_as_zero() {
        let participants = ids(&["A", "B"]);
        let inputs = inputs(&[("A", 90.0)]);
        let splits = compute(90.0, &participants, SplitPolicy::Exact, &inputs);
        assert_eq!(amounts(&splits), vec![90.0, 0.0]);
        assert!(validate(90.0, &participants, SplitPolicy::Exact, &inputs));
    }

    #[test]
    fn compute_previews_invalid_input() {
        let inputs = inputs(&[("A", 10.0)]);
        let splits = compute(100.0, &ids(&["A"]), SplitPolicy::Percentage, &inputs);
        assert_eq!(amounts(&splits), vec![10.0]);
        assert!(compute(100.0, &[], SplitPolicy::Equal, &HashMap::new()).is_empty());
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let participants = ids(&["A"]);
        for amount in [0.0, -5.0, f64::NAN] {
            assert!(matches!(
                check(amount, &participants, SplitPolicy::Equal, &HashMap::new()),
                Err(LedgerError::NonPositiveAmount(_))
            ));
        }
    }

    #[test]
    fn rejects_empty_and_duplicate_participants() {
        assert_eq!(
            check(10.0, &[], SplitPolicy::Equal, &HashMap::new()),
            Err(LedgerError::EmptyParticipants)
        );
        assert_eq!(
            check(10.0, &ids(&["A", "A"]), SplitPolicy::Equal, &HashMap::new()),
            Err(LedgerError::DuplicateParticipant("A".to_string()))
        );
    }
}
