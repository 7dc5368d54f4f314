//! Property tests for the ledger invariants.
//!
//! Generated amounts are whole cents, the way they are entered, so balances
//! carry the usual binary floating point noise around cent values.

use std::collections::HashMap;

use proptest::prelude::*;
use proptest::sample::subsequence;

use splitledger::split::TOLERANCE;
use splitledger::{
    compute_balance_from_group, filter_expenses, optimize_settlements, Balances, Category,
    ExpenseDraft, ExpenseFilter, Group, NewMember, SplitPolicy,
};

#[derive(Debug, Clone)]
struct ExpenseSpec {
    cents: u32,
    payer: usize,
    participants: Vec<usize>,
    policy: SplitPolicy,
    weights: Vec<u32>,
    category: usize,
}

fn policy() -> impl Strategy<Value = SplitPolicy> {
    prop_oneof![
        Just(SplitPolicy::Equal),
        Just(SplitPolicy::Percentage),
        Just(SplitPolicy::Exact),
    ]
}

fn expense_spec(members: usize) -> impl Strategy<Value = ExpenseSpec> {
    (
        1u32..50_000,
        0..members,
        subsequence((0..members).collect::<Vec<_>>(), 1..=members),
        policy(),
        prop::collection::vec(1u32..100, members),
        0..Category::ALL.len(),
    )
        .prop_map(
            |(cents, payer, participants, policy, weights, category)| ExpenseSpec {
                cents,
                payer,
                participants,
                policy,
                weights,
                category,
            },
        )
}

/// Shares of `total` proportional to `weights`, summing to `total`.
fn distribute(total: u32, weights: &[u32]) -> Vec<u32> {
    let sum: u32 = weights.iter().sum();
    let mut shares: Vec<u32> = weights.iter().map(|w| total * w / sum).collect();
    let assigned: u32 = shares.iter().sum();
    if let Some(last) = shares.last_mut() {
        *last += total - assigned;
    }
    shares
}

fn build_group(members: usize, specs: &[ExpenseSpec]) -> Group {
    let mut group = Group::new("generated");
    let ids: Vec<String> = (0..members)
        .map(|n| {
            group
                .add_member(NewMember {
                    name: format!("member {n}"),
                    ..NewMember::default()
                })
                .unwrap()
                .id
                .clone()
        })
        .collect();

    for (n, spec) in specs.iter().enumerate() {
        let participants: Vec<String> = spec.participants.iter().map(|&i| ids[i].clone()).collect();
        let weights: Vec<u32> = spec.participants.iter().map(|&i| spec.weights[i]).collect();

        let (amount, inputs): (f64, HashMap<String, f64>) = match spec.policy {
            SplitPolicy::Equal => (
                f64::from(spec.cents * participants.len() as u32) / 100.0,
                HashMap::new(),
            ),
            SplitPolicy::Exact => {
                let shares = distribute(spec.cents, &weights);
                (
                    f64::from(spec.cents) / 100.0,
                    participants
                        .iter()
                        .cloned()
                        .zip(shares.into_iter().map(|s| f64::from(s) / 100.0))
                        .collect(),
                )
            }
            SplitPolicy::Percentage => {
                let shares = distribute(spec.cents, &weights);
                let total = f64::from(spec.cents);
                (
                    total / 100.0,
                    participants
                        .iter()
                        .cloned()
                        .zip(shares.into_iter().map(|s| f64::from(s) / total * 100.0))
                        .collect(),
                )
            }
        };

        group
            .add_expense(ExpenseDraft {
                title: format!("expense {n}"),
                amount,
                paid_by: ids[spec.payer].clone(),
                participants,
                policy: spec.policy,
                inputs,
                category: Category::ALL[spec.category],
                date: None,
                notes: None,
            })
            .unwrap();
    }
    group
}

fn group() -> impl Strategy<Value = Group> {
    (2usize..8)
        .prop_flat_map(|members| {
            (
                Just(members),
                prop::collection::vec(expense_spec(members), 0..20),
            )
        })
        .prop_map(|(members, specs)| build_group(members, &specs))
}

/// Cent-valued balances that sum to zero.
fn balances() -> impl Strategy<Value = Balances> {
    prop::collection::vec(-50_000i32..50_000, 1..10).prop_map(|cents| {
        let mut balances = Balances::default();
        let mut sum = 0;
        for (n, c) in cents.iter().enumerate() {
            balances.insert(format!("m{n:02}"), f64::from(*c) / 100.0);
            sum += c;
        }
        balances.insert(format!("m{:02}", cents.len()), f64::from(-sum) / 100.0);
        balances
    })
}

fn reversed(balances: &Balances) -> Balances {
    let mut out = Balances::default();
    for b in balances.iter().rev() {
        out.insert(b.member_id.clone(), b.amount);
    }
    out
}

proptest! {
    #[test]
    fn splits_add_up_to_the_amount(group in group()) {
        for expense in group.expenses() {
            let total: f64 = expense.splits.iter().map(|s| s.amount).sum();
            prop_assert!((total - expense.amount).abs() <= TOLERANCE);
        }
    }

    #[test]
    fn balances_are_conserved(group in group()) {
        let balances = compute_balance_from_group(&group).unwrap();
        prop_assert_eq!(balances.len(), group.members().len());
        prop_assert!(balances.total().abs() < 1e-6);
    }

    #[test]
    fn aggregation_is_idempotent(group in group()) {
        let first = compute_balance_from_group(&group).unwrap();
        let second = compute_balance_from_group(&group).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn settlements_clear_group_balances(group in group()) {
        let balances = compute_balance_from_group(&group).unwrap();
        let mut applied = balances.clone();
        for settlement in optimize_settlements(&balances) {
            prop_assert!(settlement.amount >= TOLERANCE);
            applied.apply(&settlement).unwrap();
        }
        for b in applied.iter() {
            prop_assert!(b.amount.abs() <= TOLERANCE, "{} left at {}", b.member_id, b.amount);
        }
    }

    #[test]
    fn settlements_are_few_and_correct(balances in balances()) {
        let settlements = optimize_settlements(&balances);
        if balances.iter().any(|b| b.amount != 0.0) {
            prop_assert!(settlements.len() < balances.len());
        } else {
            prop_assert!(settlements.is_empty());
        }

        let mut applied = balances.clone();
        for settlement in &settlements {
            prop_assert!(settlement.amount >= TOLERANCE);
            applied.apply(settlement).unwrap();
        }
        prop_assert!(applied.iter().all(|b| b.amount.abs() <= TOLERANCE));
    }

    #[test]
    fn settlements_do_not_depend_on_member_order(balances in balances()) {
        prop_assert_eq!(
            optimize_settlements(&balances),
            optimize_settlements(&reversed(&balances))
        );
    }

    #[test]
    fn filters_compose(
        group in group(),
        category in 0..Category::ALL.len(),
        member in 0usize..8,
    ) {
        let by_category = ExpenseFilter {
            category: Some(Category::ALL[category]),
            ..ExpenseFilter::default()
        };
        let by_member = ExpenseFilter {
            member_id: group.members().get(member).map(|m| m.id.clone()),
            ..ExpenseFilter::default()
        };

        let stepwise: Vec<String> = filter_expenses(
            filter_expenses(group.expenses(), &by_category),
            &by_member,
        )
        .into_iter()
        .map(|e| e.id.clone())
        .collect();
        let combined: Vec<String> = filter_expenses(group.expenses(), &by_category.merge(&by_member))
            .into_iter()
            .map(|e| e.id.clone())
            .collect();
        prop_assert_eq!(stepwise, combined);
    }
}
