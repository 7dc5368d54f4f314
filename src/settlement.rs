use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::balance::{compute_balance_from_group, Balances};
use crate::error::LedgerError;
use crate::schemas::{Group, MemberId};

/// `from` should pay `amount` to `to`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Settlement {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: f64,
}

#[derive(Clone, Debug)]
struct PersonalBalance<'a> {
    id: &'a str,
    cents: i64,
}

// Ascending by magnitude, ids descending, so `last()` is the largest balance
// and equal balances pop in id order.
fn sort_for_popping(people: &mut [PersonalBalance<'_>]) {
    people.sort_by(|a, b| a.cents.cmp(&b.cents).then_with(|| b.id.cmp(a.id)));
}

/// Balances rounded to whole cents, adjusted so they still sum to zero.
///
/// Plain rounding can leave the cents a few units off zero in total. That
/// remainder is taken from the members whose rounding moved them furthest in
/// the same direction, so no member ends up more than one cent away from its
/// real balance.
fn to_cents(balances: &Balances) -> Vec<PersonalBalance<'_>> {
    let mut people: Vec<(PersonalBalance<'_>, f64)> = balances
        .iter()
        .map(|entry| {
            let exact = entry.amount * 100.0;
            let cents = exact.round() as i64;
            let person = PersonalBalance {
                id: &entry.member_id,
                cents,
            };
            (person, cents as f64 - exact)
        })
        .collect();

    let remainder: i64 = people.iter().map(|(p, _)| p.cents).sum();
    if remainder != 0 {
        let step = remainder.signum();
        // Largest rounding error in the direction of the remainder first.
        people.sort_by(|(a, a_err), (b, b_err)| {
            (b_err * step as f64)
                .total_cmp(&(a_err * step as f64))
                .then_with(|| a.id.cmp(b.id))
        });
        let count = people.len();
        for n in 0..remainder.unsigned_abs() as usize {
            people[n % count].0.cents -= step;
        }
    }

    people.into_iter().map(|(person, _)| person).collect()
}

/// Reduces balances to a short list of payments.
///
/// Balances are worked in whole cents. Greedy matching: the largest debtor
/// pays the largest creditor the smaller of the two amounts, whichever side
/// is cleared leaves the queue, and the other one stays at the head with
/// what is left. Balances under half a cent are considered settled, every
/// payment is at least one cent, and applying all of them leaves each member
/// within [`TOLERANCE`](crate::split::TOLERANCE) of zero. The output never
/// has more than `members - 1` entries.
pub fn optimize_settlements(balances: &Balances) -> Vec<Settlement> {
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();
    for mut person in to_cents(balances) {
        match person.cents.cmp(&0) {
            Ordering::Less => {
                person.cents = -person.cents;
                debtors.push(person);
            }
            Ordering::Greater => creditors.push(person),
            Ordering::Equal => {}
        }
    }

    sort_for_popping(&mut debtors);
    sort_for_popping(&mut creditors);

    let mut settlements = Vec::new();
    while let (Some(debtor), Some(creditor)) = (debtors.last_mut(), creditors.last_mut()) {
        let cents = debtor.cents.min(creditor.cents);
        settlements.push(Settlement {
            from: debtor.id.to_string(),
            to: creditor.id.to_string(),
            amount: cents as f64 / 100.0,
        });

        debtor.cents -= cents;
        creditor.cents -= cents;
        if debtor.cents == 0 {
            debtors.pop();
        }
        if creditor.cents == 0 {
            creditors.pop();
        }
    }

    debug!(
        "{} balances reduced to {} settlements",
        balances.len(),
        settlements.len()
    );
    settlements
}

pub fn settlements_for_group(group: &Group) -> Result<Vec<Settlement>, LedgerError> {
    let balances = compute_balance_from_group(group)?;
    Ok(optimize_settlements(&balances))
}
