use std::collections::HashMap;

use log::debug;
use serde::{Serialize, Serializer};

use crate::error::LedgerError;
use crate::schemas::{Expense, Group, Member, MemberId};
use crate::settlement::Settlement;

/// Net position of a member: positive is owed money, negative owes money.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Balance {
    pub member_id: MemberId,
    pub amount: f64,
}

/// Balance of every member of a group, in member order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Balances {
    entries: Vec<Balance>,
    index: HashMap<MemberId, usize>,
}

impl Balances {
    /// Every member at zero.
    pub fn zeroed<'a>(members: impl IntoIterator<Item = &'a Member>) -> Self {
        let mut balances = Balances::default();
        for member in members {
            balances.insert(member.id.clone(), 0.0);
        }
        balances
    }

    /// Adds a member with the given amount, overwriting an existing entry.
    pub fn insert(&mut self, member_id: MemberId, amount: f64) {
        match self.index.get(&member_id) {
            Some(&slot) => self.entries[slot].amount = amount,
            None => {
                self.index.insert(member_id.clone(), self.entries.len());
                self.entries.push(Balance { member_id, amount });
            }
        }
    }

    pub fn get(&self, member_id: &str) -> Option<f64> {
        self.index.get(member_id).map(|&slot| self.entries[slot].amount)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Balance> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum over all members; zero up to float error for a consistent group.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|b| b.amount).sum()
    }

    pub fn credit(&mut self, member_id: &str, amount: f64) -> Result<(), LedgerError> {
        *self.slot_mut(member_id)? += amount;
        Ok(())
    }

    pub fn debit(&mut self, member_id: &str, amount: f64) -> Result<(), LedgerError> {
        *self.slot_mut(member_id)? -= amount;
        Ok(())
    }

    /// Records a settlement as paid: the payer's debt shrinks and so does what
    /// the receiver is owed.
    pub fn apply(&mut self, settlement: &Settlement) -> Result<(), LedgerError> {
        self.credit(&settlement.from, settlement.amount)?;
        self.debit(&settlement.to, settlement.amount)
    }

    fn slot_mut(&mut self, member_id: &str) -> Result<&mut f64, LedgerError> {
        match self.index.get(member_id) {
            Some(&slot) => Ok(&mut self.entries[slot].amount),
            None => Err(LedgerError::DanglingReference(member_id.to_string())),
        }
    }
}

impl<'a> IntoIterator for &'a Balances {
    type Item = &'a Balance;
    type IntoIter = std::slice::Iter<'a, Balance>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for Balances {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.entries)
    }
}

/// Folds expenses into member balances: the payer is credited the full
/// amount and every participant is debited their split.
///
/// Members without expenses keep a zero balance. An expense pointing at
/// someone outside `members` fails the whole computation.
pub fn compute_balance_from_expenses<'a>(
    members: &[Member],
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Result<Balances, LedgerError> {
    let mut balances = Balances::zeroed(members);
    let mut count = 0;
    for expense in expenses {
        balances.credit(&expense.paid_by, expense.amount)?;
        for split in &expense.splits {
            balances.debit(&split.participant_id, split.amount)?;
        }
        count += 1;
    }
    debug!("folded {} expenses into {} balances", count, balances.len());
    Ok(balances)
}

pub fn compute_balance_from_group(group: &Group) -> Result<Balances, LedgerError> {
    compute_balance_from_expenses(group.members(), group.expenses())
}
