//! Spending summaries over a (possibly filtered) set of expenses.
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::LedgerError;
use crate::schemas::{Category, Expense, Member, MemberId};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: f64,
    /// Share of all spending, 0 to 100.
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberSummary {
    pub member_id: MemberId,
    pub name: String,
    pub paid: f64,
    pub owes: f64,
    pub net: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub amount: f64,
    pub cumulative: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub expense_count: usize,
    pub total: f64,
    pub categories: Vec<CategoryTotal>,
    pub members: Vec<MemberSummary>,
    pub timeline: Vec<TimelinePoint>,
}

impl Report {
    pub fn build(members: &[Member], expenses: &[&Expense]) -> Result<Self, LedgerError> {
        Ok(Report {
            expense_count: expenses.len(),
            total: expenses.iter().map(|e| e.amount).sum(),
            categories: category_totals(expenses.iter().copied()),
            members: member_summaries(members, expenses.iter().copied())?,
            timeline: timeline(expenses.iter().copied()),
        })
    }
}

/// Totals for the categories that have any spending, in [`Category`] order.
pub fn category_totals<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<Category, f64> = BTreeMap::new();
    for expense in expenses {
        *totals.entry(expense.category).or_insert(0.0) += expense.amount;
    }
    let grand_total: f64 = totals.values().sum();

    totals
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            category,
            total,
            percentage: if grand_total > 0.0 {
                total * 100.0 / grand_total
            } else {
                0.0
            },
        })
        .collect()
}

pub fn member_summaries<'a>(
    members: &[Member],
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Result<Vec<MemberSummary>, LedgerError> {
    let mut sums: HashMap<&str, (f64, f64)> =
        members.iter().map(|m| (m.id.as_str(), (0.0, 0.0))).collect();

    for expense in expenses {
        sums.get_mut(expense.paid_by.as_str())
            .ok_or_else(|| LedgerError::DanglingReference(expense.paid_by.clone()))?
            .0 += expense.amount;
        for split in &expense.splits {
            sums.get_mut(split.participant_id.as_str())
                .ok_or_else(|| LedgerError::DanglingReference(split.participant_id.clone()))?
                .1 += split.amount;
        }
    }

    Ok(members
        .iter()
        .map(|member| {
            let (paid, owes) = sums.get(member.id.as_str()).copied().unwrap_or_default();
            MemberSummary {
                member_id: member.id.clone(),
                name: member.name.clone(),
                paid,
                owes,
                net: paid - owes,
            }
        })
        .collect())
}

/// Spending per day, oldest first, with a running total.
pub fn timeline<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Vec<TimelinePoint> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for expense in expenses {
        *days.entry(expense.date).or_insert(0.0) += expense.amount;
    }

    let mut cumulative = 0.0;
    days.into_iter()
        .map(|(date, amount)| {
            cumulative += amount;
            TimelinePoint {
                date,
                amount,
                cumulative,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{Split, SplitPolicy};

    fn member(id: &str) -> Member {
        Member {
            id: id.to_string(),
            name: format!("{id} name"),
            nickname: None,
            email: None,
            phone: None,
            avatar: None,
            notes: None,
        }
    }

    fn expense(amount: f64, category: Category, day: u32, paid_by: &str, with: &[&str]) -> Expense {
        Expense {
            id: format!("{day}-{amount}"),
            title: "x".to_string(),
            amount,
            paid_by: paid_by.to_string(),
            splits: with
                .iter()
                .map(|p| Split {
                    participant_id: p.to_string(),
                    amount: amount / with.len() as f64,
                    percentage: None,
                })
                .collect(),
            policy: SplitPolicy::Equal,
            category,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            notes: None,
        }
    }

    #[test]
    fn categories_with_shares() {
        let expenses = [
            expense(30.0, Category::Travel, 1, "A", &["A"]),
            expense(10.0, Category::FoodAndDrinks, 1, "A", &["A"]),
            expense(60.0, Category::Travel, 2, "A", &["A"]),
        ];
        let totals = category_totals(&expenses);
        assert_eq!(
            totals,
            vec![
                CategoryTotal {
                    category: Category::FoodAndDrinks,
                    total: 10.0,
                    percentage: 10.0,
                },
                CategoryTotal {
                    category: Category::Travel,
                    total: 90.0,
                    percentage: 90.0,
                },
            ]
        );
    }

    #[test]
    fn member_paid_and_owed() {
        let members = [member("A"), member("B"), member("C")];
        let expenses = [expense(50.0, Category::Other, 1, "A", &["A", "B"])];
        let summaries = member_summaries(&members, &expenses).unwrap();

        assert_eq!(summaries[0].paid, 50.0);
        assert_eq!(summaries[0].owes, 25.0);
        assert_eq!(summaries[0].net, 25.0);
        assert_eq!(summaries[1].net, -25.0);
        assert_eq!(summaries[2].name, "C name");
        assert_eq!(summaries[2].net, 0.0);
    }

    #[test]
    fn member_summaries_reject_unknown_members() {
        let expenses = [expense(50.0, Category::Other, 1, "A", &["ghost"])];
        assert_eq!(
            member_summaries(&[member("A")], &expenses),
            Err(LedgerError::DanglingReference("ghost".to_string()))
        );
    }

    #[test]
    fn timeline_accumulates_by_day() {
        let expenses = [
            expense(5.0, Category::Other, 3, "A", &["A"]),
            expense(10.0, Category::Other, 1, "A", &["A"]),
            expense(2.5, Category::Other, 3, "A", &["A"]),
        ];
        let points = timeline(&expenses);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(points[0].cumulative, 10.0);
        assert_eq!(points[1].amount, 7.5);
        assert_eq!(points[1].cumulative, 17.5);
    }

    #[test]
    fn empty_report() {
        let report = Report::build(&[member("A")], &[]).unwrap();
        assert_eq!(report.expense_count, 0);
        assert_eq!(report.total, 0.0);
        assert!(report.categories.is_empty());
        assert!(report.timeline.is_empty());
        assert_eq!(report.members.len(), 1);
    }
}
