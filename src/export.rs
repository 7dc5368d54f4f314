use std::io::Write;

use serde::Serialize;

use crate::schemas::{Expense, Group};

#[derive(Debug, Serialize)]
struct ExpenseRow<'a> {
    #[serde(rename = "Group Name")]
    group: &'a str,
    #[serde(rename = "Expense Title")]
    title: &'a str,
    #[serde(rename = "Notes")]
    notes: &'a str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Paid By")]
    paid_by: &'a str,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Category")]
    category: &'static str,
    #[serde(rename = "Split Type")]
    policy: String,
    #[serde(rename = "Split Details")]
    details: String,
}

fn member_name<'a>(group: &'a Group, id: &str) -> &'a str {
    group.member(id).map(|m| m.name.as_str()).unwrap_or("Unknown")
}

fn row<'a>(group: &'a Group, expense: &'a Expense) -> ExpenseRow<'a> {
    let details = expense
        .splits
        .iter()
        .map(|s| format!("{}: {:.2}", member_name(group, &s.participant_id), s.amount))
        .collect::<Vec<_>>()
        .join("; ");

    ExpenseRow {
        group: group.name(),
        title: &expense.title,
        notes: expense.notes.as_deref().unwrap_or(""),
        amount: format!("{:.2}", expense.amount),
        paid_by: member_name(group, &expense.paid_by),
        date: expense.date.to_string(),
        category: expense.category.label(),
        policy: expense.policy.to_string(),
        details,
    }
}

/// Writes one CSV row per expense of every group, headers first.
pub fn write_csv<'a, W: Write>(
    groups: impl IntoIterator<Item = &'a Group>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut wrote_any = false;
    for group in groups {
        for expense in group.expenses() {
            wtr.serialize(row(group, expense))?;
            wrote_any = true;
        }
    }
    if !wrote_any {
        wtr.write_record(HEADERS)?;
    }
    wtr.flush()?;
    Ok(())
}

const HEADERS: [&str; 9] = [
    "Group Name",
    "Expense Title",
    "Notes",
    "Amount",
    "Paid By",
    "Date",
    "Category",
    "Split Type",
    "Split Details",
];
