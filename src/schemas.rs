use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::split::{self, TOLERANCE};

pub type MemberId = String;
pub type ExpenseId = String;
pub type GroupId = String;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// How an expense amount is divided between its participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    Equal,
    Percentage,
    Exact,
}

impl fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SplitPolicy::Equal => "equal",
            SplitPolicy::Percentage => "percentage",
            SplitPolicy::Exact => "exact",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Category {
    #[serde(rename = "Food & Drinks")]
    FoodAndDrinks,
    Transportation,
    Accommodation,
    Groceries,
    Shopping,
    Entertainment,
    #[serde(rename = "Bills & Utilities")]
    BillsAndUtilities,
    Health,
    Travel,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::FoodAndDrinks,
        Category::Transportation,
        Category::Accommodation,
        Category::Groceries,
        Category::Shopping,
        Category::Entertainment,
        Category::BillsAndUtilities,
        Category::Health,
        Category::Travel,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::FoodAndDrinks => "Food & Drinks",
            Category::Transportation => "Transportation",
            Category::Accommodation => "Accommodation",
            Category::Groceries => "Groceries",
            Category::Shopping => "Shopping",
            Category::Entertainment => "Entertainment",
            Category::BillsAndUtilities => "Bills & Utilities",
            Category::Health => "Health",
            Category::Travel => "Travel",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One participant's share of an expense.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Split {
    pub participant_id: MemberId,
    pub amount: f64,
    /// Only set by [`SplitPolicy::Percentage`], kept so the input can be
    /// shown again when the expense is edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub title: String,
    pub amount: f64,
    pub paid_by: MemberId,
    pub splits: Vec<Split>,
    pub policy: SplitPolicy,
    pub category: Category,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Expense {
    /// True when the member paid for the expense or takes part in its split.
    pub fn involves(&self, member_id: &str) -> bool {
        self.paid_by == member_id || self.splits.iter().any(|s| s.participant_id == member_id)
    }
}

/// User input for a new or edited expense, before the splits are computed.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExpenseDraft {
    pub title: String,
    pub amount: f64,
    pub paid_by: MemberId,
    pub participants: Vec<MemberId>,
    pub policy: SplitPolicy,
    /// Percent per participant for [`SplitPolicy::Percentage`], amount per
    /// participant for [`SplitPolicy::Exact`]. Ignored for equal splits.
    #[serde(default)]
    pub inputs: HashMap<MemberId, f64>,
    pub category: Category,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NewMember {
    pub name: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct GroupDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A group of members sharing expenses.
///
/// Members and expenses can only be changed through the methods below, which
/// keep every expense pointing at existing members.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    id: GroupId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    expenses: Vec<Expense>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Number of times the group has been stored.
    #[serde(default)]
    revision: u64,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name)
    }

    pub fn with_id(id: impl Into<GroupId>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Group {
            id: id.into(),
            name: name.into(),
            description: None,
            members: Vec::new(),
            expenses: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Marks the snapshot as the next stored version of the group.
    pub fn bump_revision(&mut self) {
        self.revision += 1;
    }

    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn expense(&self, id: &str) -> Option<&Expense> {
        self.expenses.iter().find(|e| e.id == id)
    }

    pub fn update_details(&mut self, details: GroupDetails) -> Result<(), LedgerError> {
        if let Some(name) = details.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(LedgerError::BlankName("group name"));
            }
            self.name = name.to_string();
        }
        if let Some(description) = details.description {
            let description = description.trim();
            self.description = (!description.is_empty()).then(|| description.to_string());
        }
        self.touch();
        Ok(())
    }

    /// Adds a member with a fresh id. Names are compared case-insensitively
    /// and a clash is refused.
    pub fn add_member(&mut self, member: NewMember) -> Result<&Member, LedgerError> {
        let name = member.name.trim();
        if name.is_empty() {
            return Err(LedgerError::BlankName("member name"));
        }
        let lowered = name.to_lowercase();
        if self
            .members
            .iter()
            .any(|m| m.name.trim().to_lowercase() == lowered)
        {
            return Err(LedgerError::DuplicateMemberName(name.to_string()));
        }

        let index = self.members.len();
        self.members.push(Member {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            nickname: member.nickname,
            email: member.email,
            phone: member.phone,
            avatar: member.avatar,
            notes: member.notes,
        });
        self.touch();
        Ok(&self.members[index])
    }

    /// Removes a member that no expense refers to.
    pub fn remove_member(&mut self, id: &str) -> Result<Member, LedgerError> {
        let position = self
            .members
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| LedgerError::MemberNotFound(id.to_string()))?;
        if self.expenses.iter().any(|e| e.involves(id)) {
            return Err(LedgerError::MemberInUse(id.to_string()));
        }
        let removed = self.members.remove(position);
        self.touch();
        Ok(removed)
    }

    pub fn add_expense(&mut self, draft: ExpenseDraft) -> Result<&Expense, LedgerError> {
        let expense = self.build_expense(Uuid::new_v4().to_string(), draft)?;
        let index = self.expenses.len();
        self.expenses.push(expense);
        self.touch();
        Ok(&self.expenses[index])
    }

    /// Replaces an expense, keeping its id and position.
    pub fn update_expense(
        &mut self,
        id: &str,
        draft: ExpenseDraft,
    ) -> Result<&Expense, LedgerError> {
        let position = self
            .expenses
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| LedgerError::ExpenseNotFound(id.to_string()))?;
        let expense = self.build_expense(id.to_string(), draft)?;
        self.expenses[position] = expense;
        self.touch();
        Ok(&self.expenses[position])
    }

    pub fn remove_expense(&mut self, id: &str) -> Result<Expense, LedgerError> {
        let position = self
            .expenses
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| LedgerError::ExpenseNotFound(id.to_string()))?;
        let removed = self.expenses.remove(position);
        self.touch();
        Ok(removed)
    }

    /// Checks a snapshot that did not go through the methods above, e.g. one
    /// read back from an import.
    pub fn check_integrity(&self) -> Result<(), LedgerError> {
        let mut ids = HashSet::with_capacity(self.members.len());
        for member in &self.members {
            if !ids.insert(member.id.as_str()) {
                return Err(LedgerError::DuplicateMember(member.id.clone()));
            }
        }

        for expense in &self.expenses {
            if !(expense.amount > 0.0) {
                return Err(LedgerError::NonPositiveAmount(expense.amount));
            }
            self.ensure_member(&expense.paid_by)?;
            if expense.splits.is_empty() {
                return Err(LedgerError::EmptyParticipants);
            }
            let mut participants = HashSet::with_capacity(expense.splits.len());
            for split in &expense.splits {
                self.ensure_member(&split.participant_id)?;
                if !participants.insert(split.participant_id.as_str()) {
                    return Err(LedgerError::DuplicateParticipant(split.participant_id.clone()));
                }
            }
            let total: f64 = expense.splits.iter().map(|s| s.amount).sum();
            if !total.is_finite() || (total - expense.amount).abs() > TOLERANCE {
                return Err(LedgerError::InvalidSplit {
                    policy: expense.policy,
                    expected: expense.amount,
                    actual: total,
                });
            }
        }
        Ok(())
    }

    fn build_expense(&self, id: ExpenseId, draft: ExpenseDraft) -> Result<Expense, LedgerError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(LedgerError::BlankName("expense title"));
        }
        self.ensure_member(&draft.paid_by)?;
        for participant in &draft.participants {
            self.ensure_member(participant)?;
        }
        let splits = split::split(
            draft.amount,
            &draft.participants,
            draft.policy,
            &draft.inputs,
        )?;

        Ok(Expense {
            id,
            title: title.to_string(),
            amount: draft.amount,
            paid_by: draft.paid_by,
            splits,
            policy: draft.policy,
            category: draft.category,
            date: draft.date.unwrap_or_else(|| Utc::now().date_naive()),
            notes: draft.notes.filter(|n| !n.trim().is_empty()),
        })
    }

    fn ensure_member(&self, id: &str) -> Result<(), LedgerError> {
        match self.member(id) {
            Some(_) => Ok(()),
            None => Err(LedgerError::DanglingReference(id.to_string())),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Envelope used to move every group in and out of the service as JSON.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AppData {
    pub groups: Vec<Group>,
    pub version: String,
}

impl AppData {
    pub fn new(groups: Vec<Group>) -> Self {
        AppData {
            groups,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
