use serde::{Deserialize, Serialize};

use crate::schemas::{Category, Expense, MemberId};

/// Narrows an expense list. Every field left empty places no constraint.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ExpenseFilter {
    /// Case-insensitive substring of the title.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    /// Matches expenses the member paid for or takes part in.
    #[serde(default)]
    pub member_id: Option<MemberId>,
}

impl ExpenseFilter {
    pub fn is_empty(&self) -> bool {
        self.search().is_none() && self.category.is_none() && self.member_id().is_none()
    }

    pub fn matches(&self, expense: &Expense) -> bool {
        if let Some(search) = self.search() {
            if !expense.title.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = self.category {
            if expense.category != category {
                return false;
            }
        }
        if let Some(member_id) = self.member_id() {
            if !expense.involves(member_id) {
                return false;
            }
        }
        true
    }

    /// Fields set in `overrides` replace the ones in `self`.
    pub fn merge(&self, overrides: &ExpenseFilter) -> ExpenseFilter {
        ExpenseFilter {
            search: overrides.search.clone().or_else(|| self.search.clone()),
            category: overrides.category.or(self.category),
            member_id: overrides.member_id.clone().or_else(|| self.member_id.clone()),
        }
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    fn member_id(&self) -> Option<&str> {
        self.member_id.as_deref().filter(|m| !m.is_empty())
    }
}

/// Expenses matching `filter`, in their original order.
pub fn filter_expenses<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    filter: &ExpenseFilter,
) -> Vec<&'a Expense> {
    expenses.into_iter().filter(|e| filter.matches(e)).collect()
}
