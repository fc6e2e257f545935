//! The per-group ledger: members, expenses, the current meal submission and
//! the archive of closed periods.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, Period, Settlement};

/// One independent fund with its own members and settlement cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub members: BTreeMap<String, Member>,
    /// Recording order is preserved.
    #[serde(default)]
    pub expenses: Vec<Expense>,
    /// Only meaningful while `period` matches `current_period`.
    #[serde(default)]
    pub meals: Option<MealSubmission>,
    pub current_period: Period,
    #[serde(default)]
    pub carry_forward: Amount,
    #[serde(default)]
    pub archived_settlements: Vec<ArchivedSettlement>,
}

impl Group {
    /// A fresh group accumulating for `period`.
    pub fn new(id: &str, created_at: DateTime<Utc>, period: Period) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            created_at,
            members: BTreeMap::new(),
            expenses: Vec::new(),
            meals: None,
            current_period: period,
            carry_forward: Amount::ZERO,
            archived_settlements: Vec::new(),
        }
    }

    /// Expenses counting toward the current period.
    pub fn current_expenses(&self) -> impl Iterator<Item = &Expense> {
        self.expenses
            .iter()
            .filter(move |expense| expense.period == self.current_period)
    }

    /// The meal submission of the current period, if there is one.
    pub fn current_meals(&self) -> Option<&MealSubmission> {
        self.meals
            .as_ref()
            .filter(|submission| submission.period == self.current_period)
    }

    pub fn meal_data_submitted(&self) -> bool {
        self.current_meals().is_some()
    }

    /// Display name for a member id: registry first, then `fallback` (usually
    /// the name recorded on an expense), then a synthesized label.
    pub fn display_name(&self, member_id: &str, fallback: Option<&str>) -> String {
        if let Some(member) = self.members.get(member_id) {
            return member.display_name.clone();
        }
        match fallback {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("Member {member_id}"),
        }
    }
}

/// A registered participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub handle: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// A single purchase paid by one member on behalf of the group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub amount: Amount,
    #[serde(default)]
    pub description: String,
    pub recorded_by: String,
    /// Not required to be a registered member.
    pub recorded_by_member_id: String,
    pub recorded_at: DateTime<Utc>,
    pub period: Period,
}

/// The complete meal count snapshot of one period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MealSubmission {
    pub period: Period,
    pub counts: BTreeMap<String, u32>,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
}

impl MealSubmission {
    pub fn total_meals(&self) -> u64 {
        self.counts.values().map(|&count| u64::from(count)).sum()
    }
}

/// A closed period's settlement, frozen at archive time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchivedSettlement {
    pub archived_at: DateTime<Utc>,
    pub settlement: Settlement,
}
