//! Read-only projections over the current period.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{Amount, Expense, Group, settlement};

/// Per-member view of the current period. Always available, unlike a
/// [`Settlement`](crate::Settlement).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberSummary {
    pub member_id: String,
    pub name: String,
    pub handle: Option<String>,
    pub spent: Amount,
    pub expense_count: usize,
    pub expenses: Vec<Expense>,
    pub meals: u32,
    /// Zero while no cost per meal can be computed.
    pub owes: Amount,
    pub balance: Amount,
}

/// Spending and consumption of one member in the current period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MemberStats {
    pub spent: Amount,
    pub expense_count: usize,
    pub meals: u32,
}

/// One summary per member id that is registered, has spent, or has a meal
/// count, ordered by id.
pub(crate) fn member_wise(group: &Group) -> Vec<MemberSummary> {
    let cost_per_meal = settlement::totals(group)
        .map(|totals| totals.cost_per_meal)
        .unwrap_or(Amount::ZERO);
    let counts = group.current_meals().map(|submission| &submission.counts);

    let mut ids: BTreeSet<&str> = group.members.keys().map(String::as_str).collect();
    ids.extend(
        group
            .current_expenses()
            .map(|expense| expense.recorded_by_member_id.as_str()),
    );
    if let Some(counts) = counts {
        ids.extend(counts.keys().map(String::as_str));
    }

    ids.into_iter()
        .map(|member_id| {
            let expenses: Vec<Expense> = group
                .current_expenses()
                .filter(|expense| expense.recorded_by_member_id == member_id)
                .cloned()
                .collect();
            let spent: Amount = expenses.iter().map(|e| e.amount).sum();
            let meals = counts
                .and_then(|counts| counts.get(member_id))
                .copied()
                .unwrap_or(0);
            let owes = cost_per_meal * u64::from(meals);
            let recorded_name = expenses.first().map(|e| e.recorded_by.as_str());
            MemberSummary {
                member_id: member_id.to_string(),
                name: group.display_name(member_id, recorded_name),
                handle: group
                    .members
                    .get(member_id)
                    .and_then(|member| member.handle.clone()),
                spent,
                expense_count: expenses.len(),
                expenses,
                meals,
                owes,
                balance: spent - owes,
            }
        })
        .collect()
}

pub(crate) fn member_stats(group: &Group, member_id: &str) -> MemberStats {
    let (spent, expense_count) = group
        .current_expenses()
        .filter(|expense| expense.recorded_by_member_id == member_id)
        .fold((Amount::ZERO, 0), |(spent, count), expense| {
            (spent + expense.amount, count + 1)
        });
    let meals = group
        .current_meals()
        .and_then(|submission| submission.counts.get(member_id))
        .copied()
        .unwrap_or(0);
    MemberStats {
        spent,
        expense_count,
        meals,
    }
}
