//! Per-meal cost allocation for a group's current period.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Amount, Group, Period, Unsettled};

/// The computed breakdown of who is owed and who owes for one period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub period: Period,
    pub carry_forward_in: Amount,
    pub total_expenses: Amount,
    pub total_with_carry: Amount,
    pub total_meals: u64,
    pub cost_per_meal: Amount,
    /// No particular order; see [`Settlement::by_balance`].
    pub lines: Vec<SettlementLine>,
    /// Becomes the next period's carry-forward.
    pub remainder: Amount,
}

impl Settlement {
    /// Lines with the largest credit first ("who gets paid first").
    pub fn by_balance(&self) -> Vec<&SettlementLine> {
        let mut lines: Vec<_> = self.lines.iter().collect();
        lines.sort_by(|a, b| b.balance.value().total_cmp(&a.balance.value()));
        lines
    }

    pub fn line(&self, member_id: &str) -> Option<&SettlementLine> {
        self.lines.iter().find(|line| line.member_id == member_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementLine {
    pub member_id: String,
    pub name: String,
    pub spent: Amount,
    pub meals: u32,
    pub owes: Amount,
    /// `spent - owes`.
    pub balance: Amount,
}

impl SettlementLine {
    pub fn standing(&self) -> Standing {
        if self.balance.is_positive() {
            Standing::GetsBack
        } else if self.balance.is_negative() {
            Standing::Pays
        } else {
            Standing::Settled
        }
    }
}

/// Direction of a member's balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Standing {
    /// The group owes the member.
    GetsBack,
    /// The member owes the group.
    Pays,
    Settled,
}

/// Amount spent per member id, with the first name seen on their expenses.
pub(crate) fn spent_by_member(group: &Group) -> BTreeMap<&str, (Amount, &str)> {
    let mut spent: BTreeMap<&str, (Amount, &str)> = BTreeMap::new();
    for expense in group.current_expenses() {
        let entry = spent
            .entry(expense.recorded_by_member_id.as_str())
            .or_insert((Amount::ZERO, expense.recorded_by.as_str()));
        entry.0 += expense.amount;
    }
    spent
}

/// Period totals feeding the allocation.
pub(crate) struct Totals {
    pub(crate) total_expenses: Amount,
    pub(crate) total_meals: u64,
    pub(crate) cost_per_meal: Amount,
}

/// Totals for the current period, when it has both expenses and a non-zero
/// meal count.
pub(crate) fn totals(group: &Group) -> Result<Totals, Unsettled> {
    if group.current_expenses().next().is_none() {
        return Err(Unsettled::InsufficientData);
    }
    let meals = group
        .current_meals()
        .filter(|submission| !submission.counts.is_empty())
        .ok_or(Unsettled::InsufficientData)?;
    let total_meals = meals.total_meals();
    if total_meals == 0 {
        return Err(Unsettled::NoMeals);
    }
    let total_expenses: Amount = group.current_expenses().map(|e| e.amount).sum();
    Ok(Totals {
        total_expenses,
        total_meals,
        cost_per_meal: (total_expenses + group.carry_forward) / total_meals,
    })
}

/// Computes the settlement of the group's current period.
///
/// Does not touch the group. Fails with [`Unsettled::InsufficientData`] when
/// the period lacks expenses or meal counts and with [`Unsettled::NoMeals`]
/// when the counts add up to zero.
pub fn compute(group: &Group) -> Result<Settlement, Unsettled> {
    let Totals {
        total_expenses,
        total_meals,
        cost_per_meal,
    } = totals(group)?;
    let counts = group
        .current_meals()
        .map(|submission| &submission.counts)
        .ok_or(Unsettled::InsufficientData)?;
    let total_with_carry = total_expenses + group.carry_forward;
    let spent = spent_by_member(group);

    let mut lines = Vec::with_capacity(counts.len() + spent.len());
    for (member_id, &meals) in counts {
        let (member_spent, recorded_name) = spent
            .get(member_id.as_str())
            .map_or((Amount::ZERO, None), |&(amount, name)| (amount, Some(name)));
        let owes = cost_per_meal * u64::from(meals);
        lines.push(SettlementLine {
            member_id: member_id.clone(),
            name: group.display_name(member_id, recorded_name),
            spent: member_spent,
            meals,
            owes,
            balance: member_spent - owes,
        });
    }

    // Spent money but ate nothing this period: owed back in full.
    for (&member_id, &(member_spent, recorded_name)) in &spent {
        if counts.contains_key(member_id) {
            continue;
        }
        lines.push(SettlementLine {
            member_id: member_id.to_string(),
            name: group.display_name(member_id, Some(recorded_name)),
            spent: member_spent,
            meals: 0,
            owes: Amount::ZERO,
            balance: member_spent,
        });
    }

    Ok(Settlement {
        period: group.current_period,
        carry_forward_in: group.carry_forward,
        total_expenses,
        total_with_carry,
        total_meals,
        cost_per_meal,
        lines,
        remainder: total_expenses - cost_per_meal * total_meals,
    })
}
