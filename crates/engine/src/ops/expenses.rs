use uuid::Uuid;

use crate::{Amount, Expense, ResultEngine};

use super::Engine;

impl Engine {
    /// Appends an expense to the group's current period.
    ///
    /// `amount` is expected to be positive already (see `Amount`'s parser).
    /// `recorded_by_member_id` does not need to be registered, which lets an
    /// admin record purchases on behalf of anyone.
    pub async fn record_expense(
        &mut self,
        group_id: &str,
        amount: Amount,
        description: &str,
        recorded_by_name: &str,
        recorded_by_member_id: &str,
    ) -> ResultEngine<Expense> {
        let now = self.clock.now();
        let group = self.group_mut(group_id);
        let expense = Expense {
            id: Uuid::new_v4(),
            amount,
            description: description.trim().to_string(),
            recorded_by: recorded_by_name.to_string(),
            recorded_by_member_id: recorded_by_member_id.to_string(),
            recorded_at: now,
            period: group.current_period,
        };
        group.expenses.push(expense.clone());
        self.persist().await?;

        tracing::debug!(
            "group {group_id}: recorded expense {} of {amount} for {}",
            expense.id,
            expense.period
        );
        Ok(expense)
    }

    /// Expenses tagged with the group's current period, in recording order.
    pub fn current_period_expenses(&self, group_id: &str) -> Vec<Expense> {
        self.group_view(group_id)
            .current_expenses()
            .cloned()
            .collect()
    }
}
