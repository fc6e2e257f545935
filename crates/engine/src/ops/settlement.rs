use crate::{
    ArchivedSettlement, Period, ResultEngine, Settlement, Unsettled, following_period, settlement,
};

use super::Engine;

/// What closing a period did.
#[derive(Clone, Debug, PartialEq)]
pub struct Rotation {
    pub closed: Period,
    pub opened: Period,
    /// The archived settlement, or why nothing was archived.
    pub outcome: Result<Settlement, Unsettled>,
}

impl Rotation {
    pub fn archived(&self) -> Option<&Settlement> {
        self.outcome.as_ref().ok()
    }
}

impl Engine {
    /// Settlement of the current period. Read-only.
    pub fn compute_settlement(&self, group_id: &str) -> ResultEngine<Settlement> {
        Ok(settlement::compute(&self.group_view(group_id))?)
    }

    /// Closes the current period and opens the next one.
    ///
    /// When a settlement can be computed it is archived and its remainder
    /// becomes the carry-forward; otherwise the carry-forward is kept. Either
    /// way the closed period's expenses and meal submission are dropped.
    ///
    /// Callers should report the settlement before rotating; the returned
    /// [`Rotation`] only confirms what was archived.
    pub async fn rotate_period(&mut self, group_id: &str) -> ResultEngine<Rotation> {
        let now = self.clock.now();
        let today = self.clock.today();
        let group = self.group_mut(group_id);

        let closed = group.current_period;
        let outcome = settlement::compute(group);
        if let Ok(settlement) = &outcome {
            group.archived_settlements.push(ArchivedSettlement {
                archived_at: now,
                settlement: settlement.clone(),
            });
            group.carry_forward = settlement.remainder;
        }

        group.expenses.retain(|expense| expense.period != closed);
        group.meals = None;
        group.current_period = following_period(closed, today);
        let opened = group.current_period;
        let carry_forward = group.carry_forward;

        self.persist().await?;

        match &outcome {
            Ok(_) => tracing::info!(
                "group {group_id}: archived {closed}, carrying {carry_forward} into {opened}"
            ),
            Err(reason) => tracing::info!(
                "group {group_id}: closed {closed} without settlement ({reason}), now {opened}"
            ),
        }
        Ok(Rotation {
            closed,
            opened,
            outcome,
        })
    }

    /// Settlements of closed periods, oldest first.
    pub fn archived_settlements(&self, group_id: &str) -> Vec<ArchivedSettlement> {
        self.groups
            .get(group_id)
            .map(|group| group.archived_settlements.clone())
            .unwrap_or_default()
    }
}
