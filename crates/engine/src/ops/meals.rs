use std::collections::BTreeMap;

use crate::{EngineError, MealSubmission, ResultEngine};

use super::Engine;

impl Engine {
    /// Stores `counts` as the complete meal snapshot of the current period.
    ///
    /// Replaces any earlier submission for the period: members missing from
    /// `counts` no longer have a meal count afterwards.
    pub async fn submit_meal_counts(
        &mut self,
        group_id: &str,
        counts: BTreeMap<String, u32>,
        submitted_by: &str,
    ) -> ResultEngine<MealSubmission> {
        let now = self.clock.now();
        let group = self.group_mut(group_id);
        if let Some(previous) = group.current_meals() {
            let dropped = previous
                .counts
                .keys()
                .filter(|id| !counts.contains_key(*id))
                .count();
            if dropped > 0 {
                tracing::warn!(
                    "group {group_id}: resubmission drops meal counts of {dropped} member(s)"
                );
            }
        }

        let submission = MealSubmission {
            period: group.current_period,
            counts,
            submitted_by: submitted_by.to_string(),
            submitted_at: now,
        };
        group.meals = Some(submission.clone());
        self.persist().await?;

        tracing::debug!(
            "group {group_id}: {} meals submitted for {}",
            submission.total_meals(),
            submission.period
        );
        Ok(submission)
    }

    /// Corrects one member's count inside the existing submission.
    pub async fn adjust_meal_count(
        &mut self,
        group_id: &str,
        member_id: &str,
        new_count: u32,
    ) -> ResultEngine<()> {
        let period = self.group_view(group_id).current_period;
        let submission = self
            .groups
            .get_mut(group_id)
            .and_then(|group| group.meals.as_mut())
            .filter(|submission| submission.period == period);
        let Some(submission) = submission else {
            return Err(EngineError::NoSubmissionYet(period.to_string()));
        };
        submission.counts.insert(member_id.to_string(), new_count);
        self.persist().await?;

        tracing::debug!("group {group_id}: meal count of {member_id} set to {new_count}");
        Ok(())
    }

    /// Meal counts of the current period, empty before any submission.
    pub fn current_period_meals(&self, group_id: &str) -> BTreeMap<String, u32> {
        self.group_view(group_id)
            .current_meals()
            .map(|submission| submission.counts.clone())
            .unwrap_or_default()
    }

    pub fn meal_data_submitted(&self, group_id: &str) -> bool {
        self.group_view(group_id).meal_data_submitted()
    }
}
