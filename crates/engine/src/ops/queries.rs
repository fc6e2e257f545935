use crate::{Group, MemberStats, MemberSummary, Period, summary};

use super::Engine;

impl Engine {
    /// Spending, meals and the provisional balance of everyone involved in
    /// the current period. Never fails; balances are zero while no cost per
    /// meal can be computed.
    ///
    /// Whenever a cost per meal exists it is applied as is: a negative
    /// carry-forward larger than the period's expenses gives a negative cost
    /// per meal and therefore negative `owes`.
    pub fn member_wise_summary(&self, group_id: &str) -> Vec<MemberSummary> {
        summary::member_wise(&self.group_view(group_id))
    }

    pub fn member_stats(&self, group_id: &str, member_id: &str) -> MemberStats {
        summary::member_stats(&self.group_view(group_id), member_id)
    }

    /// Ids of every known group.
    pub fn list_groups(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn current_period(&self, group_id: &str) -> Period {
        self.group_view(group_id).current_period
    }

    /// A copy of the whole group record.
    pub fn group_snapshot(&self, group_id: &str) -> Group {
        self.group_view(group_id).into_owned()
    }
}
