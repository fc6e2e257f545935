use std::collections::BTreeMap;

use crate::{EngineError, Member, ResultEngine};

use super::Engine;

impl Engine {
    /// Registers a member, creating the group if needed.
    ///
    /// An id that is already registered is left untouched and reported as
    /// [`EngineError::AlreadyRegistered`].
    pub async fn register_member(
        &mut self,
        group_id: &str,
        member_id: &str,
        display_name: &str,
        handle: Option<&str>,
    ) -> ResultEngine<Member> {
        let now = self.clock.now();
        let group = self.group_mut(group_id);
        if group.members.contains_key(member_id) {
            return Err(EngineError::AlreadyRegistered(member_id.to_string()));
        }

        let member = Member {
            id: member_id.to_string(),
            display_name: display_name.trim().to_string(),
            handle: handle
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(ToString::to_string),
            joined_at: now,
        };
        group.members.insert(member_id.to_string(), member.clone());
        self.persist().await?;

        tracing::debug!("group {group_id}: registered member {member_id}");
        Ok(member)
    }

    /// Looks a member up in the registry. Never synthesizes a placeholder.
    pub fn member(&self, group_id: &str, member_id: &str) -> Option<Member> {
        self.groups
            .get(group_id)
            .and_then(|group| group.members.get(member_id))
            .cloned()
    }

    pub fn members(&self, group_id: &str) -> BTreeMap<String, Member> {
        self.groups
            .get(group_id)
            .map(|group| group.members.clone())
            .unwrap_or_default()
    }
}
