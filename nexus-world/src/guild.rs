//! Guild membership. Tags are unique case-insensitively;
//! display names are not. Leadership hands off to the next-oldest member on
//! the leader's departure, and an emptied guild is torn down rather than
//! left as a dangling record.

use std::collections::HashMap;

use nexus_core::ids::{AccountId, GuildId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuildError {
    #[error("guild tag already in use")]
    TagTaken,
    #[error("guild not found")]
    NotFound,
    #[error("account is already a member of this guild")]
    AlreadyMember,
    #[error("account is not a member of this guild")]
    NotAMember,
    #[error("only the guild leader may do this")]
    NotLeader,
    #[error("account already belongs to a different guild")]
    AlreadyInAnotherGuild,
}

#[derive(Debug, Clone)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    pub tag: String,
    pub leader_id: AccountId,
    /// Leader included, oldest-first; index 0 is always the leader.
    pub members: Vec<AccountId>,
}

impl Guild {
    #[must_use]
    pub fn is_member(&self, account: AccountId) -> bool {
        self.members.contains(&account)
    }
}

#[derive(Debug, Default)]
pub struct GuildRegistry {
    guilds: HashMap<GuildId, Guild>,
    /// Normalized (uppercased) tag -> guild, enforcing the case-insensitive
    /// uniqueness constraint.
    tag_index: HashMap<String, GuildId>,
    member_of: HashMap<AccountId, GuildId>,
}

impl GuildRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: String, tag: String, leader: AccountId) -> Result<GuildId, GuildError> {
        if self.member_of.contains_key(&leader) {
            return Err(GuildError::AlreadyInAnotherGuild);
        }
        let normalized_tag = nexus_core::text::normalize_guild_tag(&tag);
        if self.tag_index.contains_key(&normalized_tag) {
            return Err(GuildError::TagTaken);
        }

        let id = GuildId::new();
        self.member_of.insert(leader, id);
        self.guilds.insert(
            id,
            Guild {
                id,
                name,
                tag: normalized_tag.clone(),
                leader_id: leader,
                members: vec![leader],
            },
        );
        self.tag_index.insert(normalized_tag, id);
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: GuildId) -> Option<&Guild> {
        self.guilds.get(&id)
    }

    #[must_use]
    pub fn guild_of(&self, account: AccountId) -> Option<&Guild> {
        self.member_of.get(&account).and_then(|id| self.guilds.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Guild> {
        self.guilds.values()
    }

    pub fn join(&mut self, id: GuildId, account: AccountId) -> Result<(), GuildError> {
        if self.member_of.contains_key(&account) {
            return Err(GuildError::AlreadyInAnotherGuild);
        }
        let guild = self.guilds.get_mut(&id).ok_or(GuildError::NotFound)?;
        if guild.is_member(account) {
            return Err(GuildError::AlreadyMember);
        }
        guild.members.push(account);
        self.member_of.insert(account, id);
        Ok(())
    }

    /// Removes `account` from the guild. If the departing member was the
    /// leader, leadership passes to the next-oldest remaining member; if
    /// the guild becomes empty it is torn down entirely.
    pub fn leave(&mut self, id: GuildId, account: AccountId) -> Result<(), GuildError> {
        let guild = self.guilds.get_mut(&id).ok_or(GuildError::NotFound)?;
        let position = guild.members.iter().position(|m| *m == account).ok_or(GuildError::NotAMember)?;
        guild.members.remove(position);
        self.member_of.remove(&account);

        if guild.members.is_empty() {
            let normalized_tag = nexus_core::text::normalize_guild_tag(&guild.tag);
            self.tag_index.remove(&normalized_tag);
            self.guilds.remove(&id);
        } else if guild.leader_id == account {
            guild.leader_id = guild.members[0];
        }
        Ok(())
    }

    pub fn kick(&mut self, id: GuildId, acting_leader: AccountId, target: AccountId) -> Result<(), GuildError> {
        let guild = self.guilds.get(&id).ok_or(GuildError::NotFound)?;
        if guild.leader_id != acting_leader {
            return Err(GuildError::NotLeader);
        }
        if acting_leader == target {
            return Err(GuildError::NotLeader);
        }
        self.leave(id, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_unique_case_insensitively() {
        let mut registry = GuildRegistry::new();
        registry.create("Alpha".into(), "ALP".into(), AccountId::new()).unwrap();
        let err = registry
            .create("Another".into(), "alp".into(), AccountId::new())
            .unwrap_err();
        assert_eq!(err, GuildError::TagTaken);
    }

    #[test]
    fn leadership_hands_off_on_leader_departure() {
        let mut registry = GuildRegistry::new();
        let leader = AccountId::new();
        let member = AccountId::new();
        let id = registry.create("Alpha".into(), "ALP".into(), leader).unwrap();
        registry.join(id, member).unwrap();
        registry.leave(id, leader).unwrap();
        assert_eq!(registry.get(id).unwrap().leader_id, member);
    }

    #[test]
    fn emptied_guild_is_torn_down_and_tag_released() {
        let mut registry = GuildRegistry::new();
        let leader = AccountId::new();
        let id = registry.create("Alpha".into(), "ALP".into(), leader).unwrap();
        registry.leave(id, leader).unwrap();
        assert!(registry.get(id).is_none());
        registry.create("Beta".into(), "ALP".into(), AccountId::new()).unwrap();
    }

    #[test]
    fn cannot_join_two_guilds_at_once() {
        let mut registry = GuildRegistry::new();
        let account = AccountId::new();
        registry.create("Alpha".into(), "ALP".into(), account).unwrap();
        let id2 = registry.create("Beta".into(), "BET".into(), AccountId::new()).unwrap();
        assert_eq!(registry.join(id2, account).unwrap_err(), GuildError::AlreadyInAnotherGuild);
    }
}
