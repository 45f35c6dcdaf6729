//! Guild permission and role access
//!
//! The duty service talks to the guild through the [`HostAccess`] capability
//! trait, so the core bookkeeping has no dependency on the Discord API and
//! orchestration tests can mock the whole surface. [`RoleHost`] is the live
//! adapter: a duty's `permission` string names a guild role the member must
//! hold, and the optional `group` names a role toggled while on duty.

use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serenity::{Cache, GuildId, Http, RoleId, UserId};
use tracing::{debug, warn};

use crate::EVENT_TARGET;

/// Capability surface the duty service needs from the host guild
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostAccess: Send + Sync {
    /// Whether the player holds the role named by `permission`
    async fn has_permission(&self, guild_id: u64, player: u64, permission: &str) -> bool;

    /// Grant the named role to the player. Silently a no-op when the role or
    /// member cannot be resolved.
    async fn grant_group(&self, guild_id: u64, player: u64, group: &str);

    /// Revoke the named role from the player. Silently a no-op when the role
    /// or member cannot be resolved.
    async fn revoke_group(&self, guild_id: u64, player: u64, group: &str);
}

/// Live adapter backed by the serenity cache and HTTP client
pub struct RoleHost {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl RoleHost {
    #[must_use]
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    fn role_by_name(&self, guild_id: GuildId, name: &str) -> Option<RoleId> {
        let guild = self.cache.guild(guild_id)?;
        guild
            .roles
            .values()
            .find(|role| role.name == name)
            .map(|role| role.id)
    }
}

#[async_trait]
impl HostAccess for RoleHost {
    async fn has_permission(&self, guild_id: u64, player: u64, permission: &str) -> bool {
        let guild_id = GuildId::new(guild_id);
        let Some(role_id) = self.role_by_name(guild_id, permission) else {
            debug!(
                target: EVENT_TARGET,
                guild_id = %guild_id,
                role = %permission,
                "Permission role does not exist in guild"
            );
            return false;
        };

        match guild_id.member(&self.http, UserId::new(player)).await {
            Ok(member) => member.roles.contains(&role_id),
            Err(err) => {
                warn!(
                    target: EVENT_TARGET,
                    guild_id = %guild_id,
                    player_id = %player,
                    error = %err,
                    "Failed to fetch member for permission check"
                );
                false
            }
        }
    }

    async fn grant_group(&self, guild_id: u64, player: u64, group: &str) {
        let guild_id = GuildId::new(guild_id);
        let Some(role_id) = self.role_by_name(guild_id, group) else {
            warn!(
                target: EVENT_TARGET,
                guild_id = %guild_id,
                role = %group,
                "On-duty role does not exist in guild; skipping grant"
            );
            return;
        };

        if let Err(err) = self
            .http
            .add_member_role(guild_id, UserId::new(player), role_id, Some("went on duty"))
            .await
        {
            warn!(
                target: EVENT_TARGET,
                guild_id = %guild_id,
                player_id = %player,
                role = %group,
                error = %err,
                "Failed to grant on-duty role"
            );
        }
    }

    async fn revoke_group(&self, guild_id: u64, player: u64, group: &str) {
        let guild_id = GuildId::new(guild_id);
        let Some(role_id) = self.role_by_name(guild_id, group) else {
            warn!(
                target: EVENT_TARGET,
                guild_id = %guild_id,
                role = %group,
                "On-duty role does not exist in guild; skipping revoke"
            );
            return;
        };

        if let Err(err) = self
            .http
            .remove_member_role(guild_id, UserId::new(player), role_id, Some("went off duty"))
            .await
        {
            warn!(
                target: EVENT_TARGET,
                guild_id = %guild_id,
                player_id = %player,
                role = %group,
                error = %err,
                "Failed to revoke on-duty role"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_host_access() {
        let mut host = MockHostAccess::new();
        host.expect_has_permission()
            .withf(|guild, player, permission| {
                *guild == 1 && *player == 2 && permission == "Police"
            })
            .return_const(true);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        assert!(runtime.block_on(host.has_permission(1, 2, "Police")));
    }
}
