//! Duty service
//!
//! Orchestrates the catalog, session registry, ledger, host access, and
//! notifier for the command layer. All session mutation goes through here;
//! the command handlers only translate replies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::EVENT_TARGET;
use crate::data::Data;
use crate::duty::{
    ClosedSession, DutyError, DutyResult, LEADERBOARD_PAGE_SIZE, format_duration,
};
use crate::host::HostAccess;
use crate::notify::{Notifier, OFF_DUTY_COLOR, ON_DUTY_COLOR};

/// The player a command is acting for
#[derive(Debug, Clone)]
pub struct PlayerRef {
    pub id: u64,
    pub guild_id: u64,
    pub name: String,
}

/// What a reset should cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetTarget {
    /// One duty type's total back to zero
    One(String),
    /// Every duty total for the player
    All,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTimeEntry {
    pub player_id: u64,
    pub name: String,
    pub total_ms: u64,
}

/// One page of the descending leaderboard
#[derive(Debug, Clone)]
pub struct LeaderboardPage {
    pub duty_name: String,
    pub page: usize,
    pub total_pages: usize,
    /// Rank of the first entry on this page, 1-based
    pub start_rank: usize,
    pub entries: Vec<PlayerTimeEntry>,
}

/// Service for duty operations
pub struct DutyService {
    data: Data,
    host: Arc<dyn HostAccess>,
    notifier: Notifier,
}

impl DutyService {
    /// Create a new duty service over the bot's data and a host adapter
    #[must_use]
    pub fn new(data: Data, host: Arc<dyn HostAccess>) -> Self {
        let notifier = Notifier::new(data.http_client.clone());
        Self {
            data,
            host,
            notifier,
        }
    }

    /// Start a duty session for the player.
    ///
    /// Grants the duty's on-duty role (if configured) and emits an on-duty
    /// notification.
    ///
    /// # Errors
    /// `UnknownDuty` if the duty is not in the catalog, `PermissionDenied` if
    /// the player lacks its required role, `AlreadyOnDuty` if a session of
    /// any duty type is active.
    pub async fn go_on_duty(
        &self,
        player: &PlayerRef,
        duty_name: &str,
        now: DateTime<Utc>,
    ) -> DutyResult<()> {
        let catalog = self.data.catalog();
        let duty = catalog
            .lookup(duty_name)
            .ok_or_else(|| DutyError::UnknownDuty(duty_name.to_string()))?;

        if !self
            .host
            .has_permission(player.guild_id, player.id, &duty.permission)
            .await
        {
            return Err(DutyError::PermissionDenied {
                duty: duty.name.clone(),
                permission: duty.permission.clone(),
            });
        }

        self.data.sessions.start(player.id, duty_name, now)?;
        self.data.record_name(player.id, &player.name);

        if let Some(group) = &duty.group {
            self.host
                .grant_group(player.guild_id, player.id, group)
                .await;
        }

        self.notifier.dispatch(
            &self.data.webhook_url(),
            format!("{} went ON duty for **{duty_name}**", player.name),
            ON_DUTY_COLOR,
        );
        Ok(())
    }

    /// End the player's duty session, flush its elapsed time into the
    /// ledger, revoke the on-duty role, and persist the store.
    ///
    /// The session is removed before the flush is persisted: a crash in
    /// between loses that session's delta but never double-counts it. A
    /// persistence failure is logged and does not roll back the flush.
    ///
    /// # Errors
    /// `NotOnDuty` if the player has no active session.
    pub async fn go_off_duty(
        &self,
        player: &PlayerRef,
        now: DateTime<Utc>,
    ) -> DutyResult<ClosedSession> {
        let closed = self.data.sessions.stop(player.id, now)?;
        self.data
            .ledger
            .add_delta(player.id, &closed.duty_name, closed.elapsed_ms);
        self.data.record_name(player.id, &player.name);

        // A reload may have removed the duty type mid-session; time still
        // counts, but the role side effect is no longer known.
        if let Some(group) = self
            .data
            .catalog()
            .lookup(&closed.duty_name)
            .and_then(|duty| duty.group.clone())
        {
            self.host
                .revoke_group(player.guild_id, player.id, &group)
                .await;
        }

        self.notifier.dispatch(
            &self.data.webhook_url(),
            format!(
                "{} went OFF duty for **{}** (Duration: {})",
                player.name,
                closed.duty_name,
                format_duration(closed.elapsed_ms)
            ),
            OFF_DUTY_COLOR,
        );

        self.persist().await;
        Ok(closed)
    }

    /// Persisted total plus the elapsed time of a matching in-progress
    /// session. Read-only; never mutates the store.
    #[must_use]
    pub fn check_time(&self, player: u64, duty_name: &str, now: DateTime<Utc>) -> u64 {
        let persisted = self.data.ledger.total(player, duty_name);
        let live = self
            .data
            .sessions
            .live_elapsed(player, duty_name, now)
            .unwrap_or(0);
        persisted.saturating_add(live)
    }

    /// Zero one duty total or remove all of a player's totals, then persist
    pub async fn reset_time(&self, player: u64, target: &ResetTarget) {
        match target {
            ResetTarget::One(duty_name) => self.data.ledger.reset_one(player, duty_name),
            ResetTarget::All => self.data.ledger.reset_all(player),
        }
        info!(
            target: EVENT_TARGET,
            player_id = %player,
            reset = ?target,
            "Accrued duty time reset"
        );
        self.persist().await;
    }

    /// Build one page of the descending leaderboard for a duty type.
    ///
    /// Zero totals are omitted. The page number is clamped to
    /// `[1, total_pages]`.
    ///
    /// # Errors
    /// `InvalidPage` for page 0.
    pub fn list_times(&self, duty_name: &str, page: usize) -> DutyResult<LeaderboardPage> {
        if page == 0 {
            return Err(DutyError::InvalidPage);
        }

        let mut entries: Vec<PlayerTimeEntry> = self
            .data
            .ledger
            .players_with_time(duty_name)
            .into_iter()
            .map(|(player_id, total_ms)| PlayerTimeEntry {
                player_id,
                name: self.data.display_name(player_id),
                total_ms,
            })
            .collect();
        entries.sort_by(|a, b| b.total_ms.cmp(&a.total_ms).then_with(|| a.name.cmp(&b.name)));

        let total_pages = entries.len().div_ceil(LEADERBOARD_PAGE_SIZE).max(1);
        let page = page.min(total_pages);
        let start = (page - 1) * LEADERBOARD_PAGE_SIZE;
        let entries: Vec<PlayerTimeEntry> = entries
            .into_iter()
            .skip(start)
            .take(LEADERBOARD_PAGE_SIZE)
            .collect();

        Ok(LeaderboardPage {
            duty_name: duty_name.to_string(),
            page,
            total_pages,
            start_rank: start + 1,
            entries,
        })
    }

    /// Re-read the config document and swap in the new catalog and webhook
    /// URL. Returns the number of duty types loaded.
    ///
    /// # Errors
    /// `Persistence` if the config document exists but cannot be read or
    /// parsed.
    pub async fn reload(&self) -> DutyResult<usize> {
        self.data
            .reload_config()
            .await
            .map_err(|err| DutyError::Persistence(err.to_string()))
    }

    /// Duty the player is currently on, if any
    #[must_use]
    pub fn active_duty_of(&self, player: u64) -> Option<String> {
        self.data.sessions.active_duty_of(player)
    }

    /// Known duty names, sorted for display
    #[must_use]
    pub fn duty_names(&self) -> Vec<String> {
        self.data.catalog().names()
    }

    /// End every active session, flush each into the ledger, and persist.
    ///
    /// Called once during shutdown, after the client has stopped; no role
    /// revokes and no notifications, matching the store-only semantics of a
    /// host going down. Returns the number of sessions flushed.
    pub async fn drain_at_shutdown(data: &Data, now: DateTime<Utc>) -> usize {
        let drained = data.sessions.drain_all(now);
        for (player, duty_name, elapsed_ms) in &drained {
            data.ledger.add_delta(*player, duty_name, *elapsed_ms);
        }
        if let Err(err) = data.save().await {
            error!(
                target: EVENT_TARGET,
                error = %err,
                "Failed to persist duty data during shutdown drain"
            );
        }
        drained.len()
    }

    async fn persist(&self) {
        if let Err(err) = self.data.save().await {
            error!(
                target: EVENT_TARGET,
                error = %err,
                "Failed to persist duty data"
            );
        }
    }
}
