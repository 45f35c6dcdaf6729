//! Duty sessions and the session registry
//!
//! The registry owns the lifecycle of active sessions and enforces the one
//! invariant that matters here: a player has at most one active session at
//! any time. It never touches the accrued-time ledger; the caller flushes the
//! elapsed time a `stop` or `drain_all` hands back.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;
use uuid::Uuid;

use crate::EVENT_TARGET;
use crate::duty::{DutyError, DutyResult};

/// One player's current duty period
#[derive(Debug, Clone)]
pub struct DutySession {
    /// Unique ID of this session, used for log correlation
    pub id: String,
    /// Name of the duty the player is on; a copy, not a catalog reference
    pub duty_name: String,
    /// When the session started
    pub started_at: DateTime<Utc>,
}

impl DutySession {
    fn new(duty_name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            duty_name: duty_name.into(),
            started_at,
        }
    }

    /// Elapsed time since the session started, clamped to zero under clock skew
    #[must_use]
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.started_at).num_milliseconds()).unwrap_or(0)
    }
}

/// A session that has been removed from the registry
#[derive(Debug, Clone)]
pub struct ClosedSession {
    pub duty_name: String,
    pub elapsed_ms: u64,
}

/// In-memory map of player id -> active duty session
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<u64, DutySession>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Start a session for a player.
    ///
    /// The check-and-insert happens under a single map entry, so two
    /// concurrent starts for the same player cannot both succeed.
    ///
    /// # Errors
    /// Returns `AlreadyOnDuty` if the player has an active session of any
    /// duty type.
    pub fn start(
        &self,
        player: u64,
        duty_name: &str,
        now: DateTime<Utc>,
    ) -> DutyResult<DutySession> {
        match self.sessions.entry(player) {
            Entry::Occupied(current) => {
                Err(DutyError::AlreadyOnDuty(current.get().duty_name.clone()))
            }
            Entry::Vacant(slot) => {
                let session = DutySession::new(duty_name, now);
                info!(
                    target: EVENT_TARGET,
                    session_id = %session.id,
                    player_id = %player,
                    duty = %duty_name,
                    "Duty session started"
                );
                slot.insert(session.clone());
                Ok(session)
            }
        }
    }

    /// Stop a player's session and return its elapsed time.
    ///
    /// The registry entry is removed before the caller flushes the elapsed
    /// time, so a crash in between loses the delta but never double-counts it.
    ///
    /// # Errors
    /// Returns `NotOnDuty` if the player has no active session.
    pub fn stop(&self, player: u64, now: DateTime<Utc>) -> DutyResult<ClosedSession> {
        let (_, session) = self.sessions.remove(&player).ok_or(DutyError::NotOnDuty)?;
        let elapsed_ms = session.elapsed_ms(now);
        info!(
            target: EVENT_TARGET,
            session_id = %session.id,
            player_id = %player,
            duty = %session.duty_name,
            elapsed_ms = elapsed_ms,
            "Duty session ended"
        );
        Ok(ClosedSession {
            duty_name: session.duty_name,
            elapsed_ms,
        })
    }

    /// Name of the duty the player is currently on, if any
    #[must_use]
    pub fn active_duty_of(&self, player: u64) -> Option<String> {
        self.sessions
            .get(&player)
            .map(|session| session.duty_name.clone())
    }

    /// Elapsed time of the player's in-progress session, only if it matches
    /// `duty_name`. Read-only; used to build live totals.
    #[must_use]
    pub fn live_elapsed(&self, player: u64, duty_name: &str, now: DateTime<Utc>) -> Option<u64> {
        self.sessions.get(&player).and_then(|session| {
            (session.duty_name == duty_name).then(|| session.elapsed_ms(now))
        })
    }

    /// End every active session in one pass, leaving the registry empty.
    ///
    /// Used at shutdown; the caller flushes each returned entry.
    pub fn drain_all(&self, now: DateTime<Utc>) -> Vec<(u64, String, u64)> {
        let players: Vec<u64> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let mut drained = Vec::with_capacity(players.len());
        for player in players {
            if let Some((_, session)) = self.sessions.remove(&player) {
                let elapsed = session.elapsed_ms(now);
                drained.push((player, session.duty_name, elapsed));
            }
        }
        drained
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_start_and_stop() {
        let registry = SessionRegistry::new();
        let now = Utc::now();

        let session = registry.start(1, "police", now).unwrap();
        assert_eq!(session.duty_name, "police");
        assert_eq!(registry.active_duty_of(1).as_deref(), Some("police"));

        let closed = registry.stop(1, now + Duration::seconds(90)).unwrap();
        assert_eq!(closed.duty_name, "police");
        assert_eq!(closed.elapsed_ms, 90_000);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_immediate_stop_yields_zero_elapsed() {
        let registry = SessionRegistry::new();
        let now = Utc::now();

        registry.start(1, "police", now).unwrap();
        let closed = registry.stop(1, now).unwrap();
        assert_eq!(closed.elapsed_ms, 0);
        assert!(registry.active_duty_of(1).is_none());
    }

    #[test]
    fn test_one_session_per_player() {
        let registry = SessionRegistry::new();
        let now = Utc::now();

        registry.start(1, "police", now).unwrap();
        let err = registry.start(1, "medic", now).unwrap_err();
        assert!(matches!(err, DutyError::AlreadyOnDuty(duty) if duty == "police"));

        // The original session is untouched
        assert_eq!(registry.active_duty_of(1).as_deref(), Some("police"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stop_without_start() {
        let registry = SessionRegistry::new();
        let err = registry.stop(1, Utc::now()).unwrap_err();
        assert!(matches!(err, DutyError::NotOnDuty));
    }

    #[test]
    fn test_elapsed_clamped_under_clock_skew() {
        let registry = SessionRegistry::new();
        let now = Utc::now();

        registry.start(1, "police", now).unwrap();
        // The clock went backwards between start and stop
        let closed = registry.stop(1, now - Duration::seconds(30)).unwrap();
        assert_eq!(closed.elapsed_ms, 0);
    }

    #[test]
    fn test_live_elapsed_matches_duty_only() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        registry.start(1, "police", now).unwrap();

        let later = now + Duration::seconds(45);
        assert_eq!(registry.live_elapsed(1, "police", later), Some(45_000));
        assert_eq!(registry.live_elapsed(1, "medic", later), None);
        assert_eq!(registry.live_elapsed(2, "police", later), None);
    }

    #[test]
    fn test_drain_all_empties_registry() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        registry.start(1, "police", now).unwrap();
        registry.start(2, "medic", now).unwrap();

        let mut drained = registry.drain_all(now + Duration::seconds(10));
        drained.sort();
        assert_eq!(
            drained,
            vec![
                (1, "police".to_string(), 10_000),
                (2, "medic".to_string(), 10_000),
            ]
        );
        assert!(registry.is_empty());
    }
}
