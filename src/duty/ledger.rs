//! Accrued duty time ledger
//!
//! Persisted totals per (player, duty type). After a session ends, the
//! ledger is the single source of truth for that player's time. Entries are
//! created lazily and only ever grow, except through the explicit resets.
//!
//! File I/O lives in the data layer; the ledger only converts to and from
//! the persisted `players.<player-id>.<duty-name>` mapping.

use std::collections::{BTreeMap, HashMap};

use dashmap::DashMap;

/// Persisted document shape: player id (as a string key) -> duty -> millis
pub type LedgerSnapshot = BTreeMap<String, BTreeMap<String, u64>>;

/// Cumulative duty time per player per duty type, millisecond resolution
#[derive(Debug, Default)]
pub struct AccruedLedger {
    totals: DashMap<u64, HashMap<String, u64>>,
}

impl AccruedLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            totals: DashMap::new(),
        }
    }

    /// Persisted total for a player and duty, zero if absent
    #[must_use]
    pub fn total(&self, player: u64, duty_name: &str) -> u64 {
        self.totals
            .get(&player)
            .and_then(|duties| duties.get(duty_name).copied())
            .unwrap_or(0)
    }

    /// Add a completed session's elapsed time to a player's total
    pub fn add_delta(&self, player: u64, duty_name: &str, delta_ms: u64) {
        let mut duties = self.totals.entry(player).or_default();
        let total = duties.entry(duty_name.to_string()).or_insert(0);
        *total = total.saturating_add(delta_ms);
    }

    /// Set a player's total for one duty back to zero
    pub fn reset_one(&self, player: u64, duty_name: &str) {
        if let Some(mut duties) = self.totals.get_mut(&player) {
            duties.insert(duty_name.to_string(), 0);
        }
    }

    /// Remove every duty total for a player
    pub fn reset_all(&self, player: u64) {
        self.totals.remove(&player);
    }

    /// All players with a non-zero persisted total for a duty.
    ///
    /// Order unspecified; the leaderboard sorts.
    #[must_use]
    pub fn players_with_time(&self, duty_name: &str) -> Vec<(u64, u64)> {
        self.totals
            .iter()
            .filter_map(|entry| {
                let total = entry.value().get(duty_name).copied().unwrap_or(0);
                (total > 0).then(|| (*entry.key(), total))
            })
            .collect()
    }

    /// Copy the ledger into the persisted document shape
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.totals
            .iter()
            .map(|entry| {
                let duties = entry
                    .value()
                    .iter()
                    .map(|(duty, total)| (duty.clone(), *total))
                    .collect();
                (entry.key().to_string(), duties)
            })
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}
