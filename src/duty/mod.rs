//! Duty tracking for dutywatch
//!
//! This module implements the duty subsystem: the catalog of configured duty
//! types, the per-player session registry, the accrued-time ledger, and the
//! service that orchestrates them for the command layer.

mod catalog;
mod error;
mod format;
mod ledger;
mod service;
mod session;

pub use catalog::{DutyCatalog, DutyType, DutyTypeConfig};
pub use error::{DutyError, DutyResult};
pub use format::format_duration;
pub use ledger::{AccruedLedger, LedgerSnapshot};
pub use service::{DutyService, LeaderboardPage, PlayerRef, PlayerTimeEntry, ResetTarget};
pub use session::{ClosedSession, DutySession, SessionRegistry};

/// Entries shown per leaderboard page
pub const LEADERBOARD_PAGE_SIZE: usize = 10;
