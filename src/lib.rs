pub mod commands;
pub mod data;
pub mod duty;
pub mod handlers;
pub mod host;
pub mod logging;
pub mod notify;

// Customize these constants for your bot
pub const BOT_NAME: &str = "dutywatch";
pub const COMMAND_TARGET: &str = "dutywatch::command";
pub const ERROR_TARGET: &str = "dutywatch::error";
pub const EVENT_TARGET: &str = "dutywatch::duty";
pub const CONSOLE_TARGET: &str = "dutywatch";

pub use data::{Data, DataInner};
pub use duty::{DutyCatalog, DutyError, DutyResult, DutyService, DutyType};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
