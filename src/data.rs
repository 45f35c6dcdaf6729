use std::{
    collections::BTreeMap,
    ops::Deref,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};
use serenity::prelude::TypeMapKey;
use tracing::{info, warn};

use crate::EVENT_TARGET;
use crate::duty::{
    AccruedLedger, DutyCatalog, DutyTypeConfig, LedgerSnapshot, SessionRegistry,
};

/// Config document, reloadable at runtime via `/duty reload`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Webhook for duty-change notifications; empty disables them
    #[serde(rename = "discord-webhook-url", default)]
    pub discord_webhook_url: String,
    /// Duty name -> required role and optional on-duty role
    #[serde(default)]
    pub duties: BTreeMap<String, DutyTypeConfig>,
}

/// Persisted duty store document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DutyDataFile {
    /// Player id -> duty name -> accrued milliseconds
    #[serde(default)]
    players: LedgerSnapshot,
    /// Player id -> last-seen display name, for the leaderboard
    #[serde(default)]
    names: BTreeMap<String, String>,
}

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

// Implement TypeMapKey for Data to allow storing it in Serenity's data map
impl TypeMapKey for Data {
    type Value = Data;
}

impl Default for Data {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("sessions", &self.sessions)
            .field("ledger", &self.ledger)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl Data {
    /// Create an empty Data instance rooted at the working directory
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(".")
    }

    /// Create an empty Data instance rooted at `root`
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self(Arc::new(DataInner::empty(root.into())))
    }

    /// Load config and duty store from YAML files under `root`
    pub async fn load(root: impl Into<PathBuf>) -> Self {
        Self(Arc::new(DataInner::load(root.into()).await))
    }

    /// Save the duty store to its YAML file
    ///
    /// # Errors
    /// This function will return an error if:
    /// - The data directory cannot be created
    /// - The duty store cannot be serialized to YAML
    /// - The YAML data cannot be written to the store file
    pub async fn save(&self) -> Result<(), crate::Error> {
        self.0.save().await
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Main centralized data structure for the bot
#[derive(Debug)]
pub struct DataInner {
    // Directory the config/ and data/ documents live under
    root: PathBuf,
    // Configured duty types, replaced wholesale on reload
    catalog: RwLock<Arc<DutyCatalog>>,
    // Webhook for duty notifications, empty when disabled
    webhook_url: RwLock<String>,
    // Map of player id -> active duty session
    pub sessions: SessionRegistry,
    // Accrued duty time per player per duty type
    pub ledger: AccruedLedger,
    // Map of player id -> last-seen display name
    pub names: DashMap<u64, String>,
    // Shared HTTP client for webhook delivery
    pub http_client: reqwest::Client,
}

impl DataInner {
    /// Relative path of the config document
    pub const CONFIG_FILE: &str = "config/dutywatch.yml";
    /// Relative path of the persisted duty store
    pub const DATA_FILE: &str = "data/dutydata.yml";

    fn empty(root: PathBuf) -> Self {
        Self {
            root,
            catalog: RwLock::new(Arc::new(DutyCatalog::default())),
            webhook_url: RwLock::new(String::new()),
            sessions: SessionRegistry::new(),
            ledger: AccruedLedger::new(),
            names: DashMap::new(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Load config and duty store from YAML files under `root`.
    ///
    /// An absent file is an empty store, not an error; a malformed file is
    /// logged and treated the same way.
    pub async fn load(root: PathBuf) -> Self {
        let inner = Self::empty(root);

        match tokio::fs::read_to_string(inner.config_path()).await {
            Ok(content) => match serde_yaml::from_str::<BotConfig>(&content) {
                Ok(config) => {
                    inner.apply_config(&config);
                }
                Err(err) => warn!(
                    target: EVENT_TARGET,
                    error = %err,
                    "Failed to parse config document; starting with no duty types"
                ),
            },
            Err(_) => info!(
                target: EVENT_TARGET,
                path = %inner.config_path().display(),
                "No config document found; starting with defaults"
            ),
        }

        if let Ok(content) = tokio::fs::read_to_string(inner.data_path()).await {
            match serde_yaml::from_str::<DutyDataFile>(&content) {
                Ok(file) => inner.restore(&file),
                Err(err) => warn!(
                    target: EVENT_TARGET,
                    error = %err,
                    "Failed to parse duty store; starting empty"
                ),
            }
        }

        inner
    }

    /// Re-read the config document and swap in the new catalog and webhook
    /// URL. Returns the number of duty types loaded.
    ///
    /// # Errors
    /// Returns an error if the config document exists but cannot be read or
    /// parsed. An absent document resets to defaults.
    pub async fn reload_config(&self) -> Result<usize, crate::Error> {
        let config = match tokio::fs::read_to_string(self.config_path()).await {
            Ok(content) => serde_yaml::from_str::<BotConfig>(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BotConfig::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(self.apply_config(&config))
    }

    /// Swap in a parsed config, returning the number of duty types loaded
    pub fn apply_config(&self, config: &BotConfig) -> usize {
        let catalog = DutyCatalog::from_config(&config.duties);
        let count = catalog.len();
        *self.catalog.write().expect("catalog lock poisoned") = Arc::new(catalog);
        *self.webhook_url.write().expect("webhook lock poisoned") =
            config.discord_webhook_url.clone();
        count
    }

    /// Current duty catalog
    #[must_use]
    pub fn catalog(&self) -> Arc<DutyCatalog> {
        Arc::clone(&self.catalog.read().expect("catalog lock poisoned"))
    }

    /// Current webhook URL, empty when notifications are disabled
    #[must_use]
    pub fn webhook_url(&self) -> String {
        self.webhook_url.read().expect("webhook lock poisoned").clone()
    }

    /// Remember a player's display name for leaderboard rendering
    pub fn record_name(&self, player: u64, name: &str) {
        self.names.insert(player, name.to_string());
    }

    /// Last-seen display name, falling back to the raw id
    #[must_use]
    pub fn display_name(&self, player: u64) -> String {
        self.names
            .get(&player)
            .map_or_else(|| player.to_string(), |entry| entry.value().clone())
    }

    // Keys that do not parse as player ids are dropped, the same way an
    // absent file is treated as an empty store.
    fn restore(&self, file: &DutyDataFile) {
        for (player_key, name) in &file.names {
            if let Ok(player) = player_key.parse::<u64>() {
                self.names.insert(player, name.clone());
            }
        }
        for (player_key, duties) in &file.players {
            let Ok(player) = player_key.parse::<u64>() else {
                continue;
            };
            for (duty, total) in duties {
                self.ledger.add_delta(player, duty, *total);
            }
        }
    }

    /// Save the duty store to its YAML file
    pub async fn save(&self) -> Result<(), crate::Error> {
        let file = DutyDataFile {
            players: self.ledger.snapshot(),
            names: self
                .names
                .iter()
                .map(|entry| (entry.key().to_string(), entry.value().clone()))
                .collect(),
        };
        let yaml = serde_yaml::to_string(&file)?;

        let path = self.data_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, yaml).await?;

        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.root.join(Self::CONFIG_FILE)
    }

    fn data_path(&self) -> PathBuf {
        self.root.join(Self::DATA_FILE)
    }
}

/// Tests for the data module
#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("dutywatch-test-{}", Uuid::new_v4()))
    }

    fn police_config(webhook: &str) -> BotConfig {
        BotConfig {
            discord_webhook_url: webhook.to_string(),
            duties: BTreeMap::from([(
                "police".to_string(),
                DutyTypeConfig {
                    permission: "Police".to_string(),
                    group: "On-Duty Police".to_string(),
                },
            )]),
        }
    }

    #[test]
    fn test_data_new_is_empty() {
        let data = Data::new();
        assert!(data.sessions.is_empty());
        assert!(data.ledger.is_empty());
        assert!(data.catalog().is_empty());
        assert!(data.webhook_url().is_empty());
    }

    #[test]
    fn test_config_document_parsing() {
        let yaml = concat!(
            "discord-webhook-url: https://discord.com/api/webhooks/1/abc\n",
            "duties:\n",
            "  police:\n",
            "    permission: Police\n",
            "    group: On-Duty Police\n",
            "  medic:\n",
            "    permission: Medic\n",
        );
        let config: BotConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.discord_webhook_url,
            "https://discord.com/api/webhooks/1/abc"
        );
        assert_eq!(config.duties.len(), 2);
        assert_eq!(config.duties["police"].group, "On-Duty Police");
        assert_eq!(config.duties["medic"].group, "");
    }

    #[test]
    fn test_apply_config_replaces_catalog() {
        let data = Data::new();
        assert_eq!(data.apply_config(&police_config("https://example.invalid/hook")), 1);
        assert!(data.catalog().lookup("police").is_some());
        assert_eq!(data.webhook_url(), "https://example.invalid/hook");

        // A second apply replaces the whole set
        assert_eq!(data.apply_config(&BotConfig::default()), 0);
        assert!(data.catalog().lookup("police").is_none());
        assert!(data.webhook_url().is_empty());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let data = Data::new();
        assert_eq!(data.display_name(42), "42");
        data.record_name(42, "Alice");
        assert_eq!(data.display_name(42), "Alice");
    }

    #[tokio::test]
    async fn test_load_with_absent_files_is_empty() {
        let data = Data::load(temp_root()).await;
        assert!(data.ledger.is_empty());
        assert!(data.catalog().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let root = temp_root();
        let data = Data::with_root(&root);
        data.ledger.add_delta(42, "police", 3_600_000);
        data.record_name(42, "Alice");
        data.save().await.unwrap();

        let reloaded = Data::load(&root).await;
        assert_eq!(reloaded.ledger.total(42, "police"), 3_600_000);
        assert_eq!(reloaded.display_name(42), "Alice");
    }

    #[tokio::test]
    async fn test_store_document_shape() {
        let root = temp_root();
        let data = Data::with_root(&root);
        data.ledger.add_delta(42, "police", 3_600_000);
        data.save().await.unwrap();

        let written = tokio::fs::read_to_string(root.join(DataInner::DATA_FILE))
            .await
            .unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&written).unwrap();
        assert_eq!(doc["players"]["42"]["police"], serde_yaml::Value::from(3_600_000u64));
    }

    #[tokio::test]
    async fn test_reload_config_from_file() {
        let root = temp_root();
        let data = Data::with_root(&root);

        let config_path = root.join(DataInner::CONFIG_FILE);
        tokio::fs::create_dir_all(config_path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(
            &config_path,
            "duties:\n  police:\n    permission: Police\n",
        )
        .await
        .unwrap();

        assert_eq!(data.reload_config().await.unwrap(), 1);
        assert!(data.catalog().lookup("police").is_some());

        // Absent document resets to defaults
        tokio::fs::remove_file(&config_path).await.unwrap();
        assert_eq!(data.reload_config().await.unwrap(), 0);
        assert!(data.catalog().is_empty());
    }
}
