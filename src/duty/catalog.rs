//! Duty type catalog
//!
//! Duty types come from the config document and are replaced wholesale on
//! reload. Sessions carry a copy of the duty name, so replacing the catalog
//! never invalidates a session that is already running.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::EVENT_TARGET;

/// A named duty a player can go on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyType {
    /// Unique duty name, the key players type in commands
    pub name: String,
    /// Guild role a member must hold to start this duty
    pub permission: String,
    /// Guild role granted while on duty, if any
    pub group: Option<String>,
}

impl DutyType {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        permission: impl Into<String>,
        group: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            permission: permission.into(),
            group,
        }
    }
}

/// Raw config-document shape of one duty entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DutyTypeConfig {
    #[serde(default)]
    pub permission: String,
    #[serde(default)]
    pub group: String,
}

/// The full set of configured duty types
#[derive(Debug, Clone, Default)]
pub struct DutyCatalog {
    types: HashMap<String, DutyType>,
}

impl DutyCatalog {
    /// Build a catalog from the `duties:` section of the config document.
    ///
    /// Entries without a non-empty `permission` are skipped with a warning;
    /// a half-written config degrades to fewer duties, not a startup error.
    #[must_use]
    pub fn from_config(duties: &BTreeMap<String, DutyTypeConfig>) -> Self {
        let mut types = HashMap::new();
        for (name, entry) in duties {
            if entry.permission.trim().is_empty() {
                warn!(
                    target: EVENT_TARGET,
                    duty = %name,
                    "Skipping duty type without a permission role"
                );
                continue;
            }
            let group = match entry.group.trim() {
                "" => None,
                group => Some(group.to_string()),
            };
            types.insert(
                name.clone(),
                DutyType::new(name.clone(), entry.permission.clone(), group),
            );
        }
        Self { types }
    }

    /// Look up a duty type by name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&DutyType> {
        self.types.get(name)
    }

    /// All known duty names, sorted for display in usage and error messages
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(entries: &[(&str, &str, &str)]) -> BTreeMap<String, DutyTypeConfig> {
        entries
            .iter()
            .map(|(name, permission, group)| {
                (
                    (*name).to_string(),
                    DutyTypeConfig {
                        permission: (*permission).to_string(),
                        group: (*group).to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_from_config_loads_entries() {
        let catalog = DutyCatalog::from_config(&config(&[
            ("police", "Police", "On-Duty Police"),
            ("medic", "Medic", ""),
        ]));

        assert_eq!(catalog.len(), 2);
        let police = catalog.lookup("police").unwrap();
        assert_eq!(police.permission, "Police");
        assert_eq!(police.group.as_deref(), Some("On-Duty Police"));

        // Empty group means no role side effect
        let medic = catalog.lookup("medic").unwrap();
        assert!(medic.group.is_none());
    }

    #[test]
    fn test_from_config_skips_entries_without_permission() {
        let catalog = DutyCatalog::from_config(&config(&[
            ("police", "Police", ""),
            ("broken", "", "Whatever"),
            ("blank", "   ", ""),
        ]));

        assert_eq!(catalog.len(), 1);
        assert!(catalog.lookup("broken").is_none());
        assert!(catalog.lookup("blank").is_none());
        assert_eq!(catalog.names(), vec!["police".to_string()]);
    }

    #[test]
    fn test_names_are_sorted() {
        let catalog = DutyCatalog::from_config(&config(&[
            ("medic", "Medic", ""),
            ("admin", "Admin", ""),
            ("police", "Police", ""),
        ]));

        assert_eq!(
            catalog.names(),
            vec!["admin".to_string(), "medic".to_string(), "police".to_string()]
        );
    }

    #[test]
    fn test_config_entry_defaults() {
        let entry: DutyTypeConfig = serde_yaml::from_str("permission: Police").unwrap();
        assert_eq!(entry.permission, "Police");
        assert_eq!(entry.group, "");
    }
}
