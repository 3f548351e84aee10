//! Settings with persistence
//!
//! Settings are saved to `~/.config/loadout/settings.toml`

use std::fs;
use std::path::PathBuf;

use loadout_core::TimeConfig;
use loadout_game::ArmoryConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Everything the demo reads at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub armory: ArmoryConfig,
    pub time: TimeConfig,
    pub demo: DemoSettings,
}

impl Settings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("loadout"))
    }

    /// Get the settings file path
    fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.toml"))
    }

    /// Load settings from disk, or return defaults if not found.
    /// Nothing is logged here; the outcome is reported once logging is up.
    pub fn load() -> (Self, LoadOutcome) {
        match Self::settings_path() {
            Some(path) => Self::load_from(path),
            None => (Self::default(), LoadOutcome::NoConfigDir),
        }
    }

    fn load_from(path: PathBuf) -> (Self, LoadOutcome) {
        if !path.exists() {
            return (Self::default(), LoadOutcome::Missing(path));
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(settings) => (settings, LoadOutcome::Loaded(path)),
                Err(e) => (
                    Self::default(),
                    LoadOutcome::Invalid {
                        path,
                        error: e.to_string(),
                    },
                ),
            },
            Err(e) => (
                Self::default(),
                LoadOutcome::Unreadable {
                    path,
                    error: e.to_string(),
                },
            ),
        }
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let Some(dir) = Self::config_dir() else {
            anyhow::bail!("Could not determine config directory");
        };

        let path = dir.join("settings.toml");

        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(path)
    }
}

/// Where the settings came from
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(PathBuf),
    Missing(PathBuf),
    NoConfigDir,
    Invalid { path: PathBuf, error: String },
    Unreadable { path: PathBuf, error: String },
}

impl LoadOutcome {
    /// Log the outcome; call after the subscriber is installed
    pub fn report(&self) {
        match self {
            Self::Loaded(path) => info!("Loaded settings from {:?}", path),
            Self::Missing(path) => info!("No settings file at {:?}, using defaults", path),
            Self::NoConfigDir => warn!("Could not determine config directory, using defaults"),
            Self::Invalid { path, error } => {
                warn!("Failed to parse {:?}: {}, using defaults", path, error)
            }
            Self::Unreadable { path, error } => {
                warn!("Failed to read {:?}: {}, using defaults", path, error)
            }
        }
    }
}

/// Parameters of the scripted match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Seed for recoil deflection
    pub seed: u64,
    /// Simulated seconds to run
    pub duration: f32,
    /// Wall-clock seconds between demo frames; each frame runs the ticks it has banked
    pub frame_time: f32,
    /// Health of every combatant
    pub health: f32,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            duration: 6.0,
            frame_time: 1.0 / 30.0,
            health: 100.0,
            log_filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadout_core::SlotKind;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::parse("[demo]\nseed = 3\n").unwrap();
        assert_eq!(settings.demo.seed, 3);
        assert_eq!(settings.demo.duration, 6.0);
        assert_eq!(settings.armory.slots.len(), 4);
    }

    #[test]
    fn test_custom_armory() {
        let content = r#"
[armory]
slots = ["Normal", "PocketItem"]
dropped_item_lifetime = 30.0

[[armory.items]]
name = "Shotgun"
slot_kind = "Normal"

[armory.items.kind]
type = "Gun"
magazine_capacity = 8
penetration = 1
"#;
        let settings = Settings::parse(content).unwrap();
        assert_eq!(settings.armory.slots, vec![SlotKind::Normal, SlotKind::PocketItem]);
        let shotgun = settings.armory.archetype("Shotgun").unwrap();
        assert!(shotgun.pickupable && shotgun.droppable);
        match &shotgun.kind {
            loadout_game::ArchetypeKind::Gun(weapon) => {
                assert_eq!(weapon.magazine_capacity, 8);
                assert_eq!(weapon.max_range, 250.0);
            }
            other => panic!("expected a gun, got {:?}", other),
        }
    }

    fn make_temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("loadout-{}-{}.toml", name, std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let path = make_temp_file("invalid", "[demo]\nseed = \"three\"\n");
        let (settings, outcome) = Settings::load_from(path.clone());
        fs::remove_file(&path).unwrap();
        assert_eq!(settings.demo.seed, 42);
        assert!(matches!(&outcome, LoadOutcome::Invalid { path: p, .. } if *p == path));
    }

    #[test]
    fn test_valid_file_is_loaded() {
        let path = make_temp_file("valid", "[demo]\nseed = 9\n");
        let (settings, outcome) = Settings::load_from(path.clone());
        fs::remove_file(&path).unwrap();
        assert_eq!(settings.demo.seed, 9);
        assert_eq!(outcome, LoadOutcome::Loaded(path));
    }

    #[test]
    fn test_missing_file_reported() {
        let path = std::env::temp_dir().join("loadout-does-not-exist.toml");
        let (settings, outcome) = Settings::load_from(path.clone());
        assert_eq!(settings.demo.duration, 6.0);
        assert_eq!(outcome, LoadOutcome::Missing(path));
    }

    #[test]
    fn test_default_settings_round_trip_through_toml() {
        let content = toml::to_string_pretty(&Settings::default()).unwrap();
        let parsed = Settings::parse(&content).unwrap();
        assert_eq!(parsed.armory.items.len(), Settings::default().armory.items.len());
    }
}
