// ---------------------------------------------------------------------------
// Configuration and world-context resources
// ---------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::atomic_write::atomic_write;

/// How the level step applies many actor records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadMethod {
    /// All records in one tick.
    #[default]
    Immediate,
    /// `deferred_batch_size` records per tick.
    Deferred,
    /// Decode every record on a worker, then apply all in one tick.
    Threaded,
}

/// File naming scheme inside a slot directory. Incompatible at read time:
/// a shipped game must never change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileNaming {
    /// `<slot>_Level.sav`, `<slot>.png`
    Legacy,
    /// `Level.sav`, `thumb.png`
    #[default]
    Optimized,
}

/// Engine settings, loaded once at startup.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiSaveSettings {
    /// Directory holding `SaveGames/`, `UserSaveGames/` and `MultiSave.json`.
    pub save_root: PathBuf,
    /// Slot used while no slot name has been set.
    pub default_slot_name: String,
    /// Keep the player's pose across levels instead of restoring it.
    pub persistent_player: bool,
    /// Apply game-mode and game-state records in any level.
    pub persistent_game_mode: bool,
    /// Copy `Persistent.sav` into a newly selected slot.
    pub copy_persistent_save: bool,
    /// Before spawning, look for a live entity already carrying the identity.
    pub advanced_spawn_check: bool,
    /// Encode and write archives on a worker thread.
    pub multi_thread_saving: bool,
    pub load_method: LoadMethod,
    pub deferred_batch_size: usize,
    pub file_naming: FileNaming,
}

impl Default for MultiSaveSettings {
    fn default() -> Self {
        Self {
            save_root: PathBuf::from("Saved"),
            default_slot_name: "MySaveGame".to_string(),
            persistent_player: false,
            persistent_game_mode: false,
            copy_persistent_save: false,
            advanced_spawn_check: false,
            multi_thread_saving: false,
            load_method: LoadMethod::Immediate,
            deferred_batch_size: 15,
            file_naming: FileNaming::Optimized,
        }
    }
}

impl MultiSaveSettings {
    /// Load settings from a JSON file, falling back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Invalid settings in {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn batch_size(&self) -> usize {
        self.deferred_batch_size.max(1)
    }
}

/// Slot and user selection, written back whenever either changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotSelection {
    pub slot: String,
    pub user: String,
}

impl SlotSelection {
    pub const FILE_NAME: &'static str = "MultiSave.json";

    pub fn path(save_root: &Path) -> PathBuf {
        save_root.join(Self::FILE_NAME)
    }

    pub fn load(save_root: &Path) -> Self {
        let path = Self::path(save_root);
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Invalid slot selection in {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn store(&self, save_root: &Path) {
        let path = Self::path(save_root);
        let result = serde_json::to_vec_pretty(self)
            .map_err(std::io::Error::other)
            .and_then(|bytes| atomic_write(&path, &bytes));
        if let Err(e) = result {
            warn!("Failed to write {}: {}", path.display(), e);
        }
    }
}

/// The level the world is currently in, and how it is being run.
#[derive(Resource, Debug, Clone, PartialEq, Default)]
pub struct LevelContext {
    pub level_name: String,
    /// Session decoration prepended to streamed level names (e.g. `UEDPIE_0_`).
    pub streaming_prefix: String,
    /// This world is authoritative over other observers.
    pub authority: bool,
    pub paused: bool,
}

impl LevelContext {
    pub fn new(level_name: impl Into<String>) -> Self {
        Self {
            level_name: level_name.into(),
            ..Default::default()
        }
    }

    /// Level name with the session prefix stripped.
    pub fn canonical_level(&self) -> String {
        canonical_name(&self.level_name, &self.streaming_prefix)
    }
}

pub fn canonical_name(name: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return name.to_string();
    }
    name.strip_prefix(prefix).unwrap_or(name).to_string()
}

/// The local player's entities.
#[derive(Resource, Debug, Clone, Default)]
pub struct LocalPlayer {
    pub controller: Option<Entity>,
    pub pawn: Option<Entity>,
    pub player_state: Option<Entity>,
    /// Primary viewpoint used to order reconciliation by distance.
    pub viewpoint: Option<Vec3>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("multisave_settings_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults() {
        let s = MultiSaveSettings::default();
        assert_eq!(s.default_slot_name, "MySaveGame");
        assert_eq!(s.deferred_batch_size, 15);
        assert_eq!(s.file_naming, FileNaming::Optimized);
        assert_eq!(s.load_method, LoadMethod::Immediate);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let dir = test_dir("partial");
        let path = dir.join("settings.json");
        std::fs::write(
            &path,
            r#"{ "load_method": "Deferred", "deferred_batch_size": 4, "file_naming": "Legacy" }"#,
        )
        .unwrap();

        let s = MultiSaveSettings::load_or_default(&path);
        assert_eq!(s.load_method, LoadMethod::Deferred);
        assert_eq!(s.deferred_batch_size, 4);
        assert_eq!(s.file_naming, FileNaming::Legacy);
        assert_eq!(s.default_slot_name, "MySaveGame");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_json_falls_back() {
        let dir = test_dir("invalid");
        let path = dir.join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(
            MultiSaveSettings::load_or_default(&path),
            MultiSaveSettings::default()
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let s = MultiSaveSettings {
            deferred_batch_size: 0,
            ..Default::default()
        };
        assert_eq!(s.batch_size(), 1);
    }

    #[test]
    fn test_slot_selection_roundtrip() {
        let dir = test_dir("selection");
        let sel = SlotSelection {
            slot: "Run2".into(),
            user: "ada".into(),
        };
        sel.store(&dir);
        assert_eq!(SlotSelection::load(&dir), sel);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_canonical_level_strips_prefix() {
        let ctx = LevelContext {
            level_name: "UEDPIE_0_Overworld".into(),
            streaming_prefix: "UEDPIE_0_".into(),
            ..Default::default()
        };
        assert_eq!(ctx.canonical_level(), "Overworld");
        assert_eq!(canonical_name("Overworld", "UEDPIE_0_"), "Overworld");
        assert_eq!(canonical_name("Overworld", ""), "Overworld");
    }
}
