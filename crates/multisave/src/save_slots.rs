// ---------------------------------------------------------------------------
// Slot/user selection, cached slot objects and slot management
// ---------------------------------------------------------------------------

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use bevy::prelude::*;

use crate::archive_io::{read_archive_or_warn, write_archive};
use crate::atomic_write::atomic_write;
use crate::save_paths::{DataFile, SavePaths};
use crate::save_types::{LocalProfile, PersistentSave, SlotInfo};
use crate::settings::{MultiSaveSettings, SlotSelection};

/// Per-world save state: the active slot and user, plus the decoded slot
/// objects cached for them. Changing the slot or user drops the caches.
#[derive(Resource, Debug, Default)]
pub struct MultiSave {
    current_slot: String,
    current_user: String,
    slot_info: Option<SlotInfo>,
    persistent: Option<PersistentSave>,
    profile: Option<LocalProfile>,
}

impl MultiSave {
    /// Names in a stored selection that are not a single path component are
    /// ignored.
    pub fn from_selection(selection: SlotSelection) -> Self {
        let checked = |kind: &str, name: String| {
            if name.is_empty() || is_valid_name(&name) {
                name
            } else {
                warn!("Ignoring stored {} name '{}'", kind, name);
                String::new()
            }
        };
        Self {
            current_slot: checked("slot", selection.slot),
            current_user: checked("user", selection.user),
            ..Default::default()
        }
    }

    /// The active slot, or the configured default while none is set.
    pub fn current_slot_name(&self, settings: &MultiSaveSettings) -> String {
        if self.current_slot.is_empty() {
            settings.default_slot_name.clone()
        } else {
            self.current_slot.clone()
        }
    }

    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    pub fn paths(&self, settings: &MultiSaveSettings) -> SavePaths {
        SavePaths::new(settings, &self.current_user)
    }

    pub(crate) fn invalidate(&mut self) {
        self.slot_info = None;
        self.persistent = None;
    }

    fn store_selection(&self, settings: &MultiSaveSettings) {
        SlotSelection {
            slot: self.current_slot.clone(),
            user: self.current_user.clone(),
        }
        .store(&settings.save_root);
    }

    /// Returns false when `name` already is the active slot or is not a
    /// single path component. An empty name selects the default slot.
    pub fn set_current_slot(&mut self, settings: &MultiSaveSettings, name: &str) -> bool {
        if self.current_slot == name {
            return false;
        }
        if !name.is_empty() && !is_valid_name(name) {
            warn!("Refusing slot name '{}'", name);
            return false;
        }
        let old_slot = self.current_slot_name(settings);
        self.invalidate();
        self.current_slot = name.to_string();
        self.store_selection(settings);
        info!("New current save slot is: {}", name);

        if settings.copy_persistent_save {
            let paths = self.paths(settings);
            let from = paths.data_file(&old_slot, DataFile::Persistent);
            let to = paths.data_file(&self.current_slot_name(settings), DataFile::Persistent);
            if from != to && from.exists() {
                match fs::read(&from).and_then(|bytes| atomic_write(&to, &bytes)) {
                    Ok(()) => info!("Copied persistent save from '{}' to '{}'", old_slot, name),
                    Err(e) => warn!("Failed to copy persistent save to '{}': {}", name, e),
                }
            }
        }
        true
    }

    /// Returns false when `name` already is the active user or is not a
    /// single path component. An empty name leaves the per-user namespace.
    pub fn set_current_user(&mut self, settings: &MultiSaveSettings, name: &str) -> bool {
        if self.current_user == name {
            return false;
        }
        if !name.is_empty() && !is_valid_name(name) {
            warn!("Refusing user name '{}'", name);
            return false;
        }
        self.invalidate();
        // The profile lives under the user's base directory.
        self.profile = None;
        self.current_user = name.to_string();
        self.store_selection(settings);
        info!("New current save user is: {}", name);
        true
    }

    /// Slot info of the active slot, read from disk on first use.
    pub fn slot_info(&mut self, settings: &MultiSaveSettings) -> &SlotInfo {
        let path = self
            .paths(settings)
            .data_file(&self.current_slot_name(settings), DataFile::Slot);
        self.slot_info
            .get_or_insert_with(|| read_archive_or_warn(&path).unwrap_or_default())
    }

    /// Slot info of any slot, read from disk without caching.
    pub fn named_slot_info(&self, settings: &MultiSaveSettings, slot: &str) -> Option<SlotInfo> {
        read_archive_or_warn(&self.paths(settings).data_file(slot, DataFile::Slot))
    }

    /// Stamp and write the active slot's info.
    pub fn save_slot_info(
        &mut self,
        settings: &MultiSaveSettings,
        level: &str,
        players: Vec<String>,
    ) -> bool {
        let slot = self.current_slot_name(settings);
        let info = SlotInfo::now(&slot, level, players);
        let path = self.paths(settings).data_file(&slot, DataFile::Slot);
        let ok = match write_archive(&path, &info) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save slot info for '{}': {}", slot, e);
                false
            }
        };
        self.slot_info = Some(info);
        ok
    }

    pub fn persistent(&mut self, settings: &MultiSaveSettings) -> &mut PersistentSave {
        let path = self
            .paths(settings)
            .data_file(&self.current_slot_name(settings), DataFile::Persistent);
        self.persistent
            .get_or_insert_with(|| read_archive_or_warn(&path).unwrap_or_default())
    }

    /// Write the persistent save of the active slot.
    pub fn save_persistent(&mut self, settings: &MultiSaveSettings) -> bool {
        let slot = self.current_slot_name(settings);
        let path = self.paths(settings).data_file(&slot, DataFile::Persistent);
        let data = self.persistent(settings);
        match write_archive(&path, data) {
            Ok(()) => {
                info!("Persistent save written for '{}'", slot);
                true
            }
            Err(e) => {
                error!("Failed to write persistent save for '{}': {}", slot, e);
                false
            }
        }
    }

    pub fn profile(&mut self, settings: &MultiSaveSettings) -> &mut LocalProfile {
        let path = self.paths(settings).profile_file();
        self.profile
            .get_or_insert_with(|| read_archive_or_warn(&path).unwrap_or_default())
    }

    pub fn save_profile(&mut self, settings: &MultiSaveSettings) -> bool {
        let path = self.paths(settings).profile_file();
        let data = self.profile(settings);
        match write_archive(&path, data) {
            Ok(()) => {
                info!("Local profile saved");
                true
            }
            Err(e) => {
                error!("Failed to write local profile: {}", e);
                false
            }
        }
    }
}

/// Slot and user names must be a single path component.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

fn subdirectories(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .collect()
}

/// Slot names, newest slot-info file first.
pub fn list_slots(paths: &SavePaths) -> Vec<String> {
    let mut slots: Vec<(SystemTime, String)> = subdirectories(&paths.base_dir())
        .into_iter()
        .map(|slot| {
            let modified = fs::metadata(paths.data_file(&slot, DataFile::Slot))
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, slot)
        })
        .collect();
    slots.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    slots.into_iter().map(|(_, slot)| slot).collect()
}

pub fn list_users(paths: &SavePaths) -> Vec<String> {
    let mut users = subdirectories(&paths.user_root());
    users.sort();
    users
}

pub fn does_slot_exist(paths: &SavePaths, slot: &str) -> bool {
    is_valid_name(slot) && paths.slot_dir(slot).is_dir()
}

pub fn delete_slot(paths: &SavePaths, slot: &str) -> bool {
    if !is_valid_name(slot) {
        return false;
    }
    match fs::remove_dir_all(paths.slot_dir(slot)) {
        Ok(()) => {
            info!("Save data removed for slot '{}'", slot);
            true
        }
        Err(e) => {
            warn!("Failed to remove slot '{}': {}", slot, e);
            false
        }
    }
}

/// Remove every slot of `user`. The active user cannot be deleted.
pub fn delete_user(paths: &SavePaths, current_user: &str, user: &str) -> bool {
    if user == current_user {
        warn!("Refusing to delete the active save user '{}'", user);
        return false;
    }
    if !is_valid_name(user) {
        return false;
    }
    match fs::remove_dir_all(paths.user_root().join(user)) {
        Ok(()) => {
            info!("Save data removed for user '{}'", user);
            true
        }
        Err(e) => {
            warn!("Failed to remove user '{}': {}", user, e);
            false
        }
    }
}

pub fn import_thumbnail(paths: &SavePaths, slot: &str) -> Option<Vec<u8>> {
    if !is_valid_name(slot) {
        return None;
    }
    // A slot without a thumbnail yet is normal.
    fs::read(paths.thumbnail_file(slot)).ok()
}

pub fn export_thumbnail(paths: &SavePaths, slot: &str, image: &[u8]) -> bool {
    if !is_valid_name(slot) {
        return false;
    }
    let path = paths.thumbnail_file(slot);
    match atomic_write(&path, image) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to write thumbnail {}: {}", path.display(), e);
            false
        }
    }
}
