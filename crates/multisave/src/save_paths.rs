//! On-disk layout.
//!
//! ```text
//! <save_root>/SaveGames/<slot>/Level.sav                (no user)
//! <save_root>/UserSaveGames/<user>/<slot>/Level.sav     (per-user)
//! <base>/LocalProfile.sav
//! ```
//!
//! Legacy naming prefixes every file in the slot directory with the slot
//! name (`<slot>_Level.sav`, `<slot>.png`).

use std::path::{Path, PathBuf};

use crate::settings::{FileNaming, MultiSaveSettings};

const SAVE_EXT: &str = "sav";
const SAVE_GAMES_DIR: &str = "SaveGames";
const USER_SAVE_GAMES_DIR: &str = "UserSaveGames";
const LOCAL_PROFILE_NAME: &str = "LocalProfile";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFile {
    Player,
    Level,
    Slot,
    Persistent,
}

impl DataFile {
    pub fn suffix(self) -> &'static str {
        match self {
            DataFile::Player => "Player",
            DataFile::Level => "Level",
            DataFile::Slot => "Slot",
            DataFile::Persistent => "Persistent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePaths {
    root: PathBuf,
    user: String,
    naming: FileNaming,
}

impl SavePaths {
    pub fn new(settings: &MultiSaveSettings, user: &str) -> Self {
        Self {
            root: settings.save_root.clone(),
            user: user.to_string(),
            naming: settings.file_naming,
        }
    }

    /// Parent of every per-user directory.
    pub fn user_root(&self) -> PathBuf {
        self.root.join(USER_SAVE_GAMES_DIR)
    }

    /// Directory holding the slot directories of the active user.
    pub fn base_dir(&self) -> PathBuf {
        if self.user.is_empty() {
            self.root.join(SAVE_GAMES_DIR)
        } else {
            self.user_root().join(&self.user)
        }
    }

    pub fn slot_dir(&self, slot: &str) -> PathBuf {
        self.base_dir().join(slot)
    }

    pub fn data_file(&self, slot: &str, kind: DataFile) -> PathBuf {
        let file = match self.naming {
            FileNaming::Legacy => format!("{slot}_{}.{SAVE_EXT}", kind.suffix()),
            FileNaming::Optimized => format!("{}.{SAVE_EXT}", kind.suffix()),
        };
        self.slot_dir(slot).join(file)
    }

    pub fn thumbnail_file(&self, slot: &str) -> PathBuf {
        let file = match self.naming {
            FileNaming::Legacy => format!("{slot}.png"),
            FileNaming::Optimized => "thumb.png".to_string(),
        };
        self.slot_dir(slot).join(file)
    }

    pub fn profile_file(&self) -> PathBuf {
        self.base_dir()
            .join(format!("{LOCAL_PROFILE_NAME}.{SAVE_EXT}"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(naming: FileNaming, user: &str) -> SavePaths {
        let settings = MultiSaveSettings {
            save_root: PathBuf::from("/saved"),
            file_naming: naming,
            ..Default::default()
        };
        SavePaths::new(&settings, user)
    }

    #[test]
    fn test_optimized_layout() {
        let p = paths(FileNaming::Optimized, "");
        assert_eq!(
            p.data_file("Run1", DataFile::Level),
            PathBuf::from("/saved/SaveGames/Run1/Level.sav")
        );
        assert_eq!(
            p.thumbnail_file("Run1"),
            PathBuf::from("/saved/SaveGames/Run1/thumb.png")
        );
        assert_eq!(
            p.profile_file(),
            PathBuf::from("/saved/SaveGames/LocalProfile.sav")
        );
    }

    #[test]
    fn test_legacy_layout() {
        let p = paths(FileNaming::Legacy, "");
        assert_eq!(
            p.data_file("Run1", DataFile::Persistent),
            PathBuf::from("/saved/SaveGames/Run1/Run1_Persistent.sav")
        );
        assert_eq!(
            p.thumbnail_file("Run1"),
            PathBuf::from("/saved/SaveGames/Run1/Run1.png")
        );
    }

    #[test]
    fn test_user_namespace() {
        let p = paths(FileNaming::Optimized, "ada");
        assert_eq!(
            p.data_file("Run1", DataFile::Slot),
            PathBuf::from("/saved/UserSaveGames/ada/Run1/Slot.sav")
        );
        assert_eq!(
            p.profile_file(),
            PathBuf::from("/saved/UserSaveGames/ada/LocalProfile.sav")
        );
        assert_eq!(p.user_root(), PathBuf::from("/saved/UserSaveGames"));
    }
}
