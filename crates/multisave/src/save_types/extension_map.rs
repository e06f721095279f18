use std::collections::BTreeMap;

use bevy::prelude::*;
use bitcode::{Decode, DecodeOwned, Encode};

/// Keyed bitcode blobs; the shape of the persistent save and local profile.
///
/// Game code stores whatever it needs under its own key. A blob that no
/// longer decodes is reported and treated as absent.
#[derive(Debug, Clone, PartialEq, Default, Encode, Decode)]
pub struct ExtensionMap {
    entries: BTreeMap<String, Vec<u8>>,
}

/// Cross-level data stored per slot in `Persistent.sav`.
pub type PersistentSave = ExtensionMap;

/// Slot-independent data stored in `LocalProfile.sav`.
pub type LocalProfile = ExtensionMap;

impl ExtensionMap {
    pub fn set<T: Encode>(&mut self, key: &str, value: &T) {
        self.entries.insert(key.to_string(), bitcode::encode(value));
    }

    pub fn get<T: DecodeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.entries.get(key)?;
        match bitcode::decode(bytes) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    "Extension {}: failed to decode {} bytes, treating as absent: {}",
                    key,
                    bytes.len(),
                    e
                );
                None
            }
        }
    }

    pub fn get_or_default<T: DecodeOwned + Default>(&self, key: &str) -> T {
        self.get(key).unwrap_or_default()
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Encode, Decode, Debug, PartialEq, Default)]
    struct Unlocks {
        chapters: Vec<u8>,
        hard_mode: bool,
    }

    #[test]
    fn test_typed_set_get() {
        let mut map = ExtensionMap::default();
        let unlocks = Unlocks {
            chapters: vec![1, 2, 5],
            hard_mode: true,
        };
        map.set("unlocks", &unlocks);
        map.set("coins", &250u32);

        assert_eq!(map.get::<Unlocks>("unlocks"), Some(unlocks));
        assert_eq!(map.get::<u32>("coins"), Some(250));
        assert_eq!(map.get::<u32>("missing"), None);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["coins", "unlocks"]);
    }

    #[test]
    fn test_undecodable_blob_is_absent() {
        let mut map = ExtensionMap::default();
        map.set("name", &7u8);
        assert_eq!(map.get::<Unlocks>("name"), None);
        assert_eq!(map.get_or_default::<Unlocks>("name"), Unlocks::default());
    }

    #[test]
    fn test_remove() {
        let mut map = ExtensionMap::default();
        map.set("k", &1u8);
        assert!(map.remove("k"));
        assert!(!map.remove("k"));
        assert!(map.is_empty());
    }
}
