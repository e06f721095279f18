// ---------------------------------------------------------------------------
// Persisted record and archive types
// ---------------------------------------------------------------------------

mod archives;
mod extension_map;
mod records;
mod slot_info;

pub use archives::{ControllerRecord, LevelArchive, PawnRecord, PlayerArchive};
pub use extension_map::{ExtensionMap, LocalProfile, PersistentSave};
pub use records::{ActorRecord, Category, ObjectSnapshot, Pose, ScriptRecord, SubRecord};
pub use slot_info::SlotInfo;
