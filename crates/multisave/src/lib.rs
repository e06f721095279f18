// Generated `SaveFields` impls name this crate by path.
#[allow(unused_extern_crates)]
extern crate self as multisave;

pub mod actor;
pub mod archive_io;
mod atomic_write;
pub mod classify;
pub mod field_codec;
pub mod field_discovery;
mod field_table;
mod field_value;
pub mod file_header;
pub mod level_load;
pub mod level_save;
pub mod player_stage;
mod save_error;
pub mod save_paths;
mod save_plugin;
pub mod save_slots;
pub mod save_types;
pub mod settings;
pub mod snapshot;
pub mod spawn_registry;
pub mod tasks;
mod world_ext;

#[cfg(test)]
mod tests;

pub use actor::{
    ActorKind, ChildActor, ControlRotation, Mobility, PlayerName, SaveActor, SaveComponent,
    SaveFlags, SaveObject,
};
pub use field_table::{FieldSet, FieldTable};
pub use field_value::{
    FieldDescriptor, FieldKind, FieldValue, SaveValue, ScalarKind, StructType, StructValue,
};
pub use level_load::LoadReport;
pub use save_error::SaveError;
pub use save_fields_derive::SaveFields;
pub use save_plugin::{LoadRequest, MultiSavePlugin, SaveRequest};
pub use save_slots::MultiSave;
pub use settings::{FileNaming, LevelContext, LoadMethod, LocalPlayer, MultiSaveSettings};
pub use spawn_registry::{ActorType, SpawnAppExt, SpawnRegistry};
pub use tasks::{AsyncTasks, LoadFinished, SaveFinished, SaveScope, TaskId, WaitFinished};
pub use world_ext::MultiSaveWorldExt;
