// ---------------------------------------------------------------------------
// World extension: the caller-facing save/load surface
// ---------------------------------------------------------------------------

use bevy::prelude::*;

use crate::actor::{SaveActor, SaveFlags};
use crate::save_error::SaveError;
use crate::save_paths::SavePaths;
use crate::save_slots::{self, MultiSave};
use crate::save_types::{LocalProfile, PersistentSave, SlotInfo};
use crate::settings::{LevelContext, MultiSaveSettings, SlotSelection};
use crate::tasks::{ActiveTask, AsyncTasks, LoadTask, SaveScope, SaveTask, TaskId, TaskMode, WaitTask};

/// Save/load operations on a `World` that has `MultiSavePlugin`.
///
/// # Example
///
/// ```ignore
/// use multisave::{MultiSaveWorldExt, SaveScope};
///
/// world.set_current_slot("Run2");
/// let task = world.start_save(SaveScope::ALL)?;
/// ```
pub trait MultiSaveWorldExt {
    /// Queue a save. Refused while paused or while an overlapping save or
    /// load is active.
    fn start_save(&mut self, scope: SaveScope) -> Result<TaskId, SaveError>;

    /// Queue a load. With `full_reload`, actors already loaded in this
    /// session are loaded again.
    fn start_load(&mut self, scope: SaveScope, full_reload: bool) -> Result<TaskId, SaveError>;

    /// Queue a task that finishes once no save or load is active.
    fn wait_for_tasks(&mut self) -> TaskId;

    fn is_save_or_load_active(&self) -> bool;

    fn current_slot_name(&self) -> String;
    fn set_current_slot(&mut self, name: &str);
    fn set_current_user(&mut self, name: &str);

    fn list_slots(&self) -> Vec<String>;
    fn list_users(&self) -> Vec<String>;
    fn delete_slot(&mut self, name: &str) -> bool;
    fn delete_user(&mut self, name: &str) -> bool;
    fn does_slot_exist(&self, name: &str) -> bool;

    fn slot_info(&mut self) -> SlotInfo;
    fn named_slot_info(&self, name: &str) -> Option<SlotInfo>;

    fn with_persistent<R>(&mut self, f: impl FnOnce(&mut PersistentSave) -> R) -> R;
    fn save_persistent(&mut self) -> bool;
    fn with_local_profile<R>(&mut self, f: impl FnOnce(&mut LocalProfile) -> R) -> R;
    fn save_local_profile(&mut self) -> bool;

    fn import_thumbnail(&self, slot: &str) -> Option<Vec<u8>>;
    fn export_thumbnail(&self, slot: &str, image: &[u8]) -> bool;

    /// The only way to change an actor's classification flags after spawn.
    fn set_entity_save_properties(&mut self, entity: Entity, flags: SaveFlags) -> Result<(), SaveError>;
}

fn settings(world: &World) -> MultiSaveSettings {
    world
        .get_resource::<MultiSaveSettings>()
        .cloned()
        .unwrap_or_default()
}

fn paths(world: &World) -> SavePaths {
    let settings = settings(world);
    match world.get_resource::<MultiSave>() {
        Some(state) => state.paths(&settings),
        None => SavePaths::new(&settings, ""),
    }
}

fn with_state<R>(world: &mut World, f: impl FnOnce(&MultiSaveSettings, &mut MultiSave) -> R) -> R {
    let settings = settings(world);
    if !world.contains_resource::<MultiSave>() {
        let selection = SlotSelection::load(&settings.save_root);
        world.insert_resource(MultiSave::from_selection(selection));
    }
    let mut state = world.resource_mut::<MultiSave>();
    f(&settings, &mut state)
}

fn start_task(
    world: &mut World,
    mode: TaskMode,
    make: impl FnOnce(TaskId) -> ActiveTask,
) -> Result<TaskId, SaveError> {
    let paused = world
        .get_resource::<LevelContext>()
        .is_some_and(|ctx| ctx.paused);
    if paused {
        warn!("Save or load requested while paused, ignored");
        return Err(SaveError::WorldPaused);
    }
    world.init_resource::<AsyncTasks>();
    let mut tasks = world.resource_mut::<AsyncTasks>();
    if tasks.overlaps(mode) {
        warn!("A save or load overlapping {:?} is active, ignored", mode);
        return Err(SaveError::OverlappingOperation);
    }
    let id = tasks.next_id();
    Ok(tasks.push(make(id)))
}

impl MultiSaveWorldExt for World {
    fn start_save(&mut self, scope: SaveScope) -> Result<TaskId, SaveError> {
        let id = start_task(self, scope.mode(), |id| {
            ActiveTask::Save(SaveTask::new(id, scope))
        })?;
        debug!("Save {:?} started ({:?})", id, scope.mode());
        Ok(id)
    }

    fn start_load(&mut self, scope: SaveScope, full_reload: bool) -> Result<TaskId, SaveError> {
        let id = start_task(self, scope.mode(), |id| {
            ActiveTask::Load(LoadTask::new(id, scope, full_reload))
        })?;
        debug!("Load {:?} started ({:?})", id, scope.mode());
        Ok(id)
    }

    fn wait_for_tasks(&mut self) -> TaskId {
        self.init_resource::<AsyncTasks>();
        let mut tasks = self.resource_mut::<AsyncTasks>();
        let id = tasks.next_id();
        tasks.push(ActiveTask::Wait(WaitTask::new(id)))
    }

    fn is_save_or_load_active(&self) -> bool {
        self.get_resource::<AsyncTasks>()
            .is_some_and(AsyncTasks::is_save_or_load_active)
    }

    fn current_slot_name(&self) -> String {
        let settings = settings(self);
        match self.get_resource::<MultiSave>() {
            Some(state) => state.current_slot_name(&settings),
            None => settings.default_slot_name,
        }
    }

    fn set_current_slot(&mut self, name: &str) {
        with_state(self, |settings, state| state.set_current_slot(settings, name));
    }

    fn set_current_user(&mut self, name: &str) {
        with_state(self, |settings, state| state.set_current_user(settings, name));
    }

    fn list_slots(&self) -> Vec<String> {
        save_slots::list_slots(&paths(self))
    }

    fn list_users(&self) -> Vec<String> {
        save_slots::list_users(&paths(self))
    }

    fn delete_slot(&mut self, name: &str) -> bool {
        let deleted = save_slots::delete_slot(&paths(self), name);
        if deleted && self.current_slot_name() == name {
            with_state(self, |_, state| state.invalidate());
        }
        deleted
    }

    fn delete_user(&mut self, name: &str) -> bool {
        let current = self
            .get_resource::<MultiSave>()
            .map(|s| s.current_user().to_string())
            .unwrap_or_default();
        save_slots::delete_user(&paths(self), &current, name)
    }

    fn does_slot_exist(&self, name: &str) -> bool {
        save_slots::does_slot_exist(&paths(self), name)
    }

    fn slot_info(&mut self) -> SlotInfo {
        with_state(self, |settings, state| state.slot_info(settings).clone())
    }

    fn named_slot_info(&self, name: &str) -> Option<SlotInfo> {
        let settings = settings(self);
        match self.get_resource::<MultiSave>() {
            Some(state) => state.named_slot_info(&settings, name),
            None => MultiSave::default().named_slot_info(&settings, name),
        }
    }

    fn with_persistent<R>(&mut self, f: impl FnOnce(&mut PersistentSave) -> R) -> R {
        with_state(self, |settings, state| f(state.persistent(settings)))
    }

    fn save_persistent(&mut self) -> bool {
        with_state(self, |settings, state| state.save_persistent(settings))
    }

    fn with_local_profile<R>(&mut self, f: impl FnOnce(&mut LocalProfile) -> R) -> R {
        with_state(self, |settings, state| f(state.profile(settings)))
    }

    fn save_local_profile(&mut self) -> bool {
        with_state(self, |settings, state| state.save_profile(settings))
    }

    fn import_thumbnail(&self, slot: &str) -> Option<Vec<u8>> {
        save_slots::import_thumbnail(&paths(self), slot)
    }

    fn export_thumbnail(&self, slot: &str, image: &[u8]) -> bool {
        save_slots::export_thumbnail(&paths(self), slot, image)
    }

    fn set_entity_save_properties(&mut self, entity: Entity, flags: SaveFlags) -> Result<(), SaveError> {
        let Some(mut actor) = self.get_mut::<SaveActor>(entity) else {
            return Err(SaveError::MissingCapability(format!("{entity:?}")));
        };
        actor.set_flags(flags);
        Ok(())
    }
}
