use std::path::PathBuf;

use bevy::prelude::*;

use crate::save_slots::MultiSave;
use crate::settings::{LevelContext, LocalPlayer, MultiSaveSettings, SlotSelection};
use crate::spawn_registry::SpawnRegistry;
use crate::tasks::{drive_tasks, AsyncTasks, LoadFinished, SaveFinished, SaveScope, WaitFinished};
use crate::world_ext::MultiSaveWorldExt;

// ---------------------------------------------------------------------------
// Request events
// ---------------------------------------------------------------------------

/// Starts a save on the next `Update`, as `start_save` would.
#[derive(Event, Debug, Clone, Copy)]
pub struct SaveRequest {
    pub scope: SaveScope,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct LoadRequest {
    pub scope: SaveScope,
    pub full_reload: bool,
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Registers the save resources, events and the task driver.
///
/// Settings come from `settings_file` when given; otherwise an already
/// inserted `MultiSaveSettings` is kept, or defaults are used.
#[derive(Default)]
pub struct MultiSavePlugin {
    pub settings_file: Option<PathBuf>,
}

impl Plugin for MultiSavePlugin {
    fn build(&self, app: &mut App) {
        let settings = match &self.settings_file {
            Some(path) => MultiSaveSettings::load_or_default(path),
            None => app
                .world()
                .get_resource::<MultiSaveSettings>()
                .cloned()
                .unwrap_or_default(),
        };
        if !app.world().contains_resource::<MultiSave>() {
            let selection = SlotSelection::load(&settings.save_root);
            app.insert_resource(MultiSave::from_selection(selection));
        }

        app.insert_resource(settings)
            .init_resource::<AsyncTasks>()
            .init_resource::<SpawnRegistry>()
            .init_resource::<LevelContext>()
            .init_resource::<LocalPlayer>()
            .add_event::<SaveRequest>()
            .add_event::<LoadRequest>()
            .add_event::<SaveFinished>()
            .add_event::<LoadFinished>()
            .add_event::<WaitFinished>();

        // Requests are turned into tasks first, so a task requested this
        // frame takes its first step this frame.
        app.add_systems(Update, (start_requested_tasks, drive_tasks).chain());
    }
}

/// Exclusive system draining `SaveRequest`/`LoadRequest`.
fn start_requested_tasks(world: &mut World) {
    let saves: Vec<SaveRequest> = world
        .get_resource_mut::<Events<SaveRequest>>()
        .map(|mut events| events.drain().collect())
        .unwrap_or_default();
    let loads: Vec<LoadRequest> = world
        .get_resource_mut::<Events<LoadRequest>>()
        .map(|mut events| events.drain().collect())
        .unwrap_or_default();

    for request in saves {
        if let Err(e) = world.start_save(request.scope) {
            warn!("Save request ignored: {}", e);
        }
    }
    for request in loads {
        if let Err(e) = world.start_load(request.scope, request.full_reload) {
            warn!("Load request ignored: {}", e);
        }
    }
}
