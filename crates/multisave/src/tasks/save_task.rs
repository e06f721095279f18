use std::path::PathBuf;

use bevy::prelude::*;

use super::worker::StepWorker;
use super::{SaveFinished, SaveScope, TaskId, TaskMode, TaskStatus};
use crate::actor::PlayerName;
use crate::archive_io::write_archive;
use crate::level_save::capture_level;
use crate::player_stage::capture_player;
use crate::save_error::SaveError;
use crate::save_paths::DataFile;
use crate::save_slots::MultiSave;
use crate::settings::{LevelContext, MultiSaveSettings};

type WriteWorker = StepWorker<Result<(), SaveError>>;

/// Files and threading chosen when the save started.
struct SaveTarget {
    slot: String,
    player_file: PathBuf,
    level_file: PathBuf,
    threaded: bool,
}

enum SaveStep {
    Prepare,
    SlotInfo,
    Player,
    PlayerWrite(WriteWorker),
    Level,
    LevelWrite(WriteWorker),
    Finish,
    Complete,
}

pub struct SaveTask {
    id: TaskId,
    scope: SaveScope,
    step: SaveStep,
    active: bool,
    target: Option<SaveTarget>,
}

impl SaveTask {
    pub fn new(id: TaskId, scope: SaveScope) -> Self {
        Self {
            id,
            scope,
            step: SaveStep::Prepare,
            active: true,
            target: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn mode(&self) -> TaskMode {
        self.scope.mode()
    }

    /// False from the finish step on.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(super) fn step(&mut self, world: &mut World) -> TaskStatus {
        match &mut self.step {
            SaveStep::Prepare => {
                self.target = prepare(world);
                self.step = if self.target.is_some() {
                    SaveStep::SlotInfo
                } else {
                    error!("Save {:?} aborted: MultiSave resources are missing", self.id);
                    SaveStep::Finish
                };
            }
            SaveStep::SlotInfo => {
                write_slot_info(world);
                self.step = SaveStep::Player;
            }
            SaveStep::Player => {
                self.step = match (&self.target, self.scope.has_player()) {
                    (Some(target), true) => {
                        let values = capture_player(world);
                        let path = target.player_file.clone();
                        SaveStep::PlayerWrite(StepWorker::spawn(target.threaded, move || {
                            write_archive(&path, &values.encode())
                        }))
                    }
                    _ => SaveStep::Level,
                };
            }
            SaveStep::PlayerWrite(worker) => {
                let Some(result) = worker.poll() else {
                    return TaskStatus::Running;
                };
                match result {
                    Ok(()) => info!("Player actors have been saved"),
                    Err(e) => error!("Failed to save player: {}", e),
                }
                self.step = SaveStep::Level;
            }
            SaveStep::Level => {
                self.step = match (&self.target, self.scope.has_level()) {
                    (Some(target), true) => {
                        let values = capture_level(world);
                        let path = target.level_file.clone();
                        SaveStep::LevelWrite(StepWorker::spawn(target.threaded, move || {
                            write_archive(&path, &values.encode())
                        }))
                    }
                    _ => SaveStep::Finish,
                };
            }
            SaveStep::LevelWrite(worker) => {
                let Some(result) = worker.poll() else {
                    return TaskStatus::Running;
                };
                match result {
                    Ok(()) => info!("Level actors have been saved"),
                    Err(e) => error!("Failed to save level: {}", e),
                }
                self.step = SaveStep::Finish;
            }
            SaveStep::Finish => {
                self.active = false;
                self.step = SaveStep::Complete;
            }
            SaveStep::Complete => {
                if let Some(target) = &self.target {
                    info!("Save of slot '{}' complete", target.slot);
                }
                world.send_event(SaveFinished { id: self.id });
                return TaskStatus::Done;
            }
        }
        TaskStatus::Running
    }
}

fn prepare(world: &World) -> Option<SaveTarget> {
    let settings = world.get_resource::<MultiSaveSettings>()?;
    let state = world.get_resource::<MultiSave>()?;
    let slot = state.current_slot_name(settings);
    let paths = state.paths(settings);
    Some(SaveTarget {
        player_file: paths.data_file(&slot, DataFile::Player),
        level_file: paths.data_file(&slot, DataFile::Level),
        threaded: settings.multi_thread_saving,
        slot,
    })
}

/// Slot info is written by every save, whatever its scope.
fn write_slot_info(world: &mut World) {
    let players: Vec<String> = {
        let mut q = world.query::<&PlayerName>();
        q.iter(world).map(|p| p.0.clone()).collect()
    };
    let level = world
        .get_resource::<LevelContext>()
        .map(LevelContext::canonical_level)
        .unwrap_or_default();
    let Some(settings) = world.get_resource::<MultiSaveSettings>().cloned() else {
        return;
    };
    if let Some(mut state) = world.get_resource_mut::<MultiSave>() {
        state.save_slot_info(&settings, &level, players);
    }
}
