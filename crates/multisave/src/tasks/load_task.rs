use std::path::PathBuf;

use bevy::prelude::*;

use super::worker::StepWorker;
use super::{LoadFinished, SaveScope, TaskId, TaskMode, TaskStatus};
use crate::actor::{ActorKind, SaveActor};
use crate::archive_io::read_archive;
use crate::level_load::{read_level, DecodedLevel, LevelReconciler, LoadReport};
use crate::player_stage::{apply_player, player_ready, PlayerValues};
use crate::save_error::SaveError;
use crate::save_paths::DataFile;
use crate::save_slots::MultiSave;
use crate::save_types::PlayerArchive;
use crate::settings::{LoadMethod, LocalPlayer, MultiSaveSettings};

struct LoadTarget {
    slot: String,
    player_file: PathBuf,
    level_file: PathBuf,
    method: LoadMethod,
    batch_size: usize,
}

enum LoadStep {
    Prepare,
    Start,
    Player,
    Level,
    LevelRead(StepWorker<Result<DecodedLevel, SaveError>>),
    LevelApply(LevelReconciler),
    Finish,
    Complete,
}

pub struct LoadTask {
    id: TaskId,
    scope: SaveScope,
    full_reload: bool,
    step: LoadStep,
    active: bool,
    target: Option<LoadTarget>,
    report: LoadReport,
    waiting_logged: bool,
}

impl LoadTask {
    pub fn new(id: TaskId, scope: SaveScope, full_reload: bool) -> Self {
        Self {
            id,
            scope,
            full_reload,
            step: LoadStep::Prepare,
            active: true,
            target: None,
            report: LoadReport::default(),
            waiting_logged: false,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn mode(&self) -> TaskMode {
        self.scope.mode()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn wait_for(&mut self, what: &'static str) -> TaskStatus {
        if !self.waiting_logged {
            debug!("Load {:?}: {}", self.id, SaveError::NotReady(what));
            self.waiting_logged = true;
        }
        TaskStatus::Running
    }

    pub(super) fn step(&mut self, world: &mut World) -> TaskStatus {
        match &mut self.step {
            LoadStep::Prepare => {
                if self.full_reload {
                    clear_loaded(world, self.scope);
                }
                self.target = prepare(world);
                self.step = if self.target.is_some() {
                    LoadStep::Start
                } else {
                    error!("Load {:?} aborted: MultiSave resources are missing", self.id);
                    LoadStep::Finish
                };
            }
            LoadStep::Start => {
                self.step = LoadStep::Player;
            }
            LoadStep::Player => {
                if self.scope.has_player() {
                    if !player_ready(world) {
                        return self.wait_for("player pawn");
                    }
                    self.waiting_logged = false;
                    if let Some(target) = &self.target {
                        self.report.players += load_player(world, &target.player_file);
                    }
                }
                self.step = LoadStep::Level;
            }
            LoadStep::Level => {
                if !self.scope.has_level() {
                    self.step = LoadStep::Finish;
                    return TaskStatus::Running;
                }
                if !game_mode_ready(world) {
                    return self.wait_for("game mode");
                }
                let Some(target) = &self.target else {
                    self.step = LoadStep::Finish;
                    return TaskStatus::Running;
                };
                self.step = match target.method {
                    LoadMethod::Threaded => {
                        let path = target.level_file.clone();
                        LoadStep::LevelRead(StepWorker::spawn(true, move || read_level(&path)))
                    }
                    LoadMethod::Immediate | LoadMethod::Deferred => {
                        match read_level_or_log(&target.level_file, read_level(&target.level_file)) {
                            Some(level) => {
                                let budget = match target.method {
                                    LoadMethod::Deferred => target.batch_size,
                                    _ => usize::MAX,
                                };
                                begin_level(world, level, budget, &mut self.report)
                            }
                            None => LoadStep::Finish,
                        }
                    }
                };
            }
            LoadStep::LevelRead(worker) => {
                let Some(result) = worker.poll() else {
                    return TaskStatus::Running;
                };
                let level = self
                    .target
                    .as_ref()
                    .and_then(|t| read_level_or_log(&t.level_file, result));
                self.step = match level {
                    Some(level) => begin_level(world, level, usize::MAX, &mut self.report),
                    None => LoadStep::Finish,
                };
            }
            LoadStep::LevelApply(reconciler) => {
                let budget = self.target.as_ref().map_or(usize::MAX, |t| t.batch_size);
                if reconciler.step(world, budget) {
                    merge_report(&mut self.report, reconciler.report());
                    self.step = LoadStep::Finish;
                }
            }
            LoadStep::Finish => {
                self.active = false;
                self.step = LoadStep::Complete;
            }
            LoadStep::Complete => {
                if let Some(target) = &self.target {
                    info!("Load of slot '{}' complete", target.slot);
                }
                world.send_event(LoadFinished {
                    id: self.id,
                    report: self.report,
                });
                return TaskStatus::Done;
            }
        }
        TaskStatus::Running
    }
}

fn prepare(world: &World) -> Option<LoadTarget> {
    let settings = world.get_resource::<MultiSaveSettings>()?;
    let state = world.get_resource::<MultiSave>()?;
    let slot = state.current_slot_name(settings);
    let paths = state.paths(settings);
    Some(LoadTarget {
        player_file: paths.data_file(&slot, DataFile::Player),
        level_file: paths.data_file(&slot, DataFile::Level),
        method: settings.load_method,
        batch_size: settings.batch_size(),
        slot,
    })
}

/// Clear the loaded marker on everything the load covers.
fn clear_loaded(world: &mut World, scope: SaveScope) {
    let player = world
        .get_resource::<LocalPlayer>()
        .cloned()
        .unwrap_or_default();
    let player_entities = [player.controller, player.pawn, player.player_state];
    let mut q = world.query::<(Entity, &mut SaveActor)>();
    for (entity, mut actor) in q.iter_mut(world) {
        let is_player = player_entities.contains(&Some(entity));
        if (is_player && scope.has_player()) || (!is_player && scope.has_level()) {
            actor.set_loaded(false);
        }
    }
}

fn game_mode_ready(world: &mut World) -> bool {
    let mut q = world.query::<&SaveActor>();
    q.iter(world).any(|a| a.kind() == ActorKind::GameMode)
}

fn load_player(world: &mut World, path: &std::path::Path) -> usize {
    let archive = match read_archive::<PlayerArchive>(path) {
        Ok(archive) => archive,
        Err(e) if e.is_not_found() => {
            info!("No player save at {}", path.display());
            return 0;
        }
        Err(e) => {
            warn!("Player save {} not loaded: {}", path.display(), e);
            return 0;
        }
    };
    match PlayerValues::decode(&archive) {
        Ok(values) => apply_player(world, values),
        Err(e) => {
            warn!("Player save {} not loaded: {}", path.display(), e);
            0
        }
    }
}

fn read_level_or_log(
    path: &std::path::Path,
    result: Result<DecodedLevel, SaveError>,
) -> Option<DecodedLevel> {
    match result {
        Ok(level) => Some(level),
        Err(e) if e.is_not_found() => {
            info!("No level save at {}", path.display());
            None
        }
        Err(e) => {
            warn!("Level save {} not loaded: {}", path.display(), e);
            None
        }
    }
}

/// Start reconciling and run the first batch in the same tick.
fn begin_level(
    world: &mut World,
    level: DecodedLevel,
    budget: usize,
    report: &mut LoadReport,
) -> LoadStep {
    let mut reconciler = LevelReconciler::begin(world, level);
    if reconciler.step(world, budget) {
        merge_report(report, reconciler.report());
        LoadStep::Finish
    } else {
        LoadStep::LevelApply(reconciler)
    }
}

fn merge_report(into: &mut LoadReport, level: LoadReport) {
    let players = into.players;
    *into = LoadReport { players, ..level };
}
