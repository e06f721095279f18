//! Level archive reconciler.
//!
//! Order is fixed: level scripts, then game mode and game state, then actor
//! records. Actor records are matched to live actors by identity; a record
//! without a live match is respawned from its type name when it has one.
//!
//! `DecodedLevel::decode` is pure and may run on a worker. Everything on
//! `LevelReconciler` mutates the world and runs on the main thread.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use bevy::prelude::*;

use crate::actor::{ActorKind, Mobility, SaveActor};
use crate::archive_io::read_archive;
use crate::classify::{classify, is_eligible_for_load};
use crate::field_discovery::FieldMarks;
use crate::save_error::SaveError;
use crate::save_types::{Category, LevelArchive};
use crate::settings::{canonical_name, LevelContext, LocalPlayer, MultiSaveSettings};
use crate::snapshot::{apply_actor, ActorValues, SnapshotValues};
use crate::spawn_registry::SpawnRegistry;

/// A level archive with every field blob decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedLevel {
    pub level: String,
    pub scripts: Vec<(String, SnapshotValues)>,
    pub game_mode: Option<SnapshotValues>,
    pub game_state: Option<SnapshotValues>,
    pub records: Vec<ActorValues>,
}

impl DecodedLevel {
    /// Records whose blobs cannot be read are dropped with a warning.
    pub fn decode(archive: LevelArchive) -> Self {
        let singleton = |what: &str, snapshot: Option<_>| {
            snapshot.and_then(|s| match SnapshotValues::decode(&s) {
                Ok(values) => Some(values),
                Err(e) => {
                    warn!("Dropping saved {}: {}", what, e);
                    None
                }
            })
        };
        let scripts = archive
            .scripts
            .iter()
            .filter_map(|script| match SnapshotValues::decode(&script.payload) {
                Ok(values) => Some((script.level.clone(), values)),
                Err(e) => {
                    warn!("Dropping level script record '{}': {}", script.level, e);
                    None
                }
            })
            .collect();
        let records = archive
            .records
            .iter()
            .filter_map(|record| match ActorValues::decode(record) {
                Ok(values) => Some(values),
                Err(e) => {
                    warn!("Dropping actor record '{}': {}", record.identity, e);
                    None
                }
            })
            .collect();
        Self {
            game_mode: singleton("game mode", archive.game_mode),
            game_state: singleton("game state", archive.game_state),
            level: archive.level,
            scripts,
            records,
        }
    }
}

/// Read and decode a level file.
pub fn read_level(path: &Path) -> Result<DecodedLevel, SaveError> {
    read_archive::<LevelArchive>(path).map(DecodedLevel::decode)
}

/// What happened to one actor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Applied to a live actor.
    Updated,
    /// Respawned, then applied.
    Spawned,
    /// A live actor exists but was already loaded or has another category.
    Skipped,
    /// No live actor and no way to respawn one.
    Dropped,
}

/// Counts for one load operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub updated: usize,
    pub spawned: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub scripts: usize,
    pub singletons: usize,
    pub players: usize,
}

impl LoadReport {
    pub fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Updated => self.updated += 1,
            ReconcileOutcome::Spawned => self.spawned += 1,
            ReconcileOutcome::Skipped => self.skipped += 1,
            ReconcileOutcome::Dropped => self.dropped += 1,
        }
    }
}

/// Applies a decoded level, possibly spread over several ticks.
pub struct LevelReconciler {
    pending: VecDeque<ActorValues>,
    index: HashMap<String, Entity>,
    marks: FieldMarks,
    advanced_spawn_check: bool,
    report: LoadReport,
}

impl LevelReconciler {
    /// Apply scripts and singletons right away and queue the actor records.
    pub fn begin(world: &mut World, level: DecodedLevel) -> Self {
        let ctx = world
            .get_resource::<LevelContext>()
            .cloned()
            .unwrap_or_default();
        let settings = world
            .get_resource::<MultiSaveSettings>()
            .cloned()
            .unwrap_or_default();
        let current = ctx.canonical_level();
        let same_level = level.level == current;

        let mut this = Self {
            pending: VecDeque::new(),
            index: HashMap::new(),
            marks: FieldMarks::new(),
            advanced_spawn_check: settings.advanced_spawn_check,
            report: LoadReport::default(),
        };

        if same_level {
            this.apply_scripts(world, level.scripts, &ctx.streaming_prefix);
        }
        if same_level || settings.persistent_game_mode {
            this.apply_singleton(world, ActorKind::GameMode, level.game_mode);
            this.apply_singleton(world, ActorKind::GameState, level.game_state);
        } else if level.game_mode.is_some() || level.game_state.is_some() {
            debug!(
                "Game mode saved in '{}' is not applied in '{}'",
                level.level, current
            );
        }

        let mut records: Vec<ActorValues> = level
            .records
            .into_iter()
            .filter(|r| same_level || r.category == Category::Persistent)
            .collect();

        let viewpoint = world.get_resource::<LocalPlayer>().and_then(|p| p.viewpoint);
        if let (true, Some(view)) = (ctx.authority, viewpoint) {
            records.sort_by(|a, b| {
                let da = Vec3::from_array(a.placement.translation).distance_squared(view);
                let db = Vec3::from_array(b.placement.translation).distance_squared(view);
                da.total_cmp(&db)
            });
        }

        this.pending = records.into();
        this.index = identity_index(world);
        this
    }

    fn apply_scripts(
        &mut self,
        world: &mut World,
        scripts: Vec<(String, SnapshotValues)>,
        prefix: &str,
    ) {
        if scripts.is_empty() {
            return;
        }
        let live: Vec<(Entity, String)> = {
            let mut q = world.query::<(Entity, &Name, &SaveActor)>();
            q.iter(world)
                .filter(|(_, _, a)| a.kind() == ActorKind::LevelScript && is_eligible_for_load(a))
                .map(|(e, n, _)| (e, canonical_name(n.as_str(), prefix)))
                .collect()
        };
        for (level, values) in scripts {
            let Some(&(entity, _)) = live.iter().find(|(_, name)| *name == level) else {
                debug!("No live level script for '{}'", level);
                continue;
            };
            match apply_actor(world, entity, values, &mut self.marks) {
                Ok(()) => {
                    self.report.scripts += 1;
                    info!("Level script '{}' loaded", level);
                }
                Err(e) => warn!("Level script '{}' not loaded: {}", level, e),
            }
        }
    }

    fn apply_singleton(
        &mut self,
        world: &mut World,
        kind: ActorKind,
        values: Option<SnapshotValues>,
    ) {
        let Some(values) = values else {
            return;
        };
        let target = {
            let mut q = world.query::<(Entity, &SaveActor)>();
            q.iter(world)
                .find(|(_, a)| a.kind() == kind && is_eligible_for_load(a))
                .map(|(e, _)| e)
        };
        let Some(entity) = target else {
            return;
        };
        match apply_actor(world, entity, values, &mut self.marks) {
            Ok(()) => {
                self.report.singletons += 1;
                info!("{:?} loaded", kind);
            }
            Err(e) => warn!("{:?} not loaded: {}", kind, e),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn report(&self) -> LoadReport {
        self.report
    }

    /// Reconcile up to `budget` records. Returns true once none are left.
    pub fn step(&mut self, world: &mut World, budget: usize) -> bool {
        for _ in 0..budget {
            let Some(record) = self.pending.pop_front() else {
                break;
            };
            let outcome = self.reconcile(world, record);
            self.report.record(outcome);
        }
        if self.is_done() {
            info!(
                "Level actors loaded: {} updated, {} spawned, {} skipped, {} dropped",
                self.report.updated, self.report.spawned, self.report.skipped, self.report.dropped
            );
        }
        self.is_done()
    }

    pub fn run_to_end(&mut self, world: &mut World) {
        self.step(world, self.pending.len());
    }

    fn reconcile(&mut self, world: &mut World, record: ActorValues) -> ReconcileOutcome {
        if let Some(&entity) = self.index.get(&record.identity) {
            if world.get::<SaveActor>(entity).is_some() {
                return self.update(world, entity, record);
            }
            // Despawned since the index was built.
            self.index.remove(&record.identity);
        }

        let Some(type_name) = record.type_name.clone() else {
            debug!("'{}' is gone and has no type to respawn", record.identity);
            return ReconcileOutcome::Dropped;
        };

        if self.advanced_spawn_check {
            if let Some(entity) = find_named(world, &record.identity, true) {
                self.index.insert(record.identity.clone(), entity);
                return self.update(world, entity, record);
            }
        }

        match spawn_for_record(world, &type_name, &record) {
            Ok((entity, kept_identity)) => {
                if kept_identity {
                    self.index.insert(record.identity.clone(), entity);
                }
                match self.update(world, entity, record) {
                    ReconcileOutcome::Updated => ReconcileOutcome::Spawned,
                    other => other,
                }
            }
            Err(e) => {
                warn!("Cannot respawn '{}': {}", record.identity, e);
                ReconcileOutcome::Dropped
            }
        }
    }

    fn update(&mut self, world: &mut World, entity: Entity, record: ActorValues) -> ReconcileOutcome {
        let restore_pose = {
            let Some(actor) = world.get::<SaveActor>(entity) else {
                return ReconcileOutcome::Dropped;
            };
            if !is_eligible_for_load(actor) {
                return ReconcileOutcome::Skipped;
            }
            let live = classify(actor);
            if live != record.category {
                debug!(
                    "'{}' was saved as {:?} but is {:?} now",
                    record.identity, record.category, live
                );
                return ReconcileOutcome::Skipped;
            }
            record.category != Category::Persistent
                && !actor.flags().skip_transform
                && Mobility::is_movable(world.get::<Mobility>(entity))
                && record.placement.is_valid()
        };

        if restore_pose {
            if let Some(mut transform) = world.get_mut::<Transform>(entity) {
                *transform = record.placement.to_transform();
            }
        }

        match apply_actor(world, entity, record.values, &mut self.marks) {
            Ok(()) => ReconcileOutcome::Updated,
            Err(e) => {
                warn!("'{}' not loaded: {}", record.identity, e);
                ReconcileOutcome::Dropped
            }
        }
    }
}

fn identity_index(world: &mut World) -> HashMap<String, Entity> {
    let mut q = world.query_filtered::<(Entity, &Name), With<SaveActor>>();
    q.iter(world)
        .map(|(e, n)| (n.as_str().to_string(), e))
        .collect()
}

fn find_named(world: &mut World, name: &str, saveable_only: bool) -> Option<Entity> {
    let mut q = world.query::<(Entity, &Name, Has<SaveActor>)>();
    q.iter(world)
        .find(|(_, n, saveable)| n.as_str() == name && (*saveable || !saveable_only))
        .map(|(e, _, _)| e)
}

/// First free `{identity}_{n}` name.
fn fallback_name(world: &mut World, identity: &str) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{identity}_{n}");
        if find_named(world, &candidate, false).is_none() {
            return candidate;
        }
        n += 1;
    }
}

/// Spawn a fresh actor for `record`. The flag is false when the identity
/// was taken and the actor got a fallback name.
fn spawn_for_record(
    world: &mut World,
    type_name: &str,
    record: &ActorValues,
) -> Result<(Entity, bool), SaveError> {
    let actor_type = world
        .get_resource_mut::<SpawnRegistry>()
        .and_then(|mut registry| registry.resolve(type_name))
        .ok_or_else(|| SaveError::SpawnFailure(format!("unknown type '{type_name}'")))?;
    if !actor_type.saveable {
        return Err(SaveError::MissingCapability(type_name.to_string()));
    }

    let (name, kept_identity) = if find_named(world, &record.identity, false).is_some() {
        let fallback = fallback_name(world, &record.identity);
        warn!(
            "Identity '{}' is taken, respawning as '{}'",
            record.identity, fallback
        );
        (fallback, false)
    } else {
        (record.identity.clone(), true)
    };

    let transform = if record.placement.is_valid() {
        record.placement.to_transform()
    } else {
        Transform::IDENTITY
    };
    let entity = (actor_type.spawn)(world, &transform);

    let Some(mut actor) = world.get_mut::<SaveActor>(entity) else {
        world.despawn(entity);
        return Err(SaveError::MissingCapability(format!(
            "type '{type_name}' spawned an actor without SaveActor"
        )));
    };
    if record.category == Category::Persistent {
        let mut flags = actor.flags();
        flags.persistent = true;
        actor.set_flags(flags);
    }
    let live = classify(&actor);
    if live != record.category {
        world.despawn(entity);
        return Err(SaveError::SpawnFailure(format!(
            "type '{type_name}' spawned a {live:?} actor for a {:?} record",
            record.category
        )));
    }
    world.entity_mut(entity).insert(Name::new(name));
    Ok((entity, kept_identity))
}
