// ---------------------------------------------------------------------------
// Player archive: the local controller, pawn and player state
// ---------------------------------------------------------------------------
//
// No spawning here. The three entities come from session setup; a load only
// applies saved state to whichever of them exist and are eligible.

use bevy::prelude::*;

use crate::actor::{ControlRotation, SaveActor};
use crate::classify::{classify, is_eligible, is_eligible_for_load};
use crate::field_discovery::FieldMarks;
use crate::save_error::SaveError;
use crate::save_types::{Category, ControllerRecord, PawnRecord, PlayerArchive};
use crate::settings::{LevelContext, LocalPlayer, MultiSaveSettings};
use crate::snapshot::{apply_actor, capture_actor, SnapshotValues};

const NEARLY_ZERO: f32 = 1.0e-4;

fn is_nearly_zero(values: &[f32]) -> bool {
    values.iter().all(|v| v.abs() <= NEARLY_ZERO)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerValues {
    /// All zero when the controller declines pose saving.
    pub rotation: [f32; 4],
    pub values: SnapshotValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PawnValues {
    /// All zero when the pawn declines pose saving.
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub values: SnapshotValues,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerValues {
    pub controller: Option<ControllerValues>,
    pub pawn: Option<PawnValues>,
    pub player_state: Option<SnapshotValues>,
    pub level: String,
}

impl PlayerValues {
    pub fn encode(&self) -> PlayerArchive {
        PlayerArchive {
            controller: self.controller.as_ref().map(|c| ControllerRecord {
                rotation: c.rotation,
                payload: c.values.encode(),
            }),
            pawn: self.pawn.as_ref().map(|p| PawnRecord {
                position: p.position,
                rotation: p.rotation,
                payload: p.values.encode(),
            }),
            player_state: self.player_state.as_ref().map(SnapshotValues::encode),
            level: self.level.clone(),
        }
    }

    pub fn decode(archive: &PlayerArchive) -> Result<Self, SaveError> {
        Ok(Self {
            controller: match &archive.controller {
                Some(c) => Some(ControllerValues {
                    rotation: c.rotation,
                    values: SnapshotValues::decode(&c.payload)?,
                }),
                None => None,
            },
            pawn: match &archive.pawn {
                Some(p) => Some(PawnValues {
                    position: p.position,
                    rotation: p.rotation,
                    values: SnapshotValues::decode(&p.payload)?,
                }),
                None => None,
            },
            player_state: archive
                .player_state
                .as_ref()
                .map(SnapshotValues::decode)
                .transpose()?,
            level: archive.level.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.controller.is_none() && self.pawn.is_none() && self.player_state.is_none()
    }
}

/// The entity if it is saveable, eligible, and classifies as a player actor.
fn player_actor(world: &World, entity: Option<Entity>, for_load: bool) -> Option<Entity> {
    let entity = entity?;
    let actor = world.get::<SaveActor>(entity)?;
    let eligible = if for_load {
        is_eligible_for_load(actor)
    } else {
        is_eligible(actor)
    };
    (eligible && classify(actor) == Category::Player).then_some(entity)
}

fn skips_transform(world: &World, entity: Entity) -> bool {
    world
        .get::<SaveActor>(entity)
        .map(|a| a.flags().skip_transform)
        .unwrap_or(false)
}

/// True once the local pawn exists.
pub fn player_ready(world: &World) -> bool {
    world
        .get_resource::<LocalPlayer>()
        .and_then(|p| p.pawn)
        .map(|pawn| world.entities().contains(pawn))
        .unwrap_or(false)
}

pub fn capture_player(world: &mut World) -> PlayerValues {
    let player = world
        .get_resource::<LocalPlayer>()
        .cloned()
        .unwrap_or_default();
    let level = world
        .get_resource::<LevelContext>()
        .map(LevelContext::canonical_level)
        .unwrap_or_default();
    let mut marks = FieldMarks::new();
    let mut out = PlayerValues {
        level,
        ..Default::default()
    };

    if let Some(controller) = player_actor(world, player.controller, false) {
        let rotation = if skips_transform(world, controller) {
            [0.0; 4]
        } else {
            world
                .get::<ControlRotation>(controller)
                .map(|r| r.0.to_array())
                .unwrap_or(Quat::IDENTITY.to_array())
        };
        out.controller = capture_actor(world, controller, &mut marks)
            .map(|values| ControllerValues { rotation, values });
    }

    if let Some(pawn) = player_actor(world, player.pawn, false) {
        let (position, rotation) = match world.get::<Transform>(pawn) {
            Some(t) if !skips_transform(world, pawn) => {
                (t.translation.to_array(), t.rotation.to_array())
            }
            _ => ([0.0; 3], [0.0; 4]),
        };
        out.pawn = capture_actor(world, pawn, &mut marks).map(|values| PawnValues {
            position,
            rotation,
            values,
        });
    }

    if let Some(state) = player_actor(world, player.player_state, false) {
        out.player_state = capture_actor(world, state, &mut marks);
    }

    if !out.is_empty() {
        info!("Player actors captured");
    }
    out
}

/// Apply saved player state. Returns how many of the three were applied.
///
/// The whole archive is ignored when it was saved in another level, unless
/// `persistent_player` is set; in that mode poses are never restored.
pub fn apply_player(world: &mut World, saved: PlayerValues) -> usize {
    let persistent_player = world
        .get_resource::<MultiSaveSettings>()
        .map(|s| s.persistent_player)
        .unwrap_or(false);
    let current = world
        .get_resource::<LevelContext>()
        .map(LevelContext::canonical_level)
        .unwrap_or_default();
    if saved.level != current && !persistent_player {
        info!(
            "Player saved in '{}' is not applied in '{}'",
            saved.level, current
        );
        return 0;
    }

    let player = world
        .get_resource::<LocalPlayer>()
        .cloned()
        .unwrap_or_default();
    let mut marks = FieldMarks::new();
    let mut applied = 0;

    if let (Some(entity), Some(c)) = (player_actor(world, player.controller, true), saved.controller) {
        if !persistent_player && !is_nearly_zero(&c.rotation) {
            world
                .entity_mut(entity)
                .insert(ControlRotation(Quat::from_array(c.rotation).normalize()));
        }
        if apply_or_warn(world, entity, c.values, &mut marks, "Player controller") {
            applied += 1;
        }
    }

    if let (Some(entity), Some(p)) = (player_actor(world, player.pawn, true), saved.pawn) {
        if !persistent_player && !is_nearly_zero(&p.position) {
            if let Some(mut transform) = world.get_mut::<Transform>(entity) {
                transform.translation = Vec3::from_array(p.position);
                if !is_nearly_zero(&p.rotation) {
                    transform.rotation = Quat::from_array(p.rotation).normalize();
                }
            }
        }
        if apply_or_warn(world, entity, p.values, &mut marks, "Player pawn") {
            applied += 1;
        }
    }

    if let (Some(entity), Some(values)) =
        (player_actor(world, player.player_state, true), saved.player_state)
    {
        if apply_or_warn(world, entity, values, &mut marks, "Player state") {
            applied += 1;
        }
    }
    applied
}

fn apply_or_warn(
    world: &mut World,
    entity: Entity,
    values: SnapshotValues,
    marks: &mut FieldMarks,
    what: &str,
) -> bool {
    match apply_actor(world, entity, values, marks) {
        Ok(()) => {
            info!("{} loaded", what);
            true
        }
        Err(e) => {
            warn!("{} not loaded: {}", what, e);
            false
        }
    }
}
