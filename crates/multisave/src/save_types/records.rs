use bevy::math::{Quat, Vec3};
use bevy::prelude::Transform;
use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Classification of a live actor, decided once per actor per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize)]
pub enum Category {
    /// Spawned during play; saved with its type and respawned if missing.
    Runtime,
    /// Present at level start; saved without a type.
    Placed,
    /// Independent of level identity; saved with a type, never with a pose.
    Persistent,
    /// The local controller, pawn or player state. Player archive only.
    Player,
    LevelScript,
    /// Game mode or game state.
    GameSingleton,
}

/// Position, orientation and scale.
#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct Pose {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0; 3],
    };

    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            translation: transform.translation.to_array(),
            rotation: transform.rotation.to_array(),
            scale: transform.scale.to_array(),
        }
    }

    pub fn to_transform(&self) -> Transform {
        Transform {
            translation: Vec3::from_array(self.translation),
            rotation: Quat::from_array(self.rotation),
            scale: Vec3::from_array(self.scale),
        }
    }

    /// Finite everywhere with a normalized rotation.
    pub fn is_valid(&self) -> bool {
        let finite = self
            .translation
            .iter()
            .chain(self.rotation.iter())
            .chain(self.scale.iter())
            .all(|v| v.is_finite());
        finite && Quat::from_array(self.rotation).is_normalized()
    }
}

/// One named sub-component of a saved actor.
#[derive(Debug, Clone, PartialEq, Default, Encode, Decode)]
pub struct SubRecord {
    pub name: String,
    /// Relative pose, present only for movable sub-components.
    pub relative: Option<Pose>,
    pub fields: Vec<u8>,
}

/// An object's field blob plus its sub-component records.
#[derive(Debug, Clone, PartialEq, Default, Encode, Decode)]
pub struct ObjectSnapshot {
    pub fields: Vec<u8>,
    pub sub_records: Vec<SubRecord>,
}

/// The unit of serialization for one live actor.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ActorRecord {
    pub category: Category,
    pub identity: String,
    /// Spawn key, present only for runtime and persistent records.
    pub type_name: Option<String>,
    pub placement: Pose,
    pub payload: ObjectSnapshot,
}

/// Saved state of one level script, keyed by its level.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ScriptRecord {
    pub level: String,
    pub payload: ObjectSnapshot,
}
