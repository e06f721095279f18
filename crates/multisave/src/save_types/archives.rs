use bitcode::{Decode, Encode};

use super::records::{ActorRecord, ObjectSnapshot, ScriptRecord};

/// Everything saved for one level.
///
/// `level` is the canonical name of the level the archive was written in.
/// Script, game-mode and game-state records only apply back into that level
/// (unless a persistence override is set); persistent actor records apply
/// anywhere.
#[derive(Debug, Clone, PartialEq, Default, Encode, Decode)]
pub struct LevelArchive {
    pub records: Vec<ActorRecord>,
    pub scripts: Vec<ScriptRecord>,
    pub game_mode: Option<ObjectSnapshot>,
    pub game_state: Option<ObjectSnapshot>,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ControllerRecord {
    pub rotation: [f32; 4],
    pub payload: ObjectSnapshot,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct PawnRecord {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub payload: ObjectSnapshot,
}

/// The local player's controller, pawn and player state.
#[derive(Debug, Clone, PartialEq, Default, Encode, Decode)]
pub struct PlayerArchive {
    pub controller: Option<ControllerRecord>,
    pub pawn: Option<PawnRecord>,
    pub player_state: Option<ObjectSnapshot>,
    pub level: String,
}
