//! Host-side components that make an entity saveable.
//!
//! `SaveActor` is the persistence capability. Its classification flags are
//! assigned at construction and afterwards changed only through
//! `MultiSaveWorldExt::set_entity_save_properties`.

use std::any::Any;

use bevy::prelude::*;

use crate::field_table::FieldSet;

/// The declared role of an actor, used by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Actor,
    Pawn { player_controlled: bool },
    PlayerController,
    PlayerState,
    /// The level's script singleton. Its `Name` is the level it scripts.
    LevelScript,
    GameMode,
    GameState,
}

/// Classification flags carried by every `SaveActor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveFlags {
    pub skip_save: bool,
    pub persistent: bool,
    pub skip_transform: bool,
}

/// Persisted state of an actor plus its save/load hooks.
///
/// Usually a `#[derive(SaveFields)]` struct with an empty `impl SaveObject`.
pub trait SaveObject: FieldSet {
    /// Called before the actor's fields are captured.
    fn pre_save(&mut self) {}

    /// Called after the actor and its sub-components were captured.
    fn saved(&mut self) {}

    /// Called after the actor and every sub-component were restored.
    fn loaded(&mut self) {}

    /// Names of the child entities whose state is saved with this actor.
    fn components_to_save(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Marks an entity as saveable and holds its classification state.
#[derive(Component)]
pub struct SaveActor {
    kind: ActorKind,
    flags: SaveFlags,
    startup: bool,
    loaded: bool,
    object: Box<dyn SaveObject>,
}

impl SaveActor {
    pub fn new(kind: ActorKind, object: impl SaveObject) -> Self {
        Self {
            kind,
            flags: SaveFlags::default(),
            startup: false,
            loaded: false,
            object: Box::new(object),
        }
    }

    /// A plain actor spawned during play.
    pub fn runtime(object: impl SaveObject) -> Self {
        Self::new(ActorKind::Actor, object)
    }

    /// A plain actor that is part of the level at startup.
    pub fn placed(object: impl SaveObject) -> Self {
        Self::new(ActorKind::Actor, object).at_startup()
    }

    pub fn at_startup(mut self) -> Self {
        self.startup = true;
        self
    }

    pub fn with_flags(mut self, flags: SaveFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    pub fn flags(&self) -> SaveFlags {
        self.flags
    }

    pub fn is_startup(&self) -> bool {
        self.startup
    }

    /// Set once a load pass applied a record to this actor.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn object(&self) -> &dyn SaveObject {
        self.object.as_ref()
    }

    pub fn object_mut(&mut self) -> &mut dyn SaveObject {
        self.object.as_mut()
    }

    pub fn downcast_ref<T: SaveObject>(&self) -> Option<&T> {
        let any: &dyn Any = self.object.as_any();
        any.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: SaveObject>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self.object.as_any_mut();
        any.downcast_mut::<T>()
    }

    pub(crate) fn set_flags(&mut self, flags: SaveFlags) {
        self.flags = flags;
    }

    pub(crate) fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }
}

/// Whether an entity's pose may change at runtime. Absent means static.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mobility {
    Static,
    Movable,
}

impl Mobility {
    pub fn is_movable(mobility: Option<&Mobility>) -> bool {
        matches!(mobility, Some(Mobility::Movable))
    }
}

/// Saved state of a sub-component (a named child entity of a `SaveActor`).
#[derive(Component)]
pub struct SaveComponent {
    fields: Box<dyn FieldSet>,
}

impl SaveComponent {
    pub fn new(fields: impl FieldSet) -> Self {
        Self {
            fields: Box::new(fields),
        }
    }

    pub fn fields(&self) -> &dyn FieldSet {
        self.fields.as_ref()
    }

    pub fn fields_mut(&mut self) -> &mut dyn FieldSet {
        self.fields.as_mut()
    }

    pub fn downcast_ref<T: FieldSet>(&self) -> Option<&T> {
        self.fields.as_any().downcast_ref::<T>()
    }
}

/// A sub-component that wraps a whole nested entity.
#[derive(Component, Debug, Clone, Copy)]
pub struct ChildActor(pub Entity);

/// Display name of a player, listed in the slot info.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct PlayerName(pub String);

/// The controller's view rotation, saved in the player archive.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlRotation(pub Quat);
