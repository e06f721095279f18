//! Actor classification policy.
//!
//! Precedence, first match wins:
//! 1. unpossessed pawn with the persistent flag -> Persistent
//! 2. possessed pawn, controller or player state -> Player
//! 3. level script -> LevelScript
//! 4. game mode / game state -> GameSingleton
//! 5. persistent flag -> Persistent
//! 6. part of the level at startup -> Placed
//! 7. otherwise -> Runtime

use crate::actor::{ActorKind, SaveActor};
use crate::save_types::Category;

pub fn classify(actor: &SaveActor) -> Category {
    classify_parts(actor.kind(), actor.flags().persistent, actor.is_startup())
}

fn classify_parts(kind: ActorKind, persistent: bool, startup: bool) -> Category {
    match kind {
        ActorKind::Pawn {
            player_controlled: false,
        } if persistent => Category::Persistent,
        ActorKind::Pawn {
            player_controlled: true,
        }
        | ActorKind::PlayerController
        | ActorKind::PlayerState => Category::Player,
        ActorKind::LevelScript => Category::LevelScript,
        ActorKind::GameMode | ActorKind::GameState => Category::GameSingleton,
        _ if persistent => Category::Persistent,
        _ if startup => Category::Placed,
        _ => Category::Runtime,
    }
}

/// Has the capability and is not excluded from saving.
pub fn is_eligible(actor: &SaveActor) -> bool {
    !actor.flags().skip_save
}

/// Eligible, and not already restored in the current load pass.
pub fn is_eligible_for_load(actor: &SaveActor) -> bool {
    is_eligible(actor) && !actor.is_loaded()
}

/// Records of this category carry a type name so they can be respawned.
pub fn needs_type_name(category: Category) -> bool {
    matches!(category, Category::Runtime | Category::Persistent)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [ActorKind; 8] = [
        ActorKind::Actor,
        ActorKind::Pawn {
            player_controlled: false,
        },
        ActorKind::Pawn {
            player_controlled: true,
        },
        ActorKind::PlayerController,
        ActorKind::PlayerState,
        ActorKind::LevelScript,
        ActorKind::GameMode,
        ActorKind::GameState,
    ];

    #[test]
    fn test_every_combination_has_exactly_one_category() {
        for kind in KINDS {
            for persistent in [false, true] {
                for startup in [false, true] {
                    // A total function: this must not panic and must be stable.
                    let first = classify_parts(kind, persistent, startup);
                    let second = classify_parts(kind, persistent, startup);
                    assert_eq!(first, second, "{kind:?} p={persistent} s={startup}");
                }
            }
        }
    }

    #[test]
    fn test_player_roles_are_player_regardless_of_flags() {
        for kind in [
            ActorKind::Pawn {
                player_controlled: true,
            },
            ActorKind::PlayerController,
            ActorKind::PlayerState,
        ] {
            for persistent in [false, true] {
                for startup in [false, true] {
                    assert_eq!(classify_parts(kind, persistent, startup), Category::Player);
                }
            }
        }
    }

    #[test]
    fn test_unpossessed_persistent_pawn_is_persistent() {
        let pawn = ActorKind::Pawn {
            player_controlled: false,
        };
        assert_eq!(classify_parts(pawn, true, true), Category::Persistent);
        assert_eq!(classify_parts(pawn, false, true), Category::Placed);
        assert_eq!(classify_parts(pawn, false, false), Category::Runtime);
    }

    #[test]
    fn test_singletons_ignore_persistent_flag() {
        assert_eq!(
            classify_parts(ActorKind::LevelScript, true, true),
            Category::LevelScript
        );
        assert_eq!(
            classify_parts(ActorKind::GameMode, true, false),
            Category::GameSingleton
        );
        assert_eq!(
            classify_parts(ActorKind::GameState, false, true),
            Category::GameSingleton
        );
    }

    #[test]
    fn test_persistent_beats_startup_for_plain_actors() {
        assert_eq!(
            classify_parts(ActorKind::Actor, true, true),
            Category::Persistent
        );
        assert_eq!(classify_parts(ActorKind::Actor, false, true), Category::Placed);
        assert_eq!(
            classify_parts(ActorKind::Actor, false, false),
            Category::Runtime
        );
    }

    #[test]
    fn test_type_name_only_for_respawnable() {
        assert!(needs_type_name(Category::Runtime));
        assert!(needs_type_name(Category::Persistent));
        assert!(!needs_type_name(Category::Placed));
        assert!(!needs_type_name(Category::Player));
    }
}
