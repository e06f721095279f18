// ---------------------------------------------------------------------------
// Level archive builder
// ---------------------------------------------------------------------------
//
// ```text
//   ECS World (main thread)
//     |
//     +-- capture_level   -> LevelValues   (hooks run, fields captured)
//     |
//   worker or main thread
//     +-- LevelValues::encode -> LevelArchive -> envelope -> Level.sav
// ```

use std::collections::HashMap;

use bevy::prelude::*;

use crate::actor::{ActorKind, SaveActor};
use crate::classify::{classify, is_eligible, needs_type_name};
use crate::field_discovery::FieldMarks;
use crate::save_types::{Category, LevelArchive, Pose, ScriptRecord};
use crate::settings::{canonical_name, LevelContext};
use crate::snapshot::{capture_actor, ActorValues, SnapshotValues};

/// Everything captured from one level, not yet encoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelValues {
    pub records: Vec<ActorValues>,
    pub scripts: Vec<(String, SnapshotValues)>,
    pub game_mode: Option<SnapshotValues>,
    pub game_state: Option<SnapshotValues>,
    pub level: String,
}

impl LevelValues {
    pub fn encode(&self) -> LevelArchive {
        LevelArchive {
            records: self.records.iter().map(ActorValues::encode).collect(),
            scripts: self
                .scripts
                .iter()
                .map(|(level, values)| ScriptRecord {
                    level: level.clone(),
                    payload: values.encode(),
                })
                .collect(),
            game_mode: self.game_mode.as_ref().map(SnapshotValues::encode),
            game_state: self.game_state.as_ref().map(SnapshotValues::encode),
            level: self.level.clone(),
        }
    }
}

struct Candidate {
    entity: Entity,
    identity: String,
    kind: ActorKind,
    category: Category,
    placement: Pose,
    type_name: Option<String>,
}

fn candidates(world: &mut World) -> Vec<Candidate> {
    let mut q = world.query::<(Entity, &Name, &SaveActor, Option<&Transform>)>();
    q.iter(world)
        .filter(|(_, _, actor, _)| is_eligible(actor))
        .map(|(entity, name, actor, transform)| {
            let category = classify(actor);
            let placement = match transform {
                Some(t) if category != Category::Persistent && !actor.flags().skip_transform => {
                    Pose::from_transform(t)
                }
                _ => Pose::IDENTITY,
            };
            Candidate {
                entity,
                identity: name.as_str().to_string(),
                kind: actor.kind(),
                category,
                placement,
                type_name: needs_type_name(category)
                    .then(|| actor.object().type_name().to_string()),
            }
        })
        .collect()
}

/// Capture every eligible non-player actor of the current level.
///
/// Runs the save hooks, so it must run on the main thread. Two actors with
/// the same identity cannot both be reconciled on load; the later one wins.
pub fn capture_level(world: &mut World) -> LevelValues {
    let ctx = world
        .get_resource::<LevelContext>()
        .cloned()
        .unwrap_or_default();
    let mut out = LevelValues {
        level: ctx.canonical_level(),
        ..Default::default()
    };
    let mut marks = FieldMarks::new();
    let mut by_identity: HashMap<String, usize> = HashMap::new();

    for candidate in candidates(world) {
        match candidate.category {
            Category::Player => continue,
            Category::LevelScript => {
                if let Some(values) = capture_actor(world, candidate.entity, &mut marks) {
                    let level = canonical_name(&candidate.identity, &ctx.streaming_prefix);
                    out.scripts.push((level, values));
                }
                continue;
            }
            Category::GameSingleton => {
                let Some(values) = capture_actor(world, candidate.entity, &mut marks) else {
                    continue;
                };
                if candidate.kind == ActorKind::GameMode {
                    out.game_mode = Some(values);
                } else {
                    out.game_state = Some(values);
                }
                continue;
            }
            Category::Runtime | Category::Placed | Category::Persistent => {}
        }

        let Some(values) = capture_actor(world, candidate.entity, &mut marks) else {
            continue;
        };
        let record = ActorValues {
            category: candidate.category,
            identity: candidate.identity,
            type_name: candidate.type_name,
            placement: candidate.placement,
            values,
        };
        match by_identity.get(&record.identity) {
            Some(&index) => {
                warn!(
                    "Two saveable actors share identity '{}', keeping the last one",
                    record.identity
                );
                out.records[index] = record;
            }
            None => {
                by_identity.insert(record.identity.clone(), out.records.len());
                out.records.push(record);
            }
        }
    }

    debug!(
        "Captured level '{}': {} actors, {} scripts",
        out.level,
        out.records.len(),
        out.scripts.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{SaveFlags, SaveObject};
    use crate::field_value::FieldValue;
    use crate::SaveFields;

    #[derive(SaveFields, Default, Debug, Clone)]
    struct Crate {
        #[save]
        flag: bool,
    }

    impl SaveObject for Crate {}

    fn world_in(level: &str) -> World {
        let mut world = World::new();
        world.insert_resource(LevelContext {
            level_name: format!("PIE_{level}"),
            streaming_prefix: "PIE_".into(),
            ..Default::default()
        });
        world
    }

    fn record<'a>(values: &'a LevelValues, identity: &str) -> &'a ActorValues {
        values
            .records
            .iter()
            .find(|r| r.identity == identity)
            .unwrap()
    }

    #[test]
    fn test_categories_and_type_names() {
        let mut world = world_in("Overworld");
        world.spawn((
            Name::new("Foo_1"),
            Transform::from_xyz(1.0, 2.0, 3.0),
            SaveActor::runtime(Crate { flag: true }),
        ));
        world.spawn((
            Name::new("Statue"),
            Transform::from_xyz(5.0, 0.0, 0.0),
            SaveActor::placed(Crate::default()),
        ));
        world.spawn((
            Name::new("Backpack"),
            Transform::from_xyz(7.0, 0.0, 0.0),
            SaveActor::runtime(Crate::default()).with_flags(SaveFlags {
                persistent: true,
                ..Default::default()
            }),
        ));

        let values = capture_level(&mut world);
        assert_eq!(values.level, "Overworld");
        assert_eq!(values.records.len(), 3);

        let foo = record(&values, "Foo_1");
        assert_eq!(foo.category, Category::Runtime);
        assert_eq!(foo.placement.translation, [1.0, 2.0, 3.0]);
        assert!(foo.type_name.as_deref().unwrap().ends_with("::Crate"));
        assert_eq!(
            foo.values.fields,
            vec![("flag".to_string(), FieldValue::Bool(true))]
        );

        let statue = record(&values, "Statue");
        assert_eq!(statue.category, Category::Placed);
        assert_eq!(statue.type_name, None);

        let backpack = record(&values, "Backpack");
        assert_eq!(backpack.category, Category::Persistent);
        assert_eq!(backpack.placement, Pose::IDENTITY, "persistent has no pose");
        assert!(backpack.type_name.is_some());
    }

    #[test]
    fn test_skipped_and_player_actors_are_excluded() {
        let mut world = world_in("Overworld");
        world.spawn((
            Name::new("Ghost"),
            SaveActor::runtime(Crate::default()).with_flags(SaveFlags {
                skip_save: true,
                ..Default::default()
            }),
        ));
        world.spawn((
            Name::new("Hero"),
            SaveActor::new(
                ActorKind::Pawn {
                    player_controlled: true,
                },
                Crate::default(),
            ),
        ));
        world.spawn((Name::new("Rock"), Transform::default()));

        assert!(capture_level(&mut world).records.is_empty());
    }

    #[test]
    fn test_skip_transform_and_missing_transform_use_identity() {
        let mut world = world_in("Overworld");
        world.spawn((
            Name::new("Sign"),
            Transform::from_xyz(9.0, 9.0, 9.0),
            SaveActor::runtime(Crate::default()).with_flags(SaveFlags {
                skip_transform: true,
                ..Default::default()
            }),
        ));
        world.spawn((Name::new("Idea"), SaveActor::runtime(Crate::default())));

        let values = capture_level(&mut world);
        assert_eq!(record(&values, "Sign").placement, Pose::IDENTITY);
        assert_eq!(record(&values, "Idea").placement, Pose::IDENTITY);
    }

    #[test]
    fn test_singletons_and_scripts() {
        let mut world = world_in("Overworld");
        world.spawn((
            Name::new("PIE_Overworld"),
            SaveActor::new(ActorKind::LevelScript, Crate { flag: true }),
        ));
        world.spawn((
            Name::new("GameMode"),
            SaveActor::new(ActorKind::GameMode, Crate::default()),
        ));
        world.spawn((
            Name::new("GameState"),
            SaveActor::new(ActorKind::GameState, Crate { flag: true }),
        ));

        let values = capture_level(&mut world);
        assert!(values.records.is_empty());
        assert_eq!(values.scripts.len(), 1);
        assert_eq!(values.scripts[0].0, "Overworld");
        assert!(values.game_mode.is_some());
        assert_eq!(
            values.game_state.as_ref().unwrap().fields,
            vec![("flag".to_string(), FieldValue::Bool(true))]
        );

        let archive = values.encode();
        assert_eq!(archive.scripts[0].level, "Overworld");
        assert_eq!(archive.level, "Overworld");
    }

    #[test]
    fn test_duplicate_identity_keeps_last() {
        let mut world = world_in("Overworld");
        world.spawn((Name::new("Twin"), SaveActor::runtime(Crate { flag: false })));
        world.spawn((Name::new("Twin"), SaveActor::runtime(Crate { flag: true })));

        let values = capture_level(&mut world);
        assert_eq!(values.records.len(), 1);
    }
}
