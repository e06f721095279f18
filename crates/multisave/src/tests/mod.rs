//! Tick-by-tick scenarios against a bevy `App` with `MultiSavePlugin`.

mod slot_scenarios;

use std::path::PathBuf;

use bevy::prelude::*;

use crate::{
    ActorKind, LevelContext, LoadFinished, LoadReport, LocalPlayer, Mobility, MultiSavePlugin,
    MultiSaveSettings, PlayerName, SaveActor, SaveFields, SaveObject, SpawnAppExt, TaskId,
};

#[derive(SaveFields, Default, Debug, Clone, PartialEq)]
pub struct Crate {
    #[save]
    pub flag: bool,
    #[save]
    pub label: String,
}

impl SaveObject for Crate {}

#[derive(SaveFields, Default, Debug, Clone, PartialEq)]
pub struct Rules {
    #[save]
    pub score: i32,
}

impl SaveObject for Rules {}

#[derive(SaveFields, Default, Debug, Clone, PartialEq)]
pub struct Hero {
    #[save]
    pub health: i32,
}

impl SaveObject for Hero {}

/// Load reports seen so far, in completion order.
#[derive(Resource, Default)]
pub struct FinishedLoads(pub Vec<LoadFinished>);

fn collect_finished_loads(mut events: EventReader<LoadFinished>, mut seen: ResMut<FinishedLoads>) {
    seen.0.extend(events.read().copied());
}

pub struct TestGame {
    pub app: App,
    pub root: PathBuf,
    pub game_mode: Entity,
    pub pawn: Entity,
}

impl TestGame {
    pub fn new(name: &str) -> Self {
        Self::with_settings(name, |_| {})
    }

    pub fn with_settings(name: &str, configure: impl FnOnce(&mut MultiSaveSettings)) -> Self {
        let root = std::env::temp_dir().join(format!("multisave_scenario_{name}"));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();

        let mut settings = MultiSaveSettings {
            save_root: root.clone(),
            ..Default::default()
        };
        configure(&mut settings);

        let mut app = App::new();
        app.insert_resource(settings)
            .add_plugins(MultiSavePlugin::default())
            .insert_resource(LevelContext::new("Overworld"))
            .init_resource::<FinishedLoads>()
            .add_systems(Last, collect_finished_loads)
            .register_spawnable::<Crate>(|world, transform| {
                world
                    .spawn((*transform, Mobility::Movable, SaveActor::runtime(Crate::default())))
                    .id()
            });

        let world = app.world_mut();
        let game_mode = world
            .spawn((
                Name::new("GameMode"),
                SaveActor::new(ActorKind::GameMode, Rules::default()),
            ))
            .id();
        let controller = world
            .spawn((
                Name::new("PlayerController_0"),
                SaveActor::new(ActorKind::PlayerController, Hero::default()),
            ))
            .id();
        let pawn = world
            .spawn((
                Name::new("Hero_0"),
                Transform::default(),
                Mobility::Movable,
                SaveActor::new(
                    ActorKind::Pawn {
                        player_controlled: true,
                    },
                    Hero { health: 100 },
                ),
            ))
            .id();
        let player_state = world
            .spawn((
                Name::new("PlayerState_0"),
                PlayerName("Ada".into()),
                SaveActor::new(ActorKind::PlayerState, Hero::default()),
            ))
            .id();
        world.insert_resource(LocalPlayer {
            controller: Some(controller),
            pawn: Some(pawn),
            player_state: Some(player_state),
            viewpoint: None,
        });

        Self {
            app,
            root,
            game_mode,
            pawn,
        }
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    /// A yield between frames lets pool workers make progress.
    pub fn tick(&mut self, n: u32) {
        for _ in 0..n {
            self.app.update();
            std::thread::yield_now();
        }
    }

    /// Tick until the task finished. Returns the frames it took.
    pub fn run_until_finished(&mut self, id: TaskId) -> u32 {
        for frame in 1..=2_000 {
            self.tick(1);
            if self.world().resource::<crate::AsyncTasks>().is_finished(id) {
                return frame;
            }
        }
        panic!("task {id:?} did not finish");
    }

    pub fn last_load_report(&self) -> LoadReport {
        self.world()
            .resource::<FinishedLoads>()
            .0
            .last()
            .map(|f| f.report)
            .unwrap()
    }

    pub fn spawn_crate(&mut self, name: &str, at: Vec3, flag: bool) -> Entity {
        self.world_mut()
            .spawn((
                Name::new(name.to_string()),
                Transform::from_translation(at),
                Mobility::Movable,
                SaveActor::runtime(Crate {
                    flag,
                    label: name.to_lowercase(),
                }),
            ))
            .id()
    }

    pub fn find(&mut self, name: &str) -> Option<Entity> {
        let world = self.world_mut();
        let mut q = world.query::<(Entity, &Name)>();
        q.iter(world)
            .find(|(_, n)| n.as_str() == name)
            .map(|(e, _)| e)
    }

    pub fn crate_state(&self, entity: Entity) -> Crate {
        self.world()
            .get::<SaveActor>(entity)
            .and_then(|a| a.downcast_ref::<Crate>())
            .cloned()
            .unwrap()
    }

    /// Despawn every runtime crate, as leaving and re-entering the level would.
    pub fn unload_crates(&mut self) {
        let world = self.world_mut();
        let crates: Vec<Entity> = {
            let mut q = world.query::<(Entity, &SaveActor)>();
            q.iter(world)
                .filter(|(_, a)| a.downcast_ref::<Crate>().is_some())
                .map(|(e, _)| e)
                .collect()
        };
        for entity in crates {
            world.despawn(entity);
        }
    }
}

impl Drop for TestGame {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
