use bevy::prelude::*;

use super::TestGame;
use crate::{MultiSaveWorldExt, SaveError, SaveFlags, SaveScope};

fn save_into(game: &mut TestGame, slot: &str) {
    game.world_mut().set_current_slot(slot);
    let id = game.world_mut().start_save(SaveScope::ALL).unwrap();
    game.run_until_finished(id);
}

#[test]
fn test_slots_are_listed_and_described() {
    let mut game = TestGame::new("slots");
    save_into(&mut game, "Run1");
    std::thread::sleep(std::time::Duration::from_millis(20));
    save_into(&mut game, "Run2");

    let world = game.world_mut();
    assert_eq!(world.current_slot_name(), "Run2");
    assert_eq!(world.list_slots(), vec!["Run2".to_string(), "Run1".to_string()]);

    let info = world.slot_info();
    assert_eq!(info.name, "Run2");
    assert_eq!(info.level, "Overworld");
    assert_eq!(info.players, vec!["Ada".to_string()]);
    assert_eq!(world.named_slot_info("Run1").unwrap().name, "Run1");
    assert!(world.named_slot_info("Nope").is_none());
}

#[test]
fn test_deleting_current_slot() {
    let mut game = TestGame::new("delete_slot");
    save_into(&mut game, "Run1");

    let world = game.world_mut();
    assert!(world.does_slot_exist("Run1"));
    assert!(world.delete_slot("Run1"));
    assert!(!world.does_slot_exist("Run1"));
    assert!(world.list_slots().is_empty());
    assert_eq!(world.slot_info().level, "");
    assert!(!world.delete_slot("Run1"));
    assert!(!world.delete_slot("../Run1"));
}

#[test]
fn test_users_keep_separate_slots() {
    let mut game = TestGame::new("users");
    save_into(&mut game, "Shared");

    game.world_mut().set_current_user("Bob");
    assert!(game.world().list_slots().is_empty());
    save_into(&mut game, "BobRun");
    assert_eq!(game.world().list_slots(), vec!["BobRun".to_string()]);
    assert_eq!(game.world().list_users(), vec!["Bob".to_string()]);

    assert!(!game.world_mut().delete_user("Bob"));
    game.world_mut().set_current_user("");
    assert_eq!(game.world().list_slots(), vec!["Shared".to_string()]);
    assert!(game.world_mut().delete_user("Bob"));
    assert!(game.world().list_users().is_empty());
}

#[test]
fn test_persistent_data_follows_new_slot() {
    let mut game = TestGame::with_settings("persistent", |s| {
        s.copy_persistent_save = true;
    });
    game.world_mut().set_current_slot("Run1");
    game.world_mut()
        .with_persistent(|data| data.set("coins", &250u32));
    assert!(game.world_mut().save_persistent());

    game.world_mut().set_current_slot("Run2");
    let coins: Option<u32> = game.world_mut().with_persistent(|data| data.get("coins"));
    assert_eq!(coins, Some(250));
}

#[test]
fn test_local_profile_is_shared_across_slots() {
    let mut game = TestGame::new("profile");
    game.world_mut()
        .with_local_profile(|profile| profile.set("volume", &0.5f32));
    assert!(game.world_mut().save_local_profile());

    game.world_mut().set_current_slot("Other");
    let volume: Option<f32> = game
        .world_mut()
        .with_local_profile(|profile| profile.get("volume"));
    assert_eq!(volume, Some(0.5));
}

#[test]
fn test_thumbnail_lives_with_slot() {
    let mut game = TestGame::new("thumbnail");
    save_into(&mut game, "Run1");

    let png = [0x89, b'P', b'N', b'G', 1, 2, 3];
    assert!(game.world().export_thumbnail("Run1", &png));
    assert_eq!(game.world().import_thumbnail("Run1").unwrap(), png.to_vec());
    assert!(game.world().import_thumbnail("Run2").is_none());
}

#[test]
fn test_skip_save_set_after_spawn() {
    let mut game = TestGame::new("skip_save");
    game.spawn_crate("Keep", Vec3::X, true);
    let dropped = game.spawn_crate("Drop", Vec3::Y, true);
    game.world_mut()
        .set_entity_save_properties(
            dropped,
            SaveFlags {
                skip_save: true,
                ..Default::default()
            },
        )
        .unwrap();
    save_into(&mut game, "Run1");
    game.unload_crates();

    let id = game.world_mut().start_load(SaveScope::LEVEL, false).unwrap();
    game.run_until_finished(id);

    assert!(game.find("Keep").is_some());
    assert!(game.find("Drop").is_none());
}

#[test]
fn test_save_properties_need_a_saveable_entity() {
    let mut game = TestGame::new("properties");
    let plain = game.world_mut().spawn(Name::new("Rock")).id();

    let result = game
        .world_mut()
        .set_entity_save_properties(plain, SaveFlags::default());
    assert!(matches!(result, Err(SaveError::MissingCapability(_))));
}
