mod common;

use std::fs;

use common::{service, spawn_prop, Lock};
use glam::Vec3;
use scene_persistence::{EntityBuilder, PersistError, PersistEvent, SceneWorld, SnapshotDocument};

#[test]
fn alpha_scenario_saves_loads_and_deletes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path(), true);

    let mut world = SceneWorld::new();
    spawn_prop(&mut world, "Door", Vec3::new(1.0, 0.0, 0.0));
    spawn_prop(&mut world, "Key", Vec3::new(2.0, 0.0, 0.0));
    spawn_prop(&mut world, "Chest", Vec3::new(3.0, 0.0, 0.0));
    world.spawn(EntityBuilder::new("Main Camera"));

    let file = service.save(&world, Some("Alpha")).expect("save alpha");
    let text = fs::read_to_string(dir.path().join(&file)).expect("slot file");
    let document: SnapshotDocument = serde_json::from_str(&text).expect("document");
    assert_eq!(document.object_count, 3);
    let raw: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(raw["objects"][0]["prefabID"], "Door");
    assert!(raw["objects"][0]["customData"].is_string());

    let mut restored = SceneWorld::new();
    service.load(&mut restored, Some("Alpha")).expect("load alpha");
    while service.is_loading() {
        service.tick(&mut restored, 1.0 / 60.0);
    }
    let loaded: Vec<_> = restored
        .iter()
        .map(|e| (e.name.as_str(), e.transform.position))
        .collect();
    assert_eq!(
        loaded,
        [
            ("Door", Vec3::new(1.0, 0.0, 0.0)),
            ("Key", Vec3::new(2.0, 0.0, 0.0)),
            ("Chest", Vec3::new(3.0, 0.0, 0.0)),
        ]
    );

    assert!(service.list_slots().iter().any(|s| s.name == "Alpha"));
    assert!(service.delete_slot("Alpha"));
    assert!(service.list_slots().iter().all(|s| s.name != "Alpha"));
}

#[test]
fn repeated_loads_do_not_accumulate_entities() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path(), false);

    let mut world = SceneWorld::new();
    spawn_prop(&mut world, "Door", Vec3::X);
    spawn_prop(&mut world, "Key", Vec3::Y);
    service.save(&world, Some("Twice")).expect("save");

    let mut scene = SceneWorld::new();
    scene.spawn(EntityBuilder::new("Sun"));
    service.load(&mut scene, Some("Twice")).expect("first load");
    service.load(&mut scene, Some("Twice")).expect("second load");
    assert_eq!(scene.len(), 3);
    assert!(scene.find_by_name("Sun").is_some());
}

#[test]
fn component_state_survives_the_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path(), false);

    let mut world = SceneWorld::new();
    let door = spawn_prop(&mut world, "Door", Vec3::ZERO);
    world
        .get_mut(door)
        .expect("door")
        .insert_component(Box::new(Lock {
            locked: true,
            code: Some(1234),
        }));
    service.save(&world, Some("Locked")).expect("save");

    let mut restored = SceneWorld::new();
    service.load(&mut restored, Some("Locked")).expect("load");
    let lock = restored
        .find_by_name("Door")
        .and_then(|e| e.get::<Lock>())
        .expect("lock restored");
    assert_eq!(
        lock,
        &Lock {
            locked: true,
            code: Some(1234)
        }
    );
}

#[test]
fn damaged_slot_recovers_from_backup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path(), false);

    let mut world = SceneWorld::new();
    spawn_prop(&mut world, "Chest", Vec3::ZERO);
    let file = service.save(&world, Some("Fragile")).expect("first save");
    spawn_prop(&mut world, "Key", Vec3::ONE);
    service.save(&world, Some("Fragile")).expect("second save");

    fs::write(dir.path().join(&file), "{ not a document").expect("corrupt slot");
    let mut restored = SceneWorld::new();
    service.load(&mut restored, Some("Fragile")).expect("load from backup");
    assert_eq!(restored.len(), 1);
}

#[test]
fn unparseable_slot_without_backup_leaves_the_scene_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path(), true);
    fs::write(dir.path().join("Broken_SceneObjects.json"), "]]").expect("write junk");

    let mut scene = SceneWorld::new();
    spawn_prop(&mut scene, "Door", Vec3::ZERO);
    let err = service.load(&mut scene, Some("Broken")).expect_err("parse error");
    assert!(matches!(err, PersistError::Parse { .. }));
    assert_eq!(scene.len(), 1);
    assert!(service
        .drain_events()
        .iter()
        .any(|e| matches!(e, PersistEvent::Error { .. })));

    let listed = service.list_slots();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].header_ok);
}

#[test]
fn missing_prefabs_are_skipped_and_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path(), false);
    let document = r#"{
        "saveTime": "2026-10-16 09:30:00",
        "objectCount": 3,
        "objects": [
            {"prefabID": "Door", "position": {"x": 1, "y": 0, "z": 0}},
            {"prefabID": "Dragon"},
            {"prefabID": "Key", "customData": "{\"keys\":[\"Unknown\"],\"jsonValues\":[\"1\"]}"}
        ]
    }"#;
    fs::write(dir.path().join("Handmade_SceneObjects.json"), document).expect("write slot");

    let mut scene = SceneWorld::new();
    service.load(&mut scene, Some("Handmade")).expect("load");
    assert_eq!(scene.len(), 2);

    let events = service.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        PersistEvent::RecordFailed { index: 1, prefab_id, .. } if prefab_id == "Dragon"
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, PersistEvent::PayloadDropped { index: 2, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, PersistEvent::LoadCompleted { total: 3, failed: 1, .. })));
}
