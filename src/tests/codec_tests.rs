use super::*;
use crate::test_fixtures::{codec, Health, HealthState, Inventory, Mover};
use crate::world::{EntityBuilder, SceneWorld};
use glam::Vec3;

fn capture_all(entity: &Entity) -> Vec<(String, Payload)> {
    entity
        .components()
        .map(|c| (c.type_key().to_string(), c.capture_payload()))
        .collect()
}

fn encode_entity(codec: &StateCodec, entity: &Entity) -> String {
    let captured = capture_all(entity);
    codec.encode_to_string(
        captured
            .iter()
            .map(|(k, p)| (k.as_str(), &**p as &dyn ComponentState)),
    )
}

#[test]
fn restore_after_encode_decode_reproduces_captured_state() {
    let codec = codec();
    let mut world = SceneWorld::new();
    let original = world.spawn(
        EntityBuilder::from_asset("Chest")
            .with_component(Health { hp: 7, max: 10 })
            .with_component(Inventory {
                items: vec!["key".into(), "coin".into()],
            }),
    );
    let fresh = world.spawn(
        EntityBuilder::from_asset("Chest")
            .with_component(Health { hp: 0, max: 0 })
            .with_component(Inventory::default()),
    );

    let custom_data = encode_entity(&codec, world.get(original).expect("original"));
    let target = world.get_mut(fresh).expect("fresh");
    let errors = codec.decode_and_restore(&custom_data, target, &Transform::IDENTITY);

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(target.get::<Health>(), Some(&Health { hp: 7, max: 10 }));
    assert_eq!(
        target.get::<Inventory>().map(|i| i.items.clone()),
        Some(vec!["key".to_string(), "coin".to_string()])
    );
}

#[test]
fn encoded_values_are_opaque_per_key() {
    let codec = codec();
    let health = Health { hp: 3, max: 4 };
    let payload = Persistable::capture(&health);
    let map = codec.encode([("Health", &payload as &dyn ComponentState)]);

    assert_eq!(map.keys, ["Health"]);
    let decoded: HealthState = serde_json::from_str(&map.json_values[0]).expect("plain json");
    assert_eq!(decoded, HealthState { hp: 3, max: 4 });
}

#[test]
fn decode_drops_entries_the_target_cannot_take() {
    let codec = codec();
    let mut world = SceneWorld::new();
    let id = world.spawn(EntityBuilder::from_asset("Door").with_component(Health { hp: 1, max: 1 }));

    let mut map = EncodedPayloadMap::default();
    map.upsert("Health", r#"{"hp":9,"max":9}"#.to_string());
    map.upsert("Inventory", r#"["rope"]"#.to_string());
    map.upsert("Unregistered", "{}".to_string());
    let custom_data = serde_json::to_string(&map).expect("serialize map");

    let target = world.get(id).expect("door");
    let decoded = codec.decode(&custom_data, target);
    assert_eq!(decoded.entries.len(), 1);
    assert_eq!(decoded.entries[0].0, "Health");
    assert_eq!(decoded.errors.len(), 2);
    assert!(decoded
        .errors
        .iter()
        .all(|e| matches!(e, PersistError::TypeResolution { .. })));
}

#[test]
fn decode_reports_payload_of_the_wrong_shape() {
    let codec = codec();
    let mut world = SceneWorld::new();
    let id = world.spawn(EntityBuilder::from_asset("Door").with_component(Health { hp: 1, max: 1 }));
    let custom_data = r#"{"keys":["Health"],"jsonValues":["\"not health\""]}"#;

    let target = world.get_mut(id).expect("door");
    let errors = codec.decode_and_restore(custom_data, target, &Transform::IDENTITY);
    assert_eq!(errors.len(), 1);
    assert_eq!(target.get::<Health>(), Some(&Health { hp: 1, max: 1 }));
}

#[test]
fn decode_of_garbage_reports_instead_of_failing() {
    let codec = codec();
    let mut world = SceneWorld::new();
    let id = world.spawn(EntityBuilder::from_asset("Door"));
    let decoded = codec.decode("{not json", world.get(id).expect("door"));
    assert!(decoded.entries.is_empty());
    assert!(matches!(decoded.errors.as_slice(), [PersistError::Parse { .. }]));

    assert!(codec.decode("   ", world.get(id).expect("door")).errors.is_empty());
}

#[test]
fn merge_keeps_unknown_entries_opaque_and_overwrites_same_key() {
    let codec = StateCodec::new();
    let existing = r#"{"keys":["Future"],"jsonValues":["{\"anything\":true}"]}"#;
    let first = HealthState { hp: 1, max: 2 };
    let second = HealthState { hp: 5, max: 6 };

    let merged = codec.merge(existing, "Health", &first);
    let merged = codec.merge(&merged, "Health", &second);
    let map: EncodedPayloadMap = serde_json::from_str(&merged).expect("merged map");

    assert_eq!(map.keys, ["Future", "Health"]);
    assert_eq!(map.get("Future"), Some(r#"{"anything":true}"#));
    assert_eq!(map.get("Health"), Some(r#"{"hp":5,"max":6}"#));
}

#[test]
fn merge_resets_corrupt_existing_map() {
    let codec = StateCodec::new();
    let payload = vec!["rope".to_string()];

    let merged = codec.merge("{{{", "Inventory", &payload);
    let map: EncodedPayloadMap = serde_json::from_str(&merged).expect("merged map");
    assert_eq!(map.keys, ["Inventory"]);

    let mismatched = r#"{"keys":["A","B"],"jsonValues":["1"]}"#;
    let merged = codec.merge(mismatched, "Inventory", &payload);
    let map: EncodedPayloadMap = serde_json::from_str(&merged).expect("merged map");
    assert_eq!(map.keys, ["Inventory"]);
}

#[test]
fn restore_passes_placement_to_transform_owning_components() {
    let codec = codec();
    let mut world = SceneWorld::new();
    let id = world.spawn(EntityBuilder::from_asset("Cart").with_component(Mover {
        position: Vec3::ZERO,
        speed: 0.0,
    }));
    let custom_data =
        r#"{"keys":["Mover"],"jsonValues":["{\"position\":[100.0,0.0,0.0],\"speed\":2.5}"]}"#;
    let placement = Transform::at(Vec3::new(4.0, 5.0, 6.0));

    let target = world.get_mut(id).expect("cart");
    assert!(codec.decode_and_restore(custom_data, target, &placement).is_empty());
    let mover = target.get::<Mover>().expect("mover");
    assert_eq!(mover.position, Vec3::new(4.0, 5.0, 6.0));
    assert_eq!(mover.speed, 2.5);
}

#[test]
fn registry_reports_registered_types() {
    let codec = codec();
    assert!(codec.is_registered("Health"));
    assert!(!codec.is_registered("Quest"));
}
