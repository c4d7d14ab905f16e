use std::path::{Path, PathBuf};

use schemars::{schema_for, JsonSchema};
use scene_persistence::{
    selection_json_schema, snapshot_json_schema, SelectionSnapshotDocument, SnapshotDocument,
};
use serde_json::Value;

fn stored_schema_path(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(file)
}

/// Compares the generated schema of `D` with the checked-in copy, writing the
/// copy when it is absent or `UPDATE_SCHEMA` is set.
fn assert_schema_stable<D: JsonSchema>(file: &str) {
    let generated = serde_json::to_value(schema_for!(D)).expect("schema serializes");
    let path = stored_schema_path(file);

    if std::env::var_os("UPDATE_SCHEMA").is_some() || !path.exists() {
        let pretty = serde_json::to_string_pretty(&generated).expect("pretty schema");
        std::fs::write(&path, pretty).expect("write schema");
        return;
    }

    let stored: Value = std::fs::read_to_string(&path)
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_else(|| panic!("{} is not valid JSON", path.display()));
    assert_eq!(
        stored,
        generated,
        "{file} is stale; rerun with UPDATE_SCHEMA=1 after an intended format change"
    );
}

#[test]
fn slot_document_schema_is_stable() {
    assert_schema_stable::<SnapshotDocument>("schema_snapshot_document.json");
}

#[test]
fn selection_document_schema_is_stable() {
    assert_schema_stable::<SelectionSnapshotDocument>("schema_selection_document.json");
}

#[test]
fn schema_uses_the_document_field_names() {
    let json = serde_json::to_value(snapshot_json_schema()).expect("schema json");
    let record = &json["definitions"]["SaveRecord"]["properties"];
    for field in ["prefabID", "position", "rotation", "scale", "objectName", "customData"] {
        assert!(record.get(field).is_some(), "missing {field}");
    }
    let root = &json["properties"];
    for field in ["saveTime", "objectCount", "objects"] {
        assert!(root.get(field).is_some(), "missing {field}");
    }
}

#[test]
fn selection_schema_carries_its_anchor_fields() {
    let json = serde_json::to_value(selection_json_schema()).expect("schema json");
    for field in ["saveName", "saveTime", "centerPosition", "objectCount", "objects"] {
        assert!(json["properties"].get(field).is_some(), "missing {field}");
    }
}
