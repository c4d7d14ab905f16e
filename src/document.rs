//! On-disk document shapes.
//!
//! Field names follow the JSON layout save files have always used, so the
//! structs rename to camelCase (and a couple of legacy spellings such as
//! `prefabID`).

use glam::{Quat, Vec3};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `{x, y, z}` vector as stored in documents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vec3Data {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3Data> for Vec3 {
    fn from(v: Vec3Data) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// `{x, y, z, w}` quaternion as stored in documents.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuatData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for QuatData {
    fn default() -> Self {
        Quat::IDENTITY.into()
    }
}

impl From<Quat> for QuatData {
    fn from(q: Quat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}

impl From<QuatData> for Quat {
    fn from(q: QuatData) -> Self {
        Quat::from_xyzw(q.x, q.y, q.z, q.w)
    }
}

fn unit_scale() -> Vec3Data {
    Vec3::ONE.into()
}

/// One persisted entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    #[serde(rename = "prefabID")]
    pub prefab_id: String,
    #[serde(default)]
    pub position: Vec3Data,
    #[serde(default)]
    pub rotation: QuatData,
    #[serde(default = "unit_scale")]
    pub scale: Vec3Data,
    #[serde(default)]
    pub object_name: String,
    /// JSON text of an [`EncodedPayloadMap`]. Empty when the entity had no payload.
    #[serde(default)]
    pub custom_data: String,
}

impl SaveRecord {
    pub fn new(prefab_id: impl Into<String>) -> Self {
        Self {
            prefab_id: prefab_id.into(),
            position: Vec3Data::default(),
            rotation: QuatData::default(),
            scale: unit_scale(),
            object_name: String::new(),
            custom_data: String::new(),
        }
    }
}

/// Parallel key/value arrays carrying each component's payload as opaque JSON text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncodedPayloadMap {
    pub keys: Vec<String>,
    pub json_values: Vec<String>,
}

impl EncodedPayloadMap {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Pairs keys with values. `None` when the arrays disagree in length.
    pub fn entries(&self) -> Option<impl Iterator<Item = (&str, &str)>> {
        if self.keys.len() != self.json_values.len() {
            return None;
        }
        Some(
            self.keys
                .iter()
                .map(String::as_str)
                .zip(self.json_values.iter().map(String::as_str)),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let index = self.keys.iter().position(|k| k == key)?;
        self.json_values.get(index).map(String::as_str)
    }

    /// Inserts or overwrites `key`, keeping first-seen key order.
    pub fn upsert(&mut self, key: &str, json: String) {
        match self.keys.iter().position(|k| k == key) {
            Some(index) => self.json_values[index] = json,
            None => {
                self.keys.push(key.to_string());
                self.json_values.push(json);
            }
        }
    }
}

/// A full-scene snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    pub save_time: String,
    pub object_count: usize,
    #[serde(default)]
    pub objects: Vec<SaveRecord>,
}

impl SnapshotDocument {
    pub fn new(save_time: impl Into<String>, objects: Vec<SaveRecord>) -> Self {
        Self {
            save_time: save_time.into(),
            object_count: objects.len(),
            objects,
        }
    }
}

/// A labelled subset whose record positions are relative to `center_position`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSnapshotDocument {
    pub save_name: String,
    pub save_time: String,
    pub center_position: Vec3Data,
    pub object_count: usize,
    #[serde(default)]
    pub objects: Vec<SaveRecord>,
}

/// Just the summary fields of either document kind.
///
/// Unknown fields are skipped without being typed, so an `objects` value of the
/// wrong shape still yields a header. The file must remain well-formed JSON:
/// a truncated or syntactically broken document fails to parse here too, and
/// slot listing falls back to file metadata with an object count of 0.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHeader {
    #[serde(default)]
    pub save_name: Option<String>,
    pub save_time: String,
    pub object_count: usize,
}

/// Local wall-clock time in the `saveTime` format.
pub fn now_save_time() -> String {
    chrono::Local::now().format(SAVE_TIME_FORMAT).to_string()
}

pub const SAVE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// JSON schema for [`SnapshotDocument`].
pub fn snapshot_json_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(SnapshotDocument)
}

/// JSON schema for [`SelectionSnapshotDocument`].
pub fn selection_json_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(SelectionSnapshotDocument)
}
