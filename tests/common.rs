#![allow(dead_code)]

use std::path::Path;

use glam::Vec3;
use scene_persistence::{
    EntityBuilder, EntityId, PersistConfig, Persistable, PersistenceService, PrefabLibrary,
    SceneWorld, StateCodec, Transform,
};
use serde::{Deserialize, Serialize};

/// Marks an entity with the asset it came from; carries no state of its own.
#[derive(Debug)]
pub struct PrefabTag {
    pub asset: String,
}

impl Persistable for PrefabTag {
    type State = ();
    const TYPE_KEY: &'static str = "PrefabTag";

    fn asset_id(&self) -> Option<&str> {
        Some(&self.asset)
    }

    fn capture(&self) {}

    fn restore(&mut self, _state: (), _placement: &Transform) {}
}

#[derive(Debug, PartialEq)]
pub struct Lock {
    pub locked: bool,
    pub code: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockState {
    pub locked: bool,
    pub code: Option<u32>,
}

impl Persistable for Lock {
    type State = LockState;
    const TYPE_KEY: &'static str = "Lock";

    fn capture(&self) -> LockState {
        LockState {
            locked: self.locked,
            code: self.code,
        }
    }

    fn restore(&mut self, state: LockState, _placement: &Transform) {
        self.locked = state.locked;
        self.code = state.code;
    }
}

/// Remembers where it stands, like a patrol route origin.
#[derive(Debug)]
pub struct Patrol {
    pub origin: Vec3,
    pub radius: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatrolState {
    pub origin: [f32; 3],
    pub radius: f32,
}

impl Persistable for Patrol {
    type State = PatrolState;
    const TYPE_KEY: &'static str = "Patrol";

    fn capture(&self) -> PatrolState {
        PatrolState {
            origin: self.origin.to_array(),
            radius: self.radius,
        }
    }

    fn restore(&mut self, state: PatrolState, placement: &Transform) {
        self.origin = placement.position;
        self.radius = state.radius;
    }
}

pub fn codec() -> StateCodec {
    StateCodec::new()
        .with::<PrefabTag>()
        .with::<Lock>()
        .with::<Patrol>()
}

fn prop(asset: &'static str) -> EntityBuilder {
    EntityBuilder::from_asset(asset).with_component(PrefabTag {
        asset: asset.to_string(),
    })
}

pub fn library() -> PrefabLibrary {
    PrefabLibrary::new()
        .with("Prefabs/Props/Door", || {
            prop("Door").with_component(Lock {
                locked: false,
                code: None,
            })
        })
        .with("Prefabs/Props/Key", || prop("Key"))
        .with("Prefabs/Props/Chest", || prop("Chest"))
        .with("Prefabs/Characters/Guard", || {
            prop("Guard").with_component(Patrol {
                origin: Vec3::ZERO,
                radius: 1.0,
            })
        })
}

pub fn service(root: &Path, progressive: bool) -> PersistenceService<PrefabLibrary> {
    let mut config = PersistConfig::with_root(root);
    config.loading.progressive = progressive;
    PersistenceService::new(config, codec(), library()).expect("service")
}

pub fn spawn_prop(world: &mut SceneWorld, asset: &'static str, position: Vec3) -> EntityId {
    world.spawn(prop(asset).at(position))
}

pub fn spawn_guard(world: &mut SceneWorld, position: Vec3, radius: f32) -> EntityId {
    world.spawn(prop("Guard").at(position).with_component(Patrol {
        origin: position,
        radius,
    }))
}
