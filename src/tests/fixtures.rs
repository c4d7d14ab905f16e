//! Sample gameplay components shared by the unit tests.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::codec::{Persistable, StateCodec};
use crate::loader::PrefabLibrary;
use crate::world::{EntityBuilder, Transform};

#[derive(Clone, Debug, PartialEq)]
pub struct Health {
    pub hp: i32,
    pub max: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthState {
    pub hp: i32,
    pub max: i32,
}

impl Persistable for Health {
    type State = HealthState;
    const TYPE_KEY: &'static str = "Health";

    fn capture(&self) -> HealthState {
        HealthState {
            hp: self.hp,
            max: self.max,
        }
    }

    fn restore(&mut self, state: HealthState, _placement: &Transform) {
        self.hp = state.hp;
        self.max = state.max;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    pub items: Vec<String>,
}

impl Persistable for Inventory {
    type State = Vec<String>;
    const TYPE_KEY: &'static str = "Inventory";

    fn capture(&self) -> Vec<String> {
        self.items.clone()
    }

    fn restore(&mut self, state: Vec<String>, _placement: &Transform) {
        self.items = state;
    }
}

/// Keeps its own copy of the position, like a movement controller would.
#[derive(Clone, Debug, PartialEq)]
pub struct Mover {
    pub position: Vec3,
    pub speed: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoverState {
    pub position: [f32; 3],
    pub speed: f32,
}

impl Persistable for Mover {
    type State = MoverState;
    const TYPE_KEY: &'static str = "Mover";

    fn capture(&self) -> MoverState {
        MoverState {
            position: self.position.to_array(),
            speed: self.speed,
        }
    }

    fn restore(&mut self, state: MoverState, placement: &Transform) {
        self.position = placement.position;
        self.speed = state.speed;
    }
}

pub fn codec() -> StateCodec {
    StateCodec::new()
        .with::<Health>()
        .with::<Inventory>()
        .with::<Mover>()
}

/// Prefabs for `Crate` (with `Health`) and `Walker` (with `Mover`).
pub fn library() -> PrefabLibrary {
    PrefabLibrary::new()
        .with("Crate", || {
            EntityBuilder::from_asset("Crate").with_component(Health { hp: 5, max: 5 })
        })
        .with("Prefabs/Characters/Walker", || {
            EntityBuilder::from_asset("Walker").with_component(Mover {
                position: Vec3::ZERO,
                speed: 1.0,
            })
        })
}
