//! Host scene model: the live entities snapshots are taken from and restored into.
//!
//! # Contracts
//! - **Postcondition**: Entity IDs are unique within a `SceneWorld` and never reused.
//! - **Invariant**: Iteration follows spawn order; despawning keeps the order of the rest.
//! - **Invariant**: An entity holds at most one component per type key.

use std::collections::HashMap;

use glam::{Quat, Vec3};

use crate::codec::{Persistable, Saveable};
use crate::history::CommandHistory;

// -----------------------------------------------------------------------------
// EntityId
// -----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

// -----------------------------------------------------------------------------
// Transform
// -----------------------------------------------------------------------------

/// World-space placement of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub const fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

// -----------------------------------------------------------------------------
// Entity
// -----------------------------------------------------------------------------

#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    pub name: String,
    /// Asset the entity was instantiated from. Empty for ad-hoc entities.
    pub asset_id: String,
    pub transform: Transform,
    pub active: bool,
    persistent: bool,
    components: Vec<Box<dyn Saveable>>,
}

impl Entity {
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// True for entities instantiated from a prefab. These are the ones a
    /// snapshot load purges before restoring.
    #[inline]
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn components(&self) -> impl Iterator<Item = &dyn Saveable> {
        self.components.iter().map(|c| &**c)
    }

    pub fn has_components(&self) -> bool {
        !self.components.is_empty()
    }

    pub fn component(&self, type_key: &str) -> Option<&dyn Saveable> {
        self.components
            .iter()
            .find(|c| c.type_key() == type_key)
            .map(|c| &**c)
    }

    pub fn component_mut(&mut self, type_key: &str) -> Option<&mut (dyn Saveable + 'static)> {
        self.components
            .iter_mut()
            .find(|c| c.type_key() == type_key)
            .map(|c| &mut **c)
    }

    /// Typed access to a component.
    pub fn get<C: Persistable>(&self) -> Option<&C> {
        self.component(C::TYPE_KEY)?.as_any().downcast_ref::<C>()
    }

    pub fn get_mut<C: Persistable>(&mut self) -> Option<&mut C> {
        self.component_mut(C::TYPE_KEY)?
            .as_any_mut()
            .downcast_mut::<C>()
    }

    /// Attaches a component, replacing and returning any component already
    /// stored under the same type key.
    pub fn insert_component(&mut self, component: Box<dyn Saveable>) -> Option<Box<dyn Saveable>> {
        insert_unique(&mut self.components, component)
    }
}

fn insert_unique(
    components: &mut Vec<Box<dyn Saveable>>,
    component: Box<dyn Saveable>,
) -> Option<Box<dyn Saveable>> {
    let key = component.type_key();
    match components.iter().position(|c| c.type_key() == key) {
        Some(index) => Some(std::mem::replace(&mut components[index], component)),
        None => {
            components.push(component);
            None
        }
    }
}

// -----------------------------------------------------------------------------
// EntityBuilder
// -----------------------------------------------------------------------------

/// Everything needed to spawn an entity; the world assigns the id.
#[derive(Debug)]
pub struct EntityBuilder {
    name: String,
    asset_id: String,
    transform: Transform,
    active: bool,
    persistent: bool,
    components: Vec<Box<dyn Saveable>>,
}

impl EntityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asset_id: String::new(),
            transform: Transform::IDENTITY,
            active: true,
            persistent: false,
            components: Vec::new(),
        }
    }

    /// Builder for an instance of a prefab; such entities are persistent.
    pub fn from_asset(asset_id: impl Into<String>) -> Self {
        let asset_id = asset_id.into();
        Self {
            name: asset_id.clone(),
            asset_id,
            transform: Transform::IDENTITY,
            active: true,
            persistent: true,
            components: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Marks the entity for removal by [`SceneWorld::purge_persistent`].
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_component<C: Saveable>(mut self, component: C) -> Self {
        insert_unique(&mut self.components, Box::new(component));
        self
    }

    pub fn with_boxed(mut self, component: Box<dyn Saveable>) -> Self {
        insert_unique(&mut self.components, component);
        self
    }
}

// -----------------------------------------------------------------------------
// SceneWorld
// -----------------------------------------------------------------------------

/// A user edit that can be undone.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneEdit {
    Moved {
        id: EntityId,
        from: Transform,
        to: Transform,
    },
    Renamed {
        id: EntityId,
        from: String,
        to: String,
    },
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
    next_id: u32,
    history: CommandHistory<SceneEdit>,
}

impl SceneWorld {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn spawn(&mut self, builder: EntityBuilder) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        self.index.insert(id, self.entities.len());
        self.entities.push(Entity {
            id,
            name: builder.name,
            asset_id: builder.asset_id,
            transform: builder.transform,
            active: builder.active,
            persistent: builder.persistent,
            components: builder.components,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let Some(idx) = self.index.remove(&id) else {
            return false;
        };
        self.entities.remove(idx);
        for entity in &self.entities[idx..] {
            if let Some(slot) = self.index.get_mut(&entity.id) {
                *slot -= 1;
            }
        }
        true
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&idx| &self.entities[idx])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.index
            .get(&id)
            .copied()
            .map(|idx| &mut self.entities[idx])
    }

    /// Entities in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Removes every persistent entity and drops the edit history, whose
    /// entries may point at them. Returns how many entities were removed.
    pub fn purge_persistent(&mut self) -> usize {
        let before = self.entities.len();
        self.entities.retain(|e| !e.persistent);
        self.rebuild_index();
        self.history.clear();
        before - self.entities.len()
    }

    // Undoable edits ---------------------------------------------------------

    pub fn move_entity(&mut self, id: EntityId, to: Transform) -> bool {
        let Some(entity) = self.get_mut(id) else {
            return false;
        };
        let from = std::mem::replace(&mut entity.transform, to);
        self.history.push(SceneEdit::Moved { id, from, to });
        true
    }

    pub fn rename_entity(&mut self, id: EntityId, to: impl Into<String>) -> bool {
        let to = to.into();
        let Some(entity) = self.get_mut(id) else {
            return false;
        };
        let from = std::mem::replace(&mut entity.name, to.clone());
        self.history.push(SceneEdit::Renamed { id, from, to });
        true
    }

    pub fn undo(&mut self) -> bool {
        let Some(edit) = self.history.undo().cloned() else {
            return false;
        };
        self.apply_edit(edit, true);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(edit) = self.history.redo().cloned() else {
            return false;
        };
        self.apply_edit(edit, false);
        true
    }

    pub fn history(&self) -> &CommandHistory<SceneEdit> {
        &self.history
    }

    fn apply_edit(&mut self, edit: SceneEdit, backwards: bool) {
        match edit {
            SceneEdit::Moved { id, from, to } => {
                if let Some(entity) = self.get_mut(id) {
                    entity.transform = if backwards { from } else { to };
                }
            }
            SceneEdit::Renamed { id, from, to } => {
                if let Some(entity) = self.get_mut(id) {
                    entity.name = if backwards { from } else { to };
                }
            }
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (idx, entity) in self.entities.iter().enumerate() {
            self.index.insert(entity.id, idx);
        }
    }
}

#[cfg(test)]
#[path = "tests/world_tests.rs"]
mod tests;
