//! Items lying in the world
//!
//! Spawned items persist until picked up. Dropped items carry a despawn
//! timer that is cancelled when someone picks them up again.

use std::collections::BTreeMap;

use glam::Vec3;
use loadout_core::{ItemId, ItemRef, TaskSlot};
use tracing::debug;

use crate::config::ItemArchetype;
use crate::item::Item;

#[derive(Debug)]
struct WorldItem {
    item: Item,
    position: Vec3,
    despawn: TaskSlot,
}

/// Registry of unowned items and allocator of item ids
#[derive(Debug)]
pub struct WorldItems {
    items: BTreeMap<ItemId, WorldItem>,
    next_id: u32,
    lifetime: f32,
}

impl WorldItems {
    /// `lifetime` is how long a dropped item lingers, in seconds
    pub fn new(lifetime: f32) -> Self {
        Self {
            items: BTreeMap::new(),
            next_id: 1,
            lifetime,
        }
    }

    pub fn allocate_id(&mut self) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create an item from an archetype under a fresh id, not yet placed
    pub fn instantiate(&mut self, archetype: &ItemArchetype) -> Item {
        let id = self.allocate_id();
        Item::from_archetype(id, archetype)
    }

    /// Place an item that stays until picked up
    pub fn spawn(&mut self, item: Item, position: Vec3) -> ItemId {
        let id = item.id();
        self.items.insert(
            id,
            WorldItem {
                item,
                position,
                despawn: TaskSlot::new(),
            },
        );
        id
    }

    /// Place an item that despawns unless picked up in time
    pub fn drop_item(&mut self, item: Item, position: Vec3, now: f64) -> ItemId {
        let id = item.id();
        let mut despawn = TaskSlot::new();
        despawn.schedule(now, self.lifetime);
        self.items.insert(
            id,
            WorldItem {
                item,
                position,
                despawn,
            },
        );
        id
    }

    /// Remove an item from the world, cancelling its despawn timer
    pub fn take(&mut self, id: ItemId) -> Option<Item> {
        self.items.remove(&id).map(|mut entry| {
            entry.despawn.cancel();
            entry.item
        })
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id).map(|entry| &entry.item)
    }

    pub fn position(&self, id: ItemId) -> Option<Vec3> {
        self.items.get(&id).map(|entry| entry.position)
    }

    /// Descriptors of every item lying in the world
    pub fn descriptors(&self) -> impl Iterator<Item = &ItemRef> {
        self.items.values().map(|entry| entry.item.descriptor())
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Tick despawn timers; returns the ids that were removed
    pub fn advance(&mut self, dt: f32) -> Vec<ItemId> {
        let expired: Vec<ItemId> = self
            .items
            .iter_mut()
            .filter_map(|(id, entry)| entry.despawn.advance(dt).map(|_| *id))
            .collect();
        for id in &expired {
            self.items.remove(id);
            debug!("Despawned unclaimed {}", id);
        }
        expired
    }
}
