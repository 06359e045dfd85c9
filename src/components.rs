use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Marks a connected player entity
#[derive(Component, Clone, Debug)]
pub struct Player {
    pub username: String,
}

/// Stable entity id, preserved across world save/load.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(pub u64);

#[derive(Resource)]
pub struct NextNetworkId(pub u64);

impl Default for NextNetworkId {
    fn default() -> Self {
        Self(1)
    }
}

/// Entity type identifier, e.g. `minecraft:zombie`
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct EntityKind(pub String);

/// The spatial partition an entity lives in.
#[derive(Component, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension(pub String);

impl Dimension {
    pub fn overworld() -> Self {
        Self("overworld".to_string())
    }
}

/// World position in blocks
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GamePosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl GamePosition {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Block coordinates containing this position.
    pub fn floor(&self) -> (i32, i32, i32) {
        (
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

/// Facing in degrees
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
    #[serde(default)]
    pub head_yaw: f32,
}

/// Display name shown above the entity
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct NameTag(pub String);

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Scale(pub f32);

impl Default for Scale {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Command permission of an origin. Ordered from least to most privileged.
#[derive(
    Component, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    #[default]
    Member,
    Operator,
    Internal,
}

/// A stack of one item type in an inventory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemSlot {
    pub item_id: String,
    pub count: u32,
}

/// Items held by a player.
#[derive(Component, Clone, Debug, Default)]
pub struct Inventory {
    pub slots: Vec<ItemSlot>,
}

impl Inventory {
    /// Stacks onto an existing slot of the same item. Returns the new total.
    pub fn add(&mut self, item_id: &str, count: u32) -> u32 {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.item_id == item_id) {
            slot.count = slot.count.saturating_add(count);
            return slot.count;
        }
        self.slots.push(ItemSlot {
            item_id: item_id.to_string(),
            count,
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_rounds_towards_negative_infinity() {
        let pos = GamePosition::new(10.7, -0.5, -3.2);
        assert_eq!(pos.floor(), (10, -1, -4));
    }

    #[test]
    fn permission_levels_are_ordered() {
        assert!(PermissionLevel::Member < PermissionLevel::Operator);
        assert!(PermissionLevel::Operator < PermissionLevel::Internal);
    }

    #[test]
    fn inventory_stacks_same_item() {
        let mut inventory = Inventory::default();
        assert_eq!(inventory.add("minecraft:diamond", 1), 1);
        assert_eq!(inventory.add("minecraft:bread", 4), 4);
        assert_eq!(inventory.add("minecraft:diamond", 2), 3);
        assert_eq!(inventory.slots.len(), 2);
    }
}
