use bevy::prelude::*;

use crate::components::*;

/// Everything needed to place a non-player entity in the world.
#[derive(Clone, Debug)]
pub struct SpawnRequest {
    pub kind: String,
    pub dimension: Dimension,
    pub position: GamePosition,
    pub rotation: Rotation,
    pub nametag: Option<String>,
    pub scale: f32,
}

impl SpawnRequest {
    pub fn new(kind: impl Into<String>, dimension: Dimension, position: GamePosition) -> Self {
        Self {
            kind: kind.into(),
            dimension,
            position,
            rotation: Rotation::default(),
            nametag: None,
            scale: 1.0,
        }
    }
}

pub fn spawn_entity(world: &mut World, req: SpawnRequest) -> Entity {
    spawn_entity_with_network_id(world, req, None)
}

/// Spawns with `forced_network_id` when restoring a save, keeping the
/// allocator ahead of every id seen so far.
pub fn spawn_entity_with_network_id(
    world: &mut World,
    req: SpawnRequest,
    forced_network_id: Option<u64>,
) -> Entity {
    let network_id = allocate_network_id(world, forced_network_id);
    let mut entity = world.spawn((
        network_id,
        EntityKind(req.kind),
        req.dimension,
        req.position,
        req.rotation,
        Scale(req.scale),
    ));
    if let Some(nametag) = req.nametag {
        entity.insert(NameTag(nametag));
    }
    entity.id()
}

pub fn spawn_player(
    world: &mut World,
    username: &str,
    dimension: Dimension,
    position: GamePosition,
    rotation: Rotation,
    permission: PermissionLevel,
) -> Entity {
    let network_id = allocate_network_id(world, None);
    world
        .spawn((
            network_id,
            Player {
                username: username.to_string(),
            },
            EntityKind("minecraft:player".to_string()),
            NameTag(username.to_string()),
            dimension,
            position,
            rotation,
            permission,
            Inventory::default(),
        ))
        .id()
}

fn allocate_network_id(world: &mut World, forced: Option<u64>) -> NetworkId {
    let mut next = world.get_resource_or_insert_with(NextNetworkId::default);
    let assigned = forced.unwrap_or(next.0).max(1);
    next.0 = next.0.max(assigned.saturating_add(1));
    NetworkId(assigned)
}
