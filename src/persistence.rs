use std::collections::BTreeMap;
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorRegistry;
use crate::components::*;
use crate::config::ServerConfig;
use crate::error::PersistenceError;
use crate::nbt::CompoundTag;
use crate::spawn::{spawn_entity_with_network_id, SpawnRequest};

pub const SAVE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WorldSave {
    pub version: u32,
    #[serde(default = "default_next_network_id")]
    pub next_network_id: u64,
    pub entities: Vec<SaveEntity>,
}

fn default_next_network_id() -> u64 {
    1
}

fn default_scale() -> f32 {
    1.0
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SaveEntity {
    pub network_id: u64,
    pub kind: String,
    pub dimension: String,
    pub position: GamePosition,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub nametag: Option<String>,
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Behavior identifier -> serialized tree.
    #[serde(default)]
    pub behaviors: BTreeMap<String, CompoundTag>,
}

/// Set to write the world at the end of the current tick.
#[derive(Resource, Default)]
pub struct SaveRequest(pub bool);

/// Snapshot of every non-player entity, in network id order.
pub fn capture_world(world: &mut World) -> WorldSave {
    let mut query = world.query_filtered::<(
        Entity,
        &NetworkId,
        &EntityKind,
        &Dimension,
        &GamePosition,
        Option<&Rotation>,
        Option<&NameTag>,
        Option<&Scale>,
    ), Without<Player>>();
    let mut rows: Vec<(Entity, SaveEntity)> = query
        .iter(world)
        .map(|(entity, id, kind, dim, pos, rot, tag, scale)| {
            (
                entity,
                SaveEntity {
                    network_id: id.0,
                    kind: kind.0.clone(),
                    dimension: dim.0.clone(),
                    position: *pos,
                    rotation: rot.copied().unwrap_or_default(),
                    nametag: tag.map(|t| t.0.clone()),
                    scale: scale.map(|s| s.0).unwrap_or(1.0),
                    behaviors: BTreeMap::new(),
                },
            )
        })
        .collect();
    rows.sort_by_key(|(_, save)| save.network_id);

    if let Some(registry) = world.get_resource::<BehaviorRegistry>() {
        for (entity, save) in &mut rows {
            for (identifier, tree) in registry.save_all(world, *entity) {
                save.behaviors.insert(identifier.to_string(), tree);
            }
        }
    }

    WorldSave {
        version: SAVE_VERSION,
        next_network_id: world
            .get_resource::<NextNetworkId>()
            .map(|n| n.0)
            .unwrap_or(1),
        entities: rows.into_iter().map(|(_, save)| save).collect(),
    }
}

/// Replaces every non-player entity with the contents of `save`.
/// Returns the number of entities spawned.
pub fn restore_world(world: &mut World, save: &WorldSave) -> Result<usize, PersistenceError> {
    if save.version > SAVE_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: save.version,
            supported: SAVE_VERSION,
        });
    }

    let stale: Vec<Entity> = world
        .query_filtered::<Entity, (With<NetworkId>, Without<Player>)>()
        .iter(world)
        .collect();
    for entity in stale {
        world.despawn(entity);
    }

    for saved in &save.entities {
        let req = SpawnRequest {
            kind: saved.kind.clone(),
            dimension: Dimension(saved.dimension.clone()),
            position: saved.position,
            rotation: saved.rotation,
            nametag: saved.nametag.clone(),
            scale: saved.scale,
        };
        let entity = spawn_entity_with_network_id(world, req, Some(saved.network_id));

        for (identifier, tree) in &saved.behaviors {
            let loader = world
                .get_resource::<BehaviorRegistry>()
                .and_then(|registry| registry.loader(identifier));
            match loader {
                Some(load) => load(world, entity, tree),
                None => warn!(
                    "[Slapper persistence] Skipping unknown behavior '{identifier}' on entity {}",
                    saved.network_id
                ),
            }
        }
    }

    let mut next = world.get_resource_or_insert_with(NextNetworkId::default);
    next.0 = next.0.max(save.next_network_id);
    Ok(save.entities.len())
}

pub fn read_save(path: &Path) -> Result<Option<WorldSave>, PersistenceError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Writes through a sibling temp file so a crash never leaves a torn save.
pub fn write_save(path: &Path, save: &WorldSave) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(save)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub struct PersistencePlugin;

impl Plugin for PersistencePlugin {
    fn build(&self, app: &mut App) {
        let autosave_seconds = app
            .world()
            .get_resource::<ServerConfig>()
            .map(|c| c.autosave_seconds)
            .unwrap_or(300.0)
            .max(1.0);
        app.init_resource::<SaveRequest>()
            .insert_resource(AutosaveTimer(Timer::from_seconds(
                autosave_seconds,
                TimerMode::Repeating,
            )))
            .add_systems(Startup, load_world_on_startup)
            .add_systems(PostUpdate, (tick_autosave, request_save_on_exit))
            .add_systems(Last, flush_save_request);
    }
}

#[derive(Resource)]
struct AutosaveTimer(Timer);

fn save_path(world: &World) -> String {
    world
        .get_resource::<ServerConfig>()
        .map(|c| c.save_path.clone())
        .unwrap_or_else(|| ServerConfig::default().save_path)
}

fn load_world_on_startup(world: &mut World) {
    let path = save_path(world);
    if let Some(registry) = world.get_resource::<BehaviorRegistry>() {
        let known: Vec<&str> = registry.identifiers().collect();
        debug!("[Slapper persistence] Known behaviors: {}", known.join(", "));
    }
    match read_save(Path::new(&path)) {
        Ok(Some(save)) => match restore_world(world, &save) {
            Ok(count) => info!("[Slapper persistence] Loaded {count} entities from {path}"),
            Err(err) => error!("[Slapper persistence] Failed to restore {path}: {err}"),
        },
        Ok(None) => info!("[Slapper persistence] No save at {path}, starting empty"),
        Err(err) => error!("[Slapper persistence] Failed to read {path}: {err}"),
    }
}

fn tick_autosave(
    time: Res<Time>,
    mut timer: ResMut<AutosaveTimer>,
    mut request: ResMut<SaveRequest>,
) {
    if timer.0.tick(time.delta()).just_finished() {
        request.0 = true;
    }
}

fn request_save_on_exit(mut exits: EventReader<AppExit>, mut request: ResMut<SaveRequest>) {
    if exits.read().next().is_some() {
        request.0 = true;
    }
}

fn flush_save_request(world: &mut World) {
    let requested = world
        .get_resource_mut::<SaveRequest>()
        .map(|mut r| std::mem::take(&mut r.0))
        .unwrap_or(false);
    if !requested {
        return;
    }
    let path = save_path(world);
    let save = capture_world(world);
    match write_save(Path::new(&path), &save) {
        Ok(()) => info!(
            "[Slapper persistence] Saved {} entities to {path}",
            save.entities.len()
        ),
        Err(err) => error!("[Slapper persistence] Failed to save {path}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{SlapperBehavior, SLAPPER_IDENTIFIER};
    use crate::nbt::{ListTag, Tag};
    use crate::slapper::create_slapper;
    use crate::spawn::spawn_player;

    fn world_with_registry() -> World {
        let mut world = World::new();
        let mut registry = BehaviorRegistry::default();
        registry.register::<SlapperBehavior>().unwrap();
        world.insert_resource(registry);
        world.init_resource::<NextNetworkId>();
        world
    }

    #[test]
    fn save_and_reload_preserves_slappers() {
        let mut world = world_with_registry();
        spawn_player(
            &mut world,
            "Steve",
            Dimension::overworld(),
            GamePosition::default(),
            Rotation::default(),
            PermissionLevel::Operator,
        );
        let guide = create_slapper(
            &mut world,
            "minecraft:villager",
            "Guide",
            Dimension::overworld(),
            GamePosition::new(4.0, 63.5, -2.0),
            Rotation {
                yaw: 180.0,
                pitch: 0.0,
                head_yaw: 180.0,
            },
        );
        world.get_mut::<SlapperBehavior>(guide).unwrap().commands =
            vec!["say hi".to_string(), "give @s bread".to_string()];
        world.entity_mut(guide).insert(Scale(2.0));

        let json = serde_json::to_string(&capture_world(&mut world)).unwrap();
        let save: WorldSave = serde_json::from_str(&json).unwrap();
        assert_eq!(save.entities.len(), 1);

        let mut fresh = world_with_registry();
        assert_eq!(restore_world(&mut fresh, &save).unwrap(), 1);

        let (entity, behavior) = fresh
            .query::<(Entity, &SlapperBehavior)>()
            .iter(&fresh)
            .map(|(e, b)| (e, b.clone()))
            .next()
            .unwrap();
        assert_eq!(behavior.entity(), entity);
        assert_eq!(behavior.commands, vec!["say hi", "give @s bread"]);
        assert_eq!(behavior.nametag(&fresh), Some("Guide"));
        assert_eq!(fresh.get::<Scale>(entity), Some(&Scale(2.0)));
        assert_eq!(fresh.get::<GamePosition>(entity), Some(&GamePosition::new(4.0, 63.5, -2.0)));
        assert_eq!(fresh.get::<Rotation>(entity).map(|r| r.yaw), Some(180.0));
        assert_eq!(fresh.get::<NetworkId>(entity), world.get::<NetworkId>(guide));

        // Re-saving a loaded world gives back the same document.
        assert_eq!(capture_world(&mut fresh).entities, save.entities);
    }

    #[test]
    fn restore_skips_unknown_behaviors_and_keeps_id_allocator_ahead() {
        let mut tree = CompoundTag::default();
        tree.insert("commands", Tag::List(ListTag::from_strings(["say a"])));
        let mut behaviors = BTreeMap::new();
        behaviors.insert("other:glow".to_string(), CompoundTag::default());
        behaviors.insert(SLAPPER_IDENTIFIER.to_string(), tree);
        let save = WorldSave {
            version: SAVE_VERSION,
            next_network_id: 3,
            entities: vec![SaveEntity {
                network_id: 12,
                kind: "minecraft:zombie".to_string(),
                dimension: "overworld".to_string(),
                position: GamePosition::default(),
                rotation: Rotation::default(),
                nametag: None,
                scale: 1.0,
                behaviors,
            }],
        };

        let mut world = world_with_registry();
        restore_world(&mut world, &save).unwrap();

        let commands: Vec<Vec<String>> = world
            .query::<&SlapperBehavior>()
            .iter(&world)
            .map(|b| b.commands.clone())
            .collect();
        assert_eq!(commands, vec![vec!["say a".to_string()]]);
        assert_eq!(world.resource::<NextNetworkId>().0, 13);
    }

    #[test]
    fn restore_replaces_existing_entities_but_not_players() {
        let mut world = world_with_registry();
        let player = spawn_player(
            &mut world,
            "Alex",
            Dimension::overworld(),
            GamePosition::default(),
            Rotation::default(),
            PermissionLevel::Member,
        );
        let old = create_slapper(
            &mut world,
            "minecraft:zombie",
            "Old",
            Dimension::overworld(),
            GamePosition::default(),
            Rotation::default(),
        );
        let empty = WorldSave {
            version: SAVE_VERSION,
            next_network_id: 1,
            entities: Vec::new(),
        };
        assert_eq!(restore_world(&mut world, &empty).unwrap(), 0);
        assert!(world.get::<SlapperBehavior>(old).is_none());
        assert!(world.get::<Player>(player).is_some());
    }

    #[test]
    fn newer_save_versions_are_rejected() {
        let mut world = world_with_registry();
        let save = WorldSave {
            version: SAVE_VERSION + 1,
            next_network_id: 1,
            entities: Vec::new(),
        };
        assert!(matches!(
            restore_world(&mut world, &save),
            Err(PersistenceError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn disk_round_trip_and_missing_file() {
        let dir = std::env::temp_dir().join(format!("slapper-save-test-{}", std::process::id()));
        let path = dir.join("world.json");
        let _ = std::fs::remove_dir_all(&dir);

        assert!(read_save(&path).unwrap().is_none());

        let save = WorldSave {
            version: SAVE_VERSION,
            next_network_id: 5,
            entities: Vec::new(),
        };
        write_save(&path, &save).unwrap();
        assert_eq!(read_save(&path).unwrap(), Some(save));

        std::fs::write(&path, "{ broken").unwrap();
        assert!(matches!(read_save(&path), Err(PersistenceError::Json(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
