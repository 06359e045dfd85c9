use bevy::prelude::*;

use crate::commands::{CommandOrigin, CommandQueue};
use crate::components::NameTag;
use crate::error::RegistryError;
use crate::nbt::{CompoundTag, ListTag, Tag};

pub const SLAPPER_IDENTIFIER: &str = "slapper:behavior";
pub const COMMANDS_KEY: &str = "commands";
pub const DEFAULT_COMMAND: &str = "give @s diamond";

/// A component that can be written to and rebuilt from a tagged tree.
pub trait PersistentBehavior: Component + Sized {
    const IDENTIFIER: &'static str;

    fn serialize(tree: &mut CompoundTag, behavior: &Self);
    fn deserialize(tree: &CompoundTag, entity: Entity) -> Self;
}

type SaveFn = fn(&World, Entity) -> Option<CompoundTag>;
type LoadFn = fn(&mut World, Entity, &CompoundTag);

struct BehaviorEntry {
    identifier: &'static str,
    save: SaveFn,
    load: LoadFn,
}

/// Behaviors that survive a world save. Populated once while plugins build.
#[derive(Resource, Default)]
pub struct BehaviorRegistry {
    entries: Vec<BehaviorEntry>,
}

impl BehaviorRegistry {
    pub fn register<B: PersistentBehavior>(&mut self) -> Result<(), RegistryError> {
        if self.is_registered(B::IDENTIFIER) {
            return Err(RegistryError::AlreadyRegistered(B::IDENTIFIER));
        }
        self.entries.push(BehaviorEntry {
            identifier: B::IDENTIFIER,
            save: save_behavior::<B>,
            load: load_behavior::<B>,
        });
        Ok(())
    }

    pub fn is_registered(&self, identifier: &str) -> bool {
        self.entries.iter().any(|e| e.identifier == identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.identifier)
    }

    /// Serializes every registered behavior present on `entity`.
    pub fn save_all(&self, world: &World, entity: Entity) -> Vec<(&'static str, CompoundTag)> {
        self.entries
            .iter()
            .filter_map(|e| (e.save)(world, entity).map(|tree| (e.identifier, tree)))
            .collect()
    }

    pub fn loader(&self, identifier: &str) -> Option<LoadFn> {
        self.entries
            .iter()
            .find(|e| e.identifier == identifier)
            .map(|e| e.load)
    }
}

fn save_behavior<B: PersistentBehavior>(world: &World, entity: Entity) -> Option<CompoundTag> {
    let behavior = world.get::<B>(entity)?;
    let mut tree = CompoundTag::default();
    B::serialize(&mut tree, behavior);
    Some(tree)
}

fn load_behavior<B: PersistentBehavior>(world: &mut World, entity: Entity, tree: &CompoundTag) {
    let behavior = B::deserialize(tree, entity);
    world.entity_mut(entity).insert(behavior);
}

/// Commands a slapper runs, in order, against whoever interacts with it.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct SlapperBehavior {
    entity: Entity,
    pub commands: Vec<String>,
}

impl SlapperBehavior {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            commands: vec![DEFAULT_COMMAND.to_string()],
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn nametag<'w>(&self, world: &'w World) -> Option<&'w str> {
        world.get::<NameTag>(self.entity).map(|n| n.0.as_str())
    }

    pub fn joined_commands(&self, delimiter: char) -> String {
        self.commands.join(delimiter.to_string().as_str())
    }

    /// Literal split; empty segments are kept.
    pub fn replace_commands(&mut self, raw: &str, delimiter: char) {
        self.commands = raw.split(delimiter).map(str::to_string).collect();
    }

    pub fn on_interact(&self, player: Entity, queue: &mut CommandQueue) {
        for command in &self.commands {
            queue.push(CommandOrigin::Player(player), command.clone());
        }
    }
}

impl PersistentBehavior for SlapperBehavior {
    const IDENTIFIER: &'static str = SLAPPER_IDENTIFIER;

    fn serialize(tree: &mut CompoundTag, behavior: &Self) {
        tree.insert(
            COMMANDS_KEY,
            Tag::List(ListTag::from_strings(behavior.commands.iter().cloned())),
        );
    }

    fn deserialize(tree: &CompoundTag, entity: Entity) -> Self {
        let mut behavior = Self::new(entity);
        if let Some(list) = tree.get_list(COMMANDS_KEY) {
            behavior.commands = list.strings().map(str::to_string).collect();
        }
        behavior
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_behavior_has_default_command() {
        let behavior = SlapperBehavior::new(Entity::from_raw(3));
        assert_eq!(behavior.commands, vec!["give @s diamond".to_string()]);
        assert_eq!(behavior.entity(), Entity::from_raw(3));
    }

    #[test]
    fn round_trip_preserves_order_without_duplicating_default() {
        let entity = Entity::from_raw(1);
        let mut behavior = SlapperBehavior::new(entity);
        behavior.commands = vec![
            "say first".to_string(),
            "give @s diamond".to_string(),
            "say last".to_string(),
        ];
        let mut tree = CompoundTag::default();
        SlapperBehavior::serialize(&mut tree, &behavior);

        let loaded = SlapperBehavior::deserialize(&tree, Entity::from_raw(9));
        assert_eq!(loaded.commands, behavior.commands);
        assert_eq!(loaded.entity(), Entity::from_raw(9));

        let mut again = CompoundTag::default();
        SlapperBehavior::serialize(&mut again, &loaded);
        assert_eq!(SlapperBehavior::deserialize(&again, entity).commands.len(), 3);
    }

    #[test]
    fn missing_commands_field_keeps_default() {
        let loaded = SlapperBehavior::deserialize(&CompoundTag::default(), Entity::from_raw(1));
        assert_eq!(loaded.commands, vec![DEFAULT_COMMAND.to_string()]);
    }

    #[test]
    fn non_string_lists_load_as_empty() {
        let tree: CompoundTag = serde_json::from_value(serde_json::json!({
            "commands": {
                "type": "list",
                "value": {
                    "kind": "compound",
                    "items": [{ "type": "compound", "value": {} }]
                }
            }
        }))
        .unwrap();

        let loaded = SlapperBehavior::deserialize(&tree, Entity::from_raw(1));
        assert!(loaded.commands.is_empty());
    }

    #[test]
    fn split_is_literal() {
        let mut behavior = SlapperBehavior::new(Entity::from_raw(1));
        behavior.replace_commands("say a; say b;;", ';');
        assert_eq!(behavior.commands, vec!["say a", " say b", "", ""]);
        assert_eq!(behavior.joined_commands(';'), "say a; say b;;");

        behavior.replace_commands("", ';');
        assert_eq!(behavior.commands, vec![""]);
    }

    #[test]
    fn interaction_queues_commands_in_order() {
        let player = Entity::from_raw(5);
        let mut behavior = SlapperBehavior::new(Entity::from_raw(1));
        behavior.commands = vec!["say one".to_string(), "say two".to_string()];

        let mut queue = CommandQueue::default();
        behavior.on_interact(player, &mut queue);

        let queued: Vec<(CommandOrigin, String)> = queue
            .drain()
            .map(|q| (q.origin, q.line))
            .collect();
        assert_eq!(
            queued,
            vec![
                (CommandOrigin::Player(player), "say one".to_string()),
                (CommandOrigin::Player(player), "say two".to_string()),
            ]
        );
    }

    #[test]
    fn registry_rejects_second_registration() {
        let mut registry = BehaviorRegistry::default();
        assert!(registry.register::<SlapperBehavior>().is_ok());
        assert_eq!(
            registry.register::<SlapperBehavior>(),
            Err(RegistryError::AlreadyRegistered(SLAPPER_IDENTIFIER))
        );
        assert!(registry.loader(SLAPPER_IDENTIFIER).is_some());
        assert!(registry.loader("other:thing").is_none());
    }

    #[test]
    fn registry_saves_and_loads_through_world() {
        let mut registry = BehaviorRegistry::default();
        registry.register::<SlapperBehavior>().unwrap();

        let mut world = World::new();
        let source = world.spawn(NameTag("Guide".into())).id();
        let mut behavior = SlapperBehavior::new(source);
        behavior.commands = vec!["say welcome".to_string()];
        world.entity_mut(source).insert(behavior);
        let plain = world.spawn_empty().id();

        assert!(registry.save_all(&world, plain).is_empty());
        let saved = registry.save_all(&world, source);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, SLAPPER_IDENTIFIER);

        let target = world.spawn_empty().id();
        let load = registry.loader(SLAPPER_IDENTIFIER).unwrap();
        load(&mut world, target, &saved[0].1);

        let loaded = world.get::<SlapperBehavior>(target).unwrap();
        assert_eq!(loaded.entity(), target);
        assert_eq!(loaded.commands, vec!["say welcome".to_string()]);
        assert_eq!(
            world.get::<SlapperBehavior>(source).unwrap().nametag(&world),
            Some("Guide")
        );
    }
}
