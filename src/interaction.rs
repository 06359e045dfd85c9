use bevy::prelude::*;

use crate::behavior::SlapperBehavior;
use crate::commands::CommandQueue;
use crate::components::Player;
use crate::events::InteractEvent;

pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CommandQueue>()
            .add_event::<InteractEvent>()
            .add_systems(PreUpdate, slapper_interaction_system);
    }
}

/// Queues a slapper's commands for each player that used it this tick.
pub fn slapper_interaction_system(
    mut interactions: EventReader<InteractEvent>,
    players: Query<(), With<Player>>,
    slappers: Query<&SlapperBehavior>,
    mut queue: ResMut<CommandQueue>,
) {
    for ev in interactions.read() {
        if players.get(ev.player).is_err() {
            continue;
        }
        let Ok(behavior) = slappers.get(ev.target) else {
            continue;
        };
        debug!(
            "[Slapper] {:?} used slapper {:?}, queueing {} commands",
            ev.player,
            behavior.entity(),
            behavior.commands.len()
        );
        behavior.on_interact(ev.player, &mut queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use crate::commands::run_queued_commands;
    use crate::components::*;
    use crate::events::ChatLog;
    use crate::host::HostPlugin;
    use crate::slapper::{create_slapper, SlapperPlugin};
    use crate::spawn::spawn_player;

    #[test]
    fn interacting_runs_commands_in_list_order_as_the_player() {
        let mut app = App::new();
        app.add_plugins((HostPlugin, SlapperPlugin));

        let world = app.world_mut();
        let player = spawn_player(
            world,
            "Alex",
            Dimension::overworld(),
            GamePosition::default(),
            Rotation::default(),
            PermissionLevel::Member,
        );
        let slapper = create_slapper(
            world,
            "minecraft:villager",
            "Greeter",
            Dimension::overworld(),
            GamePosition::default(),
            Rotation::default(),
        );
        world.get_mut::<SlapperBehavior>(slapper).unwrap().commands = vec![
            "say one".to_string(),
            "missing".to_string(),
            "say two".to_string(),
        ];

        world.send_event(InteractEvent {
            player,
            target: slapper,
        });
        app.update();

        let chat: Vec<String> = app
            .world()
            .resource::<ChatLog>()
            .messages_for(player)
            .map(str::to_string)
            .collect();
        assert_eq!(
            chat,
            vec![
                "one".to_string(),
                "§cUnknown command: missing§r".to_string(),
                "two".to_string(),
            ]
        );
    }

    #[test]
    fn default_slapper_gives_a_diamond() {
        let mut app = App::new();
        app.add_plugins((HostPlugin, SlapperPlugin));

        let world = app.world_mut();
        let player = spawn_player(
            world,
            "Alex",
            Dimension::overworld(),
            GamePosition::default(),
            Rotation::default(),
            PermissionLevel::Member,
        );
        let slapper = create_slapper(
            world,
            "minecraft:zombie",
            "Slapper",
            Dimension::overworld(),
            GamePosition::default(),
            Rotation::default(),
        );
        world.send_event(InteractEvent {
            player,
            target: slapper,
        });
        app.update();

        let world = app.world();
        let chat: Vec<&str> = world.resource::<ChatLog>().messages_for(player).collect();
        assert_eq!(chat, vec!["Gave 1 minecraft:diamond to Alex"]);
        let slots = &world.get::<Inventory>(player).unwrap().slots;
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].item_id, "minecraft:diamond");
        assert_eq!(slots[0].count, 1);
    }

    #[test]
    fn non_players_and_plain_entities_are_ignored() {
        let mut world = World::new();
        world.init_resource::<CommandQueue>();
        world.init_resource::<Events<InteractEvent>>();
        let plain = world.spawn_empty().id();
        let slapper = world.spawn_empty().id();
        world
            .entity_mut(slapper)
            .insert(SlapperBehavior::new(slapper));
        let player = world
            .spawn(Player {
                username: "Alex".to_string(),
            })
            .id();

        world.send_event(InteractEvent {
            player: plain,
            target: slapper,
        });
        world.send_event(InteractEvent {
            player,
            target: plain,
        });
        world.run_system_once(slapper_interaction_system).unwrap();
        assert!(world.resource::<CommandQueue>().is_empty());

        world.send_event(InteractEvent {
            player,
            target: slapper,
        });
        world.run_system_once(slapper_interaction_system).unwrap();
        assert_eq!(world.resource::<CommandQueue>().len(), 1);

        run_queued_commands(&mut world);
        assert!(world.resource::<CommandQueue>().is_empty());
    }
}
