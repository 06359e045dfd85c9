use std::str::FromStr;

use bevy::prelude::*;

use crate::behavior::BehaviorRegistry;
use crate::commands::{
    execute, report_command_error, run_queued_commands, CommandArgument, CommandOptions,
    CommandOrigin, CommandQueue, CommandRegistry, ParsedArgs,
};
use crate::components::*;
use crate::error::CommandError;
use crate::events::{ChatLog, GameEventsPlugin, InteractEvent};
use crate::forms::{
    cancel_orphaned_forms, resolve_form_replies, FormId, FormReplyEvent, FormTransport,
};
use crate::persistence::SaveRequest;
use crate::spawn::spawn_player;

/// Where players joining from the console appear.
const SPAWN_POSITION: GamePosition = GamePosition {
    x: 0.0,
    y: 64.0,
    z: 0.0,
};

/// The collaborators slapper workflows run against: command dispatch, forms,
/// chat and entity ids. Add before any gameplay plugin.
pub struct HostPlugin;

impl Plugin for HostPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(GameEventsPlugin)
            .init_resource::<NextNetworkId>()
            .init_resource::<CommandRegistry>()
            .init_resource::<CommandQueue>()
            .init_resource::<FormTransport>()
            .init_resource::<BehaviorRegistry>()
            .init_resource::<SaveRequest>()
            .add_event::<FormReplyEvent>()
            .add_systems(
                Update,
                (resolve_form_replies, cancel_orphaned_forms, run_queued_commands).chain(),
            );

        let mut registry = app.world_mut().resource_mut::<CommandRegistry>();
        let operator = CommandOptions {
            permission: PermissionLevel::Operator,
            special: false,
        };
        // Console-only: stand-ins for a client connection.
        let console = CommandOptions {
            permission: PermissionLevel::Internal,
            special: false,
        };
        let builtins = [
            registry.register(
                "say",
                "Sends a message to yourself.",
                vec![CommandArgument::message("message")],
                CommandOptions::default(),
                say_command,
            ),
            registry.register(
                "help",
                "Lists available commands.",
                Vec::new(),
                CommandOptions::default(),
                help_command,
            ),
            registry.register(
                "give",
                "Gives an item to a player.",
                vec![
                    CommandArgument::word("target"),
                    CommandArgument::word("item"),
                    CommandArgument::word("amount").optional(),
                ],
                CommandOptions::default(),
                give_command,
            ),
            registry.register(
                "save",
                "Saves the world at the end of this tick.",
                Vec::new(),
                operator,
                save_command,
            ),
            registry.register(
                "stop",
                "Saves the world and shuts the server down.",
                Vec::new(),
                operator,
                stop_command,
            ),
            registry.register(
                "join",
                "Connects a player.",
                vec![
                    CommandArgument::word("player"),
                    CommandArgument::choice("role", "RoleEnum", &["member", "operator"])
                        .optional(),
                ],
                console,
                join_command,
            ),
            registry.register(
                "leave",
                "Disconnects a player.",
                vec![CommandArgument::word("player")],
                console,
                leave_command,
            ),
            registry.register(
                "tp",
                "Moves a player.",
                vec![
                    CommandArgument::word("player"),
                    CommandArgument::word("x"),
                    CommandArgument::word("y"),
                    CommandArgument::word("z"),
                    CommandArgument::word("dimension").optional(),
                ],
                console,
                tp_command,
            ),
            registry.register(
                "as",
                "Runs a command as a player.",
                vec![
                    CommandArgument::word("player"),
                    CommandArgument::message("command"),
                ],
                console,
                as_command,
            ),
            registry.register(
                "interact",
                "Makes a player use an entity.",
                vec![
                    CommandArgument::word("player"),
                    CommandArgument::word("network_id"),
                ],
                console,
                interact_command,
            ),
            registry.register(
                "reply",
                "Answers a player's form with raw JSON (null closes it).",
                vec![
                    CommandArgument::word("player"),
                    CommandArgument::word("form_id"),
                    CommandArgument::message("response"),
                ],
                console,
                reply_command,
            ),
        ];
        for err in builtins.into_iter().filter_map(Result::err) {
            warn!("[Slapper host] {err}");
        }
    }
}

fn reply(world: &mut World, origin: CommandOrigin, text: &str) {
    match origin {
        CommandOrigin::Player(player) => world.resource_mut::<ChatLog>().send(player, text),
        CommandOrigin::Console => info!("[Slapper console] {text}"),
    }
}

/// Online player with `name`, compared case-insensitively.
pub fn find_player(world: &mut World, name: &str) -> Option<Entity> {
    world
        .query::<(Entity, &Player)>()
        .iter(world)
        .find(|(_, player)| player.username.eq_ignore_ascii_case(name))
        .map(|(entity, _)| entity)
}

fn player_named(world: &mut World, name: &str) -> Result<Entity, CommandError> {
    find_player(world, name).ok_or_else(|| CommandError::PlayerNotFound(name.to_string()))
}

/// `@s` is the origin itself; anything else is a player name.
fn resolve_target(
    world: &mut World,
    origin: CommandOrigin,
    target: &str,
) -> Result<Entity, CommandError> {
    if target == "@s" {
        return origin.player().ok_or(CommandError::PlayerOnly);
    }
    player_named(world, target)
}

fn username(world: &World, player: Entity) -> String {
    world
        .get::<Player>(player)
        .map(|p| p.username.clone())
        .unwrap_or_default()
}

fn parse_number<T: FromStr>(raw: &str) -> Result<T, CommandError> {
    raw.parse().map_err(|_| CommandError::InvalidNumber(raw.to_string()))
}

fn say_command(
    world: &mut World,
    origin: CommandOrigin,
    args: &ParsedArgs,
) -> Result<(), CommandError> {
    let message = args.required("message")?.to_string();
    reply(world, origin, &message);
    Ok(())
}

fn help_command(
    world: &mut World,
    origin: CommandOrigin,
    _: &ParsedArgs,
) -> Result<(), CommandError> {
    let permission = origin.permission(world);
    let lines = world.resource::<CommandRegistry>().help_lines(permission);
    for (usage, description) in lines {
        reply(world, origin, &format!("{usage} - {description}"));
    }
    Ok(())
}

fn give_command(
    world: &mut World,
    origin: CommandOrigin,
    args: &ParsedArgs,
) -> Result<(), CommandError> {
    let target = resolve_target(world, origin, args.required("target")?)?;
    let item = args.required("item")?;
    let item = if item.contains(':') {
        item.to_string()
    } else {
        format!("minecraft:{item}")
    };
    let amount = match args.get("amount") {
        Some(raw) => parse_number::<u32>(raw)?,
        None => 1,
    };
    if amount == 0 {
        return Err(CommandError::InvalidNumber("0".to_string()));
    }

    let name = username(world, target);
    world
        .get_mut::<Inventory>(target)
        .ok_or_else(|| CommandError::PlayerNotFound(name.clone()))?
        .add(&item, amount);
    reply(world, origin, &format!("Gave {amount} {item} to {name}"));
    Ok(())
}

fn save_command(
    world: &mut World,
    origin: CommandOrigin,
    _: &ParsedArgs,
) -> Result<(), CommandError> {
    world.resource_mut::<SaveRequest>().0 = true;
    reply(world, origin, "Saving the world...");
    Ok(())
}

fn stop_command(
    world: &mut World,
    origin: CommandOrigin,
    _: &ParsedArgs,
) -> Result<(), CommandError> {
    reply(world, origin, "Stopping the server...");
    world.resource_mut::<SaveRequest>().0 = true;
    world.send_event(AppExit::Success);
    Ok(())
}

fn join_command(
    world: &mut World,
    origin: CommandOrigin,
    args: &ParsedArgs,
) -> Result<(), CommandError> {
    let name = args.required("player")?;
    if find_player(world, name).is_some() {
        return Err(CommandError::PlayerAlreadyOnline(name.to_string()));
    }
    let permission = match args.get("role") {
        Some("operator") => PermissionLevel::Operator,
        _ => PermissionLevel::Member,
    };
    let player = spawn_player(
        world,
        name,
        Dimension::overworld(),
        SPAWN_POSITION,
        Rotation::default(),
        permission,
    );
    let id = world.get::<NetworkId>(player).map(|id| id.0).unwrap_or_default();
    reply(
        world,
        origin,
        &format!("{name} joined as {permission:?} (network id {id})"),
    );
    Ok(())
}

fn leave_command(
    world: &mut World,
    origin: CommandOrigin,
    args: &ParsedArgs,
) -> Result<(), CommandError> {
    let name = args.required("player")?;
    let player = player_named(world, name)?;
    world.despawn(player);
    reply(world, origin, &format!("{name} left"));
    Ok(())
}

fn tp_command(
    world: &mut World,
    origin: CommandOrigin,
    args: &ParsedArgs,
) -> Result<(), CommandError> {
    let player = player_named(world, args.required("player")?)?;
    let position = GamePosition::new(
        parse_number(args.required("x")?)?,
        parse_number(args.required("y")?)?,
        parse_number(args.required("z")?)?,
    );
    let name = username(world, player);
    let mut entity = world.entity_mut(player);
    entity.insert(position);
    if let Some(dimension) = args.get("dimension") {
        entity.insert(Dimension(dimension.to_string()));
    }
    reply(
        world,
        origin,
        &format!(
            "Moved {name} to {:.1}, {:.1}, {:.1}",
            position.x, position.y, position.z
        ),
    );
    Ok(())
}

fn as_command(
    world: &mut World,
    _: CommandOrigin,
    args: &ParsedArgs,
) -> Result<(), CommandError> {
    let player = player_named(world, args.required("player")?)?;
    let line = args.required("command")?;
    let origin = CommandOrigin::Player(player);
    if let Err(err) = execute(world, origin, line) {
        report_command_error(world, origin, line, &err);
    }
    Ok(())
}

fn interact_command(
    world: &mut World,
    _: CommandOrigin,
    args: &ParsedArgs,
) -> Result<(), CommandError> {
    let player = player_named(world, args.required("player")?)?;
    let network_id: u64 = parse_number(args.required("network_id")?)?;
    let target = world
        .query::<(Entity, &NetworkId)>()
        .iter(world)
        .find(|(_, id)| id.0 == network_id)
        .map(|(entity, _)| entity)
        .ok_or(CommandError::EntityNotFound(network_id))?;
    world.send_event(InteractEvent { player, target });
    Ok(())
}

fn reply_command(
    world: &mut World,
    _: CommandOrigin,
    args: &ParsedArgs,
) -> Result<(), CommandError> {
    let name = args.required("player")?;
    let player = player_named(world, name)?;
    let id: FormId = parse_number(args.required("form_id")?)?;
    if !world.resource::<FormTransport>().is_pending(player, id) {
        return Err(CommandError::NoPendingForm {
            player: name.to_string(),
            id,
        });
    }
    let response = args.required("response")?;
    let data = (response != "null").then(|| response.to_string());
    world.send_event(FormReplyEvent { player, id, data });
    Ok(())
}
