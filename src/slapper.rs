//! Slapper workflows: `/slapper create`, `/slapper edit`, `/slapper remove`.
//!
//! The controller keeps no state between invocations. Every step looks its
//! entities up again, and entities captured before a form was shown are
//! re-checked when the form comes back.

use bevy::prelude::*;

use crate::behavior::{BehaviorRegistry, SlapperBehavior};
use crate::commands::{
    CommandArgument, CommandOptions, CommandOrigin, CommandRegistry, ParsedArgs,
};
use crate::components::*;
use crate::config::SlapperConfig;
use crate::error::CommandError;
use crate::events::ChatLog;
use crate::forms::{ActionForm, FormClosed, ModalForm, ModalResponse};
use crate::interaction::InteractionPlugin;
use crate::spawn::{spawn_entity, SpawnRequest};

pub const COMMAND_NAME: &str = "slapper";
const COMMAND_DESCRIPTION: &str = "Used to interact with the slapper plugin.";

const MSG_FORM_CLOSED: &str = "§cForm closed.§r";
const MSG_INVALID_TYPE: &str = "§cYou must provide a valid entity type.§r";
const MSG_INVALID_NAMETAG: &str = "§cYou must provide a valid nametag.§r";
const MSG_NO_SLAPPERS: &str = "§cThere are no slappers in this dimension.§r";
const MSG_GONE: &str = "§cThat slapper no longer exists.§r";
const MSG_CREATED: &str = "§aSlapper created!§r";
const MSG_UPDATED: &str = "§aSlapper updated!§r";
const MSG_REMOVED: &str = "§aSlapper removed!§r";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlapperAction {
    Create,
    Edit,
    Remove,
}

impl SlapperAction {
    pub const ENUM_NAME: &'static str = "SlapperEnum";
    pub const OPTIONS: [&'static str; 3] = ["create", "edit", "remove"];

    pub fn from_option(option: &str) -> Option<Self> {
        match option {
            "create" => Some(Self::Create),
            "edit" => Some(Self::Edit),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

pub struct SlapperPlugin;

impl Plugin for SlapperPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(InteractionPlugin)
            .init_resource::<SlapperConfig>()
            .init_resource::<BehaviorRegistry>()
            .init_resource::<CommandRegistry>();

        if let Err(err) = app
            .world_mut()
            .resource_mut::<BehaviorRegistry>()
            .register::<SlapperBehavior>()
        {
            warn!("[Slapper] {err}");
        }

        let registered = app.world_mut().resource_mut::<CommandRegistry>().register(
            COMMAND_NAME,
            COMMAND_DESCRIPTION,
            vec![CommandArgument::choice(
                "action",
                SlapperAction::ENUM_NAME,
                &SlapperAction::OPTIONS,
            )],
            CommandOptions {
                permission: PermissionLevel::Operator,
                special: true,
            },
            handle_slapper_command,
        );
        match registered {
            Ok(()) => info!("[Slapper] Registered /{COMMAND_NAME}"),
            Err(err) => warn!("[Slapper] {err}"),
        }
    }
}

fn handle_slapper_command(
    world: &mut World,
    origin: CommandOrigin,
    args: &ParsedArgs,
) -> Result<(), CommandError> {
    let player = origin.player().ok_or(CommandError::PlayerOnly)?;
    let action = args
        .get("action")
        .and_then(SlapperAction::from_option)
        .ok_or_else(|| CommandError::MissingArgument("action".to_string()))?;

    match action {
        SlapperAction::Create => open_create_form(world, player),
        SlapperAction::Edit => open_select_form(world, player, SlapperAction::Edit),
        SlapperAction::Remove => open_select_form(world, player, SlapperAction::Remove),
    }
    Ok(())
}

/// Chat to `player`, dropped once they have left.
fn notify(world: &mut World, player: Entity, text: &str) {
    if world.get::<Player>(player).is_none() {
        return;
    }
    if let Some(mut chat) = world.get_resource_mut::<ChatLog>() {
        chat.send(player, text);
    }
}

fn config(world: &World) -> SlapperConfig {
    world
        .get_resource::<SlapperConfig>()
        .cloned()
        .unwrap_or_default()
}

fn is_slapper(world: &World, entity: Entity) -> bool {
    world.get::<SlapperBehavior>(entity).is_some()
}

pub fn open_create_form(world: &mut World, player: Entity) {
    let cfg = config(world);
    ModalForm::new("Slapper | Create")
        .label(
            "This will create a slapper entity in the direction you are looking, and the \
             position you are standing. You will be able to edit the slapper later using the \
             §n/slapper edit§r command.\n",
        )
        .input("Entity Type:", cfg.default_entity_type)
        .input("Nametag:", cfg.default_nametag)
        .show(world, player, move |world, response| match response {
            Ok(values) => submit_create(world, player, &values),
            Err(FormClosed) => notify(world, player, MSG_FORM_CLOSED),
        });
}

fn submit_create(world: &mut World, player: Entity, values: &ModalResponse) {
    let kind = values.text(1).unwrap_or_default().to_string();
    let nametag = values.text(2).unwrap_or_default().to_string();

    if kind.is_empty() {
        return notify(world, player, MSG_INVALID_TYPE);
    }
    if nametag.is_empty() {
        return notify(world, player, MSG_INVALID_NAMETAG);
    }

    let (Some(dimension), Some(position), Some(rotation)) = (
        world.get::<Dimension>(player).cloned(),
        world.get::<GamePosition>(player).copied(),
        world.get::<Rotation>(player).copied(),
    ) else {
        warn!("[Slapper] Player {player:?} left before the create form resolved");
        return;
    };

    let mut position = position;
    position.y -= config(world).spawn_y_offset;

    create_slapper(world, &kind, &nametag, dimension, position, rotation);
    notify(world, player, MSG_CREATED);
}

/// Spawns an entity carrying a fresh behavior with the default commands.
pub fn create_slapper(
    world: &mut World,
    kind: &str,
    nametag: &str,
    dimension: Dimension,
    position: GamePosition,
    rotation: Rotation,
) -> Entity {
    let mut req = SpawnRequest::new(kind, dimension, position);
    req.rotation = rotation;
    req.nametag = Some(nametag.to_string());
    let entity = spawn_entity(world, req);
    world
        .entity_mut(entity)
        .insert(SlapperBehavior::new(entity));
    info!(
        "[Slapper] Created '{nametag}' ({kind}) at {:.1}, {:.1}, {:.1}",
        position.x, position.y, position.z
    );
    entity
}

/// Entities in `dimension` carrying a slapper behavior, in spawn order.
pub fn get_slappers(world: &mut World, dimension: &Dimension) -> Vec<Entity> {
    let mut query =
        world.query_filtered::<(Entity, &NetworkId, &Dimension), With<SlapperBehavior>>();
    let mut found: Vec<(NetworkId, Entity)> = query
        .iter(world)
        .filter(|(_, _, dim)| *dim == dimension)
        .map(|(entity, id, _)| (*id, entity))
        .collect();
    found.sort_by_key(|(id, _)| *id);
    found.into_iter().map(|(_, entity)| entity).collect()
}

fn slapper_label(world: &World, entity: Entity) -> String {
    let nametag = world
        .get::<SlapperBehavior>(entity)
        .and_then(|b| b.nametag(world))
        .unwrap_or_default();
    let (x, y, z) = world
        .get::<GamePosition>(entity)
        .map(GamePosition::floor)
        .unwrap_or_default();
    format!("{nametag}\nPosition: §n{x}, {y}, {z}§r")
}

/// Step one of edit and remove: pick a slapper in the player's dimension.
pub fn open_select_form(world: &mut World, player: Entity, action: SlapperAction) {
    let Some(dimension) = world.get::<Dimension>(player).cloned() else {
        return;
    };
    let slappers = get_slappers(world, &dimension);
    if slappers.is_empty() {
        return notify(world, player, MSG_NO_SLAPPERS);
    }

    let (title, content) = match action {
        SlapperAction::Remove => (
            "Slapper | Remove",
            "Select a slapper you would like to remove.",
        ),
        _ => ("Slapper | Edit", "Select a slapper you would like to edit."),
    };
    let mut form = ActionForm::new(title, content);
    for &slapper in &slappers {
        form = form.button(slapper_label(world, slapper));
    }

    form.show(world, player, move |world, response| {
        let target = match response {
            Ok(index) => slappers[index],
            Err(FormClosed) => return notify(world, player, MSG_FORM_CLOSED),
        };
        match action {
            SlapperAction::Remove => remove_slapper(world, player, target),
            _ => open_edit_form(world, player, target),
        }
    });
}

/// Step two of edit: change nametag, commands and size of `target`.
pub fn open_edit_form(world: &mut World, player: Entity, target: Entity) {
    let Some(behavior) = world.get::<SlapperBehavior>(target) else {
        return notify(world, player, MSG_GONE);
    };
    let cfg = config(world);
    let nametag = behavior.nametag(world).unwrap_or_default().to_string();
    let commands = behavior.joined_commands(cfg.command_delimiter);

    ModalForm::new("Slapper | Edit")
        .label(
            "Edit the slapper below. You can add multiple commands by separating them with a \
             semicolon.\n",
        )
        .input("Nametag:", nametag)
        .input("Commands:", commands)
        .slider("Size", cfg.size_min, cfg.size_max, cfg.default_size)
        .show(world, player, move |world, response| match response {
            Ok(values) => submit_edit(world, player, target, &values),
            Err(FormClosed) => notify(world, player, MSG_FORM_CLOSED),
        });
}

/// The validated result of an edit form.
#[derive(Clone, Debug, PartialEq)]
pub struct SlapperEdit {
    pub nametag: String,
    pub commands: String,
    pub size: f32,
}

fn submit_edit(world: &mut World, player: Entity, target: Entity, values: &ModalResponse) {
    let Some(behavior) = world.get::<SlapperBehavior>(target) else {
        return notify(world, player, MSG_GONE);
    };
    let cfg = config(world);

    // Missing fields keep their current value.
    let nametag = match values.text(1) {
        Some(text) => text.to_string(),
        None => behavior.nametag(world).unwrap_or_default().to_string(),
    };
    let commands = match values.text(2) {
        Some(text) => text.to_string(),
        None => behavior.joined_commands(cfg.command_delimiter),
    };
    let size = values.number(3).unwrap_or(cfg.default_size);

    if nametag.is_empty() {
        return notify(world, player, MSG_INVALID_NAMETAG);
    }

    apply_edit(
        world,
        target,
        &SlapperEdit {
            nametag,
            commands,
            size,
        },
    );
    notify(world, player, MSG_UPDATED);
}

/// Applies an already-validated edit. Returns false when `target` is no
/// longer a slapper.
pub fn apply_edit(world: &mut World, target: Entity, edit: &SlapperEdit) -> bool {
    if !is_slapper(world, target) {
        return false;
    }
    let cfg = config(world);
    let scale = cfg.clamp_size(edit.size);

    let mut entity = world.entity_mut(target);
    entity.insert((NameTag(edit.nametag.clone()), Scale(scale)));
    if let Some(mut behavior) = entity.get_mut::<SlapperBehavior>() {
        behavior.replace_commands(&edit.commands, cfg.command_delimiter);
    }
    info!("[Slapper] Updated '{}' ({target:?})", edit.nametag);
    true
}

fn remove_slapper(world: &mut World, player: Entity, target: Entity) {
    if !is_slapper(world, target) {
        return notify(world, player, MSG_GONE);
    }
    world.despawn(target);
    info!("[Slapper] Removed {target:?}");
    notify(world, player, MSG_REMOVED);
}
