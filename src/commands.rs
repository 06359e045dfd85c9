use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bevy::prelude::*;

use crate::components::PermissionLevel;
use crate::error::CommandError;
use crate::events::ChatLog;

/// Who runs a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOrigin {
    Player(Entity),
    Console,
}

impl CommandOrigin {
    pub fn player(&self) -> Option<Entity> {
        match self {
            CommandOrigin::Player(entity) => Some(*entity),
            CommandOrigin::Console => None,
        }
    }

    pub fn permission(&self, world: &World) -> PermissionLevel {
        match self {
            CommandOrigin::Player(entity) => world
                .get::<PermissionLevel>(*entity)
                .copied()
                .unwrap_or_default(),
            CommandOrigin::Console => PermissionLevel::Internal,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ArgumentKind {
    /// One of a fixed set of words.
    Enum {
        name: String,
        options: Vec<String>,
    },
    /// A single whitespace-delimited token.
    Word,
    /// Everything left on the line.
    Message,
}

#[derive(Clone, Debug)]
pub struct CommandArgument {
    pub name: String,
    pub kind: ArgumentKind,
    pub optional: bool,
}

impl CommandArgument {
    pub fn choice(name: &str, enum_name: &str, options: &[&str]) -> Self {
        Self::new(
            name,
            ArgumentKind::Enum {
                name: enum_name.to_string(),
                options: options.iter().map(|o| o.to_string()).collect(),
            },
        )
    }

    pub fn word(name: &str) -> Self {
        Self::new(name, ArgumentKind::Word)
    }

    pub fn message(name: &str) -> Self {
        Self::new(name, ArgumentKind::Message)
    }

    fn new(name: &str, kind: ArgumentKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            optional: false,
        }
    }

    /// May be left off the end of the line.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn usage(&self) -> String {
        let inner = match &self.kind {
            ArgumentKind::Enum { options, .. } => options.join("|"),
            ArgumentKind::Word | ArgumentKind::Message => self.name.clone(),
        };
        if self.optional {
            format!("[{inner}]")
        } else {
            format!("<{inner}>")
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CommandOptions {
    pub permission: PermissionLevel,
    /// Accept an unambiguous prefix of an enum option.
    pub special: bool,
}

/// Arguments bound by name, already validated against the command's signature.
#[derive(Clone, Debug, Default)]
pub struct ParsedArgs {
    values: HashMap<String, String>,
}

impl ParsedArgs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// A bound argument that must exist, for handlers that declared it required.
    pub fn required(&self, name: &str) -> Result<&str, CommandError> {
        self.get(name).ok_or_else(|| CommandError::MissingArgument(name.to_string()))
    }
}

pub type CommandHandler = Arc<
    dyn Fn(&mut World, CommandOrigin, &ParsedArgs) -> Result<(), CommandError> + Send + Sync,
>;

#[derive(Clone)]
struct RegisteredCommand {
    description: String,
    arguments: Vec<CommandArgument>,
    options: CommandOptions,
    handler: CommandHandler,
}

#[derive(Resource, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn register<F>(
        &mut self,
        name: &str,
        description: &str,
        arguments: Vec<CommandArgument>,
        options: CommandOptions,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn(&mut World, CommandOrigin, &ParsedArgs) -> Result<(), CommandError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.to_ascii_lowercase();
        if self.commands.contains_key(&name) {
            return Err(CommandError::AlreadyRegistered(name));
        }
        self.commands.insert(
            name,
            RegisteredCommand {
                description: description.to_string(),
                arguments,
                options,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// `(usage, description)` pairs sorted by command name, limited to what
    /// `permission` may run.
    pub fn help_lines(&self, permission: PermissionLevel) -> Vec<(String, String)> {
        let mut lines: Vec<(String, String)> = self
            .commands
            .iter()
            .filter(|(_, cmd)| cmd.options.permission <= permission)
            .map(|(name, cmd)| {
                let mut usage = format!("/{name}");
                for arg in &cmd.arguments {
                    usage.push(' ');
                    usage.push_str(&arg.usage());
                }
                (usage, cmd.description.clone())
            })
            .collect();
        lines.sort();
        lines
    }
}

/// Parses `line`, checks permission, binds arguments and runs the handler.
pub fn execute(world: &mut World, origin: CommandOrigin, line: &str) -> Result<(), CommandError> {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (line, ""),
    };
    let name = name.to_ascii_lowercase();

    let command = world
        .get_resource::<CommandRegistry>()
        .and_then(|registry| registry.commands.get(&name).cloned())
        .ok_or_else(|| CommandError::UnknownCommand(name.clone()))?;

    if origin.permission(world) < command.options.permission {
        return Err(CommandError::PermissionDenied);
    }

    let args = bind_arguments(&command.arguments, command.options.special, rest)?;
    (command.handler)(world, origin, &args)
}

fn bind_arguments(
    arguments: &[CommandArgument],
    special: bool,
    mut rest: &str,
) -> Result<ParsedArgs, CommandError> {
    let mut parsed = ParsedArgs::default();
    for arg in arguments {
        if rest.is_empty() {
            if arg.optional {
                continue;
            }
            return Err(CommandError::MissingArgument(arg.name.clone()));
        }
        match &arg.kind {
            ArgumentKind::Message => {
                parsed.values.insert(arg.name.clone(), rest.to_string());
                rest = "";
            }
            ArgumentKind::Word => {
                let (token, remainder) = next_token(rest);
                parsed.values.insert(arg.name.clone(), token.to_string());
                rest = remainder;
            }
            ArgumentKind::Enum { name, options } => {
                let (token, remainder) = next_token(rest);
                let value = resolve_enum(&arg.name, name, options, token, special)?;
                parsed.values.insert(arg.name.clone(), value);
                rest = remainder;
            }
        }
    }
    if !rest.is_empty() {
        return Err(CommandError::TrailingArguments(rest.to_string()));
    }
    Ok(parsed)
}

fn next_token(rest: &str) -> (&str, &str) {
    match rest.split_once(char::is_whitespace) {
        Some((token, remainder)) => (token, remainder.trim_start()),
        None => (rest, ""),
    }
}

fn resolve_enum(
    argument: &str,
    enum_name: &str,
    options: &[String],
    token: &str,
    special: bool,
) -> Result<String, CommandError> {
    if let Some(exact) = options.iter().find(|o| o.eq_ignore_ascii_case(token)) {
        return Ok(exact.clone());
    }
    if special {
        let lowered = token.to_ascii_lowercase();
        let candidates: Vec<&String> = options
            .iter()
            .filter(|o| o.to_ascii_lowercase().starts_with(&lowered))
            .collect();
        match candidates.as_slice() {
            [only] => return Ok((*only).clone()),
            [] => {}
            many => {
                return Err(CommandError::AmbiguousEnumValue {
                    argument: argument.to_string(),
                    value: token.to_string(),
                    candidates: many
                        .iter()
                        .map(|c| c.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        }
    }
    Err(CommandError::InvalidEnumValue {
        argument: argument.to_string(),
        enum_name: enum_name.to_string(),
        value: token.to_string(),
        expected: options.join(", "),
    })
}

#[derive(Clone, Debug)]
pub struct QueuedCommand {
    pub origin: CommandOrigin,
    pub line: String,
}

/// Commands waiting for the main loop, run first in first out.
#[derive(Resource, Default)]
pub struct CommandQueue {
    pending: VecDeque<QueuedCommand>,
}

impl CommandQueue {
    pub fn push(&mut self, origin: CommandOrigin, line: impl Into<String>) {
        self.pending.push_back(QueuedCommand {
            origin,
            line: line.into(),
        });
    }

    pub fn drain(&mut self) -> impl Iterator<Item = QueuedCommand> + '_ {
        self.pending.drain(..)
    }
}

#[cfg(test)]
impl CommandQueue {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Runs everything queued so far. Failures are reported to the origin and
/// logged; nothing is retried.
pub fn run_queued_commands(world: &mut World) {
    let queued: Vec<QueuedCommand> = match world.get_resource_mut::<CommandQueue>() {
        Some(mut queue) => queue.drain().collect(),
        None => return,
    };
    for QueuedCommand { origin, line } in queued {
        if let Err(err) = execute(world, origin, &line) {
            report_command_error(world, origin, &line, &err);
        }
    }
}

pub fn report_command_error(
    world: &mut World,
    origin: CommandOrigin,
    line: &str,
    err: &CommandError,
) {
    warn!("[Slapper commands] '{line}' failed for {origin:?}: {err}");
    if let Some(player) = origin.player() {
        if let Some(mut chat) = world.get_resource_mut::<ChatLog>() {
            chat.send(player, format!("§c{err}§r"));
        }
    }
}
