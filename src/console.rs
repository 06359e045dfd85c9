use std::io::BufRead;

use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::commands::{CommandOrigin, CommandQueue};
use crate::components::Player;
use crate::events::{tick_chat_frame, ChatLog};
use crate::forms::FormTransport;

/// Reads operator commands from stdin and feeds them to the command queue.
/// Forms and chat meant for players are printed, so the console can stand in
/// for their clients (`join`, `as`, `reply`, `interact`).
pub struct ConsolePlugin;

#[derive(Resource)]
pub struct ConsoleReceiver(pub Receiver<String>);

impl Plugin for ConsolePlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        app.insert_resource(ConsoleReceiver(rx))
            .init_resource::<CommandQueue>()
            .add_systems(PreUpdate, queue_console_lines)
            .add_systems(
                Last,
                (print_outbound_forms, print_chat.before(tick_chat_frame)),
            );

        std::thread::spawn(move || read_stdin(tx));
    }
}

fn read_stdin(tx: Sender<String>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("[Slapper console] Failed to read stdin: {e}");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        if tx.send(line).is_err() {
            return;
        }
    }
}

fn queue_console_lines(console: Res<ConsoleReceiver>, mut queue: ResMut<CommandQueue>) {
    loop {
        match console.0.try_recv() {
            Ok(line) => queue.push(CommandOrigin::Console, line),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        }
    }
}

fn display_name(players: &Query<&Player>, entity: Entity) -> String {
    players
        .get(entity)
        .map(|p| p.username.clone())
        .unwrap_or_else(|_| format!("{entity:?}"))
}

fn print_outbound_forms(mut transport: ResMut<FormTransport>, players: Query<&Player>) {
    for form in transport.outbound.drain(..) {
        info!(
            "[Slapper forms] #{} for {}: {}",
            form.id,
            display_name(&players, form.player),
            form.payload
        );
    }
}

fn print_chat(chat: Res<ChatLog>, players: Query<&Player>) {
    for message in chat.this_frame() {
        info!(
            "[Slapper chat] {}: {}",
            display_name(&players, message.recipient),
            message.text
        );
    }
}
