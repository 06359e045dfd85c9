mod behavior;
mod commands;
mod components;
mod config;
mod console;
mod error;
mod events;
mod forms;
mod host;
mod interaction;
mod nbt;
mod persistence;
mod slapper;
mod spawn;

use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;

fn main() {
    let config = config::load_server_config();
    let tick = Duration::from_secs_f64(1.0 / config.tick_hz.max(1.0));

    let mut app = App::new();
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(tick)))
        .add_plugins(bevy::log::LogPlugin::default())
        .insert_resource(config.slapper.clone())
        .insert_resource(config)
        .add_plugins(host::HostPlugin)
        .add_plugins(persistence::PersistencePlugin)
        .add_plugins(console::ConsolePlugin)
        .add_plugins(slapper::SlapperPlugin);

    info!("[Slapper] Server started, type 'help' for commands");
    app.run();
}
