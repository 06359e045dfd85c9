use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Host configuration, read once at startup.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub save_path: String,
    pub autosave_seconds: f32,
    pub tick_hz: f64,
    pub slapper: SlapperConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            save_path: "world.json".to_string(),
            autosave_seconds: 300.0,
            tick_hz: 20.0,
            slapper: SlapperConfig::default(),
        }
    }
}

/// Form defaults and limits for the slapper workflows.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SlapperConfig {
    pub default_entity_type: String,
    pub default_nametag: String,
    /// Subtracted from the player's eye position so slappers stand on the floor.
    pub spawn_y_offset: f32,
    pub command_delimiter: char,
    pub size_min: f32,
    pub size_max: f32,
    pub default_size: f32,
}

impl Default for SlapperConfig {
    fn default() -> Self {
        Self {
            default_entity_type: "minecraft:zombie".to_string(),
            default_nametag: "Slapper".to_string(),
            spawn_y_offset: 1.5,
            command_delimiter: ';',
            size_min: 1.0,
            size_max: 10.0,
            default_size: 1.0,
        }
    }
}

impl SlapperConfig {
    pub fn clamp_size(&self, size: f32) -> f32 {
        if !size.is_finite() {
            return self.default_size;
        }
        size.clamp(self.size_min, self.size_max.max(self.size_min))
    }
}

pub fn load_server_config() -> ServerConfig {
    let path = std::env::var("SLAPPER_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "slapper.json".to_string());
    let mut config = match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<ServerConfig>(&contents) {
            Ok(cfg) => {
                println!("[Slapper] Loaded config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Slapper] Failed to parse {}: {}", path, e);
                ServerConfig::default()
            }
        },
        Err(_) => ServerConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

fn apply_env_overrides(config: &mut ServerConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(path) = var("SLAPPER_SAVE_PATH").filter(|s| !s.is_empty()) {
        config.save_path = path;
    }
    if let Some(raw) = var("SLAPPER_TICK_HZ") {
        match raw.parse::<f64>() {
            Ok(hz) if hz > 0.0 => config.tick_hz = hz,
            _ => eprintln!("[Slapper] Ignoring invalid SLAPPER_TICK_HZ={}", raw),
        }
    }
}
