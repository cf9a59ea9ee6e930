//! Configuration system.
//!
//! Loads engine configuration from JSON strings/files. Binaries layer
//! command-line overrides on top.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Server listen address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Client frame rate and server step rate.
    pub tick_hz: u32,
    /// Interval between roster heartbeats sent by the server.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    /// Path to maps directory.
    #[serde(default = "default_maps_dir")]
    pub maps_dir: String,
    /// Map file stem inside `maps_dir` (loaded as `<map_name>.json`).
    #[serde(default = "default_map_name")]
    pub map_name: String,
    /// Player name (client only).
    #[serde(default = "default_player_name")]
    pub player_name: String,
    /// Tile edge length in pixels.
    #[serde(default = "default_tile_size")]
    pub tile_size: f32,
    /// Walking speed in tiles per second.
    #[serde(default = "default_walk_speed_tiles")]
    pub walk_speed_tiles: f32,
}

fn default_heartbeat_ms() -> u64 {
    200
}

fn default_maps_dir() -> String {
    "maps".to_string()
}

fn default_map_name() -> String {
    "start".to_string()
}

fn default_player_name() -> String {
    "Player".to_string()
}

fn default_tile_size() -> f32 {
    crate::math::TILE_SIZE
}

fn default_walk_speed_tiles() -> f32 {
    4.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            tick_hz: 60,
            heartbeat_ms: default_heartbeat_ms(),
            maps_dir: default_maps_dir(),
            map_name: default_map_name(),
            player_name: default_player_name(),
            tile_size: default_tile_size(),
            walk_speed_tiles: default_walk_speed_tiles(),
        }
    }
}

impl EngineConfig {
    /// Parses config from JSON and validates it.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_json::from_str(s).context("config json")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    /// Rejects values the frame loop and the stepper cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_hz == 0 {
            bail!("tick_hz must be at least 1");
        }
        if !self.tile_size.is_finite() || self.tile_size <= 0.0 {
            bail!("tile_size must be a positive number, got {}", self.tile_size);
        }
        if !self.walk_speed_tiles.is_finite() || self.walk_speed_tiles <= 0.0 {
            bail!(
                "walk_speed_tiles must be a positive number, got {}",
                self.walk_speed_tiles
            );
        }
        Ok(())
    }

    /// Walking speed in pixels per second.
    pub fn walk_speed_px(&self) -> f32 {
        self.tile_size * self.walk_speed_tiles
    }

    /// Path of the configured map file.
    pub fn map_path(&self) -> PathBuf {
        Path::new(&self.maps_dir).join(format!("{}.json", self.map_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "server_addr": "127.0.0.1:1234", "tick_hz": 30 }"#,
        )
        .unwrap();
        assert_eq!(cfg.tick_hz, 30);
        assert_eq!(cfg.heartbeat_ms, 200);
        assert_eq!(cfg.tile_size, 32.0);
        assert_eq!(cfg.walk_speed_px(), 128.0);
        assert_eq!(cfg.map_path(), Path::new("maps").join("start.json"));
    }

    #[test]
    fn required_fields_are_enforced() {
        assert!(EngineConfig::from_json_str(r#"{ "tick_hz": 30 }"#).is_err());
    }

    #[test]
    fn unusable_values_are_rejected() {
        let base = r#""server_addr": "127.0.0.1:1234""#;
        for (field, needle) in [
            (r#""tick_hz": 0"#, "tick_hz"),
            (r#""tick_hz": 60, "tile_size": 0"#, "tile_size"),
            (r#""tick_hz": 60, "tile_size": -32"#, "tile_size"),
            (r#""tick_hz": 60, "walk_speed_tiles": 0"#, "walk_speed_tiles"),
        ] {
            let err = EngineConfig::from_json_str(&format!("{{ {base}, {field} }}")).unwrap_err();
            assert!(format!("{err:#}").contains(needle), "{field}: {err:#}");
        }
        assert!(EngineConfig::default().validate().is_ok());
    }
}
