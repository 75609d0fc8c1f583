//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted configuration inside the config directory.
const CONFIG_FILE: &str = "config.ron";

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Room, broadcast, and interpolation settings.
    pub network: NetworkConfig,
    /// Local avatar movement tuning.
    pub movement: MovementConfig,
    /// Interaction, status, and persistence cadence.
    pub gameplay: GameplayConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Network synchronization configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Shared room identifier every client subscribes to.
    pub room_id: String,
    /// Name announced through presence tracking.
    pub display_name: String,
    /// Minimum interval between outbound state broadcasts (ms).
    pub broadcast_interval_ms: u64,
    /// Delay subtracted from "now" when sampling remote state (ms).
    pub interpolation_delay_ms: u64,
    /// Maximum snapshots retained per remote peer.
    pub buffer_capacity: usize,
    /// Silence after which a peer is culled (ms).
    pub peer_timeout_ms: u64,
    /// Fixed delay before a reconnect attempt (ms).
    pub reconnect_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0) applied as ±jitter to the reconnect delay.
    pub reconnect_jitter: f64,
}

/// Movement controller tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MovementConfig {
    /// Walk speed in m/s.
    pub walk_speed: f32,
    /// Multiplier applied to `walk_speed` while sprinting.
    pub sprint_multiplier: f32,
    /// Exponential approach rate while speeding up (1/s).
    pub acceleration_rate: f32,
    /// Exponential approach rate while slowing down (1/s).
    pub deceleration_rate: f32,
    /// Downward acceleration in m/s².
    pub gravity: f32,
    /// Instant upward velocity applied on jump (m/s).
    pub jump_impulse: f32,
    /// Half width (X and Z) of the collision core volume.
    pub core_half_width: f32,
    /// Half height of the collision core volume.
    pub core_half_height: f32,
    /// Margin removed from every side of an obstacle's bounds before testing.
    pub obstacle_shrink: f32,
    /// Rate at which the smoothed ground normal follows the sampled one (1/s).
    pub normal_smoothing_rate: f32,
    /// Rate at which facing rotates toward the velocity direction (1/s).
    pub turn_rate: f32,
    /// Rate at which the camera follows its target parameters (1/s).
    pub camera_follow_rate: f32,
    /// Horizontal speed below which facing is left untouched (m/s).
    pub velocity_epsilon: f32,
    /// Half extent of the square playable area centred on the origin.
    pub world_half_extent: f32,
    /// Height used when the ground query finds nothing.
    pub fallback_ground_height: f32,
}

/// Gameplay configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameplayConfig {
    /// Warmth lost per second away from heat.
    pub warmth_decay_per_sec: f32,
    /// Warmth gained per second near a heat source.
    pub warmth_recovery_per_sec: f32,
    /// Radius around a heat source that counts as "near" (m).
    pub heat_radius: f32,
    /// Interval between fire-and-forget position saves (s).
    pub position_save_interval_secs: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Enables per-tick diagnostics in the simulation loop.
    pub debug_mode: bool,
    /// Also write JSON logs to a file when a log directory is given.
    pub log_json: bool,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            room_id: "meadow-commons".to_string(),
            display_name: "wanderer".to_string(),
            broadcast_interval_ms: 100,
            interpolation_delay_ms: 100,
            buffer_capacity: 20,
            peer_timeout_ms: 10_000,
            reconnect_delay_ms: 2_000,
            reconnect_jitter: 0.0,
        }
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 6.0,
            sprint_multiplier: 1.6,
            acceleration_rate: 10.0,
            deceleration_rate: 16.0,
            gravity: 24.0,
            jump_impulse: 8.5,
            core_half_width: 0.25,
            core_half_height: 0.9,
            obstacle_shrink: 0.1,
            normal_smoothing_rate: 8.0,
            turn_rate: 12.0,
            camera_follow_rate: 10.0,
            velocity_epsilon: 0.05,
            world_half_extent: 200.0,
            fallback_ground_height: 0.0,
        }
    }
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            warmth_decay_per_sec: 0.5,
            warmth_recovery_per_sec: 4.0,
            heat_radius: 6.0,
            position_save_interval_secs: 5.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_mode: false,
            log_json: false,
        }
    }
}

/// Platform config directory for Meadow (`<config_dir>/meadow`), falling back
/// to the working directory when the platform reports none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("meadow"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// --- Load / Save / Reload ---

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let new_config = read_config(&config_path)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("broadcast_interval_ms: 100"));
        assert!(ron_str.contains("room_id: \"meadow-commons\""));
    }

    #[test]
    fn test_network_defaults_match_sync_timing() {
        let net = NetworkConfig::default();
        assert_eq!(net.broadcast_interval_ms, 100, "10 Hz broadcast");
        assert_eq!(net.interpolation_delay_ms, 100);
        assert_eq!(net.buffer_capacity, 20);
        assert_eq!(net.peer_timeout_ms, 10_000);
        assert_eq!(net.reconnect_delay_ms, 2_000);
    }

    #[test]
    fn test_deceleration_stronger_than_acceleration() {
        let movement = MovementConfig::default();
        assert!(
            movement.deceleration_rate > movement.acceleration_rate,
            "stops should be snappier than starts"
        );
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(network: (room_id: \"glade\"))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.network.room_id, "glade");
        assert_eq!(config.network.broadcast_interval_ms, 100);
        assert_eq!(config.movement, MovementConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.network.room_id = "riverbank".to_string();
        config.movement.walk_speed = 4.5;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.debug.debug_mode = true;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_some_and(|c| c.debug.debug_mode));
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        match result {
            Err(ConfigError::Parse { path, .. }) => {
                assert_eq!(path, dir.path().join(CONFIG_FILE));
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_reload_of_missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::default().reload(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains(CONFIG_FILE), "message: {err}");
    }
}
