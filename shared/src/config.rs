//! Tunable gameplay and simulation parameters.
//!
//! The simulation never reads these from global state: every step function
//! takes a `&GameConfig` so several rooms (or tests) can run side by side
//! with different settings. Both binaries build one from defaults, CLI flags
//! and an optional TOML file.

use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // Field geometry
    pub field_width: f32,
    pub field_height: f32,
    /// Height of the goal mouth, centred on the half-way line's y.
    pub goal_width: f32,
    /// How far behind the goal line the net extends.
    pub goal_depth: f32,

    // Players
    pub player_radius: f32,
    pub player_speed: f32,

    // Ball
    pub ball_radius: f32,
    /// Fraction of speed lost per second in free flight.
    pub ball_damping: f32,
    /// Below this speed a free ball comes to rest.
    pub ball_rest_speed: f32,
    pub ball_restitution: f32,
    /// Distance in front of the possessor at which a held ball sits.
    pub possession_offset: f32,

    // Shooting and passing
    pub min_shoot_speed: f32,
    pub shoot_speed: f32,
    pub max_shoot_hold_ms: u32,
    pub pass_speed: f32,

    // Possession and pressure
    pub possession_radius: f32,
    pub pressure_radius: f32,
    /// Pressure gained per second inside the pressure radius.
    pub pressure_buildup_rate: f32,
    /// Pressure lost per second outside the pressure radius.
    pub pressure_decay_rate: f32,
    pub steal_threshold: f32,
    pub capture_lockout_ms: u64,
    pub loss_lockout_ms: u64,

    // Match flow
    pub match_duration_secs: u32,
    pub goal_pause_ms: u64,
    pub post_match_pause_ms: u64,
    pub min_participants: usize,
    pub humans_per_room: usize,

    // Timing
    pub tick_rate: u32,
    pub broadcast_rate: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            field_width: 2000.0,
            field_height: 1080.0,
            goal_width: 320.0,
            goal_depth: 60.0,
            player_radius: 30.0,
            player_speed: 400.0,
            ball_radius: 15.0,
            ball_damping: 0.9,
            ball_rest_speed: 5.0,
            ball_restitution: 0.8,
            possession_offset: 40.0,
            min_shoot_speed: 800.0,
            shoot_speed: 2000.0,
            max_shoot_hold_ms: 1500,
            pass_speed: 900.0,
            possession_radius: 50.0,
            pressure_radius: 80.0,
            pressure_buildup_rate: 1.0,
            pressure_decay_rate: 0.5,
            steal_threshold: 1.0,
            capture_lockout_ms: 300,
            loss_lockout_ms: 800,
            match_duration_secs: 180,
            goal_pause_ms: 2000,
            post_match_pause_ms: 5000,
            min_participants: 2,
            humans_per_room: 2,
            tick_rate: 60,
            broadcast_rate: 30,
        }
    }
}

impl GameConfig {
    /// Parses a TOML document; missing keys fall back to defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: GameConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("field_width", self.field_width),
            ("field_height", self.field_height),
            ("player_radius", self.player_radius),
            ("player_speed", self.player_speed),
            ("ball_radius", self.ball_radius),
            ("shoot_speed", self.shoot_speed),
            ("possession_radius", self.possession_radius),
            ("pressure_radius", self.pressure_radius),
            ("steal_threshold", self.steal_threshold),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be a positive number",
                });
            }
        }

        if self.min_shoot_speed > self.shoot_speed {
            return Err(ConfigError::Invalid {
                field: "min_shoot_speed",
                reason: "must not exceed shoot_speed",
            });
        }
        if self.max_shoot_hold_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "max_shoot_hold_ms",
                reason: "must be > 0",
            });
        }
        if 2.0 * self.player_radius >= self.field_width.min(self.field_height) {
            return Err(ConfigError::Invalid {
                field: "player_radius",
                reason: "players do not fit on the field",
            });
        }
        if self.goal_width >= self.field_height {
            return Err(ConfigError::Invalid {
                field: "goal_width",
                reason: "must be narrower than the field",
            });
        }
        if self.goal_depth < 2.0 * self.ball_radius {
            return Err(ConfigError::Invalid {
                field: "goal_depth",
                reason: "net must be deep enough to hold the ball",
            });
        }
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(ConfigError::Invalid {
                field: "tick_rate",
                reason: "must be between 1 and 1000",
            });
        }
        if self.broadcast_rate == 0 || self.broadcast_rate > self.tick_rate {
            return Err(ConfigError::Invalid {
                field: "broadcast_rate",
                reason: "must be between 1 and tick_rate",
            });
        }
        if self.humans_per_room == 0 || self.humans_per_room > 2 {
            return Err(ConfigError::Invalid {
                field: "humans_per_room",
                reason: "one human per team at most",
            });
        }
        if self.min_participants == 0 || self.min_participants > self.humans_per_room {
            return Err(ConfigError::Invalid {
                field: "min_participants",
                reason: "must be between 1 and humans_per_room",
            });
        }
        Ok(())
    }

    /// Fixed physics step in seconds.
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.tick_rate as u64)
    }

    /// Number of physics ticks between two snapshot broadcasts.
    pub fn broadcast_interval_ticks(&self) -> u64 {
        (self.tick_rate / self.broadcast_rate).max(1) as u64
    }

    pub fn match_duration_ticks(&self) -> u64 {
        self.match_duration_secs as u64 * self.tick_rate as u64
    }

    /// Simulation milliseconds elapsed after `tick` fixed steps.
    ///
    /// Computed from the tick count rather than accumulated so the result is
    /// identical however the ticks were scheduled.
    pub fn tick_to_ms(&self, tick: u64) -> u64 {
        tick * 1000 / self.tick_rate as u64
    }

    pub fn field_center(&self) -> Vec2 {
        Vec2::new(self.field_width / 2.0, self.field_height / 2.0)
    }

    pub fn player_margin(&self) -> f32 {
        self.player_radius
    }

    /// Vertical extent `(top, bottom)` of the goal mouth.
    pub fn goal_mouth(&self) -> (f32, f32) {
        let cy = self.field_height / 2.0;
        (cy - self.goal_width / 2.0, cy + self.goal_width / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid config value `{}`: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
