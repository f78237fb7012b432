//! The input contract shared by human controllers and AI input sources.

use crate::math::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ActionIntent {
    #[default]
    None,
    /// Shoot button went down. Charging is measured client-side.
    ShootPress,
    ShootRelease {
        hold_duration_ms: u32,
    },
    SwitchTeammate,
    Pass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InputCommand {
    pub sequence: u32,
    pub timestamp: u64,
    /// Desired movement direction, magnitude <= 1.
    pub move_vector: Vec2,
    pub action: ActionIntent,
}

impl InputCommand {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn moving(move_vector: Vec2) -> Self {
        Self {
            move_vector,
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: ActionIntent) -> Self {
        self.action = action;
        self
    }

    /// Returns a copy safe to feed into the physics core.
    ///
    /// Non-finite move vectors become zero and anything longer than unit
    /// length is normalised. Invalid input is never an error.
    pub fn sanitized(&self) -> InputCommand {
        let move_vector = if self.move_vector.is_finite() {
            self.move_vector.clamp_length(1.0)
        } else {
            Vec2::ZERO
        };
        InputCommand {
            move_vector,
            ..self.clone()
        }
    }
}
