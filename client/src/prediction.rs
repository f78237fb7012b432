//! Local prediction of the controlled player and reconciliation against the
//! server.
//!
//! Input is applied to the predicted player the moment it is sampled, using
//! the frame's own delta time. When a snapshot arrives, the authoritative
//! position is rolled forward through every input the server has not yet
//! acknowledged, and the predicted position is blended toward that target.
//! The blend factor grows with the error: small drift is eased out over many
//! snapshots, large divergence is corrected almost at once.

use log::debug;
use shared::physics::step_player;
use shared::{GameConfig, InputCommand, Player, PlayerId, PlayerSnapshot};
use std::collections::VecDeque;

/// Errors at or below this are snapped away entirely.
pub const SNAP_EPSILON: f32 = 0.5;

/// Errors at or above this snap straight to the authoritative target.
pub const SNAP_THRESHOLD: f32 = 150.0;

/// Unacknowledged inputs kept for replay.
const MAX_HISTORY: usize = 256;

/// Fraction of the remaining error removed by one reconciliation pass.
pub fn correction_factor(error: f32) -> f32 {
    if error <= SNAP_EPSILON {
        1.0
    } else if error < 16.0 {
        0.1
    } else if error < 64.0 {
        0.3
    } else if error < SNAP_THRESHOLD {
        0.6
    } else {
        1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciliation {
    /// Distance between predicted and corrected position before blending.
    pub error: f32,
    pub factor: f32,
    /// Inputs replayed on top of the authoritative state.
    pub replayed: usize,
}

pub struct Predictor {
    player: Player,
    history: VecDeque<(InputCommand, f32)>,
    config: GameConfig,
}

impl Predictor {
    pub fn new(player: Player, config: GameConfig) -> Self {
        Self {
            player,
            history: VecDeque::new(),
            config,
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.player.id
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn pending_inputs(&self) -> usize {
        self.history.len()
    }

    /// Moves the predicted player immediately and remembers the input for
    /// replay.
    pub fn apply_local_input(&mut self, command: &InputCommand, frame_dt: f32) {
        step_player(&mut self.player, command, frame_dt, &self.config);

        self.history.push_back((command.clone(), frame_dt));
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    /// Blends the prediction toward `authoritative` plus every input after
    /// `last_processed`.
    pub fn reconcile(
        &mut self,
        authoritative: &PlayerSnapshot,
        last_processed: Option<u32>,
    ) -> Reconciliation {
        if let Some(ack) = last_processed {
            while self
                .history
                .front()
                .map_or(false, |(command, _)| command.sequence <= ack)
            {
                self.history.pop_front();
            }
        }

        let mut target = authoritative.to_player(&self.player.id);
        for (command, dt) in &self.history {
            step_player(&mut target, command, *dt, &self.config);
        }

        let error = self.player.position.distance(target.position);
        let factor = correction_factor(error);
        if factor >= 1.0 {
            if error > SNAP_EPSILON {
                debug!("Prediction snapped: error {:.1}", error);
            }
            self.player.position = target.position;
        } else {
            self.player.position = self.player.position.lerp(target.position, factor);
        }
        self.player.velocity = target.velocity;
        self.player.facing = target.facing;
        self.player.is_human = target.is_human;
        self.player.controlled_by = target.controlled_by;

        Reconciliation {
            error,
            factor,
            replayed: self.history.len(),
        }
    }
}
