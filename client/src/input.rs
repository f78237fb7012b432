//! Client input management with sequencing and edge detection

use shared::{ActionIntent, Clock, InputCommand, Vec2};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Raw controller state for one frame, as produced by whatever drives the
/// client (a human device layer, a script, a random walk).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerSample {
    pub move_vector: Vec2,
    pub shoot: bool,
    pub switch_teammate: bool,
    pub pass: bool,
}

/// Something that can be asked for a controller sample once per frame.
pub trait Controller: Send {
    fn sample(&mut self) -> ControllerSample;
}

/// Turns per-frame controller samples into sequenced input commands
///
/// Buttons are edge-triggered: holding shoot produces one `ShootPress` and,
/// when let go, one `ShootRelease` carrying the measured hold time. Only one
/// action fits into a command, so edges that coincide are queued and sent on
/// the following frames.
pub struct InputManager {
    next_sequence: u32,
    clock: Arc<dyn Clock>,
    previous: ControllerSample,
    shoot_pressed_at: Option<Duration>,
    queued: VecDeque<ActionIntent>,
}

impl InputManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            next_sequence: 1,
            clock,
            previous: ControllerSample::default(),
            shoot_pressed_at: None,
            queued: VecDeque::new(),
        }
    }

    /// Sequence number the next command will carry.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Whether the shoot button is currently held down.
    pub fn is_charging(&self) -> bool {
        self.shoot_pressed_at.is_some()
    }

    pub fn update(&mut self, sample: ControllerSample) -> InputCommand {
        let now = self.clock.now();

        if sample.shoot && !self.previous.shoot {
            self.shoot_pressed_at = Some(now);
            self.queued.push_back(ActionIntent::ShootPress);
        }
        if !sample.shoot && self.previous.shoot {
            let held = self
                .shoot_pressed_at
                .take()
                .map_or(Duration::ZERO, |pressed| now.saturating_sub(pressed));
            self.queued.push_back(ActionIntent::ShootRelease {
                hold_duration_ms: held.as_millis().min(u32::MAX as u128) as u32,
            });
        }
        if sample.pass && !self.previous.pass {
            self.queued.push_back(ActionIntent::Pass);
        }
        if sample.switch_teammate && !self.previous.switch_teammate {
            self.queued.push_back(ActionIntent::SwitchTeammate);
        }
        self.previous = sample;

        let command = InputCommand {
            sequence: self.next_sequence,
            timestamp: self.clock.now_ms(),
            move_vector: sample.move_vector,
            action: self.queued.pop_front().unwrap_or_default(),
        };
        self.next_sequence += 1;
        command.sanitized()
    }
}
