//! Scripted controllers for running the client without a device layer.

use crate::input::{Controller, ControllerSample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::Vec2;

/// Wanders in a random direction, changing course every so often, and now
/// and then charges and releases a shot.
pub struct RandomWalk {
    rng: StdRng,
    direction: Vec2,
    frames_left: u32,
    shoot_frames_left: u32,
}

impl RandomWalk {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            direction: Vec2::ZERO,
            frames_left: 0,
            shoot_frames_left: 0,
        }
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for RandomWalk {
    fn sample(&mut self) -> ControllerSample {
        if self.frames_left == 0 {
            let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
            let throttle = self.rng.gen_range(0.3..=1.0);
            self.direction = Vec2::new(angle.cos(), angle.sin()).scale(throttle);
            self.frames_left = self.rng.gen_range(20..90);
        }
        self.frames_left -= 1;

        if self.shoot_frames_left == 0 && self.rng.gen_bool(0.01) {
            self.shoot_frames_left = self.rng.gen_range(5..90);
        }
        let shoot = self.shoot_frames_left > 0;
        self.shoot_frames_left = self.shoot_frames_left.saturating_sub(1);

        ControllerSample {
            move_vector: self.direction,
            shoot,
            switch_teammate: self.rng.gen_bool(0.005),
            pass: self.rng.gen_bool(0.005),
        }
    }
}

/// Replays a fixed list of samples, then idles.
pub struct Scripted {
    samples: std::vec::IntoIter<ControllerSample>,
}

impl Scripted {
    pub fn new(samples: Vec<ControllerSample>) -> Self {
        Self {
            samples: samples.into_iter(),
        }
    }
}

impl Controller for Scripted {
    fn sample(&mut self) -> ControllerSample {
        self.samples.next().unwrap_or_default()
    }
}
