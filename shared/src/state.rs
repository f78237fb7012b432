//! Canonical match state and the kickoff formation.

use crate::config::GameConfig;
use crate::entity::{slot_id, Ball, Player, PlayerId, Role, Team};
use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Not enough human participants to play.
    Waiting,
    Playing,
    Ended,
}

/// Everything the authoritative loop owns for one room.
///
/// Tables are `BTreeMap`s so iteration order, and therefore every tick, is
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    pub phase: MatchPhase,
    pub score_a: u32,
    pub score_b: u32,
    /// Fixed steps simulated since the room opened.
    pub tick: u64,
    pub match_ticks_remaining: u64,
    pub players: BTreeMap<PlayerId, Player>,
    pub ball: Ball,
    /// Set after a goal: play is frozen until this simulation ms, then the
    /// kickoff formation is restored.
    pub kickoff_at_ms: Option<u64>,
    /// Set when the match ends: the room resets at this simulation ms.
    pub reset_at_ms: Option<u64>,
}

impl MatchState {
    /// A fresh room: four bot slots in kickoff formation, waiting for humans.
    pub fn new(config: &GameConfig) -> Self {
        let mut players = BTreeMap::new();
        for team in [Team::A, Team::B] {
            for role in [Role::Forward, Role::Defender] {
                let id = slot_id(team, role);
                let player = Player::new(id.clone(), team, role, kickoff_position(team, role, config));
                players.insert(id, player);
            }
        }

        Self {
            phase: MatchPhase::Waiting,
            score_a: 0,
            score_b: 0,
            tick: 0,
            match_ticks_remaining: config.match_duration_ticks(),
            players,
            ball: Ball::at(config.field_center()),
            kickoff_at_ms: None,
            reset_at_ms: None,
        }
    }

    /// Simulation time of the current tick.
    pub fn now_ms(&self, config: &GameConfig) -> u64 {
        config.tick_to_ms(self.tick)
    }

    pub fn match_time_remaining(&self, config: &GameConfig) -> f32 {
        self.match_ticks_remaining as f32 / config.tick_rate as f32
    }

    pub fn is_frozen(&self) -> bool {
        self.kickoff_at_ms.is_some()
    }

    pub fn add_goal(&mut self, team: Team) {
        match team {
            Team::A => self.score_a += 1,
            Team::B => self.score_b += 1,
        }
    }

    /// Puts ball and players back in the kickoff formation.
    ///
    /// Control assignments are left alone; lockouts and pressure are cleared.
    pub fn reset_kickoff(&mut self, config: &GameConfig) {
        for player in self.players.values_mut() {
            player.position = kickoff_position(player.team, player.role, config);
            player.velocity = Vec2::ZERO;
            player.facing = Vec2::new(player.team.attack_sign(), 0.0);
            player.loss_lockout_until = 0;
        }
        self.ball = Ball::at(config.field_center());
        self.kickoff_at_ms = None;
    }

    /// Clears scores and the timer and restores the kickoff formation.
    pub fn reset_match(&mut self, config: &GameConfig) {
        self.score_a = 0;
        self.score_b = 0;
        self.match_ticks_remaining = config.match_duration_ticks();
        self.reset_at_ms = None;
        self.reset_kickoff(config);
    }

    pub fn teammates<'a>(&'a self, team: Team) -> impl Iterator<Item = &'a Player> + 'a {
        self.players.values().filter(move |p| p.team == team)
    }
}

/// Exact kickoff spot for a slot. Teams line up on the centre line's y,
/// forwards at 40%/60% of the field width and defenders at 20%/80%.
pub fn kickoff_position(team: Team, role: Role, config: &GameConfig) -> Vec2 {
    let fraction = match (team, role) {
        (Team::A, Role::Defender) => 0.2,
        (Team::A, Role::Forward) => 0.4,
        (Team::B, Role::Forward) => 0.6,
        (Team::B, Role::Defender) => 0.8,
    };
    Vec2::new(config.field_width * fraction, config.field_height / 2.0)
}
