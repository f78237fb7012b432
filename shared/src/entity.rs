use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable string key for a player. Server and client both index players by
/// id; the ball refers to its possessor by id, never by reference.
pub type PlayerId = String;

/// Identifier the server hands to each connected client session.
pub type SessionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }

    /// Sign of the x direction this team attacks. Team A defends the left goal.
    pub fn attack_sign(self) -> f32 {
        match self {
            Team::A => 1.0,
            Team::B => -1.0,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::A => write!(f, "A"),
            Team::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Forward,
    Defender,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Forward => write!(f, "forward"),
            Role::Defender => write!(f, "defender"),
        }
    }
}

/// Canonical id of the slot `team`/`role`, e.g. `"A-forward"`.
pub fn slot_id(team: Team, role: Role) -> PlayerId {
    format!("{}-{}", team, role)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub team: Team,
    pub role: Role,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Unit vector; only changes while the player is moving.
    pub facing: Vec2,
    pub is_human: bool,
    pub controlled_by: Option<SessionId>,
    /// Simulation ms before which this player may not pick up the ball.
    pub loss_lockout_until: u64,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, team: Team, role: Role, position: Vec2) -> Self {
        Self {
            id: id.into(),
            team,
            role,
            position,
            velocity: Vec2::ZERO,
            facing: Vec2::new(team.attack_sign(), 0.0),
            is_human: false,
            controlled_by: None,
            loss_lockout_until: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Ball {
    pub position: Vec2,
    pub velocity: Vec2,
    pub possessed_by: Option<PlayerId>,
    /// Accumulated pressure per contesting opponent.
    pub pressure: BTreeMap<PlayerId, f32>,
    /// Simulation ms before which the ball cannot be stolen from its holder,
    /// nor re-collected by the player who last released it.
    pub capture_lockout_until: u64,
    pub released_by: Option<PlayerId>,
}

impl Ball {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn is_free(&self) -> bool {
        self.possessed_by.is_none()
    }

    pub fn is_possessed_by(&self, id: &str) -> bool {
        self.possessed_by.as_deref() == Some(id)
    }
}
