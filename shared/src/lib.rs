//! Code shared by the authoritative server and the predicting client: the
//! data model, the deterministic physics core, the possession state machine,
//! the configuration surface, the clock abstraction and the wire protocol.

use serde::{Deserialize, Serialize};

pub mod clock;
pub mod config;
pub mod entity;
pub mod input;
pub mod math;
pub mod physics;
pub mod possession;
pub mod snapshot;
pub mod state;

pub use clock::{Clock, ManualClock, MonotonicClock, ScaledClock};
pub use config::{ConfigError, GameConfig};
pub use entity::{slot_id, Ball, Player, PlayerId, Role, SessionId, Team};
pub use input::{ActionIntent, InputCommand};
pub use math::Vec2;
pub use physics::{resolve_goal, shot_speed, step_ball, step_player, Goal};
pub use possession::{update_possession, PossessionEvent};
pub use snapshot::{BallSnapshot, PlayerSnapshot, StateSnapshot};
pub use state::{kickoff_position, MatchPhase, MatchState};

pub const PROTOCOL_VERSION: u32 = 1;

/// Largest datagram either side expects to receive.
pub const MAX_PACKET_SIZE: usize = 4096;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Input {
        command: InputCommand,
    },
    Disconnect,

    Connected {
        client_id: SessionId,
        room_id: u32,
        team: Team,
    },
    Snapshot(StateSnapshot),
    Disconnected {
        reason: String,
    },
}
