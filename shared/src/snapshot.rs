use crate::config::GameConfig;
use crate::entity::{Player, PlayerId, Role, SessionId, Team};
use crate::math::Vec2;
use crate::state::{MatchPhase, MatchState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: Vec2,
    pub team: Team,
    pub role: Role,
    pub is_human: bool,
    pub controlled_by: Option<SessionId>,
}

impl PlayerSnapshot {
    pub fn from_player(player: &Player) -> Self {
        Self {
            position: player.position,
            velocity: player.velocity,
            facing: player.facing,
            team: player.team,
            role: player.role,
            is_human: player.is_human,
            controlled_by: player.controlled_by,
        }
    }

    /// Rebuilds a physics-ready player, e.g. to seed client prediction.
    pub fn to_player(&self, id: &str) -> Player {
        let mut player = Player::new(id, self.team, self.role, self.position);
        player.velocity = self.velocity;
        player.facing = self.facing;
        player.is_human = self.is_human;
        player.controlled_by = self.controlled_by;
        player
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub possessed_by: Option<PlayerId>,
}

/// Authoritative state broadcast to every client in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub tick: u64,
    pub server_time_ms: u64,
    pub phase: MatchPhase,
    pub score_a: u32,
    pub score_b: u32,
    /// Play is paused for a post-goal kickoff; nothing moves.
    pub frozen: bool,
    /// Seconds left on the match clock.
    pub match_time_remaining: f32,
    pub ball: BallSnapshot,
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    /// Highest input sequence applied per session, for reconciliation.
    pub last_processed_input: BTreeMap<SessionId, u32>,
}

impl StateSnapshot {
    pub fn capture(
        state: &MatchState,
        config: &GameConfig,
        last_processed_input: BTreeMap<SessionId, u32>,
    ) -> Self {
        Self {
            tick: state.tick,
            server_time_ms: state.now_ms(config),
            phase: state.phase,
            score_a: state.score_a,
            score_b: state.score_b,
            frozen: state.is_frozen(),
            match_time_remaining: state.match_time_remaining(config),
            ball: BallSnapshot {
                position: state.ball.position,
                velocity: state.ball.velocity,
                possessed_by: state.ball.possessed_by.clone(),
            },
            players: state
                .players
                .iter()
                .map(|(id, p)| (id.clone(), PlayerSnapshot::from_player(p)))
                .collect(),
            last_processed_input,
        }
    }

    /// Id of the player `session` currently controls, if any.
    pub fn controlled_by(&self, session: SessionId) -> Option<&PlayerId> {
        self.players
            .iter()
            .find(|(_, p)| p.controlled_by == Some(session))
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_mirrors_state() {
        let config = GameConfig::default();
        let mut state = MatchState::new(&config);
        state.tick = 120;
        state.score_b = 2;
        state.ball.possessed_by = Some("A-forward".to_string());
        state.players.get_mut("A-forward").unwrap().controlled_by = Some(7);

        let mut acks = BTreeMap::new();
        acks.insert(7, 42);
        let snapshot = StateSnapshot::capture(&state, &config, acks);

        assert_eq!(snapshot.server_time_ms, 2000);
        assert_eq!(snapshot.score_b, 2);
        assert_eq!(snapshot.ball.possessed_by.as_deref(), Some("A-forward"));
        assert_eq!(snapshot.players.len(), 4);
        assert_eq!(snapshot.controlled_by(7).map(String::as_str), Some("A-forward"));
        assert_eq!(snapshot.controlled_by(8), None);
        assert_eq!(snapshot.last_processed_input.get(&7), Some(&42));
    }

    #[test]
    fn test_capture_reports_kickoff_freeze() {
        let config = GameConfig::default();
        let mut state = MatchState::new(&config);
        assert!(!StateSnapshot::capture(&state, &config, BTreeMap::new()).frozen);

        state.kickoff_at_ms = Some(3_000);
        assert!(StateSnapshot::capture(&state, &config, BTreeMap::new()).frozen);
    }

    #[test]
    fn test_player_snapshot_round_trip() {
        let mut player = Player::new("B-defender", Team::B, Role::Defender, Vec2::new(5.0, 6.0));
        player.velocity = Vec2::new(1.0, 2.0);
        player.controlled_by = Some(1);
        player.is_human = true;

        let rebuilt = PlayerSnapshot::from_player(&player).to_player("B-defender");
        assert_eq!(rebuilt, player);
    }
}
