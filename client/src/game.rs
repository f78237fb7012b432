use crate::interpolation::RemoteInterpolator;
use crate::prediction::{Predictor, Reconciliation};
use log::{debug, info};
use shared::physics::pin_ball;
use shared::{
    Ball, GameConfig, InputCommand, MatchPhase, PlayerId, Role, SessionId, StateSnapshot, Team,
    Vec2,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlayer {
    pub position: Vec2,
    pub team: Team,
    pub role: Role,
    pub is_human: bool,
    /// Drawn from local prediction rather than interpolation.
    pub is_local: bool,
}

/// Everything a presentation layer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderView {
    pub phase: MatchPhase,
    pub score_a: u32,
    pub score_b: u32,
    pub match_time_remaining: f32,
    pub players: BTreeMap<PlayerId, RenderPlayer>,
    pub ball: Vec2,
}

/// Client-side picture of the match: a read-only mirror of the last
/// authoritative snapshot plus at most one predicted player.
pub struct ClientGameState {
    config: GameConfig,
    session: Option<SessionId>,
    team: Option<Team>,
    mirror: Option<StateSnapshot>,
    predictor: Option<Predictor>,
    interpolator: RemoteInterpolator,
    last_reconciliation: Option<Reconciliation>,
}

impl ClientGameState {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            session: None,
            team: None,
            mirror: None,
            predictor: None,
            interpolator: RemoteInterpolator::new(),
            last_reconciliation: None,
        }
    }

    pub fn on_connected(&mut self, session: SessionId, team: Team) {
        self.session = Some(session);
        self.team = Some(team);
        self.mirror = None;
        self.predictor = None;
        self.interpolator.clear();
    }

    pub fn on_disconnected(&mut self) {
        self.session = None;
        self.team = None;
        self.predictor = None;
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn team(&self) -> Option<Team> {
        self.team
    }

    pub fn mirror(&self) -> Option<&StateSnapshot> {
        self.mirror.as_ref()
    }

    pub fn predictor(&self) -> Option<&Predictor> {
        self.predictor.as_ref()
    }

    pub fn controlled_id(&self) -> Option<&PlayerId> {
        self.predictor.as_ref().map(|p| p.id())
    }

    pub fn last_reconciliation(&self) -> Option<Reconciliation> {
        self.last_reconciliation
    }

    /// Folds a snapshot into the mirror and reconciles the prediction.
    ///
    /// Snapshots older than the mirror are dropped. If the server moved our
    /// control to another player, the predictor is replaced in one assignment
    /// and starts from that player's authoritative state.
    pub fn apply_snapshot(
        &mut self,
        snapshot: StateSnapshot,
        received_ms: u64,
    ) -> Option<Reconciliation> {
        if self.mirror.as_ref().map_or(false, |m| snapshot.tick <= m.tick) {
            return None;
        }
        if let Some(previous) = &self.mirror {
            if previous.phase != snapshot.phase {
                info!("Match phase {:?} -> {:?}", previous.phase, snapshot.phase);
            }
            if (previous.score_a, previous.score_b) != (snapshot.score_a, snapshot.score_b) {
                info!("Score {}-{}", snapshot.score_a, snapshot.score_b);
            }
        }

        self.interpolator.push(&snapshot, received_ms);

        let controlled = self
            .session
            .and_then(|session| snapshot.controlled_by(session))
            .cloned();

        let same_player = match (&self.predictor, &controlled) {
            (Some(predictor), Some(id)) => predictor.id() == id,
            _ => false,
        };

        let result = if same_player {
            let ack = self
                .session
                .and_then(|s| snapshot.last_processed_input.get(&s).copied());
            let authoritative = controlled.as_ref().and_then(|id| snapshot.players.get(id));
            match (self.predictor.as_mut(), authoritative) {
                (Some(predictor), Some(authoritative)) => {
                    Some(predictor.reconcile(authoritative, ack))
                }
                _ => None,
            }
        } else {
            let config = &self.config;
            self.predictor = controlled.and_then(|id| {
                let player = snapshot.players.get(&id)?.to_player(&id);
                debug!("Now predicting {}", id);
                Some(Predictor::new(player, config.clone()))
            });
            None
        };

        if result.is_some() {
            self.last_reconciliation = result;
        }
        self.mirror = Some(snapshot);
        result
    }

    /// Applies a local input to the predicted player, if any. Nothing moves
    /// while the match is over or paused for a kickoff.
    pub fn apply_local_input(&mut self, command: &InputCommand, frame_dt: f32) {
        let predicting = self
            .mirror
            .as_ref()
            .map_or(false, |m| m.phase != MatchPhase::Ended && !m.frozen);

        if let (true, Some(predictor)) = (predicting, self.predictor.as_mut()) {
            predictor.apply_local_input(command, frame_dt);
        }
    }

    pub fn render_view(&self, now_ms: u64) -> Option<RenderView> {
        let mirror = self.mirror.as_ref()?;
        let local = self.predictor.as_ref().map(|p| p.player());

        let players = mirror
            .players
            .iter()
            .map(|(id, snapshot)| {
                let (position, is_local) = match local {
                    Some(player) if player.id == *id => (player.position, true),
                    _ => (
                        self.interpolator
                            .player_position(id, now_ms)
                            .unwrap_or(snapshot.position),
                        false,
                    ),
                };
                let view = RenderPlayer {
                    position,
                    team: snapshot.team,
                    role: snapshot.role,
                    is_human: snapshot.is_human,
                    is_local,
                };
                (id.clone(), view)
            })
            .collect();

        // A ball we carry follows our predicted player, not the stream.
        let ball = match local {
            Some(player) if mirror.ball.possessed_by.as_deref() == Some(player.id.as_str()) => {
                let mut ball = Ball::at(mirror.ball.position);
                pin_ball(&mut ball, player, &self.config);
                ball.position
            }
            _ => self
                .interpolator
                .ball_position(now_ms)
                .unwrap_or(mirror.ball.position),
        };

        Some(RenderView {
            phase: mirror.phase,
            score_a: mirror.score_a,
            score_b: mirror.score_b,
            match_time_remaining: mirror.match_time_remaining,
            players,
            ball,
        })
    }
}
