use crate::bots::{AiInputSource, FormationKeeper};
use crate::control::ControlAssignment;
use crate::match_phase::{evaluate_participants, evaluate_tick, is_live, resolve_pauses, PhaseEvent};
use log::{debug, info};
use shared::physics::{resolve_player_collisions, step_ball, step_player};
use shared::possession::{drop_ball, pass, shoot, update_possession};
use shared::{
    ActionIntent, GameConfig, InputCommand, MatchState, PlayerId, PossessionEvent, SessionId,
    StateSnapshot, Team, Vec2,
};
use std::collections::BTreeMap;
use std::fmt;

/// A human participant of the room and their buffered input.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub team: Team,
    /// Inputs received since the last tick, in sequence order.
    pub pending: Vec<InputCommand>,
    pub last_processed_input: u32,
    /// Move vector of the newest processed input; reapplied every tick until
    /// a newer one arrives.
    pub held_move: Vec2,
}

impl Session {
    fn new(id: SessionId, team: Team) -> Self {
        Self {
            id,
            team,
            pending: Vec::new(),
            last_processed_input: 0,
            held_move: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinError {
    AlreadyJoined(SessionId),
    RoomFull,
    TeamTaken(Team),
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::AlreadyJoined(id) => write!(f, "session {} already joined", id),
            JoinError::RoomFull => write!(f, "room full"),
            JoinError::TeamTaken(team) => write!(f, "team {} already has a human", team),
        }
    }
}

impl std::error::Error for JoinError {}

#[derive(Debug, Clone, Copy)]
enum Membership {
    Join(SessionId, Team),
    Leave(SessionId),
}

/// What happened during one [`GameState::step`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub possession: Vec<PossessionEvent>,
    pub phase: Vec<PhaseEvent>,
    pub handoffs: Vec<(SessionId, PlayerId)>,
}

/// Canonical state of one room plus everything needed to advance it.
///
/// Joins, leaves and inputs may arrive at any time; they are buffered and
/// only take effect inside [`GameState::step`].
pub struct GameState {
    pub state: MatchState,
    config: GameConfig,
    control: ControlAssignment,
    sessions: BTreeMap<SessionId, Session>,
    membership: Vec<Membership>,
    ai: Box<dyn AiInputSource>,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        Self::with_ai(config, Box::new(FormationKeeper::default()))
    }

    pub fn with_ai(config: GameConfig, ai: Box<dyn AiInputSource>) -> Self {
        Self {
            state: MatchState::new(&config),
            config,
            control: ControlAssignment::new(),
            sessions: BTreeMap::new(),
            membership: Vec::new(),
            ai,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn control(&self) -> &ControlAssignment {
        &self.control
    }

    pub fn human_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Team the next joining session would be placed on.
    pub fn free_team(&self) -> Option<Team> {
        if self.sessions.len() >= self.config.humans_per_room {
            return None;
        }
        [Team::A, Team::B]
            .into_iter()
            .find(|team| !self.sessions.values().any(|s| s.team == *team))
    }

    /// Reserves `team` for `session`. Control is taken on the next tick.
    pub fn request_join(&mut self, session: SessionId, team: Team) -> Result<(), JoinError> {
        if self.sessions.contains_key(&session) {
            return Err(JoinError::AlreadyJoined(session));
        }
        if self.sessions.len() >= self.config.humans_per_room {
            return Err(JoinError::RoomFull);
        }
        if self.sessions.values().any(|s| s.team == team) {
            return Err(JoinError::TeamTaken(team));
        }

        info!("Session {} joined team {}", session, team);
        self.sessions.insert(session, Session::new(session, team));
        self.membership.push(Membership::Join(session, team));
        Ok(())
    }

    /// Removes `session`. Its player is vacated and any ball it held is
    /// dropped on the next tick.
    pub fn request_leave(&mut self, session: SessionId) -> bool {
        if self.sessions.remove(&session).is_none() {
            return false;
        }
        info!("Session {} left", session);
        self.membership.push(Membership::Leave(session));
        true
    }

    /// Buffers an input. Sequences already processed or already buffered are
    /// ignored.
    pub fn push_input(&mut self, session: SessionId, command: InputCommand) -> bool {
        let Some(entry) = self.sessions.get_mut(&session) else {
            return false;
        };
        if command.sequence <= entry.last_processed_input
            || entry.pending.iter().any(|c| c.sequence == command.sequence)
        {
            return false;
        }

        entry.pending.push(command.sanitized());
        entry.pending.sort_by_key(|c| c.sequence);
        true
    }

    pub fn last_processed_inputs(&self) -> BTreeMap<SessionId, u32> {
        self.sessions
            .iter()
            .map(|(id, s)| (*id, s.last_processed_input))
            .collect()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(&self.state, &self.config, self.last_processed_inputs())
    }

    /// Advances the room by one fixed step.
    pub fn step(&mut self) -> TickReport {
        self.state.tick += 1;
        let now = self.state.now_ms(&self.config);
        let dt = self.config.fixed_dt();
        let mut report = TickReport {
            tick: self.state.tick,
            ..TickReport::default()
        };

        self.apply_membership(now, &mut report);
        report.phase.extend(resolve_pauses(&mut self.state, &self.config));
        report.phase.extend(evaluate_participants(
            &mut self.state,
            self.sessions.len(),
            &self.config,
        ));

        let mut actions = self.drain_inputs();
        if !is_live(&self.state) {
            return report;
        }

        // Control changes land before any input is dispatched.
        report
            .handoffs
            .extend(self.control.follow_possession(&self.state.ball, &mut self.state.players));
        for (session, intents) in &actions {
            if intents.contains(&ActionIntent::SwitchTeammate) {
                let ball_position = self.state.ball.position;
                if let Some(target) =
                    self.control
                        .switch_to_nearest(*session, ball_position, &mut self.state.players)
                {
                    report.handoffs.push((*session, target));
                }
            }
        }

        let mut commands: BTreeMap<PlayerId, InputCommand> = BTreeMap::new();
        let mut player_actions: Vec<(PlayerId, ActionIntent)> = Vec::new();
        for player in self.state.players.values() {
            let command = match player.controlled_by.and_then(|s| self.sessions.get(&s)) {
                Some(session) => {
                    for intent in actions.remove(&session.id).unwrap_or_default() {
                        player_actions.push((player.id.clone(), intent));
                    }
                    InputCommand::moving(session.held_move)
                }
                None => {
                    let command = self.ai.command(player, &self.state, &self.config);
                    player_actions.push((player.id.clone(), command.action));
                    command
                }
            };
            commands.insert(player.id.clone(), command);
        }

        for (id, player) in self.state.players.iter_mut() {
            if let Some(command) = commands.get(id) {
                step_player(player, command, dt, &self.config);
            }
        }
        resolve_player_collisions(&mut self.state.players, &self.config);
        step_ball(&mut self.state.ball, &self.state.players, dt, &self.config);

        for (player, intent) in player_actions {
            let event = match intent {
                ActionIntent::ShootRelease { hold_duration_ms } => shoot(
                    &mut self.state.ball,
                    &self.state.players,
                    &player,
                    hold_duration_ms,
                    now,
                    &self.config,
                ),
                ActionIntent::Pass => pass(
                    &mut self.state.ball,
                    &self.state.players,
                    &player,
                    now,
                    &self.config,
                ),
                _ => None,
            };
            report.possession.extend(event);
        }

        report.possession.extend(update_possession(
            &mut self.state.ball,
            &mut self.state.players,
            now,
            dt,
            &self.config,
        ));
        for event in &report.possession {
            debug!("Tick {}: {:?}", self.state.tick, event);
        }

        report.phase.extend(evaluate_tick(&mut self.state, &self.config));
        report
    }

    fn apply_membership(&mut self, now: u64, report: &mut TickReport) {
        for change in std::mem::take(&mut self.membership) {
            match change {
                Membership::Join(session, team) => {
                    if let Some(player) = self.control.attach(session, team, &mut self.state.players) {
                        debug!("Session {} controls {}", session, player);
                        report.handoffs.push((session, player));
                    }
                }
                Membership::Leave(session) => {
                    let Some(vacated) = self.control.detach(session, &mut self.state.players)
                    else {
                        continue;
                    };
                    if self.state.ball.is_possessed_by(&vacated) {
                        report.possession.extend(drop_ball(
                            &mut self.state.ball,
                            &vacated,
                            now,
                            &self.config,
                        ));
                    }
                }
            }
        }
    }

    /// Consumes buffered inputs. The newest move vector becomes the held move;
    /// every action is returned in sequence order.
    fn drain_inputs(&mut self) -> BTreeMap<SessionId, Vec<ActionIntent>> {
        let mut actions = BTreeMap::new();
        for (id, session) in self.sessions.iter_mut() {
            let pending = std::mem::take(&mut session.pending);
            let Some(newest) = pending.last() else {
                continue;
            };
            session.held_move = newest.move_vector;
            session.last_processed_input = newest.sequence;

            let intents: Vec<ActionIntent> = pending
                .iter()
                .map(|c| c.action)
                .filter(|a| *a != ActionIntent::None)
                .collect();
            if !intents.is_empty() {
                actions.insert(*id, intents);
            }
        }
        actions
    }
}
