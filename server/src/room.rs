//! One match room: a fixed-timestep accumulator around [`GameState`].
//!
//! Every room runs in its own tokio task and shares no mutable state with
//! other rooms. The router talks to it through [`RoomCommand`]s and hears
//! back through [`RoomEvent`]s.

use crate::game::{GameState, TickReport};
use log::{debug, info, warn};
use shared::{Clock, GameConfig, InputCommand, SessionId, StateSnapshot, Team};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Catch-up limit per wall-clock update.
pub const MAX_STEPS_PER_UPDATE: u32 = 5;

#[derive(Debug)]
pub enum RoomCommand {
    Join {
        client_id: SessionId,
        team: Team,
    },
    Leave {
        client_id: SessionId,
    },
    Input {
        client_id: SessionId,
        command: InputCommand,
    },
}

#[derive(Debug)]
pub enum RoomEvent {
    Snapshot {
        room_id: u32,
        recipients: Vec<SessionId>,
        snapshot: StateSnapshot,
    },
    Closed {
        room_id: u32,
    },
}

#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub steps: u32,
    /// Backlog discarded because the catch-up limit was hit.
    pub dropped: Duration,
    pub reports: Vec<TickReport>,
    pub snapshot: Option<StateSnapshot>,
}

pub struct Room {
    id: u32,
    game: GameState,
    clock: Arc<dyn Clock>,
    accumulator: Duration,
    last_update: Duration,
    had_participants: bool,
}

impl Room {
    pub fn new(id: u32, config: GameConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_game(id, GameState::new(config), clock)
    }

    pub fn with_game(id: u32, game: GameState, clock: Arc<dyn Clock>) -> Self {
        let last_update = clock.now();
        Self {
            id,
            game,
            clock,
            accumulator: Duration::ZERO,
            last_update,
            had_participants: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameState {
        &mut self.game
    }

    /// Time carried over to the next update.
    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    /// True once every human that ever joined has left again.
    pub fn is_finished(&self) -> bool {
        self.had_participants && self.game.human_count() == 0
    }

    pub fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join { client_id, team } => {
                match self.game.request_join(client_id, team) {
                    Ok(()) => self.had_participants = true,
                    Err(e) => warn!("Room {}: join of {} rejected: {}", self.id, client_id, e),
                }
            }
            RoomCommand::Leave { client_id } => {
                self.game.request_leave(client_id);
            }
            RoomCommand::Input { client_id, command } => {
                if !self.game.push_input(client_id, command) {
                    debug!("Room {}: ignored input from {}", self.id, client_id);
                }
            }
        }
    }

    /// Feeds elapsed clock time into the accumulator and runs as many fixed
    /// steps as it covers, at most [`MAX_STEPS_PER_UPDATE`].
    ///
    /// Whole steps beyond the limit are discarded; the sub-step remainder is
    /// always kept.
    pub fn update(&mut self) -> UpdateOutcome {
        let now = self.clock.now();
        self.accumulator += now.saturating_sub(self.last_update);
        self.last_update = now;

        let dt = self.game.config().tick_duration();
        let mut outcome = UpdateOutcome::default();

        while self.accumulator >= dt && outcome.steps < MAX_STEPS_PER_UPDATE {
            outcome.reports.push(self.game.step());
            self.accumulator -= dt;
            outcome.steps += 1;
        }

        if self.accumulator >= dt {
            let backlog = (self.accumulator.as_nanos() / dt.as_nanos()) as u32;
            outcome.dropped = dt * backlog;
            self.accumulator -= outcome.dropped;
            warn!(
                "Room {} fell behind: dropped {} steps ({:?})",
                self.id, backlog, outcome.dropped
            );
        }

        let every = self.game.config().broadcast_interval_ticks();
        if outcome.reports.iter().any(|r| r.tick % every == 0) {
            outcome.snapshot = Some(self.game.snapshot());
        }

        outcome
    }

    /// Drives the room until its last human leaves or the router goes away.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<RoomCommand>,
        events: mpsc::UnboundedSender<RoomEvent>,
    ) {
        let mut ticker = interval(self.game.config().tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Room {} opened", self.id);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => break,
                    }
                },

                _ = ticker.tick() => {
                    let outcome = self.update();
                    if let Some(snapshot) = outcome.snapshot {
                        let event = RoomEvent::Snapshot {
                            room_id: self.id,
                            recipients: self.game.session_ids(),
                            snapshot,
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }

                    if self.game.state.tick % 600 == 0 && outcome.steps > 0 {
                        debug!(
                            "Room {} tick {}: {} humans, phase {:?}",
                            self.id,
                            self.game.state.tick,
                            self.game.human_count(),
                            self.game.state.phase
                        );
                    }

                    if self.is_finished() {
                        break;
                    }
                },
            }
        }

        info!("Room {} closed", self.id);
        let _ = events.send(RoomEvent::Closed { room_id: self.id });
    }
}
