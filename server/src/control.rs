//! Which human session drives which player.
//!
//! Each human session controls exactly one player of its team; every other
//! player is driven by the AI input source. All changes go through
//! [`ControlAssignment::assign`], which moves the session's single
//! controlled-player entry and the players' `controlled_by`/`is_human` flags
//! together, so no player is ever driven by two controllers in one tick.

use log::debug;
use shared::{Ball, Player, PlayerId, Role, SessionId, Team, Vec2};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct ControlAssignment {
    controlled: BTreeMap<SessionId, PlayerId>,
    teams: BTreeMap<SessionId, Team>,
    last_possessor: Option<PlayerId>,
}

impl ControlAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of human sessions currently in control of a player.
    pub fn len(&self) -> usize {
        self.controlled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controlled.is_empty()
    }

    pub fn controlled(&self, session: SessionId) -> Option<&PlayerId> {
        self.controlled.get(&session)
    }

    pub fn controller_of(&self, player: &str) -> Option<SessionId> {
        self.controlled
            .iter()
            .find(|(_, id)| id.as_str() == player)
            .map(|(session, _)| *session)
    }

    pub fn team_has_human(&self, team: Team) -> bool {
        self.teams.values().any(|t| *t == team)
    }

    /// Gives `session` control of its team's forward, or of any free
    /// teammate if the forward is taken.
    pub fn attach(
        &mut self,
        session: SessionId,
        team: Team,
        players: &mut BTreeMap<PlayerId, Player>,
    ) -> Option<PlayerId> {
        let target = players
            .values()
            .filter(|p| p.team == team && p.controlled_by.is_none())
            .min_by_key(|p| (p.role != Role::Forward, p.id.clone()))
            .map(|p| p.id.clone())?;

        self.teams.insert(session, team);
        self.assign(session, &target, players);
        Some(target)
    }

    /// Releases everything `session` controls. Returns the vacated player.
    pub fn detach(
        &mut self,
        session: SessionId,
        players: &mut BTreeMap<PlayerId, Player>,
    ) -> Option<PlayerId> {
        self.teams.remove(&session);
        let vacated = self.controlled.remove(&session)?;
        if let Some(player) = players.get_mut(&vacated) {
            player.controlled_by = None;
            player.is_human = false;
        }
        Some(vacated)
    }

    /// Moves `session`'s control to `player_id` as one swap.
    fn assign(
        &mut self,
        session: SessionId,
        player_id: &str,
        players: &mut BTreeMap<PlayerId, Player>,
    ) {
        if let Some(previous) = self.controlled.insert(session, player_id.to_string()) {
            if let Some(player) = players.get_mut(&previous) {
                player.controlled_by = None;
                player.is_human = false;
            }
        }
        if let Some(player) = players.get_mut(player_id) {
            player.controlled_by = Some(session);
            player.is_human = true;
        }
    }

    /// Hands control to the teammate closest to the ball, excluding the one
    /// `session` already drives.
    pub fn switch_to_nearest(
        &mut self,
        session: SessionId,
        ball_position: Vec2,
        players: &mut BTreeMap<PlayerId, Player>,
    ) -> Option<PlayerId> {
        let team = *self.teams.get(&session)?;
        let current = self.controlled.get(&session).cloned();

        let target = players
            .values()
            .filter(|p| p.team == team && Some(&p.id) != current.as_ref())
            .filter(|p| p.controlled_by.is_none())
            .min_by(|a, b| {
                let da = a.position.distance(ball_position);
                let db = b.position.distance(ball_position);
                da.total_cmp(&db)
            })
            .map(|p| p.id.clone())?;

        debug!("Session {} switched to {}", session, target);
        self.assign(session, &target, players);
        Some(target)
    }

    /// When a new player gains the ball and its team has a human driving
    /// someone else, control follows the ball.
    ///
    /// Only fires on a change of possessor, so a human who deliberately
    /// switches away from the ball carrier keeps their choice.
    pub fn follow_possession(
        &mut self,
        ball: &Ball,
        players: &mut BTreeMap<PlayerId, Player>,
    ) -> Option<(SessionId, PlayerId)> {
        if ball.possessed_by == self.last_possessor {
            return None;
        }
        self.last_possessor = ball.possessed_by.clone();

        let possessor = players.get(ball.possessed_by.as_ref()?)?;
        if possessor.controlled_by.is_some() {
            return None;
        }

        let team = possessor.team;
        let possessor_id = possessor.id.clone();
        let session = self
            .teams
            .iter()
            .find(|(_, t)| **t == team)
            .map(|(session, _)| *session)?;

        debug!("Control of session {} follows the ball to {}", session, possessor_id);
        self.assign(session, &possessor_id, players);
        Some((session, possessor_id))
    }
}
