//! Match phase state machine: waiting → playing → ended → waiting.
//!
//! Evaluation order within one tick is fixed: pauses are resolved first,
//! then participant count, then (after movement) goal detection and only
//! then the match timer. A goal on the final tick therefore always counts,
//! and the match ends once the post-goal pause is over.

use log::info;
use shared::{resolve_goal, Ball, GameConfig, MatchPhase, MatchState, Team, Vec2};

#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
    MatchStarted,
    GoalScored {
        team: Team,
        score_a: u32,
        score_b: u32,
    },
    KickoffRestored,
    MatchEnded {
        score_a: u32,
        score_b: u32,
    },
    MatchReset,
    ReturnedToWaiting,
}

/// Whether this tick moves players and ball.
pub fn is_live(state: &MatchState) -> bool {
    state.phase != MatchPhase::Ended && !state.is_frozen()
}

/// Ends a post-goal freeze or a post-match pause whose time has come.
pub fn resolve_pauses(state: &mut MatchState, config: &GameConfig) -> Vec<PhaseEvent> {
    let now = state.now_ms(config);
    let mut events = Vec::new();

    match state.phase {
        MatchPhase::Playing => {
            if state.kickoff_at_ms.map_or(false, |at| now >= at) {
                state.reset_kickoff(config);
                events.push(PhaseEvent::KickoffRestored);

                if state.match_ticks_remaining == 0 {
                    events.push(end_match(state, config));
                }
            }
        }
        MatchPhase::Ended => {
            if state.reset_at_ms.map_or(false, |at| now >= at) {
                state.reset_match(config);
                state.phase = MatchPhase::Waiting;
                info!("Match reset, waiting for players");
                events.push(PhaseEvent::MatchReset);
            }
        }
        MatchPhase::Waiting => {}
    }

    events
}

/// Starts or abandons play when the human head-count crosses the minimum.
pub fn evaluate_participants(
    state: &mut MatchState,
    humans: usize,
    config: &GameConfig,
) -> Option<PhaseEvent> {
    match state.phase {
        MatchPhase::Waiting if humans >= config.min_participants => {
            state.reset_match(config);
            state.phase = MatchPhase::Playing;
            info!("Match started with {} players", humans);
            Some(PhaseEvent::MatchStarted)
        }
        MatchPhase::Playing if humans < config.min_participants => {
            state.reset_match(config);
            state.phase = MatchPhase::Waiting;
            info!("Match abandoned: {} players left", humans);
            Some(PhaseEvent::ReturnedToWaiting)
        }
        _ => None,
    }
}

/// Goal detection, then the match timer. Call once per live tick after the
/// ball has moved.
pub fn evaluate_tick(state: &mut MatchState, config: &GameConfig) -> Vec<PhaseEvent> {
    let now = state.now_ms(config);
    let mut events = Vec::new();

    if let Some(goal) = resolve_goal(&state.ball, config) {
        match state.phase {
            MatchPhase::Playing => {
                let team = goal.scoring_team();
                state.add_goal(team);
                freeze(state);
                state.kickoff_at_ms = Some(now + config.goal_pause_ms);
                info!(
                    "Goal for team {}! Score {}-{}",
                    team, state.score_a, state.score_b
                );
                events.push(PhaseEvent::GoalScored {
                    team,
                    score_a: state.score_a,
                    score_b: state.score_b,
                });
            }
            // Warm-up goals don't count; the ball just comes back.
            _ => state.ball = Ball::at(config.field_center()),
        }
    }

    if state.phase == MatchPhase::Playing {
        state.match_ticks_remaining = state.match_ticks_remaining.saturating_sub(1);
        if state.match_ticks_remaining == 0 && !state.is_frozen() {
            events.push(end_match(state, config));
        }
    }

    events
}

fn freeze(state: &mut MatchState) {
    state.ball.velocity = Vec2::ZERO;
    for player in state.players.values_mut() {
        player.velocity = Vec2::ZERO;
    }
}

fn end_match(state: &mut MatchState, config: &GameConfig) -> PhaseEvent {
    let now = state.now_ms(config);
    freeze(state);
    state.phase = MatchPhase::Ended;
    state.kickoff_at_ms = None;
    state.reset_at_ms = Some(now + config.post_match_pause_ms);
    info!("Match ended {}-{}", state.score_a, state.score_b);
    PhaseEvent::MatchEnded {
        score_a: state.score_a,
        score_b: state.score_b,
    }
}
