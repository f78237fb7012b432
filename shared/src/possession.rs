//! Ball possession and pressure contest.
//!
//! The ball is either free or held by exactly one player. Opponents near the
//! holder build pressure; enough pressure steals the ball. Two lockouts keep
//! possession from flickering between players standing on the same spot:
//!
//! * the ball's capture lockout, started on every capture, steal and release:
//!   no steal may happen before it expires, and the player who released the
//!   ball cannot collect it again before it expires;
//! * a player's loss lockout, started when the ball is stolen from them:
//!   they cannot collect the ball before it expires.
//!
//! All times are simulation milliseconds. A transition at exactly the lockout
//! timestamp is allowed; strictly before it is not.

use crate::config::GameConfig;
use crate::entity::{Ball, Player, PlayerId, Team};
use crate::math::Vec2;
use crate::physics::{pin_ball, shot_speed};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum PossessionEvent {
    Captured { player: PlayerId },
    Stolen { from: PlayerId, by: PlayerId },
    Released { by: PlayerId, speed: f32 },
    Dropped { by: PlayerId },
}

/// Runs one tick of the possession state machine.
///
/// A free ball is captured by the nearest eligible player inside the
/// possession radius. A held ball accrues or decays opponent pressure and
/// may change hands.
pub fn update_possession(
    ball: &mut Ball,
    players: &mut BTreeMap<PlayerId, Player>,
    now_ms: u64,
    dt: f32,
    config: &GameConfig,
) -> Option<PossessionEvent> {
    match ball.possessed_by.clone() {
        None => try_capture(ball, players, now_ms, config),
        Some(holder) => {
            let Some(holder_team) = players.get(&holder).map(|p| p.team) else {
                ball.possessed_by = None;
                ball.pressure.clear();
                return Some(PossessionEvent::Dropped { by: holder });
            };

            accrue_pressure(ball, players, holder_team, dt, config);
            try_steal(ball, players, &holder, now_ms, config)
        }
    }
}

/// Whether `player` may collect the free ball at `now_ms`, ignoring distance.
pub fn can_capture(ball: &Ball, player: &Player, now_ms: u64) -> bool {
    if now_ms < player.loss_lockout_until {
        return false;
    }
    let is_releaser = ball.released_by.as_deref() == Some(player.id.as_str());
    !(is_releaser && now_ms < ball.capture_lockout_until)
}

fn try_capture(
    ball: &mut Ball,
    players: &BTreeMap<PlayerId, Player>,
    now_ms: u64,
    config: &GameConfig,
) -> Option<PossessionEvent> {
    // A ball behind a goal line is dead until the goal is evaluated.
    if ball.position.x < 0.0 || ball.position.x > config.field_width {
        return None;
    }

    let mut best: Option<(&Player, f32)> = None;

    for player in players.values() {
        let distance = player.position.distance(ball.position);
        if distance > config.possession_radius || !can_capture(ball, player, now_ms) {
            continue;
        }
        // Strict comparison: on a tie the lower id (iterated first) wins.
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((player, distance));
        }
    }

    let (player, _) = best?;
    ball.possessed_by = Some(player.id.clone());
    ball.capture_lockout_until = now_ms + config.capture_lockout_ms;
    ball.released_by = None;
    ball.pressure.clear();
    pin_ball(ball, player, config);

    Some(PossessionEvent::Captured {
        player: player.id.clone(),
    })
}

fn accrue_pressure(
    ball: &mut Ball,
    players: &BTreeMap<PlayerId, Player>,
    holder_team: Team,
    dt: f32,
    config: &GameConfig,
) {
    ball.pressure
        .retain(|id, _| players.get(id).map_or(false, |p| p.team != holder_team));

    for opponent in players.values().filter(|p| p.team != holder_team) {
        let in_range = opponent.position.distance(ball.position) <= config.pressure_radius;
        if in_range {
            *ball.pressure.entry(opponent.id.clone()).or_insert(0.0) +=
                config.pressure_buildup_rate * dt;
        } else if let Some(value) = ball.pressure.get_mut(&opponent.id) {
            *value = (*value - config.pressure_decay_rate * dt).max(0.0);
        }
    }

    ball.pressure.retain(|_, value| *value > 0.0);
}

fn try_steal(
    ball: &mut Ball,
    players: &mut BTreeMap<PlayerId, Player>,
    holder: &str,
    now_ms: u64,
    config: &GameConfig,
) -> Option<PossessionEvent> {
    if now_ms < ball.capture_lockout_until {
        return None;
    }

    let mut best: Option<(&PlayerId, f32)> = None;
    for (id, &value) in &ball.pressure {
        if value < config.steal_threshold {
            continue;
        }
        let in_range = players
            .get(id)
            .map_or(false, |p| p.position.distance(ball.position) <= config.pressure_radius);
        if in_range && best.map_or(true, |(_, v)| value > v) {
            best = Some((id, value));
        }
    }

    let thief = best?.0.clone();

    if let Some(former) = players.get_mut(holder) {
        former.loss_lockout_until = now_ms + config.loss_lockout_ms;
    }
    ball.possessed_by = Some(thief.clone());
    ball.capture_lockout_until = now_ms + config.capture_lockout_ms;
    ball.released_by = None;
    ball.pressure.clear();
    if let Some(new_holder) = players.get(&thief) {
        pin_ball(ball, new_holder, config);
    }

    Some(PossessionEvent::Stolen {
        from: holder.to_string(),
        by: thief,
    })
}

/// Frees the ball from `releaser` with the given velocity.
///
/// Starts the capture lockout so the releaser cannot immediately collect
/// their own shot. Returns false if `releaser` does not hold the ball.
pub fn release_ball(
    ball: &mut Ball,
    releaser: &str,
    velocity: Vec2,
    now_ms: u64,
    config: &GameConfig,
) -> bool {
    if !ball.is_possessed_by(releaser) {
        return false;
    }
    ball.possessed_by = None;
    ball.velocity = velocity;
    ball.pressure.clear();
    ball.released_by = Some(releaser.to_string());
    ball.capture_lockout_until = now_ms + config.capture_lockout_ms;
    true
}

/// Shoots along the shooter's facing with a hold-scaled speed.
pub fn shoot(
    ball: &mut Ball,
    players: &BTreeMap<PlayerId, Player>,
    shooter: &str,
    hold_duration_ms: u32,
    now_ms: u64,
    config: &GameConfig,
) -> Option<PossessionEvent> {
    let facing = players.get(shooter)?.facing;
    let speed = shot_speed(hold_duration_ms, config);

    release_ball(ball, shooter, facing.scale(speed), now_ms, config).then(|| {
        PossessionEvent::Released {
            by: shooter.to_string(),
            speed,
        }
    })
}

/// Passes to the nearest teammate, or straight ahead without one.
pub fn pass(
    ball: &mut Ball,
    players: &BTreeMap<PlayerId, Player>,
    passer: &str,
    now_ms: u64,
    config: &GameConfig,
) -> Option<PossessionEvent> {
    let from = players.get(passer)?;

    let target = players
        .values()
        .filter(|p| p.team == from.team && p.id != from.id)
        .min_by(|a, b| {
            let da = a.position.distance(ball.position);
            let db = b.position.distance(ball.position);
            da.total_cmp(&db)
        });

    let direction = match target {
        Some(mate) => {
            let towards = mate.position.sub(ball.position).normalize();
            if towards == Vec2::ZERO {
                from.facing
            } else {
                towards
            }
        }
        None => from.facing,
    };

    let speed = config.pass_speed;
    release_ball(ball, passer, direction.scale(speed), now_ms, config).then(|| {
        PossessionEvent::Released {
            by: passer.to_string(),
            speed,
        }
    })
}

/// Frees the ball immediately because its holder left the match.
///
/// The ball stops where it is. Only the normal re-pickup bar applies, so the
/// vacated player cannot snatch it back before the capture lockout expires.
pub fn drop_ball(
    ball: &mut Ball,
    player: &str,
    now_ms: u64,
    config: &GameConfig,
) -> Option<PossessionEvent> {
    release_ball(ball, player, Vec2::ZERO, now_ms, config).then(|| PossessionEvent::Dropped {
        by: player.to_string(),
    })
}
