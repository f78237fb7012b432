//! Deterministic step functions shared by the authoritative server and the
//! predicting client.
//!
//! Every function here is pure over its arguments: no clock reads, no
//! randomness, no I/O. Given identical inputs, the server tick and the
//! client prediction produce bit-identical results.

use crate::config::GameConfig;
use crate::entity::{Ball, Player, PlayerId, Team};
use crate::input::InputCommand;
use crate::math::Vec2;
use std::collections::BTreeMap;

/// A goal whose line the ball has fully crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    /// Goal at x = 0, defended by team A.
    Left,
    /// Goal at x = field width, defended by team B.
    Right,
}

impl Goal {
    pub fn scoring_team(self) -> Team {
        match self {
            Goal::Left => Team::B,
            Goal::Right => Team::A,
        }
    }
}

/// Advances one player by `dt` seconds under `input`.
///
/// Velocity comes straight from the (sanitised) move vector; facing only
/// changes while moving so a stationary player keeps the ball in front.
pub fn step_player(player: &mut Player, input: &InputCommand, dt: f32, config: &GameConfig) {
    let input = input.sanitized();
    player.velocity = input.move_vector.scale(config.player_speed);
    if input.move_vector.length_squared() > 0.0 {
        player.facing = input.move_vector.normalize();
    }
    player.position = player.position.add(player.velocity.scale(dt));
    clamp_player(player, config);
}

/// Keeps the player's centre within `[margin, dimension - margin]` on both
/// axes, cancelling velocity into the boundary.
pub fn clamp_player(player: &mut Player, config: &GameConfig) {
    let margin = config.player_margin();
    let max_x = config.field_width - margin;
    let max_y = config.field_height - margin;

    if player.position.x < margin {
        player.position.x = margin;
        player.velocity.x = player.velocity.x.max(0.0);
    } else if player.position.x > max_x {
        player.position.x = max_x;
        player.velocity.x = player.velocity.x.min(0.0);
    }

    if player.position.y < margin {
        player.position.y = margin;
        player.velocity.y = player.velocity.y.max(0.0);
    } else if player.position.y > max_y {
        player.position.y = max_y;
        player.velocity.y = player.velocity.y.min(0.0);
    }
}

/// Pushes two overlapping players apart along the line between their centres.
///
/// Returns true if they overlapped.
pub fn separate_players(a: &mut Player, b: &mut Player, config: &GameConfig) -> bool {
    let min_distance = config.player_radius * 2.0;
    let delta = b.position.sub(a.position);
    let distance = delta.length();

    if distance >= min_distance {
        return false;
    }

    // Coincident centres: split along x, lower id to the left.
    let normal = if distance < 0.001 {
        Vec2::new(1.0, 0.0)
    } else {
        delta.scale(1.0 / distance)
    };

    let push = (min_distance - distance) / 2.0;
    a.position = a.position.sub(normal.scale(push));
    b.position = b.position.add(normal.scale(push));

    clamp_player(a, config);
    clamp_player(b, config);
    true
}

/// Separates every overlapping pair once, in id order.
pub fn resolve_player_collisions(players: &mut BTreeMap<PlayerId, Player>, config: &GameConfig) {
    let ids: Vec<PlayerId> = players.keys().cloned().collect();

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let (Some(mut a), Some(mut b)) =
                (players.get(&ids[i]).cloned(), players.get(&ids[j]).cloned())
            else {
                continue;
            };

            if separate_players(&mut a, &mut b, config) {
                players.insert(ids[i].clone(), a);
                players.insert(ids[j].clone(), b);
            }
        }
    }
}

/// Advances the ball by `dt` seconds.
///
/// A possessed ball is pinned in front of its holder; a free ball flies,
/// slows down and bounces off the walls. A possessor id that no longer
/// names a player frees the ball.
pub fn step_ball(
    ball: &mut Ball,
    players: &BTreeMap<PlayerId, Player>,
    dt: f32,
    config: &GameConfig,
) {
    if let Some(holder) = ball.possessed_by.as_ref() {
        match players.get(holder) {
            Some(possessor) => {
                pin_ball(ball, possessor, config);
                return;
            }
            None => {
                ball.possessed_by = None;
                ball.pressure.clear();
            }
        }
    }

    let previous = ball.position;
    ball.position = ball.position.add(ball.velocity.scale(dt));

    let damping = (1.0 - config.ball_damping * dt).max(0.0);
    ball.velocity = ball.velocity.scale(damping);
    if ball.velocity.length() < config.ball_rest_speed {
        ball.velocity = Vec2::ZERO;
    }

    contain_ball(ball, previous, config);
}

/// Places the ball at the possessor's fixed dribbling offset.
pub fn pin_ball(ball: &mut Ball, possessor: &Player, config: &GameConfig) {
    let r = config.ball_radius;
    let target = possessor
        .position
        .add(possessor.facing.scale(config.possession_offset));

    ball.position = Vec2::new(
        target.x.clamp(r, config.field_width - r),
        target.y.clamp(r, config.field_height - r),
    );
    ball.velocity = possessor.velocity;
}

/// Height at which the segment `from -> to` crosses a goal line, if it
/// leaves the field through one this step.
fn goal_line_crossing(from: Vec2, to: Vec2, width: f32) -> Option<f32> {
    let line_x = if from.x >= 0.0 && to.x < 0.0 {
        0.0
    } else if from.x <= width && to.x > width {
        width
    } else {
        return None;
    };

    let t = (line_x - from.x) / (to.x - from.x);
    Some(from.y + (to.y - from.y) * t)
}

fn contain_ball(ball: &mut Ball, previous: Vec2, config: &GameConfig) {
    let r = config.ball_radius;
    let width = config.field_width;
    let height = config.field_height;
    let (mouth_top, mouth_bottom) = config.goal_mouth();
    let restitution = config.ball_restitution;
    let fits_mouth = |y: f32| y - r >= mouth_top && y + r <= mouth_bottom;

    // The ball enters the net only through the mouth, judged where its path
    // meets the goal line rather than where it ends up.
    let crossing = goal_line_crossing(previous, ball.position, width);
    let in_net = match crossing {
        Some(y) => fits_mouth(y),
        None => previous.x < 0.0 || previous.x > width,
    };
    if in_net {
        // Inside the net: side netting and back of the net absorb the ball.
        let min_y = mouth_top + r;
        let max_y = mouth_bottom - r;
        if ball.position.y < min_y || ball.position.y > max_y {
            ball.position.y = ball.position.y.clamp(min_y, max_y);
            ball.velocity.y = 0.0;
        }

        let back_left = -config.goal_depth + r;
        let back_right = width + config.goal_depth - r;
        if ball.position.x < back_left || ball.position.x > back_right {
            ball.position.x = ball.position.x.clamp(back_left, back_right);
            ball.velocity = Vec2::ZERO;
        }
        return;
    }

    if ball.position.y < r {
        ball.position.y = r;
        ball.velocity.y = ball.velocity.y.abs() * restitution;
    } else if ball.position.y > height - r {
        ball.position.y = height - r;
        ball.velocity.y = -ball.velocity.y.abs() * restitution;
    }

    if crossing.is_none() && fits_mouth(ball.position.y) {
        return;
    }

    if ball.position.x < r {
        ball.position.x = r;
        ball.velocity.x = ball.velocity.x.abs() * restitution;
    } else if ball.position.x > width - r {
        ball.position.x = width - r;
        ball.velocity.x = -ball.velocity.x.abs() * restitution;
    }
}

/// Returns the goal the ball has fully crossed, if any.
pub fn resolve_goal(ball: &Ball, config: &GameConfig) -> Option<Goal> {
    let r = config.ball_radius;
    let (mouth_top, mouth_bottom) = config.goal_mouth();

    if ball.position.y < mouth_top || ball.position.y > mouth_bottom {
        return None;
    }

    if ball.position.x + r < 0.0 {
        Some(Goal::Left)
    } else if ball.position.x - r > config.field_width {
        Some(Goal::Right)
    } else {
        None
    }
}

/// Exit speed of a shot charged for `hold_duration_ms`.
///
/// Scales linearly from `min_shoot_speed` to `shoot_speed`, saturating at
/// `max_shoot_hold_ms`.
pub fn shot_speed(hold_duration_ms: u32, config: &GameConfig) -> f32 {
    let charge = (hold_duration_ms as f32 / config.max_shoot_hold_ms as f32).clamp(0.0, 1.0);
    config.min_shoot_speed + (config.shoot_speed - config.min_shoot_speed) * charge
}
