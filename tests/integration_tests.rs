//! Integration tests for the match simulation and its netcode
//!
//! These tests drive the shared physics, the authoritative room and the
//! predicting client together, and exercise real UDP traffic.

use assert_approx_eq::assert_approx_eq;
use bincode::serialize;
use server::bots::AiInputSource;
use server::game::GameState;
use server::match_phase::PhaseEvent;
use shared::{
    ActionIntent, GameConfig, InputCommand, MatchPhase, MatchState, Player, PossessionEvent,
    SessionId, Team, Vec2,
};
use std::time::Duration;

/// Moves every bot straight at the ball and shoots whenever it has held the
/// ball for a while.
struct Chaser;

impl AiInputSource for Chaser {
    fn command(&mut self, player: &Player, state: &MatchState, _config: &GameConfig) -> InputCommand {
        let command = InputCommand::moving(state.ball.position.sub(player.position).normalize());
        if state.ball.is_possessed_by(&player.id) && state.tick % 40 == 0 {
            command.with_action(ActionIntent::ShootRelease {
                hold_duration_ms: 400,
            })
        } else {
            command
        }
    }
}

/// Room with both humans joined and the match already started.
fn started_game(mut game: GameState) -> GameState {
    game.request_join(1, Team::A).unwrap();
    game.request_join(2, Team::B).unwrap();
    let report = game.step();
    assert!(report.phase.contains(&PhaseEvent::MatchStarted));
    game
}

/// Pushes a chase-the-ball input for every human session.
fn chase_inputs(game: &mut GameState, sequence: u32) {
    for session in game.session_ids() {
        let Some(id) = game.control().controlled(session).cloned() else {
            continue;
        };
        let player = &game.state.players[&id];
        let mut command = InputCommand {
            sequence,
            ..InputCommand::moving(game.state.ball.position.sub(player.position).normalize())
        };
        if sequence % 40 == 0 {
            command.action = ActionIntent::ShootRelease {
                hold_duration_ms: 600,
            };
        }
        game.push_input(session, command);
    }
}

/// SCENARIOS FROM THE GAMEPLAY RULES
mod scenario_tests {
    use super::*;
    use server::room::{Room, RoomCommand};
    use shared::physics::{step_ball, step_player};
    use shared::possession::shoot;
    use shared::{shot_speed, update_possession, Ball, ManualClock, Role};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// A player running onto a resting ball collects it once in range
    #[test]
    fn player_collects_stationary_ball() {
        let config = GameConfig::default();
        let dt = config.fixed_dt();
        let mut ball = Ball::at(Vec2::new(1000.0, 540.0));
        let mut players = BTreeMap::new();
        players.insert(
            "A-forward".to_string(),
            Player::new("A-forward", Team::A, Role::Forward, Vec2::new(1200.0, 540.0)),
        );
        let left = InputCommand::moving(Vec2::new(-1.0, 0.0));

        let mut captured_at = None;
        for tick in 1..=120u64 {
            if let Some(player) = players.get_mut("A-forward") {
                step_player(player, &left, dt, &config);
            }
            step_ball(&mut ball, &players, dt, &config);
            let event = update_possession(
                &mut ball,
                &mut players,
                config.tick_to_ms(tick),
                dt,
                &config,
            );
            if event.is_some() {
                captured_at = Some(tick);
                break;
            }
        }

        assert_eq!(ball.possessed_by.as_deref(), Some("A-forward"));
        let distance = players["A-forward"].position.distance(Vec2::new(1000.0, 540.0));
        assert!(distance <= config.possession_radius);
        // 150 px to close at 400 px/s.
        assert!(captured_at.unwrap() >= 22);
    }

    /// Shot speed scales with the charge and saturates at full hold
    #[test]
    fn shot_speed_follows_hold_duration() {
        let config = GameConfig::default();

        assert_approx_eq!(shot_speed(750, &config), 1400.0);
        assert_approx_eq!(shot_speed(1500, &config), 2000.0);
        assert_approx_eq!(shot_speed(5000, &config), 2000.0);

        let mut players = BTreeMap::new();
        let shooter = Player::new("A-forward", Team::A, Role::Forward, Vec2::new(800.0, 540.0));
        players.insert(shooter.id.clone(), shooter);
        let mut ball = Ball::at(Vec2::new(840.0, 540.0));
        ball.possessed_by = Some("A-forward".to_string());

        let event = shoot(&mut ball, &players, "A-forward", 750, 1000, &config);

        assert!(matches!(event, Some(PossessionEvent::Released { .. })));
        assert!(ball.is_free());
        assert_approx_eq!(ball.velocity.length(), 1400.0, 1e-2);
    }

    /// A goal scores, freezes play and restores the kickoff after the pause
    #[test]
    fn goal_then_kickoff_restore() {
        let mut game = started_game(GameState::new(GameConfig::default()));
        let config = game.config().clone();

        game.state.ball = Ball::at(Vec2::new(config.field_width + 20.0, 540.0));
        let report = game.step();
        assert!(report.phase.iter().any(|e| matches!(
            e,
            PhaseEvent::GoalScored {
                team: Team::A,
                ..
            }
        )));
        assert_eq!((game.state.score_a, game.state.score_b), (1, 0));

        let mut frozen_ticks = 0;
        while game.state.is_frozen() {
            game.step();
            frozen_ticks += 1;
            assert!(frozen_ticks < 200, "kickoff never restored");
        }

        // 2000 ms at 60 Hz.
        assert!(frozen_ticks >= 119);
        assert_eq!(game.state.ball.position, config.field_center());
        assert_eq!(game.state.phase, MatchPhase::Playing);
        assert_eq!(game.state.score_a, 1);
    }

    /// A goal on the last tick counts, and the match ends after the pause
    #[test]
    fn goal_on_final_tick_ends_after_pause() {
        let mut game = started_game(GameState::new(GameConfig::default()));
        let config = game.config().clone();

        game.state.match_ticks_remaining = 1;
        game.state.ball = Ball::at(Vec2::new(-20.0, 540.0));
        game.step();

        assert_eq!((game.state.score_a, game.state.score_b), (0, 1));
        assert_eq!(game.state.phase, MatchPhase::Playing);

        let mut ended = false;
        for _ in 0..200 {
            let report = game.step();
            if report
                .phase
                .iter()
                .any(|e| matches!(e, PhaseEvent::MatchEnded { score_a: 0, score_b: 1 }))
            {
                ended = true;
                break;
            }
        }

        assert!(ended);
        assert_eq!(game.state.phase, MatchPhase::Ended);
        assert_eq!(game.state.ball.position, config.field_center());
    }

    /// A shot that leaves the field beside the posts in a single tick
    /// bounces back instead of counting
    #[test]
    fn fast_shot_beside_goal_is_not_a_goal() {
        let mut game = started_game(GameState::new(GameConfig::default()));
        let config = game.config().clone();

        game.state.ball = Ball::at(Vec2::new(16.0, 100.0));
        game.state.ball.velocity = Vec2::new(-2000.0, 0.0);
        let report = game.step();

        assert!(!report
            .phase
            .iter()
            .any(|e| matches!(e, PhaseEvent::GoalScored { .. })));
        assert_eq!((game.state.score_a, game.state.score_b), (0, 0));
        assert_eq!(game.state.ball.position.x, config.ball_radius);
        assert!(!game.state.is_frozen());

        game.state.ball = Ball::at(Vec2::new(config.field_width - 16.0, 1000.0));
        game.state.ball.velocity = Vec2::new(2000.0, 0.0);
        game.step();

        assert_eq!((game.state.score_a, game.state.score_b), (0, 0));
        assert_eq!(
            game.state.ball.position.x,
            config.field_width - config.ball_radius
        );
    }

    /// A defender standing on the line cannot collect a ball that is
    /// already over it
    #[test]
    fn ball_over_line_is_not_collected() {
        let mut game = started_game(GameState::new(GameConfig::default()));

        if let Some(defender) = game.state.players.get_mut("A-defender") {
            defender.position = Vec2::new(30.0, 540.0);
        }
        game.state.ball = Ball::at(Vec2::new(-17.0, 540.0));
        game.state.ball.velocity = Vec2::new(-100.0, 0.0);
        let report = game.step();

        assert!(report.possession.is_empty());
        assert!(report.phase.iter().any(|e| matches!(
            e,
            PhaseEvent::GoalScored {
                team: Team::B,
                ..
            }
        )));
        assert_eq!((game.state.score_a, game.state.score_b), (0, 1));
        assert!(game.state.ball.is_free());
    }

    /// A holder who disconnects loses the ball on the next tick
    #[test]
    fn disconnect_frees_held_ball() {
        let clock = Arc::new(ManualClock::new());
        let mut room = Room::new(1, GameConfig::default(), clock.clone());
        let dt = room.game().config().tick_duration();

        room.handle(RoomCommand::Join {
            client_id: 1,
            team: Team::A,
        });
        room.handle(RoomCommand::Join {
            client_id: 2,
            team: Team::B,
        });
        clock.advance(dt);
        room.update();
        assert_eq!(room.game().state.phase, MatchPhase::Playing);

        room.game_mut().state.ball = Ball::at(Vec2::new(830.0, 540.0));
        clock.advance(dt);
        room.update();
        assert_eq!(
            room.game().state.ball.possessed_by.as_deref(),
            Some("A-forward")
        );

        room.handle(RoomCommand::Leave { client_id: 1 });
        clock.advance(dt);
        let outcome = room.update();

        assert_eq!(outcome.steps, 1);
        assert!(room.game().state.ball.is_free());
        assert!(!room.game().state.players["A-forward"].is_human);
    }
}

/// PROPERTIES THAT MUST HOLD ON EVERY TICK
mod property_tests {
    use super::*;

    fn scripted_input(sequence: u32, session: SessionId) -> InputCommand {
        let t = sequence as f32 * 0.05;
        let move_vector = match session {
            1 => Vec2::new(t.cos(), (t * 0.7).sin()),
            _ => Vec2::new(-(t * 1.3).sin(), t.cos()),
        };
        let action = match (session, sequence % 50, sequence % 70) {
            (1, 0, _) => ActionIntent::ShootRelease {
                hold_duration_ms: 500,
            },
            (2, _, 0) => ActionIntent::Pass,
            (_, 25, _) => ActionIntent::SwitchTeammate,
            _ => ActionIntent::None,
        };
        InputCommand {
            sequence,
            timestamp: sequence as u64 * 16,
            move_vector,
            action,
        }
    }

    /// Identical inputs produce byte-identical snapshots
    #[test]
    fn simulation_is_deterministic() {
        let mut first = started_game(GameState::with_ai(GameConfig::default(), Box::new(Chaser)));
        let mut second = started_game(GameState::with_ai(GameConfig::default(), Box::new(Chaser)));

        for sequence in 1..=900 {
            for game in [&mut first, &mut second] {
                game.push_input(1, scripted_input(sequence, 1));
                game.push_input(2, scripted_input(sequence, 2));
                game.step();
            }

            let a = serialize(&first.snapshot()).unwrap();
            let b = serialize(&second.snapshot()).unwrap();
            assert_eq!(a, b, "diverged at input {}", sequence);
        }

        assert_eq!(first.state, second.state);
    }

    /// No player ever leaves the playable area
    #[test]
    fn players_stay_inside_field() {
        let mut game = started_game(GameState::with_ai(GameConfig::default(), Box::new(Chaser)));
        let config = game.config().clone();
        let margin = config.player_margin();

        for sequence in 1..=600u32 {
            let corner = if sequence < 300 {
                Vec2::new(-1.0, -1.0)
            } else {
                Vec2::new(1.0, 1.0)
            };
            for session in [1, 2] {
                let direction = if session == 1 { corner } else { corner.scale(-1.0) };
                game.push_input(
                    session,
                    InputCommand {
                        sequence,
                        ..InputCommand::moving(direction)
                    },
                );
            }
            game.step();

            for player in game.state.players.values() {
                assert!(player.position.x >= margin && player.position.x <= config.field_width - margin);
                assert!(
                    player.position.y >= margin && player.position.y <= config.field_height - margin
                );
            }
        }
    }

    /// Captures and steals never happen before their lockout expires
    #[test]
    fn possession_respects_lockouts() {
        let mut game = started_game(GameState::with_ai(GameConfig::default(), Box::new(Chaser)));
        let config = game.config().clone();
        let mut captures = 0;

        for sequence in 1..=3600u32 {
            chase_inputs(&mut game, sequence);
            let before = game.state.clone();
            let report = game.step();
            let now = game.state.now_ms(&config);

            // Kickoff and match resets clear lockouts themselves.
            if report
                .phase
                .iter()
                .any(|e| matches!(e, PhaseEvent::KickoffRestored | PhaseEvent::MatchStarted))
            {
                continue;
            }

            for event in &report.possession {
                match event {
                    PossessionEvent::Captured { player } => {
                        captures += 1;
                        assert!(now >= before.players[player].loss_lockout_until);
                        if before.ball.released_by.as_deref() == Some(player.as_str()) {
                            assert!(now >= before.ball.capture_lockout_until);
                        }
                    }
                    PossessionEvent::Stolen { from, by } => {
                        assert_ne!(from, by);
                        assert!(now >= before.ball.capture_lockout_until);
                    }
                    _ => {}
                }
            }
        }

        assert!(captures > 0);
    }
}

/// CLIENT PREDICTION AGAINST THE AUTHORITATIVE ROOM
mod reconciliation_tests {
    use super::*;
    use client::prediction::{Predictor, SNAP_EPSILON};

    /// A desynced prediction converges back onto the server's player
    #[test]
    fn prediction_converges_on_server_state() {
        let mut game = started_game(GameState::new(GameConfig::default()));
        let config = game.config().clone();
        let dt = config.fixed_dt();

        let snapshot = game.snapshot();
        let id = snapshot.controlled_by(1).cloned().unwrap();
        assert_eq!(id, "A-forward");
        let mut start = snapshot.players[&id].to_player(&id);
        start.position.y += 100.0;
        let mut predictor = Predictor::new(start, config.clone());

        let mut last_error = f32::MAX;
        let mut converged_after = None;
        for sequence in 1..=45u32 {
            let command = InputCommand {
                sequence,
                ..InputCommand::moving(Vec2::new(1.0, 0.0))
            };
            predictor.apply_local_input(&command, dt);
            game.push_input(1, command);
            game.step();

            let snapshot = game.snapshot();
            let result = predictor.reconcile(
                &snapshot.players[&id],
                snapshot.last_processed_input.get(&1).copied(),
            );
            assert_eq!(result.replayed, 0);

            if result.error <= SNAP_EPSILON {
                converged_after = Some(sequence);
                break;
            }
            assert!(result.error < last_error);
            last_error = result.error;
        }

        assert!(converged_after.is_some(), "prediction did not converge");
        let authoritative = &game.snapshot().players[&id];
        assert_approx_eq!(predictor.player().position.x, authoritative.position.x, 1e-3);
        assert_approx_eq!(predictor.player().position.y, authoritative.position.y, 1e-3);
    }

    /// Inputs the server has not processed yet are replayed on top of its state
    #[test]
    fn unacknowledged_inputs_replayed() {
        let mut game = started_game(GameState::new(GameConfig::default()));
        let config = game.config().clone();
        let dt = config.fixed_dt();

        let snapshot = game.snapshot();
        let id = snapshot.controlled_by(1).cloned().unwrap();
        let mut predictor = Predictor::new(snapshot.players[&id].to_player(&id), config);

        for sequence in 1..=6u32 {
            let command = InputCommand {
                sequence,
                ..InputCommand::moving(Vec2::new(0.0, 1.0))
            };
            predictor.apply_local_input(&command, dt);
            // The server only sees the first half so far.
            if sequence <= 3 {
                game.push_input(1, command);
                game.step();
            }
        }

        let snapshot = game.snapshot();
        let result = predictor.reconcile(&snapshot.players[&id], Some(3));

        assert_eq!(result.replayed, 3);
        assert!(result.error <= SNAP_EPSILON);
        assert_eq!(predictor.pending_inputs(), 3);
    }
}

/// FIXED-STEP ROOM TIMING
mod room_tests {
    use super::*;
    use server::room::{Room, MAX_STEPS_PER_UPDATE};
    use shared::ManualClock;
    use std::sync::Arc;

    /// A stall is capped at five steps and the backlog is not replayed later
    #[test]
    fn stall_is_capped_and_forgotten() {
        let clock = Arc::new(ManualClock::new());
        let mut room = Room::new(1, GameConfig::default(), clock.clone());
        let dt = room.game().config().tick_duration();

        clock.advance(dt * 12 + dt / 2);
        let outcome = room.update();

        assert_eq!(outcome.steps, MAX_STEPS_PER_UPDATE);
        assert_eq!(outcome.dropped, dt * 7);
        assert_eq!(room.accumulator(), dt / 2);
        assert!(outcome.snapshot.is_some());

        clock.advance(dt / 2);
        let next = room.update();
        assert_eq!(next.steps, 1);
        assert_eq!(room.game().state.tick, 6);
    }

    /// The simulation only advances when the clock does
    #[test]
    fn frozen_clock_runs_no_steps() {
        let clock = Arc::new(ManualClock::new());
        let mut room = Room::new(1, GameConfig::default(), clock.clone());

        for _ in 0..10 {
            assert_eq!(room.update().steps, 0);
        }
        assert_eq!(room.game().state.tick, 0);
        assert_eq!(room.accumulator(), Duration::ZERO);
    }
}

/// END-TO-END OVER UDP
mod network_tests {
    use super::*;
    use client::controller::RandomWalk;
    use client::network::Client;
    use server::network::Server;
    use shared::{Clock, MonotonicClock};
    use std::sync::Arc;

    /// Two clients join one room, receive snapshots and predict their player
    #[tokio::test]
    async fn two_clients_play_in_one_room() {
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let mut server = Server::new("127.0.0.1:0", GameConfig::default(), 8, clock.clone())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let mut first = Client::new(
            &addr,
            GameConfig::default(),
            Box::new(RandomWalk::seeded(1)),
            clock.clone(),
        )
        .await
        .unwrap();
        let mut second = Client::new(
            &addr,
            GameConfig::default(),
            Box::new(RandomWalk::seeded(2)),
            clock.clone(),
        )
        .await
        .unwrap();

        let run_for = Some(Duration::from_millis(1500));
        let (a, b) = tokio::join!(first.run(run_for), second.run(run_for));
        a.unwrap();
        b.unwrap();

        for client in [&first, &second] {
            assert!(client.rejection().is_none());
            assert_eq!(client.room_id(), Some(1));
            assert!(client.snapshots_received() > 0);
            assert!(client.game_state().mirror().is_some());
            assert!(client.game_state().controlled_id().is_some());
        }
        assert_ne!(first.game_state().team(), second.game_state().team());
        assert!(!first.is_connected());
    }

    /// A client speaking another protocol version is turned away
    #[tokio::test]
    async fn wrong_version_is_rejected() {
        use bincode::deserialize;
        use shared::Packet;
        use tokio::net::UdpSocket;
        use tokio::time::timeout;

        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let mut server = Server::new("127.0.0.1:0", GameConfig::default(), 8, clock)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = serialize(&Packet::Connect { client_version: 99 }).unwrap();
        socket.send_to(&connect, addr).await.unwrap();

        let mut buffer = [0u8; shared::MAX_PACKET_SIZE];
        let (len, _) = timeout(Duration::from_secs(1), socket.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        let reply: Packet = deserialize(&buffer[..len]).unwrap();

        assert!(matches!(reply, Packet::Disconnected { .. }));
    }
}
