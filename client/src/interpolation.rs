//! Interpolation of entities the client does not predict.
//!
//! Remote players and the free ball are drawn between the two most recent
//! authoritative samples. A new sample starts a fresh blend from the
//! previous one, finishing one snapshot interval after it arrived.

use shared::{PlayerId, StateSnapshot, Vec2};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Sample {
    received_ms: u64,
    players: BTreeMap<PlayerId, Vec2>,
    ball: Vec2,
}

impl Sample {
    fn capture(snapshot: &StateSnapshot, received_ms: u64) -> Self {
        Self {
            received_ms,
            players: snapshot
                .players
                .iter()
                .map(|(id, p)| (id.clone(), p.position))
                .collect(),
            ball: snapshot.ball.position,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoteInterpolator {
    previous: Option<Sample>,
    latest: Option<Sample>,
}

impl RemoteInterpolator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: &StateSnapshot, received_ms: u64) {
        self.previous = self.latest.take();
        self.latest = Some(Sample::capture(snapshot, received_ms));
    }

    /// Discards all samples, e.g. after a kickoff teleport.
    pub fn clear(&mut self) {
        self.previous = None;
        self.latest = None;
    }

    /// Blend factor between the previous and the latest sample at `now_ms`.
    pub fn alpha(&self, now_ms: u64) -> f32 {
        match (&self.previous, &self.latest) {
            (Some(previous), Some(latest)) => {
                let span = latest.received_ms.saturating_sub(previous.received_ms);
                if span == 0 {
                    return 1.0;
                }
                let since = now_ms.saturating_sub(latest.received_ms);
                (since as f32 / span as f32).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    pub fn player_position(&self, id: &str, now_ms: u64) -> Option<Vec2> {
        let latest = self.latest.as_ref()?.players.get(id).copied()?;
        let from = self
            .previous
            .as_ref()
            .and_then(|s| s.players.get(id).copied())
            .unwrap_or(latest);
        Some(from.lerp(latest, self.alpha(now_ms)))
    }

    pub fn ball_position(&self, now_ms: u64) -> Option<Vec2> {
        let latest = self.latest.as_ref()?.ball;
        let from = self.previous.as_ref().map_or(latest, |s| s.ball);
        Some(from.lerp(latest, self.alpha(now_ms)))
    }
}
