//! AI input sources for players no human controls.

use shared::{kickoff_position, GameConfig, InputCommand, MatchState, Player};

/// Produces one input per tick for a bot-driven player.
///
/// Implementations see the whole match state but must only return an input;
/// they never mutate the simulation directly.
pub trait AiInputSource: Send {
    fn command(&mut self, player: &Player, state: &MatchState, config: &GameConfig)
        -> InputCommand;
}

/// Walks back to its kickoff spot and stands there.
#[derive(Debug, Clone)]
pub struct FormationKeeper {
    /// Distance from the spot that counts as arrived.
    pub tolerance: f32,
}

impl Default for FormationKeeper {
    fn default() -> Self {
        Self { tolerance: 8.0 }
    }
}

impl AiInputSource for FormationKeeper {
    fn command(
        &mut self,
        player: &Player,
        _state: &MatchState,
        config: &GameConfig,
    ) -> InputCommand {
        let home = kickoff_position(player.team, player.role, config);
        let offset = home.sub(player.position);

        if offset.length() <= self.tolerance {
            InputCommand::idle()
        } else {
            InputCommand::moving(offset.normalize())
        }
    }
}
