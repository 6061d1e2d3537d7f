/// Events emitted while resolving a turn.
/// The presentation layer consumes these for sound and messages.

use crate::domain::entity::{Dir, Pos};
use super::session::DeathCause;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    ActionStarted { dir: Dir },
    ActionRejected { dir: Dir },
    PlayerMoved { from: Pos, to: Pos },
    Slid { to: Pos },
    Conveyed { to: Pos },
    BlockPushed { target: Pos },
    Bridged { at: Pos },
    BlockBurned { at: Pos },
    HazardMoved { index: usize, from: Pos, to: Pos },
    HazardPushed { index: usize },
    PlayerDied { cause: DeathCause },
    LevelWon { moves: u32, elapsed_ms: u64 },
    Undone,
    Restarted,
    SettleTimeout,
}
