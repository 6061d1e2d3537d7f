/// Tile kinds and their properties.
/// Properties are queried via methods, not stored as flags,
/// so terrain semantics are centralized here.
///
/// Numeric codes match the level-pack JSON encoding:
///   0 Empty   1 Wall   2 Water   3 Block   4 Goal   5 Ice   6 Lava
///   7 ConveyorUp   8 ConveyorDown   9 ConveyorLeft   10 ConveyorRight

use serde::Deserialize;

use super::entity::Dir;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum TileKind {
    #[default]
    Empty,
    Wall,
    Water,
    Block,  // authoring only: becomes a movable block on load
    Goal,
    Ice,
    Lava,
    ConveyorUp,
    ConveyorDown,
    ConveyorLeft,
    ConveyorRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown tile code {0}")]
pub struct UnknownTileCode(pub u8);

impl TryFrom<u8> for TileKind {
    type Error = UnknownTileCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => TileKind::Empty,
            1 => TileKind::Wall,
            2 => TileKind::Water,
            3 => TileKind::Block,
            4 => TileKind::Goal,
            5 => TileKind::Ice,
            6 => TileKind::Lava,
            7 => TileKind::ConveyorUp,
            8 => TileKind::ConveyorDown,
            9 => TileKind::ConveyorLeft,
            10 => TileKind::ConveyorRight,
            other => return Err(UnknownTileCode(other)),
        })
    }
}

impl TileKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_wall(self) -> bool {
        matches!(self, TileKind::Wall)
    }

    pub fn is_ice(self) -> bool {
        matches!(self, TileKind::Ice)
    }

    /// Kills the player on landing.
    pub fn is_lethal(self) -> bool {
        matches!(self, TileKind::Water | TileKind::Lava)
    }

    /// Landing here ends the player's multi-step action.
    pub fn ends_action(self) -> bool {
        matches!(self, TileKind::Water | TileKind::Lava | TileKind::Goal)
    }

    /// Can the lead block of a push chain move onto this tile?
    pub fn accepts_block(self) -> bool {
        matches!(
            self,
            TileKind::Empty | TileKind::Water | TileKind::Goal | TileKind::Lava | TileKind::Ice
        )
    }

    /// Direction a conveyor forces its occupant, if this is a conveyor.
    pub fn conveyor(self) -> Option<Dir> {
        match self {
            TileKind::ConveyorUp => Some(Dir::Up),
            TileKind::ConveyorDown => Some(Dir::Down),
            TileKind::ConveyorLeft => Some(Dir::Left),
            TileKind::ConveyorRight => Some(Dir::Right),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_pack_encoding() {
        for code in 0..=10u8 {
            let tile = TileKind::try_from(code).unwrap();
            assert_eq!(tile.code(), code);
        }
        assert_eq!(TileKind::try_from(11), Err(UnknownTileCode(11)));
    }

    #[test]
    fn json_codes_deserialize() {
        let row: Vec<TileKind> = serde_json::from_str("[0, 1, 2, 6, 9]").unwrap();
        assert_eq!(
            row,
            vec![TileKind::Empty, TileKind::Wall, TileKind::Water, TileKind::Lava, TileKind::ConveyorLeft]
        );
        assert!(serde_json::from_str::<Vec<TileKind>>("[42]").is_err());
    }

    #[test]
    fn block_acceptance() {
        assert!(TileKind::Empty.accepts_block());
        assert!(TileKind::Water.accepts_block());
        assert!(TileKind::Lava.accepts_block());
        assert!(TileKind::Goal.accepts_block());
        assert!(TileKind::Ice.accepts_block());
        assert!(!TileKind::Wall.accepts_block());
        assert!(!TileKind::ConveyorRight.accepts_block());
    }

    #[test]
    fn terminal_tiles() {
        assert!(TileKind::Goal.ends_action());
        assert!(!TileKind::Goal.is_lethal());
        assert!(TileKind::Lava.is_lethal());
        assert!(!TileKind::Ice.ends_action());
        assert_eq!(TileKind::ConveyorDown.conveyor(), Some(Dir::Down));
        assert_eq!(TileKind::Empty.conveyor(), None);
    }
}
