/// Session: the live, mutable state of one attempt at a level.
///
/// ## Ownership
///
/// The session exclusively owns the grid, blocks and hazards. The movement
/// engine and hazard stepper mutate them through `&mut Session`; the
/// renderer only reads between ticks.
///
/// ## Grid
///
/// `grid` starts as a copy of the level tiles with every Block cell
/// turned into Empty plus a movable block. It is mutated in exactly one
/// way: a block pushed into Water turns that cell into Empty (a bridge).
///
/// ## Undo
///
/// A `Snapshot` is pushed before each accepted action. It captures the
/// player cell, block cells, the whole grid, and each hazard's cell and
/// script cursor. Undo replaces those fields wholesale.

use crate::domain::entity::{Block, Hazard, Player, Pos};
use crate::domain::rules::Grid;
use crate::domain::tile::TileKind;

use super::history::History;
use super::level::{Level, LevelError};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeathCause {
    Drowned,
    Burned,
    Caught,
}

impl DeathCause {
    /// Cause of death for landing on `tile`, if it kills.
    pub fn of_tile(tile: TileKind) -> Option<Self> {
        if !tile.is_lethal() {
            return None;
        }
        Some(if tile == TileKind::Lava { DeathCause::Burned } else { DeathCause::Drowned })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Playing,
    Won,
    Dead(DeathCause),
}

#[derive(Clone, Debug)]
pub struct Snapshot {
    player: Pos,
    blocks: Vec<Pos>,
    grid: Grid,
    hazards: Vec<(Pos, usize)>,
    move_count: u32,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub grid: Grid,
    pub player: Player,
    pub blocks: Vec<Block>,
    pub hazards: Vec<Hazard>,
    pub move_distance: u32,
    pub move_count: u32,
    pub elapsed_ms: u64,
    pub status: Status,
    history: History<Snapshot>,
}

impl Session {
    /// Start an attempt. Rejects invalid level data.
    /// `undo_limit == 0` keeps unbounded history.
    pub fn new(level: &Level, undo_limit: usize) -> Result<Self, LevelError> {
        level.validate()?;

        let mut blocks = vec![];
        let cells = level
            .tiles
            .iter()
            .enumerate()
            .map(|(y, row)| {
                row.iter()
                    .enumerate()
                    .map(|(x, &tile)| {
                        if tile == TileKind::Block {
                            blocks.push(Block::new(Pos::new(x as i32, y as i32)));
                            TileKind::Empty
                        } else {
                            tile
                        }
                    })
                    .collect()
            })
            .collect();

        let hazards = level
            .hazards
            .iter()
            .map(|h| Hazard::new(h.pos, h.kind, h.commands.clone(), h.cursor, h.can_attack))
            .collect();

        Ok(Session {
            grid: Grid::new(cells),
            player: Player::new(level.player_start),
            blocks,
            hazards,
            move_distance: level.move_distance.max(1),
            move_count: 0,
            elapsed_ms: 0,
            status: Status::Playing,
            history: History::with_limit(undo_limit),
        })
    }

    pub fn is_playing(&self) -> bool {
        self.status == Status::Playing
    }

    // ── History ──

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            player: self.player.pos,
            blocks: self.blocks.iter().map(|b| b.pos).collect(),
            grid: self.grid.clone(),
            hazards: self.hazards.iter().map(|h| (h.pos, h.cursor)).collect(),
            move_count: self.move_count,
        }
    }

    /// Replace live state with `snap`. In-flight motions are dropped.
    pub fn restore(&mut self, snap: Snapshot) {
        self.player = Player::new(snap.player);
        self.blocks = snap.blocks.into_iter().map(Block::new).collect();
        self.grid = snap.grid;
        for (h, (pos, cursor)) in self.hazards.iter_mut().zip(snap.hazards) {
            h.pos = pos;
            h.cursor = cursor;
            h.motion = None;
        }
        self.move_count = snap.move_count;
    }

    /// Push a snapshot of the current state. Called once per accepted action.
    pub fn record(&mut self) {
        let snap = self.snapshot();
        self.history.push(snap);
    }

    /// Pop and restore the latest snapshot. No-op on empty history.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(snap) => {
                self.restore(snap);
                true
            }
            None => false,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // ── Animation ──

    pub fn is_settled(&self) -> bool {
        self.player.motion.is_none()
            && self.blocks.iter().all(|b| b.motion.is_none())
            && self.hazards.iter().all(|h| h.motion.is_none())
    }

    /// Advance every motion by `dt_ms`, dropping finished ones.
    /// Returns true when nothing is moving any more.
    pub fn advance_motions(&mut self, dt_ms: u32) -> bool {
        fn tick(m: &mut Option<crate::domain::entity::Motion>, dt_ms: u32) {
            if let Some(motion) = m {
                if motion.advance(dt_ms) {
                    *m = None;
                }
            }
        }
        tick(&mut self.player.motion, dt_ms);
        for b in &mut self.blocks {
            tick(&mut b.motion, dt_ms);
        }
        for h in &mut self.hazards {
            tick(&mut h.motion, dt_ms);
        }
        self.is_settled()
    }

    /// Snap every actor to its destination.
    pub fn finish_motions(&mut self) {
        self.player.motion = None;
        for b in &mut self.blocks {
            b.motion = None;
        }
        for h in &mut self.hazards {
            h.motion = None;
        }
    }

    // ── Queries ──

    pub fn tile_under_player(&self) -> TileKind {
        self.grid.terrain_at(self.player.pos)
    }

    pub fn lethal_hazard_at(&self, pos: Pos) -> bool {
        self.hazards.iter().any(|h| h.pos == pos && h.is_lethal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Command, Dir, HazardKind, Motion};
    use crate::sim::level::{parse_text_level, HazardDef};

    fn level(text: &str) -> Level {
        parse_text_level(text).expect("test level parses")
    }

    #[test]
    fn blocks_are_lifted_off_the_grid() {
        let s = Session::new(&level("P B ~\n"), 0).unwrap();
        assert_eq!(s.blocks.len(), 1);
        assert_eq!(s.blocks[0].pos, Pos::new(2, 0));
        assert_eq!(s.grid.terrain_at(Pos::new(2, 0)), TileKind::Empty);
        assert_eq!(s.player.pos, Pos::new(0, 0));
    }

    #[test]
    fn invalid_level_is_rejected() {
        let mut lv = level("P  \n");
        lv.player_start = Pos::new(9, 9);
        assert!(matches!(Session::new(&lv, 0), Err(LevelError::StartOffGrid { .. })));
    }

    #[test]
    fn undo_restores_everything_recorded() {
        let mut lv = level("P B~\n");
        lv.hazards.push(HazardDef {
            pos: Pos::new(0, 0),
            kind: HazardKind::Normal,
            commands: vec![Command::Wait, Command::Move(Dir::Right)],
            cursor: 0,
            can_attack: false,
        });
        let mut s = Session::new(&lv, 0).unwrap();
        s.record();

        s.player.pos = Pos::new(1, 0);
        s.blocks.clear();
        s.grid.set(Pos::new(3, 0), TileKind::Empty);
        s.hazards[0].pos = Pos::new(1, 0);
        s.hazards[0].cursor = 1;
        s.move_count = 1;

        assert!(s.undo());
        assert_eq!(s.player.pos, Pos::new(0, 0));
        assert_eq!(s.blocks.len(), 1);
        assert_eq!(s.grid.terrain_at(Pos::new(3, 0)), TileKind::Water);
        assert_eq!(s.hazards[0].pos, Pos::new(0, 0));
        assert_eq!(s.hazards[0].cursor, 0);
        assert_eq!(s.move_count, 0);
        assert!(!s.undo());
    }

    #[test]
    fn lethal_tiles_name_their_cause() {
        assert_eq!(DeathCause::of_tile(TileKind::Water), Some(DeathCause::Drowned));
        assert_eq!(DeathCause::of_tile(TileKind::Lava), Some(DeathCause::Burned));
        assert_eq!(DeathCause::of_tile(TileKind::Goal), None);
        assert_eq!(DeathCause::of_tile(TileKind::Ice), None);
    }

    #[test]
    fn undo_limit_bounds_history() {
        let mut s = Session::new(&level("P  \n"), 2).unwrap();
        for _ in 0..5 {
            s.record();
        }
        assert_eq!(s.history_len(), 2);
    }

    #[test]
    fn motions_settle() {
        let mut s = Session::new(&level("P  \n"), 0).unwrap();
        s.player.motion = Some(Motion::new(Pos::new(1, 0), 100));
        assert!(!s.advance_motions(60));
        assert!(s.advance_motions(60));
        s.player.motion = Some(Motion::new(Pos::new(1, 0), 100));
        s.finish_motions();
        assert!(s.is_settled());
    }
}
