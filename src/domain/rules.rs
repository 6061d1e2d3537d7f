/// Board queries: the grid and the truth tables for who may enter a cell.
///
/// Pure functions over the grid and the block list. They encode "what is
/// legal" without performing the move.
///
/// ## Entry Truth Table
///
/// ┌────────────────────────┬──────────┬──────────┬──────────┬──────────┐
/// │ Target cell            │ Player   │ Normal   │ Strong   │ Flying   │
/// ├────────────────────────┼──────────┼──────────┼──────────┼──────────┤
/// │ out of bounds          │ DENY     │ DENY     │ DENY     │ DENY     │
/// │ Wall                   │ DENY     │ DENY     │ DENY     │ ALLOW    │
/// │ block, chain pushable  │ PUSH     │ DENY     │ PUSH     │ ALLOW    │
/// │ block, chain stuck     │ DENY     │ DENY     │ DENY     │ ALLOW    │
/// │ anything else          │ ALLOW    │ ALLOW    │ ALLOW    │ ALLOW    │
/// └────────────────────────┴──────────┴──────────┴──────────┴──────────┘
///
/// Hazards never block each other, and never block the player.
///
/// ## Slide Stop Table (ice and conveyor continuations)
///
/// ┌────────────────────────┬──────────────────────────────┐
/// │ Next cell              │ Result                       │
/// ├────────────────────────┼──────────────────────────────┤
/// │ out of bounds          │ stop on the current cell     │
/// │ Wall                   │ stop on the current cell     │
/// │ block                  │ stop on the current cell     │
/// │ otherwise              │ move                         │
/// └────────────────────────┴──────────────────────────────┘

use super::entity::{Block, Pos};
use super::tile::TileKind;

/// Rectangular tile storage with bounds-checked access.
/// Out-of-bounds reads behave like Wall.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Vec<TileKind>>,
}

impl Grid {
    /// Caller guarantees `cells` is `height` rows of `width` tiles.
    pub fn new(cells: Vec<Vec<TileKind>>) -> Self {
        let height = cells.len();
        let width = cells.first().map_or(0, |r| r.len());
        Grid { width, height, cells }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells. Used as the bound for terrain continuations.
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    pub fn get(&self, pos: Pos) -> Option<TileKind> {
        if self.in_bounds(pos) {
            Some(self.cells[pos.y as usize][pos.x as usize])
        } else {
            None
        }
    }

    /// Tile at `pos`; out of bounds reads as Wall.
    #[inline]
    pub fn terrain_at(&self, pos: Pos) -> TileKind {
        self.get(pos).unwrap_or(TileKind::Wall)
    }

    pub fn set(&mut self, pos: Pos, tile: TileKind) {
        if self.in_bounds(pos) {
            self.cells[pos.y as usize][pos.x as usize] = tile;
        }
    }
}

/// Index of the block occupying `pos`, if any.
pub fn block_at(blocks: &[Block], pos: Pos) -> Option<usize> {
    blocks.iter().position(|b| b.pos == pos)
}

/// Can a walking actor stand on `pos`, ignoring blocks?
/// (in bounds and not Wall)
pub fn is_walkable(grid: &Grid, pos: Pos) -> bool {
    grid.in_bounds(pos) && !grid.terrain_at(pos).is_wall()
}

/// Does a slide or forced move stop before entering `next`?
pub fn stops_slide(grid: &Grid, blocks: &[Block], next: Pos) -> bool {
    !is_walkable(grid, next) || block_at(blocks, next).is_some()
}
