/// Push-chain resolver, shared by the player and Strong hazards.
///
/// Two phases:
///   1. `plan_push`  — pure. Collects the contiguous run of blocks starting
///      at the pushed cell and decides whether the lead block may move.
///   2. `apply_push` — mutates blocks (and the grid, for water bridges).
///
/// ## Lead Cell Table
///
/// ┌──────────────────────┬──────────┬────────────────────────────────────┐
/// │ Cell beyond the lead │ Push?    │ Effect                             │
/// ├──────────────────────┼──────────┼────────────────────────────────────┤
/// │ out of bounds        │ DENY     │                                    │
/// │ Wall / Conveyor      │ DENY     │                                    │
/// │ occupied by a block  │ DENY     │ (only past the end of the chain)   │
/// │ Water                │ ALLOW    │ lead removed, cell becomes Empty   │
/// │ Lava                 │ ALLOW    │ lead removed, Lava stays           │
/// │ Empty / Goal / Ice   │ ALLOW    │ whole chain shifts one cell        │
/// └──────────────────────┴──────────┴────────────────────────────────────┘
///
/// On an accepted push every non-lead block shifts by one cell.
/// Shifts are applied tail-to-head so no two blocks ever share a cell.

use super::entity::{motion_between, Block, Dir, Pos};
use super::rules::{block_at, Grid};
use super::tile::TileKind;

/// What happens to the lead block of an accepted push.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LeadFate {
    /// Moves onto an ordinary tile.
    Shift,
    /// Sinks into Water and turns the cell into a permanent bridge.
    Bridge,
    /// Destroyed by Lava. The Lava cell is unchanged.
    Sunk,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushPlan {
    pub dir: Dir,
    /// Block indices, nearest to the pusher first.
    pub chain: Vec<usize>,
    /// Cell the lead block moves into.
    pub target: Pos,
    pub fate: LeadFate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushCheck {
    /// No block at the start cell.
    Nothing,
    /// A chain is there but cannot move.
    Blocked,
    Ready(PushPlan),
}

/// Result of an applied push, for events and animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushOutcome {
    pub target: Pos,
    pub fate: LeadFate,
    /// Blocks that changed cell (and are still on the board).
    pub shifted: usize,
}

/// Decide whether the chain starting at `start` can move one cell in `dir`.
pub fn plan_push(grid: &Grid, blocks: &[Block], start: Pos, dir: Dir) -> PushCheck {
    let mut chain = vec![];
    let mut cursor = start;
    while let Some(idx) = block_at(blocks, cursor) {
        chain.push(idx);
        cursor = cursor.step(dir);
    }
    if chain.is_empty() {
        return PushCheck::Nothing;
    }

    // `cursor` is now the first cell past the chain: the lead target.
    let tile = match grid.get(cursor) {
        Some(t) => t,
        None => return PushCheck::Blocked,
    };
    if !tile.accepts_block() {
        return PushCheck::Blocked;
    }

    let fate = match tile {
        TileKind::Water => LeadFate::Bridge,
        TileKind::Lava => LeadFate::Sunk,
        _ => LeadFate::Shift,
    };
    PushCheck::Ready(PushPlan { dir, chain, target: cursor, fate })
}

/// Apply an accepted plan. Shifted blocks get a one-cell motion of
/// `anim_ms`; a removed lead block simply disappears.
pub fn apply_push(grid: &mut Grid, blocks: &mut Vec<Block>, plan: &PushPlan, anim_ms: u32) -> PushOutcome {
    let lead = match plan.chain.last() {
        Some(&idx) => idx,
        None => {
            return PushOutcome { target: plan.target, fate: plan.fate, shifted: 0 };
        }
    };

    let movers: &[usize] = match plan.fate {
        LeadFate::Shift => &plan.chain,
        LeadFate::Bridge | LeadFate::Sunk => &plan.chain[..plan.chain.len() - 1],
    };

    // Tail-to-head: the block nearest the lead moves first.
    for &idx in movers.iter().rev() {
        let from = blocks[idx].pos;
        let to = from.step(plan.dir);
        blocks[idx].pos = to;
        blocks[idx].motion = motion_between(from, to, anim_ms);
    }

    match plan.fate {
        LeadFate::Shift => {}
        LeadFate::Bridge => {
            grid.set(plan.target, TileKind::Empty);
            blocks.remove(lead);
        }
        LeadFate::Sunk => {
            blocks.remove(lead);
        }
    }

    PushOutcome { target: plan.target, fate: plan.fate, shifted: movers.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::tests::map_from;

    fn positions(blocks: &[Block]) -> Vec<Pos> {
        blocks.iter().map(|b| b.pos).collect()
    }

    #[test]
    fn nothing_to_push_on_empty_cell() {
        let (g, b) = map_from(&["   "]);
        assert_eq!(plan_push(&g, &b, Pos::new(1, 0), Dir::Right), PushCheck::Nothing);
    }

    #[test]
    fn single_block_moves_one_cell() {
        let (mut g, mut b) = map_from(&[" B  "]);
        let plan = match plan_push(&g, &b, Pos::new(1, 0), Dir::Right) {
            PushCheck::Ready(p) => p,
            other => panic!("expected push, got {other:?}"),
        };
        assert_eq!(plan.fate, LeadFate::Shift);
        let out = apply_push(&mut g, &mut b, &plan, 120);
        assert_eq!(positions(&b), vec![Pos::new(2, 0)]);
        assert_eq!(out.shifted, 1);
        assert_eq!(b[0].motion.map(|m| m.from), Some(Pos::new(1, 0)));
    }

    #[test]
    fn chain_into_wall_is_rejected() {
        let (g, b) = map_from(&[" BBB#"]);
        assert_eq!(plan_push(&g, &b, Pos::new(1, 0), Dir::Right), PushCheck::Blocked);
    }

    #[test]
    fn chain_off_grid_is_rejected() {
        let (g, b) = map_from(&[" BB"]);
        assert_eq!(plan_push(&g, &b, Pos::new(1, 0), Dir::Right), PushCheck::Blocked);
    }

    #[test]
    fn chain_onto_conveyor_is_rejected() {
        let (g, b) = map_from(&[" B>"]);
        assert_eq!(plan_push(&g, &b, Pos::new(1, 0), Dir::Right), PushCheck::Blocked);
    }

    #[test]
    fn chain_shifts_tail_to_head() {
        let (mut g, mut b) = map_from(&[" BBB G"]);
        let PushCheck::Ready(plan) = plan_push(&g, &b, Pos::new(1, 0), Dir::Right) else {
            panic!("chain should move");
        };
        assert_eq!(plan.chain.len(), 3);
        apply_push(&mut g, &mut b, &plan, 0);
        let mut p = positions(&b);
        p.sort_by_key(|p| p.x);
        assert_eq!(p, vec![Pos::new(2, 0), Pos::new(3, 0), Pos::new(4, 0)]);
    }

    #[test]
    fn water_swallows_lead_and_bridges() {
        let (mut g, mut b) = map_from(&[" BB~"]);
        let PushCheck::Ready(plan) = plan_push(&g, &b, Pos::new(1, 0), Dir::Right) else {
            panic!("push into water should be legal");
        };
        assert_eq!(plan.fate, LeadFate::Bridge);
        let out = apply_push(&mut g, &mut b, &plan, 0);
        assert_eq!(b.len(), 1);
        assert_eq!(positions(&b), vec![Pos::new(2, 0)]);
        assert_eq!(g.terrain_at(Pos::new(3, 0)), TileKind::Empty);
        assert_eq!(out.shifted, 1);
    }

    #[test]
    fn lava_destroys_lead_and_stays() {
        let (mut g, mut b) = map_from(&[" BL"]);
        let PushCheck::Ready(plan) = plan_push(&g, &b, Pos::new(1, 0), Dir::Right) else {
            panic!("push into lava should be legal");
        };
        apply_push(&mut g, &mut b, &plan, 0);
        assert!(b.is_empty());
        assert_eq!(g.terrain_at(Pos::new(2, 0)), TileKind::Lava);
    }

    #[test]
    fn vertical_push_onto_ice() {
        let (mut g, mut b) = map_from(&[" ", "B", "I"]);
        let PushCheck::Ready(plan) = plan_push(&g, &b, Pos::new(0, 1), Dir::Down) else {
            panic!("push onto ice should be legal");
        };
        apply_push(&mut g, &mut b, &plan, 0);
        assert_eq!(positions(&b), vec![Pos::new(0, 2)]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn dir_strategy() -> impl Strategy<Value = Dir> {
            prop_oneof![Just(Dir::Up), Just(Dir::Down), Just(Dir::Left), Just(Dir::Right)]
        }

        proptest! {
            #[test]
            fn push_never_adds_or_stacks_blocks(
                tiles in proptest::collection::vec(0u8..7, 36),
                block_mask in proptest::collection::vec(any::<bool>(), 36),
                sx in 0i32..6, sy in 0i32..6,
                dir in dir_strategy(),
            ) {
                let mut blocks = vec![];
                let cells: Vec<Vec<TileKind>> = (0..6).map(|y| (0..6).map(|x| {
                    let i = (y * 6 + x) as usize;
                    let tile = TileKind::try_from(tiles[i]).unwrap_or_default();
                    if block_mask[i] && tile == TileKind::Empty {
                        blocks.push(Block::new(Pos::new(x, y)));
                    }
                    if tile == TileKind::Block { TileKind::Empty } else { tile }
                }).collect()).collect();
                let mut grid = Grid::new(cells);
                let before = blocks.len();

                if let PushCheck::Ready(plan) = plan_push(&grid, &blocks, Pos::new(sx, sy), dir) {
                    apply_push(&mut grid, &mut blocks, &plan, 0);
                }

                prop_assert!(blocks.len() <= before);
                let mut seen = std::collections::HashSet::new();
                for b in &blocks {
                    prop_assert!(seen.insert(b.pos), "two blocks share {:?}", b.pos);
                    prop_assert!(grid.in_bounds(b.pos));
                }
            }
        }
    }
}
