/// Hazard (orb) stepper.
///
/// Each hazard executes exactly one script command per completed player
/// action. The cursor always advances, whether the command moved the
/// hazard or was blocked, so scripts stay replayable.
///
/// Variant behaviour, dispatched on `HazardKind`:
///   - Normal: stopped by Wall, grid edge and blocks.
///   - Strong: like Normal, but pushes block chains via the push resolver.
///   - Flying: passes over Wall and blocks; only the grid edge stops it.
///     Does not slide on ice.
///
/// After a ground hazard lands on Ice it keeps sliding in the same
/// direction until the next cell is Wall, block, edge, or it reaches a
/// non-Ice tile. Hazards ignore conveyors, Water and Lava, and never
/// block each other. A strong push never shoves a block onto the player.

use log::warn;

use super::entity::{motion_between, Block, Command, Hazard, HazardKind, Pos};
use super::push::{apply_push, plan_push, PushCheck, PushOutcome};
use super::rules::{block_at, stops_slide, Grid};

/// What one hazard did this turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HazardStep {
    pub index: usize,
    pub from: Pos,
    pub to: Pos,
    pub command: Command,
    pub push: Option<PushOutcome>,
}

impl HazardStep {
    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

/// Step every hazard once, in list order.
pub fn step_all(
    grid: &mut Grid,
    blocks: &mut Vec<Block>,
    hazards: &mut [Hazard],
    player: Pos,
    anim_ms: u32,
) -> Vec<HazardStep> {
    hazards
        .iter_mut()
        .enumerate()
        .map(|(index, h)| step_hazard(grid, blocks, h, index, player, anim_ms))
        .collect()
}

/// Execute the hazard's current command and advance its cursor.
pub fn step_hazard(
    grid: &mut Grid,
    blocks: &mut Vec<Block>,
    hazard: &mut Hazard,
    index: usize,
    player: Pos,
    anim_ms: u32,
) -> HazardStep {
    let from = hazard.pos;
    let command = hazard.current_command();
    hazard.advance_cursor();

    let mut step = HazardStep { index, from, to: from, command, push: None };
    let dir = match command {
        Command::Move(d) => d,
        Command::Wait => return step,
    };

    let target = from.step(dir);
    if !grid.in_bounds(target) {
        return step;
    }

    match hazard.kind {
        HazardKind::Flying => {
            hazard.pos = target;
        }
        HazardKind::Normal | HazardKind::Strong => {
            if grid.terrain_at(target).is_wall() {
                return step;
            }
            if block_at(blocks, target).is_some() {
                if hazard.kind == HazardKind::Normal {
                    return step;
                }
                match plan_push(grid, blocks, target, dir) {
                    PushCheck::Ready(plan) if plan.target != player => {
                        step.push = Some(apply_push(grid, blocks, &plan, anim_ms));
                    }
                    _ => return step,
                }
            }
            hazard.pos = target;

            // Ice slide. Bounded by the grid area so bad data cannot spin.
            let mut slid = 0;
            while grid.terrain_at(hazard.pos).is_ice() {
                let next = hazard.pos.step(dir);
                if stops_slide(grid, blocks, next) {
                    break;
                }
                if slid >= grid.area() {
                    warn!("hazard {index} ice slide exceeded {} cells, stopping", grid.area());
                    break;
                }
                hazard.pos = next;
                slid += 1;
            }
        }
    }

    step.to = hazard.pos;
    hazard.motion = motion_between(from, step.to, anim_ms);
    step
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Dir;
    use crate::domain::rules::tests::map_from;
    use crate::domain::tile::TileKind;

    fn orb(x: i32, y: i32, kind: HazardKind, script: &[Command]) -> Hazard {
        Hazard::new(Pos::new(x, y), kind, script.to_vec(), 0, false)
    }

    const NOWHERE: Pos = Pos::new(-1, -1);
    const R: Command = Command::Move(Dir::Right);
    const L: Command = Command::Move(Dir::Left);

    #[test]
    fn wait_script_never_moves() {
        let (mut g, mut b) = map_from(&["    "]);
        let mut hs = vec![orb(1, 0, HazardKind::Normal, &[Command::Wait])];
        for _ in 0..10 {
            step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        }
        assert_eq!(hs[0].pos, Pos::new(1, 0));
        assert_eq!(hs[0].cursor, 0);
    }

    #[test]
    fn right_left_returns_home() {
        let (mut g, mut b) = map_from(&["    "]);
        let mut hs = vec![orb(1, 0, HazardKind::Normal, &[R, L])];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(2, 0));
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(1, 0));
    }

    #[test]
    fn blocked_command_still_consumes_slot() {
        let (mut g, mut b) = map_from(&[" #  "]);
        let mut hs = vec![orb(0, 0, HazardKind::Normal, &[R, Command::Wait])];
        let steps = step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert!(!steps[0].moved());
        assert_eq!(hs[0].cursor, 1);
    }

    #[test]
    fn edge_blocks_every_kind() {
        let (mut g, mut b) = map_from(&["  "]);
        let mut hs = vec![
            orb(1, 0, HazardKind::Normal, &[R]),
            orb(1, 0, HazardKind::Flying, &[R]),
            orb(1, 0, HazardKind::Strong, &[R]),
        ];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert!(hs.iter().all(|h| h.pos == Pos::new(1, 0)));
    }

    #[test]
    fn normal_stopped_by_block() {
        let (mut g, mut b) = map_from(&[" B "]);
        let mut hs = vec![orb(0, 0, HazardKind::Normal, &[R])];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(0, 0));
        assert_eq!(b[0].pos, Pos::new(1, 0));
    }

    #[test]
    fn flying_crosses_walls_and_blocks() {
        let (mut g, mut b) = map_from(&[" #B "]);
        let mut hs = vec![orb(0, 0, HazardKind::Flying, &[R])];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(1, 0));
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(2, 0));
        assert_eq!(b[0].pos, Pos::new(2, 0));
    }

    #[test]
    fn strong_pushes_chain() {
        let (mut g, mut b) = map_from(&[" BB ~"]);
        let mut hs = vec![orb(0, 0, HazardKind::Strong, &[R])];
        let steps = step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(1, 0));
        assert!(steps[0].push.is_some());
        let mut xs: Vec<i32> = b.iter().map(|b| b.pos.x).collect();
        xs.sort();
        assert_eq!(xs, vec![2, 3]);
    }

    #[test]
    fn strong_bridges_water() {
        let (mut g, mut b) = map_from(&[" B~"]);
        let mut hs = vec![orb(0, 0, HazardKind::Strong, &[R])];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert!(b.is_empty());
        assert_eq!(g.terrain_at(Pos::new(2, 0)), TileKind::Empty);
        assert_eq!(hs[0].pos, Pos::new(1, 0));
    }

    #[test]
    fn strong_stuck_chain_stays_put() {
        let (mut g, mut b) = map_from(&[" BB#"]);
        let mut hs = vec![orb(0, 0, HazardKind::Strong, &[R])];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(0, 0));
        assert_eq!(hs[0].cursor, 0); // single-slot script wraps back
    }

    #[test]
    fn strong_will_not_push_onto_player() {
        let (mut g, mut b) = map_from(&[" B  "]);
        let mut hs = vec![orb(0, 0, HazardKind::Strong, &[R])];
        step_all(&mut g, &mut b, &mut hs, Pos::new(2, 0), 0);
        assert_eq!(hs[0].pos, Pos::new(0, 0));
        assert_eq!(b[0].pos, Pos::new(1, 0));
    }

    #[test]
    fn ground_hazard_slides_on_ice() {
        let (mut g, mut b) = map_from(&[" III #"]);
        let mut hs = vec![orb(0, 0, HazardKind::Normal, &[R])];
        let steps = step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(4, 0));
        assert_eq!(steps[0].to, Pos::new(4, 0));
    }

    #[test]
    fn ice_slide_stops_before_wall_on_ice() {
        let (mut g, mut b) = map_from(&[" II#"]);
        let mut hs = vec![orb(0, 0, HazardKind::Normal, &[R])];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(2, 0));
    }

    #[test]
    fn flying_does_not_slide() {
        let (mut g, mut b) = map_from(&[" III "]);
        let mut hs = vec![orb(0, 0, HazardKind::Flying, &[R])];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(1, 0));
    }

    #[test]
    fn hazards_share_cells() {
        let (mut g, mut b) = map_from(&["   "]);
        let mut hs = vec![
            orb(0, 0, HazardKind::Normal, &[R]),
            orb(2, 0, HazardKind::Normal, &[L]),
        ];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
        assert_eq!(hs[0].pos, Pos::new(1, 0));
        assert_eq!(hs[1].pos, Pos::new(1, 0));
    }

    #[test]
    fn motion_spans_slide_distance() {
        let (mut g, mut b) = map_from(&[" II "]);
        let mut hs = vec![orb(0, 0, HazardKind::Normal, &[R])];
        step_all(&mut g, &mut b, &mut hs, NOWHERE, 100);
        let m = hs[0].motion.expect("hazard moved");
        assert_eq!(m.from, Pos::new(0, 0));
        assert_eq!(m.duration_ms, 300);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn command_strategy() -> impl Strategy<Value = Command> {
            prop_oneof![
                Just(Command::Wait),
                Just(Command::Move(Dir::Up)),
                Just(Command::Move(Dir::Down)),
                Just(Command::Move(Dir::Left)),
                Just(Command::Move(Dir::Right)),
            ]
        }

        proptest! {
            #[test]
            fn cursor_tracks_turn_count(
                script in proptest::collection::vec(command_strategy(), 1..8),
                turns in 0usize..40,
                kind in prop_oneof![Just(HazardKind::Normal), Just(HazardKind::Flying), Just(HazardKind::Strong)],
            ) {
                let (mut g, mut b) = map_from(&["  #  ", " B I ", "  ~  ", "I  L "]);
                let len = script.len();
                let mut hs = vec![Hazard::new(Pos::new(2, 1), kind, script, 0, false)];
                for _ in 0..turns {
                    step_all(&mut g, &mut b, &mut hs, NOWHERE, 0);
                    prop_assert!(g.in_bounds(hs[0].pos));
                }
                prop_assert_eq!(hs[0].cursor, turns % len);
            }
        }
    }
}
