/// Movement engine: turns one accepted player action into a sequence of
/// discrete sub-steps.
///
/// An action is a resumable state machine (`PlayerAction`). Each call to
/// `advance` performs exactly one sub-step and returns; the turn
/// synchronizer waits for the resulting animation to settle before
/// calling it again.
///
/// Sub-step kinds:
///   1. Counted step — one cell in the input direction. Consumes one unit
///      of `moveDistance`. May push a block chain (which ends the action).
///   2. Forced step  — ice slide or conveyor move. Never consumes budget.
///
/// ## After-Landing Table
///
/// ┌──────────────────────┬───────────────────────────────────────────────┐
/// │ Tile landed on       │ Next sub-step                                 │
/// ├──────────────────────┼───────────────────────────────────────────────┤
/// │ Water / Lava / Goal  │ none: action ends (death/win checked later)   │
/// │ Ice                  │ forced step in the direction of travel        │
/// │ Conveyor(d)          │ forced step in direction d                    │
/// │ anything else        │ counted step, if budget remains               │
/// └──────────────────────┴───────────────────────────────────────────────┘
///
/// A forced step whose next cell is Wall, block or edge ends the action
/// where the player stands. Forced steps between two counted steps are
/// capped at the grid area, so conveyor loops terminate.

use log::{debug, warn};

use crate::domain::entity::{motion_between, Dir, Pos};
use crate::domain::push::{apply_push, plan_push, LeadFate, PushCheck};
use crate::domain::rules::{is_walkable, stops_slide};
use super::event::GameEvent;
use super::session::Session;

/// Why an action stopped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActionEnd {
    /// All counted steps used.
    BudgetSpent,
    /// A push resolved; pushes always end the action.
    Pushed,
    /// Landed on Water, Lava or Goal.
    Terrain,
    /// The next counted step hit Wall, edge or an immovable chain.
    Blocked,
    /// An ice slide stopped on an Ice cell.
    SlideHalted,
    /// A conveyor could not move the player.
    ConveyorJammed,
    /// Terrain continuations exceeded the grid area.
    ChainLimit,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Advance {
    /// One sub-step happened; wait for it to settle.
    Moved,
    Finished(ActionEnd),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Force {
    Ice,
    Conveyor,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Next {
    Counted,
    Forced { dir: Dir, by: Force },
    Done(ActionEnd),
}

#[derive(Clone, Debug)]
pub struct PlayerAction {
    dir: Dir,
    budget: u32,
    next: Next,
    /// Forced steps since the last counted step.
    chain: usize,
    /// Cell left by the most recent sub-step.
    vacated: Pos,
    sub_steps: u32,
}

impl PlayerAction {
    /// Validate the first step. Returns None when the action would change
    /// nothing: Wall or edge ahead, or a block chain that cannot move.
    pub fn begin(session: &Session, dir: Dir) -> Option<Self> {
        let here = session.player.pos;
        let target = here.step(dir);
        if !is_walkable(&session.grid, target) {
            debug!("move {dir:?} rejected: {target} is not walkable");
            return None;
        }
        if plan_push(&session.grid, &session.blocks, target, dir) == PushCheck::Blocked {
            debug!("move {dir:?} rejected: chain at {target} cannot move");
            return None;
        }
        Some(PlayerAction {
            dir,
            budget: session.move_distance,
            next: Next::Counted,
            chain: 0,
            vacated: here,
            sub_steps: 0,
        })
    }

    pub fn dir(&self) -> Dir {
        self.dir
    }

    /// Cell vacated by the last sub-step (for swap collisions).
    pub fn vacated(&self) -> Pos {
        self.vacated
    }

    pub fn sub_steps(&self) -> u32 {
        self.sub_steps
    }

    /// Perform the next sub-step.
    pub fn advance(&mut self, s: &mut Session, anim_ms: u32, events: &mut Vec<GameEvent>) -> Advance {
        match self.next {
            Next::Done(end) => Advance::Finished(end),
            Next::Counted => self.counted_step(s, anim_ms, events),
            Next::Forced { dir, by } => self.forced_step(s, dir, by, anim_ms, events),
        }
    }

    fn finish(&mut self, end: ActionEnd) -> Advance {
        self.next = Next::Done(end);
        Advance::Finished(end)
    }

    fn counted_step(&mut self, s: &mut Session, anim_ms: u32, events: &mut Vec<GameEvent>) -> Advance {
        if self.budget == 0 {
            return self.finish(ActionEnd::BudgetSpent);
        }
        let target = s.player.pos.step(self.dir);
        if !is_walkable(&s.grid, target) {
            return self.finish(ActionEnd::Blocked);
        }

        match plan_push(&s.grid, &s.blocks, target, self.dir) {
            PushCheck::Blocked => return self.finish(ActionEnd::Blocked),
            PushCheck::Ready(plan) => {
                let out = apply_push(&mut s.grid, &mut s.blocks, &plan, anim_ms);
                events.push(match out.fate {
                    LeadFate::Shift => GameEvent::BlockPushed { target: out.target },
                    LeadFate::Bridge => GameEvent::Bridged { at: out.target },
                    LeadFate::Sunk => GameEvent::BlockBurned { at: out.target },
                });
                self.move_player(s, target, anim_ms);
                events.push(GameEvent::PlayerMoved { from: self.vacated, to: target });
                self.budget -= 1;
                self.next = Next::Done(ActionEnd::Pushed);
                return Advance::Moved;
            }
            PushCheck::Nothing => {}
        }

        self.move_player(s, target, anim_ms);
        events.push(GameEvent::PlayerMoved { from: self.vacated, to: target });
        self.budget -= 1;
        self.chain = 0;
        self.next = self.after_landing(s, self.dir);
        Advance::Moved
    }

    fn forced_step(
        &mut self,
        s: &mut Session,
        dir: Dir,
        by: Force,
        anim_ms: u32,
        events: &mut Vec<GameEvent>,
    ) -> Advance {
        let target = s.player.pos.step(dir);
        if stops_slide(&s.grid, &s.blocks, target) {
            return self.finish(match by {
                Force::Ice => ActionEnd::SlideHalted,
                Force::Conveyor => ActionEnd::ConveyorJammed,
            });
        }
        if self.chain >= s.grid.area() {
            warn!("terrain chain exceeded {} cells at {}, ending action", s.grid.area(), s.player.pos);
            return self.finish(ActionEnd::ChainLimit);
        }
        self.chain += 1;

        self.move_player(s, target, anim_ms);
        events.push(match by {
            Force::Ice => GameEvent::Slid { to: target },
            Force::Conveyor => GameEvent::Conveyed { to: target },
        });
        self.next = self.after_landing(s, dir);
        Advance::Moved
    }

    fn after_landing(&self, s: &Session, heading: Dir) -> Next {
        let tile = s.tile_under_player();
        if tile.ends_action() {
            Next::Done(ActionEnd::Terrain)
        } else if tile.is_ice() {
            Next::Forced { dir: heading, by: Force::Ice }
        } else if let Some(d) = tile.conveyor() {
            Next::Forced { dir: d, by: Force::Conveyor }
        } else {
            Next::Counted
        }
    }

    fn move_player(&mut self, s: &mut Session, to: Pos, anim_ms: u32) {
        let from = s.player.pos;
        s.player.pos = to;
        s.player.motion = motion_between(from, to, anim_ms);
        self.vacated = from;
        self.sub_steps += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::TileKind;
    use crate::sim::level::parse_text_level;

    fn session(text: &str) -> Session {
        Session::new(&parse_text_level(text).expect("test level parses"), 0).expect("valid level")
    }

    /// Run an action to completion with instant animation.
    fn run(s: &mut Session, dir: Dir) -> Option<(ActionEnd, Vec<GameEvent>)> {
        let mut action = PlayerAction::begin(s, dir)?;
        let mut events = vec![];
        for _ in 0..1000 {
            if let Advance::Finished(end) = action.advance(s, 0, &mut events) {
                return Some((end, events));
            }
        }
        panic!("action did not finish");
    }

    fn block_positions(s: &Session) -> Vec<Pos> {
        let mut v: Vec<Pos> = s.blocks.iter().map(|b| b.pos).collect();
        v.sort_by_key(|p| (p.y, p.x));
        v
    }

    #[test]
    fn single_push_moves_block_and_player_one_cell() {
        let mut s = session("PB  \n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::Pushed);
        assert_eq!(s.player.pos, Pos::new(1, 0));
        assert_eq!(block_positions(&s), vec![Pos::new(2, 0)]);
    }

    #[test]
    fn push_ends_action_despite_budget() {
        let mut s = session("= moves 3\nPB    \n");
        run(&mut s, Dir::Right).unwrap();
        assert_eq!(s.player.pos, Pos::new(1, 0));
        assert_eq!(block_positions(&s), vec![Pos::new(2, 0)]);
    }

    #[test]
    fn stuck_chain_rejects_action() {
        let mut s = session("PBBB#\n");
        assert!(run(&mut s, Dir::Right).is_none());
        assert_eq!(s.player.pos, Pos::new(0, 0));
        assert_eq!(
            block_positions(&s),
            vec![Pos::new(1, 0), Pos::new(2, 0), Pos::new(3, 0)]
        );
    }

    #[test]
    fn wall_and_edge_reject_action() {
        let mut s = session("P#\n");
        assert!(run(&mut s, Dir::Right).is_none());
        assert!(run(&mut s, Dir::Left).is_none());
        assert!(run(&mut s, Dir::Up).is_none());
    }

    #[test]
    fn push_into_water_builds_bridge() {
        let mut s = session("PB~ \n");
        let (_, events) = run(&mut s, Dir::Right).unwrap();
        assert!(s.blocks.is_empty());
        assert_eq!(s.grid.terrain_at(Pos::new(2, 0)), TileKind::Empty);
        assert_eq!(s.player.pos, Pos::new(1, 0));
        assert!(events.contains(&GameEvent::Bridged { at: Pos::new(2, 0) }));
    }

    #[test]
    fn push_into_lava_keeps_lava() {
        let mut s = session("PBL\n");
        run(&mut s, Dir::Right).unwrap();
        assert!(s.blocks.is_empty());
        assert_eq!(s.grid.terrain_at(Pos::new(2, 0)), TileKind::Lava);
        assert_eq!(s.player.pos, Pos::new(1, 0));
    }

    #[test]
    fn multi_step_uses_full_budget() {
        let mut s = session("= moves 3\nP     \n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::BudgetSpent);
        assert_eq!(s.player.pos, Pos::new(3, 0));
    }

    #[test]
    fn goal_ends_action_early() {
        let mut s = session("= moves 5\nP  G   \n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::Terrain);
        assert_eq!(s.player.pos, Pos::new(3, 0));
    }

    #[test]
    fn goal_reached_on_last_counted_step() {
        let mut s = session("= moves 3\nP  G \n");
        run(&mut s, Dir::Right).unwrap();
        assert_eq!(s.player.pos, Pos::new(3, 0));
    }

    #[test]
    fn blocked_mid_action_keeps_progress() {
        let mut s = session("= moves 4\nP  #\n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::Blocked);
        assert_eq!(s.player.pos, Pos::new(2, 0));
    }

    #[test]
    fn ice_stops_one_short_of_wall() {
        let mut s = session("PII#\n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::SlideHalted);
        assert_eq!(s.player.pos, Pos::new(2, 0));
    }

    #[test]
    fn ice_onto_floor_stops_before_wall() {
        let mut s = session("PI #\n");
        run(&mut s, Dir::Right).unwrap();
        assert_eq!(s.player.pos, Pos::new(2, 0));
    }

    #[test]
    fn slide_does_not_consume_budget() {
        let mut s = session("= moves 2\nPI    \n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::BudgetSpent);
        assert_eq!(s.player.pos, Pos::new(3, 0));
    }

    #[test]
    fn slide_stops_before_block() {
        let mut s = session("PIIB \n");
        run(&mut s, Dir::Right).unwrap();
        assert_eq!(s.player.pos, Pos::new(2, 0));
        assert_eq!(block_positions(&s), vec![Pos::new(3, 0)]);
    }

    #[test]
    fn slide_into_water_drowns_path() {
        let mut s = session("PI~ \n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::Terrain);
        assert_eq!(s.player.pos, Pos::new(2, 0));
    }

    #[test]
    fn conveyor_redirects() {
        let mut s = session(" . \nP^ \n");
        let (_, events) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(s.player.pos, Pos::new(1, 0));
        assert!(events.contains(&GameEvent::Conveyed { to: Pos::new(1, 0) }));
    }

    #[test]
    fn conveyor_into_ice_chains() {
        let mut s = session("P>II#\n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::SlideHalted);
        assert_eq!(s.player.pos, Pos::new(3, 0));
    }

    #[test]
    fn jammed_conveyor_holds_player() {
        let mut s = session("P>#\n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::ConveyorJammed);
        assert_eq!(s.player.pos, Pos::new(1, 0));
    }

    #[test]
    fn conveyor_loop_terminates() {
        let mut s = session("P>v\n ^<\n");
        let (end, _) = run(&mut s, Dir::Right).unwrap();
        assert_eq!(end, ActionEnd::ChainLimit);
    }

    #[test]
    fn vacated_tracks_last_sub_step() {
        let mut s = session("= moves 2\nP   \n");
        let mut action = PlayerAction::begin(&s, Dir::Right).unwrap();
        let mut ev = vec![];
        assert_eq!(action.advance(&mut s, 0, &mut ev), Advance::Moved);
        assert_eq!(action.vacated(), Pos::new(0, 0));
        assert_eq!(action.advance(&mut s, 0, &mut ev), Advance::Moved);
        assert_eq!(action.vacated(), Pos::new(1, 0));
        assert_eq!(action.advance(&mut s, 0, &mut ev), Advance::Finished(ActionEnd::BudgetSpent));
        assert_eq!(action.sub_steps(), 2);
    }

    #[test]
    fn sub_steps_animate() {
        let mut s = session("P  \n");
        let mut action = PlayerAction::begin(&s, Dir::Right).unwrap();
        action.advance(&mut s, 120, &mut vec![]);
        let m = s.player.motion.expect("player animates");
        assert_eq!(m.from, Pos::new(0, 0));
        assert_eq!(m.duration_ms, 120);
    }
}
