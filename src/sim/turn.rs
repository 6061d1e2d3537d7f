/// Turn synchronizer: sequences player sub-steps, the hazard step, and the
/// collision/win checks, waiting for animations to settle in between.
///
/// ## Turn Flow
///
/// ```text
///   Idle ──submit──▶ AwaitPlayer ──settle──▶ (death check) ──▶ next sub-step
///                         │                                       │
///                         │◀──────────────── Moved ───────────────┘
///                         │
///                         └─ Finished ──▶ step hazards ──▶ AwaitHazards
///                                                             │ settle
///                                                             ▼
///                                              Goal? Won : collision? Dead
///                                                             │
///                                                             ▼
///                                                            Idle
/// ```
///
/// Settle is awaited per sub-step, not polled by timers: `tick` advances
/// every motion and only moves the state machine on once nothing is in
/// flight. If a motion never finishes, the settle timeout snaps all actors
/// to their cells and the turn continues.

use log::{debug, info, warn};

use crate::domain::entity::{Dir, Pos};
use crate::domain::hazard::{step_all, HazardStep};
use crate::domain::tile::TileKind;
use super::event::GameEvent;
use super::session::{DeathCause, Session, Status};
use super::step::{Advance, PlayerAction};

pub const DEFAULT_STEP_ANIM_MS: u32 = 120;
pub const DEFAULT_SETTLE_TIMEOUT_MS: u32 = 5000;

#[derive(Debug)]
enum Phase {
    Idle,
    AwaitPlayer(PlayerAction),
    AwaitHazards { player_prev: Pos, steps: Vec<HazardStep> },
}

#[derive(Debug)]
pub struct TurnSync {
    phase: Phase,
    step_anim_ms: u32,
    settle_timeout_ms: u32,
    waited_ms: u32,
}

impl Default for TurnSync {
    fn default() -> Self {
        TurnSync::new(DEFAULT_STEP_ANIM_MS, DEFAULT_SETTLE_TIMEOUT_MS)
    }
}

impl TurnSync {
    pub fn new(step_anim_ms: u32, settle_timeout_ms: u32) -> Self {
        TurnSync { phase: Phase::Idle, step_anim_ms, settle_timeout_ms, waited_ms: 0 }
    }

    /// True while an action or hazard step is in flight.
    pub fn is_busy(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Drop any in-flight turn (level restart).
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.waited_ms = 0;
    }

    /// Begin a player action. Returns false when the input was ignored
    /// (busy, not playing) or the first step is impossible.
    pub fn submit(&mut self, s: &mut Session, dir: Dir, events: &mut Vec<GameEvent>) -> bool {
        if self.is_busy() || !s.is_playing() {
            return false;
        }
        let Some(mut action) = PlayerAction::begin(s, dir) else {
            debug!("action {dir:?} rejected at {}", s.player.pos);
            events.push(GameEvent::ActionRejected { dir });
            return false;
        };

        s.record();
        s.move_count += 1;
        events.push(GameEvent::ActionStarted { dir });
        self.waited_ms = 0;

        match action.advance(s, self.step_anim_ms, events) {
            Advance::Moved => self.phase = Phase::AwaitPlayer(action),
            Advance::Finished(_) => self.start_hazards(s, action.vacated(), events),
        }
        true
    }

    /// Undo the last action. Ignored mid-turn and once the attempt is over.
    pub fn undo(&mut self, s: &mut Session, events: &mut Vec<GameEvent>) -> bool {
        if self.is_busy() || !s.is_playing() {
            return false;
        }
        let undone = s.undo();
        if undone {
            events.push(GameEvent::Undone);
        }
        undone
    }

    /// Advance animations by `dt_ms` and move the turn on once settled.
    pub fn tick(&mut self, s: &mut Session, dt_ms: u32, events: &mut Vec<GameEvent>) {
        if s.is_playing() {
            s.elapsed_ms += u64::from(dt_ms);
        }

        let settled = s.advance_motions(dt_ms);
        if !self.is_busy() {
            return;
        }
        if !settled {
            self.waited_ms = self.waited_ms.saturating_add(dt_ms);
            if self.waited_ms < self.settle_timeout_ms {
                return;
            }
            warn!("animation did not settle within {} ms, forcing", self.settle_timeout_ms);
            s.finish_motions();
            events.push(GameEvent::SettleTimeout);
        }
        self.waited_ms = 0;

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {}
            Phase::AwaitPlayer(action) => self.after_sub_step(s, action, events),
            Phase::AwaitHazards { player_prev, steps } => resolve_turn(s, player_prev, &steps, events),
        }
    }

    fn after_sub_step(&mut self, s: &mut Session, mut action: PlayerAction, events: &mut Vec<GameEvent>) {
        let cause = DeathCause::of_tile(s.tile_under_player())
            .or_else(|| s.lethal_hazard_at(s.player.pos).then_some(DeathCause::Caught));
        if let Some(cause) = cause {
            die(s, cause, events);
            return;
        }

        match action.advance(s, self.step_anim_ms, events) {
            Advance::Moved => self.phase = Phase::AwaitPlayer(action),
            Advance::Finished(end) => {
                debug!("action {:?} ended: {end:?} after {} sub-steps", action.dir(), action.sub_steps());
                self.start_hazards(s, action.vacated(), events);
            }
        }
    }

    fn start_hazards(&mut self, s: &mut Session, player_prev: Pos, events: &mut Vec<GameEvent>) {
        let steps = step_all(&mut s.grid, &mut s.blocks, &mut s.hazards, s.player.pos, self.step_anim_ms);
        for st in &steps {
            if st.moved() {
                events.push(GameEvent::HazardMoved { index: st.index, from: st.from, to: st.to });
            }
            if st.push.is_some() {
                events.push(GameEvent::HazardPushed { index: st.index });
            }
        }
        self.phase = Phase::AwaitHazards { player_prev, steps };
    }
}

/// Post-hazard checks. Standing on the Goal wins even if a hazard
/// arrived on the same cell.
fn resolve_turn(s: &mut Session, player_prev: Pos, steps: &[HazardStep], events: &mut Vec<GameEvent>) {
    if s.tile_under_player() == TileKind::Goal {
        s.status = Status::Won;
        info!("level won in {} moves, {} ms", s.move_count, s.elapsed_ms);
        events.push(GameEvent::LevelWon { moves: s.move_count, elapsed_ms: s.elapsed_ms });
        return;
    }

    let here = s.player.pos;
    let caught = s.hazards.iter().zip(steps).any(|(h, st)| {
        h.is_lethal() && (h.pos == here || (st.from == here && st.to == player_prev))
    });
    if caught {
        die(s, DeathCause::Caught, events);
    }
}

fn die(s: &mut Session, cause: DeathCause, events: &mut Vec<GameEvent>) {
    s.status = Status::Dead(cause);
    info!("player died at {}: {cause:?}", s.player.pos);
    events.push(GameEvent::PlayerDied { cause });
}
