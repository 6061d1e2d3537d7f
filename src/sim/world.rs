/// WorldState: everything the front-end needs between frames.
///
/// ## Phases
///
/// ```text
///   LevelSelect ──confirm (unlocked)──▶ Playing ──win──▶ Won ──confirm──▶ Playing (next)
///        ▲                                 │                    └─ last level ─▶ AllClear
///        │                                 └─death──▶ Dying ──pause──▶ Playing (restart)
///        └──────────────── back ───────────┘
/// ```
///
/// Every finished attempt (win or death) is reported to the progress sink.
///
/// ## Camera / Viewport
///
/// World coordinates and screen coordinates are separate:
///   - `camera` — viewport into the grid (top-left cell + size in cells)
///   - Renderer maps: `screen(sx, sy) = world(camera.x + sx, camera.y + sy)`
///   - Camera follows the player with a dead-zone approach
///   - Maps smaller than the viewport are centered

use log::{error, info};

use crate::config::GameConfig;
use crate::domain::entity::{Dir, Pos};
use super::event::GameEvent;
use super::level::{Level, LevelSet};
use super::progress::{is_unlocked, ProgressSink};
use super::session::{Session, Status};
use super::turn::TurnSync;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    LevelSelect,
    Playing,
    Dying,
    Won,
    AllClear,
}

/// Rows of the level list shown at once.
pub const SELECT_VISIBLE: usize = 12;

/// Camera: a viewport into the grid.
///
/// `(x, y)` is the grid coordinate of the top-left visible cell.
/// `(view_w, view_h)` is how many cells fit in the viewport; the renderer
/// sets these from the terminal size.
#[derive(Clone, Debug, Default)]
pub struct Camera {
    /// Grid X of the top-left visible cell (negative when centering)
    pub x: i32,
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    /// Dead-zone follow: only scroll when the target nears the edge.
    pub fn follow(&mut self, target: Pos, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }
        self.x = follow_axis(self.x, target.x, self.view_w, world_w);
        self.y = follow_axis(self.y, target.y, self.view_h, world_h);
    }

    /// Snap to center on a position (level start).
    pub fn center_on(&mut self, target: Pos, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }
        self.x = center_axis(target.x, self.view_w, world_w);
        self.y = center_axis(target.y, self.view_h, world_h);
    }

    /// Grid cell to viewport cell, None when off screen.
    pub fn world_to_view(&self, pos: Pos) -> Option<(usize, usize)> {
        let vx = pos.x - self.x;
        let vy = pos.y - self.y;
        if vx >= 0 && vx < self.view_w as i32 && vy >= 0 && vy < self.view_h as i32 {
            Some((vx as usize, vy as usize))
        } else {
            None
        }
    }
}

fn follow_axis(cur: i32, target: i32, view: usize, world: usize) -> i32 {
    let (view, world) = (view as i32, world as i32);
    if world <= view {
        return -((view - world) / 2);
    }
    // 20% margin on each side
    let margin = view / 5;
    let mut pos = cur;
    if target < cur + margin {
        pos = target - margin;
    } else if target > cur + view - margin - 1 {
        pos = target - view + margin + 1;
    }
    pos.clamp(0, world - view)
}

fn center_axis(target: i32, view: usize, world: usize) -> i32 {
    let (view, world) = (view as i32, world as i32);
    if world <= view {
        -((view - world) / 2)
    } else {
        (target - view / 2).clamp(0, world - view)
    }
}

pub struct WorldState {
    // ── Levels ──
    pub levels: Vec<Level>,
    pub source_label: String,
    pub current: usize,

    // ── Play ──
    pub session: Option<Session>,
    pub turn: TurnSync,
    pub phase: Phase,
    phase_ms: u32,
    undo_limit: usize,
    death_pause_ms: u32,
    step_anim_ms: u32,
    settle_timeout_ms: u32,

    // ── UI ──
    pub message: String,
    pub message_ms: u32,
    /// Free-running clock for blinking.
    pub anim_ms: u64,
    pub camera: Camera,
    pub select_cursor: usize,
    pub select_scroll: usize,
}

impl WorldState {
    pub fn new(set: LevelSet, config: &GameConfig) -> Self {
        WorldState {
            levels: set.levels,
            source_label: set.source.label(),
            current: 0,
            session: None,
            turn: TurnSync::new(config.speed.step_anim_ms, config.speed.settle_timeout_ms),
            phase: Phase::LevelSelect,
            phase_ms: 0,
            undo_limit: config.play.undo_limit,
            death_pause_ms: config.play.death_pause_ms,
            step_anim_ms: config.speed.step_anim_ms,
            settle_timeout_ms: config.speed.settle_timeout_ms,
            message: String::new(),
            message_ms: 0,
            anim_ms: 0,
            camera: Camera::default(),
            select_cursor: 0,
            select_scroll: 0,
        }
    }

    pub fn set_message(&mut self, msg: &str, duration_ms: u32) {
        self.message = msg.to_string();
        self.message_ms = duration_ms;
    }

    pub fn level(&self) -> Option<&Level> {
        self.levels.get(self.current)
    }

    pub fn is_unlocked(&self, progress: &dyn ProgressSink, idx: usize) -> bool {
        is_unlocked(progress, &self.levels, idx)
    }

    // ── Level lifecycle ──

    /// Build a fresh session for level `idx`. Invalid level data is logged
    /// and leaves the world on level select.
    pub fn start_level(&mut self, idx: usize) -> bool {
        let Some(level) = self.levels.get(idx) else {
            return false;
        };
        match Session::new(level, self.undo_limit) {
            Ok(session) => {
                info!("starting level {} {:?}", idx + 1, level.name);
                self.camera.center_on(session.player.pos, session.grid.width(), session.grid.height());
                self.session = Some(session);
                self.current = idx;
                self.turn = TurnSync::new(self.step_anim_ms, self.settle_timeout_ms);
                self.phase = Phase::Playing;
                self.phase_ms = 0;
                true
            }
            Err(e) => {
                error!("cannot start level {:?}: {e}", level.name);
                let msg = format!("Level {} is broken: {e}", idx + 1);
                self.set_message(&msg, 4000);
                self.back_to_select();
                false
            }
        }
    }

    /// Discard the attempt and start the current level over.
    pub fn restart_level(&mut self, events: &mut Vec<GameEvent>) {
        if self.session.is_some() && self.start_level(self.current) {
            events.push(GameEvent::Restarted);
        }
    }

    pub fn back_to_select(&mut self) {
        self.session = None;
        self.turn.reset();
        self.phase = Phase::LevelSelect;
        self.select_cursor = self.current.min(self.levels.len().saturating_sub(1));
        self.select_scroll = self.select_cursor.saturating_sub(SELECT_VISIBLE / 2);
    }

    /// After a win: next level, or the end screen after the last one.
    pub fn advance_after_win(&mut self) {
        if self.phase != Phase::Won {
            return;
        }
        let next = self.current + 1;
        if next < self.levels.len() {
            self.start_level(next);
        } else {
            self.session = None;
            self.phase = Phase::AllClear;
        }
    }

    // ── Player intents ──

    pub fn submit_move(&mut self, dir: Dir, events: &mut Vec<GameEvent>) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        match self.session.as_mut() {
            Some(s) => self.turn.submit(s, dir, events),
            None => false,
        }
    }

    pub fn undo(&mut self, events: &mut Vec<GameEvent>) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        match self.session.as_mut() {
            Some(s) => self.turn.undo(s, events),
            None => false,
        }
    }

    // ── Level select ──

    pub fn select_move(&mut self, delta: i32) {
        let total = self.levels.len();
        if total == 0 {
            return;
        }
        let cur = self.select_cursor as i64 + i64::from(delta);
        self.select_cursor = cur.clamp(0, total as i64 - 1) as usize;
        if self.select_cursor < self.select_scroll {
            self.select_scroll = self.select_cursor;
        } else if self.select_cursor >= self.select_scroll + SELECT_VISIBLE {
            self.select_scroll = self.select_cursor + 1 - SELECT_VISIBLE;
        }
    }

    pub fn select_confirm(&mut self, progress: &dyn ProgressSink) -> bool {
        let idx = self.select_cursor;
        if !self.is_unlocked(progress, idx) {
            self.set_message("Locked: finish the previous level first", 2000);
            return false;
        }
        self.start_level(idx)
    }

    // ── Time ──

    /// Advance by `dt_ms`: animations, turn resolution, phase timers.
    /// Finished attempts are reported to `progress`.
    pub fn tick(&mut self, dt_ms: u32, progress: &mut dyn ProgressSink, events: &mut Vec<GameEvent>) {
        self.anim_ms += u64::from(dt_ms);
        if self.message_ms > 0 {
            self.message_ms = self.message_ms.saturating_sub(dt_ms);
            if self.message_ms == 0 {
                self.message.clear();
            }
        }

        match self.phase {
            Phase::Playing => self.tick_playing(dt_ms, progress, events),
            Phase::Dying => {
                self.phase_ms = self.phase_ms.saturating_add(dt_ms);
                if let Some(s) = self.session.as_mut() {
                    s.advance_motions(dt_ms);
                }
                if self.phase_ms >= self.death_pause_ms {
                    self.restart_level(events);
                }
            }
            Phase::Won => {
                if let Some(s) = self.session.as_mut() {
                    s.advance_motions(dt_ms);
                }
            }
            Phase::LevelSelect | Phase::AllClear => {}
        }
    }

    fn tick_playing(&mut self, dt_ms: u32, progress: &mut dyn ProgressSink, events: &mut Vec<GameEvent>) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        self.turn.tick(s, dt_ms, events);
        self.camera.follow(s.player.pos, s.grid.width(), s.grid.height());

        let id = self.levels.get(self.current).map(|l| l.id().to_string()).unwrap_or_default();
        match s.status {
            Status::Playing => {}
            Status::Won => {
                progress.record_attempt(&id, true, s.elapsed_ms, s.move_count);
                self.phase = Phase::Won;
                self.phase_ms = 0;
            }
            Status::Dead(_) => {
                progress.record_attempt(&id, false, s.elapsed_ms, s.move_count);
                self.phase = Phase::Dying;
                self.phase_ms = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level::{parse_text_level, LevelSource};
    use crate::sim::progress::Progress;
    use crate::sim::session::DeathCause;

    fn world(texts: &[&str]) -> WorldState {
        let levels = texts.iter().map(|t| parse_text_level(t).unwrap()).collect();
        let mut cfg = GameConfig::default();
        cfg.speed.step_anim_ms = 0;
        cfg.play.death_pause_ms = 100;
        WorldState::new(LevelSet { source: LevelSource::Embedded, levels }, &cfg)
    }

    fn run(w: &mut WorldState, p: &mut Progress, ms: u32) -> Vec<GameEvent> {
        let mut ev = vec![];
        for _ in 0..(ms / 10) {
            w.tick(10, p, &mut ev);
        }
        ev
    }

    #[test]
    fn win_records_progress_and_advances() {
        let mut w = world(&["# a\nPG\n", "# b\nP G\n"]);
        let mut p = Progress::default();
        assert!(!w.select_confirm_at(1, &p));
        assert!(w.select_confirm_at(0, &p));

        w.submit_move(Dir::Right, &mut vec![]);
        run(&mut w, &mut p, 100);
        assert_eq!(w.phase, Phase::Won);
        assert!(p.is_completed("a"));
        assert!(w.is_unlocked(&p, 1));

        w.advance_after_win();
        assert_eq!(w.phase, Phase::Playing);
        assert_eq!(w.current, 1);

        w.submit_move(Dir::Right, &mut vec![]);
        run(&mut w, &mut p, 100);
        w.submit_move(Dir::Right, &mut vec![]);
        run(&mut w, &mut p, 100);
        assert_eq!(w.phase, Phase::Won);
        w.advance_after_win();
        assert_eq!(w.phase, Phase::AllClear);
    }

    #[test]
    fn death_records_attempt_then_restarts() {
        let mut w = world(&["# pit\nP~\n"]);
        let mut p = Progress::default();
        w.start_level(0);
        w.submit_move(Dir::Right, &mut vec![]);
        run(&mut w, &mut p, 50);
        assert_eq!(w.phase, Phase::Dying);
        assert_eq!(
            w.session.as_ref().map(|s| s.status),
            Some(Status::Dead(DeathCause::Drowned))
        );
        assert_eq!(p.record("pit").map(|r| r.attempts), Some(1));
        assert!(!p.is_completed("pit"));

        let ev = run(&mut w, &mut p, 200);
        assert!(ev.contains(&GameEvent::Restarted));
        assert_eq!(w.phase, Phase::Playing);
        assert_eq!(w.session.as_ref().map(|s| s.player.pos), Some(Pos::new(0, 0)));
    }

    #[test]
    fn broken_level_stays_on_select() {
        let mut w = world(&["= moves 0\nP \n"]);
        assert!(!w.start_level(0));
        assert_eq!(w.phase, Phase::LevelSelect);
        assert!(w.session.is_none());
        assert!(w.message.contains("broken"));
    }

    #[test]
    fn input_ignored_outside_play() {
        let mut w = world(&["P G\n"]);
        assert!(!w.submit_move(Dir::Right, &mut vec![]));
        assert!(!w.undo(&mut vec![]));
    }

    #[test]
    fn undo_through_world() {
        let mut w = world(&["P  G\n"]);
        let mut p = Progress::default();
        w.start_level(0);
        w.submit_move(Dir::Right, &mut vec![]);
        run(&mut w, &mut p, 50);
        let mut ev = vec![];
        assert!(w.undo(&mut ev));
        assert_eq!(ev, vec![GameEvent::Undone]);
        assert_eq!(w.session.as_ref().map(|s| s.player.pos), Some(Pos::new(0, 0)));
    }

    #[test]
    fn select_cursor_scrolls() {
        let texts: Vec<String> = (0..30).map(|i| format!("# L{i}\nPG\n")).collect();
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let mut w = world(&refs);
        w.select_move(20);
        assert_eq!(w.select_cursor, 20);
        assert_eq!(w.select_scroll, 20 + 1 - SELECT_VISIBLE);
        w.select_move(-100);
        assert_eq!((w.select_cursor, w.select_scroll), (0, 0));
        w.select_move(100);
        assert_eq!(w.select_cursor, 29);
    }

    #[test]
    fn camera_centers_small_maps_and_follows_large() {
        let mut cam = Camera { x: 0, y: 0, view_w: 10, view_h: 5 };
        cam.center_on(Pos::new(2, 1), 4, 3);
        assert_eq!((cam.x, cam.y), (-3, -1));

        cam.center_on(Pos::new(0, 0), 40, 20);
        assert_eq!((cam.x, cam.y), (0, 0));
        cam.follow(Pos::new(9, 0), 40, 20);
        assert_eq!(cam.x, 2);
        assert_eq!(cam.world_to_view(Pos::new(9, 0)), Some((7, 0)));
        assert_eq!(cam.world_to_view(Pos::new(1, 0)), None);
    }

    impl WorldState {
        fn select_confirm_at(&mut self, idx: usize, p: &Progress) -> bool {
            self.select_cursor = idx;
            self.select_confirm(p)
        }
    }
}
