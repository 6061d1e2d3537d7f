/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// This eliminates flicker caused by full-screen redraws.
///
/// The renderer only reads the session. Actors in flight are drawn at
/// their cell plus the motion offset, rounded to the nearest cell, in
/// draw order tiles → blocks → hazards → player.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{HazardKind, Motion, Pos};
use crate::domain::tile::TileKind;
use crate::sim::progress::ProgressSink;
use crate::sim::session::{DeathCause, Session, Status};
use crate::sim::world::{Phase, WorldState, SELECT_VISIBLE};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 16],  // up to 16 bytes (supports ZWJ emoji sequences)
    ch_len: u8,
    fg: Color,
    bg: Color,
    wide: bool,    // true = this char occupies 2 terminal columns
    cont: bool,    // true = continuation of previous wide char (skip render)
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells.
    ///
    /// Using the same RGB for `Clear(ClearType::All)` and every cell's
    /// background keeps the inter-row gap pixels on VTE terminals from
    /// showing as horizontal lines.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0,0,0, 0,0,0,0, 0,0,0,0, 0,0,0,0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: false,
    };

    const WIDE_CONT: Cell = Cell {
        ch: [0; 16],
        ch_len: 0,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: true,
    };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell {
        ch: [b'?', 0,0,0, 0,0,0,0, 0,0,0,0, 0,0,0,0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
        wide: false,
        cont: false,
    };

    /// Normalize bg: Color::Reset → BASE_BG so that every cell gets an
    /// explicit background color (never terminal-default).
    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        let len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.ch_len = len;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    fn from_char_wide(c: char, bg: Color) -> Self {
        let mut cell = Self::from_char(c, Color::Reset, bg);
        cell.wide = true;
        cell
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or("")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::from_char(ch, fg, bg));
        }
    }

    /// Full-width bar with text.
    fn put_bar(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::from_char(' ', fg, bg));
        }
        self.put_str(0, y, s, fg, bg);
    }
}

// ── Glyphs ──

/// Two terminal columns per grid cell.
fn tile_glyph(tile: TileKind) -> (char, char, Color, Color) {
    match tile {
        TileKind::Empty | TileKind::Block => (' ', ' ', Color::Reset, Color::Reset),
        TileKind::Wall  => ('█', '█', Color::Rgb{r:120,g:120,b:120}, Color::Rgb{r:70,g:70,b:70}),
        TileKind::Water => ('≈', '≈', Color::Rgb{r:120,g:180,b:255}, Color::Rgb{r:20,g:50,b:120}),
        TileKind::Goal  => ('◆', '◆', Color::Rgb{r:255,g:220,b:50}, Color::Rgb{r:60,g:50,b:0}),
        TileKind::Ice   => ('░', '░', Color::Rgb{r:200,g:240,b:255}, Color::Rgb{r:90,g:130,b:150}),
        TileKind::Lava  => ('▓', '▓', Color::Rgb{r:255,g:140,b:0}, Color::Rgb{r:150,g:30,b:0}),
        TileKind::ConveyorUp    => ('↑', '↑', Color::Rgb{r:255,g:255,b:120}, Color::Rgb{r:60,g:60,b:60}),
        TileKind::ConveyorDown  => ('↓', '↓', Color::Rgb{r:255,g:255,b:120}, Color::Rgb{r:60,g:60,b:60}),
        TileKind::ConveyorLeft  => ('←', '←', Color::Rgb{r:255,g:255,b:120}, Color::Rgb{r:60,g:60,b:60}),
        TileKind::ConveyorRight => ('→', '→', Color::Rgb{r:255,g:255,b:120}, Color::Rgb{r:60,g:60,b:60}),
    }
}

fn hazard_glyph(kind: HazardKind, can_attack: bool) -> char {
    match kind {
        HazardKind::Normal => '🔴',
        HazardKind::Flying => '👻',
        HazardKind::Strong if can_attack => '👹',
        HazardKind::Strong => '🗿',
    }
}

/// Cell an actor is drawn in: its logical cell shifted back along the
/// unfinished part of its motion.
fn draw_pos(pos: Pos, motion: Option<&Motion>) -> Pos {
    match motion {
        Some(m) => {
            let (dx, dy) = m.offset(pos);
            Pos::new(pos.x + dx.round() as i32, pos.y + dy.round() as i32)
        }
        None => pos,
    }
}

fn death_text(cause: DeathCause) -> &'static str {
    match cause {
        DeathCause::Drowned => "DROWNED",
        DeathCause::Burned => "BURNED",
        DeathCause::Caught => "CAUGHT BY AN ORB",
    }
}

fn format_time(ms: u64) -> String {
    format!("{}:{:02}.{}", ms / 60_000, (ms / 1000) % 60, (ms / 100) % 10)
}

// ── Renderer ──

const CELL_W: usize = 2;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, world: &mut WorldState, progress: &dyn ProgressSink) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Viewport: HUD + gap above the map, instructions + message + help below.
        let reserved_rows = MAP_ROW + 4;
        if let Some(s) = &world.session {
            let (gw, gh) = (s.grid.width(), s.grid.height());
            world.camera.view_w = (self.term_w / CELL_W).max(1).min(gw);
            world.camera.view_h = self.term_h.saturating_sub(reserved_rows).max(1).min(gh);
        }

        // Phase change → clear for a clean transition
        if self.last_phase != Some(world.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
            if let Some(s) = &world.session {
                world.camera.center_on(s.player.pos, s.grid.width(), s.grid.height());
            }
        }

        self.front.clear();

        match world.phase {
            Phase::LevelSelect => self.compose_level_select(world, progress),
            Phase::Playing => self.compose_game(world),
            Phase::Dying => {
                self.compose_game(world);
                self.compose_dying_overlay(world);
            }
            Phase::Won => {
                self.compose_game(world);
                self.compose_won_overlay(world);
            }
            Phase::AllClear => self.compose_all_clear(world),
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors. ResetColor would fall back to the terminal's
        // default, which may differ from BASE_BG.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            let mut x = 0;
            while x < self.front.width {
                let cell = self.front.get(x, y);
                let prev = self.back.get(x, y);

                // Skip continuation cells (right half of wide emoji)
                if cell.cont {
                    if cell != prev { need_move = true; }
                    x += 1;
                    continue;
                }

                let cont_changed = cell.wide
                    && x + 1 < self.front.width
                    && self.front.get(x + 1, y) != self.back.get(x + 1, y);

                if cell == prev && !cont_changed {
                    need_move = true;
                    x += 1;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }

                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.as_str()))?;

                if cell.wide {
                    last_x = x + 1;
                    x += 2;
                } else {
                    last_x = x;
                    x += 1;
                }
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, w: &WorldState) {
        let Some(s) = &w.session else { return };
        let cam = &w.camera;

        // ── HUD row ──
        let name = w.level().map_or("", |l| l.name.as_str());
        let hud = format!(
            " Lv.{:<2} {}   Moves:{:<4} Stride:{}  Time:{}  Undo:{}",
            w.current + 1,
            name,
            s.move_count,
            s.move_distance,
            format_time(s.elapsed_ms),
            s.history_len(),
        );
        self.front.put_bar(HUD_ROW, &hud, Color::White, HUD_BG);

        // ── Map (camera viewport) ──
        for vy in 0..cam.view_h {
            let row = MAP_ROW + vy;
            for vx in 0..cam.view_w {
                let col = vx * CELL_W;
                let wpos = Pos::new(cam.x + vx as i32, cam.y + vy as i32);
                if s.grid.in_bounds(wpos) {
                    let (c0, c1, fg, bg) = tile_glyph(s.grid.terrain_at(wpos));
                    self.front.set(col, row, Cell::from_char(c0, fg, bg));
                    self.front.set(col + 1, row, Cell::from_char(c1, fg, bg));
                }
            }
        }
        self.compose_actors(w, s);

        // ── Instructions ──
        let below = MAP_ROW + cam.view_h + 1;
        if let Some(level) = w.level() {
            if !level.instructions.is_empty() {
                self.front.put_str(1, below, &level.instructions, Color::Rgb{r:180,g:180,b:180}, Color::Reset);
            }
        }

        // ── Message bar ──
        if !w.message.is_empty() {
            let msg = format!(" ◈ {} ", w.message);
            self.front.put_bar(below + 1, &msg, Color::Black, MSG_BG);
        }

        // ── Help bar ──
        let help = " ←→↑↓/WASD: Move   Z/U: Undo   R: Restart   ESC: Levels   Ctrl+C: Quit";
        self.front.put_str(0, below + 2, help, Color::DarkGrey, Color::Reset);
    }

    /// Blocks, then hazards, then the player, each at its animated cell.
    fn compose_actors(&mut self, w: &WorldState, s: &Session) {
        let block_bg = Color::Rgb{r:110,g:70,b:30};
        for b in &s.blocks {
            if let Some((vx, vy)) = w.camera.world_to_view(draw_pos(b.pos, b.motion.as_ref())) {
                let (col, row) = (vx * CELL_W, MAP_ROW + vy);
                let fg = Color::Rgb{r:230,g:180,b:110};
                self.front.set(col, row, Cell::from_char('[', fg, block_bg));
                self.front.set(col + 1, row, Cell::from_char(']', fg, block_bg));
            }
        }

        for h in &s.hazards {
            if let Some((vx, vy)) = w.camera.world_to_view(draw_pos(h.pos, h.motion.as_ref())) {
                let (col, row) = (vx * CELL_W, MAP_ROW + vy);
                let bg = tile_glyph(s.grid.terrain_at(h.pos)).3;
                self.front.set(col, row, Cell::from_char_wide(hazard_glyph(h.kind, h.can_attack), bg));
                self.front.set(col + 1, row, Cell::WIDE_CONT);
            }
        }

        let p = &s.player;
        if let Some((vx, vy)) = w.camera.world_to_view(draw_pos(p.pos, p.motion.as_ref())) {
            let (col, row) = (vx * CELL_W, MAP_ROW + vy);
            let ch = match s.status {
                Status::Dead(_) => '💀',
                Status::Won => '🥳',
                Status::Playing => '🧍',
            };
            let bg = tile_glyph(s.grid.terrain_at(p.pos)).3;
            self.front.set(col, row, Cell::from_char_wide(ch, bg));
            self.front.set(col + 1, row, Cell::WIDE_CONT);
        }
    }

    /// Box centered over the map viewport.
    fn compose_banner(&mut self, w: &WorldState, lines: &[String], fg: Color) {
        let bg = Color::Rgb{r:40,g:40,b:40};
        let inner = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
        let view_cols = (w.camera.view_w * CELL_W).max(inner + 2);
        let box_x = view_cols.saturating_sub(inner + 2) / 2;
        let box_y = MAP_ROW + w.camera.view_h.saturating_sub(lines.len() + 2) / 2;

        let bar = "═".repeat(inner);
        self.front.put_str(box_x, box_y, &format!("╔{bar}╗"), fg, bg);
        for (i, line) in lines.iter().enumerate() {
            let pad = inner - line.chars().count();
            let text = format!("║{}{}{}║", " ".repeat(pad / 2), line, " ".repeat(pad - pad / 2));
            self.front.put_str(box_x, box_y + 1 + i, &text, fg, bg);
        }
        self.front.put_str(box_x, box_y + 1 + lines.len(), &format!("╚{bar}╝"), fg, bg);
    }

    fn compose_dying_overlay(&mut self, w: &WorldState) {
        let Some(Status::Dead(cause)) = w.session.as_ref().map(|s| s.status) else { return };
        let lines = [format!("✕ {} ✕", death_text(cause)), "restarting...".to_string()];
        self.compose_banner(w, &lines, Color::Rgb{r:255,g:60,b:60});
    }

    fn compose_won_overlay(&mut self, w: &WorldState) {
        let Some(s) = &w.session else { return };
        let blink = (w.anim_ms / 400) % 2 == 0;
        let lines = [
            "★ LEVEL CLEAR ★".to_string(),
            format!("{} moves   {}", s.move_count, format_time(s.elapsed_ms)),
            if blink { "▸ ENTER: next level".to_string() } else { String::new() },
        ];
        self.compose_banner(w, &lines, Color::Rgb{r:80,g:255,b:80});
    }

    fn compose_level_select(&mut self, w: &WorldState, progress: &dyn ProgressSink) {
        let gold = Color::Rgb{r:255,g:200,b:50};
        let hi = Color::Rgb{r:80,g:255,b:80};
        let normal = Color::White;
        let dim = Color::DarkGrey;
        let cursor_bg = Color::Rgb{r:30,g:60,b:30};

        self.front.put_str(2, 1, "╔═══════════════════════════════════════════╗", gold, Color::Reset);
        self.front.put_str(2, 2, "║       O R B P U S H   ·   LEVELS          ║", gold, Color::Reset);
        self.front.put_str(2, 3, "╚═══════════════════════════════════════════╝", gold, Color::Reset);
        self.front.put_str(4, 4, &w.source_label, Color::Rgb{r:255,g:180,b:80}, Color::Reset);

        let list_top = 6;
        let visible = SELECT_VISIBLE.min(self.front.height.saturating_sub(list_top + 4));
        let total = w.levels.len();
        let scroll = w.select_scroll;

        if scroll > 0 {
            self.front.put_str(2, list_top - 1, "    ▲ ▲ ▲", dim, Color::Reset);
        }

        for (i, level) in w.levels.iter().enumerate().skip(scroll).take(visible) {
            let row = list_top + i - scroll;
            let unlocked = w.is_unlocked(progress, i);
            let mark = if progress.is_completed(level.id()) {
                '✓'
            } else if unlocked {
                ' '
            } else {
                '×'
            };
            let name: String = level.name.chars().take(36).collect();
            let line = format!("{:>3}. {} {}", i + 1, mark, name);

            if i == w.select_cursor {
                let arrow = if (w.anim_ms / 300) % 2 == 0 { "▸" } else { " " };
                for x in 0..48.min(self.front.width) {
                    self.front.set(x, row, Cell::from_char(' ', normal, cursor_bg));
                }
                self.front.put_str(2, row, arrow, hi, cursor_bg);
                self.front.put_str(3, row, &line, if unlocked { hi } else { dim }, cursor_bg);
            } else {
                self.front.put_str(3, row, &line, if unlocked { normal } else { dim }, Color::Reset);
            }
        }

        if scroll + visible < total {
            self.front.put_str(2, list_top + visible, "    ▼ ▼ ▼", dim, Color::Reset);
        }

        let footer_row = list_top + visible + 2;
        self.front.put_str(2, footer_row, "  ENTER: Start   ↑↓: Select   PgUp/PgDn   Ctrl+C: Quit", dim, Color::Reset);
        let count = format!("  {}/{} levels", w.select_cursor + 1, total);
        self.front.put_str(2, footer_row + 1, &count, dim, Color::Reset);

        if !w.message.is_empty() {
            let msg = format!(" ◈ {} ", w.message);
            self.front.put_bar(self.front.height.saturating_sub(1), &msg, Color::Black, MSG_BG);
        }
    }

    fn compose_all_clear(&mut self, w: &WorldState) {
        let gold = Color::Rgb{r:255,g:220,b:50};
        self.front.put_str(4, 4, "╔═══════════════════════════════════╗", gold, Color::Reset);
        self.front.put_str(4, 5, "║    ★  ALL LEVELS CLEARED!  ★      ║", gold, Color::Reset);
        self.front.put_str(4, 6, "╚═══════════════════════════════════╝", gold, Color::Reset);
        let count = format!("◈ {} levels from {}", w.levels.len(), w.source_label);
        self.front.put_str(6, 9, &count, Color::White, Color::Reset);
        self.front.put_str(6, 11, "▸ ENTER / ESC: Level select", Color::Rgb{r:80,g:255,b:80}, Color::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actors_drawn_behind_their_motion() {
        let to = Pos::new(4, 2);
        let mut m = Motion::new(Pos::new(2, 2), 200);
        assert_eq!(draw_pos(to, Some(&m)), Pos::new(2, 2));
        m.advance(100);
        assert_eq!(draw_pos(to, Some(&m)), Pos::new(3, 2));
        m.advance(100);
        assert_eq!(draw_pos(to, Some(&m)), to);
        assert_eq!(draw_pos(to, None), to);
    }

    #[test]
    fn time_format() {
        assert_eq!(format_time(0), "0:00.0");
        assert_eq!(format_time(61_250), "1:01.2");
    }

    #[test]
    fn put_str_clips_at_edge() {
        let mut fb = FrameBuffer::new(4, 1);
        fb.put_str(2, 0, "abc", Color::White, Color::Reset);
        assert_eq!(fb.get(3, 0).as_str(), "b");
        assert_eq!(fb.get(1, 0).as_str(), " ");
    }
}
