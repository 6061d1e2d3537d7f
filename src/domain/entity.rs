/// Actors: Player, Block, Hazard (orb), plus the shared value types
/// they are built from (positions, directions, script commands, motion).
///
/// Logical positions are always whole cells. Animation lives in an
/// optional `Motion` per actor: the renderer reads it as a sub-tile offset,
/// the turn synchronizer waits for all motions to finish.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Pos { x, y }
    }

    /// Neighbouring cell in `dir`. May lie outside the grid.
    pub fn step(self, dir: Dir) -> Pos {
        let (dx, dy) = dir.delta();
        Pos { x: self.x + dx, y: self.y + dy }
    }

    pub fn distance(self, other: Pos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
}

impl Dir {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::Up => (0, -1),
            Dir::Down => (0, 1),
            Dir::Left => (-1, 0),
            Dir::Right => (1, 0),
        }
    }
}

/// One slot of a hazard script.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(try_from = "String")]
pub enum Command {
    Move(Dir),
    Wait,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hazard command {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Accepts `up/down/left/right/wait`, the single-letter `w/a/s/d`
    /// keyboard spellings and `u/d/l/r`. Case-insensitive.
    ///
    /// `d` is ambiguous between "down" and the keyboard "right"; level packs
    /// use the keyboard layout, so `d` means right.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmd = match s.trim().to_ascii_lowercase().as_str() {
            "up" | "w" | "u" => Command::Move(Dir::Up),
            "down" | "s" => Command::Move(Dir::Down),
            "left" | "a" | "l" => Command::Move(Dir::Left),
            "right" | "d" | "r" => Command::Move(Dir::Right),
            "wait" | "." => Command::Wait,
            _ => return Err(UnknownCommand(s.to_string())),
        };
        Ok(cmd)
    }
}

impl TryFrom<String> for Command {
    type Error = UnknownCommand;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardKind {
    #[default]
    Normal,
    /// Passes over walls and blocks; only the grid edge stops it.
    Flying,
    /// Pushes block chains like the player does.
    Strong,
}

impl FromStr for HazardKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(HazardKind::Normal),
            "flying" => Ok(HazardKind::Flying),
            "strong" => Ok(HazardKind::Strong),
            _ => Err(()),
        }
    }
}

// ── Motion ──

/// In-flight tween from `from` to the owner's current logical position.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Motion {
    pub from: Pos,
    pub elapsed_ms: u32,
    pub duration_ms: u32,
}

impl Motion {
    pub fn new(from: Pos, duration_ms: u32) -> Self {
        Motion { from, elapsed_ms: 0, duration_ms }
    }

    /// Advance by `dt_ms`. Returns true once the motion has finished.
    pub fn advance(&mut self, dt_ms: u32) -> bool {
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms).min(self.duration_ms);
        self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }

    /// 0.0 at `from`, 1.0 on arrival.
    pub fn progress(&self) -> f32 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        self.elapsed_ms as f32 / self.duration_ms as f32
    }

    /// Fractional cell offset from `to` at which the actor should be drawn.
    pub fn offset(&self, to: Pos) -> (f32, f32) {
        let remaining = 1.0 - self.progress();
        (
            (self.from.x - to.x) as f32 * remaining,
            (self.from.y - to.y) as f32 * remaining,
        )
    }
}

/// Start a motion covering the distance just travelled, or none if the
/// actor did not move.
pub fn motion_between(from: Pos, to: Pos, per_cell_ms: u32) -> Option<Motion> {
    if from == to {
        None
    } else {
        Some(Motion::new(from, per_cell_ms.saturating_mul(from.distance(to))))
    }
}

// ── Actors ──

#[derive(Clone, Debug)]
pub struct Player {
    pub pos: Pos,
    pub motion: Option<Motion>,
}

impl Player {
    pub fn new(pos: Pos) -> Self {
        Player { pos, motion: None }
    }
}

#[derive(Clone, Debug)]
pub struct Block {
    pub pos: Pos,
    pub motion: Option<Motion>,
}

impl Block {
    pub fn new(pos: Pos) -> Self {
        Block { pos, motion: None }
    }
}

#[derive(Clone, Debug)]
pub struct Hazard {
    pub pos: Pos,
    pub kind: HazardKind,
    pub commands: Vec<Command>,
    /// Index of the next command to execute.
    pub cursor: usize,
    /// Strong hazards only hurt when this is set.
    pub can_attack: bool,
    pub motion: Option<Motion>,
}

impl Hazard {
    /// An empty script becomes `[Wait]`; the start cursor wraps into range.
    pub fn new(pos: Pos, kind: HazardKind, commands: Vec<Command>, cursor: usize, can_attack: bool) -> Self {
        let commands = if commands.is_empty() { vec![Command::Wait] } else { commands };
        let cursor = cursor % commands.len();
        Hazard { pos, kind, commands, cursor, can_attack, motion: None }
    }

    pub fn current_command(&self) -> Command {
        self.commands.get(self.cursor).copied().unwrap_or(Command::Wait)
    }

    pub fn advance_cursor(&mut self) {
        self.cursor = (self.cursor + 1) % self.commands.len().max(1);
    }

    /// Does touching this hazard kill the player?
    pub fn is_lethal(&self) -> bool {
        match self.kind {
            HazardKind::Normal | HazardKind::Flying => true,
            HazardKind::Strong => self.can_attack,
        }
    }
}
