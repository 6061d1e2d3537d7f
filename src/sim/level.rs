/// Level data and loaders.
///
/// ## Sources (priority order):
///   1. `general.levels` pointing at a `.json` pack (web editor schema)
///   2. `general.levels` pointing at a directory of `.txt` files
///   3. Built-in embedded levels
///
/// A source that yields no valid level falls through to the next one.
///
/// ## JSON pack format:
///   ```text
///   { "levels": [ { "name": "...", "width": 7, "height": 3,
///                   "tiles": [[1,1,...], ...], "playerStart": [1, 1],
///                   "orbs": [ { "x": 3, "y": 1, "seq": ["d","a"],
///                               "type": "normal", "canAttack": false } ],
///                   "moveDistance": 1, "instructions": "..." } ] }
///   ```
///   A bare top-level array of levels is accepted too. `hazards` is an
///   alias for `orbs`.
///
/// ## Text format (`.txt`):
///   ```text
///   # Level Name
///   : instructions shown under the map
///   = moves 2
///   @ strong 3,1 right,wait,left attack
///   <map rows>
///   ```
///   Header lines are only read before the first map row. A map row is a
///   line made entirely of legend characters, so `#####` is a wall row and
///   `# Level 1` is a name.
///
/// ## Tile legend:
///   ' ' '.' = Empty     '#' = Wall      '~' = Water     'B' = Block
///   'G' = Goal          'I' = Ice       'L' = Lava      'P' = Player start
///   '^' 'v' '<' '>' = Conveyors (up, down, left, right)

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Deserialize;

use crate::domain::entity::{Command, HazardKind, Pos};
use crate::domain::tile::TileKind;

/// Hazard as authored: start cell plus script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HazardDef {
    pub pos: Pos,
    pub kind: HazardKind,
    pub commands: Vec<Command>,
    pub cursor: usize,
    pub can_attack: bool,
}

/// Immutable level description. Sessions are built from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Level {
    pub name: String,
    pub instructions: String,
    pub width: usize,
    pub height: usize,
    /// Row-major, `height` rows of `width` tiles.
    pub tiles: Vec<Vec<TileKind>>,
    pub player_start: Pos,
    pub hazards: Vec<HazardDef>,
    pub move_distance: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("level has no cells")]
    Empty,
    #[error("expected {expected} rows, found {found}")]
    HeightMismatch { expected: usize, found: usize },
    #[error("row {row} has {found} tiles, expected {expected}")]
    RowWidthMismatch { row: usize, expected: usize, found: usize },
    #[error("player start ({x}, {y}) is off the grid")]
    StartOffGrid { x: i32, y: i32 },
    #[error("player start ({x}, {y}) is on {tile:?}")]
    StartBlocked { x: i32, y: i32, tile: TileKind },
    #[error("moveDistance must be at least 1")]
    ZeroMoveDistance,
    #[error("hazard {index} starts off the grid at ({x}, {y})")]
    HazardOffGrid { index: usize, x: i32, y: i32 },
    #[error("line {line}: unknown map character {ch:?} at column {column}")]
    UnknownGlyph { ch: char, line: usize, column: usize },
    #[error("no player start ('P') in map")]
    MissingStart,
    #[error("more than one player start in map (line {line})")]
    DuplicateStart { line: usize },
    #[error("line {line}: {reason}")]
    BadHeader { line: usize, reason: String },
    #[error("invalid level pack: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

impl Level {
    /// Key used for progress records.
    pub fn id(&self) -> &str {
        &self.name
    }

    pub fn tile(&self, pos: Pos) -> Option<TileKind> {
        if !self.contains(pos) {
            return None;
        }
        self.tiles.get(pos.y as usize)?.get(pos.x as usize).copied()
    }

    fn contains(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    /// Fail-fast checks performed before a session starts.
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.width == 0 || self.height == 0 {
            return Err(LevelError::Empty);
        }
        if self.tiles.len() != self.height {
            return Err(LevelError::HeightMismatch { expected: self.height, found: self.tiles.len() });
        }
        for (row, tiles) in self.tiles.iter().enumerate() {
            if tiles.len() != self.width {
                return Err(LevelError::RowWidthMismatch { row, expected: self.width, found: tiles.len() });
            }
        }
        if self.move_distance == 0 {
            return Err(LevelError::ZeroMoveDistance);
        }

        let Pos { x, y } = self.player_start;
        let tile = self.tile(self.player_start).ok_or(LevelError::StartOffGrid { x, y })?;
        if matches!(tile, TileKind::Wall | TileKind::Water | TileKind::Lava | TileKind::Block) {
            return Err(LevelError::StartBlocked { x, y, tile });
        }

        for (index, h) in self.hazards.iter().enumerate() {
            if !self.contains(h.pos) {
                return Err(LevelError::HazardOffGrid { index, x: h.pos.x, y: h.pos.y });
            }
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════
// Level sets
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelSource {
    Embedded,
    Pack(PathBuf),
    Directory(PathBuf),
}

impl LevelSource {
    pub fn label(&self) -> String {
        match self {
            LevelSource::Embedded => "Built-in levels".to_string(),
            LevelSource::Pack(p) | LevelSource::Directory(p) => p
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LevelSet {
    pub source: LevelSource,
    pub levels: Vec<Level>,
}

/// Resolve the configured level source. Invalid levels are logged and
/// skipped; an empty or unreadable source falls back to the embedded set.
pub fn load_levels(path: &Path) -> LevelSet {
    let loaded = if path.is_file() {
        read_pack(path).map(|levels| (LevelSource::Pack(path.to_path_buf()), levels))
    } else if path.is_dir() {
        read_directory(path).map(|levels| (LevelSource::Directory(path.to_path_buf()), levels))
    } else {
        info!("no level source at {}, using built-in levels", path.display());
        Ok((LevelSource::Embedded, vec![]))
    };

    match loaded {
        Ok((source, levels)) => {
            let levels = unique_names(keep_valid(levels));
            if !levels.is_empty() {
                info!("loaded {} levels from {}", levels.len(), path.display());
                return LevelSet { source, levels };
            }
            if source != LevelSource::Embedded {
                warn!("{} holds no playable levels, using built-in levels", path.display());
            }
        }
        Err(e) => error!("failed to load levels: {e}"),
    }

    LevelSet { source: LevelSource::Embedded, levels: embedded_levels() }
}

fn keep_valid(levels: Vec<Level>) -> Vec<Level> {
    levels
        .into_iter()
        .filter(|lv| match lv.validate() {
            Ok(()) => true,
            Err(e) => {
                error!("skipping level {:?}: {e}", lv.name);
                false
            }
        })
        .collect()
}

/// Repeated names get a ` (2)`, ` (3)`, ... suffix so every level has its
/// own progress record.
fn unique_names(mut levels: Vec<Level>) -> Vec<Level> {
    let mut seen: HashSet<String> = HashSet::new();
    for lv in &mut levels {
        if !seen.contains(&lv.name) {
            seen.insert(lv.name.clone());
            continue;
        }
        let mut n = 2;
        let name = loop {
            let candidate = format!("{} ({n})", lv.name);
            if !seen.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        warn!("duplicate level name {:?}, renamed to {name:?}", lv.name);
        seen.insert(name.clone());
        lv.name = name;
    }
    levels
}

fn read_pack(path: &Path) -> Result<Vec<Level>, LevelError> {
    let text = fs::read_to_string(path).map_err(|source| LevelError::Io { path: path.to_path_buf(), source })?;
    parse_json_pack(&text)
}

fn read_directory(dir: &Path) -> Result<Vec<Level>, LevelError> {
    let entries = fs::read_dir(dir).map_err(|source| LevelError::Io { path: dir.to_path_buf(), source })?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |e| e == "txt"))
        .collect();
    files.sort();

    let mut levels = vec![];
    for path in files {
        let parsed = fs::read_to_string(&path)
            .map_err(|source| LevelError::Io { path: path.clone(), source })
            .and_then(|text| parse_text_level(&text));
        match parsed {
            Ok(mut lv) => {
                if lv.name.is_empty() {
                    lv.name = path.file_stem().unwrap_or_default().to_string_lossy().to_string();
                }
                levels.push(lv);
            }
            Err(e) => error!("skipping {}: {e}", path.display()),
        }
    }
    Ok(levels)
}

// ══════════════════════════════════════════════════════════════
// JSON packs
// ══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(untagged)]
enum PackFile {
    Wrapped { levels: Vec<RawLevel> },
    Bare(Vec<RawLevel>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLevel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    instructions: String,
    width: usize,
    height: usize,
    tiles: Vec<Vec<TileKind>>,
    player_start: [i32; 2],
    #[serde(default, alias = "hazards")]
    orbs: Vec<RawOrb>,
    #[serde(default)]
    move_distance: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrb {
    x: i32,
    y: i32,
    #[serde(default)]
    seq: Option<Script>,
    #[serde(default, rename = "type")]
    kind: HazardKind,
    #[serde(default)]
    can_attack: bool,
    #[serde(default)]
    idx: usize,
}

/// Older packs store a single command as a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Script {
    Many(Vec<Command>),
    One(Command),
}

/// Missing, non-finite or non-positive distances mean 1; fractions floor.
fn move_distance_from(raw: Option<f64>) -> u32 {
    match raw {
        Some(d) if d.is_finite() && d >= 1.0 => d.floor().min(u32::MAX as f64) as u32,
        _ => 1,
    }
}

impl From<RawLevel> for Level {
    fn from(raw: RawLevel) -> Self {
        let hazards = raw
            .orbs
            .into_iter()
            .map(|o| HazardDef {
                pos: Pos::new(o.x, o.y),
                kind: o.kind,
                commands: match o.seq {
                    Some(Script::Many(v)) => v,
                    Some(Script::One(c)) => vec![c],
                    None => vec![],
                },
                cursor: o.idx,
                can_attack: o.can_attack,
            })
            .collect();
        Level {
            name: raw.name,
            instructions: raw.instructions,
            width: raw.width,
            height: raw.height,
            tiles: raw.tiles,
            player_start: Pos::new(raw.player_start[0], raw.player_start[1]),
            hazards,
            move_distance: move_distance_from(raw.move_distance),
        }
    }
}

/// Parse a JSON pack. Levels are not validated here. Unnamed levels are
/// named after their position in the pack, since progress is keyed by name.
pub fn parse_json_pack(text: &str) -> Result<Vec<Level>, LevelError> {
    let raw = match serde_json::from_str::<PackFile>(text)? {
        PackFile::Wrapped { levels } | PackFile::Bare(levels) => levels,
    };
    let mut levels: Vec<Level> = raw.into_iter().map(Level::from).collect();
    for (i, lv) in levels.iter_mut().enumerate() {
        if lv.name.trim().is_empty() {
            lv.name = format!("Level {}", i + 1);
        }
    }
    Ok(levels)
}

// ══════════════════════════════════════════════════════════════
// Text levels
// ══════════════════════════════════════════════════════════════

fn glyph_tile(ch: char) -> Option<TileKind> {
    let tile = match ch {
        ' ' | '.' | 'P' => TileKind::Empty,
        '#' => TileKind::Wall,
        '~' => TileKind::Water,
        'B' => TileKind::Block,
        'G' => TileKind::Goal,
        'I' => TileKind::Ice,
        'L' => TileKind::Lava,
        '^' => TileKind::ConveyorUp,
        'v' => TileKind::ConveyorDown,
        '<' => TileKind::ConveyorLeft,
        '>' => TileKind::ConveyorRight,
        _ => return None,
    };
    Some(tile)
}

fn is_map_row(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| glyph_tile(c).is_some())
}

/// Parse one text level.
pub fn parse_text_level(text: &str) -> Result<Level, LevelError> {
    let mut name = String::new();
    let mut instructions = String::new();
    let mut move_distance = 1;
    let mut hazards = vec![];
    let mut rows: Vec<(usize, &str)> = vec![];

    for (n, line) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = line.trim_end_matches('\r');
        if rows.is_empty() {
            if line.trim().is_empty() {
                continue;
            }
            if !is_map_row(line) {
                read_header(line, line_no, &mut name, &mut instructions, &mut move_distance, &mut hazards)?;
                continue;
            }
        }
        rows.push((line_no, line));
    }

    while rows.last().map_or(false, |(_, r)| r.trim().is_empty()) {
        rows.pop();
    }
    if rows.is_empty() {
        return Err(LevelError::Empty);
    }

    let width = rows.iter().map(|(_, r)| r.chars().count()).max().unwrap_or(0);
    let mut start = None;
    let mut tiles = Vec::with_capacity(rows.len());

    for (y, (line_no, row)) in rows.iter().enumerate() {
        let mut out = vec![TileKind::Empty; width];
        for (x, ch) in row.chars().enumerate() {
            let tile = glyph_tile(ch).ok_or(LevelError::UnknownGlyph { ch, line: *line_no, column: x + 1 })?;
            if ch == 'P' {
                if start.is_some() {
                    return Err(LevelError::DuplicateStart { line: *line_no });
                }
                start = Some(Pos::new(x as i32, y as i32));
            }
            out[x] = tile;
        }
        tiles.push(out);
    }

    Ok(Level {
        name,
        instructions,
        width,
        height: tiles.len(),
        tiles,
        player_start: start.ok_or(LevelError::MissingStart)?,
        hazards,
        move_distance,
    })
}

fn read_header(
    line: &str,
    line_no: usize,
    name: &mut String,
    instructions: &mut String,
    move_distance: &mut u32,
    hazards: &mut Vec<HazardDef>,
) -> Result<(), LevelError> {
    let bad = |reason: String| LevelError::BadHeader { line: line_no, reason };

    if let Some(rest) = line.strip_prefix('#') {
        *name = rest.trim().to_string();
    } else if let Some(rest) = line.strip_prefix(':') {
        if !instructions.is_empty() {
            instructions.push(' ');
        }
        instructions.push_str(rest.trim());
    } else if let Some(rest) = line.strip_prefix('=') {
        let value = rest
            .trim()
            .strip_prefix("moves")
            .ok_or_else(|| bad(format!("unknown setting {:?}", rest.trim())))?;
        *move_distance = value
            .trim()
            .parse()
            .map_err(|_| bad(format!("bad move count {:?}", value.trim())))?;
    } else if let Some(rest) = line.strip_prefix('@') {
        hazards.push(parse_hazard(rest).map_err(bad)?);
    } else {
        return Err(bad(format!("not a header or map row: {line:?}")));
    }
    Ok(())
}

/// `[kind] x,y [cmd,cmd,...] [attack]`
fn parse_hazard(spec: &str) -> Result<HazardDef, String> {
    let mut tokens = spec.split_whitespace().peekable();

    let kind = match tokens.peek().and_then(|t| t.parse::<HazardKind>().ok()) {
        Some(k) => {
            tokens.next();
            k
        }
        None => HazardKind::Normal,
    };

    let pos_tok = tokens.next().ok_or("hazard needs a position")?;
    let (x, y): (i32, i32) = pos_tok
        .split_once(',')
        .and_then(|(x, y)| Some((x.trim().parse().ok()?, y.trim().parse().ok()?)))
        .ok_or_else(|| format!("bad hazard position {pos_tok:?}"))?;

    let mut commands = vec![];
    let mut can_attack = false;
    for tok in tokens {
        if tok.eq_ignore_ascii_case("attack") {
            can_attack = true;
            continue;
        }
        for part in tok.split(',').filter(|p| !p.is_empty()) {
            commands.push(part.parse::<Command>().map_err(|e| e.to_string())?);
        }
    }

    Ok(HazardDef { pos: Pos::new(x, y), kind, commands, cursor: 0, can_attack })
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

const EMBEDDED: &[&str] = &[
    "\
# Stepping Stone
: Push the crate into the water to build a bridge.
#########
#P  B ~G#
#########
",
    "\
# Thin Ice
: Ice keeps you sliding until something stops you.
#######
#P III#
#   #G#
#######
",
    "\
# Patrol
: Orbs take one step for every move you make. Touching one is fatal.
@ normal 3,2 up,wait,down,wait
#######
###.###
#P   G#
#######
",
    "\
# Conveyor Works
: Conveyors carry you along without costing a step.
########
#P>>v  #
####v###
#  G<  #
########
",
    "\
# Long Stride
: Every move here covers two cells. Crates still stop you.
= moves 2
#########
#P  B~ G#
#########
",
    "\
# Crossfire
: Flying orbs pass over walls.
@ flying 5,1 down,down,up,up
########
#P   . #
#### # #
#G     #
########
",
    "\
# Hot Floor
: Lava swallows crates and never cools. A calm strong orb only shoves.
@ strong 4,3 left,wait,right,wait
#########
#P B L G#
#  ###  #
#       #
#########
",
];

/// Built-in levels, used when no external source is configured.
pub fn embedded_levels() -> Vec<Level> {
    EMBEDDED
        .iter()
        .filter_map(|text| match parse_text_level(text) {
            Ok(lv) => Some(lv),
            Err(e) => {
                error!("built-in level failed to parse: {e}");
                None
            }
        })
        .collect()
}
