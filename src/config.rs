/// External configuration loader.
///
/// Reads `config.toml` from the first candidate directory that has one.
/// Falls back to defaults if the file is missing, unreadable or invalid.
/// Problems are collected in `warnings` and logged once the logger is up
/// (the log target itself is configured here).
///
/// ```toml
/// [speed]
/// tick_rate_ms = 16
/// step_anim_ms = 120
/// settle_timeout_ms = 5000
///
/// [play]
/// undo_limit = 0          # 0 = unlimited
/// death_pause_ms = 2000
///
/// [gamepad]
/// undo = ["B", "Y"]
/// restart = ["Select"]
/// confirm = ["A", "Start"]
/// cancel = ["X"]
///
/// [general]
/// levels = "levels"       # .json pack or directory of .txt levels
/// log_file = ""
/// ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub play: PlayConfig,
    pub gamepad: GamepadConfig,
    pub levels_path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub tick_rate_ms: u64,
    pub step_anim_ms: u32,
    pub settle_timeout_ms: u32,
}

#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub undo_limit: usize,
    pub death_pause_ms: u32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub undo: Vec<String>,
    pub restart: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    play: TomlPlay,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_step_anim")]
    step_anim_ms: u32,
    #[serde(default = "default_settle_timeout")]
    settle_timeout_ms: u32,
}

#[derive(Deserialize, Debug)]
struct TomlPlay {
    #[serde(default)]
    undo_limit: usize,
    #[serde(default = "default_death_pause")]
    death_pause_ms: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_undo")]
    undo: Vec<String>,
    #[serde(default = "default_restart")]
    restart: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels")]
    levels: String,
    #[serde(default)]
    log_file: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }
fn default_step_anim() -> u32 { 120 }      // per tile
fn default_settle_timeout() -> u32 { 5000 }
fn default_death_pause() -> u32 { 2000 }

fn default_undo() -> Vec<String> { vec!["B".into(), "Y".into()] }
fn default_restart() -> Vec<String> { vec!["Select".into()] }
fn default_confirm() -> Vec<String> { vec!["A".into(), "Start".into()] }
fn default_cancel() -> Vec<String> { vec!["X".into()] }
fn default_levels() -> String { "levels".into() }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            tick_rate_ms: default_tick_rate(),
            step_anim_ms: default_step_anim(),
            settle_timeout_ms: default_settle_timeout(),
        }
    }
}

impl Default for TomlPlay {
    fn default() -> Self {
        TomlPlay { undo_limit: 0, death_pause_ms: default_death_pause() }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            undo: default_undo(),
            restart: default_restart(),
            confirm: default_confirm(),
            cancel: default_cancel(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral { levels: default_levels(), log_file: String::new() }
    }
}

// ── Loading ──

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[], vec![])
    }
}

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: exe directory, CWD, ~/.local/share/orbpush, /usr/share/orbpush.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let mut warnings = vec![];
        let toml_cfg = load_toml(&search_dirs, &mut warnings);
        GameConfig::from_toml(toml_cfg, &search_dirs, warnings)
    }

    fn from_toml(cfg: TomlConfig, search_dirs: &[PathBuf], warnings: Vec<String>) -> Self {
        let levels_path = resolve_path(&cfg.general.levels, search_dirs);
        let log_file = match cfg.general.log_file.trim() {
            "" => None,
            path => Some(PathBuf::from(path)),
        };

        GameConfig {
            speed: SpeedConfig {
                tick_rate_ms: cfg.speed.tick_rate_ms.max(1),
                step_anim_ms: cfg.speed.step_anim_ms,
                settle_timeout_ms: cfg.speed.settle_timeout_ms.max(1),
            },
            play: PlayConfig {
                undo_limit: cfg.play.undo_limit,
                death_pause_ms: cfg.play.death_pause_ms,
            },
            gamepad: GamepadConfig {
                undo: cfg.gamepad.undo,
                restart: cfg.gamepad.restart,
                confirm: cfg.gamepad.confirm,
                cancel: cfg.gamepad.cancel,
            },
            levels_path,
            log_file,
            warnings,
        }
    }
}

/// Absolute paths are used as-is; relative ones are looked up in the
/// candidate dirs, defaulting to CWD-relative.
fn resolve_path(raw: &str, search_dirs: &[PathBuf]) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    search_dirs
        .iter()
        .map(|d| d.join(path))
        .find(|p| p.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so data next to the real binary is found.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/orbpush)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/orbpush");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/orbpush)
    let sys = PathBuf::from("/usr/share/orbpush");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    // 5. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf], warnings: &mut Vec<String>) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => return parse_toml(&text, &path, warnings),
            Err(e) => warnings.push(format!("could not read {}: {e}", path.display())),
        }
    }
    TomlConfig::default()
}

fn parse_toml(text: &str, path: &Path, warnings: &mut Vec<String>) -> TomlConfig {
    match toml::from_str::<TomlConfig>(text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warnings.push(format!("{} parse error, using defaults: {e}", path.display()));
            TomlConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> (GameConfig, Vec<String>) {
        let mut warnings = vec![];
        let cfg = parse_toml(text, Path::new("config.toml"), &mut warnings);
        (GameConfig::from_toml(cfg, &[], vec![]), warnings)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let (cfg, warnings) = parse("");
        assert!(warnings.is_empty());
        assert_eq!(cfg.speed.tick_rate_ms, 16);
        assert_eq!(cfg.speed.step_anim_ms, 120);
        assert_eq!(cfg.speed.settle_timeout_ms, 5000);
        assert_eq!(cfg.play.undo_limit, 0);
        assert_eq!(cfg.play.death_pause_ms, 2000);
        assert_eq!(cfg.levels_path, PathBuf::from("levels"));
        assert!(cfg.log_file.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let (cfg, _) = parse(
            "[speed]\nstep_anim_ms = 60\n\n[play]\nundo_limit = 20\n\n[general]\nlog_file = \"orbpush.log\"\n",
        );
        assert_eq!(cfg.speed.step_anim_ms, 60);
        assert_eq!(cfg.speed.tick_rate_ms, 16);
        assert_eq!(cfg.play.undo_limit, 20);
        assert_eq!(cfg.log_file, Some(PathBuf::from("orbpush.log")));
        assert_eq!(cfg.gamepad.confirm, vec!["A".to_string(), "Start".to_string()]);
    }

    #[test]
    fn invalid_toml_warns_and_defaults() {
        let (cfg, warnings) = parse("[speed\ntick_rate_ms = ");
        assert_eq!(warnings.len(), 1);
        assert_eq!(cfg.speed.tick_rate_ms, 16);
    }

    #[test]
    fn zero_rates_are_clamped() {
        let (cfg, _) = parse("[speed]\ntick_rate_ms = 0\nsettle_timeout_ms = 0\n");
        assert_eq!(cfg.speed.tick_rate_ms, 1);
        assert_eq!(cfg.speed.settle_timeout_ms, 1);
    }

    #[test]
    fn absolute_level_path_untouched() {
        let p = resolve_path("/srv/orbpush/pack.json", &[PathBuf::from("/tmp")]);
        assert_eq!(p, PathBuf::from("/srv/orbpush/pack.json"));
    }
}
