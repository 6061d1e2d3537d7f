/// Level progress: which levels are completed, attempt counts, best runs.
///
/// ## Unlock rule
///   Level 0 is always open. Level `i` opens once level `i-1` is completed.
///
/// ## File format (`progress.dat`):
///   Key-value lines, one record per level:
///   ```text
///   record=<completed 0|1>|<attempts>|<best moves or ->|<best ms or ->|<level name>
///   ```
///   The level name goes last so it may contain `|`. Unknown keys and
///   malformed lines are skipped.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;

use super::level::Level;

const PROGRESS_FILE: &str = "progress.dat";

/// Receives attempt results. The world reports every finished attempt
/// here and asks it which levels are unlocked.
pub trait ProgressSink {
    fn record_attempt(&mut self, level_id: &str, completed: bool, elapsed_ms: u64, moves: u32);
    fn is_completed(&self, level_id: &str) -> bool;
}

pub fn is_unlocked(sink: &dyn ProgressSink, levels: &[Level], idx: usize) -> bool {
    match idx {
        0 => !levels.is_empty(),
        i if i < levels.len() => sink.is_completed(levels[i - 1].id()),
        _ => false,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelRecord {
    pub completed: bool,
    pub attempts: u32,
    pub best_moves: Option<u32>,
    pub best_time_ms: Option<u64>,
}

/// In-memory progress table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    records: BTreeMap<String, LevelRecord>,
}

impl Progress {
    #[cfg(test)]
    pub fn record(&self, level_id: &str) -> Option<&LevelRecord> {
        self.records.get(level_id)
    }

    pub fn completed_count(&self) -> usize {
        self.records.values().filter(|r| r.completed).count()
    }

    pub fn serialize(&self) -> String {
        fn opt<T: ToString>(v: Option<T>) -> String {
            v.map_or_else(|| "-".to_string(), |v| v.to_string())
        }
        let mut out = String::new();
        for (name, r) in &self.records {
            out.push_str(&format!(
                "record={}|{}|{}|{}|{}\n",
                if r.completed { 1 } else { 0 },
                r.attempts,
                opt(r.best_moves),
                opt(r.best_time_ms),
                name
            ));
        }
        out
    }

    pub fn parse(content: &str) -> Self {
        let mut records = BTreeMap::new();
        for line in content.lines() {
            let Some(val) = line.strip_prefix("record=") else { continue };
            let mut parts = val.splitn(5, '|');
            let (Some(done), Some(attempts), Some(moves), Some(time), Some(name)) =
                (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let Ok(attempts) = attempts.parse() else { continue };
            records.insert(
                name.to_string(),
                LevelRecord {
                    completed: done == "1",
                    attempts,
                    best_moves: moves.parse().ok(),
                    best_time_ms: time.parse().ok(),
                },
            );
        }
        Progress { records }
    }
}

impl ProgressSink for Progress {
    fn record_attempt(&mut self, level_id: &str, completed: bool, elapsed_ms: u64, moves: u32) {
        let r = self.records.entry(level_id.to_string()).or_default();
        r.attempts = r.attempts.saturating_add(1);
        if completed {
            r.completed = true;
            r.best_moves = Some(r.best_moves.map_or(moves, |b| b.min(moves)));
            r.best_time_ms = Some(r.best_time_ms.map_or(elapsed_ms, |b| b.min(elapsed_ms)));
        }
    }

    fn is_completed(&self, level_id: &str) -> bool {
        self.records.get(level_id).map_or(false, |r| r.completed)
    }
}

// ══════════════════════════════════════════════════════════════
// File-backed store
// ══════════════════════════════════════════════════════════════

/// Progress persisted to `progress.dat`, written after every attempt.
#[derive(Debug)]
pub struct FileProgress {
    path: PathBuf,
    progress: Progress,
}

impl FileProgress {
    /// Open (or start) the store at `path`. A missing file is empty progress.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let progress = match std::fs::read_to_string(&path) {
            Ok(content) => Progress::parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Progress::default(),
            Err(e) => return Err(e),
        };
        Ok(FileProgress { path, progress })
    }

    /// Store next to the executable when writable, else in the user data dir.
    pub fn open_default() -> io::Result<Self> {
        Self::open(save_dir().join(PROGRESS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn save(&self) -> io::Result<()> {
        std::fs::write(&self.path, self.progress.serialize())
    }
}

impl ProgressSink for FileProgress {
    fn record_attempt(&mut self, level_id: &str, completed: bool, elapsed_ms: u64, moves: u32) {
        self.progress.record_attempt(level_id, completed, elapsed_ms, moves);
        if let Err(e) = self.save() {
            warn!("could not write {}: {e}", self.path.display());
        }
    }

    fn is_completed(&self, level_id: &str) -> bool {
        self.progress.is_completed(level_id)
    }
}

fn save_dir() -> PathBuf {
    // 1. Exe directory (portable installs)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            let test_path = parent.join(".write_test_orbpush");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    // 2. ~/.local/share/orbpush for system installs
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/orbpush");
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    // 3. CWD
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
