/// Per-sound suppression after playback.
///
/// Keyed by sound path. A blocked sound stays blocked until its remaining
/// time drops to zero or below, at which point the entry is purged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Effectively forever: one week, in seconds.
pub const FOREVER: f64 = 604_800.0;

#[derive(Clone, Debug, Default)]
pub struct Cooldowns {
    remaining: HashMap<PathBuf, f64>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Cooldowns::default()
    }

    /// Block `path` for `seconds`, replacing any earlier entry.
    pub fn block(&mut self, path: &Path, seconds: f64) {
        self.remaining.insert(path.to_path_buf(), seconds);
    }

    pub fn is_blocked(&self, path: &Path) -> bool {
        self.remaining.contains_key(path)
    }

    #[cfg(test)]
    pub fn remaining(&self, path: &Path) -> Option<f64> {
        self.remaining.get(path).copied()
    }

    /// Count down every entry and drop the expired ones.
    pub fn elapse(&mut self, seconds: f64) {
        self.remaining.retain(|_, left| {
            *left -= seconds;
            *left > 0.0
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}
