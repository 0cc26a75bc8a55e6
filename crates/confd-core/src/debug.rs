//! Named debug flags.
//!
//! `DebugSettings` replaces what older implementations kept in ambient
//! package-level maps: it is an explicit object constructed once in `main`
//! and passed by handle, so tests can build isolated instances.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Debug areas known to the daemon.
pub mod areas {
    /// Commit and rollback processing.
    pub const COMMIT: &str = "commit";
    /// Session lifecycle.
    pub const SESSION: &str = "session";
    /// Confirmed-commit scheduling.
    pub const CONFIRM: &str = "confirm";
}

/// Set of enabled debug areas.
#[derive(Debug, Default)]
pub struct DebugSettings {
    enabled: RwLock<HashSet<String>>,
}

impl DebugSettings {
    /// Creates settings with no areas enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates settings with the given areas enabled.
    pub fn with_areas<I, S>(areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: RwLock::new(areas.into_iter().map(Into::into).collect()),
        }
    }

    /// Enables a debug area.
    pub fn enable(&self, area: impl Into<String>) {
        self.enabled.write().insert(area.into());
    }

    /// Disables a debug area.
    pub fn disable(&self, area: &str) {
        self.enabled.write().remove(area);
    }

    /// Returns true if the area is enabled.
    pub fn is_enabled(&self, area: &str) -> bool {
        self.enabled.read().contains(area)
    }
}
