//! Hot-reload watching for plugin directories
//!
//! [`UnitWatcher`] collects file system events for unit files and reports
//! them once they have been quiet for the debounce period. The reload itself
//! is driven by [`ScriptSystem::poll_hot_reload`](crate::ScriptSystem::poll_hot_reload).

use crate::config::HotReloadSettings;
use crate::error::{BridgeError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};

/// Watches plugin directories for changed units
pub struct UnitWatcher {
    debounce: Duration,
    extensions: Vec<String>,
    watcher: Option<RecommendedWatcher>,
    event_receiver: Option<Mutex<Receiver<notify::Result<Event>>>>,
    watched: Vec<PathBuf>,
    /// Changed unit -> time of the last event
    pending: Mutex<HashMap<PathBuf, Instant>>,
}

impl UnitWatcher {
    /// Create a watcher; no directory is watched until [`UnitWatcher::watch_directory`]
    pub fn new(settings: &HotReloadSettings, extensions: Vec<String>) -> Result<Self> {
        if !settings.enabled {
            return Ok(Self::disabled());
        }

        let (tx, rx) = channel();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| BridgeError::HotReload(e.to_string()))?;

        Ok(Self {
            debounce: settings.debounce(),
            extensions,
            watcher: Some(watcher),
            event_receiver: Some(Mutex::new(rx)),
            watched: Vec::new(),
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Watcher that never reports changes
    pub fn disabled() -> Self {
        Self {
            debounce: HotReloadSettings::default().debounce(),
            extensions: Vec::new(),
            watcher: None,
            event_receiver: None,
            watched: Vec::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start watching a plugin directory (recursively)
    pub fn watch_directory(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let Some(watcher) = self.watcher.as_mut() else {
            return Ok(());
        };

        watcher
            .watch(dir, RecursiveMode::Recursive)
            .map_err(|e| BridgeError::HotReload(format!("{}: {}", dir.display(), e)))?;
        self.watched.push(dir.to_path_buf());
        log::debug!("Watching {} for unit changes", dir.display());
        Ok(())
    }

    pub fn watched_directories(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Mark a unit as changed without a file system event
    pub fn trigger(&self, path: impl Into<PathBuf>) {
        if self.is_enabled() {
            self.pending.lock().insert(path.into(), Instant::now());
        }
    }

    /// Units with unsettled changes
    pub fn pending_units(&self) -> Vec<PathBuf> {
        self.pending.lock().keys().cloned().collect()
    }

    /// Drain events and return units whose changes have settled
    pub fn poll(&self) -> Vec<PathBuf> {
        if !self.is_enabled() {
            return Vec::new();
        }

        if let Some(rx) = &self.event_receiver {
            let rx = rx.lock();
            while let Ok(result) = rx.try_recv() {
                match result {
                    Ok(event) => self.handle_event(&event),
                    Err(e) => log::warn!("File watcher error: {}", e),
                }
            }
        }

        let now = Instant::now();
        let mut pending = self.pending.lock();
        let settled: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, time)| now.duration_since(**time) >= self.debounce)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &settled {
            pending.remove(path);
        }
        settled
    }

    fn handle_event(&self, event: &Event) {
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) => {
                for path in &event.paths {
                    if self.is_unit_file(path) {
                        log::debug!("Detected change in unit: {}", path.display());
                        self.pending.lock().insert(path.clone(), Instant::now());
                    }
                }
            }
            _ => {}
        }
    }

    fn is_unit_file(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|u| u.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

impl Drop for UnitWatcher {
    fn drop(&mut self) {
        log::debug!("Shutting down unit watcher");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::default_unit_extensions;

    #[test]
    fn test_disabled_watcher() {
        let watcher = UnitWatcher::disabled();
        assert!(!watcher.is_enabled());
        watcher.trigger("/plugins/a.so");
        assert!(watcher.poll().is_empty());
        assert!(watcher.pending_units().is_empty());
    }

    #[test]
    fn test_settings_disabled_yields_disabled_watcher() {
        let settings = HotReloadSettings {
            enabled: false,
            debounce_ms: 0,
        };
        let watcher = UnitWatcher::new(&settings, default_unit_extensions()).unwrap();
        assert!(!watcher.is_enabled());
    }

    #[test]
    fn test_trigger_settles_after_debounce() {
        let settings = HotReloadSettings {
            enabled: true,
            debounce_ms: 0,
        };
        let watcher = UnitWatcher::new(&settings, default_unit_extensions()).unwrap();
        watcher.trigger("/plugins/a.so");

        let settled = watcher.poll();
        assert_eq!(settled, vec![PathBuf::from("/plugins/a.so")]);
        assert!(watcher.poll().is_empty());
    }

    #[test]
    fn test_unit_file_filter() {
        let settings = HotReloadSettings::default();
        let watcher = UnitWatcher::new(&settings, vec!["so".into()]).unwrap();
        assert!(watcher.is_unit_file(Path::new("/x/unit.so")));
        assert!(!watcher.is_unit_file(Path::new("/x/unit.txt")));
    }
}
