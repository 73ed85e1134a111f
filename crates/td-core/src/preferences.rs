//! Per-user UI preferences persisted to a JSON file.
//!
//! Hiding an incident only removes it from the local list view. The engine
//! never reads these settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::incident::Incident;

/// Default UI font size in pixels.
pub const DEFAULT_FONT_SIZE: u16 = 16;

/// Errors raised while loading or saving preferences.
#[derive(Error, Debug)]
pub enum PreferencesError {
    #[error("Preferences I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid preferences file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Display preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPreferences {
    pub hidden_incidents: BTreeSet<Uuid>,
    pub dark_mode: bool,
    pub font_size: u16,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            hidden_incidents: BTreeSet::new(),
            dark_mode: false,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl UiPreferences {
    pub fn is_hidden(&self, incident_id: Uuid) -> bool {
        self.hidden_incidents.contains(&incident_id)
    }

    /// Filters out hidden incidents, keeping order.
    pub fn visible<'a>(&self, incidents: &'a [Incident]) -> Vec<&'a Incident> {
        incidents.iter().filter(|i| !self.is_hidden(i.id)).collect()
    }
}

/// Preferences backed by a JSON file.
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    prefs: UiPreferences,
}

impl PreferencesStore {
    /// Loads preferences from `path`. A missing file yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PreferencesError> {
        let path = path.into();
        let prefs = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No preferences file, using defaults");
                UiPreferences::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, prefs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preferences(&self) -> &UiPreferences {
        &self.prefs
    }

    /// Writes the current preferences, creating parent directories.
    pub fn save(&self) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.prefs)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Hides an incident and saves.
    pub fn hide(&mut self, incident_id: Uuid) -> Result<(), PreferencesError> {
        if self.prefs.hidden_incidents.insert(incident_id) {
            self.save()?;
        }
        Ok(())
    }

    /// Unhides an incident and saves.
    pub fn unhide(&mut self, incident_id: Uuid) -> Result<(), PreferencesError> {
        if self.prefs.hidden_incidents.remove(&incident_id) {
            self.save()?;
        }
        Ok(())
    }

    pub fn set_dark_mode(&mut self, enabled: bool) -> Result<(), PreferencesError> {
        self.prefs.dark_mode = enabled;
        self.save()
    }

    pub fn set_font_size(&mut self, size: u16) -> Result<(), PreferencesError> {
        self.prefs.font_size = size;
        self.save()
    }

    pub fn is_hidden(&self, incident_id: Uuid) -> bool {
        self.prefs.is_hidden(incident_id)
    }

    pub fn visible<'a>(&self, incidents: &'a [Incident]) -> Vec<&'a Incident> {
        self.prefs.visible(incidents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::Severity;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = PreferencesStore::load(dir.path().join("prefs.json")).unwrap();
        assert_eq!(store.preferences(), &UiPreferences::default());
        assert_eq!(store.preferences().font_size, 16);
    }

    #[test]
    fn test_hide_persists_and_filters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let reporter = Uuid::new_v4();
        let incidents = vec![
            Incident::new(reporter, "Lost Device", "phone", Severity::Low),
            Incident::new(reporter, "Data Breach", "leak", Severity::High),
        ];

        let mut store = PreferencesStore::load(&path).unwrap();
        store.hide(incidents[0].id).unwrap();
        store.set_dark_mode(true).unwrap();

        let reloaded = PreferencesStore::load(&path).unwrap();
        assert!(reloaded.is_hidden(incidents[0].id));
        assert!(reloaded.preferences().dark_mode);
        let visible = reloaded.visible(&incidents);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, incidents[1].id);

        let mut reloaded = reloaded;
        reloaded.unhide(incidents[0].id).unwrap();
        assert_eq!(PreferencesStore::load(&path).unwrap().visible(&incidents).len(), 2);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{"dark_mode": true}"#).unwrap();

        let store = PreferencesStore::load(&path).unwrap();
        assert!(store.preferences().dark_mode);
        assert_eq!(store.preferences().font_size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            PreferencesStore::load(&path),
            Err(PreferencesError::Parse(_))
        ));
    }
}
