// Access-code routing for the landing page and the "saved codes" list.
// JS owns fetching the index and localStorage; lookups and list bookkeeping live here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EngineError;

/// Default number of codes remembered on the device.
pub const DEFAULT_SAVED_CODES: usize = 10;

/// Project entry in the published index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub code: String,
    pub name: String,
    /// Relative path of the module to redirect to.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectIndexFile {
    projects: Vec<ProjectEntry>,
}

/// Result of submitting an access code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum AccessOutcome {
    Redirect { path: String, name: String },
    Empty,
    NotFound { code: String },
}

/// Codes are case-insensitive and ignore surrounding whitespace.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Lookup table from normalized access code to project.
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    projects: HashMap<String, ProjectEntry>,
}

impl ProjectIndex {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let file: ProjectIndexFile = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("project index: {}", e)))?;
        Self::from_entries(file.projects)
    }

    pub fn from_entries(entries: Vec<ProjectEntry>) -> Result<Self, EngineError> {
        let mut projects = HashMap::with_capacity(entries.len());

        for entry in entries {
            let code = normalize_code(&entry.code);
            if code.is_empty() {
                return Err(EngineError::InvalidConfig(format!(
                    "project '{}' has an empty code",
                    entry.name
                )));
            }
            if entry.path.trim().is_empty() {
                return Err(EngineError::InvalidConfig(format!(
                    "project '{}' has an empty path",
                    code
                )));
            }
            if projects.contains_key(&code) {
                return Err(EngineError::InvalidConfig(format!(
                    "duplicate project code '{}'",
                    code
                )));
            }
            projects.insert(code, entry);
        }

        Ok(ProjectIndex { projects })
    }

    pub fn resolve(&self, code: &str) -> AccessOutcome {
        let code = normalize_code(code);
        if code.is_empty() {
            return AccessOutcome::Empty;
        }

        match self.projects.get(&code) {
            Some(entry) => {
                debug!(code = %code, path = %entry.path, "access code resolved");
                AccessOutcome::Redirect {
                    path: entry.path.clone(),
                    name: entry.name.clone(),
                }
            }
            None => AccessOutcome::NotFound { code },
        }
    }
}

/// Recently used codes, most recent first, without duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCodes {
    codes: Vec<String>,
    #[serde(skip, default = "default_capacity")]
    capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_SAVED_CODES
}

impl Default for SavedCodes {
    fn default() -> Self {
        SavedCodes::with_capacity(DEFAULT_SAVED_CODES)
    }
}

impl SavedCodes {
    pub fn with_capacity(capacity: usize) -> Self {
        SavedCodes {
            codes: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Load what JS kept in storage. Corrupt data starts an empty list.
    pub fn from_storage(json: Option<&str>) -> Self {
        let Some(json) = json else {
            return SavedCodes::default();
        };
        match serde_json::from_str::<Vec<String>>(json) {
            Ok(stored) => {
                let mut saved = SavedCodes::default();
                for code in stored.iter().rev() {
                    saved.remember(code);
                }
                saved
            }
            Err(e) => {
                warn!(error = %e, "discarding corrupt saved codes");
                SavedCodes::default()
            }
        }
    }

    pub fn to_storage(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(&self.codes)?)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Move `code` to the front, dropping the oldest entry when full.
    pub fn remember(&mut self, code: &str) -> bool {
        let code = normalize_code(code);
        if code.is_empty() {
            return false;
        }
        self.codes.retain(|c| *c != code);
        self.codes.insert(0, code);
        self.codes.truncate(self.capacity);
        true
    }

    pub fn forget(&mut self, code: &str) -> bool {
        let code = normalize_code(code);
        let before = self.codes.len();
        self.codes.retain(|c| *c != code);
        self.codes.len() != before
    }

    pub fn clear(&mut self) {
        self.codes.clear();
    }
}
