use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::STATE_VERSION;
use crate::platform::paths::state_file;

use super::types::AppliedState;

/// Errors that can occur when reading or writing applied state.
#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to read state file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write state file {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create state directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse state file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize state: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported state version {found} (expected {expected})")]
  UnsupportedVersion { found: u32, expected: u32 },

  #[error("state file belongs to stack '{found}', not '{expected}'")]
  StackMismatch { found: String, expected: String },
}

/// Reads and writes the applied state of one stack.
///
/// Writes go through a temporary file and a rename so a crash never leaves a
/// half-written state file behind.
#[derive(Debug, Clone)]
pub struct StateStore {
  path: PathBuf,
}

impl StateStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// The store for a named stack under the default state directory.
  pub fn for_stack(stack_name: &str) -> Self {
    Self::new(state_file(stack_name))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.exists()
  }

  /// Load the state, or an empty state for `stack` if no file exists yet.
  pub fn load_or_empty(&self, stack: &str) -> Result<AppliedState, StateError> {
    let state = match self.load()? {
      Some(state) => state,
      None => {
        debug!(path = %self.path.display(), "no state file, starting empty");
        return Ok(AppliedState::new(stack));
      }
    };

    if state.stack != stack {
      return Err(StateError::StackMismatch {
        found: state.stack,
        expected: stack.to_string(),
      });
    }
    Ok(state)
  }

  /// Load the state file.
  ///
  /// Returns `Ok(None)` if the file doesn't exist.
  pub fn load(&self) -> Result<Option<AppliedState>, StateError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(StateError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };

    let state: AppliedState = serde_json::from_str(&content).map_err(|source| StateError::Parse {
      path: self.path.clone(),
      source,
    })?;

    if state.version != STATE_VERSION {
      return Err(StateError::UnsupportedVersion {
        found: state.version,
        expected: STATE_VERSION,
      });
    }

    Ok(Some(state))
  }

  /// Persist the state atomically.
  pub fn save(&self, state: &AppliedState) -> Result<(), StateError> {
    if let Some(dir) = self.path.parent()
      && !dir.as_os_str().is_empty()
    {
      fs::create_dir_all(dir).map_err(|source| StateError::CreateDir {
        path: dir.to_path_buf(),
        source,
      })?;
    }

    let content = serde_json::to_string_pretty(state).map_err(StateError::Serialize)?;

    let temp_path = self.path.with_extension("json.tmp");
    fs::write(&temp_path, &content).map_err(|source| StateError::Write {
      path: temp_path.clone(),
      source,
    })?;
    fs::rename(&temp_path, &self.path).map_err(|source| StateError::Write {
      path: self.path.clone(),
      source,
    })?;

    debug!(path = %self.path.display(), resources = state.resources.len(), "saved state");
    Ok(())
  }

  /// Delete the state file. Succeeds if it is already gone.
  pub fn remove(&self) -> Result<(), StateError> {
    match fs::remove_file(&self.path) {
      Ok(()) => {
        info!(path = %self.path.display(), "removed state file");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(StateError::Write {
        path: self.path.clone(),
        source,
      }),
    }
  }
}
