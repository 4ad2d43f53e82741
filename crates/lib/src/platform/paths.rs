use crate::consts::APP_NAME;
use std::path::PathBuf;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  std::env::var("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join("AppData").join("Roaming"))
    .join(APP_NAME)
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// Directory holding one applied-state file per stack.
///
/// `STACKUP_STATE_DIR` overrides the default `<data_dir>/state`.
pub fn state_dir() -> PathBuf {
  match std::env::var("STACKUP_STATE_DIR") {
    Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => data_dir().join("state"),
  }
}

/// Path of the applied-state file for a named stack.
pub fn state_file(stack_name: &str) -> PathBuf {
  state_dir().join(format!("{stack_name}.json"))
}

/// Root directory of the local cloud emulator.
///
/// `STACKUP_CLOUD_DIR` overrides the default `<data_dir>/cloud`.
pub fn cloud_dir() -> PathBuf {
  match std::env::var("STACKUP_CLOUD_DIR") {
    Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => data_dir().join("cloud"),
  }
}

/// Root under which function artifacts are looked up as `<root>/<bucket>/<key>`.
///
/// Artifact checks are disabled unless `STACKUP_ARTIFACT_DIR` is set.
pub fn artifact_dir() -> Option<PathBuf> {
  match std::env::var("STACKUP_ARTIFACT_DIR") {
    Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
    _ => None,
  }
}
