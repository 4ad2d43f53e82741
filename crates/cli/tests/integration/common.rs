//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory with isolated state, cloud and
/// data paths.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  /// Copies the fixture content to a temporary `stack.lua` file.
  pub fn from_fixture(name: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("stack.lua");
    std::fs::write(&config_path, fixture_content(name)).unwrap();
    Self { temp, config_path }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  fn dir(&self, name: &str) -> PathBuf {
    let p = self.temp.path().join(name);
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Where applied state files go.
  pub fn state_path(&self) -> PathBuf {
    self.dir("state")
  }

  /// Root of the local backend.
  pub fn cloud_path(&self) -> PathBuf {
    self.dir("cloud")
  }

  pub fn data_path(&self) -> PathBuf {
    self.dir("data")
  }

  /// State file of the stack named `stack`.
  pub fn state_file(&self, stack: &str) -> PathBuf {
    self.state_path().join(format!("{stack}.json"))
  }

  /// Number of documents the local backend holds.
  pub fn cloud_objects(&self) -> usize {
    let Ok(kinds) = std::fs::read_dir(self.cloud_path()) else {
      return 0;
    };
    kinds
      .flatten()
      .filter_map(|kind| std::fs::read_dir(kind.path()).ok())
      .flat_map(|docs| docs.flatten())
      .filter(|doc| doc.path().extension().is_some_and(|ext| ext == "json"))
      .count()
  }

  /// Get a pre-configured Command for the stackup binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `STACKUP_STATE_DIR`: applied state files
  /// - `STACKUP_CLOUD_DIR`: local backend root
  /// - `XDG_DATA_HOME` / `HOME`: everything else
  pub fn stackup_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("stackup");
    cmd.env("HOME", self.temp.path());
    cmd.env("XDG_DATA_HOME", self.data_path());
    cmd.env("STACKUP_STATE_DIR", self.state_path());
    cmd.env("STACKUP_CLOUD_DIR", self.cloud_path());
    cmd.env_remove("STACKUP_ARTIFACT_DIR");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}
