//! Shared helpers for library integration tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use stackup_lib::backend::MemoryBackend;
use stackup_lib::execute::{ApplyReport, CancelToken, ExecuteConfig, RetryPolicy, execute_plan};
use stackup_lib::plan::compute_plan;
use stackup_lib::resource::{Properties, Value};
use stackup_lib::stack::{Stack, synthesize};
use stackup_lib::state::{AppliedState, StateStore};
use tempfile::TempDir;

pub fn props(pairs: &[(&str, Value)]) -> Properties {
  pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

pub fn artifact(bucket: Value, key: &str) -> Value {
  Value::Map(BTreeMap::from([
    ("bucket".to_string(), bucket),
    ("key".to_string(), Value::from(key)),
  ]))
}

/// A memory backend plus a state file in a temp dir.
pub struct Harness {
  pub backend: Arc<MemoryBackend>,
  pub store: StateStore,
  pub config: ExecuteConfig,
  _temp: TempDir,
}

impl Harness {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    Self {
      backend: Arc::new(MemoryBackend::new()),
      store: StateStore::new(temp.path().join("state.json")),
      config: ExecuteConfig {
        parallelism: 1,
        retry: RetryPolicy::immediate(3),
      },
      _temp: temp,
    }
  }

  pub fn state(&self, stack: &str) -> AppliedState {
    self.store.load_or_empty(stack).unwrap()
  }

  pub async fn apply(&self, stack: Stack) -> ApplyReport {
    let synth = synthesize(stack).unwrap();
    let mut state = self.state(&synth.stack.name);
    let plan = compute_plan(&synth, &state).unwrap();
    execute_plan(
      &plan,
      self.backend.clone(),
      &self.store,
      &mut state,
      &self.config,
      &CancelToken::new(),
    )
    .await
    .unwrap()
  }
}
