//! In-process backend with fault injection, used by tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::resource::{Properties, ResourceId, ResourceKind, Value};

use super::{BackendAction, BackendError, BackendRequest, BackendResponse, ProvisioningBackend};

/// A failure to inject for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
  /// Fail with a transient error this many times, then succeed.
  Transient(u32),
  /// Always fail with a permanent error.
  Permanent,
}

/// One call the backend received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
  pub action: BackendAction,
  pub node_id: ResourceId,
  pub properties: Properties,
  pub succeeded: bool,
}

#[derive(Debug, Clone)]
struct StoredObject {
  kind: ResourceKind,
  properties: Properties,
}

#[derive(Debug, Default)]
struct Inner {
  objects: BTreeMap<String, StoredObject>,
  faults: HashMap<ResourceId, Fault>,
  log: Vec<RecordedCall>,
}

/// Keeps provisioned objects in memory and records every call.
#[derive(Debug, Default)]
pub struct MemoryBackend {
  inner: Mutex<Inner>,
  latency: Option<Duration>,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sleep this long inside every call.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  pub fn inject(&self, node_id: impl Into<ResourceId>, fault: Fault) {
    self.lock().faults.insert(node_id.into(), fault);
  }

  pub fn clear_faults(&self) {
    self.lock().faults.clear();
  }

  /// Every call received so far, in arrival order.
  pub fn calls(&self) -> Vec<RecordedCall> {
    self.lock().log.clone()
  }

  /// Node ids of successful calls with the given action, in arrival order.
  pub fn succeeded(&self, action: BackendAction) -> Vec<ResourceId> {
    self
      .lock()
      .log
      .iter()
      .filter(|c| c.succeeded && c.action == action)
      .map(|c| c.node_id.clone())
      .collect()
  }

  /// Number of provisioned objects.
  pub fn object_count(&self) -> usize {
    self.lock().objects.len()
  }

  /// Properties of the object provisioned for `node_id`, if any.
  pub fn object(&self, node_id: &str) -> Option<Properties> {
    self.lock().objects.get(&external_id_for(node_id)).map(|o| o.properties.clone())
  }

  /// Highest number of calls that were in progress at the same time.
  pub fn max_in_flight(&self) -> usize {
    self.max_in_flight.load(Ordering::SeqCst)
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn handle(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
    let mut inner = self.lock();

    let fault = match inner.faults.get_mut(&request.node_id) {
      Some(Fault::Permanent) => Some(BackendError::Permanent(format!("injected failure for {}", request.node_id))),
      Some(Fault::Transient(remaining)) if *remaining > 0 => {
        *remaining -= 1;
        Some(BackendError::Transient(format!("injected throttling for {}", request.node_id)))
      }
      _ => None,
    };

    let result = match fault {
      Some(err) => Err(err),
      None => apply(&mut inner.objects, request),
    };

    inner.log.push(RecordedCall {
      action: request.action,
      node_id: request.node_id.clone(),
      properties: request.properties.clone(),
      succeeded: result.is_ok(),
    });
    result
  }
}

fn external_id_for(node_id: &str) -> String {
  format!("mem-{node_id}")
}

/// `name` follows the declared `name` property; `arn` is keyed by node id.
fn attributes(kind: ResourceKind, node_id: &str, properties: &Properties) -> BTreeMap<String, String> {
  let name = properties.get("name").and_then(Value::as_str).unwrap_or(node_id);
  BTreeMap::from([
    ("arn".to_string(), format!("arn:memory:{kind}:::{node_id}")),
    ("name".to_string(), name.to_string()),
  ])
}

fn apply(objects: &mut BTreeMap<String, StoredObject>, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
  match request.action {
    BackendAction::Create => {
      let external_id = external_id_for(&request.node_id);
      if objects.contains_key(&external_id) {
        return Err(BackendError::Permanent(format!("{external_id} already exists")));
      }
      objects.insert(
        external_id.clone(),
        StoredObject {
          kind: request.kind,
          properties: request.properties.clone(),
        },
      );
      Ok(BackendResponse::Provisioned {
        external_id,
        attributes: attributes(request.kind, &request.node_id, &request.properties),
      })
    }
    BackendAction::Update => {
      let external_id = request
        .external_id
        .clone()
        .ok_or_else(|| BackendError::Permanent("update without external id".to_string()))?;
      let Some(object) = objects.get_mut(&external_id) else {
        return Err(BackendError::Permanent(format!("{external_id} not found")));
      };
      object.properties = request.properties.clone();
      Ok(BackendResponse::Provisioned {
        external_id,
        attributes: attributes(object.kind, &request.node_id, &request.properties),
      })
    }
    BackendAction::Delete => {
      if let Some(external_id) = &request.external_id {
        objects.remove(external_id);
      }
      Ok(BackendResponse::Deleted)
    }
  }
}

#[async_trait]
impl ProvisioningBackend for MemoryBackend {
  fn name(&self) -> &str {
    "memory"
  }

  async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);

    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }

    debug!(node = %request.node_id, action = %request.action, "memory backend call");
    let result = self.handle(request);
    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    result
  }
}
