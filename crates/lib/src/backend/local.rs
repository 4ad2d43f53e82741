//! File-backed emulator of the cloud API.
//!
//! # Storage Layout
//!
//! ```text
//! <root>/
//! ├── bucket/
//! │   └── bucket-state-3f2a9c1d.json
//! ├── function/
//! │   └── function-notifier-9b1e22c0.json
//! └── ...
//! ```
//!
//! Each document holds the node id, the resolved properties and the
//! attributes reported back to the apply engine.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::resource::{Properties, ResourceKind, Value};
use crate::util::hash::{hash_bytes, hash_file};

use super::{BackendAction, BackendError, BackendRequest, BackendResponse, ProvisioningBackend};

const EXTERNAL_ID_SUFFIX_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectDocument {
  node_id: String,
  kind: ResourceKind,
  external_id: String,
  properties: serde_json::Value,
  attributes: BTreeMap<String, String>,
}

/// Emulates the cloud API with one JSON document per provisioned object.
#[derive(Debug, Clone)]
pub struct LocalBackend {
  root: PathBuf,
  artifact_root: Option<PathBuf>,
}

impl LocalBackend {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      artifact_root: None,
    }
  }

  /// Check that function artifacts exist under `<artifact_root>/<bucket>/<key>`.
  pub fn with_artifact_root(mut self, artifact_root: Option<PathBuf>) -> Self {
    self.artifact_root = artifact_root;
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Deterministic external id: `<kind>-<node>-<hash8>`.
  pub fn external_id(kind: ResourceKind, node_id: &str) -> String {
    let hash = hash_bytes(format!("{kind}/{node_id}").as_bytes());
    format!("{kind}-{node_id}-{}", &hash.0[..EXTERNAL_ID_SUFFIX_LEN])
  }

  fn document_path(&self, kind: ResourceKind, external_id: &str) -> PathBuf {
    self.root.join(kind.as_str()).join(format!("{external_id}.json"))
  }

  /// Number of documents currently stored, across all kinds.
  pub fn object_count(&self) -> usize {
    ResourceKind::ALL
      .iter()
      .filter_map(|kind| std::fs::read_dir(self.root.join(kind.as_str())).ok())
      .map(|entries| {
        entries
          .filter_map(Result::ok)
          .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
          .count()
      })
      .sum()
  }

  fn attributes(kind: ResourceKind, node_id: &str, properties: &Properties) -> BTreeMap<String, String> {
    let name = properties
      .get("name")
      .and_then(Value::as_str)
      .unwrap_or(node_id)
      .to_string();
    BTreeMap::from([
      ("arn".to_string(), format!("arn:local:{kind}:::{name}")),
      ("name".to_string(), name),
    ])
  }

  fn validate(&self, request: &BackendRequest) -> Result<BTreeMap<String, String>, BackendError> {
    let mut extra = BTreeMap::new();
    match request.kind {
      ResourceKind::Function => {
        if let Some(artifact_root) = &self.artifact_root {
          let artifact = request.properties.get("artifact").and_then(Value::as_map);
          let bucket = artifact.and_then(|a| a.get("bucket")).and_then(Value::as_str);
          let key = artifact.and_then(|a| a.get("key")).and_then(Value::as_str);
          let (Some(bucket), Some(key)) = (bucket, key) else {
            return Err(BackendError::Permanent(format!(
              "function {} has no resolved artifact location",
              request.node_id
            )));
          };
          let path = artifact_root.join(bucket).join(key);
          let hash = hash_file(&path).map_err(|e| {
            BackendError::Permanent(format!("artifact {bucket}/{key} not readable at {}: {e}", path.display()))
          })?;
          extra.insert("code_sha256".to_string(), hash.0);
        }
      }
      ResourceKind::Rule => {
        if let Some(schedule) = request.properties.get("schedule") {
          let valid = schedule
            .as_str()
            .is_some_and(|s| (s.starts_with("rate(") || s.starts_with("cron(")) && s.ends_with(')'));
          if !valid {
            return Err(BackendError::Permanent(format!(
              "rule {} has an invalid schedule expression",
              request.node_id
            )));
          }
        }
      }
      _ => {}
    }
    Ok(extra)
  }

  async fn write_document(&self, doc: &ObjectDocument) -> Result<(), BackendError> {
    let path = self.document_path(doc.kind, &doc.external_id);
    if let Some(dir) = path.parent() {
      tokio::fs::create_dir_all(dir).await.map_err(transient)?;
    }
    let content = serde_json::to_string_pretty(doc).map_err(|e| BackendError::Permanent(e.to_string()))?;
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, content).await.map_err(transient)?;
    tokio::fs::rename(&temp_path, &path).await.map_err(transient)?;
    Ok(())
  }

  async fn provision(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
    let external_id = match (request.action, &request.external_id) {
      (BackendAction::Update, Some(id)) => id.clone(),
      (BackendAction::Update, None) => {
        return Err(BackendError::Permanent(format!(
          "update of {} without an external id",
          request.node_id
        )));
      }
      _ => Self::external_id(request.kind, &request.node_id),
    };
    let path = self.document_path(request.kind, &external_id);

    let exists = tokio::fs::try_exists(&path).await.map_err(transient)?;
    match request.action {
      BackendAction::Create if exists => {
        return Err(BackendError::Permanent(format!("{external_id} already exists")));
      }
      BackendAction::Update if !exists => {
        return Err(BackendError::Permanent(format!("{external_id} not found")));
      }
      _ => {}
    }

    let mut attributes = Self::attributes(request.kind, &request.node_id, &request.properties);
    attributes.extend(self.validate(request)?);

    let properties = serde_json::Value::Object(
      request
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect(),
    );
    let doc = ObjectDocument {
      node_id: request.node_id.clone(),
      kind: request.kind,
      external_id: external_id.clone(),
      properties,
      attributes: attributes.clone(),
    };
    self.write_document(&doc).await?;

    info!(node = %request.node_id, external_id = %external_id, action = %request.action, "local backend provisioned");
    Ok(BackendResponse::Provisioned {
      external_id,
      attributes,
    })
  }

  async fn delete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
    let Some(external_id) = &request.external_id else {
      return Err(BackendError::Permanent(format!(
        "delete of {} without an external id",
        request.node_id
      )));
    };
    let path = self.document_path(request.kind, external_id);
    match tokio::fs::remove_file(&path).await {
      Ok(()) => info!(node = %request.node_id, external_id = %external_id, "local backend deleted"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(node = %request.node_id, external_id = %external_id, "already deleted");
      }
      Err(e) => return Err(transient(e)),
    }
    Ok(BackendResponse::Deleted)
  }
}

fn transient(e: io::Error) -> BackendError {
  BackendError::Transient(e.to_string())
}

#[async_trait]
impl ProvisioningBackend for LocalBackend {
  fn name(&self) -> &str {
    "local"
  }

  async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
    match request.action {
      BackendAction::Create | BackendAction::Update => self.provision(request).await,
      BackendAction::Delete => self.delete(request).await,
    }
  }
}
