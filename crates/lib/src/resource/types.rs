use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a node within a stack. Unique per stack.
pub type ResourceId = String;

/// The kinds of infrastructure object a node can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  Bucket,
  Function,
  User,
  Role,
  Policy,
  Rule,
}

impl ResourceKind {
  pub const ALL: [ResourceKind; 6] = [
    ResourceKind::Bucket,
    ResourceKind::Function,
    ResourceKind::User,
    ResourceKind::Role,
    ResourceKind::Policy,
    ResourceKind::Rule,
  ];

  /// Lowercase name used in external ids and the Lua surface.
  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceKind::Bucket => "bucket",
      ResourceKind::Function => "function",
      ResourceKind::User => "user",
      ResourceKind::Role => "role",
      ResourceKind::Policy => "policy",
      ResourceKind::Rule => "rule",
    }
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "unknown resource kind '{}'", self.0)
  }
}

impl std::error::Error for UnknownKind {}

impl FromStr for ResourceKind {
  type Err = UnknownKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.to_ascii_lowercase();
    ResourceKind::ALL
      .into_iter()
      .find(|kind| kind.as_str() == lower || (lower == "func" && *kind == ResourceKind::Function))
      .ok_or_else(|| UnknownKind(s.to_string()))
  }
}

/// A forward pointer to an attribute of another node, known only after that
/// node has been provisioned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
  pub target: ResourceId,
  pub attribute: String,
}

impl Reference {
  pub fn new(target: impl Into<ResourceId>, attribute: impl Into<String>) -> Self {
    Self {
      target: target.into(),
      attribute: attribute.into(),
    }
  }
}

impl fmt::Display for Reference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "${{{}.{}}}", self.target, self.attribute)
  }
}

/// A property value. References stay unresolved until apply time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
  Null,
  Bool(bool),
  Number(f64),
  String(String),
  List(Vec<Value>),
  Map(BTreeMap<String, Value>),
  Reference(Reference),
}

impl Value {
  pub fn reference(target: impl Into<ResourceId>, attribute: impl Into<String>) -> Self {
    Value::Reference(Reference::new(target, attribute))
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(m) => Some(m),
      _ => None,
    }
  }

  /// False if any number in this value is NaN or infinite. JSON has no
  /// encoding for those.
  pub fn is_finite(&self) -> bool {
    match self {
      Value::Number(n) => n.is_finite(),
      Value::List(items) => items.iter().all(Value::is_finite),
      Value::Map(map) => map.values().all(Value::is_finite),
      _ => true,
    }
  }

  /// Collect every reference contained in this value, depth first.
  pub fn references(&self) -> Vec<&Reference> {
    let mut refs = Vec::new();
    self.collect_references(&mut refs);
    refs
  }

  fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
    match self {
      Value::Reference(r) => out.push(r),
      Value::List(items) => items.iter().for_each(|v| v.collect_references(out)),
      Value::Map(map) => map.values().for_each(|v| v.collect_references(out)),
      _ => {}
    }
  }

  /// Replace every reference using `resolve`, failing on the first error.
  pub fn resolve<E>(&self, resolve: &mut impl FnMut(&Reference) -> Result<Value, E>) -> Result<Value, E> {
    Ok(match self {
      Value::Reference(r) => resolve(r)?,
      Value::List(items) => Value::List(items.iter().map(|v| v.resolve(resolve)).collect::<Result<_, _>>()?),
      Value::Map(map) => Value::Map(
        map
          .iter()
          .map(|(k, v)| -> Result<_, E> { Ok((k.clone(), v.resolve(resolve)?)) })
          .collect::<Result<_, E>>()?,
      ),
      other => other.clone(),
    })
  }

  /// Plain JSON rendering, with references shown as `${target.attribute}`.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Null => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(*b),
      Value::Number(n) => serde_json::Number::from_f64(*n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null),
      Value::String(s) => serde_json::Value::String(s.clone()),
      Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
      Value::Map(map) => serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
      Value::Reference(r) => serde_json::Value::String(r.to_string()),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<f64> for Value {
  fn from(n: f64) -> Self {
    Value::Number(n)
  }
}

impl From<Reference> for Value {
  fn from(r: Reference) -> Self {
    Value::Reference(r)
  }
}

pub type Properties = BTreeMap<String, Value>;

/// Where a node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
  Declared,
  Grant,
}

/// One declared infrastructure object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
  pub id: ResourceId,
  pub kind: ResourceKind,
  pub properties: Properties,
  pub depends_on: BTreeSet<ResourceId>,
  pub origin: Origin,
}

impl ResourceNode {
  pub fn new(id: impl Into<ResourceId>, kind: ResourceKind, properties: Properties) -> Self {
    Self {
      id: id.into(),
      kind,
      properties,
      depends_on: BTreeSet::new(),
      origin: Origin::Declared,
    }
  }

  /// Every reference in the property bag, in key order.
  pub fn references(&self) -> Vec<&Reference> {
    self.properties.values().flat_map(Value::references).collect()
  }
}
