//! Dependency DAG over resource ids.
//!
//! Nodes keep their declaration order, which is used to break ties so that
//! the same declarations always produce the same order. Edges point from a
//! dependency to its dependent.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::resource::ResourceId;
use crate::stack::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  InProgress,
  Done,
}

/// A DAG of resource ids with deterministic ordering queries.
#[derive(Debug, Clone, Default)]
pub struct ExecutionDag {
  graph: DiGraph<ResourceId, ()>,
  nodes: HashMap<ResourceId, NodeIndex>,
}

impl ExecutionDag {
  /// Build a DAG from ids in declaration order and `(node, dependency)` edges.
  ///
  /// Edges naming an id that is not in `ids` are ignored; callers validate
  /// references before building the graph.
  pub fn new(
    ids: impl IntoIterator<Item = ResourceId>,
    edges: impl IntoIterator<Item = (ResourceId, ResourceId)>,
  ) -> Self {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for id in ids {
      if nodes.contains_key(&id) {
        continue;
      }
      let idx = graph.add_node(id.clone());
      nodes.insert(id, idx);
    }

    for (node, dependency) in edges {
      if let (Some(&node_idx), Some(&dep_idx)) = (nodes.get(&node), nodes.get(&dependency))
        && graph.find_edge(dep_idx, node_idx).is_none()
      {
        graph.add_edge(dep_idx, node_idx, ());
      }
    }

    Self { graph, nodes }
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.nodes.contains_key(id)
  }

  /// Depth-first topological order: every node after all of its dependencies.
  ///
  /// Roots are visited in declaration order and so are each node's
  /// dependencies. A cycle is reported with every node on it, in edge order.
  pub fn topological_order(&self) -> Result<Vec<ResourceId>, ConfigError> {
    let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
    let mut path = Vec::new();
    let mut order = Vec::with_capacity(self.graph.node_count());

    for idx in self.graph.node_indices() {
      self.visit(idx, &mut marks, &mut path, &mut order)?;
    }

    Ok(order)
  }

  fn visit(
    &self,
    idx: NodeIndex,
    marks: &mut [Mark],
    path: &mut Vec<NodeIndex>,
    order: &mut Vec<ResourceId>,
  ) -> Result<(), ConfigError> {
    match marks[idx.index()] {
      Mark::Done => return Ok(()),
      Mark::InProgress => {
        let start = path.iter().position(|&p| p == idx).unwrap_or(0);
        let cycle = path[start..].iter().map(|&p| self.graph[p].clone()).collect();
        return Err(ConfigError::CyclicDependency { cycle });
      }
      Mark::Unvisited => {}
    }

    marks[idx.index()] = Mark::InProgress;
    path.push(idx);

    for dep in self.sorted_neighbors(idx, Direction::Incoming) {
      self.visit(dep, marks, path, order)?;
    }

    path.pop();
    marks[idx.index()] = Mark::Done;
    order.push(self.graph[idx].clone());
    Ok(())
  }

  fn sorted_neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
    let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
    neighbors.sort();
    neighbors
  }

  /// Group nodes into waves of mutually independent nodes.
  ///
  /// Every node's dependencies sit in earlier waves. Within a wave nodes keep
  /// declaration order.
  pub fn execution_waves(&self) -> Result<Vec<Vec<ResourceId>>, ConfigError> {
    // Kahn's algorithm, one level at a time
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
      .collect();
    let mut remaining: BTreeSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[idx.index()] == 0).copied().collect();

      if ready.is_empty() {
        // Stalled: let the DFS name the cycle.
        self.topological_order()?;
        return Err(ConfigError::CyclicDependency {
          cycle: remaining.iter().map(|&idx| self.graph[idx].clone()).collect(),
        });
      }

      for &idx in &ready {
        remaining.remove(&idx);
        for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          in_degree[dependent.index()] = in_degree[dependent.index()].saturating_sub(1);
        }
      }

      waves.push(ready.into_iter().map(|idx| self.graph[idx].clone()).collect());
    }

    Ok(waves)
  }

  /// Direct dependencies of a node, in declaration order.
  pub fn dependencies(&self, id: &str) -> Vec<ResourceId> {
    self.neighbors(id, Direction::Incoming)
  }

  /// Direct dependents of a node, in declaration order.
  pub fn dependents(&self, id: &str) -> Vec<ResourceId> {
    self.neighbors(id, Direction::Outgoing)
  }

  fn neighbors(&self, id: &str, direction: Direction) -> Vec<ResourceId> {
    let Some(&idx) = self.nodes.get(id) else {
      return Vec::new();
    };
    self
      .sorted_neighbors(idx, direction)
      .into_iter()
      .map(|n| self.graph[n].clone())
      .collect()
  }
}
