/// Successor graph built from a workflow's step and link lists
///
/// Each step becomes a petgraph node; each link becomes an edge weighted by its
/// position in the link list, so successors can always be returned in the order
/// the links were declared. Links whose source is not a known step are dropped.
/// Links pointing at an unknown target are kept: the orchestrator has to see
/// that dangling successor to report it.

use crate::workflow::types::{Link, Step};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub struct StepGraph {
    /// Node weight is the step ID; edge weight is the link's list position
    graph: DiGraph<String, usize>,
    /// Mapping from step ID to graph node index; real steps only
    index: HashMap<String, NodeIndex>,
    /// Nodes for link targets that name no step
    dangling: HashMap<String, NodeIndex>,
}

impl StepGraph {
    /// Build the successor graph; pure, never fails
    pub fn build(steps: &[Step], links: &[Link]) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut dangling = HashMap::new();

        for step in steps {
            index
                .entry(step.id.clone())
                .or_insert_with(|| graph.add_node(step.id.clone()));
        }

        for (position, link) in links.iter().enumerate() {
            let Some(&from) = index.get(&link.source) else {
                tracing::debug!("🔗 Ignoring link '{}' from unknown step '{}'", link.id, link.source);
                continue;
            };
            let to = match index.get(&link.target) {
                Some(&to) => to,
                None => *dangling
                    .entry(link.target.clone())
                    .or_insert_with(|| graph.add_node(link.target.clone())),
            };
            graph.add_edge(from, to, position);
        }

        Self { graph, index, dangling }
    }

    /// Successor step IDs of `step_id`, in link-list order
    pub fn successors(&self, step_id: &str) -> Vec<&str> {
        let Some(&node) = self.index.get(step_id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges(node)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        edges.sort_by_key(|(position, _)| *position);
        edges
            .into_iter()
            .map(|(_, target)| self.graph[target].as_str())
            .collect()
    }

    /// Step IDs reachable from `start`, including `start` itself
    ///
    /// Dangling link targets are not steps and are left out.
    pub fn reachable_from(&self, start: &str) -> HashSet<&str> {
        let mut reachable = HashSet::new();
        if let Some(&node) = self.index.get(start) {
            let mut bfs = Bfs::new(&self.graph, node);
            while let Some(next) = bfs.next(&self.graph) {
                let id = self.graph[next].as_str();
                if !self.dangling.contains_key(id) {
                    reachable.insert(id);
                }
            }
        }
        reachable
    }

    /// Adjacency view: step ID to ordered successor IDs
    pub fn adjacency(&self) -> HashMap<&str, Vec<&str>> {
        self.index
            .keys()
            .map(|id| (id.as_str(), self.successors(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn step(id: &str) -> Step {
        Step { id: id.into(), step_type: "code".into(), data: Value::Null, position: None }
    }

    fn link(source: &str, target: &str) -> Link {
        Link {
            id: format!("{source}-{target}"),
            source: source.into(),
            target: target.into(),
            extra: Default::default(),
        }
    }

    #[test]
    fn successors_follow_link_order() {
        let graph = StepGraph::build(
            &[step("a"), step("b"), step("c")],
            &[link("a", "c"), link("a", "b"), link("b", "c")],
        );
        assert_eq!(graph.successors("a"), vec!["c", "b"]);
        assert_eq!(graph.successors("b"), vec!["c"]);
        assert!(graph.successors("c").is_empty());
    }

    #[test]
    fn link_from_unknown_source_is_ignored() {
        let graph = StepGraph::build(&[step("a")], &[link("ghost", "a")]);
        assert!(graph.successors("ghost").is_empty());
        assert!(graph.adjacency().get("ghost").is_none());
    }

    #[test]
    fn dangling_target_does_not_become_a_source() {
        let graph = StepGraph::build(&[step("a"), step("b")], &[link("a", "ghost"), link("ghost", "b")]);
        assert_eq!(graph.successors("a"), vec!["ghost"]);
        assert!(graph.successors("ghost").is_empty());

        let adjacency = graph.adjacency();
        assert_eq!(adjacency.len(), 2);
        assert!(!adjacency.contains_key("ghost"));
        assert!(adjacency["b"].is_empty());

        let reachable = graph.reachable_from("a");
        assert_eq!(reachable, HashSet::from(["a"]));
    }

    #[test]
    fn dangling_target_is_still_a_successor() {
        let graph = StepGraph::build(&[step("a")], &[link("a", "missing")]);
        assert_eq!(graph.successors("a"), vec!["missing"]);
    }

    #[test]
    fn reachability_excludes_disconnected_steps() {
        let graph = StepGraph::build(
            &[step("a"), step("b"), step("island")],
            &[link("a", "b")],
        );
        let reachable = graph.reachable_from("a");
        assert!(reachable.contains("a") && reachable.contains("b"));
        assert!(!reachable.contains("island"));
    }

    #[test]
    fn every_known_step_has_an_adjacency_entry() {
        let graph = StepGraph::build(&[step("a"), step("b")], &[]);
        let adjacency = graph.adjacency();
        assert_eq!(adjacency.len(), 2);
        assert!(adjacency["a"].is_empty());
    }
}
