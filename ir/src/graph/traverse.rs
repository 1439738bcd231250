//! Ordering, reachability and dead-node reclamation.

use super::{Graph, NodeId};

impl Graph {
    /// Nodes reachable from the declared results, producers before consumers.
    ///
    /// This is the view a backend consumes once rewriting has finished.
    pub fn ordered_nodes(&self) -> Vec<NodeId> {
        self.topological_order(self.results.iter().copied())
    }

    /// Nodes reachable from `roots` through input edges, producers first.
    ///
    /// Ties are broken by input order, so the result is deterministic.
    pub fn topological_order(&self, roots: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = Vec::new();

        for root in roots {
            if !self.contains(root) || visited[root.index()] {
                continue;
            }
            visited[root.index()] = true;
            stack.push((root, 0));

            while let Some((id, next)) = stack.last_mut() {
                let inputs = self.get(*id).map(|node| node.inputs()).unwrap_or_default();
                match inputs.get(*next) {
                    Some(value) => {
                        *next += 1;
                        let producer = value.node;
                        if !visited[producer.index()] {
                            visited[producer.index()] = true;
                            stack.push((producer, 0));
                        }
                    }
                    None => {
                        order.push(*id);
                        stack.pop();
                    }
                }
            }
        }
        order
    }

    /// Whether `node` transitively reads any output of `ancestor`.
    pub fn depends_on(&self, node: NodeId, ancestor: NodeId) -> bool {
        if node == ancestor {
            return false;
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(current) = self.get(id) else { continue };
            for value in current.inputs() {
                if value.node == ancestor {
                    return true;
                }
                if !visited[value.node.index()] {
                    visited[value.node.index()] = true;
                    stack.push(value.node);
                }
            }
        }
        false
    }

    /// Remove every node not reachable from a declared result or parameter.
    ///
    /// Returns how many nodes were reclaimed. Users lists of surviving
    /// producers are pruned, so no edge ever refers to a freed slot.
    pub fn sweep(&mut self) -> usize {
        let roots: Vec<NodeId> = self.results.iter().chain(&self.parameters).copied().collect();
        let mut live = vec![false; self.nodes.len()];
        for id in self.topological_order(roots) {
            live[id.index()] = true;
        }

        let dead: Vec<NodeId> = self.nodes().map(|node| node.id()).filter(|id| !live[id.index()]).collect();
        for &id in &dead {
            let inputs = self.nodes[id.index()].take().map(|node| node.inputs).unwrap_or_default();
            for value in inputs {
                if let Some(producer) = self.nodes[value.node.index()].as_mut() {
                    producer.outputs[value.index].users.retain(|usage| usage.consumer != id);
                }
            }
        }

        if !dead.is_empty() {
            tracing::debug!(reclaimed = dead.len(), live = self.len(), "swept dead nodes");
        }
        dead.len()
    }
}
