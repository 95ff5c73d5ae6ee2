//! Network Topology (C3): a rooted tree with bounded depth and branching
//! factor, stored as an arena of nodes keyed by stable `NodeId` (Design
//! Notes §9: "arena + stable ID" rather than structural parent/child
//! pointers — the same idiom the teacher's `TopologyGraph` trait uses for
//! its own labeled graph, adapted here to a bounded tree shape instead of
//! a general graph).

use std::collections::HashMap;
use ufog_core::prelude::*;

/// A fractal tree topology: breadth-first filled up to `num_agents`,
/// bounded by `depth` and `branching_factor`.
pub struct TreeTopology {
    nodes: HashMap<NodeId, TreeNode>,
    root: NodeId,
    max_depth: u32,
    branching_factor: u32,
}

impl TreeTopology {
    /// Build a tree with `num_agents` nodes placed breadth-first; any
    /// leftover capacity under `depth`/`branching_factor` is left
    /// unfilled, per spec §4.3's construction policy.
    pub fn build(
        num_agents: u32,
        depth: u32,
        branching_factor: u32,
        ids: &mut IdMinter,
    ) -> (Self, Vec<NodeId>) {
        let mut nodes = HashMap::new();
        let root_id = ids.node();
        nodes.insert(root_id, TreeNode::root(root_id));
        let mut order = vec![root_id];

        let mut frontier = vec![root_id];
        let mut placed: u32 = 1;
        'fill: while placed < num_agents {
            let mut next_frontier = Vec::new();
            for parent_id in frontier {
                let parent_depth = nodes[&parent_id].depth;
                if parent_depth >= depth {
                    continue;
                }
                for _ in 0..branching_factor {
                    if placed >= num_agents {
                        break 'fill;
                    }
                    let child_id = ids.node();
                    let child = TreeNode {
                        node_id: child_id,
                        parent: Some(parent_id),
                        children: Vec::new(),
                        depth: parent_depth + 1,
                        agent_id: None,
                    };
                    nodes.get_mut(&parent_id).unwrap().children.push(child_id);
                    nodes.insert(child_id, child);
                    order.push(child_id);
                    next_frontier.push(child_id);
                    placed += 1;
                }
            }
            if next_frontier.is_empty() {
                // No more capacity under depth/branching bound; remaining
                // agent slots are left unfilled (reproducible, documented
                // behavior, not an error).
                break;
            }
            frontier = next_frontier;
        }

        (
            Self {
                nodes,
                root: root_id,
                max_depth: depth,
                branching_factor,
            },
            order,
        )
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut out = node.children.clone();
        if let Some(p) = node.parent {
            out.push(p);
        }
        out
    }

    /// Depth-first, lazily-collected subtree rooted at `id` (including
    /// `id` itself).
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            if let Some(node) = self.nodes.get(&cur) {
                for child in node.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }
        out
    }

    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = Some(id);
        while let Some(n) = cur {
            out.push(n);
            cur = self.nodes.get(&n).and_then(|node| node.parent);
        }
        out
    }

    /// All descendants exactly `k` hops below `id`.
    pub fn descendants_at(&self, id: NodeId, k: u32) -> Vec<NodeId> {
        let mut frontier = vec![id];
        for _ in 0..k {
            let mut next = Vec::new();
            for n in frontier {
                if let Some(node) = self.nodes.get(&n) {
                    next.extend(node.children.iter().copied());
                }
            }
            frontier = next;
        }
        frontier
    }

    pub fn assign_agent(&mut self, node_id: NodeId, agent_id: AgentId) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.agent_id = Some(agent_id);
        }
    }

    /// Remove a node. If it is a leaf, it is simply dropped. If it has
    /// children, they are re-parented to its parent, in original order,
    /// subject to the branching bound — if re-parenting would overflow
    /// the parent's capacity, the deepest children are trimmed
    /// deterministically (spec §4.8 step 4's compaction policy, shared
    /// with plain `remove_node` per §4.3).
    pub fn remove_node(&mut self, id: NodeId) -> Result<Vec<NodeId>, InvariantError> {
        let Some(node) = self.nodes.get(&id).cloned() else {
            return Ok(Vec::new());
        };
        let parent_id = node.parent;
        let children = node.children.clone();

        if let Some(parent_id) = parent_id {
            let parent_children_before: Vec<NodeId> = self.nodes[&parent_id]
                .children
                .iter()
                .filter(|c| **c != id)
                .copied()
                .collect();

            let capacity_left = self.branching_factor as usize - parent_children_before.len();
            let mut sorted_children = children.clone();
            // Deterministic trim: deepest children first (all equal depth
            // here since siblings share depth, so this is a stable no-op
            // unless called with uneven subtrees in future extensions).
            sorted_children.sort_by_key(|c| std::cmp::Reverse(self.nodes[c].depth));
            let (keep, trim): (Vec<NodeId>, Vec<NodeId>) = if sorted_children.len() > capacity_left
            {
                (
                    sorted_children[..capacity_left].to_vec(),
                    sorted_children[capacity_left..].to_vec(),
                )
            } else {
                (sorted_children, Vec::new())
            };

            let mut new_parent_children = parent_children_before;
            // restore original relative order of kept children among themselves
            let keep_set: std::collections::HashSet<_> = keep.iter().copied().collect();
            for c in &children {
                if keep_set.contains(c) {
                    new_parent_children.push(*c);
                }
            }

            for c in &new_parent_children {
                if children.contains(c) {
                    if let Some(n) = self.nodes.get_mut(c) {
                        n.parent = Some(parent_id);
                        n.depth = self.nodes[&parent_id].depth + 1;
                    }
                }
            }
            if let Some(p) = self.nodes.get_mut(&parent_id) {
                p.children = new_parent_children;
            }
            for trimmed in &trim {
                self.prune_subtree(*trimmed);
            }
            self.nodes.remove(&id);
            self.check_invariants()?;
            Ok(trim)
        } else {
            // Root removal is not a supported operation: exactly one root
            // must exist at all times.
            Err(InvariantError::MissingRoot)
        }
    }

    fn prune_subtree(&mut self, id: NodeId) {
        let ids = self.subtree(id);
        for i in ids {
            self.nodes.remove(&i);
        }
    }

    pub fn add_node(&mut self, parent: NodeId, ids: &mut IdMinter) -> Result<NodeId, InvariantError> {
        let parent_depth = self
            .nodes
            .get(&parent)
            .ok_or(InvariantError::DuplicateId(parent.to_string()))?
            .depth;
        if parent_depth + 1 > self.max_depth {
            return Err(InvariantError::DepthExceeded {
                node: parent.to_string(),
                depth: parent_depth + 1,
                max: self.max_depth,
            });
        }
        if self.nodes[&parent].children.len() >= self.branching_factor as usize {
            return Err(InvariantError::BranchingExceeded {
                node: parent.to_string(),
                count: self.nodes[&parent].children.len() + 1,
                max: self.branching_factor as usize,
            });
        }
        let id = ids.node();
        self.nodes.insert(
            id,
            TreeNode {
                node_id: id,
                parent: Some(parent),
                children: Vec::new(),
                depth: parent_depth + 1,
                agent_id: None,
            },
        );
        self.nodes.get_mut(&parent).unwrap().children.push(id);
        Ok(id)
    }

    /// Re-check all invariants named in spec §8: acyclicity, exactly one
    /// root, depth bound, branching bound.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let roots: Vec<_> = self.nodes.values().filter(|n| n.parent.is_none()).collect();
        if roots.len() != 1 {
            return Err(InvariantError::MissingRoot);
        }
        for node in self.nodes.values() {
            if node.depth > self.max_depth {
                return Err(InvariantError::DepthExceeded {
                    node: node.node_id.to_string(),
                    depth: node.depth,
                    max: self.max_depth,
                });
            }
            if node.children.len() > self.branching_factor as usize {
                return Err(InvariantError::BranchingExceeded {
                    node: node.node_id.to_string(),
                    count: node.children.len(),
                    max: self.branching_factor as usize,
                });
            }
        }
        // Acyclicity: walking path_to_root from every node must terminate
        // at the root within `|nodes|` hops.
        for id in self.nodes.keys() {
            let mut cur = Some(*id);
            let mut hops = 0;
            while let Some(n) = cur {
                hops += 1;
                if hops > self.nodes.len() + 1 {
                    return Err(InvariantError::TopologyCycle);
                }
                cur = self.nodes.get(&n).and_then(|node| node.parent);
            }
        }
        Ok(())
    }

    pub fn all_node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }
}
