//! The interference graph over SSA values.
//!
//! An undirected edge means the two values are simultaneously live at
//! some program point inside some block of the func. Nodes can carry a
//! fixed register for ABI-constrained values (arguments, return
//! registers, instruction-forced operands).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use itertools::Itertools;
use katara_ir::Computed;

use crate::FuncLiveRangeInfo;

/// Undirected interference graph with deduplicated adjacency sets and
/// no self-edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterferenceGraph {
    neighbors: BTreeMap<Computed, BTreeSet<Computed>>,
    fixed: BTreeMap<Computed, u8>,
}

impl InterferenceGraph {
    /// Creates an empty graph.
    pub fn new() -> InterferenceGraph {
        InterferenceGraph::default()
    }

    /// Builds the graph from per-block live ranges: within each block,
    /// the entry set, the live set at every instruction index, and the
    /// exit set each form a clique.
    pub fn from_live_ranges(info: &FuncLiveRangeInfo) -> InterferenceGraph {
        let mut graph = InterferenceGraph::new();
        for block in info.blocks() {
            for index in -1..=(block.instr_count() as i64) {
                graph.add_clique(&block.live_set(index));
            }
        }
        graph
    }

    /// Adds a node without edges.
    pub fn add_node(&mut self, value: Computed) {
        self.neighbors.entry(value).or_default();
    }

    /// Adds an undirected edge; self-edges are ignored.
    pub fn add_edge(&mut self, a: Computed, b: Computed) {
        if a == b {
            return;
        }
        self.neighbors.entry(a).or_default().insert(b);
        self.neighbors.entry(b).or_default().insert(a);
    }

    /// Adds all-pairs edges between the values of `set`.
    pub fn add_clique(&mut self, set: &BTreeSet<Computed>) {
        for &value in set {
            self.add_node(value);
        }
        for pair in set.iter().combinations(2) {
            self.add_edge(*pair[0], *pair[1]);
        }
    }

    /// The nodes, ascending by value number.
    pub fn nodes(&self) -> impl Iterator<Item = Computed> + '_ {
        self.neighbors.keys().copied()
    }

    /// The neighbors of `value`.
    pub fn neighbors(&self, value: Computed) -> Option<&BTreeSet<Computed>> {
        self.neighbors.get(&value)
    }

    /// The degree of `value`; zero for unknown nodes.
    pub fn degree(&self, value: Computed) -> usize {
        self.neighbors.get(&value).map_or(0, BTreeSet::len)
    }

    /// Whether `a` and `b` interfere.
    pub fn interferes(&self, a: Computed, b: Computed) -> bool {
        self.neighbors
            .get(&a)
            .is_some_and(|neighbors| neighbors.contains(&b))
    }

    /// Pins `value` to a physical register.
    pub fn set_fixed_register(&mut self, value: Computed, register: u8) {
        self.add_node(value);
        self.fixed.insert(value, register);
    }

    /// The register `value` is pinned to, if any.
    pub fn fixed_register(&self, value: Computed) -> Option<u8> {
        self.fixed.get(&value).copied()
    }
}

impl fmt::Display for InterferenceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (value, neighbors) in &self.neighbors {
            write!(f, "{value}: {}", neighbors.iter().join(", "))?;
            if let Some(register) = self.fixed.get(value) {
                write!(f, " [r{register}]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
