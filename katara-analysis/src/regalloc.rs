//! Chaitin-style graph-coloring register allocation.
//!
//! The allocator colors the interference graph with a fixed palette of
//! physical registers: simplify nodes of insignificant degree, pick
//! spill candidates by degree over use count when stuck, then select
//! colors off the stack. A potential spill that can not be colored
//! becomes an actual spill and is assigned a stack slot instead of a
//! register. Conservative (Briggs) coalescing merges move-related nodes
//! whose live ranges only touch at the copies between them.
//!
//! Sub-register aliasing is not modeled: the allocator hands out whole
//! registers, and 32-bit writes zero-extend on the target.

use std::collections::{BTreeMap, BTreeSet};

use katara_ir::{Computed, Func, Instr};
use tracing::debug;

use crate::{InterferenceGraph, LiveRangeAnalyzer};

/// The default palette: callee-saved rbx, r12, r13, r14, r15.
pub const CALLEE_SAVED: [u8; 5] = [3, 12, 13, 14, 15];

/// Caller-saved registers, added to the palette by
/// [`RegisterAllocator::with_caller_saved`] when no call is live across
/// the values in question: rax, rcx, rdx, rsi, rdi, r8-r11.
pub const CALLER_SAVED: [u8; 9] = [0, 1, 2, 6, 7, 8, 9, 10, 11];

/// Where a value lives after allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// A physical register, by hardware index.
    Register(u8),
    /// A stack slot, as a negative frame offset.
    StackSlot(i64),
}

/// Register allocation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The palette is empty.
    #[error("register allocation requires at least one register")]
    EmptyPalette,
    /// A non-candidate node ran out of colors. Unreachable as long as
    /// spill candidates are chosen whenever simplification is stuck.
    #[error("no register available for {0} with a palette of {1}")]
    OutOfRegisters(Computed, usize),
}

/// Colors one func's interference graph.
pub struct RegisterAllocator<'a> {
    func: &'a Func,
    graph: &'a InterferenceGraph,
    palette: Vec<u8>,
    coalesce: bool,
}

impl<'a> RegisterAllocator<'a> {
    /// Creates an allocator with the callee-saved default palette.
    pub fn new(func: &'a Func, graph: &'a InterferenceGraph) -> RegisterAllocator<'a> {
        RegisterAllocator {
            func,
            graph,
            palette: CALLEE_SAVED.to_vec(),
            coalesce: true,
        }
    }

    /// Replaces the color palette.
    pub fn with_palette(mut self, palette: Vec<u8>) -> RegisterAllocator<'a> {
        self.palette = palette;
        self
    }

    /// Extends the palette with the caller-saved registers. Sound when
    /// the caller-saved convention is safe for the values being
    /// colored, i.e. no call is live across them.
    pub fn with_caller_saved(mut self) -> RegisterAllocator<'a> {
        self.palette.extend(CALLER_SAVED);
        self
    }

    /// Disables move coalescing.
    pub fn without_coalescing(mut self) -> RegisterAllocator<'a> {
        self.coalesce = false;
        self
    }

    /// Runs build/coalesce/simplify/spill/select and returns the
    /// assignment of every graph node.
    pub fn allocate(&self) -> Result<BTreeMap<Computed, Assignment>, AllocError> {
        if self.palette.is_empty() {
            return Err(AllocError::EmptyPalette);
        }
        let k = self.palette.len();

        // Build: working adjacency over all nodes, plus use counts for
        // the spill metric.
        let mut adjacency: BTreeMap<Computed, BTreeSet<Computed>> = self
            .graph
            .nodes()
            .map(|node| {
                (
                    node,
                    self.graph.neighbors(node).cloned().unwrap_or_default(),
                )
            })
            .collect();
        let uses = self.count_uses();

        // Coalesce: union-find over move-related pairs.
        let mut rep: BTreeMap<Computed, Computed> =
            adjacency.keys().map(|&node| (node, node)).collect();
        let mut members: BTreeMap<Computed, Vec<Computed>> =
            adjacency.keys().map(|&node| (node, vec![node])).collect();
        if self.coalesce {
            self.coalesce_moves(k, &mut adjacency, &mut rep, &mut members);
        }

        let fixed: BTreeSet<Computed> = adjacency
            .keys()
            .copied()
            .filter(|&node| self.graph.fixed_register(node).is_some())
            .collect();

        // Simplify and pick spill candidates.
        let mut remaining: BTreeSet<Computed> = adjacency
            .keys()
            .copied()
            .filter(|node| !fixed.contains(node))
            .collect();
        let mut stack: Vec<(Computed, bool)> = Vec::new();
        let degree_of = |node: Computed,
                        adjacency: &BTreeMap<Computed, BTreeSet<Computed>>,
                        remaining: &BTreeSet<Computed>| {
            adjacency[&node]
                .iter()
                .filter(|n| remaining.contains(n) || fixed.contains(n))
                .count()
        };
        while !remaining.is_empty() {
            let simplifiable = remaining
                .iter()
                .copied()
                .find(|&node| degree_of(node, &adjacency, &remaining) < k);
            let (node, is_candidate) = match simplifiable {
                Some(node) => (node, false),
                None => {
                    // Spill choice: maximize degree / use count.
                    let node = remaining
                        .iter()
                        .copied()
                        .max_by(|&a, &b| {
                            let da = degree_of(a, &adjacency, &remaining) as u64;
                            let db = degree_of(b, &adjacency, &remaining) as u64;
                            let ua = uses_of(&uses, &members, a);
                            let ub = uses_of(&uses, &members, b);
                            (da * ub).cmp(&(db * ua))
                        })
                        .expect("remaining is non-empty");
                    debug!(value = %node, "marking potential spill");
                    (node, true)
                }
            };
            remaining.remove(&node);
            stack.push((node, is_candidate));
        }

        // Select: color off the stack; candidates that fail become
        // actual spills.
        let mut assignments: BTreeMap<Computed, Assignment> = BTreeMap::new();
        for &node in &fixed {
            let register = self
                .graph
                .fixed_register(node)
                .expect("fixed set membership");
            assignments.insert(node, Assignment::Register(register));
        }
        let mut next_slot: i64 = -8;
        for (node, is_candidate) in stack.into_iter().rev() {
            let taken: BTreeSet<u8> = adjacency[&node]
                .iter()
                .filter_map(|neighbor| match assignments.get(neighbor) {
                    Some(Assignment::Register(register)) => Some(*register),
                    _ => None,
                })
                .collect();
            match self.palette.iter().copied().find(|c| !taken.contains(c)) {
                Some(register) => {
                    assignments.insert(node, Assignment::Register(register));
                }
                None if is_candidate => {
                    debug!(value = %node, slot = next_slot, "spilling to stack");
                    assignments.insert(node, Assignment::StackSlot(next_slot));
                    next_slot -= 8;
                }
                None => {
                    return Err(AllocError::OutOfRegisters(node, self.palette.len()));
                }
            }
        }

        // Expand coalesced nodes back to their members.
        let mut result = BTreeMap::new();
        for node in self.graph.nodes() {
            let root = find(&rep, node);
            result.insert(node, assignments[&root]);
        }
        Ok(result)
    }

    fn count_uses(&self) -> BTreeMap<Computed, u64> {
        let mut uses: BTreeMap<Computed, u64> = BTreeMap::new();
        for block in self.func.blocks() {
            for instr in block.instrs() {
                for used in instr.used_values() {
                    if let Some(value) = used.computed() {
                        *uses.entry(value).or_insert(0) += 1;
                    }
                }
            }
        }
        uses
    }

    // Conservative coalescing. A move pair is mergeable when the two
    // live ranges only overlap at copies between the pair, and the
    // merged node keeps fewer than k significant-degree neighbors.
    fn coalesce_moves(
        &self,
        k: usize,
        adjacency: &mut BTreeMap<Computed, BTreeSet<Computed>>,
        rep: &mut BTreeMap<Computed, Computed>,
        members: &mut BTreeMap<Computed, Vec<Computed>>,
    ) {
        let live_info = LiveRangeAnalyzer::new(self.func).analyze();
        let mut copy_sites: BTreeMap<(Computed, Computed), Vec<(i64, i64)>> = BTreeMap::new();
        let mut pairs: Vec<(Computed, Computed)> = Vec::new();
        for block in self.func.blocks() {
            for (index, instr) in block.instrs().iter().enumerate() {
                if let Instr::Mov(mov) = instr {
                    if let Some(src) = mov.origin().computed() {
                        let dst = mov.result();
                        let key = ordered(dst, src);
                        copy_sites
                            .entry(key)
                            .or_default()
                            .push((block.num(), index as i64));
                        pairs.push((dst, src));
                    }
                }
            }
        }

        for (dst, src) in pairs {
            let root_a = find(rep, dst);
            let root_b = find(rep, src);
            if root_a == root_b {
                continue;
            }
            if self.graph.fixed_register(root_a).is_some()
                || self.graph.fixed_register(root_b).is_some()
            {
                continue;
            }
            let conflict = members[&root_a].iter().any(|&ma| {
                members[&root_b].iter().any(|&mb| {
                    ranges_conflict(&live_info, &copy_sites, ma, mb)
                })
            });
            if conflict {
                continue;
            }
            // Briggs: the union must keep fewer than k significant
            // neighbors.
            let union: BTreeSet<Computed> = adjacency[&root_a]
                .union(&adjacency[&root_b])
                .copied()
                .filter(|n| *n != root_a && *n != root_b)
                .collect();
            let significant = union
                .iter()
                .filter(|n| adjacency[*n].len() >= k)
                .count();
            if significant >= k {
                continue;
            }
            debug!(a = %root_a, b = %root_b, "coalescing move-related values");
            for &neighbor in &union {
                adjacency.get_mut(&neighbor).expect("known node").remove(&root_b);
                adjacency.get_mut(&neighbor).expect("known node").insert(root_a);
            }
            adjacency.insert(root_a, union);
            adjacency.remove(&root_b);
            rep.insert(root_b, root_a);
            let merged = members.remove(&root_b).expect("root has members");
            members.get_mut(&root_a).expect("root has members").extend(merged);
        }
    }
}

fn ordered(a: Computed, b: Computed) -> (Computed, Computed) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn find(rep: &BTreeMap<Computed, Computed>, mut node: Computed) -> Computed {
    while rep[&node] != node {
        node = rep[&node];
    }
    node
}

fn uses_of(
    uses: &BTreeMap<Computed, u64>,
    members: &BTreeMap<Computed, Vec<Computed>>,
    root: Computed,
) -> u64 {
    members
        .get(&root)
        .into_iter()
        .flatten()
        .map(|member| uses.get(member).copied().unwrap_or(0))
        .sum::<u64>()
        .max(1)
}

// Whether the live ranges of `a` and `b` overlap anywhere other than at
// copies between `a` and `b` themselves.
fn ranges_conflict(
    live_info: &crate::FuncLiveRangeInfo,
    copy_sites: &BTreeMap<(Computed, Computed), Vec<(i64, i64)>>,
    a: Computed,
    b: Computed,
) -> bool {
    let allowed = copy_sites.get(&ordered(a, b));
    for block in live_info.blocks() {
        let (Some(range_a), Some(range_b)) = (block.range(a), block.range(b)) else {
            continue;
        };
        let start = range_a.start.max(range_b.start);
        let end = range_a.end.min(range_b.end);
        for index in start..=end {
            let is_copy = allowed
                .is_some_and(|sites| sites.contains(&(block.block_num(), index)));
            if !is_copy {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::serialization::parse_program;
    use katara_ir::{Program, Type};

    fn value(num: i64) -> Computed {
        Computed::new(Type::I64, num)
    }

    fn allocate(program: &Program, palette: Vec<u8>) -> BTreeMap<Computed, Assignment> {
        let func = program.func(0).unwrap();
        let info = LiveRangeAnalyzer::new(func).analyze();
        let graph = InterferenceGraph::from_live_ranges(&info);
        RegisterAllocator::new(func, &graph)
            .with_palette(palette)
            .allocate()
            .unwrap()
    }

    #[test]
    fn interfering_values_get_distinct_registers() {
        let program = parse_program(
            "@0 main () => (i64) {\n{0}:\n\t%0:i64 = mov #1:i64\n\t%1:i64 = mov #2:i64\n\t%2:i64 = add:i64 %0, %1\n\tret %2:i64\n}\n",
        )
        .unwrap();
        let assignments = allocate(&program, CALLEE_SAVED.to_vec());
        let Assignment::Register(r0) = assignments[&value(0)] else {
            panic!("%0 spilled")
        };
        let Assignment::Register(r1) = assignments[&value(1)] else {
            panic!("%1 spilled")
        };
        assert_ne!(r0, r1);
    }

    #[test]
    fn coloring_respects_every_edge() {
        let text = "@0 main () => (i64) {\n\
                    {0}:\n\t%0:i64 = mov #0:i64\n\tjmp {1}\n\
                    {1}:\n\t%1:i64 = phi %0:i64:{0}, %2:i64:{1}\n\t%2:i64 = add:i64 %1, #1:i64\n\t%3:b = lt:i64 %2, #10\n\tjcc %3, {1}, {2}\n\
                    {2}:\n\tret %2:i64\n}\n";
        let program = parse_program(text).unwrap();
        let func = program.func(0).unwrap();
        let info = LiveRangeAnalyzer::new(func).analyze();
        let graph = InterferenceGraph::from_live_ranges(&info);
        let assignments = RegisterAllocator::new(func, &graph).allocate().unwrap();
        for a in graph.nodes() {
            for &b in graph.neighbors(a).unwrap() {
                if let (Assignment::Register(ra), Assignment::Register(rb)) =
                    (assignments[&a], assignments[&b])
                {
                    assert_ne!(ra, rb, "{a} and {b} share a register");
                }
            }
        }
    }

    #[test]
    fn small_palettes_spill_instead_of_failing() {
        let program = parse_program(
            "@0 main () => (i64) {\n{0}:\n\t%0:i64 = mov #1:i64\n\t%1:i64 = mov #2:i64\n\t%2:i64 = mov #3:i64\n\t%3:i64 = add:i64 %0, %1\n\t%4:i64 = add:i64 %3, %2\n\tret %4:i64\n}\n",
        )
        .unwrap();
        let assignments = allocate(&program, vec![3]);
        let spills = assignments
            .values()
            .filter(|a| matches!(a, Assignment::StackSlot(_)))
            .count();
        assert!(spills > 0);
        // Distinct slots per spilled value.
        let slots: BTreeSet<i64> = assignments
            .values()
            .filter_map(|a| match a {
                Assignment::StackSlot(slot) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(slots.len(), spills);
    }

    #[test]
    fn caller_saved_extension_avoids_spills() {
        // Six values live at once: one more than the callee-saved
        // palette holds, so the default allocation spills. Extending
        // with the caller-saved registers colors everything.
        let program = parse_program(
            "@0 main () => (i64) {\n{0}:\n\
             \t%0:i64 = mov #1:i64\n\t%1:i64 = mov #2:i64\n\t%2:i64 = mov #3:i64\n\
             \t%3:i64 = mov #4:i64\n\t%4:i64 = mov #5:i64\n\t%5:i64 = mov #6:i64\n\
             \t%6:i64 = add:i64 %0, %1\n\t%7:i64 = add:i64 %6, %2\n\
             \t%8:i64 = add:i64 %7, %3\n\t%9:i64 = add:i64 %8, %4\n\
             \t%10:i64 = add:i64 %9, %5\n\tret %10:i64\n}\n",
        )
        .unwrap();
        let func = program.func(0).unwrap();
        let info = LiveRangeAnalyzer::new(func).analyze();
        let graph = InterferenceGraph::from_live_ranges(&info);

        let spill_count = |assignments: &BTreeMap<Computed, Assignment>| {
            assignments
                .values()
                .filter(|a| matches!(a, Assignment::StackSlot(_)))
                .count()
        };

        let callee_only = RegisterAllocator::new(func, &graph).allocate().unwrap();
        assert!(spill_count(&callee_only) > 0);

        let extended = RegisterAllocator::new(func, &graph)
            .with_caller_saved()
            .allocate()
            .unwrap();
        assert_eq!(spill_count(&extended), 0);
        for a in graph.nodes() {
            for &b in graph.neighbors(a).unwrap() {
                if let (Assignment::Register(ra), Assignment::Register(rb)) =
                    (extended[&a], extended[&b])
                {
                    assert_ne!(ra, rb, "{a} and {b} share r{ra}");
                }
            }
        }
    }

    #[test]
    fn empty_palette_is_an_error() {
        let program = parse_program(
            "@0 main () => (i64) {\n{0}:\n\t%0:i64 = mov #1:i64\n\tret %0:i64\n}\n",
        )
        .unwrap();
        let func = program.func(0).unwrap();
        let info = LiveRangeAnalyzer::new(func).analyze();
        let graph = InterferenceGraph::from_live_ranges(&info);
        assert_eq!(
            RegisterAllocator::new(func, &graph)
                .with_palette(vec![])
                .allocate(),
            Err(AllocError::EmptyPalette)
        );
    }

    #[test]
    fn copies_coalesce_into_one_register() {
        // %1 only exists as a copy of %0; they overlap at the copy
        // alone and share a register after coalescing.
        let program = parse_program(
            "@0 main () => (i64) {\n{0}:\n\t%0:i64 = mov #1:i64\n\t%1:i64 = mov %0:i64\n\tret %1:i64\n}\n",
        )
        .unwrap();
        let assignments = allocate(&program, CALLEE_SAVED.to_vec());
        assert_eq!(assignments[&value(0)], assignments[&value(1)]);
    }

    #[test]
    fn fixed_registers_are_honored() {
        let program = parse_program(
            "@0 main () => (i64) {\n{0}:\n\t%0:i64 = mov #1:i64\n\t%1:i64 = add:i64 %0, %0\n\tret %1:i64\n}\n",
        )
        .unwrap();
        let func = program.func(0).unwrap();
        let info = LiveRangeAnalyzer::new(func).analyze();
        let mut graph = InterferenceGraph::from_live_ranges(&info);
        graph.set_fixed_register(value(0), 12);
        let assignments = RegisterAllocator::new(func, &graph).allocate().unwrap();
        assert_eq!(assignments[&value(0)], Assignment::Register(12));
        // %1 interferes with %0 at the add and avoids r12.
        assert_ne!(assignments[&value(1)], Assignment::Register(12));
    }
}
