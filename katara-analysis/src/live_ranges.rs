//! Per-block and per-func SSA live ranges.
//!
//! A value's range inside a block is `[start, end]` over instruction
//! indices, with `-1` marking "live on entry" and `instrs.len()` marking
//! "live on exit". The per-func analysis is an iterative backward data
//! flow over the CFG; phi argument uses are charged to the predecessor
//! edge they travel on, not to the merge block itself.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use katara_ir::{BlockNum, Computed, Func, Instr};
use tracing::trace;

/// A value's live range inside one block, in instruction indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange {
    /// First index at which the value is live; `-1` if live on entry.
    pub start: i64,
    /// Last index at which the value is live; `instrs.len()` if live on
    /// exit.
    pub end: i64,
}

/// Live ranges of all values used or defined inside one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLiveRangeInfo {
    block_num: BlockNum,
    instr_count: usize,
    ranges: BTreeMap<Computed, ValueRange>,
}

impl BlockLiveRangeInfo {
    fn new(block_num: BlockNum, instr_count: usize) -> BlockLiveRangeInfo {
        BlockLiveRangeInfo {
            block_num,
            instr_count,
            ranges: BTreeMap::new(),
        }
    }

    /// The block these ranges belong to.
    pub fn block_num(&self) -> BlockNum {
        self.block_num
    }

    /// The number of instructions in the block.
    pub fn instr_count(&self) -> usize {
        self.instr_count
    }

    /// Whether the value is live anywhere in the block.
    pub fn has_value(&self, value: Computed) -> bool {
        self.ranges.contains_key(&value)
    }

    /// Whether the value is defined inside the block.
    pub fn has_definition(&self, value: Computed) -> bool {
        self.ranges.get(&value).is_some_and(|range| range.start >= 0)
    }

    /// The value's range, if it is live in the block.
    pub fn range(&self, value: Computed) -> Option<ValueRange> {
        self.ranges.get(&value).copied()
    }

    /// Records the definition of `value` at instruction `index`.
    pub fn add_definition(&mut self, value: Computed, index: i64) {
        self.ranges
            .entry(value)
            .and_modify(|range| range.start = index)
            .or_insert(ValueRange {
                start: index,
                end: index,
            });
    }

    /// Records a use of `value` at instruction `index`. A use without a
    /// prior definition marks the value live on entry.
    pub fn add_use(&mut self, value: Computed, index: i64) {
        self.ranges
            .entry(value)
            .and_modify(|range| {
                range.start = range.start.min(index);
                range.end = range.end.max(index);
            })
            .or_insert(ValueRange {
                start: -1,
                end: index,
            });
    }

    /// Marks `value` live on exit, extending its range backwards to the
    /// entry if it has no definition here.
    pub fn propagate_backwards_from_exit(&mut self, value: Computed) {
        let exit = self.instr_count as i64;
        self.ranges
            .entry(value)
            .and_modify(|range| range.end = exit)
            .or_insert(ValueRange {
                start: -1,
                end: exit,
            });
    }

    /// The values live on entry.
    pub fn entry_set(&self) -> BTreeSet<Computed> {
        self.ranges
            .iter()
            .filter(|(_, range)| range.start < 0)
            .map(|(&value, _)| value)
            .collect()
    }

    /// The values live on exit.
    pub fn exit_set(&self) -> BTreeSet<Computed> {
        self.ranges
            .iter()
            .filter(|(_, range)| range.end >= self.instr_count as i64)
            .map(|(&value, _)| value)
            .collect()
    }

    /// The values live at instruction `index` (including `-1` for the
    /// entry point and `instrs.len()` for the exit point).
    pub fn live_set(&self, index: i64) -> BTreeSet<Computed> {
        self.ranges
            .iter()
            .filter(|(_, range)| range.start <= index && index <= range.end)
            .map(|(&value, _)| value)
            .collect()
    }
}

impl fmt::Display for BlockLiveRangeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{{}}} - live range info:", self.block_num)?;
        for (value, range) in &self.ranges {
            write!(f, "{}", if range.start < 0 { '<' } else { ' ' })?;
            for i in 0..self.instr_count as i64 {
                if i == range.start || i == range.end {
                    write!(f, "+")?;
                } else if range.start < i && i < range.end {
                    write!(f, "-")?;
                } else {
                    write!(f, " ")?;
                }
            }
            let exits = range.end >= self.instr_count as i64;
            writeln!(f, "{} {}", if exits { '>' } else { ' ' }, value)?;
        }
        Ok(())
    }
}

/// Live ranges of every block of a func.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncLiveRangeInfo {
    blocks: BTreeMap<BlockNum, BlockLiveRangeInfo>,
}

impl FuncLiveRangeInfo {
    /// The per-block info, keyed by block number.
    pub fn block(&self, num: BlockNum) -> Option<&BlockLiveRangeInfo> {
        self.blocks.get(&num)
    }

    /// All per-block infos, ordered by block number.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockLiveRangeInfo> {
        self.blocks.values()
    }
}

impl fmt::Display for FuncLiveRangeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for info in self.blocks.values() {
            write!(f, "{info}")?;
        }
        Ok(())
    }
}

/// Computes [`FuncLiveRangeInfo`] for one func.
pub struct LiveRangeAnalyzer<'a> {
    func: &'a Func,
}

impl<'a> LiveRangeAnalyzer<'a> {
    /// Creates an analyzer over the given func.
    pub fn new(func: &'a Func) -> LiveRangeAnalyzer<'a> {
        LiveRangeAnalyzer { func }
    }

    /// Runs the backward data-flow analysis to fixpoint.
    pub fn analyze(&self) -> FuncLiveRangeInfo {
        let mut blocks = BTreeMap::new();
        for block in self.func.blocks() {
            let mut info = BlockLiveRangeInfo::new(block.num(), block.instrs().len());
            for (index, instr) in block.instrs().iter().enumerate() {
                for defined in instr.defined_values() {
                    info.add_definition(defined, index as i64);
                }
                // Phi argument uses are live on the predecessor edge and
                // handled during successor propagation.
                if matches!(instr, Instr::Phi(_)) {
                    continue;
                }
                for used in instr.used_values() {
                    if let Some(value) = used.computed() {
                        info.add_use(value, index as i64);
                    }
                }
            }
            blocks.insert(block.num(), info);
        }

        let mut iterations = 0usize;
        loop {
            iterations += 1;
            let mut changed = false;
            for block in self.func.blocks() {
                let mut incoming: BTreeSet<Computed> = BTreeSet::new();
                for &child in block.children() {
                    let child_block = self.func.block(child).expect("edge to owned block");
                    if child_block.has_phis() {
                        for phi in child_block.phi_instrs() {
                            if let Some(value) = phi
                                .value_inherited_from(block.num())
                                .and_then(|v| v.computed())
                            {
                                incoming.insert(value);
                            }
                        }
                    }
                    incoming.extend(blocks[&child].entry_set());
                }
                let info = blocks.get_mut(&block.num()).expect("block info exists");
                for value in incoming {
                    let was_exit_live = info
                        .range(value)
                        .is_some_and(|range| range.end >= info.instr_count as i64);
                    if !was_exit_live {
                        info.propagate_backwards_from_exit(value);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        trace!(
            func = self.func.num(),
            iterations,
            "live range analysis reached fixpoint"
        );
        FuncLiveRangeInfo { blocks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::serialization::parse_program;
    use katara_ir::Type;

    fn value(num: i64) -> Computed {
        Computed::new(Type::I64, num)
    }

    #[test]
    fn straight_line_ranges() {
        let program = parse_program(
            "@0 main () => (i64) {\n{0}:\n\t%0:i64 = mov #1:i64\n\t%1:i64 = add:i64 %0, %0\n\tret %1:i64\n}\n",
        )
        .unwrap();
        let info = LiveRangeAnalyzer::new(program.func(0).unwrap()).analyze();
        let block = info.block(0).unwrap();
        assert_eq!(block.range(value(0)), Some(ValueRange { start: 0, end: 1 }));
        assert_eq!(block.range(value(1)), Some(ValueRange { start: 1, end: 2 }));
        assert!(block.entry_set().is_empty());
        assert!(block.exit_set().is_empty());
        assert!(block.has_definition(value(0)));
    }

    #[test]
    fn args_are_live_on_entry() {
        let program = parse_program(
            "@0 id (%0:i64) => (i64) {\n{0}:\n\tret %0:i64\n}\n",
        )
        .unwrap();
        let info = LiveRangeAnalyzer::new(program.func(0).unwrap()).analyze();
        let block = info.block(0).unwrap();
        assert_eq!(block.range(value(0)), Some(ValueRange { start: -1, end: 0 }));
        assert_eq!(block.entry_set(), BTreeSet::from([value(0)]));
    }

    #[test]
    fn loop_with_phi_propagates_along_edges() {
        let text = "@0 main () => (i64) {\n\
                    {0}:\n\t%0:i64 = mov #0:i64\n\tjmp {1}\n\
                    {1}:\n\t%1:i64 = phi %0:i64:{0}, %2:i64:{1}\n\t%2:i64 = add:i64 %1, #1:i64\n\t%3:b = lt:i64 %2, #10\n\tjcc %3, {1}, {2}\n\
                    {2}:\n\tret %2:i64\n}\n";
        let program = parse_program(text).unwrap();
        let info = LiveRangeAnalyzer::new(program.func(0).unwrap()).analyze();

        // %0 travels into the phi along the {0} -> {1} edge only.
        let entry = info.block(0).unwrap();
        assert!(entry.exit_set().contains(&value(0)));

        // Inside the loop, %2 is live on exit (phi-inherited on the back
        // edge and used by {2}); %1 dies at the add.
        let header = info.block(1).unwrap();
        assert!(header.exit_set().contains(&value(2)));
        assert_eq!(header.range(value(1)).unwrap().end, 1);
        // %0 is not live on entry of {1}: it was consumed by the phi.
        assert!(!header.entry_set().contains(&value(0)));

        let exit = info.block(2).unwrap();
        assert_eq!(exit.entry_set(), BTreeSet::from([value(2)]));
    }

    #[test]
    fn liveness_is_sound_for_uses() {
        // Every used value is in the live set at its use site.
        let text = "@0 main () => (i64) {\n\
                    {0}:\n\t%0:i64 = mov #3:i64\n\t%1:b = lt:i64 %0, #10\n\tjcc %1, {1}, {2}\n\
                    {1}:\n\t%2:i64 = add:i64 %0, %0\n\tret %2:i64\n\
                    {2}:\n\tret %0:i64\n}\n";
        let program = parse_program(text).unwrap();
        let func = program.func(0).unwrap();
        let info = LiveRangeAnalyzer::new(func).analyze();
        for block in func.blocks() {
            let block_info = info.block(block.num()).unwrap();
            for (index, instr) in block.instrs().iter().enumerate() {
                if matches!(instr, Instr::Phi(_)) {
                    continue;
                }
                for used in instr.used_values() {
                    if let Some(used_value) = used.computed() {
                        assert!(
                            block_info.live_set(index as i64).contains(&used_value),
                            "{used_value} not live at {{{}}}:{index}",
                            block.num()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn chart_rendering() {
        let program = parse_program(
            "@0 main () => (i64) {\n{0}:\n\t%0:i64 = mov #1:i64\n\t%1:i64 = add:i64 %0, %0\n\tret %1:i64\n}\n",
        )
        .unwrap();
        let info = LiveRangeAnalyzer::new(program.func(0).unwrap()).analyze();
        let chart = info.to_string();
        assert!(chart.contains("{0} - live range info:"));
        assert!(chart.contains("%0"));
    }
}
