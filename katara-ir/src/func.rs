use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use itertools::Itertools;

use crate::dom::{self, DomTree};
use crate::{
    Block, BlockNum, Computed, DomError, FuncNum, Instr, StructuralError, Type, Value,
};

/// An IR func: numbered blocks with control-flow edges, an argument
/// list, result types, a designated entry block, and a cached dominator
/// tree.
///
/// Blocks live in a flat map keyed by block number; edges are number
/// sets on both endpoints. Any mutation of blocks or edges invalidates
/// the dominator cache.
#[derive(Debug, Clone)]
pub struct Func {
    num: FuncNum,
    name: String,
    args: Vec<Computed>,
    result_types: Vec<Type>,
    blocks: BTreeMap<BlockNum, Block>,
    block_count: i64,
    entry: Option<BlockNum>,
    dom_cache: Option<DomTree>,
}

impl Func {
    /// Creates an empty func with the given number.
    pub fn new(num: FuncNum) -> Func {
        Func {
            num,
            name: String::new(),
            args: Vec::new(),
            result_types: Vec::new(),
            blocks: BTreeMap::new(),
            block_count: 0,
            entry: None,
            dom_cache: None,
        }
    }

    /// The func's number, unique within its program.
    pub fn num(&self) -> FuncNum {
        self.num
    }

    /// The func's name; may be empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the func.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The header used in listings: `@N` or `@N name`.
    pub fn reference_string(&self) -> String {
        if self.name.is_empty() {
            format!("@{}", self.num)
        } else {
            format!("@{} {}", self.num, self.name)
        }
    }

    /// The func constant referring to this func.
    pub fn func_value(&self) -> Value {
        crate::Constant::func(self.num).into()
    }

    /// The func's arguments.
    pub fn args(&self) -> &[Computed] {
        &self.args
    }

    /// Mutable access to the argument list.
    pub fn args_mut(&mut self) -> &mut Vec<Computed> {
        &mut self.args
    }

    /// The func's result types.
    pub fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    /// Mutable access to the result-type list.
    pub fn result_types_mut(&mut self) -> &mut Vec<Type> {
        &mut self.result_types
    }

    /// The entry block number, if set.
    pub fn entry(&self) -> Option<BlockNum> {
        self.entry
    }

    /// Sets or clears the entry block.
    pub fn set_entry(&mut self, entry: Option<BlockNum>) -> Result<(), StructuralError> {
        if let Some(num) = entry {
            if !self.blocks.contains_key(&num) {
                return Err(StructuralError::UnknownBlock(num));
            }
        }
        self.entry = entry;
        self.dom_cache = None;
        Ok(())
    }

    /// The blocks, ordered by number.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// The block numbers, ascending.
    pub fn block_nums(&self) -> impl Iterator<Item = BlockNum> + '_ {
        self.blocks.keys().copied()
    }

    /// Whether the func owns a block with the given number.
    pub fn has_block(&self, num: BlockNum) -> bool {
        self.blocks.contains_key(&num)
    }

    /// The block with the given number.
    pub fn block(&self, num: BlockNum) -> Option<&Block> {
        self.blocks.get(&num)
    }

    /// Mutable access to the block with the given number. Invalidates
    /// the dominator cache, since the caller may change the terminator.
    pub fn block_mut(&mut self, num: BlockNum) -> Option<&mut Block> {
        self.dom_cache = None;
        self.blocks.get_mut(&num)
    }

    /// Adds a block with a fresh number and returns the number.
    pub fn add_block(&mut self) -> BlockNum {
        let num = self.block_count;
        self.block_count += 1;
        self.blocks.insert(num, Block::new(num));
        self.dom_cache = None;
        num
    }

    /// Adds a block with an explicit number; the number must be unused.
    pub fn add_block_with_num(&mut self, num: BlockNum) -> Result<(), StructuralError> {
        if self.blocks.contains_key(&num) {
            return Err(StructuralError::BlockNumInUse(num));
        }
        self.block_count = self.block_count.max(num + 1);
        self.blocks.insert(num, Block::new(num));
        self.dom_cache = None;
        Ok(())
    }

    /// Removes a block, unlinking its control-flow edges. Clears the
    /// entry if it pointed at the block.
    pub fn remove_block(&mut self, num: BlockNum) -> Result<(), StructuralError> {
        let block = self
            .blocks
            .remove(&num)
            .ok_or(StructuralError::UnknownBlock(num))?;
        for parent in &block.parents {
            if let Some(parent_block) = self.blocks.get_mut(parent) {
                parent_block.children.remove(&num);
            }
        }
        for child in &block.children {
            if let Some(child_block) = self.blocks.get_mut(child) {
                child_block.parents.remove(&num);
            }
        }
        if self.entry == Some(num) {
            self.entry = None;
        }
        self.dom_cache = None;
        Ok(())
    }

    /// Adds the control-flow edge `parent -> child`.
    pub fn add_control_flow(
        &mut self,
        parent: BlockNum,
        child: BlockNum,
    ) -> Result<(), StructuralError> {
        if !self.blocks.contains_key(&parent) {
            return Err(StructuralError::UnknownBlock(parent));
        }
        if !self.blocks.contains_key(&child) {
            return Err(StructuralError::UnknownBlock(child));
        }
        self.blocks
            .get_mut(&parent)
            .expect("parent checked")
            .children
            .insert(child);
        self.blocks
            .get_mut(&child)
            .expect("child checked")
            .parents
            .insert(parent);
        self.dom_cache = None;
        Ok(())
    }

    /// Removes the control-flow edge `parent -> child`.
    pub fn remove_control_flow(
        &mut self,
        parent: BlockNum,
        child: BlockNum,
    ) -> Result<(), StructuralError> {
        if !self.blocks.contains_key(&parent) {
            return Err(StructuralError::UnknownBlock(parent));
        }
        if !self.blocks.contains_key(&child) {
            return Err(StructuralError::UnknownBlock(child));
        }
        self.blocks
            .get_mut(&parent)
            .expect("parent checked")
            .children
            .remove(&child);
        self.blocks
            .get_mut(&child)
            .expect("child checked")
            .parents
            .remove(&parent);
        self.dom_cache = None;
        Ok(())
    }

    /// The dominator tree, computed on first use and cached until the
    /// next mutation.
    pub fn dominator_tree(&mut self) -> Result<&DomTree, DomError> {
        if self.dom_cache.is_none() {
            self.dom_cache = Some(dom::compute(self)?);
        }
        Ok(self.dom_cache.as_ref().expect("cache filled above"))
    }

    /// Computes the dominator tree without touching the cache.
    pub fn compute_dominator_tree(&self) -> Result<DomTree, DomError> {
        dom::compute(self)
    }

    /// Checks the structural SSA invariants: entry with no predecessors,
    /// a single terminator at the end of every block, edge sets matching
    /// the terminators, a unique definition per computed value, phis
    /// restricted to the prefix of merge blocks with one argument per
    /// predecessor, and uses dominated by their definitions.
    pub fn validate(&self) -> Result<(), StructuralError> {
        let entry = self.entry.ok_or(StructuralError::NoEntryBlock(self.num))?;
        let entry_block = self
            .blocks
            .get(&entry)
            .ok_or(StructuralError::UnknownBlock(entry))?;
        if !entry_block.parents.is_empty() {
            return Err(StructuralError::EntryHasParents(entry));
        }

        let def_sites = self.check_single_definitions()?;
        for block in self.blocks.values() {
            self.check_terminator(block)?;
            self.check_phis(block)?;
        }
        self.check_dominance(&def_sites)?;
        Ok(())
    }

    // Every computed value is defined exactly once; returns the defining
    // (block, index) per value, with args mapped to the entry block.
    fn check_single_definitions(
        &self,
    ) -> Result<BTreeMap<Computed, (BlockNum, i64)>, StructuralError> {
        let mut def_sites = BTreeMap::new();
        let entry = self.entry.expect("validated by caller");
        for &arg in &self.args {
            if def_sites.insert(arg, (entry, -1)).is_some() {
                return Err(StructuralError::MultipleDefinitions(arg.num()));
            }
        }
        for block in self.blocks.values() {
            for (index, instr) in block.instrs().iter().enumerate() {
                for value in instr.defined_values() {
                    if def_sites
                        .insert(value, (block.num(), index as i64))
                        .is_some()
                    {
                        return Err(StructuralError::MultipleDefinitions(value.num()));
                    }
                }
            }
        }
        Ok(def_sites)
    }

    fn check_terminator(&self, block: &Block) -> Result<(), StructuralError> {
        let Some(terminator) = block.terminator() else {
            return Err(StructuralError::MissingTerminator(block.num()));
        };
        for instr in &block.instrs()[..block.instrs().len() - 1] {
            if instr.is_terminator() {
                return Err(StructuralError::InstrAfterTerminator(block.num()));
            }
        }
        let successors: BTreeSet<BlockNum> = terminator.successors().into_iter().collect();
        for &target in &successors {
            if !self.blocks.contains_key(&target) {
                return Err(StructuralError::UnknownJumpTarget {
                    block: block.num(),
                    target,
                });
            }
        }
        if successors != *block.children() {
            return Err(StructuralError::UnknownJumpTarget {
                block: block.num(),
                target: block.num(),
            });
        }
        Ok(())
    }

    fn check_phis(&self, block: &Block) -> Result<(), StructuralError> {
        let phi_count = block.phi_instrs().count();
        for instr in block.instrs().iter().skip(phi_count) {
            if matches!(instr, Instr::Phi(_)) {
                return Err(StructuralError::MisplacedPhi(block.num()));
            }
        }
        if phi_count == 0 {
            return Ok(());
        }
        if !block.is_merge() {
            return Err(StructuralError::MisplacedPhi(block.num()));
        }
        for phi in block.phi_instrs() {
            let origins: BTreeSet<BlockNum> = phi
                .args()
                .iter()
                .map(|arg| arg.origin().block())
                .collect();
            if origins.len() != phi.args().len() || origins != *block.parents() {
                return Err(StructuralError::PhiArgsMismatchPreds {
                    block: block.num(),
                });
            }
        }
        Ok(())
    }

    // Non-phi uses must be dominated by their definitions; a phi arg
    // (v, p) requires v's definition to dominate p.
    fn check_dominance(
        &self,
        def_sites: &BTreeMap<Computed, (BlockNum, i64)>,
    ) -> Result<(), StructuralError> {
        let tree = self
            .compute_dominator_tree()
            .map_err(|_| StructuralError::NoEntryBlock(self.num))?;
        let dominated = |def: (BlockNum, i64), use_block: BlockNum, use_index: i64| {
            if def.0 == use_block {
                def.1 < use_index
            } else {
                tree.dominates(def.0, use_block)
            }
        };
        for block in self.blocks.values() {
            for (index, instr) in block.instrs().iter().enumerate() {
                if let Instr::Phi(phi) = instr {
                    for arg in phi.args() {
                        let Some(value) = arg.value().computed() else {
                            continue;
                        };
                        let &def = def_sites
                            .get(&value)
                            .ok_or(StructuralError::UseNotDominated {
                                value,
                                block: block.num(),
                            })?;
                        let origin = arg.origin().block();
                        if !tree.dominates(def.0, origin) {
                            return Err(StructuralError::UseNotDominated {
                                value,
                                block: block.num(),
                            });
                        }
                    }
                    continue;
                }
                for used in instr.used_values() {
                    let Some(value) = used.computed() else {
                        continue;
                    };
                    let defined = def_sites
                        .get(&value)
                        .copied()
                        .ok_or(StructuralError::UseNotDominated {
                            value,
                            block: block.num(),
                        })?;
                    if !dominated(defined, block.num(), index as i64) {
                        return Err(StructuralError::UseNotDominated {
                            value,
                            block: block.num(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

// The dominator cache is derived state and does not participate in
// structural equality.
impl PartialEq for Func {
    fn eq(&self, other: &Self) -> bool {
        self.num == other.num
            && self.name == other.name
            && self.args == other.args
            && self.result_types == other.result_types
            && self.blocks == other.blocks
            && self.entry == other.entry
    }
}

impl Eq for Func {}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) => ({}) {{",
            self.reference_string(),
            self.args.iter().map(|a| a.to_string_with_type()).join(", "),
            self.result_types.iter().join(", ")
        )?;
        for block in self.blocks.values() {
            write!(f, "\n{block}")?;
        }
        write!(f, "\n}}")
    }
}
