use std::collections::BTreeSet;
use std::fmt;

use crate::{BlockNum, BlockValue, Instr, PhiInstr};

/// A basic block: an ordered instruction list ending in a terminator,
/// plus the control-flow edge sets maintained by the owning [`Func`].
///
/// [`Func`]: crate::Func
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    num: BlockNum,
    instrs: Vec<Instr>,
    pub(crate) parents: BTreeSet<BlockNum>,
    pub(crate) children: BTreeSet<BlockNum>,
}

impl Block {
    pub(crate) fn new(num: BlockNum) -> Block {
        Block {
            num,
            instrs: Vec::new(),
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }

    /// The block's number, unique within its func.
    pub fn num(&self) -> BlockNum {
        self.num
    }

    /// The block value referring to this block.
    pub fn block_value(&self) -> BlockValue {
        BlockValue::new(self.num)
    }

    /// The instructions in order.
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// Appends an instruction.
    pub fn push(&mut self, instr: impl Into<Instr>) {
        self.instrs.push(instr.into());
    }

    /// Inserts an instruction at the given position.
    pub fn insert(&mut self, index: usize, instr: impl Into<Instr>) {
        self.instrs.insert(index, instr.into());
    }

    /// Removes and returns the instruction at the given position.
    pub fn remove(&mut self, index: usize) -> Instr {
        self.instrs.remove(index)
    }

    /// The blocks with an edge into this block.
    pub fn parents(&self) -> &BTreeSet<BlockNum> {
        &self.parents
    }

    /// The blocks this block's terminator can continue at.
    pub fn children(&self) -> &BTreeSet<BlockNum> {
        &self.children
    }

    /// Whether this block merges control flow (two or more predecessors).
    /// Only merge blocks may hold phi instructions.
    pub fn is_merge(&self) -> bool {
        self.parents.len() >= 2
    }

    /// The maximal phi prefix.
    pub fn phi_instrs(&self) -> impl Iterator<Item = &PhiInstr> {
        self.instrs.iter().map_while(|instr| match instr {
            Instr::Phi(phi) => Some(phi),
            _ => None,
        })
    }

    /// The instructions after the phi prefix.
    pub fn non_phi_instrs(&self) -> impl Iterator<Item = &Instr> {
        self.instrs
            .iter()
            .skip_while(|instr| matches!(instr, Instr::Phi(_)))
    }

    /// Whether the phi prefix is non-empty.
    pub fn has_phis(&self) -> bool {
        matches!(self.instrs.first(), Some(Instr::Phi(_)))
    }

    /// The block's terminator, if its last instruction is one.
    pub fn terminator(&self) -> Option<&Instr> {
        self.instrs.last().filter(|instr| instr.is_terminator())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}:", self.num)?;
        for instr in &self.instrs {
            write!(f, "\n\t{instr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Computed, Constant, InheritedValue, JumpInstr, MovInstr, PhiInstr, Type};

    fn phi(result_num: i64) -> PhiInstr {
        let arg = |v: i64, b: i64| {
            InheritedValue::new(Constant::i64(v).into(), BlockValue::new(b)).unwrap()
        };
        PhiInstr::new(Computed::new(Type::I64, result_num), vec![arg(1, 1), arg(2, 2)])
            .unwrap()
    }

    #[test]
    fn phi_prefix_is_maximal() {
        let mut block = Block::new(3);
        block.push(phi(0));
        block.push(phi(1));
        block.push(
            MovInstr::new(Computed::new(Type::I64, 2), Constant::i64(4).into()).unwrap(),
        );
        block.push(JumpInstr::new(BlockValue::new(4)));

        assert!(block.has_phis());
        assert_eq!(block.phi_instrs().count(), 2);
        assert_eq!(block.non_phi_instrs().count(), 2);
        assert!(block.terminator().is_some());
    }

    #[test]
    fn terminator_requires_terminating_tail() {
        let mut block = Block::new(0);
        assert!(block.terminator().is_none());
        block.push(
            MovInstr::new(Computed::new(Type::I64, 0), Constant::i64(1).into()).unwrap(),
        );
        assert!(block.terminator().is_none());
        block.push(JumpInstr::new(BlockValue::new(1)));
        assert!(block.terminator().is_some());
    }

    #[test]
    fn display_form() {
        let mut block = Block::new(7);
        block.push(JumpInstr::new(BlockValue::new(1)));
        assert_eq!(block.to_string(), "{7}:\n\tjmp {1}");
    }
}
