//! Machine programs: funcs of globally-numbered blocks, assembled by
//! builders and encoded in a pre-order walk that records addresses with
//! the linker.

mod linker;

use std::fmt;

use itertools::Itertools;

pub use linker::Linker;

use crate::instrs::Instr;
use crate::ops::{BlockRef, FuncRef};
use crate::{Code, EncodingError};

/// A machine block: a block id unique across the whole program and an
/// instruction list.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    block_id: i64,
    instrs: Vec<Instr>,
}

impl Block {
    /// The block's program-wide id.
    pub fn block_id(&self) -> i64 {
        self.block_id
    }

    /// The instructions in order.
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// The symbolic reference to this block.
    pub fn block_ref(&self) -> BlockRef {
        BlockRef::new(self.block_id)
    }

    /// Appends an instruction.
    pub fn push(&mut self, instr: impl Into<Instr>) {
        self.instrs.push(instr.into());
    }

    /// Records the block address, then encodes the instructions into
    /// advancing sub-views. Returns the number of bytes emitted.
    pub fn encode(
        &self,
        linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        linker.add_block_addr(self.block_id, code.base());
        let mut offset = 0;
        for instr in &self.instrs {
            let mut view = code.view(offset)?;
            offset += instr.encode(linker, &mut view)?;
        }
        Ok(offset)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BB{}:", self.block_id)?;
        for instr in &self.instrs {
            write!(f, "\n\t{instr}")?;
        }
        Ok(())
    }
}

/// A machine func: a numbered, named sequence of blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    func_id: i64,
    name: String,
    blocks: Vec<Block>,
}

impl Func {
    /// The func's id.
    pub fn func_id(&self) -> i64 {
        self.func_id
    }

    /// The func's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The blocks in layout order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The symbolic reference to this func.
    pub fn func_ref(&self) -> FuncRef {
        FuncRef::new(self.func_id)
    }

    /// Records the func address, then encodes the blocks back to back.
    pub fn encode(
        &self,
        linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        linker.add_func_addr(self.func_id, code.base());
        let mut offset = 0;
        for block in &self.blocks {
            let mut view = code.view(offset)?;
            offset += block.encode(linker, &mut view)?;
        }
        Ok(offset)
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.name)?;
        for block in &self.blocks {
            write!(f, "\n{block}")?;
        }
        Ok(())
    }
}

/// A machine program: funcs in layout order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prog {
    funcs: Vec<Func>,
}

impl Prog {
    /// The funcs in layout order.
    pub fn funcs(&self) -> &[Func] {
        &self.funcs
    }

    /// The func with the given name.
    pub fn func_with_name(&self, name: &str) -> Option<&Func> {
        self.funcs.iter().find(|func| func.name() == name)
    }

    /// Encodes every func back to back, returning the total size.
    pub fn encode(
        &self,
        linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut offset = 0;
        for func in &self.funcs {
            let mut view = code.view(offset)?;
            offset += func.encode(linker, &mut view)?;
        }
        Ok(offset)
    }
}

impl fmt::Display for Prog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.funcs.iter().join("\n\n"))
    }
}

/// Assembles a [`Prog`], handing out func ids and program-wide block
/// ids monotonically.
#[derive(Debug, Default)]
pub struct ProgBuilder {
    prog: Prog,
    func_count: i64,
    block_count: i64,
}

impl ProgBuilder {
    /// Creates an empty builder.
    pub fn new() -> ProgBuilder {
        ProgBuilder::default()
    }

    /// Starts a new func with the given name.
    pub fn add_func(&mut self, name: impl Into<String>) -> FuncBuilder<'_> {
        let func = Func {
            func_id: self.func_count,
            name: name.into(),
            blocks: Vec::new(),
        };
        self.func_count += 1;
        FuncBuilder {
            builder: self,
            func: Some(func),
        }
    }

    /// Finishes the program.
    pub fn finish(self) -> Prog {
        self.prog
    }
}

/// Assembles one func; [`finish`] appends it to the program.
///
/// [`finish`]: FuncBuilder::finish
#[derive(Debug)]
pub struct FuncBuilder<'a> {
    builder: &'a mut ProgBuilder,
    func: Option<Func>,
}

impl FuncBuilder<'_> {
    /// The id of the func being assembled.
    pub fn func_id(&self) -> i64 {
        self.func().func_id
    }

    /// The symbolic reference to the func being assembled.
    pub fn func_ref(&self) -> FuncRef {
        FuncRef::new(self.func_id())
    }

    /// Appends a block with a fresh program-wide id.
    pub fn add_block(&mut self) -> &mut Block {
        let block = Block {
            block_id: self.builder.block_count,
            instrs: Vec::new(),
        };
        self.builder.block_count += 1;
        let func = self.func.as_mut().expect("func not yet finished");
        func.blocks.push(block);
        func.blocks.last_mut().expect("block pushed above")
    }

    /// Appends the finished func to the program.
    pub fn finish(mut self) {
        let func = self.func.take().expect("func not yet finished");
        self.builder.prog.funcs.push(func);
    }

    fn func(&self) -> &Func {
        self.func.as_ref().expect("func not yet finished")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrs::{Mov, Ret};
    use crate::ops::regs::*;
    use crate::ops::imm32;

    #[test]
    fn builders_assign_global_block_ids() {
        let mut builder = ProgBuilder::new();
        let mut first = builder.add_func("first");
        let a = first.add_block().block_id();
        let b = first.add_block().block_id();
        first.finish();
        let mut second = builder.add_func("second");
        let c = second.add_block().block_id();
        second.finish();
        let prog = builder.finish();

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(prog.funcs().len(), 2);
        assert_eq!(prog.funcs()[0].func_id(), 0);
        assert_eq!(prog.funcs()[1].func_id(), 1);
        assert!(prog.func_with_name("second").is_some());
    }

    #[test]
    fn encode_records_addresses_and_concatenates() {
        let mut builder = ProgBuilder::new();
        let mut func = builder.add_func("main");
        let block = func.add_block();
        block.push(Mov::reg_imm(EAX, imm32(7)).unwrap());
        block.push(Ret::new());
        func.finish();
        let prog = builder.finish();

        let mut bytes = [0u8; 32];
        let mut code = Code::new(&mut bytes, 0x4000);
        let mut linker = Linker::new();
        let size = prog.encode(&mut linker, &mut code).unwrap();
        // b8 07 00 00 00 c3
        assert_eq!(size, 6);
        assert_eq!(bytes[..6], [0xb8, 0x07, 0x00, 0x00, 0x00, 0xc3]);
        assert_eq!(linker.func_addr(0), Some(0x4000));
        assert_eq!(linker.block_addr(0), Some(0x4000));
    }

    #[test]
    fn listing_form() {
        let mut builder = ProgBuilder::new();
        let mut func = builder.add_func("main");
        func.add_block().push(Ret::new());
        func.finish();
        let prog = builder.finish();
        assert_eq!(prog.to_string(), "main:\nBB0:\n\tret");
    }
}
