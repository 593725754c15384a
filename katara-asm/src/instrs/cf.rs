//! Control-flow instructions.
//!
//! Jumps and calls to symbolic targets emit four zero bytes and
//! register a patch site with the linker; the displacement is written
//! once every target address is known.

use std::fmt;

use crate::coding::InstrEncoder;
use crate::ops::{BlockRef, FuncRef, OperandSize, RmOperand};
use crate::{Code, EncodingError, Linker};

/// The 16 condition codes of the 0x0F 0x8x jump family, with the
/// integer comparison aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cond {
    /// OF set.
    Overflow = 0x0,
    /// OF clear.
    NoOverflow = 0x1,
    /// CF set; unsigned below.
    Below = 0x2,
    /// CF clear; unsigned above or equal.
    AboveOrEqual = 0x3,
    /// ZF set; equal.
    Equal = 0x4,
    /// ZF clear; not equal.
    NotEqual = 0x5,
    /// CF or ZF set; unsigned below or equal.
    BelowOrEqual = 0x6,
    /// CF and ZF clear; unsigned above.
    Above = 0x7,
    /// SF set.
    Sign = 0x8,
    /// SF clear.
    NoSign = 0x9,
    /// PF set.
    ParityEven = 0xa,
    /// PF clear.
    ParityOdd = 0xb,
    /// Signed less.
    Less = 0xc,
    /// Signed greater or equal.
    GreaterOrEqual = 0xd,
    /// Signed less or equal.
    LessOrEqual = 0xe,
    /// Signed greater.
    Greater = 0xf,
}

impl Cond {
    fn mnemonic(self) -> &'static str {
        match self {
            Cond::Overflow => "jo",
            Cond::NoOverflow => "jno",
            Cond::Below => "jb",
            Cond::AboveOrEqual => "jae",
            Cond::Equal => "je",
            Cond::NotEqual => "jne",
            Cond::BelowOrEqual => "jbe",
            Cond::Above => "ja",
            Cond::Sign => "js",
            Cond::NoSign => "jns",
            Cond::ParityEven => "jpe",
            Cond::ParityOdd => "jpo",
            Cond::Less => "jl",
            Cond::GreaterOrEqual => "jge",
            Cond::LessOrEqual => "jle",
            Cond::Greater => "jg",
        }
    }
}

/// Conditional jump to a block: 6 bytes `0F 8x` plus a patched 32-bit
/// displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jcc {
    cond: Cond,
    dst: BlockRef,
}

impl Jcc {
    /// Jumps to `dst` when `cond` holds.
    pub fn new(cond: Cond, dst: BlockRef) -> Jcc {
        Jcc { cond, dst }
    }

    pub(crate) fn encode(
        &self,
        linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        code.set(0, 0x0f)?;
        code.set(1, 0x80 | self.cond as u8)?;
        for index in 2..6 {
            code.set(index, 0x00)?;
        }
        linker.add_block_ref(self.dst, code.base() + 2);
        Ok(6)
    }
}

impl fmt::Display for Jcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cond.mnemonic(), self.dst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JmpTarget {
    Rm(RmOperand),
    Block(BlockRef),
}

/// Unconditional jump: 0xFF /4 for a 64-bit register/memory target, or
/// 0xE9 with a patched rel32 for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jmp {
    target: JmpTarget,
}

impl Jmp {
    /// `jmp r/m64`.
    pub fn rm(target: impl Into<RmOperand>) -> Result<Jmp, EncodingError> {
        let target = target.into();
        if target.size() != OperandSize::S64 {
            return Err(EncodingError::UnsupportedOperand);
        }
        Ok(Jmp {
            target: JmpTarget::Rm(target),
        })
    }

    /// `jmp` to a block resolved by the linker.
    pub fn block(target: BlockRef) -> Jmp {
        Jmp {
            target: JmpTarget::Block(target),
        }
    }

    pub(crate) fn encode(
        &self,
        linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        match self.target {
            JmpTarget::Rm(rm) => {
                let mut encoder = InstrEncoder::new(code);
                if rm.needs_rex() {
                    encoder.encode_rex()?;
                }
                encoder.encode_opcode(&[0xff])?;
                encoder.encode_opcode_ext(4)?;
                encoder.encode_rm(&rm)?;
                Ok(encoder.size())
            }
            JmpTarget::Block(block_ref) => {
                code.set(0, 0xe9)?;
                for index in 1..5 {
                    code.set(index, 0x00)?;
                }
                linker.add_block_ref(block_ref, code.base() + 1);
                Ok(5)
            }
        }
    }
}

impl fmt::Display for Jmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            JmpTarget::Rm(rm) => write!(f, "jmp {rm}"),
            JmpTarget::Block(block_ref) => write!(f, "jmp {block_ref}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallTarget {
    Rm(RmOperand),
    Func(FuncRef),
}

/// Call: 0xFF /2 for an indirect 64-bit target, or 0xE8 with a patched
/// rel32 for a func.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    target: CallTarget,
}

impl Call {
    /// `call r/m64`.
    pub fn rm(target: impl Into<RmOperand>) -> Result<Call, EncodingError> {
        let target = target.into();
        if target.size() != OperandSize::S64 {
            return Err(EncodingError::UnsupportedOperand);
        }
        Ok(Call {
            target: CallTarget::Rm(target),
        })
    }

    /// `call` to a func resolved by the linker.
    pub fn func(target: FuncRef) -> Call {
        Call {
            target: CallTarget::Func(target),
        }
    }

    pub(crate) fn encode(
        &self,
        linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        match self.target {
            CallTarget::Rm(rm) => {
                let mut encoder = InstrEncoder::new(code);
                if rm.needs_rex() {
                    encoder.encode_rex()?;
                }
                encoder.encode_opcode(&[0xff])?;
                encoder.encode_opcode_ext(2)?;
                encoder.encode_rm(&rm)?;
                Ok(encoder.size())
            }
            CallTarget::Func(func_ref) => {
                code.set(0, 0xe8)?;
                for index in 1..5 {
                    code.set(index, 0x00)?;
                }
                linker.add_func_ref(func_ref, code.base() + 1);
                Ok(5)
            }
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            CallTarget::Rm(rm) => write!(f, "call {rm}"),
            CallTarget::Func(func_ref) => write!(f, "call {func_ref}"),
        }
    }
}

/// `syscall` (0x0F 0x05).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Syscall;

impl Syscall {
    /// The syscall instruction.
    pub fn new() -> Syscall {
        Syscall
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        code.set(0, 0x0f)?;
        code.set(1, 0x05)?;
        Ok(2)
    }
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("syscall")
    }
}

/// `ret` (0xC3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ret;

impl Ret {
    /// The near return.
    pub fn new() -> Ret {
        Ret
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        code.set(0, 0xc3)?;
        Ok(1)
    }
}

impl fmt::Display for Ret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ret")
    }
}
