//! Data movement and stack instructions.

use std::fmt;

use crate::coding::InstrEncoder;
use crate::ops::{Imm, Mem, OperandSize, Reg, RmOperand};
use crate::{Code, EncodingError, Linker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MovEncoding {
    RmReg,
    RegRm,
    RegImm,
    RmImm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MovSrc {
    Reg(Reg),
    Mem(Mem),
    Imm(Imm),
}

/// Data move in its four encodings: 0x88/0x89 (r/m <- reg), 0x8A/0x8B
/// (reg <- mem), 0xB0/0xB8+r (reg <- imm, the only imm64 form) and
/// 0xC6/0xC7 /0 (r/m <- imm, including `mov r64, imm32`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mov {
    encoding: MovEncoding,
    dst: RmOperand,
    src: MovSrc,
}

impl Mov {
    /// `mov reg, reg` with matching sizes.
    pub fn reg_reg(dst: Reg, src: Reg) -> Result<Mov, EncodingError> {
        if dst.size() != src.size() {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Mov {
            encoding: MovEncoding::RmReg,
            dst: RmOperand::Reg(dst),
            src: MovSrc::Reg(src),
        })
    }

    /// `mov mem, reg` with matching sizes.
    pub fn mem_reg(dst: Mem, src: Reg) -> Result<Mov, EncodingError> {
        if dst.size() != src.size() {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Mov {
            encoding: MovEncoding::RmReg,
            dst: RmOperand::Mem(dst),
            src: MovSrc::Reg(src),
        })
    }

    /// `mov reg, mem` with matching sizes.
    pub fn reg_mem(dst: Reg, src: Mem) -> Result<Mov, EncodingError> {
        if dst.size() != src.size() {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Mov {
            encoding: MovEncoding::RegRm,
            dst: RmOperand::Reg(dst),
            src: MovSrc::Mem(src),
        })
    }

    /// `mov reg, imm`. A matching width selects the opcode-register
    /// form (which is how imm64 reaches a 64-bit register); imm32 into
    /// a 64-bit register selects the sign-extending 0xC7 form.
    pub fn reg_imm(dst: Reg, src: Imm) -> Result<Mov, EncodingError> {
        let encoding = if dst.size() == src.size() {
            MovEncoding::RegImm
        } else if dst.size() == OperandSize::S64 && src.size() == OperandSize::S32 {
            MovEncoding::RmImm
        } else {
            return Err(EncodingError::UnsupportedSizeCombination);
        };
        Ok(Mov {
            encoding,
            dst: RmOperand::Reg(dst),
            src: MovSrc::Imm(src),
        })
    }

    /// `mov mem, imm`. 64-bit immediates never reach memory.
    pub fn mem_imm(dst: Mem, src: Imm) -> Result<Mov, EncodingError> {
        if src.size() == OperandSize::S64 {
            return Err(EncodingError::UnsupportedImmSize);
        }
        let matches = dst.size() == src.size()
            || (dst.size() == OperandSize::S64 && src.size() == OperandSize::S32);
        if !matches {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Mov {
            encoding: MovEncoding::RmImm,
            dst: RmOperand::Mem(dst),
            src: MovSrc::Imm(src),
        })
    }

    fn src_needs_rex(&self) -> bool {
        match self.src {
            MovSrc::Reg(reg) => reg.needs_rex(),
            MovSrc::Mem(mem) => mem.needs_rex(),
            MovSrc::Imm(_) => false,
        }
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        encoder.encode_operand_size(self.dst.size())?;
        if self.dst.needs_rex() || self.src_needs_rex() {
            encoder.encode_rex()?;
        }
        let byte_sized = self.dst.size() == OperandSize::S8;
        match self.encoding {
            MovEncoding::RmReg => {
                encoder.encode_opcode(&[if byte_sized { 0x88 } else { 0x89 }])?;
                encoder.encode_rm(&self.dst)?;
            }
            MovEncoding::RegRm => {
                encoder.encode_opcode(&[if byte_sized { 0x8a } else { 0x8b }])?;
                let reg = self.dst.reg().expect("reg_rm stores a register");
                encoder.encode_modrm_reg(reg)?;
            }
            MovEncoding::RegImm => {
                encoder.encode_opcode(&[if byte_sized { 0xb0 } else { 0xb8 }])?;
                let reg = self.dst.reg().expect("reg_imm stores a register");
                encoder.encode_opcode_reg(reg)?;
            }
            MovEncoding::RmImm => {
                encoder.encode_opcode(&[if byte_sized { 0xc6 } else { 0xc7 }])?;
                encoder.encode_opcode_ext(0)?;
                encoder.encode_rm(&self.dst)?;
            }
        }
        match self.src {
            MovSrc::Reg(reg) => encoder.encode_modrm_reg(reg)?,
            MovSrc::Mem(mem) => encoder.encode_rm(&mem.into())?,
            MovSrc::Imm(imm) => encoder.encode_imm(&imm)?,
        }
        Ok(encoder.size())
    }
}

impl fmt::Display for Mov {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mov {},", self.dst)?;
        match self.src {
            MovSrc::Reg(reg) => write!(f, "{reg}"),
            MovSrc::Mem(mem) => write!(f, "{mem}"),
            MovSrc::Imm(imm) => write!(f, "{imm}"),
        }
    }
}

/// Exchange: 0x86/0x87, with the 0x90+r shortcut against the A
/// register for non-byte sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xchg {
    op_a: RmOperand,
    op_b: Reg,
}

impl Xchg {
    /// Swaps `op_a` and `op_b`, sizes matching.
    pub fn new(op_a: impl Into<RmOperand>, op_b: Reg) -> Result<Xchg, EncodingError> {
        let op_a = op_a.into();
        if op_a.size() != op_b.size() {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Xchg { op_a, op_b })
    }

    fn reg_a_partner(&self) -> Option<Reg> {
        if self.op_a.size() == OperandSize::S8 {
            return None;
        }
        if self.op_b.is_reg_a() {
            return self.op_a.reg();
        }
        if self.op_a.reg().is_some_and(|reg| reg.is_reg_a()) {
            return Some(self.op_b);
        }
        None
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        encoder.encode_operand_size(self.op_a.size())?;
        if self.op_a.needs_rex() || self.op_b.needs_rex() {
            encoder.encode_rex()?;
        }
        if let Some(partner) = self.reg_a_partner() {
            encoder.encode_opcode(&[0x90])?;
            encoder.encode_opcode_reg(partner)?;
        } else {
            let byte_sized = self.op_a.size() == OperandSize::S8;
            encoder.encode_opcode(&[if byte_sized { 0x86 } else { 0x87 }])?;
            encoder.encode_rm(&self.op_a)?;
            encoder.encode_modrm_reg(self.op_b)?;
        }
        Ok(encoder.size())
    }
}

impl fmt::Display for Xchg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xchg {},{}", self.op_a, self.op_b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushOperand {
    Reg(Reg),
    Mem(Mem),
    Imm(Imm),
}

/// Stack push: 0x50+r, 0xFF /6 or 0x6A/0x68 for immediates. 64-bit
/// operands are the long-mode default and take no operand-size prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Push {
    op: PushOperand,
}

impl Push {
    /// `push reg`; 16- or 64-bit.
    pub fn reg(reg: Reg) -> Result<Push, EncodingError> {
        if !matches!(reg.size(), OperandSize::S16 | OperandSize::S64) {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Push {
            op: PushOperand::Reg(reg),
        })
    }

    /// `push mem`; 16- or 64-bit.
    pub fn mem(mem: Mem) -> Result<Push, EncodingError> {
        if !matches!(mem.size(), OperandSize::S16 | OperandSize::S64) {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Push {
            op: PushOperand::Mem(mem),
        })
    }

    /// `push imm`; 8-, 16- or 32-bit.
    pub fn imm(imm: Imm) -> Result<Push, EncodingError> {
        if imm.size() == OperandSize::S64 {
            return Err(EncodingError::UnsupportedImmSize);
        }
        Ok(Push {
            op: PushOperand::Imm(imm),
        })
    }

    fn op_size(&self) -> OperandSize {
        match self.op {
            PushOperand::Reg(reg) => reg.size(),
            PushOperand::Mem(mem) => mem.size(),
            PushOperand::Imm(imm) => imm.size(),
        }
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        if self.op_size() != OperandSize::S64 {
            encoder.encode_operand_size(self.op_size())?;
        }
        let needs_rex = match self.op {
            PushOperand::Reg(reg) => reg.index() >= 8,
            PushOperand::Mem(mem) => mem.needs_rex(),
            PushOperand::Imm(_) => false,
        };
        if needs_rex {
            encoder.encode_rex()?;
        }
        match self.op {
            PushOperand::Reg(reg) => {
                encoder.encode_opcode(&[0x50])?;
                encoder.encode_opcode_reg(reg)?;
            }
            PushOperand::Mem(mem) => {
                encoder.encode_opcode(&[0xff])?;
                encoder.encode_opcode_ext(6)?;
                encoder.encode_rm(&mem.into())?;
            }
            PushOperand::Imm(imm) => {
                let byte_sized = imm.size() == OperandSize::S8;
                encoder.encode_opcode(&[if byte_sized { 0x6a } else { 0x68 }])?;
                encoder.encode_imm(&imm)?;
            }
        }
        Ok(encoder.size())
    }
}

impl fmt::Display for Push {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            PushOperand::Reg(reg) => write!(f, "push {reg}"),
            PushOperand::Mem(mem) => write!(f, "push {mem}"),
            PushOperand::Imm(imm) => write!(f, "push {imm}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PopOperand {
    Reg(Reg),
    Mem(Mem),
}

/// Stack pop: 0x58+r or 0x8F /0; 16- or 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pop {
    op: PopOperand,
}

impl Pop {
    /// `pop reg`.
    pub fn reg(reg: Reg) -> Result<Pop, EncodingError> {
        if !matches!(reg.size(), OperandSize::S16 | OperandSize::S64) {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Pop {
            op: PopOperand::Reg(reg),
        })
    }

    /// `pop mem`.
    pub fn mem(mem: Mem) -> Result<Pop, EncodingError> {
        if !matches!(mem.size(), OperandSize::S16 | OperandSize::S64) {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Pop {
            op: PopOperand::Mem(mem),
        })
    }

    fn op_size(&self) -> OperandSize {
        match self.op {
            PopOperand::Reg(reg) => reg.size(),
            PopOperand::Mem(mem) => mem.size(),
        }
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        if self.op_size() != OperandSize::S64 {
            encoder.encode_operand_size(self.op_size())?;
        }
        let needs_rex = match self.op {
            PopOperand::Reg(reg) => reg.index() >= 8,
            PopOperand::Mem(mem) => mem.needs_rex(),
        };
        if needs_rex {
            encoder.encode_rex()?;
        }
        match self.op {
            PopOperand::Reg(reg) => {
                encoder.encode_opcode(&[0x58])?;
                encoder.encode_opcode_reg(reg)?;
            }
            PopOperand::Mem(mem) => {
                encoder.encode_opcode(&[0x8f])?;
                encoder.encode_opcode_ext(0)?;
                encoder.encode_rm(&mem.into())?;
            }
        }
        Ok(encoder.size())
    }
}

impl fmt::Display for Pop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            PopOperand::Reg(reg) => write!(f, "pop {reg}"),
            PopOperand::Mem(mem) => write!(f, "pop {mem}"),
        }
    }
}
