//! The single-instruction encoder.
//!
//! [`InstrEncoder`] writes one instruction into a [`Code`] view in the
//! fixed x86-64 order: operand-size prefix, REX, opcode, ModRM, SIB,
//! displacement, immediate. Instruction kinds drive it through the
//! `encode_*` methods; each method appends to or patches the bytes
//! emitted so far.

use bitflags::bitflags;

use crate::ops::{Imm, Mem, OperandSize, Reg, RmOperand};
use crate::{Code, EncodingError};

bitflags! {
    /// The four REX payload bits; the fixed 0x40 stem is added when the
    /// byte is emitted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Rex: u8 {
        /// 64-bit operand size.
        const W = 0x08;
        /// Extension of ModRM.reg.
        const R = 0x04;
        /// Extension of SIB.index.
        const X = 0x02;
        /// Extension of ModRM.rm or SIB.base or opcode.reg.
        const B = 0x01;
    }
}

/// Encoder state for one instruction.
pub struct InstrEncoder<'a, 'b> {
    code: &'a mut Code<'b>,
    size: usize,
    rex_at: Option<usize>,
    opcode_at: Option<usize>,
    modrm_at: Option<usize>,
}

impl<'a, 'b> InstrEncoder<'a, 'b> {
    /// Starts encoding at the beginning of `code`.
    pub fn new(code: &'a mut Code<'b>) -> InstrEncoder<'a, 'b> {
        InstrEncoder {
            code,
            size: 0,
            rex_at: None,
            opcode_at: None,
            modrm_at: None,
        }
    }

    /// The number of bytes emitted so far.
    pub fn size(&self) -> usize {
        self.size
    }

    fn push(&mut self, byte: u8) -> Result<usize, EncodingError> {
        let at = self.size;
        self.code.set(at, byte)?;
        self.size += 1;
        Ok(at)
    }

    fn or_byte(&mut self, at: usize, bits: u8) -> Result<(), EncodingError> {
        let byte = self.code.get(at)?;
        self.code.set(at, byte | bits)?;
        Ok(())
    }

    /// Emits the 0x66 prefix for 16-bit operands and requests REX.W for
    /// 64-bit operands. Must precede the opcode.
    pub fn encode_operand_size(&mut self, size: OperandSize) -> Result<(), EncodingError> {
        match size {
            OperandSize::S16 => {
                self.push(0x66)?;
            }
            OperandSize::S64 => {
                self.encode_rex()?;
                self.set_rex(Rex::W)?;
            }
            OperandSize::S8 | OperandSize::S32 => {}
        }
        Ok(())
    }

    /// Emits an (initially bare) REX prefix. Must precede the opcode;
    /// emitting it twice is harmless.
    pub fn encode_rex(&mut self) -> Result<(), EncodingError> {
        if self.rex_at.is_none() {
            if self.opcode_at.is_some() {
                return Err(EncodingError::UnsupportedOperand);
            }
            self.rex_at = Some(self.push(0x40)?);
        }
        Ok(())
    }

    fn set_rex(&mut self, flags: Rex) -> Result<(), EncodingError> {
        let Some(at) = self.rex_at else {
            // Operands that need extension bits announce themselves via
            // needs_rex() before the opcode is emitted.
            return Err(EncodingError::UnsupportedOperand);
        };
        self.or_byte(at, flags.bits())
    }

    /// Emits 1-3 opcode bytes.
    pub fn encode_opcode(&mut self, opcode: &[u8]) -> Result<(), EncodingError> {
        for &byte in opcode {
            let at = self.push(byte)?;
            self.opcode_at = Some(at);
        }
        Ok(())
    }

    /// Writes a constant opcode extension digit into ModRM.reg.
    pub fn encode_opcode_ext(&mut self, ext: u8) -> Result<(), EncodingError> {
        let at = self.ensure_modrm()?;
        self.or_byte(at, (ext & 0x7) << 3)
    }

    /// ORs a register's low bits into the last opcode byte, with REX.B
    /// for the extended registers.
    pub fn encode_opcode_reg(&mut self, reg: Reg) -> Result<(), EncodingError> {
        let Some(at) = self.opcode_at else {
            return Err(EncodingError::UnsupportedOperand);
        };
        if reg.index() >= 8 {
            self.set_rex(Rex::B)?;
        }
        self.or_byte(at, reg.index() & 0x7)
    }

    /// Writes a register into ModRM.reg, with REX.R for the extended
    /// registers.
    pub fn encode_modrm_reg(&mut self, reg: Reg) -> Result<(), EncodingError> {
        let at = self.ensure_modrm()?;
        if reg.index() >= 8 {
            self.set_rex(Rex::R)?;
        }
        self.or_byte(at, (reg.index() & 0x7) << 3)
    }

    /// Writes a register or memory operand into ModRM.rm, emitting SIB
    /// and displacement bytes as required.
    pub fn encode_rm(&mut self, rm: &RmOperand) -> Result<(), EncodingError> {
        match rm {
            RmOperand::Reg(reg) => self.encode_rm_reg(*reg),
            RmOperand::Mem(mem) => self.encode_rm_mem(mem),
        }
    }

    fn encode_rm_reg(&mut self, reg: Reg) -> Result<(), EncodingError> {
        let at = self.ensure_modrm()?;
        if reg.index() >= 8 {
            self.set_rex(Rex::B)?;
        }
        // Mod = 11, rm = low bits.
        self.or_byte(at, 0xc0 | (reg.index() & 0x7))
    }

    fn encode_rm_mem(&mut self, mem: &Mem) -> Result<(), EncodingError> {
        let modrm_at = self.ensure_modrm()?;
        if mem.base_reg().is_some_and(|base| base >= 8) {
            self.set_rex(Rex::B)?;
        }
        if mem.index_reg().is_some_and(|index| index >= 8) {
            self.set_rex(Rex::X)?;
        }

        match mem.base_reg() {
            None => {
                // Mod = 00, rm = 100, SIB with base 101: disp32 only.
                self.or_byte(modrm_at, 0x04)?;
                let sib = match mem.index_reg() {
                    // Scale 00, index 100 (none), base 101.
                    None => 0x25,
                    Some(index) => {
                        (mem.scale().encoding() << 6) | ((index & 0x7) << 3) | 0x05
                    }
                };
                self.push(sib)?;
                self.push_disp(mem.disp_value(), 4)?;
            }
            Some(base) => {
                match mem.index_reg() {
                    None => {
                        if base == 4 || base == 12 {
                            // rm = 100 escapes to SIB; reproduce the
                            // base there with no index.
                            self.or_byte(modrm_at, 0x04)?;
                            self.push(0x20 | (base & 0x7))?;
                        } else {
                            self.or_byte(modrm_at, base & 0x7)?;
                        }
                    }
                    Some(index) => {
                        self.or_byte(modrm_at, 0x04)?;
                        let sib = (mem.scale().encoding() << 6)
                            | ((index & 0x7) << 3)
                            | (base & 0x7);
                        self.push(sib)?;
                    }
                }
                match mem.required_disp_size() {
                    0 => {}
                    1 => {
                        self.or_byte(modrm_at, 0x40)?;
                        self.push_disp(mem.disp_value(), 1)?;
                    }
                    _ => {
                        self.or_byte(modrm_at, 0x80)?;
                        self.push_disp(mem.disp_value(), 4)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Appends a little-endian immediate.
    pub fn encode_imm(&mut self, imm: &Imm) -> Result<(), EncodingError> {
        for byte in imm.bytes() {
            self.push(byte)?;
        }
        Ok(())
    }

    fn push_disp(&mut self, disp: i32, width: usize) -> Result<(), EncodingError> {
        for &byte in disp.to_le_bytes().iter().take(width) {
            self.push(byte)?;
        }
        Ok(())
    }

    fn ensure_modrm(&mut self) -> Result<usize, EncodingError> {
        if let Some(at) = self.modrm_at {
            return Ok(at);
        }
        if self.opcode_at.is_none() {
            return Err(EncodingError::UnsupportedOperand);
        }
        let at = self.push(0x00)?;
        self.modrm_at = Some(at);
        Ok(at)
    }
}
