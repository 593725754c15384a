//! The x86-64 operand model: registers, memory operands, immediates and
//! the symbolic func/block references resolved by the linker.

use std::fmt;

use crate::EncodingError;

/// Operand sizes in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperandSize {
    /// 8 bits.
    S8,
    /// 16 bits.
    S16,
    /// 32 bits.
    S32,
    /// 64 bits.
    S64,
}

impl OperandSize {
    /// The size in bits.
    pub fn bits(self) -> u8 {
        match self {
            OperandSize::S8 => 8,
            OperandSize::S16 => 16,
            OperandSize::S32 => 32,
            OperandSize::S64 => 64,
        }
    }
}

/// SIB scale factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scale {
    /// Factor 1 (SIB encoding 00).
    One,
    /// Factor 2 (SIB encoding 01).
    Two,
    /// Factor 4 (SIB encoding 10).
    Four,
    /// Factor 8 (SIB encoding 11).
    Eight,
}

impl Scale {
    /// The 2-bit SIB encoding.
    pub fn encoding(self) -> u8 {
        match self {
            Scale::One => 0,
            Scale::Two => 1,
            Scale::Four => 2,
            Scale::Eight => 3,
        }
    }

    /// The multiplication factor.
    pub fn factor(self) -> u8 {
        1 << self.encoding()
    }
}

/// A general-purpose register of a given operand size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg {
    size: OperandSize,
    index: u8,
}

impl Reg {
    /// Creates a register; indices are 0 through 15.
    pub fn new(size: OperandSize, index: u8) -> Result<Reg, EncodingError> {
        if index > 15 {
            return Err(EncodingError::RegisterOutOfBounds(index));
        }
        Ok(Reg { size, index })
    }

    const fn known(size: OperandSize, index: u8) -> Reg {
        Reg { size, index }
    }

    /// The operand size.
    pub fn size(&self) -> OperandSize {
        self.size
    }

    /// The hardware index, 0 through 15.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Whether encoding this register needs a REX prefix: the extended
    /// registers, and the byte registers spl/bpl/sil/dil (without REX
    /// those indices name ah/ch/dh/bh).
    pub fn needs_rex(&self) -> bool {
        self.index >= 8 || (self.size == OperandSize::S8 && self.index >= 4)
    }

    /// Whether this is the accumulator (al/ax/eax/rax), eligible for
    /// the short-form opcodes.
    pub fn is_reg_a(&self) -> bool {
        self.index == 0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(reg_name(self.index, self.size))
    }
}

/// The assembler name of a register index at a given size.
pub fn reg_name(index: u8, size: OperandSize) -> &'static str {
    const NAMES_8: [&str; 16] = [
        "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b",
        "r12b", "r13b", "r14b", "r15b",
    ];
    const NAMES_16: [&str; 16] = [
        "ax", "cx", "dx", "bx", "sp", "bp", "si", "di", "r8w", "r9w", "r10w", "r11w",
        "r12w", "r13w", "r14w", "r15w",
    ];
    const NAMES_32: [&str; 16] = [
        "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d",
        "r11d", "r12d", "r13d", "r14d", "r15d",
    ];
    const NAMES_64: [&str; 16] = [
        "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11",
        "r12", "r13", "r14", "r15",
    ];
    let table = match size {
        OperandSize::S8 => &NAMES_8,
        OperandSize::S16 => &NAMES_16,
        OperandSize::S32 => &NAMES_32,
        OperandSize::S64 => &NAMES_64,
    };
    table[index as usize & 0xf]
}

/// The named register constants, all four sizes.
pub mod regs {
    use super::{OperandSize, Reg};

    macro_rules! reg_consts {
        ($size:ident: $(($name:ident, $index:expr)),* $(,)?) => {
            $(
                #[doc = concat!("Register ", stringify!($name), ".")]
                pub const $name: Reg = Reg::known(OperandSize::$size, $index);
            )*
        };
    }

    reg_consts!(S8:
        (AL, 0), (CL, 1), (DL, 2), (BL, 3), (SPL, 4), (BPL, 5), (SIL, 6), (DIL, 7),
        (R8B, 8), (R9B, 9), (R10B, 10), (R11B, 11), (R12B, 12), (R13B, 13), (R14B, 14),
        (R15B, 15),
    );
    reg_consts!(S16:
        (AX, 0), (CX, 1), (DX, 2), (BX, 3), (SP, 4), (BP, 5), (SI, 6), (DI, 7),
        (R8W, 8), (R9W, 9), (R10W, 10), (R11W, 11), (R12W, 12), (R13W, 13), (R14W, 14),
        (R15W, 15),
    );
    reg_consts!(S32:
        (EAX, 0), (ECX, 1), (EDX, 2), (EBX, 3), (ESP, 4), (EBP, 5), (ESI, 6), (EDI, 7),
        (R8D, 8), (R9D, 9), (R10D, 10), (R11D, 11), (R12D, 12), (R13D, 13), (R14D, 14),
        (R15D, 15),
    );
    reg_consts!(S64:
        (RAX, 0), (RCX, 1), (RDX, 2), (RBX, 3), (RSP, 4), (RBP, 5), (RSI, 6), (RDI, 7),
        (R8, 8), (R9, 9), (R10, 10), (R11, 11), (R12, 12), (R13, 13), (R14, 14),
        (R15, 15),
    );
}

/// A memory operand: `[base + factor*index + disp]` with any of the
/// three parts absent (but never all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mem {
    size: OperandSize,
    base: Option<u8>,
    index: Option<u8>,
    scale: Scale,
    disp: i32,
}

impl Mem {
    /// The general form. The index register can not be rsp.
    pub fn new(
        size: OperandSize,
        base: Option<u8>,
        index: Option<u8>,
        scale: Scale,
        disp: i32,
    ) -> Result<Mem, EncodingError> {
        if let Some(base) = base {
            if base > 15 {
                return Err(EncodingError::RegisterOutOfBounds(base));
            }
        }
        if let Some(index) = index {
            if index > 15 {
                return Err(EncodingError::RegisterOutOfBounds(index));
            }
            if index == 4 {
                return Err(EncodingError::IndexRegIsStackPointer);
            }
        }
        Ok(Mem {
            size,
            base,
            index,
            scale,
            disp,
        })
    }

    /// `[disp]` with a 32-bit absolute displacement.
    pub fn disp(size: OperandSize, disp: i32) -> Mem {
        Mem {
            size,
            base: None,
            index: None,
            scale: Scale::One,
            disp,
        }
    }

    /// `[base]`.
    pub fn base(size: OperandSize, base: Reg) -> Mem {
        Mem {
            size,
            base: Some(base.index()),
            index: None,
            scale: Scale::One,
            disp: 0,
        }
    }

    /// `[base + disp]`.
    pub fn base_disp(size: OperandSize, base: Reg, disp: i32) -> Mem {
        Mem {
            size,
            base: Some(base.index()),
            index: None,
            scale: Scale::One,
            disp,
        }
    }

    /// `[factor*index + disp]`.
    pub fn index_scale(
        size: OperandSize,
        index: Reg,
        scale: Scale,
        disp: i32,
    ) -> Result<Mem, EncodingError> {
        Mem::new(size, None, Some(index.index()), scale, disp)
    }

    /// `[base + factor*index + disp]`.
    pub fn base_index_scale(
        size: OperandSize,
        base: Reg,
        index: Reg,
        scale: Scale,
        disp: i32,
    ) -> Result<Mem, EncodingError> {
        Mem::new(size, Some(base.index()), Some(index.index()), scale, disp)
    }

    /// The operand size.
    pub fn size(&self) -> OperandSize {
        self.size
    }

    /// The base register index, if present.
    pub fn base_reg(&self) -> Option<u8> {
        self.base
    }

    /// The index register index, if present.
    pub fn index_reg(&self) -> Option<u8> {
        self.index
    }

    /// The scale factor.
    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// The displacement.
    pub fn disp_value(&self) -> i32 {
        self.disp
    }

    /// Whether encoding needs REX extension bits for base or index.
    pub fn needs_rex(&self) -> bool {
        self.base.is_some_and(|base| base >= 8) || self.index.is_some_and(|index| index >= 8)
    }

    /// Whether a SIB byte is required: no base, an index, or a base
    /// that collides with the SIB escape (rsp/r12).
    pub fn needs_sib(&self) -> bool {
        match self.base {
            None => true,
            Some(base) => self.index.is_some() || base == 4 || base == 12,
        }
    }

    /// The minimal displacement width in bytes: 0, 1 or 4. A base of
    /// rbp/r13 requires at least a zero byte; no base forces 4.
    pub fn required_disp_size(&self) -> u8 {
        match self.base {
            None => 4,
            Some(base) => {
                if self.disp == 0 && base != 5 && base != 13 {
                    0
                } else if (-128..=127).contains(&self.disp) {
                    1
                } else {
                    4
                }
            }
        }
    }
}

impl fmt::Display for Mem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        let mut wrote_term = false;
        if let Some(base) = self.base {
            write!(f, "{}", reg_name(base, OperandSize::S64))?;
            wrote_term = true;
        }
        if let Some(index) = self.index {
            if wrote_term {
                write!(f, " + ")?;
            }
            write!(
                f,
                "{}*{}",
                self.scale.factor(),
                reg_name(index, OperandSize::S64)
            )?;
            wrote_term = true;
        }
        if self.disp != 0 || !wrote_term {
            if wrote_term {
                write!(f, " + ")?;
            }
            if (-128..=127).contains(&self.disp) {
                write!(f, "{:#04x}", self.disp)?;
            } else {
                write!(f, "{:#010x}", self.disp)?;
            }
        }
        write!(f, "]")
    }
}

/// A sign-extended immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Imm {
    size: OperandSize,
    value: i64,
}

/// An 8-bit immediate.
pub fn imm8(value: i8) -> Imm {
    Imm {
        size: OperandSize::S8,
        value: value as i64,
    }
}

/// A 16-bit immediate.
pub fn imm16(value: i16) -> Imm {
    Imm {
        size: OperandSize::S16,
        value: value as i64,
    }
}

/// A 32-bit immediate.
pub fn imm32(value: i32) -> Imm {
    Imm {
        size: OperandSize::S32,
        value: value as i64,
    }
}

/// A 64-bit immediate; only `mov r64, imm64` accepts one.
pub fn imm64(value: i64) -> Imm {
    Imm {
        size: OperandSize::S64,
        value,
    }
}

impl Imm {
    /// The immediate size.
    pub fn size(&self) -> OperandSize {
        self.size
    }

    /// The sign-extended value.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// The little-endian bytes, `size` wide.
    pub fn bytes(&self) -> Vec<u8> {
        let width = (self.size.bits() / 8) as usize;
        self.value.to_le_bytes()[..width].to_vec()
    }
}

impl fmt::Display for Imm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            OperandSize::S8 => write!(f, "{:#04x}", self.value as u8),
            OperandSize::S16 => write!(f, "{:#06x}", self.value as u16),
            OperandSize::S32 => write!(f, "{:#010x}", self.value as u32),
            OperandSize::S64 => write!(f, "{:#018x}", self.value as u64),
        }
    }
}

/// A symbolic reference to a func, resolved by the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncRef {
    func_id: i64,
}

impl FuncRef {
    /// References the func with the given id.
    pub fn new(func_id: i64) -> FuncRef {
        FuncRef { func_id }
    }

    /// The referenced func id.
    pub fn func_id(&self) -> i64 {
        self.func_id
    }
}

impl fmt::Display for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<@{}>", self.func_id)
    }
}

/// A symbolic reference to a block, resolved by the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    block_id: i64,
}

impl BlockRef {
    /// References the block with the given id.
    pub fn new(block_id: i64) -> BlockRef {
        BlockRef { block_id }
    }

    /// The referenced block id.
    pub fn block_id(&self) -> i64 {
        self.block_id
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BB{}", self.block_id)
    }
}

/// A register or memory operand, the ModRM r/m side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RmOperand {
    /// A register.
    Reg(Reg),
    /// A memory operand.
    Mem(Mem),
}

impl RmOperand {
    /// The operand size.
    pub fn size(&self) -> OperandSize {
        match self {
            RmOperand::Reg(reg) => reg.size(),
            RmOperand::Mem(mem) => mem.size(),
        }
    }

    /// Whether encoding needs a REX prefix.
    pub fn needs_rex(&self) -> bool {
        match self {
            RmOperand::Reg(reg) => reg.needs_rex(),
            RmOperand::Mem(mem) => mem.needs_rex(),
        }
    }

    /// The contained register, if any.
    pub fn reg(&self) -> Option<Reg> {
        match self {
            RmOperand::Reg(reg) => Some(*reg),
            RmOperand::Mem(_) => None,
        }
    }
}

impl fmt::Display for RmOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RmOperand::Reg(reg) => reg.fmt(f),
            RmOperand::Mem(mem) => mem.fmt(f),
        }
    }
}

impl From<Reg> for RmOperand {
    fn from(reg: Reg) -> RmOperand {
        RmOperand::Reg(reg)
    }
}

impl From<Mem> for RmOperand {
    fn from(mem: Mem) -> RmOperand {
        RmOperand::Mem(mem)
    }
}

/// Any operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A register.
    Reg(Reg),
    /// A memory operand.
    Mem(Mem),
    /// An immediate.
    Imm(Imm),
    /// A symbolic func reference.
    FuncRef(FuncRef),
    /// A symbolic block reference.
    BlockRef(BlockRef),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => reg.fmt(f),
            Operand::Mem(mem) => mem.fmt(f),
            Operand::Imm(imm) => imm.fmt(f),
            Operand::FuncRef(func_ref) => func_ref.fmt(f),
            Operand::BlockRef(block_ref) => block_ref.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::regs::*;
    use super::*;

    #[test]
    fn register_names() {
        assert_eq!(RAX.to_string(), "rax");
        assert_eq!(R15.to_string(), "r15");
        assert_eq!(SPL.to_string(), "spl");
        assert_eq!(R10W.to_string(), "r10w");
        assert_eq!(EBP.to_string(), "ebp");
    }

    #[test]
    fn register_bounds() {
        assert!(Reg::new(OperandSize::S64, 15).is_ok());
        assert_eq!(
            Reg::new(OperandSize::S64, 16),
            Err(EncodingError::RegisterOutOfBounds(16))
        );
    }

    #[test]
    fn rex_requirements() {
        assert!(!RAX.needs_rex());
        assert!(R8.needs_rex());
        // spl/bpl/sil/dil need a REX prefix even with index < 8.
        assert!(SPL.needs_rex());
        assert!(DIL.needs_rex());
        assert!(!BL.needs_rex());
        assert!(!SP.needs_rex());
    }

    #[test]
    fn mem_rejects_rsp_index() {
        assert_eq!(
            Mem::index_scale(OperandSize::S64, RSP, Scale::Two, 0),
            Err(EncodingError::IndexRegIsStackPointer)
        );
        assert!(Mem::index_scale(OperandSize::S64, R12, Scale::Two, 0).is_ok());
    }

    #[test]
    fn minimal_disp_sizes() {
        assert_eq!(Mem::base(OperandSize::S64, RBX).required_disp_size(), 0);
        assert_eq!(
            Mem::base_disp(OperandSize::S64, RBX, 1).required_disp_size(),
            1
        );
        assert_eq!(
            Mem::base_disp(OperandSize::S64, RBX, 128).required_disp_size(),
            4
        );
        assert_eq!(
            Mem::base_disp(OperandSize::S64, RBX, -128).required_disp_size(),
            1
        );
        // rbp/r13 require a displacement byte even when zero.
        assert_eq!(Mem::base(OperandSize::S64, RBP).required_disp_size(), 1);
        assert_eq!(Mem::base(OperandSize::S64, R13).required_disp_size(), 1);
        // Without a base the displacement is always 4 bytes.
        assert_eq!(Mem::disp(OperandSize::S64, 0).required_disp_size(), 4);
    }

    #[test]
    fn sib_requirements() {
        assert!(!Mem::base(OperandSize::S64, RBX).needs_sib());
        assert!(Mem::base(OperandSize::S64, RSP).needs_sib());
        assert!(Mem::base(OperandSize::S64, R12).needs_sib());
        assert!(Mem::disp(OperandSize::S64, 4).needs_sib());
        assert!(Mem::base_index_scale(OperandSize::S64, RBX, RCX, Scale::Eight, 0)
            .unwrap()
            .needs_sib());
    }

    #[test]
    fn display_forms() {
        assert_eq!(
            Mem::base_index_scale(OperandSize::S64, RBX, RCX, Scale::Eight, 16)
                .unwrap()
                .to_string(),
            "[rbx + 8*rcx + 0x10]"
        );
        assert_eq!(Mem::base(OperandSize::S64, RAX).to_string(), "[rax]");
        assert_eq!(Mem::disp(OperandSize::S64, 0x1000).to_string(), "[0x00001000]");
        assert_eq!(imm8(0x2a).to_string(), "0x2a");
        assert_eq!(imm32(-1).to_string(), "0xffffffff");
        assert_eq!(FuncRef::new(3).to_string(), "<@3>");
        assert_eq!(BlockRef::new(7).to_string(), "BB7");
    }

    #[test]
    fn imm_bytes_are_little_endian() {
        assert_eq!(imm16(0x1234).bytes(), vec![0x34, 0x12]);
        assert_eq!(imm32(-2).bytes(), vec![0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(
            imm64(0x0123456789abcdef).bytes(),
            vec![0xef, 0xcd, 0xab, 0x89, 0x67, 0x45, 0x23, 0x01]
        );
    }
}
