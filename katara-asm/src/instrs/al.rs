//! Arithmetic and logic instructions.

use std::fmt;

use crate::coding::InstrEncoder;
use crate::ops::{Imm, Mem, OperandSize, Reg, RmOperand};
use crate::{Code, EncodingError, Linker};

/// The operand-encoding shapes shared by the two-operand families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpEncoding {
    /// r/m with a same-width immediate (or imm32 into r/m64).
    RmImm,
    /// r/m with an 8-bit immediate sign-extended into a wider r/m.
    RmImm8,
    /// r/m destination, register source.
    RmReg,
    /// register destination, memory source.
    RegRm,
}

fn classify_imm(rm_size: OperandSize, imm: Imm) -> Result<OpEncoding, EncodingError> {
    if imm.size() == OperandSize::S64 {
        return Err(EncodingError::UnsupportedImmSize);
    }
    if rm_size == imm.size()
        || (rm_size == OperandSize::S64 && imm.size() == OperandSize::S32)
    {
        Ok(OpEncoding::RmImm)
    } else if imm.size() == OperandSize::S8 {
        Ok(OpEncoding::RmImm8)
    } else {
        Err(EncodingError::UnsupportedSizeCombination)
    }
}

/// The unary AL family: `not` and `neg`, 0xF6/0xF7 with an extension
/// digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryALKind {
    /// Bitwise complement (/2).
    Not,
    /// Two's complement negation (/3).
    Neg,
}

impl UnaryALKind {
    fn mnemonic(self) -> &'static str {
        match self {
            UnaryALKind::Not => "not",
            UnaryALKind::Neg => "neg",
        }
    }

    fn opcode_ext(self) -> u8 {
        match self {
            UnaryALKind::Not => 2,
            UnaryALKind::Neg => 3,
        }
    }
}

/// A unary AL instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnaryAL {
    kind: UnaryALKind,
    op: RmOperand,
}

impl UnaryAL {
    /// Applies `kind` to the register or memory operand.
    pub fn new(kind: UnaryALKind, op: impl Into<RmOperand>) -> UnaryAL {
        UnaryAL {
            kind,
            op: op.into(),
        }
    }

    /// The operand.
    pub fn op(&self) -> RmOperand {
        self.op
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        encoder.encode_operand_size(self.op.size())?;
        if self.op.needs_rex() {
            encoder.encode_rex()?;
        }
        let opcode = if self.op.size() == OperandSize::S8 {
            0xf6
        } else {
            0xf7
        };
        encoder.encode_opcode(&[opcode])?;
        encoder.encode_opcode_ext(self.kind.opcode_ext())?;
        encoder.encode_rm(&self.op)?;
        Ok(encoder.size())
    }
}

impl fmt::Display for UnaryAL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.mnemonic(), self.op)
    }
}

/// The binary AL family sharing one encoding scheme: opcode base is
/// eight times the extension digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryALKind {
    /// Addition (/0).
    Add,
    /// Addition with carry (/2).
    Adc,
    /// Subtraction (/5).
    Sub,
    /// Subtraction with borrow (/3).
    Sbb,
    /// Bitwise and (/4).
    And,
    /// Bitwise or (/1).
    Or,
    /// Bitwise exclusive or (/6).
    Xor,
    /// Comparison (/7).
    Cmp,
}

impl BinaryALKind {
    fn mnemonic(self) -> &'static str {
        match self {
            BinaryALKind::Add => "add",
            BinaryALKind::Adc => "adc",
            BinaryALKind::Sub => "sub",
            BinaryALKind::Sbb => "sbb",
            BinaryALKind::And => "and",
            BinaryALKind::Or => "or",
            BinaryALKind::Xor => "xor",
            BinaryALKind::Cmp => "cmp",
        }
    }

    fn opcode_ext(self) -> u8 {
        match self {
            BinaryALKind::Add => 0,
            BinaryALKind::Or => 1,
            BinaryALKind::Adc => 2,
            BinaryALKind::Sbb => 3,
            BinaryALKind::And => 4,
            BinaryALKind::Sub => 5,
            BinaryALKind::Xor => 6,
            BinaryALKind::Cmp => 7,
        }
    }
}

/// The non-r/m side of a binary AL instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinarySrc {
    Imm(Imm),
    Reg(Reg),
    Mem(Mem),
}

/// A binary AL instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryAL {
    kind: BinaryALKind,
    encoding: OpEncoding,
    op_a: RmOperand,
    op_b: BinarySrc,
}

impl BinaryAL {
    /// `op_a <- op_a <kind> imm`. 64-bit immediates are rejected; an
    /// 8-bit immediate into a wider operand selects the sign-extending
    /// form.
    pub fn with_imm(
        kind: BinaryALKind,
        op_a: impl Into<RmOperand>,
        imm: Imm,
    ) -> Result<BinaryAL, EncodingError> {
        let op_a = op_a.into();
        let encoding = classify_imm(op_a.size(), imm)?;
        Ok(BinaryAL {
            kind,
            encoding,
            op_a,
            op_b: BinarySrc::Imm(imm),
        })
    }

    /// `op_a <- op_a <kind> reg` with matching sizes.
    pub fn with_reg(
        kind: BinaryALKind,
        op_a: impl Into<RmOperand>,
        reg: Reg,
    ) -> Result<BinaryAL, EncodingError> {
        let op_a = op_a.into();
        if op_a.size() != reg.size() {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(BinaryAL {
            kind,
            encoding: OpEncoding::RmReg,
            op_a,
            op_b: BinarySrc::Reg(reg),
        })
    }

    /// `reg <- reg <kind> mem` with matching sizes.
    pub fn reg_mem(
        kind: BinaryALKind,
        reg: Reg,
        mem: Mem,
    ) -> Result<BinaryAL, EncodingError> {
        if reg.size() != mem.size() {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(BinaryAL {
            kind,
            encoding: OpEncoding::RegRm,
            op_a: RmOperand::Reg(reg),
            op_b: BinarySrc::Mem(mem),
        })
    }

    fn can_use_reg_a_shortcut(&self) -> bool {
        self.encoding == OpEncoding::RmImm
            && self.op_a.reg().is_some_and(|reg| reg.is_reg_a())
    }

    fn opcode(&self) -> u8 {
        let base = self.kind.opcode_ext() * 8;
        let byte_sized = self.op_a.size() == OperandSize::S8;
        if self.can_use_reg_a_shortcut() {
            return base + if byte_sized { 4 } else { 5 };
        }
        match self.encoding {
            OpEncoding::RmImm => {
                if byte_sized {
                    0x80
                } else {
                    0x81
                }
            }
            OpEncoding::RmImm8 => 0x83,
            OpEncoding::RmReg => base + if byte_sized { 0 } else { 1 },
            OpEncoding::RegRm => base + if byte_sized { 2 } else { 3 },
        }
    }

    fn src_needs_rex(&self) -> bool {
        match self.op_b {
            BinarySrc::Imm(_) => false,
            BinarySrc::Reg(reg) => reg.needs_rex(),
            BinarySrc::Mem(mem) => mem.needs_rex(),
        }
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        encoder.encode_operand_size(self.op_a.size())?;
        if self.op_a.needs_rex() || self.src_needs_rex() {
            encoder.encode_rex()?;
        }
        encoder.encode_opcode(&[self.opcode()])?;
        if !self.can_use_reg_a_shortcut()
            && matches!(self.encoding, OpEncoding::RmImm | OpEncoding::RmImm8)
        {
            encoder.encode_opcode_ext(self.kind.opcode_ext())?;
        }

        match self.encoding {
            _ if self.can_use_reg_a_shortcut() => {}
            OpEncoding::RmImm | OpEncoding::RmImm8 | OpEncoding::RmReg => {
                encoder.encode_rm(&self.op_a)?;
            }
            OpEncoding::RegRm => {
                let reg = self.op_a.reg().expect("reg_rm stores a register");
                encoder.encode_modrm_reg(reg)?;
            }
        }

        match self.op_b {
            BinarySrc::Imm(imm) => encoder.encode_imm(&imm)?,
            BinarySrc::Reg(reg) => encoder.encode_modrm_reg(reg)?,
            BinarySrc::Mem(mem) => encoder.encode_rm(&mem.into())?,
        }
        Ok(encoder.size())
    }
}

impl fmt::Display for BinaryAL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {},", self.kind.mnemonic(), self.op_a)?;
        match self.op_b {
            BinarySrc::Imm(imm) => write!(f, "{imm}"),
            BinarySrc::Reg(reg) => write!(f, "{reg}"),
            BinarySrc::Mem(mem) => write!(f, "{mem}"),
        }
    }
}

/// Unsigned multiply of the A register: `mul r/m` (0xF6/0xF7 /4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mul {
    factor: RmOperand,
}

impl Mul {
    /// Multiplies rAX by `factor` into rDX:rAX.
    pub fn new(factor: impl Into<RmOperand>) -> Mul {
        Mul {
            factor: factor.into(),
        }
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        encode_group3(&self.factor, 4, code)
    }
}

impl fmt::Display for Mul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mul {}", self.factor)
    }
}

/// Unsigned divide of rDX:rAX: `div r/m` (0xF6/0xF7 /6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Div {
    divisor: RmOperand,
}

impl Div {
    /// Divides rDX:rAX by `divisor`.
    pub fn new(divisor: impl Into<RmOperand>) -> Div {
        Div {
            divisor: divisor.into(),
        }
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        encode_group3(&self.divisor, 6, code)
    }
}

impl fmt::Display for Div {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "div {}", self.divisor)
    }
}

/// Signed divide of rDX:rAX: `idiv r/m` (0xF6/0xF7 /7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Idiv {
    divisor: RmOperand,
}

impl Idiv {
    /// Divides rDX:rAX by `divisor`, signed.
    pub fn new(divisor: impl Into<RmOperand>) -> Idiv {
        Idiv {
            divisor: divisor.into(),
        }
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        encode_group3(&self.divisor, 7, code)
    }
}

impl fmt::Display for Idiv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idiv {}", self.divisor)
    }
}

fn encode_group3(
    rm: &RmOperand,
    ext: u8,
    code: &mut Code<'_>,
) -> Result<usize, EncodingError> {
    let mut encoder = InstrEncoder::new(code);
    encoder.encode_operand_size(rm.size())?;
    if rm.needs_rex() {
        encoder.encode_rex()?;
    }
    let opcode = if rm.size() == OperandSize::S8 {
        0xf6
    } else {
        0xf7
    };
    encoder.encode_opcode(&[opcode])?;
    encoder.encode_opcode_ext(ext)?;
    encoder.encode_rm(rm)?;
    Ok(encoder.size())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImulForm {
    RegAdRm,
    RegRm,
    RegRmImm,
    RegRmImm8,
}

/// Signed multiply in its three forms: one-operand (rDX:rAX), register
/// destination, and register destination with an immediate factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Imul {
    form: ImulForm,
    factor_a: Option<Reg>,
    factor_b: RmOperand,
    factor_c: Option<Imm>,
}

impl Imul {
    /// `imul r/m`: rDX:rAX <- rAX * factor.
    pub fn new(factor: impl Into<RmOperand>) -> Imul {
        Imul {
            form: ImulForm::RegAdRm,
            factor_a: None,
            factor_b: factor.into(),
            factor_c: None,
        }
    }

    /// `imul reg, r/m` with matching non-byte sizes.
    pub fn with_reg(reg: Reg, rm: impl Into<RmOperand>) -> Result<Imul, EncodingError> {
        let rm = rm.into();
        if reg.size() != rm.size() {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        if reg.size() == OperandSize::S8 {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Imul {
            form: ImulForm::RegRm,
            factor_a: Some(reg),
            factor_b: rm,
            factor_c: None,
        })
    }

    /// `imul reg, r/m, imm` with matching non-byte sizes; an 8-bit
    /// immediate selects the short form.
    pub fn with_imm(
        reg: Reg,
        rm: impl Into<RmOperand>,
        imm: Imm,
    ) -> Result<Imul, EncodingError> {
        let rm = rm.into();
        if reg.size() != rm.size() || reg.size() == OperandSize::S8 {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        let form = match classify_imm(reg.size(), imm)? {
            OpEncoding::RmImm => ImulForm::RegRmImm,
            OpEncoding::RmImm8 => ImulForm::RegRmImm8,
            _ => unreachable!("classify_imm returns an immediate shape"),
        };
        Ok(Imul {
            form,
            factor_a: Some(reg),
            factor_b: rm,
            factor_c: Some(imm),
        })
    }

    // An immediate factor of one is algebraically redundant and elided.
    fn can_skip_imm(&self) -> bool {
        match self.factor_c {
            None => true,
            Some(imm) => imm.value() == 1,
        }
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        encoder.encode_operand_size(self.factor_b.size())?;
        let reg_rex = self.factor_a.is_some_and(|reg| reg.needs_rex());
        if reg_rex || self.factor_b.needs_rex() {
            encoder.encode_rex()?;
        }
        match self.form {
            ImulForm::RegAdRm => {
                let opcode = if self.factor_b.size() == OperandSize::S8 {
                    0xf6
                } else {
                    0xf7
                };
                encoder.encode_opcode(&[opcode])?;
                encoder.encode_opcode_ext(5)?;
                encoder.encode_rm(&self.factor_b)?;
            }
            ImulForm::RegRm | ImulForm::RegRmImm | ImulForm::RegRmImm8 => {
                if self.can_skip_imm() {
                    encoder.encode_opcode(&[0x0f, 0xaf])?;
                } else if self.form == ImulForm::RegRmImm {
                    encoder.encode_opcode(&[0x69])?;
                } else {
                    encoder.encode_opcode(&[0x6b])?;
                }
                encoder.encode_modrm_reg(self.factor_a.expect("reg forms store a register"))?;
                encoder.encode_rm(&self.factor_b)?;
                if !self.can_skip_imm() {
                    encoder.encode_imm(&self.factor_c.expect("imm forms store an immediate"))?;
                }
            }
        }
        Ok(encoder.size())
    }
}

impl fmt::Display for Imul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.factor_a, self.factor_c) {
            (None, _) => write!(f, "imul {}", self.factor_b),
            (Some(reg), None) => write!(f, "imul {reg},{}", self.factor_b),
            (Some(reg), Some(_)) if self.can_skip_imm() => {
                write!(f, "imul {reg},{}", self.factor_b)
            }
            (Some(reg), Some(imm)) => write!(f, "imul {reg},{},{imm}", self.factor_b),
        }
    }
}

/// Shift operations sharing the 0xC0/0xC1 (imm8) and 0xD2/0xD3 (cl)
/// encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    /// Logical left shift (/4).
    Shl,
    /// Logical right shift (/5).
    Shr,
    /// Arithmetic right shift (/7).
    Sar,
}

impl ShiftKind {
    fn mnemonic(self) -> &'static str {
        match self {
            ShiftKind::Shl => "shl",
            ShiftKind::Shr => "shr",
            ShiftKind::Sar => "sar",
        }
    }

    fn opcode_ext(self) -> u8 {
        match self {
            ShiftKind::Shl => 4,
            ShiftKind::Shr => 5,
            ShiftKind::Sar => 7,
        }
    }
}

/// The shift amount: an 8-bit immediate or the cl register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftAmount {
    /// A constant amount.
    Imm8(i8),
    /// The amount in cl.
    Cl,
}

/// A shift instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    kind: ShiftKind,
    op: RmOperand,
    amount: ShiftAmount,
}

impl Shift {
    /// Shifts `op` by `amount`.
    pub fn new(kind: ShiftKind, op: impl Into<RmOperand>, amount: ShiftAmount) -> Shift {
        Shift {
            kind,
            op: op.into(),
            amount,
        }
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        encoder.encode_operand_size(self.op.size())?;
        if self.op.needs_rex() {
            encoder.encode_rex()?;
        }
        let byte_sized = self.op.size() == OperandSize::S8;
        let opcode = match self.amount {
            ShiftAmount::Imm8(_) => {
                if byte_sized {
                    0xc0
                } else {
                    0xc1
                }
            }
            ShiftAmount::Cl => {
                if byte_sized {
                    0xd2
                } else {
                    0xd3
                }
            }
        };
        encoder.encode_opcode(&[opcode])?;
        encoder.encode_opcode_ext(self.kind.opcode_ext())?;
        encoder.encode_rm(&self.op)?;
        if let ShiftAmount::Imm8(amount) = self.amount {
            encoder.encode_imm(&crate::ops::imm8(amount))?;
        }
        Ok(encoder.size())
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amount {
            ShiftAmount::Imm8(amount) => {
                write!(f, "{} {},{amount}", self.kind.mnemonic(), self.op)
            }
            ShiftAmount::Cl => write!(f, "{} {},cl", self.kind.mnemonic(), self.op),
        }
    }
}

/// The non-r/m side of a `test` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TestSrc {
    Imm(Imm),
    Reg(Reg),
}

/// Bit test: `test r/m, imm` (0xF6/0xF7 /0) or `test r/m, reg`
/// (0x84/0x85), with the A-register shortcut for immediates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Test {
    op_a: RmOperand,
    op_b: TestSrc,
}

impl Test {
    /// `test r/m, imm`. 64-bit immediates are rejected; the immediate
    /// must match the operand width (or be imm32 against r/m64).
    pub fn with_imm(op_a: impl Into<RmOperand>, imm: Imm) -> Result<Test, EncodingError> {
        let op_a = op_a.into();
        match classify_imm(op_a.size(), imm)? {
            OpEncoding::RmImm => Ok(Test {
                op_a,
                op_b: TestSrc::Imm(imm),
            }),
            _ => Err(EncodingError::UnsupportedSizeCombination),
        }
    }

    /// `test r/m, reg` with matching sizes.
    pub fn with_reg(op_a: impl Into<RmOperand>, reg: Reg) -> Result<Test, EncodingError> {
        let op_a = op_a.into();
        if op_a.size() != reg.size() {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(Test {
            op_a,
            op_b: TestSrc::Reg(reg),
        })
    }

    fn can_use_reg_a_shortcut(&self) -> bool {
        matches!(self.op_b, TestSrc::Imm(_))
            && self.op_a.reg().is_some_and(|reg| reg.is_reg_a())
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        encoder.encode_operand_size(self.op_a.size())?;
        let src_rex = match self.op_b {
            TestSrc::Imm(_) => false,
            TestSrc::Reg(reg) => reg.needs_rex(),
        };
        if self.op_a.needs_rex() || src_rex {
            encoder.encode_rex()?;
        }
        let byte_sized = self.op_a.size() == OperandSize::S8;
        if self.can_use_reg_a_shortcut() {
            encoder.encode_opcode(&[if byte_sized { 0xa8 } else { 0xa9 }])?;
        } else {
            match self.op_b {
                TestSrc::Imm(_) => {
                    encoder.encode_opcode(&[if byte_sized { 0xf6 } else { 0xf7 }])?;
                    encoder.encode_opcode_ext(0)?;
                }
                TestSrc::Reg(_) => {
                    encoder.encode_opcode(&[if byte_sized { 0x84 } else { 0x85 }])?;
                }
            }
            encoder.encode_rm(&self.op_a)?;
        }
        match self.op_b {
            TestSrc::Imm(imm) => encoder.encode_imm(&imm)?,
            TestSrc::Reg(reg) => encoder.encode_modrm_reg(reg)?,
        }
        Ok(encoder.size())
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test {},", self.op_a)?;
        match self.op_b {
            TestSrc::Imm(imm) => write!(f, "{imm}"),
            TestSrc::Reg(reg) => write!(f, "{reg}"),
        }
    }
}

/// Widen rAX in place: `cbw`/`cwde`/`cdqe` (0x98).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignExtendRegA {
    size: OperandSize,
}

impl SignExtendRegA {
    /// Sign-extends into the 16-, 32- or 64-bit A register.
    pub fn new(size: OperandSize) -> Result<SignExtendRegA, EncodingError> {
        if size == OperandSize::S8 {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(SignExtendRegA { size })
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        encoder.encode_operand_size(self.size)?;
        encoder.encode_opcode(&[0x98])?;
        Ok(encoder.size())
    }
}

impl fmt::Display for SignExtendRegA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.size {
            OperandSize::S16 => "cbw",
            OperandSize::S32 => "cwde",
            _ => "cdqe",
        })
    }
}

/// Spread rAX's sign into rDX: `cwd`/`cdq`/`cqo` (0x99), the setup for
/// the signed divides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignExtendRegAD {
    size: OperandSize,
}

impl SignExtendRegAD {
    /// Sign-extends rAX into rDX:rAX at the given width.
    pub fn new(size: OperandSize) -> Result<SignExtendRegAD, EncodingError> {
        if size == OperandSize::S8 {
            return Err(EncodingError::UnsupportedSizeCombination);
        }
        Ok(SignExtendRegAD { size })
    }

    pub(crate) fn encode(
        &self,
        _linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        let mut encoder = InstrEncoder::new(code);
        encoder.encode_operand_size(self.size)?;
        encoder.encode_opcode(&[0x99])?;
        Ok(encoder.size())
    }
}

impl fmt::Display for SignExtendRegAD {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.size {
            OperandSize::S16 => "cwd",
            OperandSize::S32 => "cdq",
            _ => "cqo",
        })
    }
}
