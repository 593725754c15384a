//! The x86-64 instruction kinds.
//!
//! Every kind is a struct with checked constructors; [`Instr`] is the
//! tagged sum the machine blocks store. Encoding takes the linker (for
//! symbolic branch and call targets) and a [`Code`] view positioned at
//! the instruction's first byte, and returns the encoded length.

mod al;
mod cf;
mod data;

use std::fmt;

pub use al::{
    BinaryAL, BinaryALKind, Div, Idiv, Imul, Mul, OpEncoding, Shift, ShiftAmount,
    ShiftKind, SignExtendRegA, SignExtendRegAD, Test, UnaryAL, UnaryALKind,
};
pub use cf::{Call, Cond, Jcc, Jmp, Ret, Syscall};
pub use data::{Mov, Pop, Push, Xchg};

use crate::{Code, EncodingError, Linker};

/// Any machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// Unary arithmetic/logic.
    UnaryAL(UnaryAL),
    /// Binary arithmetic/logic (including cmp).
    BinaryAL(BinaryAL),
    /// Unsigned multiply.
    Mul(Mul),
    /// Signed multiply.
    Imul(Imul),
    /// Unsigned divide.
    Div(Div),
    /// Signed divide.
    Idiv(Idiv),
    /// Shifts.
    Shift(Shift),
    /// Bit test.
    Test(Test),
    /// Widening within rAX.
    SignExtendRegA(SignExtendRegA),
    /// Widening into rDX:rAX.
    SignExtendRegAD(SignExtendRegAD),
    /// Data move.
    Mov(Mov),
    /// Exchange.
    Xchg(Xchg),
    /// Stack push.
    Push(Push),
    /// Stack pop.
    Pop(Pop),
    /// Conditional jump.
    Jcc(Jcc),
    /// Unconditional jump.
    Jmp(Jmp),
    /// Call.
    Call(Call),
    /// Syscall.
    Syscall(Syscall),
    /// Return.
    Ret(Ret),
}

impl Instr {
    /// Encodes the instruction at the start of `code`, registering any
    /// patch sites with `linker`. Returns the encoded length.
    pub fn encode(
        &self,
        linker: &mut Linker,
        code: &mut Code<'_>,
    ) -> Result<usize, EncodingError> {
        match self {
            Instr::UnaryAL(instr) => instr.encode(linker, code),
            Instr::BinaryAL(instr) => instr.encode(linker, code),
            Instr::Mul(instr) => instr.encode(linker, code),
            Instr::Imul(instr) => instr.encode(linker, code),
            Instr::Div(instr) => instr.encode(linker, code),
            Instr::Idiv(instr) => instr.encode(linker, code),
            Instr::Shift(instr) => instr.encode(linker, code),
            Instr::Test(instr) => instr.encode(linker, code),
            Instr::SignExtendRegA(instr) => instr.encode(linker, code),
            Instr::SignExtendRegAD(instr) => instr.encode(linker, code),
            Instr::Mov(instr) => instr.encode(linker, code),
            Instr::Xchg(instr) => instr.encode(linker, code),
            Instr::Push(instr) => instr.encode(linker, code),
            Instr::Pop(instr) => instr.encode(linker, code),
            Instr::Jcc(instr) => instr.encode(linker, code),
            Instr::Jmp(instr) => instr.encode(linker, code),
            Instr::Call(instr) => instr.encode(linker, code),
            Instr::Syscall(instr) => instr.encode(linker, code),
            Instr::Ret(instr) => instr.encode(linker, code),
        }
    }

    /// The encoded length in bytes, priced against the dummy buffer
    /// with a scratch linker.
    pub fn encoded_len(&self) -> Result<usize, EncodingError> {
        let mut linker = Linker::new();
        let mut dummy = Code::dummy();
        self.encode(&mut linker, &mut dummy)
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::UnaryAL(instr) => instr.fmt(f),
            Instr::BinaryAL(instr) => instr.fmt(f),
            Instr::Mul(instr) => instr.fmt(f),
            Instr::Imul(instr) => instr.fmt(f),
            Instr::Div(instr) => instr.fmt(f),
            Instr::Idiv(instr) => instr.fmt(f),
            Instr::Shift(instr) => instr.fmt(f),
            Instr::Test(instr) => instr.fmt(f),
            Instr::SignExtendRegA(instr) => instr.fmt(f),
            Instr::SignExtendRegAD(instr) => instr.fmt(f),
            Instr::Mov(instr) => instr.fmt(f),
            Instr::Xchg(instr) => instr.fmt(f),
            Instr::Push(instr) => instr.fmt(f),
            Instr::Pop(instr) => instr.fmt(f),
            Instr::Jcc(instr) => instr.fmt(f),
            Instr::Jmp(instr) => instr.fmt(f),
            Instr::Call(instr) => instr.fmt(f),
            Instr::Syscall(instr) => instr.fmt(f),
            Instr::Ret(instr) => instr.fmt(f),
        }
    }
}

macro_rules! impl_from_instr {
    ($($variant:ident($kind:ty)),* $(,)?) => {
        $(impl From<$kind> for Instr {
            fn from(instr: $kind) -> Instr {
                Instr::$variant(instr)
            }
        })*
    };
}

impl_from_instr!(
    UnaryAL(UnaryAL),
    BinaryAL(BinaryAL),
    Mul(Mul),
    Imul(Imul),
    Div(Div),
    Idiv(Idiv),
    Shift(Shift),
    Test(Test),
    SignExtendRegA(SignExtendRegA),
    SignExtendRegAD(SignExtendRegAD),
    Mov(Mov),
    Xchg(Xchg),
    Push(Push),
    Pop(Pop),
    Jcc(Jcc),
    Jmp(Jmp),
    Call(Call),
    Syscall(Syscall),
    Ret(Ret),
);
