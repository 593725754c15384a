use std::fmt;

use itertools::Itertools;

use crate::{
    BlockNum, BlockValue, Computed, InheritedValue, StructuralError, Type, Value,
};

/// Unary arithmetic/logic operations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
pub enum UnaryALOp {
    /// Bitwise complement.
    #[strum(serialize = "not")]
    Not,
    /// Two's complement negation.
    #[strum(serialize = "neg")]
    Neg,
}

/// Binary arithmetic/logic operations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
pub enum BinaryALOp {
    /// Bitwise and.
    #[strum(serialize = "and")]
    And,
    /// Bitwise or.
    #[strum(serialize = "or")]
    Or,
    /// Bitwise exclusive or.
    #[strum(serialize = "xor")]
    Xor,
    /// Addition.
    #[strum(serialize = "add")]
    Add,
    /// Subtraction.
    #[strum(serialize = "sub")]
    Sub,
    /// Multiplication.
    #[strum(serialize = "mul")]
    Mul,
    /// Division.
    #[strum(serialize = "div")]
    Div,
    /// Remainder.
    #[strum(serialize = "rem")]
    Rem,
}

/// Comparison operations, producing bool results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
pub enum CompareOp {
    /// Equal.
    #[strum(serialize = "eq")]
    Eq,
    /// Not equal.
    #[strum(serialize = "ne")]
    Ne,
    /// Greater than.
    #[strum(serialize = "gt")]
    Gt,
    /// Greater than or equal.
    #[strum(serialize = "gte")]
    Gte,
    /// Less than or equal.
    #[strum(serialize = "lte")]
    Lte,
    /// Less than.
    #[strum(serialize = "lt")]
    Lt,
}

impl CompareOp {
    /// The operation with swapped operands: `a gt b` iff `b lt a`.
    pub fn commuted(self) -> CompareOp {
        match self {
            CompareOp::Eq | CompareOp::Ne => self,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            CompareOp::Lte => CompareOp::Gte,
            CompareOp::Lt => CompareOp::Gt,
        }
    }

    /// The logically negated operation.
    pub fn negated(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Gt => CompareOp::Lte,
            CompareOp::Gte => CompareOp::Lt,
            CompareOp::Lte => CompareOp::Gt,
            CompareOp::Lt => CompareOp::Gte,
        }
    }
}

/// `result = mov origin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MovInstr {
    result: Computed,
    origin: Value,
}

impl MovInstr {
    /// Copies `origin` into `result`; the types must match.
    pub fn new(result: Computed, origin: Value) -> Result<MovInstr, StructuralError> {
        if result.typ() != origin.typ() {
            return Err(StructuralError::TypeMismatch {
                instr: "mov",
                expected: result.typ(),
                found: origin.typ(),
            });
        }
        Ok(MovInstr { result, origin })
    }

    /// The defined value.
    pub fn result(&self) -> Computed {
        self.result
    }

    /// The copied value.
    pub fn origin(&self) -> Value {
        self.origin
    }
}

impl fmt::Display for MovInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = mov {}",
            self.result.to_string_with_type(),
            self.origin.to_string_with_type()
        )
    }
}

/// `result = phi arg:{origin}, ...` — merges one value per predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhiInstr {
    result: Computed,
    args: Vec<InheritedValue>,
}

impl PhiInstr {
    /// Merges the given per-predecessor values; at least two arguments,
    /// all of the result's type.
    pub fn new(
        result: Computed,
        args: Vec<InheritedValue>,
    ) -> Result<PhiInstr, StructuralError> {
        if args.len() < 2 {
            return Err(StructuralError::PhiTooFewArgs);
        }
        for arg in &args {
            if arg.typ() != result.typ() {
                return Err(StructuralError::TypeMismatch {
                    instr: "phi",
                    expected: result.typ(),
                    found: arg.typ(),
                });
            }
        }
        Ok(PhiInstr { result, args })
    }

    /// The defined value.
    pub fn result(&self) -> Computed {
        self.result
    }

    /// The per-predecessor arguments.
    pub fn args(&self) -> &[InheritedValue] {
        &self.args
    }

    /// The value inherited when control arrives from `origin`.
    pub fn value_inherited_from(&self, origin: BlockNum) -> Option<Value> {
        self.args
            .iter()
            .find(|arg| arg.origin().block() == origin)
            .map(|arg| arg.value())
    }
}

impl fmt::Display for PhiInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = phi {}",
            self.result.to_string_with_type(),
            self.args.iter().map(|a| a.to_string_with_type()).join(", ")
        )
    }
}

/// `result = <op>:T operand`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnaryALInstr {
    op: UnaryALOp,
    result: Computed,
    operand: Value,
}

impl UnaryALInstr {
    /// Applies `op` to `operand`; operand and result types must match.
    pub fn new(
        op: UnaryALOp,
        result: Computed,
        operand: Value,
    ) -> Result<UnaryALInstr, StructuralError> {
        if result.typ() != operand.typ() {
            return Err(StructuralError::TypeMismatch {
                instr: "unary al",
                expected: result.typ(),
                found: operand.typ(),
            });
        }
        Ok(UnaryALInstr {
            op,
            result,
            operand,
        })
    }

    /// The operation.
    pub fn op(&self) -> UnaryALOp {
        self.op
    }

    /// The defined value.
    pub fn result(&self) -> Computed {
        self.result
    }

    /// The operand.
    pub fn operand(&self) -> Value {
        self.operand
    }
}

impl fmt::Display for UnaryALInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {}:{} {}",
            self.result.to_string_with_type(),
            self.op,
            self.operand.typ(),
            self.operand
        )
    }
}

/// `result = <op>:T a, b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryALInstr {
    op: BinaryALOp,
    result: Computed,
    operand_a: Value,
    operand_b: Value,
}

impl BinaryALInstr {
    /// Applies `op` to `a` and `b`; all three values must share one
    /// integral type.
    pub fn new(
        op: BinaryALOp,
        result: Computed,
        operand_a: Value,
        operand_b: Value,
    ) -> Result<BinaryALInstr, StructuralError> {
        if !result.typ().is_integral() {
            return Err(StructuralError::NonIntegralOperand(result.typ()));
        }
        for operand in [&operand_a, &operand_b] {
            if operand.typ() != result.typ() {
                return Err(StructuralError::TypeMismatch {
                    instr: "binary al",
                    expected: result.typ(),
                    found: operand.typ(),
                });
            }
        }
        Ok(BinaryALInstr {
            op,
            result,
            operand_a,
            operand_b,
        })
    }

    /// The operation.
    pub fn op(&self) -> BinaryALOp {
        self.op
    }

    /// The defined value.
    pub fn result(&self) -> Computed {
        self.result
    }

    /// The first operand.
    pub fn operand_a(&self) -> Value {
        self.operand_a
    }

    /// The second operand.
    pub fn operand_b(&self) -> Value {
        self.operand_b
    }
}

impl fmt::Display for BinaryALInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {}:{} {}, {}",
            self.result.to_string_with_type(),
            self.op,
            self.operand_a.typ(),
            self.operand_a,
            self.operand_b
        )
    }
}

/// `result:b = <op>:T a, b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompareInstr {
    op: CompareOp,
    result: Computed,
    operand_a: Value,
    operand_b: Value,
}

impl CompareInstr {
    /// Compares `a` and `b`; the operands share a type, the result is
    /// bool.
    pub fn new(
        op: CompareOp,
        result: Computed,
        operand_a: Value,
        operand_b: Value,
    ) -> Result<CompareInstr, StructuralError> {
        if result.typ() != Type::Bool {
            return Err(StructuralError::NonBoolCompareResult(result.typ()));
        }
        if operand_a.typ() != operand_b.typ() {
            return Err(StructuralError::TypeMismatch {
                instr: "compare",
                expected: operand_a.typ(),
                found: operand_b.typ(),
            });
        }
        Ok(CompareInstr {
            op,
            result,
            operand_a,
            operand_b,
        })
    }

    /// The operation.
    pub fn op(&self) -> CompareOp {
        self.op
    }

    /// The defined bool value.
    pub fn result(&self) -> Computed {
        self.result
    }

    /// The first operand.
    pub fn operand_a(&self) -> Value {
        self.operand_a
    }

    /// The second operand.
    pub fn operand_b(&self) -> Value {
        self.operand_b
    }
}

impl fmt::Display for CompareInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {}:{} {}, {}",
            self.result.to_string_with_type(),
            self.op,
            self.operand_a.typ(),
            self.operand_a,
            self.operand_b
        )
    }
}

/// `jmp {dest}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JumpInstr {
    dest: BlockValue,
}

impl JumpInstr {
    /// Unconditionally continues at `dest`.
    pub fn new(dest: BlockValue) -> JumpInstr {
        JumpInstr { dest }
    }

    /// The destination block.
    pub fn dest(&self) -> BlockValue {
        self.dest
    }
}

impl fmt::Display for JumpInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "jmp {}", self.dest)
    }
}

/// `jcc cond, {dest_true}, {dest_false}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JumpCondInstr {
    cond: Value,
    dest_true: BlockValue,
    dest_false: BlockValue,
}

impl JumpCondInstr {
    /// Continues at `dest_true` when the bool `cond` holds, otherwise at
    /// `dest_false`.
    pub fn new(
        cond: Value,
        dest_true: BlockValue,
        dest_false: BlockValue,
    ) -> Result<JumpCondInstr, StructuralError> {
        if cond.typ() != Type::Bool {
            return Err(StructuralError::NonBoolCondition(cond.typ()));
        }
        Ok(JumpCondInstr {
            cond,
            dest_true,
            dest_false,
        })
    }

    /// The bool condition.
    pub fn cond(&self) -> Value {
        self.cond
    }

    /// Destination when the condition holds.
    pub fn dest_true(&self) -> BlockValue {
        self.dest_true
    }

    /// Destination when the condition does not hold.
    pub fn dest_false(&self) -> BlockValue {
        self.dest_false
    }
}

impl fmt::Display for JumpCondInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "jcc {}, {}, {}",
            self.cond, self.dest_true, self.dest_false
        )
    }
}

/// `results = call callee, args`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallInstr {
    callee: Value,
    results: Vec<Computed>,
    args: Vec<Value>,
}

impl CallInstr {
    /// Calls `callee` (a func-typed value) with `args`, defining
    /// `results`.
    pub fn new(
        callee: Value,
        results: Vec<Computed>,
        args: Vec<Value>,
    ) -> Result<CallInstr, StructuralError> {
        if callee.typ() != Type::Func {
            return Err(StructuralError::NonFuncCallee(callee.typ()));
        }
        Ok(CallInstr {
            callee,
            results,
            args,
        })
    }

    /// The called func value.
    pub fn callee(&self) -> Value {
        self.callee
    }

    /// The defined values.
    pub fn results(&self) -> &[Computed] {
        &self.results
    }

    /// The actual arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for CallInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.results.is_empty() {
            write!(
                f,
                "{} = ",
                self.results
                    .iter()
                    .map(|r| r.to_string_with_type())
                    .join(", ")
            )?;
        }
        write!(f, "call {}", self.callee)?;
        for arg in &self.args {
            write!(f, ", {}", arg.to_string_with_type())?;
        }
        Ok(())
    }
}

/// `ret args`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReturnInstr {
    args: Vec<Value>,
}

impl ReturnInstr {
    /// Returns the given values to the caller.
    pub fn new(args: Vec<Value>) -> ReturnInstr {
        ReturnInstr { args }
    }

    /// The returned values.
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for ReturnInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ret")?;
        for (i, arg) in self.args.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, arg.to_string_with_type())?;
        }
        Ok(())
    }
}

/// Any IR instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instr {
    /// Copy.
    Mov(MovInstr),
    /// Predecessor merge.
    Phi(PhiInstr),
    /// Unary arithmetic/logic.
    UnaryAL(UnaryALInstr),
    /// Binary arithmetic/logic.
    BinaryAL(BinaryALInstr),
    /// Comparison.
    Compare(CompareInstr),
    /// Unconditional jump.
    Jump(JumpInstr),
    /// Conditional jump.
    JumpCond(JumpCondInstr),
    /// Func call.
    Call(CallInstr),
    /// Func return.
    Return(ReturnInstr),
}

impl Instr {
    /// The computed values this instruction defines.
    pub fn defined_values(&self) -> Vec<Computed> {
        match self {
            Instr::Mov(instr) => vec![instr.result()],
            Instr::Phi(instr) => vec![instr.result()],
            Instr::UnaryAL(instr) => vec![instr.result()],
            Instr::BinaryAL(instr) => vec![instr.result()],
            Instr::Compare(instr) => vec![instr.result()],
            Instr::Call(instr) => instr.results().to_vec(),
            Instr::Jump(_) | Instr::JumpCond(_) | Instr::Return(_) => Vec::new(),
        }
    }

    /// The values this instruction uses. Phi argument values are
    /// included; block references are not values.
    pub fn used_values(&self) -> Vec<Value> {
        match self {
            Instr::Mov(instr) => vec![instr.origin()],
            Instr::Phi(instr) => instr.args().iter().map(|a| a.value()).collect(),
            Instr::UnaryAL(instr) => vec![instr.operand()],
            Instr::BinaryAL(instr) => vec![instr.operand_a(), instr.operand_b()],
            Instr::Compare(instr) => vec![instr.operand_a(), instr.operand_b()],
            Instr::Jump(_) => Vec::new(),
            Instr::JumpCond(instr) => vec![instr.cond()],
            Instr::Call(instr) => {
                let mut used = vec![instr.callee()];
                used.extend_from_slice(instr.args());
                used
            }
            Instr::Return(instr) => instr.args().to_vec(),
        }
    }

    /// Whether this instruction ends a block.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Instr::Jump(_) | Instr::JumpCond(_) | Instr::Return(_))
    }

    /// The blocks control can continue at after this instruction.
    pub fn successors(&self) -> Vec<BlockNum> {
        match self {
            Instr::Jump(instr) => vec![instr.dest().block()],
            Instr::JumpCond(instr) => {
                vec![instr.dest_true().block(), instr.dest_false().block()]
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Mov(instr) => instr.fmt(f),
            Instr::Phi(instr) => instr.fmt(f),
            Instr::UnaryAL(instr) => instr.fmt(f),
            Instr::BinaryAL(instr) => instr.fmt(f),
            Instr::Compare(instr) => instr.fmt(f),
            Instr::Jump(instr) => instr.fmt(f),
            Instr::JumpCond(instr) => instr.fmt(f),
            Instr::Call(instr) => instr.fmt(f),
            Instr::Return(instr) => instr.fmt(f),
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
    Mov(MovInstr),
    Phi(PhiInstr),
    UnaryAL(UnaryALInstr),
    BinaryAL(BinaryALInstr),
    Compare(CompareInstr),
    Jump(JumpInstr),
    JumpCond(JumpCondInstr),
    Call(CallInstr),
    Return(ReturnInstr),
);
