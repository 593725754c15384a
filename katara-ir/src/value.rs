use std::cmp::Ordering;
use std::fmt;

use crate::{BlockNum, FuncNum, StructuralError, Type, ValueNum};

/// A typed literal: a 64-bit pattern interpreted through an integral or
/// func type. The pattern is canonicalized at construction, so equality
/// over (type, bits) is semantic equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Constant {
    typ: Type,
    bits: i64,
}

impl Constant {
    /// Creates a constant of the given integral or func type.
    pub fn new(typ: Type, bits: i64) -> Result<Constant, StructuralError> {
        if !typ.is_integral() && typ != Type::Func {
            return Err(StructuralError::NonIntegralConstant(typ));
        }
        Ok(Constant {
            typ,
            bits: canonicalize(typ, bits),
        })
    }

    /// A bool constant.
    pub fn bool(value: bool) -> Constant {
        Constant {
            typ: Type::Bool,
            bits: value as i64,
        }
    }

    /// An i64 constant.
    pub fn i64(value: i64) -> Constant {
        Constant {
            typ: Type::I64,
            bits: value,
        }
    }

    /// A u64 constant.
    pub fn u64(value: u64) -> Constant {
        Constant {
            typ: Type::U64,
            bits: value as i64,
        }
    }

    /// A func constant referring to the func with the given number.
    pub fn func(num: FuncNum) -> Constant {
        Constant {
            typ: Type::Func,
            bits: num,
        }
    }

    /// The constant's type.
    pub fn typ(&self) -> Type {
        self.typ
    }

    /// The canonicalized 64-bit pattern.
    pub fn bits(&self) -> i64 {
        self.bits
    }

    /// The referenced func number, for func constants.
    pub fn func_num(&self) -> Option<FuncNum> {
        (self.typ == Type::Func).then_some(self.bits)
    }

    /// Text form including the type suffix, e.g. `#-4:i32`. Bool and func
    /// constants carry their type in the literal itself.
    pub fn to_string_with_type(&self) -> String {
        match self.typ {
            Type::Bool | Type::Func => self.to_string(),
            _ => format!("{}:{}", self, self.typ),
        }
    }
}

fn canonicalize(typ: Type, bits: i64) -> i64 {
    match typ {
        Type::Bool => (bits != 0) as i64,
        Type::I8 => bits as i8 as i64,
        Type::I16 => bits as i16 as i64,
        Type::I32 => bits as i32 as i64,
        Type::U8 => bits as u8 as i64,
        Type::U16 => bits as u16 as i64,
        Type::U32 => bits as u32 as i64,
        _ => bits,
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ {
            Type::Bool => write!(f, "{}", if self.bits != 0 { "#t" } else { "#f" }),
            Type::Func => write!(f, "@{}", self.bits),
            Type::U64 => write!(f, "#{}", self.bits as u64),
            _ => write!(f, "#{}", self.bits),
        }
    }
}

/// An SSA value: defined by exactly one instruction, identified by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Computed {
    num: ValueNum,
    typ: Type,
}

impl Computed {
    /// Creates a computed value of the given type and number.
    pub fn new(typ: Type, num: ValueNum) -> Computed {
        Computed { num, typ }
    }

    /// The value's type.
    pub fn typ(&self) -> Type {
        self.typ
    }

    /// The value's number.
    pub fn num(&self) -> ValueNum {
        self.num
    }

    /// Text form including the type suffix, e.g. `%3:i64`.
    pub fn to_string_with_type(&self) -> String {
        format!("{}:{}", self, self.typ)
    }
}

// Computed values have a strict total order by number.
impl Ord for Computed {
    fn cmp(&self, other: &Self) -> Ordering {
        self.num
            .cmp(&other.num)
            .then_with(|| self.typ.cmp(&other.typ))
    }
}

impl PartialOrd for Computed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.num)
    }
}

/// A reference to a basic block, used by terminators and phi origins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockValue(BlockNum);

impl BlockValue {
    /// Creates a reference to the block with the given number.
    pub fn new(block: BlockNum) -> BlockValue {
        BlockValue(block)
    }

    /// The referenced block number.
    pub fn block(&self) -> BlockNum {
        self.0
    }
}

impl fmt::Display for BlockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

/// Any IR value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// A literal.
    Constant(Constant),
    /// An SSA value.
    Computed(Computed),
    /// A block reference.
    Block(BlockValue),
}

impl Value {
    /// The value's type; block references have type `block`.
    pub fn typ(&self) -> Type {
        match self {
            Value::Constant(c) => c.typ(),
            Value::Computed(c) => c.typ(),
            Value::Block(_) => Type::Block,
        }
    }

    /// The contained constant, if any.
    pub fn constant(&self) -> Option<Constant> {
        match self {
            Value::Constant(c) => Some(*c),
            _ => None,
        }
    }

    /// The contained computed value, if any.
    pub fn computed(&self) -> Option<Computed> {
        match self {
            Value::Computed(c) => Some(*c),
            _ => None,
        }
    }

    /// The contained block value, if any.
    pub fn block_value(&self) -> Option<BlockValue> {
        match self {
            Value::Block(b) => Some(*b),
            _ => None,
        }
    }

    /// Text form including the type suffix where one is printed.
    pub fn to_string_with_type(&self) -> String {
        match self {
            Value::Constant(c) => c.to_string_with_type(),
            Value::Computed(c) => c.to_string_with_type(),
            Value::Block(b) => b.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Constant(c) => c.fmt(f),
            Value::Computed(c) => c.fmt(f),
            Value::Block(b) => b.fmt(f),
        }
    }
}

impl From<Constant> for Value {
    fn from(c: Constant) -> Value {
        Value::Constant(c)
    }
}

impl From<Computed> for Value {
    fn from(c: Computed) -> Value {
        Value::Computed(c)
    }
}

impl From<BlockValue> for Value {
    fn from(b: BlockValue) -> Value {
        Value::Block(b)
    }
}

/// A phi argument: a value paired with the predecessor block it is
/// inherited from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InheritedValue {
    value: Value,
    origin: BlockValue,
}

impl InheritedValue {
    /// Pairs a non-block value with its origin block.
    pub fn new(value: Value, origin: BlockValue) -> Result<InheritedValue, StructuralError> {
        if matches!(value, Value::Block(_)) {
            return Err(StructuralError::InheritedBlockValue);
        }
        Ok(InheritedValue { value, origin })
    }

    /// The inherited value.
    pub fn value(&self) -> Value {
        self.value
    }

    /// The predecessor block the value comes from.
    pub fn origin(&self) -> BlockValue {
        self.origin
    }

    /// The inherited value's type.
    pub fn typ(&self) -> Type {
        self.value.typ()
    }

    /// Text form, e.g. `%4:i64:{2}`.
    pub fn to_string_with_type(&self) -> String {
        format!("{}:{}", self.value.to_string_with_type(), self.origin)
    }
}

impl fmt::Display for InheritedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.value, self.origin)
    }
}
