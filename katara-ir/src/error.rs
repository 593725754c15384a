use crate::{BlockNum, Computed, FuncNum, Type, ValueNum};

/// A violated IR invariant, raised at the point of construction or
/// mutation. The pipeline short-circuits on the first one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// Constants carry an integral or func type only.
    #[error("constant requires an integral or func type, found {0}")]
    NonIntegralConstant(Type),
    /// A phi argument can not inherit a block value.
    #[error("block value can not be inherited")]
    InheritedBlockValue,
    /// An instruction was constructed with mismatched operand types.
    #[error("{instr} instruction has mismatched types: {expected} vs {found}")]
    TypeMismatch {
        /// Mnemonic of the offending instruction.
        instr: &'static str,
        /// The type required by the result or first operand.
        expected: Type,
        /// The type actually supplied.
        found: Type,
    },
    /// Binary AL operands must be integral.
    #[error("al operand type must be integral, found {0}")]
    NonIntegralOperand(Type),
    /// Signedness is only defined for integral types.
    #[error("type is non-integral: {0}")]
    NonIntegralType(Type),
    /// `block` and `unknown` carry no size.
    #[error("type has no associated size: {0}")]
    UnsizedType(Type),
    /// Compare results are bool.
    #[error("compare result must be b, found {0}")]
    NonBoolCompareResult(Type),
    /// Conditional jump conditions are bool.
    #[error("jump condition must be b, found {0}")]
    NonBoolCondition(Type),
    /// Call callees are func-typed values.
    #[error("callee must have func type, found {0}")]
    NonFuncCallee(Type),
    /// A phi needs one argument per predecessor, so at least two.
    #[error("phi instruction requires at least two arguments")]
    PhiTooFewArgs,
    /// Block numbers are unique within a func.
    #[error("block {0} already exists")]
    BlockNumInUse(BlockNum),
    /// The referenced block is not owned by the func.
    #[error("block {0} does not exist")]
    UnknownBlock(BlockNum),
    /// Func numbers are unique within a program.
    #[error("func {0} already exists")]
    FuncNumInUse(FuncNum),
    /// The referenced func is not owned by the program.
    #[error("func {0} does not exist")]
    UnknownFunc(FuncNum),
    /// A type string outside the fixed vocabulary.
    #[error("unknown type string: {0:?}")]
    UnknownTypeString(String),
    /// SSA: every computed value has exactly one definition.
    #[error("value %{0} is defined more than once")]
    MultipleDefinitions(ValueNum),
    /// Every block ends with a terminator.
    #[error("block {0} does not end with a terminator")]
    MissingTerminator(BlockNum),
    /// Nothing may follow a terminator.
    #[error("block {0} has an instruction after its terminator")]
    InstrAfterTerminator(BlockNum),
    /// Phis may only appear in the prefix of a merge block.
    #[error("block {0} has a phi outside the phi prefix of a merge block")]
    MisplacedPhi(BlockNum),
    /// A phi must inherit exactly one value per predecessor.
    #[error("phi in block {block} does not match the predecessors of the block")]
    PhiArgsMismatchPreds {
        /// Block holding the phi.
        block: BlockNum,
    },
    /// A use must be dominated by its definition.
    #[error("use of {value} in block {block} is not dominated by its definition")]
    UseNotDominated {
        /// The value used too early.
        value: Computed,
        /// Block containing the use.
        block: BlockNum,
    },
    /// The entry block can not have predecessors.
    #[error("entry block {0} has predecessors")]
    EntryHasParents(BlockNum),
    /// A func without an entry block can not be validated or lowered.
    #[error("func {0} has no entry block")]
    NoEntryBlock(FuncNum),
    /// A program without an entry func can not be pruned or executed.
    #[error("program has no entry func")]
    NoEntryFunc,
    /// A terminator names a block the func does not own.
    #[error("block {block} jumps to unknown block {target}")]
    UnknownJumpTarget {
        /// Block holding the terminator.
        block: BlockNum,
        /// The missing destination.
        target: BlockNum,
    },
}

/// Failure to compute dominator information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The dominator tree is rooted at the entry block.
    #[error("can not determine dominator tree without entry block")]
    NoEntryBlock,
}
