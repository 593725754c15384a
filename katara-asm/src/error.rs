/// Byte-buffer misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// An index past the end of the buffer.
    #[error("index {index} out of bounds, size: {size}")]
    OutOfBounds {
        /// The offending index.
        index: usize,
        /// The buffer size.
        size: usize,
    },
    /// A view with inverted bounds.
    #[error("start index {start} is greater than end index {end}")]
    InvertedRange {
        /// Requested start.
        start: usize,
        /// Requested end.
        end: usize,
    },
}

/// An operand combination the encoder can not express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// Register indices are 0 through 15.
    #[error("register index out of bounds: {0}")]
    RegisterOutOfBounds(u8),
    /// rsp can not serve as a SIB index register.
    #[error("index register can not be the stack pointer")]
    IndexRegIsStackPointer,
    /// 64-bit immediates only exist for `mov r64, imm64`.
    #[error("unsupported immediate size")]
    UnsupportedImmSize,
    /// Mismatched operand sizes.
    #[error("unsupported operand size combination")]
    UnsupportedSizeCombination,
    /// A shape rule violation, e.g. a 32-bit jump target.
    #[error("unsupported operand")]
    UnsupportedOperand,
    /// The buffer was too small or misused.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// A linking failure while resolving symbolic references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// A func reference without a recorded address.
    #[error("unresolved func reference: @{0}")]
    UnresolvedFuncRef(i64),
    /// A block reference without a recorded address.
    #[error("unresolved block reference: BB{0}")]
    UnresolvedBlockRef(i64),
    /// A PC-relative displacement outside the 32-bit range.
    #[error("offset from {site:#x} to {target:#x} does not fit in 32 bits")]
    OffsetOutOfRange {
        /// Address of the patch site.
        site: u64,
        /// Address of the target.
        target: u64,
    },
    /// A patch site outside the buffer being patched.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}
