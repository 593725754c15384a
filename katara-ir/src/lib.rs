//! SSA intermediate representation of the Katara compiler.
//!
//! A [`Program`] owns numbered [`Func`]s, a func owns numbered [`Block`]s,
//! and a block owns an ordered list of [`Instr`]s. Values are typed: SSA
//! results are [`Computed`], literals are [`Constant`], and control-flow
//! targets are [`BlockValue`]s. The text form produced by the `Display`
//! impls is stable and parses back via [`serialization`].

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod block;
mod dom;
mod error;
mod func;
mod instr;
mod program;
pub mod serialization;
mod types;
mod value;

pub use block::Block;
pub use dom::DomTree;
pub use error::{DomError, StructuralError};
pub use func::Func;
pub use instr::{
    BinaryALInstr, BinaryALOp, CallInstr, CompareInstr, CompareOp, Instr, JumpCondInstr,
    JumpInstr, MovInstr, PhiInstr, ReturnInstr, UnaryALInstr, UnaryALOp,
};
pub use program::Program;
pub use types::Type;
pub use value::{BlockValue, Constant, Computed, InheritedValue, Value};

/// Identifies a block within a func.
pub type BlockNum = i64;
/// Identifies a func within a program.
pub type FuncNum = i64;
/// Identifies a computed value within a func.
pub type ValueNum = i64;
