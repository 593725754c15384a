//! x86-64 back end of the Katara compiler.
//!
//! [`ops`] models operands (registers, memory, immediates, symbolic
//! func/block references), [`instrs`] the instruction kinds, and
//! [`coding`] the byte-exact prefix/REX/opcode/ModRM/SIB encoder. A
//! [`mc::Prog`] assembles funcs and globally-numbered blocks, encodes
//! into a [`code::Code`] view and resolves branch and call targets
//! through the [`mc::Linker`]. On unix hosts, [`exec`] maps the encoded
//! bytes onto an executable page.

#![warn(missing_docs)]
#![deny(unused_must_use)]

pub mod code;
pub mod coding;
mod error;
#[cfg(unix)]
pub mod exec;
pub mod instrs;
pub mod mc;
pub mod ops;

pub use code::Code;
pub use error::{BufferError, EncodingError, LinkError};
pub use mc::Linker;
