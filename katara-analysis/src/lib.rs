//! IR-level analyses and transforms of the Katara compiler.
//!
//! The passes here are pure over their [`katara_ir`] inputs: live-range
//! analysis produces per-block value ranges, the interference graph and
//! register allocator turn those into physical-register assignments, and
//! the function call graph drives dead-function elimination.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod call_graph;
pub mod interference;
pub mod live_ranges;
pub mod regalloc;

pub use call_graph::{
    build_func_call_graph, remove_unused_funcs, Component, FuncCall, FuncCallGraph,
};
pub use interference::InterferenceGraph;
pub use live_ranges::{BlockLiveRangeInfo, FuncLiveRangeInfo, LiveRangeAnalyzer, ValueRange};
pub use regalloc::{AllocError, Assignment, RegisterAllocator};
