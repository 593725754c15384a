//! End-to-end pass coherence: parse a program, validate it, and run
//! dominators, liveness, interference and allocation over every func.

use std::collections::BTreeSet;

use katara_analysis::{
    build_func_call_graph, remove_unused_funcs, Assignment, InterferenceGraph,
    LiveRangeAnalyzer, RegisterAllocator,
};
use katara_ir::serialization::parse_program;
use katara_ir::Instr;
use pretty_assertions::assert_eq;

const PROGRAM: &str = "\
@0 main () => (i64) {
{0}:
\t%0:i64 = mov #0:i64
\t%1:i64 = mov #0:i64
\tjmp {1}
{1}:
\t%2:i64 = phi %0:i64:{0}, %4:i64:{2}
\t%3:i64 = phi %1:i64:{0}, %5:i64:{2}
\t%6:b = lt:i64 %3, #10
\tjcc %6, {2}, {3}
{2}:
\t%4:i64 = add:i64 %2, %3
\t%5:i64 = add:i64 %3, #1:i64
\tjmp {1}
{3}:
\t%7:i64 = call @1, %2:i64
\tret %7:i64
}

@1 identity (%0:i64) => (i64) {
{0}:
\t%1:i64 = mov %0:i64
\tret %1:i64
}

@2 unused () => () {
{0}:
\tret
}
";

#[test]
fn printed_form_round_trips() {
    let program = parse_program(PROGRAM).unwrap();
    program.validate().unwrap();
    let reparsed = parse_program(&program.to_string()).unwrap();
    assert_eq!(program, reparsed);
}

#[test]
fn dominators_of_the_loop() {
    let program = parse_program(PROGRAM).unwrap();
    let tree = program.func(0).unwrap().compute_dominator_tree().unwrap();
    assert_eq!(tree.idom(1), Some(0));
    assert_eq!(tree.idom(2), Some(1));
    assert_eq!(tree.idom(3), Some(1));
    assert!(tree.dominates(0, 3));
    assert!(!tree.dominates(2, 3));
}

#[test]
fn liveness_feeds_a_consistent_interference_graph() {
    let program = parse_program(PROGRAM).unwrap();
    let func = program.func(0).unwrap();
    let info = LiveRangeAnalyzer::new(func).analyze();
    let graph = InterferenceGraph::from_live_ranges(&info);

    // Soundness: every use site sees its value in the live set, and
    // every simultaneously-live pair has an edge.
    for block in func.blocks() {
        let block_info = info.block(block.num()).unwrap();
        for (index, instr) in block.instrs().iter().enumerate() {
            if matches!(instr, Instr::Phi(_)) {
                continue;
            }
            for used in instr.used_values() {
                if let Some(value) = used.computed() {
                    assert!(block_info.live_set(index as i64).contains(&value));
                }
            }
            let live = block_info.live_set(index as i64);
            for &a in &live {
                for &b in &live {
                    if a != b {
                        assert!(graph.interferes(a, b));
                    }
                }
            }
        }
    }

    // The two phi results carry the loop state together.
    let phi_sum = katara_ir::Computed::new(katara_ir::Type::I64, 2);
    let phi_counter = katara_ir::Computed::new(katara_ir::Type::I64, 3);
    assert!(graph.interferes(phi_sum, phi_counter));
}

#[test]
fn allocation_is_conflict_free() {
    let program = parse_program(PROGRAM).unwrap();
    let func = program.func(0).unwrap();
    let info = LiveRangeAnalyzer::new(func).analyze();
    let graph = InterferenceGraph::from_live_ranges(&info);
    let assignments = RegisterAllocator::new(func, &graph)
        .without_coalescing()
        .allocate()
        .unwrap();

    for a in graph.nodes() {
        for &b in graph.neighbors(a).unwrap() {
            if let (Assignment::Register(ra), Assignment::Register(rb)) =
                (assignments[&a], assignments[&b])
            {
                assert_ne!(ra, rb, "{a} and {b} share r{ra}");
            }
        }
    }
}

#[test]
fn call_graph_prunes_unused_funcs() {
    let mut program = parse_program(PROGRAM).unwrap();
    let graph = build_func_call_graph(&program);
    assert_eq!(graph.callees_of(0), BTreeSet::from([1]));

    remove_unused_funcs(&mut program).unwrap();
    assert_eq!(program.func_nums().collect::<Vec<_>>(), vec![0, 1]);
    program.validate().unwrap();
}
