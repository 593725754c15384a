//! Round-trip and structural-invariant checks over the printed form.

use katara_ir::serialization::{parse_program, ParseError};
use katara_ir::{Computed, StructuralError};
use pretty_assertions::assert_eq;

const DIAMOND: &str = "\
@0 main (%0:i64) => (i64) {
{0}:
\t%1:b = lt:i64 %0, #0:i64
\tjcc %1, {1}, {2}
{1}:
\t%2:i64 = neg:i64 %0
\tjmp {3}
{2}:
\t%3:i64 = mov %0:i64
\tjmp {3}
{3}:
\t%4:i64 = phi %2:i64:{1}, %3:i64:{2}
\tret %4:i64
}
";

#[test]
fn diamond_round_trips_and_validates() {
    let program = parse_program(DIAMOND).unwrap();
    program.validate().unwrap();
    let printed = program.to_string();
    let reparsed = parse_program(&printed).unwrap();
    assert_eq!(program, reparsed);
    assert_eq!(printed, reparsed.to_string());
}

#[test]
fn diamond_dominators() {
    let program = parse_program(DIAMOND).unwrap();
    let tree = program.func(0).unwrap().compute_dominator_tree().unwrap();
    assert_eq!(tree.idom(1), Some(0));
    assert_eq!(tree.idom(2), Some(0));
    // The merge block is dominated by the entry, not by either arm.
    assert_eq!(tree.idom(3), Some(0));
}

#[test]
fn every_computed_is_defined_exactly_once() {
    let program = parse_program(DIAMOND).unwrap();
    let func = program.func(0).unwrap();
    let mut definitions: Vec<Computed> = func.args().to_vec();
    for block in func.blocks() {
        for instr in block.instrs() {
            definitions.extend(instr.defined_values());
        }
    }
    let mut nums: Vec<i64> = definitions.iter().map(Computed::num).collect();
    nums.sort_unstable();
    nums.dedup();
    assert_eq!(nums.len(), definitions.len());
}

#[test]
fn phi_outside_merge_block_is_rejected() {
    let text = "\
@0 main () => (i64) {
{0}:
\t%0:i64 = mov #1:i64
\tjmp {1}
{1}:
\t%1:i64 = phi %0:i64:{0}, %0:i64:{0}
\tret %1:i64
}
";
    let program = parse_program(text).unwrap();
    assert!(matches!(
        program.validate(),
        Err(StructuralError::PhiArgsMismatchPreds { .. } | StructuralError::MisplacedPhi(_))
    ));
}

#[test]
fn type_annotations_are_checked_during_parsing() {
    // The mov origin type disagrees with the result type.
    let text = "@0 () => () {\n{0}:\n\t%0:i64 = mov #1:i32\n\tret\n}\n";
    assert!(matches!(
        parse_program(text),
        Err(ParseError::Structural(StructuralError::TypeMismatch { .. }))
    ));
}

#[test]
fn unsigned_and_signed_literals_keep_their_width() {
    let text = "@0 () => (u8, i8) {\n{0}:\n\t%0:u8 = mov #200:u8\n\t%1:i8 = mov #-100:i8\n\tret %0:u8, %1:i8\n}\n";
    let program = parse_program(text).unwrap();
    let reparsed = parse_program(&program.to_string()).unwrap();
    assert_eq!(program, reparsed);
    assert!(program.to_string().contains("#200:u8"));
    assert!(program.to_string().contains("#-100:i8"));
}

#[test]
fn funcs_without_names_round_trip() {
    let text = "@4 (%0:b) => (b) {\n{0}:\n\t%1:b = mov %0:b\n\tret %1:b\n}\n";
    let program = parse_program(text).unwrap();
    assert_eq!(program.func(4).unwrap().name(), "");
    assert_eq!(program.entry(), None);
    let reparsed = parse_program(&program.to_string()).unwrap();
    assert_eq!(program, reparsed);
}
