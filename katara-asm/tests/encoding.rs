use katara_asm::instrs::{
    BinaryAL, BinaryALKind, Call, Cond, Div, Idiv, Imul, Instr, Jcc, Jmp, Mov, Mul, Pop,
    Push, Ret, Shift, ShiftAmount, ShiftKind, SignExtendRegA, SignExtendRegAD, Syscall,
    Test, UnaryAL, UnaryALKind, Xchg,
};
use katara_asm::ops::regs::*;
use katara_asm::ops::{
    imm16, imm32, imm64, imm8, BlockRef, FuncRef, Mem, OperandSize, Scale,
};
use katara_asm::{Code, EncodingError, Linker};
use proptest::prelude::*;
use rstest::rstest;

fn encode(instr: impl Into<Instr>) -> Vec<u8> {
    let mut bytes = [0u8; 16];
    let mut code = Code::new(&mut bytes, 0);
    let mut linker = Linker::new();
    let size = instr.into().encode(&mut linker, &mut code).unwrap();
    bytes[..size].to_vec()
}

#[rstest]
#[case::reg_reg_64(Mov::reg_reg(RAX, RBX).unwrap(), vec![0x48, 0x89, 0xd8])]
#[case::reg_reg_32(Mov::reg_reg(EAX, EBX).unwrap(), vec![0x89, 0xd8])]
#[case::reg_reg_16(Mov::reg_reg(AX, BX).unwrap(), vec![0x66, 0x89, 0xd8])]
#[case::reg_reg_8(Mov::reg_reg(BL, AL).unwrap(), vec![0x88, 0xc3])]
#[case::extended(Mov::reg_reg(R15, R8).unwrap(), vec![0x4d, 0x89, 0xc7])]
#[case::new8_sub_reg(Mov::reg_imm(SPL, imm8(1)).unwrap(), vec![0x40, 0xb4, 0x01])]
#[case::reg_imm8(Mov::reg_imm(AL, imm8(5)).unwrap(), vec![0xb0, 0x05])]
#[case::reg_imm8_ext(Mov::reg_imm(R8B, imm8(5)).unwrap(), vec![0x41, 0xb0, 0x05])]
#[case::reg_imm32(Mov::reg_imm(EAX, imm32(7)).unwrap(), vec![0xb8, 0x07, 0x00, 0x00, 0x00])]
#[case::r64_imm32(
    Mov::reg_imm(R12, imm32(1)).unwrap(),
    vec![0x49, 0xc7, 0xc4, 0x01, 0x00, 0x00, 0x00]
)]
#[case::r64_imm64(
    Mov::reg_imm(RAX, imm64(0x123456789abcdef0)).unwrap(),
    vec![0x48, 0xb8, 0xf0, 0xde, 0xbc, 0x9a, 0x78, 0x56, 0x34, 0x12]
)]
#[case::reg_mem(
    Mov::reg_mem(RAX, Mem::base(OperandSize::S64, RBX)).unwrap(),
    vec![0x48, 0x8b, 0x03]
)]
#[case::rsp_base(
    Mov::reg_mem(RAX, Mem::base(OperandSize::S64, RSP)).unwrap(),
    vec![0x48, 0x8b, 0x04, 0x24]
)]
#[case::rbp_base(
    Mov::reg_mem(RAX, Mem::base(OperandSize::S64, RBP)).unwrap(),
    vec![0x48, 0x8b, 0x45, 0x00]
)]
#[case::r13_base(
    Mov::reg_mem(RAX, Mem::base(OperandSize::S64, R13)).unwrap(),
    vec![0x49, 0x8b, 0x45, 0x00]
)]
#[case::base_index_scale(
    Mov::reg_mem(
        RAX,
        Mem::base_index_scale(OperandSize::S64, RBX, RCX, Scale::Eight, 0x10).unwrap()
    )
    .unwrap(),
    vec![0x48, 0x8b, 0x44, 0xcb, 0x10]
)]
#[case::disp_only(
    Mov::reg_mem(RAX, Mem::disp(OperandSize::S64, 0x1000)).unwrap(),
    vec![0x48, 0x8b, 0x04, 0x25, 0x00, 0x10, 0x00, 0x00]
)]
#[case::disp32(
    Mov::reg_mem(RAX, Mem::base_disp(OperandSize::S64, RBX, 0x200)).unwrap(),
    vec![0x48, 0x8b, 0x83, 0x00, 0x02, 0x00, 0x00]
)]
#[case::mem_reg(
    Mov::mem_reg(Mem::base_disp(OperandSize::S64, RBP, -8), RDI).unwrap(),
    vec![0x48, 0x89, 0x7d, 0xf8]
)]
#[case::mem_imm(
    Mov::mem_imm(Mem::base(OperandSize::S32, RBX), imm32(2)).unwrap(),
    vec![0xc7, 0x03, 0x02, 0x00, 0x00, 0x00]
)]
fn mov_encodings(#[case] mov: Mov, #[case] expected: Vec<u8>) {
    assert_eq!(encode(mov), expected);
}

#[rstest]
#[case::add_reg(BinaryAL::with_reg(BinaryALKind::Add, RAX, RBX).unwrap(), vec![0x48, 0x01, 0xd8])]
#[case::add_imm8(BinaryAL::with_imm(BinaryALKind::Add, RAX, imm8(4)).unwrap(), vec![0x48, 0x83, 0xc0, 0x04])]
#[case::add_rax_imm32(
    BinaryAL::with_imm(BinaryALKind::Add, RAX, imm32(0x100)).unwrap(),
    vec![0x48, 0x05, 0x00, 0x01, 0x00, 0x00]
)]
#[case::add_rcx_imm32(
    BinaryAL::with_imm(BinaryALKind::Add, RCX, imm32(0x100)).unwrap(),
    vec![0x48, 0x81, 0xc1, 0x00, 0x01, 0x00, 0x00]
)]
#[case::sub_imm8_ext(BinaryAL::with_imm(BinaryALKind::Sub, R15, imm8(1)).unwrap(), vec![0x49, 0x83, 0xef, 0x01])]
#[case::and_al_shortcut(BinaryAL::with_imm(BinaryALKind::And, AL, imm8(0x0f)).unwrap(), vec![0x24, 0x0f])]
#[case::or_reg_8(BinaryAL::with_reg(BinaryALKind::Or, BL, CL).unwrap(), vec![0x08, 0xcb])]
#[case::xor_reg(BinaryAL::with_reg(BinaryALKind::Xor, RAX, RAX).unwrap(), vec![0x48, 0x31, 0xc0])]
#[case::cmp_reg(BinaryAL::with_reg(BinaryALKind::Cmp, RAX, RBX).unwrap(), vec![0x48, 0x39, 0xd8])]
#[case::cmp_imm8(BinaryAL::with_imm(BinaryALKind::Cmp, R15, imm8(10)).unwrap(), vec![0x49, 0x83, 0xff, 0x0a])]
#[case::adc_reg(BinaryAL::with_reg(BinaryALKind::Adc, RDX, RCX).unwrap(), vec![0x48, 0x11, 0xca])]
#[case::sbb_reg(BinaryAL::with_reg(BinaryALKind::Sbb, RDX, RCX).unwrap(), vec![0x48, 0x19, 0xca])]
#[case::add_reg_mem(
    BinaryAL::reg_mem(BinaryALKind::Add, RAX, Mem::base(OperandSize::S64, RBX)).unwrap(),
    vec![0x48, 0x03, 0x03]
)]
fn binary_al_encodings(#[case] instr: BinaryAL, #[case] expected: Vec<u8>) {
    assert_eq!(encode(instr), expected);
}

#[rstest]
#[case::not_rax(UnaryAL::new(UnaryALKind::Not, RAX), vec![0x48, 0xf7, 0xd0])]
#[case::neg_rcx(UnaryAL::new(UnaryALKind::Neg, RCX), vec![0x48, 0xf7, 0xd9])]
#[case::not_byte(UnaryAL::new(UnaryALKind::Not, BL), vec![0xf6, 0xd3])]
#[case::neg_mem(
    UnaryAL::new(UnaryALKind::Neg, Mem::base(OperandSize::S64, RBX)),
    vec![0x48, 0xf7, 0x1b]
)]
fn unary_al_encodings(#[case] instr: UnaryAL, #[case] expected: Vec<u8>) {
    assert_eq!(encode(instr), expected);
}

#[rstest]
#[case::mul(Instr::from(Mul::new(RBX)), vec![0x48, 0xf7, 0xe3])]
#[case::div(Instr::from(Div::new(RBX)), vec![0x48, 0xf7, 0xf3])]
#[case::idiv(Instr::from(Idiv::new(RBX)), vec![0x48, 0xf7, 0xfb])]
#[case::imul_one_operand(Instr::from(Imul::new(RBX)), vec![0x48, 0xf7, 0xeb])]
#[case::imul_reg(Instr::from(Imul::with_reg(RAX, RBX).unwrap()), vec![0x48, 0x0f, 0xaf, 0xc3])]
#[case::imul_imm8(
    Instr::from(Imul::with_imm(RAX, RBX, imm8(16)).unwrap()),
    vec![0x48, 0x6b, 0xc3, 0x10]
)]
#[case::imul_imm32(
    Instr::from(Imul::with_imm(RAX, RBX, imm32(0x100)).unwrap()),
    vec![0x48, 0x69, 0xc3, 0x00, 0x01, 0x00, 0x00]
)]
#[case::imul_imm_one_elided(
    Instr::from(Imul::with_imm(RAX, RBX, imm32(1)).unwrap()),
    vec![0x48, 0x0f, 0xaf, 0xc3]
)]
fn mul_div_encodings(#[case] instr: Instr, #[case] expected: Vec<u8>) {
    assert_eq!(encode(instr), expected);
}

#[rstest]
#[case::shl_imm(Shift::new(ShiftKind::Shl, RAX, ShiftAmount::Imm8(4)), vec![0x48, 0xc1, 0xe0, 0x04])]
#[case::shr_imm(Shift::new(ShiftKind::Shr, RAX, ShiftAmount::Imm8(1)), vec![0x48, 0xc1, 0xe8, 0x01])]
#[case::sar_cl(Shift::new(ShiftKind::Sar, RAX, ShiftAmount::Cl), vec![0x48, 0xd3, 0xf8])]
#[case::shl_byte(Shift::new(ShiftKind::Shl, BL, ShiftAmount::Imm8(2)), vec![0xc0, 0xe3, 0x02])]
fn shift_encodings(#[case] instr: Shift, #[case] expected: Vec<u8>) {
    assert_eq!(encode(instr), expected);
}

#[rstest]
#[case::test_reg(Test::with_reg(RAX, RAX).unwrap(), vec![0x48, 0x85, 0xc0])]
#[case::test_rax_imm(
    Test::with_imm(RAX, imm32(1)).unwrap(),
    vec![0x48, 0xa9, 0x01, 0x00, 0x00, 0x00]
)]
#[case::test_rcx_imm(
    Test::with_imm(RCX, imm32(1)).unwrap(),
    vec![0x48, 0xf7, 0xc1, 0x01, 0x00, 0x00, 0x00]
)]
fn test_encodings(#[case] instr: Test, #[case] expected: Vec<u8>) {
    assert_eq!(encode(instr), expected);
}

#[rstest]
#[case::push_rbp(Instr::from(Push::reg(RBP).unwrap()), vec![0x55])]
#[case::push_r12(Instr::from(Push::reg(R12).unwrap()), vec![0x41, 0x54])]
#[case::push_imm8(Instr::from(Push::imm(imm8(3)).unwrap()), vec![0x6a, 0x03])]
#[case::push_imm32(Instr::from(Push::imm(imm32(0x100)).unwrap()), vec![0x68, 0x00, 0x01, 0x00, 0x00])]
#[case::pop_rbp(Instr::from(Pop::reg(RBP).unwrap()), vec![0x5d])]
#[case::pop_r15(Instr::from(Pop::reg(R15).unwrap()), vec![0x41, 0x5f])]
#[case::xchg_rax_rbx(Instr::from(Xchg::new(RAX, RBX).unwrap()), vec![0x48, 0x93])]
#[case::xchg_r8_rax(Instr::from(Xchg::new(R8, RAX).unwrap()), vec![0x49, 0x90])]
#[case::xchg_rcx_rdx(Instr::from(Xchg::new(RCX, RDX).unwrap()), vec![0x48, 0x87, 0xd1])]
#[case::cqo(Instr::from(SignExtendRegAD::new(OperandSize::S64).unwrap()), vec![0x48, 0x99])]
#[case::cdq(Instr::from(SignExtendRegAD::new(OperandSize::S32).unwrap()), vec![0x99])]
#[case::cwd(Instr::from(SignExtendRegAD::new(OperandSize::S16).unwrap()), vec![0x66, 0x99])]
#[case::cdqe(Instr::from(SignExtendRegA::new(OperandSize::S64).unwrap()), vec![0x48, 0x98])]
#[case::jmp_rax(Instr::from(Jmp::rm(RAX).unwrap()), vec![0xff, 0xe0])]
#[case::call_rax(Instr::from(Call::rm(RAX).unwrap()), vec![0xff, 0xd0])]
#[case::call_r12(Instr::from(Call::rm(R12).unwrap()), vec![0x41, 0xff, 0xd4])]
#[case::syscall(Instr::from(Syscall::new()), vec![0x0f, 0x05])]
#[case::ret(Instr::from(Ret::new()), vec![0xc3])]
fn misc_encodings(#[case] instr: Instr, #[case] expected: Vec<u8>) {
    assert_eq!(encode(instr), expected);
}

#[test]
fn jcc_and_jmp_register_patches() {
    let mut bytes = [0u8; 16];
    let mut code = Code::new(&mut bytes, 0x100);
    let mut linker = Linker::new();

    let jcc = Jcc::new(Cond::Above, BlockRef::new(3));
    let size = Instr::from(jcc).encode(&mut linker, &mut code).unwrap();
    assert_eq!(size, 6);
    assert_eq!(bytes[..6], [0x0f, 0x87, 0x00, 0x00, 0x00, 0x00]);

    let mut code = Code::new(&mut bytes, 0x100);
    linker.add_block_addr(3, 0x100);
    linker.apply_patches(&mut code).unwrap();
    // 0x100 - (0x102 + 4) = -6
    assert_eq!(bytes[2..6], [0xfa, 0xff, 0xff, 0xff]);
}

#[test]
fn call_func_ref_patches() {
    let mut bytes = [0u8; 16];
    let mut code = Code::new(&mut bytes, 0);
    let mut linker = Linker::new();
    let size = Instr::from(Call::func(FuncRef::new(2)))
        .encode(&mut linker, &mut code)
        .unwrap();
    assert_eq!(size, 5);
    assert_eq!(bytes[..5], [0xe8, 0x00, 0x00, 0x00, 0x00]);

    let mut code = Code::new(&mut bytes, 0);
    linker.add_func_addr(2, 0x40);
    linker.apply_patches(&mut code).unwrap();
    // 0x40 - (0x1 + 4) = 0x3b
    assert_eq!(bytes[1..5], [0x3b, 0x00, 0x00, 0x00]);
}

#[test]
fn rejected_operand_combinations() {
    assert_eq!(
        BinaryAL::with_imm(BinaryALKind::Add, RAX, imm64(1)).unwrap_err(),
        EncodingError::UnsupportedImmSize
    );
    assert_eq!(
        BinaryAL::with_imm(BinaryALKind::Add, AX, imm32(1)).unwrap_err(),
        EncodingError::UnsupportedSizeCombination
    );
    assert_eq!(
        BinaryAL::with_reg(BinaryALKind::Add, RAX, EBX).unwrap_err(),
        EncodingError::UnsupportedSizeCombination
    );
    assert_eq!(
        Mov::reg_imm(EAX, imm64(1)).unwrap_err(),
        EncodingError::UnsupportedSizeCombination
    );
    assert_eq!(
        Mov::mem_imm(Mem::base(OperandSize::S64, RAX), imm64(1)).unwrap_err(),
        EncodingError::UnsupportedImmSize
    );
    assert_eq!(
        Jmp::rm(EAX).unwrap_err(),
        EncodingError::UnsupportedOperand
    );
    assert_eq!(
        Mem::index_scale(OperandSize::S64, RSP, Scale::One, 0).unwrap_err(),
        EncodingError::IndexRegIsStackPointer
    );
}

#[test]
fn encoded_len_prices_without_emitting() {
    let instr = Instr::from(Mov::reg_imm(RAX, imm64(-1)).unwrap());
    assert_eq!(instr.encoded_len().unwrap(), 10);
    assert_eq!(Instr::from(Ret::new()).encoded_len().unwrap(), 1);
}

#[test]
fn encoding_is_deterministic() {
    let instr = Instr::from(
        Mov::reg_mem(
            R9,
            Mem::base_index_scale(OperandSize::S64, RBX, R10, Scale::Four, -3).unwrap(),
        )
        .unwrap(),
    );
    assert_eq!(encode(instr), encode(instr));
}

proptest! {
    // The chosen displacement width must reproduce the displacement:
    // the bytes after ModRM (and SIB) decode back to it.
    #[test]
    fn displacements_round_trip(disp in proptest::num::i32::ANY) {
        let mem = Mem::base_disp(OperandSize::S64, RBX, disp);
        let bytes = encode(Mov::reg_mem(RAX, mem).unwrap());
        // REX.W + 8B + ModRM, no SIB for an rbx base.
        let decoded = match mem.required_disp_size() {
            0 => 0,
            1 => bytes[3] as i8 as i32,
            _ => i32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
        };
        prop_assert_eq!(decoded, disp);
    }

    #[test]
    fn immediates_round_trip(value in proptest::num::i32::ANY) {
        let bytes = encode(Mov::reg_imm(EAX, imm32(value)).unwrap());
        prop_assert_eq!(bytes[0], 0xb8);
        prop_assert_eq!(
            i32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
            value
        );
    }

    #[test]
    fn imm16_round_trips(value in proptest::num::i16::ANY) {
        let bytes = encode(Mov::reg_imm(AX, imm16(value)).unwrap());
        prop_assert_eq!(&bytes[..2], &[0x66, 0xb8][..]);
        prop_assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), value);
    }
}

// A ten-iteration fibonacci loop, encoded, linked and executed from a
// fresh executable page. Callee-saved registers are preserved around
// the loop so the harness survives the call.
#[cfg(all(target_arch = "x86_64", unix))]
#[test]
fn fibonacci_loop_runs() {
    use katara_asm::exec::ExecutablePage;
    use katara_asm::mc::ProgBuilder;

    let mut builder = ProgBuilder::new();
    let mut main = builder.add_func("main");

    let prologue = main.add_block();
    prologue.push(Push::reg(RBP).unwrap());
    prologue.push(Mov::reg_reg(RBP, RSP).unwrap());
    prologue.push(Push::reg(R12).unwrap());
    prologue.push(Push::reg(R13).unwrap());
    prologue.push(Push::reg(R14).unwrap());
    prologue.push(Push::reg(R15).unwrap());
    prologue.push(Mov::reg_imm(R15, imm32(10)).unwrap());
    prologue.push(Mov::reg_imm(R12, imm32(1)).unwrap());
    prologue.push(Mov::reg_imm(R13, imm32(1)).unwrap());

    let body = main.add_block();
    let body_ref = body.block_ref();
    body.push(Mov::reg_reg(R14, R12).unwrap());
    body.push(BinaryAL::with_reg(BinaryALKind::Add, R14, R13).unwrap());
    body.push(Mov::reg_reg(R13, R12).unwrap());
    body.push(Mov::reg_reg(R12, R14).unwrap());
    body.push(BinaryAL::with_imm(BinaryALKind::Sub, R15, imm8(1)).unwrap());
    body.push(Jcc::new(Cond::Above, body_ref));

    let epilogue = main.add_block();
    epilogue.push(Mov::reg_reg(RAX, R12).unwrap());
    epilogue.push(Pop::reg(R15).unwrap());
    epilogue.push(Pop::reg(R14).unwrap());
    epilogue.push(Pop::reg(R13).unwrap());
    epilogue.push(Pop::reg(R12).unwrap());
    epilogue.push(Mov::reg_reg(RSP, RBP).unwrap());
    epilogue.push(Pop::reg(RBP).unwrap());
    epilogue.push(Ret::new());

    main.finish();
    let prog = builder.finish();

    let mut page = ExecutablePage::new(4096).unwrap();
    let mut linker = Linker::new();
    let mut code = page.code();
    prog.encode(&mut linker, &mut code).unwrap();
    linker.apply_patches(&mut code).unwrap();
    drop(code);
    page.finalize().unwrap();

    let entry_addr = linker.func_addr(0).unwrap();
    let entry = unsafe { page.entry(entry_addr) };
    assert_eq!(entry(), 144);
}
