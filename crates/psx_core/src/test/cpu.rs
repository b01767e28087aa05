use psx_util::Bit;

use super::asm::Asm;
use super::{load_program, run_code, BASE, ROM_HANDLER, SR_BEV};
use crate::cpu::{Cpu, CpuError, RegIdx as R};
use crate::bus::bios::Bios;
use crate::System;

/// Run a program with BEV set and a BREAK at the exception handler.
fn with_handler(body: impl FnOnce(&mut Asm)) -> Box<Cpu> {
    let mut asm = Asm::new(BASE);
    asm.li(R::K0, SR_BEV).mtc0(R::K0, 12);
    body(&mut asm);
    asm.brk().org(ROM_HANDLER).brk();
    run_code(&asm)
}

fn exception_code(cpu: &Cpu) -> u32 {
    cpu.cop0().cause().bit_range(2, 6)
}

#[test]
fn zero_reg() {
    let mut asm = Asm::new(BASE);
    asm.addiu(R::ZERO, R::ZERO, 1)
        .ori(R::ZERO, R::ZERO, 0xff)
        .lw(R::ZERO, 0, R::ZERO)
        .nop()
        .brk();
    let cpu = run_code(&asm);
    assert_eq!(cpu.read_reg(R::ZERO), 0);
}

#[test]
fn load_delay() {
    let mut asm = Asm::new(BASE);
    asm.li(R::V0, 42)
        .li(R::S1, 43)
        .sw(R::V0, 0, R::ZERO)
        .lw(R::S1, 0, R::ZERO)
        .addu(R::T0, R::S1, R::ZERO)
        .addu(R::T1, R::S1, R::ZERO)
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::T0), 43);
    assert_eq!(cpu.read_reg(R::T1), 42);
    assert_eq!(cpu.read_reg(R::S1), 42);
}

#[test]
fn write_in_load_delay_wins() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 5)
        .sw(R::T0, 0, R::ZERO)
        .lw(R::T1, 0, R::ZERO)
        .addiu(R::T1, R::ZERO, 7)
        .nop()
        .brk();
    let cpu = run_code(&asm);
    assert_eq!(cpu.read_reg(R::T1), 7);
}

#[test]
fn branch_delay() {
    let mut asm = Asm::new(BASE);
    asm.li(R::V0, 0)
        .j("l1")
        .addiu(R::V0, R::V0, 1)
        .addiu(R::V0, R::V0, 10)
        .label("l1")
        .brk();
    let cpu = run_code(&asm);
    assert_eq!(cpu.read_reg(R::V0), 1);
}

#[test]
fn simple_loop() {
    let mut asm = Asm::new(BASE);
    asm.li(R::V0, 1)
        .label("l2")
        .sll(R::V0, R::V0, 1)
        .slti(R::V1, R::V0, 1024)
        .bne(R::V1, R::ZERO, "l2")
        .nop()
        .brk();
    let cpu = run_code(&asm);
    assert_eq!(cpu.read_reg(R::V0), 1024);
}

#[test]
fn branch_conditions() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0)
        .li(R::T1, 0xffff_ffff)
        .blez(R::T0, "a")
        .nop()
        .addiu(R::V0, R::V0, 1)
        .label("a")
        .bgtz(R::T0, "b")
        .nop()
        .addiu(R::V1, R::V1, 1)
        .label("b")
        .bltz(R::T1, "c")
        .nop()
        .addiu(R::V0, R::V0, 1)
        .label("c")
        .bgez(R::T1, "d")
        .nop()
        .addiu(R::V1, R::V1, 1)
        .label("d")
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::V0), 0);
    assert_eq!(cpu.read_reg(R::V1), 2);
}

#[test]
fn bgezal_links_when_not_taken() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0xffff_ffff);
    let at = asm.addr();
    asm.bgezal(R::T0, "skip")
        .nop()
        .addiu(R::V0, R::ZERO, 1)
        .label("skip")
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::V0), 1);
    assert_eq!(cpu.read_reg(R::RA), at + 8);
}

#[test]
fn bltzal_taken() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0xffff_ffff);
    let at = asm.addr();
    asm.bltzal(R::T0, "skip")
        .nop()
        .addiu(R::V0, R::ZERO, 1)
        .label("skip")
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::V0), 0);
    assert_eq!(cpu.read_reg(R::RA), at + 8);
}

#[test]
fn jal_and_jr() {
    let mut asm = Asm::new(BASE);
    asm.jal("func")
        .nop()
        .addiu(R::V1, R::V0, 0)
        .brk()
        .label("func")
        .addiu(R::V0, R::ZERO, 42)
        .jr(R::RA)
        .nop();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::RA), BASE + 8);
    assert_eq!(cpu.read_reg(R::V1), 42);
}

#[test]
fn jalr() {
    let mut asm = Asm::new(BASE);
    // The function is at instruction 8.
    asm.li(R::T0, BASE + 8 * 4);
    let at = asm.addr();
    asm.jalr(R::S0, R::T0)
        .nop()
        .addiu(R::V1, R::V0, 0)
        .brk()
        .org(BASE + 8 * 4)
        .addiu(R::V0, R::ZERO, 7)
        .jr(R::S0)
        .nop();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::S0), at + 8);
    assert_eq!(cpu.read_reg(R::V1), 7);
}

#[test]
fn sign_extension() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T3, 0x8080)
        .sw(R::T3, 0, R::ZERO)
        .lh(R::T4, 0, R::ZERO)
        .lhu(R::T5, 0, R::ZERO)
        .lb(R::T6, 0, R::ZERO)
        .lbu(R::T7, 0, R::ZERO)
        .nop()
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::T4), 0xffff_8080);
    assert_eq!(cpu.read_reg(R::T5), 0x0000_8080);
    assert_eq!(cpu.read_reg(R::T6), 0xffff_ff80);
    assert_eq!(cpu.read_reg(R::T7), 0x0000_0080);
}

#[test]
fn byte_and_halfword_stores() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0x1234_5678)
        .sw(R::ZERO, 0x10, R::ZERO)
        .sb(R::T0, 0x11, R::ZERO)
        .sh(R::T0, 0x12, R::ZERO)
        .lw(R::T1, 0x10, R::ZERO)
        .nop()
        .brk();
    let cpu = run_code(&asm);
    assert_eq!(cpu.read_reg(R::T1), 0x5678_7800);
}

#[test]
fn shifts_and_logic() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0x8000_0010)
        .sra(R::T1, R::T0, 4)
        .srl(R::T2, R::T0, 4)
        .li(R::T3, 36)
        .sllv(R::T4, R::T0, R::T3)
        .srav(R::T5, R::T0, R::T3)
        .nor(R::T6, R::ZERO, R::ZERO)
        .andi(R::T7, R::T0, 0xff)
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::T1), 0xf800_0001);
    assert_eq!(cpu.read_reg(R::T2), 0x0800_0001);
    assert_eq!(cpu.read_reg(R::T4), 0x0000_0100);
    assert_eq!(cpu.read_reg(R::T5), 0xf800_0001);
    assert_eq!(cpu.read_reg(R::T6), 0xffff_ffff);
    assert_eq!(cpu.read_reg(R::T7), 0x10);
}

#[test]
fn set_less_than() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0xffff_ffff)
        .li(R::T1, 1)
        .slt(R::T2, R::T0, R::T1)
        .sltu(R::T3, R::T0, R::T1)
        .slti(R::T4, R::T0, 0)
        .sltiu(R::T5, R::T1, -1)
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::T2), 1);
    assert_eq!(cpu.read_reg(R::T3), 0);
    assert_eq!(cpu.read_reg(R::T4), 1);
    assert_eq!(cpu.read_reg(R::T5), 1);
}

#[test]
fn wrapping_arithmetic() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0x7fff_ffff)
        .li(R::T1, 1)
        .addu(R::T2, R::T0, R::T1)
        .addiu(R::T3, R::T0, 1)
        .subu(R::T4, R::ZERO, R::T1)
        .sub(R::T5, R::T0, R::T1)
        .addi(R::T6, R::T1, -2)
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::T2), 0x8000_0000);
    assert_eq!(cpu.read_reg(R::T3), 0x8000_0000);
    assert_eq!(cpu.read_reg(R::T4), 0xffff_ffff);
    assert_eq!(cpu.read_reg(R::T5), 0x7fff_fffe);
    assert_eq!(cpu.read_reg(R::T6), 0xffff_ffff);
}

#[test]
fn add_overflow_traps() {
    let mut at = 0;
    let cpu = with_handler(|asm| {
        asm.li(R::T0, 0x7fff_ffff).li(R::T1, 1).li(R::T2, 0x1234);
        at = asm.addr();
        asm.add(R::T2, R::T0, R::T1);
    });

    assert_eq!(cpu.pc(), ROM_HANDLER);
    assert_eq!(exception_code(&cpu), 0xc);
    assert_eq!(cpu.cop0().epc(), at);
    assert_eq!(cpu.read_reg(R::T2), 0x1234);
}

#[test]
fn sub_and_addi_overflow_trap() {
    let cpu = with_handler(|asm| {
        asm.li(R::T0, 0x8000_0000).li(R::T1, 1).sub(R::T2, R::T0, R::T1);
    });
    assert_eq!(exception_code(&cpu), 0xc);
    assert_eq!(cpu.read_reg(R::T2), 0);

    let cpu = with_handler(|asm| {
        asm.li(R::T0, 0x8000_0000).addi(R::T2, R::T0, -1);
    });
    assert_eq!(exception_code(&cpu), 0xc);
    assert_eq!(cpu.read_reg(R::T2), 0);
}

#[test]
fn unaligned_load() {
    let mut at = 0;
    let cpu = with_handler(|asm| {
        asm.li(R::T0, 0x8000_0001);
        at = asm.addr();
        asm.lw(R::T1, 0, R::T0);
    });

    assert_eq!(cpu.pc(), ROM_HANDLER);
    assert_eq!(exception_code(&cpu), 0x4);
    assert_eq!(cpu.cop0().bad_vaddr(), 0x8000_0001);
    assert_eq!(cpu.cop0().epc(), at);
    assert!(!cpu.cop0().cause().bit(31));
    assert_eq!(cpu.read_reg(R::T1), 0);
}

#[test]
fn unaligned_store_in_delay_slot() {
    let mut at = 0;
    let cpu = with_handler(|asm| {
        asm.li(R::T0, 2);
        at = asm.addr();
        asm.beq(R::ZERO, R::ZERO, "skip")
            .sw(R::T1, 0, R::T0)
            .label("skip");
    });

    assert_eq!(exception_code(&cpu), 0x5);
    assert_eq!(cpu.cop0().bad_vaddr(), 2);
    assert_eq!(cpu.cop0().epc(), at);
    assert!(cpu.cop0().cause().bit(31));
}

#[test]
fn unaligned_halfword_store() {
    let cpu = with_handler(|asm| {
        asm.sh(R::ZERO, 0x11, R::ZERO);
    });
    assert_eq!(exception_code(&cpu), 0x5);
    assert_eq!(cpu.cop0().bad_vaddr(), 0x11);
}

#[test]
fn misaligned_jump_target() {
    let cpu = with_handler(|asm| {
        asm.li(R::T0, BASE + 0x102).jr(R::T0).nop();
    });

    assert_eq!(cpu.pc(), ROM_HANDLER);
    assert_eq!(exception_code(&cpu), 0x4);
    assert_eq!(cpu.cop0().bad_vaddr(), BASE + 0x102);
    assert_eq!(cpu.cop0().epc(), BASE + 0x102);
}

#[test]
fn division() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 7).div(R::T0, R::ZERO).mfhi(R::S0).mflo(R::S1)
        .li(R::T0, (-7_i32) as u32).div(R::T0, R::ZERO).mfhi(R::S2).mflo(R::S3)
        .li(R::T0, 0x8000_0000).li(R::T1, 0xffff_ffff).div(R::T0, R::T1).mfhi(R::S4).mflo(R::S5)
        .li(R::T0, 7).divu(R::T0, R::ZERO).mfhi(R::S6).mflo(R::S7)
        .li(R::T0, (-7_i32) as u32).li(R::T1, 2).div(R::T0, R::T1).mfhi(R::T8).mflo(R::T9)
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::S0), 7);
    assert_eq!(cpu.read_reg(R::S1), 0xffff_ffff);
    assert_eq!(cpu.read_reg(R::S2), (-7_i32) as u32);
    assert_eq!(cpu.read_reg(R::S3), 1);
    assert_eq!(cpu.read_reg(R::S4), 0);
    assert_eq!(cpu.read_reg(R::S5), 0x8000_0000);
    assert_eq!(cpu.read_reg(R::S6), 7);
    assert_eq!(cpu.read_reg(R::S7), 0xffff_ffff);
    assert_eq!(cpu.read_reg(R::T8), (-1_i32) as u32);
    assert_eq!(cpu.read_reg(R::T9), (-3_i32) as u32);
}

#[test]
fn multiplication() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, (-3_i32) as u32).li(R::T1, 4).mult(R::T0, R::T1).mfhi(R::S0).mflo(R::S1)
        .li(R::T0, 0x8000_0000).multu(R::T0, R::T1).mfhi(R::S2).mflo(R::S3)
        .mthi(R::T1).mfhi(R::S4)
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::S0), 0xffff_ffff);
    assert_eq!(cpu.read_reg(R::S1), 0xffff_fff4);
    assert_eq!(cpu.read_reg(R::S2), 2);
    assert_eq!(cpu.read_reg(R::S3), 0);
    assert_eq!(cpu.read_reg(R::S4), 4);
    assert_eq!(cpu.hi(), 4);
    assert_eq!(cpu.lo(), 0);
}

#[test]
fn syscall_enters_handler() {
    let mut at = 0;
    let cpu = with_handler(|asm| {
        asm.li(R::T0, SR_BEV | 0b01).mtc0(R::T0, 12);
        at = asm.addr();
        asm.syscall();
    });

    assert_eq!(cpu.pc(), ROM_HANDLER);
    assert_eq!(exception_code(&cpu), 0x8);
    assert_eq!(cpu.cop0().epc(), at);
    assert_eq!(cpu.cop0().sr() & 0x3f, 0b00_0100);
}

#[test]
fn rfe_restores_mode() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, SR_BEV | 0b01)
        .mtc0(R::T0, 12)
        .syscall()
        .brk()
        .org(ROM_HANDLER)
        .rfe()
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.pc(), ROM_HANDLER + 4);
    assert_eq!(cpu.cop0().sr(), SR_BEV | 0b01);
}

#[test]
fn lwl_lwr_merge() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0x4433_2211)
        .sw(R::T0, 0, R::ZERO)
        .li(R::T0, 0x8877_6655)
        .sw(R::T0, 4, R::ZERO)
        .li(R::T1, 0xdead_beef)
        // Unaligned load at 1, back to back.
        .lwr(R::T1, 1, R::ZERO)
        .lwl(R::T1, 4, R::ZERO)
        .li(R::T2, 0xaabb_ccdd)
        .lwl(R::T2, 1, R::ZERO)
        .nop()
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::T1), 0x5544_3322);
    assert_eq!(cpu.read_reg(R::T2), 0x2211_ccdd);
}

#[test]
fn swl_swr() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0xaabb_ccdd)
        .sw(R::ZERO, 0, R::ZERO)
        .sw(R::ZERO, 4, R::ZERO)
        .swr(R::T0, 1, R::ZERO)
        .swl(R::T0, 4, R::ZERO)
        .lw(R::T1, 0, R::ZERO)
        .lw(R::T2, 4, R::ZERO)
        .nop()
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::T1), 0xbbcc_dd00);
    assert_eq!(cpu.read_reg(R::T2), 0x0000_00aa);
}

#[test]
fn swr_merges_into_device_register() {
    let mut asm = Asm::new(BASE);
    asm.li(R::S0, 0x1f80_10a0)
        .li(R::T0, 0x0012_3456)
        .sw(R::T0, 0, R::S0)
        .li(R::T1, 0xab)
        .swr(R::T1, 2, R::S0)
        .lw(R::T2, 0, R::S0)
        .nop()
        .brk();
    let cpu = run_code(&asm);
    assert_eq!(cpu.read_reg(R::T2), 0x00ab_3456);
}

#[test]
fn cache_isolated_drops_stores() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 1 << 16)
        .mtc0(R::T0, 12)
        .li(R::T1, 5)
        .sw(R::T1, 0x100, R::ZERO)
        .sb(R::T1, 0x104, R::ZERO)
        .swl(R::T1, 0x108, R::ZERO)
        .mtc0(R::ZERO, 12)
        .lw(R::T2, 0x100, R::ZERO)
        .lbu(R::T3, 0x104, R::ZERO)
        .lw(R::T4, 0x108, R::ZERO)
        .nop()
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::T2), 0xcaca_caca);
    assert_eq!(cpu.read_reg(R::T3), 0xca);
    assert_eq!(cpu.read_reg(R::T4), 0xcaca_caca);
}

#[test]
fn mfc0_through_load_delay() {
    let mut asm = Asm::new(BASE);
    asm.mfc0(R::T0, 15)
        .addu(R::T1, R::T0, R::ZERO)
        .nop()
        .brk();
    let cpu = run_code(&asm);

    assert_eq!(cpu.read_reg(R::T0), 2);
    assert_eq!(cpu.read_reg(R::T1), 0);
}

#[test]
fn cop0_register_access_faults() {
    let cpu = with_handler(|asm| {
        asm.mtc0(R::ZERO, 7).li(R::T0, 1).mtc0(R::T0, 7);
    });
    assert_eq!(exception_code(&cpu), 0xa);

    let cpu = with_handler(|asm| {
        asm.mfc0(R::T0, 0);
    });
    assert_eq!(exception_code(&cpu), 0xa);
}

#[test]
fn mtc0_cause_only_software_bits() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0xffff_ffff)
        .mtc0(R::T0, 13)
        .mfc0(R::T1, 13)
        .nop()
        .brk();
    let cpu = run_code(&asm);
    assert_eq!(cpu.read_reg(R::T1), 0x300);
}

#[test]
fn exception_clears_cause() {
    let cpu = with_handler(|asm| {
        asm.li(R::T0, 0x300).mtc0(R::T0, 13).nop().syscall();
    });

    assert_eq!(cpu.pc(), ROM_HANDLER);
    assert_eq!(cpu.cop0().cause(), 0x8 << 2);
}

#[test]
fn coprocessor_unusable() {
    let cpu = with_handler(|asm| {
        // COP1.
        asm.word(0x4400_0000);
    });
    assert_eq!(exception_code(&cpu), 0xb);

    let cpu = with_handler(|asm| {
        // LWC3 $zero, 0($zero).
        asm.word(0xcc00_0000);
    });
    assert_eq!(exception_code(&cpu), 0xb);
}

#[test]
fn illegal_instruction() {
    let cpu = with_handler(|asm| {
        asm.word(0xfc00_0000);
    });
    assert_eq!(exception_code(&cpu), 0xa);

    let cpu = with_handler(|asm| {
        // Unused special function.
        asm.word(0x0000_0001);
    });
    assert_eq!(exception_code(&cpu), 0xa);
}

#[test]
fn gte_is_host_fault() {
    let mut asm = Asm::new(BASE);
    asm.nop().word(0x4800_0000).brk();
    let mut cpu = load_program(&asm);

    assert!(cpu.step().is_ok());
    assert!(matches!(
        cpu.step(),
        Err(CpuError::UnimplementedGte { pc, opcode: 0x4800_0000 }) if pc == BASE + 4
    ));
}

#[test]
fn unmapped_fetch_is_host_fault() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 0x1f90_0000).jr(R::T0).nop().brk();
    let mut cpu = load_program(&asm);

    for _ in 0..4 {
        assert!(cpu.step().is_ok());
    }
    assert!(matches!(cpu.curr_ins(), Err(CpuError::Bus { .. })));
    assert!(matches!(cpu.step(), Err(CpuError::Bus { pc: 0x1f90_0000, .. })));
}

#[test]
fn system_runs_steps() {
    let mut asm = Asm::new(BASE);
    asm.li(R::T0, 5).addiu(R::T0, R::T0, 1).brk();

    let bios = Bios::from_code(BASE & 0x1fff_ffff, &asm.assemble());
    let mut system = System::new(bios);

    system.run(2).unwrap();
    assert_eq!(system.cpu().read_reg(R::T0), 5);
    assert_eq!(system.cpu().pc(), BASE + 8);

    system.run(1).unwrap();
    assert_eq!(system.cpu().read_reg(R::T0), 6);
}
