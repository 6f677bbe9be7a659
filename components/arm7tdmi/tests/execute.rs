// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end instruction tests against a recording RAM bus.

mod util;

use arm7tdmi::registers::{Flag, Mode};
use util::cpu_with;

#[test]
fn movs_sets_zero_keeps_carry() {
    // movs r0, #0
    let mut cpu = cpu_with(&[(0, 0xE3B0_0000)]);
    cpu.regs.cpsr = 0x1F;
    cpu.regs.set_flag(Flag::Carry, true);
    cpu.regs.set_flag(Flag::Overflow, true);
    cpu.regs.r[0] = 1234;

    cpu.cycle();
    assert_eq!(0, cpu.regs.r[0]);
    assert!(cpu.regs.is_flag(Flag::Zero));
    assert!(!cpu.regs.is_flag(Flag::Neg));
    assert!(cpu.regs.is_flag(Flag::Carry));
    assert!(cpu.regs.is_flag(Flag::Overflow));
}

#[test]
fn adds_carry_and_overflow() {
    // adds r0, r0, r0 with r0 = 0x80000000
    let mut cpu = cpu_with(&[(0, 0xE090_0000)]);
    cpu.regs.r[0] = 0x8000_0000;

    cpu.cycle();
    assert_eq!(0, cpu.regs.r[0]);
    assert!(cpu.regs.is_flag(Flag::Zero));
    assert!(!cpu.regs.is_flag(Flag::Neg));
    assert!(cpu.regs.is_flag(Flag::Carry));
    assert!(cpu.regs.is_flag(Flag::Overflow));
}

#[test]
fn ldr_pc_relative() {
    // ldr r0, [pc, #0] at 0x100; the pipeline makes that address 0x108
    let mut cpu = cpu_with(&[(0x100, 0xE59F_0000), (0x108, 0xDEAD_BEEF)]);
    cpu.set_pc(0x100);
    cpu.bus.i_cycles = 0;

    cpu.cycle();
    assert_eq!(0xDEAD_BEEF, cpu.regs.r[0]);
    assert_eq!(1, cpu.bus.i_cycles);
}

#[test]
fn bx_switches_to_thumb() {
    // bx r0 with r0 = 0x201
    let mut cpu = cpu_with(&[(0, 0xE12F_FF10)]);
    cpu.regs.r[0] = 0x201;
    cpu.bus.code_reads.clear();

    cpu.cycle();
    assert!(cpu.regs.is_flag(Flag::Thumb));
    assert_eq!(0x204, cpu.regs.pc());
    // The refill reads halfwords from the new target, the first one
    // non-sequential
    let tail = cpu.bus.code_reads[cpu.bus.code_reads.len() - 2..].to_vec();
    assert_eq!(vec![(0x200, 2, false), (0x202, 2, true)], tail);
}

#[test]
fn swi_enters_supervisor() {
    let mut cpu = cpu_with(&[(0x1000, 0xEF00_0000)]);
    cpu.set_pc(0x1000);
    cpu.regs.cpsr = 0x10; // User, interrupts enabled

    cpu.cycle();
    assert_eq!(Mode::Supervisor, cpu.regs.mode());
    assert_eq!(0x10, cpu.regs.spsr());
    assert_eq!(0x1004, cpu.regs.r[14]);
    assert_eq!(0x8 + 8, cpu.regs.pc());
    assert!(cpu.regs.is_flag(Flag::IrqDisable));
}

#[test]
fn ldmia_writeback_and_pc() {
    // ldmia r0!, {r1, pc}
    let mut cpu = cpu_with(&[(0, 0xE8B0_8002), (0x2000, 0x11), (0x2004, 0x3000)]);
    cpu.regs.r[0] = 0x2000;

    cpu.cycle();
    assert_eq!(0x11, cpu.regs.r[1]);
    assert_eq!(0x2008, cpu.regs.r[0]);
    assert_eq!(0x3000 + 8, cpu.regs.pc());
}

#[test]
fn failed_condition_still_fetches() {
    // movseq r0, #1 with Z clear
    let mut cpu = cpu_with(&[(0, 0x03B0_0001)]);
    cpu.regs.r[0] = 7;
    let pc = cpu.regs.pc();

    cpu.cycle();
    assert_eq!(7, cpu.regs.r[0]);
    assert_eq!(pc + 4, cpu.regs.pc());
}

#[test]
fn register_shift_sees_bumped_pc() {
    // add r0, pc, pc, lsl r1 with r1 = 0: both PC reads happen after the
    // extra fetch, so they see execute address + 12
    let mut cpu = cpu_with(&[(0, 0xE08F_011F)]);
    cpu.regs.r[1] = 0;
    cpu.bus.i_cycles = 0;

    cpu.cycle();
    assert_eq!(24, cpu.regs.r[0]);
    assert_eq!(1, cpu.bus.i_cycles);
}

#[test]
fn swp_swaps_and_idles() {
    // swp r1, r2, [r0]
    let mut cpu = cpu_with(&[(0, 0xE100_1092), (0x40, 0xAABB_CCDD)]);
    cpu.regs.r[0] = 0x40;
    cpu.regs.r[2] = 0x1122_3344;
    cpu.bus.i_cycles = 0;

    cpu.cycle();
    assert_eq!(0xAABB_CCDD, cpu.regs.r[1]);
    assert_eq!(0x1122_3344, cpu.bus.word(0x40));
    assert_eq!(1, cpu.bus.i_cycles);
}

#[test]
fn mul_timing_depends_on_multiplier() {
    // mul r0, r1, r2: r2 is the multiplier
    let mut cpu = cpu_with(&[(0, 0xE000_0291)]);
    cpu.regs.r[1] = 7;
    cpu.regs.r[2] = 0xFF;
    cpu.bus.i_cycles = 0;
    cpu.cycle();
    assert_eq!(7 * 0xFF, cpu.regs.r[0]);
    assert_eq!(1, cpu.bus.i_cycles);

    let mut cpu = cpu_with(&[(0, 0xE000_0291)]);
    cpu.regs.r[1] = 7;
    cpu.regs.r[2] = 0x0012_3456;
    cpu.bus.i_cycles = 0;
    cpu.cycle();
    assert_eq!(7u32.wrapping_mul(0x0012_3456), cpu.regs.r[0]);
    assert_eq!(3, cpu.bus.i_cycles);
}

#[test]
fn umull_produces_64_bits() {
    // umull r1 (lo), r2 (hi), r3, r4
    let mut cpu = cpu_with(&[(0, 0xE082_1493)]);
    cpu.regs.r[3] = 0x8000_0001;
    cpu.regs.r[4] = 0x10;

    cpu.cycle();
    assert_eq!(0x0000_0010, cpu.regs.r[1]);
    assert_eq!(0x8, cpu.regs.r[2]);
}

#[test]
fn undefined_pattern_traps() {
    let mut cpu = cpu_with(&[(0, 0xE600_0010)]);

    cpu.cycle();
    assert_eq!(Mode::Undefined, cpu.regs.mode());
    assert_eq!(0x4, cpu.regs.r[14]);
    assert_eq!(0x4 + 8, cpu.regs.pc());
    assert!(!cpu.bus.on_fire);
}

#[test]
fn coprocessor_14_is_tolerated() {
    // mrc p14 is a quiet no-op, mrc p15 traps as undefined
    let mut cpu = cpu_with(&[(0, 0xEE10_EE10)]);
    cpu.cycle();
    assert_eq!(Mode::Supervisor, cpu.regs.mode());

    let mut cpu = cpu_with(&[(0, 0xEE10_FF10)]);
    cpu.cycle();
    assert_eq!(Mode::Undefined, cpu.regs.mode());
}

#[test]
fn irq_service_banks_and_vectors() {
    let mut cpu = cpu_with(&[]);
    cpu.set_pc(0x100);
    cpu.regs.cpsr = 0x1F; // System, IRQ enabled
    let old_cpsr = cpu.regs.cpsr;
    cpu.pending_irq = true;

    cpu.cycle();
    assert_eq!(Mode::Irq, cpu.regs.mode());
    assert_eq!(0x104, cpu.regs.r[14]);
    assert_eq!(old_cpsr, cpu.regs.spsr());
    assert_eq!(0x18 + 8, cpu.regs.pc());
    assert!(cpu.regs.is_flag(Flag::IrqDisable));
    assert!(!cpu.pending_irq);
}

#[test]
fn masked_irq_is_not_serviced() {
    let mut cpu = cpu_with(&[(0, 0xE3B0_0001)]); // movs r0, #1
    cpu.pending_irq = true; // reset state has I set

    cpu.cycle();
    assert_eq!(1, cpu.regs.r[0]);
    assert!(cpu.pending_irq);
}

#[test]
fn fiq_service_uses_its_banked_registers() {
    // movs pc, lr at the FIQ vector returns right away
    let mut cpu = cpu_with(&[(0x1C, 0xE1B0_F00E)]);
    cpu.set_pc(0x100);
    cpu.regs.cpsr = 0x1F; // System, both interrupt lines unmasked
    cpu.regs.r[8] = 0x88;
    cpu.pending_fiq = true;

    cpu.cycle();
    assert_eq!(Mode::Fiq, cpu.regs.mode());
    assert_eq!(0x104, cpu.regs.r[14]);
    assert_eq!(0x1C + 8, cpu.regs.pc());
    assert!(cpu.regs.is_flag(Flag::FiqDisable));
    // r8 comes from the FIQ bank now
    assert_eq!(0, cpu.regs.r[8]);
    cpu.regs.r[8] = 0xF8;

    // The return restores CPSR and the user-bank r8
    cpu.cycle();
    assert_eq!(Mode::System, cpu.regs.mode());
    assert_eq!(0x88, cpu.regs.r[8]);
    assert_eq!(0x104 + 8, cpu.regs.pc());
}

#[test]
fn msr_control_write_rebanks() {
    // msr cpsr_fc, r1
    let mut cpu = cpu_with(&[(0, 0xE129_F001)]);
    cpu.regs.r[1] = 0xD2; // IRQ mode, interrupts masked
    cpu.regs.r[13] = 0x5555;

    cpu.cycle();
    assert_eq!(Mode::Irq, cpu.regs.mode());
    // Supervisor sp was banked away, the IRQ bank is fresh
    assert_eq!(0, cpu.regs.r[13]);

    // And an invalid mode is fatal
    let mut cpu = cpu_with(&[(0, 0xE129_F001)]);
    cpu.regs.r[1] = 0x01;
    cpu.cycle();
    assert!(cpu.bus.on_fire);
    assert_eq!(Mode::Supervisor, cpu.regs.mode());
}

#[test]
fn stores_mark_next_fetch_nonsequential() {
    // str r0, [r1], then mov r0, r0
    let mut cpu = cpu_with(&[(0, 0xE581_0000), (4, 0xE1A0_0000)]);
    cpu.regs.r[0] = 0x1234;
    cpu.regs.r[1] = 0x80;

    cpu.cycle();
    assert_eq!(0x1234, cpu.bus.word(0x80));

    // The fetch after the store breaks the sequential stream
    cpu.bus.code_reads.clear();
    cpu.cycle();
    assert_eq!(vec![(12, 4, false)], cpu.bus.code_reads);
}

#[test]
fn str_of_pc_stores_pc_plus_12() {
    // str pc, [r1]
    let mut cpu = cpu_with(&[(0, 0xE581_F000)]);
    cpu.regs.r[1] = 0x80;

    cpu.cycle();
    // Executing at 0, so PC+12
    assert_eq!(12, cpu.bus.word(0x80));
}

#[test]
fn ldr_unaligned_rotates() {
    // ldr r0, [r1] with r1 = 0x41
    let mut cpu = cpu_with(&[(0, 0xE591_0000), (0x40, 0xAABB_CCDD)]);
    cpu.regs.r[1] = 0x41;

    cpu.cycle();
    assert_eq!(0xDDAA_BBCC, cpu.regs.r[0]);
}

#[test]
fn ldrsh_odd_address_extends_byte() {
    // ldrsh r0, [r1] with an odd address: acts like a sign-extended
    // byte load of the high byte
    let mut cpu = cpu_with(&[(0, 0xE1D1_00F0), (0x40, 0x0000_80FF)]);
    cpu.regs.r[1] = 0x41;

    cpu.cycle();
    assert_eq!(0xFFFF_FF80, cpu.regs.r[0]);
}

#[test]
fn ldm_empty_rlist_moves_base_and_loads_pc() {
    // ldmia r0!, {} loads r15 from [r0] and moves the base by 0x40
    let mut cpu = cpu_with(&[(0, 0xE8B0_0000), (0x2000, 0x500)]);
    cpu.regs.r[0] = 0x2000;

    cpu.cycle();
    assert_eq!(0x2040, cpu.regs.r[0]);
    assert_eq!(0x500 + 8, cpu.regs.pc());
}

#[test]
fn stm_user_bank_transfer() {
    // stmia r0, {r13}^ from IRQ mode stores the user-bank sp
    let mut cpu = cpu_with(&[(0, 0xE8C0_2000)]);
    cpu.regs.cpsr = 0x1F;
    cpu.regs.r[13] = 0x1111; // the System/User sp
    cpu.regs.bank_registers(Mode::Irq, true);
    cpu.regs.r[13] = 0x2222; // the IRQ sp
    cpu.regs.r[0] = 0x80;

    cpu.cycle();
    assert_eq!(0x1111, cpu.bus.word(0x80));
}

#[test]
fn data_processing_to_pc_with_s_returns() {
    // Enter IRQ mode from System, then subs pc, lr, #4
    let mut cpu = cpu_with(&[(0x100, 0xE25E_F004)]);
    cpu.regs.cpsr = 0x1F;
    cpu.regs.bank_registers(Mode::Irq, true);
    cpu.regs.r[14] = 0x204;
    cpu.set_pc(0x100);

    cpu.cycle();
    assert_eq!(Mode::System, cpu.regs.mode());
    assert_eq!(0x200 + 8, cpu.regs.pc());
}

#[test]
fn breakpoint_reported_after_instruction() {
    let mut cpu = cpu_with(&[(0, 0xE1A0_0000), (4, 0xE1A0_0000)]);
    cpu.add_breakpoint(4);

    cpu.cycle();
    assert_eq!(1, cpu.bus.breakpoint_hits);
    cpu.remove_breakpoint(4);
    cpu.cycle();
    assert_eq!(1, cpu.bus.breakpoint_hits);
}

#[test]
fn thumb_bl_pair() {
    let mut cpu = cpu_with(&[]);
    cpu.bus.set_hword(0x100, 0xF000); // bl high, offset 0
    cpu.bus.set_hword(0x102, 0xF801); // bl low, offset 1
    cpu.regs.set_flag(Flag::Thumb, true);
    cpu.set_pc(0x100);

    cpu.cycle();
    assert_eq!(0x104, cpu.regs.r[14]);
    cpu.cycle();
    assert_eq!(0x105, cpu.regs.r[14]);
    assert_eq!(0x106 + 4, cpu.regs.pc());
    assert!(cpu.regs.is_flag(Flag::Thumb));
}

#[test]
fn thumb_push_pop_round_trip() {
    let mut cpu = cpu_with(&[]);
    cpu.bus.set_hword(0x100, 0xB503); // push {r0, r1, lr}
    cpu.bus.set_hword(0x102, 0xBD03); // pop {r0, r1, pc}
    cpu.regs.set_flag(Flag::Thumb, true);
    cpu.set_pc(0x100);
    cpu.regs.r[0] = 0xAA;
    cpu.regs.r[1] = 0xBB;
    cpu.regs.r[13] = 0x1000;
    cpu.regs.r[14] = 0x500;

    cpu.cycle();
    assert_eq!(0x1000 - 12, cpu.regs.r[13]);
    cpu.regs.r[0] = 0;
    cpu.regs.r[1] = 0;

    cpu.cycle();
    assert_eq!(0xAA, cpu.regs.r[0]);
    assert_eq!(0xBB, cpu.regs.r[1]);
    assert_eq!(0x1000, cpu.regs.r[13]);
    assert_eq!(0x500 + 4, cpu.regs.pc()); // flushed to the popped pc
}

#[test]
fn thumb_ldr_pc_relative_aligns() {
    let mut cpu = cpu_with(&[(0x104, 0x1234_5678)]);
    cpu.bus.set_hword(0x100, 0x4800); // ldr r0, [pc, #0]
    cpu.regs.set_flag(Flag::Thumb, true);
    cpu.set_pc(0x100);

    cpu.cycle();
    assert_eq!(0x1234_5678, cpu.regs.r[0]);
}

#[test]
fn thumb_hi_add_to_pc_flushes() {
    let mut cpu = cpu_with(&[]);
    cpu.bus.set_hword(0x100, 0x44A7); // add pc, r4
    cpu.regs.set_flag(Flag::Thumb, true);
    cpu.set_pc(0x100);
    cpu.regs.r[4] = 0xFC;

    cpu.cycle();
    // pc (0x104) + 0xFC = 0x200, plus the refill
    assert_eq!(0x200 + 4, cpu.regs.pc());
}
