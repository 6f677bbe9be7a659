// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Decoder totality: every signature of both tables must dispatch to a
//! handler that runs to completion. Signatures without a real
//! instruction raise `hacf` through the bus; nothing may panic or leave
//! CPSR holding a reserved mode.

mod util;

use arm7tdmi::registers::Flag;
use util::cpu_with;

#[test]
fn arm_decoder_is_total() {
    for sig in 0..4096u32 {
        // Rebuild a representative opcode from the signature
        let opcode = 0xE000_0000 | ((sig & 0xFF0) << 16) | ((sig & 0xF) << 4);
        let mut cpu = cpu_with(&[(0, opcode)]);
        cpu.cycle();
        // The mode invariant must hold even for garbage
        let _ = cpu.regs.mode();
    }
}

#[test]
fn thumb_decoder_is_total() {
    for sig in 0..1024u16 {
        let opcode = sig << 6;
        let mut cpu = cpu_with(&[]);
        cpu.bus.set_hword(0x100, opcode);
        cpu.bus.set_hword(0x102, opcode);
        cpu.regs.set_flag(Flag::Thumb, true);
        cpu.set_pc(0x100);
        cpu.cycle();
        let _ = cpu.regs.mode();
    }
}

#[test]
fn arm_decoder_has_no_holes_for_real_instructions() {
    // A sample of valid encodings from every instruction family; none
    // of them may fall through to the fatal unknown-opcode stub
    for opcode in [
        0xE3B0_0000u32, // movs r0, #0
        0xE090_0001,    // adds r0, r0, r1
        0xE1A0_1312,    // mov r1, r2, lsl r3
        0xE000_0291,    // mul r0, r1, r2
        0xE082_1493,    // umull r1, r2, r3, r4
        0xE100_1092,    // swp r1, r2, [r0]
        0xE10F_1000,    // mrs r1, cpsr
        0xE129_F00E,    // msr cpsr, lr
        0xE328_F20F,    // msr cpsr_f, #0xF0000000
        0xE12F_FF10,    // bx r0
        0xE1D2_10B4,    // ldrh r1, [r2, #4]
        0xE591_0000,    // ldr r0, [r1]
        0xE581_0000,    // str r0, [r1]
        0xE8B0_8002,    // ldmia r0!, {r1, pc}
        0xEA00_0000,    // b
        0xEB00_0000,    // bl
        0xEF00_0000,    // swi
    ] {
        let mut cpu = cpu_with(&[(0, opcode)]);
        // A value that is also a valid CPSR image, for the MSR sample
        cpu.regs.r[14] = 0x53;
        cpu.cycle();
        assert!(!cpu.bus.on_fire, "hacf for {opcode:08X}");
    }
}

#[test]
fn thumb_decoder_has_no_holes_for_real_instructions() {
    for opcode in [
        0x0089u16, // lsls r1, r1, #2
        0x1888,    // adds r0, r1, r2
        0x2A05,    // cmp r2, #5
        0x4048,    // eors r0, r1
        0x4448,    // add r0, r9
        0x4770,    // bx lr
        0x4800,    // ldr r0, [pc, #0]
        0x5088,    // str r0, [r1, r2]
        0x5688,    // ldrsb r0, [r1, r2]
        0x6808,    // ldr r0, [r1]
        0x8808,    // ldrh r0, [r1]
        0x9000,    // str r0, [sp]
        0xA001,    // add r0, pc, #4
        0xB082,    // sub sp, #8
        0xB501,    // push {r0, lr}
        0xBD01,    // pop {r0, pc}
        0xC102,    // stmia r1!, {r1}
        0xD001,    // beq
        0xE7FE,    // b .
        0xF000,    // bl (high)
        0xF800,    // bl (low)
        0xDF00,    // swi
    ] {
        let mut cpu = cpu_with(&[]);
        cpu.bus.set_hword(0x100, opcode);
        cpu.regs.set_flag(Flag::Thumb, true);
        cpu.set_pc(0x100);
        cpu.regs.r[13] = 0x1000;
        cpu.regs.r[14] = 0x40;
        cpu.cycle();
        assert!(!cpu.bus.on_fire, "hacf for {opcode:04X}");
    }
}
