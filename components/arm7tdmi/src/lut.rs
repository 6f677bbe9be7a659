// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Decode-table generation for both instruction sets.
//!
//! Every instruction is distinguished by a compact bit-signature: for ARM
//! the concatenation of bits 27-20 and 7-4, for THUMB bits 15-6. The
//! tables map each signature to a handler specialised over the signature
//! bits that would otherwise have to be re-read on every execution.
//! Pattern/mask pairs are tested in priority order, and every signature
//! gets an entry; the final fallback is the fatal unknown-opcode stub.

use crate::{
    inst_arm::{ArmHandler, ArmLut},
    inst_thumb::{ThumbHandler, ThumbLut},
    interface::Bus,
    Cpu,
};

/// The 12-bit signature of an ARM opcode.
pub(crate) const fn arm_signature(inst: u32) -> usize {
    (((inst & 0x0FF0_0000) >> 16) | ((inst & 0x0000_00F0) >> 4)) as usize
}

/// Specialise a handler over boolean const parameters taken from
/// signature bits, first parameter first. A seed list allows fixing
/// leading parameters.
macro_rules! compose {
    ($handler:ident, $sig:ident, [$($done:literal),*]) => {
        Cpu::$handler::<$($done),*>
    };
    ($handler:ident, $sig:ident, [$($done:literal),*], $bit:literal $(, $rest:literal)*) => {
        if ($sig >> $bit) & 1 != 0 {
            compose!($handler, $sig, [$($done,)* true] $(, $rest)*)
        } else {
            compose!($handler, $sig, [$($done,)* false] $(, $rest)*)
        }
    };
}

/// Specialise data processing over its 4-bit ALU opcode.
macro_rules! alu_op {
    ($sig:ident, $imm:literal, $s:literal) => {
        match ($sig >> 5) & 0xF {
            0x0 => Cpu::arm_data_processing::<$imm, 0x0, $s>,
            0x1 => Cpu::arm_data_processing::<$imm, 0x1, $s>,
            0x2 => Cpu::arm_data_processing::<$imm, 0x2, $s>,
            0x3 => Cpu::arm_data_processing::<$imm, 0x3, $s>,
            0x4 => Cpu::arm_data_processing::<$imm, 0x4, $s>,
            0x5 => Cpu::arm_data_processing::<$imm, 0x5, $s>,
            0x6 => Cpu::arm_data_processing::<$imm, 0x6, $s>,
            0x7 => Cpu::arm_data_processing::<$imm, 0x7, $s>,
            0x8 => Cpu::arm_data_processing::<$imm, 0x8, $s>,
            0x9 => Cpu::arm_data_processing::<$imm, 0x9, $s>,
            0xA => Cpu::arm_data_processing::<$imm, 0xA, $s>,
            0xB => Cpu::arm_data_processing::<$imm, 0xB, $s>,
            0xC => Cpu::arm_data_processing::<$imm, 0xC, $s>,
            0xD => Cpu::arm_data_processing::<$imm, 0xD, $s>,
            0xE => Cpu::arm_data_processing::<$imm, 0xE, $s>,
            _ => Cpu::arm_data_processing::<$imm, 0xF, $s>,
        }
    };
}

pub const fn make_arm_lut<S: Bus>() -> ArmLut<S> {
    let mut lut: ArmLut<S> = [Cpu::arm_unknown; 4096];
    let mut sig = 0;
    while sig < 4096 {
        lut[sig] = arm_handler::<S>(sig);
        sig += 1;
    }
    lut
}

const fn arm_handler<S: Bus>(sig: usize) -> ArmHandler<S> {
    let sig = sig as u32;

    // The undefined holes come first; they shadow the patterns below
    if sig & 0xFB0 == 0x300 {
        return Cpu::arm_undefined;
    }
    if sig & 0xE01 == 0x601 {
        return Cpu::arm_undefined;
    }
    if sig & 0xFFF == 0x161 {
        return Cpu::arm_undefined;
    }
    if sig & 0xF9F == 0x105 {
        return Cpu::arm_undefined;
    }

    if sig & 0xFCF == 0x009 {
        return compose!(arm_multiply, sig, [], 5, 4);
    }
    if sig & 0xF8F == 0x089 {
        return compose!(arm_multiply_long, sig, [], 6, 5, 4);
    }
    if sig & 0xFBF == 0x100 {
        return compose!(arm_mrs, sig, [], 6);
    }
    if sig & 0xFBF == 0x120 {
        return compose!(arm_msr, sig, [false], 6);
    }
    if sig & 0xFB0 == 0x320 {
        return compose!(arm_msr, sig, [true], 6);
    }
    if sig & 0xFBF == 0x109 {
        return compose!(arm_swp, sig, [], 6);
    }
    if sig & 0xFFF == 0x121 {
        return Cpu::arm_bx;
    }
    if sig & 0xE09 == 0x009 {
        return compose!(arm_halfword_transfer, sig, [], 8, 7, 6, 5, 4);
    }
    if sig & 0xC00 == 0x000 {
        return arm_alu_handler::<S>(sig);
    }
    if sig & 0xC00 == 0x400 {
        return compose!(arm_single_transfer, sig, [], 9, 8, 7, 6, 5, 4);
    }
    if sig & 0xE00 == 0x800 {
        return compose!(arm_block_transfer, sig, [], 8, 7, 6, 5, 4);
    }
    if sig & 0xE00 == 0xA00 {
        return compose!(arm_branch, sig, [], 8);
    }
    if sig & 0xE00 == 0xC00 {
        // Coprocessor data transfers trap as undefined
        return Cpu::arm_undefined;
    }
    if sig & 0xF01 == 0xE00 {
        // As do coprocessor data operations
        return Cpu::arm_undefined;
    }
    if sig & 0xF01 == 0xE01 {
        return Cpu::arm_coprocessor;
    }
    if sig & 0xF00 == 0xF00 {
        return Cpu::arm_swi;
    }
    Cpu::arm_unknown
}

const fn arm_alu_handler<S: Bus>(sig: u32) -> ArmHandler<S> {
    match ((sig >> 9) & 1 != 0, sig & 0x10 != 0) {
        (false, false) => alu_op!(sig, false, false),
        (false, true) => alu_op!(sig, false, true),
        (true, false) => alu_op!(sig, true, false),
        (true, true) => alu_op!(sig, true, true),
    }
}

pub const fn make_thumb_lut<S: Bus>() -> ThumbLut<S> {
    let mut lut: ThumbLut<S> = [Cpu::thumb_unknown; 1024];
    let mut sig = 0;
    while sig < 1024 {
        lut[sig] = thumb_handler::<S>(sig);
        sig += 1;
    }
    lut
}

const fn thumb_handler<S: Bus>(sig: usize) -> ThumbHandler<S> {
    let sig = sig as u32;

    // Add/subtract overlaps the shift-by-immediate space and wins
    if sig & 0x3E0 == 0x060 {
        return compose!(thumb_add_sub, sig, [], 4, 3);
    }
    if sig & 0x380 == 0x000 {
        return match (sig >> 5) & 3 {
            0 => Cpu::thumb_move_shifted::<0>,
            1 => Cpu::thumb_move_shifted::<1>,
            _ => Cpu::thumb_move_shifted::<2>,
        };
    }
    if sig & 0x380 == 0x080 {
        return match (sig >> 5) & 3 {
            0 => Cpu::thumb_alu_imm::<0>,
            1 => Cpu::thumb_alu_imm::<1>,
            2 => Cpu::thumb_alu_imm::<2>,
            _ => Cpu::thumb_alu_imm::<3>,
        };
    }
    if sig & 0x3F0 == 0x100 {
        return thumb_alu_handler::<S>(sig);
    }
    if sig & 0x3F0 == 0x110 {
        return match (sig >> 2) & 3 {
            0 => Cpu::thumb_hi_add,
            1 => Cpu::thumb_hi_cmp,
            2 => Cpu::thumb_hi_mov,
            _ => Cpu::thumb_hi_bx,
        };
    }
    if sig & 0x3E0 == 0x120 {
        return Cpu::thumb_ldr_pc;
    }
    if sig & 0x3C8 == 0x140 {
        return compose!(thumb_ldrstr_reg, sig, [], 5, 4);
    }
    if sig & 0x3C8 == 0x148 {
        return match (sig >> 4) & 3 {
            0 => Cpu::thumb_ldrstr_sext::<0>,
            1 => Cpu::thumb_ldrstr_sext::<1>,
            2 => Cpu::thumb_ldrstr_sext::<2>,
            _ => Cpu::thumb_ldrstr_sext::<3>,
        };
    }
    if sig & 0x380 == 0x180 {
        return compose!(thumb_ldrstr_imm, sig, [], 6, 5);
    }
    if sig & 0x3C0 == 0x200 {
        return compose!(thumb_ldrstr_hword, sig, [], 5);
    }
    if sig & 0x3C0 == 0x240 {
        return compose!(thumb_ldrstr_sp, sig, [], 5);
    }
    if sig & 0x3C0 == 0x280 {
        return compose!(thumb_rel_addr, sig, [], 5);
    }
    if sig & 0x3FC == 0x2C0 {
        return Cpu::thumb_sp_offs;
    }
    if sig & 0x3D8 == 0x2D0 {
        return if (sig >> 5) & 1 != 0 {
            compose!(thumb_pop, sig, [], 2)
        } else {
            compose!(thumb_push, sig, [], 2)
        };
    }
    if sig & 0x3C0 == 0x300 {
        return if (sig >> 5) & 1 != 0 {
            Cpu::thumb_ldmia
        } else {
            Cpu::thumb_stmia
        };
    }
    // The two holes in the conditional-branch space: cond 0xE is
    // undefined, cond 0xF is SWI
    if sig & 0x3FC == 0x378 {
        return Cpu::thumb_undefined;
    }
    if sig & 0x3FC == 0x37C {
        return Cpu::thumb_swi;
    }
    if sig & 0x3C0 == 0x340 {
        return thumb_bcond_handler::<S>(sig);
    }
    if sig & 0x3E0 == 0x380 {
        return Cpu::thumb_br;
    }
    if sig & 0x3E0 == 0x3A0 {
        return Cpu::thumb_undefined;
    }
    if sig & 0x3C0 == 0x3C0 {
        return compose!(thumb_bl, sig, [], 5);
    }
    Cpu::thumb_unknown
}

const fn thumb_alu_handler<S: Bus>(sig: u32) -> ThumbHandler<S> {
    match sig & 0xF {
        0x0 => Cpu::thumb_alu::<0x0>,
        0x1 => Cpu::thumb_alu::<0x1>,
        0x2 => Cpu::thumb_alu::<0x2>,
        0x3 => Cpu::thumb_alu::<0x3>,
        0x4 => Cpu::thumb_alu::<0x4>,
        0x5 => Cpu::thumb_alu::<0x5>,
        0x6 => Cpu::thumb_alu::<0x6>,
        0x7 => Cpu::thumb_alu::<0x7>,
        0x8 => Cpu::thumb_alu::<0x8>,
        0x9 => Cpu::thumb_alu::<0x9>,
        0xA => Cpu::thumb_alu::<0xA>,
        0xB => Cpu::thumb_alu::<0xB>,
        0xC => Cpu::thumb_alu::<0xC>,
        0xD => Cpu::thumb_alu::<0xD>,
        0xE => Cpu::thumb_alu::<0xE>,
        _ => Cpu::thumb_alu::<0xF>,
    }
}

const fn thumb_bcond_handler<S: Bus>(sig: u32) -> ThumbHandler<S> {
    match (sig >> 2) & 0xF {
        0x0 => Cpu::thumb_bcond::<0x0>,
        0x1 => Cpu::thumb_bcond::<0x1>,
        0x2 => Cpu::thumb_bcond::<0x2>,
        0x3 => Cpu::thumb_bcond::<0x3>,
        0x4 => Cpu::thumb_bcond::<0x4>,
        0x5 => Cpu::thumb_bcond::<0x5>,
        0x6 => Cpu::thumb_bcond::<0x6>,
        0x7 => Cpu::thumb_bcond::<0x7>,
        0x8 => Cpu::thumb_bcond::<0x8>,
        0x9 => Cpu::thumb_bcond::<0x9>,
        0xA => Cpu::thumb_bcond::<0xA>,
        0xB => Cpu::thumb_bcond::<0xB>,
        0xC => Cpu::thumb_bcond::<0xC>,
        0xD => Cpu::thumb_bcond::<0xD>,
        // 0xE and 0xF are claimed by the undefined and SWI entries
        // before this function is ever reached
        0xE => Cpu::thumb_undefined,
        _ => Cpu::thumb_swi,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arm_signature_extraction() {
        // MOVS r0, #0
        assert_eq!(0b0011_1011_0000, arm_signature(0xE3B0_0000));
        // Bits outside 27-20 and 7-4 do not matter
        assert_eq!(arm_signature(0xE59F_0000), arm_signature(0x159F_FF0F));
        // BX
        assert_eq!(0x121, arm_signature(0xE12F_FF10));
        // SWP
        assert_eq!(0x109, arm_signature(0xE100_0090));
    }
}
