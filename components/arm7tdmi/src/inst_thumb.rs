// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Handlers for THUMB instructions. These lower to the same effects as
//! the ARM forms they mirror; only the encodings and a few behaviors
//! differ.

use common::numutil::NumExt;

use crate::{
    alu::{self, rotate_misaligned},
    interface::{Access, Bus},
    registers::Flag,
    Cpu,
};

pub type ThumbHandler<S> = fn(&mut Cpu<S>, ThumbInst);
pub type ThumbLut<S> = [ThumbHandler<S>; 1024];

/// A 16-bit THUMB instruction.
#[derive(Copy, Clone)]
pub struct ThumbInst(pub u16);

impl ThumbInst {
    /// The low-register number encoded starting at the given bit.
    pub fn low(self, idx: u16) -> usize {
        self.0.bits(idx, 3).us()
    }
}

impl<S: Bus> Cpu<S> {
    /// Decoder fell through; fatal, see the ARM counterpart.
    pub fn thumb_unknown(&mut self, inst: ThumbInst) {
        log::error!(
            "Unknown THUMB opcode 0x{:04X} at 0x{:07X}: no decode-table entry",
            inst.0,
            self.regs.pc().wrapping_sub(4)
        );
        self.bus.hacf();
    }

    /// The undefined-instruction holes in the THUMB map.
    pub fn thumb_undefined(&mut self, _inst: ThumbInst) {
        self.undefined_instruction();
    }

    // THUMB.1: shift by immediate
    pub fn thumb_move_shifted<const OP: u16>(&mut self, inst: ThumbInst) {
        let value = self.regs.r[inst.low(3)];
        let by = inst.0.bits(6, 5).u32();
        let carry = self.regs.is_flag(Flag::Carry);

        let (result, carry) = match OP {
            0 => alu::lsl(value, by, carry),
            1 => alu::lsr(value, by),
            _ => alu::asr(value, by),
        };
        self.regs.set_nzc::<true>(result, carry);
        self.regs.r[inst.low(0)] = result;
        self.fetch_opcode();
    }

    // THUMB.2: three-operand add/subtract
    pub fn thumb_add_sub<const IMM: bool, const SUB: bool>(&mut self, inst: ThumbInst) {
        let op1 = self.regs.r[inst.low(3)];
        let field = inst.0.bits(6, 3).u32();
        let op2 = if IMM { field } else { self.regs.r[field.us()] };

        let result = if SUB {
            self.regs.sub::<true>(op1, op2)
        } else {
            self.regs.add::<true>(op1, op2)
        };
        self.regs.r[inst.low(0)] = result;
        self.fetch_opcode();
    }

    // THUMB.3: MOV/CMP/ADD/SUB with an 8-bit immediate
    pub fn thumb_alu_imm<const OP: u16>(&mut self, inst: ThumbInst) {
        let d = inst.low(8);
        let imm = (inst.0 & 0xFF).u32();
        match OP {
            0 => {
                self.regs.set_nz::<true>(imm);
                self.regs.r[d] = imm;
            }
            1 => {
                self.regs.sub::<true>(self.regs.r[d], imm);
            }
            2 => self.regs.r[d] = self.regs.add::<true>(self.regs.r[d], imm),
            _ => self.regs.r[d] = self.regs.sub::<true>(self.regs.r[d], imm),
        }
        self.fetch_opcode();
    }

    // THUMB.4: register ALU operations
    pub fn thumb_alu<const OP: u16>(&mut self, inst: ThumbInst) {
        let d = inst.low(0);
        let op1 = self.regs.r[d];
        let op2 = self.regs.r[inst.low(3)];
        let carry = self.regs.is_flag(Flag::Carry);

        let result = match OP {
            0x0 | 0x8 => op1 & op2,
            0x1 => op1 ^ op2,
            0x2 => {
                let (res, carry) = alu::lsl(op1, op2, carry);
                self.regs.set_flag(Flag::Carry, carry);
                self.fetch_opcode();
                res
            }
            0x3 => {
                let (res, carry) = if op2 == 0 { (op1, carry) } else { alu::lsr(op1, op2) };
                self.regs.set_flag(Flag::Carry, carry);
                self.fetch_opcode();
                res
            }
            0x4 => {
                let (res, carry) = if op2 == 0 { (op1, carry) } else { alu::asr(op1, op2) };
                self.regs.set_flag(Flag::Carry, carry);
                self.fetch_opcode();
                res
            }
            0x5 => self.regs.adc::<true>(op1, op2, carry as u32),
            0x6 => self.regs.sbc::<true>(op1, op2, carry),
            0x7 => {
                let (res, carry) = if op2 == 0 { (op1, carry) } else { alu::ror(op1, op2) };
                self.regs.set_flag(Flag::Carry, carry);
                self.fetch_opcode();
                res
            }
            0x9 => self.regs.sub::<true>(0, op2),
            0xA => self.regs.sub::<true>(op1, op2),
            0xB => self.regs.add::<true>(op1, op2),
            0xC => op1 | op2,
            0xD => {
                self.fetch_opcode();
                self.bus.i_cycle(alu::mul_cycles(op1, true) - 1);
                op1.wrapping_mul(op2)
            }
            0xE => op1 & !op2,
            _ => !op2,
        };

        self.regs.set_nz::<true>(result);
        if !matches!(OP, 0x8 | 0xA | 0xB) {
            self.regs.r[d] = result;
        }
        if matches!(OP, 0x2 | 0x3 | 0x4 | 0x7 | 0xD) {
            self.bus.i_cycle(1);
        } else {
            self.fetch_opcode();
        }
    }

    // THUMB.5: operations on high registers. Only CMP sets flags.
    pub fn thumb_hi_add(&mut self, inst: ThumbInst) {
        let d = inst.low(0) | (inst.0.bit(7) << 3).us();
        let s = inst.0.bits(3, 4).us();
        let result = self.regs.r[d].wrapping_add(self.regs.r[s]);
        self.fetch_opcode();

        self.regs.r[d] = result;
        if d == 15 {
            self.flush_pipeline();
        }
    }

    pub fn thumb_hi_cmp(&mut self, inst: ThumbInst) {
        let d = inst.low(0) | (inst.0.bit(7) << 3).us();
        let s = inst.0.bits(3, 4).us();
        self.regs.sub::<true>(self.regs.r[d], self.regs.r[s]);
        self.fetch_opcode();

        if d == 15 {
            self.flush_pipeline();
        }
    }

    pub fn thumb_hi_mov(&mut self, inst: ThumbInst) {
        let d = inst.low(0) | (inst.0.bit(7) << 3).us();
        let result = self.regs.r[inst.0.bits(3, 4).us()];
        self.fetch_opcode();

        self.regs.r[d] = result;
        if d == 15 {
            self.flush_pipeline();
        }
    }

    pub fn thumb_hi_bx(&mut self, inst: ThumbInst) {
        let target = self.regs.r[inst.0.bits(3, 4).us()];
        let thumb = target.is_bit(0);
        self.fetch_opcode();

        self.regs.set_flag(Flag::Thumb, thumb);
        self.regs.r[15] = target;
        self.flush_pipeline();
    }

    // THUMB.6: PC-relative load. The PC is read aligned down to a word.
    pub fn thumb_ldr_pc(&mut self, inst: ThumbInst) {
        let d = inst.low(8);
        let addr = self.regs.pc().wrapping_add((inst.0 & 0xFF).u32() << 2) & !3;
        self.fetch_opcode();

        let read = self.bus.read::<u32, false>(addr, Access::NonSeq);
        self.regs.r[d] = rotate_misaligned(read, addr);
        self.bus.i_cycle(1);
    }

    // THUMB.7: load/store with register offset
    pub fn thumb_ldrstr_reg<const LOAD: bool, const BYTE: bool>(&mut self, inst: ThumbInst) {
        let d = inst.low(0);
        let addr = self.regs.r[inst.low(3)].wrapping_add(self.regs.r[inst.low(6)]);
        self.fetch_opcode();

        if LOAD {
            self.regs.r[d] = if BYTE {
                self.bus.read::<u8, false>(addr, Access::NonSeq).u32()
            } else {
                let read = self.bus.read::<u32, false>(addr, Access::NonSeq);
                rotate_misaligned(read, addr)
            };
            self.bus.i_cycle(1);
        } else {
            if BYTE {
                self.bus
                    .write::<u8>(addr, self.regs.r[d].u8(), Access::NonSeq);
            } else {
                self.bus.write::<u32>(addr, self.regs.r[d], Access::NonSeq);
            }
            self.next_fetch = Access::NonSeq;
        }
    }

    // THUMB.8: load/store sign-extended, plus STRH/LDRH with register
    // offset
    pub fn thumb_ldrstr_sext<const OP: u16>(&mut self, inst: ThumbInst) {
        let d = inst.low(0);
        let addr = self.regs.r[inst.low(3)].wrapping_add(self.regs.r[inst.low(6)]);
        self.fetch_opcode();

        let result = match OP {
            0 => {
                self.bus
                    .write::<u16>(addr, self.regs.r[d].u16(), Access::NonSeq);
                self.next_fetch = Access::NonSeq;
                return;
            }
            1 => self.bus.read::<u8, false>(addr, Access::NonSeq) as i8 as i32 as u32,
            2 => {
                let read = self.bus.read::<u16, false>(addr, Access::NonSeq);
                rotate_misaligned(read, addr)
            }
            _ => {
                // Odd LDRSH degrades to a sign-extended byte, like the
                // ARM-side form
                let read = self.bus.read::<u16, false>(addr, Access::NonSeq);
                let rotated = rotate_misaligned(read, addr);
                if addr.is_bit(0) {
                    ((rotated << 24) as i32 >> 24) as u32
                } else {
                    ((rotated << 16) as i32 >> 16) as u32
                }
            }
        };
        self.regs.r[d] = result;
        self.bus.i_cycle(1);
    }

    // THUMB.9: load/store with 5-bit immediate offset
    pub fn thumb_ldrstr_imm<const BYTE: bool, const LOAD: bool>(&mut self, inst: ThumbInst) {
        let d = inst.low(0);
        let offs = inst.0.bits(6, 5).u32();
        let addr = self.regs.r[inst.low(3)].wrapping_add(if BYTE { offs } else { offs << 2 });
        self.fetch_opcode();

        if LOAD {
            self.regs.r[d] = if BYTE {
                self.bus.read::<u8, false>(addr, Access::NonSeq).u32()
            } else {
                let read = self.bus.read::<u32, false>(addr, Access::NonSeq);
                rotate_misaligned(read, addr)
            };
            self.bus.i_cycle(1);
        } else {
            if BYTE {
                self.bus
                    .write::<u8>(addr, self.regs.r[d].u8(), Access::NonSeq);
            } else {
                self.bus.write::<u32>(addr, self.regs.r[d], Access::NonSeq);
            }
            self.next_fetch = Access::NonSeq;
        }
    }

    // THUMB.10: halfword load/store with immediate offset
    pub fn thumb_ldrstr_hword<const LOAD: bool>(&mut self, inst: ThumbInst) {
        let d = inst.low(0);
        let addr = self.regs.r[inst.low(3)].wrapping_add(inst.0.bits(6, 5).u32() << 1);
        self.fetch_opcode();

        if LOAD {
            let read = self.bus.read::<u16, false>(addr, Access::NonSeq);
            self.regs.r[d] = rotate_misaligned(read, addr);
            self.bus.i_cycle(1);
        } else {
            self.bus
                .write::<u16>(addr, self.regs.r[d].u16(), Access::NonSeq);
            self.next_fetch = Access::NonSeq;
        }
    }

    // THUMB.11: SP-relative load/store. Loads here skip the misalignment
    // rotation; the stack pointer is assumed word-aligned.
    pub fn thumb_ldrstr_sp<const LOAD: bool>(&mut self, inst: ThumbInst) {
        let d = inst.low(8);
        let addr = self.regs.r[13].wrapping_add((inst.0 & 0xFF).u32() << 2);
        self.fetch_opcode();

        if LOAD {
            self.regs.r[d] = self.bus.read::<u32, false>(addr, Access::NonSeq);
            self.bus.i_cycle(1);
        } else {
            self.bus.write::<u32>(addr, self.regs.r[d], Access::NonSeq);
            self.next_fetch = Access::NonSeq;
        }
    }

    // THUMB.12: form an address from SP or the word-aligned PC
    pub fn thumb_rel_addr<const SP: bool>(&mut self, inst: ThumbInst) {
        let d = inst.low(8);
        let offs = (inst.0 & 0xFF).u32() << 2;
        self.regs.r[d] = if SP {
            self.regs.r[13].wrapping_add(offs)
        } else {
            (self.regs.pc() & !3).wrapping_add(offs)
        };
        self.fetch_opcode();
    }

    // THUMB.13: adjust SP, bit 7 is the sign
    pub fn thumb_sp_offs(&mut self, inst: ThumbInst) {
        let offs = ((inst.0 & 0x7F) << 2).u32();
        if inst.0.is_bit(7) {
            self.regs.r[13] = self.regs.r[13].wrapping_sub(offs);
        } else {
            self.regs.r[13] = self.regs.r[13].wrapping_add(offs);
        }
        self.fetch_opcode();
    }

    // THUMB.14: PUSH. SP moves down before the stores.
    pub fn thumb_push<const LR: bool>(&mut self, inst: ThumbInst) {
        let empty = (inst.0 & 0xFF) == 0 && !LR;
        let mut addr = self
            .regs
            .r[13]
            .wrapping_sub(((inst.0 & 0xFF).count_ones() + LR as u32) * 4);
        if empty {
            addr = addr.wrapping_sub(0x40);
        }
        self.regs.r[13] = addr;
        self.fetch_opcode();

        if empty {
            let value = self.regs.pc().wrapping_add(2);
            self.bus.write::<u32>(addr, value, Access::NonSeq);
        } else {
            let mut access = Access::NonSeq;
            for i in 0..8 {
                if inst.0.is_bit(i) {
                    self.bus.write::<u32>(addr, self.regs.r[i.us()], access);
                    addr = addr.wrapping_add(4);
                    access = Access::Seq;
                }
            }
            if LR {
                self.bus.write::<u32>(addr, self.regs.r[14], Access::Seq);
            }
        }
        self.next_fetch = Access::NonSeq;
    }

    // THUMB.14: POP. Writeback happens up front, before the loads.
    pub fn thumb_pop<const PC: bool>(&mut self, inst: ThumbInst) {
        let empty = (inst.0 & 0xFF) == 0 && !PC;
        let mut addr = self.regs.r[13];
        let mut writeback = addr.wrapping_add((inst.0 & 0xFF).count_ones() * 4);
        if empty {
            writeback = writeback.wrapping_add(0x40);
        }
        self.regs.r[13] = writeback.wrapping_add(PC as u32 * 4);
        self.fetch_opcode();

        if empty {
            self.regs.r[15] = self.bus.read::<u32, false>(addr, Access::NonSeq);
            self.flush_pipeline();
        } else {
            let mut access = Access::NonSeq;
            for i in 0..8 {
                if inst.0.is_bit(i) {
                    self.regs.r[i.us()] = self.bus.read::<u32, false>(addr, access);
                    addr = addr.wrapping_add(4);
                    access = Access::Seq;
                }
            }
            self.bus.i_cycle(1);
            if PC {
                self.regs.r[15] = self.bus.read::<u32, false>(addr, Access::Seq);
                self.flush_pipeline();
            }
        }
    }

    // THUMB.15: STMIA. Writeback lands with the first store, so a base
    // register early in the list stores its old value.
    pub fn thumb_stmia(&mut self, inst: ThumbInst) {
        let b = inst.low(8);
        let mut addr = self.regs.r[b];
        let empty = (inst.0 & 0xFF) == 0;
        let mut writeback = addr.wrapping_add((inst.0 & 0xFF).count_ones() * 4);
        if empty {
            writeback = writeback.wrapping_add(0x40);
        }
        self.fetch_opcode();

        if empty {
            self.bus
                .write::<u32>(addr, self.regs.pc(), Access::NonSeq);
            self.regs.r[b] = writeback;
        } else {
            let mut first = true;
            for i in 0..8 {
                if inst.0.is_bit(i) {
                    self.bus.write::<u32>(
                        addr,
                        self.regs.r[i.us()],
                        if first { Access::NonSeq } else { Access::Seq },
                    );
                    addr = addr.wrapping_add(4);
                    if first {
                        self.regs.r[b] = writeback;
                        first = false;
                    }
                }
            }
        }
        self.next_fetch = Access::NonSeq;
    }

    // THUMB.15: LDMIA
    pub fn thumb_ldmia(&mut self, inst: ThumbInst) {
        let b = inst.low(8);
        let mut addr = self.regs.r[b];
        let empty = (inst.0 & 0xFF) == 0;
        let mut writeback = addr.wrapping_add((inst.0 & 0xFF).count_ones() * 4);
        if empty {
            writeback = writeback.wrapping_add(0x40);
        }
        self.fetch_opcode();

        if empty {
            self.regs.r[b] = writeback;
            self.regs.r[15] = self.bus.read::<u32, false>(addr, Access::Seq);
            self.flush_pipeline();
        } else {
            let mut first = true;
            for i in 0..8 {
                if inst.0.is_bit(i) {
                    if first {
                        self.regs.r[b] = writeback;
                    }
                    self.regs.r[i.us()] = self.bus.read::<u32, false>(
                        addr,
                        if first { Access::NonSeq } else { Access::Seq },
                    );
                    addr = addr.wrapping_add(4);
                    first = false;
                }
            }
            self.bus.i_cycle(1);
        }
    }

    // THUMB.16: conditional branch
    pub fn thumb_bcond<const COND: u16>(&mut self, inst: ThumbInst) {
        let target = self
            .regs
            .pc()
            .wrapping_add_signed((((inst.0 << 8) as i16) >> 7) as i32);
        self.fetch_opcode();

        if self.regs.eval_condition(COND) {
            self.regs.r[15] = target;
            self.flush_pipeline();
        }
    }

    // THUMB.17
    pub fn thumb_swi(&mut self, _inst: ThumbInst) {
        self.swi();
    }

    // THUMB.18: unconditional branch
    pub fn thumb_br(&mut self, inst: ThumbInst) {
        let target = self
            .regs
            .pc()
            .wrapping_add_signed((((inst.0 << 5) as i16) >> 4) as i32);
        self.fetch_opcode();

        self.regs.r[15] = target;
        self.flush_pipeline();
    }

    // THUMB.19: long branch with link, as a two-halfword pair. The high
    // part stages LR, the low part jumps and leaves the return address
    // (with bit 0 set) in LR.
    pub fn thumb_bl<const LOW: bool>(&mut self, inst: ThumbInst) {
        if LOW {
            let target = self.regs.r[14].wrapping_add(((inst.0 & 0x7FF) as u32) << 1);
            self.regs.r[14] = self.regs.pc().wrapping_sub(2) | 1;
            self.fetch_opcode();

            self.regs.r[15] = target;
            self.flush_pipeline();
        } else {
            self.regs.r[14] = self
                .regs
                .pc()
                .wrapping_add_signed((((inst.0 as u32) << 21) as i32) >> 9);
            self.fetch_opcode();
        }
    }
}
