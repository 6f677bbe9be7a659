// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Handlers for ARM instructions.
//!
//! Each handler interleaves its bus traffic with the pipeline fetch the
//! way the hardware does: most fetch after reading their operands, but
//! register-shifted data processing fetches first, which is why r15 reads
//! inside such an operand see the bumped PC.

use common::numutil::{NumExt, U32Ext};

use crate::{
    alu::{self, rotate_misaligned},
    interface::{Access, Bus},
    registers::{Flag, Mode},
    Cpu,
};

pub type ArmHandler<S> = fn(&mut Cpu<S>, ArmInst);
pub type ArmLut<S> = [ArmHandler<S>; 4096];

/// A 32-bit ARM instruction word.
#[derive(Copy, Clone)]
pub struct ArmInst(pub u32);

impl ArmInst {
    /// The register number encoded starting at the given bit.
    pub fn reg(self, idx: u32) -> usize {
        self.0.bits(idx, 4).us()
    }
}

impl<S: Bus> Cpu<S> {
    /// Decoder fell through: this bit pattern has no handler at all.
    /// That is a bug in the decode tables, not in the program under
    /// emulation, so it is fatal.
    pub fn arm_unknown(&mut self, inst: ArmInst) {
        self.arm_fault(inst.0, "no decode-table entry");
    }

    pub(crate) fn arm_fault(&mut self, opcode: u32, why: &str) {
        log::error!(
            "Unknown ARM opcode 0x{opcode:08X} at 0x{:07X}: {why}",
            self.regs.pc().wrapping_sub(8)
        );
        self.bus.hacf();
    }

    /// B/BL.
    pub fn arm_branch<const LINK: bool>(&mut self, inst: ArmInst) {
        let target = self.regs.pc().wrapping_add_signed(inst.0.i24() << 2);
        self.fetch_opcode();

        if LINK {
            self.regs.r[14] = self.regs.pc().wrapping_sub(8);
        }
        self.regs.r[15] = target;
        self.flush_pipeline();
    }

    /// BX. Bit 0 of the operand selects the Thumb state.
    pub fn arm_bx(&mut self, inst: ArmInst) {
        let rm = self.regs.r[inst.reg(0)];
        let thumb = rm.is_bit(0);
        let target = rm & if thumb { !1 } else { !3 };
        self.fetch_opcode();

        self.regs.set_flag(Flag::Thumb, thumb);
        self.regs.r[15] = target;
        self.flush_pipeline();
    }

    pub fn arm_swi(&mut self, _inst: ArmInst) {
        self.swi();
    }

    /// The undefined-instruction trap, also the target of the coprocessor
    /// data patterns.
    pub fn arm_undefined(&mut self, _inst: ArmInst) {
        self.undefined_instruction();
    }

    /// Data processing. `OP` is the 4-bit ALU opcode, `IMM` bit 25,
    /// `SET` the S bit.
    pub fn arm_data_processing<const IMM: bool, const OP: u16, const SET: bool>(
        &mut self,
        inst: ArmInst,
    ) {
        // A register-specified shift amount costs a fetch up front, so
        // operands read below already see the advanced PC.
        let shift_reg = !IMM && inst.0.is_bit(4);
        if shift_reg {
            self.fetch_opcode();
        }

        let (op2, shift_carry) = self.regs.shifted_operand::<false, IMM>(inst.0);
        let op1 = self.regs.r[inst.reg(16)];
        let d = inst.reg(12);
        let carry = self.regs.is_flag(Flag::Carry);

        let result = match OP {
            0x0 | 0x8 => {
                let res = op1 & op2;
                self.regs.set_nzc::<SET>(res, shift_carry);
                res
            }
            0x1 | 0x9 => {
                let res = op1 ^ op2;
                self.regs.set_nzc::<SET>(res, shift_carry);
                res
            }
            0x2 | 0xA => self.regs.sub::<SET>(op1, op2),
            0x3 => self.regs.sub::<SET>(op2, op1),
            0x4 | 0xB => self.regs.add::<SET>(op1, op2),
            0x5 => self.regs.adc::<SET>(op1, op2, carry as u32),
            0x6 => self.regs.sbc::<SET>(op1, op2, carry),
            0x7 => self.regs.sbc::<SET>(op2, op1, carry),
            0xC => {
                let res = op1 | op2;
                self.regs.set_nzc::<SET>(res, shift_carry);
                res
            }
            0xD => {
                self.regs.set_nzc::<SET>(op2, shift_carry);
                op2
            }
            0xE => {
                let res = op1 & !op2;
                self.regs.set_nzc::<SET>(res, shift_carry);
                res
            }
            _ => {
                let res = !op2;
                self.regs.set_nzc::<SET>(res, shift_carry);
                res
            }
        };

        if shift_reg {
            self.bus.i_cycle(1);
        } else {
            self.fetch_opcode();
        }

        if !(0x8..=0xB).contains(&OP) {
            self.regs.r[d] = result;
            if d == 15 {
                if SET {
                    self.leave_mode();
                }
                self.flush_pipeline();
            }
        } else if SET && d == 15 {
            self.leave_mode();
        }
    }

    /// MUL/MLA.
    pub fn arm_multiply<const ACC: bool, const SET: bool>(&mut self, inst: ArmInst) {
        let d = inst.reg(16);
        let mult = self.regs.r[inst.reg(8)];
        self.fetch_opcode();

        let mut result = mult.wrapping_mul(self.regs.r[inst.reg(0)]);
        if ACC {
            result = result.wrapping_add(self.regs.r[inst.reg(12)]);
            self.bus.i_cycle(1);
        }
        if d != 15 {
            self.regs.r[d] = result;
        }
        self.regs.set_nz::<SET>(result);

        self.bus.i_cycle(alu::mul_cycles(mult, true));
    }

    /// UMULL/SMULL/UMLAL/SMLAL.
    pub fn arm_multiply_long<const SIGNED: bool, const ACC: bool, const SET: bool>(
        &mut self,
        inst: ArmInst,
    ) {
        let dlo = inst.reg(12);
        let dhi = inst.reg(16);
        let mult = self.regs.r[inst.reg(8)];
        self.fetch_opcode();

        let mut result = if SIGNED {
            (mult as i32 as i64).wrapping_mul(self.regs.r[inst.reg(0)] as i32 as i64) as u64
        } else {
            (mult as u64).wrapping_mul(self.regs.r[inst.reg(0)] as u64)
        };
        let cycles = alu::mul_cycles(mult, SIGNED);
        if ACC {
            result =
                result.wrapping_add(((self.regs.r[dhi] as u64) << 32) | self.regs.r[dlo] as u64);
            self.bus.i_cycle(1);
        }
        if SET {
            self.regs.set_flag(Flag::Zero, result == 0);
            self.regs.set_flag(Flag::Neg, result.is_bit(63));
        }

        self.bus.i_cycle(cycles + 1);

        if dlo != 15 {
            self.regs.r[dlo] = result.u32();
        }
        if dhi != 15 {
            self.regs.r[dhi] = (result >> 32).u32();
        }
    }

    /// SWP/SWPB.
    pub fn arm_swp<const BYTE: bool>(&mut self, inst: ArmInst) {
        let addr = self.regs.r[inst.reg(16)];
        let m = inst.reg(0);
        let d = inst.reg(12);
        self.fetch_opcode();

        let result = if BYTE {
            let read = self.bus.read::<u8, false>(addr, Access::Seq).u32();
            self.bus
                .write::<u8>(addr, self.regs.r[m].u8(), Access::NonSeq);
            read
        } else {
            let read = self.bus.read::<u32, false>(addr, Access::Seq);
            self.bus.write::<u32>(addr, self.regs.r[m], Access::NonSeq);
            rotate_misaligned(read, addr)
        };

        self.regs.r[d] = result;
        self.bus.i_cycle(1);

        if d == 15 {
            self.flush_pipeline();
        }
    }

    /// MRS.
    pub fn arm_mrs<const SPSR: bool>(&mut self, inst: ArmInst) {
        let d = inst.reg(12);
        self.regs.r[d] = if SPSR { self.regs.spsr() } else { self.regs.cpsr };
        self.fetch_opcode();
    }

    /// MSR, to CPSR or the current SPSR. Only the flag nibble and the
    /// control byte exist; everything in between reads as zero.
    pub fn arm_msr<const IMM: bool, const SPSR: bool>(&mut self, inst: ArmInst) {
        let operand = if IMM {
            (inst.0 & 0xFF).rotate_right(inst.0.bits(8, 4) << 1)
        } else {
            self.regs.r[inst.reg(0)]
        };

        let mode = self.regs.mode();
        if SPSR && !mode.is_privileged() {
            // User and System have no SPSR to write
            self.fetch_opcode();
            return;
        }
        let target = if SPSR {
            self.regs.spsr[mode.bank()]
        } else {
            self.regs.cpsr
        };

        let mut result = if inst.0.is_bit(19) {
            operand & 0xF000_0000
        } else {
            target & 0xF000_0000
        };
        if inst.0.is_bit(16) && mode != Mode::User {
            result |= operand & 0xFF;
            // A control write to CPSR may change mode; re-bank for it
            if !SPSR && !self.switch_mode(operand, false) {
                self.fetch_opcode();
                return;
            }
        } else {
            result |= target & 0xFF;
        }

        if cfg!(not(feature = "fiq")) {
            result |= 0x40;
        }
        result |= 0x10; // mode bit 4 always reads as 1

        if SPSR {
            self.regs.spsr[mode.bank()] = result;
        } else {
            self.regs.cpsr = result;
        }
        self.fetch_opcode();
    }

    /// STRH/LDRH/LDRSB/LDRSH. The SH bits come out of the opcode; the
    /// addressing flags are decoded into the const parameters.
    pub fn arm_halfword_transfer<
        const PRE: bool,
        const UP: bool,
        const IMM: bool,
        const WRITEBACK: bool,
        const LOAD: bool,
    >(
        &mut self,
        inst: ArmInst,
    ) {
        let n = inst.reg(16);
        let d = inst.reg(12);
        if n == 15 && WRITEBACK {
            self.arm_fault(inst.0, "r15 base with writeback");
        }

        let offs = if IMM {
            (inst.0 & 0xF) | (inst.0.bits(8, 4) << 4)
        } else {
            self.regs.r[inst.reg(0)]
        };
        let mut addr = self.regs.r[n];
        if PRE {
            addr = if UP {
                addr.wrapping_add(offs)
            } else {
                addr.wrapping_sub(offs)
            };
        }
        self.fetch_opcode();

        let mut result = 0;
        if LOAD {
            result = match inst.0.bits(5, 2) {
                1 => {
                    let read = self.bus.read::<u16, false>(addr, Access::NonSeq);
                    rotate_misaligned(read, addr)
                }
                2 => self.bus.read::<u8, false>(addr, Access::NonSeq) as i8 as i32 as u32,
                _ => {
                    // LDRSH of an odd address sign-extends the rotated
                    // byte instead, mirroring the hardware
                    let read = self.bus.read::<u16, false>(addr, Access::NonSeq);
                    let rotated = rotate_misaligned(read, addr);
                    if addr.is_bit(0) {
                        ((rotated << 24) as i32 >> 24) as u32
                    } else {
                        ((rotated << 16) as i32 >> 16) as u32
                    }
                }
            };
        } else {
            if inst.0.bits(5, 2) == 1 {
                self.bus
                    .write::<u16>(addr, self.regs.r[d].u16(), Access::NonSeq);
            }
            self.next_fetch = Access::NonSeq;
        }

        if WRITEBACK && PRE {
            self.regs.r[n] = addr;
        }
        if !PRE {
            addr = if UP {
                addr.wrapping_add(offs)
            } else {
                addr.wrapping_sub(offs)
            };
            self.regs.r[n] = addr;
        }
        if LOAD {
            self.regs.r[d] = result;
            self.bus.i_cycle(1);

            if d == 15 {
                self.flush_pipeline();
            }
        }
    }

    /// LDR/STR/LDRB/STRB. `SHIFT` is bit 25: a shifted-register offset
    /// instead of a 12-bit immediate.
    pub fn arm_single_transfer<
        const SHIFT: bool,
        const PRE: bool,
        const UP: bool,
        const BYTE: bool,
        const WRITEBACK: bool,
        const LOAD: bool,
    >(
        &mut self,
        inst: ArmInst,
    ) {
        let n = inst.reg(16);
        let d = inst.reg(12);
        if WRITEBACK && n == 15 {
            self.arm_fault(inst.0, "r15 base with writeback");
        }

        let (offs, _) = self.regs.shifted_operand::<true, SHIFT>(inst.0);
        let mut addr = self.regs.r[n];
        if PRE {
            addr = if UP {
                addr.wrapping_add(offs)
            } else {
                addr.wrapping_sub(offs)
            };
        }
        self.fetch_opcode();

        let mut result = 0;
        if LOAD {
            result = if BYTE {
                self.bus.read::<u8, false>(addr, Access::NonSeq).u32()
            } else {
                let read = self.bus.read::<u32, false>(addr, Access::NonSeq);
                rotate_misaligned(read, addr)
            };
        } else {
            // Stores happen after the fetch, so storing r15 gives PC+12
            if BYTE {
                self.bus
                    .write::<u8>(addr, self.regs.r[d].u8(), Access::NonSeq);
            } else {
                self.bus.write::<u32>(addr, self.regs.r[d], Access::NonSeq);
            }
            self.next_fetch = Access::NonSeq;
        }

        if WRITEBACK && PRE {
            self.regs.r[n] = addr;
        }
        if !PRE {
            addr = if UP {
                addr.wrapping_add(offs)
            } else {
                addr.wrapping_sub(offs)
            };
            self.regs.r[n] = addr;
        }
        if LOAD {
            self.regs.r[d] = result;
            self.bus.i_cycle(1);

            if d == 15 {
                self.flush_pipeline();
            }
        }
    }

    /// LDM/STM, all four addressing modes.
    pub fn arm_block_transfer<
        const PRE: bool,
        const UP: bool,
        const SBIT: bool,
        const WRITEBACK: bool,
        const LOAD: bool,
    >(
        &mut self,
        inst: ArmInst,
    ) {
        let n = inst.reg(16);
        let rlist = inst.0 & 0xFFFF;
        // S outside of an LDM with r15 transfers the user bank instead
        let user_bank =
            SBIT && !(LOAD && rlist.is_bit(15)) && self.regs.mode().is_privileged();
        let lowest_banked = if self.regs.mode() == Mode::Fiq { 8 } else { 13 };
        if n == 15 && WRITEBACK {
            self.arm_fault(inst.0, "r15 base with writeback");
        }

        let mut addr = self.regs.r[n];
        let empty = rlist == 0;
        let writeback_addr;
        if UP {
            writeback_addr =
                addr.wrapping_add(rlist.count_ones() * 4 + if empty { 0x40 } else { 0 });
            if PRE {
                addr = addr.wrapping_add(4);
            }
        } else {
            addr = addr.wrapping_sub(rlist.count_ones() * 4 + if empty { 0x40 } else { 0 });
            writeback_addr = addr;
            if !PRE {
                addr = addr.wrapping_add(4);
            }
        }
        self.fetch_opcode();

        let mut first = true;
        if LOAD {
            if empty {
                // An empty list transfers r15 and moves the base by 0x40
                if WRITEBACK {
                    self.regs.r[n] = writeback_addr;
                }
                self.regs.r[15] = self.bus.read::<u32, false>(addr, Access::NonSeq);
                self.flush_pipeline();
            } else {
                for i in 0..16 {
                    if !rlist.is_bit(i) {
                        continue;
                    }
                    // Writeback lands with the first transfer
                    if first && WRITEBACK {
                        self.regs.r[n] = writeback_addr;
                    }
                    let value = self.bus.read::<u32, false>(
                        addr,
                        if first { Access::NonSeq } else { Access::Seq },
                    );
                    let i = i.us();
                    if user_bank && i >= lowest_banked && i != 15 {
                        self.regs.set_user_reg(i, value);
                    } else {
                        self.regs.r[i] = value;
                    }
                    addr = addr.wrapping_add(4);
                    first = false;
                }
                self.bus.i_cycle(1);

                if rlist.is_bit(15) {
                    self.flush_pipeline();
                }
            }
        } else {
            if empty {
                self.bus
                    .write::<u32>(addr, self.regs.r[15], Access::NonSeq);
                if WRITEBACK {
                    self.regs.r[n] = writeback_addr;
                }
            } else {
                for i in 0..16 {
                    if !rlist.is_bit(i) {
                        continue;
                    }
                    let i = i.us();
                    let value = if user_bank && i >= lowest_banked && i != 15 {
                        self.regs.user_reg(i)
                    } else {
                        self.regs.r[i]
                    };
                    self.bus.write::<u32>(
                        addr,
                        value,
                        if first { Access::NonSeq } else { Access::Seq },
                    );
                    addr = addr.wrapping_add(4);

                    if first {
                        if WRITEBACK {
                            self.regs.r[n] = writeback_addr;
                        }
                        first = false;
                    }
                }
            }
            self.next_fetch = Access::NonSeq;
        }

        if SBIT && LOAD && rlist.is_bit(15) {
            self.leave_mode();
        }
    }

    /// MRC/MCR. CP14 is quietly accepted so debug-channel probes fall
    /// through; everything else takes the undefined trap.
    pub fn arm_coprocessor(&mut self, inst: ArmInst) {
        if inst.reg(8) == 14 {
            self.fetch_opcode();
        } else {
            self.arm_undefined(inst);
        }
    }
}
