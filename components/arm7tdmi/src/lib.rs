// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! An ARM7TDMI interpreter core.
//!
//! The CPU is generic over the bus it sits on (see `interface.rs`) and
//! emulates the three-stage pipeline at the granularity needed to get
//! memory access timing right: every instruction issues its fetches,
//! data accesses, and internal cycles in hardware order.
//!
//! The host drives it one instruction at a time through [`Cpu::cycle`]
//! and raises interrupts through the [`Cpu::pending_irq`] and
//! [`Cpu::pending_fiq`] lines.

mod alu;
pub mod breakpoints;
mod disasm;
mod exceptions;
pub mod inst_arm;
pub mod inst_thumb;
pub mod interface;
mod lut;
pub mod registers;

use common::numutil::NumExt;

use crate::{
    breakpoints::Breakpoints,
    inst_arm::ArmInst,
    inst_thumb::ThumbInst,
    registers::{Flag, Registers},
};
pub use crate::{
    exceptions::Exception,
    interface::{Access, Bus, RwType},
};

/// An ARM7TDMI. Generic over the bus it is attached to, which it owns;
/// handlers freely interleave register state changes with bus traffic.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cpu<S: Bus> {
    pub regs: Registers,
    /// The prefetch pipeline. Slot 2 holds the executing instruction,
    /// slot 1 the next one, slot 0 the word being fetched.
    pipeline: [u32; 3],
    next_fetch: Access,

    /// Interrupt lines, raised by the bus and sampled at `cycle` entry.
    pub pending_fiq: bool,
    pub pending_irq: bool,

    #[cfg_attr(feature = "serde", serde(skip, default))]
    breakpoints: Breakpoints,
    pub bus: S,
}

impl<S: Bus> Cpu<S> {
    pub fn new(bus: S) -> Self {
        Self {
            regs: Registers::default(),
            pipeline: [0; 3],
            next_fetch: Access::NonSeq,
            pending_fiq: false,
            pending_irq: false,
            breakpoints: Breakpoints::default(),
            bus,
        }
    }

    /// Architectural reset: clear the register file and all banks, enter
    /// Supervisor mode with interrupts masked, and refill the pipeline
    /// from the reset vector. This is where the first bus reads happen.
    pub fn reset(&mut self) {
        self.pending_fiq = false;
        self.pending_irq = false;
        self.regs = Registers::default();
        self.regs.r[15] = Exception::Reset.vector();
        self.flush_pipeline();
    }

    /// Execute exactly one instruction, or one interrupt entry. Pending
    /// interrupts win over the instruction in the pipeline; a failed ARM
    /// condition still costs the fetch.
    pub fn cycle(&mut self) {
        if cfg!(feature = "fiq") && self.pending_fiq && !self.regs.is_flag(Flag::FiqDisable) {
            self.service_fiq();
        } else if self.pending_irq && !self.regs.is_flag(Flag::IrqDisable) {
            self.service_irq();
        } else if self.regs.is_flag(Flag::Thumb) {
            let inst = ThumbInst(self.pipeline[2].u16());
            log::trace!("0x{:08X}  {}", self.regs.pc().wrapping_sub(4), inst);
            let handler = S::THUMB_LUT[(inst.0 >> 6).us()];
            handler(self, inst);
        } else {
            let inst = ArmInst(self.pipeline[2]);
            log::trace!("0x{:08X}  {}", self.regs.pc().wrapping_sub(8), inst);
            if self.regs.eval_condition((inst.0 >> 28).u16()) {
                let handler = S::ARM_LUT[lut::arm_signature(inst.0)];
                handler(self, inst);
            } else {
                self.fetch_opcode();
            }
        }

        #[cfg(feature = "breakpoints")]
        {
            let next = self.regs.pc().wrapping_sub(2 * self.inst_size());
            if self.breakpoints.hit(next) {
                self.bus.breakpoint();
            }
        }
    }

    /// Set a breakpoint on a code address. Must not be called while
    /// `cycle` is on the stack.
    pub fn add_breakpoint(&mut self, addr: u32) {
        self.breakpoints.add(addr);
    }

    /// Remove a breakpoint again.
    pub fn remove_breakpoint(&mut self, addr: u32) {
        self.breakpoints.remove(addr);
    }

    /// Set the PC and refill the pipeline behind it. The flush aligns
    /// the target to the current instruction width.
    pub fn set_pc(&mut self, addr: u32) {
        self.regs.r[15] = addr;
        self.flush_pipeline();
    }

    /// Size of one instruction: 4 in ARM state, 2 in THUMB.
    #[inline]
    pub fn inst_size(&self) -> u32 {
        4 - ((self.regs.is_flag(Flag::Thumb) as u32) << 1)
    }

    /// Advance the pipeline by one slot and fetch the next word behind
    /// it. The fetch carries the pending access type; anything after it
    /// is sequential until something breaks the stream.
    pub(crate) fn fetch_opcode(&mut self) {
        if self.regs.is_flag(Flag::Thumb) {
            self.pipeline[0] = self
                .bus
                .read::<u16, true>(self.regs.pc(), self.next_fetch)
                .u32();
            self.pipeline[2] = self.pipeline[1];
            self.pipeline[1] = self.pipeline[0];
            self.regs.r[15] = self.regs.pc().wrapping_add(2);
        } else {
            self.pipeline[0] = self.bus.read::<u32, true>(self.regs.pc(), self.next_fetch);
            self.pipeline[2] = self.pipeline[1];
            self.pipeline[1] = self.pipeline[0];
            self.regs.r[15] = self.regs.pc().wrapping_add(4);
        }

        self.next_fetch = Access::Seq;
    }

    /// Refill the pipeline after a jump: align the PC, advance it two
    /// instruction widths, and fetch both slots behind it, the first one
    /// non-sequential.
    pub(crate) fn flush_pipeline(&mut self) {
        if self.regs.is_flag(Flag::Thumb) {
            self.regs.r[15] = (self.regs.pc() & !1).wrapping_add(4);
            self.pipeline[2] = self
                .bus
                .read::<u16, true>(self.regs.pc().wrapping_sub(4), Access::NonSeq)
                .u32();
            self.pipeline[1] = self
                .bus
                .read::<u16, true>(self.regs.pc().wrapping_sub(2), Access::Seq)
                .u32();
        } else {
            self.regs.r[15] = (self.regs.pc() & !3).wrapping_add(8);
            self.pipeline[2] = self
                .bus
                .read::<u32, true>(self.regs.pc().wrapping_sub(8), Access::NonSeq);
            self.pipeline[1] = self
                .bus
                .read::<u32, true>(self.regs.pc().wrapping_sub(4), Access::Seq);
        }

        self.next_fetch = Access::Seq;
    }
}
