// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Exception and interrupt entry.

use crate::{
    interface::Bus,
    registers::{Flag, Mode},
    Cpu,
};

/// Possible exceptions. Ordered by vector; the aborts are listed to keep
/// the numbering right but never get raised by this core.
#[derive(Debug, Copy, Clone)]
pub enum Exception {
    Reset,
    Undefined,
    Swi,
    PrefetchAbort,
    DataAbort,
    AddressExceeded,
    Irq,
    Fiq,
}

impl Exception {
    /// Vector the PC jumps to when this exception occurs.
    pub fn vector(self) -> u32 {
        self as u32 * 4
    }

    /// Mode the exception is serviced in.
    pub fn mode(self) -> Mode {
        const MODE: [Mode; 8] = [
            Mode::Supervisor,
            Mode::Undefined,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Abort,
            Mode::Supervisor,
            Mode::Irq,
            Mode::Fiq,
        ];
        MODE[self as usize]
    }
}

impl<S: Bus> Cpu<S> {
    /// Service a pending fast interrupt.
    pub(crate) fn service_fiq(&mut self) {
        let thumb = self.regs.is_flag(Flag::Thumb);
        self.pending_fiq = false;
        self.regs.bank_registers(Exception::Fiq.mode(), true);
        self.regs.r[14] = self.regs.pc().wrapping_sub(if thumb { 0 } else { 4 });

        self.regs.set_flag(Flag::IrqDisable, true);
        self.regs.set_flag(Flag::FiqDisable, true);

        self.regs.r[15] = Exception::Fiq.vector();
        self.flush_pipeline();
    }

    /// Service a pending interrupt.
    pub(crate) fn service_irq(&mut self) {
        let thumb = self.regs.is_flag(Flag::Thumb);
        self.pending_irq = false;
        self.regs.bank_registers(Exception::Irq.mode(), true);
        self.regs.r[14] = self.regs.pc().wrapping_sub(if thumb { 0 } else { 4 });

        self.regs.set_flag(Flag::IrqDisable, true);
        self.regs.set_flag(Flag::FiqDisable, true);

        self.regs.r[15] = Exception::Irq.vector();
        self.flush_pipeline();
    }

    /// Software interrupt, from either instruction set. The pipeline
    /// advances first so the return address is the following instruction.
    pub(crate) fn swi(&mut self) {
        let thumb = self.regs.is_flag(Flag::Thumb);
        self.fetch_opcode();
        self.regs.bank_registers(Exception::Swi.mode(), true);
        self.regs.r[14] = self.regs.pc().wrapping_sub(if thumb { 4 } else { 8 });
        self.regs.set_flag(Flag::IrqDisable, true);

        self.regs.r[15] = Exception::Swi.vector();
        self.flush_pipeline();
    }

    /// Architecturally undefined instruction: trap to the UND vector.
    /// Software can recover by returning past the offending word.
    pub(crate) fn undefined_instruction(&mut self) {
        let thumb = self.regs.is_flag(Flag::Thumb);
        self.regs.bank_registers(Exception::Undefined.mode(), true);
        self.regs.r[14] = self.regs.pc().wrapping_sub(if thumb { 2 } else { 4 });
        self.fetch_opcode();

        self.regs.r[15] = Exception::Undefined.vector();
        self.flush_pipeline();
    }
}
