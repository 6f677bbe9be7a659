// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The register file: sixteen active registers, CPSR, and the shadow
//! banks that get swapped in and out on mode changes.

use common::numutil::NumExt;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{interface::Bus, Cpu};

/// Flags inside CPSR.
#[derive(Copy, Clone)]
pub enum Flag {
    Neg = 31,
    Zero = 30,
    Carry = 29,
    Overflow = 28,
    IrqDisable = 7,
    FiqDisable = 6,
    Thumb = 5,
}

/// Processor mode, as held in CPSR bits 0-4. Bit 4 of the field is always
/// set on this CPU. Any other value is reserved and treated as fatal.
#[derive(FromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Mode {
    User = 0x10,
    Fiq = 0x11,
    Irq = 0x12,
    Supervisor = 0x13,
    Abort = 0x17,
    Undefined = 0x1B,
    System = 0x1F,
}

impl Mode {
    /// Index into the SP/LR/SPSR banks. User and System share a bank.
    pub(crate) fn bank(self) -> usize {
        match self {
            Mode::User | Mode::System => 0,
            Mode::Fiq => 1,
            Mode::Supervisor => 2,
            Mode::Abort => 3,
            Mode::Irq => 4,
            Mode::Undefined => 5,
        }
    }

    /// User and System are the only unprivileged modes; they have no SPSR.
    pub fn is_privileged(self) -> bool {
        !matches!(self, Mode::User | Mode::System)
    }
}

/// A register with separate values for FIQ and all other modes.
#[derive(Copy, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FiqReg {
    pub reg: u32,
    pub fiq: u32,
}

/// A register with one value per mode bank.
pub type ModeReg = [u32; 6];

/// The full register file. `r` is the active window; the banks hold the
/// values of whatever modes are not current. [`Registers::bank_registers`]
/// is the only place that shuffles between the two.
#[derive(Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Registers {
    pub r: [u32; 16],
    pub cpsr: u32,
    pub(crate) fiqs: [FiqReg; 5],
    pub(crate) sp: ModeReg,
    pub(crate) lr: ModeReg,
    pub(crate) spsr: ModeReg,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            r: [0; 16],
            // Supervisor mode, IRQ and FIQ masked, ARM state
            cpsr: 0xD3,
            fiqs: [FiqReg::default(); 5],
            sp: ModeReg::default(),
            lr: ModeReg::default(),
            spsr: ModeReg::default(),
        }
    }
}

impl Registers {
    #[inline]
    pub fn pc(&self) -> u32 {
        self.r[15]
    }

    #[inline]
    pub fn is_flag(&self, flag: Flag) -> bool {
        self.cpsr.is_bit(flag as u16)
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Flag, en: bool) {
        self.cpsr = self.cpsr.set_bit(flag as u16, en);
    }

    /// Get the current CPU mode.
    pub fn mode(&self) -> Mode {
        match Mode::from_u32(self.cpsr & 0x1F) {
            Some(mode) => mode,
            // Mode writes are validated, so CPSR cannot hold a reserved value
            None => panic!("reserved mode in CPSR"),
        }
    }

    /// The SPSR of the current mode. User and System have none and read
    /// CPSR instead.
    pub fn spsr(&self) -> u32 {
        let mode = self.mode();
        if mode.is_privileged() {
            self.spsr[mode.bank()]
        } else {
            self.cpsr
        }
    }

    /// Swap the banked registers of the current mode out and `new_mode`'s
    /// in. With `enter` set this is an exception-style transition: the
    /// pre-change CPSR is captured into the new mode's SPSR and the CPSR
    /// mode field (plus Thumb state, which lives in the same low bits) is
    /// rewritten.
    pub fn bank_registers(&mut self, new_mode: Mode, enter: bool) {
        let current = self.mode();

        // The user bank always mirrors live R8-R12 while outside FIQ, so
        // any mode can be switched to from any other.
        for i in 0..5 {
            if current == Mode::Fiq {
                self.fiqs[i].fiq = self.r[i + 8];
            } else {
                self.fiqs[i].reg = self.r[i + 8];
            }
        }
        self.sp[current.bank()] = self.r[13];
        self.lr[current.bank()] = self.r[14];

        for i in 0..5 {
            self.r[i + 8] = if new_mode == Mode::Fiq {
                self.fiqs[i].fiq
            } else {
                self.fiqs[i].reg
            };
        }
        self.r[13] = self.sp[new_mode.bank()];
        self.r[14] = self.lr[new_mode.bank()];

        if enter {
            if new_mode.is_privileged() {
                self.spsr[new_mode.bank()] = self.cpsr;
            }
            self.cpsr = (self.cpsr & !0x3F) | new_mode as u32;
        }
    }

    /// The user bank's view of r8-r14, used by LDM/STM with the S bit.
    pub(crate) fn user_reg(&self, idx: usize) -> u32 {
        match idx {
            8..=12 => self.fiqs[idx - 8].reg,
            13 => self.sp[0],
            _ => self.lr[0],
        }
    }

    pub(crate) fn set_user_reg(&mut self, idx: usize, value: u32) {
        match idx {
            8..=12 => self.fiqs[idx - 8].reg = value,
            13 => self.sp[0] = value,
            _ => self.lr[0] = value,
        }
    }

    /// Evaluate a condition encoded into an instruction.
    /// NV (0xF) is reserved on ARMv4 and executes like AL.
    pub fn eval_condition(&self, cond: u16) -> bool {
        let n = self.is_flag(Flag::Neg);
        let z = self.is_flag(Flag::Zero);
        let c = self.is_flag(Flag::Carry);
        let v = self.is_flag(Flag::Overflow);
        match cond {
            0x0 => z,
            0x1 => !z,
            0x2 => c,
            0x3 => !c,
            0x4 => n,
            0x5 => !n,
            0x6 => v,
            0x7 => !v,
            0x8 => c && !z,
            0x9 => !c || z,
            0xA => n == v,
            0xB => n != v,
            0xC => !z && (n == v),
            0xD => z || (n != v),
            _ => true,
        }
    }
}

impl<S: Bus> Cpu<S> {
    /// Bank into the mode given by a raw 5-bit field. A reserved value is
    /// fatal: it is logged, `hacf` is raised, and the CPSR is left alone
    /// so it never holds an invalid mode.
    pub(crate) fn switch_mode(&mut self, bits: u32, enter: bool) -> bool {
        match Mode::from_u32(bits & 0x1F) {
            Some(mode) => {
                self.regs.bank_registers(mode, enter);
                true
            }
            None => {
                log::error!("Invalid mode 0x{:02X}", bits & 0x1F);
                self.bus.hacf();
                false
            }
        }
    }

    /// Return from an exception: restore the banked registers and CPSR of
    /// the mode this one was entered from, in one step.
    pub(crate) fn leave_mode(&mut self) {
        let spsr = self.regs.spsr();
        if self.switch_mode(spsr, false) {
            self.regs.cpsr = spsr;
        }
    }
}
