// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The contract between the CPU and the rest of the system.

use common::numutil::NumExt;

use crate::{
    inst_arm::ArmLut,
    inst_thumb::ThumbLut,
    lut,
};

/// The kind of a memory access, as hinted to the bus. The first access
/// after a pipeline flush is non-sequential; accesses contiguous with the
/// previous one are sequential. Only wait-state accounting cares.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Access {
    Seq,
    NonSeq,
}

/// Trait for the bus the CPU is attached to.
///
/// The bus provides memory, time, and the two host hooks the core needs.
/// It is also expected to drive the `pending_fiq`/`pending_irq` lines on
/// [`Cpu`] from whatever interrupt controller it implements; the core
/// samples them at the start of every [`Cpu::cycle`].
///
/// [`Cpu`]: crate::Cpu
/// [`Cpu::cycle`]: crate::Cpu::cycle
pub trait Bus: Sized + 'static {
    /// LUT for ARM instructions, generated at compile time.
    const ARM_LUT: ArmLut<Self> = lut::make_arm_lut::<Self>();
    /// LUT for THUMB instructions, generated at compile time.
    const THUMB_LUT: ThumbLut<Self> = lut::make_thumb_lut::<Self>();

    /// Read a value from the bus, zero-extended. `CODE` is true for opcode
    /// fetches and false for data accesses. The bus is free to ignore the
    /// low address bits of a misaligned access; the core performs all
    /// rotation and sign extension itself.
    fn read<T: RwType, const CODE: bool>(&mut self, addr: u32, access: Access) -> T;
    /// Write a value to the bus.
    fn write<T: RwType>(&mut self, addr: u32, value: T, access: Access);
    /// Advance time by the given number of internal cycles.
    fn i_cycle(&mut self, cycles: u16);

    /// The address the CPU is about to execute has a breakpoint on it.
    fn breakpoint(&mut self);
    /// Halt and catch fire: the core ran into a state it cannot recover
    /// from (a decoder hole or a reserved mode value). The host should
    /// stop driving `cycle`; the core itself carries on as best it can.
    fn hacf(&mut self);
}

/// Trait for a type the CPU can access memory with.
/// On this CPU, that is u8, u16 and u32.
pub trait RwType: NumExt + 'static {}

impl RwType for u8 {}
impl RwType for u16 {}
impl RwType for u32 {}
