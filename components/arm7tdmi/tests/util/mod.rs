// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! A small RAM-backed bus for driving the core in tests. Records the
//! internal cycles, code fetches, and host hook invocations the core
//! issues so tests can assert on timing behavior.

#![allow(dead_code)]

use arm7tdmi::{interface::Access, Bus, Cpu, RwType};
use common::numutil::NumExt;

pub struct TestBus {
    pub ram: Vec<u8>,
    pub i_cycles: u32,
    pub breakpoint_hits: u32,
    pub on_fire: bool,
    /// Code fetches as (address, width, sequential) triples.
    pub code_reads: Vec<(u32, u32, bool)>,
}

impl TestBus {
    pub fn new() -> Self {
        Self {
            ram: vec![0; 0x1_0000],
            i_cycles: 0,
            breakpoint_hits: 0,
            on_fire: false,
            code_reads: Vec::new(),
        }
    }

    fn index(&self, addr: u32, width: u32) -> usize {
        (addr.us() & (self.ram.len() - 1)) & !(width.us() - 1)
    }

    pub fn set_word(&mut self, addr: u32, value: u32) {
        let i = self.index(addr, 4);
        self.ram[i..i + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_hword(&mut self, addr: u32, value: u16) {
        let i = self.index(addr, 2);
        self.ram[i..i + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn word(&self, addr: u32) -> u32 {
        let i = self.index(addr, 4);
        u32::from_le_bytes(self.ram[i..i + 4].try_into().unwrap())
    }
}

impl Bus for TestBus {
    fn read<T: RwType, const CODE: bool>(&mut self, addr: u32, access: Access) -> T {
        let i = self.index(addr, T::WIDTH);
        let mut value = 0;
        for b in 0..T::WIDTH.us() {
            value |= (self.ram[i + b] as u32) << (b * 8);
        }
        if CODE {
            self.code_reads
                .push((addr, T::WIDTH, access == Access::Seq));
        }
        T::from_u32(value)
    }

    fn write<T: RwType>(&mut self, addr: u32, value: T, _access: Access) {
        let i = self.index(addr, T::WIDTH);
        let value = value.u32();
        for b in 0..T::WIDTH.us() {
            self.ram[i + b] = (value >> (b * 8)).u8();
        }
    }

    fn i_cycle(&mut self, cycles: u16) {
        self.i_cycles += cycles as u32;
    }

    fn breakpoint(&mut self) {
        self.breakpoint_hits += 1;
    }

    fn hacf(&mut self) {
        self.on_fire = true;
    }
}

/// A freshly reset CPU with the given words already in memory.
pub fn cpu_with(words: &[(u32, u32)]) -> Cpu<TestBus> {
    let mut bus = TestBus::new();
    for (addr, value) in words {
        bus.set_word(*addr, *value);
    }
    let mut cpu = Cpu::new(bus);
    cpu.reset();
    cpu
}
