// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Mnemonic formatting for both instruction sets, used by instruction
//! tracing and by decoder tests. Offsets are printed as encoded, without
//! the pipeline bias.

use std::fmt::{self, Display, Formatter};

use bitmatch::bitmatch;
use common::numutil::{NumExt, U32Ext};

use crate::{inst_arm::ArmInst, inst_thumb::ThumbInst};

fn condition(cond: u32) -> &'static str {
    match cond & 0xF {
        0x0 => "eq",
        0x1 => "ne",
        0x2 => "cs",
        0x3 => "cc",
        0x4 => "mi",
        0x5 => "pl",
        0x6 => "vs",
        0x7 => "vc",
        0x8 => "hi",
        0x9 => "ls",
        0xA => "ge",
        0xB => "lt",
        0xC => "gt",
        0xD => "le",
        0xE => "",
        _ => "nv",
    }
}

fn alu_name(op: u32) -> &'static str {
    match op & 0xF {
        0x0 => "and",
        0x1 => "eor",
        0x2 => "sub",
        0x3 => "rsb",
        0x4 => "add",
        0x5 => "adc",
        0x6 => "sbc",
        0x7 => "rsc",
        0x8 => "tst",
        0x9 => "teq",
        0xA => "cmp",
        0xB => "cmn",
        0xC => "orr",
        0xD => "mov",
        0xE => "bic",
        _ => "mvn",
    }
}

fn shift_name(ty: u32) -> &'static str {
    match ty & 3 {
        0 => "lsl",
        1 => "lsr",
        2 => "asr",
        _ => "ror",
    }
}

/// A register operand with its shift field, as used by data processing
/// and register-offset transfers.
fn shifted_reg(m: u32, ty: u32, amount: u32, by_reg: u32) -> String {
    match (by_reg, ty, amount) {
        (0, 0, 0) => format!("r{m}"),
        (0, _, _) => format!("r{m}, {} #{amount}", shift_name(ty)),
        _ => format!("r{m}, {} r{}", shift_name(ty), amount >> 1),
    }
}

fn rel(offset: i32) -> String {
    if offset >= 0 {
        format!("#0x{offset:X}")
    } else {
        format!("#-0x{:X}", -offset)
    }
}

fn halfword_name(l: u32, o: u32) -> &'static str {
    if l == 1 {
        match o {
            1 => "ldrh",
            2 => "ldrsb",
            3 => "ldrsh",
            _ => "?",
        }
    } else if o == 1 {
        "strh"
    } else {
        "?"
    }
}

impl Display for ArmInst {
    #[bitmatch]
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let co = condition(self.0 >> 28);
        #[bitmatch]
        match self.0 {
            "000100101111111111110001nnnn" => write!(f, "bx{co} r{n}"),
            "1010nnnnnnnnnnnnnnnnnnnnnnnn" => write!(f, "b{co} {}", rel(n.i24() << 2)),
            "1011nnnnnnnnnnnnnnnnnnnnnnnn" => write!(f, "bl{co} {}", rel(n.i24() << 2)),
            "1111nnnnnnnnnnnnnnnnnnnnnnnn" => write!(f, "swi{co} #0x{n:X}"),

            "000000asddddnnnnssss1001mmmm" => {
                let s = if s == 1 { "s" } else { "" };
                if a == 1 {
                    write!(f, "mla{co}{s} r{d}, r{m}, r{s}, r{n}")
                } else {
                    write!(f, "mul{co}{s} r{d}, r{m}, r{s}")
                }
            }
            "00001gashhhhllllssss1001mmmm" => {
                let name = match (g, a) {
                    (0, 0) => "umull",
                    (0, 1) => "umlal",
                    (1, 0) => "smull",
                    _ => "smlal",
                };
                let s = if s == 1 { "s" } else { "" };
                write!(f, "{name}{co}{s} r{l}, r{h}, r{m}, r{s}")
            }

            "00010b00nnnndddd00001001mmmm" => {
                let b = if b == 1 { "b" } else { "" };
                write!(f, "swp{co}{b} r{d}, r{m}, [r{n}]")
            }
            "00010p001111dddd000000000000" => {
                write!(f, "mrs{co} r{d}, {}", if p == 1 { "spsr" } else { "cpsr" })
            }
            "00010p10kkkk111100000000mmmm" => {
                let psr = if p == 1 { "spsr" } else { "cpsr" };
                write!(f, "msr{co} {psr}_{k:04b}, r{m}")
            }
            "00110p10kkkk1111rrrrjjjjjjjj" => {
                let psr = if p == 1 { "spsr" } else { "cpsr" };
                write!(f, "msr{co} {psr}_{k:04b}, #0x{:X}", j.rotate_right(r << 1))
            }

            "000pu0wlnnnndddd00001oo1mmmm" => {
                let name = halfword_name(l, o);
                let u = if u == 1 { "" } else { "-" };
                if p == 1 {
                    let w = if w == 1 { "!" } else { "" };
                    write!(f, "{name}{co} r{d}, [r{n}, {u}r{m}]{w}")
                } else {
                    write!(f, "{name}{co} r{d}, [r{n}], {u}r{m}")
                }
            }
            "000pu1wlnnnnddddjjjj1oo1kkkk" => {
                let name = halfword_name(l, o);
                let u = if u == 1 { "" } else { "-" };
                let offs = (j << 4) | k;
                if p == 1 {
                    let w = if w == 1 { "!" } else { "" };
                    write!(f, "{name}{co} r{d}, [r{n}, {u}#0x{offs:X}]{w}")
                } else {
                    write!(f, "{name}{co} r{d}, [r{n}], {u}#0x{offs:X}")
                }
            }

            "000oooosnnnnddddaaaaattrmmmm" => {
                let name = alu_name(o);
                let s = if s == 1 && !(0x8..=0xB).contains(&o) { "s" } else { "" };
                let op2 = shifted_reg(m, t, a, r);
                match o {
                    0x8..=0xB => write!(f, "{name}{co} r{n}, {op2}"),
                    0xD | 0xF => write!(f, "{name}{co}{s} r{d}, {op2}"),
                    _ => write!(f, "{name}{co}{s} r{d}, r{n}, {op2}"),
                }
            }
            "001oooosnnnnddddrrrrjjjjjjjj" => {
                let name = alu_name(o);
                let s = if s == 1 && !(0x8..=0xB).contains(&o) { "s" } else { "" };
                let imm = j.rotate_right(r << 1);
                match o {
                    0x8..=0xB => write!(f, "{name}{co} r{n}, #0x{imm:X}"),
                    0xD | 0xF => write!(f, "{name}{co}{s} r{d}, #0x{imm:X}"),
                    _ => write!(f, "{name}{co}{s} r{d}, r{n}, #0x{imm:X}"),
                }
            }

            "010pubwlnnnnddddjjjjjjjjjjjj" => {
                let name = if l == 1 { "ldr" } else { "str" };
                let b = if b == 1 { "b" } else { "" };
                let u = if u == 1 { "" } else { "-" };
                if p == 1 {
                    let w = if w == 1 { "!" } else { "" };
                    write!(f, "{name}{b}{co} r{d}, [r{n}, {u}#0x{j:X}]{w}")
                } else {
                    write!(f, "{name}{b}{co} r{d}, [r{n}], {u}#0x{j:X}")
                }
            }
            "011pubwlnnnnddddaaaaatt0mmmm" => {
                let name = if l == 1 { "ldr" } else { "str" };
                let b = if b == 1 { "b" } else { "" };
                let u = if u == 1 { "" } else { "-" };
                let op2 = shifted_reg(m, t, a, 0);
                if p == 1 {
                    let w = if w == 1 { "!" } else { "" };
                    write!(f, "{name}{b}{co} r{d}, [r{n}, {u}{op2}]{w}")
                } else {
                    write!(f, "{name}{b}{co} r{d}, [r{n}], {u}{op2}")
                }
            }

            "100puswlnnnnrrrrrrrrrrrrrrrr" => {
                let name = if l == 1 { "ldm" } else { "stm" };
                let mode = match (u, p) {
                    (1, 0) => "ia",
                    (1, 1) => "ib",
                    (0, 0) => "da",
                    _ => "db",
                };
                let w = if w == 1 { "!" } else { "" };
                let s = if s == 1 { "^" } else { "" };
                write!(f, "{name}{mode}{co} r{n}{w}, {{0x{r:04X}}}{s}")
            }

            _ => write!(f, "0x{:08X} ??", self.0),
        }
    }
}

impl Display for ThumbInst {
    #[bitmatch]
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        #[bitmatch]
        match self.0 {
            "11011111nnnnnnnn" => write!(f, "swi #0x{n:X}"),

            "00011ionnnsssddd" => {
                let name = if o == 1 { "sub" } else { "add" };
                if i == 1 {
                    write!(f, "{name}s r{d}, r{s}, #{n}")
                } else {
                    write!(f, "{name}s r{d}, r{s}, r{n}")
                }
            }
            "000oonnnnnsssddd" => write!(f, "{}s r{d}, r{s}, #{n}", shift_name(o.u32())),
            "001oodddnnnnnnnn" => {
                let name = match o {
                    0 => "mov",
                    1 => "cmp",
                    2 => "add",
                    _ => "sub",
                };
                write!(f, "{name}s r{d}, #{n}")
            }

            "010000oooosssddd" => {
                let name = match o {
                    0x0 => "and",
                    0x1 => "eor",
                    0x2 => "lsl",
                    0x3 => "lsr",
                    0x4 => "asr",
                    0x5 => "adc",
                    0x6 => "sbc",
                    0x7 => "ror",
                    0x8 => "tst",
                    0x9 => "neg",
                    0xA => "cmp",
                    0xB => "cmn",
                    0xC => "orr",
                    0xD => "mul",
                    0xE => "bic",
                    _ => "mvn",
                };
                write!(f, "{name}s r{d}, r{s}")
            }

            "01000111?ssss???" => write!(f, "bx r{s}"),
            "010001oodssssddd" => {
                let name = match o {
                    0 => "add",
                    1 => "cmp",
                    _ => "mov",
                };
                write!(f, "{name} r{d}, r{s}")
            }

            "01001dddnnnnnnnn" => write!(f, "ldr r{d}, [pc, #0x{:X}]", n << 2),
            "0101ooosssbbbddd" => {
                let name = match o {
                    0 => "str",
                    1 => "strh",
                    2 => "strb",
                    3 => "ldrsb",
                    4 => "ldr",
                    5 => "ldrh",
                    6 => "ldrb",
                    _ => "ldrsh",
                };
                write!(f, "{name} r{d}, [r{b}, r{s}]")
            }
            "011connnnnbbbddd" => {
                let name = match (o, c) {
                    (0, 0) => "str",
                    (1, 0) => "ldr",
                    (0, _) => "strb",
                    _ => "ldrb",
                };
                let n = if c == 1 { n.u32() } else { n.u32() << 2 };
                write!(f, "{name} r{d}, [r{b}, #0x{n:X}]")
            }
            "1000onnnnnbbbddd" => {
                let name = if o == 1 { "ldrh" } else { "strh" };
                write!(f, "{name} r{d}, [r{b}, #0x{:X}]", n << 1)
            }
            "1001odddnnnnnnnn" => {
                let name = if o == 1 { "ldr" } else { "str" };
                write!(f, "{name} r{d}, [sp, #0x{:X}]", n << 2)
            }

            "1010sdddnnnnnnnn" => {
                let base = if s == 1 { "sp" } else { "pc" };
                write!(f, "add r{d}, {base}, #0x{:X}", n << 2)
            }
            "10110000snnnnnnn" => {
                let sign = if s == 1 { "-" } else { "" };
                write!(f, "add sp, #{sign}0x{:X}", n << 2)
            }

            "1011o10rnnnnnnnn" => match (o, r) {
                (0, 0) => write!(f, "push {{0x{n:02X}}}"),
                (0, _) => write!(f, "push {{0x{n:02X}, lr}}"),
                (_, 0) => write!(f, "pop {{0x{n:02X}}}"),
                _ => write!(f, "pop {{0x{n:02X}, pc}}"),
            },
            "1100obbbnnnnnnnn" => {
                let name = if o == 1 { "ldmia" } else { "stmia" };
                write!(f, "{name} r{b}!, {{0x{n:02X}}}")
            }

            "1101ccccnnnnnnnn" => {
                write!(f, "b{} {}", condition(c.u32()), rel((n as i8 as i32) << 1))
            }
            "11100nnnnnnnnnnn" => {
                let offs = ((n << 5) as i16 as i32) >> 4;
                write!(f, "b {}", rel(offs))
            }
            "11110nnnnnnnnnnn" => {
                let offs = (((n as u32) << 21) as i32) >> 9;
                write!(f, "add lr, pc, {}", rel(offs))
            }
            "11111nnnnnnnnnnn" => write!(f, "bl lr, #0x{:X}", n << 1),

            _ => write!(f, "0x{:04X} ??", self.0),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn arm_ok(inst: u32, disasm: &str) {
        assert_eq!(disasm, ArmInst(inst).to_string());
    }

    fn thumb_ok(inst: u16, disasm: &str) {
        assert_eq!(disasm, ThumbInst(inst).to_string());
    }

    #[test]
    fn arm_branches() {
        arm_ok(0x0A000FFF, "beq #0x3FFC");
        arm_ok(0xEAFFFFFF, "b #-0x4");
        arm_ok(0xEBFFFFFE, "bl #-0x8");
        arm_ok(0xE12FFF10, "bx r0");
        arm_ok(0x112FFF13, "bxne r3");
        arm_ok(0xEF000012, "swi #0x12");
    }

    #[test]
    fn arm_data_processing() {
        arm_ok(0xE3B00000, "movs r0, #0x0");
        arm_ok(0xE0900001, "adds r0, r0, r1");
        arm_ok(0xE1510002, "cmp r1, r2");
        arm_ok(0xE1A01102, "mov r1, r2, lsl #2");
        arm_ok(0xE1A01312, "mov r1, r2, lsl r3");
    }

    #[test]
    fn arm_memory() {
        arm_ok(0xE59F0000, "ldr r0, [pc, #0x0]");
        arm_ok(0xE5210004, "str r0, [r1, -#0x4]!");
        arm_ok(0xE8B08002, "ldmia r0!, {0x8002}");
        arm_ok(0xE1001092, "swp r1, r2, [r0]");
        arm_ok(0xE1D210B4, "ldrh r1, [r2, #0x4]");
    }

    #[test]
    fn arm_psr() {
        arm_ok(0xE10F1000, "mrs r1, cpsr");
        arm_ok(0xE14F1000, "mrs r1, spsr");
        arm_ok(0xE129F001, "msr cpsr_1001, r1");
        arm_ok(0xE328F20F, "msr cpsr_1000, #0xF0000000");
    }

    #[test]
    fn thumb_basics() {
        thumb_ok(0xDF05, "swi #0x5");
        thumb_ok(0x1888, "adds r0, r1, r2");
        thumb_ok(0x1E49, "subs r1, r1, #1");
        thumb_ok(0x0089, "lsls r1, r1, #2");
        thumb_ok(0x2A05, "cmps r2, #5");
        thumb_ok(0x4770, "bx r14");
        thumb_ok(0x4448, "add r0, r9");
        thumb_ok(0xB507, "push {0x07, lr}");
        thumb_ok(0xD0FE, "beq #-0x4");
    }
}
