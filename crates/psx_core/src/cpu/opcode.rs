//! Decoding of MIPS R3000 opcodes.
//!
//! All opcodes are encoded in 32 bits, in one of three layouts:
//! - Immediate
//!     - 6-bit op.
//!     - 5-bit source register.
//!     - 5-bit target register.
//!     - 16-bit immediate value.
//!
//! - Jump
//!     - 6-bit op.
//!     - 26-bit target address.
//!
//! - Register
//!     - 6-bit op.
//!     - 5-bit source register.
//!     - 5-bit target register.
//!     - 5-bit destination register.
//!     - 5-bit shift value.
//!     - 6-bit function field.

use psx_util::Bit;

use std::fmt;

/// Index of a general purpose register.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegIdx(pub u8);

impl RegIdx {
    pub const ZERO: Self = Self(0);
    pub const AT: Self = Self(1);
    pub const V0: Self = Self(2);
    pub const V1: Self = Self(3);
    pub const A0: Self = Self(4);
    pub const A1: Self = Self(5);
    pub const A2: Self = Self(6);
    pub const A3: Self = Self(7);
    pub const T0: Self = Self(8);
    pub const T1: Self = Self(9);
    pub const T2: Self = Self(10);
    pub const T3: Self = Self(11);
    pub const T4: Self = Self(12);
    pub const T5: Self = Self(13);
    pub const T6: Self = Self(14);
    pub const T7: Self = Self(15);
    pub const S0: Self = Self(16);
    pub const S1: Self = Self(17);
    pub const S2: Self = Self(18);
    pub const S3: Self = Self(19);
    pub const S4: Self = Self(20);
    pub const S5: Self = Self(21);
    pub const S6: Self = Self(22);
    pub const S7: Self = Self(23);
    pub const T8: Self = Self(24);
    pub const T9: Self = Self(25);
    pub const K0: Self = Self(26);
    pub const K1: Self = Self(27);
    pub const GP: Self = Self(28);
    pub const SP: Self = Self(29);
    pub const FP: Self = Self(30);
    pub const RA: Self = Self(31);

    fn from_field(val: u32) -> Self {
        Self(val as u8 & 0x1f)
    }
}

impl fmt::Display for RegIdx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "${}", REGISTER_NAMES[self.0 as usize & 0x1f])
    }
}

pub const REGISTER_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp", "fp",
    "ra",
];

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u32);

impl Opcode {
    pub fn new(opcode: u32) -> Self {
        Opcode(opcode)
    }

    /// Operation.
    pub fn op(self) -> u32 {
        self.0.bit_range(26, 31)
    }

    /// Sub operation / function.
    pub fn special(self) -> u32 {
        self.0.bit_range(0, 5)
    }

    /// Coprocessor operation. Shares bits with `rs`.
    pub fn cop_op(self) -> u32 {
        self.0.bit_range(21, 25)
    }

    /// Immediate value.
    pub fn imm(self) -> u32 {
        self.0.bit_range(0, 15)
    }

    /// Sign extended immediate value.
    pub fn signed_imm(self) -> u32 {
        let value = self.0.bit_range(0, 15) as i16;
        value as u32
    }

    /// Target address used for jump instructions.
    pub fn target(self) -> u32 {
        self.0.bit_range(0, 25)
    }

    pub fn shift(self) -> u32 {
        self.0.bit_range(6, 10)
    }

    /// Destination register.
    pub fn rd(self) -> RegIdx {
        RegIdx::from_field(self.0.bit_range(11, 15))
    }

    /// Target register.
    pub fn rt(self) -> RegIdx {
        RegIdx::from_field(self.0.bit_range(16, 20))
    }

    /// Source register.
    pub fn rs(self) -> RegIdx {
        RegIdx::from_field(self.0.bit_range(21, 25))
    }

    /// Coprocessor register. Same bits as `rd`.
    pub fn cop_reg(self) -> u32 {
        self.0.bit_range(11, 15)
    }

    /// Branch if greater or equal zero. Used by BCONDZ to determine the type of branching.
    pub fn bgez(self) -> bool {
        self.0.bit(16)
    }

    /// Set return register on branch. Used by BCONDZ.
    pub fn update_ra_on_branch(self) -> bool {
        self.0.bit_range(17, 20) == 0x8
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x} ({})", self.0, self)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let imm = self.signed_imm() as i32;
        match self.op() {
            0x0 => match self.special() {
                0x0 if self.0 == 0 => write!(f, "nop"),
                0x0 => write!(f, "sll {}, {}, {}", self.rd(), self.rt(), self.shift()),
                0x2 => write!(f, "srl {}, {}, {}", self.rd(), self.rt(), self.shift()),
                0x3 => write!(f, "sra {}, {}, {}", self.rd(), self.rt(), self.shift()),
                0x4 => write!(f, "sllv {}, {}, {}", self.rd(), self.rt(), self.rs()),
                0x6 => write!(f, "srlv {}, {}, {}", self.rd(), self.rt(), self.rs()),
                0x7 => write!(f, "srav {}, {}, {}", self.rd(), self.rt(), self.rs()),
                0x8 => write!(f, "jr {}", self.rs()),
                0x9 => write!(f, "jalr {}, {}", self.rd(), self.rs()),
                0xc => write!(f, "syscall"),
                0xd => write!(f, "break"),
                0x10 => write!(f, "mfhi {}", self.rd()),
                0x11 => write!(f, "mthi {}", self.rs()),
                0x12 => write!(f, "mflo {}", self.rd()),
                0x13 => write!(f, "mtlo {}", self.rs()),
                0x18 => write!(f, "mult {}, {}", self.rs(), self.rt()),
                0x19 => write!(f, "multu {}, {}", self.rs(), self.rt()),
                0x1a => write!(f, "div {}, {}", self.rs(), self.rt()),
                0x1b => write!(f, "divu {}, {}", self.rs(), self.rt()),
                0x20 => write!(f, "add {}, {}, {}", self.rd(), self.rs(), self.rt()),
                0x21 => write!(f, "addu {}, {}, {}", self.rd(), self.rs(), self.rt()),
                0x22 => write!(f, "sub {}, {}, {}", self.rd(), self.rs(), self.rt()),
                0x23 => write!(f, "subu {}, {}, {}", self.rd(), self.rs(), self.rt()),
                0x24 => write!(f, "and {}, {}, {}", self.rd(), self.rs(), self.rt()),
                0x25 => write!(f, "or {}, {}, {}", self.rd(), self.rs(), self.rt()),
                0x26 => write!(f, "xor {}, {}, {}", self.rd(), self.rs(), self.rt()),
                0x27 => write!(f, "nor {}, {}, {}", self.rd(), self.rs(), self.rt()),
                0x2a => write!(f, "slt {}, {}, {}", self.rd(), self.rs(), self.rt()),
                0x2b => write!(f, "sltu {}, {}, {}", self.rd(), self.rs(), self.rt()),
                _ => write!(f, "illegal"),
            },
            0x1 => {
                let op = match (self.update_ra_on_branch(), self.bgez()) {
                    (true, true) => "bgezal",
                    (true, false) => "bltzal",
                    (false, true) => "bgez",
                    (false, false) => "bltz",
                };
                write!(f, "{} {}, {}", op, self.rs(), imm)
            }
            0x2 => write!(f, "j {:08x}", self.target() << 2),
            0x3 => write!(f, "jal {:08x}", self.target() << 2),
            0x4 => write!(f, "beq {}, {}, {}", self.rs(), self.rt(), imm),
            0x5 => write!(f, "bne {}, {}, {}", self.rs(), self.rt(), imm),
            0x6 => write!(f, "blez {}, {}", self.rs(), imm),
            0x7 => write!(f, "bgtz {}, {}", self.rs(), imm),
            0x8 => write!(f, "addi {}, {}, {}", self.rt(), self.rs(), imm),
            0x9 => write!(f, "addiu {}, {}, {}", self.rt(), self.rs(), imm),
            0xa => write!(f, "slti {}, {}, {}", self.rt(), self.rs(), imm),
            0xb => write!(f, "sltiu {}, {}, {}", self.rt(), self.rs(), imm),
            0xc => write!(f, "andi {}, {}, {:#x}", self.rt(), self.rs(), self.imm()),
            0xd => write!(f, "ori {}, {}, {:#x}", self.rt(), self.rs(), self.imm()),
            0xe => write!(f, "xori {}, {}, {:#x}", self.rt(), self.rs(), self.imm()),
            0xf => write!(f, "lui {}, {:#x}", self.rt(), self.imm()),
            0x10 => match self.cop_op() {
                0x0 => write!(f, "mfc0 {}, ${}", self.rt(), self.cop_reg()),
                0x4 => write!(f, "mtc0 {}, ${}", self.rt(), self.cop_reg()),
                0x10 if self.special() == 0x10 => write!(f, "rfe"),
                _ => write!(f, "illegal"),
            },
            0x11 => write!(f, "cop1"),
            0x12 => write!(f, "cop2 {:07x}", self.0.bit_range(0, 24)),
            0x13 => write!(f, "cop3"),

            0x20 => write!(f, "lb {}, {}({})", self.rt(), imm, self.rs()),
            0x21 => write!(f, "lh {}, {}({})", self.rt(), imm, self.rs()),
            0x22 => write!(f, "lwl {}, {}({})", self.rt(), imm, self.rs()),
            0x23 => write!(f, "lw {}, {}({})", self.rt(), imm, self.rs()),
            0x24 => write!(f, "lbu {}, {}({})", self.rt(), imm, self.rs()),
            0x25 => write!(f, "lhu {}, {}({})", self.rt(), imm, self.rs()),
            0x26 => write!(f, "lwr {}, {}({})", self.rt(), imm, self.rs()),
            0x28 => write!(f, "sb {}, {}({})", self.rt(), imm, self.rs()),
            0x29 => write!(f, "sh {}, {}({})", self.rt(), imm, self.rs()),
            0x2a => write!(f, "swl {}, {}({})", self.rt(), imm, self.rs()),
            0x2b => write!(f, "sw {}, {}({})", self.rt(), imm, self.rs()),
            0x2e => write!(f, "swr {}, {}({})", self.rt(), imm, self.rs()),

            0x30..=0x33 => write!(f, "lwc{}", self.op() & 0x3),
            0x38..=0x3b => write!(f, "swc{}", self.op() & 0x3),
            _ => write!(f, "illegal"),
        }
    }
}
