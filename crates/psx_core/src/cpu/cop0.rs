//! # Coprocessor 0
//!
//! Handles CPU exceptions. It can also handle virtual memory, but that isn't used by the
//! playstation 1.

use psx_util::{Bit, BitSet};

/// Exceptions the CPU can raise, with their code in the CAUSE register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    /// Loading data or an instruction at an unaligned address.
    AddressLoadError = 0x4,
    /// Storing data at an unaligned address.
    AddressStoreError = 0x5,
    Syscall = 0x8,
    Breakpoint = 0x9,
    /// Unknown or reserved instruction.
    IllegalInstruction = 0xa,
    /// An instruction for a coprocessor that doesn't exist.
    CopUnusable = 0xb,
    /// Signed overflow in ADD, ADDI or SUB.
    ArithmeticOverflow = 0xc,
}

pub struct Cop0 {
    /// # COP0 registers
    ///
    /// | Number | Name     | Usage                       |
    /// |--------|----------|-----------------------------|
    /// | 0..2   | Na       | -                           |
    /// | 3      | bpc      | Breakpoint on execution     |
    /// | 5      | bda      | Breakpoint on data access   |
    /// | 6      | jumpdest | Memorized jump address      |
    /// | 7      | dcic     | Breakpoint control          |
    /// | 8      | badvaddr | Bad virtual address         |
    /// | 9      | bdam     | Data access breakpoint mask |
    /// | 10     | Na       | -                           |
    /// | 11     | bpcm     | Execute breakpoint mask     |
    /// | 12     | sr       | Status register             |
    /// | 13     | cause    | Exception type              |
    /// | 14     | epc      | Return address from trap    |
    /// | 15     | prid     | Processor ID                |
    ///
    regs: [u32; 16],
}

const SR: usize = 12;
const CAUSE: usize = 13;
const EPC: usize = 14;
const BAD_VADDR: usize = 8;

impl Default for Cop0 {
    fn default() -> Self {
        Self { regs: REGISTER_VALUES }
    }
}

impl Cop0 {
    pub fn sr(&self) -> u32 {
        self.regs[SR]
    }

    pub fn cause(&self) -> u32 {
        self.regs[CAUSE]
    }

    pub fn epc(&self) -> u32 {
        self.regs[EPC]
    }

    pub fn bad_vaddr(&self) -> u32 {
        self.regs[BAD_VADDR]
    }

    pub(super) fn set_bad_vaddr(&mut self, addr: u32) {
        self.regs[BAD_VADDR] = addr;
    }

    /// Stores go to the data cache instead of memory.
    pub fn cache_isolated(&self) -> bool {
        self.regs[SR].bit(16)
    }

    /// Boot exception vectors are in ROM.
    fn bev(&self) -> bool {
        self.regs[SR].bit(22)
    }

    /// Read register `reg` for MFC0. Returns `None` if the register can't be read.
    pub fn read_reg(&self, reg: u32) -> Option<u32> {
        match reg {
            3 | 5..=9 | 11..=15 => Some(self.regs[reg as usize]),
            _ => None,
        }
    }

    /// Write register `reg` for MTC0. The breakpoint registers can only be cleared.
    pub fn write_reg(&mut self, reg: u32, val: u32) -> Result<(), Exception> {
        match reg {
            3 | 5 | 6 | 7 | 9 | 11 => {
                if val != 0 {
                    return Err(Exception::IllegalInstruction);
                }
                self.regs[reg as usize] = 0;
            }
            12 => self.regs[SR] = val,
            // Only the software interrupt bits are writable.
            13 => {
                self.regs[CAUSE] = self.regs[CAUSE].set_bit_range(8, 9, val.bit_range(8, 9));
            }
            _ => trace!("STUB: COP0 store {val:08x} to register {reg}"),
        }
        Ok(())
    }

    /// Start handling an exception. It pushes zeros onto the mode stack in the status register,
    /// which disables interrupts and enters kernel mode. CAUSE is set to the exception code, and EPC
    /// the address of the instruction which caused it, or the branch before it if `in_delay`.
    ///
    /// # Returns
    ///
    /// The address of the exception handler, which depends on the BEV flag.
    pub(super) fn enter_exception(&mut self, current_pc: u32, in_delay: bool, ex: Exception) -> u32 {
        // Bits 0..1 are the current interrupt enable and user mode flags, 2..3 the previous and
        // 4..5 the ones before that.
        let mode = self.regs[SR].bit_range(0, 5);
        self.regs[SR] = self.regs[SR].set_bit_range(0, 5, (mode << 2) & 0x3f);

        // Anything left in CAUSE from before is cleared, including the software interrupt bits.
        self.regs[CAUSE] = ((ex as u32) << 2).set_bit(31, in_delay);

        self.regs[EPC] = if in_delay {
            current_pc.wrapping_sub(4)
        } else {
            current_pc
        };

        if self.bev() {
            0xbfc0_0180
        } else {
            0x8000_0080
        }
    }

    /// RFE. Pops the mode stack. Bits 4..5 are left as they are.
    pub(super) fn exit_exception(&mut self) {
        let mode = self.regs[SR].bit_range(0, 5);
        self.regs[SR] = self.regs[SR].set_bit_range(0, 3, mode >> 2);
    }
}

/// Register reset values. Only the processor ID is set.
const REGISTER_VALUES: [u32; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x0000_0002];
