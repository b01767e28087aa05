//! A register file standing in for the sound processor. Nothing is played, but the BIOS reads
//! back what it writes and polls the status register.

use psx_util::{Bit, BitSet};

use crate::bus::{AddrRange, AddrUnit, BusMap};

pub struct Spu {
    regs: [u16; REG_COUNT],
}

const REG_COUNT: usize = 320;

const KEY_ON_LO: usize = 0x188 / 2;
const KEY_ON_HI: usize = 0x18a / 2;
const KEY_OFF_LO: usize = 0x18c / 2;
const KEY_OFF_HI: usize = 0x18e / 2;
const CONTROL: usize = 0x1aa / 2;
const STATUS: usize = 0x1ae / 2;

impl Spu {
    pub fn new() -> Self {
        Self { regs: [0x0; REG_COUNT] }
    }

    pub fn load<T: AddrUnit>(&self, addr: u32) -> u32 {
        match T::WIDTH {
            1 => {
                trace!("STUB: SPU byte load at {addr:08x}");
                0
            }
            2 => self.load16(addr) as u32,
            _ => {
                let lo = self.load16(addr) as u32;
                let hi = self.load16(addr | 2) as u32;
                lo | (hi << 16)
            }
        }
    }

    pub fn store<T: AddrUnit>(&mut self, addr: u32, val: u32) {
        match T::WIDTH {
            1 => trace!("STUB: SPU byte store {val:02x} at {addr:08x}"),
            2 => self.store16(addr, val as u16),
            _ => {
                self.store16(addr, val as u16);
                self.store16(addr | 2, val.bit_range(16, 31) as u16);
            }
        }
    }

    /// Load the halfword register at `addr`. Addresses outside the SPU read as zero.
    pub fn load16(&self, addr: u32) -> u16 {
        reg_idx(addr).map_or(0, |reg| self.regs[reg])
    }

    pub fn store16(&mut self, addr: u32, val: u16) {
        let Some(reg) = reg_idx(addr) else {
            warn!("SPU store {val:04x} outside the SPU at {addr:08x}");
            return;
        };

        self.regs[reg] = val;

        match reg {
            KEY_ON_LO | KEY_ON_HI => trace!("SPU key on {val:04x}"),
            KEY_OFF_LO | KEY_OFF_HI => trace!("SPU key off {val:04x}"),
            // The low 6 bits of the status register follow the control register.
            CONTROL => {
                self.regs[STATUS] = self.regs[STATUS].set_bit_range(0, 5, val.bit_range(0, 5));
            }
            _ => (),
        }
    }
}

impl Default for Spu {
    fn default() -> Self {
        Self::new()
    }
}

fn reg_idx(addr: u32) -> Option<usize> {
    Spu::RANGE
        .offset(addr)
        .map(|offset| (offset / 2) as usize)
}

impl BusMap for Spu {
    const RANGE: AddrRange = AddrRange::new(0x1f80_1c00, 640);
}
