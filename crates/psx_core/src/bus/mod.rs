//! The memory bus of the playstation 1. Every load and store from the CPU goes through here and
//! gets routed to RAM, the BIOS or one of the memory mapped devices.

pub mod bios;
pub mod dma;
pub mod map;
pub mod ram;

use psx_util::Bit;
use thiserror::Error;

use crate::gpu::Gpu;
use crate::spu::Spu;

use bios::Bios;
use dma::{Dma, DmaError};
use ram::Ram;

pub use map::{to_region, AddrRange, BusMap};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("unaligned {width} byte access at {addr:#010x}")]
    UnalignedAccess { addr: u32, width: usize },

    #[error("nothing mapped at {0:#010x}")]
    BusFault(u32),

    #[error("expansion {exp} base address set to {addr:#010x}")]
    BadExpansionBase { exp: u8, addr: u32 },

    #[error(transparent)]
    Dma(#[from] DmaError),
}

pub struct Bus {
    bios: Bios,
    ram: Ram,
    dma: Dma,
    gpu: Gpu,
    spu: Spu,
    mem_ctrl: MemCtrl,
    ram_size: RamSize,
    cache_ctrl: CacheCtrl,
}

impl Bus {
    pub fn new(bios: Bios) -> Self {
        Self {
            bios,
            ram: Ram::new(),
            dma: Dma::new(),
            gpu: Gpu::new(),
            spu: Spu::new(),
            mem_ctrl: MemCtrl::new(),
            ram_size: RamSize(0),
            cache_ctrl: CacheCtrl(0),
        }
    }

    pub fn load<T: AddrUnit>(&mut self, addr: u32) -> Result<u32, BusError> {
        self.read::<T>(addr, true)
    }

    /// Load without side effects. Reading GPUREAD returns the last value read instead of moving a
    /// VRAM transfer forward.
    pub fn peek<T: AddrUnit>(&mut self, addr: u32) -> Result<u32, BusError> {
        self.read::<T>(addr, false)
    }

    fn read<T: AddrUnit>(&mut self, addr: u32, advance: bool) -> Result<u32, BusError> {
        if !T::is_aligned(addr) {
            return Err(BusError::UnalignedAccess { addr, width: T::WIDTH });
        }

        let addr = to_region(addr);

        if let Some(offset) = Bios::RANGE.offset(addr) {
            return Ok(self.bios.load::<T>(offset));
        }

        if let Some(offset) = Ram::RANGE.offset(addr) {
            return Ok(self.ram.load::<T>(offset));
        }

        if let Some(offset) = map::IRQ_CTRL.offset(addr) {
            trace!("STUB: interrupt control load at offset {offset}");
            return Ok(0);
        }

        if let Some(offset) = Dma::RANGE.offset(addr) {
            let val = self.dma.load(offset & !0x3)?;
            return Ok(narrow::<T>(val, offset));
        }

        if let Some(offset) = Gpu::RANGE.offset(addr) {
            let val = match offset >> 2 {
                0 if advance => self.gpu.read(),
                0 => self.gpu.read_latch(),
                _ => self.gpu.status(),
            };
            return Ok(narrow::<T>(val, offset));
        }

        if map::EXP1.contains(addr) || map::EXP2.contains(addr) {
            // Nothing is connected to the expansion ports.
            return Ok(u32::MAX >> (32 - 8 * T::WIDTH));
        }

        if let Some(offset) = map::TIMERS.offset(addr) {
            trace!("STUB: timer load at offset {offset}");
            return Ok(0);
        }

        if let Some(offset) = map::CDROM.offset(addr) {
            trace!("STUB: CDROM load at offset {offset}");
            return Ok(0);
        }

        if Spu::RANGE.contains(addr) {
            return Ok(self.spu.load::<T>(addr));
        }

        if let Some(offset) = MemCtrl::RANGE.offset(addr) {
            return Ok(narrow::<T>(self.mem_ctrl.load(offset), offset));
        }

        if CacheCtrl::RANGE.contains(addr) {
            return Ok(self.cache_ctrl.0);
        }

        if RamSize::RANGE.contains(addr) {
            return Ok(self.ram_size.0);
        }

        Err(BusError::BusFault(addr))
    }

    pub fn store<T: AddrUnit>(&mut self, addr: u32, val: u32) -> Result<(), BusError> {
        if !T::is_aligned(addr) {
            return Err(BusError::UnalignedAccess { addr, width: T::WIDTH });
        }

        let addr = to_region(addr);

        if Bios::RANGE.contains(addr) {
            warn!("store to BIOS at {addr:08x} ignored");
            return Ok(());
        }

        if let Some(offset) = Ram::RANGE.offset(addr) {
            self.ram.store::<T>(offset, val);
            return Ok(());
        }

        if let Some(offset) = map::IRQ_CTRL.offset(addr) {
            trace!("STUB: interrupt control store {val:08x} at offset {offset}");
            return Ok(());
        }

        if let Some(offset) = Dma::RANGE.offset(addr) {
            let reg = offset & !0x3;
            let val = match T::WIDTH {
                4 => val,
                _ => {
                    // Writing the interrupt flags back would acknowledge them.
                    let old = match reg {
                        0x74 => self.dma.load(reg)? & 0x00ff_ffff,
                        _ => self.dma.load(reg)?,
                    };
                    merge::<T>(old, val, offset)
                }
            };
            if let Some(port) = self.dma.store(reg, val)? {
                self.run_dma(port)?;
            }
            return Ok(());
        }

        // GP0 and GP1 are command ports, so there is nothing to merge with.
        if let Some(offset) = Gpu::RANGE.offset(addr) {
            let val = widen(val, offset);
            match offset >> 2 {
                0 => self.gpu.gp0(val),
                _ => self.gpu.gp1(val),
            }
            return Ok(());
        }

        if map::EXP1.contains(addr) || map::EXP2.contains(addr) {
            trace!("store {val:08x} to expansion at {addr:08x} ignored");
            return Ok(());
        }

        if let Some(offset) = map::TIMERS.offset(addr) {
            trace!("STUB: timer store {val:08x} at offset {offset}");
            return Ok(());
        }

        if let Some(offset) = map::CDROM.offset(addr) {
            trace!("STUB: CDROM store {val:02x} at offset {offset}");
            return Ok(());
        }

        if Spu::RANGE.contains(addr) {
            self.spu.store::<T>(addr, val);
            return Ok(());
        }

        if let Some(offset) = MemCtrl::RANGE.offset(addr) {
            let reg = offset & !0x3;
            let val = merge::<T>(self.mem_ctrl.load(reg), val, offset);
            return self.mem_ctrl.store(reg, val);
        }

        if CacheCtrl::RANGE.contains(addr) {
            trace!("cache control set to {val:08x}");
            self.cache_ctrl.0 = val;
            return Ok(());
        }

        if RamSize::RANGE.contains(addr) {
            trace!("RAM size set to {val:08x}");
            self.ram_size.0 = val;
            return Ok(());
        }

        Err(BusError::BusFault(addr))
    }

    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.ram
    }

    pub fn dma(&self) -> &Dma {
        &self.dma
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    pub fn spu(&self) -> &Spu {
        &self.spu
    }

    pub fn bios(&self) -> &Bios {
        &self.bios
    }
}

/// Shift the part of a 32-bit register addressed by a narrower load down to bit 0.
fn narrow<T: AddrUnit>(val: u32, offset: u32) -> u32 {
    let val = val >> (8 * (offset & 0x3));
    match T::WIDTH {
        4 => val,
        width => val.bit_range(0, 8 * width - 1),
    }
}

/// Move a narrow store into its place in a 32-bit register.
fn widen(val: u32, offset: u32) -> u32 {
    val << (8 * (offset & 0x3))
}

/// Replace the bytes of `old` covered by a narrow store, keeping the rest.
fn merge<T: AddrUnit>(old: u32, val: u32, offset: u32) -> u32 {
    if T::WIDTH == 4 {
        return val;
    }
    let mask = (u32::MAX >> (32 - 8 * T::WIDTH)) << (8 * (offset & 0x3));
    (old & !mask) | (widen(val, offset) & mask)
}

/// The RAM size register. It configures the memory controller, which isn't emulated.
struct RamSize(u32);

impl BusMap for RamSize {
    const RANGE: AddrRange = AddrRange::new(0x1f80_1060, 4);
}

/// Cache control register. Stored so it reads back, but the cache isn't emulated.
struct CacheCtrl(u32);

impl BusMap for CacheCtrl {
    const RANGE: AddrRange = AddrRange::new(0xfffe_0130, 4);
}

/// Memory control registers. The first two hold the base addresses of the expansion regions,
/// which start out at, and must stay at, the standard values. Anything else would move the
/// regions around.
struct MemCtrl {
    regs: [u32; 9],
}

impl MemCtrl {
    fn new() -> Self {
        let mut regs = [0x0; 9];
        regs[0] = map::EXP1.start;
        regs[1] = map::EXP2.start;
        Self { regs }
    }

    fn store(&mut self, offset: u32, val: u32) -> Result<(), BusError> {
        match offset {
            0 if val != map::EXP1.start => {
                return Err(BusError::BadExpansionBase { exp: 1, addr: val });
            }
            4 if val != map::EXP2.start => {
                return Err(BusError::BadExpansionBase { exp: 2, addr: val });
            }
            0 | 4 => (),
            _ => trace!("STUB: memory control store {val:08x} at offset {offset}"),
        }
        self.regs[(offset >> 2) as usize] = val;
        Ok(())
    }

    fn load(&self, offset: u32) -> u32 {
        self.regs[(offset >> 2) as usize]
    }
}

impl BusMap for MemCtrl {
    const RANGE: AddrRange = AddrRange::new(0x1f80_1000, 36);
}

/// A width of memory access.
pub trait AddrUnit {
    const WIDTH: usize;

    fn is_aligned(addr: u32) -> bool;
}

pub struct Byte;

impl AddrUnit for Byte {
    const WIDTH: usize = 1;

    fn is_aligned(_: u32) -> bool {
        true
    }
}

pub struct HalfWord;

impl AddrUnit for HalfWord {
    const WIDTH: usize = 2;

    fn is_aligned(addr: u32) -> bool {
        (addr & 0x1) == 0
    }
}

pub struct Word;

impl AddrUnit for Word {
    const WIDTH: usize = 4;

    fn is_aligned(addr: u32) -> bool {
        (addr & 0x3) == 0
    }
}
