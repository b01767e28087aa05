//! The physical memory map.

/// A window in the physical address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrRange {
    pub start: u32,
    pub length: u32,
}

impl AddrRange {
    pub const fn new(start: u32, length: u32) -> Self {
        assert!(length > 0, "empty address range");
        Self { start, length }
    }

    pub const fn contains(self, addr: u32) -> bool {
        // Subtracting first avoids overflow for windows at the very top of the address space.
        addr >= self.start && addr - self.start < self.length
    }

    /// The offset of `addr` into the range, if it's inside.
    pub const fn offset(self, addr: u32) -> Option<u32> {
        if self.contains(addr) {
            Some(addr - self.start)
        } else {
            None
        }
    }
}

/// Anything with a fixed window in the physical address space.
pub trait BusMap {
    const RANGE: AddrRange;
}

/// Mask the segment bits of a virtual address. KUSEG and KSEG2 are left as is, KSEG0 and KSEG1
/// both mirror the first 512 MB of the physical address space.
pub fn to_region(addr: u32) -> u32 {
    const REGION_MASK: [u32; 8] = [
        // KUSEG: 2048 MB.
        0xffff_ffff, 0xffff_ffff, 0xffff_ffff, 0xffff_ffff,
        // KSEG0: 512 MB.
        0x7fff_ffff,
        // KSEG1: 512 MB.
        0x1fff_ffff,
        // KSEG2: 1024 MB.
        0xffff_ffff, 0xffff_ffff,
    ];
    addr & REGION_MASK[(addr >> 29) as usize]
}

pub const IRQ_CTRL: AddrRange = AddrRange::new(0x1f80_1070, 8);
pub const TIMERS: AddrRange = AddrRange::new(0x1f80_1100, 0x30);
pub const CDROM: AddrRange = AddrRange::new(0x1f80_1800, 4);
pub const EXP1: AddrRange = AddrRange::new(0x1f00_0000, 512 * 1024);
pub const EXP2: AddrRange = AddrRange::new(0x1f80_2000, 66);
