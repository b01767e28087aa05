use super::{AddrRange, AddrUnit, BusMap};

/// Main RAM. The whole 2 MB is one flat little endian buffer.
pub struct Ram {
    data: Box<[u8]>,
}

impl Ram {
    pub const SIZE: usize = 2 * 1024 * 1024;

    pub fn new() -> Self {
        // RAM content is garbage at power on. Fill it with something recognizable.
        Self {
            data: vec![0xca; Self::SIZE].into_boxed_slice(),
        }
    }

    pub fn load<T: AddrUnit>(&self, offset: u32) -> u32 {
        let offset = offset as usize;
        (0..T::WIDTH).fold(0, |value, byte| {
            value | (self.data[offset + byte] as u32) << (8 * byte)
        })
    }

    pub fn store<T: AddrUnit>(&mut self, offset: u32, val: u32) {
        let offset = offset as usize;
        for byte in 0..T::WIDTH {
            self.data[offset + byte] = (val >> (8 * byte)) as u8;
        }
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl BusMap for Ram {
    const RANGE: AddrRange = AddrRange::new(0x0, Self::SIZE as u32);
}
