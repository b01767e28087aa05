//! Emulation of the Direct Memory Access chip, used to move data between RAM and devices without
//! going through the CPU.
//!
//! There are no timings. A transfer runs to completion as soon as a register write leaves a
//! channel active, before the store instruction that started it returns, so the CPU never sees a
//! transfer in progress.

use psx_util::{Bit, BitSet};
use thiserror::Error;

use crate::bus::{AddrRange, Bus, BusMap, Ram, Word};

use std::ops::{Index, IndexMut};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    #[error("invalid sync mode {0} written to channel control")]
    InvalidSyncMode(u32),

    #[error("no DMA register at offset {0:#04x}")]
    InvalidRegister(u32),

    #[error("unsupported DMA block transfer {dir:?} on port {port:?}")]
    UnsupportedTransfer { port: Port, dir: ChanDir },

    #[error("linked list DMA must run from RAM to the GPU, not {dir:?} on port {port:?}")]
    InvalidLinkedList { port: Port, dir: ChanDir },

    #[error("DMA linked list starting at {start:#08x} doesn't terminate")]
    MalformedLinkedList { start: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    MdecIn = 0,
    MdecOut = 1,
    Gpu = 2,
    CdRom = 3,
    Spu = 4,
    Pio = 5,
    /// Depth ordering table. It's only used to initialize/reset it.
    Otc = 6,
}

impl Port {
    const ALL: [Port; 7] = [
        Port::MdecIn,
        Port::MdecOut,
        Port::Gpu,
        Port::CdRom,
        Port::Spu,
        Port::Pio,
        Port::Otc,
    ];
}

/// DMA can transfer either from or to RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    ToRam,
    FromRam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Start immediately and transfer all at once. Used to send textures to the VRAM and
    /// initializing the ordering table.
    Manual = 0,
    /// Transfer blocks when signaled by the device.
    Request = 1,
    /// A linked list of (generally) smaller blocks. It's only used to send commands to GP0.
    LinkedList = 2,
}

impl TryFrom<u32> for SyncMode {
    type Error = DmaError;

    fn try_from(val: u32) -> Result<Self, DmaError> {
        match val {
            0 => Ok(SyncMode::Manual),
            1 => Ok(SyncMode::Request),
            2 => Ok(SyncMode::LinkedList),
            _ => Err(DmaError::InvalidSyncMode(val)),
        }
    }
}

/// Which way to step from the base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Inc,
    Dec,
}

impl Step {
    /// The amount added to the address after each word. Decrementing wraps around.
    fn step_amount(self) -> u32 {
        match self {
            Step::Inc => 4,
            Step::Dec => (-4_i32) as u32,
        }
    }
}

/// The registers of a single DMA channel.
pub struct Channel {
    port: Port,
    /// Start address of the transfer. Only the low 24 bits are used.
    base: u32,
    /// Words per block.
    block_size: u16,
    /// Blocks per transfer. Only used in request sync mode.
    block_count: u16,
    dir: ChanDir,
    step: Step,
    /// Chopping lets the CPU run in intervals while transfering. It's stored but the transfers
    /// always run to completion.
    chop: bool,
    chop_dma_size: u8,
    chop_cpu_size: u8,
    sync: SyncMode,
    enable: bool,
    /// Start flag for manual sync mode.
    trigger: bool,
    /// Bits 29 and 30. They have no known function but can be read back.
    dummy: u8,
}

impl Channel {
    fn new(port: Port) -> Self {
        Self {
            port,
            base: 0,
            block_size: 0,
            block_count: 0,
            dir: ChanDir::ToRam,
            step: Step::Inc,
            chop: false,
            chop_dma_size: 0,
            chop_cpu_size: 0,
            sync: SyncMode::Manual,
            enable: false,
            trigger: false,
            dummy: 0,
        }
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn set_base(&mut self, val: u32) {
        self.base = val.bit_range(0, 23);
    }

    pub fn block_control(&self) -> u32 {
        (self.block_size as u32).set_bit_range(16, 31, self.block_count as u32)
    }

    pub fn set_block_control(&mut self, val: u32) {
        self.block_size = val.bit_range(0, 15) as u16;
        self.block_count = val.bit_range(16, 31) as u16;
    }

    pub fn control(&self) -> u32 {
        0_u32
            .set_bit(0, self.dir == ChanDir::FromRam)
            .set_bit(1, self.step == Step::Dec)
            .set_bit(8, self.chop)
            .set_bit_range(9, 10, self.sync as u32)
            .set_bit_range(16, 18, self.chop_dma_size as u32)
            .set_bit_range(20, 22, self.chop_cpu_size as u32)
            .set_bit(24, self.enable)
            .set_bit(28, self.trigger)
            .set_bit_range(29, 30, self.dummy as u32)
    }

    /// Write the channel control register. Fails without changing anything if the sync mode
    /// is invalid.
    pub fn set_control(&mut self, val: u32) -> Result<(), DmaError> {
        // Only the enable, start and one of the dummy bits can be written for the ordering
        // table, which always decrements.
        let val = if self.port == Port::Otc {
            (val & 0x5100_0000) | 0x2
        } else {
            val
        };

        self.sync = SyncMode::try_from(val.bit_range(9, 10))?;

        self.dir = if val.bit(0) { ChanDir::FromRam } else { ChanDir::ToRam };
        self.step = if val.bit(1) { Step::Dec } else { Step::Inc };
        self.chop = val.bit(8);
        self.chop_dma_size = val.bit_range(16, 18) as u8;
        self.chop_cpu_size = val.bit_range(20, 22) as u8;
        self.enable = val.bit(24);
        self.trigger = val.bit(28);
        self.dummy = val.bit_range(29, 30) as u8;

        if self.chop {
            trace!("chopping enabled for DMA port {:?}", self.port);
        }

        Ok(())
    }

    pub fn direction(&self) -> ChanDir {
        self.dir
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync
    }

    /// If the channel is ready to transfer. Manual transfers also need the start flag.
    pub fn is_active(&self) -> bool {
        let triggered = match self.sync {
            SyncMode::Manual => self.trigger,
            _ => true,
        };
        self.enable && triggered
    }

    /// Mark the transfer as finished.
    pub fn done(&mut self) {
        self.enable = false;
        self.trigger = false;
    }

    /// Number of words to transfer, or `None` in linked list mode where the size is given by
    /// the list itself.
    pub fn transfer_size(&self) -> Option<u32> {
        match self.sync {
            // A block size of 0 means the maximum.
            SyncMode::Manual => match self.block_size {
                0 => Some(0x1_0000),
                size => Some(size as u32),
            },
            SyncMode::Request => Some(self.block_size as u32 * self.block_count as u32),
            SyncMode::LinkedList => None,
        }
    }
}

/// The DMA chip. It owns the seven channels, the shared control register and the interrupt
/// register.
pub struct Dma {
    /// Channel priorities and enable bits. Stored but not used, since transfers run one at a
    /// time as they are triggered.
    control: u32,
    /// Bits 0 to 5 of the interrupt register. Read/write without function.
    irq_dummy: u8,
    /// Bit 15. Forces the interrupt line high.
    force_irq: bool,
    /// Bits 16 to 22. Per channel interrupt enable.
    irq_channel_enable: u8,
    /// Bit 23. Master interrupt enable.
    irq_master_enable: bool,
    /// Bits 24 to 30. Set when a channel with interrupts enabled finishes, cleared by writing
    /// a one.
    irq_channel_flags: u8,
    channels: [Channel; 7],
}

impl Dma {
    pub fn new() -> Self {
        Self {
            control: 0x0765_4321,
            irq_dummy: 0,
            force_irq: false,
            irq_channel_enable: 0,
            irq_master_enable: false,
            irq_channel_flags: 0,
            channels: Port::ALL.map(Channel::new),
        }
    }

    pub fn control(&self) -> u32 {
        self.control
    }

    /// The state of the interrupt line.
    pub fn irq(&self) -> bool {
        let active = self.irq_channel_flags & self.irq_channel_enable;
        self.force_irq || (self.irq_master_enable && active != 0)
    }

    pub fn interrupt(&self) -> u32 {
        (self.irq_dummy as u32)
            .set_bit(15, self.force_irq)
            .set_bit_range(16, 22, self.irq_channel_enable as u32)
            .set_bit(23, self.irq_master_enable)
            .set_bit_range(24, 30, self.irq_channel_flags as u32)
            .set_bit(31, self.irq())
    }

    pub fn set_interrupt(&mut self, val: u32) {
        self.irq_dummy = val.bit_range(0, 5) as u8;
        self.force_irq = val.bit(15);
        self.irq_channel_enable = val.bit_range(16, 22) as u8;
        self.irq_master_enable = val.bit(23);

        // Writing one to a flag acknowledges it.
        self.irq_channel_flags &= !(val.bit_range(24, 30) as u8);
    }

    pub fn load(&self, offset: u32) -> Result<u32, DmaError> {
        let major = offset.bit_range(4, 6) as usize;
        let minor = offset.bit_range(0, 3);

        match (major, minor) {
            (0..=6, 0) => Ok(self.channels[major].base()),
            (0..=6, 4) => Ok(self.channels[major].block_control()),
            (0..=6, 8) => Ok(self.channels[major].control()),
            (7, 0) => Ok(self.control),
            (7, 4) => Ok(self.interrupt()),
            _ => Err(DmaError::InvalidRegister(offset)),
        }
    }

    /// Write to a register. Returns the port of the channel written to if it's active
    /// afterwards, meaning a transfer should run.
    pub fn store(&mut self, offset: u32, val: u32) -> Result<Option<Port>, DmaError> {
        let major = offset.bit_range(4, 6) as usize;
        let minor = offset.bit_range(0, 3);

        match (major, minor) {
            (0..=6, 0) => self.channels[major].set_base(val),
            (0..=6, 4) => self.channels[major].set_block_control(val),
            (0..=6, 8) => self.channels[major].set_control(val)?,
            (7, 0) => self.control = val,
            (7, 4) => self.set_interrupt(val),
            _ => return Err(DmaError::InvalidRegister(offset)),
        }

        Ok(self.channels
            .get(major)
            .filter(|chan| chan.is_active())
            .map(|chan| chan.port()))
    }

    /// Mark channel as done and raise its interrupt flag if enabled.
    fn channel_done(&mut self, port: Port) {
        self[port].done();

        let bit = 1 << port as u8;
        if self.irq_channel_enable & bit != 0 {
            self.irq_channel_flags |= bit;
        }

        if self.irq() {
            trace!("DMA interrupt raised by port {:?}", port);
        }
    }
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Port> for Dma {
    type Output = Channel;

    fn index(&self, port: Port) -> &Self::Output {
        &self.channels[port as usize]
    }
}

impl IndexMut<Port> for Dma {
    fn index_mut(&mut self, port: Port) -> &mut Self::Output {
        &mut self.channels[port as usize]
    }
}

impl BusMap for Dma {
    const RANGE: AddrRange = AddrRange::new(0x1f80_1080, 0x80);
}

/// Every node in a list has a header word, so a list can't have more nodes than RAM has words
/// without visiting a node twice.
const MAX_LIST_NODES: usize = Ram::SIZE / 4;

impl Bus {
    /// Run the transfer of an active channel to completion.
    pub(super) fn run_dma(&mut self, port: Port) -> Result<(), DmaError> {
        match self.dma[port].transfer_size() {
            Some(size) => self.dma_block(port, size)?,
            None => self.dma_linked_list(port)?,
        }
        self.dma.channel_done(port);
        Ok(())
    }

    /// Transfer a continous block of words. The ordering table is written backwards, each entry
    /// pointing to the previous one and the last (lowest) entry holding the end marker.
    fn dma_block(&mut self, port: Port, size: u32) -> Result<(), DmaError> {
        let chan = &self.dma[port];
        let dir = chan.direction();
        let step = chan.step().step_amount();

        match (port, dir) {
            (Port::Gpu, ChanDir::FromRam) | (Port::Otc, ChanDir::ToRam) => (),
            _ => return Err(DmaError::UnsupportedTransfer { port, dir }),
        }

        let mut addr = chan.base();

        debug!(
            "DMA block transfer of {} words {:?} on port {:?} at {:06x}",
            size, dir, port, addr,
        );

        for remaining in (1..=size).rev() {
            let cursor = addr & 0x1f_fffc;
            match dir {
                ChanDir::FromRam => {
                    let val = self.ram.load::<Word>(cursor);
                    self.gpu.gp0(val);
                }
                ChanDir::ToRam => {
                    let val = if remaining == 1 {
                        0x00ff_ffff
                    } else {
                        addr.wrapping_sub(4) & 0x1f_ffff
                    };
                    self.ram.store::<Word>(cursor, val);
                }
            }
            addr = addr.wrapping_add(step);
        }

        Ok(())
    }

    /// Walk a linked list of GPU commands in RAM. Each node starts with a header with the number
    /// of words in the top byte and the address of the next node in the low 24 bits.
    fn dma_linked_list(&mut self, port: Port) -> Result<(), DmaError> {
        let dir = self.dma[port].direction();

        if port != Port::Gpu || dir != ChanDir::FromRam {
            return Err(DmaError::InvalidLinkedList { port, dir });
        }

        let start = self.dma[port].base();
        let mut addr = start & 0x1f_fffc;

        debug!("DMA linked list transfer at {:06x}", start);

        for _ in 0..MAX_LIST_NODES {
            let header = self.ram.load::<Word>(addr);

            for _ in 0..header.bit_range(24, 31) {
                addr = (addr + 4) & 0x1f_fffc;
                let val = self.ram.load::<Word>(addr);
                self.gpu.gp0(val);
            }

            // The end marker is usually 0xffffff, but only bit 23 is checked.
            if header.bit(23) {
                return Ok(());
            }

            addr = header & 0x1f_fffc;
        }

        Err(DmaError::MalformedLinkedList { start })
    }
}
