//! A reference GPU for the bus to talk to. It keeps track of the drawing and display state set
//! through GP0 and GP1 and moves images in and out of VRAM, but nothing is rasterized.

mod gp0;
mod gp1;

use psx_util::{Bit, BitSet};

use crate::bus::{AddrRange, BusMap};

/// Direction of DMA requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDir {
    Off = 0,
    Fifo = 1,
    CpuToGp0 = 2,
    VramToCpu = 3,
}

/// Number of bits used to represent a single texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelDepth {
    B4 = 4,
    B8 = 8,
    B15 = 15,
}

/// Status register of the GPU.
#[derive(Clone, Copy)]
pub struct Status(pub u32);

impl Status {
    /// Texture page x base coordinate. N * 64.
    pub fn texture_page_x_base(self) -> u32 {
        self.0.bit_range(0, 3) * 64
    }

    /// Texture page y base coordinate. N * 256.
    pub fn texture_page_y_base(self) -> u32 {
        self.0.bit(4) as u32 * 256
    }

    pub fn texture_depth(self) -> TexelDepth {
        match self.0.bit_range(7, 8) {
            0 => TexelDepth::B4,
            1 => TexelDepth::B8,
            // 3 is reserved and behaves like 15 bit.
            _ => TexelDepth::B15,
        }
    }

    pub fn texture_disabled(self) -> bool {
        self.0.bit(15)
    }

    pub fn display_disabled(self) -> bool {
        self.0.bit(23)
    }

    pub fn irq(self) -> bool {
        self.0.bit(24)
    }

    pub fn dma_direction(self) -> DmaDir {
        match self.0.bit_range(29, 30) {
            0 => DmaDir::Off,
            1 => DmaDir::Fifo,
            2 => DmaDir::CpuToGp0,
            _ => DmaDir::VramToCpu,
        }
    }
}

/// GP0 commands which take more than a single word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gp0Cmd {
    FillRect,
    Polygon,
    Line,
    Rect,
    VramToVram,
    CpuToVram,
    VramToCpu,
}

/// What the next GP0 word means.
#[derive(Debug, Clone, Copy)]
enum State {
    /// The word starts a new command.
    Idle,
    /// The word is a parameter to `cmd`, which runs once `remaining` reaches zero.
    Params { cmd: Gp0Cmd, remaining: u8 },
    /// Vertices of a poly-line, until the terminator word.
    PolyLine,
    /// The word holds two pixels to store in VRAM.
    VramStore(MemTransfer),
    /// GPUREAD returns pixels from VRAM. GP0 is still accepting commands.
    VramLoad(MemTransfer),
}

/// Words of the GP0 command being received. The longest command is a shaded and textured quad
/// at 12 words.
struct CmdBuffer {
    words: [u32; 12],
    len: usize,
}

impl CmdBuffer {
    fn new() -> Self {
        Self { words: [0; 12], len: 0 }
    }

    fn clear(&mut self) {
        self.len = 0;
    }

    fn push(&mut self, word: u32) {
        if let Some(slot) = self.words.get_mut(self.len) {
            *slot = word;
            self.len += 1;
        } else {
            warn!("GP0 command buffer overflow");
        }
    }

    fn word(&self, idx: usize) -> u32 {
        self.words[..self.len].get(idx).copied().unwrap_or(0)
    }
}

/// A rectangle being moved between VRAM and the CPU, pixel by pixel.
#[derive(Debug, Clone, Copy)]
struct MemTransfer {
    x: u32,
    y: u32,
    x_start: u32,
    x_end: u32,
    y_end: u32,
}

impl MemTransfer {
    /// Decode the position and size words of a copy command.
    fn from_words(pos: u32, dim: u32) -> Self {
        let x = pos.bit_range(0, 15) & 0x3ff;
        let y = pos.bit_range(16, 31) & 0x1ff;

        let w = (dim.bit_range(0, 15).wrapping_sub(1) & 0x3ff) + 1;
        let h = (dim.bit_range(16, 31).wrapping_sub(1) & 0x1ff) + 1;

        Self {
            x,
            y,
            x_start: x,
            x_end: x + w,
            y_end: y + h,
        }
    }

    fn next(&mut self) {
        self.x += 1;
        if self.x == self.x_end {
            self.x = self.x_start;
            self.y += 1;
        }
    }

    fn is_done(&self) -> bool {
        self.y >= self.y_end
    }

    /// Index of the current pixel. Rectangles wrap around the edges of VRAM.
    fn vram_idx(&self) -> usize {
        vram_idx(self.x, self.y)
    }
}

fn vram_idx(x: u32, y: u32) -> usize {
    ((y & 0x1ff) * VRAM_WIDTH + (x & 0x3ff)) as usize
}

const VRAM_WIDTH: u32 = 1024;
const VRAM_HEIGHT: u32 = 512;

pub struct Gpu {
    status: Status,
    state: State,
    cmd: CmdBuffer,
    /// Value returned by GPUREAD.
    read_latch: u32,
    /// 1 MB of 16-bit pixels.
    vram: Box<[u16]>,
    tex_x_flip: bool,
    tex_y_flip: bool,
    /// Texture window mask and offset in 8 pixel steps.
    tex_win_w: u8,
    tex_win_h: u8,
    tex_win_x: u8,
    tex_win_y: u8,
    /// Drawing area, inclusive.
    da_x_min: u16,
    da_y_min: u16,
    da_x_max: u16,
    da_y_max: u16,
    x_offset: i16,
    y_offset: i16,
    /// Top left of the displayed area in VRAM.
    vram_x_start: u16,
    vram_y_start: u16,
    /// Display range on the screen in video clock cycles and scanlines.
    dis_x_start: u16,
    dis_x_end: u16,
    dis_y_start: u16,
    dis_y_end: u16,
}

impl Gpu {
    pub fn new() -> Self {
        let mut gpu = Self {
            status: Status(0),
            state: State::Idle,
            cmd: CmdBuffer::new(),
            read_latch: 0,
            vram: vec![0; (VRAM_WIDTH * VRAM_HEIGHT) as usize].into_boxed_slice(),
            tex_x_flip: false,
            tex_y_flip: false,
            tex_win_w: 0,
            tex_win_h: 0,
            tex_win_x: 0,
            tex_win_y: 0,
            da_x_min: 0,
            da_y_min: 0,
            da_x_max: 0,
            da_y_max: 0,
            x_offset: 0,
            y_offset: 0,
            vram_x_start: 0,
            vram_y_start: 0,
            dis_x_start: 0,
            dis_x_end: 0,
            dis_y_start: 0,
            dis_y_end: 0,
        };
        gpu.gp1_reset();
        gpu
    }

    /// GPUREAD. Returns two pixels at a time during VRAM to CPU transfers, otherwise the last
    /// value latched.
    pub fn read(&mut self) -> u32 {
        if let State::VramLoad(mut tran) = self.state {
            let mut val = 0;
            for half in 0..2 {
                if tran.is_done() {
                    break;
                }
                val |= (self.vram[tran.vram_idx()] as u32) << (16 * half);
                tran.next();
            }
            self.state = if tran.is_done() {
                State::Idle
            } else {
                State::VramLoad(tran)
            };
            self.read_latch = val;
        }
        self.read_latch
    }

    /// The value last returned by GPUREAD.
    pub fn read_latch(&self) -> u32 {
        self.read_latch
    }

    /// GPUSTAT. The GPU is always ready to take commands and DMA blocks.
    pub fn status(&self) -> u32 {
        let stat = self.status.0
            .set_bit(26, true)
            .set_bit(27, true)
            .set_bit(28, true);

        let request = match self.status.dma_direction() {
            DmaDir::Off => false,
            DmaDir::Fifo => true,
            DmaDir::CpuToGp0 => stat.bit(28),
            DmaDir::VramToCpu => stat.bit(27),
        };

        stat.set_bit(25, request)
    }

    /// Write a word to GP0. Used both by the CPU and by DMA.
    pub fn gp0(&mut self, val: u32) {
        self.state = match self.state {
            State::Idle | State::VramLoad(..) => self.gp0_start(val),
            State::Params { cmd, remaining } => {
                self.cmd.push(val);
                if remaining > 1 {
                    State::Params { cmd, remaining: remaining - 1 }
                } else {
                    self.gp0_exec(cmd)
                }
            }
            State::PolyLine => {
                if val & 0xf000_f000 == 0x5000_5000 {
                    trace!("GP0 poly-line done");
                    State::Idle
                } else {
                    State::PolyLine
                }
            }
            State::VramStore(tran) => self.vram_store(tran, val),
        };
    }

    /// Write a word to GP1.
    pub fn gp1(&mut self, val: u32) {
        match val.bit_range(24, 31) {
            0x00 => self.gp1_reset(),
            0x01 => self.gp1_reset_cmd_buffer(),
            0x02 => self.gp1_ack_irq(),
            0x03 => self.gp1_display_enable(val),
            0x04 => self.gp1_dma_direction(val),
            0x05 => self.gp1_display_start(val),
            0x06 => self.gp1_horizontal_display_range(val),
            0x07 => self.gp1_vertical_display_range(val),
            0x08 => self.gp1_display_mode(val),
            0x10..=0x1f => self.gp1_gpu_info(val),
            op => warn!("unknown GP1 command {:02x}", op),
        }
    }

    /// Start a new GP0 command. Single word commands run right away.
    fn gp0_start(&mut self, val: u32) -> State {
        self.cmd.clear();
        self.cmd.push(val);

        let op = val.bit_range(24, 31);

        let (cmd, len) = match op {
            0x00 => return self.gp0_nop(),
            0x01 => return self.gp0_clear_cache(),
            0x02 => (Gp0Cmd::FillRect, 3),
            0x1f => return self.gp0_irq_request(),
            0x20..=0x3f => (Gp0Cmd::Polygon, polygon_len(op)),
            0x40..=0x5f if op.bit(3) => return self.gp0_poly_line(),
            0x40..=0x5f => (Gp0Cmd::Line, 3 + op.bit(4) as u8),
            0x60..=0x7f => (Gp0Cmd::Rect, rect_len(op)),
            0x80..=0x9f => (Gp0Cmd::VramToVram, 4),
            0xa0..=0xbf => (Gp0Cmd::CpuToVram, 3),
            0xc0..=0xdf => (Gp0Cmd::VramToCpu, 3),
            0xe1 => return self.gp0_draw_mode(),
            0xe2 => return self.gp0_texture_window(),
            0xe3 => return self.gp0_draw_area_top_left(),
            0xe4 => return self.gp0_draw_area_bottom_right(),
            0xe5 => return self.gp0_draw_offset(),
            0xe6 => return self.gp0_mask_bit_setting(),
            _ => {
                warn!("unknown GP0 command {:08x}", val);
                return State::Idle;
            }
        };

        State::Params { cmd, remaining: len - 1 }
    }

    /// Run a command once all its words have arrived.
    fn gp0_exec(&mut self, cmd: Gp0Cmd) -> State {
        match cmd {
            Gp0Cmd::FillRect => self.gp0_fill_rect(),
            Gp0Cmd::Polygon | Gp0Cmd::Line | Gp0Cmd::Rect => self.gp0_draw(cmd),
            Gp0Cmd::VramToVram => self.gp0_copy_rect_vram_to_vram(),
            Gp0Cmd::CpuToVram => self.gp0_copy_rect_cpu_to_vram(),
            Gp0Cmd::VramToCpu => self.gp0_copy_rect_vram_to_cpu(),
        }
    }

    /// Store the two pixels in `val` during a CPU to VRAM transfer. If the rectangle has an odd
    /// number of pixels the upper half of the last word is thrown away.
    fn vram_store(&mut self, mut tran: MemTransfer, val: u32) -> State {
        for pixel in [val as u16, (val >> 16) as u16] {
            if tran.is_done() {
                break;
            }
            self.vram[tran.vram_idx()] = pixel;
            tran.next();
        }
        if tran.is_done() {
            trace!("GP0 image load done");
            State::Idle
        } else {
            State::VramStore(tran)
        }
    }

    pub fn vram_pixel(&self, x: u32, y: u32) -> u16 {
        self.vram[vram_idx(x, y)]
    }

    /// Drawing area as `(left, top, right, bottom)`.
    pub fn draw_area(&self) -> (u16, u16, u16, u16) {
        (self.da_x_min, self.da_y_min, self.da_x_max, self.da_y_max)
    }

    pub fn draw_offset(&self) -> (i16, i16) {
        (self.x_offset, self.y_offset)
    }

    /// Texture window as `(mask x, mask y, offset x, offset y)`.
    pub fn texture_window(&self) -> (u8, u8, u8, u8) {
        (self.tex_win_w, self.tex_win_h, self.tex_win_x, self.tex_win_y)
    }

    pub fn texture_flip(&self) -> (bool, bool) {
        (self.tex_x_flip, self.tex_y_flip)
    }

    /// Top left corner of the display area in VRAM.
    pub fn display_start(&self) -> (u16, u16) {
        (self.vram_x_start, self.vram_y_start)
    }

    /// Horizontal and vertical display range.
    pub fn display_range(&self) -> ((u16, u16), (u16, u16)) {
        ((self.dis_x_start, self.dis_x_end), (self.dis_y_start, self.dis_y_end))
    }

    pub fn status_reg(&self) -> Status {
        self.status
    }

    /// If GP0 is waiting for the first word of a new command.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle | State::VramLoad(..))
    }
}

impl Default for Gpu {
    fn default() -> Self {
        Self::new()
    }
}

impl BusMap for Gpu {
    const RANGE: AddrRange = AddrRange::new(0x1f80_1810, 8);
}

/// Words in a polygon command. Each vertex has a position, a texture coordinate if textured
/// and a color if shaded, but the color of the first vertex is in the command word.
fn polygon_len(op: u32) -> u8 {
    let verts = if op.bit(3) { 4 } else { 3 };
    let per_vert = 1 + op.bit(2) as u8;
    let colors = if op.bit(4) { verts - 1 } else { 0 };
    1 + verts * per_vert + colors
}

/// Words in a rectangle command. Size 0 means the size is given in an extra word.
fn rect_len(op: u32) -> u8 {
    2 + op.bit(2) as u8 + (op.bit_range(3, 4) == 0) as u8
}
