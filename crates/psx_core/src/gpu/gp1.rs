use psx_util::{Bit, BitSet};

use super::{Gpu, State};

impl Gpu {
    // GP1(0) - Reset the GPU. VRAM is kept.
    pub(super) fn gp1_reset(&mut self) {
        self.gp1_reset_cmd_buffer();

        self.status.0 = 0x1480_2000;

        self.vram_x_start = 0;
        self.vram_y_start = 0;

        self.dis_x_start = 0x200;
        self.dis_x_end = 0xc00;

        self.dis_y_start = 0x10;
        self.dis_y_end = 0x100;

        self.tex_x_flip = false;
        self.tex_y_flip = false;

        self.tex_win_w = 0;
        self.tex_win_h = 0;
        self.tex_win_x = 0;
        self.tex_win_y = 0;

        self.da_x_min = 0;
        self.da_y_min = 0;
        self.da_x_max = 0;
        self.da_y_max = 0;

        self.x_offset = 0;
        self.y_offset = 0;
    }

    // GP1(1) - Reset command buffer. Aborts any command waiting for parameters or pixel data.
    pub(super) fn gp1_reset_cmd_buffer(&mut self) {
        self.cmd.clear();
        self.state = State::Idle;
    }

    // GP1(2) - Acknowledge GPU interrupt.
    pub(super) fn gp1_ack_irq(&mut self) {
        self.status.0 = self.status.0.set_bit(24, false);
    }

    // GP1(3) - Display enable.
    // - 0 - Display off.
    pub(super) fn gp1_display_enable(&mut self, val: u32) {
        self.status.0 = self.status.0.set_bit(23, val.bit(0));
    }

    // GP1(4) - Set DMA direction.
    // - 0..1 - DMA direction.
    pub(super) fn gp1_dma_direction(&mut self, val: u32) {
        self.status.0 = self.status.0.set_bit_range(29, 30, val.bit_range(0, 1));
    }

    // GP1(5) - Start of display area in VRAM.
    // - 0..9 - x.
    // - 10..18 - y.
    pub(super) fn gp1_display_start(&mut self, val: u32) {
        self.vram_x_start = val.bit_range(0, 9) as u16;
        self.vram_y_start = val.bit_range(10, 18) as u16;
    }

    // GP1(6) - Horizontal display range.
    // - 0..11 - Column start.
    // - 12..23 - Column end.
    pub(super) fn gp1_horizontal_display_range(&mut self, val: u32) {
        self.dis_x_start = val.bit_range(0, 11) as u16;
        self.dis_x_end = val.bit_range(12, 23) as u16;
    }

    // GP1(7) - Vertical display range.
    // - 0..9 - Line start.
    // - 10..19 - Line end.
    pub(super) fn gp1_vertical_display_range(&mut self, val: u32) {
        self.dis_y_start = val.bit_range(0, 9) as u16;
        self.dis_y_end = val.bit_range(10, 19) as u16;
    }

    // GP1(8) - Set display mode.
    // - 0..1 - Horizontal resolution 1.
    // - 2 - Vertical resolution.
    // - 3 - Video mode.
    // - 4 - Display area color depth.
    // - 5 - Vertical interlace.
    // - 6 - Horizontal resolution 2.
    // - 7 - Reverse flag.
    pub(super) fn gp1_display_mode(&mut self, val: u32) {
        self.status.0 = self.status.0
            .set_bit_range(17, 22, val.bit_range(0, 5))
            .set_bit(16, val.bit(6))
            .set_bit(14, val.bit(7));
    }

    // GP1(10) - Get GPU info. The answer is latched into GPUREAD.
    // - 0..23 - Info index.
    pub(super) fn gp1_gpu_info(&mut self, val: u32) {
        let answer = match val.bit_range(0, 3) {
            0x2 => Some(
                (self.tex_win_w as u32)
                    | (self.tex_win_h as u32) << 5
                    | (self.tex_win_x as u32) << 10
                    | (self.tex_win_y as u32) << 15,
            ),
            0x3 => Some(self.da_x_min as u32 | (self.da_y_min as u32) << 10),
            0x4 => Some(self.da_x_max as u32 | (self.da_y_max as u32) << 10),
            0x5 => {
                let x = (self.x_offset as u32) & 0x7ff;
                let y = (self.y_offset as u32) & 0x7ff;
                Some(x | y << 11)
            }
            0x7 => Some(2),
            _ => None,
        };
        match answer {
            Some(answer) => self.read_latch = answer,
            None => trace!("GP1 info {:x} keeps GPUREAD", val.bit_range(0, 23)),
        }
    }
}
