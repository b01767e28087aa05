use psx_util::{Bit, BitSet};

use super::{vram_idx, Gp0Cmd, Gpu, MemTransfer, State};

impl Gpu {
    /// Represent multiple commands which does nothing.
    pub(super) fn gp0_nop(&mut self) -> State {
        trace!("GP0 nop {:08x}", self.cmd.word(0));
        State::Idle
    }

    // GP0(01) - Clear texture cache.
    pub(super) fn gp0_clear_cache(&mut self) -> State {
        trace!("GP0 clear texture cache");
        State::Idle
    }

    // GP0(1f) - Interrupt request.
    pub(super) fn gp0_irq_request(&mut self) -> State {
        self.status.0 = self.status.0.set_bit(24, true);
        State::Idle
    }

    // GP0(02) - Fill rectangle in VRAM.
    // - 0 - Color as 24 bit RGB.
    // - 1 - Top left corner. x is rounded down to a multiple of 16.
    // - 2 - Width and height. Width is rounded up to a multiple of 16.
    pub(super) fn gp0_fill_rect(&mut self) -> State {
        let color = self.cmd.word(0);
        let pixel = (color.bit_range(3, 7)
            | color.bit_range(11, 15) << 5
            | color.bit_range(19, 23) << 10) as u16;

        let pos = self.cmd.word(1);
        let x = pos & 0x3f0;
        let y = (pos >> 16) & 0x1ff;

        let dim = self.cmd.word(2);
        let w = ((dim & 0x3ff) + 0xf) & !0xf;
        let h = (dim >> 16) & 0x1ff;

        for row in y..y + h {
            for col in x..x + w {
                self.vram[vram_idx(col, row)] = pixel;
            }
        }

        State::Idle
    }

    /// Polygons, lines and rectangles. The vertices are collected but not drawn.
    pub(super) fn gp0_draw(&mut self, cmd: Gp0Cmd) -> State {
        trace!(
            "GP0 draw {:?} {:08x} with {} words",
            cmd,
            self.cmd.word(0),
            self.cmd.len,
        );
        State::Idle
    }

    // GP0(48) - Poly-line. Takes vertices until a word matching 0x5xxx5xxx.
    pub(super) fn gp0_poly_line(&mut self) -> State {
        trace!("GP0 poly-line {:08x}", self.cmd.word(0));
        State::PolyLine
    }

    // GP0(80) - Copy rectangle from VRAM to VRAM.
    // - 1 - Source position.
    // - 2 - Destination position.
    // - 3 - Width and height.
    pub(super) fn gp0_copy_rect_vram_to_vram(&mut self) -> State {
        let dim = self.cmd.word(3);
        let mut src = MemTransfer::from_words(self.cmd.word(1), dim);
        let mut dst = MemTransfer::from_words(self.cmd.word(2), dim);

        while !src.is_done() {
            self.vram[dst.vram_idx()] = self.vram[src.vram_idx()];
            src.next();
            dst.next();
        }

        State::Idle
    }

    // GP0(a0) - Copy rectangle from CPU to VRAM.
    // - 1 - Destination position.
    // - 2 - Width and height.
    //
    // Followed by the pixel data, two pixels to a word.
    pub(super) fn gp0_copy_rect_cpu_to_vram(&mut self) -> State {
        let tran = MemTransfer::from_words(self.cmd.word(1), self.cmd.word(2));
        trace!("GP0 image load at ({}, {})", tran.x, tran.y);
        State::VramStore(tran)
    }

    // GP0(c0) - Copy rectangle from VRAM to CPU.
    // - 1 - Source position.
    // - 2 - Width and height.
    //
    // The pixels are read through GPUREAD.
    pub(super) fn gp0_copy_rect_vram_to_cpu(&mut self) -> State {
        let tran = MemTransfer::from_words(self.cmd.word(1), self.cmd.word(2));
        trace!("GP0 image store at ({}, {})", tran.x, tran.y);
        State::VramLoad(tran)
    }

    // GP0(e1) - Draw Mode Setting.
    // - 0..10 - Same as status register.
    // - 11 - Texture disabled.
    // - 12 - Texture rectangle x-flip.
    // - 13 - Texture rectangle y-flip.
    pub(super) fn gp0_draw_mode(&mut self) -> State {
        let val = self.cmd.word(0);

        self.status.0 = self.status.0
            .set_bit_range(0, 10, val.bit_range(0, 10))
            .set_bit(15, val.bit(11));

        self.tex_x_flip = val.bit(12);
        self.tex_y_flip = val.bit(13);

        State::Idle
    }

    // GP0(e2) - Texture window setting.
    // - 0..4 - Texture window mask x.
    // - 5..9 - Texture window mask y.
    // - 10..14 - Texture window offset x.
    // - 15..19 - Texture window offset y.
    pub(super) fn gp0_texture_window(&mut self) -> State {
        let val = self.cmd.word(0);

        self.tex_win_w = val.bit_range(0, 4) as u8;
        self.tex_win_h = val.bit_range(5, 9) as u8;
        self.tex_win_x = val.bit_range(10, 14) as u8;
        self.tex_win_y = val.bit_range(15, 19) as u8;

        State::Idle
    }

    // GP0(e3) - Set draw area top left.
    // - 0..9 - Draw area left.
    // - 10..18 - Draw area top.
    pub(super) fn gp0_draw_area_top_left(&mut self) -> State {
        let val = self.cmd.word(0);

        self.da_x_min = val.bit_range(0, 9) as u16;
        self.da_y_min = val.bit_range(10, 18) as u16;

        State::Idle
    }

    // GP0(e4) - Set draw area bottom right.
    // - 0..9 - Draw area right.
    // - 10..18 - Draw area bottom.
    pub(super) fn gp0_draw_area_bottom_right(&mut self) -> State {
        let val = self.cmd.word(0);

        self.da_x_max = val.bit_range(0, 9) as u16;
        self.da_y_max = val.bit_range(10, 18) as u16;

        State::Idle
    }

    // GP0(e5) - Set drawing offset.
    // - 0..10 - x-offset.
    // - 11..21 - y-offset.
    pub(super) fn gp0_draw_offset(&mut self) -> State {
        let val = self.cmd.word(0);

        let x_offset = val.bit_range(0, 10) as u16;
        let y_offset = val.bit_range(11, 21) as u16;

        // 11 bit signed values. Shift up to the sign bit of an i16 and back down to extend.
        self.x_offset = ((x_offset << 5) as i16) >> 5;
        self.y_offset = ((y_offset << 5) as i16) >> 5;

        State::Idle
    }

    // GP0(e6) - Mask bit setting.
    // - 0 - Set mask while drawing.
    // - 1 - Check mask before drawing.
    pub(super) fn gp0_mask_bit_setting(&mut self) -> State {
        let val = self.cmd.word(0).bit_range(0, 1);
        self.status.0 = self.status.0.set_bit_range(11, 12, val);
        State::Idle
    }
}
